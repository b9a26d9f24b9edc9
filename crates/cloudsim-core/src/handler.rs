//! Event handling.

use crate::error::SimulationError;
use crate::event::Event;

/// Trait for consuming events in simulation components.
///
/// The engine calls [`on`](EventHandler::on) for every event destined to the component. The handler runs to
/// completion before the next event is dispatched; any reaction to the event is expressed by emitting new events via
/// the component's [`SimulationContext`](crate::SimulationContext).
pub trait EventHandler {
    /// Processes event.
    ///
    /// Returning an error aborts the simulation run.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use serde::Serialize;
    /// use cloudsim_core::{cast, Event, EventHandler, Simulation, SimulationContext, SimulationError};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct SomeEvent {
    ///     some_field: u32,
    /// }
    ///
    /// pub struct Component {
    ///     state: u32,
    ///     ctx: SimulationContext,
    /// }
    ///
    /// impl EventHandler for Component {
    ///     fn on(&mut self, event: Event) -> Result<(), SimulationError> {
    ///         cast!(match event.data {
    ///             SomeEvent { some_field } => {
    ///                 self.state = some_field;
    ///             }
    ///         })
    ///     }
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut comp1_ctx = sim.create_context("comp1");
    /// let comp2_ctx = sim.create_context("comp2");
    /// let comp2 = Rc::new(RefCell::new(Component { state: 0, ctx: comp2_ctx }));
    /// let comp2_id = sim.add_handler("comp2", comp2.clone());
    /// comp1_ctx.emit(SomeEvent { some_field: 16 }, comp2_id, 1.2);
    /// assert_eq!(comp2.borrow().state, 0);
    /// sim.step().unwrap();
    /// assert_eq!(comp2.borrow().state, 16);
    /// ```
    fn on(&mut self, event: Event) -> Result<(), SimulationError>;
}

/// Enables the use of pattern matching syntax for processing different types of events
/// by downcasting the event payload from [`EventData`](crate::event::EventData) to user-defined types.
///
/// The macro evaluates to `Result<(), SimulationError>`. Match arms need not be exhaustive, but if the payload does
/// not match any of the arms, the event is logged under `ERROR` level and
/// [`SimulationError::MalformedEvent`](crate::SimulationError::MalformedEvent) is returned.
///
/// # Examples
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde::Serialize;
/// use cloudsim_core::{cast, Event, EventHandler, Simulation, SimulationContext, SimulationError};
///
/// #[derive(Clone, Serialize)]
/// pub struct SomeEvent {
///     some_field: u32,
/// }
///
/// #[derive(Clone, Serialize)]
/// pub struct AnotherEvent {
///     another_field: f64,
/// }
///
/// pub struct Component {}
///
/// impl EventHandler for Component {
///     fn on(&mut self, event: Event) -> Result<(), SimulationError> {
///         cast!(match event.data {
///             SomeEvent { some_field } => {
///                 assert_eq!(some_field, 16);
///             }
///             AnotherEvent { another_field } => {
///                 assert_eq!(another_field, 1.6);
///             }
///         })
///     }
/// }
///
/// let mut sim = Simulation::new(123);
/// let comp_id = sim.add_handler("comp", Rc::new(RefCell::new(Component {})));
/// let mut client_ctx = sim.create_context("client");
/// client_ctx.emit(SomeEvent { some_field: 16 }, comp_id, 1.2);
/// client_ctx.emit(AnotherEvent { another_field: 1.6 }, comp_id, 2.5);
/// sim.step_until_no_events().unwrap();
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
                Ok(())
            } else
        )*
        {
            Err($crate::log::log_unhandled_event($event))
        }
    }
}
