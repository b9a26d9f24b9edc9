//! Simulation configuration and execution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::Level::Trace;
use log::{debug, log_enabled, trace};
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::context::SimulationContext;
use crate::error::SimulationError;
use crate::event::SimulationEnd;
use crate::handler::EventHandler;
use crate::log::{get_colored, log_undelivered_event};
use crate::state::SimulationState;

/// Represents a simulation, provides methods for its configuration and execution.
///
/// The lifecycle is `init → run → terminate`: components are registered right after construction, then events are
/// dispatched one by one until the queue is drained or the end-of-simulation event fires.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    name_to_id: HashMap<String, Id>,
    names: Rc<RefCell<Vec<String>>>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
    end_time: Option<f64>,
    finished: bool,
}

impl Simulation {
    /// Creates a new simulation with specified random seed.
    pub fn new(seed: u64) -> Self {
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(seed))),
            name_to_id: HashMap::new(),
            names: Rc::new(RefCell::new(Vec::new())),
            handlers: Vec::new(),
            end_time: None,
            finished: false,
        }
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.name_to_id.len() as Id;
        self.name_to_id.insert(name.to_owned(), id);
        self.names.borrow_mut().push(name.to_owned());
        self.handlers.push(None);
        id
    }

    /// Returns the identifier of component by its name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cloudsim_core::Simulation;
    ///
    /// let mut sim = Simulation::new(123);
    /// let comp_ctx = sim.create_context("comp");
    /// assert_eq!(sim.lookup_id(comp_ctx.name()), Some(0));
    /// assert_eq!(sim.lookup_id("missing"), None);
    /// ```
    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.name_to_id.get(name).copied()
    }

    /// Returns the name of component by its identifier.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names
            .borrow()
            .get(id as usize)
            .cloned()
            .unwrap_or_else(|| format!("#{}", id))
    }

    /// Creates a new simulation context with specified name.
    ///
    /// Registers the name as a component if it was not registered before.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let ctx = SimulationContext::new(
            self.register(name.as_ref()),
            name.as_ref(),
            self.sim_state.clone(),
            self.names.clone(),
        );
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Created context: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": ctx.name(), "id": ctx.id()})
        );
        ctx
    }

    /// Registers the event handler implementation for component with specified name, returns the component id.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        self.handlers[id as usize] = Some(handler);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Added handler: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name.as_ref(), "id": id})
        );
        id
    }

    /// Removes the event handler of component with specified name.
    ///
    /// Events later dispatched to this component abort the run with [`SimulationError::MalformedEvent`].
    pub fn remove_handler<S>(&mut self, name: S)
    where
        S: AsRef<str>,
    {
        if let Some(id) = self.lookup_id(name.as_ref()) {
            self.handlers[id as usize] = None;
            debug!(
                target: "simulation",
                "[{:.3} {} simulation] Removed handler: {}",
                self.time(),
                get_colored("DEBUG", colored::Color::Blue),
                json!({"name": name.as_ref(), "id": id})
            );
        }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Performs a single step through the simulation.
    ///
    /// Takes the next event from the queue, advances the simulation time to event time and dispatches the event to
    /// its destination. Returns `Ok(true)` if an event was dispatched and `Ok(false)` if the simulation is over.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        if self.finished {
            return Ok(false);
        }
        if let Some(end_time) = self.end_time {
            let has_pending_end = {
                let mut state = self.sim_state.borrow_mut();
                state
                    .peek_event()
                    .map_or(false, |e| e.time <= end_time && e.data.is::<SimulationEnd>())
            };
            if !has_pending_end {
                self.terminate();
                return Ok(false);
            }
        }

        let next = self.sim_state.borrow_mut().next_event();
        let event = match next {
            Some(event) => event,
            None => return Ok(false),
        };

        if event.data.is::<SimulationEnd>() && self.end_time.is_none() {
            debug!(
                target: "simulation",
                "[{:.3} {} simulation] End of simulation",
                event.time,
                get_colored("DEBUG", colored::Color::Blue),
            );
            self.end_time = Some(event.time);
        }

        if log_enabled!(Trace) {
            let src_name = self.lookup_name(event.src);
            let dst_name = self.lookup_name(event.dst);
            trace!(
                target: &dst_name,
                "[{:.3} {} {}] {}",
                event.time,
                get_colored("EVENT", colored::Color::BrightBlack),
                dst_name,
                json!({"type": type_name(&event.data).unwrap_or("unknown"), "data": event.data, "src": src_name})
            );
        }

        let handler = self.handlers.get(event.dst as usize).cloned().flatten();
        match handler {
            Some(handler) => handler.borrow_mut().on(event)?,
            None => return Err(log_undelivered_event(event)),
        }
        Ok(true)
    }

    /// Performs the specified number of steps through the simulation.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn steps(&mut self, step_count: u64) -> Result<bool, SimulationError> {
        for _ in 0..step_count {
            if !self.step()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Steps through the simulation until there are no pending events left or the end-of-simulation event fires.
    pub fn step_until_no_events(&mut self) -> Result<(), SimulationError> {
        while self.step()? {}
        Ok(())
    }

    /// Steps through the simulation with duration limit.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn step_for_duration(&mut self, duration: f64) -> Result<bool, SimulationError> {
        let end_time = self.time() + duration;
        loop {
            let next_time = self.sim_state.borrow_mut().peek_event().map(|e| e.time);
            match next_time {
                Some(time) if time > end_time => return Ok(true),
                Some(_) => {
                    if !self.step()? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
    }

    /// Runs the simulation to completion and terminates it.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        self.step_until_no_events()?;
        self.terminate();
        Ok(())
    }

    /// Schedules the end-of-simulation event to every registered component after the specified delay.
    pub fn terminate_at(&mut self, delay: f64) {
        let mut state = self.sim_state.borrow_mut();
        for (id, handler) in self.handlers.iter().enumerate() {
            if handler.is_some() {
                state.add_event(SimulationEnd {}, id as Id, id as Id, delay);
            }
        }
    }

    /// Finishes the simulation, discarding all pending events.
    pub fn terminate(&mut self) {
        let dropped = self.sim_state.borrow_mut().clear_events();
        if self.finished {
            return;
        }
        self.finished = true;
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Terminated, {} pending events discarded",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            dropped
        );
    }

    /// Returns `true` once the simulation is terminated.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the number of events waiting in the queue, including cancelled ones.
    pub fn pending_event_count(&self) -> usize {
        self.sim_state.borrow().pending_event_count()
    }

    /// Returns the total number of created events.
    ///
    /// Note that cancelled events are also counted here.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }
}
