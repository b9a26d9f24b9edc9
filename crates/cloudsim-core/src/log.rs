//! Component logging.
//!
//! Every record written through the macros below carries the simulation time, a coloured level label and the name of
//! the component owning the context, so that a log of a run reads as a timeline.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::error;
use serde_json::json;
use serde_type_name::type_name;

use crate::error::SimulationError;
use crate::event::Event;

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_record {
    ($level:ident, $label:literal, $color:ident, $ctx:expr, $format:literal $($arg:tt)*) => (
        log::$level!(
            target: $ctx.name(),
            concat!("[{:.3} {} {}] ", $format),
            $ctx.time(),
            $crate::log::get_colored($label, $crate::colored::Color::$color),
            $ctx.name()
            $($arg)*
        )
    );
}

/// Logs a component message at the info level.
///
/// ```rust
/// use cloudsim_core::{log_info, Simulation};
///
/// let _ = env_logger::builder().is_test(true).try_init();
/// let mut sim = Simulation::new(42);
/// let ctx = sim.create_context("host");
/// log_info!(ctx, "powered on with {} cores", 4);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($rest:tt)+) => ($crate::__log_record!(info, "INFO ", Green, $ctx, $($rest)+));
}

/// Logs a component message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($rest:tt)+) => ($crate::__log_record!(debug, "DEBUG", Blue, $ctx, $($rest)+));
}

/// Logs a component message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($rest:tt)+) => ($crate::__log_record!(warn, "WARN ", Yellow, $ctx, $($rest)+));
}

fn describe(event: &Event) -> serde_json::Value {
    json!({
        "type": type_name(&event.data).unwrap_or("unknown"),
        "data": event.data,
        "src": event.src,
        "dst": event.dst,
    })
}

fn malformed(event: Event, reason: &str) -> SimulationError {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] {}: {}",
        event.time,
        get_colored("ERROR", Color::Red),
        reason,
        describe(&event)
    );
    SimulationError::MalformedEvent {
        event_id: event.id,
        event_type: type_name(&event.data).unwrap_or("unknown").to_string(),
        src: event.src,
        dst: event.dst,
        reason: reason.to_string(),
    }
}

/// Turns an event not matched by any arm of [`cast!`](crate::cast!) into an error.
pub fn log_unhandled_event(event: Event) -> SimulationError {
    malformed(event, "unhandled event")
}

pub(crate) fn log_undelivered_event(event: Event) -> SimulationError {
    malformed(event, "undelivered event")
}

/// Logs event rejected by the queue.
pub(crate) fn log_incorrect_event(event: Event, msg: &str) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] incorrect event ({}): {}",
        event.time,
        get_colored("ERROR", Color::Red),
        msg,
        describe(&event)
    );
}
