//! Discrete-event simulation engine.
//!
//! The engine keeps a single logical clock and a queue of timestamped events exchanged by simulation components.
//! Components register in [`Simulation`], obtain a [`SimulationContext`] for producing events and receive events via
//! the [`EventHandler`] trait. Events are dispatched one by one in the order of their timestamps, with ties broken by
//! the order in which events were scheduled.

#![warn(missing_docs)]

pub mod component;
pub mod context;
pub mod error;
pub mod event;
pub mod handler;
pub mod log;
pub mod simulation;
mod state;

pub use colored;
pub use component::Id;
pub use context::SimulationContext;
pub use error::SimulationError;
pub use event::{Event, EventData, EventId, SimulationEnd};
pub use handler::EventHandler;
pub use simulation::Simulation;
pub use state::EPSILON;
