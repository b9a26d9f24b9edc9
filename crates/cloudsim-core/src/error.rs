//! Engine errors.

use thiserror::Error;

use crate::component::Id;

/// Errors aborting the simulation run.
///
/// These signal a wiring bug between the engine and components, not a resource condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Event was dispatched to a destination without a matching handler.
    #[error("malformed event #{event_id} of type {event_type} from {src} to {dst}: {reason}")]
    MalformedEvent {
        /// Event identifier.
        event_id: u64,
        /// Payload type name.
        event_type: String,
        /// Source component.
        src: Id,
        /// Destination component.
        dst: Id,
        /// What exactly is missing.
        reason: String,
    },
}
