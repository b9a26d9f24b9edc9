//! Simulation events.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::Serialize;

use crate::component::Id;

/// Event identifier, equal to the event's enqueue sequence number.
pub type EventId = u64;

/// Trait for event payloads.
///
/// Implemented automatically for every serializable type, so any such type can be used as an event payload.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + 'static> EventData for T {}

/// Timestamped message between simulation components.
pub struct Event {
    /// Unique event identifier.
    ///
    /// Events are numbered sequentially starting from 0.
    pub id: EventId,
    /// Time of event occurrence.
    pub time: f64,
    /// Identifier of event source.
    pub src: Id,
    /// Identifier of event destination.
    pub dst: Id,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

/// The designated end-of-simulation event.
///
/// Scheduled to every registered component by [`Simulation::terminate_at`](crate::Simulation::terminate_at).
/// After it fires the run stops, leaving the pending events undelivered.
#[derive(Clone, Serialize)]
pub struct SimulationEnd {}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// BinaryHeap is a max-heap, so the comparison is reversed to pop the earliest event first.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
