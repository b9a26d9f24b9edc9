//! Simulation component identifiers.

/// Identifier of simulation component, assigned densely in registration order.
pub type Id = u32;
