//! Errors of the cloud model.

use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;

/// Resource dimension of a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    Pes,
    Mips,
    Ram,
    Bandwidth,
    Storage,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ResourceKind::Pes => write!(f, "pes"),
            ResourceKind::Mips => write!(f, "mips"),
            ResourceKind::Ram => write!(f, "ram"),
            ResourceKind::Bandwidth => write!(f, "bandwidth"),
            ResourceKind::Storage => write!(f, "storage"),
        }
    }
}

/// Errors raised by the cloud model.
///
/// Resource errors never abort the simulation: they are reported to the broker as a failed VM creation or as a
/// failed cloudlet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CloudError {
    #[error("not enough {resource} for vm #{vm_id}: requested {requested}, available {available}")]
    InsufficientCapacity {
        resource: ResourceKind,
        vm_id: u32,
        requested: f64,
        available: f64,
    },
    #[error("no suitable host for vm #{vm_id}")]
    PlacementFailed { vm_id: u32 },
    #[error("cloudlet #{cloudlet_id} can't run: {}", missing_vm(.vm_id))]
    UnboundCloudlet { cloudlet_id: u32, vm_id: Option<u32> },
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn missing_vm(vm_id: &Option<u32>) -> String {
    match vm_id {
        Some(vm_id) => format!("vm #{} does not exist", vm_id),
        None => "not bound to any vm".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_cloudlet_message() {
        let bound = CloudError::UnboundCloudlet {
            cloudlet_id: 1,
            vm_id: Some(5),
        };
        assert_eq!(bound.to_string(), "cloudlet #1 can't run: vm #5 does not exist");
        let unbound = CloudError::UnboundCloudlet {
            cloudlet_id: 2,
            vm_id: None,
        };
        assert_eq!(unbound.to_string(), "cloudlet #2 can't run: not bound to any vm");
    }
}
