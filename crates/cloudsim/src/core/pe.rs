//! Processing element (CPU core) of a host.

use serde::Serialize;

use crate::core::provisioner::PeProvisioner;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PeStatus {
    Free,
    Busy,
}

/// Single physical core with a fixed MIPS rating.
#[derive(Clone, Debug)]
pub struct Pe {
    pub id: u32,
    provisioner: PeProvisioner,
}

impl Pe {
    pub fn new(id: u32, mips: f64) -> Self {
        debug_assert!(mips > 0., "PE rating must be positive");
        Self {
            id,
            provisioner: PeProvisioner::new(mips),
        }
    }

    /// Returns the MIPS rating of the core.
    pub fn mips(&self) -> f64 {
        self.provisioner.mips()
    }

    pub fn status(&self) -> PeStatus {
        if self.provisioner.allocated_mips() > 0. {
            PeStatus::Busy
        } else {
            PeStatus::Free
        }
    }

    pub fn provisioner(&self) -> &PeProvisioner {
        &self.provisioner
    }

    pub fn provisioner_mut(&mut self) -> &mut PeProvisioner {
        &mut self.provisioner
    }
}
