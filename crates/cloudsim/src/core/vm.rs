//! Representations of virtual machine and its status.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use cloudsim_core::Id;

use crate::core::cloudlet_scheduler::{CloudletScheduler, CloudletSchedulerKind};

/// Status of virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmStatus {
    Created,
    Running,
    Destroyed,
    FailedToAllocate,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Created => write!(f, "created"),
            VmStatus::Running => write!(f, "running"),
            VmStatus::Destroyed => write!(f, "destroyed"),
            VmStatus::FailedToAllocate => write!(f, "failed_to_allocate"),
        }
    }
}

/// Identifies VM inside a datacenter. VM ids are chosen by brokers, so they are unique only per broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VmUid {
    pub broker_id: Id,
    pub vm_id: u32,
}

impl VmUid {
    pub fn new(broker_id: Id, vm_id: u32) -> Self {
        Self { broker_id, vm_id }
    }
}

impl Display for VmUid {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}-{}", self.broker_id, self.vm_id)
    }
}

/// Resource request of virtual machine, as submitted by the broker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VmSpec {
    pub id: u32,
    /// Set by the broker on submission.
    #[serde(default)]
    pub broker_id: Id,
    /// MIPS requested for each core.
    pub mips: f64,
    #[serde(default = "default_cores")]
    pub cores: u32,
    pub ram: u64,
    pub bw: u64,
    pub image_size: u64,
    #[serde(default = "default_vmm")]
    pub vmm: String,
    #[serde(default)]
    pub scheduler: CloudletSchedulerKind,
}

fn default_cores() -> u32 {
    1
}

fn default_vmm() -> String {
    "Xen".to_string()
}

impl VmSpec {
    /// Creates request with the time-shared cloudlet scheduler.
    pub fn new(id: u32, mips: f64, cores: u32, ram: u64, bw: u64, image_size: u64) -> Self {
        Self {
            id,
            broker_id: 0,
            mips,
            cores,
            ram,
            bw,
            image_size,
            vmm: default_vmm(),
            scheduler: CloudletSchedulerKind::TimeShared,
        }
    }

    pub fn with_scheduler(mut self, scheduler: CloudletSchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn uid(&self) -> VmUid {
        VmUid::new(self.broker_id, self.id)
    }

    /// Returns the total requested MIPS.
    pub fn total_mips(&self) -> f64 {
        self.mips * self.cores as f64
    }
}

/// Represents virtual machine (VM) placed in a datacenter.
///
/// VM references its host by id. The MIPS allocated to its cores is set by the host VM scheduler and is used by the
/// cloudlet scheduler to share the VM capacity among cloudlets.
pub struct VirtualMachine {
    pub id: u32,
    pub spec: VmSpec,
    pub status: VmStatus,
    host_id: Option<u32>,
    allocated_mips: Vec<f64>,
    cloudlet_scheduler: Box<dyn CloudletScheduler>,
}

impl VirtualMachine {
    pub fn from_spec(spec: VmSpec) -> Self {
        let cloudlet_scheduler = spec.scheduler.build();
        Self {
            id: spec.id,
            spec,
            status: VmStatus::Created,
            host_id: None,
            allocated_mips: Vec::new(),
            cloudlet_scheduler,
        }
    }

    pub fn uid(&self) -> VmUid {
        self.spec.uid()
    }

    /// Returns the host id, or `None` if VM is not placed.
    pub fn host_id(&self) -> Option<u32> {
        self.host_id
    }

    pub fn is_placed(&self) -> bool {
        self.host_id.is_some()
    }

    /// Returns the MIPS currently allocated to each core.
    pub fn allocated_mips(&self) -> &[f64] {
        &self.allocated_mips
    }

    pub fn cloudlet_scheduler(&self) -> &dyn CloudletScheduler {
        self.cloudlet_scheduler.as_ref()
    }

    pub fn cloudlet_scheduler_mut(&mut self) -> &mut dyn CloudletScheduler {
        self.cloudlet_scheduler.as_mut()
    }

    /// Advances cloudlets progress and recomputes their shares using the current allocation.
    pub fn update_processing(&mut self, time: f64) -> Option<f64> {
        self.cloudlet_scheduler.update_processing(time, &self.allocated_mips)
    }

    pub(crate) fn set_host(&mut self, host_id: Option<u32>) {
        self.host_id = host_id;
        self.status = if host_id.is_some() {
            VmStatus::Running
        } else {
            VmStatus::Destroyed
        };
    }

    /// Per-core allocation never exceeds the requested MIPS.
    pub(crate) fn set_allocated_mips(&mut self, mips: Vec<f64>) {
        let requested = self.spec.mips;
        self.allocated_mips = mips.into_iter().map(|m| m.min(requested)).collect();
    }
}
