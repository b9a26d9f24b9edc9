//! Representation of cloudlet (workload unit) and its status.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use cloudsim_core::Id;

use crate::core::utilization_model::{UtilizationModel, UtilizationModelFull, UtilizationModelSpec};

/// Status of cloudlet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudletStatus {
    Created,
    Queued,
    InExec,
    Success,
    Failed,
    Canceled,
}

impl CloudletStatus {
    /// Returns `true` for statuses which never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CloudletStatus::Success | CloudletStatus::Failed | CloudletStatus::Canceled
        )
    }
}

impl Display for CloudletStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CloudletStatus::Created => write!(f, "CREATED"),
            CloudletStatus::Queued => write!(f, "QUEUED"),
            CloudletStatus::InExec => write!(f, "INEXEC"),
            CloudletStatus::Success => write!(f, "SUCCESS"),
            CloudletStatus::Failed => write!(f, "FAILED"),
            CloudletStatus::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// Cloudlet description used in configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudletSpec {
    pub id: u32,
    /// Length in millions of instructions.
    pub length: f64,
    #[serde(default = "default_pes")]
    pub pes: u32,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub output_size: u64,
    #[serde(default)]
    pub utilization_cpu: UtilizationModelSpec,
    #[serde(default)]
    pub utilization_ram: UtilizationModelSpec,
    #[serde(default)]
    pub utilization_bw: UtilizationModelSpec,
    /// VM the cloudlet is bound to. Unbound cloudlets are distributed among created VMs by the broker.
    #[serde(default)]
    pub vm_id: Option<u32>,
}

fn default_pes() -> u32 {
    1
}

/// Represents cloudlet, a workload unit executed on a virtual machine.
///
/// Cloudlet is created by the user and passed to the broker. Its status and timestamps are changed only by the
/// datacenter and the cloudlet scheduler of the VM running it. Once the cloudlet reaches a terminal status, it is
/// returned to the broker and never changes again.
#[derive(Clone, Serialize)]
pub struct Cloudlet {
    pub id: u32,
    pub broker_id: Id,
    length: f64,
    pes: u32,
    file_size: u64,
    output_size: u64,
    #[serde(skip)]
    utilization_cpu: Box<dyn UtilizationModel>,
    #[serde(skip)]
    utilization_ram: Box<dyn UtilizationModel>,
    #[serde(skip)]
    utilization_bw: Box<dyn UtilizationModel>,
    vm_id: Option<u32>,
    status: CloudletStatus,
    executed_length: f64,
    submission_time: Option<f64>,
    exec_start_time: Option<f64>,
    finish_time: Option<f64>,
    datacenter_id: Option<Id>,
    cost: f64,
}

impl Cloudlet {
    /// Creates cloudlet with specified length (MI), number of required PEs, input and output file sizes.
    ///
    /// All resources are fully utilized by default.
    pub fn new(id: u32, length: f64, pes: u32, file_size: u64, output_size: u64) -> Self {
        Self {
            id,
            broker_id: 0,
            length,
            pes: pes.max(1),
            file_size,
            output_size,
            utilization_cpu: Box::new(UtilizationModelFull),
            utilization_ram: Box::new(UtilizationModelFull),
            utilization_bw: Box::new(UtilizationModelFull),
            vm_id: None,
            status: CloudletStatus::Created,
            executed_length: 0.,
            submission_time: None,
            exec_start_time: None,
            finish_time: None,
            datacenter_id: None,
            cost: 0.,
        }
    }

    /// Creates cloudlet from the configuration file entry.
    pub fn from_spec(spec: &CloudletSpec, default_seed: u64) -> Self {
        let mut cloudlet = Self::new(spec.id, spec.length, spec.pes, spec.file_size, spec.output_size)
            .with_utilization_models(
                spec.utilization_cpu.build(default_seed),
                spec.utilization_ram.build(default_seed.wrapping_add(1)),
                spec.utilization_bw.build(default_seed.wrapping_add(2)),
            );
        cloudlet.vm_id = spec.vm_id;
        cloudlet
    }

    pub fn with_utilization_models(
        mut self,
        cpu: Box<dyn UtilizationModel>,
        ram: Box<dyn UtilizationModel>,
        bw: Box<dyn UtilizationModel>,
    ) -> Self {
        self.utilization_cpu = cpu;
        self.utilization_ram = ram;
        self.utilization_bw = bw;
        self
    }

    /// Binds the cloudlet to the VM.
    pub fn with_vm(mut self, vm_id: u32) -> Self {
        self.vm_id = Some(vm_id);
        self
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn pes(&self) -> u32 {
        self.pes
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn output_size(&self) -> u64 {
        self.output_size
    }

    pub fn vm_id(&self) -> Option<u32> {
        self.vm_id
    }

    pub fn status(&self) -> CloudletStatus {
        self.status
    }

    /// Returns the number of instructions (MI) executed so far.
    pub fn executed_length(&self) -> f64 {
        self.executed_length
    }

    pub fn remaining_length(&self) -> f64 {
        (self.length - self.executed_length).max(0.)
    }

    pub fn submission_time(&self) -> Option<f64> {
        self.submission_time
    }

    pub fn exec_start_time(&self) -> Option<f64> {
        self.exec_start_time
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    /// Returns the identifier of datacenter which processed the cloudlet.
    pub fn datacenter_id(&self) -> Option<Id> {
        self.datacenter_id
    }

    /// Returns the time between the execution start and finish, or zero if the cloudlet never started.
    pub fn actual_cpu_time(&self) -> f64 {
        match (self.exec_start_time, self.finish_time) {
            (Some(start), Some(finish)) => finish - start,
            _ => 0.,
        }
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn utilization_of_cpu(&self, time: f64) -> f64 {
        self.utilization_cpu.utilization(time)
    }

    pub fn utilization_of_ram(&self, time: f64) -> f64 {
        self.utilization_ram.utilization(time)
    }

    pub fn utilization_of_bw(&self, time: f64) -> f64 {
        self.utilization_bw.utilization(time)
    }

    pub(crate) fn bind_to_vm(&mut self, vm_id: u32) {
        self.vm_id = Some(vm_id);
    }

    pub(crate) fn set_submitted(&mut self, datacenter_id: Id, time: f64) {
        self.datacenter_id = Some(datacenter_id);
        self.submission_time = Some(time);
    }

    /// Fails the cloudlet which could not be sent to any datacenter.
    pub(crate) fn reject(&mut self, time: f64) {
        if self.submission_time.is_none() {
            self.submission_time = Some(time);
        }
        self.finish(CloudletStatus::Failed, time);
    }

    pub(crate) fn set_queued(&mut self) {
        if self.status == CloudletStatus::Created {
            self.status = CloudletStatus::Queued;
        }
    }

    pub(crate) fn start(&mut self, time: f64) {
        if self.status == CloudletStatus::Queued {
            self.status = CloudletStatus::InExec;
            self.exec_start_time = Some(time);
        }
    }

    pub(crate) fn add_progress(&mut self, length: f64) {
        if self.status == CloudletStatus::InExec && length > 0. {
            self.executed_length = (self.executed_length + length).min(self.length);
        }
    }

    /// Moves the cloudlet to the terminal status, does nothing if it is already terminal.
    pub(crate) fn finish(&mut self, status: CloudletStatus, time: f64) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }
        if status == CloudletStatus::Success {
            self.executed_length = self.length;
        }
        self.status = status;
        self.finish_time = Some(time);
    }

    pub(crate) fn set_cost(&mut self, cost: f64) {
        self.cost = cost;
    }
}
