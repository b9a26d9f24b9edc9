//! Broker component submitting VMs and cloudlets on behalf of a user.

use std::collections::BTreeSet;
use std::rc::Rc;

use indexmap::IndexMap;

use cloudsim_core::{cast, log_debug, log_info, log_warn};
use cloudsim_core::{Event, EventHandler, Id, SimulationContext, SimulationEnd, SimulationError};

use crate::core::cloudlet::Cloudlet;
use crate::core::config::SimulationConfig;
use crate::core::error::CloudError;
use crate::core::events::broker::{BrokerStart, CancelCloudlet, DestroyVm};
use crate::core::events::cloudlet::{CloudletCancel, CloudletReturn, CloudletSubmit};
use crate::core::events::vm::{AckStatus, VmCreateAck, VmCreateRequest, VmDestroyAck, VmDestroyRequest};
use crate::core::record::CloudletRecord;
use crate::core::vm::VmSpec;

/// Represents datacenter broker.
///
/// The broker submits its VMs to datacenters, retrying the failed ones on the next datacenter, then submits the
/// cloudlets to the datacenters hosting their VMs and collects the returned cloudlets. Once all cloudlets are
/// returned, the broker destroys its VMs.
pub struct DatacenterBroker {
    pub id: Id,
    datacenters: Vec<Id>,
    vms: Vec<VmSpec>,
    cloudlets: Vec<Cloudlet>,
    // vm id -> (spec, index of datacenter)
    pending_vms: IndexMap<u32, (VmSpec, usize)>,
    // vm id -> datacenter id
    active_vms: IndexMap<u32, Id>,
    created_vms: Vec<u32>,
    failed_vms: Vec<u32>,
    // cloudlet id -> datacenter id
    awaiting_cloudlets: IndexMap<u32, Id>,
    received: Vec<Cloudlet>,
    started: bool,
    cloudlets_submitted: bool,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl DatacenterBroker {
    pub fn new(ctx: SimulationContext, sim_config: Rc<SimulationConfig>) -> Self {
        Self {
            id: ctx.id(),
            datacenters: Vec::new(),
            vms: Vec::new(),
            cloudlets: Vec::new(),
            pending_vms: IndexMap::new(),
            active_vms: IndexMap::new(),
            created_vms: Vec::new(),
            failed_vms: Vec::new(),
            awaiting_cloudlets: IndexMap::new(),
            received: Vec::new(),
            started: false,
            cloudlets_submitted: false,
            ctx,
            sim_config,
        }
    }

    /// Adds datacenter to the list of datacenters tried in the order of addition.
    pub fn add_datacenter(&mut self, datacenter_id: Id) {
        if !self.datacenters.contains(&datacenter_id) {
            self.datacenters.push(datacenter_id);
        }
    }

    pub fn submit_vm_list(&mut self, vms: Vec<VmSpec>) {
        self.vms.extend(vms);
    }

    pub fn submit_cloudlet_list(&mut self, cloudlets: Vec<Cloudlet>) {
        self.cloudlets.extend(cloudlets);
    }

    /// Binds the cloudlet which is not submitted yet to the specified VM.
    pub fn bind_cloudlet_to_vm(&mut self, cloudlet_id: u32, vm_id: u32) -> bool {
        match self.cloudlets.iter_mut().find(|c| c.id == cloudlet_id) {
            Some(cloudlet) => {
                cloudlet.bind_to_vm(vm_id);
                true
            }
            None => false,
        }
    }

    /// Starts the broker, submitting the VMs right away.
    pub fn start(&mut self) {
        self.ctx.emit_self_now(BrokerStart {});
    }

    /// Schedules destruction of the VM after the specified delay.
    pub fn destroy_vm_at(&mut self, vm_id: u32, delay: f64) -> Result<(), CloudError> {
        check_delay(delay)?;
        self.ctx.emit_self(DestroyVm { vm_id }, delay);
        Ok(())
    }

    /// Schedules cancellation of the cloudlet after the specified delay.
    pub fn cancel_cloudlet_at(&mut self, cloudlet_id: u32, delay: f64) -> Result<(), CloudError> {
        check_delay(delay)?;
        self.ctx.emit_self(CancelCloudlet { cloudlet_id }, delay);
        Ok(())
    }

    /// Returns the cloudlets received so far in the order of their return.
    pub fn received_cloudlets(&self) -> &[Cloudlet] {
        &self.received
    }

    pub fn records(&self) -> Vec<CloudletRecord> {
        self.received.iter().map(CloudletRecord::from).collect()
    }

    /// Returns the ids of VMs which were created in some datacenter.
    pub fn created_vms(&self) -> &[u32] {
        &self.created_vms
    }

    /// Returns the ids of VMs which no datacenter could create.
    pub fn failed_vms(&self) -> &[u32] {
        &self.failed_vms
    }

    /// Returns the ids of VMs which are created and not destroyed yet.
    pub fn active_vms(&self) -> Vec<u32> {
        self.active_vms.keys().copied().collect()
    }

    /// Returns the datacenter hosting the VM.
    pub fn vm_datacenter(&self, vm_id: u32) -> Option<Id> {
        self.active_vms.get(&vm_id).copied()
    }

    /// Returns the number of submitted cloudlets which are not returned yet.
    pub fn awaiting_cloudlet_count(&self) -> usize {
        self.awaiting_cloudlets.len()
    }

    fn on_start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        if self.datacenters.is_empty() {
            log_warn!(self.ctx, "no datacenters available");
        }
        log_info!(
            self.ctx,
            "started with {} vms and {} cloudlets",
            self.vms.len(),
            self.cloudlets.len()
        );
        let mut seen = BTreeSet::new();
        for mut vm in std::mem::take(&mut self.vms) {
            if !seen.insert(vm.id) {
                log_warn!(self.ctx, "duplicate vm #{} is ignored", vm.id);
                self.failed_vms.push(vm.id);
                continue;
            }
            vm.broker_id = self.id;
            self.request_vm(vm, 0);
        }
        self.try_submit_cloudlets();
    }

    fn request_vm(&mut self, vm: VmSpec, datacenter_idx: usize) {
        match self.datacenters.get(datacenter_idx) {
            Some(&datacenter_id) => {
                self.pending_vms.insert(vm.id, (vm.clone(), datacenter_idx));
                self.ctx
                    .emit(VmCreateRequest { vm }, datacenter_id, self.sim_config.message_delay);
            }
            None => {
                log_warn!(self.ctx, "vm #{} could not be created in any datacenter", vm.id);
                self.failed_vms.push(vm.id);
            }
        }
    }

    fn on_vm_create_ack(&mut self, vm_id: u32, datacenter_id: Id, host_id: Option<u32>, status: AckStatus) {
        let (vm, datacenter_idx) = match self.pending_vms.shift_remove(&vm_id) {
            Some(pending) => pending,
            None => {
                log_warn!(self.ctx, "unexpected ack for vm #{}", vm_id);
                return;
            }
        };
        match status {
            AckStatus::Ok => {
                log_debug!(
                    self.ctx,
                    "vm #{} is created in {} on host #{}",
                    vm_id,
                    self.ctx.lookup_name(datacenter_id),
                    host_id.unwrap_or_default()
                );
                self.active_vms.insert(vm_id, datacenter_id);
                self.created_vms.push(vm_id);
            }
            AckStatus::Failed => {
                log_debug!(
                    self.ctx,
                    "failed to create vm #{} in {}",
                    vm_id,
                    self.ctx.lookup_name(datacenter_id)
                );
                self.request_vm(vm, datacenter_idx + 1);
            }
        }
        self.try_submit_cloudlets();
    }

    fn try_submit_cloudlets(&mut self) {
        if self.cloudlets_submitted || !self.pending_vms.is_empty() {
            return;
        }
        self.cloudlets_submitted = true;

        let vm_ids: Vec<u32> = self.active_vms.keys().copied().collect();
        let mut next_vm = 0;
        let time = self.ctx.time();
        for mut cloudlet in std::mem::take(&mut self.cloudlets) {
            cloudlet.broker_id = self.id;
            let vm_id = match cloudlet.vm_id() {
                Some(vm_id) => vm_id,
                None if !vm_ids.is_empty() => {
                    let vm_id = vm_ids[next_vm % vm_ids.len()];
                    next_vm += 1;
                    cloudlet.bind_to_vm(vm_id);
                    vm_id
                }
                None => {
                    log_warn!(self.ctx, "cloudlet #{} failed: no vms were created", cloudlet.id);
                    cloudlet.reject(time);
                    self.received.push(cloudlet);
                    continue;
                }
            };
            // cloudlets bound to missing VMs are still submitted and come back failed
            let datacenter_id = match self.active_vms.get(&vm_id).or_else(|| self.datacenters.first()) {
                Some(&datacenter_id) => datacenter_id,
                None => {
                    log_warn!(self.ctx, "cloudlet #{} failed: no datacenters available", cloudlet.id);
                    cloudlet.reject(time);
                    self.received.push(cloudlet);
                    continue;
                }
            };
            log_debug!(
                self.ctx,
                "submitting cloudlet #{} to vm #{} in {}",
                cloudlet.id,
                vm_id,
                self.ctx.lookup_name(datacenter_id)
            );
            self.awaiting_cloudlets.insert(cloudlet.id, datacenter_id);
            self.ctx
                .emit(CloudletSubmit { cloudlet }, datacenter_id, self.sim_config.message_delay);
        }
        self.check_completion();
    }

    fn on_cloudlet_return(&mut self, cloudlet: Cloudlet) {
        if self.awaiting_cloudlets.shift_remove(&cloudlet.id).is_none() {
            log_warn!(self.ctx, "unexpected return of cloudlet #{}", cloudlet.id);
        }
        log_debug!(
            self.ctx,
            "cloudlet #{} returned with status {}",
            cloudlet.id,
            cloudlet.status()
        );
        self.received.push(cloudlet);
        self.check_completion();
    }

    fn check_completion(&mut self) {
        if !self.cloudlets_submitted || !self.awaiting_cloudlets.is_empty() {
            return;
        }
        log_info!(self.ctx, "all {} cloudlets received", self.received.len());
        let vm_ids: Vec<u32> = self.active_vms.keys().copied().collect();
        for vm_id in vm_ids {
            self.request_vm_destruction(vm_id);
        }
    }

    fn request_vm_destruction(&mut self, vm_id: u32) {
        if let Some(datacenter_id) = self.active_vms.shift_remove(&vm_id) {
            self.ctx
                .emit(VmDestroyRequest { vm_id }, datacenter_id, self.sim_config.message_delay);
        }
    }

    fn on_destroy_vm(&mut self, vm_id: u32) {
        if self.active_vms.contains_key(&vm_id) {
            log_debug!(self.ctx, "destroying vm #{}", vm_id);
            self.request_vm_destruction(vm_id);
        } else {
            log_debug!(self.ctx, "vm #{} is not active, nothing to destroy", vm_id);
        }
    }

    fn on_vm_destroy_ack(&mut self, vm_id: u32, status: AckStatus) {
        match status {
            AckStatus::Ok => log_debug!(self.ctx, "vm #{} is destroyed", vm_id),
            AckStatus::Failed => log_debug!(self.ctx, "vm #{} was already destroyed", vm_id),
        }
    }

    fn on_cancel_cloudlet(&mut self, cloudlet_id: u32) {
        match self.awaiting_cloudlets.get(&cloudlet_id) {
            Some(&datacenter_id) => {
                log_debug!(self.ctx, "canceling cloudlet #{}", cloudlet_id);
                self.ctx
                    .emit(CloudletCancel { cloudlet_id }, datacenter_id, self.sim_config.message_delay);
            }
            None => {
                log_debug!(self.ctx, "cloudlet #{} is not awaited, nothing to cancel", cloudlet_id);
            }
        }
    }

    fn on_simulation_end(&mut self) {
        log_info!(
            self.ctx,
            "simulation ended: {} cloudlets received, {} still awaited",
            self.received.len(),
            self.awaiting_cloudlets.len()
        );
    }
}

fn check_delay(delay: f64) -> Result<(), CloudError> {
    if delay >= 0. && delay.is_finite() {
        Ok(())
    } else {
        Err(CloudError::Config(format!("invalid delay {}", delay)))
    }
}

impl EventHandler for DatacenterBroker {
    fn on(&mut self, event: Event) -> Result<(), SimulationError> {
        cast!(match event.data {
            BrokerStart {} => {
                self.on_start();
            }
            VmCreateAck {
                vm_id,
                datacenter_id,
                host_id,
                status,
            } => {
                self.on_vm_create_ack(vm_id, datacenter_id, host_id, status);
            }
            VmDestroyAck {
                vm_id,
                datacenter_id: _,
                status,
            } => {
                self.on_vm_destroy_ack(vm_id, status);
            }
            CloudletReturn { cloudlet } => {
                self.on_cloudlet_return(cloudlet);
            }
            DestroyVm { vm_id } => {
                self.on_destroy_vm(vm_id);
            }
            CancelCloudlet { cloudlet_id } => {
                self.on_cancel_cloudlet(cloudlet_id);
            }
            SimulationEnd {} => {
                self.on_simulation_end();
            }
        })
    }
}
