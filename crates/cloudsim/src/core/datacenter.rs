//! Datacenter component processing VM and cloudlet requests.

use std::collections::BTreeMap;
use std::rc::Rc;

use cloudsim_core::{cast, log_debug, log_info, log_warn};
use cloudsim_core::{Event, EventHandler, EventId, Id, SimulationContext, SimulationEnd, SimulationError};

use crate::core::characteristics::DatacenterCharacteristics;
use crate::core::cloudlet::{Cloudlet, CloudletStatus};
use crate::core::config::{DatacenterConfig, SimulationConfig};
use crate::core::error::CloudError;
use crate::core::events::cloudlet::{CloudletCancel, CloudletReturn, CloudletSubmit};
use crate::core::events::datacenter::UpdateProcessing;
use crate::core::events::vm::{AckStatus, VmCreateAck, VmCreateRequest, VmDestroyAck, VmDestroyRequest};
use crate::core::host::Host;
use crate::core::vm::{VirtualMachine, VmSpec, VmUid};
use crate::core::vm_allocation_policy::VmAllocationPolicy;

/// Represents datacenter, a component owning a pool of hosts.
///
/// Datacenter places VMs requested by brokers on its hosts, runs the submitted cloudlets on the VMs and returns the
/// finished cloudlets to their brokers. VMs are identified by the pair of owning broker and VM id, so a broker can
/// neither see nor use VMs of other brokers. The progress of cloudlets is recomputed on every request and at the
/// estimated completion time of the next cloudlet.
pub struct Datacenter {
    pub id: Id,
    characteristics: DatacenterCharacteristics,
    hosts: BTreeMap<u32, Host>,
    vms: BTreeMap<VmUid, VirtualMachine>,
    allocation_policy: Box<dyn VmAllocationPolicy>,
    scheduling_interval: f64,
    next_update: Option<(EventId, f64)>,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl Datacenter {
    pub fn new(
        config: &DatacenterConfig,
        allocation_policy: Box<dyn VmAllocationPolicy>,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Result<Self, CloudError> {
        config.validate()?;
        let hosts = config
            .hosts
            .iter()
            .map(|spec| (spec.id, Host::time_shared(spec, config.allow_mips_oversubscription)))
            .collect();
        Ok(Self {
            id: ctx.id(),
            characteristics: config.characteristics.clone(),
            hosts,
            vms: BTreeMap::new(),
            allocation_policy,
            scheduling_interval: config.scheduling_interval,
            next_update: None,
            ctx,
            sim_config,
        })
    }

    pub fn characteristics(&self) -> &DatacenterCharacteristics {
        &self.characteristics
    }

    pub fn hosts(&self) -> &BTreeMap<u32, Host> {
        &self.hosts
    }

    pub fn host(&self, host_id: u32) -> Option<&Host> {
        self.hosts.get(&host_id)
    }

    /// Returns the VMs currently placed in the datacenter.
    pub fn vms(&self) -> &BTreeMap<VmUid, VirtualMachine> {
        &self.vms
    }

    pub fn vm(&self, vm: VmUid) -> Option<&VirtualMachine> {
        self.vms.get(&vm)
    }

    /// Returns the id of host where the VM is placed.
    pub fn vm_host(&self, vm: VmUid) -> Option<u32> {
        self.vms.get(&vm).and_then(|vm| vm.host_id())
    }

    fn on_vm_create_request(&mut self, mut vm: VmSpec, src: Id) {
        vm.broker_id = src;
        let vm_id = vm.id;
        let uid = vm.uid();
        if self.vms.contains_key(&uid) {
            log_warn!(self.ctx, "vm #{} already exists", uid);
            self.send_vm_create_ack(vm_id, None, AckStatus::Failed, src);
            return;
        }
        if vm.cores == 0 || !(vm.mips > 0.) {
            log_warn!(self.ctx, "vm #{} has invalid resource request", vm_id);
            self.send_vm_create_ack(vm_id, None, AckStatus::Failed, src);
            return;
        }

        self.update_processing();
        match self.allocation_policy.allocate_host_for_vm(&vm, &mut self.hosts) {
            Ok(host_id) => {
                let mut vm = VirtualMachine::from_spec(vm);
                vm.set_host(Some(host_id));
                self.vms.insert(uid, vm);
                self.refresh_host_allocations(host_id);
                log_debug!(self.ctx, "vm #{} is placed on host #{}", uid, host_id);
                self.send_vm_create_ack(vm_id, Some(host_id), AckStatus::Ok, src);
            }
            Err(e) => {
                log_debug!(self.ctx, "failed to create vm #{}: {}", uid, e);
                self.send_vm_create_ack(vm_id, None, AckStatus::Failed, src);
            }
        }
        self.update_processing();
    }

    fn send_vm_create_ack(&mut self, vm_id: u32, host_id: Option<u32>, status: AckStatus, dst: Id) {
        self.ctx.emit(
            VmCreateAck {
                vm_id,
                datacenter_id: self.id,
                host_id,
                status,
            },
            dst,
            self.sim_config.message_delay,
        );
    }

    fn on_vm_destroy_request(&mut self, vm_id: u32, src: Id) {
        let uid = VmUid::new(src, vm_id);
        if !self.vms.contains_key(&uid) {
            log_debug!(self.ctx, "vm #{} is not placed, nothing to destroy", uid);
            self.send_vm_destroy_ack(vm_id, AckStatus::Failed, src);
            return;
        }

        self.update_processing();
        if let Some(mut vm) = self.vms.remove(&uid) {
            let time = self.ctx.time();
            for cloudlet in vm.cloudlet_scheduler_mut().fail_all(time) {
                log_debug!(self.ctx, "cloudlet #{} failed due to destruction of vm #{}", cloudlet.id, uid);
                self.return_cloudlet(cloudlet);
            }
            if let Some(host_id) = vm.host_id() {
                self.allocation_policy
                    .deallocate_host_for_vm(uid, host_id, &mut self.hosts);
                self.refresh_host_allocations(host_id);
            }
            vm.set_host(None);
            log_debug!(self.ctx, "vm #{} is destroyed", uid);
        }
        self.send_vm_destroy_ack(vm_id, AckStatus::Ok, src);
        self.update_processing();
    }

    fn send_vm_destroy_ack(&mut self, vm_id: u32, status: AckStatus, dst: Id) {
        self.ctx.emit(
            VmDestroyAck {
                vm_id,
                datacenter_id: self.id,
                status,
            },
            dst,
            self.sim_config.message_delay,
        );
    }

    fn on_cloudlet_submit(&mut self, mut cloudlet: Cloudlet) {
        let time = self.ctx.time();
        cloudlet.set_submitted(self.id, time);
        let uid = cloudlet
            .vm_id()
            .map(|vm_id| VmUid::new(cloudlet.broker_id, vm_id))
            .filter(|uid| self.vms.contains_key(uid));
        match uid {
            Some(uid) => {
                self.update_processing();
                if let Some(vm) = self.vms.get_mut(&uid) {
                    log_debug!(self.ctx, "cloudlet #{} is submitted to vm #{}", cloudlet.id, uid);
                    vm.cloudlet_scheduler_mut().submit(cloudlet, time);
                }
                self.update_processing();
            }
            None => {
                let e = CloudError::UnboundCloudlet {
                    cloudlet_id: cloudlet.id,
                    vm_id: cloudlet.vm_id(),
                };
                log_warn!(self.ctx, "{}", e);
                cloudlet.finish(CloudletStatus::Failed, time);
                self.return_cloudlet(cloudlet);
            }
        }
    }

    fn on_cloudlet_cancel(&mut self, cloudlet_id: u32, src: Id) {
        let uid = self
            .vms
            .iter()
            .find(|(uid, vm)| {
                uid.broker_id == src
                    && vm
                        .cloudlet_scheduler()
                        .cloudlet_status(cloudlet_id)
                        .map_or(false, |status| !status.is_terminal())
            })
            .map(|(&uid, _)| uid);
        let uid = match uid {
            Some(uid) => uid,
            None => {
                log_debug!(self.ctx, "cloudlet #{} is not running, nothing to cancel", cloudlet_id);
                return;
            }
        };

        self.update_processing();
        let time = self.ctx.time();
        let canceled = self
            .vms
            .get_mut(&uid)
            .and_then(|vm| vm.cloudlet_scheduler_mut().cancel(cloudlet_id, time));
        if let Some(cloudlet) = canceled {
            log_debug!(self.ctx, "cloudlet #{} is canceled", cloudlet_id);
            self.return_cloudlet(cloudlet);
        }
        self.update_processing();
    }

    fn refresh_host_allocations(&mut self, host_id: u32) {
        if let Some(host) = self.hosts.get(&host_id) {
            for uid in host.vms().iter() {
                if let Some(vm) = self.vms.get_mut(uid) {
                    vm.set_allocated_mips(host.allocated_mips_for_vm(*uid));
                }
            }
        }
    }

    /// Advances cloudlets progress on all VMs, returns finished cloudlets and schedules the next recomputation.
    fn update_processing(&mut self) {
        let time = self.ctx.time();
        let mut next_delay: Option<f64> = None;
        let mut finished = Vec::new();
        for vm in self.vms.values_mut() {
            if let Some(delay) = vm.update_processing(time) {
                next_delay = Some(next_delay.map_or(delay, |d: f64| d.min(delay)));
            }
            for mut cloudlet in vm.cloudlet_scheduler_mut().take_finished() {
                if cloudlet.status() == CloudletStatus::Success {
                    let finish_time = cloudlet.finish_time().unwrap_or(time);
                    let ram = vm.spec.ram as f64 * cloudlet.utilization_of_ram(finish_time);
                    let cost = self.characteristics.cloudlet_cost(
                        cloudlet.actual_cpu_time(),
                        ram,
                        cloudlet.file_size() as f64,
                        (cloudlet.file_size() + cloudlet.output_size()) as f64,
                    );
                    cloudlet.set_cost(cost);
                }
                finished.push(cloudlet);
            }
        }
        for cloudlet in finished {
            log_debug!(self.ctx, "cloudlet #{} finished with status {}", cloudlet.id, cloudlet.status());
            self.return_cloudlet(cloudlet);
        }
        self.schedule_update(next_delay);
    }

    fn schedule_update(&mut self, delay: Option<f64>) {
        let delay = delay.map(|delay| {
            let mut delay = delay.max(self.sim_config.min_time_between_events);
            if self.scheduling_interval > 0. {
                delay = delay.min(self.scheduling_interval.max(self.sim_config.min_time_between_events));
            }
            delay
        });
        let time = self.ctx.time();
        match (delay, self.next_update) {
            (Some(delay), Some((_, next_time))) if next_time == time + delay => {}
            (delay, next_update) => {
                if let Some((event_id, _)) = next_update {
                    self.ctx.cancel_event(event_id);
                }
                self.next_update = delay.map(|delay| (self.ctx.emit_self(UpdateProcessing {}, delay), time + delay));
            }
        }
    }

    fn return_cloudlet(&mut self, cloudlet: Cloudlet) {
        let broker_id = cloudlet.broker_id;
        self.ctx.emit(CloudletReturn { cloudlet }, broker_id, self.sim_config.message_delay);
    }

    fn on_simulation_end(&mut self) {
        if let Some((event_id, _)) = self.next_update.take() {
            self.ctx.cancel_event(event_id);
        }
        let running: usize = self
            .vms
            .values()
            .map(|vm| vm.cloudlet_scheduler().cloudlet_count())
            .sum();
        log_info!(
            self.ctx,
            "simulation ended with {} vms and {} unfinished cloudlets",
            self.vms.len(),
            running
        );
    }
}

impl EventHandler for Datacenter {
    fn on(&mut self, event: Event) -> Result<(), SimulationError> {
        let src = event.src;
        cast!(match event.data {
            VmCreateRequest { vm } => {
                self.on_vm_create_request(vm, src);
            }
            VmDestroyRequest { vm_id } => {
                self.on_vm_destroy_request(vm_id, src);
            }
            CloudletSubmit { cloudlet } => {
                self.on_cloudlet_submit(cloudlet);
            }
            CloudletCancel { cloudlet_id } => {
                self.on_cloudlet_cancel(cloudlet_id, src);
            }
            UpdateProcessing {} => {
                self.next_update = None;
                self.update_processing();
            }
            SimulationEnd {} => {
                self.on_simulation_end();
            }
        })
    }
}
