//! Physical host with its PEs, resource provisioners and VM scheduler.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::error::{CloudError, ResourceKind};
use crate::core::pe::Pe;
use crate::core::provisioner::{ResourceProvisioner, SimpleProvisioner};
use crate::core::vm::{VmSpec, VmUid};
use crate::core::vm_scheduler::{VmScheduler, VmSchedulerTimeShared};

/// Host description used in configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostSpec {
    pub id: u32,
    /// Number of PEs.
    pub pes: u32,
    pub mips_per_pe: f64,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
}

impl HostSpec {
    pub fn new(id: u32, pes: u32, mips_per_pe: f64, ram: u64, bw: u64, storage: u64) -> Self {
        Self {
            id,
            pes,
            mips_per_pe,
            ram,
            bw,
            storage,
        }
    }

    pub fn validate(&self) -> Result<(), CloudError> {
        if self.pes == 0 {
            return Err(CloudError::Config(format!("host #{} has no PEs", self.id)));
        }
        if !(self.mips_per_pe > 0.) {
            return Err(CloudError::Config(format!(
                "host #{} has non-positive PE rating {}",
                self.id, self.mips_per_pe
            )));
        }
        Ok(())
    }
}

/// Represents a physical host.
///
/// Host owns its PEs and provisioners, resident VMs are referenced by id. RAM, bandwidth and storage are reserved
/// exactly, while PE capacity is divided among resident VMs by the VM scheduler.
pub struct Host {
    pub id: u32,
    pes: Vec<Pe>,
    ram: SimpleProvisioner,
    bw: SimpleProvisioner,
    storage: SimpleProvisioner,
    vm_scheduler: Box<dyn VmScheduler>,
    vms: BTreeSet<VmUid>,
}

impl Host {
    pub fn new(spec: &HostSpec, vm_scheduler: Box<dyn VmScheduler>) -> Self {
        Self {
            id: spec.id,
            pes: (0..spec.pes).map(|id| Pe::new(id, spec.mips_per_pe)).collect(),
            ram: SimpleProvisioner::new(ResourceKind::Ram, spec.ram),
            bw: SimpleProvisioner::new(ResourceKind::Bandwidth, spec.bw),
            storage: SimpleProvisioner::new(ResourceKind::Storage, spec.storage),
            vm_scheduler,
            vms: BTreeSet::new(),
        }
    }

    /// Creates host with the time-shared VM scheduler.
    pub fn time_shared(spec: &HostSpec, allow_mips_oversubscription: bool) -> Self {
        Self::new(spec, Box::new(VmSchedulerTimeShared::new(allow_mips_oversubscription)))
    }

    /// Checks that every resource dimension can serve the VM request.
    pub fn is_suitable_for_vm(&self, vm: &VmSpec) -> Result<(), CloudError> {
        let uid = vm.uid();
        let requests = [(&self.ram, vm.ram), (&self.bw, vm.bw), (&self.storage, vm.image_size)];
        for (provisioner, amount) in requests {
            if !provisioner.is_suitable_for_vm(uid, amount) {
                return Err(CloudError::InsufficientCapacity {
                    resource: provisioner.kind(),
                    vm_id: vm.id,
                    requested: amount as f64,
                    available: provisioner.available() as f64,
                });
            }
        }
        self.vm_scheduler.is_suitable_for_vm(&self.pes, uid, vm.mips, vm.cores)
    }

    /// Reserves host resources for the VM. Partial reservations are rolled back on failure.
    pub fn vm_create(&mut self, vm: &VmSpec) -> Result<(), CloudError> {
        self.is_suitable_for_vm(vm)?;
        let uid = vm.uid();
        self.ram.allocate_for_vm(uid, vm.ram)?;
        if let Err(e) = self.bw.allocate_for_vm(uid, vm.bw) {
            self.ram.deallocate_for_vm(uid);
            return Err(e);
        }
        if let Err(e) = self.storage.allocate_for_vm(uid, vm.image_size) {
            self.ram.deallocate_for_vm(uid);
            self.bw.deallocate_for_vm(uid);
            return Err(e);
        }
        if let Err(e) = self
            .vm_scheduler
            .allocate_pes_for_vm(&mut self.pes, uid, vm.mips, vm.cores)
        {
            self.ram.deallocate_for_vm(uid);
            self.bw.deallocate_for_vm(uid);
            self.storage.deallocate_for_vm(uid);
            return Err(e);
        }
        self.vms.insert(uid);
        Ok(())
    }

    /// Releases all resources held by the VM. Does nothing if the VM is not resident.
    pub fn vm_destroy(&mut self, vm: VmUid) {
        if !self.vms.remove(&vm) {
            return;
        }
        self.vm_scheduler.deallocate_pes_for_vm(&mut self.pes, vm);
        self.ram.deallocate_for_vm(vm);
        self.bw.deallocate_for_vm(vm);
        self.storage.deallocate_for_vm(vm);
    }

    /// Returns the MIPS allocated to each virtual core of the VM.
    pub fn allocated_mips_for_vm(&self, vm: VmUid) -> Vec<f64> {
        self.vm_scheduler.allocated_mips_for_vm(vm)
    }

    /// Returns the total MIPS allocated to each resident VM.
    pub fn mips_allocations(&self) -> BTreeMap<VmUid, f64> {
        self.vm_scheduler.allocations()
    }

    pub fn total_mips(&self) -> f64 {
        self.pes.iter().map(|pe| pe.mips()).sum()
    }

    /// Returns the MIPS not requested by resident VMs.
    pub fn available_mips(&self) -> f64 {
        (self.total_mips() - self.vm_scheduler.requested_mips()).max(0.)
    }

    pub fn pes(&self) -> &[Pe] {
        &self.pes
    }

    pub fn ram(&self) -> &dyn ResourceProvisioner {
        &self.ram
    }

    pub fn bw(&self) -> &dyn ResourceProvisioner {
        &self.bw
    }

    pub fn storage(&self) -> &dyn ResourceProvisioner {
        &self.storage
    }

    /// Returns the ids of resident VMs.
    pub fn vms(&self) -> &BTreeSet<VmUid> {
        &self.vms
    }

    pub fn has_vm(&self, vm: VmUid) -> bool {
        self.vms.contains(&vm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(vm_id: u32) -> VmUid {
        VmUid::new(0, vm_id)
    }

    fn host() -> Host {
        Host::time_shared(&HostSpec::new(0, 2, 1000., 2048, 10000, 1000000), true)
    }

    #[test]
    fn test_vm_create_and_destroy() {
        let mut host = host();
        let vm = VmSpec::new(3, 1000., 1, 512, 1000, 10000);
        host.vm_create(&vm).unwrap();
        assert!(host.has_vm(uid(3)));
        assert_eq!(host.ram().allocated(), 512);
        assert_eq!(host.storage().available(), 990000);
        assert_eq!(host.allocated_mips_for_vm(uid(3)), vec![1000.]);
        assert_eq!(host.available_mips(), 1000.);

        host.vm_destroy(uid(3));
        assert!(host.vms().is_empty());
        assert_eq!(host.ram().allocated(), 0);
        assert_eq!(host.bw().allocated(), 0);
        assert!(host.allocated_mips_for_vm(uid(3)).is_empty());
        host.vm_destroy(uid(3));
    }

    #[test]
    fn test_failed_create_rolls_back() {
        let mut host = host();
        // fits RAM but needs more PEs than the host has
        let vm = VmSpec::new(0, 1000., 3, 512, 1000, 10000);
        assert!(matches!(
            host.vm_create(&vm),
            Err(CloudError::InsufficientCapacity {
                resource: ResourceKind::Pes,
                ..
            })
        ));
        assert_eq!(host.ram().allocated(), 0);
        assert_eq!(host.bw().allocated(), 0);
        assert_eq!(host.storage().allocated(), 0);
        assert!(!host.has_vm(uid(0)));
    }

    #[test]
    fn test_ram_is_strict() {
        let mut host = host();
        let vm = VmSpec::new(0, 100., 1, 4096, 10, 10);
        assert!(matches!(
            host.is_suitable_for_vm(&vm),
            Err(CloudError::InsufficientCapacity {
                resource: ResourceKind::Ram,
                ..
            })
        ));
        assert!(host.vm_create(&vm).is_err());
        assert!(host.vms().is_empty());
    }

    #[test]
    fn test_same_vm_id_of_different_brokers() {
        let mut host = host();
        let mut first = VmSpec::new(0, 1000., 1, 512, 1000, 10000);
        first.broker_id = 1;
        let mut second = first.clone();
        second.broker_id = 2;
        host.vm_create(&first).unwrap();
        host.vm_create(&second).unwrap();
        assert_eq!(host.vms().len(), 2);
        assert_eq!(host.ram().allocated(), 1024);

        host.vm_destroy(VmUid::new(2, 0));
        assert!(host.has_vm(VmUid::new(1, 0)));
        assert_eq!(host.ram().allocated(), 512);
        assert_eq!(host.allocated_mips_for_vm(VmUid::new(1, 0)), vec![1000.]);
    }

    #[test]
    fn test_invalid_host_parameters() {
        assert!(HostSpec::new(0, 0, 1000., 1, 1, 1).validate().is_err());
        assert!(HostSpec::new(0, 1, 0., 1, 1, 1).validate().is_err());
        assert!(HostSpec::new(0, 1, 1000., 1, 1, 1).validate().is_ok());
    }
}
