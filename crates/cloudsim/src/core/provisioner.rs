//! Provisioners enforcing host capacity for a single resource dimension.

use std::collections::BTreeMap;

use crate::core::error::{CloudError, ResourceKind};
use crate::core::vm::VmUid;

/// Tracks allocation of one host resource (RAM, bandwidth, storage) to virtual machines.
pub trait ResourceProvisioner {
    /// Returns the resource dimension managed by the provisioner.
    fn kind(&self) -> ResourceKind;

    /// Returns the total capacity.
    fn capacity(&self) -> u64;

    /// Returns the amount allocated to all VMs.
    fn allocated(&self) -> u64;

    /// Returns the amount allocated to the specified VM.
    fn allocated_for_vm(&self, vm: VmUid) -> u64;

    /// Reserves the specified amount for the VM, replacing its previous reservation.
    fn allocate_for_vm(&mut self, vm: VmUid, amount: u64) -> Result<(), CloudError>;

    /// Releases the reservation of the VM. Does nothing if the VM holds no reservation.
    fn deallocate_for_vm(&mut self, vm: VmUid);

    /// Returns the amount which is not allocated to any VM.
    fn available(&self) -> u64 {
        self.capacity() - self.allocated()
    }

    /// Checks whether the VM reservation of the specified size could be made.
    fn is_suitable_for_vm(&self, vm: VmUid, amount: u64) -> bool {
        amount <= self.available() + self.allocated_for_vm(vm)
    }
}

/// Provisioner performing exact reservations without oversubscription.
#[derive(Clone, Debug)]
pub struct SimpleProvisioner {
    kind: ResourceKind,
    capacity: u64,
    allocated: u64,
    allocations: BTreeMap<VmUid, u64>,
}

impl SimpleProvisioner {
    pub fn new(kind: ResourceKind, capacity: u64) -> Self {
        Self {
            kind,
            capacity,
            allocated: 0,
            allocations: BTreeMap::new(),
        }
    }
}

impl ResourceProvisioner for SimpleProvisioner {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn allocated(&self) -> u64 {
        self.allocated
    }

    fn allocated_for_vm(&self, vm: VmUid) -> u64 {
        self.allocations.get(&vm).copied().unwrap_or(0)
    }

    fn allocate_for_vm(&mut self, vm: VmUid, amount: u64) -> Result<(), CloudError> {
        if !self.is_suitable_for_vm(vm, amount) {
            return Err(CloudError::InsufficientCapacity {
                resource: self.kind,
                vm_id: vm.vm_id,
                requested: amount as f64,
                available: (self.available() + self.allocated_for_vm(vm)) as f64,
            });
        }
        self.deallocate_for_vm(vm);
        self.allocated += amount;
        self.allocations.insert(vm, amount);
        Ok(())
    }

    fn deallocate_for_vm(&mut self, vm: VmUid) {
        if let Some(amount) = self.allocations.remove(&vm) {
            self.allocated -= amount;
        }
    }
}

/// Tracks the processing capacity (MIPS) of a single PE given to virtual machines.
///
/// A VM may hold several shares of the same PE when its virtual cores are mapped onto one physical core.
#[derive(Clone, Debug)]
pub struct PeProvisioner {
    mips: f64,
    allocated: f64,
    allocations: BTreeMap<VmUid, f64>,
}

impl PeProvisioner {
    pub fn new(mips: f64) -> Self {
        Self {
            mips,
            allocated: 0.,
            allocations: BTreeMap::new(),
        }
    }

    pub fn mips(&self) -> f64 {
        self.mips
    }

    pub fn allocated_mips(&self) -> f64 {
        self.allocated
    }

    pub fn available_mips(&self) -> f64 {
        (self.mips - self.allocated).max(0.)
    }

    pub fn allocated_mips_for_vm(&self, vm: VmUid) -> f64 {
        self.allocations.get(&vm).copied().unwrap_or(0.)
    }

    /// Adds the specified share of the PE to the VM.
    pub fn allocate_mips_for_vm(&mut self, vm: VmUid, mips: f64) -> Result<(), CloudError> {
        if mips > self.available_mips() + MIPS_TOLERANCE {
            return Err(CloudError::InsufficientCapacity {
                resource: ResourceKind::Mips,
                vm_id: vm.vm_id,
                requested: mips,
                available: self.available_mips(),
            });
        }
        self.allocated += mips;
        *self.allocations.entry(vm).or_insert(0.) += mips;
        Ok(())
    }

    pub fn deallocate_mips_for_vm(&mut self, vm: VmUid) {
        if let Some(mips) = self.allocations.remove(&vm) {
            self.allocated -= mips;
        }
        if self.allocations.is_empty() {
            self.allocated = 0.;
        }
    }

    pub fn deallocate_all(&mut self) {
        self.allocations.clear();
        self.allocated = 0.;
    }
}

/// Absolute tolerance for comparing MIPS amounts.
pub const MIPS_TOLERANCE: f64 = 1e-9;
