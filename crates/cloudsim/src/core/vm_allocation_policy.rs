//! Virtual machine placement policies.

use std::collections::BTreeMap;

use crate::core::error::CloudError;
use crate::core::host::Host;
use crate::core::vm::{VmSpec, VmUid};

/// Trait for implementation of VM placement policies.
///
/// The policy is defined as a function of VM request and current hosts state, which returns an ID of host selected
/// for VM placement or `None` if there is no suitable host. Hosts are always visited in ascending id order, so the
/// same input produces the same placement.
pub trait VmAllocationPolicy {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32>;

    /// Places the VM on the selected host and reserves the host resources.
    fn allocate_host_for_vm(&self, vm: &VmSpec, hosts: &mut BTreeMap<u32, Host>) -> Result<u32, CloudError> {
        let host_id = self
            .select_host(vm, hosts)
            .ok_or(CloudError::PlacementFailed { vm_id: vm.id })?;
        let host = hosts
            .get_mut(&host_id)
            .ok_or(CloudError::PlacementFailed { vm_id: vm.id })?;
        host.vm_create(vm)?;
        Ok(host_id)
    }

    /// Releases the resources reserved for the VM on the host.
    fn deallocate_host_for_vm(&self, vm: VmUid, host_id: u32, hosts: &mut BTreeMap<u32, Host>) {
        if let Some(host) = hosts.get_mut(&host_id) {
            host.vm_destroy(vm);
        }
    }
}

/// Returns the placement policy by its name used in configuration files.
pub fn placement_policy_resolver(name: &str) -> Result<Box<dyn VmAllocationPolicy>, CloudError> {
    match name {
        "FirstFit" => Ok(Box::new(FirstFit::new())),
        "BestFit" => Ok(Box::new(BestFit::new())),
        "WorstFit" => Ok(Box::new(WorstFit::new())),
        _ => Err(CloudError::Config(format!("unknown placement policy: {}", name))),
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Uses the first suitable host.
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmAllocationPolicy for FirstFit {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        hosts
            .values()
            .find(|host| host.is_suitable_for_vm(vm).is_ok())
            .map(|host| host.id)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Uses the suitable host with the least available MIPS.
pub struct BestFit;

impl BestFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmAllocationPolicy for BestFit {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut min_available_mips = f64::INFINITY;
        for host in hosts.values() {
            if host.is_suitable_for_vm(vm).is_ok() && host.available_mips() < min_available_mips {
                min_available_mips = host.available_mips();
                result = Some(host.id);
            }
        }
        result
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Uses the suitable host with the most available MIPS.
pub struct WorstFit;

impl WorstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmAllocationPolicy for WorstFit {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut max_available_mips = f64::NEG_INFINITY;
        for host in hosts.values() {
            if host.is_suitable_for_vm(vm).is_ok() && host.available_mips() > max_available_mips {
                max_available_mips = host.available_mips();
                result = Some(host.id);
            }
        }
        result
    }
}
