//! Host-level schedulers dividing PE capacity among resident virtual machines.

use std::collections::BTreeMap;

use crate::core::error::{CloudError, ResourceKind};
use crate::core::pe::Pe;
use crate::core::provisioner::MIPS_TOLERANCE;
use crate::core::vm::VmUid;

/// Divides `capacity` among consumers proportionally to their requests.
///
/// If the total request fits into the capacity, every consumer gets its full request. Otherwise the shares sum up to
/// the capacity exactly, and the floating-point remainder goes to the consumer with the lowest id.
pub fn fair_shares<K, I>(capacity: f64, requests: I) -> BTreeMap<K, f64>
where
    K: Ord + Copy,
    I: IntoIterator<Item = (K, f64)>,
{
    let requests: BTreeMap<K, f64> = requests.into_iter().collect();
    let total: f64 = requests.values().sum();
    if total <= capacity + MIPS_TOLERANCE {
        return requests;
    }
    let mut shares: BTreeMap<K, f64> = requests
        .iter()
        .map(|(&id, &request)| (id, capacity * request / total))
        .collect();
    let remainder = capacity - shares.values().sum::<f64>();
    if let Some(first) = shares.values_mut().next() {
        *first += remainder;
    }
    shares
}

/// Trait for policies sharing host PEs among virtual machines.
///
/// The host owns its PEs and passes them to the scheduler on every call.
pub trait VmScheduler {
    /// Checks whether the VM demand can be served by the host PEs.
    fn is_suitable_for_vm(&self, pes: &[Pe], vm: VmUid, mips_per_core: f64, cores: u32) -> Result<(), CloudError>;

    /// Adds the VM to the scheduler and recomputes the allocations of all resident VMs.
    fn allocate_pes_for_vm(
        &mut self,
        pes: &mut [Pe],
        vm: VmUid,
        mips_per_core: f64,
        cores: u32,
    ) -> Result<(), CloudError>;

    /// Removes the VM from the scheduler and recomputes the allocations of the remaining VMs.
    fn deallocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid);

    /// Returns the MIPS currently allocated to each virtual core of the VM.
    fn allocated_mips_for_vm(&self, vm: VmUid) -> Vec<f64>;

    /// Returns the total MIPS currently allocated to each resident VM.
    fn allocations(&self) -> BTreeMap<VmUid, f64>;

    /// Returns the total MIPS requested by resident VMs.
    fn requested_mips(&self) -> f64;
}

#[derive(Clone, Copy, Debug)]
struct VmRequest {
    mips_per_core: f64,
    cores: u32,
}

impl VmRequest {
    fn total(&self) -> f64 {
        self.mips_per_core * self.cores as f64
    }
}

/// Time-shared VM scheduler.
///
/// VMs receive their full request while the host is not oversubscribed, otherwise the host capacity is divided
/// proportionally to the requests.
pub struct VmSchedulerTimeShared {
    allow_oversubscription: bool,
    requests: BTreeMap<VmUid, VmRequest>,
    allocations: BTreeMap<VmUid, Vec<f64>>,
}

impl VmSchedulerTimeShared {
    pub fn new(allow_oversubscription: bool) -> Self {
        Self {
            allow_oversubscription,
            requests: BTreeMap::new(),
            allocations: BTreeMap::new(),
        }
    }

    fn redistribute(&mut self, pes: &mut [Pe]) {
        let capacity: f64 = pes.iter().map(|pe| pe.mips()).sum();
        let shares = fair_shares(capacity, self.requests.iter().map(|(&id, r)| (id, r.total())));

        self.allocations.clear();
        for pe in pes.iter_mut() {
            pe.provisioner_mut().deallocate_all();
        }

        // virtual cores are mapped onto PEs in order, a core may span two PEs
        let mut pe_idx = 0;
        for (vm, share) in shares {
            let cores = self.requests[&vm].cores;
            let per_core = share / cores as f64;
            self.allocations.insert(vm, vec![per_core; cores as usize]);
            for _ in 0..cores {
                let mut remaining = per_core;
                while remaining > MIPS_TOLERANCE && pe_idx < pes.len() {
                    let amount = remaining.min(pes[pe_idx].provisioner().available_mips());
                    if amount > MIPS_TOLERANCE {
                        if pes[pe_idx].provisioner_mut().allocate_mips_for_vm(vm, amount).is_err() {
                            break;
                        }
                        remaining -= amount;
                    }
                    if pes[pe_idx].provisioner().available_mips() <= MIPS_TOLERANCE {
                        pe_idx += 1;
                    }
                }
            }
        }
    }
}

impl VmScheduler for VmSchedulerTimeShared {
    fn is_suitable_for_vm(&self, pes: &[Pe], vm: VmUid, mips_per_core: f64, cores: u32) -> Result<(), CloudError> {
        let suitable_pes = pes
            .iter()
            .filter(|pe| pe.mips() + MIPS_TOLERANCE >= mips_per_core)
            .count();
        if (suitable_pes as u32) < cores {
            return Err(CloudError::InsufficientCapacity {
                resource: ResourceKind::Pes,
                vm_id: vm.vm_id,
                requested: cores as f64,
                available: suitable_pes as f64,
            });
        }
        if !self.allow_oversubscription {
            let capacity: f64 = pes.iter().map(|pe| pe.mips()).sum();
            let requested_by_others: f64 = self
                .requests
                .iter()
                .filter(|(&id, _)| id != vm)
                .map(|(_, r)| r.total())
                .sum();
            let available = (capacity - requested_by_others).max(0.);
            let requested = mips_per_core * cores as f64;
            if requested > available + MIPS_TOLERANCE {
                return Err(CloudError::InsufficientCapacity {
                    resource: ResourceKind::Mips,
                    vm_id: vm.vm_id,
                    requested,
                    available,
                });
            }
        }
        Ok(())
    }

    fn allocate_pes_for_vm(
        &mut self,
        pes: &mut [Pe],
        vm: VmUid,
        mips_per_core: f64,
        cores: u32,
    ) -> Result<(), CloudError> {
        self.is_suitable_for_vm(pes, vm, mips_per_core, cores)?;
        self.requests.insert(vm, VmRequest { mips_per_core, cores });
        self.redistribute(pes);
        Ok(())
    }

    fn deallocate_pes_for_vm(&mut self, pes: &mut [Pe], vm: VmUid) {
        if self.requests.remove(&vm).is_some() {
            self.redistribute(pes);
        }
    }

    fn allocated_mips_for_vm(&self, vm: VmUid) -> Vec<f64> {
        self.allocations.get(&vm).cloned().unwrap_or_default()
    }

    fn allocations(&self) -> BTreeMap<VmUid, f64> {
        self.allocations
            .iter()
            .map(|(&id, mips)| (id, mips.iter().sum()))
            .collect()
    }

    fn requested_mips(&self) -> f64 {
        self.requests.values().map(|r| r.total()).sum()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::pe::PeStatus;

    fn uid(vm_id: u32) -> VmUid {
        VmUid::new(0, vm_id)
    }

    fn make_pes(count: u32, mips: f64) -> Vec<Pe> {
        (0..count).map(|id| Pe::new(id, mips)).collect()
    }

    #[test]
    fn test_fair_shares_without_contention() {
        let shares = fair_shares(1000., vec![(2, 300.), (1, 500.)]);
        assert_eq!(shares[&1], 500.);
        assert_eq!(shares[&2], 300.);
    }

    #[test]
    fn test_fair_shares_are_proportional() {
        let shares = fair_shares(1000., vec![(1, 3000.), (2, 1000.)]);
        assert_abs_diff_eq!(shares[&1], 750., epsilon = 1e-9);
        assert_abs_diff_eq!(shares[&2], 250., epsilon = 1e-9);
    }

    #[test]
    fn test_fair_shares_sum_to_capacity() {
        let shares = fair_shares(1000., vec![(5, 1000.), (3, 1000.), (9, 1000.)]);
        assert_abs_diff_eq!(shares.values().sum::<f64>(), 1000., epsilon = 1e-9);
        assert_eq!(shares[&5], shares[&9]);
    }

    #[test]
    fn test_two_full_vms_get_half_each() {
        let mut pes = make_pes(1, 1000.);
        let mut scheduler = VmSchedulerTimeShared::new(true);
        scheduler.allocate_pes_for_vm(&mut pes, uid(0), 1000., 1).unwrap();
        assert_eq!(scheduler.allocated_mips_for_vm(uid(0)), vec![1000.]);

        scheduler.allocate_pes_for_vm(&mut pes, uid(1), 1000., 1).unwrap();
        assert_eq!(scheduler.allocated_mips_for_vm(uid(0)), vec![500.]);
        assert_eq!(scheduler.allocated_mips_for_vm(uid(1)), vec![500.]);
        assert_eq!(scheduler.allocations().values().sum::<f64>(), 1000.);
        assert_eq!(pes[0].provisioner().allocated_mips_for_vm(uid(1)), 500.);

        scheduler.deallocate_pes_for_vm(&mut pes, uid(0));
        assert_eq!(scheduler.allocated_mips_for_vm(uid(1)), vec![1000.]);
        assert!(scheduler.allocated_mips_for_vm(uid(0)).is_empty());
    }

    #[test]
    fn test_multicore_vm_spans_pes() {
        let mut pes = make_pes(4, 1000.);
        let mut scheduler = VmSchedulerTimeShared::new(true);
        scheduler.allocate_pes_for_vm(&mut pes, uid(0), 500., 3).unwrap();
        assert_eq!(scheduler.allocated_mips_for_vm(uid(0)), vec![500., 500., 500.]);
        assert_eq!(pes[0].status(), PeStatus::Busy);
        assert_eq!(pes[1].status(), PeStatus::Busy);
        assert_eq!(pes[2].status(), PeStatus::Free);
        assert_eq!(scheduler.requested_mips(), 1500.);
    }

    #[test]
    fn test_vm_needs_enough_fast_pes() {
        let pes = make_pes(2, 1000.);
        let scheduler = VmSchedulerTimeShared::new(true);
        assert!(scheduler.is_suitable_for_vm(&pes, uid(0), 1000., 2).is_ok());
        assert!(matches!(
            scheduler.is_suitable_for_vm(&pes, uid(0), 1000., 3),
            Err(CloudError::InsufficientCapacity {
                resource: ResourceKind::Pes,
                ..
            })
        ));
        assert!(scheduler.is_suitable_for_vm(&pes, uid(0), 1500., 1).is_err());
    }

    #[test]
    fn test_no_oversubscription() {
        let mut pes = make_pes(1, 1000.);
        let mut scheduler = VmSchedulerTimeShared::new(false);
        scheduler.allocate_pes_for_vm(&mut pes, uid(0), 600., 1).unwrap();
        assert!(matches!(
            scheduler.allocate_pes_for_vm(&mut pes, uid(1), 600., 1),
            Err(CloudError::InsufficientCapacity {
                resource: ResourceKind::Mips,
                ..
            })
        ));
        assert!(scheduler.allocate_pes_for_vm(&mut pes, uid(1), 400., 1).is_ok());
    }
}
