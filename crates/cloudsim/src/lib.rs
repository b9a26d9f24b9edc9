//! Simulation of IaaS clouds at the level of datacenters, hosts, virtual machines and cloudlets.
//!
//! A [`Datacenter`](core::datacenter::Datacenter) owns a pool of hosts and places requested VMs on them using a
//! [`VmAllocationPolicy`](core::vm_allocation_policy::VmAllocationPolicy). A
//! [`DatacenterBroker`](core::broker::DatacenterBroker) submits VMs and cloudlets on behalf of a user and collects the
//! finished cloudlets. [`CloudSimulation`](simulation::CloudSimulation) wires these components into the
//! discrete-event engine from `cloudsim-core`.

pub mod core;
pub mod simulation;
