pub mod broker;
pub mod characteristics;
pub mod cloudlet;
pub mod cloudlet_scheduler;
pub mod config;
pub mod datacenter;
pub mod error;
pub mod events;
pub mod host;
pub mod pe;
pub mod provisioner;
pub mod record;
pub mod utilization_model;
pub mod vm;
pub mod vm_allocation_policy;
pub mod vm_scheduler;
