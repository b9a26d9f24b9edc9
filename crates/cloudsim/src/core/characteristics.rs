//! Static characteristics of a datacenter and the cloudlet cost model.

use serde::{Deserialize, Serialize};

use crate::core::error::CloudError;

/// Billing granularity for memory and storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    /// Memory and storage are charged once per cloudlet.
    #[default]
    Flat,
    /// Memory and storage are charged for every second of cloudlet execution.
    PerSecond,
}

/// Datacenter characteristics, immutable after the datacenter is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatacenterCharacteristics {
    pub architecture: String,
    pub os: String,
    pub vmm: String,
    pub time_zone: f64,
    /// Cost of using processing per second.
    pub cost_per_second: f64,
    /// Cost of using memory per MB.
    pub cost_per_memory: f64,
    /// Cost of using storage per MB.
    pub cost_per_storage: f64,
    /// Cost of transferring data per MB.
    pub cost_per_bw: f64,
    pub billing: BillingMode,
}

impl Default for DatacenterCharacteristics {
    fn default() -> Self {
        Self {
            architecture: "x86".to_string(),
            os: "Linux".to_string(),
            vmm: "Xen".to_string(),
            time_zone: 10.,
            cost_per_second: 3.,
            cost_per_memory: 0.05,
            cost_per_storage: 0.001,
            cost_per_bw: 0.,
            billing: BillingMode::Flat,
        }
    }
}

impl DatacenterCharacteristics {
    pub fn validate(&self) -> Result<(), CloudError> {
        let rates = [
            ("cost_per_second", self.cost_per_second),
            ("cost_per_memory", self.cost_per_memory),
            ("cost_per_storage", self.cost_per_storage),
            ("cost_per_bw", self.cost_per_bw),
        ];
        for (name, value) in rates {
            if !(value >= 0.) {
                return Err(CloudError::Config(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        Ok(())
    }

    /// Computes the cost of a finished cloudlet.
    ///
    /// `ram` is the memory used by the cloudlet, `storage` is its input size and `network` is the amount of data
    /// transferred in and out.
    pub fn cloudlet_cost(&self, cpu_time: f64, ram: f64, storage: f64, network: f64) -> f64 {
        let (memory_cost, storage_cost) = match self.billing {
            BillingMode::Flat => (ram * self.cost_per_memory, storage * self.cost_per_storage),
            BillingMode::PerSecond => (
                ram * self.cost_per_memory * cpu_time,
                storage * self.cost_per_storage * cpu_time,
            ),
        };
        cpu_time * self.cost_per_second + memory_cost + storage_cost + network * self.cost_per_bw
    }
}
