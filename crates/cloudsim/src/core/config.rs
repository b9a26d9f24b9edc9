//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::core::characteristics::DatacenterCharacteristics;
use crate::core::cloudlet::CloudletSpec;
use crate::core::error::CloudError;
use crate::core::host::HostSpec;
use crate::core::vm::VmSpec;

/// Datacenter description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatacenterConfig {
    pub name: String,
    #[serde(default)]
    pub characteristics: DatacenterCharacteristics,
    pub hosts: Vec<HostSpec>,
    /// Name of VM placement policy, see [`placement_policy_resolver`](crate::core::vm_allocation_policy::placement_policy_resolver).
    #[serde(default = "default_placement_policy")]
    pub placement_policy: String,
    /// Upper bound on the period of progress recomputation while cloudlets run, zero means no bound.
    #[serde(default)]
    pub scheduling_interval: f64,
    /// Whether VMs may request more MIPS than the host has in total.
    #[serde(default = "default_allow_mips_oversubscription")]
    pub allow_mips_oversubscription: bool,
}

fn default_placement_policy() -> String {
    "FirstFit".to_string()
}

fn default_allow_mips_oversubscription() -> bool {
    true
}

impl DatacenterConfig {
    /// Creates datacenter description with default characteristics and the first fit placement.
    pub fn new(name: &str, hosts: Vec<HostSpec>) -> Self {
        Self {
            name: name.to_string(),
            characteristics: DatacenterCharacteristics::default(),
            hosts,
            placement_policy: default_placement_policy(),
            scheduling_interval: 0.,
            allow_mips_oversubscription: default_allow_mips_oversubscription(),
        }
    }

    pub fn validate(&self) -> Result<(), CloudError> {
        self.characteristics.validate()?;
        if !(self.scheduling_interval >= 0.) {
            return Err(CloudError::Config(format!(
                "datacenter {}: scheduling interval must be non-negative",
                self.name
            )));
        }
        let mut ids: Vec<u32> = self.hosts.iter().map(|h| h.id).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(CloudError::Config(format!("datacenter {}: duplicate host ids", self.name)));
        }
        for host in self.hosts.iter() {
            host.validate()?;
        }
        Ok(())
    }
}

/// Withdrawal of VM or cloudlet scheduled at the specified time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledWithdrawal {
    pub id: u32,
    pub time: f64,
}

/// Broker description with its workload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub name: String,
    #[serde(default)]
    pub vms: Vec<VmSpec>,
    #[serde(default)]
    pub cloudlets: Vec<CloudletSpec>,
    #[serde(default)]
    pub vm_destructions: Vec<ScheduledWithdrawal>,
    #[serde(default)]
    pub cloudlet_cancellations: Vec<ScheduledWithdrawal>,
}

impl BrokerConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vms: Vec::new(),
            cloudlets: Vec::new(),
            vm_destructions: Vec::new(),
            cloudlet_cancellations: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), CloudError> {
        for cloudlet in self.cloudlets.iter() {
            if !(cloudlet.length > 0.) || !cloudlet.length.is_finite() {
                return Err(CloudError::Config(format!(
                    "broker {}: cloudlet #{} has invalid length {}",
                    self.name, cloudlet.id, cloudlet.length
                )));
            }
        }
        let withdrawals = self
            .vm_destructions
            .iter()
            .map(|w| ("vm", w))
            .chain(self.cloudlet_cancellations.iter().map(|w| ("cloudlet", w)));
        for (kind, withdrawal) in withdrawals {
            if !(withdrawal.time >= 0.) || !withdrawal.time.is_finite() {
                return Err(CloudError::Config(format!(
                    "broker {}: withdrawal of {} #{} has invalid time {}",
                    self.name, kind, withdrawal.id, withdrawal.time
                )));
            }
        }
        Ok(())
    }
}

/// Holds raw simulation config parsed from YAML file.
#[derive(Serialize, Deserialize)]
struct SimulationConfigRaw {
    pub seed: Option<u64>,
    pub message_delay: Option<f64>,
    pub min_time_between_events: Option<f64>,
    pub simulation_length: Option<f64>,
    pub datacenters: Option<Vec<DatacenterConfig>>,
    pub brokers: Option<Vec<BrokerConfig>>,
}

/// Represents simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// seed of the simulation-wide random number generator
    pub seed: u64,
    /// delay of messages exchanged by brokers and datacenters
    pub message_delay: f64,
    /// lower bound on the period of progress recomputation in datacenters
    pub min_time_between_events: f64,
    /// time of the end-of-simulation event, zero means running until there are no events
    pub simulation_length: f64,
    pub datacenters: Vec<DatacenterConfig>,
    pub brokers: Vec<BrokerConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationConfig {
    /// Creates simulation config with default parameter values.
    pub fn new() -> Self {
        Self {
            seed: 123,
            message_delay: 0.,
            min_time_between_events: 0.01,
            simulation_length: 0.,
            datacenters: Vec::new(),
            brokers: Vec::new(),
        }
    }

    /// Creates simulation config by reading parameter values from .yaml file (uses default values if some parameters
    /// are absent).
    pub fn from_file(file_name: &str) -> Result<Self, CloudError> {
        let data = std::fs::read_to_string(file_name)
            .map_err(|e| CloudError::Config(format!("can't read file {}: {}", file_name, e)))?;
        Self::from_yaml_str(&data)
    }

    /// Creates simulation config from YAML string.
    pub fn from_yaml_str(data: &str) -> Result<Self, CloudError> {
        let raw: SimulationConfigRaw =
            serde_yaml::from_str(data).map_err(|e| CloudError::Config(format!("can't parse YAML: {}", e)))?;
        let default = Self::new();
        let config = Self {
            seed: raw.seed.unwrap_or(default.seed),
            message_delay: raw.message_delay.unwrap_or(default.message_delay),
            min_time_between_events: raw.min_time_between_events.unwrap_or(default.min_time_between_events),
            simulation_length: raw.simulation_length.unwrap_or(default.simulation_length),
            datacenters: raw.datacenters.unwrap_or_default(),
            brokers: raw.brokers.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CloudError> {
        if !(self.message_delay >= 0.) {
            return Err(CloudError::Config("message_delay must be non-negative".to_string()));
        }
        if !(self.min_time_between_events >= 0.) {
            return Err(CloudError::Config("min_time_between_events must be non-negative".to_string()));
        }
        if !(self.simulation_length >= 0.) {
            return Err(CloudError::Config("simulation_length must be non-negative".to_string()));
        }
        for dc in self.datacenters.iter() {
            dc.validate()?;
        }
        for broker in self.brokers.iter() {
            broker.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::characteristics::BillingMode;
    use crate::core::cloudlet_scheduler::CloudletSchedulerKind;
    use crate::core::utilization_model::UtilizationModelSpec;

    const CONFIG: &str = r#"
seed: 7
datacenters:
  - name: dc0
    placement_policy: BestFit
    characteristics:
      cost_per_second: 2.0
      billing: PerSecond
    hosts:
      - { id: 0, pes: 2, mips_per_pe: 1000, ram: 2048, bw: 10000, storage: 1000000 }
brokers:
  - name: broker0
    vms:
      - { id: 0, mips: 1000, ram: 512, bw: 1000, image_size: 10000, scheduler: SpaceShared }
    cloudlets:
      - id: 0
        length: 400000
        vm_id: 0
        utilization_cpu: { type: Constant, value: 0.5 }
    vm_destructions:
      - { id: 0, time: 100 }
"#;

    #[test]
    fn test_parse_config() {
        let config = SimulationConfig::from_yaml_str(CONFIG).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.message_delay, 0.);
        assert_eq!(config.min_time_between_events, 0.01);

        let dc = &config.datacenters[0];
        assert_eq!(dc.placement_policy, "BestFit");
        assert!(dc.allow_mips_oversubscription);
        assert_eq!(dc.characteristics.cost_per_second, 2.);
        assert_eq!(dc.characteristics.cost_per_memory, 0.05);
        assert_eq!(dc.characteristics.billing, BillingMode::PerSecond);
        assert_eq!(dc.hosts[0].mips_per_pe, 1000.);

        let broker = &config.brokers[0];
        assert_eq!(broker.vms[0].cores, 1);
        assert_eq!(broker.vms[0].vmm, "Xen");
        assert_eq!(broker.vms[0].scheduler, CloudletSchedulerKind::SpaceShared);
        assert_eq!(broker.cloudlets[0].pes, 1);
        assert_eq!(broker.cloudlets[0].vm_id, Some(0));
        assert_eq!(broker.cloudlets[0].utilization_cpu, UtilizationModelSpec::Constant { value: 0.5 });
        assert_eq!(broker.cloudlets[0].utilization_ram, UtilizationModelSpec::Full);
        assert_eq!(broker.vm_destructions[0].time, 100.);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            SimulationConfig::from_yaml_str("message_delay: -1"),
            Err(CloudError::Config(_))
        ));
        assert!(SimulationConfig::from_yaml_str("seed: [").is_err());

        let negative_time = "brokers:\n  - name: b\n    vm_destructions: [{ id: 0, time: -5 }]\n";
        assert!(matches!(
            SimulationConfig::from_yaml_str(negative_time),
            Err(CloudError::Config(_))
        ));
        let zero_length = "brokers:\n  - name: b\n    cloudlets: [{ id: 0, length: 0 }]\n";
        assert!(matches!(
            SimulationConfig::from_yaml_str(zero_length),
            Err(CloudError::Config(_))
        ));

        // configs built in code are checked before the simulation is assembled
        let mut config = SimulationConfig::new();
        let mut broker = BrokerConfig::new("b");
        broker.cloudlet_cancellations.push(ScheduledWithdrawal { id: 0, time: f64::NAN });
        config.brokers.push(broker);
        assert!(matches!(
            crate::simulation::CloudSimulation::from_config(config).map(|_| ()),
            Err(CloudError::Config(_))
        ));
        assert!(SimulationConfig::from_file("missing.yaml").is_err());
    }
}
