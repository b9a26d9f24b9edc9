//! Cloud simulation assembly and execution.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use sugars::{rc, refcell};

use cloudsim_core::{Id, Simulation, SimulationContext, SimulationError};

use crate::core::broker::DatacenterBroker;
use crate::core::cloudlet::Cloudlet;
use crate::core::config::{BrokerConfig, DatacenterConfig, SimulationConfig};
use crate::core::datacenter::Datacenter;
use crate::core::error::CloudError;
use crate::core::record::CloudletRecord;
use crate::core::vm_allocation_policy::{placement_policy_resolver, VmAllocationPolicy};

/// Wires datacenters and brokers into the simulation engine.
pub struct CloudSimulation {
    datacenters: BTreeMap<Id, Rc<RefCell<Datacenter>>>,
    brokers: BTreeMap<Id, Rc<RefCell<DatacenterBroker>>>,
    started: bool,
    sim: Simulation,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl CloudSimulation {
    pub fn new(mut sim: Simulation, sim_config: SimulationConfig) -> Self {
        let ctx = sim.create_context("simulation");
        Self {
            datacenters: BTreeMap::new(),
            brokers: BTreeMap::new(),
            started: false,
            sim,
            ctx,
            sim_config: rc!(sim_config),
        }
    }

    /// Creates simulation with all datacenters and brokers described in the config.
    pub fn from_config(sim_config: SimulationConfig) -> Result<Self, CloudError> {
        sim_config.validate()?;
        let sim = Simulation::new(sim_config.seed);
        let mut cloud_sim = Self::new(sim, sim_config.clone());
        for dc in sim_config.datacenters.iter() {
            cloud_sim.add_datacenter(dc)?;
        }
        for broker in sim_config.brokers.iter() {
            cloud_sim.add_broker_from_config(broker)?;
        }
        if sim_config.simulation_length > 0. {
            cloud_sim.terminate_at(sim_config.simulation_length);
        }
        Ok(cloud_sim)
    }

    /// Adds datacenter with the placement policy named in its config.
    pub fn add_datacenter(&mut self, config: &DatacenterConfig) -> Result<Id, CloudError> {
        let policy = placement_policy_resolver(&config.placement_policy)?;
        self.add_datacenter_with_policy(config, policy)
    }

    pub fn add_datacenter_with_policy(
        &mut self,
        config: &DatacenterConfig,
        allocation_policy: Box<dyn VmAllocationPolicy>,
    ) -> Result<Id, CloudError> {
        if self.sim.lookup_id(&config.name).is_some() {
            return Err(CloudError::Config(format!("component {} already exists", config.name)));
        }
        let datacenter = Datacenter::new(
            config,
            allocation_policy,
            self.sim.create_context(&config.name),
            self.sim_config.clone(),
        )?;
        let datacenter = rc!(refcell!(datacenter));
        let id = self.sim.add_handler(&config.name, datacenter.clone());
        self.datacenters.insert(id, datacenter);
        for broker in self.brokers.values() {
            broker.borrow_mut().add_datacenter(id);
        }
        Ok(id)
    }

    /// Adds broker which uses all datacenters added so far and later.
    pub fn add_broker(&mut self, name: &str) -> Result<Id, CloudError> {
        if self.sim.lookup_id(name).is_some() {
            return Err(CloudError::Config(format!("component {} already exists", name)));
        }
        let broker = rc!(refcell!(DatacenterBroker::new(
            self.sim.create_context(name),
            self.sim_config.clone()
        )));
        let id = self.sim.add_handler(name, broker.clone());
        for &datacenter_id in self.datacenters.keys() {
            broker.borrow_mut().add_datacenter(datacenter_id);
        }
        self.brokers.insert(id, broker);
        Ok(id)
    }

    fn add_broker_from_config(&mut self, config: &BrokerConfig) -> Result<Id, CloudError> {
        let id = self.add_broker(&config.name)?;
        let cloudlets: Vec<Cloudlet> = config
            .cloudlets
            .iter()
            .map(|spec| Cloudlet::from_spec(spec, self.ctx.gen_range(0..u64::MAX)))
            .collect();
        let mut broker = self.brokers[&id].borrow_mut();
        broker.submit_vm_list(config.vms.clone());
        broker.submit_cloudlet_list(cloudlets);
        for withdrawal in config.vm_destructions.iter() {
            broker.destroy_vm_at(withdrawal.id, withdrawal.time)?;
        }
        for withdrawal in config.cloudlet_cancellations.iter() {
            broker.cancel_cloudlet_at(withdrawal.id, withdrawal.time)?;
        }
        Ok(id)
    }

    pub fn datacenter(&self, id: Id) -> Option<Rc<RefCell<Datacenter>>> {
        self.datacenters.get(&id).cloned()
    }

    pub fn broker(&self, id: Id) -> Option<Rc<RefCell<DatacenterBroker>>> {
        self.brokers.get(&id).cloned()
    }

    /// Returns the id of component by its name.
    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.sim.lookup_id(name)
    }

    /// Starts all brokers. Called implicitly by the methods running the simulation.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for broker in self.brokers.values() {
            broker.borrow_mut().start();
        }
    }

    /// Schedules the end of simulation after the specified delay.
    pub fn terminate_at(&mut self, delay: f64) {
        self.sim.terminate_at(delay);
    }

    /// Runs the simulation until there are no events left or the end of simulation is reached.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        self.start();
        self.sim.run()
    }

    /// Performs a single step through the simulation.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        self.start();
        self.sim.step()
    }

    /// Steps through the simulation with duration limit.
    pub fn step_for_duration(&mut self, duration: f64) -> Result<bool, SimulationError> {
        self.start();
        self.sim.step_for_duration(duration)
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn is_finished(&self) -> bool {
        self.sim.is_finished()
    }

    /// Returns the records of cloudlets received by all brokers.
    pub fn records(&self) -> Vec<CloudletRecord> {
        self.brokers
            .values()
            .flat_map(|broker| broker.borrow().records())
            .collect()
    }

    pub fn sim_config(&self) -> Rc<SimulationConfig> {
        self.sim_config.clone()
    }
}
