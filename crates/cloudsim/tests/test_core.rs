use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use sugars::{rc, refcell};

use cloudsim::core::cloudlet::{Cloudlet, CloudletStatus};
use cloudsim::core::cloudlet_scheduler::CloudletSchedulerKind;
use cloudsim::core::config::{DatacenterConfig, SimulationConfig};
use cloudsim::core::datacenter::Datacenter;
use cloudsim::core::events::cloudlet::{CloudletReturn, CloudletSubmit};
use cloudsim::core::events::vm::{AckStatus, VmCreateAck, VmCreateRequest, VmDestroyAck, VmDestroyRequest};
use cloudsim::core::host::HostSpec;
use cloudsim::core::record::CloudletRecord;
use cloudsim::core::vm::{VmSpec, VmUid};
use cloudsim::core::vm_allocation_policy::FirstFit;
use cloudsim::simulation::CloudSimulation;
use cloudsim_core::{cast, Event, EventHandler, Id, Simulation, SimulationError};

fn standard_host(id: u32) -> HostSpec {
    HostSpec::new(id, 1, 1000., 2048, 10000, 1000000)
}

fn standard_vm(id: u32) -> VmSpec {
    VmSpec::new(id, 1000., 1, 512, 1000, 10000)
}

fn cloudlet(id: u32, length: f64) -> Cloudlet {
    Cloudlet::new(id, length, 1, 300, 300)
}

fn new_simulation(sim_config: SimulationConfig) -> CloudSimulation {
    CloudSimulation::new(Simulation::new(123), sim_config)
}

// One host with one PE, one VM using the whole PE and one cloudlet of 400000 MI bound to the VM.
fn reference_scenario(sim_config: SimulationConfig) -> (CloudSimulation, Id, Id) {
    let mut cloud_sim = new_simulation(sim_config);
    let dc = cloud_sim
        .add_datacenter(&DatacenterConfig::new("datacenter", vec![standard_host(0)]))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker.borrow_mut().submit_vm_list(vec![standard_vm(0)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(0, 400000.).with_vm(0)]);
    (cloud_sim, dc, broker_id)
}

#[test]
fn test_dedicated_cloudlet_finishes_at_400() {
    let (mut cloud_sim, dc, broker_id) = reference_scenario(SimulationConfig::new());
    cloud_sim.run().unwrap();

    let broker = cloud_sim.broker(broker_id).unwrap();
    let broker = broker.borrow();
    let received = broker.received_cloudlets();
    assert_eq!(received.len(), 1);
    let cloudlet = &received[0];
    assert_eq!(cloudlet.status(), CloudletStatus::Success);
    assert_eq!(cloudlet.exec_start_time(), Some(0.));
    assert_eq!(cloudlet.finish_time(), Some(400.));
    assert_eq!(cloudlet.actual_cpu_time(), 400.);
    assert_eq!(cloudlet.executed_length(), 400000.);
    assert_eq!(cloudlet.datacenter_id(), Some(dc));
    assert_eq!(cloudlet.vm_id(), Some(0));
    // 400 s * 3 + 512 MB * 0.05 + 300 MB * 0.001
    assert_abs_diff_eq!(cloudlet.cost(), 1225.9, epsilon = 1e-9);
    assert_eq!(cloud_sim.current_time(), 400.);

    // VMs are destroyed after all cloudlets are returned
    assert_eq!(broker.created_vms(), &[0]);
    assert!(broker.active_vms().is_empty());
    let datacenter = cloud_sim.datacenter(dc).unwrap();
    assert!(datacenter.borrow().vms().is_empty());
    assert!(datacenter.borrow().host(0).unwrap().vms().is_empty());
}

#[test]
fn test_vm_with_too_much_ram_is_not_created() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    let dc = cloud_sim
        .add_datacenter(&DatacenterConfig::new("datacenter", vec![standard_host(0), standard_host(1)]))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker
        .borrow_mut()
        .submit_vm_list(vec![VmSpec::new(0, 1000., 1, 4096, 1000, 10000)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(0, 1000.).with_vm(0)]);

    cloud_sim.step_for_duration(0.).unwrap();
    let datacenter = cloud_sim.datacenter(dc).unwrap();
    for host in datacenter.borrow().hosts().values() {
        assert!(!host.has_vm(VmUid::new(broker_id, 0)));
        assert_eq!(host.ram().allocated(), 0);
    }

    cloud_sim.run().unwrap();
    let broker = broker.borrow();
    assert_eq!(broker.failed_vms(), &[0]);
    assert!(broker.created_vms().is_empty());
    let received = broker.received_cloudlets();
    assert_eq!(received[0].status(), CloudletStatus::Failed);
    assert_eq!(received[0].finish_time(), received[0].submission_time());
}

#[test]
fn test_two_vms_share_host_capacity() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    let dc = cloud_sim
        .add_datacenter(&DatacenterConfig::new("datacenter", vec![standard_host(0)]))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker
        .borrow_mut()
        .submit_vm_list(vec![standard_vm(0), standard_vm(1)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(0, 100000.).with_vm(0), cloudlet(1, 100000.).with_vm(1)]);

    cloud_sim.step_for_duration(10.).unwrap();
    {
        let datacenter = cloud_sim.datacenter(dc).unwrap();
        let datacenter = datacenter.borrow();
        let host = datacenter.host(0).unwrap();
        let (vm0, vm1) = (VmUid::new(broker_id, 0), VmUid::new(broker_id, 1));
        assert_eq!(host.allocated_mips_for_vm(vm0), vec![500.]);
        assert_eq!(host.allocated_mips_for_vm(vm1), vec![500.]);
        assert_eq!(host.mips_allocations().values().sum::<f64>(), host.total_mips());
        assert_eq!(datacenter.vm(vm1).unwrap().allocated_mips(), &[500.]);
        assert_eq!(
            datacenter.vm(vm0).unwrap().cloudlet_scheduler().current_mips_share(0),
            500.
        );
    }

    cloud_sim.run().unwrap();
    let broker = broker.borrow();
    for cloudlet in broker.received_cloudlets() {
        assert_eq!(cloudlet.status(), CloudletStatus::Success);
        assert_eq!(cloudlet.finish_time(), Some(200.));
    }
}

fn run_with_destruction() -> Vec<CloudletRecord> {
    let (mut cloud_sim, dc, broker_id) = reference_scenario(SimulationConfig::new());
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker.borrow_mut().destroy_vm_at(0, 100.).unwrap();
    cloud_sim.run().unwrap();

    let datacenter = cloud_sim.datacenter(dc).unwrap();
    assert!(datacenter.borrow().host(0).unwrap().vms().is_empty());
    assert!(datacenter.borrow().vm(VmUid::new(broker_id, 0)).is_none());
    let records = broker.borrow().records();
    records
}

#[test]
fn test_vm_destruction_fails_running_cloudlets() {
    let records = run_with_destruction();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, "FAILED");
    assert_eq!(records[0].exec_start_time, Some(0.));
    assert_eq!(records[0].finish_time, Some(100.));
    assert_eq!(records[0].cost, 0.);

    // a fresh run reproduces the same outcome
    assert_eq!(run_with_destruction(), records);
}

#[test]
fn test_cloudlet_bound_to_missing_vm_fails() {
    let sim_config = SimulationConfig {
        message_delay: 1.,
        ..SimulationConfig::new()
    };
    let (mut cloud_sim, _, broker_id) = reference_scenario(sim_config);
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(1, 1000.).with_vm(42)]);
    cloud_sim.run().unwrap();

    let broker = broker.borrow();
    let failed = broker.received_cloudlets().iter().find(|c| c.id == 1).unwrap();
    assert_eq!(failed.status(), CloudletStatus::Failed);
    // request arrives at 1, ack at 2, cloudlets at 3
    assert_eq!(failed.submission_time(), Some(3.));
    assert_eq!(failed.finish_time(), Some(3.));
    assert_eq!(failed.exec_start_time(), None);

    let succeeded = broker.received_cloudlets().iter().find(|c| c.id == 0).unwrap();
    assert_eq!(succeeded.status(), CloudletStatus::Success);
    assert_eq!(succeeded.finish_time(), Some(403.));
}

#[test]
fn test_first_fit_placement_order() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    let dc = cloud_sim
        .add_datacenter(&DatacenterConfig::new(
            "datacenter",
            vec![standard_host(0), standard_host(1), standard_host(2)],
        ))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker.borrow_mut().submit_vm_list(vec![
        VmSpec::new(0, 1000., 1, 1500, 1000, 10000),
        VmSpec::new(1, 1000., 1, 1500, 1000, 10000),
        VmSpec::new(2, 1000., 1, 500, 1000, 10000),
    ]);
    broker.borrow_mut().submit_cloudlet_list(vec![cloudlet(0, 10000.)]);

    cloud_sim.step_for_duration(1.).unwrap();
    let datacenter = cloud_sim.datacenter(dc).unwrap();
    let datacenter = datacenter.borrow();
    assert_eq!(datacenter.vm_host(VmUid::new(broker_id, 0)), Some(0));
    assert_eq!(datacenter.vm_host(VmUid::new(broker_id, 1)), Some(1));
    assert_eq!(datacenter.vm_host(VmUid::new(broker_id, 2)), Some(0));
}

#[test]
fn test_unbound_cloudlets_are_distributed_round_robin() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    cloud_sim
        .add_datacenter(&DatacenterConfig::new("datacenter", vec![standard_host(0), standard_host(1)]))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker
        .borrow_mut()
        .submit_vm_list(vec![standard_vm(0), standard_vm(1)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list((0..4).map(|id| cloudlet(id, 1000.)).collect());
    cloud_sim.run().unwrap();

    let broker = broker.borrow();
    let mut records = broker.records();
    records.sort_by_key(|r| r.id);
    let vms: Vec<Option<u32>> = records.iter().map(|r| r.vm_id).collect();
    assert_eq!(vms, vec![Some(0), Some(1), Some(0), Some(1)]);
    assert!(records.iter().all(|r| r.status == "SUCCESS"));
    // both VMs share the same host, so each cloudlet gets a quarter of it
    assert!(records.iter().all(|r| r.finish_time == Some(4.)));
}

#[test]
fn test_space_shared_vm_runs_cloudlets_in_turn() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    cloud_sim
        .add_datacenter(&DatacenterConfig::new("datacenter", vec![standard_host(0)]))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker
        .borrow_mut()
        .submit_vm_list(vec![standard_vm(0).with_scheduler(CloudletSchedulerKind::SpaceShared)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(0, 100000.).with_vm(0), cloudlet(1, 100000.).with_vm(0)]);
    cloud_sim.run().unwrap();

    let broker = broker.borrow();
    let received = broker.received_cloudlets();
    assert_eq!(received[0].id, 0);
    assert_eq!(received[0].finish_time(), Some(100.));
    assert_eq!(received[1].exec_start_time(), Some(100.));
    assert_eq!(received[1].finish_time(), Some(200.));
}

#[test]
fn test_cancel_cloudlet() {
    let (mut cloud_sim, _, broker_id) = reference_scenario(SimulationConfig::new());
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker.borrow_mut().cancel_cloudlet_at(0, 50.).unwrap();
    // cloudlet is already returned, nothing happens
    broker.borrow_mut().cancel_cloudlet_at(0, 60.).unwrap();
    cloud_sim.run().unwrap();

    let broker = broker.borrow();
    let received = broker.received_cloudlets();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].status(), CloudletStatus::Canceled);
    assert_eq!(received[0].finish_time(), Some(50.));
    assert_eq!(received[0].executed_length(), 50000.);
}

#[test]
fn test_simulation_end_leaves_cloudlets_unfinished() {
    let (mut cloud_sim, dc, broker_id) = reference_scenario(SimulationConfig::new());
    cloud_sim.terminate_at(100.);
    cloud_sim.run().unwrap();

    assert!(cloud_sim.is_finished());
    assert_eq!(cloud_sim.current_time(), 100.);
    let broker = cloud_sim.broker(broker_id).unwrap();
    assert!(broker.borrow().received_cloudlets().is_empty());
    assert_eq!(broker.borrow().awaiting_cloudlet_count(), 1);
    let datacenter = cloud_sim.datacenter(dc).unwrap();
    let status = datacenter
        .borrow()
        .vm(VmUid::new(broker_id, 0))
        .unwrap()
        .cloudlet_scheduler()
        .cloudlet_status(0);
    assert_eq!(status, Some(CloudletStatus::InExec));
}

#[test]
fn test_failed_vm_is_retried_in_next_datacenter() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    cloud_sim
        .add_datacenter(&DatacenterConfig::new(
            "small",
            vec![HostSpec::new(0, 1, 1000., 256, 10000, 1000000)],
        ))
        .unwrap();
    let large = cloud_sim
        .add_datacenter(&DatacenterConfig::new("large", vec![standard_host(0)]))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker.borrow_mut().submit_vm_list(vec![standard_vm(0)]);
    broker.borrow_mut().submit_cloudlet_list(vec![cloudlet(0, 1000.)]);
    cloud_sim.run().unwrap();

    let broker = broker.borrow();
    assert_eq!(broker.created_vms(), &[0]);
    assert!(broker.failed_vms().is_empty());
    let received = broker.received_cloudlets();
    assert_eq!(received[0].status(), CloudletStatus::Success);
    assert_eq!(received[0].datacenter_id(), Some(large));
}

#[test]
fn test_scheduling_interval_keeps_results() {
    let (mut plain, _, plain_broker) = reference_scenario(SimulationConfig::new());
    plain.run().unwrap();

    let mut cloud_sim = new_simulation(SimulationConfig::new());
    let mut dc_config = DatacenterConfig::new("datacenter", vec![standard_host(0)]);
    dc_config.scheduling_interval = 10.;
    cloud_sim.add_datacenter(&dc_config).unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker.borrow_mut().submit_vm_list(vec![standard_vm(0)]);
    broker
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(0, 400000.).with_vm(0)]);
    cloud_sim.run().unwrap();

    assert!(cloud_sim.event_count() > plain.event_count() + 30);
    let expected = plain.broker(plain_broker).unwrap().borrow().records();
    assert_eq!(broker.borrow().records(), expected);
}

const CONFIG: &str = r#"
seed: 42
datacenters:
  - name: dc
    hosts:
      - { id: 0, pes: 2, mips_per_pe: 1000, ram: 4096, bw: 10000, storage: 1000000 }
brokers:
  - name: broker
    vms:
      - { id: 0, mips: 1000, cores: 2, ram: 512, bw: 1000, image_size: 10000 }
    cloudlets:
      - { id: 0, length: 50000, utilization_cpu: { type: Stochastic } }
      - { id: 1, length: 50000, utilization_cpu: { type: Stochastic } }
      - { id: 2, length: 50000, utilization_cpu: { type: Constant, value: 0.5 } }
    cloudlet_cancellations:
      - { id: 2, time: 10 }
"#;

fn run_config() -> Vec<CloudletRecord> {
    let sim_config = SimulationConfig::from_yaml_str(CONFIG).unwrap();
    let mut cloud_sim = CloudSimulation::from_config(sim_config).unwrap();
    cloud_sim.run().unwrap();
    cloud_sim.records()
}

#[test]
fn test_config_run_is_deterministic() {
    let records = run_config();
    assert_eq!(records.len(), 3);
    let canceled = records.iter().find(|r| r.id == 2).unwrap();
    assert_eq!(canceled.status, "CANCELED");
    assert_eq!(canceled.finish_time, Some(10.));
    assert!(records
        .iter()
        .filter(|r| r.id != 2)
        .all(|r| r.status == "SUCCESS"));
    assert_eq!(run_config(), records);
}

#[test]
fn test_duplicate_component_name() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    cloud_sim
        .add_datacenter(&DatacenterConfig::new("datacenter", vec![standard_host(0)]))
        .unwrap();
    assert!(cloud_sim.add_broker("datacenter").is_err());
    let mut bad_policy = DatacenterConfig::new("dc2", vec![standard_host(0)]);
    bad_policy.placement_policy = "Random".to_string();
    assert!(cloud_sim.add_datacenter(&bad_policy).is_err());
}

#[test]
fn test_brokers_reuse_vm_ids() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    let dc = cloud_sim
        .add_datacenter(&DatacenterConfig::new(
            "datacenter",
            vec![standard_host(0), standard_host(1), standard_host(2)],
        ))
        .unwrap();
    // each VM takes most of the host RAM, so every VM gets its own host
    let big_vm = |id| VmSpec::new(id, 1000., 1, 1500, 1000, 10000);
    let first_id = cloud_sim.add_broker("first").unwrap();
    let first = cloud_sim.broker(first_id).unwrap();
    first.borrow_mut().submit_vm_list(vec![big_vm(0), big_vm(1)]);
    first
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(0, 1000.).with_vm(0)]);
    let second_id = cloud_sim.add_broker("second").unwrap();
    let second = cloud_sim.broker(second_id).unwrap();
    second.borrow_mut().submit_vm_list(vec![big_vm(0)]);
    // VM 1 exists only for the first broker
    second
        .borrow_mut()
        .submit_cloudlet_list(vec![cloudlet(0, 1000.).with_vm(0), cloudlet(1, 1000.).with_vm(1)]);

    cloud_sim.step_for_duration(0.5).unwrap();
    {
        let datacenter = cloud_sim.datacenter(dc).unwrap();
        let datacenter = datacenter.borrow();
        assert_eq!(datacenter.vms().len(), 3);
        assert_eq!(datacenter.vm_host(VmUid::new(first_id, 0)), Some(0));
        assert_eq!(datacenter.vm_host(VmUid::new(first_id, 1)), Some(1));
        assert_eq!(datacenter.vm_host(VmUid::new(second_id, 0)), Some(2));
    }

    cloud_sim.run().unwrap();
    let first = first.borrow();
    assert_eq!(first.created_vms(), &[0, 1]);
    assert_eq!(first.received_cloudlets().len(), 1);
    assert_eq!(first.received_cloudlets()[0].status(), CloudletStatus::Success);
    assert_eq!(first.received_cloudlets()[0].finish_time(), Some(1.));

    let second = second.borrow();
    assert_eq!(second.created_vms(), &[0]);
    assert!(second.failed_vms().is_empty());
    let own = second.received_cloudlets().iter().find(|c| c.id == 0).unwrap();
    assert_eq!(own.status(), CloudletStatus::Success);
    assert_eq!(own.finish_time(), Some(1.));
    let foreign = second.received_cloudlets().iter().find(|c| c.id == 1).unwrap();
    assert_eq!(foreign.status(), CloudletStatus::Failed);
    assert_eq!(foreign.exec_start_time(), None);
    assert_eq!(foreign.finish_time(), foreign.submission_time());
}

#[derive(Default)]
struct Client {
    create_acks: Vec<(u32, AckStatus)>,
    destroy_acks: Vec<(f64, u32, AckStatus)>,
    returned: Vec<Cloudlet>,
}

impl EventHandler for Client {
    fn on(&mut self, event: Event) -> Result<(), SimulationError> {
        let time = event.time;
        cast!(match event.data {
            VmCreateAck { vm_id, status, .. } => {
                self.create_acks.push((vm_id, status));
            }
            VmDestroyAck { vm_id, status, .. } => {
                self.destroy_acks.push((time, vm_id, status));
            }
            CloudletReturn { cloudlet } => {
                self.returned.push(cloudlet);
            }
        })
    }
}

#[test]
fn test_datacenter_destroys_vm_once() {
    let mut sim = Simulation::new(123);
    let datacenter = Datacenter::new(
        &DatacenterConfig::new("datacenter", vec![standard_host(0)]),
        Box::new(FirstFit::new()),
        sim.create_context("datacenter"),
        rc!(SimulationConfig::new()),
    )
    .unwrap();
    let datacenter = rc!(refcell!(datacenter));
    let dc_id = sim.add_handler("datacenter", datacenter.clone());
    let owner = rc!(refcell!(Client::default()));
    sim.add_handler("owner", owner.clone());
    let mut owner_ctx = sim.create_context("owner");
    let stranger = rc!(refcell!(Client::default()));
    let stranger_id = sim.add_handler("stranger", stranger.clone());
    let mut stranger_ctx = sim.create_context("stranger");

    owner_ctx.emit_now(VmCreateRequest { vm: standard_vm(0) }, dc_id);
    // VM of another broker can be neither destroyed nor used
    stranger_ctx.emit(VmDestroyRequest { vm_id: 0 }, dc_id, 5.);
    let mut foreign = cloudlet(0, 1000.).with_vm(0);
    foreign.broker_id = stranger_id;
    stranger_ctx.emit(CloudletSubmit { cloudlet: foreign }, dc_id, 5.);
    owner_ctx.emit(VmDestroyRequest { vm_id: 0 }, dc_id, 10.);
    owner_ctx.emit(VmDestroyRequest { vm_id: 0 }, dc_id, 20.);
    owner_ctx.emit(VmDestroyRequest { vm_id: 7 }, dc_id, 30.);
    sim.step_until_no_events().unwrap();

    let stranger = stranger.borrow();
    assert_eq!(stranger.destroy_acks, vec![(5., 0, AckStatus::Failed)]);
    assert_eq!(stranger.returned.len(), 1);
    assert_eq!(stranger.returned[0].status(), CloudletStatus::Failed);
    assert_eq!(stranger.returned[0].finish_time(), Some(5.));

    let owner = owner.borrow();
    assert_eq!(owner.create_acks, vec![(0, AckStatus::Ok)]);
    assert_eq!(
        owner.destroy_acks,
        vec![
            (10., 0, AckStatus::Ok),
            (20., 0, AckStatus::Failed),
            (30., 7, AckStatus::Failed)
        ]
    );
    let datacenter = datacenter.borrow();
    assert!(datacenter.vms().is_empty());
    let host = datacenter.host(0).unwrap();
    assert!(host.vms().is_empty());
    assert_eq!(host.ram().allocated(), 0);
    assert_eq!(host.available_mips(), host.total_mips());
}

#[test]
fn test_repeated_vm_destruction_by_broker() {
    let (mut cloud_sim, dc, broker_id) = reference_scenario(SimulationConfig::new());
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker.borrow_mut().destroy_vm_at(9, 50.).unwrap();
    broker.borrow_mut().destroy_vm_at(0, 100.).unwrap();
    broker.borrow_mut().destroy_vm_at(0, 150.).unwrap();
    assert!(broker.borrow_mut().destroy_vm_at(0, -1.).is_err());
    assert!(broker.borrow_mut().cancel_cloudlet_at(0, f64::NAN).is_err());
    cloud_sim.run().unwrap();

    let records = broker.borrow().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, "FAILED");
    assert_eq!(records[0].finish_time, Some(100.));
    assert!(broker.borrow().active_vms().is_empty());
    let datacenter = cloud_sim.datacenter(dc).unwrap();
    assert_eq!(datacenter.borrow().host(0).unwrap().ram().allocated(), 0);
}

#[test]
fn test_unbound_cloudlets_fail_without_vms() {
    let mut cloud_sim = new_simulation(SimulationConfig::new());
    cloud_sim
        .add_datacenter(&DatacenterConfig::new("datacenter", vec![standard_host(0)]))
        .unwrap();
    let broker_id = cloud_sim.add_broker("broker").unwrap();
    let broker = cloud_sim.broker(broker_id).unwrap();
    broker
        .borrow_mut()
        .submit_vm_list(vec![VmSpec::new(0, 1000., 1, 4096, 1000, 10000)]);
    broker.borrow_mut().submit_cloudlet_list(vec![cloudlet(0, 1000.)]);
    cloud_sim.run().unwrap();

    let broker = broker.borrow();
    assert_eq!(broker.failed_vms(), &[0]);
    let received = broker.received_cloudlets();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].status(), CloudletStatus::Failed);
    assert_eq!(received[0].submission_time(), Some(0.));
    assert_eq!(received[0].finish_time(), Some(0.));
    assert_eq!(received[0].datacenter_id(), None);
}
