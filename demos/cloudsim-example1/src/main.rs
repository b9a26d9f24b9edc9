use clap::Parser;
use log::info;

use cloudsim::core::cloudlet::CloudletSpec;
use cloudsim::core::config::{BrokerConfig, DatacenterConfig, SimulationConfig};
use cloudsim::core::host::HostSpec;
use cloudsim::core::record::{save_records_csv, CloudletRecord};
use cloudsim::core::utilization_model::UtilizationModelSpec;
use cloudsim::core::vm::VmSpec;
use cloudsim::simulation::CloudSimulation;

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to simulation config, the built-in one-cloudlet scenario is used if not set
    #[clap(short, long)]
    config: Option<String>,

    /// Path to CSV file for cloudlet records
    #[clap(short, long)]
    output: Option<String>,

    /// Random seed, overrides the config value
    #[clap(short, long)]
    seed: Option<u64>,
}

/// One datacenter with a single-core host, one VM and one cloudlet of 400000 MI.
fn example_config() -> SimulationConfig {
    let mut sim_config = SimulationConfig::new();
    sim_config.datacenters.push(DatacenterConfig::new(
        "datacenter_0",
        vec![HostSpec::new(0, 1, 1000., 2048, 10000, 1000000)],
    ));
    let mut broker = BrokerConfig::new("broker_0");
    broker.vms.push(VmSpec::new(0, 1000., 1, 512, 1000, 10000));
    broker.cloudlets.push(CloudletSpec {
        id: 0,
        length: 400000.,
        pes: 1,
        file_size: 300,
        output_size: 300,
        utilization_cpu: UtilizationModelSpec::Full,
        utilization_ram: UtilizationModelSpec::Full,
        utilization_bw: UtilizationModelSpec::Full,
        vm_id: Some(0),
    });
    sim_config.brokers.push(broker);
    sim_config
}

fn format_time(time: Option<f64>) -> String {
    time.map_or("-".to_string(), |t| format!("{:.2}", t))
}

fn print_records(records: &[CloudletRecord]) {
    println!("========== OUTPUT ==========");
    println!(
        "{:>10} {:>8} {:>13} {:>6} {:>10} {:>11} {:>11} {:>10}",
        "Cloudlet", "Status", "Datacenter", "VM", "Time", "Start", "Finish", "Cost"
    );
    for record in records {
        println!(
            "{:>10} {:>8} {:>13} {:>6} {:>10.2} {:>11} {:>11} {:>10.2}",
            record.id,
            record.status,
            record.datacenter_id.map_or("-".to_string(), |id| id.to_string()),
            record.vm_id.map_or("-".to_string(), |id| id.to_string()),
            record.actual_cpu_time,
            format_time(record.exec_start_time),
            format_time(record.finish_time),
            record.cost
        );
    }
}

fn main() {
    init_logger();
    let args = Args::parse();

    let mut sim_config = match &args.config {
        Some(path) => match SimulationConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        None => example_config(),
    };
    if let Some(seed) = args.seed {
        sim_config.seed = seed;
    }

    let mut cloud_sim = match CloudSimulation::from_config(sim_config) {
        Ok(cloud_sim) => cloud_sim,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Starting simulation");
    if let Err(e) = cloud_sim.run() {
        eprintln!("simulation aborted: {}", e);
        std::process::exit(1);
    }
    info!(
        "Simulation finished at {:.2} after {} events",
        cloud_sim.current_time(),
        cloud_sim.event_count()
    );

    let records = cloud_sim.records();
    print_records(&records);
    if let Some(path) = &args.output {
        if let Err(e) = save_records_csv(path, &records) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
