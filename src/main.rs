use std::error::Error;

use clap::Parser;
use env_logger;

use rust_transit_freq_opt::search;
use rust_transit_freq_opt::{Optimizer, Scenario};


/// Evaluates and optimizes the route frequencies of a transit scenario
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// scenario config file (yaml)
    config_path: String,
    /// only evaluate the scenario's initial frequencies, without searching
    #[arg(long)]
    evaluate: bool,
}

fn print_results(optimizer: &Optimizer, fopt: &[f64]) -> Result<(), Box<dyn Error>> {
    let overall = optimizer.overall_results(fopt)?;
    println!("VRC: {:.2} (operators {:.2}, infrastructure {:.2}, users {:.2})",
             overall.vrc, overall.costs.operators, overall.costs.infrastructure,
             overall.costs.users);
    println!("trips/h: {:.1}, user cost per trip: {:.3}, violated constrains: {}",
             overall.total_demand, overall.user_cost_per_trip, overall.num_violations);
    println!("route\tmode\tfrequency\tmax load\tk/f\tusage\tcycle (h)\tfleet");
    for rr in optimizer.network_results(fopt)? {
        println!("{}\t{}\t{:.3}\t{:.1}\t{:.1}\t{:.3}\t{:.3}\t{:.2}", rr.route_id, rr.mode,
                 rr.frequency, rr.most_loaded_section, rr.required_capacity,
                 rr.capacity_usage, rr.cycle_time_h, rr.fleet);
    }
    return Ok(());
}

fn run(config_path: &str, evaluate_only: bool) -> Result<(), Box<dyn Error>> {
    let scenario = Scenario::from_cfg(config_path)?;
    let (optimizer, search_cfg) = scenario.into_optimizer()?;

    println!("initial frequencies:");
    print_results(&optimizer, optimizer.f0())?;
    if evaluate_only {
        return Ok(());
    }

    let result = search::minimize(&optimizer, &search_cfg)?;
    println!();
    println!("optimized frequencies after {} evaluations:", result.num_evaluations);
    print_results(&optimizer, &result.frequencies)?;
    return Ok(());
}

fn main () {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(&args.config_path, args.evaluate) {
        log::error!("{}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
