//! WSN Routing Simulator CLI
//!
//! Runs one routing algorithm over a sensor grid, or the canned scenarios.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wsn_core::{Greedy, Pegasis, Raser, Reinforcement};
use wsn_env::{ExhaustionPolicy, RoutingAlgorithm, SimError};
use wsn_sim::{AlgorithmKind, Environment, ScenarioId, ScenarioResult, ScenarioRunner, SimConfig};

/// Discrete-time WSN routing simulator
#[derive(Parser, Debug)]
#[command(name = "wsn-sim")]
#[command(about = "Simulate routing algorithms over a wireless sensor grid", long_about = None)]
struct Args {
    /// Routing algorithm
    #[arg(short, long, value_enum)]
    algorithm: Option<AlgorithmKind>,

    /// Grid spacing between nodes
    #[arg(long)]
    spacing: Option<u32>,

    /// Field width
    #[arg(long)]
    x_dim: Option<u32>,

    /// Field height
    #[arg(long)]
    y_dim: Option<u32>,

    /// Number of sinks
    #[arg(long)]
    actuators: Option<usize>,

    /// Radio range
    #[arg(short, long)]
    range: Option<u32>,

    /// Ticks between sensor readings
    #[arg(long)]
    sensor_period: Option<u64>,

    /// Ticks between sensor readings inside the hotspot
    #[arg(long)]
    high_load_period: Option<u64>,

    /// Messages to deliver before stopping
    #[arg(short, long)]
    messages: Option<u64>,

    /// Master seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Hop log file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep drained nodes running instead of shutting them down
    #[arg(long)]
    keep_dead_nodes: bool,

    /// Print the neighbor matrix before running
    #[arg(long)]
    layout: bool,

    /// Run a scenario (two_node_direct, ..., s1-s6, all) instead of a field
    #[arg(short = 'S', long)]
    scenario: Option<String>,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> SimConfig {
        let defaults = SimConfig::default();
        SimConfig {
            algorithm: self.algorithm.unwrap_or(defaults.algorithm),
            node_spacing: self.spacing.unwrap_or(defaults.node_spacing),
            x_dim: self.x_dim.unwrap_or(defaults.x_dim),
            y_dim: self.y_dim.unwrap_or(defaults.y_dim),
            actuator_count: self.actuators.unwrap_or(defaults.actuator_count),
            comm_range: self.range.unwrap_or(defaults.comm_range),
            sensor_period: self.sensor_period.unwrap_or(defaults.sensor_period),
            high_load_sensor_period: self
                .high_load_period
                .unwrap_or(defaults.high_load_sensor_period),
            target_messages: self.messages.unwrap_or(defaults.target_messages),
            seed: self.seed.unwrap_or(defaults.seed),
            output_filename: self.output.clone().unwrap_or(defaults.output_filename.clone()),
            exhaustion: if self.keep_dead_nodes {
                ExhaustionPolicy::Continue
            } else {
                defaults.exhaustion
            },
            ..defaults
        }
    }
}

fn simulate<A: RoutingAlgorithm>(algorithm: A, config: &SimConfig, args: &Args) -> Result<(), SimError> {
    let mut env = Environment::new(algorithm, config)?;
    if args.layout {
        print!("{}", env.layout());
    }

    let summary = env.run_messages(config.update_period, config.target_messages);
    env.write_log(&config.output_filename)?;

    let reports = env.node_report();
    if args.json {
        let out = serde_json::json!({
            "algorithm": config.algorithm.name(),
            "seed": config.seed,
            "summary": summary,
            "nodes": reports,
        });
        match serde_json::to_string_pretty(&out) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        for report in &reports {
            println!("{}", report);
        }
        println!(
            "Sent Message Total: {}; Arrived Message Total: {}",
            summary.created, summary.delivered
        );
    }
    Ok(())
}

fn run_scenarios(args: &Args, selection: &str, seed: u64) -> bool {
    let scenarios: Vec<ScenarioId> = if selection == "all" {
        ScenarioId::all()
    } else {
        match selection.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                return false;
            }
        }
    };

    let runner = ScenarioRunner::new(seed);
    let results: Vec<ScenarioResult> = scenarios.iter().map(|&s| runner.run(s)).collect();
    let failed = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed,
            "failed": failed,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode results: {}", e),
        }
    } else if failed == 0 {
        info!("All {} scenarios passed", results.len());
    } else {
        error!("{}/{} scenarios failed", failed, results.len());
        for result in results.iter().filter(|r| !r.passed) {
            error!(
                "  - {} seed={}: {}",
                result.scenario,
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }
    failed == 0
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let config = args.to_config();

    if let Some(selection) = args.scenario.as_deref() {
        if !run_scenarios(&args, selection, config.seed) {
            std::process::exit(1);
        }
        return;
    }

    info!("{} on a {}x{} field (seed={})", config.algorithm, config.x_dim, config.y_dim, config.seed);
    let result = match config.algorithm {
        AlgorithmKind::Reinforcement => simulate(
            Reinforcement::new().with_exploration(config.exploration_rate),
            &config,
            &args,
        ),
        AlgorithmKind::Raser => simulate(Raser::new(), &config, &args),
        AlgorithmKind::Pegasis => simulate(Pegasis::new(config.rebuild_period), &config, &args),
        AlgorithmKind::Greedy => simulate(Greedy, &config, &args),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(if e.is_config_error() { 2 } else { 1 });
    }
}
