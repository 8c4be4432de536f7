//! WSN Routing Simulation Harness
//!
//! Builds a grid of sensor nodes, wires neighbors by radio range and drives
//! a single [`wsn_env::RoutingAlgorithm`] through discrete ticks.
//!
//! # Tick loop
//!
//! ```text
//!   on_tick(t) ──► node 1 ──► node 2 ──► ... ──► node N ──► t += 1
//!                   │
//!                   ├─ clock += 1, pay awake cost
//!                   ├─ sense (on schedule, below target)
//!                   ├─ algorithm step
//!                   └─ transmit one outbox item
//! ```
//!
//! A packet sent during tick `t` becomes visible to its receiver on the
//! receiver's next tick, whatever the node order.
//!
//! # Usage
//!
//! ```ignore
//! use wsn_core::Pegasis;
//! use wsn_sim::{Environment, SimConfig};
//!
//! let config = SimConfig::default();
//! let mut env = Environment::new(Pegasis::new(config.rebuild_period), &config)?;
//! let summary = env.run_messages(config.update_period, config.target_messages);
//! env.write_log(&config.output_filename)?;
//! ```

pub mod config;
pub mod environment;
pub mod runner;
pub mod scenarios;

pub use config::{AlgorithmKind, SimConfig, HOTSPOT_GRID};
pub use environment::{Environment, NodeReport, RunSummary};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
