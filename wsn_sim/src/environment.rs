//! The simulation environment: field construction and the tick loop.

use crate::config::SimConfig;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use wsn_env::{Field, Node, NodeId, NodeStats, Position, RoutingAlgorithm, SimError};

/// Totals of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Global ticks executed
    pub ticks: u64,

    /// Sensor packets originated
    pub created: u64,

    /// Packets delivered to their destination
    pub delivered: u64,

    /// True when the run ended on the cooldown or with every node down
    pub stalled: bool,
}

/// End-of-run counters of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub label: u32,

    #[serde(flatten)]
    pub stats: NodeStats,
}

impl std::fmt::Display for NodeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Node {}: sent messages = {}, received messages = {}, generated messages = {}, destination messages = {}",
            self.label, self.stats.sent, self.stats.received, self.stats.generated, self.stats.delivered
        )
    }
}

/// Owns the field and the algorithm, and drives the global clock.
pub struct Environment<A: RoutingAlgorithm> {
    algorithm: A,
    field: Field<A>,
    tick: u64,
    created: u64,
    delivered: u64,
    max_cooldown: u64,
}

impl<A: RoutingAlgorithm> Environment<A> {
    /// Builds the grid described by `config`.
    ///
    /// Nodes are placed column by column; the first `actuator_count` of them
    /// become sinks.
    pub fn new(algorithm: A, config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let placements = config
            .grid_positions()
            .into_iter()
            .map(|(x, y)| (Position::new(x, y), config.sensor_period_at(x, y)))
            .collect();
        Self::build(algorithm, placements, config.actuator_count, config.comm_range, config)
    }

    /// Builds a field from explicit positions, all sensing every
    /// `config.sensor_period` ticks.
    pub fn with_positions(
        algorithm: A,
        positions: &[Position],
        actuator_count: usize,
        comm_range: u32,
        config: &SimConfig,
    ) -> Result<Self, SimError> {
        config.validate_periods()?;
        let placements = positions
            .iter()
            .map(|&p| (p, config.sensor_period))
            .collect();
        Self::build(algorithm, placements, actuator_count, comm_range, config)
    }

    fn build(
        mut algorithm: A,
        placements: Vec<(Position, u64)>,
        actuator_count: usize,
        comm_range: u32,
        config: &SimConfig,
    ) -> Result<Self, SimError> {
        if placements.is_empty() {
            return Err(SimError::EmptyField);
        }
        if actuator_count >= placements.len() {
            return Err(SimError::too_many_actuators(actuator_count, placements.len()));
        }

        let mut field = Field::new(config.energy, config.exhaustion, config.seed);
        for (index, (position, period)) in placements.into_iter().enumerate() {
            let id = field.add_node(position, index >= actuator_count, config.initial_battery);
            if let Some(node) = field.node_mut(id) {
                node.sensor_period = period;
            }
        }

        let sinks: Vec<NodeId> = (0..actuator_count).map(NodeId).collect();
        for &sink in &sinks {
            field.register_destination(sink)?;
        }
        for node in field.nodes_mut() {
            for &sink in &sinks {
                node.add_destination(sink);
            }
        }

        let ids: Vec<NodeId> = field.nodes().iter().map(|n| n.id()).collect();
        for &a in &ids {
            for &b in &ids {
                let in_range = match (field.node(a), field.node(b)) {
                    (Some(na), Some(nb)) => a != b && na.distance_to(nb) <= comm_range,
                    _ => false,
                };
                if in_range {
                    field.add_neighbor(&mut algorithm, a, b);
                }
            }
        }
        for node in field.nodes_mut() {
            algorithm.on_node_init(node);
        }

        info!(
            "{}: {} nodes, {} sinks, range {}",
            algorithm.name(),
            field.len(),
            actuator_count,
            comm_range
        );
        Ok(Self {
            algorithm,
            field,
            tick: 0,
            created: 0,
            delivered: 0,
            max_cooldown: config.max_cooldown,
        })
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    pub fn algorithm_mut(&mut self) -> &mut A {
        &mut self.algorithm
    }

    pub fn field(&self) -> &Field<A> {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut Field<A> {
        &mut self.field
    }

    pub fn nodes(&self) -> &[Node<A>] {
        self.field.nodes()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<A>> {
        self.field.node(id)
    }

    /// Next global tick index.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Turns sensing on or off for one node.
    pub fn set_has_sensor(&mut self, id: NodeId, has_sensor: bool) -> Result<(), SimError> {
        let node = self
            .field
            .node_mut(id)
            .ok_or(SimError::UnknownNode(id.index()))?;
        node.has_sensor = has_sensor;
        Ok(())
    }

    fn has_active_sensor(&self) -> bool {
        self.field
            .nodes()
            .iter()
            .any(|n| n.is_active() && n.has_sensor)
    }

    /// Runs one global tick; returns packets (created, delivered) during it.
    ///
    /// With a `target`, sensors stop firing once that many packets exist.
    pub fn tick_once(&mut self, target: Option<u64>) -> (u64, u64) {
        let active = self.field.active_nodes();
        let destinations = self.field.destinations().to_vec();
        self.algorithm
            .on_tick(self.tick, self.field.nodes_mut(), &active, &destinations);

        let (mut created, mut delivered) = (0, 0);
        for index in 0..self.field.len() {
            let id = NodeId(index);
            let Some(node) = self.field.node(id) else {
                continue;
            };
            let before = node.stats;
            let on_schedule = (self.tick + u64::from(node.label())) % node.sensor_period.max(1) == 0;
            let sensed = on_schedule
                && node.has_sensor
                && node.is_active()
                && target.map_or(true, |t| self.created + created < t);

            self.field.tick_node(&mut self.algorithm, id, sensed);

            if let Some(node) = self.field.node(id) {
                created += node.stats.generated - before.generated;
                delivered += node.stats.delivered - before.delivered;
            }
        }

        self.created += created;
        self.delivered += delivered;
        self.tick += 1;
        (created, delivered)
    }

    /// Runs until `target` packets are delivered or the run stalls.
    ///
    /// The cooldown counts ticks without a delivery once generation has
    /// stopped, either because `target` packets exist or because no sensor
    /// is left alive.
    pub fn run_messages(&mut self, update_period: u64, target: u64) -> RunSummary {
        info!("{}: running until {} messages arrive", self.algorithm.name(), target);
        let start = self.tick;
        let mut cooldown = 0;
        let mut stalled = false;

        while self.delivered < target {
            if cooldown >= self.max_cooldown {
                warn!("no delivery for {} ticks, stopping", cooldown);
                stalled = true;
                break;
            }
            if self.field.active_nodes().is_empty() {
                warn!("every node is down, stopping");
                stalled = true;
                break;
            }

            let (_, delivered) = self.tick_once(Some(target));
            if delivered > 0 {
                cooldown = 0;
            }
            if self.created >= target || !self.has_active_sensor() {
                cooldown += 1;
            }
            self.report_progress(update_period);
        }

        let summary = self.summary(start, stalled);
        info!(
            "Sent Message Total: {}; Arrived Message Total: {}",
            summary.created, summary.delivered
        );
        summary
    }

    /// Runs exactly `loop_count` ticks with sensors on schedule.
    pub fn run_timesteps(&mut self, update_period: u64, loop_count: u64) -> RunSummary {
        let start = self.tick;
        for _ in 0..loop_count {
            self.tick_once(None);
            self.report_progress(update_period);
        }
        self.summary(start, false)
    }

    fn report_progress(&self, update_period: u64) {
        let last = self.tick.saturating_sub(1);
        if update_period > 0 && last % update_period == 0 {
            debug!(
                "t={} | created={} | delivered={} | active={}",
                last,
                self.created,
                self.delivered,
                self.field.active_nodes().len()
            );
        }
    }

    fn summary(&self, start: u64, stalled: bool) -> RunSummary {
        RunSummary {
            ticks: self.tick - start,
            created: self.created,
            delivered: self.delivered,
            stalled,
        }
    }

    /// Hands the hop log to the algorithm's end hook.
    pub fn finish(&mut self, sink: &mut dyn Write) -> Result<(), SimError> {
        self.algorithm.on_end(sink, self.field.logger())?;
        Ok(())
    }

    /// Writes the hop log to `path`.
    pub fn write_log(&mut self, path: &Path) -> Result<(), SimError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.finish(&mut out)?;
        out.flush()?;
        info!("wrote {} hop records to {}", self.field.logger().len(), path.display());
        Ok(())
    }

    /// Per-node counters in label order.
    pub fn node_report(&self) -> Vec<NodeReport> {
        self.field
            .nodes()
            .iter()
            .map(|n| NodeReport {
                label: n.label(),
                stats: n.stats,
            })
            .collect()
    }

    /// Neighbor matrix: the distance for neighbors, blank otherwise.
    pub fn layout(&self) -> String {
        let nodes = self.field.nodes();
        let mut out = String::from("    ");
        for node in nodes {
            out.push_str(&format!("{} ", node.label()));
        }
        out.push('\n');

        for src in nodes {
            out.push_str(&format!("{} : ", src.label()));
            for dst in nodes {
                if src.neighbors().contains(&dst.id()) {
                    out.push_str(&format!("{} ", src.distance_to(dst)));
                } else {
                    out.push_str("  ");
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsn_core::{Greedy, Reinforcement};

    fn small_grid() -> SimConfig {
        SimConfig {
            node_spacing: 5,
            x_dim: 15,
            y_dim: 10,
            actuator_count: 1,
            comm_range: 5,
            sensor_period: 4,
            high_load_sensor_period: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_grid_wiring() {
        let env = Environment::new(Greedy, &small_grid()).unwrap();
        assert_eq!(env.nodes().len(), 6);
        assert_eq!(env.field().destinations(), &[NodeId(0)]);

        let origin = env.node(NodeId(0)).unwrap();
        assert!(!origin.has_sensor);
        assert_eq!(origin.neighbors(), &[NodeId(1), NodeId(2)]);
        assert!(env.nodes().iter().all(|n| n.destinations() == [NodeId(0)]));
    }

    #[test]
    fn test_rejects_bad_configs() {
        let config = SimConfig {
            actuator_count: 6,
            ..small_grid()
        };
        assert!(matches!(
            Environment::new(Greedy, &config),
            Err(SimError::TooManyActuators { actuators: 6, nodes: 6 })
        ));

        let config = SimConfig {
            comm_range: 4,
            ..small_grid()
        };
        assert!(Environment::new(Greedy, &config).is_err());
    }

    #[test]
    fn test_run_messages_reaches_target() {
        let mut env = Environment::new(Reinforcement::new(), &small_grid()).unwrap();
        let summary = env.run_messages(5, 10);

        assert!(!summary.stalled);
        assert_eq!(summary.delivered, 10);
        assert!(summary.created >= 10);
        let reports = env.node_report();
        assert_eq!(reports.iter().map(|r| r.stats.delivered).sum::<u64>(), 10);
        assert_eq!(reports.iter().map(|r| r.stats.generated).sum::<u64>(), summary.created);
    }

    #[test]
    fn test_cooldown_ends_stalled_run() {
        let config = SimConfig {
            max_cooldown: 20,
            ..small_grid()
        };
        let mut env = Environment::new(Greedy, &config).unwrap();
        for i in 1..6 {
            env.set_has_sensor(NodeId(i), false).unwrap();
        }

        let summary = env.run_messages(5, 3);
        assert!(summary.stalled);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.ticks, 20);
    }

    #[test]
    fn test_layout_and_report_format() {
        let config = SimConfig {
            x_dim: 10,
            y_dim: 5,
            ..small_grid()
        };
        let env = Environment::new(Greedy, &config).unwrap();
        assert_eq!(env.layout(), "    1 2 \n1 :   5 \n2 : 5   \n");
        assert_eq!(
            env.node_report()[0].to_string(),
            "Node 1: sent messages = 0, received messages = 0, generated messages = 0, destination messages = 0"
        );
    }

    #[test]
    fn test_node_report_json_is_flat() {
        let mut env = Environment::new(Greedy, &small_grid()).unwrap();
        env.run_timesteps(10, 12);

        let report = env.node_report()[0];
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["label"], 1);
        assert_eq!(json["delivered"], report.stats.delivered);
        assert_eq!(json["received"], report.stats.received);
        assert!(json.get("stats").is_none());
    }

    #[test]
    fn test_hop_log_written_on_finish() {
        let mut env = Environment::new(Greedy, &small_grid()).unwrap();
        env.run_timesteps(10, 12);

        let mut out = Vec::new();
        env.finish(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("srcNode\tdestNode"));
        assert_eq!(text.lines().count(), env.field().logger().len() + 1);
    }
}
