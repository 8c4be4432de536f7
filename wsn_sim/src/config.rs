//! Run configuration.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wsn_env::{EnergyModel, ExhaustionPolicy, SimError};

/// Side of the square cell grid used for the sensing hotspot.
pub const HOTSPOT_GRID: u32 = 10;

/// Routing algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Reinforcement,
    Raser,
    Pegasis,
    Greedy,
}

impl AlgorithmKind {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::Reinforcement => "reinforcement",
            AlgorithmKind::Raser => "raser",
            AlgorithmKind::Pegasis => "pegasis",
            AlgorithmKind::Greedy => "greedy",
        }
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Routing algorithm
    pub algorithm: AlgorithmKind,

    /// Grid spacing between nodes
    pub node_spacing: u32,

    /// Field width (exclusive bound on x)
    pub x_dim: u32,

    /// Field height (exclusive bound on y)
    pub y_dim: u32,

    /// Number of sinks; the first nodes placed become sinks
    pub actuator_count: usize,

    /// Radio range (Euclidean, truncated)
    pub comm_range: u32,

    /// Ticks between sensor readings
    pub sensor_period: u64,

    /// Ticks between sensor readings inside the hotspot
    pub high_load_sensor_period: u64,

    /// Hop log destination
    pub output_filename: PathBuf,

    /// Master seed for destination choice and exploration
    pub seed: u64,

    /// Messages to deliver before `run_messages` stops
    pub target_messages: u64,

    /// Ticks between progress reports
    pub update_period: u64,

    /// Idle ticks tolerated once generation has stopped
    pub max_cooldown: u64,

    /// Per-operation energy costs
    pub energy: EnergyModel,

    /// Starting charge of every node
    pub initial_battery: f64,

    /// What a drained node does
    pub exhaustion: ExhaustionPolicy,

    /// Reinforcement: probability of a random next hop
    pub exploration_rate: f64,

    /// PEGASIS: ticks between chain rebuilds
    pub rebuild_period: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        let energy = EnergyModel::default();
        Self {
            algorithm: AlgorithmKind::Pegasis,
            node_spacing: 5,
            x_dim: 40,
            y_dim: 40,
            actuator_count: 4,
            comm_range: 10,
            sensor_period: 200,
            high_load_sensor_period: 200,
            output_filename: PathBuf::from("output.tab"),
            seed: 15,
            target_messages: 200,
            update_period: 5,
            max_cooldown: 10_000,
            initial_battery: energy.default_capacity(),
            energy,
            exhaustion: ExhaustionPolicy::Deactivate,
            exploration_rate: 0.0,
            rebuild_period: 2000,
        }
    }
}

impl SimConfig {
    /// Checks the grid parameters and every period.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.node_spacing == 0 {
            return Err(SimError::InvalidPeriod("node_spacing"));
        }
        if self.node_spacing > self.comm_range {
            return Err(SimError::spacing(self.node_spacing, self.comm_range));
        }
        if self.x_dim == 0 || self.y_dim == 0 {
            return Err(SimError::EmptyField);
        }
        self.validate_periods()
    }

    /// Checks the parameters used as divisors during a run.
    pub fn validate_periods(&self) -> Result<(), SimError> {
        if self.sensor_period == 0 {
            return Err(SimError::InvalidPeriod("sensor_period"));
        }
        if self.high_load_sensor_period == 0 {
            return Err(SimError::InvalidPeriod("high_load_sensor_period"));
        }
        if self.update_period == 0 {
            return Err(SimError::InvalidPeriod("update_period"));
        }
        if self.rebuild_period == 0 {
            return Err(SimError::InvalidPeriod("rebuild_period"));
        }
        Ok(())
    }

    /// Grid positions in placement order: x outer, y inner.
    pub fn grid_positions(&self) -> Vec<(i32, i32)> {
        let step = self.node_spacing.max(1) as usize;
        let mut positions = Vec::new();
        for x in (0..self.x_dim).step_by(step) {
            for y in (0..self.y_dim).step_by(step) {
                positions.push((x as i32, y as i32));
            }
        }
        positions
    }

    /// Sensor period of a node at `(x, y)`.
    ///
    /// The field is cut into a 10×10 cell grid; cells 3 and 4 on both axes
    /// form the hotspot.
    pub fn sensor_period_at(&self, x: i32, y: i32) -> u64 {
        let cell = |v: i32, dim: u32| (v.max(0) as u64 * u64::from(HOTSPOT_GRID)) / u64::from(dim.max(1));
        let hot = |c: u64| (3..=4).contains(&c);
        if hot(cell(x, self.x_dim)) && hot(cell(y, self.y_dim)) {
            self.high_load_sensor_period
        } else {
            self.sensor_period
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.seed, 15);
        assert_eq!(config.initial_battery, 170_000.0);
        assert_eq!(config.grid_positions().len(), 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_wide_spacing() {
        let config = SimConfig {
            node_spacing: 6,
            comm_range: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::SpacingExceedsRange { spacing: 6, range: 5 })
        ));

        let config = SimConfig {
            sensor_period: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_grid_is_column_major() {
        let config = SimConfig {
            x_dim: 10,
            y_dim: 10,
            node_spacing: 5,
            comm_range: 5,
            ..Default::default()
        };
        assert_eq!(config.grid_positions(), vec![(0, 0), (0, 5), (5, 0), (5, 5)]);
    }

    #[test]
    fn test_hotspot_period() {
        let config = SimConfig {
            x_dim: 100,
            y_dim: 100,
            sensor_period: 200,
            high_load_sensor_period: 20,
            ..Default::default()
        };
        assert_eq!(config.sensor_period_at(35, 45), 20);
        assert_eq!(config.sensor_period_at(35, 55), 200);
        assert_eq!(config.sensor_period_at(0, 0), 200);
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{ "algorithm": "raser", "comm_range": 12 }"#;
        let config: SimConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.algorithm, AlgorithmKind::Raser);
        assert_eq!(config.comm_range, 12);
        assert_eq!(config.sensor_period, 200);
    }
}
