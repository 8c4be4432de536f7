//! Acceptance scenarios with literal setups and checks.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// S1: one sensor next to one sink
    TwoNodeDirect,

    /// S2: three-node line, values learned through the middle node
    LineReinforcement,

    /// S3: RASeR hop counts on a small grid
    RaserGradient,

    /// S4: PEGASIS chain order on a line
    PegasisRebuild,

    /// S5: energy accounting for one send
    BatteryDrain,

    /// S6: broadcast reaches every neighbor once
    BroadcastCopies,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::TwoNodeDirect,
            ScenarioId::LineReinforcement,
            ScenarioId::RaserGradient,
            ScenarioId::PegasisRebuild,
            ScenarioId::BatteryDrain,
            ScenarioId::BroadcastCopies,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::TwoNodeDirect => "two_node_direct",
            ScenarioId::LineReinforcement => "line_reinforcement",
            ScenarioId::RaserGradient => "raser_gradient",
            ScenarioId::PegasisRebuild => "pegasis_rebuild",
            ScenarioId::BatteryDrain => "battery_drain",
            ScenarioId::BroadcastCopies => "broadcast_copies",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::TwoNodeDirect => "Sensor beside a sink: 5 packets, 5 single-hop arrivals",
            ScenarioId::LineReinforcement => {
                "Three-node line: 2-hop arrivals, acks teach the sensor its route"
            }
            ScenarioId::RaserGradient => "3x3 grid: hop counts 0/1/2 learned from heartbeats",
            ScenarioId::PegasisRebuild => "Four-node line: furthest-first chain ending at the sink",
            ScenarioId::BatteryDrain => "One send from a 1000-unit battery leaves 815",
            ScenarioId::BroadcastCopies => "Center broadcast: one copy per neighbor, hop count +1",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "two_node_direct" | "s1" => Ok(ScenarioId::TwoNodeDirect),
            "line_reinforcement" | "s2" => Ok(ScenarioId::LineReinforcement),
            "raser_gradient" | "s3" => Ok(ScenarioId::RaserGradient),
            "pegasis_rebuild" | "s4" => Ok(ScenarioId::PegasisRebuild),
            "battery_drain" | "s5" => Ok(ScenarioId::BatteryDrain),
            "broadcast_copies" | "s6" => Ok(ScenarioId::BroadcastCopies),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
