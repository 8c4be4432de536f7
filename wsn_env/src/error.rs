//! Error types for the WSN simulation primitives.

use thiserror::Error;

/// Errors raised while building or driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Grid spacing wider than the radio range leaves the field disconnected
    #[error("Node spacing {spacing} exceeds communication range {range}")]
    SpacingExceedsRange { spacing: u32, range: u32 },

    /// Every node would be an actuator, leaving nothing to sense
    #[error("Actuator count {actuators} must be smaller than node count {nodes}")]
    TooManyActuators { actuators: usize, nodes: usize },

    /// The field dimensions produced no nodes at all
    #[error("Field contains no nodes")]
    EmptyField,

    /// A period or spacing parameter that must be positive was zero
    #[error("Invalid configuration: {0} must be positive")]
    InvalidPeriod(&'static str),

    /// A unicast left the outbox without a next hop
    #[error("Node {node} tried to unicast message {message} without a hop destination")]
    MissingHopDestination { node: u32, message: u64 },

    /// A handle that does not belong to this field
    #[error("Unknown node index {0}")]
    UnknownNode(usize),

    /// Writing the hop log failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Creates a spacing/range mismatch error.
    pub fn spacing(spacing: u32, range: u32) -> Self {
        Self::SpacingExceedsRange { spacing, range }
    }

    /// Creates an actuator overflow error.
    pub fn too_many_actuators(actuators: usize, nodes: usize) -> Self {
        Self::TooManyActuators { actuators, nodes }
    }

    /// Returns true for errors caused by the run configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::SpacingExceedsRange { .. }
                | Self::TooManyActuators { .. }
                | Self::EmptyField
                | Self::InvalidPeriod(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimError::spacing(6, 5);
        assert_eq!(err.to_string(), "Node spacing 6 exceeds communication range 5");
        assert!(err.is_config_error());

        let err = SimError::MissingHopDestination { node: 3, message: 9 };
        assert!(!err.is_config_error());
    }
}
