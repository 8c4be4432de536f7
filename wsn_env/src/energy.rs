//! Energy accounting for node radios.

use serde::{Deserialize, Serialize};

/// Charge drawn by one unicast or broadcast transmission (mA).
pub const MSG_SEND_COST: f64 = 170.0;

/// Charge drawn by receiving one packet (mA).
pub const MSG_RECV_COST: f64 = 50.0;

/// Charge drawn by staying awake for one tick (mA).
pub const AWAKE_COST: f64 = 15.0;

/// Per-operation energy costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyModel {
    pub send_cost: f64,
    pub recv_cost: f64,
    pub awake_cost: f64,
}

impl EnergyModel {
    /// Default starting charge: a thousand transmissions' worth.
    pub fn default_capacity(&self) -> f64 {
        self.send_cost * 1000.0
    }
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self {
            send_cost: MSG_SEND_COST,
            recv_cost: MSG_RECV_COST,
            awake_cost: AWAKE_COST,
        }
    }
}

/// What happens to a node whose battery reaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// The node goes inactive and stops ticking
    #[default]
    Deactivate,

    /// The node keeps running on a negative balance
    Continue,
}

/// Remaining and consumed charge (mAh).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battery {
    remaining: f64,
    used: f64,
}

impl Battery {
    /// Creates a full battery.
    pub fn new(capacity: f64) -> Self {
        Self {
            remaining: capacity,
            used: 0.0,
        }
    }

    /// Draws `cost` from the battery. The balance may go negative.
    pub fn debit(&mut self, cost: f64) {
        self.remaining -= cost;
        self.used += cost;
    }

    /// Replaces the remaining charge.
    pub fn recharge(&mut self, charge: f64) {
        self.remaining = charge;
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn used(&self) -> f64 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_debit() {
        let mut battery = Battery::new(1000.0);
        battery.debit(AWAKE_COST);
        battery.debit(MSG_SEND_COST);

        assert_eq!(battery.remaining(), 815.0);
        assert_eq!(battery.used(), 185.0);
        assert!(!battery.is_exhausted());

        battery.debit(815.0);
        assert!(battery.is_exhausted());
    }

    #[test]
    fn test_default_capacity() {
        let model = EnergyModel::default();
        assert_eq!(model.default_capacity(), 170_000.0);
        assert_eq!(ExhaustionPolicy::default(), ExhaustionPolicy::Deactivate);
    }
}
