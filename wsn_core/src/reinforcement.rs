//! Reinforcement-learning router.
//!
//! Every node keeps a value estimate per (destination, neighbor). A data
//! packet records a signature at each hop; when it reaches its destination it
//! turns into an acknowledgement that retraces the signatures back to the
//! source, and every node on the way learns how far and how long the
//! destination was through the neighbor it picked.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, warn};
use wsn_env::{Message, MessageKind, NodeCtx, NodeId, RoutingAlgorithm};

/// Subtracted from a neighbor's value when it is picked and given back
/// when the acknowledgement returns.
pub const SELECTION_PENALTY: f64 = 10.0;

/// Weight of a fresh sample in the moving average.
pub const LEARNING_RATE: f64 = 0.1;

/// One entry of a packet's travel log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub sender: NodeId,
    pub timestamp: u64,
}

/// Per-packet state: the travel log and return-trip bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct TravelLog {
    signatures: Vec<Signature>,

    /// Set once the destination has seen the packet
    pub arrived: bool,

    /// Hops travelled on the way back
    pub hops_back: u32,
}

impl TravelLog {
    pub fn push_signature(&mut self, sender: NodeId, timestamp: u64) {
        self.signatures.push(Signature { sender, timestamp });
    }

    pub fn pop_signature(&mut self) -> Option<Signature> {
        self.signatures.pop()
    }

    pub fn peek_signature(&self) -> Option<&Signature> {
        self.signatures.last()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Per-node value table, `values[destination][neighbor]`.
#[derive(Debug, Clone, Default)]
pub struct ValueTable {
    values: HashMap<NodeId, HashMap<NodeId, f64>>,
}

impl ValueTable {
    /// Current estimate; unseen pairs start at 0.
    pub fn value(&self, destination: NodeId, neighbor: NodeId) -> f64 {
        self.values
            .get(&destination)
            .and_then(|row| row.get(&neighbor))
            .copied()
            .unwrap_or(0.0)
    }

    fn value_mut(&mut self, destination: NodeId, neighbor: NodeId) -> &mut f64 {
        self.values
            .entry(destination)
            .or_default()
            .entry(neighbor)
            .or_insert(0.0)
    }

    /// Dampens `neighbor` until its acknowledgement comes back.
    pub fn penalize(&mut self, destination: NodeId, neighbor: NodeId) {
        *self.value_mut(destination, neighbor) -= SELECTION_PENALTY;
    }

    /// Undoes the selection penalty and folds in a new sample.
    pub fn update(&mut self, destination: NodeId, neighbor: NodeId, distance: f64, time: f64) {
        let value = self.value_mut(destination, neighbor);
        *value += SELECTION_PENALTY;
        *value = (1.0 - LEARNING_RATE) * *value + LEARNING_RATE * -(distance + time);
    }

    /// Highest-valued candidate; ties go to the earliest in `candidates`.
    pub fn best(&self, destination: NodeId, candidates: &[NodeId]) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for &n in candidates {
            let value = self.value(destination, n);
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((n, value)),
            }
        }
        best.map(|(n, _)| n)
    }
}

/// Bandit-style router learning from round-trip acknowledgements.
#[derive(Debug, Clone, Default)]
pub struct Reinforcement {
    exploration_rate: f64,
}

impl Reinforcement {
    /// Creates a purely greedy router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the probability of picking a uniformly random neighbor.
    pub fn with_exploration(mut self, rate: f64) -> Self {
        self.exploration_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    /// Picks the next hop toward `destination` and applies the selection penalty.
    pub fn choose_recipient(
        &self,
        ctx: &mut NodeCtx<'_, Self>,
        destination: NodeId,
    ) -> Option<NodeId> {
        let neighbors = ctx.neighbors().to_vec();
        let choice = if neighbors.contains(&destination) {
            destination
        } else if self.exploration_rate > 0.0 && ctx.rng().gen_bool(self.exploration_rate) {
            *neighbors.choose(ctx.rng())?
        } else {
            ctx.state().best(destination, &neighbors)?
        };

        ctx.state_mut().penalize(destination, choice);
        Some(choice)
    }

    fn forward(&self, ctx: &mut NodeCtx<'_, Self>, mut msg: Message<TravelLog>) {
        let Some(destination) = msg.destination() else {
            warn!("{}: copy {} has no destination, dropping", ctx.id(), msg.label());
            return;
        };
        match self.choose_recipient(ctx, destination) {
            Some(next) => {
                msg.set_hop_destination(next);
                ctx.push_outbox(msg);
            }
            None => warn!("{}: no neighbor toward {}, dropping copy {}", ctx.id(), destination, msg.label()),
        }
    }

    /// Sends an acknowledgement one step back along the travel log.
    fn return_to_sender(ctx: &mut NodeCtx<'_, Self>, mut msg: Message<TravelLog>) {
        match msg.state.peek_signature().map(|sig| sig.sender) {
            Some(next) => {
                msg.set_hop_destination(next);
                ctx.push_outbox(msg);
            }
            None => warn!("{}: broken return path for copy {}", ctx.id(), msg.label()),
        }
    }

    fn handle_arrival(ctx: &mut NodeCtx<'_, Self>, mut msg: Message<TravelLog>) {
        ctx.deliver(&mut msg);
        msg.state.arrived = true;
        msg.set_kind(MessageKind::Ack);
        Self::return_to_sender(ctx, msg);
    }

    fn handle_ack(ctx: &mut NodeCtx<'_, Self>, mut msg: Message<TravelLog>, destination: NodeId) {
        msg.state.hops_back += 1;
        let distance = msg.state.hops_back;

        let Some(sig) = msg.state.pop_signature() else {
            warn!("{}: broken return path for copy {}", ctx.id(), msg.label());
            return;
        };
        if sig.sender != ctx.id() {
            warn!(
                "{}: copy {} carries {}'s signature, dropping",
                ctx.id(),
                msg.label(),
                sig.sender
            );
            return;
        }
        let Some(via) = msg.hop_source else {
            return;
        };

        let time = msg.arrival_time.saturating_sub(sig.timestamp);
        ctx.state_mut()
            .update(destination, via, distance as f64, time as f64);

        if ctx.id() == msg.source() {
            debug!(
                "{}: round trip for copy {} complete, value via {} is {:.2}",
                ctx.id(),
                msg.label(),
                via,
                ctx.state().value(destination, via)
            );
            return;
        }
        Self::return_to_sender(ctx, msg);
    }
}

impl RoutingAlgorithm for Reinforcement {
    type NodeState = ValueTable;
    type MessageState = TravelLog;

    fn name(&self) -> &'static str {
        "reinforcement"
    }

    fn step(&mut self, ctx: &mut NodeCtx<'_, Self>, sensed: Option<Message<TravelLog>>) {
        if let Some(mut msg) = sensed {
            msg.state.push_signature(ctx.id(), ctx.now());
            self.forward(ctx, msg);
            return;
        }

        let Some(mut msg) = ctx.pop_inbox() else {
            return;
        };
        if let Some(from) = msg.hop_source {
            ctx.add_neighbor(self, from);
        }
        let Some(destination) = msg.destination() else {
            warn!("{}: unaddressed copy {}, dropping", ctx.id(), msg.label());
            return;
        };

        if msg.state.arrived {
            Self::handle_ack(ctx, msg, destination);
        } else if destination == ctx.id() {
            Self::handle_arrival(ctx, msg);
        } else {
            msg.state.push_signature(ctx.id(), ctx.now());
            self.forward(ctx, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use wsn_env::{EnergyModel, ExhaustionPolicy, Field};

    #[test]
    fn test_update_undoes_penalty() {
        let mut table = ValueTable::default();
        let (dst, n) = (NodeId(0), NodeId(1));

        table.penalize(dst, n);
        assert_relative_eq!(table.value(dst, n), -10.0);

        table.update(dst, n, 2.0, 8.0);
        assert_relative_eq!(table.value(dst, n), -1.0);

        table.penalize(dst, n);
        table.update(dst, n, 1.0, 4.0);
        assert_relative_eq!(table.value(dst, n), 0.9 * -1.0 + 0.1 * -5.0);
    }

    #[test]
    fn test_best_prefers_first_seen_on_ties() {
        let mut table = ValueTable::default();
        let dst = NodeId(0);
        let candidates = [NodeId(3), NodeId(1), NodeId(2)];

        assert_eq!(table.best(dst, &candidates), Some(NodeId(3)));

        table.penalize(dst, NodeId(3));
        assert_eq!(table.best(dst, &candidates), Some(NodeId(1)));
        assert_eq!(table.best(dst, &[]), None);
    }

    #[test]
    fn test_travel_log_is_a_stack() {
        let mut log = TravelLog::default();
        log.push_signature(NodeId(4), 1);
        log.push_signature(NodeId(2), 3);

        assert_eq!(log.peek_signature().map(|s| s.sender), Some(NodeId(2)));
        assert_eq!(log.pop_signature(), Some(Signature { sender: NodeId(2), timestamp: 3 }));
        assert_eq!(log.len(), 1);
    }

    /// Line 0 - 1 - 2 with the sink at 2 and the sensor at 0.
    fn line() -> (Field<Reinforcement>, Reinforcement) {
        let mut algo = Reinforcement::new();
        let mut field = Field::new(EnergyModel::default(), ExhaustionPolicy::Continue, 15);
        for x in [0, 5, 10] {
            field.add_node((x, 0).into(), false, 1e6);
        }
        field.register_destination(NodeId(2)).unwrap();
        for i in 0..3 {
            field.node_mut(NodeId(i)).unwrap().add_destination(NodeId(2));
        }
        for (a, b) in [(0, 1), (1, 0), (1, 2), (2, 1)] {
            field.add_neighbor(&mut algo, NodeId(a), NodeId(b));
        }
        (field, algo)
    }

    #[test]
    fn test_round_trip_updates_every_hop() {
        let (mut field, mut algo) = line();

        field.tick_node(&mut algo, NodeId(0), true);
        field.tick_node(&mut algo, NodeId(1), false);
        field.tick_node(&mut algo, NodeId(2), false);
        for _ in 0..6 {
            for i in 0..3 {
                field.tick_node(&mut algo, NodeId(i), false);
            }
        }

        let sink = field.node(NodeId(2)).unwrap();
        assert_eq!(sink.stats.delivered, 1);

        // Both penalties were given back and replaced by a negative sample
        let sensor = &field.node(NodeId(0)).unwrap().state;
        let relay = &field.node(NodeId(1)).unwrap().state;
        let via_relay = sensor.value(NodeId(2), NodeId(1));
        let via_sink = relay.value(NodeId(2), NodeId(2));
        assert!(via_relay < 0.0 && via_relay > -SELECTION_PENALTY);
        assert!(via_sink < 0.0 && via_sink > -SELECTION_PENALTY);
        assert!(via_relay < via_sink);

        let arrival = field.logger().arrivals().next().unwrap();
        assert_eq!(arrival.hop_count, 2);
    }

    #[test]
    fn test_direct_neighbor_wins() {
        let (mut field, algo) = line();
        let mut ctx = NodeCtx::new(&mut field, NodeId(1)).unwrap();

        assert_eq!(algo.choose_recipient(&mut ctx, NodeId(2)), Some(NodeId(2)));
        assert_relative_eq!(ctx.state().value(NodeId(2), NodeId(2)), -SELECTION_PENALTY);
    }
}
