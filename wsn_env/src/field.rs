//! The node arena and its transmission plumbing.
//!
//! [`Field`] owns every node of a run and performs all physical-layer work:
//! unicast, broadcast, energy debits, hop logging. A routing algorithm sees
//! one node at a time through [`NodeCtx`].

use crate::algorithm::RoutingAlgorithm;
use crate::energy::{EnergyModel, ExhaustionPolicy};
use crate::error::SimError;
use crate::logger::{HopLogEntry, HopLogger};
use crate::message::{Message, MessageKind};
use crate::node::Node;
use crate::types::{MessageId, NodeId, Position};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

/// Contents of every sensor reading.
pub const SENSOR_CONTENTS: &str = "Sensor Data";

/// All nodes of a run plus the shared counters and RNG.
pub struct Field<A: RoutingAlgorithm> {
    nodes: Vec<Node<A>>,
    destinations: Vec<NodeId>,
    energy: EnergyModel,
    exhaustion: ExhaustionPolicy,
    logger: HopLogger,
    next_envelope: u64,
    next_label: u64,
    rng: ChaCha8Rng,
}

impl<A: RoutingAlgorithm> Field<A> {
    /// Creates an empty field with a seeded RNG.
    pub fn new(energy: EnergyModel, exhaustion: ExhaustionPolicy, seed: u64) -> Self {
        Self {
            nodes: Vec::new(),
            destinations: Vec::new(),
            energy,
            exhaustion,
            logger: HopLogger::new(),
            next_envelope: 1,
            next_label: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Places a node and returns its handle.
    pub fn add_node(&mut self, position: Position, has_sensor: bool, battery: f64) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, position, has_sensor, battery));
        id
    }

    /// Marks `id` as a sink.
    pub fn register_destination(&mut self, id: NodeId) -> Result<(), SimError> {
        if id.index() >= self.nodes.len() {
            return Err(SimError::UnknownNode(id.index()));
        }
        if !self.destinations.contains(&id) {
            self.destinations.push(id);
        }
        Ok(())
    }

    /// Adds `b` to `a`'s neighbor list and notifies the algorithm if it was new.
    pub fn add_neighbor(&mut self, algo: &mut A, a: NodeId, b: NodeId) -> bool {
        if b.index() >= self.nodes.len() {
            return false;
        }
        let Some(node) = self.nodes.get_mut(a.index()) else {
            return false;
        };
        if !node.add_neighbor_raw(b) {
            return false;
        }
        algo.on_neighbor_added(node, b);
        true
    }

    pub fn nodes(&self) -> &[Node<A>] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node<A>] {
        &mut self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<A>> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<A>> {
        self.nodes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn destinations(&self) -> &[NodeId] {
        &self.destinations
    }

    /// Handles of the active nodes, in label order.
    pub fn active_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_active())
            .map(|n| n.id())
            .collect()
    }

    pub fn energy(&self) -> &EnergyModel {
        &self.energy
    }

    pub fn exhaustion(&self) -> ExhaustionPolicy {
        self.exhaustion
    }

    pub fn logger(&self) -> &HopLogger {
        &self.logger
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    fn next_label(&mut self) -> u64 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Creates a packet with a fresh envelope id and copy label.
    pub fn allocate_message(
        &mut self,
        source: NodeId,
        destination: Option<NodeId>,
        contents: impl Into<String>,
        start_time: u64,
        kind: MessageKind,
    ) -> Message<A::MessageState> {
        let id = MessageId(self.next_envelope);
        self.next_envelope += 1;
        let label = self.next_label();
        Message::new(id, label, source, destination, contents, start_time, kind)
    }

    /// Builds a sensor packet from `id` to a uniformly chosen destination.
    pub fn package_sensor_data(
        &mut self,
        algo: &mut A,
        id: NodeId,
    ) -> Option<Message<A::MessageState>> {
        let node = self.nodes.get(id.index())?;
        let now = node.now();
        let Some(&destination) = node.destinations().choose(&mut self.rng) else {
            warn!("{} sensed with no destination to report to", id);
            return None;
        };

        let mut msg = self.allocate_message(
            id,
            Some(destination),
            SENSOR_CONTENTS,
            now,
            MessageKind::Data,
        );
        algo.on_message_init(&mut msg);
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.stats.generated += 1;
        }
        Some(msg)
    }

    /// Lands a packet in `to`'s inbox. Inactive nodes do not listen.
    pub fn receive_message(&mut self, to: NodeId, msg: Message<A::MessageState>) {
        let recv_cost = self.energy.recv_cost;
        match self.nodes.get_mut(to.index()) {
            Some(node) if node.is_active() => node.receive_message(msg, recv_cost),
            Some(_) => trace!("{} is down, dropping copy {}", to, msg.label()),
            None => warn!("copy {} addressed to unknown {}", msg.label(), to),
        }
    }

    /// Unicasts `msg` from `from` to its hop destination.
    pub fn send_message(
        &mut self,
        from: NodeId,
        mut msg: Message<A::MessageState>,
    ) -> Result<(), SimError> {
        let send_cost = self.energy.send_cost;
        let node = self
            .nodes
            .get_mut(from.index())
            .ok_or(SimError::UnknownNode(from.index()))?;
        let Some(to) = msg.hop_destination else {
            return Err(SimError::MissingHopDestination {
                node: from.label(),
                message: msg.label(),
            });
        };

        let now = node.now();
        msg.hop_source = Some(from);
        msg.hop_count += 1;
        msg.hop_timestamp = now;
        node.battery_mut().debit(send_cost);
        node.stats.sent += 1;

        trace!("{} -> {}: copy {} hop {}", from, to, msg.label(), msg.hop_count);
        self.logger.add_entry(HopLogEntry::from_hop(&msg, now));
        self.receive_message(to, msg);
        Ok(())
    }

    /// Sends an independent copy of `msg` to every neighbor of `from`.
    ///
    /// The transmission is paid for once; every copy gets its own label.
    pub fn broadcast(&mut self, from: NodeId, mut msg: Message<A::MessageState>) {
        let send_cost = self.energy.send_cost;
        let Some(node) = self.nodes.get_mut(from.index()) else {
            warn!("broadcast from unknown {}", from);
            return;
        };

        let now = node.now();
        msg.hop_source = Some(from);
        msg.hop_count += 1;
        msg.hop_timestamp = now;
        node.battery_mut().debit(send_cost);
        node.stats.sent += 1;
        let neighbors = node.neighbors().to_vec();

        trace!("{} broadcasts copy {} to {} neighbors", from, msg.label(), neighbors.len());
        for neighbor in neighbors {
            let label = self.next_label();
            let mut copy = msg.copy_with_label(label);
            copy.set_hop_destination(neighbor);
            self.logger.add_entry(HopLogEntry::from_hop(&copy, now));
            self.receive_message(neighbor, copy);
        }
    }

    /// Runs one tick of node `id`.
    ///
    /// Advances its clock, pays the awake cost, packages a sensor packet if
    /// `sensed`, runs the algorithm step, then transmits at most one outbox
    /// item.
    pub fn tick_node(&mut self, algo: &mut A, id: NodeId, sensed: bool) {
        let awake_cost = self.energy.awake_cost;
        let Some(node) = self.nodes.get_mut(id.index()) else {
            return;
        };
        if !node.is_active() {
            return;
        }
        node.advance_clock();
        node.battery_mut().debit(awake_cost);

        let sensor_msg = if sensed {
            self.package_sensor_data(algo, id)
        } else {
            None
        };

        if let Some(mut ctx) = NodeCtx::new(self, id) {
            algo.step(&mut ctx, sensor_msg);
        }

        let outgoing = self.nodes[id.index()].outbox.pop();
        if let Some(msg) = outgoing {
            if msg.hop_destination.is_none() {
                self.broadcast(id, msg);
            } else if let Err(err) = self.send_message(id, msg) {
                warn!("{}: {}", id, err);
            }
        }

        let node = &mut self.nodes[id.index()];
        if self.exhaustion == ExhaustionPolicy::Deactivate && node.battery().is_exhausted() {
            debug!("{} battery exhausted at t={}", id, node.now());
            node.deactivate();
        }
    }
}

/// One node's view of the field during its step.
pub struct NodeCtx<'a, A: RoutingAlgorithm> {
    field: &'a mut Field<A>,
    id: NodeId,
}

impl<'a, A: RoutingAlgorithm> NodeCtx<'a, A> {
    /// Creates a context for `id`, or `None` if `id` is not in `field`.
    pub fn new(field: &'a mut Field<A>, id: NodeId) -> Option<Self> {
        if id.index() < field.len() {
            Some(Self { field, id })
        } else {
            None
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> u32 {
        self.id.label()
    }

    /// The node's local clock.
    pub fn now(&self) -> u64 {
        self.node().now()
    }

    pub fn node(&self) -> &Node<A> {
        &self.field.nodes[self.id.index()]
    }

    pub fn node_mut(&mut self) -> &mut Node<A> {
        &mut self.field.nodes[self.id.index()]
    }

    pub fn state(&self) -> &A::NodeState {
        &self.node().state
    }

    pub fn state_mut(&mut self) -> &mut A::NodeState {
        &mut self.node_mut().state
    }

    /// Another node, read-only.
    pub fn peer(&self, id: NodeId) -> Option<&Node<A>> {
        self.field.node(id)
    }

    /// Another node's algorithm state.
    pub fn peer_state_mut(&mut self, id: NodeId) -> Option<&mut A::NodeState> {
        self.field.node_mut(id).map(|n| &mut n.state)
    }

    pub fn neighbors(&self) -> &[NodeId] {
        self.node().neighbors()
    }

    pub fn destinations(&self) -> &[NodeId] {
        self.node().destinations()
    }

    pub fn position_of(&self, id: NodeId) -> Option<Position> {
        self.field.node(id).map(|n| n.position())
    }

    /// Returns true if an inbox item is visible this tick.
    pub fn has_inbox(&self) -> bool {
        !self.node().inbox.is_empty_at(self.now())
    }

    /// Pops the first inbox item visible this tick.
    pub fn pop_inbox(&mut self) -> Option<Message<A::MessageState>> {
        let now = self.now();
        self.node_mut().inbox.pop_ready(now)
    }

    /// Schedules a packet; `hop_destination == None` means broadcast.
    pub fn push_outbox(&mut self, msg: Message<A::MessageState>) {
        self.node_mut().outbox.push(msg);
    }

    pub fn outbox_is_empty(&self) -> bool {
        self.node().outbox.is_empty()
    }

    /// Adds a neighbor, notifying the algorithm if it is new.
    pub fn add_neighbor(&mut self, algo: &mut A, neighbor: NodeId) -> bool {
        self.field.add_neighbor(algo, self.id, neighbor)
    }

    /// Records delivery of `msg` at this node.
    pub fn deliver(&mut self, msg: &mut Message<A::MessageState>) {
        let now = self.now();
        if msg.arrival_time == 0 {
            msg.arrival_time = now;
        }
        self.node_mut().stats.delivered += 1;
        debug!(
            "{} delivered copy {} from {} after {} hops, travel time {}",
            self.id,
            msg.label(),
            msg.source(),
            msg.hop_count,
            msg.travel_time()
        );
    }

    /// Unicasts immediately, bypassing the outbox.
    pub fn send_now(&mut self, msg: Message<A::MessageState>) -> Result<(), SimError> {
        self.field.send_message(self.id, msg)
    }

    /// Broadcasts immediately, bypassing the outbox.
    pub fn broadcast_now(&mut self, msg: Message<A::MessageState>) {
        self.field.broadcast(self.id, msg);
    }

    /// Creates a packet originating here at the current time.
    pub fn new_message(
        &mut self,
        destination: Option<NodeId>,
        contents: &str,
        kind: MessageKind,
    ) -> Message<A::MessageState> {
        let now = self.now();
        self.field
            .allocate_message(self.id, destination, contents, now, kind)
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.field.rng()
    }

    pub fn field(&self) -> &Field<A> {
        &*self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::{AWAKE_COST, MSG_RECV_COST, MSG_SEND_COST};

    /// Sends every sensor packet straight to its destination and drops the rest.
    #[derive(Default)]
    struct Direct {
        steps: u32,
    }

    impl RoutingAlgorithm for Direct {
        type NodeState = u32;
        type MessageState = Vec<u32>;

        fn name(&self) -> &'static str {
            "direct"
        }

        fn on_neighbor_added(&mut self, node: &mut Node<Self>, _neighbor: NodeId) {
            node.state += 1;
        }

        fn step(&mut self, ctx: &mut NodeCtx<'_, Self>, sensed: Option<Message<Vec<u32>>>) {
            self.steps += 1;
            if let Some(mut msg) = sensed {
                msg.hop_destination = msg.destination();
                ctx.push_outbox(msg);
            }
            while let Some(mut msg) = ctx.pop_inbox() {
                if msg.destination() == Some(ctx.id()) {
                    ctx.deliver(&mut msg);
                }
            }
        }
    }

    fn field_with(positions: &[(i32, i32)], battery: f64) -> Field<Direct> {
        let mut field = Field::new(EnergyModel::default(), ExhaustionPolicy::Deactivate, 15);
        for &p in positions {
            field.add_node(p.into(), true, battery);
        }
        field
    }

    fn wire_all(field: &mut Field<Direct>, algo: &mut Direct) {
        let ids: Vec<NodeId> = field.nodes().iter().map(|n| n.id()).collect();
        for &a in &ids {
            for &b in &ids {
                field.add_neighbor(algo, a, b);
            }
        }
    }

    #[test]
    fn test_add_neighbor_is_idempotent() {
        let mut algo = Direct::default();
        let mut field = field_with(&[(0, 0), (1, 0)], 100.0);

        assert!(field.add_neighbor(&mut algo, NodeId(0), NodeId(1)));
        assert!(!field.add_neighbor(&mut algo, NodeId(0), NodeId(1)));
        assert!(!field.add_neighbor(&mut algo, NodeId(0), NodeId(0)));
        assert!(!field.add_neighbor(&mut algo, NodeId(0), NodeId(7)));

        let node = field.node(NodeId(0)).unwrap();
        assert_eq!(node.neighbors(), &[NodeId(1)]);
        assert_eq!(node.state, 1);
    }

    #[test]
    fn test_sensing_tick_drains_battery() {
        let mut algo = Direct::default();
        let mut field = field_with(&[(0, 0), (5, 0)], 1000.0);
        field.register_destination(NodeId(1)).unwrap();
        field.node_mut(NodeId(0)).unwrap().add_destination(NodeId(1));

        field.tick_node(&mut algo, NodeId(0), true);

        let sensor = field.node(NodeId(0)).unwrap();
        assert_eq!(sensor.battery().remaining(), 1000.0 - AWAKE_COST - MSG_SEND_COST);
        assert_eq!(sensor.stats.generated, 1);
        assert_eq!(sensor.stats.sent, 1);

        let sink = field.node(NodeId(1)).unwrap();
        assert_eq!(sink.battery().remaining(), 1000.0 - MSG_RECV_COST);
        assert_eq!(sink.stats.received, 1);
        assert_eq!(field.logger().len(), 1);
        assert!(field.logger().entries()[0].arrival_hop);
    }

    #[test]
    fn test_broadcast_makes_independent_copies() {
        let mut algo = Direct::default();
        let mut field = field_with(&[(0, 0), (1, 0), (0, 1), (1, 1), (2, 2)], 1000.0);
        wire_all(&mut field, &mut algo);

        let mut msg = field.allocate_message(NodeId(0), None, "hello", 0, MessageKind::Heartbeat);
        msg.hop_count = 2;
        let envelope = msg.id();
        field.broadcast(NodeId(0), msg);

        let mut labels = Vec::new();
        for i in 1..5 {
            let node = field.node_mut(NodeId(i)).unwrap();
            assert_eq!(node.inbox.len(), 1);
            let copy = node.inbox.iter().next().unwrap();
            assert_eq!(copy.id(), envelope);
            assert_eq!(copy.hop_count, 3);
            assert_eq!(copy.hop_destination, Some(NodeId(i)));
            labels.push(copy.label());
        }
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 4);

        // Mutating one copy leaves the others untouched
        let mut first = field.node_mut(NodeId(1)).unwrap().inbox.pop().unwrap();
        first.state.push(42);
        let second = field.node_mut(NodeId(2)).unwrap().inbox.pop().unwrap();
        assert!(second.state.is_empty());

        let sender = field.node(NodeId(0)).unwrap();
        assert_eq!(sender.stats.sent, 1);
        assert_eq!(sender.battery().remaining(), 1000.0 - MSG_SEND_COST);
    }

    #[test]
    fn test_unicast_without_hop_destination_fails() {
        let mut field = field_with(&[(0, 0)], 100.0);
        let msg = field.allocate_message(NodeId(0), None, "", 0, MessageKind::Data);
        let err = field.send_message(NodeId(0), msg).unwrap_err();
        assert!(matches!(err, SimError::MissingHopDestination { node: 1, .. }));
    }

    #[test]
    fn test_inbox_visible_next_tick() {
        let mut algo = Direct::default();
        let mut field = field_with(&[(0, 0), (5, 0)], 1000.0);
        field.register_destination(NodeId(1)).unwrap();
        field.node_mut(NodeId(0)).unwrap().add_destination(NodeId(1));
        field.node_mut(NodeId(1)).unwrap().has_sensor = false;

        // The sensor transmits before the sink runs in the same global tick
        field.tick_node(&mut algo, NodeId(0), true);
        field.tick_node(&mut algo, NodeId(1), false);
        assert_eq!(field.node(NodeId(1)).unwrap().stats.received, 1);
        assert_eq!(field.node(NodeId(1)).unwrap().stats.delivered, 0);

        field.tick_node(&mut algo, NodeId(1), false);
        assert_eq!(field.node(NodeId(1)).unwrap().stats.delivered, 1);
    }

    #[test]
    fn test_exhausted_node_deactivates() {
        let mut algo = Direct::default();
        let mut field = field_with(&[(0, 0)], 20.0);

        field.tick_node(&mut algo, NodeId(0), false);
        assert!(field.node(NodeId(0)).unwrap().is_active());
        field.tick_node(&mut algo, NodeId(0), false);
        assert!(!field.node(NodeId(0)).unwrap().is_active());

        field.tick_node(&mut algo, NodeId(0), false);
        assert_eq!(algo.steps, 2);
        assert!(field.active_nodes().is_empty());

        let node = field.node_mut(NodeId(0)).unwrap();
        assert!(!node.activate(None));
        assert!(node.activate(Some(50.0)));
    }

    #[test]
    fn test_node_ctx_rejects_unknown_id() {
        let mut field = field_with(&[(0, 0), (5, 0)], 100.0);
        assert!(NodeCtx::new(&mut field, NodeId(2)).is_none());
        assert!(NodeCtx::new(&mut field, NodeId(99)).is_none());

        let ctx = NodeCtx::new(&mut field, NodeId(1)).unwrap();
        assert_eq!(ctx.id(), NodeId(1));
    }
}
