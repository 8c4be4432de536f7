//! Stationary network nodes.

use crate::algorithm::RoutingAlgorithm;
use crate::energy::Battery;
use crate::message::Message;
use crate::queue::MessageQueue;
use crate::types::{NodeId, Position};
use serde::Serialize;

/// Per-node traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Sensor packets originated here
    pub generated: u64,

    /// Transmissions (a broadcast counts once)
    pub sent: u64,

    /// Packets that landed in the inbox
    pub received: u64,

    /// Packets delivered here as their destination
    pub delivered: u64,
}

/// A node in the field.
///
/// Neighbors and destinations are handles into the owning
/// [`Field`](crate::Field); the node itself never holds references to peers.
pub struct Node<A: RoutingAlgorithm> {
    id: NodeId,
    position: Position,

    /// Whether this node originates sensor packets
    pub has_sensor: bool,

    active: bool,
    neighbors: Vec<NodeId>,
    destinations: Vec<NodeId>,

    /// Packets received from neighbors, time-gated by hop timestamp
    pub inbox: MessageQueue<A::MessageState>,

    /// Packets scheduled for transmission; one leaves per tick
    pub outbox: MessageQueue<A::MessageState>,

    battery: Battery,

    /// Traffic counters
    pub stats: NodeStats,

    num_ticks: u64,

    /// Ticks between sensor readings
    pub sensor_period: u64,

    /// Algorithm-private state
    pub state: A::NodeState,
}

impl<A: RoutingAlgorithm> Node<A> {
    /// Creates an active node with an empty neighbor list.
    pub fn new(id: NodeId, position: Position, has_sensor: bool, battery: f64) -> Self {
        Self {
            id,
            position,
            has_sensor,
            active: true,
            neighbors: Vec::new(),
            destinations: Vec::new(),
            inbox: MessageQueue::new(),
            outbox: MessageQueue::new(),
            battery: Battery::new(battery),
            stats: NodeStats::default(),
            num_ticks: 0,
            sensor_period: 1,
            state: A::NodeState::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// 1-based node label.
    pub fn label(&self) -> u32 {
        self.id.label()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Recharges the battery (when `charge` is given) and wakes the node if
    /// any charge remains.
    pub fn activate(&mut self, charge: Option<f64>) -> bool {
        if let Some(charge) = charge {
            self.battery.recharge(charge);
        }
        self.active = !self.battery.is_exhausted();
        self.active
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn destinations(&self) -> &[NodeId] {
        &self.destinations
    }

    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    pub(crate) fn battery_mut(&mut self) -> &mut Battery {
        &mut self.battery
    }

    /// Local clock: number of active ticks so far.
    pub fn now(&self) -> u64 {
        self.num_ticks
    }

    pub(crate) fn advance_clock(&mut self) -> u64 {
        self.num_ticks += 1;
        self.num_ticks
    }

    /// Records `neighbor` without notifying the algorithm.
    ///
    /// Returns false for duplicates and for the node itself.
    pub fn add_neighbor_raw(&mut self, neighbor: NodeId) -> bool {
        if neighbor == self.id || self.neighbors.contains(&neighbor) {
            return false;
        }
        self.neighbors.push(neighbor);
        true
    }

    /// Registers a sink this node may address.
    pub fn add_destination(&mut self, destination: NodeId) {
        if !self.destinations.contains(&destination) {
            self.destinations.push(destination);
        }
    }

    /// Lands a packet in the inbox and pays the receive cost.
    pub fn receive_message(&mut self, msg: Message<A::MessageState>, recv_cost: f64) {
        self.battery.debit(recv_cost);
        self.inbox.push(msg);
        self.stats.received += 1;
    }

    pub fn distance_to(&self, other: &Node<A>) -> u32 {
        self.position.distance_to(&other.position)
    }
}

impl<A: RoutingAlgorithm> std::fmt::Debug for Node<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("position", &(self.position.x(), self.position.y()))
            .field("active", &self.active)
            .field("neighbors", &self.neighbors.len())
            .field("stats", &self.stats)
            .finish()
    }
}
