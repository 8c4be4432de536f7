//! PEGASIS-style chain routing.
//!
//! Every `rebuild_period` ticks a chain is built per destination by picking
//! the node furthest from it again and again. The sink hangs off the right
//! end of the chain. A token walks the chain, each holder handing its
//! buffered packets to the next node. The leader's sweep covers the whole
//! chain and ends by unicasting everything it gathered to the sink, after
//! which leadership moves one node to the left.

use std::collections::HashMap;
use tracing::{debug, warn};
use wsn_env::{Message, MessageKind, Node, NodeCtx, NodeId, RoutingAlgorithm};

/// Ticks between chain rebuilds.
pub const DEFAULT_REBUILD_PERIOD: u64 = 2000;

/// A node's place in one destination's chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainLink {
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub disconnected: bool,
    pub is_leader: bool,
}

/// Per-node state.
#[derive(Debug, Default)]
pub struct PegasisState {
    /// Chain position, keyed by destination
    pub links: HashMap<NodeId, ChainLink>,

    /// Packets waiting for the token
    pub held: Vec<Message<()>>,
}

/// Where the token is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    MovingLeft,
    MovingRight,
    SecondRoundLeft,
    SecondRoundRight,
    AtSink,
}

/// Chain-wide state for one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    pub leader: NodeId,
    pub token: NodeId,
    /// First tick at which the token holder may act
    pub token_ready_at: u64,
    pub leftmost: NodeId,
    pub rightmost: NodeId,
    /// Last node before the sink
    pub tail: NodeId,
    pub sweep: Sweep,
}

/// Picks the token's next holder.
///
/// `left` and `right` are the holder's chain neighbors with the sink
/// already excluded. Returns `None` when the leader's sweep is complete.
pub fn next_hop(
    sweep: Sweep,
    is_leader: bool,
    left: Option<NodeId>,
    right: Option<NodeId>,
) -> (Sweep, Option<NodeId>) {
    use self::Sweep::*;

    if is_leader {
        return match sweep {
            MovingLeft => match (left, right) {
                (Some(l), _) => (MovingLeft, Some(l)),
                (None, Some(r)) => (SecondRoundRight, Some(r)),
                (None, None) => (AtSink, None),
            },
            MovingRight | SecondRoundRight => match right {
                Some(r) => (SecondRoundRight, Some(r)),
                None => (AtSink, None),
            },
            SecondRoundLeft | AtSink => (AtSink, None),
        };
    }

    match sweep {
        MovingLeft => match (left, right) {
            (Some(l), _) => (MovingLeft, Some(l)),
            (None, Some(r)) => (MovingRight, Some(r)),
            (None, None) => (AtSink, None),
        },
        MovingRight => match (right, left) {
            (Some(r), _) => (MovingRight, Some(r)),
            (None, Some(l)) => (MovingLeft, Some(l)),
            (None, None) => (AtSink, None),
        },
        SecondRoundLeft => match (left, right) {
            (Some(l), _) => (SecondRoundLeft, Some(l)),
            (None, Some(r)) => (SecondRoundRight, Some(r)),
            (None, None) => (AtSink, None),
        },
        SecondRoundRight => match (right, left) {
            (Some(r), _) => (SecondRoundRight, Some(r)),
            (None, Some(l)) => (SecondRoundLeft, Some(l)),
            (None, None) => (AtSink, None),
        },
        AtSink => (AtSink, None),
    }
}

/// The chain router.
#[derive(Debug, Clone)]
pub struct Pegasis {
    rebuild_period: u64,
    tick: u64,
    chains: HashMap<NodeId, ChainState>,
}

impl Default for Pegasis {
    fn default() -> Self {
        Self::new(DEFAULT_REBUILD_PERIOD)
    }
}

impl Pegasis {
    pub fn new(rebuild_period: u64) -> Self {
        Self {
            rebuild_period: rebuild_period.max(1),
            tick: 0,
            chains: HashMap::new(),
        }
    }

    pub fn chain(&self, destination: NodeId) -> Option<&ChainState> {
        self.chains.get(&destination)
    }

    /// Chain order from `leftmost` to the sink, following `right` links.
    pub fn chain_order(&self, nodes: &[Node<Self>], destination: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let Some(chain) = self.chains.get(&destination) else {
            return order;
        };
        let mut cursor = Some(chain.leftmost);
        while let Some(id) = cursor {
            if order.contains(&id) || order.len() > nodes.len() {
                break;
            }
            order.push(id);
            cursor = nodes
                .get(id.index())
                .and_then(|n| n.state.links.get(&destination))
                .and_then(|link| link.right);
        }
        order
    }

    /// Rebuilds the chain toward `destination` over the `active` nodes.
    fn build_chain(&mut self, nodes: &mut [Node<Self>], active: &[NodeId], destination: NodeId) {
        let Some(sink_position) = nodes.get(destination.index()).map(|n| n.position()) else {
            return;
        };
        if !active.contains(&destination) {
            self.chains.remove(&destination);
            return;
        }

        for node in nodes.iter_mut() {
            let link = ChainLink {
                disconnected: node.id() != destination && active.contains(&node.id()),
                ..ChainLink::default()
            };
            node.state.links.insert(destination, link);
        }

        let mut order: Vec<NodeId> = Vec::new();
        loop {
            let mut furthest: Option<(NodeId, u32)> = None;
            for &id in active {
                let node = &nodes[id.index()];
                if !node.state.links.get(&destination).is_some_and(|l| l.disconnected) {
                    continue;
                }
                let distance = node.position().distance_to(&sink_position);
                match furthest {
                    Some((_, best)) if distance <= best => {}
                    _ => furthest = Some((id, distance)),
                }
            }
            let Some((id, _)) = furthest else {
                break;
            };
            if let Some(link) = nodes[id.index()].state.links.get_mut(&destination) {
                link.disconnected = false;
            }
            order.push(id);
        }

        let (Some(&leftmost), Some(&tail)) = (order.first(), order.last()) else {
            self.chains.remove(&destination);
            return;
        };
        order.push(destination);
        for pair in order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if let Some(link) = nodes[a.index()].state.links.get_mut(&destination) {
                link.right = Some(b);
            }
            if let Some(link) = nodes[b.index()].state.links.get_mut(&destination) {
                link.left = Some(a);
            }
        }
        if let Some(link) = nodes[leftmost.index()].state.links.get_mut(&destination) {
            link.is_leader = true;
        }

        debug!(
            "chain to {} rebuilt: {} nodes, leader {}",
            destination,
            order.len(),
            leftmost
        );
        self.chains.insert(
            destination,
            ChainState {
                leader: leftmost,
                token: leftmost,
                token_ready_at: self.tick,
                leftmost,
                rightmost: destination,
                tail,
                sweep: Sweep::MovingLeft,
            },
        );
    }

    /// Unicasts every held packet for `destination` to `to`.
    fn hand_over(ctx: &mut NodeCtx<'_, Self>, destination: NodeId, to: NodeId) {
        let held = std::mem::take(&mut ctx.state_mut().held);
        let (outgoing, kept): (Vec<_>, Vec<_>) = held
            .into_iter()
            .partition(|m| m.destination() == Some(destination));
        ctx.state_mut().held = kept;

        for mut msg in outgoing {
            msg.set_hop_destination(to);
            if let Err(err) = ctx.send_now(msg) {
                warn!("{}: {}", ctx.id(), err);
            }
        }
    }

    /// Acts on the token for `destination`, which this node holds.
    fn pass_token(&mut self, ctx: &mut NodeCtx<'_, Self>, destination: NodeId) {
        let id = ctx.id();
        let tick = self.tick;
        let Some(link) = ctx.state().links.get(&destination).copied() else {
            return;
        };
        let Some(chain) = self.chains.get_mut(&destination) else {
            return;
        };

        let left = link.left.filter(|&n| n != destination);
        let right = link.right.filter(|&n| n != destination);
        let (sweep, next) = next_hop(chain.sweep, link.is_leader, left, right);
        chain.sweep = sweep;
        chain.token_ready_at = tick + 1;

        match next {
            Some(next) => {
                chain.token = next;
                Self::hand_over(ctx, destination, next);
            }
            None => {
                let successor = left.unwrap_or(chain.tail);
                chain.leader = successor;
                chain.token = successor;
                chain.sweep = Sweep::MovingLeft;

                Self::hand_over(ctx, destination, destination);
                if let Some(link) = ctx.state_mut().links.get_mut(&destination) {
                    link.is_leader = false;
                }
                if let Some(link) = ctx
                    .peer_state_mut(successor)
                    .and_then(|s| s.links.get_mut(&destination))
                {
                    link.is_leader = true;
                }
                debug!("{}: sweep to {} done, leadership to {}", id, destination, successor);
            }
        }
    }
}

impl RoutingAlgorithm for Pegasis {
    type NodeState = PegasisState;
    type MessageState = ();

    fn name(&self) -> &'static str {
        "pegasis"
    }

    fn on_tick(
        &mut self,
        tick: u64,
        nodes: &mut [Node<Self>],
        active: &[NodeId],
        destinations: &[NodeId],
    ) {
        self.tick = tick;
        if tick % self.rebuild_period != 0 {
            return;
        }
        for &destination in destinations {
            self.build_chain(nodes, active, destination);
        }
    }

    fn step(&mut self, ctx: &mut NodeCtx<'_, Self>, sensed: Option<Message<()>>) {
        let id = ctx.id();
        if let Some(msg) = sensed {
            ctx.state_mut().held.push(msg);
        }

        while let Some(mut msg) = ctx.pop_inbox() {
            if msg.destination() == Some(id) {
                if msg.kind() == MessageKind::Data {
                    ctx.deliver(&mut msg);
                }
            } else {
                ctx.state_mut().held.push(msg);
            }
        }

        let mut holding: Vec<NodeId> = self
            .chains
            .iter()
            .filter(|(_, chain)| chain.token == id && self.tick >= chain.token_ready_at)
            .map(|(&destination, _)| destination)
            .collect();
        holding.sort_unstable();
        for destination in holding {
            self.pass_token(ctx, destination);
        }
    }
}
