//! RASeR: hop-count gradient flooding with round-robin transmit slots.
//!
//! Every transmission is a broadcast stamped with the sender's hop-count
//! table. Receivers refine their own gradient from it and rebroadcast a
//! packet only when they are closer to its destination than the node they
//! heard it from. Nodes transmit in turn: node `label` owns global tick
//! `t` when `t % N == label - 1`, N being the number of active nodes.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::trace;
use wsn_env::{
    Message, MessageId, MessageKind, MessageQueue, Node, NodeCtx, NodeId, RoutingAlgorithm,
};

/// Contents of the heartbeat sent from an empty slot.
pub const ALIVE_CONTENTS: &str = "Alive";

/// Hop-count estimates per destination. Absent means unknown.
pub type HopCounts = HashMap<NodeId, u32>;

/// Per-packet state: the sender's gradient at transmission time.
#[derive(Debug, Clone, Default)]
pub struct GradientSnapshot {
    pub sender_hop_counts: HopCounts,
}

impl GradientSnapshot {
    pub fn hop_count(&self, destination: NodeId) -> Option<u32> {
        self.sender_hop_counts.get(&destination).copied()
    }
}

/// Per-node state.
#[derive(Debug, Default)]
pub struct RaserState {
    /// Best-known hop distance to each destination
    pub hop_counts: HopCounts,

    /// Packets waiting for this node's slot
    pub temp_inbox: MessageQueue<GradientSnapshot>,

    /// Envelopes already delivered here
    pub received: HashSet<MessageId>,

    /// Envelopes already rebroadcast from here
    pub forwarded: HashSet<MessageId>,
}

impl RaserState {
    pub fn hop_count(&self, destination: NodeId) -> Option<u32> {
        self.hop_counts.get(&destination).copied()
    }

    /// Lowers own estimates using a neighbor's snapshot.
    pub fn update_gradient(&mut self, snapshot: &GradientSnapshot) {
        for (&destination, &theirs) in &snapshot.sender_hop_counts {
            let candidate = theirs.saturating_add(1);
            match self.hop_counts.get(&destination) {
                Some(&own) if own <= candidate => {}
                _ => {
                    self.hop_counts.insert(destination, candidate);
                }
            }
        }
    }

    fn snapshot(&self) -> GradientSnapshot {
        GradientSnapshot {
            sender_hop_counts: self.hop_counts.clone(),
        }
    }
}

/// Orders two estimates with "unknown" as infinity.
fn compare_hops(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The RASeR router.
#[derive(Debug, Clone, Default)]
pub struct Raser {
    tick: u64,
    active_count: usize,
}

impl Raser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `label` owns the current slot.
    pub fn owns_slot(&self, label: u32) -> bool {
        self.active_count > 0 && self.tick % self.active_count as u64 == u64::from(label) - 1
    }

    fn receive(&mut self, ctx: &mut NodeCtx<'_, Self>, mut msg: Message<GradientSnapshot>) {
        if let Some(from) = msg.hop_source {
            ctx.add_neighbor(self, from);
        }
        ctx.state_mut().update_gradient(&msg.state);

        match msg.destination() {
            Some(destination) if destination == ctx.id() => {
                if msg.kind() == MessageKind::Data && ctx.state_mut().received.insert(msg.id()) {
                    ctx.deliver(&mut msg);
                }
            }
            Some(destination) => Self::stage(ctx, msg, destination),
            None => {}
        }
    }

    /// Decides whether an overheard packet is worth rebroadcasting.
    fn stage(ctx: &mut NodeCtx<'_, Self>, mut msg: Message<GradientSnapshot>, destination: NodeId) {
        let id = ctx.id();
        let theirs = msg.state.hop_count(destination);
        let state = ctx.state_mut();
        let own = state.hop_count(destination);

        if state.forwarded.contains(&msg.id()) {
            trace!("{}: copy {} already forwarded", id, msg.label());
            return;
        }

        if let Some(staged) = state.temp_inbox.find(msg.id()) {
            let staged_hops = staged.state.hop_count(destination);
            if compare_hops(theirs, staged_hops) != Ordering::Less {
                trace!("{}: copy {} already staged", id, msg.label());
                return;
            }
            state.temp_inbox.remove(msg.id());
        }

        match compare_hops(theirs, own) {
            Ordering::Less => trace!("{}: copy {} heard from closer node", id, msg.label()),
            Ordering::Equal if !msg.priority => {
                trace!("{}: copy {} echoed at equal distance", id, msg.label())
            }
            Ordering::Equal => {
                msg.priority = false;
                state.temp_inbox.push(msg);
            }
            Ordering::Greater if msg.priority => state.temp_inbox.priority_push(msg),
            Ordering::Greater => state.temp_inbox.push(msg),
        }
    }

    /// Emits one staged packet, or a heartbeat, in this node's slot.
    fn transmit(&self, ctx: &mut NodeCtx<'_, Self>) {
        if !self.owns_slot(ctx.label()) || !ctx.outbox_is_empty() {
            return;
        }

        let snapshot = ctx.state().snapshot();
        let staged = ctx.state_mut().temp_inbox.pop();
        let mut msg = match staged {
            Some(mut staged) => {
                ctx.state_mut().forwarded.insert(staged.id());
                staged.hop_destination = None;
                staged
            }
            None => ctx.new_message(None, ALIVE_CONTENTS, MessageKind::Heartbeat),
        };
        msg.state = snapshot;
        ctx.push_outbox(msg);
    }
}

impl RoutingAlgorithm for Raser {
    type NodeState = RaserState;
    type MessageState = GradientSnapshot;

    fn name(&self) -> &'static str {
        "raser"
    }

    fn on_node_init(&mut self, node: &mut Node<Self>) {
        let id = node.id();
        if node.destinations().contains(&id) {
            node.state.hop_counts.insert(id, 0);
        }
    }

    fn on_tick(
        &mut self,
        tick: u64,
        _nodes: &mut [Node<Self>],
        active: &[NodeId],
        _destinations: &[NodeId],
    ) {
        self.tick = tick;
        self.active_count = active.len();
    }

    fn step(&mut self, ctx: &mut NodeCtx<'_, Self>, sensed: Option<Message<GradientSnapshot>>) {
        if let Some(mut msg) = sensed {
            msg.priority = true;
            msg.state = ctx.state().snapshot();
            msg.hop_destination = None;
            ctx.state_mut().forwarded.insert(msg.id());
            ctx.push_outbox(msg);
        } else if let Some(msg) = ctx.pop_inbox() {
            self.receive(ctx, msg);
        }

        self.transmit(ctx);
    }
}
