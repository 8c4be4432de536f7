//! The routing algorithm abstraction.
//!
//! A run picks exactly one [`RoutingAlgorithm`]. Its per-node and per-message
//! state types are attached to every [`Node`] and [`Message`] of the run, so
//! the engine stays generic and the algorithm never downcasts.

use crate::field::NodeCtx;
use crate::logger::HopLogger;
use crate::message::Message;
use crate::node::Node;
use crate::types::NodeId;
use std::fmt::Debug;
use std::io::{self, Write};

/// Hooks a routing algorithm implements to drive the field.
pub trait RoutingAlgorithm: Sized {
    /// Algorithm-private state stored on each node.
    type NodeState: Default;

    /// Algorithm-private state carried by each message copy.
    type MessageState: Clone + Default + Debug;

    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Called once per node after the field is wired.
    fn on_node_init(&mut self, _node: &mut Node<Self>) {}

    /// Called on every freshly packaged sensor message.
    fn on_message_init(&mut self, _msg: &mut Message<Self::MessageState>) {}

    /// Called when `neighbor` is newly added to `node`.
    fn on_neighbor_added(&mut self, _node: &mut Node<Self>, _neighbor: NodeId) {}

    /// Called once per global tick before any node runs.
    ///
    /// `active` lists the nodes that will tick, in label order.
    fn on_tick(
        &mut self,
        _tick: u64,
        _nodes: &mut [Node<Self>],
        _active: &[NodeId],
        _destinations: &[NodeId],
    ) {
    }

    /// The per-node operator, run once per active node per tick.
    ///
    /// `sensed` carries the sensor packet originated this tick, if any.
    fn step(&mut self, ctx: &mut NodeCtx<'_, Self>, sensed: Option<Message<Self::MessageState>>);

    /// Called when the run terminates; writes the hop log by default.
    fn on_end(&mut self, sink: &mut dyn Write, log: &HopLogger) -> io::Result<()> {
        log.write_tsv(sink, false)
    }
}
