//! Label-greedy router for smoke-testing the engine.
//!
//! Forwards each packet to the lowest-labelled neighbor whose label is still
//! above the destination's, or straight to the destination when it is a
//! neighbor. Sinks get the lowest labels, so on a grid this walks packets
//! toward them without any state.

use tracing::warn;
use wsn_env::{Message, NodeCtx, NodeId, RoutingAlgorithm};

#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl Greedy {
    /// Next hop toward `destination` among `neighbors`.
    pub fn best_neighbor(neighbors: &[NodeId], destination: NodeId) -> Option<NodeId> {
        if neighbors.contains(&destination) {
            return Some(destination);
        }
        let mut best: Option<NodeId> = None;
        for &n in neighbors {
            match best {
                Some(b) if !(b.label() > n.label() && n.label() > destination.label()) => {}
                _ => best = Some(n),
            }
        }
        best
    }

    fn forward(ctx: &mut NodeCtx<'_, Self>, mut msg: Message<()>, destination: NodeId) {
        match Self::best_neighbor(ctx.neighbors(), destination) {
            Some(next) => {
                msg.set_hop_destination(next);
                ctx.push_outbox(msg);
            }
            None => warn!("{}: isolated, dropping copy {}", ctx.id(), msg.label()),
        }
    }
}

impl RoutingAlgorithm for Greedy {
    type NodeState = ();
    type MessageState = ();

    fn name(&self) -> &'static str {
        "greedy"
    }

    fn step(&mut self, ctx: &mut NodeCtx<'_, Self>, sensed: Option<Message<()>>) {
        let msg = match sensed {
            Some(msg) => msg,
            None => match ctx.pop_inbox() {
                Some(msg) => msg,
                None => return,
            },
        };

        match msg.destination() {
            Some(destination) if destination == ctx.id() => {
                let mut msg = msg;
                ctx.deliver(&mut msg);
            }
            Some(destination) => Self::forward(ctx, msg, destination),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ls: &[u32]) -> Vec<NodeId> {
        ls.iter().map(|&l| NodeId::from_label(l)).collect()
    }

    #[test]
    fn test_prefers_lowest_label_above_destination() {
        let dst = NodeId::from_label(2);
        let best = Greedy::best_neighbor(&labels(&[9, 5, 1, 7]), dst);
        assert_eq!(best, Some(NodeId::from_label(5)));
    }

    #[test]
    fn test_direct_neighbor_and_isolation() {
        let dst = NodeId::from_label(2);
        assert_eq!(Greedy::best_neighbor(&labels(&[9, 2]), dst), Some(dst));
        assert_eq!(Greedy::best_neighbor(&[], dst), None);

        // Nothing above the destination: the first neighbor stands
        assert_eq!(Greedy::best_neighbor(&labels(&[1]), NodeId::from_label(3)), Some(NodeId(0)));
    }
}
