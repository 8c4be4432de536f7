//! Ordered message queue with priority insertion and an optional time gate.

use crate::message::Message;
use crate::types::MessageId;
use std::collections::VecDeque;

/// FIFO of messages with a priority class at the front.
///
/// Membership and removal compare envelope ids, so two broadcast copies of
/// the same packet count as the same item.
///
/// The `*_ready` methods model per-hop delay: an item is visible at local
/// time `now` only if it was transmitted strictly earlier
/// (`hop_timestamp < now`).
#[derive(Debug, Clone)]
pub struct MessageQueue<M> {
    msgs: VecDeque<Message<M>>,
}

impl<M> MessageQueue<M> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            msgs: VecDeque::new(),
        }
    }

    /// Appends at the tail.
    pub fn push(&mut self, msg: Message<M>) {
        self.msgs.push_back(msg);
    }

    /// Inserts after the last priority item and before the first ordinary one.
    ///
    /// FIFO order holds within each class. The message must carry the
    /// priority flag.
    pub fn priority_push(&mut self, msg: Message<M>) {
        debug_assert!(msg.priority, "priority_push requires a priority message");
        let at = self
            .msgs
            .iter()
            .position(|m| !m.priority)
            .unwrap_or(self.msgs.len());
        self.msgs.insert(at, msg);
    }

    /// Removes the head.
    pub fn pop(&mut self) -> Option<Message<M>> {
        self.msgs.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.msgs.len()
    }

    /// Returns true if a copy of the envelope is queued.
    pub fn contains(&self, id: MessageId) -> bool {
        self.msgs.iter().any(|m| m.id() == id)
    }

    /// Removes the first copy of the envelope, if any.
    pub fn remove(&mut self, id: MessageId) -> Option<Message<M>> {
        let at = self.msgs.iter().position(|m| m.id() == id)?;
        self.msgs.remove(at)
    }

    /// Returns the first queued copy of the envelope.
    pub fn find(&self, id: MessageId) -> Option<&Message<M>> {
        self.msgs.iter().find(|m| m.id() == id)
    }

    /// Removes the first item visible at `now`.
    pub fn pop_ready(&mut self, now: u64) -> Option<Message<M>> {
        let at = self.msgs.iter().position(|m| m.hop_timestamp < now)?;
        self.msgs.remove(at)
    }

    /// Returns true if no item is visible at `now`.
    pub fn is_empty_at(&self, now: u64) -> bool {
        !self.msgs.iter().any(|m| m.hop_timestamp < now)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message<M>> {
        self.msgs.iter()
    }
}

impl<M> Default for MessageQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use crate::types::NodeId;
    use proptest::prelude::*;

    fn msg(id: u64, priority: bool) -> Message<()> {
        let mut m = Message::new(MessageId(id), id, NodeId(0), None, "", 0, MessageKind::Data);
        m.priority = priority;
        m
    }

    fn ids(queue: &mut MessageQueue<()>) -> Vec<u64> {
        std::iter::from_fn(|| queue.pop()).map(|m| m.id().0).collect()
    }

    #[test]
    fn test_priority_push_orders_classes() {
        let mut queue = MessageQueue::new();
        queue.push(msg(1, false));
        queue.priority_push(msg(2, true));
        queue.push(msg(3, false));
        queue.priority_push(msg(4, true));

        assert_eq!(ids(&mut queue), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_contains_and_remove_by_envelope() {
        let mut queue = MessageQueue::new();
        queue.push(msg(1, false));
        queue.push(msg(2, false));

        // A different physical copy of envelope 2
        let copy = msg(2, false).copy_with_label(99);
        assert!(queue.contains(copy.id()));

        let removed = queue.remove(copy.id()).unwrap();
        assert_eq!(removed.label(), 2);
        assert!(!queue.contains(MessageId(2)));
        assert!(queue.remove(MessageId(2)).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_time_gate_hides_same_tick_items() {
        let mut queue = MessageQueue::new();
        let mut early = msg(1, false);
        early.hop_timestamp = 3;
        let mut late = msg(2, false);
        late.hop_timestamp = 5;
        queue.push(late);
        queue.push(early);

        assert!(queue.is_empty_at(3));
        assert!(queue.pop_ready(3).is_none());

        // Only the item stamped at 3 is visible at 4, even though it is second
        let first = queue.pop_ready(4).unwrap();
        assert_eq!(first.id(), MessageId(1));
        assert!(queue.is_empty_at(5));
        assert!(!queue.is_empty_at(6));
        assert_eq!(queue.pop_ready(6).unwrap().id(), MessageId(2));
    }

    proptest! {
        #[test]
        fn prop_priority_items_pop_first(flags in proptest::collection::vec(any::<bool>(), 0..40)) {
            let mut queue = MessageQueue::new();
            for (i, &priority) in flags.iter().enumerate() {
                let m = msg(i as u64, priority);
                if priority {
                    queue.priority_push(m);
                } else {
                    queue.push(m);
                }
            }

            let popped = ids(&mut queue);
            let expected: Vec<u64> = flags.iter().enumerate()
                .filter(|&(_, &p)| p)
                .chain(flags.iter().enumerate().filter(|&(_, &p)| !p))
                .map(|(i, _)| i as u64)
                .collect();
            prop_assert_eq!(popped, expected);
        }
    }
}
