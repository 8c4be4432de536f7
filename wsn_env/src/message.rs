//! Packets exchanged between nodes.
//!
//! A [`Message`] pairs an immutable envelope (source, destination, contents,
//! start time) with the mutable routing state that changes hop by hop.
//! The routing algorithm attaches its own per-message payload through the
//! generic `M` parameter.

use crate::types::{MessageId, NodeId};

/// What a packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Sensor reading on its way to an actuator
    Data,

    /// Data packet returning to its source after delivery
    Ack,

    /// Periodic "alive" beacon
    Heartbeat,

    /// Algorithm control traffic
    Protocol,
}

/// A packet with its envelope, hop state and algorithm payload.
#[derive(Debug, Clone)]
pub struct Message<M> {
    /// Envelope identity, shared by every broadcast copy
    id: MessageId,

    /// Identity of this physical copy
    label: u64,

    kind: MessageKind,
    source: NodeId,

    /// `None` for broadcasts, heartbeats and protocol traffic
    destination: Option<NodeId>,

    contents: String,
    start_time: u64,

    /// Sender of the most recent hop
    pub hop_source: Option<NodeId>,

    /// Receiver of the next hop; `None` in the outbox means physical broadcast
    pub hop_destination: Option<NodeId>,

    /// Tick at which the destination processed the packet (0 until then)
    pub arrival_time: u64,

    /// Number of physical transmissions so far
    pub hop_count: u32,

    /// Sender clock at the last transmission; gates inbox visibility
    pub hop_timestamp: u64,

    /// Staging order hint used by priority queues
    pub priority: bool,

    /// Algorithm-private payload
    pub state: M,
}

impl<M: Default> Message<M> {
    /// Creates a packet with default algorithm payload.
    pub fn new(
        id: MessageId,
        label: u64,
        source: NodeId,
        destination: Option<NodeId>,
        contents: impl Into<String>,
        start_time: u64,
        kind: MessageKind,
    ) -> Self {
        Self {
            id,
            label,
            kind,
            source,
            destination,
            contents: contents.into(),
            start_time,
            hop_source: None,
            hop_destination: None,
            arrival_time: 0,
            hop_count: 0,
            hop_timestamp: 0,
            priority: false,
            state: M::default(),
        }
    }
}

impl<M> Message<M> {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn label(&self) -> u64 {
        self.label
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Re-types the packet, e.g. a delivered data packet becoming an ack.
    pub fn set_kind(&mut self, kind: MessageKind) {
        self.kind = kind;
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn destination(&self) -> Option<NodeId> {
        self.destination
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Returns true when the packet is not addressed to a single node.
    pub fn is_broadcast(&self) -> bool {
        self.destination.is_none()
    }

    /// Sets the next hop.
    pub fn set_hop_destination(&mut self, next: NodeId) {
        self.hop_destination = Some(next);
    }

    /// Ticks between creation and delivery (0 while undelivered).
    pub fn travel_time(&self) -> u64 {
        self.arrival_time.saturating_sub(self.start_time)
    }

    /// Returns true once a destination has stamped an arrival time.
    pub fn delivered(&self) -> bool {
        self.arrival_time != 0
    }

    /// Returns a physical copy carrying a new copy label.
    ///
    /// The copy shares the envelope id; every routing field is cloned so the
    /// copies evolve independently afterwards.
    pub(crate) fn copy_with_label(&self, label: u64) -> Self
    where
        M: Clone,
    {
        let mut copy = self.clone();
        copy.label = label;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_message() -> Message<Vec<u32>> {
        Message::new(
            MessageId(1),
            1,
            NodeId(2),
            Some(NodeId(0)),
            "reading",
            4,
            MessageKind::Data,
        )
    }

    #[test]
    fn test_new_message_defaults() {
        let msg = data_message();
        assert_eq!(msg.hop_count, 0);
        assert_eq!(msg.arrival_time, 0);
        assert!(!msg.priority);
        assert!(!msg.is_broadcast());
        assert!(!msg.delivered());
        assert!(msg.state.is_empty());
    }

    #[test]
    fn test_travel_time() {
        let mut msg = data_message();
        assert_eq!(msg.travel_time(), 0);
        msg.arrival_time = 11;
        assert_eq!(msg.travel_time(), 7);
    }

    #[test]
    fn test_copy_is_isolated() {
        let original = data_message();
        let mut copy = original.copy_with_label(2);

        copy.hop_count = 5;
        copy.state.push(9);
        copy.priority = true;

        assert_eq!(copy.id(), original.id());
        assert_ne!(copy.label(), original.label());
        assert_eq!(original.hop_count, 0);
        assert!(original.state.is_empty());
        assert!(!original.priority);
    }
}
