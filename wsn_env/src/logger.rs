//! Per-hop trace recording and tab-separated export.

use crate::message::Message;
use serde::{Serialize, Serializer};
use std::io::{self, Write};

/// Column names of the exported hop log, in order.
pub const HOP_LOG_HEADER: [&str; 11] = [
    "srcNode",
    "destNode",
    "hopSource",
    "hopDest",
    "msgLabel",
    "timestamp",
    "hopCount",
    "startTime",
    "endTime",
    "arrival_hop",
    "travelTime",
];

/// One physical transmission of one message copy.
///
/// Node columns hold 1-based labels; 0 stands for "nobody" (broadcast).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HopLogEntry {
    pub src_node: u32,
    pub dest_node: u32,
    pub hop_source: u32,
    pub hop_dest: u32,
    pub msg_label: u64,
    pub timestamp: u64,
    pub hop_count: u32,
    pub start_time: u64,
    pub end_time: u64,
    #[serde(rename = "arrival_hop", serialize_with = "as_flag")]
    pub arrival_hop: bool,
    pub travel_time: u64,
}

fn as_flag<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*value))
}

impl HopLogEntry {
    /// Builds the entry for a message that was just transmitted at `timestamp`.
    ///
    /// A hop into the destination is the arrival hop: the packet lands in the
    /// destination's inbox at `timestamp`, which becomes its end time.
    pub fn from_hop<M>(msg: &Message<M>, timestamp: u64) -> Self {
        let label = |id: Option<crate::NodeId>| id.map_or(0, |n| n.label());
        let arrival_hop = msg.destination().is_some() && msg.hop_destination == msg.destination();
        let end_time = if arrival_hop { timestamp } else { msg.arrival_time };

        Self {
            src_node: msg.source().label(),
            dest_node: label(msg.destination()),
            hop_source: label(msg.hop_source),
            hop_dest: label(msg.hop_destination),
            msg_label: msg.label(),
            timestamp,
            hop_count: msg.hop_count,
            start_time: msg.start_time(),
            end_time,
            arrival_hop,
            travel_time: end_time.saturating_sub(msg.start_time()),
        }
    }
}

/// Append-only hop trace.
#[derive(Debug, Clone, Default)]
pub struct HopLogger {
    entries: Vec<HopLogEntry>,
}

impl HopLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn add_entry(&mut self, entry: HopLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HopLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose hop landed at the message's destination.
    pub fn arrivals(&self) -> impl Iterator<Item = &HopLogEntry> {
        self.entries.iter().filter(|e| e.arrival_hop)
    }

    /// Writes the header row followed by one row per entry.
    ///
    /// With `arrival_only`, only arrival hops are written. The header is
    /// written even when no row is.
    pub fn write_tsv(&self, w: &mut dyn Write, arrival_only: bool) -> io::Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(w);

        let mut rows = 0;
        for entry in self.entries.iter().filter(|e| !arrival_only || e.arrival_hop) {
            wtr.serialize(entry)?;
            rows += 1;
        }
        if rows == 0 {
            wtr.write_record(HOP_LOG_HEADER)?;
        }
        wtr.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use crate::types::{MessageId, NodeId};

    fn hop(dest: usize, hop_dest: usize) -> Message<()> {
        let mut msg = Message::new(
            MessageId(1),
            5,
            NodeId(3),
            Some(NodeId(dest)),
            "data",
            2,
            MessageKind::Data,
        );
        msg.hop_source = Some(NodeId(3));
        msg.hop_destination = Some(NodeId(hop_dest));
        msg.hop_count = 1;
        msg
    }

    #[test]
    fn test_arrival_hop_entry() {
        let entry = HopLogEntry::from_hop(&hop(0, 0), 9);
        assert!(entry.arrival_hop);
        assert_eq!(entry.src_node, 4);
        assert_eq!(entry.dest_node, 1);
        assert_eq!(entry.end_time, 9);
        assert_eq!(entry.travel_time, 7);
    }

    #[test]
    fn test_relay_hop_entry() {
        let entry = HopLogEntry::from_hop(&hop(0, 1), 9);
        assert!(!entry.arrival_hop);
        assert_eq!(entry.hop_dest, 2);
        assert_eq!(entry.end_time, 0);
        assert_eq!(entry.travel_time, 0);
    }

    #[test]
    fn test_write_tsv() {
        let mut logger = HopLogger::new();
        logger.add_entry(HopLogEntry::from_hop(&hop(0, 1), 3));
        logger.add_entry(HopLogEntry::from_hop(&hop(0, 0), 4));

        let mut out = Vec::new();
        logger.write_tsv(&mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "srcNode\tdestNode\thopSource\thopDest\tmsgLabel\ttimestamp\thopCount\tstartTime\tendTime\tarrival_hop\ttravelTime"
        );
        assert_eq!(lines[2], "4\t1\t4\t1\t5\t4\t1\t2\t4\t1\t2");

        let mut out = Vec::new();
        logger.write_tsv(&mut out, true).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_header_matches_columns() {
        let mut out = Vec::new();
        HopLogger::new().write_tsv(&mut out, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", HOP_LOG_HEADER.join("\t")));

        let mut logger = HopLogger::new();
        logger.add_entry(HopLogEntry::from_hop(&hop(0, 1), 3));
        let mut out = Vec::new();
        logger.write_tsv(&mut out, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![HOP_LOG_HEADER.join("\t")]);
    }
}
