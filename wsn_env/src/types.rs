//! Common types for the WSN simulation primitives.

use nalgebra::{Point2, Vector2};

/// Stable handle to a node in the field arena.
///
/// Handles are indices assigned in placement order, so the 1-based node
/// label is always `index + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Creates a handle from a 1-based node label.
    pub fn from_label(label: u32) -> Self {
        Self(label.saturating_sub(1) as usize)
    }

    /// Returns the arena index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Returns the 1-based node label.
    pub fn label(&self) -> u32 {
        self.0 as u32 + 1
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.label())
    }
}

/// Identity of a logical packet (its envelope).
///
/// Every physical copy of a broadcast shares the envelope id, which is what
/// queue membership and duplicate suppression compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Integer grid coordinates of a stationary node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position(pub Point2<i32>);

impl Position {
    /// Creates a position from `(x, y)`.
    pub fn new(x: i32, y: i32) -> Self {
        Self(Point2::new(x, y))
    }

    pub fn x(&self) -> i32 {
        self.0.x
    }

    pub fn y(&self) -> i32 {
        self.0.y
    }

    /// Euclidean distance truncated to an integer.
    ///
    /// Range checks and furthest-node selection both use the truncated value,
    /// so a diagonal of `4·√2 ≈ 5.66` counts as 5.
    pub fn distance_to(&self, other: &Position) -> u32 {
        let delta: Vector2<f64> = (other.0 - self.0).cast();
        delta.norm() as u32
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_label_roundtrip() {
        let id = NodeId::from_label(7);
        assert_eq!(id.index(), 6);
        assert_eq!(id.label(), 7);
        assert_eq!(id.to_string(), "node-7");
    }

    #[test]
    fn test_distance_truncates() {
        let a = Position::new(0, 0);
        assert_eq!(a.distance_to(&Position::new(4, 4)), 5);
        assert_eq!(a.distance_to(&Position::new(3, 4)), 5);
        assert_eq!(a.distance_to(&Position::new(0, 10)), 10);
        assert_eq!(Position::new(6, 0).distance_to(&a), 6);
    }
}
