//! Tree coordinates: the ordered port path from the root to a node.

use std::fmt;

/// A local peer slot number. Port 0 is reserved for the node's own local
/// delivery endpoint and never appears in a signature chain.
pub type Port = u64;

/// A node's coordinates in the spanning tree.
///
/// Coordinates are the sequence of local port numbers along the path from
/// the root down to the node. The root's coordinates are empty. Because
/// each hop is the port the parent assigned to the link, two nodes sharing
/// a coordinate prefix share the corresponding ancestor.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Coordinates(Vec<Port>);

impl Coordinates {
    /// Create coordinates from a port path.
    pub fn new(ports: Vec<Port>) -> Self {
        Self(ports)
    }

    /// The root's coordinates: the empty path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The port path.
    pub fn ports(&self) -> &[Port] {
        &self.0
    }

    /// Number of hops from the root.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether these are the root's coordinates.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the common prefix with another coordinate sequence.
    ///
    /// The common prefix identifies the deepest shared ancestor.
    pub fn common_prefix_len(&self, other: &Coordinates) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Tree distance to another coordinate sequence.
    ///
    /// `|a| + |b| − 2·lcp(a, b)`: the hop count of the path through the
    /// deepest common ancestor. Zero only for identical coordinates.
    pub fn distance_to(&self, other: &Coordinates) -> u64 {
        let common = self.common_prefix_len(other);
        (self.0.len() + other.0.len() - 2 * common) as u64
    }
}

impl From<Vec<Port>> for Coordinates {
    fn from(ports: Vec<Port>) -> Self {
        Self(ports)
    }
}

impl fmt::Debug for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinates({})", self)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, port) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", port)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(ports: &[Port]) -> Coordinates {
        Coordinates::new(ports.to_vec())
    }

    #[test]
    fn test_distance_identical() {
        assert_eq!(coords(&[]).distance_to(&coords(&[])), 0);
        assert_eq!(coords(&[1, 2]).distance_to(&coords(&[1, 2])), 0);
    }

    #[test]
    fn test_distance_root_to_descendant() {
        // root -> child -> grandchild
        assert_eq!(coords(&[]).distance_to(&coords(&[1])), 1);
        assert_eq!(coords(&[]).distance_to(&coords(&[1, 3])), 2);
        assert_eq!(coords(&[1, 3]).distance_to(&coords(&[])), 2);
    }

    #[test]
    fn test_distance_siblings() {
        // both children of the root: up one, down one
        assert_eq!(coords(&[1]).distance_to(&coords(&[2])), 2);
    }

    #[test]
    fn test_distance_cousins() {
        //       root
        //      /    \
        //    [1]    [2]
        //    /        \
        // [1,1]      [2,1]
        assert_eq!(coords(&[1, 1]).distance_to(&coords(&[2, 1])), 4);
    }

    #[test]
    fn test_distance_ancestor() {
        assert_eq!(coords(&[1, 1]).distance_to(&coords(&[1])), 1);
        assert_eq!(coords(&[1]).distance_to(&coords(&[1, 1])), 1);
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(coords(&[1, 2, 3]).common_prefix_len(&coords(&[1, 2, 4])), 2);
        assert_eq!(coords(&[1, 2]).common_prefix_len(&coords(&[2, 2])), 0);
        assert_eq!(coords(&[1, 2]).common_prefix_len(&coords(&[1, 2, 9])), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(coords(&[]).to_string(), "[]");
        assert_eq!(coords(&[1, 4, 2]).to_string(), "[1 4 2]");
    }
}
