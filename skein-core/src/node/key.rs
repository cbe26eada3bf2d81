//! Node Keys
//!
//! A key is the opaque, hashable identity of a node. The engine never looks
//! inside a key; it only hashes, compares, and clones it. All cross-node
//! references are expressed as key lookups rather than direct pointers,
//! which is what keeps the cyclic-by-reference graph free of ownership
//! cycles.

use std::fmt::Debug;
use std::hash::Hash;

/// The identity of a node in the graph.
///
/// Implementors choose, per key kind, whether computations for the key may
/// be resumed incrementally (see
/// [`supports_partial_reevaluation`](NodeKey::supports_partial_reevaluation)).
/// That capability decides the dependency-tracking strategy the node's
/// entry is created with, so it must be stable for the key's lifetime.
pub trait NodeKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Whether a computation for this key may be resumed before all of its
    /// requested dependencies have completed.
    ///
    /// Nodes answering `true` get the hash-set-backed dependency tracker,
    /// paying extra memory for O(1) membership checks across repeated
    /// resumptions.
    fn supports_partial_reevaluation(&self) -> bool {
        false
    }
}

impl NodeKey for String {}
impl NodeKey for &'static str {}
impl NodeKey for u64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_reevaluation_defaults_off() {
        assert!(!"some-key".supports_partial_reevaluation());
        assert!(!42u64.supports_partial_reevaluation());
    }
}
