//! Reverse Dependency Set
//!
//! Back-edges from a node to the parents that requested it, used to decide
//! whom to notify when the node completes or is invalidated.
//!
//! Two retention modes:
//!
//! - **Keep edges**: parents are retained after the node finishes, so a
//!   later invalidation can walk back up the graph. Required for
//!   incremental re-builds.
//!
//! - **Discard edges**: parents are held only while the node is
//!   evaluating (they must still be signaled on completion) and dropped
//!   once it finishes. Cheaper for one-shot builds that will never be
//!   invalidated.
//!
//! A given parent may register at most once between evaluation starts;
//! duplicates are contract violations and panic.

use indexmap::IndexSet;

use super::key::NodeKey;

/// Whether reverse-dependency edges survive node completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRetention {
    /// Retain reverse edges on done nodes (incremental builds).
    KeepEdges,

    /// Drop reverse edges once the node is done (one-shot builds).
    DiscardEdges,
}

/// The reverse dependents of one node.
#[derive(Debug)]
pub struct ReverseDeps<K>
where
    K: NodeKey,
{
    retention: EdgeRetention,

    /// Parents that registered during the current evaluation attempt and
    /// are waiting to be signaled when it completes.
    pending: IndexSet<K>,

    /// Parents retained across builds. Empty under `DiscardEdges`.
    retained: IndexSet<K>,
}

impl<K> ReverseDeps<K>
where
    K: NodeKey,
{
    pub fn new(retention: EdgeRetention) -> Self {
        Self {
            retention,
            pending: IndexSet::new(),
            retained: IndexSet::new(),
        }
    }

    pub fn retention(&self) -> EdgeRetention {
        self.retention
    }

    /// Register `parent` as waiting on this node's current evaluation.
    ///
    /// A parent already retained from a previous build moves back to the
    /// waiting set so it is signaled again on completion. Panics if the
    /// parent already registered during this attempt.
    pub fn register(&mut self, parent: K) {
        self.retained.shift_remove(&parent);
        let inserted = self.pending.insert(parent);
        assert!(inserted, "duplicate reverse dep registered in one evaluation");
    }

    /// Record `parent` on an already-done node (`KeepEdges` only).
    pub fn register_done(&mut self, parent: K) {
        debug_assert_eq!(self.retention, EdgeRetention::KeepEdges);
        let inserted = self.retained.insert(parent);
        assert!(inserted, "duplicate reverse dep registered on done node");
    }

    /// Remove a retained reverse edge. Panics if the edge is absent.
    pub fn remove(&mut self, parent: &K) {
        let removed = self.retained.shift_remove(parent);
        assert!(removed, "removed reverse dep {parent:?} was never added");
    }

    /// Finish the current attempt: return the waiting parents, folding
    /// them into the retained set when edges are kept.
    pub fn drain_pending(&mut self) -> Vec<K> {
        let pending: Vec<K> = self.pending.drain(..).collect();
        if self.retention == EdgeRetention::KeepEdges {
            self.retained.extend(pending.iter().cloned());
        }
        pending
    }

    /// The retained reverse dependents, in registration order.
    pub fn retained(&self) -> Vec<K> {
        self.retained.iter().cloned().collect()
    }

    /// Whether `parent` is currently known, either waiting or retained.
    pub fn contains(&self, parent: &K) -> bool {
        self.pending.contains(parent) || self.retained.contains(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_registration_order() {
        let mut rdeps = ReverseDeps::new(EdgeRetention::KeepEdges);
        rdeps.register("mother");
        rdeps.register("father");

        assert_eq!(rdeps.drain_pending(), vec!["mother", "father"]);
        assert_eq!(rdeps.retained(), vec!["mother", "father"]);
    }

    #[test]
    fn discard_edges_keeps_nothing_after_drain() {
        let mut rdeps = ReverseDeps::new(EdgeRetention::DiscardEdges);
        rdeps.register("parent");

        assert_eq!(rdeps.drain_pending(), vec!["parent"]);
        assert!(rdeps.retained().is_empty());
    }

    #[test]
    #[should_panic(expected = "duplicate reverse dep")]
    fn duplicate_registration_panics() {
        let mut rdeps = ReverseDeps::new(EdgeRetention::KeepEdges);
        rdeps.register("parent");
        rdeps.register("parent");
    }

    #[test]
    fn retained_parent_may_reregister_after_new_attempt() {
        let mut rdeps = ReverseDeps::new(EdgeRetention::KeepEdges);
        rdeps.register("parent");
        rdeps.drain_pending();

        // The parent re-requests during a later re-evaluation.
        rdeps.register("parent");
        assert_eq!(rdeps.drain_pending(), vec!["parent"]);
        assert_eq!(rdeps.retained(), vec!["parent"]);
    }

    #[test]
    #[should_panic(expected = "never added")]
    fn removing_absent_reverse_dep_panics() {
        let mut rdeps: ReverseDeps<&str> = ReverseDeps::new(EdgeRetention::KeepEdges);
        rdeps.remove(&"ghost");
    }

    #[test]
    fn remove_deletes_retained_edge() {
        let mut rdeps = ReverseDeps::new(EdgeRetention::KeepEdges);
        rdeps.register("parent");
        rdeps.drain_pending();

        rdeps.remove(&"parent");
        assert!(!rdeps.contains(&"parent"));
    }
}
