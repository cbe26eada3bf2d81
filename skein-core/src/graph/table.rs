//! Node Table
//!
//! The only shared mutable resource in the engine: a concurrent map from
//! key to node entry. Entries are created lazily on first lookup, safely
//! under concurrent first-access from multiple parents, and live as long
//! as the table (there is no per-node deletion).
//!
//! The table itself holds no evaluation logic. Per-node synchronization
//! lives inside each entry; the table's sharded map only mediates entry
//! creation and lookup, so unrelated nodes are evaluated in parallel with
//! no shared lock.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::node::{EdgeRetention, NodeEntry, NodeKey};

/// A shared, key-addressed table of node entries.
///
/// Its lifetime is one build invocation, or several if the caller retains
/// it across incremental builds. Cloneable handles are not provided; share
/// the table itself behind an `Arc`.
#[derive(Debug)]
pub struct NodeTable<K, V>
where
    K: NodeKey,
{
    nodes: DashMap<K, Arc<NodeEntry<K, V>>>,

    /// Applied to every entry this table creates.
    retention: EdgeRetention,
}

impl<K, V> NodeTable<K, V>
where
    K: NodeKey,
    V: Clone,
{
    pub fn new(retention: EdgeRetention) -> Self {
        Self {
            nodes: DashMap::new(),
            retention,
        }
    }

    pub fn retention(&self) -> EdgeRetention {
        self.retention
    }

    /// Look up the entry for `key`, creating it in the default undirtied
    /// state on first access.
    pub fn get_or_create(&self, key: &K) -> Arc<NodeEntry<K, V>> {
        let entry = self.nodes.entry(key.clone()).or_insert_with(|| {
            debug!(?key, "node entry created");
            Arc::new(NodeEntry::new(key.clone(), self.retention))
        });
        Arc::clone(entry.value())
    }

    /// Look up an existing entry without creating one.
    pub fn get(&self, key: &K) -> Option<Arc<NodeEntry<K, V>>> {
        self.nodes.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn get_or_create_returns_same_entry() {
        let table: NodeTable<&str, i32> = NodeTable::new(EdgeRetention::KeepEdges);
        let first = table.get_or_create(&"node");
        let second = table.get_or_create(&"node");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn get_does_not_create() {
        let table: NodeTable<&str, i32> = NodeTable::new(EdgeRetention::KeepEdges);
        assert!(table.get(&"missing").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn concurrent_first_access_creates_one_entry() {
        let table: Arc<NodeTable<String, i32>> =
            Arc::new(NodeTable::new(EdgeRetention::KeepEdges));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || table.get_or_create(&"contended".to_string()))
            })
            .collect();

        let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(table.len(), 1);
        for entry in &entries[1..] {
            assert!(Arc::ptr_eq(&entries[0], entry));
        }
    }
}
