//! Dependency Group Tracker
//!
//! Records the ordered sequence of dependency batches ("groups") a node
//! requests during one evaluation attempt. A computation may request
//! several dependencies at once; each such batch is one group. Order
//! across groups is significant (it reflects request order); order within
//! a group is not.
//!
//! # Strategies
//!
//! Two backings trade memory for membership speed:
//!
//! - **List**: just the group list. Minimal memory, linear-time membership.
//!   Used for nodes evaluated whole-group-at-a-time.
//!
//! - **Hash set**: group list plus a shadow `HashSet` of every dependency.
//!   Used for nodes that support partial re-evaluation, which are signaled
//!   and resumed group by group across multiple scheduling passes and need
//!   repeated O(1) membership checks.
//!
//! Both enforce the same contract: a dependency may appear at most once per
//! attempt, and bulk insertion must partition its input exactly.

use std::collections::HashSet;

use smallvec::SmallVec;

use super::key::NodeKey;

/// Most groups hold one or two dependencies; keep those inline.
type DepGroup<K> = SmallVec<[K; 2]>;

/// The ordered dependency groups of one evaluation attempt.
#[derive(Debug)]
pub struct GroupedDeps<K>
where
    K: NodeKey,
{
    groups: Vec<DepGroup<K>>,
    num_deps: usize,

    /// Shadow set for the hash-set strategy; `None` for the list strategy.
    set: Option<HashSet<K>>,
}

impl<K> GroupedDeps<K>
where
    K: NodeKey,
{
    /// Create an empty tracker with the list strategy.
    pub fn new_list() -> Self {
        Self {
            groups: Vec::new(),
            num_deps: 0,
            set: None,
        }
    }

    /// Create an empty tracker with the hash-set strategy.
    pub fn new_with_hash_set() -> Self {
        Self {
            groups: Vec::new(),
            num_deps: 0,
            set: Some(HashSet::new()),
        }
    }

    /// Whether this tracker carries the shadow hash set.
    pub fn uses_hash_set(&self) -> bool {
        self.set.is_some()
    }

    /// Total number of dependencies across all groups.
    pub fn num_deps(&self) -> usize {
        self.num_deps
    }

    /// Number of non-empty groups recorded so far.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_deps == 0
    }

    /// Whether `dep` was requested during this attempt.
    ///
    /// O(1) under the hash-set strategy, linear otherwise.
    pub fn contains(&self, dep: &K) -> bool {
        match &self.set {
            Some(set) => set.contains(dep),
            None => self.groups.iter().any(|group| group.contains(dep)),
        }
    }

    /// Append a group holding a single dependency.
    pub fn add_singleton(&mut self, dep: K) {
        let mut group = DepGroup::new();
        self.insert_checked(&mut group, dep);
        self.groups.push(group);
    }

    /// Append one batch of dependencies requested together.
    ///
    /// An empty batch represents a step that requested nothing and yields
    /// no group entry.
    pub fn add_group(&mut self, deps: impl IntoIterator<Item = K>) {
        let mut group = DepGroup::new();
        for dep in deps {
            self.insert_checked(&mut group, dep);
        }
        if !group.is_empty() {
            self.groups.push(group);
        }
    }

    /// Append several groups at once, partitioning `deps` into consecutive
    /// groups of the given sizes.
    ///
    /// # Panics
    ///
    /// Panics unless the group sizes sum exactly to the number of supplied
    /// dependencies: running out of dependencies mid-group, or leaving
    /// dependencies unconsumed, are contract violations.
    pub fn add_in_groups(&mut self, deps: impl IntoIterator<Item = K>, group_sizes: &[usize]) {
        let mut deps = deps.into_iter();
        for &size in group_sizes {
            let mut group = DepGroup::with_capacity(size);
            for _ in 0..size {
                let dep = deps
                    .next()
                    .unwrap_or_else(|| panic!("dependencies exhausted before group sizes {group_sizes:?}"));
                self.insert_checked(&mut group, dep);
            }
            if !group.is_empty() {
                self.groups.push(group);
            }
        }
        let leftover = deps.count();
        assert!(
            leftover == 0,
            "{leftover} dependencies left over after group sizes {group_sizes:?}"
        );
    }

    /// Iterate the groups in request order.
    pub fn groups(&self) -> impl Iterator<Item = &[K]> {
        self.groups.iter().map(|group| group.as_slice())
    }

    /// Clone the groups out as plain vectors, preserving order.
    pub fn to_groups(&self) -> Vec<Vec<K>> {
        self.groups.iter().map(|group| group.to_vec()).collect()
    }

    /// All dependencies in request order, group structure flattened away.
    pub fn flatten(&self) -> Vec<K> {
        self.groups.iter().flat_map(|group| group.iter().cloned()).collect()
    }

    fn insert_checked(&mut self, group: &mut DepGroup<K>, dep: K) {
        let duplicate = match &mut self.set {
            Some(set) => !set.insert(dep.clone()),
            None => group.contains(&dep) || self.groups.iter().any(|g| g.contains(&dep)),
        };
        assert!(!duplicate, "duplicate dependency {dep:?} added in one evaluation attempt");
        group.push(dep);
        self.num_deps += 1;
    }
}
