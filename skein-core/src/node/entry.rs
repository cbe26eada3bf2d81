//! Node Entry State Machine
//!
//! The per-key record combining dependency groups, reverse dependents,
//! version bookkeeping, and the dirty/readiness state machine. This is the
//! full lifecycle contract of a node:
//!
//! 1. A parent (or an untracked top-level request) registers interest via
//!    [`add_reverse_dep_and_check_if_done`](NodeEntry::add_reverse_dep_and_check_if_done);
//!    the first registration flips the entry to evaluating and tells the
//!    caller to schedule it.
//!
//! 2. The in-flight computation accumulates dependency groups; each
//!    completed dependency posts [`signal_dep`](NodeEntry::signal_dep),
//!    and the entry reports when the node is unblocked.
//!
//! 3. [`set_value`](NodeEntry::set_value) finalizes the node with exactly
//!    one of value or error and hands back the parents to notify.
//!
//! 4. An invalidation source later calls
//!    [`mark_dirty`](NodeEntry::mark_dirty); the entry either re-verifies
//!    clean at a new version or is rebuilt.
//!
//! # Thread Safety
//!
//! Each entry owns an independent mutex; every public operation is one
//! atomic bookkeeping section and no lock is held across a suspension
//! point. Unrelated nodes never contend. The entry never computes and
//! never blocks: waiting for dependencies is the evaluator's cooperative
//! re-enqueue loop, driven by the booleans returned here.
//!
//! # Contract Violations
//!
//! Misuse by the caller (double finalization, excess signals, duplicate
//! registrations, dirtying mid-evaluation) indicates evaluator bugs, not
//! runtime conditions, and panics immediately.

use std::mem;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::EvalError;
use crate::graph::Version;

use super::building::{BuildingState, DirtyKind, DirtyState};
use super::key::NodeKey;
use super::rdeps::{EdgeRetention, ReverseDeps};

/// Result of registering a dependent on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    /// First request on a node not currently evaluating; the caller must
    /// enqueue it.
    NeedsScheduling,

    /// Another request is already driving evaluation.
    AlreadyEvaluating,

    /// The value is already available.
    Done,
}

/// A finalized node outcome: exactly one of value or error.
#[derive(Debug)]
enum Outcome<V> {
    Value(V),
    Error(EvalError),
}

/// Lifecycle of the entry.
#[derive(Debug)]
enum Lifecycle<V> {
    /// Never finalized.
    New,

    /// Finalized; the outcome is current.
    Done(Outcome<V>),

    /// Previously finalized, then invalidated; the stale outcome is
    /// retained for possible clean re-stamping.
    Dirty(Outcome<V>),
}

#[derive(Debug)]
struct Inner<K, V>
where
    K: NodeKey,
{
    lifecycle: Lifecycle<V>,

    /// Version of the last completed build; `Version::MINIMAL` before the
    /// first. Non-decreasing for the entry's lifetime.
    version: Version,

    /// Present whenever the entry is not done.
    building: Option<BuildingState<K>>,

    rdeps: ReverseDeps<K>,

    /// Dependency groups of the last completed build (`KeepEdges` only).
    last_build_deps: Option<Vec<Vec<K>>>,

    /// Whether an evaluation attempt has been started by a registration.
    evaluating: bool,
}

/// The graph entry for one key.
#[derive(Debug)]
pub struct NodeEntry<K, V>
where
    K: NodeKey,
{
    key: K,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> NodeEntry<K, V>
where
    K: NodeKey,
    V: Clone,
{
    /// Create a fresh entry for `key`, choosing the dependency-tracking
    /// strategy from the key's partial re-evaluation capability.
    pub fn new(key: K, retention: EdgeRetention) -> Self {
        let partial = key.supports_partial_reevaluation();
        Self {
            key,
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::New,
                version: Version::MINIMAL,
                building: Some(BuildingState::new_initial(partial)),
                rdeps: ReverseDeps::new(retention),
                last_build_deps: None,
                evaluating: false,
            }),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    // ---- Lifecycle queries -------------------------------------------------

    pub fn is_done(&self) -> bool {
        matches!(self.inner.lock().lifecycle, Lifecycle::Done(_))
    }

    /// Whether the entry needs (re)computation: true from creation until
    /// finalization, and again after `mark_dirty`.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().building.is_some()
    }

    /// Whether this attempt is known to produce a different value than the
    /// previous build. A `MayHaveChanged` node answers `false` until a
    /// dependency signal confirms a real change.
    pub fn is_changed(&self) -> bool {
        self.inner
            .lock()
            .building
            .as_ref()
            .is_some_and(BuildingState::is_changed)
    }

    pub fn is_evaluating(&self) -> bool {
        self.inner.lock().evaluating
    }

    /// The version at which the entry was last finalized.
    pub fn version(&self) -> Version {
        self.inner.lock().version
    }

    /// The finalized value, if the entry is done with a value.
    pub fn value(&self) -> Option<V> {
        match &self.inner.lock().lifecycle {
            Lifecycle::Done(Outcome::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// The finalized error, if the entry is done with an error.
    pub fn error(&self) -> Option<EvalError> {
        match &self.inner.lock().lifecycle {
            Lifecycle::Done(Outcome::Error(error)) => Some(error.clone()),
            _ => None,
        }
    }

    // ---- Registration ------------------------------------------------------

    /// Register `parent` as wanting this node's value. `None` is an
    /// untracked top-level request: it starts or continues evaluation
    /// without adding a reverse edge.
    ///
    /// Panics if the same parent registers twice in one evaluation, or
    /// twice on a done node.
    pub fn add_reverse_dep_and_check_if_done(&self, parent: Option<K>) -> DependencyState {
        let mut inner = self.inner.lock();
        if matches!(inner.lifecycle, Lifecycle::Done(_)) {
            if let Some(parent) = parent {
                if inner.rdeps.retention() == EdgeRetention::KeepEdges {
                    inner.rdeps.register_done(parent);
                }
            }
            return DependencyState::Done;
        }
        if let Some(parent) = parent {
            inner.rdeps.register(parent);
        }
        if inner.evaluating {
            DependencyState::AlreadyEvaluating
        } else {
            inner.evaluating = true;
            trace!(key = ?self.key, "node entry started evaluating");
            DependencyState::NeedsScheduling
        }
    }

    // ---- Dirty-state machine -----------------------------------------------

    /// What the evaluator must do with this dirty, not-yet-done entry.
    pub fn dirty_state(&self) -> DirtyState {
        self.inner
            .lock()
            .building
            .as_ref()
            .unwrap_or_else(|| panic!("dirty state requested of done node {:?}", self.key))
            .dirty_state()
    }

    /// Mark a `NeedsRebuilding` entry as actively recomputing.
    ///
    /// Panics if the entry is already done.
    pub fn mark_rebuilding(&self) {
        let mut inner = self.inner.lock();
        inner
            .building
            .as_mut()
            .unwrap_or_else(|| panic!("marked done node {:?} rebuilding", self.key))
            .mark_rebuilding();
    }

    /// Mark a `NeedsForcedRebuilding` entry as actively recomputing.
    pub fn force_rebuild(&self) {
        let mut inner = self.inner.lock();
        inner
            .building
            .as_mut()
            .unwrap_or_else(|| panic!("force-rebuilt done node {:?}", self.key))
            .force_rebuild();
    }

    /// Transition a done entry to dirty. Idempotent under repeated
    /// `ForceRebuild`; a repeated `MayHaveChanged` on an already-dirty
    /// entry never regresses its state.
    ///
    /// Panics if the entry is mid-evaluation, was never built, or is asked
    /// to re-validate (`MayHaveChanged`) without retained edges.
    pub fn mark_dirty(&self, kind: DirtyKind) {
        let mut inner = self.inner.lock();
        assert!(
            !inner.evaluating,
            "node {:?} marked dirty mid-evaluation",
            self.key,
        );
        match mem::replace(&mut inner.lifecycle, Lifecycle::New) {
            Lifecycle::Done(outcome) => {
                let prior_groups = match kind {
                    DirtyKind::MayHaveChanged => {
                        assert_eq!(
                            inner.rdeps.retention(),
                            EdgeRetention::KeepEdges,
                            "node {:?} cannot re-validate without retained edges",
                            self.key,
                        );
                        inner.last_build_deps.clone().unwrap_or_default()
                    }
                    DirtyKind::ForceRebuild => Vec::new(),
                };
                inner.building = Some(BuildingState::new_dirty(
                    kind,
                    prior_groups,
                    self.key.supports_partial_reevaluation(),
                ));
                inner.lifecycle = Lifecycle::Dirty(outcome);
                debug!(key = ?self.key, ?kind, "node entry marked dirty");
            }
            Lifecycle::Dirty(outcome) => {
                inner.lifecycle = Lifecycle::Dirty(outcome);
                if kind == DirtyKind::ForceRebuild {
                    inner
                        .building
                        .as_mut()
                        .expect("dirty node missing building state")
                        .escalate_to_forced();
                }
            }
            Lifecycle::New => {
                panic!("node {:?} marked dirty but was never built", self.key);
            }
        }
    }

    /// The next group of the previous build's dependencies to re-check,
    /// for an entry in `CheckDependencies`.
    pub fn next_dirty_direct_deps(&self) -> Option<Vec<K>> {
        let mut inner = self.inner.lock();
        inner
            .building
            .as_mut()
            .unwrap_or_else(|| panic!("dirty deps requested of done node {:?}", self.key))
            .next_dirty_deps()
    }

    /// Re-stamp a `VerifiedClean` entry done at `version`, reusing its
    /// retained value. Returns the reverse dependents to signal.
    pub fn mark_clean(&self, version: Version) -> Vec<K> {
        let mut inner = self.inner.lock();
        let building = inner
            .building
            .take()
            .unwrap_or_else(|| panic!("marked done node {:?} clean", self.key));
        assert_eq!(
            building.dirty_state(),
            DirtyState::VerifiedClean,
            "node {:?} marked clean before verification",
            self.key,
        );
        assert!(
            version >= inner.version,
            "node {:?} version regressed: {:?} -> {:?}",
            self.key,
            inner.version,
            version,
        );
        match mem::replace(&mut inner.lifecycle, Lifecycle::New) {
            Lifecycle::Dirty(outcome) => inner.lifecycle = Lifecycle::Done(outcome),
            _ => panic!("node {:?} has no retained value to re-verify", self.key),
        }
        inner.version = version;
        inner.evaluating = false;
        debug!(key = ?self.key, ?version, "node entry re-verified clean");
        inner.rdeps.drain_pending()
    }

    // ---- Dependency accumulation -------------------------------------------

    /// Append one batch of dependencies requested together by the
    /// in-flight computation.
    pub fn add_temporary_direct_dep_group(&self, deps: impl IntoIterator<Item = K>) {
        self.with_building("add deps to", |building| {
            building.deps_mut().add_group(deps);
        });
    }

    /// Append a single dependency as its own group.
    pub fn add_singleton_temporary_direct_dep(&self, dep: K) {
        self.with_building("add deps to", |building| {
            building.deps_mut().add_singleton(dep);
        });
    }

    /// Append several groups at once: `deps` is partitioned into
    /// consecutive groups of the given sizes, which must sum exactly to
    /// the number of dependencies supplied.
    pub fn add_temporary_direct_deps_in_groups(
        &self,
        deps: impl IntoIterator<Item = K>,
        group_sizes: &[usize],
    ) {
        self.with_building("add deps to", |building| {
            building.deps_mut().add_in_groups(deps, group_sizes);
        });
    }

    /// Account for a dependency on a resource outside the keyed graph.
    /// Counted toward unblocking, invisible to the group bookkeeping.
    pub fn add_external_dep(&self) {
        self.with_building("add an external dep to", BuildingState::add_external_dep);
    }

    /// The current attempt's dependency groups, in request order. Empty
    /// once the entry is done.
    pub fn temporary_direct_deps(&self) -> Vec<Vec<K>> {
        self.inner
            .lock()
            .building
            .as_ref()
            .map(|building| building.deps().to_groups())
            .unwrap_or_default()
    }

    /// Whether `dep` was requested during the current attempt. O(1) for
    /// partial re-evaluation entries.
    pub fn temporary_direct_deps_contain(&self, dep: &K) -> bool {
        self.inner
            .lock()
            .building
            .as_ref()
            .is_some_and(|building| building.deps().contains(dep))
    }

    /// Whether the current attempt tracks deps with the hash-set strategy.
    pub fn temporary_deps_use_hash_set(&self) -> bool {
        self.inner
            .lock()
            .building
            .as_ref()
            .map(|building| building.deps().uses_hash_set())
            .unwrap_or_else(|| self.key.supports_partial_reevaluation())
    }

    // ---- Signaling ---------------------------------------------------------

    /// Record the completion of one dependency. `child_key` is `None` for
    /// an external dependency.
    ///
    /// Returns `true` when the entry becomes unblocked and should be
    /// re-enqueued. Panics when more completions are signaled than
    /// dependencies were requested, or if the entry is already done.
    pub fn signal_dep(&self, child_version: Version, child_key: Option<&K>) -> bool {
        let mut inner = self.inner.lock();
        assert!(
            !matches!(inner.lifecycle, Lifecycle::Done(_)),
            "done node {:?} signaled by {:?}",
            self.key,
            child_key,
        );
        let child_changed = child_version > inner.version;
        let building = inner
            .building
            .as_mut()
            .expect("not-done node missing building state");
        let unblocked = building.signal(child_changed);
        trace!(key = ?self.key, ?child_key, child_changed, unblocked, "dependency signaled");
        unblocked
    }

    /// Whether every requested dependency of this attempt has signaled.
    pub fn has_unsignaled_deps(&self) -> bool {
        self.inner
            .lock()
            .building
            .as_ref()
            .is_some_and(BuildingState::has_unsignaled_deps)
    }

    /// Whether the evaluator may (re)run the computation now: all
    /// dependencies signaled, or the key supports resuming incrementally.
    pub fn is_ready_to_evaluate(&self) -> bool {
        !self.has_unsignaled_deps() || self.key.supports_partial_reevaluation()
    }

    // ---- Finalization ------------------------------------------------------

    /// Finalize the entry with exactly one of value or error at `version`.
    /// Returns the reverse dependents registered during the attempt, all
    /// of which must eventually be notified by the caller (in no
    /// particular order).
    ///
    /// Panics on double finalization without an intervening dirty
    /// transition, when neither or both of value and error are supplied,
    /// or if the completed version would regress.
    pub fn set_value(
        &self,
        value: Option<V>,
        error: Option<EvalError>,
        version: Version,
    ) -> Vec<K> {
        let mut inner = self.inner.lock();
        assert!(
            !matches!(inner.lifecycle, Lifecycle::Done(_)),
            "node {:?} finalized twice without being marked dirty",
            self.key,
        );
        let outcome = match (value, error) {
            (Some(value), None) => Outcome::Value(value),
            (None, Some(error)) => Outcome::Error(error),
            (None, None) => panic!("node {:?} finalized with neither value nor error", self.key),
            (Some(_), Some(_)) => panic!("node {:?} finalized with both value and error", self.key),
        };
        let building = inner
            .building
            .take()
            .expect("not-done node missing building state");
        assert!(
            !building.has_unsignaled_deps() || self.key.supports_partial_reevaluation(),
            "node {:?} finalized with unsignaled deps",
            self.key,
        );
        assert!(
            version >= inner.version,
            "node {:?} version regressed: {:?} -> {:?}",
            self.key,
            inner.version,
            version,
        );
        if inner.rdeps.retention() == EdgeRetention::KeepEdges {
            inner.last_build_deps = Some(building.deps().to_groups());
        }
        inner.lifecycle = Lifecycle::Done(outcome);
        inner.version = version;
        inner.evaluating = false;
        debug!(key = ?self.key, ?version, "node entry finalized");
        inner.rdeps.drain_pending()
    }

    /// Discard the current attempt's partially-accumulated dependency
    /// state after an interruption. Waiting parents are kept; the next
    /// attempt re-requests dependencies from scratch.
    pub fn reset_evaluation(&self) {
        let mut inner = self.inner.lock();
        assert!(
            inner.evaluating,
            "reset node {:?} that is not evaluating",
            self.key,
        );
        inner
            .building
            .as_mut()
            .expect("evaluating node missing building state")
            .reset_attempt();
        debug!(key = ?self.key, "node entry evaluation reset");
    }

    // ---- Done-entry edge access --------------------------------------------

    /// The dependency keys of the last completed build, flattened.
    /// Available only on a done entry with retained edges.
    pub fn direct_deps(&self) -> Vec<K> {
        let inner = self.inner.lock();
        assert!(
            matches!(inner.lifecycle, Lifecycle::Done(_)),
            "direct deps requested of not-done node {:?}",
            self.key,
        );
        inner
            .last_build_deps
            .as_ref()
            .unwrap_or_else(|| panic!("node {:?} does not retain direct deps", self.key))
            .iter()
            .flat_map(|group| group.iter().cloned())
            .collect()
    }

    /// The retained reverse dependents of a done entry (`KeepEdges` only).
    pub fn reverse_deps_for_done_entry(&self) -> Vec<K> {
        let inner = self.inner.lock();
        assert!(
            matches!(inner.lifecycle, Lifecycle::Done(_)),
            "reverse deps requested of not-done node {:?}",
            self.key,
        );
        assert_eq!(
            inner.rdeps.retention(),
            EdgeRetention::KeepEdges,
            "node {:?} does not retain reverse deps",
            self.key,
        );
        inner.rdeps.retained()
    }

    /// Remove a retained reverse edge from a done entry. Panics if the
    /// edge was never added.
    pub fn remove_reverse_dep(&self, parent: &K) {
        let mut inner = self.inner.lock();
        assert!(
            matches!(inner.lifecycle, Lifecycle::Done(_)),
            "reverse dep removed from not-done node {:?}",
            self.key,
        );
        assert_eq!(
            inner.rdeps.retention(),
            EdgeRetention::KeepEdges,
            "node {:?} does not retain reverse deps",
            self.key,
        );
        inner.rdeps.remove(parent);
    }

    fn with_building(&self, action: &str, f: impl FnOnce(&mut BuildingState<K>)) {
        let mut inner = self.inner.lock();
        let building = inner
            .building
            .as_mut()
            .unwrap_or_else(|| panic!("cannot {action} done node {:?}", self.key));
        f(building);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;

    /// A key whose computations support incremental resumption.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct PartialKey(&'static str);

    impl NodeKey for PartialKey {
        fn supports_partial_reevaluation(&self) -> bool {
            true
        }
    }

    const V0: Version = Version::MINIMAL;

    fn entry() -> NodeEntry<&'static str, i32> {
        NodeEntry::new("node", EdgeRetention::KeepEdges)
    }

    #[test]
    fn entry_at_start_of_evaluation() {
        let entry = entry();
        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(None),
            DependencyState::NeedsScheduling
        );
        assert!(!entry.is_done());
        assert!(entry.is_ready_to_evaluate());
        assert!(!entry.has_unsignaled_deps());
        assert!(entry.is_dirty());
        assert!(entry.is_changed());
        assert!(entry.temporary_direct_deps().is_empty());
        assert!(!entry.temporary_deps_use_hash_set());
    }

    #[test]
    fn partial_reevaluation_key_selects_hash_set_strategy() {
        let entry: NodeEntry<PartialKey, i32> =
            NodeEntry::new(PartialKey("node"), EdgeRetention::KeepEdges);
        entry.add_reverse_dep_and_check_if_done(None);
        assert!(entry.temporary_deps_use_hash_set());

        // Ready despite unsignaled deps: partial entries may resume early.
        entry.mark_rebuilding();
        entry.add_singleton_temporary_direct_dep(PartialKey("dep"));
        assert!(entry.has_unsignaled_deps());
        assert!(entry.is_ready_to_evaluate());
        assert!(entry.temporary_direct_deps_contain(&PartialKey("dep")));
    }

    #[test]
    fn signal_entry() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();

        entry.add_singleton_temporary_direct_dep("dep1");
        assert!(!entry.is_ready_to_evaluate());
        assert!(entry.has_unsignaled_deps());
        assert!(entry.signal_dep(V0, Some(&"dep1")));
        assert!(entry.is_ready_to_evaluate());
        assert!(!entry.has_unsignaled_deps());
        assert_eq!(entry.temporary_direct_deps(), vec![vec!["dep1"]]);

        entry.add_singleton_temporary_direct_dep("dep2");
        entry.add_singleton_temporary_direct_dep("dep3");
        assert!(entry.has_unsignaled_deps());
        assert!(!entry.signal_dep(V0, Some(&"dep2")));
        assert!(entry.has_unsignaled_deps());
        assert!(entry.signal_dep(V0, Some(&"dep3")));
        assert!(!entry.has_unsignaled_deps());

        assert!(entry.set_value(Some(1), None, V0).is_empty());
        assert!(entry.is_done());
        assert_eq!(entry.version(), V0);
        assert_eq!(entry.direct_deps(), vec!["dep1", "dep2", "dep3"]);
    }

    #[test]
    fn signal_external_dep() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();

        entry.add_external_dep();
        assert!(entry.has_unsignaled_deps());
        assert!(entry.signal_dep(V0, None));
        assert!(!entry.has_unsignaled_deps());

        entry.add_external_dep();
        assert!(entry.has_unsignaled_deps());
        assert!(entry.signal_dep(V0, None));
        assert!(!entry.has_unsignaled_deps());

        // External deps never appear in the group bookkeeping.
        assert!(entry.temporary_direct_deps().is_empty());
    }

    #[test]
    fn reverse_deps() {
        let entry = entry();
        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(Some("mother")),
            DependencyState::NeedsScheduling
        );
        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(None),
            DependencyState::AlreadyEvaluating
        );
        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(Some("father")),
            DependencyState::AlreadyEvaluating
        );
        entry.mark_rebuilding();
        assert_eq!(entry.set_value(Some(1), None, V0), vec!["mother", "father"]);

        assert_eq!(entry.reverse_deps_for_done_entry(), vec!["mother", "father"]);
        entry.remove_reverse_dep(&"mother");
        assert_eq!(entry.reverse_deps_for_done_entry(), vec!["father"]);
    }

    #[test]
    fn registration_after_done_records_edge() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.set_value(Some(1), None, V0);

        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(Some("latecomer")),
            DependencyState::Done
        );
        assert_eq!(entry.reverse_deps_for_done_entry(), vec!["latecomer"]);
    }

    #[test]
    fn error_value() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        let error = EvalError::persistent("oops");
        assert!(entry.set_value(None, Some(error.clone()), V0).is_empty());
        assert!(entry.is_done());
        assert_eq!(entry.value(), None);
        assert_eq!(entry.error(), Some(error));
    }

    #[test]
    #[should_panic(expected = "neither value nor error")]
    fn crash_on_neither_value_nor_error() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.set_value(None, None, V0);
    }

    #[test]
    #[should_panic(expected = "both value and error")]
    fn crash_on_both_value_and_error() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.set_value(Some(1), Some(EvalError::persistent("oops")), V0);
    }

    #[test]
    #[should_panic(expected = "no outstanding deps")]
    fn crash_on_too_many_signals() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.signal_dep(V0, None);
    }

    #[test]
    #[should_panic(expected = "finalized twice")]
    fn crash_on_set_value_when_done() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.set_value(Some(1), None, V0);
        entry.set_value(Some(2), None, Version::of(1));
    }

    #[test]
    #[should_panic(expected = "duplicate reverse dep")]
    fn crash_on_add_reverse_dep_twice() {
        let entry = entry();
        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(Some("parent")),
            DependencyState::NeedsScheduling
        );
        entry.add_reverse_dep_and_check_if_done(Some("parent"));
    }

    #[test]
    #[should_panic(expected = "marked done node")]
    fn crash_on_mark_rebuilding_when_done() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.set_value(Some(1), None, V0);
        entry.mark_rebuilding();
    }

    #[test]
    fn force_rebuild_lifecycle() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.add_singleton_temporary_direct_dep("dep");
        entry.signal_dep(V0, Some(&"dep"));
        entry.set_value(Some(1), None, V0);
        assert!(!entry.is_dirty());
        assert!(entry.is_done());

        entry.mark_dirty(DirtyKind::ForceRebuild);
        assert!(entry.is_dirty());
        assert!(entry.is_changed());
        assert!(!entry.is_done());

        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(None),
            DependencyState::NeedsScheduling
        );
        assert!(entry.is_ready_to_evaluate());
        assert!(!entry.has_unsignaled_deps());

        entry.add_reverse_dep_and_check_if_done(Some("parent"));
        assert_eq!(entry.dirty_state(), DirtyState::NeedsForcedRebuilding);
        assert!(entry.temporary_direct_deps().is_empty());

        // A force-rebuilt node tolerates re-finalizing at the same version.
        entry.force_rebuild();
        assert_eq!(entry.set_value(Some(2), None, V0), vec!["parent"]);
        assert_eq!(entry.version(), V0);
        assert_eq!(entry.value(), Some(2));
    }

    #[test]
    fn allow_twice_marked_force_rebuild() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.set_value(Some(1), None, V0);

        entry.mark_dirty(DirtyKind::ForceRebuild);
        entry.mark_dirty(DirtyKind::ForceRebuild);
        assert!(entry.is_dirty());
        assert!(entry.is_changed());
        assert!(!entry.is_done());
        assert_eq!(entry.dirty_state(), DirtyState::NeedsForcedRebuilding);
    }

    #[test]
    #[should_panic(expected = "mid-evaluation")]
    fn crash_on_mark_dirty_mid_evaluation() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.mark_dirty(DirtyKind::ForceRebuild);
    }

    #[test]
    #[should_panic(expected = "never built")]
    fn crash_on_mark_dirty_before_first_build() {
        let entry = entry();
        entry.mark_dirty(DirtyKind::ForceRebuild);
    }

    #[test]
    fn add_temporary_direct_deps_in_groups() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.add_temporary_direct_deps_in_groups(
            ["1A", "2A", "2B", "3A", "3B", "3C", "4A", "4B", "4C", "4D"],
            &[1, 2, 3, 4],
        );
        assert_eq!(
            entry.temporary_direct_deps(),
            vec![
                vec!["1A"],
                vec!["2A", "2B"],
                vec!["3A", "3B", "3C"],
                vec!["4A", "4B", "4C", "4D"],
            ]
        );
    }

    #[test]
    fn may_have_changed_without_real_change_verifies_clean() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.add_singleton_temporary_direct_dep("dep");
        entry.signal_dep(V0, Some(&"dep"));
        entry.set_value(Some(7), None, V0);

        entry.mark_dirty(DirtyKind::MayHaveChanged);
        assert!(entry.is_dirty());
        assert!(!entry.is_changed());
        assert_eq!(entry.dirty_state(), DirtyState::CheckDependencies);

        entry.add_reverse_dep_and_check_if_done(None);
        let group = entry.next_dirty_direct_deps().expect("one prior group");
        assert_eq!(group, vec!["dep"]);
        entry.add_temporary_direct_dep_group(group);

        // The dependency re-completes at its old version: no real change.
        assert!(entry.signal_dep(V0, Some(&"dep")));
        assert_eq!(entry.dirty_state(), DirtyState::VerifiedClean);

        let rdeps = entry.mark_clean(Version::of(1));
        assert!(rdeps.is_empty());
        assert!(entry.is_done());
        assert_eq!(entry.version(), Version::of(1));
        assert_eq!(entry.value(), Some(7));
    }

    #[test]
    fn may_have_changed_with_real_change_needs_rebuilding() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.add_singleton_temporary_direct_dep("dep");
        entry.signal_dep(V0, Some(&"dep"));
        entry.set_value(Some(7), None, V0);

        entry.mark_dirty(DirtyKind::MayHaveChanged);
        entry.add_reverse_dep_and_check_if_done(None);
        let group = entry.next_dirty_direct_deps().expect("one prior group");
        entry.add_temporary_direct_dep_group(group);

        // The dependency re-completes at a newer version: real change.
        assert!(entry.signal_dep(Version::of(1), Some(&"dep")));
        assert_eq!(entry.dirty_state(), DirtyState::NeedsRebuilding);
        assert!(entry.is_changed());

        entry.mark_rebuilding();
        entry.set_value(Some(8), None, Version::of(1));
        assert_eq!(entry.value(), Some(8));
        assert_eq!(entry.version(), Version::of(1));
    }

    #[test]
    fn reset_discards_accumulated_groups() {
        let entry = entry();
        entry.add_reverse_dep_and_check_if_done(Some("parent"));
        entry.mark_rebuilding();
        entry.add_temporary_direct_dep_group(["a", "b"]);
        entry.signal_dep(V0, Some(&"a"));

        entry.reset_evaluation();
        assert!(entry.temporary_direct_deps().is_empty());
        assert!(!entry.has_unsignaled_deps());

        // The interrupted attempt's parent is still signaled on completion.
        entry.add_temporary_direct_dep_group(["a"]);
        entry.signal_dep(V0, Some(&"a"));
        assert_eq!(entry.set_value(Some(1), None, V0), vec!["parent"]);
    }

    #[test]
    fn discard_edges_mode_returns_parents_but_keeps_none() {
        let entry: NodeEntry<&'static str, i32> =
            NodeEntry::new("node", EdgeRetention::DiscardEdges);
        entry.add_reverse_dep_and_check_if_done(Some("parent"));
        entry.mark_rebuilding();
        assert_eq!(entry.set_value(Some(1), None, V0), vec!["parent"]);

        // Registering on the done entry records nothing.
        assert_eq!(
            entry.add_reverse_dep_and_check_if_done(Some("other")),
            DependencyState::Done
        );
    }

    #[test]
    #[should_panic(expected = "re-validate without retained edges")]
    fn crash_on_may_have_changed_without_kept_edges() {
        let entry: NodeEntry<&'static str, i32> =
            NodeEntry::new("node", EdgeRetention::DiscardEdges);
        entry.add_reverse_dep_and_check_if_done(None);
        entry.mark_rebuilding();
        entry.set_value(Some(1), None, V0);
        entry.mark_dirty(DirtyKind::MayHaveChanged);
    }
}
