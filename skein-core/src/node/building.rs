//! In-Flight Attempt Bookkeeping
//!
//! A node that is not done carries a `BuildingState`: the dirty/readiness
//! state machine for the current evaluation attempt. It owns the attempt's
//! dependency groups, the outstanding-unsignaled counter (including
//! external, unkeyed dependencies), the change flag fed by version
//! comparison, and — for a dirty node being re-validated — the cursor over
//! the previous build's dependency groups.
//!
//! The signaling protocol is commutative: signals for one node may arrive
//! from any thread in any order, and the final unblocked determination
//! depends only on how many arrived, never on their order. The caller
//! (the node entry) serializes access with its per-node lock.

use super::deps::GroupedDeps;
use super::key::NodeKey;

/// How a done node was marked dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyKind {
    /// A dependency changed upstream; prior dependencies must be
    /// re-checked for actual change before recomputing.
    MayHaveChanged,

    /// Recompute unconditionally, skipping re-validation. Used for
    /// externally-forced invalidation such as a detected side effect.
    ForceRebuild,
}

/// What the evaluator must do with a dirty, not-yet-finalized node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Prior dependencies must be re-checked for actual change.
    CheckDependencies,

    /// A prior dependency really changed; the node must recompute.
    NeedsRebuilding,

    /// Re-validation is skipped; the node must recompute unconditionally.
    NeedsForcedRebuilding,

    /// The node is actively recomputing.
    Rebuilding,

    /// Every prior dependency was re-checked and none changed: the node
    /// may be re-stamped clean at the new version without recomputing.
    VerifiedClean,
}

/// Bookkeeping for one evaluation attempt.
#[derive(Debug)]
pub(crate) struct BuildingState<K>
where
    K: NodeKey,
{
    /// Current dirty state. `VerifiedClean` is never stored; it is
    /// derived in [`dirty_state`](Self::dirty_state).
    state: DirtyState,

    /// Whether this attempt is known to produce a different value than the
    /// previous build (always true for a first build or forced rebuild).
    changed: bool,

    /// Dependencies requested so far in this attempt, grouped and ordered.
    deps: GroupedDeps<K>,

    /// How many dependency completions have been signaled.
    signaled: usize,

    /// Tracked-but-unkeyed dependencies outside the graph. Counted toward
    /// the unblocking counter, invisible to the group tracker.
    external_deps: usize,

    /// Dependency groups of the previous completed build, re-checked one
    /// group at a time while in `CheckDependencies`.
    prior_groups: Vec<Vec<K>>,
    next_prior_group: usize,
}

impl<K> BuildingState<K>
where
    K: NodeKey,
{
    /// State for a node that has never been built.
    pub(crate) fn new_initial(partial_reevaluation: bool) -> Self {
        Self {
            state: DirtyState::NeedsRebuilding,
            changed: true,
            deps: Self::new_deps(partial_reevaluation),
            signaled: 0,
            external_deps: 0,
            prior_groups: Vec::new(),
            next_prior_group: 0,
        }
    }

    /// State for a previously-done node just marked dirty.
    pub(crate) fn new_dirty(
        kind: DirtyKind,
        prior_groups: Vec<Vec<K>>,
        partial_reevaluation: bool,
    ) -> Self {
        let (state, changed) = match kind {
            DirtyKind::MayHaveChanged => (DirtyState::CheckDependencies, false),
            DirtyKind::ForceRebuild => (DirtyState::NeedsForcedRebuilding, true),
        };
        Self {
            state,
            changed,
            deps: Self::new_deps(partial_reevaluation),
            signaled: 0,
            external_deps: 0,
            prior_groups,
            next_prior_group: 0,
        }
    }

    fn new_deps(partial_reevaluation: bool) -> GroupedDeps<K> {
        if partial_reevaluation {
            GroupedDeps::new_with_hash_set()
        } else {
            GroupedDeps::new_list()
        }
    }

    pub(crate) fn deps(&self) -> &GroupedDeps<K> {
        &self.deps
    }

    pub(crate) fn deps_mut(&mut self) -> &mut GroupedDeps<K> {
        &mut self.deps
    }

    pub(crate) fn add_external_dep(&mut self) {
        self.external_deps += 1;
    }

    fn requested(&self) -> usize {
        self.deps.num_deps() + self.external_deps
    }

    pub(crate) fn has_unsignaled_deps(&self) -> bool {
        self.signaled < self.requested()
    }

    pub(crate) fn is_changed(&self) -> bool {
        self.changed
    }

    /// Record one dependency completion.
    ///
    /// Returns `true` when every requested dependency has now signaled.
    /// Panics if more completions arrive than dependencies were requested.
    pub(crate) fn signal(&mut self, child_changed: bool) -> bool {
        assert!(
            self.signaled < self.requested(),
            "dependency signaled with no outstanding deps ({} requested)",
            self.requested(),
        );
        self.signaled += 1;
        if child_changed {
            self.changed = true;
            if self.state == DirtyState::CheckDependencies {
                self.state = DirtyState::NeedsRebuilding;
            }
        }
        self.signaled == self.requested()
    }

    /// The effective dirty state, deriving `VerifiedClean` once every
    /// prior group has been re-checked without a change.
    pub(crate) fn dirty_state(&self) -> DirtyState {
        if self.state == DirtyState::CheckDependencies
            && self.next_prior_group == self.prior_groups.len()
            && !self.has_unsignaled_deps()
        {
            DirtyState::VerifiedClean
        } else {
            self.state
        }
    }

    /// The next group of prior dependencies to re-check, advancing the
    /// cursor. `None` once all groups have been handed out.
    pub(crate) fn next_dirty_deps(&mut self) -> Option<Vec<K>> {
        assert_eq!(
            self.state,
            DirtyState::CheckDependencies,
            "requested dirty deps of a node not checking dependencies",
        );
        let group = self.prior_groups.get(self.next_prior_group)?.clone();
        self.next_prior_group += 1;
        Some(group)
    }

    /// Transition `NeedsRebuilding` to `Rebuilding`.
    pub(crate) fn mark_rebuilding(&mut self) {
        assert_eq!(
            self.state,
            DirtyState::NeedsRebuilding,
            "marked rebuilding from {:?}",
            self.state,
        );
        self.state = DirtyState::Rebuilding;
    }

    /// Transition `NeedsForcedRebuilding` to `Rebuilding`.
    pub(crate) fn force_rebuild(&mut self) {
        assert_eq!(
            self.state,
            DirtyState::NeedsForcedRebuilding,
            "force-rebuilt from {:?}",
            self.state,
        );
        self.state = DirtyState::Rebuilding;
        self.changed = true;
    }

    /// Escalate an already-dirty node to a forced rebuild. Idempotent.
    pub(crate) fn escalate_to_forced(&mut self) {
        self.state = DirtyState::NeedsForcedRebuilding;
        self.changed = true;
    }

    /// Discard the attempt's accumulated dependency state after an
    /// interruption, keeping the node restartable from scratch.
    pub(crate) fn reset_attempt(&mut self) {
        let partial = self.deps.uses_hash_set();
        self.deps = Self::new_deps(partial);
        self.signaled = 0;
        self.external_deps = 0;
        self.next_prior_group = 0;
    }
}
