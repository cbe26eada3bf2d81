//! The Per-Node Engine
//!
//! Everything that lives inside one node entry: the key contract, the
//! dependency-group tracker, the reverse-dependency set, the in-flight
//! attempt bookkeeping, and the entry state machine that ties them
//! together.
//!
//! The engine never decides *what* to compute or *when* to run it. It only
//! maintains correct, race-free bookkeeping: which dependencies an attempt
//! requested, who is waiting on the node, whether a signal unblocked it,
//! and whether a dirty node really changed.

mod building;
mod deps;
mod entry;
mod key;
mod rdeps;

pub use building::{DirtyKind, DirtyState};
pub use deps::GroupedDeps;
pub use entry::{DependencyState, NodeEntry};
pub use key::NodeKey;
pub use rdeps::{EdgeRetention, ReverseDeps};
