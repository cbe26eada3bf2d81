//! The Shared Graph
//!
//! This module holds the process-wide pieces of the engine: the
//! key-addressed node table and the monotonic build version clock.
//!
//! # Design Decisions
//!
//! 1. The graph is a map from key to entry, with all cross-node references
//!    expressed as key lookups. Nodes never own each other, so the
//!    cyclic-by-reference dependency structure creates no ownership
//!    cycles.
//!
//! 2. The table is an explicit object passed to the evaluator, not ambient
//!    global state. Its lifetime is one build invocation, or many if the
//!    caller retains it for incremental re-builds.
//!
//! 3. Versions are compared, never interpreted: a node completed at a
//!    strictly greater version than its dependent's last build is a real
//!    change; anything else is mere re-evaluation.

mod table;
mod version;

pub use table::NodeTable;
pub use version::{Version, VersionClock};
