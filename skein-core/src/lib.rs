//! Skein Core
//!
//! This crate provides the incremental-evaluation dependency graph at the
//! heart of a parallel build/compute orchestrator: a shared, key-addressed
//! graph of computation nodes that lets a build engine recompute only what
//! changed since a previous run, while evaluating many independent nodes
//! in parallel.
//!
//! It implements:
//!
//! - The node-entry state machine (registration, dependency accumulation,
//!   completion signaling, finalization, dirtying)
//! - Grouped dependency tracking with list and hash-set strategies
//! - Reverse-dependency edges for invalidation propagation
//! - Version-based change detection
//!
//! It deliberately does not implement the computations themselves, the
//! thread pool that schedules ready nodes, or any persistence: those are
//! the caller's collaborators, driven entirely through this crate's
//! in-process contract.
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `graph`: the shared node table and the build version clock
//! - `node`: the per-node engine (keys, dependency groups, reverse deps,
//!   the entry state machine)
//! - `error`: structured evaluation errors carried on failed nodes
//!
//! # Example
//!
//! ```rust
//! use skein_core::graph::{NodeTable, Version};
//! use skein_core::node::{DependencyState, EdgeRetention};
//!
//! let table: NodeTable<&str, i32> = NodeTable::new(EdgeRetention::KeepEdges);
//!
//! // A parent requests "child"; the first request starts evaluation.
//! let child = table.get_or_create(&"child");
//! assert_eq!(
//!     child.add_reverse_dep_and_check_if_done(Some("parent")),
//!     DependencyState::NeedsScheduling
//! );
//!
//! // The evaluator runs the computation and finalizes the node.
//! child.mark_rebuilding();
//! let to_notify = child.set_value(Some(42), None, Version::MINIMAL);
//! assert_eq!(to_notify, vec!["parent"]);
//! assert_eq!(child.value(), Some(42));
//! ```

pub mod error;
pub mod graph;
pub mod node;
