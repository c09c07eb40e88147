//! Pure ordering algorithms.
//!
//! # Responsibility
//! - Reorder filtered subsets inside a full ordering.
//! - Diff stored and requested orderings into minimal sort-index writes.
//!
//! # Invariants
//! - No I/O and no shared state; every function is deterministic.

pub mod reconcile;
pub mod reorder;
