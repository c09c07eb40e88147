//! Domain model for sortable collection entries.
//!
//! # Responsibility
//! - Define canonical entry records and query predicates used by core logic.
//!
//! # Invariants
//! - Every entry is identified by a `DocumentId` within its content type and
//!   locale scope.
//! - Attribute names are validated before they are used in storage queries.

pub mod entry;
pub mod filter;
