//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the document-store contract used by sort-order services.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyExists`) in
//!   addition to DB transport errors.

pub mod entry_repo;
