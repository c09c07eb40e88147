//! Core domain logic for sortable collection entries.
//! This crate is the single source of truth for ordering invariants.

pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod order;
pub mod repo;
pub mod service;

pub use api::controller::{AdminController, ApiRequest, ApiResponse, Method};
pub use config::{ConfigError, SortableConfig, DEFAULT_SORT_ORDER_FIELD};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::{DocumentId, Entry, EntryData, EntryValidationError, NewEntry};
pub use model::filter::{parse_filters, EntryFilter, FilterError, FilterExpr, FilterOp};
pub use order::reconcile::{reconcile, OrderedEntry, ReconcileError, SortWrite};
pub use order::reorder::{move_item, reorder_subset, InvalidSubsetError};
pub use repo::entry_repo::{
    EntryQuery, EntryRepoError, EntryRepoResult, EntryRepository, EntrySort, SortDirection,
    SqliteEntryRepository,
};
pub use service::entry_service::{EntryService, EntryServiceError};
pub use service::sort_order_service::{
    EntrySummary, FetchEntriesRequest, SortOrderOutcome, SortOrderService, SortOrderServiceError,
    UpdateSortOrderRequest,
};

/// Minimal health-check API for front-end wiring checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
