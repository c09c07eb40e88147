//! Sort-order use-case service.
//!
//! # Responsibility
//! - List entries of one scope in persisted sort order.
//! - Turn a requested (possibly filtered) ordering into sort-index writes and
//!   apply them through the repository.
//!
//! # Invariants
//! - Exactly one read of the full scope precedes any write.
//! - Validation failures surface before the first write.
//! - Writes are independent; the first failing write aborts the batch and
//!   already applied writes stay in place.
//!
//! Two overlapping updates against one scope race: each record keeps
//! whichever write lands last. There is no version check per record.

use crate::model::entry::{
    validate_content_type, validate_field_name, DocumentId, Entry, EntryData,
    EntryValidationError,
};
use crate::model::filter::{EntryFilter, FilterExpr, FilterOp};
use crate::order::reconcile::{reconcile, OrderedEntry, ReconcileError};
use crate::repo::entry_repo::{
    EntryQuery, EntryRepoError, EntryRepoResult, EntryRepository, EntrySort,
};
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from sort-order service operations.
#[derive(Debug)]
pub enum SortOrderServiceError {
    /// Request carries an invalid uid or field name.
    InvalidRequest(EntryValidationError),
    /// Requested ordering does not match the stored one.
    Reconcile(ReconcileError),
    /// Repository-level failure.
    Repo(EntryRepoError),
}

impl Display for SortOrderServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(err) => write!(f, "invalid sort request: {err}"),
            Self::Reconcile(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SortOrderServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRequest(err) => Some(err),
            Self::Reconcile(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<EntryValidationError> for SortOrderServiceError {
    fn from(value: EntryValidationError) -> Self {
        Self::InvalidRequest(value)
    }
}

impl From<ReconcileError> for SortOrderServiceError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

impl From<EntryRepoError> for SortOrderServiceError {
    fn from(value: EntryRepoError) -> Self {
        match value {
            EntryRepoError::Validation(err) => Self::InvalidRequest(err),
            other => Self::Repo(other),
        }
    }
}

/// Request for listing entries in sort order.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchEntriesRequest {
    pub content_type: String,
    pub sort_order_field: String,
    /// Display attribute returned next to each id.
    pub main_field: String,
    pub filters: Vec<FilterExpr>,
    pub locale: Option<String>,
}

/// One listed entry: id plus main display value.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySummary {
    pub document_id: DocumentId,
    /// `Value::Null` when the entry lacks the main field.
    pub main_value: Value,
}

/// Request for persisting a new ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSortOrderRequest {
    pub content_type: String,
    pub sort_order_field: String,
    /// Requested order; only the visible entries when `has_active_filter`.
    pub sorted_document_ids: Vec<DocumentId>,
    pub has_active_filter: bool,
    pub locale: Option<String>,
}

/// Counts reported after a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrderOutcome {
    pub written: usize,
    pub unchanged: usize,
}

/// Sort-order service facade.
pub struct SortOrderService<R: EntryRepository> {
    repo: R,
}

impl<R: EntryRepository> SortOrderService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists entries ascending by `sort_order_field`.
    pub fn fetch_entries(
        &self,
        request: &FetchEntriesRequest,
    ) -> Result<Vec<EntrySummary>, SortOrderServiceError> {
        validate_content_type(&request.content_type)?;
        validate_field_name(&request.sort_order_field)?;
        validate_field_name(&request.main_field)?;

        let query = EntryQuery::new(request.content_type.as_str(), request.locale.as_deref())
            .sorted_by(EntrySort::asc(request.sort_order_field.as_str()))
            .filtered_by(request.filters.clone());
        let entries = self.repo.find_many(&query)?;

        Ok(entries
            .into_iter()
            .map(|entry| EntrySummary {
                main_value: entry
                    .field(&request.main_field)
                    .cloned()
                    .unwrap_or(Value::Null),
                document_id: entry.document_id,
            })
            .collect())
    }

    /// Persists `request.sorted_document_ids` as the new order of the scope.
    ///
    /// Only entries whose position or stored sort index changes are written.
    pub fn update_sort_order(
        &self,
        request: &UpdateSortOrderRequest,
    ) -> Result<SortOrderOutcome, SortOrderServiceError> {
        let started_at = Instant::now();
        validate_content_type(&request.content_type)?;
        validate_field_name(&request.sort_order_field)?;
        let field = request.sort_order_field.as_str();
        let locale = request.locale.as_deref();

        let query = EntryQuery::new(request.content_type.as_str(), locale)
            .sorted_by(EntrySort::asc(field));
        let current: Vec<OrderedEntry<DocumentId>> = self
            .repo
            .find_many(&query)?
            .into_iter()
            .map(|entry| {
                let sort_index = entry.sort_index(field);
                OrderedEntry::new(entry.document_id, sort_index)
            })
            .collect();

        let writes = reconcile(
            &current,
            &request.sorted_document_ids,
            request.has_active_filter,
        )
        .map_err(|err| {
            warn!(
                "event=sort_order_update module=service status=rejected content_type={} filtered={} stored={} requested={} error={err}",
                request.content_type,
                request.has_active_filter,
                current.len(),
                request.sorted_document_ids.len()
            );
            err
        })?;

        for write in &writes {
            let mut patch = EntryData::new();
            patch.insert(field.to_string(), Value::from(write.sort_index));
            if let Err(err) =
                self.repo
                    .update_fields(&request.content_type, locale, &write.id, &patch)
            {
                error!(
                    "event=sort_order_update module=service status=error content_type={} document_id={} duration_ms={} error={err}",
                    request.content_type,
                    write.id,
                    started_at.elapsed().as_millis()
                );
                return Err(err.into());
            }
        }

        let outcome = SortOrderOutcome {
            written: writes.len(),
            unchanged: current.len() - writes.len(),
        };
        info!(
            "event=sort_order_update module=service status=ok content_type={} filtered={} written={} unchanged={} duration_ms={}",
            request.content_type,
            request.has_active_filter,
            outcome.written,
            outcome.unchanged,
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Returns the entry holding the highest sort index in the scope.
    pub fn fetch_last_entry(
        &self,
        content_type: &str,
        sort_order_field: &str,
        locale: Option<&str>,
    ) -> Result<Option<Entry>, SortOrderServiceError> {
        Ok(find_last_entry(
            &self.repo,
            content_type,
            sort_order_field,
            locale,
        )?)
    }
}

/// Loads the entry with the highest value for `sort_order_field`.
///
/// Entries without a value for the field are ignored.
pub(crate) fn find_last_entry<R: EntryRepository>(
    repo: &R,
    content_type: &str,
    sort_order_field: &str,
    locale: Option<&str>,
) -> EntryRepoResult<Option<Entry>> {
    validate_content_type(content_type)?;
    validate_field_name(sort_order_field)?;

    let query = EntryQuery::new(content_type, locale)
        .sorted_by(EntrySort::desc(sort_order_field))
        .filtered_by(vec![EntryFilter::new(
            sort_order_field,
            FilterOp::NotNull,
            Value::Bool(true),
        )]);
    repo.find_first(&query)
}
