//! Entry lifecycle service.
//!
//! # Responsibility
//! - Create entries, assigning the next sort index when the caller leaves
//!   the sort-order attribute empty.
//! - Load and delete single entries.
//!
//! # Invariants
//! - A provided integer sort index (including `0`) is never overwritten.
//! - Entries whose data lacks the sort-order attribute are stored as given.
//! - Deleting an entry never re-packs the indices of the remaining entries.

use crate::model::entry::{validate_field_name, Entry, EntryValidationError, NewEntry};
use crate::repo::entry_repo::{EntryRepoError, EntryRepository};
use crate::service::sort_order_service::find_last_entry;
use log::info;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from entry service operations.
#[derive(Debug)]
pub enum EntryServiceError {
    /// Input rejected before persistence.
    Validation(EntryValidationError),
    /// Repository-level failure.
    Repo(EntryRepoError),
}

impl Display for EntryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EntryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<EntryValidationError> for EntryServiceError {
    fn from(value: EntryValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<EntryRepoError> for EntryServiceError {
    fn from(value: EntryRepoError) -> Self {
        match value {
            EntryRepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Entry service facade.
pub struct EntryService<R: EntryRepository> {
    repo: R,
    sort_order_field: String,
}

impl<R: EntryRepository> EntryService<R> {
    /// Creates service assigning indices to `sort_order_field`.
    pub fn new(repo: R, sort_order_field: impl Into<String>) -> Self {
        Self {
            repo,
            sort_order_field: sort_order_field.into(),
        }
    }

    /// Creates one entry.
    ///
    /// When `entry.data` holds the sort-order attribute with a `null` value,
    /// it is replaced by the last index of the scope plus one, or `0` when no
    /// entry of the scope has an index yet.
    pub fn create_entry(&self, mut entry: NewEntry) -> Result<Entry, EntryServiceError> {
        entry.validate()?;
        validate_field_name(&self.sort_order_field)?;

        let needs_index = match entry.data.get(&self.sort_order_field) {
            None => false,
            Some(Value::Null) => true,
            Some(value) if value.is_i64() => false,
            Some(value) => {
                return Err(EntryServiceError::Validation(
                    EntryValidationError::InvalidSortIndex {
                        field: self.sort_order_field.clone(),
                        value: value.to_string(),
                    },
                ));
            }
        };

        let assigned = if needs_index {
            let next = self.next_sort_index(&entry)?;
            entry
                .data
                .insert(self.sort_order_field.clone(), Value::from(next));
            Some(next)
        } else {
            None
        };

        let created = self.repo.create_entry(&entry)?;
        info!(
            "event=entry_create module=service status=ok content_type={} localized={} assigned_sort_index={}",
            created.content_type,
            created.locale.is_some(),
            assigned.map_or_else(|| "none".to_string(), |index| index.to_string())
        );
        Ok(created)
    }

    /// Loads one entry by id.
    pub fn get_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> Result<Option<Entry>, EntryServiceError> {
        Ok(self.repo.get_entry(content_type, locale, document_id)?)
    }

    /// Deletes one entry, leaving a gap in the scope's sort indices.
    pub fn delete_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> Result<(), EntryServiceError> {
        self.repo.delete_entry(content_type, locale, document_id)?;
        info!("event=entry_delete module=service status=ok content_type={content_type}");
        Ok(())
    }

    fn next_sort_index(&self, entry: &NewEntry) -> Result<i64, EntryServiceError> {
        let last = find_last_entry(
            &self.repo,
            &entry.content_type,
            &self.sort_order_field,
            entry.locale.as_deref(),
        )?;
        Ok(last
            .and_then(|last| last.sort_index(&self.sort_order_field))
            .map_or(0, |index| index + 1))
    }
}
