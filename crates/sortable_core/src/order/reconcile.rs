//! Sort-order reconciliation between stored and requested orderings.
//!
//! # Responsibility
//! - Expand filtered (subset) requests into an implied full ordering.
//! - Validate that the candidate ordering names exactly the stored records.
//! - Emit only the sort-index writes needed to reach the candidate ordering.
//!
//! # Invariants
//! - Validation completes before any write is emitted.
//! - Applying every emitted write leaves sort indices at exactly `0..n-1`.
//! - Reconciling an already consistent ordering emits nothing.

use crate::order::reorder::{reorder_subset, InvalidSubsetError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::Hash;

/// One record of the stored ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedEntry<Id> {
    pub id: Id,
    /// Currently persisted sort index, `None` when unset.
    pub sort_index: Option<i64>,
}

impl<Id> OrderedEntry<Id> {
    pub fn new(id: Id, sort_index: Option<i64>) -> Self {
        Self { id, sort_index }
    }
}

/// One sort-index write to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortWrite<Id> {
    pub id: Id,
    pub sort_index: i64,
}

/// Errors raised before any write is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Filtered request names identifiers outside the stored ordering.
    InvalidSubset(InvalidSubsetError),
    /// Candidate ordering cardinality differs from the stored one.
    OrderLengthMismatch { expected: usize, actual: usize },
    /// Unfiltered request has the stored cardinality but names unknown or
    /// repeated identifiers.
    OrderMembershipMismatch(InvalidSubsetError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSubset(err) => write!(f, "invalid subset order: {err}"),
            Self::OrderLengthMismatch { expected, actual } => write!(
                f,
                "requested order has {actual} entries but {expected} are stored"
            ),
            Self::OrderMembershipMismatch(err) => {
                write!(f, "requested order does not name the stored entries: {err}")
            }
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSubset(err) | Self::OrderMembershipMismatch(err) => Some(err),
            Self::OrderLengthMismatch { .. } => None,
        }
    }
}

impl From<InvalidSubsetError> for ReconcileError {
    fn from(value: InvalidSubsetError) -> Self {
        Self::InvalidSubset(value)
    }
}

/// Computes the writes that turn `current_order` into `requested_order`.
///
/// With `has_active_filter`, `requested_order` holds only the visible records
/// and is expanded through [`reorder_subset`] first. Without it,
/// `requested_order` must name the whole collection.
///
/// A position is written when its identifier changed or when the record
/// already there does not store that position as its sort index, so gaps
/// left by deletions are closed on the next call.
///
/// # Errors
/// - [`ReconcileError::InvalidSubset`] when a filtered request references
///   unknown identifiers.
/// - [`ReconcileError::OrderLengthMismatch`] when an unfiltered request does
///   not have as many entries as `current_order`.
/// - [`ReconcileError::OrderMembershipMismatch`] when an unfiltered request
///   names identifiers that are not stored, or repeats one.
pub fn reconcile<Id>(
    current_order: &[OrderedEntry<Id>],
    requested_order: &[Id],
    has_active_filter: bool,
) -> Result<Vec<SortWrite<Id>>, ReconcileError>
where
    Id: Eq + Hash + Clone,
{
    if !has_active_filter && requested_order.len() != current_order.len() {
        return Err(ReconcileError::OrderLengthMismatch {
            expected: current_order.len(),
            actual: requested_order.len(),
        });
    }

    // A full request is a subset covering every position, so one pass checks
    // both cases.
    let full_order: Vec<Id> = current_order.iter().map(|entry| entry.id.clone()).collect();
    let candidate = reorder_subset(&full_order, requested_order).map_err(|err| {
        if has_active_filter {
            ReconcileError::InvalidSubset(err)
        } else {
            ReconcileError::OrderMembershipMismatch(err)
        }
    })?;

    let writes = candidate
        .into_iter()
        .zip(current_order)
        .enumerate()
        .filter_map(|(index, (id, previous))| {
            let sort_index = index as i64;
            let moved = previous.id != id;
            let stale = previous.sort_index != Some(sort_index);
            (moved || stale).then_some(SortWrite { id, sort_index })
        })
        .collect();
    Ok(writes)
}

#[cfg(test)]
mod tests {
    use super::{reconcile, OrderedEntry, ReconcileError, SortWrite};

    fn packed(ids: &[&'static str]) -> Vec<OrderedEntry<&'static str>> {
        ids.iter()
            .enumerate()
            .map(|(index, id)| OrderedEntry::new(*id, Some(index as i64)))
            .collect()
    }

    fn write(id: &'static str, sort_index: i64) -> SortWrite<&'static str> {
        SortWrite { id, sort_index }
    }

    #[test]
    fn reversed_full_order_skips_the_unmoved_middle() {
        let current = packed(&["d1", "d2", "d3", "d4", "d5"]);
        let writes = reconcile(&current, &["d5", "d4", "d3", "d2", "d1"], false).unwrap();
        assert_eq!(
            writes,
            vec![write("d5", 0), write("d4", 1), write("d2", 3), write("d1", 4)]
        );
    }

    #[test]
    fn unfiltered_length_mismatch_is_rejected() {
        let current = packed(&["d1", "d2", "d3"]);
        let err = reconcile(&current, &["d0", "d3", "d2", "d1"], false).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::OrderLengthMismatch {
                expected: 3,
                actual: 4,
            }
        );
    }

    #[test]
    fn unfiltered_request_missing_entries_is_rejected() {
        let current = packed(&["d1", "d2", "d3"]);
        assert!(matches!(
            reconcile(&current, &["d2", "d1"], false),
            Err(ReconcileError::OrderLengthMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn unfiltered_request_with_unknown_member_is_rejected() {
        let current = packed(&["d1", "d2", "d3"]);
        let err = reconcile(&current, &["d3", "d2", "dx"], false).unwrap_err();
        assert!(matches!(err, ReconcileError::OrderMembershipMismatch(_)));
    }

    #[test]
    fn unfiltered_request_with_repeated_member_is_rejected() {
        let current = packed(&["d1", "d2", "d3"]);
        let err = reconcile(&current, &["d3", "d3", "d1"], false).unwrap_err();
        assert!(matches!(err, ReconcileError::OrderMembershipMismatch(_)));
    }

    #[test]
    fn filtered_subset_expands_to_full_order() {
        let current = packed(&["d1", "d2", "d3", "d4", "d5"]);
        let writes = reconcile(&current, &["d4", "d3", "d2"], true).unwrap();
        assert_eq!(writes, vec![write("d4", 1), write("d2", 3)]);
    }

    #[test]
    fn filtered_subset_with_unknown_member_fails_before_writes() {
        let current = packed(&["d1", "d2", "d3", "d4", "d5"]);
        let err = reconcile(&current, &["d4", "dx", "d2"], true).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidSubset(_)));
    }

    #[test]
    fn second_application_is_a_no_op() {
        let mut current = packed(&["d1", "d2", "d3", "d4"]);
        let requested = ["d3", "d1", "d4", "d2"];

        let writes = reconcile(&current, &requested, false).unwrap();
        assert!(!writes.is_empty());

        current = requested
            .iter()
            .map(|id| {
                let stored = writes
                    .iter()
                    .find(|write| write.id == *id)
                    .map(|write| write.sort_index);
                OrderedEntry::new(*id, stored)
            })
            .collect();
        assert!(reconcile(&current, &requested, false).unwrap().is_empty());
    }

    #[test]
    fn stale_indices_are_rewritten_even_without_moves() {
        let current = vec![
            OrderedEntry::new("d1", Some(0)),
            OrderedEntry::new("d3", Some(2)),
            OrderedEntry::new("d4", Some(3)),
            OrderedEntry::new("d5", None),
        ];
        let writes = reconcile(&current, &["d1", "d3", "d4", "d5"], false).unwrap();
        assert_eq!(writes, vec![write("d3", 1), write("d4", 2), write("d5", 3)]);
    }

    #[test]
    fn identifier_change_forces_write_even_when_index_matches() {
        // Both records claim index 0; the requested order swaps them.
        let current = vec![OrderedEntry::new("a", Some(0)), OrderedEntry::new("b", Some(0))];
        let writes = reconcile(&current, &["b", "a"], false).unwrap();
        assert_eq!(writes, vec![write("b", 0), write("a", 1)]);
    }

    #[test]
    fn empty_collection_reconciles_to_nothing() {
        let current: Vec<OrderedEntry<&str>> = Vec::new();
        assert!(reconcile(&current, &[], false).unwrap().is_empty());
        assert!(reconcile(&current, &[], true).unwrap().is_empty());
    }
}
