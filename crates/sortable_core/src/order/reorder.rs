//! Subset reordering over a full ordering.
//!
//! # Responsibility
//! - Relocate a named subset of identifiers into a new relative order while
//!   every other identifier keeps its slot.
//! - Apply single drag-end moves to an ordering.
//!
//! # Invariants
//! - Inputs are never mutated; results are fresh vectors.
//! - Output of `reorder_subset` has the same length and multiset as the input.
//! - Runs in O(n) over the full ordering.

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::Hash;

/// Subset does not map one-to-one onto members of the full ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSubsetError {
    /// Number of identifiers requested in the subset.
    pub subset_len: usize,
    /// Number of positions in the full ordering held by subset members.
    pub matched_positions: usize,
}

impl Display for InvalidSubsetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "subset of {} identifiers matched {} positions in the full order",
            self.subset_len, self.matched_positions
        )
    }
}

impl Error for InvalidSubsetError {}

/// Reorders the members of `subset_order` inside `full_order`.
///
/// Positions held by subset members are collected in ascending order and
/// refilled, in that order, with `subset_order` as given. Identifiers outside
/// the subset stay where they are.
///
/// ```
/// use sortable_core::reorder_subset;
///
/// let full = ["a", "b", "c", "d", "e", "f"];
/// let reordered = reorder_subset(&full, &["e", "a", "c"]).unwrap();
/// assert_eq!(reordered, ["e", "b", "a", "d", "c", "f"]);
/// ```
///
/// # Errors
/// - Returns [`InvalidSubsetError`] when the number of matched positions
///   differs from `subset_order.len()`, i.e. some identifier is absent from
///   `full_order` or repeated in `subset_order`.
pub fn reorder_subset<T>(full_order: &[T], subset_order: &[T]) -> Result<Vec<T>, InvalidSubsetError>
where
    T: Eq + Hash + Clone,
{
    let members: HashSet<&T> = subset_order.iter().collect();

    let positions: Vec<usize> = full_order
        .iter()
        .enumerate()
        .filter(|(_, id)| members.contains(id))
        .map(|(index, _)| index)
        .collect();

    if positions.len() != subset_order.len() {
        return Err(InvalidSubsetError {
            subset_len: subset_order.len(),
            matched_positions: positions.len(),
        });
    }

    let mut reordered = full_order.to_vec();
    for (position, id) in positions.into_iter().zip(subset_order) {
        reordered[position] = id.clone();
    }
    Ok(reordered)
}

/// Moves the identifier at `from` so it ends up at index `to`.
///
/// Mirrors a single drag-end step of the editor list: the dragged element is
/// removed and re-inserted, shifting the elements in between by one.
/// `to` is clamped to the last index; an out-of-range `from` returns the
/// ordering unchanged.
pub fn move_item<T: Clone>(order: &[T], from: usize, to: usize) -> Vec<T> {
    let mut moved = order.to_vec();
    if from >= moved.len() {
        return moved;
    }

    let item = moved.remove(from);
    let target = to.min(moved.len());
    moved.insert(target, item);
    moved
}
