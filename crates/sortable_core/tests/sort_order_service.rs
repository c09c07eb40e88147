use serde_json::{json, Value};
use sortable_core::db::open_db_in_memory;
use sortable_core::{
    DbError, Entry, EntryData, EntryFilter, EntryQuery, EntryRepoError, EntryRepoResult,
    EntryRepository, EntrySort, FetchEntriesRequest, NewEntry, ReconcileError, SortOrderOutcome,
    SortOrderService, SortOrderServiceError, SqliteEntryRepository, UpdateSortOrderRequest,
};
use std::cell::Cell;

const PRODUCT: &str = "api::product.product";
const FIELD: &str = "sortOrder";

fn seed(repo: &SqliteEntryRepository<'_>, id: &str, value: Value) {
    let data = value.as_object().unwrap().clone();
    repo.create_entry(&NewEntry::new(PRODUCT, data).with_document_id(id))
        .unwrap();
}

/// d1..d5 stored at 0..4.
fn seed_five(repo: &SqliteEntryRepository<'_>) {
    for (index, id) in ["d1", "d2", "d3", "d4", "d5"].into_iter().enumerate() {
        seed(repo, id, json!({ "title": id.to_uppercase(), "sortOrder": index }));
    }
}

fn update_request(ids: &[&str], has_active_filter: bool) -> UpdateSortOrderRequest {
    UpdateSortOrderRequest {
        content_type: PRODUCT.to_string(),
        sort_order_field: FIELD.to_string(),
        sorted_document_ids: ids.iter().map(|id| id.to_string()).collect(),
        has_active_filter,
        locale: None,
    }
}

fn stored_order(repo: &SqliteEntryRepository<'_>) -> Vec<(String, Option<i64>)> {
    repo.find_many(&EntryQuery::new(PRODUCT, None).sorted_by(EntrySort::asc(FIELD)))
        .unwrap()
        .into_iter()
        .map(|entry| {
            let index = entry.sort_index(FIELD);
            (entry.document_id, index)
        })
        .collect()
}

fn pairs(expected: &[(&str, i64)]) -> Vec<(String, Option<i64>)> {
    expected
        .iter()
        .map(|(id, index)| (id.to_string(), Some(*index)))
        .collect()
}

#[test]
fn full_reversal_rewrites_every_moved_entry() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    let service = SortOrderService::new(repo);

    let outcome = service
        .update_sort_order(&update_request(&["d5", "d4", "d3", "d2", "d1"], false))
        .unwrap();

    assert_eq!(
        outcome,
        SortOrderOutcome {
            written: 4,
            unchanged: 1
        }
    );
    assert_eq!(
        stored_order(&repo),
        pairs(&[("d5", 0), ("d4", 1), ("d3", 2), ("d2", 3), ("d1", 4)])
    );
}

#[test]
fn filtered_subset_moves_only_visible_entries() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    let service = SortOrderService::new(repo);

    // Visible entries d2, d4 swapped; d1, d3, d5 stay in their slots.
    let outcome = service
        .update_sort_order(&update_request(&["d4", "d2"], true))
        .unwrap();

    assert_eq!(outcome.written, 2);
    assert_eq!(
        stored_order(&repo),
        pairs(&[("d1", 0), ("d4", 1), ("d3", 2), ("d2", 3), ("d5", 4)])
    );
}

#[test]
fn length_mismatch_without_filter_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    let service = SortOrderService::new(repo);

    let err = service
        .update_sort_order(&update_request(&["d2", "d1"], false))
        .unwrap_err();

    assert!(matches!(
        err,
        SortOrderServiceError::Reconcile(ReconcileError::OrderLengthMismatch {
            expected: 5,
            actual: 2
        })
    ));
    assert_eq!(
        stored_order(&repo),
        pairs(&[("d1", 0), ("d2", 1), ("d3", 2), ("d4", 3), ("d5", 4)])
    );
}

#[test]
fn unknown_document_in_filtered_subset_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    let service = SortOrderService::new(repo);

    let err = service
        .update_sort_order(&update_request(&["d3", "ghost"], true))
        .unwrap_err();

    assert!(matches!(
        err,
        SortOrderServiceError::Reconcile(ReconcileError::InvalidSubset(_))
    ));
    assert_eq!(stored_order(&repo)[0], ("d1".to_string(), Some(0)));
}

#[test]
fn unknown_document_in_full_order_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    let failing = FailingWrites {
        inner: repo,
        fail_on: "none",
        attempted: Cell::new(0),
    };
    let service = SortOrderService::new(&failing);

    // Same count as stored, but `dx` replaces `d1`.
    let err = service
        .update_sort_order(&update_request(&["d5", "d4", "d3", "d2", "dx"], false))
        .unwrap_err();

    assert!(matches!(
        err,
        SortOrderServiceError::Reconcile(ReconcileError::OrderMembershipMismatch(_))
    ));
    assert_eq!(failing.attempted.get(), 0);
    assert_eq!(
        stored_order(&repo),
        pairs(&[("d1", 0), ("d2", 1), ("d3", 2), ("d4", 3), ("d5", 4)])
    );
}

#[test]
fn repeating_an_update_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    let service = SortOrderService::new(repo);
    let request = update_request(&["d3", "d1", "d2", "d5", "d4"], false);

    service.update_sort_order(&request).unwrap();
    let second = service.update_sort_order(&request).unwrap();

    assert_eq!(
        second,
        SortOrderOutcome {
            written: 0,
            unchanged: 5
        }
    );
}

#[test]
fn gaps_left_by_deletion_are_healed_on_next_update() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    repo.delete_entry(PRODUCT, None, "d2").unwrap();
    let service = SortOrderService::new(repo);

    let outcome = service
        .update_sort_order(&update_request(&["d1", "d3", "d4", "d5"], false))
        .unwrap();

    assert_eq!(outcome.written, 3);
    assert_eq!(
        stored_order(&repo),
        pairs(&[("d1", 0), ("d3", 1), ("d4", 2), ("d5", 3)])
    );
}

#[test]
fn fetch_entries_returns_main_field_in_sort_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed(&repo, "a", json!({ "title": "Third", "sortOrder": 2, "kind": "x" }));
    seed(&repo, "b", json!({ "title": "First", "sortOrder": 0, "kind": "y" }));
    seed(&repo, "c", json!({ "sortOrder": 1, "kind": "x" }));
    let service = SortOrderService::new(repo);

    let mut request = FetchEntriesRequest {
        content_type: PRODUCT.to_string(),
        sort_order_field: FIELD.to_string(),
        main_field: "title".to_string(),
        filters: Vec::new(),
        locale: None,
    };
    let listed = service.fetch_entries(&request).unwrap();
    let summary: Vec<(&str, &Value)> = listed
        .iter()
        .map(|entry| (entry.document_id.as_str(), &entry.main_value))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("b", &json!("First")),
            ("c", &Value::Null),
            ("a", &json!("Third"))
        ]
    );

    request.filters = vec![EntryFilter::eq("kind", "x").into()];
    let filtered: Vec<String> = service
        .fetch_entries(&request)
        .unwrap()
        .into_iter()
        .map(|entry| entry.document_id)
        .collect();
    assert_eq!(filtered, vec!["c", "a"]);
}

#[test]
fn fetch_last_entry_ignores_unsorted_entries_and_other_locales() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed(&repo, "d1", json!({ "sortOrder": 3 }));
    seed(&repo, "d2", json!({ "sortOrder": null }));
    repo.create_entry(
        &NewEntry::new(PRODUCT, json!({ "sortOrder": 40 }).as_object().unwrap().clone())
            .with_document_id("d3")
            .with_locale("fr"),
    )
    .unwrap();
    let service = SortOrderService::new(repo);

    let last = service.fetch_last_entry(PRODUCT, FIELD, None).unwrap().unwrap();
    assert_eq!(last.document_id, "d1");
    assert!(service
        .fetch_last_entry("api::empty.empty", FIELD, None)
        .unwrap()
        .is_none());
}

/// Delegates to SQLite but fails the update of one document.
struct FailingWrites<'conn> {
    inner: SqliteEntryRepository<'conn>,
    fail_on: &'static str,
    attempted: Cell<usize>,
}

impl EntryRepository for FailingWrites<'_> {
    fn find_many(&self, query: &EntryQuery) -> EntryRepoResult<Vec<Entry>> {
        self.inner.find_many(query)
    }

    fn find_first(&self, query: &EntryQuery) -> EntryRepoResult<Option<Entry>> {
        self.inner.find_first(query)
    }

    fn get_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<Option<Entry>> {
        self.inner.get_entry(content_type, locale, document_id)
    }

    fn update_fields(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
        patch: &EntryData,
    ) -> EntryRepoResult<Entry> {
        self.attempted.set(self.attempted.get() + 1);
        if document_id == self.fail_on {
            return Err(EntryRepoError::Db(DbError::Sqlite(
                rusqlite::Error::InvalidQuery,
            )));
        }
        self.inner
            .update_fields(content_type, locale, document_id, patch)
    }

    fn create_entry(&self, entry: &NewEntry) -> EntryRepoResult<Entry> {
        self.inner.create_entry(entry)
    }

    fn delete_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<()> {
        self.inner.delete_entry(content_type, locale, document_id)
    }
}

#[test]
fn first_failing_write_aborts_and_keeps_earlier_writes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    seed_five(&repo);
    let failing = FailingWrites {
        inner: repo,
        fail_on: "d4",
        attempted: Cell::new(0),
    };
    let service = SortOrderService::new(&failing);

    // Writes are emitted in position order: d5, d4, d2, d1.
    let err = service
        .update_sort_order(&update_request(&["d5", "d4", "d3", "d2", "d1"], false))
        .unwrap_err();

    assert!(matches!(err, SortOrderServiceError::Repo(EntryRepoError::Db(_))));
    assert_eq!(failing.attempted.get(), 2);
    let stored = stored_order(&repo);
    assert!(stored.contains(&("d5".to_string(), Some(0))));
    assert!(stored.contains(&("d4".to_string(), Some(3))));
    assert!(stored.contains(&("d1".to_string(), Some(0))));
}
