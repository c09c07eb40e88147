//! Entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide find/update/create/delete APIs over the `entries` store.
//! - Keep SQL and JSON-path details inside the repository boundary.
//!
//! # Invariants
//! - Every query is scoped to one `(content_type, locale)` pair.
//! - Sorted listings are deterministic: entries without a value for the sort
//!   field come last, ties are broken by `document_id ASC`.
//! - Attribute names are validated before they are turned into JSON paths,
//!   and paths are always bound as parameters.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::entry::{
    normalize_locale, validate_content_type, validate_field_name, DocumentId, Entry, EntryData,
    EntryValidationError, NewEntry,
};
use crate::model::filter::{EntryFilter, FilterExpr, FilterOp};
use rusqlite::types::Value as SqlValue;
use rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ENTRY_SELECT_SQL: &str = "SELECT
    content_type,
    locale,
    document_id,
    data,
    created_at,
    updated_at
FROM entries";

/// Result type used by entry repository operations.
pub type EntryRepoResult<T> = Result<T, EntryRepoError>;

/// Errors from entry repository operations.
#[derive(Debug)]
pub enum EntryRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Input rejected before reaching SQL.
    Validation(EntryValidationError),
    /// No entry with this id exists in the scope.
    NotFound {
        content_type: String,
        locale: Option<String>,
        document_id: DocumentId,
    },
    /// An entry with this id already exists in the scope.
    AlreadyExists {
        content_type: String,
        locale: Option<String>,
        document_id: DocumentId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for EntryRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound {
                content_type,
                locale,
                document_id,
            } => write!(
                f,
                "entry not found: {content_type}/{document_id} (locale: {})",
                locale.as_deref().unwrap_or("-")
            ),
            Self::AlreadyExists {
                content_type,
                locale,
                document_id,
            } => write!(
                f,
                "entry already exists: {content_type}/{document_id} (locale: {})",
                locale.as_deref().unwrap_or("-")
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entry repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "entry repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "entry repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid entry data: {message}"),
        }
    }
}

impl Error for EntryRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for EntryRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for EntryRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<EntryValidationError> for EntryRepoError {
    fn from(value: EntryValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Sort direction for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Attribute-based ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySort {
    pub field: String,
    pub direction: SortDirection,
}

impl EntrySort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Query options for listing entries of one scope.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    pub content_type: String,
    pub locale: Option<String>,
    /// `None` lists by `document_id ASC`.
    pub sort: Option<EntrySort>,
    /// Combined with AND.
    pub filters: Vec<FilterExpr>,
    pub limit: Option<u32>,
}

impl EntryQuery {
    /// Creates an unfiltered, unsorted query for one scope.
    pub fn new(content_type: impl Into<String>, locale: Option<&str>) -> Self {
        Self {
            content_type: content_type.into(),
            locale: normalize_locale(locale),
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, sort: EntrySort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn filtered_by<F>(mut self, filters: impl IntoIterator<Item = F>) -> Self
    where
        F: Into<FilterExpr>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn limited_to(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Repository interface for the entry store.
pub trait EntryRepository {
    /// Lists entries matching the query.
    fn find_many(&self, query: &EntryQuery) -> EntryRepoResult<Vec<Entry>>;
    /// Returns the first entry matching the query.
    fn find_first(&self, query: &EntryQuery) -> EntryRepoResult<Option<Entry>>;
    /// Loads one entry by id.
    fn get_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<Option<Entry>>;
    /// Merges `patch` into the entry's attributes and returns the result.
    fn update_fields(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
        patch: &EntryData,
    ) -> EntryRepoResult<Entry>;
    /// Persists a new entry; generates an id when none is given.
    fn create_entry(&self, entry: &NewEntry) -> EntryRepoResult<Entry>;
    /// Removes one entry. Other entries are left untouched.
    fn delete_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<()>;
}

impl<R: EntryRepository + ?Sized> EntryRepository for &R {
    fn find_many(&self, query: &EntryQuery) -> EntryRepoResult<Vec<Entry>> {
        (**self).find_many(query)
    }

    fn find_first(&self, query: &EntryQuery) -> EntryRepoResult<Option<Entry>> {
        (**self).find_first(query)
    }

    fn get_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<Option<Entry>> {
        (**self).get_entry(content_type, locale, document_id)
    }

    fn update_fields(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
        patch: &EntryData,
    ) -> EntryRepoResult<Entry> {
        (**self).update_fields(content_type, locale, document_id, patch)
    }

    fn create_entry(&self, entry: &NewEntry) -> EntryRepoResult<Entry> {
        (**self).create_entry(entry)
    }

    fn delete_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<()> {
        (**self).delete_entry(content_type, locale, document_id)
    }
}

/// SQLite-backed entry repository.
#[derive(Clone, Copy)]
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> EntryRepoResult<Self> {
        ensure_entry_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn find_many(&self, query: &EntryQuery) -> EntryRepoResult<Vec<Entry>> {
        validate_content_type(&query.content_type)?;

        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE content_type = ? AND locale = ?");
        let mut bind_values = vec![
            SqlValue::Text(query.content_type.clone()),
            SqlValue::Text(locale_key(query.locale.as_deref()).to_string()),
        ];

        for filter in &query.filters {
            sql.push_str(" AND ");
            push_filter_expr(&mut sql, &mut bind_values, filter)?;
        }

        match &query.sort {
            Some(sort) => {
                validate_field_name(&sort.field)?;
                let direction = match sort.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY json_extract(data, ?) IS NULL ASC, json_extract(data, ?) {direction}, document_id ASC"
                ));
                let path = field_path(&sort.field);
                bind_values.push(SqlValue::Text(path.clone()));
                bind_values.push(SqlValue::Text(path));
            }
            None => sql.push_str(" ORDER BY document_id ASC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(SqlValue::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn find_first(&self, query: &EntryQuery) -> EntryRepoResult<Option<Entry>> {
        let mut first = query.clone();
        first.limit = Some(1);
        Ok(self.find_many(&first)?.into_iter().next())
    }

    fn get_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<Option<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE content_type = ?1
               AND locale = ?2
               AND document_id = ?3;"
        ))?;
        let mut rows = stmt.query(params![content_type, locale_key(locale), document_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }
        Ok(None)
    }

    fn update_fields(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
        patch: &EntryData,
    ) -> EntryRepoResult<Entry> {
        for name in patch.keys() {
            validate_field_name(name)?;
        }
        let patch_text = serde_json::to_string(patch)
            .map_err(|err| EntryRepoError::InvalidData(format!("unserializable patch: {err}")))?;

        let changed = self.conn.execute(
            "UPDATE entries
             SET data = json_patch(data, ?4),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE content_type = ?1
               AND locale = ?2
               AND document_id = ?3;",
            params![content_type, locale_key(locale), document_id, patch_text],
        )?;
        if changed == 0 {
            return Err(not_found(content_type, locale, document_id));
        }

        self.get_entry(content_type, locale, document_id)?
            .ok_or_else(|| not_found(content_type, locale, document_id))
    }

    fn create_entry(&self, entry: &NewEntry) -> EntryRepoResult<Entry> {
        entry.validate()?;

        let document_id = entry
            .document_id
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let locale = normalize_locale(entry.locale.as_deref());
        let data_text = serde_json::to_string(&entry.data)
            .map_err(|err| EntryRepoError::InvalidData(format!("unserializable data: {err}")))?;

        let inserted = self.conn.execute(
            "INSERT INTO entries (
                content_type,
                locale,
                document_id,
                data,
                created_at,
                updated_at
            ) VALUES (
                ?1,
                ?2,
                ?3,
                ?4,
                (strftime('%s', 'now') * 1000),
                (strftime('%s', 'now') * 1000)
            );",
            params![
                entry.content_type.as_str(),
                locale_key(locale.as_deref()),
                document_id.as_str(),
                data_text
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                return Err(EntryRepoError::AlreadyExists {
                    content_type: entry.content_type.clone(),
                    locale,
                    document_id,
                });
            }
            Err(err) => return Err(err.into()),
        }

        self.get_entry(&entry.content_type, locale.as_deref(), &document_id)?
            .ok_or_else(|| not_found(&entry.content_type, locale.as_deref(), &document_id))
    }

    fn delete_entry(
        &self,
        content_type: &str,
        locale: Option<&str>,
        document_id: &str,
    ) -> EntryRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM entries
             WHERE content_type = ?1
               AND locale = ?2
               AND document_id = ?3;",
            params![content_type, locale_key(locale), document_id],
        )?;
        if changed == 0 {
            return Err(not_found(content_type, locale, document_id));
        }
        Ok(())
    }
}

fn push_filter_expr(
    sql: &mut String,
    bind_values: &mut Vec<SqlValue>,
    expr: &FilterExpr,
) -> EntryRepoResult<()> {
    let (children, separator, empty) = match expr {
        FilterExpr::Condition(filter) => return push_condition(sql, bind_values, filter),
        FilterExpr::All(children) => (children, " AND ", "1"),
        FilterExpr::Any(children) => (children, " OR ", "0"),
    };

    if children.is_empty() {
        sql.push_str(empty);
        return Ok(());
    }
    sql.push('(');
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        push_filter_expr(sql, bind_values, child)?;
    }
    sql.push(')');
    Ok(())
}

fn push_condition(
    sql: &mut String,
    bind_values: &mut Vec<SqlValue>,
    filter: &EntryFilter,
) -> EntryRepoResult<()> {
    validate_field_name(&filter.field)?;

    // `true` when the clause carries a second placeholder for the operand.
    let (clause, binds_operand) = match (filter.op, &filter.value) {
        (FilterOp::Eq, Value::Null) => ("json_extract(data, ?) IS NULL", false),
        (FilterOp::Eq, _) => ("json_extract(data, ?) = ?", true),
        (FilterOp::Ne, _) => ("json_extract(data, ?) IS NOT ?", true),
        (FilterOp::Lt, _) => ("json_extract(data, ?) < ?", true),
        (FilterOp::Lte, _) => ("json_extract(data, ?) <= ?", true),
        (FilterOp::Gt, _) => ("json_extract(data, ?) > ?", true),
        (FilterOp::Gte, _) => ("json_extract(data, ?) >= ?", true),
        (FilterOp::Contains, _) => ("instr(json_extract(data, ?), ?) > 0", true),
        (FilterOp::ContainsInsensitive, _) => {
            ("instr(lower(json_extract(data, ?)), lower(?)) > 0", true)
        }
        (FilterOp::Null, Value::Bool(true)) | (FilterOp::NotNull, Value::Bool(false)) => {
            ("json_extract(data, ?) IS NULL", false)
        }
        (FilterOp::Null, _) | (FilterOp::NotNull, _) => ("json_extract(data, ?) IS NOT NULL", false),
    };

    sql.push_str(clause);
    bind_values.push(SqlValue::Text(field_path(&filter.field)));
    if binds_operand {
        bind_values.push(json_to_sql(&filter.value)?);
    }
    Ok(())
}

fn json_to_sql(value: &Value) -> EntryRepoResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Ok(SqlValue::Integer(integer)),
            None => number.as_f64().map(SqlValue::Real).ok_or_else(|| {
                EntryRepoError::InvalidData(format!("unsupported filter number `{number}`"))
            }),
        },
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Array(_) | Value::Object(_) => Err(EntryRepoError::InvalidData(
            "filter operands must be scalars".to_string(),
        )),
    }
}

fn field_path(field: &str) -> String {
    format!("$.{field}")
}

fn locale_key(locale: Option<&str>) -> &str {
    locale.map(str::trim).unwrap_or("")
}

fn not_found(content_type: &str, locale: Option<&str>, document_id: &str) -> EntryRepoError {
    EntryRepoError::NotFound {
        content_type: content_type.to_string(),
        locale: normalize_locale(locale),
        document_id: document_id.to_string(),
    }
}

fn parse_entry_row(row: &Row<'_>) -> EntryRepoResult<Entry> {
    let document_id: String = row.get("document_id")?;
    let data_text: String = row.get("data")?;
    let data = match serde_json::from_str::<Value>(&data_text) {
        Ok(Value::Object(data)) => data,
        Ok(_) | Err(_) => {
            return Err(EntryRepoError::InvalidData(format!(
                "entries.data of `{document_id}` is not a JSON object"
            )));
        }
    };

    let locale: String = row.get("locale")?;
    Ok(Entry {
        document_id,
        content_type: row.get("content_type")?,
        locale: normalize_locale(Some(locale.as_str())),
        data,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_entry_connection_ready(conn: &Connection) -> EntryRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(EntryRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "entries")? {
        return Err(EntryRepoError::MissingRequiredTable("entries"));
    }

    for column in [
        "content_type",
        "locale",
        "document_id",
        "data",
        "created_at",
        "updated_at",
    ] {
        if !table_has_column(conn, "entries", column)? {
            return Err(EntryRepoError::MissingRequiredColumn {
                table: "entries",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> EntryRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> EntryRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
