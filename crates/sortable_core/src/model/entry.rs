//! Entry domain model.
//!
//! # Responsibility
//! - Define the record shape shared by every sortable content type.
//! - Validate identifiers and attribute names before they reach storage.
//!
//! # Invariants
//! - `document_id` is unique within one `(content_type, locale)` scope.
//! - `data` is always a JSON object; attribute names are plain identifiers.
//! - `locale = None` means the content type is not localized.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name regex"));

/// Stable identifier of one document inside a content type.
pub type DocumentId = String;

/// Attribute bag stored for each entry.
pub type EntryData = Map<String, Value>;

/// Validation errors for entry input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValidationError {
    /// Content type uid is blank after trim.
    BlankContentType,
    /// Document id is blank after trim.
    BlankDocumentId,
    /// Attribute name is not a plain identifier.
    InvalidFieldName(String),
    /// Sort-order attribute holds something other than an integer or null.
    InvalidSortIndex { field: String, value: String },
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankContentType => write!(f, "content type uid must not be blank"),
            Self::BlankDocumentId => write!(f, "document id must not be blank"),
            Self::InvalidFieldName(name) => write!(f, "invalid field name `{name}`"),
            Self::InvalidSortIndex { field, value } => {
                write!(f, "field `{field}` must hold an integer or null, got {value}")
            }
        }
    }
}

impl Error for EntryValidationError {}

/// Persisted entry read model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub document_id: DocumentId,
    /// Content type uid, e.g. `api::product.product`.
    pub content_type: String,
    pub locale: Option<String>,
    pub data: EntryData,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Entry {
    /// Returns one attribute value, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Returns the integer stored under `field`, if any.
    pub fn sort_index(&self, field: &str) -> Option<i64> {
        self.data.get(field).and_then(Value::as_i64)
    }
}

/// Input model for creating an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub content_type: String,
    pub locale: Option<String>,
    /// Caller-provided id; generated on create when `None`.
    pub document_id: Option<DocumentId>,
    pub data: EntryData,
}

impl NewEntry {
    /// Creates input for an unlocalized entry with a generated id.
    pub fn new(content_type: impl Into<String>, data: EntryData) -> Self {
        Self {
            content_type: content_type.into(),
            locale: None,
            document_id: None,
            data,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = normalize_locale(Some(locale.into().as_str()));
        self
    }

    pub fn with_document_id(mut self, document_id: impl Into<DocumentId>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Validates uid, optional id, and attribute names.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        validate_content_type(&self.content_type)?;
        if let Some(document_id) = &self.document_id {
            if document_id.trim().is_empty() {
                return Err(EntryValidationError::BlankDocumentId);
            }
        }
        for name in self.data.keys() {
            validate_field_name(name)?;
        }
        Ok(())
    }
}

/// Rejects blank content type uids.
pub fn validate_content_type(content_type: &str) -> Result<(), EntryValidationError> {
    if content_type.trim().is_empty() {
        return Err(EntryValidationError::BlankContentType);
    }
    Ok(())
}

/// Accepts only plain identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Field names are spliced into JSON paths, so anything else is refused.
pub fn validate_field_name(name: &str) -> Result<(), EntryValidationError> {
    if FIELD_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(EntryValidationError::InvalidFieldName(name.to_string()))
    }
}

/// Trims a locale; blank values mean "not localized".
pub fn normalize_locale(locale: Option<&str>) -> Option<String> {
    locale
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
