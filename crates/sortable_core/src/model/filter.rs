//! Attribute filters for entry queries.
//!
//! # Responsibility
//! - Parse admin-style filter objects into typed predicates.
//!
//! # Invariants
//! - Every parsed filter names a valid attribute.
//! - Operands are scalars; arrays and nested objects are rejected.
//! - Sibling filters combine with AND; `$or` groups are the only disjunction.

use crate::model::entry::{validate_field_name, EntryValidationError};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Comparison applied to one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Case-sensitive substring match.
    Contains,
    /// Case-insensitive substring match.
    ContainsInsensitive,
    /// `true` matches missing/null attributes, `false` matches present ones.
    Null,
    /// `true` matches present attributes, `false` matches missing/null ones.
    NotNull,
}

impl FilterOp {
    fn parse(operator: &str) -> Option<Self> {
        match operator {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$contains" => Some(Self::Contains),
            "$containsi" => Some(Self::ContainsInsensitive),
            "$null" => Some(Self::Null),
            "$notNull" => Some(Self::NotNull),
            _ => None,
        }
    }

    fn accepts(self, operand: &Value) -> bool {
        match self {
            Self::Eq | Self::Ne => !operand.is_array() && !operand.is_object(),
            Self::Lt | Self::Lte | Self::Gt | Self::Gte => {
                operand.is_number() || operand.is_string()
            }
            Self::Contains | Self::ContainsInsensitive => operand.is_string(),
            Self::Null | Self::NotNull => operand.is_boolean(),
        }
    }
}

/// One predicate over an entry attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl EntryFilter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Shorthand for an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value.into())
    }
}

/// Filter tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Condition(EntryFilter),
    /// `$and`: every child matches. Empty matches everything.
    All(Vec<FilterExpr>),
    /// `$or`: at least one child matches. Empty matches nothing.
    Any(Vec<FilterExpr>),
}

impl From<EntryFilter> for FilterExpr {
    fn from(value: EntryFilter) -> Self {
        Self::Condition(value)
    }
}

/// Errors from filter parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Filter root is not a JSON object.
    NotAnObject,
    /// Attribute name is invalid.
    InvalidField(EntryValidationError),
    /// Operator is not supported.
    UnknownOperator { field: String, operator: String },
    /// Operand type does not fit the operator.
    InvalidOperand { field: String, operator: String },
    /// Top-level `$` key is not `$and`/`$or`, or its operand is not an
    /// array of objects.
    InvalidGroup(String),
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "filters must be a JSON object"),
            Self::InvalidField(err) => write!(f, "invalid filter: {err}"),
            Self::UnknownOperator { field, operator } => {
                write!(f, "unsupported filter operator `{operator}` on `{field}`")
            }
            Self::InvalidOperand { field, operator } => {
                write!(f, "invalid operand for `{operator}` on `{field}`")
            }
            Self::InvalidGroup(operator) => write!(
                f,
                "unsupported filter group `{operator}`; expected `$and` or `$or` with an array of objects"
            ),
        }
    }
}

impl Error for FilterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidField(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntryValidationError> for FilterError {
    fn from(value: EntryValidationError) -> Self {
        Self::InvalidField(value)
    }
}

/// Parses admin filter objects.
///
/// Accepted shapes, combinable inside one object:
/// - `{ field: value }` (equality)
/// - `{ field: { "$op": value, ... } }`
/// - `{ "$and": [ {...}, ... ] }` and `{ "$or": [ {...}, ... ] }`, nested
///   to any depth
///
/// `null` parses to no filters. Keys of one object combine with AND.
pub fn parse_filters(value: &Value) -> Result<Vec<FilterExpr>, FilterError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(object) => parse_object(object),
        _ => Err(FilterError::NotAnObject),
    }
}

fn parse_object(object: &Map<String, Value>) -> Result<Vec<FilterExpr>, FilterError> {
    let mut filters = Vec::new();
    for (key, condition) in object {
        if key.starts_with('$') {
            filters.push(parse_group(key, condition)?);
            continue;
        }
        parse_field(key, condition, &mut filters)?;
    }
    Ok(filters)
}

fn parse_group(operator: &str, operand: &Value) -> Result<FilterExpr, FilterError> {
    let invalid = || FilterError::InvalidGroup(operator.to_string());
    let Value::Array(items) = operand else {
        return Err(invalid());
    };

    let mut branches = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(object) = item else {
            return Err(invalid());
        };
        branches.push(parse_object(object)?);
    }

    match operator {
        "$and" => Ok(FilterExpr::All(branches.into_iter().flatten().collect())),
        "$or" => Ok(FilterExpr::Any(
            branches
                .into_iter()
                .map(|mut branch| {
                    if branch.len() == 1 {
                        branch.remove(0)
                    } else {
                        FilterExpr::All(branch)
                    }
                })
                .collect(),
        )),
        _ => Err(invalid()),
    }
}

fn parse_field(
    field: &str,
    condition: &Value,
    filters: &mut Vec<FilterExpr>,
) -> Result<(), FilterError> {
    validate_field_name(field)?;
    match condition {
        Value::Object(operators) if is_operator_object(operators) => {
            for (operator, operand) in operators {
                let op = FilterOp::parse(operator).ok_or_else(|| FilterError::UnknownOperator {
                    field: field.to_string(),
                    operator: operator.clone(),
                })?;
                if !op.accepts(operand) {
                    return Err(FilterError::InvalidOperand {
                        field: field.to_string(),
                        operator: operator.clone(),
                    });
                }
                filters.push(EntryFilter::new(field, op, operand.clone()).into());
            }
            Ok(())
        }
        scalar if FilterOp::Eq.accepts(scalar) => {
            filters.push(EntryFilter::eq(field, scalar.clone()).into());
            Ok(())
        }
        _ => Err(FilterError::InvalidOperand {
            field: field.to_string(),
            operator: "$eq".to_string(),
        }),
    }
}

fn is_operator_object(object: &Map<String, Value>) -> bool {
    !object.is_empty() && object.keys().all(|key| key.starts_with('$'))
}
