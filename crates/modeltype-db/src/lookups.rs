//! Query lookups and Q objects for building complex filters.
//!
//! A filter key follows the compound-key grammar `field[__relation...][__operator]`.
//! [`parse_lookup_key`] splits such a key into a relation path and a
//! [`LookupType`]; [`Lookup::from_parts`] validates the value's shape for the
//! operator. [`Q`] combines lookups with `&` (AND), `|` (OR), and `!` (NOT).
//!
//! # Examples
//!
//! ```
//! use modeltype_db::lookups::{Lookup, Q};
//! use serde_json::json;
//!
//! // Simple filter: name = "Alice"
//! let q = Q::filter("name", Lookup::Exact(json!("Alice")));
//!
//! // Combining with AND: name = "Alice" AND age > 25
//! let combined = q & Q::filter("age", Lookup::Gt(json!(25)));
//!
//! // Parsing a compound key
//! let nested = Q::lookup("parent__number__in", json!([1, 2])).unwrap();
//! assert_eq!(
//!     nested,
//!     Q::filter("parent__number", Lookup::In(vec![json!(1), json!(2)]))
//! );
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use modeltype_core::{ModelTypeError, ModelTypeResult, ValidationError};
use serde_json::Value;

use crate::queryable::Record;

/// The separator between segments of a compound lookup key.
pub const LOOKUP_SEP: &str = "__";

/// The operator vocabulary understood by the predicate compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupType {
    Exact,
    IExact,
    Contains,
    IContains,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Range,
    IsNull,
    Regex,
    IRegex,
    Date,
    Year,
    Month,
    Day,
    WeekDay,
    Hour,
    Minute,
    Second,
}

impl LookupType {
    /// Every operator, in a stable order.
    pub const ALL: [Self; 25] = [
        Self::Exact,
        Self::IExact,
        Self::Contains,
        Self::IContains,
        Self::In,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::StartsWith,
        Self::IStartsWith,
        Self::EndsWith,
        Self::IEndsWith,
        Self::Range,
        Self::IsNull,
        Self::Regex,
        Self::IRegex,
        Self::Date,
        Self::Year,
        Self::Month,
        Self::Day,
        Self::WeekDay,
        Self::Hour,
        Self::Minute,
        Self::Second,
    ];

    /// Returns the operator's key suffix, e.g. `"startswith"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::IExact => "iexact",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::In => "in",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::StartsWith => "startswith",
            Self::IStartsWith => "istartswith",
            Self::EndsWith => "endswith",
            Self::IEndsWith => "iendswith",
            Self::Range => "range",
            Self::IsNull => "isnull",
            Self::Regex => "regex",
            Self::IRegex => "iregex",
            Self::Date => "date",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::WeekDay => "week_day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    /// Parses an operator suffix.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    /// Returns the temporal part extracted by this operator, if it is a transform.
    pub const fn date_part(self) -> Option<DatePart> {
        match self {
            Self::Date => Some(DatePart::Date),
            Self::Year => Some(DatePart::Year),
            Self::Month => Some(DatePart::Month),
            Self::Day => Some(DatePart::Day),
            Self::WeekDay => Some(DatePart::WeekDay),
            Self::Hour => Some(DatePart::Hour),
            Self::Minute => Some(DatePart::Minute),
            Self::Second => Some(DatePart::Second),
            _ => None,
        }
    }

    /// Returns `true` for operators that only apply to text.
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            Self::IExact
                | Self::Contains
                | Self::IContains
                | Self::StartsWith
                | Self::IStartsWith
                | Self::EndsWith
                | Self::IEndsWith
                | Self::Regex
                | Self::IRegex
        )
    }
}

impl fmt::Display for LookupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component extracted from a date, datetime, or time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Year,
    Month,
    Day,
    /// 1 (Sunday) through 7 (Saturday).
    WeekDay,
    Hour,
    Minute,
    Second,
}

/// A regular expression operand, compiled once when the lookup is built.
///
/// Two patterns are equal when their source text and case sensitivity match.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
    regex: regex::Regex,
}

impl Pattern {
    /// Compiles `source`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when `source` is not a valid expression.
    pub fn new(source: impl Into<String>, case_insensitive: bool) -> Result<Self, ValidationError> {
        let source = source.into();
        let regex = regex::RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| {
                ValidationError::new(format!("Invalid regular expression: {e}"), "invalid")
            })?;
        Ok(Self {
            source,
            case_insensitive,
            regex,
        })
    }

    /// Returns the pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn is_match(&self, value: &Value) -> bool {
        text(value).is_some_and(|s| self.regex.is_match(s))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

/// A field-level lookup operation carrying its validated operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Exact match (`field = value`).
    Exact(Value),
    /// Case-insensitive exact match.
    IExact(String),
    /// Substring match.
    Contains(String),
    /// Case-insensitive substring match.
    IContains(String),
    /// Membership test.
    In(Vec<Value>),
    /// Greater than.
    Gt(Value),
    /// Greater than or equal.
    Gte(Value),
    /// Less than.
    Lt(Value),
    /// Less than or equal.
    Lte(Value),
    /// Starts with.
    StartsWith(String),
    /// Case-insensitive starts with.
    IStartsWith(String),
    /// Ends with.
    EndsWith(String),
    /// Case-insensitive ends with.
    IEndsWith(String),
    /// Inclusive range test.
    Range(Value, Value),
    /// NULL test.
    IsNull(bool),
    /// Regular expression match.
    Regex(Pattern),
    /// Case-insensitive regular expression match.
    IRegex(Pattern),
    /// Exact match on a part of a temporal value.
    Part(DatePart, Value),
}

impl Lookup {
    /// Builds a lookup from an operator and a JSON operand, validating the
    /// operand's shape.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the operand does not fit the operator.
    pub fn from_parts(op: LookupType, value: Value) -> Result<Self, ValidationError> {
        let lookup = match op {
            LookupType::Exact => Self::Exact(value),
            LookupType::IExact => Self::IExact(expect_string(op, value)?),
            LookupType::Contains => Self::Contains(expect_string(op, value)?),
            LookupType::IContains => Self::IContains(expect_string(op, value)?),
            LookupType::StartsWith => Self::StartsWith(expect_string(op, value)?),
            LookupType::IStartsWith => Self::IStartsWith(expect_string(op, value)?),
            LookupType::EndsWith => Self::EndsWith(expect_string(op, value)?),
            LookupType::IEndsWith => Self::IEndsWith(expect_string(op, value)?),
            LookupType::In => match value {
                Value::Array(items) => Self::In(items),
                _ => return Err(shape_error(op, "an array")),
            },
            LookupType::Gt => Self::Gt(expect_non_null(op, value)?),
            LookupType::Gte => Self::Gte(expect_non_null(op, value)?),
            LookupType::Lt => Self::Lt(expect_non_null(op, value)?),
            LookupType::Lte => Self::Lte(expect_non_null(op, value)?),
            LookupType::Range => match value {
                Value::Array(mut items) if items.len() == 2 => {
                    let high = items.pop().unwrap_or(Value::Null);
                    let low = items.pop().unwrap_or(Value::Null);
                    Self::Range(low, high)
                }
                _ => return Err(shape_error(op, "a two-element array")),
            },
            LookupType::IsNull => match value {
                Value::Bool(b) => Self::IsNull(b),
                _ => return Err(shape_error(op, "a boolean")),
            },
            LookupType::Regex => Self::Regex(Pattern::new(expect_string(op, value)?, false)?),
            LookupType::IRegex => Self::IRegex(Pattern::new(expect_string(op, value)?, true)?),
            LookupType::Date
            | LookupType::Year
            | LookupType::Month
            | LookupType::Day
            | LookupType::WeekDay
            | LookupType::Hour
            | LookupType::Minute
            | LookupType::Second => match op.date_part() {
                Some(part) if !value.is_null() => Self::Part(part, value),
                _ => return Err(shape_error(op, "a value")),
            },
        };
        Ok(lookup)
    }

    /// Returns the operator of this lookup.
    pub const fn lookup_type(&self) -> LookupType {
        match self {
            Self::Exact(_) => LookupType::Exact,
            Self::IExact(_) => LookupType::IExact,
            Self::Contains(_) => LookupType::Contains,
            Self::IContains(_) => LookupType::IContains,
            Self::In(_) => LookupType::In,
            Self::Gt(_) => LookupType::Gt,
            Self::Gte(_) => LookupType::Gte,
            Self::Lt(_) => LookupType::Lt,
            Self::Lte(_) => LookupType::Lte,
            Self::StartsWith(_) => LookupType::StartsWith,
            Self::IStartsWith(_) => LookupType::IStartsWith,
            Self::EndsWith(_) => LookupType::EndsWith,
            Self::IEndsWith(_) => LookupType::IEndsWith,
            Self::Range(..) => LookupType::Range,
            Self::IsNull(_) => LookupType::IsNull,
            Self::Regex(_) => LookupType::Regex,
            Self::IRegex(_) => LookupType::IRegex,
            Self::Part(part, _) => match part {
                DatePart::Date => LookupType::Date,
                DatePart::Year => LookupType::Year,
                DatePart::Month => LookupType::Month,
                DatePart::Day => LookupType::Day,
                DatePart::WeekDay => LookupType::WeekDay,
                DatePart::Hour => LookupType::Hour,
                DatePart::Minute => LookupType::Minute,
                DatePart::Second => LookupType::Second,
            },
        }
    }

    /// Tests a single stored value. A missing value is treated as NULL.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        if let Self::IsNull(expected) = self {
            return value.is_null() == *expected;
        }
        if let Self::Exact(Value::Null) = self {
            return value.is_null();
        }
        if value.is_null() {
            return false;
        }
        match self {
            Self::Exact(expected) => values_equal(value, expected),
            Self::In(items) => items.iter().any(|item| values_equal(value, item)),
            Self::Gt(bound) => compare_values(value, bound) == Some(Ordering::Greater),
            Self::Gte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(bound) => compare_values(value, bound) == Some(Ordering::Less),
            Self::Lte(bound) => matches!(
                compare_values(value, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Range(low, high) => {
                matches!(
                    compare_values(value, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(value, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Self::IExact(s) => text(value).is_some_and(|v| v.to_lowercase() == s.to_lowercase()),
            Self::Contains(s) => text(value).is_some_and(|v| v.contains(s.as_str())),
            Self::IContains(s) => {
                text(value).is_some_and(|v| v.to_lowercase().contains(&s.to_lowercase()))
            }
            Self::StartsWith(s) => text(value).is_some_and(|v| v.starts_with(s.as_str())),
            Self::IStartsWith(s) => {
                text(value).is_some_and(|v| v.to_lowercase().starts_with(&s.to_lowercase()))
            }
            Self::EndsWith(s) => text(value).is_some_and(|v| v.ends_with(s.as_str())),
            Self::IEndsWith(s) => {
                text(value).is_some_and(|v| v.to_lowercase().ends_with(&s.to_lowercase()))
            }
            Self::Regex(pattern) | Self::IRegex(pattern) => pattern.is_match(value),
            Self::Part(part, expected) => {
                extract_part(value, *part).is_some_and(|v| values_equal(&v, expected))
            }
            Self::IsNull(_) => false,
        }
    }
}

fn shape_error(op: LookupType, expected: &str) -> ValidationError {
    ValidationError::new(
        format!("The '{op}' lookup expects {expected}."),
        "invalid",
    )
    .with_param("lookup", op.as_str())
}

fn expect_string(op: LookupType, value: Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(shape_error(op, "a string")),
    }
}

fn expect_non_null(op: LookupType, value: Value) -> Result<Value, ValidationError> {
    if value.is_null() {
        Err(shape_error(op, "a non-null value"))
    } else {
        Ok(value)
    }
}

fn text(value: &Value) -> Option<&str> {
    value.as_str()
}


/// Compares two JSON values for equality, treating numbers by value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Compares two JSON scalars of the same type. Returns `None` for mixed types.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

enum Temporal {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

fn parse_temporal(s: &str) -> Option<Temporal> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Temporal::DateTime(dt.naive_local()));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Temporal::DateTime(dt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Temporal::Date(d));
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .ok()
        .map(Temporal::Time)
}

fn extract_part(value: &Value, part: DatePart) -> Option<Value> {
    let temporal = parse_temporal(value.as_str()?)?;
    let (date, time) = match temporal {
        Temporal::DateTime(dt) => (Some(dt.date()), Some(dt.time())),
        Temporal::Date(d) => (Some(d), None),
        Temporal::Time(t) => (None, Some(t)),
    };
    let number = match part {
        DatePart::Date => return date.map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        DatePart::Year => i64::from(date?.year()),
        DatePart::Month => i64::from(date?.month()),
        DatePart::Day => i64::from(date?.day()),
        DatePart::WeekDay => i64::from(date?.weekday().number_from_sunday()),
        DatePart::Hour => i64::from(time?.hour()),
        DatePart::Minute => i64::from(time?.minute()),
        DatePart::Second => i64::from(time?.second()),
    };
    Some(Value::from(number))
}

/// Splits a compound key into its field path and operator.
///
/// A trailing segment naming a known operator becomes the operator; otherwise
/// the operator is `exact` and every segment is part of the path.
///
/// ```
/// use modeltype_db::lookups::{parse_lookup_key, LookupType};
///
/// assert_eq!(
///     parse_lookup_key("parent__id__in"),
///     (vec!["parent".to_string(), "id".to_string()], LookupType::In)
/// );
/// assert_eq!(parse_lookup_key("name"), (vec!["name".to_string()], LookupType::Exact));
/// ```
pub fn parse_lookup_key(key: &str) -> (Vec<String>, LookupType) {
    let mut segments: Vec<String> = key.split(LOOKUP_SEP).map(str::to_string).collect();
    if segments.len() > 1 {
        if let Some(op) = segments.last().and_then(|s| LookupType::parse(s)) {
            segments.pop();
            return (segments, op);
        }
    }
    (segments, LookupType::Exact)
}

/// A composable query filter.
///
/// `Q` objects can be combined using `&` (AND), `|` (OR), and `!` (NOT).
/// An empty `And` matches every row and is the identity for both `&` and
/// `|`; negating it leaves it unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Q {
    /// A single field lookup.
    Filter {
        /// The field path, `__`-separated for relation chains.
        field: String,
        /// The lookup operation.
        lookup: Lookup,
    },
    /// Logical AND of multiple conditions.
    And(Vec<Q>),
    /// Logical OR of multiple conditions.
    Or(Vec<Q>),
    /// Logical negation of a condition.
    Not(Box<Q>),
}

impl Q {
    /// Creates a new filter Q object.
    pub fn filter(field: impl Into<String>, lookup: Lookup) -> Self {
        Self::Filter {
            field: field.into(),
            lookup,
        }
    }

    /// Returns the Q object matching every row.
    pub const fn all() -> Self {
        Self::And(Vec::new())
    }

    /// Parses a compound key and value into a filter.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` keyed by `key` when the value does not fit
    /// the operator.
    pub fn lookup(key: &str, value: Value) -> ModelTypeResult<Self> {
        let (path, op) = parse_lookup_key(key);
        if path.iter().any(String::is_empty) {
            return Err(ModelTypeError::ValidationError(ValidationError::for_field(
                key,
                "Malformed lookup key.",
                "invalid",
            )));
        }
        let lookup = Lookup::from_parts(op, value).map_err(|e| {
            ModelTypeError::ValidationError(ValidationError::for_field(key, e.message, e.code))
        })?;
        Ok(Self::filter(path.join(LOOKUP_SEP), lookup))
    }

    /// Builds the conjunction of every `key: value` pair in `mapping`.
    pub fn from_mapping(mapping: &Record) -> ModelTypeResult<Self> {
        mapping
            .iter()
            .map(|(key, value)| Self::lookup(key, value.clone()))
            .try_fold(Self::all(), |acc, q| Ok(acc & q?))
    }

    /// Returns `true` if this is an empty AND or OR.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            _ => false,
        }
    }

    /// Returns every field path referenced by this predicate.
    pub fn field_paths(&self) -> Vec<&str> {
        match self {
            Self::Filter { field, .. } => vec![field.as_str()],
            Self::And(children) | Self::Or(children) => {
                children.iter().flat_map(Self::field_paths).collect()
            }
            Self::Not(inner) => inner.field_paths(),
        }
    }

    /// Evaluates this predicate, resolving each field path with `resolve`.
    ///
    /// `resolve` returns every value reachable through the path; a filter
    /// matches if any of them matches (multi-valued reverse relations).
    pub fn evaluate<F>(&self, resolve: &F) -> bool
    where
        F: Fn(&str) -> Vec<Value>,
    {
        match self {
            Self::Filter { field, lookup } => {
                let values = resolve(field);
                if values.is_empty() {
                    lookup.matches(None)
                } else {
                    values.iter().any(|v| lookup.matches(Some(v)))
                }
            }
            Self::And(children) => children.iter().all(|c| c.evaluate(resolve)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(resolve)),
            Self::Not(inner) => !inner.evaluate(resolve),
        }
    }
}

impl ops::BitAnd for Q {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        if matches!(&self, Self::And(c) if c.is_empty()) {
            return rhs;
        }
        if matches!(&rhs, Self::And(c) if c.is_empty()) {
            return self;
        }
        match (self, rhs) {
            // Flatten nested ANDs
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (other, Self::And(mut right)) => {
                right.insert(0, other);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl ops::BitOr for Q {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        if self.is_empty() {
            return rhs;
        }
        if rhs.is_empty() {
            return self;
        }
        match (self, rhs) {
            // Flatten nested ORs
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (other, Self::Or(mut right)) => {
                right.insert(0, other);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

impl ops::Not for Q {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            // Double negation cancellation
            Self::Not(inner) => *inner,
            Self::And(children) if children.is_empty() => Self::And(children),
            other => Self::Not(Box::new(other)),
        }
    }
}
