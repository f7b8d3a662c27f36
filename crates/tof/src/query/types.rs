//! Logical query types.
//!
//! A [`QuerySpec`] is what a query set hands to a backend: ANDed filter
//! trees, annotations, ordering terms and a slice. Filters address columns
//! with Django-style keys (`field__lookup`).

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, TofError};

/// Separator between a field name and its lookup.
pub const LOOKUP_SEP: &str = "__";

/// Comparison applied by a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    #[default]
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

impl Lookup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::IExact => "iexact",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "startswith",
            Self::IStartsWith => "istartswith",
            Self::EndsWith => "endswith",
            Self::IEndsWith => "iendswith",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::IsNull => "isnull",
        }
    }

    /// Case-insensitive variants compare lowercased operands.
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Self::IExact | Self::IContains | Self::IStartsWith | Self::IEndsWith
        )
    }
}

impl FromStr for Lookup {
    type Err = TofError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "exact" => Self::Exact,
            "iexact" => Self::IExact,
            "contains" => Self::Contains,
            "icontains" => Self::IContains,
            "startswith" => Self::StartsWith,
            "istartswith" => Self::IStartsWith,
            "endswith" => Self::EndsWith,
            "iendswith" => Self::IEndsWith,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "in" => Self::In,
            "isnull" => Self::IsNull,
            other => return Err(TofError::UnsupportedLookup(other.to_string())),
        })
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `field__lookup` into its parts. A bare field means `exact`.
pub fn split_key(key: &str) -> Result<(&str, Lookup)> {
    match key.split_once(LOOKUP_SEP) {
        Some((field, lookup)) => Ok((field, lookup.parse()?)),
        None => Ok((key, Lookup::Exact)),
    }
}

/// Field name a filter key refers to.
pub fn key_field(key: &str) -> &str {
    key.split_once(LOOKUP_SEP).map_or(key, |(field, _)| field)
}

/// Right-hand side of a filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterValue>),
    /// Ids of owning records selected from the translation table.
    Subquery(Box<Subquery>),
}

impl FilterValue {
    /// JSON form for in-process comparison. Subqueries have none.
    pub fn to_json(&self) -> Option<Value> {
        Some(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json())
                    .collect::<Option<Vec<_>>>()?,
            ),
            Self::Subquery(_) => return None,
        })
    }

    pub fn as_subquery(&self) -> Option<&Subquery> {
        match self {
            Self::Subquery(sub) => Some(sub),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Subquery> for FilterValue {
    fn from(value: Subquery) -> Self {
        Self::Subquery(Box::new(value))
    }
}

/// `SELECT object_id FROM tof_translation WHERE field_id = .. AND filter`.
///
/// `filter` addresses the translation row through the keys `value` and
/// `lang`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub field_id: String,
    pub filter: Filter,
}

/// One `key = value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub value: FilterValue,
}

impl Condition {
    pub fn new(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        key_field(&self.key)
    }
}

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Leaf(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn leaf(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Leaf(Condition::new(key, value))
    }

    /// AND of keyword pairs, in the given order.
    pub fn pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::And(pairs.into_iter().map(|(k, v)| Self::leaf(k, v)).collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Every leaf condition, depth first.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Self::Leaf(c) => out.push(c),
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_conditions(out);
                }
            }
            Self::Not(inner) => inner.collect_conditions(out),
        }
    }
}

/// One `order_by` term. A leading `-` means descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: String,
    pub descending: bool,
}

impl OrderTerm {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

impl From<&str> for OrderTerm {
    fn from(term: &str) -> Self {
        match term.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(term),
        }
    }
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

/// Computed column added to every selected row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationExpr {
    /// Value of the row's translation of `field_id` in `lang`, or null.
    TranslatedValue { field_id: String, lang: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub expr: AnnotationExpr,
}

/// Logical query handed to a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Filters ANDed together.
    pub filters: Vec<Filter>,
    pub annotations: Vec<Annotation>,
    pub ordering: Vec<OrderTerm>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl QuerySpec {
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }

    /// Add or replace an annotation by name.
    pub fn annotate(&mut self, annotation: Annotation) {
        match self
            .annotations
            .iter_mut()
            .find(|a| a.name == annotation.name)
        {
            Some(existing) => *existing = annotation,
            None => self.annotations.push(annotation),
        }
    }

    /// The spec without slicing, as used for counting.
    pub fn unsliced(&self) -> Self {
        Self {
            limit: None,
            offset: None,
            ..self.clone()
        }
    }
}
