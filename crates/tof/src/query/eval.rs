//! In-process evaluation of logical queries over JSON rows.

use std::cmp::Ordering;

use serde_json::Value;

use super::types::{Condition, Filter, FilterValue, Lookup, OrderTerm, Subquery, split_key};
use crate::backend::Row;
use crate::error::{Result, TofError};

/// Replace every subquery value with the list of ids it selects.
pub fn resolve_subqueries<F>(filter: &Filter, resolve: &mut F) -> Result<Filter>
where
    F: FnMut(&Subquery) -> Result<Vec<i64>>,
{
    Ok(match filter {
        Filter::Leaf(condition) => {
            let value = match &condition.value {
                FilterValue::Subquery(sub) => FilterValue::from(resolve(sub)?),
                other => other.clone(),
            };
            Filter::Leaf(Condition {
                key: condition.key.clone(),
                value,
            })
        }
        Filter::And(children) => Filter::And(
            children
                .iter()
                .map(|c| resolve_subqueries(c, &mut *resolve))
                .collect::<Result<_>>()?,
        ),
        Filter::Or(children) => Filter::Or(
            children
                .iter()
                .map(|c| resolve_subqueries(c, &mut *resolve))
                .collect::<Result<_>>()?,
        ),
        Filter::Not(inner) => Filter::Not(Box::new(resolve_subqueries(inner, &mut *resolve)?)),
    })
}

/// Matches rows against filters whose subqueries are already resolved.
pub struct Matcher<'a> {
    model: &'a str,
    has_column: &'a dyn Fn(&str) -> bool,
}

impl<'a> Matcher<'a> {
    pub fn new(model: &'a str, has_column: &'a dyn Fn(&str) -> bool) -> Self {
        Self { model, has_column }
    }

    fn check_column(&self, column: &str) -> Result<()> {
        if (self.has_column)(column) {
            Ok(())
        } else {
            Err(TofError::unknown_field(self.model, column))
        }
    }

    pub fn matches(&self, filter: &Filter, row: &Row) -> Result<bool> {
        match filter {
            Filter::Leaf(condition) => {
                let (column, lookup) = split_key(&condition.key)?;
                self.check_column(column)?;
                let expected = condition.value.to_json().ok_or_else(|| {
                    TofError::Internal(anyhow::anyhow!("unresolved subquery on {}", condition.key))
                })?;
                let actual = row.get(column).unwrap_or(&Value::Null);
                Ok(lookup_matches(lookup, actual, &expected))
            }
            Filter::And(children) => {
                for child in children {
                    if !self.matches(child, row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(children) => {
                for child in children {
                    if self.matches(child, row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::Not(inner) => Ok(!self.matches(inner, row)?),
        }
    }

    /// Sort rows by `ordering`. Nulls sort after every value when ascending
    /// and before every value when descending. Ties keep id order.
    pub fn sort(&self, rows: &mut [Row], ordering: &[OrderTerm]) -> Result<()> {
        for term in ordering {
            self.check_column(&term.field)?;
        }
        rows.sort_by(|a, b| {
            for term in ordering {
                let left = a.get(&term.field).unwrap_or(&Value::Null);
                let right = b.get(&term.field).unwrap_or(&Value::Null);
                let ord = order_values(left, right);
                let ord = if term.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }
}

fn lookup_matches(lookup: Lookup, actual: &Value, expected: &Value) -> bool {
    match lookup {
        Lookup::Exact if expected.is_null() => actual.is_null(),
        Lookup::Exact => json_eq(actual, expected),
        Lookup::IsNull => expected.as_bool().unwrap_or(false) == actual.is_null(),
        Lookup::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| json_eq(actual, item))),
        Lookup::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Lookup::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Lookup::Lt => compare(actual, expected) == Some(Ordering::Less),
        Lookup::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        _ => {
            let (Some(mut haystack), Some(mut needle)) = (text(actual), text(expected)) else {
                return false;
            };
            if lookup.is_case_insensitive() {
                haystack = haystack.to_lowercase();
                needle = needle.to_lowercase();
            }
            match lookup {
                Lookup::IExact => haystack == needle,
                Lookup::Contains | Lookup::IContains => haystack.contains(&needle),
                Lookup::StartsWith | Lookup::IStartsWith => haystack.starts_with(&needle),
                Lookup::EndsWith | Lookup::IEndsWith => haystack.ends_with(&needle),
                _ => false,
            }
        }
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn any_column(_: &str) -> bool {
        true
    }

    #[test]
    fn text_lookups() {
        let matcher = Matcher::new("shop.product", &any_column);
        let r = row(json!({ "id": 1, "title": "Hello World" }));
        let check = |key: &str, value: &str| matcher.matches(&Filter::leaf(key, value), &r).unwrap();

        assert!(check("title", "Hello World"));
        assert!(!check("title", "hello world"));
        assert!(check("title__iexact", "hello world"));
        assert!(check("title__contains", "lo Wo"));
        assert!(check("title__icontains", "LO WO"));
        assert!(check("title__startswith", "Hell"));
        assert!(check("title__iendswith", "WORLD"));
        assert!(!check("title__endswith", "WORLD"));
    }

    #[test]
    fn numeric_and_null_lookups() {
        let matcher = Matcher::new("shop.product", &any_column);
        let r = row(json!({ "id": 1, "price": 10, "title": null }));

        assert!(matcher.matches(&Filter::leaf("price__gt", 5), &r).unwrap());
        assert!(matcher.matches(&Filter::leaf("price__lte", 10.0), &r).unwrap());
        assert!(!matcher.matches(&Filter::leaf("price__lt", 10), &r).unwrap());
        assert!(matcher.matches(&Filter::leaf("price__in", vec![1, 10]), &r).unwrap());
        assert!(matcher.matches(&Filter::leaf("title__isnull", true), &r).unwrap());
        assert!(matcher.matches(&Filter::leaf("title", FilterValue::Null), &r).unwrap());
        assert!(!matcher.matches(&Filter::leaf("title__gt", "a"), &r).unwrap());
    }

    #[test]
    fn boolean_tree() {
        let matcher = Matcher::new("shop.product", &any_column);
        let r = row(json!({ "id": 1, "price": 10 }));
        let filter = Filter::leaf("price", 3).or(Filter::leaf("price", 10).and(Filter::leaf("id", 2).not()));
        assert!(matcher.matches(&filter, &r).unwrap());
        assert!(!matcher.matches(&filter.not(), &r).unwrap());
    }

    #[test]
    fn unknown_column_is_an_error() {
        let only_id = |c: &str| c == "id";
        let matcher = Matcher::new("shop.product", &only_id);
        let err = matcher.matches(&Filter::leaf("colour", "red"), &row(json!({ "id": 1 })));
        assert!(matches!(err, Err(TofError::UnknownField { field, .. }) if field == "colour"));
    }

    #[test]
    fn nulls_last_ascending_first_descending() {
        let matcher = Matcher::new("shop.product", &any_column);
        let mut rows = vec![
            row(json!({ "id": 1, "t": null })),
            row(json!({ "id": 2, "t": "b" })),
            row(json!({ "id": 3, "t": "a" })),
        ];
        let ids = |rows: &[Row]| rows.iter().map(|r| r["id"].as_i64().unwrap()).collect::<Vec<_>>();

        matcher.sort(&mut rows, &[OrderTerm::asc("t")]).unwrap();
        assert_eq!(ids(&rows), vec![3, 2, 1]);

        matcher.sort(&mut rows, &[OrderTerm::desc("t")]).unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3]);
    }

    #[test]
    fn subqueries_resolve_to_id_lists() {
        let filter = Filter::leaf(
            "id__in",
            Subquery {
                field_id: "shop.product.title".to_string(),
                filter: Filter::leaf("value", "x"),
            },
        );
        let resolved = resolve_subqueries(&filter, &mut |_| Ok(vec![4, 5])).unwrap();
        assert_eq!(resolved, Filter::leaf("id__in", vec![4i64, 5]));
    }
}
