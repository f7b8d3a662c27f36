//! SQL compilation of logical queries using SeaQuery.

use sea_query::{
    Alias, Asterisk, Cond, Expr, Func, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr, Value as SqlValue,
};

use super::rewrite::{LANG_KEY, VALUE_KEY};
use super::types::{
    AnnotationExpr, Condition, Filter, FilterValue, Lookup, OrderTerm, QuerySpec, split_key,
};
use crate::class::ID_FIELD;
use crate::error::{Result, TofError};

/// Translation table name.
pub const TRANSLATION_TABLE: &str = "tof_translation";

/// Compiles a [`QuerySpec`] against one table.
pub struct SqlCompiler<'a> {
    table: &'a str,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(table: &'a str) -> Self {
        Self { table }
    }

    /// `SELECT table.*, <annotations> FROM table WHERE .. ORDER BY .. LIMIT .. OFFSET ..`
    pub fn select(&self, spec: &QuerySpec) -> Result<SelectStatement> {
        let mut query = self.filtered(spec)?;
        for term in &spec.ordering {
            if spec.annotation(&term.field).is_some() {
                query.order_by(Alias::new(&term.field), order(term));
            } else {
                query.order_by((Alias::new(self.table), Alias::new(&term.field)), order(term));
            }
        }
        slice(&mut query, spec);
        Ok(query)
    }

    /// Rows as JSON objects.
    ///
    /// The filtered rows are wrapped as `q` and ordered and sliced on the
    /// outer query, since a derived table's order is not kept by its
    /// enclosing select.
    pub fn select_json(&self, spec: &QuerySpec) -> Result<String> {
        let rows = Alias::new("q");
        let mut query = Query::select();
        query
            .expr(Expr::cust("to_jsonb(q)"))
            .from_subquery(self.filtered(spec)?, rows.clone());
        for term in &spec.ordering {
            query.order_by((rows.clone(), Alias::new(&term.field)), order(term));
        }
        slice(&mut query, spec);
        Ok(query.to_string(PostgresQueryBuilder))
    }

    /// Columns, annotations and filters, without ordering or slicing.
    fn filtered(&self, spec: &QuerySpec) -> Result<SelectStatement> {
        let mut query = Query::select();
        query.column((Alias::new(self.table), Asterisk));
        query.from(Alias::new(self.table));
        for annotation in &spec.annotations {
            query.expr_as(
                self.annotation_expr(&annotation.expr),
                Alias::new(&annotation.name),
            );
        }
        query.cond_where(self.filters(&spec.filters)?);
        Ok(query)
    }

    /// `SELECT COUNT(*)` over the filtered, unsliced rows.
    pub fn count(&self, spec: &QuerySpec) -> Result<String> {
        let mut query = Query::select();
        query.expr(Expr::col(Asterisk).count());
        query.from(Alias::new(self.table));
        query.cond_where(self.filters(&spec.filters)?);
        Ok(query.to_string(PostgresQueryBuilder))
    }

    fn filters(&self, filters: &[Filter]) -> Result<Cond> {
        let mut cond = Cond::all();
        for filter in filters {
            cond = cond.add(self.filter(filter)?);
        }
        Ok(cond)
    }

    /// Compile a filter tree, keeping its boolean structure.
    pub fn filter(&self, filter: &Filter) -> Result<Cond> {
        Ok(match filter {
            Filter::Leaf(condition) => Cond::all().add(self.condition(condition)?),
            Filter::And(children) => {
                let mut cond = Cond::all();
                for child in children {
                    cond = cond.add(self.filter(child)?);
                }
                cond
            }
            Filter::Or(children) => {
                let mut cond = Cond::any();
                for child in children {
                    cond = cond.add(self.filter(child)?);
                }
                cond
            }
            Filter::Not(inner) => self.filter(inner)?.not(),
        })
    }

    fn column(&self, name: &str) -> Expr {
        Expr::col((Alias::new(self.table), Alias::new(name)))
    }

    fn condition(&self, condition: &Condition) -> Result<SimpleExpr> {
        let (column, lookup) = split_key(&condition.key)?;
        let col = self.column(column);

        if let FilterValue::Subquery(sub) = &condition.value {
            if lookup != Lookup::In {
                return Err(TofError::UnsupportedLookup(format!(
                    "{lookup} with a subquery"
                )));
            }
            let compiler = SqlCompiler::new(TRANSLATION_TABLE);
            let mut select = Query::select();
            select
                .column((Alias::new(TRANSLATION_TABLE), Alias::new("object_id")))
                .from(Alias::new(TRANSLATION_TABLE))
                .and_where(compiler.column("field_id").eq(sub.field_id.as_str()))
                .cond_where(compiler.filter(&sub.filter)?);
            return Ok(col.in_subquery(select));
        }

        Ok(match lookup {
            Lookup::Exact => match scalar(&condition.value)? {
                None => col.is_null(),
                Some(v) => col.eq(v),
            },
            Lookup::IsNull => match condition.value {
                FilterValue::Bool(false) => col.is_not_null(),
                _ => col.is_null(),
            },
            Lookup::In => {
                let FilterValue::List(items) = &condition.value else {
                    return Err(TofError::UnsupportedLookup(format!(
                        "in expects a list for {}",
                        condition.key
                    )));
                };
                let values = items
                    .iter()
                    .filter_map(|v| scalar(v).transpose())
                    .collect::<Result<Vec<_>>>()?;
                col.is_in(values)
            }
            Lookup::Gt => col.gt(required(&condition.value)?),
            Lookup::Gte => col.gte(required(&condition.value)?),
            Lookup::Lt => col.lt(required(&condition.value)?),
            Lookup::Lte => col.lte(required(&condition.value)?),
            Lookup::IExact => {
                Expr::expr(Func::lower(col)).eq(text_of(&condition.value)?.to_lowercase())
            }
            Lookup::Contains => col.like(format!(
                "%{}%",
                escape_like_wildcards(&text_of(&condition.value)?)
            )),
            Lookup::StartsWith => col.like(format!(
                "{}%",
                escape_like_wildcards(&text_of(&condition.value)?)
            )),
            Lookup::EndsWith => col.like(format!(
                "%{}",
                escape_like_wildcards(&text_of(&condition.value)?)
            )),
            Lookup::IContains => Expr::expr(Func::lower(col)).like(format!(
                "%{}%",
                escape_like_wildcards(&text_of(&condition.value)?.to_lowercase())
            )),
            Lookup::IStartsWith => Expr::expr(Func::lower(col)).like(format!(
                "{}%",
                escape_like_wildcards(&text_of(&condition.value)?.to_lowercase())
            )),
            Lookup::IEndsWith => Expr::expr(Func::lower(col)).like(format!(
                "%{}",
                escape_like_wildcards(&text_of(&condition.value)?.to_lowercase())
            )),
        })
    }

    /// Correlated subquery yielding the row's translation or NULL.
    fn annotation_expr(&self, expr: &AnnotationExpr) -> SimpleExpr {
        match expr {
            AnnotationExpr::TranslatedValue { field_id, lang } => {
                let translations = SqlCompiler::new(TRANSLATION_TABLE);
                let sub = Query::select()
                    .column((Alias::new(TRANSLATION_TABLE), Alias::new(VALUE_KEY)))
                    .from(Alias::new(TRANSLATION_TABLE))
                    .and_where(
                        translations
                            .column("object_id")
                            .equals((Alias::new(self.table), Alias::new(ID_FIELD))),
                    )
                    .and_where(translations.column("field_id").eq(field_id.as_str()))
                    .and_where(translations.column(LANG_KEY).eq(lang.as_str()))
                    .limit(1)
                    .to_string(PostgresQueryBuilder);
                Expr::cust(format!("({sub})"))
            }
        }
    }
}

fn order(term: &OrderTerm) -> Order {
    if term.descending {
        Order::Desc
    } else {
        Order::Asc
    }
}

fn slice(query: &mut SelectStatement, spec: &QuerySpec) {
    if let Some(limit) = spec.limit {
        query.limit(limit as u64);
    }
    if let Some(offset) = spec.offset {
        query.offset(offset as u64);
    }
}

/// Scalar SQL value of a filter value. `None` for null.
fn scalar(value: &FilterValue) -> Result<Option<SqlValue>> {
    Ok(match value {
        FilterValue::Null => None,
        FilterValue::Bool(b) => Some((*b).into()),
        FilterValue::Int(i) => Some((*i).into()),
        FilterValue::Float(f) => Some((*f).into()),
        FilterValue::Text(s) => Some(s.clone().into()),
        FilterValue::List(_) | FilterValue::Subquery(_) => {
            return Err(TofError::UnsupportedLookup(
                "a list or subquery needs the 'in' lookup".to_string(),
            ));
        }
    })
}

fn required(value: &FilterValue) -> Result<SqlValue> {
    scalar(value)?.ok_or_else(|| {
        TofError::UnsupportedLookup("comparison with null; use isnull".to_string())
    })
}

fn text_of(value: &FilterValue) -> Result<String> {
    match value {
        FilterValue::Text(s) => Ok(s.clone()),
        FilterValue::Int(i) => Ok(i.to_string()),
        FilterValue::Float(f) => Ok(f.to_string()),
        FilterValue::Bool(b) => Ok(b.to_string()),
        _ => Err(TofError::UnsupportedLookup(
            "pattern lookups need a text value".to_string(),
        )),
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::{Annotation, Subquery};

    fn sql(spec: &QuerySpec) -> String {
        SqlCompiler::new("shop_product")
            .select(spec)
            .unwrap()
            .to_string(PostgresQueryBuilder)
    }

    #[test]
    fn plain_filters_and_ordering() {
        let spec = QuerySpec {
            filters: vec![Filter::leaf("price__gte", 10)],
            ordering: vec![OrderTerm::desc("price")],
            limit: Some(5),
            ..QuerySpec::default()
        };
        let sql = sql(&spec);
        assert!(sql.contains(r#""shop_product"."price" >= 10"#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "shop_product"."price" DESC"#), "{sql}");
        assert!(sql.contains("LIMIT 5"), "{sql}");
    }

    #[test]
    fn subquery_targets_translation_table() {
        let spec = QuerySpec {
            filters: vec![Filter::leaf(
                "id__in",
                Subquery {
                    field_id: "shop.product.title".to_string(),
                    filter: Filter::leaf("value__icontains", "50%").and(Filter::leaf("lang", "fr")),
                },
            )],
            ..QuerySpec::default()
        };
        let sql = sql(&spec);
        assert!(sql.contains(r#""shop_product"."id" IN (SELECT "tof_translation"."object_id""#), "{sql}");
        assert!(sql.contains(r#""tof_translation"."field_id" = 'shop.product.title'"#), "{sql}");
        assert!(sql.contains(r#"LOWER("tof_translation"."value") LIKE"#), "{sql}");
        assert!(sql.contains(r#""tof_translation"."lang" = 'fr'"#), "{sql}");
    }

    #[test]
    fn annotation_is_correlated() {
        let spec = QuerySpec {
            annotations: vec![Annotation {
                name: "_title".to_string(),
                expr: AnnotationExpr::TranslatedValue {
                    field_id: "shop.product.title".to_string(),
                    lang: "de".to_string(),
                },
            }],
            ordering: vec![OrderTerm::asc("_title")],
            ..QuerySpec::default()
        };
        let sql = sql(&spec);
        assert!(sql.contains(r#""tof_translation"."object_id" = "shop_product"."id""#), "{sql}");
        assert!(sql.contains(r#"AS "_title""#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "_title" ASC"#), "{sql}");
    }

    #[test]
    fn json_rows_are_ordered_on_the_outer_query() {
        let spec = QuerySpec {
            annotations: vec![Annotation {
                name: "_title".to_string(),
                expr: AnnotationExpr::TranslatedValue {
                    field_id: "shop.product.title".to_string(),
                    lang: "fr".to_string(),
                },
            }],
            ordering: vec![OrderTerm::desc("_title"), OrderTerm::asc("price")],
            limit: Some(2),
            offset: Some(1),
            ..QuerySpec::default()
        };
        let sql = SqlCompiler::new("shop_product").select_json(&spec).unwrap();
        assert!(sql.starts_with("SELECT to_jsonb(q) FROM (SELECT"), "{sql}");
        let outer = sql.rfind(r#") AS "q""#).expect(&sql);
        let ordering = sql.find("ORDER BY").expect(&sql);
        assert!(ordering > outer, "{sql}");
        assert!(
            sql.ends_with(r#"ORDER BY "q"."_title" DESC, "q"."price" ASC LIMIT 2 OFFSET 1"#),
            "{sql}"
        );
    }

    #[test]
    fn not_wraps_condition() {
        let spec = QuerySpec {
            filters: vec![Filter::leaf("title", "x").not()],
            ..QuerySpec::default()
        };
        let sql = sql(&spec);
        assert!(sql.contains("NOT"), "{sql}");
    }

    #[test]
    fn comparison_with_null_rejected() {
        let compiler = SqlCompiler::new("shop_product");
        let err = compiler.filter(&Filter::leaf("price__gt", FilterValue::Null));
        assert!(matches!(err, Err(TofError::UnsupportedLookup(_))));
    }

    #[test]
    fn escape_like() {
        assert_eq!(escape_like_wildcards("a%b_c\\"), "a\\%b\\_c\\\\");
    }
}
