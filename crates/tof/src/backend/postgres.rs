//! PostgreSQL backend.

use async_trait::async_trait;
use sea_query::{Alias, Expr, PostgresQueryBuilder, Query, SimpleExpr, Value as SqlValue};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use super::{Backend, Row};
use crate::class::{FieldKind, ID_FIELD, ModelDefinition};
use crate::error::{Result, TofError};
use crate::models::{ContentType, Language, TranslatableField, Translation};
use crate::query::QuerySpec;
use crate::query::sql::SqlCompiler;

/// Backend running queries on a PostgreSQL pool.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Column/value pairs of a write, typed by the declared field kinds.
fn write_values(model: &ModelDefinition, values: &Row) -> Result<Vec<(Alias, SimpleExpr)>> {
    values
        .iter()
        .map(|(column, value)| {
            let field = model
                .get_field(column)
                .ok_or_else(|| TofError::unknown_field(model.content_type.to_string(), column))?;
            Ok((
                Alias::new(column),
                SimpleExpr::Value(sql_value(field.kind, value)),
            ))
        })
        .collect()
}

fn sql_value(kind: FieldKind, value: &Value) -> SqlValue {
    match (kind, value) {
        (FieldKind::Text, Value::Null) => SqlValue::String(None),
        (FieldKind::Integer, Value::Null) => SqlValue::BigInt(None),
        (FieldKind::Float, Value::Null) => SqlValue::Double(None),
        (FieldKind::Boolean, Value::Null) => SqlValue::Bool(None),
        (FieldKind::Integer, Value::Number(n)) if n.is_i64() => n.as_i64().into(),
        (FieldKind::Float | FieldKind::Integer, Value::Number(n)) => n.as_f64().into(),
        (_, Value::Bool(b)) => (*b).into(),
        (_, Value::String(s)) => s.clone().into(),
        (_, other) => other.to_string().into(),
    }
}

/// `INSERT ... RETURNING id` for one row.
///
/// Statements are rendered to strings before any await; sea-query builders
/// are not `Send`.
fn insert_sql(model: &ModelDefinition, values: &Row) -> Result<String> {
    let pairs = write_values(model, values)?;
    let mut query = Query::insert();
    query.into_table(Alias::new(&model.table));
    if pairs.is_empty() {
        query.or_default_values();
    } else {
        let (columns, exprs): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        query.columns(columns);
        query
            .values(exprs)
            .map_err(|e| TofError::Internal(anyhow::anyhow!("invalid insert: {e}")))?;
    }
    query.returning_col(Alias::new(ID_FIELD));
    Ok(query.to_string(PostgresQueryBuilder))
}

/// `UPDATE` of one row, or `None` when there is nothing to write.
fn update_sql(model: &ModelDefinition, id: i64, values: &Row) -> Result<Option<String>> {
    let pairs = write_values(model, values)?;
    if pairs.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        Query::update()
            .table(Alias::new(&model.table))
            .values(pairs)
            .and_where(Expr::col(Alias::new(ID_FIELD)).eq(id))
            .to_string(PostgresQueryBuilder),
    ))
}

/// Map a foreign key violation on `lang` to `UnknownLanguage`.
fn translation_error(err: sqlx::Error, lang: &str) -> TofError {
    if let sqlx::Error::Database(db) = &err
        && db.is_foreign_key_violation()
        && db.constraint().is_some_and(|c| c.contains("lang"))
    {
        return TofError::UnknownLanguage(lang.to_string());
    }
    TofError::Database(err)
}

#[async_trait]
impl Backend for PgBackend {
    async fn schema_ready(&self) -> Result<bool> {
        let table: Option<String> =
            sqlx::query_scalar("SELECT to_regclass('tof_translation')::text")
                .fetch_one(&self.pool)
                .await?;
        Ok(table.is_some())
    }

    async fn select(&self, model: &ModelDefinition, spec: &QuerySpec) -> Result<Vec<Row>> {
        let sql = SqlCompiler::new(&model.table).select_json(spec)?;
        debug!(model = %model.content_type, %sql, "select");
        let rows: Vec<Value> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    async fn count(&self, model: &ModelDefinition, spec: &QuerySpec) -> Result<usize> {
        let sql = SqlCompiler::new(&model.table).count(spec)?;
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn insert(&self, model: &ModelDefinition, values: &Row) -> Result<i64> {
        let sql = insert_sql(model, values)?;
        let id: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        debug!(model = %model.content_type, id, "inserted row");
        Ok(id)
    }

    async fn update(&self, model: &ModelDefinition, id: i64, values: &Row) -> Result<()> {
        let Some(sql) = update_sql(model, id, values)? else {
            return Ok(());
        };
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(TofError::NotFound(format!("{} {id}", model.content_type)));
        }
        Ok(())
    }

    async fn delete(&self, model: &ModelDefinition, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tof_translation WHERE content_type = $1 AND object_id = $2")
            .bind(model.content_type.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let sql = Query::delete()
            .from_table(Alias::new(&model.table))
            .and_where(Expr::col(Alias::new(ID_FIELD)).eq(id))
            .to_string(PostgresQueryBuilder);
        let result = sqlx::query(&sql).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn languages(&self) -> Result<Vec<Language>> {
        let languages =
            sqlx::query_as::<_, Language>("SELECT iso, is_active FROM tof_language ORDER BY iso")
                .fetch_all(&self.pool)
                .await?;
        Ok(languages)
    }

    async fn save_language(&self, language: &Language) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tof_language (iso, is_active)
            VALUES ($1, $2)
            ON CONFLICT (iso) DO UPDATE SET is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&language.iso)
        .bind(language.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_language(&self, iso: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tof_language WHERE iso = $1")
            .bind(iso)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn translatable_fields(&self) -> Result<Vec<TranslatableField>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, content_type, name, title FROM tof_translatable_field ORDER BY content_type, name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, content_type, name, title)| {
                Ok(TranslatableField {
                    id,
                    content_type: content_type.parse()?,
                    name,
                    title,
                })
            })
            .collect()
    }

    async fn save_translatable_field(&self, field: &TranslatableField) -> Result<bool> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO tof_translatable_field (id, content_type, name, title)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&field.id)
        .bind(field.content_type.to_string())
        .bind(&field.name)
        .bind(&field.title)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn delete_translatable_field(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tof_translatable_field WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn translations_for(
        &self,
        content_type: &ContentType,
        object_ids: &[i64],
    ) -> Result<Vec<Translation>> {
        if object_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            r#"
            SELECT object_id, field_id, lang, value FROM tof_translation
            WHERE content_type = $1 AND object_id = ANY($2)
            ORDER BY object_id, field_id, lang
            "#,
        )
        .bind(content_type.to_string())
        .bind(object_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(object_id, field_id, lang, value)| Translation {
                content_type: content_type.clone(),
                object_id,
                field_id,
                lang,
                value,
            })
            .collect())
    }

    async fn upsert_translation(&self, translation: &Translation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tof_translation (content_type, object_id, field_id, lang, value)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (content_type, object_id, field_id, lang)
            DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(translation.content_type.to_string())
        .bind(translation.object_id)
        .bind(&translation.field_id)
        .bind(&translation.lang)
        .bind(&translation.value)
        .execute(&self.pool)
        .await
        .map_err(|e| translation_error(e, &translation.lang))?;
        Ok(())
    }
}
