use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, types::Json};

use super::{Link, RecordStore, Relation, Row, StoreResult, Table};
use crate::error::StoreError;

/// PostgresRecordStore
///
/// The concrete implementation of the `RecordStore` trait, backed by PostgreSQL.
///
/// Rows travel as `jsonb`: reads use `to_jsonb(t)` and writes go through
/// `jsonb_populate_record`, so one statement shape serves every table while
/// values are always bound. Table and column names only ever come from the
/// static allow-lists on `Table` and `Relation`.
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a new store instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_rows(&self, sql: &str, id: i64) -> StoreResult<Vec<Row>> {
        let rows = sqlx::query_scalar::<_, Json<Row>>(sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("fetch_rows error: {:?}", e))?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

/// Maps unique violations on writes to `StoreError::Duplicate`.
fn write_error(table: Table) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(table = table.name(), "write error: {:?}", e);
        let duplicate = e
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.constraint().unwrap_or("unique key").to_string());
        match duplicate {
            Some(key) => StoreError::Duplicate {
                table: table.name(),
                key,
            },
            None => StoreError::Database(e),
        }
    }
}

fn column_list(attrs: &Row) -> Vec<String> {
    attrs.keys().map(|key| quote(key)).collect()
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn create(&self, table: Table, attrs: Row) -> StoreResult<Row> {
        let attrs = table.writable(&attrs);
        let name = quote(table.name());

        if attrs.is_empty() {
            return Err(StoreError::Backend(format!(
                "no writable attributes for '{}'",
                table.name()
            )));
        }

        let columns = column_list(&attrs).join(", ");
        let sql = format!(
            "INSERT INTO {name} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{name}, $1) \
             RETURNING to_jsonb(t)"
        );

        let Json(row) = sqlx::query_scalar::<_, Json<Row>>(&sql)
            .bind(Json(Value::Object(attrs)))
            .fetch_one(&self.pool)
            .await
            .map_err(write_error(table))?;
        Ok(row)
    }

    async fn find_by_id(&self, table: Table, id: i64) -> StoreResult<Option<Row>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} AS t WHERE t.\"id\" = $1",
            quote(table.name())
        );
        Ok(self.fetch_rows(&sql, id).await?.into_iter().next())
    }

    async fn find_one(
        &self,
        table: Table,
        column: &str,
        value: &Value,
    ) -> StoreResult<Option<Row>> {
        table.check_unique_key(column)?;
        let name = quote(table.name());

        let mut probe = Row::new();
        probe.insert(column.to_string(), value.clone());
        let column = quote(column);

        // The probe row gives the bound value the column's own SQL type.
        let sql = format!(
            "SELECT to_jsonb(t) FROM {name} AS t \
             WHERE t.{column} = (SELECT r.{column} FROM jsonb_populate_record(NULL::{name}, $1) AS r) \
             LIMIT 1"
        );
        let row = sqlx::query_scalar::<_, Json<Row>>(&sql)
            .bind(Json(Value::Object(probe)))
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(table = table.name(), "find_one error: {:?}", e))?;
        Ok(row.map(|Json(row)| row))
    }

    async fn all(&self, table: Table) -> StoreResult<Vec<Row>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} AS t ORDER BY t.\"id\"",
            quote(table.name())
        );
        let rows = sqlx::query_scalar::<_, Json<Row>>(&sql)
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(table = table.name(), "all error: {:?}", e))?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn update_attributes(&self, table: Table, id: i64, attrs: Row) -> StoreResult<Row> {
        let attrs = table.writable(&attrs);
        let name = quote(table.name());

        let mut assignments: Vec<String> = attrs
            .keys()
            .map(|key| format!("{0} = r.{0}", quote(key)))
            .collect();
        assignments.push("\"updated_at\" = NOW()".to_string());

        let sql = format!(
            "UPDATE {name} AS t SET {} \
             FROM jsonb_populate_record(NULL::{name}, $1) AS r \
             WHERE t.\"id\" = $2 RETURNING to_jsonb(t)",
            assignments.join(", ")
        );

        let row = sqlx::query_scalar::<_, Json<Row>>(&sql)
            .bind(Json(Value::Object(attrs)))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error(table))?;

        row.map(|Json(row)| row).ok_or(StoreError::MissingRow {
            table: table.name(),
            id,
        })
    }

    async fn destroy(&self, table: Table, id: i64) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE \"id\" = $1", quote(table.name()));
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(table = table.name(), "delete error: {:?}", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: table.name(),
                id,
            });
        }
        Ok(())
    }

    async fn get_related(&self, relation: &Relation, owner_id: i64) -> StoreResult<Vec<Row>> {
        let owner = quote(relation.owner.name());
        let target = quote(relation.target.name());

        let sql = match relation.link {
            Link::BelongsTo { foreign_key } => format!(
                "SELECT to_jsonb(x) FROM {target} AS x \
                 JOIN {owner} AS o ON o.{} = x.\"id\" WHERE o.\"id\" = $1",
                quote(foreign_key)
            ),
            Link::HasMany { foreign_key } => format!(
                "SELECT to_jsonb(x) FROM {target} AS x WHERE x.{} = $1 ORDER BY x.\"id\"",
                quote(foreign_key)
            ),
            Link::ManyToMany {
                join_table,
                owner_key,
                target_key,
            } => format!(
                "SELECT to_jsonb(x) FROM {target} AS x \
                 JOIN {} AS j ON j.{} = x.\"id\" WHERE j.{} = $1 ORDER BY x.\"id\"",
                quote(join_table),
                quote(target_key),
                quote(owner_key)
            ),
        };

        self.fetch_rows(&sql, owner_id).await
    }

    async fn set_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: Option<i64>,
    ) -> StoreResult<()> {
        let Link::BelongsTo { foreign_key } = relation.link else {
            return Err(StoreError::Unsupported(relation.name));
        };

        let sql = format!(
            "UPDATE {} SET {} = $1, \"updated_at\" = NOW() WHERE \"id\" = $2",
            quote(relation.owner.name()),
            quote(foreign_key)
        );
        let result = sqlx::query(&sql)
            .bind(target_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!(relation = relation.name, "set error: {:?}", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow {
                table: relation.owner.name(),
                id: owner_id,
            });
        }
        Ok(())
    }

    async fn add_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: i64,
    ) -> StoreResult<()> {
        let query = match relation.link {
            Link::BelongsTo { .. } => return Err(StoreError::Unsupported(relation.name)),
            Link::HasMany { foreign_key } => {
                let sql = format!(
                    "UPDATE {} SET {} = $1 WHERE \"id\" = $2",
                    quote(relation.target.name()),
                    quote(foreign_key)
                );
                sqlx::query(&sql)
                    .bind(owner_id)
                    .bind(target_id)
                    .execute(&self.pool)
                    .await
            }
            Link::ManyToMany {
                join_table,
                owner_key,
                target_key,
            } => {
                let sql = format!(
                    "INSERT INTO {} ({}, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                    quote(join_table),
                    quote(owner_key),
                    quote(target_key)
                );
                sqlx::query(&sql)
                    .bind(owner_id)
                    .bind(target_id)
                    .execute(&self.pool)
                    .await
            }
        };

        query.inspect_err(|e| tracing::error!(relation = relation.name, "add error: {:?}", e))?;
        Ok(())
    }

    async fn remove_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: i64,
    ) -> StoreResult<()> {
        let query = match relation.link {
            Link::BelongsTo { .. } => return Err(StoreError::Unsupported(relation.name)),
            Link::HasMany { foreign_key } => {
                let sql = format!(
                    "UPDATE {0} SET {1} = NULL WHERE \"id\" = $1 AND {1} = $2",
                    quote(relation.target.name()),
                    quote(foreign_key)
                );
                sqlx::query(&sql)
                    .bind(target_id)
                    .bind(owner_id)
                    .execute(&self.pool)
                    .await
            }
            Link::ManyToMany {
                join_table,
                owner_key,
                target_key,
            } => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = $1 AND {} = $2",
                    quote(join_table),
                    quote(owner_key),
                    quote(target_key)
                );
                sqlx::query(&sql)
                    .bind(owner_id)
                    .bind(target_id)
                    .execute(&self.pool)
                    .await
            }
        };

        query.inspect_err(|e| tracing::error!(relation = relation.name, "remove error: {:?}", e))?;
        Ok(())
    }
}
