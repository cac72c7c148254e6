use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, Pool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::{debug, info};

use crate::store::{
    assign_id, round_total, CategoryStat, Collection, DeleteResult, Document, DocumentStore,
    Filter, InsertOneResult, StoreError, UpdateResult, ID_FIELD,
};

/// Документные коллекции поверх PostgreSQL: таблица на коллекцию,
/// документ целиком лежит в колонке `doc JSONB`, `_id` продублирован в `id`.
#[derive(Clone)]
pub struct PgStore {
    pub pool: Pool<Postgres>,
}

impl PgStore {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(PgStore { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed");
        Ok(())
    }
}

/// Дописывает условие WHERE для фильтра.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {
            qb.push("TRUE");
        }
        Filter::Eq(field, value) if field == ID_FIELD => match value.as_str() {
            Some(id) => {
                qb.push("id = ").push_bind(id.to_string());
            }
            // Нестроковых идентификаторов в таблицах нет.
            None => {
                qb.push("FALSE");
            }
        },
        Filter::Eq(field, value) => {
            let mut probe = Document::new();
            probe.insert(field.clone(), value.clone());
            qb.push("doc @> ").push_bind(Json(Value::Object(probe)));
        }
        Filter::IdIn(ids) => {
            qb.push("id = ANY(").push_bind(ids.clone()).push(")");
        }
    }
}

fn into_document(value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "stored document is not an object: {}",
            other
        ))),
    }
}

fn insert_query(collection: Collection, id: String, doc: Document) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO {} (id, doc) VALUES (", collection.table()));
    qb.push_bind(id)
        .push(", ")
        .push_bind(Json(Value::Object(doc)))
        .push(")");
    qb
}

fn delete_many_query(collection: Collection, filter: &Filter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE ", collection.table()));
    push_filter(&mut qb, filter);
    qb
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let mut qb = QueryBuilder::new(format!("SELECT doc FROM {} WHERE ", collection.table()));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY seq");

        let rows: Vec<Json<Value>> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|Json(value)| into_document(value)).collect()
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let mut qb = QueryBuilder::new(format!("SELECT doc FROM {} WHERE ", collection.table()));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY seq LIMIT 1");

        let row: Option<Json<Value>> = qb
            .build_query_scalar()
            .fetch_optional(&self.pool)
            .await?;

        row.map(|Json(value)| into_document(value)).transpose()
    }

    async fn insert_one(&self, collection: Collection, mut doc: Document) -> Result<InsertOneResult, StoreError> {
        let id = assign_id(&mut doc)?;
        insert_query(collection, id.clone(), doc)
            .build()
            .execute(&self.pool)
            .await?;

        Ok(InsertOneResult { acknowledged: true, inserted_id: id })
    }

    async fn update_one(&self, collection: Collection, filter: &Filter, set: Document) -> Result<UpdateResult, StoreError> {
        let table = collection.table();
        let patch = Json(Value::Object(set));

        // matched - найден ли документ, modified - изменилось ли что-то после слияния.
        let mut qb = QueryBuilder::new(format!(
            "WITH target AS (SELECT id, doc FROM {table} WHERE "
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY seq LIMIT 1 FOR UPDATE), updated AS (UPDATE ")
            .push(table)
            .push(" t SET doc = t.doc || ")
            .push_bind(patch.clone())
            .push(" FROM target WHERE t.id = target.id AND NOT (target.doc @> ")
            .push_bind(patch)
            .push(") RETURNING t.id) SELECT (SELECT count(*) FROM target) AS matched, (SELECT count(*) FROM updated) AS modified");

        let row = qb.build().fetch_one(&self.pool).await?;
        let matched: i64 = row.try_get("matched")?;
        let modified: i64 = row.try_get("modified")?;

        Ok(UpdateResult::new(matched as u64, modified as u64))
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let table = collection.table();
        let mut qb = QueryBuilder::new(format!(
            "DELETE FROM {table} WHERE id IN (SELECT id FROM {table} WHERE "
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY seq LIMIT 1)");

        let result = qb.build().execute(&self.pool).await?;
        Ok(DeleteResult::new(result.rows_affected()))
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let result = delete_many_query(collection, filter)
            .build()
            .execute(&self.pool)
            .await?;
        Ok(DeleteResult::new(result.rows_affected()))
    }

    async fn estimated_count(&self, collection: Collection) -> Result<u64, StoreError> {
        // Статистика планировщика; -1 означает, что таблицу еще не анализировали.
        let estimate: Option<i64> = sqlx::query_scalar(
            "SELECT reltuples::bigint FROM pg_class WHERE oid = to_regclass($1)"
        )
        .bind(collection.table())
        .fetch_optional(&self.pool)
        .await?;

        match estimate {
            Some(count) if count >= 0 => Ok(count as u64),
            _ => {
                debug!("No planner statistics for {}, counting rows", collection.table());
                let count: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM {}", collection.table()))
                    .fetch_one(&self.pool)
                    .await?;
                Ok(count as u64)
            }
        }
    }

    async fn insert_and_delete_many(
        &self,
        insert_into: Collection,
        mut doc: Document,
        delete_from: Collection,
        filter: &Filter,
    ) -> Result<(InsertOneResult, DeleteResult), StoreError> {
        let id = assign_id(&mut doc)?;

        let mut tx = self.pool.begin().await?;

        insert_query(insert_into, id.clone(), doc)
            .build()
            .execute(&mut *tx)
            .await?;

        let deleted = delete_many_query(delete_from, filter)
            .build()
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((
            InsertOneResult { acknowledged: true, inserted_id: id },
            DeleteResult::new(deleted.rows_affected()),
        ))
    }

    async fn order_states(&self) -> Result<Vec<CategoryStat>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT m.doc->>'category' AS category,
                   count(*) AS count,
                   COALESCE(SUM(
                       CASE WHEN jsonb_typeof(m.doc->'price') = 'number'
                            THEN (m.doc->>'price')::float8
                            ELSE 0 END
                   ), 0)::float8 AS total
            FROM payments p
            CROSS JOIN LATERAL jsonb_array_elements_text(
                CASE WHEN jsonb_typeof(p.doc->'menuItems') = 'array'
                     THEN p.doc->'menuItems'
                     ELSE '[]'::jsonb END
            ) AS item(menu_id)
            JOIN menu m ON m.id = item.menu_id
            GROUP BY 1
            ORDER BY 1 NULLS FIRST
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<CategoryStat, StoreError> {
                let category: Option<String> = row.try_get("category")?;
                let count: i64 = row.try_get("count")?;
                let total: f64 = row.try_get("total")?;
                Ok(CategoryStat {
                    category,
                    count: count as u64,
                    total: round_total(total),
                })
            })
            .collect()
    }
}
