use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::crm::document::{normalize_key, Document, LookupKey};
use crate::crm::repositories::DocumentStore;
use mca_common::error::{McaError, McaResult};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode<T: Document>(body: serde_json::Value) -> McaResult<T> {
        serde_json::from_value(body).map_err(|e| {
            McaError::Internal(format!("corrupt {} document: {e}", T::COLLECTION))
        })
    }

    async fn begin(&self) -> McaResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| McaError::Database(e.to_string()))
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> McaResult<()> {
        tx.commit()
            .await
            .map_err(|e| McaError::Database(e.to_string()))
    }

    /// Delete every `T` under `parent_id` and insert `docs`, inside `tx`.
    /// Dropping `tx` on error rolls the whole swap back.
    async fn replace_within<T: Document>(
        tx: &mut Transaction<'static, Postgres>,
        parent_id: Uuid,
        docs: &[T],
    ) -> McaResult<()> {
        sqlx::query("delete from crm_documents where collection = $1 and parent_id = $2")
            .bind(T::COLLECTION)
            .bind(parent_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| McaError::Database(e.to_string()))?;

        for doc in docs {
            if doc.parent_id() != Some(parent_id) {
                return Err(McaError::Validation(format!(
                    "{} {} does not belong to parent {parent_id}",
                    T::COLLECTION,
                    doc.id()
                )));
            }
            Self::insert_with(&mut **tx, doc).await?;
        }
        Ok(())
    }

    async fn insert_with<'e, E, T>(executor: E, doc: &T) -> McaResult<()>
    where
        E: PgExecutor<'e>,
        T: Document,
    {
        let body = serde_json::to_value(doc)?;
        let now = Utc::now();
        sqlx::query(
            "insert into crm_documents
             (id, collection, funder_id, parent_id, name_key, email_key, body, created_at, updated_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $8)",
        )
        .bind(doc.id())
        .bind(T::COLLECTION)
        .bind(doc.funder_id())
        .bind(doc.parent_id())
        .bind(doc.name_key())
        .bind(doc.email_key())
        .bind(body)
        .bind(now)
        .execute(executor)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get<T: Document>(&self, id: Uuid) -> McaResult<Option<T>> {
        let body: Option<serde_json::Value> = sqlx::query_scalar(
            "select body from crm_documents where collection = $1 and id = $2",
        )
        .bind(T::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        body.map(Self::decode).transpose()
    }

    async fn find_by_key<T: Document>(
        &self,
        scope: Option<Uuid>,
        key: LookupKey,
        value: &str,
    ) -> McaResult<Option<T>> {
        let Some(needle) = normalize_key(value) else {
            return Ok(None);
        };
        let column = match key {
            LookupKey::Name => "name_key",
            LookupKey::Email => "email_key",
        };

        let body: Option<serde_json::Value> = sqlx::query_scalar(&format!(
            "select body from crm_documents
             where collection = $1 and {column} = $2
               and ($3::uuid is null or funder_id = $3)
             order by created_at asc
             limit 1"
        ))
        .bind(T::COLLECTION)
        .bind(needle)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        body.map(Self::decode).transpose()
    }

    async fn list_for_funder<T: Document>(&self, funder_id: Uuid) -> McaResult<Vec<T>> {
        let bodies: Vec<serde_json::Value> = sqlx::query_scalar(
            "select body from crm_documents
             where collection = $1 and funder_id = $2
             order by created_at asc",
        )
        .bind(T::COLLECTION)
        .bind(funder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        bodies.into_iter().map(Self::decode).collect()
    }

    async fn list_by_parent<T: Document>(&self, parent_id: Uuid) -> McaResult<Vec<T>> {
        let bodies: Vec<serde_json::Value> = sqlx::query_scalar(
            "select body from crm_documents
             where collection = $1 and parent_id = $2
             order by created_at asc",
        )
        .bind(T::COLLECTION)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        bodies.into_iter().map(Self::decode).collect()
    }

    async fn insert<T: Document>(&self, doc: &T) -> McaResult<()> {
        Self::insert_with(&self.pool, doc).await
    }

    async fn update<T: Document>(&self, doc: &T) -> McaResult<()> {
        let body = serde_json::to_value(doc)?;
        let result = sqlx::query(
            "update crm_documents
             set funder_id = $1, parent_id = $2, name_key = $3, email_key = $4,
                 body = $5, updated_at = $6
             where collection = $7 and id = $8",
        )
        .bind(doc.funder_id())
        .bind(doc.parent_id())
        .bind(doc.name_key())
        .bind(doc.email_key())
        .bind(body)
        .bind(Utc::now())
        .bind(T::COLLECTION)
        .bind(doc.id())
        .execute(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(McaError::NotFound(format!(
                "{} document not found: {}",
                T::COLLECTION,
                doc.id()
            )));
        }
        Ok(())
    }

    async fn replace_children<T: Document>(&self, parent_id: Uuid, docs: &[T]) -> McaResult<()> {
        let mut tx = self.begin().await?;
        Self::replace_within(&mut tx, parent_id, docs).await?;
        Self::commit(tx).await
    }

    async fn replace_children_pair<A: Document, B: Document>(
        &self,
        parent_id: Uuid,
        first: &[A],
        second: &[B],
    ) -> McaResult<()> {
        let mut tx = self.begin().await?;
        Self::replace_within(&mut tx, parent_id, first).await?;
        Self::replace_within(&mut tx, parent_id, second).await?;
        Self::commit(tx).await
    }
}
