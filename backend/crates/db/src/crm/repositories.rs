use async_trait::async_trait;
use uuid::Uuid;

use crate::crm::document::{Document, LookupKey};
use mca_common::error::McaResult;

/// Typed access to CRM documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get<T: Document>(&self, id: Uuid) -> McaResult<Option<T>>;

    /// First document whose normalized natural key equals `value`.
    /// `scope = None` searches across all funders.
    async fn find_by_key<T: Document>(
        &self,
        scope: Option<Uuid>,
        key: LookupKey,
        value: &str,
    ) -> McaResult<Option<T>>;

    async fn list_for_funder<T: Document>(&self, funder_id: Uuid) -> McaResult<Vec<T>>;

    async fn list_by_parent<T: Document>(&self, parent_id: Uuid) -> McaResult<Vec<T>>;

    async fn insert<T: Document>(&self, doc: &T) -> McaResult<()>;

    /// Overwrite an existing document. Missing documents are `NotFound`.
    async fn update<T: Document>(&self, doc: &T) -> McaResult<()>;

    /// Atomically replace every `T` under `parent_id` with `docs`.
    /// On failure the previous set is left untouched.
    async fn replace_children<T: Document>(&self, parent_id: Uuid, docs: &[T]) -> McaResult<()>;

    /// [`replace_children`](Self::replace_children) for two collections in
    /// one transaction, for sets whose documents reference each other.
    async fn replace_children_pair<A: Document, B: Document>(
        &self,
        parent_id: Uuid,
        first: &[A],
        second: &[B],
    ) -> McaResult<()>;
}
