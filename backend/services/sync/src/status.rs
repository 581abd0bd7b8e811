use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::document::{Document, LookupKey};
use mca_db::crm::models::FundingStatus;
use mca_db::crm::repositories::DocumentStore;

/// Funding status for an advance's status name.
///
/// Tries the named status, then the funder's initial status, then any status
/// the funder has. `None` when the funder has no statuses at all.
pub async fn resolve_status<D: DocumentStore>(
    store: &D,
    funder_id: Uuid,
    name: Option<&str>,
) -> McaResult<Option<FundingStatus>> {
    if let Some(name) = name {
        if let Some(status) = store
            .find_by_key::<FundingStatus>(Some(funder_id), LookupKey::Name, name)
            .await?
        {
            return Ok(Some(status));
        }
    }

    let statuses = store.list_for_funder::<FundingStatus>(funder_id).await?;
    let fallback = statuses
        .iter()
        .find(|s| s.initial)
        .or_else(|| statuses.first())
        .cloned();
    if let Some(status) = &fallback {
        tracing::debug!(requested = ?name, fallback = %status.name, "funding status fell back");
    }
    Ok(fallback)
}

/// Id of a funder-scoped lookup record (fee or expense type) by name.
pub async fn lookup_type<T: Document, D: DocumentStore>(
    store: &D,
    funder_id: Uuid,
    name: &str,
) -> McaResult<Option<Uuid>> {
    let found = store
        .find_by_key::<T>(Some(funder_id), LookupKey::Name, name)
        .await?;
    if found.is_none() {
        tracing::debug!(collection = T::COLLECTION, name, "lookup type not found");
    }
    Ok(found.map(|doc| doc.id()))
}
