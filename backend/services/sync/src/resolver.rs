use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::EmbeddedRef;
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::SourceKind;
use mca_db::source::payloads::SourceRef;
use mca_db::source::repositories::SourceRepository;

use crate::target::SyncTarget;

/// Maps references between OrgMeter records to the CRM ids those records
/// were synced into, within one funder.
///
/// A reference that cannot be narrowed to an id, or whose record has not
/// been synced yet, resolves to `None`.
pub struct IdentityResolver<'a, D, S> {
    store: &'a D,
    source: &'a S,
    funder_id: Uuid,
}

impl<'a, D, S> IdentityResolver<'a, D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(store: &'a D, source: &'a S, funder_id: Uuid) -> Self {
        Self {
            store,
            source,
            funder_id,
        }
    }

    pub async fn resolve(
        &self,
        kind: SourceKind,
        reference: Option<&SourceRef>,
    ) -> McaResult<Option<Uuid>> {
        let Some(source_id) = reference.and_then(SourceRef::numeric_id) else {
            return Ok(None);
        };
        let resolved = self
            .source
            .find_sync_id(kind, self.funder_id, source_id)
            .await?;
        if resolved.is_none() {
            tracing::debug!(entity = %kind, source_id, "reference not synced yet");
        }
        Ok(resolved)
    }

    /// Resolve and load the target, returning its display snapshot.
    pub async fn resolve_embedded<T: SyncTarget>(
        &self,
        kind: SourceKind,
        reference: Option<&SourceRef>,
    ) -> McaResult<Option<EmbeddedRef>> {
        let Some(target_id) = self.resolve(kind, reference).await? else {
            return Ok(None);
        };
        Ok(self
            .store
            .get::<T>(target_id)
            .await?
            .map(|doc| doc.embedded()))
    }
}
