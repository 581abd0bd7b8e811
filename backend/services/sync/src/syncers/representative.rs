use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::{McaError, McaResult};
use mca_db::crm::models::{join_name, Representative, RepresentativeIso};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::SourceSalesRep;
use mca_db::source::repositories::SourceRepository;
use mca_transform::contact::text;

use crate::engine::{EntitySyncer, NaturalKey, RecordOptions, RecordOutcome, SyncContext};

/// Sales reps become representatives linked to every ISO they sell for.
pub struct RepresentativeSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
}

impl<D, S> RepresentativeSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self { ctx }
    }

    fn build(&self, record: &SourceRecord, rep: &SourceSalesRep) -> McaResult<Representative> {
        let first_name = text(rep.first_name.as_deref());
        let last_name = text(rep.last_name.as_deref());
        let email = text(rep.email.as_deref());
        if first_name.is_none() && last_name.is_none() && email.is_none() {
            return Err(McaError::Validation(format!(
                "Representative {} has neither a name nor an email",
                record.id
            )));
        }

        let now = Utc::now();
        Ok(Representative {
            id: Uuid::new_v4(),
            funder_id: self.ctx.funder_id,
            first_name,
            last_name,
            email,
            phone: text(rep.phone.as_deref()),
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }

    async fn link_isos(&self, record: &SourceRecord, representative_id: Uuid, rep: &SourceSalesRep) {
        let funder_id = self.ctx.funder_id;
        for reference in &rep.isos {
            let iso_id = match self
                .ctx
                .resolver()
                .resolve(SourceKind::Iso, Some(reference))
                .await
            {
                Ok(Some(iso_id)) => iso_id,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        source_id = record.id,
                        error = %e,
                        "failed to resolve representative iso"
                    );
                    continue;
                }
            };
            self.ctx
                .link(
                    record,
                    representative_id,
                    |l: &RepresentativeIso| l.iso_id == iso_id,
                    || RepresentativeIso {
                        id: Uuid::new_v4(),
                        funder_id,
                        representative_id,
                        iso_id,
                    },
                )
                .await;
        }
    }
}

#[async_trait]
impl<D, S> EntitySyncer for RepresentativeSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::SalesRep
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceSalesRep = record.payload_as()?;
        let incoming = self.build(record, &payload)?;

        let full_name = join_name(incoming.first_name.as_deref(), incoming.last_name.as_deref());
        let keys = [
            NaturalKey::email(None, incoming.email.as_deref()),
            NaturalKey::name(None, Some(&full_name)),
        ];
        let existing = self.ctx.locate::<Representative>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(self.kind(), existing, incoming, options)
            .await?;

        if !persisted.is_skipped() {
            self.link_isos(record, persisted.doc().id, &payload).await;
        }

        Ok(self.ctx.finish(record, &persisted).await)
    }
}
