use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{IsoMerchant, Merchant, MerchantFunder};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::SourceMerchant;
use mca_db::source::repositories::SourceRepository;
use mca_transform::contact::{contact_info, primary_address, text};

use super::required_name;
use crate::engine::{EntitySyncer, NaturalKey, RecordOptions, RecordOutcome, SyncContext};

pub struct MerchantSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
}

impl<D, S> MerchantSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self { ctx }
    }

    fn build(&self, record: &SourceRecord, merchant: &SourceMerchant) -> McaResult<Merchant> {
        let info = contact_info(
            merchant.email.as_deref(),
            merchant.phone.as_deref(),
            &merchant.contacts,
        );
        let now = Utc::now();
        Ok(Merchant {
            id: Uuid::new_v4(),
            funder_id: self.ctx.funder_id,
            name: required_name(record, merchant.name.as_deref())?,
            dba_name: text(merchant.dba_name.as_deref()),
            ein: text(merchant.ein.as_deref()),
            email: info.email,
            phone: info.phone,
            industry: text(merchant.industry.as_deref()),
            address: primary_address(&merchant.addresses),
            contact_name: info.contact_name,
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }

    async fn link_relationships(
        &self,
        record: &SourceRecord,
        merchant_id: Uuid,
        payload: &SourceMerchant,
    ) -> McaResult<()> {
        let funder_id = self.ctx.funder_id;
        self.ctx
            .link(
                record,
                merchant_id,
                |l: &MerchantFunder| l.funder_id == funder_id,
                || MerchantFunder {
                    id: Uuid::new_v4(),
                    funder_id,
                    merchant_id,
                },
            )
            .await;

        let iso_id = self
            .ctx
            .resolver()
            .resolve(SourceKind::Iso, payload.iso.as_ref())
            .await?;
        if let Some(iso_id) = iso_id {
            self.ctx
                .link(
                    record,
                    merchant_id,
                    |l: &IsoMerchant| l.iso_id == iso_id,
                    || IsoMerchant {
                        id: Uuid::new_v4(),
                        funder_id,
                        merchant_id,
                        iso_id,
                    },
                )
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl<D, S> EntitySyncer for MerchantSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::Merchant
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceMerchant = record.payload_as()?;
        let incoming = self.build(record, &payload)?;

        let keys = [NaturalKey::name(None, Some(&incoming.name))];
        let existing = self.ctx.locate::<Merchant>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(self.kind(), existing, incoming, options)
            .await?;

        if !persisted.is_skipped() {
            if let Err(e) = self
                .link_relationships(record, persisted.doc().id, &payload)
                .await
            {
                tracing::warn!(
                    source_id = record.id,
                    error = %e,
                    "failed to link merchant relationships"
                );
            }
        }

        Ok(self.ctx.finish(record, &persisted).await)
    }
}
