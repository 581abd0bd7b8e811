use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{
    CrmUser, EmbeddedRef, Funding, Iso, Lender, Merchant, Representative,
};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::{SourceAdvance, TextValue};
use mca_db::source::repositories::SourceRepository;
use mca_transform::dates::parse_optional_date;
use mca_transform::enums::funding_type;
use mca_transform::money::{cents_or_zero, optional_decimal};

use crate::engine::{
    EntitySyncer, NaturalKey, Persisted, RecordOptions, RecordOutcome, SyncContext,
};
use crate::fanout::{self, FanoutInput, FanoutMode};
use crate::status::resolve_status;

/// Advances become Fundings, followed by their dependent records.
pub struct AdvanceSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
}

impl<D, S> AdvanceSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self { ctx }
    }

    async fn build(&self, record: &SourceRecord, advance: &SourceAdvance) -> McaResult<Funding> {
        let ctx = &self.ctx;
        let resolver = ctx.resolver();
        let terms = advance.funding.clone().unwrap_or_default();

        let status = resolve_status(&ctx.store, ctx.funder_id, advance.status.as_deref())
            .await?
            .map(|s| EmbeddedRef {
                id: s.id,
                name: s.name,
                email: None,
                phone: None,
            });

        let mut followers = Vec::new();
        for reference in &advance.followers {
            if let Some(id) = resolver.resolve(SourceKind::User, Some(reference)).await? {
                if !followers.contains(&id) {
                    followers.push(id);
                }
            }
        }

        let name = advance
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| record.label());

        let now = Utc::now();
        Ok(Funding {
            id: Uuid::new_v4(),
            funder_id: ctx.funder_id,
            name,
            funding_type: funding_type(advance.advance_type.as_deref()),
            status,
            merchant: resolver
                .resolve_embedded::<Merchant>(SourceKind::Merchant, advance.merchant.as_ref())
                .await?,
            iso: resolver
                .resolve_embedded::<Iso>(SourceKind::Iso, advance.iso.as_ref())
                .await?,
            lender: resolver
                .resolve_embedded::<Lender>(SourceKind::Lender, advance.lender.as_ref())
                .await?,
            underwriter: resolver
                .resolve_embedded::<CrmUser>(SourceKind::Underwriter, advance.underwriter.as_ref())
                .await?,
            sales_rep: resolver
                .resolve_embedded::<Representative>(SourceKind::SalesRep, advance.sales_rep.as_ref())
                .await?,
            funded_amount: cents_or_zero(TextValue::opt(terms.principal_amount.as_ref()))?,
            payback_amount: cents_or_zero(TextValue::opt(terms.payback_amount.as_ref()))?,
            commission_amount: cents_or_zero(TextValue::opt(
                terms.iso_origination_commission.as_ref(),
            ))?,
            factor_rate: optional_decimal(TextValue::opt(terms.factor_rate.as_ref()))?,
            funded_date: parse_optional_date(advance.funded_date.as_deref()),
            followers,
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl<D, S> EntitySyncer for AdvanceSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::Advance
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceAdvance = record.payload_as()?;
        let incoming = self.build(record, &payload).await?;

        let keys = [NaturalKey::name(Some(self.ctx.funder_id), Some(&incoming.name))];
        let existing = self.ctx.locate::<Funding>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(self.kind(), existing, incoming, options)
            .await?;

        let mode = match &persisted {
            Persisted::Created(_) => Some(FanoutMode::Create),
            Persisted::Updated(_) => Some(FanoutMode::Update),
            Persisted::Skipped(_) => None,
        };
        if let Some(mode) = mode {
            let input = FanoutInput {
                record,
                advance: &payload,
                funding: persisted.doc(),
                mode,
            };
            let report = fanout::run(&*self.ctx, &input).await;
            if !report.failed.is_empty() {
                tracing::warn!(
                    source_id = record.id,
                    failed = ?report.failed,
                    "funding synced with failed dependents"
                );
            }
        }

        Ok(self.ctx.finish(record, &persisted).await)
    }
}
