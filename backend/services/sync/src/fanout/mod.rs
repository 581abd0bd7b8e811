//! Records hanging off a synced Funding: payback plan, fees, expenses,
//! disbursement, commission, syndications and paybacks.
//!
//! Each step runs after the previous one finishes and owns its errors: a
//! failed step is logged and the next one still runs.

mod disbursement;
mod fees;
mod payback;
mod plan;
mod syndication;

use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::document::Document;
use mca_db::crm::models::Funding;
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::SourceRecord;
use mca_db::source::payloads::{SourceAdvance, SourceFundingTerms};
use mca_db::source::repositories::SourceRepository;

use crate::engine::SyncContext;

/// How the Funding itself was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutMode {
    /// Fresh funding: write dependents only where none exist yet.
    Create,
    /// Existing funding: rebuild dependents from the source.
    Update,
}

pub struct FanoutInput<'a> {
    pub record: &'a SourceRecord,
    pub advance: &'a SourceAdvance,
    pub funding: &'a Funding,
    pub mode: FanoutMode,
}

impl FanoutInput<'_> {
    fn terms(&self) -> SourceFundingTerms {
        self.advance.funding.clone().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct FanoutReport {
    pub written: usize,
    pub failed: Vec<&'static str>,
}

impl FanoutReport {
    fn absorb(&mut self, step: &'static str, input: &FanoutInput<'_>, result: McaResult<usize>) {
        match result {
            Ok(count) => {
                self.written += count;
                tracing::debug!(
                    step,
                    funding_id = %input.funding.id,
                    count,
                    "dependent records written"
                );
            }
            Err(e) => {
                tracing::warn!(
                    step,
                    source_id = input.record.id,
                    funding_id = %input.funding.id,
                    error = %e,
                    "dependent sync failed"
                );
                self.failed.push(step);
            }
        }
    }
}

pub async fn run<D, S>(ctx: &SyncContext<D, S>, input: &FanoutInput<'_>) -> FanoutReport
where
    D: DocumentStore,
    S: SourceRepository,
{
    let mut report = FanoutReport::default();
    report.absorb("payback_plan", input, plan::sync(ctx, input).await);
    report.absorb("fees", input, fees::sync_fees(ctx, input).await);
    report.absorb("expenses", input, fees::sync_expenses(ctx, input).await);
    report.absorb("disbursement", input, disbursement::sync_disbursement(ctx, input).await);
    report.absorb("commission", input, disbursement::sync_commission(ctx, input).await);
    report.absorb("syndications", input, syndication::sync(ctx, input).await);
    report.absorb("paybacks", input, payback::sync(ctx, input).await);
    report
}

/// Write a funding's full set of one dependent type. On create an existing
/// set is left alone; on update the set is swapped atomically.
async fn write_set<T, D, S>(
    ctx: &SyncContext<D, S>,
    funding_id: Uuid,
    docs: Vec<T>,
    mode: FanoutMode,
) -> McaResult<usize>
where
    T: Document,
    D: DocumentStore,
    S: SourceRepository,
{
    match mode {
        FanoutMode::Create => {
            if !ctx.store.list_by_parent::<T>(funding_id).await?.is_empty() {
                tracing::debug!(
                    collection = T::COLLECTION,
                    funding_id = %funding_id,
                    "dependents already present, leaving them"
                );
                return Ok(0);
            }
            for doc in &docs {
                ctx.store.insert(doc).await?;
            }
        }
        FanoutMode::Update => ctx.store.replace_children(funding_id, &docs).await?,
    }
    Ok(docs.len())
}

/// [`write_set`] for an intent set and the records that point at its
/// intents. Both sets move together so no record is left referencing a
/// deleted intent.
async fn write_pair<A, B, D, S>(
    ctx: &SyncContext<D, S>,
    funding_id: Uuid,
    intents: Vec<A>,
    realized: Vec<B>,
    mode: FanoutMode,
) -> McaResult<usize>
where
    A: Document,
    B: Document,
    D: DocumentStore,
    S: SourceRepository,
{
    if mode == FanoutMode::Create {
        let has_intents = !ctx.store.list_by_parent::<A>(funding_id).await?.is_empty();
        let has_realized = !ctx.store.list_by_parent::<B>(funding_id).await?.is_empty();
        if has_intents || has_realized {
            tracing::debug!(
                collection = A::COLLECTION,
                funding_id = %funding_id,
                "dependents already present, leaving them"
            );
            return Ok(0);
        }
    }
    ctx.store
        .replace_children_pair(funding_id, &intents, &realized)
        .await?;
    Ok(intents.len() + realized.len())
}
