use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{Funding, Payback};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::SourceRecord;
use mca_db::source::payloads::{SourcePayment, TextValue};
use mca_db::source::repositories::SourceRepository;
use mca_transform::dates::parse_optional_date;
use mca_transform::money::cents_or_zero;
use mca_transform::payback::{payback_note, payback_status};

use super::{FanoutInput, FanoutMode};
use crate::engine::SyncContext;

/// Paybacks for the advance's `advance_payback` payments. Each payment is
/// matched to its payback by the payment's sync id, else by due date and
/// amount, and is stamped with the payback id afterwards.
pub(super) async fn sync<D, S>(ctx: &SyncContext<D, S>, input: &FanoutInput<'_>) -> McaResult<usize>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let funding = input.funding;
    let payments = ctx
        .source
        .list_payments_for_advance(funding.funder_id, input.record.id)
        .await?;
    if payments.is_empty() {
        return Ok(0);
    }

    let mut existing: Vec<Payback> = ctx.store.list_by_parent(funding.id).await?;
    let mut written = 0;
    for record in &payments {
        match sync_payment(ctx, funding, record, &mut existing, input.mode).await {
            Ok(true) => written += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(
                payment_id = record.id,
                funding_id = %funding.id,
                error = %e,
                "failed to sync payback"
            ),
        }
    }
    Ok(written)
}

/// Returns whether a payback was written.
async fn sync_payment<D, S>(
    ctx: &SyncContext<D, S>,
    funding: &Funding,
    record: &SourceRecord,
    existing: &mut Vec<Payback>,
    mode: FanoutMode,
) -> McaResult<bool>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let payment: SourcePayment = record.payload_as()?;
    if !payment.is_advance_payback() {
        return Ok(false);
    }
    let Some(due_date) = parse_optional_date(payment.due_date.as_deref()) else {
        tracing::warn!(payment_id = record.id, "payment has no due date, skipping");
        return Ok(false);
    };
    let amount = cents_or_zero(TextValue::opt(payment.amount.as_ref()))?;

    let matched = existing
        .iter()
        .position(|p| record.sync_metadata.sync_id == Some(p.id))
        .or_else(|| {
            existing
                .iter()
                .position(|p| p.due_date == due_date && p.amount == amount)
        });

    let now = Utc::now();
    let incoming = Payback {
        id: Uuid::new_v4(),
        funder_id: funding.funder_id,
        funding_id: funding.id,
        due_date,
        amount,
        status: payback_status(&payment),
        paid_date: parse_optional_date(payment.paid_date.as_deref()),
        note: payback_note(&payment.notes),
        orgmeter_payment_id: Some(record.id),
        created_at: now,
        updated_at: now,
    };

    let (payback_id, written) = match matched {
        Some(index) if mode == FanoutMode::Create => (existing[index].id, false),
        Some(index) => {
            let current = &existing[index];
            let updated = Payback {
                id: current.id,
                created_at: current.created_at,
                updated_at: current.updated_at,
                ..incoming
            };
            if updated == *current {
                (current.id, false)
            } else {
                let updated = Payback {
                    updated_at: now,
                    ..updated
                };
                ctx.store.update(&updated).await?;
                existing[index] = updated;
                (existing[index].id, true)
            }
        }
        None => {
            ctx.store.insert(&incoming).await?;
            let id = incoming.id;
            existing.push(incoming);
            (id, true)
        }
    };

    ctx.bookkeeper().record(record, Some(payback_id)).await;
    Ok(written)
}
