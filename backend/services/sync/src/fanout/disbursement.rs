use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{
    Commission, CommissionIntent, Disbursement, DisbursementIntent, IntentStatus,
};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::payloads::TextValue;
use mca_db::source::repositories::SourceRepository;
use mca_transform::disbursement::{commission_intent_status, disbursement_amount};
use mca_transform::money::{cents_or_zero, optional_cents};

use super::{write_pair, FanoutInput};
use crate::engine::SyncContext;

/// Net funding sent to the merchant: one settled intent and its
/// disbursement. Nothing when fees consume the principal.
pub(super) async fn sync_disbursement<D, S>(
    ctx: &SyncContext<D, S>,
    input: &FanoutInput<'_>,
) -> McaResult<usize>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let funding = input.funding;
    let terms = input.terms();
    let amount = disbursement_amount(
        funding.funded_amount,
        cents_or_zero(TextValue::opt(terms.bank_fee.as_ref()))?,
        cents_or_zero(TextValue::opt(terms.merchant_application_fee.as_ref()))?,
    );

    let now = Utc::now();
    let (intents, disbursements) = match amount {
        Some(amount) => {
            let intent = DisbursementIntent {
                id: Uuid::new_v4(),
                funder_id: funding.funder_id,
                funding_id: funding.id,
                merchant: funding.merchant.clone(),
                amount,
                status: IntentStatus::Succeed,
                scheduled_date: funding.funded_date,
                created_at: now,
            };
            let disbursement = Disbursement {
                id: Uuid::new_v4(),
                funder_id: funding.funder_id,
                funding_id: funding.id,
                intent_id: intent.id,
                amount,
                status: IntentStatus::Succeed,
                disbursed_date: funding.funded_date,
                created_at: now,
            };
            (vec![intent], vec![disbursement])
        }
        None => {
            tracing::debug!(
                source_id = input.record.id,
                "disbursement amount is not positive, skipping"
            );
            (Vec::new(), Vec::new())
        }
    };

    write_pair(ctx, funding.id, intents, disbursements, input.mode).await
}

/// ISO origination commission: an intent, settled once the advance is
/// funded, and the realized commission for a settled intent.
pub(super) async fn sync_commission<D, S>(
    ctx: &SyncContext<D, S>,
    input: &FanoutInput<'_>,
) -> McaResult<usize>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let funding = input.funding;
    let terms = input.terms();
    let amount = optional_cents(TextValue::opt(terms.iso_origination_commission.as_ref()))?
        .filter(|cents| *cents > 0);

    let now = Utc::now();
    let mut intents = Vec::new();
    let mut commissions = Vec::new();
    if let Some(amount) = amount {
        let status = commission_intent_status(funding.funded_date.is_some());
        let intent = CommissionIntent {
            id: Uuid::new_v4(),
            funder_id: funding.funder_id,
            funding_id: funding.id,
            iso: funding.iso.clone(),
            amount,
            status,
            scheduled_date: funding.funded_date,
            created_at: now,
        };
        if status == IntentStatus::Succeed {
            commissions.push(Commission {
                id: Uuid::new_v4(),
                funder_id: funding.funder_id,
                funding_id: funding.id,
                intent_id: intent.id,
                iso: funding.iso.clone(),
                amount,
                status,
                paid_date: funding.funded_date,
                created_at: now,
            });
        }
        intents.push(intent);
    }

    write_pair(ctx, funding.id, intents, commissions, input.mode).await
}
