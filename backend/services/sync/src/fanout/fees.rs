use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{ExpenseType, FeeType, FundingExpense, FundingFee};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::payloads::{SourceFundingTerms, TextValue};
use mca_db::source::repositories::SourceRepository;
use mca_transform::money::cents_or_zero;

use super::{write_set, FanoutInput};
use crate::engine::SyncContext;
use crate::status::lookup_type;

/// Named line items carried on the advance's funding terms.
type LineItem = (&'static str, fn(&SourceFundingTerms) -> Option<&TextValue>);

const FEE_ITEMS: [LineItem; 2] = [
    ("Bank Fee", bank_fee),
    ("Merchant Application Fee", merchant_application_fee),
];

const EXPENSE_ITEMS: [LineItem; 2] = [
    ("ISO Commission", iso_commission),
    ("ISO Application Fee", iso_application_fee),
];

fn bank_fee(terms: &SourceFundingTerms) -> Option<&TextValue> {
    terms.bank_fee.as_ref()
}

fn merchant_application_fee(terms: &SourceFundingTerms) -> Option<&TextValue> {
    terms.merchant_application_fee.as_ref()
}

fn iso_commission(terms: &SourceFundingTerms) -> Option<&TextValue> {
    terms.iso_commission.as_ref()
}

fn iso_application_fee(terms: &SourceFundingTerms) -> Option<&TextValue> {
    terms.iso_application_fee.as_ref()
}

/// Positive line items as `(name, cents)`.
fn line_items(terms: &SourceFundingTerms, items: &[LineItem]) -> McaResult<Vec<(&'static str, i64)>> {
    let mut out = Vec::new();
    for (name, field) in items {
        let amount = cents_or_zero(TextValue::opt(field(terms)))?;
        if amount > 0 {
            out.push((*name, amount));
        }
    }
    Ok(out)
}

pub(super) async fn sync_fees<D, S>(ctx: &SyncContext<D, S>, input: &FanoutInput<'_>) -> McaResult<usize>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let funding = input.funding;
    let now = Utc::now();
    let mut fees = Vec::new();
    for (name, amount) in line_items(&input.terms(), &FEE_ITEMS)? {
        fees.push(FundingFee {
            id: Uuid::new_v4(),
            funder_id: funding.funder_id,
            funding_id: funding.id,
            fee_type_id: lookup_type::<FeeType, _>(&ctx.store, funding.funder_id, name).await?,
            name: name.to_string(),
            amount,
            created_at: now,
        });
    }
    write_set(ctx, funding.id, fees, input.mode).await
}

pub(super) async fn sync_expenses<D, S>(
    ctx: &SyncContext<D, S>,
    input: &FanoutInput<'_>,
) -> McaResult<usize>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let funding = input.funding;
    let now = Utc::now();
    let mut expenses = Vec::new();
    for (name, amount) in line_items(&input.terms(), &EXPENSE_ITEMS)? {
        expenses.push(FundingExpense {
            id: Uuid::new_v4(),
            funder_id: funding.funder_id,
            funding_id: funding.id,
            expense_type_id: lookup_type::<ExpenseType, _>(&ctx.store, funding.funder_id, name)
                .await?,
            name: name.to_string(),
            amount,
            iso: funding.iso.clone(),
            created_at: now,
        });
    }
    write_set(ctx, funding.id, expenses, input.mode).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::testing::funding;
    use crate::fanout::FanoutMode;
    use crate::syncers::testing::context;
    use mca_db::source::models::{SourceKind, SourceRecord};
    use mca_db::source::payloads::SourceAdvance;
    use serde_json::json;

    fn advance(terms: serde_json::Value) -> SourceAdvance {
        serde_json::from_value(json!({ "funding": terms })).unwrap()
    }

    #[tokio::test]
    async fn fees_resolve_types_case_insensitively() {
        let ctx = context().await;
        let bank_fee = FeeType {
            id: Uuid::new_v4(),
            funder_id: ctx.funder_id,
            name: "bank fee".to_string(),
        };
        ctx.store.insert(&bank_fee).await.unwrap();

        let funding = funding(ctx.funder_id);
        let record = SourceRecord::new(SourceKind::Advance, 100, ctx.funder_id, json!({}));
        let advance = advance(json!({
            "bank_fee": "25.00",
            "merchant_application_fee": 499,
            "iso_commission": "0"
        }));
        let input = FanoutInput {
            record: &record,
            advance: &advance,
            funding: &funding,
            mode: FanoutMode::Create,
        };

        assert_eq!(sync_fees(&*ctx, &input).await.unwrap(), 2);
        assert_eq!(sync_expenses(&*ctx, &input).await.unwrap(), 0);

        let fees: Vec<FundingFee> = ctx.store.list_by_parent(funding.id).await.unwrap();
        let bank = fees.iter().find(|f| f.name == "Bank Fee").unwrap();
        assert_eq!(bank.amount, 2_500);
        assert_eq!(bank.fee_type_id, Some(bank_fee.id));
        let app = fees.iter().find(|f| f.name == "Merchant Application Fee").unwrap();
        assert_eq!(app.amount, 49_900);
        assert_eq!(app.fee_type_id, None);
    }

    #[tokio::test]
    async fn update_replaces_the_expense_set() {
        let ctx = context().await;
        let funding = funding(ctx.funder_id);
        let record = SourceRecord::new(SourceKind::Advance, 100, ctx.funder_id, json!({}));

        let first = advance(json!({ "iso_commission": "1000", "iso_application_fee": "150" }));
        let input = FanoutInput {
            record: &record,
            advance: &first,
            funding: &funding,
            mode: FanoutMode::Create,
        };
        sync_expenses(&*ctx, &input).await.unwrap();

        let second = advance(json!({ "iso_commission": "1200" }));
        let input = FanoutInput {
            record: &record,
            advance: &second,
            funding: &funding,
            mode: FanoutMode::Update,
        };
        assert_eq!(sync_expenses(&*ctx, &input).await.unwrap(), 1);

        let expenses: Vec<FundingExpense> = ctx.store.list_by_parent(funding.id).await.unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].amount, 120_000);
        assert_eq!(expenses[0].iso, funding.iso);
    }

    #[tokio::test]
    async fn malformed_amount_is_an_error() {
        let ctx = context().await;
        let funding = funding(ctx.funder_id);
        let record = SourceRecord::new(SourceKind::Advance, 100, ctx.funder_id, json!({}));
        let advance = advance(json!({ "bank_fee": "twenty" }));
        let input = FanoutInput {
            record: &record,
            advance: &advance,
            funding: &funding,
            mode: FanoutMode::Create,
        };
        assert!(sync_fees(&*ctx, &input).await.is_err());
    }
}
