use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crm::document::{normalized, plain_document, Document};

/// Denormalized display snapshot of a referenced record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedRef {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

// ── Tenancy and lookups ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Funder {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document for Funder {
    const COLLECTION: &'static str = "funders";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundingStatus {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub initial: bool,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeType {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseType {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
}

macro_rules! named_lookup {
    ($ty:ty, $collection:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> Uuid {
                self.id
            }

            fn funder_id(&self) -> Uuid {
                self.funder_id
            }

            fn name_key(&self) -> Option<String> {
                normalized(Some(&self.name))
            }
        }
    };
}

named_lookup!(FundingStatus, "funding_statuses");
named_lookup!(FeeType, "fee_types");
named_lookup!(ExpenseType, "expense_types");

// ── Parties ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Iso {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<Address>,
    pub contact_name: Option<String>,
    pub orgmeter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Iso {
    const COLLECTION: &'static str = "isos";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.funder_id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.name))
    }

    fn email_key(&self) -> Option<String> {
        normalized(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Merchant {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
    pub dba_name: Option<String>,
    pub ein: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
    pub address: Option<Address>,
    pub contact_name: Option<String>,
    pub orgmeter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Merchant {
    const COLLECTION: &'static str = "merchants";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.funder_id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.name))
    }

    fn email_key(&self) -> Option<String> {
        normalized(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lender {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
    pub internal: bool,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub orgmeter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Lender {
    const COLLECTION: &'static str = "lenders";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.funder_id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.name))
    }

    fn email_key(&self) -> Option<String> {
        normalized(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Syndicator {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub orgmeter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Syndicator {
    const COLLECTION: &'static str = "syndicators";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.funder_id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.name))
    }

    fn email_key(&self) -> Option<String> {
        normalized(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    FunderUser,
    LenderUser,
    IsoUser,
    Underwriter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmUser {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub inactive: bool,
    pub orgmeter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrmUser {
    pub fn full_name(&self) -> String {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

impl Document for CrmUser {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.funder_id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.full_name()))
    }

    fn email_key(&self) -> Option<String> {
        normalized(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Representative {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub orgmeter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Representative {
    pub fn full_name(&self) -> String {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

impl Document for Representative {
    const COLLECTION: &'static str = "representatives";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.funder_id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.full_name()))
    }

    fn email_key(&self) -> Option<String> {
        normalized(self.email.as_deref())
    }
}

/// "First Last", skipping missing parts.
pub fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Join records ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsoFunder {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub iso_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchantFunder {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub merchant_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsoMerchant {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub merchant_id: Uuid,
    pub iso_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyndicatorFunder {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub syndicator_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserFunder {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserLender {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub user_id: Uuid,
    pub lender_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepresentativeIso {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub representative_id: Uuid,
    pub iso_id: Uuid,
}

plain_document!(IsoFunder, "iso_funders", parent = iso_id);
plain_document!(MerchantFunder, "merchant_funders", parent = merchant_id);
plain_document!(IsoMerchant, "iso_merchants", parent = merchant_id);
plain_document!(SyndicatorFunder, "syndicator_funders", parent = syndicator_id);
plain_document!(UserFunder, "user_funders", parent = user_id);
plain_document!(UserLender, "user_lenders", parent = user_id);
plain_document!(RepresentativeIso, "representative_isos", parent = representative_id);

// ── Funding and its dependents ──────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundingType {
    #[default]
    New,
    Renewal,
    Refinance,
    Buyout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Funding {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub name: String,
    pub funding_type: FundingType,
    pub status: Option<EmbeddedRef>,
    pub merchant: Option<EmbeddedRef>,
    pub iso: Option<EmbeddedRef>,
    pub lender: Option<EmbeddedRef>,
    pub underwriter: Option<EmbeddedRef>,
    pub sales_rep: Option<EmbeddedRef>,
    /// Principal, in cents.
    pub funded_amount: i64,
    pub payback_amount: i64,
    pub commission_amount: i64,
    pub factor_rate: Option<Decimal>,
    pub funded_date: Option<NaiveDate>,
    /// Append-only: unioned on update, never replaced.
    #[serde(default)]
    pub followers: Vec<Uuid>,
    pub orgmeter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Funding {
    const COLLECTION: &'static str = "fundings";

    fn id(&self) -> Uuid {
        self.id
    }

    fn funder_id(&self) -> Uuid {
        self.funder_id
    }

    fn name_key(&self) -> Option<String> {
        normalized(Some(&self.name))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaybackFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaybackPlan {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub frequency: PaybackFrequency,
    /// Weekday numbers (0 = Sunday) for daily/weekly plans, day of month
    /// for monthly plans.
    pub payday_list: Vec<u8>,
    pub payment_amount: i64,
    pub total_amount: i64,
    pub start_date: Option<NaiveDate>,
    pub avoid_holiday: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundingFee {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub fee_type_id: Option<Uuid>,
    pub name: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundingExpense {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub expense_type_id: Option<Uuid>,
    pub name: String,
    pub amount: i64,
    pub iso: Option<EmbeddedRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Scheduled,
    Succeed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisbursementIntent {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub merchant: Option<EmbeddedRef>,
    pub amount: i64,
    pub status: IntentStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disbursement {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub intent_id: Uuid,
    pub amount: i64,
    pub status: IntentStatus,
    pub disbursed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionIntent {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub iso: Option<EmbeddedRef>,
    pub amount: i64,
    pub status: IntentStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commission {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub intent_id: Uuid,
    pub iso: Option<EmbeddedRef>,
    pub amount: i64,
    pub status: IntentStatus,
    pub paid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Syndication {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub syndicator: EmbeddedRef,
    pub amount: i64,
    pub percent: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaybackStatus {
    #[default]
    Submitted,
    Paid,
    Bounced,
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payback {
    pub id: Uuid,
    pub funder_id: Uuid,
    pub funding_id: Uuid,
    pub due_date: NaiveDate,
    pub amount: i64,
    pub status: PaybackStatus,
    pub paid_date: Option<NaiveDate>,
    pub note: Option<String>,
    pub orgmeter_payment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

plain_document!(PaybackPlan, "payback_plans", parent = funding_id);
plain_document!(FundingFee, "funding_fees", parent = funding_id);
plain_document!(FundingExpense, "funding_expenses", parent = funding_id);
plain_document!(DisbursementIntent, "disbursement_intents", parent = funding_id);
plain_document!(Disbursement, "disbursements", parent = funding_id);
plain_document!(CommissionIntent, "commission_intents", parent = funding_id);
plain_document!(Commission, "commissions", parent = funding_id);
plain_document!(Syndication, "syndications", parent = funding_id);
plain_document!(Payback, "paybacks", parent = funding_id);
