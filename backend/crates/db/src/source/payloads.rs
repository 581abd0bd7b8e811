//! Typed shapes of the OrgMeter payloads stored on [`SourceRecord`].
//!
//! OrgMeter is loose about scalar types (amounts arrive as strings or
//! numbers, references as ids, numeric strings or embedded objects), so the
//! leaf types here accept every observed shape and normalize it once.

use serde::{Deserialize, Deserializer};

use crate::source::models::{SourceKind, SourceRecord};

/// A scalar that OrgMeter sends either as a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextValue(pub String);

impl TextValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow an optional value as text.
    pub fn opt(value: Option<&TextValue>) -> Option<&str> {
        value.map(TextValue::as_str)
    }
}

impl<'de> Deserialize<'de> for TextValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
            Flag(bool),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
            Raw::Flag(b) => Self(b.to_string()),
        })
    }
}

/// Reference from one source record to another.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawSourceRef")]
pub enum SourceRef {
    Id(i64),
    Text(String),
    Embedded {
        id: Option<TextValue>,
        name: Option<String>,
    },
    Record {
        kind: SourceKind,
        id: i64,
    },
}

impl SourceRef {
    /// The referenced OrgMeter id, when the reference carries a usable one.
    pub fn numeric_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) | Self::Record { id, .. } => Some(*id),
            Self::Text(text) => parse_id(text),
            Self::Embedded { id, .. } => id.as_ref().and_then(|v| parse_id(v.as_str())),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Embedded { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

impl From<&SourceRecord> for SourceRef {
    fn from(record: &SourceRecord) -> Self {
        Self::Record {
            kind: record.kind,
            id: record.id,
        }
    }
}

fn parse_id(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        // "12.0" from float-typed exports
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSourceRef {
    Id(i64),
    Value(TextValue),
    Embedded {
        id: Option<TextValue>,
        name: Option<String>,
    },
}

impl From<RawSourceRef> for SourceRef {
    fn from(raw: RawSourceRef) -> Self {
        match raw {
            RawSourceRef::Id(id) => Self::Id(id),
            RawSourceRef::Value(value) => Self::Text(value.0),
            RawSourceRef::Embedded { id, name } => Self::Embedded { id, name },
        }
    }
}

// ── Contact blocks ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceAddress {
    #[serde(default)]
    pub primary: bool,
    #[serde(alias = "address1", alias = "line1")]
    pub street: Option<String>,
    #[serde(alias = "address2", alias = "line2")]
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(alias = "zip_code", alias = "postal_code")]
    pub zip: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceContact {
    #[serde(default)]
    pub primary: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// ── Parties ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SourceLender {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub lender_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub addresses: Vec<SourceAddress>,
    #[serde(default)]
    pub contacts: Vec<SourceContact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceIso {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub addresses: Vec<SourceAddress>,
    #[serde(default)]
    pub contacts: Vec<SourceContact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceMerchant {
    pub name: Option<String>,
    #[serde(alias = "dba")]
    pub dba_name: Option<String>,
    #[serde(alias = "federal_tax_id")]
    pub ein: Option<String>,
    pub industry: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub iso: Option<SourceRef>,
    #[serde(default)]
    pub addresses: Vec<SourceAddress>,
    #[serde(default)]
    pub contacts: Vec<SourceContact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSyndicator {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub addresses: Vec<SourceAddress>,
}

/// The organization a user belongs to on the OrgMeter side.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceUserEntity {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub id: Option<SourceRef>,
    pub name: Option<String>,
}

impl SourceUserEntity {
    pub fn is(&self, entity_type: &str) -> bool {
        self.entity_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(entity_type))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub inactive: bool,
    pub entity: Option<SourceUserEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSalesRep {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub isos: Vec<SourceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceUnderwriter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub inactive: bool,
}

// ── Advances and payments ───────────────────────────────────────

/// Money terms of an advance. Amounts are dollar decimals.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFundingTerms {
    #[serde(alias = "funded_amount", alias = "principal")]
    pub principal_amount: Option<TextValue>,
    pub payback_amount: Option<TextValue>,
    pub factor_rate: Option<TextValue>,
    pub bank_fee: Option<TextValue>,
    pub merchant_application_fee: Option<TextValue>,
    pub iso_commission: Option<TextValue>,
    pub iso_application_fee: Option<TextValue>,
    pub iso_origination_commission: Option<TextValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceCollection {
    pub frequency: Option<String>,
    pub daily_type: Option<String>,
    #[serde(default)]
    pub custom_days: Vec<TextValue>,
    pub weekly_day: Option<TextValue>,
    pub monthly_day: Option<TextValue>,
    pub payment_amount: Option<TextValue>,
    pub start_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceParticipation {
    pub syndicator: Option<SourceRef>,
    pub amount: Option<TextValue>,
    pub percent: Option<TextValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceAdvance {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub advance_type: Option<String>,
    pub status: Option<String>,
    pub merchant: Option<SourceRef>,
    pub iso: Option<SourceRef>,
    pub lender: Option<SourceRef>,
    pub underwriter: Option<SourceRef>,
    pub sales_rep: Option<SourceRef>,
    pub funded_date: Option<String>,
    pub funding: Option<SourceFundingTerms>,
    pub collection: Option<SourceCollection>,
    #[serde(default)]
    pub participations: Vec<SourceParticipation>,
    #[serde(default)]
    pub followers: Vec<SourceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceNote {
    #[serde(alias = "author_name")]
    pub author: Option<String>,
    #[serde(alias = "body", alias = "note")]
    pub text: Option<String>,
    #[serde(alias = "created_at")]
    pub date: Option<String>,
}

pub const ADVANCE_PAYBACK: &str = "advance_payback";

#[derive(Debug, Clone, Deserialize)]
pub struct SourcePayment {
    pub advance: Option<SourceRef>,
    #[serde(rename = "type")]
    pub payment_type: Option<String>,
    #[serde(alias = "date")]
    pub due_date: Option<String>,
    pub amount: Option<TextValue>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub bounced: bool,
    #[serde(default)]
    pub ignored: bool,
    pub paid_date: Option<String>,
    #[serde(default)]
    pub notes: Vec<SourceNote>,
}

impl SourcePayment {
    pub fn is_advance_payback(&self) -> bool {
        self.payment_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(ADVANCE_PAYBACK))
    }
}
