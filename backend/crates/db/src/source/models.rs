use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mca_common::error::{McaError, McaResult};

/// OrgMeter collections mirrored into the staging store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Lender,
    Iso,
    Merchant,
    User,
    Syndicator,
    SalesRep,
    Underwriter,
    Advance,
    Payment,
}

impl SourceKind {
    /// Declaration order, also the canonical run order.
    pub const ALL: [SourceKind; 9] = [
        Self::Lender,
        Self::Iso,
        Self::Merchant,
        Self::User,
        Self::Syndicator,
        Self::SalesRep,
        Self::Underwriter,
        Self::Advance,
        Self::Payment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lender => "lender",
            Self::Iso => "iso",
            Self::Merchant => "merchant",
            Self::User => "user",
            Self::Syndicator => "syndicator",
            Self::SalesRep => "sales_rep",
            Self::Underwriter => "underwriter",
            Self::Advance => "advance",
            Self::Payment => "payment",
        }
    }

    /// Human label used in progress callbacks and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lender => "Lender",
            Self::Iso => "ISO",
            Self::Merchant => "Merchant",
            Self::User => "User",
            Self::Syndicator => "Syndicator",
            Self::SalesRep => "Representative",
            Self::Underwriter => "Underwriter",
            Self::Advance => "Advance",
            Self::Payment => "Payment",
        }
    }

    /// Source kinds whose targets must exist before this kind can resolve
    /// its references.
    pub fn dependencies(&self) -> &'static [SourceKind] {
        match self {
            Self::Lender | Self::Iso | Self::Syndicator | Self::Underwriter => &[],
            Self::Merchant | Self::SalesRep => &[Self::Iso],
            Self::User => &[Self::Lender],
            Self::Advance => &[
                Self::Lender,
                Self::Iso,
                Self::Merchant,
                Self::User,
                Self::Syndicator,
                Self::SalesRep,
                Self::Underwriter,
            ],
            Self::Payment => &[Self::Advance],
        }
    }

    /// Payments only sync as part of their advance.
    pub fn is_standalone(&self) -> bool {
        !matches!(self, Self::Payment)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lender" | "lenders" => Ok(Self::Lender),
            "iso" | "isos" => Ok(Self::Iso),
            "merchant" | "merchants" => Ok(Self::Merchant),
            "user" | "users" => Ok(Self::User),
            "syndicator" | "syndicators" => Ok(Self::Syndicator),
            "sales_rep" | "salesrep" | "representative" | "representatives" => {
                Ok(Self::SalesRep)
            }
            "underwriter" | "underwriters" => Ok(Self::Underwriter),
            "advance" | "advances" | "funding" | "fundings" => Ok(Self::Advance),
            "payment" | "payments" => Ok(Self::Payment),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// Provenance written once by the import step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportMetadata {
    pub source: String,
    pub imported_at: DateTime<Utc>,
    pub imported_by: String,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_updated_by: Option<String>,
}

impl ImportMetadata {
    pub fn orgmeter(imported_by: &str) -> Self {
        Self {
            source: "orgmeter".to_string(),
            imported_at: Utc::now(),
            imported_by: imported_by.to_string(),
            last_updated_at: None,
            last_updated_by: None,
        }
    }
}

/// Mutable bookkeeping. The sync engine writes `last_synced_*` and `sync_id`;
/// `needs_sync` is owned by the mark-for-sync action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncMetadata {
    pub needs_sync: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_synced_by: Option<String>,
    pub sync_id: Option<Uuid>,
}

impl SyncMetadata {
    pub fn status(&self) -> SyncStatusKind {
        if !self.needs_sync {
            SyncStatusKind::Ignored
        } else if self.last_synced_at.is_some() {
            SyncStatusKind::Synced
        } else {
            SyncStatusKind::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub kind: SourceKind,
    pub id: i64,
    pub funder_id: Uuid,
    pub display_name: Option<String>,
    pub payload: serde_json::Value,
    pub import_metadata: ImportMetadata,
    pub sync_metadata: SyncMetadata,
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn new(kind: SourceKind, id: i64, funder_id: Uuid, payload: serde_json::Value) -> Self {
        let display_name = payload
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            kind,
            id,
            funder_id,
            display_name,
            payload,
            import_metadata: ImportMetadata::orgmeter("system"),
            sync_metadata: SyncMetadata::default(),
            deleted: false,
            updated_at: Utc::now(),
        }
    }

    /// Decode the OrgMeter payload into its typed shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> McaResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            McaError::Validation(format!(
                "malformed {} payload for source id {}: {e}",
                self.kind, self.id
            ))
        })
    }

    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{} #{}", self.kind.label(), self.id))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatusKind {
    #[default]
    All,
    Selected,
    Pending,
    Synced,
    Ignored,
}

impl SyncStatusKind {
    pub fn matches(&self, meta: &SyncMetadata) -> bool {
        match self {
            Self::All => true,
            Self::Selected => meta.needs_sync,
            other => meta.status() == *other,
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatusFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sync_status: Option<SyncStatusKind>,
}

impl SyncStatusFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Case-insensitive name match, or exact match on the numeric id.
    pub fn matches_search(&self, record: &SourceRecord) -> bool {
        let Some(term) = self.search_term() else {
            return true;
        };
        if term.parse::<i64>().ok() == Some(record.id) {
            return true;
        }
        record
            .display_name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&term.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusEntry {
    pub id: i64,
    pub display_name: Option<String>,
    pub status: SyncStatusKind,
    pub needs_sync: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_synced_by: Option<String>,
    pub sync_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SourceRecord> for SyncStatusEntry {
    fn from(record: &SourceRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name.clone(),
            status: record.sync_metadata.status(),
            needs_sync: record.sync_metadata.needs_sync,
            last_synced_at: record.sync_metadata.last_synced_at,
            last_synced_by: record.sync_metadata.last_synced_by.clone(),
            sync_id: record.sync_metadata.sync_id,
            updated_at: record.updated_at,
        }
    }
}

/// Aggregate counts over the whole funder scope, independent of paging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub total: i64,
    pub selected: i64,
    pub pending: i64,
    pub synced: i64,
    pub ignored: i64,
}

impl SyncCounts {
    pub fn from_parts(total: i64, selected: i64, synced: i64) -> Self {
        Self {
            total,
            selected,
            pending: selected - synced,
            synced,
            ignored: total - selected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusPage {
    pub entries: Vec<SyncStatusEntry>,
    pub total_matching: i64,
    pub counts: SyncCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("ISOs".parse::<SourceKind>().unwrap(), SourceKind::Iso);
        assert_eq!(
            "representative".parse::<SourceKind>().unwrap(),
            SourceKind::SalesRep
        );
        assert_eq!("funding".parse::<SourceKind>().unwrap(), SourceKind::Advance);
        assert!("widget".parse::<SourceKind>().is_err());
    }

    #[test]
    fn kind_round_trips_through_as_str() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn metadata_status_classification() {
        let mut meta = SyncMetadata::default();
        assert_eq!(meta.status(), SyncStatusKind::Ignored);
        meta.needs_sync = true;
        assert_eq!(meta.status(), SyncStatusKind::Pending);
        meta.last_synced_at = Some(Utc::now());
        assert_eq!(meta.status(), SyncStatusKind::Synced);
        assert!(SyncStatusKind::Selected.matches(&meta));
        assert!(!SyncStatusKind::Pending.matches(&meta));
    }

    #[test]
    fn counts_derive_pending_and_ignored() {
        let counts = SyncCounts::from_parts(10, 6, 4);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.ignored, 4);
    }

    #[test]
    fn filter_defaults_and_clamps() {
        let filter = SyncStatusFilter::default();
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(filter.offset(), 0);

        let filter = SyncStatusFilter {
            page: Some(3),
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(filter.limit(), MAX_PAGE_LIMIT);
        assert_eq!(filter.offset(), 400);
    }

    #[test]
    fn search_matches_name_or_id() {
        let record = SourceRecord::new(
            SourceKind::Iso,
            42,
            Uuid::new_v4(),
            serde_json::json!({ "name": "Blue Harbor Capital" }),
        );
        let by_name = SyncStatusFilter {
            search: Some("harbor".to_string()),
            ..Default::default()
        };
        let by_id = SyncStatusFilter {
            search: Some("42".to_string()),
            ..Default::default()
        };
        let miss = SyncStatusFilter {
            search: Some("acme".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches_search(&record));
        assert!(by_id.matches_search(&record));
        assert!(!miss.matches_search(&record));
    }

    #[test]
    fn label_falls_back_to_kind_and_id() {
        let record = SourceRecord::new(
            SourceKind::Payment,
            7,
            Uuid::new_v4(),
            serde_json::json!({}),
        );
        assert_eq!(record.label(), "Payment #7");
    }
}
