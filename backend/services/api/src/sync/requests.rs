use mca_common::error::McaError;
use mca_db::source::models::{SyncStatusFilter, SyncStatusKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MarkForSyncRequest {
    #[serde(default)]
    pub source_ids: Vec<i64>,
}

/// Query string of the status listing. `sync_status` stays a string here so
/// an unknown value comes back as a JSON validation error.
#[derive(Debug, Default, Deserialize)]
pub struct SyncStatusQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sync_status: Option<String>,
}

impl TryFrom<SyncStatusQuery> for SyncStatusFilter {
    type Error = McaError;

    fn try_from(query: SyncStatusQuery) -> Result<Self, Self::Error> {
        let sync_status = match query.sync_status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_status(raw)?),
        };
        Ok(SyncStatusFilter {
            page: query.page,
            limit: query.limit,
            search: query.search,
            sync_status,
        })
    }
}

fn parse_status(raw: &str) -> Result<SyncStatusKind, McaError> {
    match raw.to_ascii_lowercase().as_str() {
        "all" => Ok(SyncStatusKind::All),
        "selected" => Ok(SyncStatusKind::Selected),
        "pending" => Ok(SyncStatusKind::Pending),
        "synced" => Ok(SyncStatusKind::Synced),
        "ignored" => Ok(SyncStatusKind::Ignored),
        other => Err(McaError::Validation(format!(
            "invalid sync_status: {other} (expected all, selected, pending, synced or ignored)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_status_means_no_filter() {
        let filter = SyncStatusFilter::try_from(SyncStatusQuery {
            sync_status: Some(" ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.sync_status, None);
    }

    #[test]
    fn status_is_case_insensitive() {
        let filter = SyncStatusFilter::try_from(SyncStatusQuery {
            sync_status: Some("Pending".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(filter.sync_status, Some(SyncStatusKind::Pending));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = SyncStatusFilter::try_from(SyncStatusQuery {
            sync_status: Some("stale".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(McaError::Validation(_))));
    }
}
