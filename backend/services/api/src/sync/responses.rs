use mca_db::source::models::{SyncCounts, SyncStatusEntry};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MarkForSyncResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub data: Vec<SyncStatusEntry>,
    pub count: usize,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub stats: SyncCounts,
}
