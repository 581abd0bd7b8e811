use axum::extract::{Path, Query, State};
use axum::Json;
use mca_common::error::McaError;
use mca_db::source::models::{SourceKind, SyncStatusFilter};

use crate::error::ApiError;
use crate::extractors::FunderId;
use crate::sync::requests::{MarkForSyncRequest, SyncStatusQuery};
use crate::sync::responses::{MarkForSyncResponse, SyncStatusResponse};
use crate::AppState;

fn parse_entity(raw: &str) -> Result<SourceKind, ApiError> {
    raw.parse::<SourceKind>()
        .map_err(|e| ApiError(McaError::Validation(e)))
}

pub async fn mark_for_sync(
    State(state): State<AppState>,
    FunderId(funder): FunderId,
    Path(entity): Path<String>,
    Json(body): Json<MarkForSyncRequest>,
) -> Result<Json<MarkForSyncResponse>, ApiError> {
    let kind = parse_entity(&entity)?;
    if body.source_ids.is_empty() {
        return Err(ApiError(McaError::Validation(
            "source_ids must not be empty".to_string(),
        )));
    }

    let updated = state
        .source
        .mark_for_sync(kind, funder, &body.source_ids)
        .await?;
    tracing::info!(
        entity = %kind,
        funder_id = %funder,
        requested = body.source_ids.len(),
        updated,
        "records marked for sync"
    );
    Ok(Json(MarkForSyncResponse { updated }))
}

pub async fn sync_status(
    State(state): State<AppState>,
    FunderId(funder): FunderId,
    Path(entity): Path<String>,
    Query(query): Query<SyncStatusQuery>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let kind = parse_entity(&entity)?;
    let filter = SyncStatusFilter::try_from(query)?;

    let page = state.source.sync_status(kind, funder, &filter).await?;
    Ok(Json(SyncStatusResponse {
        count: page.entries.len(),
        data: page.entries,
        total: page.total_matching,
        page: filter.page(),
        limit: filter.limit(),
        stats: page.counts,
    }))
}
