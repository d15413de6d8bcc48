//! /v1/actual_lrps handlers. Read-only.

use axum::extract::State;
use axum::Json;

use conductor_core::wire::ActualLrpResponse;

use super::{failed, ApiState, DomainQuery};
use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};

pub async fn list(
    State(state): State<ApiState>,
    ApiQuery(query): ApiQuery<DomainQuery>,
) -> Result<Json<Vec<ActualLrpResponse>>, ApiError> {
    let lrps = match query.domain().map_err(|e| failed("list-actual", e))? {
        Some(domain) => state.actual.list_by_domain(domain).await,
        None => state.actual.list().await,
    }
    .map_err(|e| failed("list-actual", e))?;

    Ok(Json(lrps.into_iter().map(ActualLrpResponse::from).collect()))
}

pub async fn list_by_process_guid(
    State(state): State<ApiState>,
    ApiPath(process_guid): ApiPath<String>,
) -> Result<Json<Vec<ActualLrpResponse>>, ApiError> {
    let lrps = state
        .actual
        .list_by_process_guid(&process_guid)
        .await
        .map_err(|e| failed("list-actual-by-guid", e))?;

    Ok(Json(lrps.into_iter().map(ActualLrpResponse::from).collect()))
}
