//! /v1/desired_lrps handlers.
//!
//! Bodies arrive as raw bytes and are decoded here so a malformed payload
//! reports `InvalidJSON` with the decoder's message. The guid-less routes
//! (`/v1/desired_lrps/`) exist so a missing guid is answered with
//! `InvalidRequest` instead of a bare 404.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use conductor_core::wire::{DesiredLrpCreateRequest, DesiredLrpResponse, DesiredLrpUpdateRequest};
use conductor_services::ServiceError;

use super::{failed, ApiState, DomainQuery};
use crate::error::ApiError;
use crate::extract::{ApiPath, ApiQuery};

// ── /v1/desired_lrps (POST) ───────────────────────────────────────────────────

pub async fn create(State(state): State<ApiState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let req: DesiredLrpCreateRequest =
        serde_json::from_slice(&body).map_err(|e| failed("create", ApiError::invalid_json(e)))?;
    state
        .desired
        .create(req.into())
        .await
        .map_err(|e| failed("create", e))?;
    Ok(StatusCode::CREATED)
}

// ── /v1/desired_lrps (GET) ────────────────────────────────────────────────────

pub async fn list(
    State(state): State<ApiState>,
    ApiQuery(query): ApiQuery<DomainQuery>,
) -> Result<Json<Vec<DesiredLrpResponse>>, ApiError> {
    let lrps = match query.domain().map_err(|e| failed("list", e))? {
        Some(domain) => state.desired.list_by_domain(domain).await,
        None => state.desired.list().await,
    }
    .map_err(|e| failed("list", e))?;

    Ok(Json(lrps.into_iter().map(DesiredLrpResponse::from).collect()))
}

// ── /v1/desired_lrps/{process_guid} ──────────────────────────────────────────

pub async fn get(
    State(state): State<ApiState>,
    ApiPath(process_guid): ApiPath<String>,
) -> Result<Json<DesiredLrpResponse>, ApiError> {
    get_by_guid(state, &process_guid).await
}

pub async fn update(
    State(state): State<ApiState>,
    ApiPath(process_guid): ApiPath<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    update_by_guid(state, &process_guid, body).await
}

pub async fn delete(
    State(state): State<ApiState>,
    ApiPath(process_guid): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    delete_by_guid(state, &process_guid).await
}

// ── /v1/desired_lrps/ (no guid) ──────────────────────────────────────────────

pub async fn get_without_guid(
    State(state): State<ApiState>,
) -> Result<Json<DesiredLrpResponse>, ApiError> {
    get_by_guid(state, "").await
}

pub async fn update_without_guid(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    update_by_guid(state, "", body).await
}

pub async fn delete_without_guid(State(state): State<ApiState>) -> Result<StatusCode, ApiError> {
    delete_by_guid(state, "").await
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn get_by_guid(
    state: ApiState,
    process_guid: &str,
) -> Result<Json<DesiredLrpResponse>, ApiError> {
    let lrp = state
        .desired
        .get(process_guid)
        .await
        .map_err(|e| failed("get", e))?;
    Ok(Json(lrp.into()))
}

async fn update_by_guid(
    state: ApiState,
    process_guid: &str,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    // The guid is checked before the body is looked at.
    if process_guid.is_empty() {
        return Err(failed(
            "update",
            ServiceError::MissingIdentifier("process_guid"),
        ));
    }
    let req: DesiredLrpUpdateRequest =
        serde_json::from_slice(&body).map_err(|e| failed("update", ApiError::invalid_json(e)))?;
    state
        .desired
        .update(process_guid, &req.into())
        .await
        .map_err(|e| failed("update", e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_by_guid(state: ApiState, process_guid: &str) -> Result<StatusCode, ApiError> {
    state
        .desired
        .remove(process_guid)
        .await
        .map_err(|e| failed("delete", e))?;
    Ok(StatusCode::NO_CONTENT)
}
