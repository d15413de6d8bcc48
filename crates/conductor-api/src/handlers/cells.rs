use axum::extract::State;
use axum::Json;

use conductor_core::wire::CellResponse;

use super::{failed, ApiState};
use crate::error::ApiError;

pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<CellResponse>>, ApiError> {
    let cells = state.cells.list().await.map_err(|e| failed("list-cells", e))?;
    Ok(Json(cells.into_iter().map(CellResponse::from).collect()))
}
