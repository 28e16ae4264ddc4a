//! Dashboard queue endpoints.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde::Serialize;

use crate::access::CareContext;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::enums::Dashboard;
use crate::models::{AwaitingRoutingRow, QueueProjectionRow};
use crate::projection;

#[derive(Serialize)]
pub struct QueueResponse {
    pub queue: Vec<QueueProjectionRow>,
}

/// `GET /api/queues/:dashboard` — ordered queue rows for one dashboard.
pub async fn queue(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
    Path(dashboard): Path<String>,
) -> Result<Json<QueueResponse>, ApiError> {
    let dashboard = Dashboard::from_str(&dashboard)
        .map_err(|_| ApiError::BadRequest(format!("Unknown dashboard: {dashboard}")))?;

    let conn = ctx.db()?;
    let queue = projection::get_queue(&conn, &scope, &dashboard)?;
    Ok(Json(QueueResponse { queue }))
}

#[derive(Serialize)]
pub struct AwaitingRoutingResponse {
    pub pending: Vec<AwaitingRoutingRow>,
}

/// `GET /api/queues/routing/pending` — encounters the system advanced past a
/// payment gate that still need a physical hand-off.
pub async fn awaiting_routing(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
) -> Result<Json<AwaitingRoutingResponse>, ApiError> {
    let conn = ctx.db()?;
    let pending = projection::encounters_awaiting_routing(&conn, &scope)?;
    Ok(Json(AwaitingRoutingResponse { pending }))
}
