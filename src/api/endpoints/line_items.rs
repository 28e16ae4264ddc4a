//! Billing-seam endpoints: raising charges and the settlement hook.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::CareContext;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::billing;
use crate::models::enums::{LineItemType, PaymentStatus};

#[derive(Deserialize)]
pub struct CreateRequest {
    pub encounter_id: Uuid,
    pub item_type: String,
    pub description: String,
    pub amount: f64,
    pub actor_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct CreateResponse {
    pub line_item_id: Uuid,
}

/// `POST /api/line-items` — attach a charge to an encounter.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, ApiError> {
    let item_type = LineItemType::from_str(&req.item_type)
        .map_err(|_| ApiError::BadRequest(format!("Unknown item type: {}", req.item_type)))?;

    let conn = ctx.db()?;
    let item = billing::add_line_item(
        &conn,
        &scope,
        &req.encounter_id,
        item_type,
        &req.description,
        req.amount,
        req.actor_id,
    )?;
    Ok(Json(CreateResponse { line_item_id: item.id }))
}

#[derive(Deserialize)]
pub struct SettleRequest {
    pub status: String,
    pub actor_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct SettleResponse {
    pub line_item_id: Uuid,
    pub payment_status: PaymentStatus,
}

/// `POST /api/line-items/:id/settle` — the settlement notification hook.
/// The payment update commits regardless of what the payment-gated
/// auto-advance does afterwards.
pub async fn settle(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
    Path(line_item_id): Path<Uuid>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<SettleResponse>, ApiError> {
    let status = PaymentStatus::from_str(&req.status)
        .map_err(|_| ApiError::BadRequest(format!("Unknown payment status: {}", req.status)))?;

    let conn = ctx.db()?;
    let item = billing::settle_line_item(&conn, &scope, &line_item_id, status, req.actor_id)?;
    Ok(Json(SettleResponse {
        line_item_id: item.id,
        payment_status: item.payment_status,
    }))
}
