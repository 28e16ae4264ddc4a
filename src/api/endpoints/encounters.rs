//! Encounter endpoints: registration, stage transitions, journey history,
//! vitals capture.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::CareContext;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{encounter as encounter_repo, event as event_repo};
use crate::models::enums::{RoutingStatus, Stage};
use crate::models::StageTransitionEvent;
use crate::registration;
use crate::transition;
use crate::triage;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub patient_id: Uuid,
    pub consultation_fee: f64,
    pub actor_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub encounter_id: Uuid,
    pub current_stage: Stage,
}

/// `POST /api/encounters` — register a patient for a new encounter.
pub async fn register(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let conn = ctx.db()?;
    let encounter =
        registration::register_encounter(&conn, &scope, &req.patient_id, req.consultation_fee, req.actor_id)?;
    Ok(Json(RegisterResponse {
        encounter_id: encounter.id,
        current_stage: encounter.current_stage,
    }))
}

#[derive(Deserialize)]
pub struct AdvanceRequest {
    pub requested_stage: String,
    pub actor_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct AdvanceResponse {
    pub success: bool,
    pub previous_stage: Stage,
    pub new_stage: Stage,
    pub routing_status: RoutingStatus,
}

/// `POST /api/encounters/:id/advance` — role-authorized stage transition.
pub async fn advance(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
    Path(encounter_id): Path<Uuid>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    // Unknown stages never reach the engine.
    let requested = Stage::from_str(&req.requested_stage)
        .map_err(|_| ApiError::BadRequest(format!("Unknown stage: {}", req.requested_stage)))?;

    let conn = ctx.db()?;
    let outcome = transition::advance_stage(&conn, &scope, &encounter_id, requested, req.actor_id)?;
    Ok(Json(AdvanceResponse {
        success: true,
        previous_stage: outcome.previous_stage,
        new_stage: outcome.new_stage,
        routing_status: outcome.routing_status,
    }))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub events: Vec<StageTransitionEvent>,
}

/// `GET /api/encounters/:id/history` — the transition ledger, oldest first.
pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
    Path(encounter_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let conn = ctx.db()?;
    // Scope gate: foreign encounters are indistinguishable from missing ones.
    encounter_repo::get_encounter(&conn, &scope.tenant_id, &scope.facility_id, &encounter_id)?;
    let events = event_repo::events_for_encounter(&conn, &encounter_id)?;
    Ok(Json(HistoryResponse { events }))
}

#[derive(Deserialize)]
pub struct VitalsRequest {
    pub temperature_c: Option<f64>,
    pub pulse_bpm: Option<i64>,
    pub systolic_mmhg: Option<i64>,
    pub diastolic_mmhg: Option<i64>,
    pub actor_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct VitalsResponse {
    pub vitals_id: Uuid,
}

/// `POST /api/encounters/:id/vitals` — triage vitals capture.
pub async fn vitals(
    State(ctx): State<ApiContext>,
    Extension(scope): Extension<CareContext>,
    Path(encounter_id): Path<Uuid>,
    Json(req): Json<VitalsRequest>,
) -> Result<Json<VitalsResponse>, ApiError> {
    let conn = ctx.db()?;
    let vitals = triage::record_vitals(
        &conn,
        &scope,
        &encounter_id,
        req.temperature_c,
        req.pulse_bpm,
        req.systolic_mmhg,
        req.diastolic_mmhg,
        req.actor_id,
    )?;
    Ok(Json(VitalsResponse { vitals_id: vitals.id }))
}
