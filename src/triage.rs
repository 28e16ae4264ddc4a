//! Triage-floor capture: vitals recorded against an encounter, surfaced on
//! the nurse and doctor queue rows.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::access::{self, CareContext};
use crate::db::repository::{encounter as encounter_repo, vitals as vitals_repo};
use crate::db::DatabaseError;
use crate::models::Vitals;
use crate::projection;
use crate::transition::TransitionError;

pub fn record_vitals(
    conn: &Connection,
    ctx: &CareContext,
    encounter_id: &Uuid,
    temperature_c: Option<f64>,
    pulse_bpm: Option<i64>,
    systolic_mmhg: Option<i64>,
    diastolic_mmhg: Option<i64>,
    actor_id: Option<Uuid>,
) -> Result<Vitals, TransitionError> {
    let actor = access::resolve_actor(conn, ctx, actor_id)?
        .ok_or(TransitionError::Unauthenticated)?;

    match encounter_repo::get_encounter(conn, &ctx.tenant_id, &ctx.facility_id, encounter_id) {
        Ok(_) => {}
        Err(DatabaseError::NotFound { .. }) => return Err(TransitionError::NotFound(*encounter_id)),
        Err(e) => return Err(e.into()),
    }

    let vitals = Vitals {
        id: Uuid::new_v4(),
        encounter_id: *encounter_id,
        recorded_by: Some(actor.id),
        temperature_c,
        pulse_bpm,
        systolic_mmhg,
        diastolic_mmhg,
        recorded_at: Utc::now(),
    };
    vitals_repo::insert_vitals(conn, &vitals)?;

    projection::refresh_after_write(conn, ctx, encounter_id);

    Ok(vitals)
}
