//! Derived dashboard queues.
//!
//! One denormalized row per active encounter per dashboard, recomputed and
//! replaced whenever a write touches the encounter. The caller that made the
//! write sees its refresh; other viewers may lag a refresh behind. A failed
//! refresh is logged and retried once but never rolls back the write that
//! triggered it; a stale queue is an operational problem, not a
//! data-integrity one.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::access::CareContext;
use crate::db::repository::{
    encounter as encounter_repo, line_item as line_item_repo, patient as patient_repo,
    vitals as vitals_repo,
};
use crate::db::DatabaseError;
use crate::models::enums::{Dashboard, PaymentStatus, RoutingStatus, Stage};
use crate::models::{AwaitingRoutingRow, QueueProjectionRow};
use crate::routing;

/// Which dashboards carry an encounter at the given stage.
fn dashboards_for(stage: &Stage) -> &'static [Dashboard] {
    match stage {
        Stage::AtTriage | Stage::VitalsTaken => &[Dashboard::Nurse],
        Stage::WithDoctor | Stage::Admitted => &[Dashboard::Doctor],
        Stage::PayingConsultation | Stage::PayingDiagnosis | Stage::PayingPharmacy => {
            &[Dashboard::Cashier]
        }
        _ => &[],
    }
}

/// Recompute and replace the projection rows for one encounter.
pub fn refresh_encounter(
    conn: &Connection,
    ctx: &CareContext,
    encounter_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM queue_projections WHERE encounter_id = ?1",
        params![encounter_id.to_string()],
    )?;

    let encounter =
        match encounter_repo::get_encounter(conn, &ctx.tenant_id, &ctx.facility_id, encounter_id) {
            Ok(enc) => enc,
            // Gone or out of scope: the delete above already cleared the rows.
            Err(DatabaseError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };

    let stage = encounter.resolved_stage().stage().clone();
    if stage.is_terminal() {
        return Ok(());
    }

    let dashboards = dashboards_for(&stage);
    if dashboards.is_empty() {
        return Ok(());
    }

    let patient = patient_repo::get_patient(conn, &ctx.tenant_id, &encounter.patient_id)?;
    let vitals_summary = vitals_repo::latest_vitals(conn, encounter_id)?.map(|v| v.summary());
    let classification = line_item_repo::payment_classification(conn, encounter_id)?;
    let age_years = patient.date_of_birth.map(|dob| {
        let today = Utc::now().date_naive();
        let mut age = i64::from(today.year() - dob.year());
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        age
    });

    let now = Utc::now();
    for dashboard in dashboards {
        conn.execute(
            "INSERT OR REPLACE INTO queue_projections
             (dashboard, encounter_id, tenant_id, facility_id, patient_name,
              patient_age_years, patient_sex, current_stage, entered_at, routing_status,
              vitals_summary, consultation_payment_status, overall_payment_status,
              has_unpaid_items, refreshed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                dashboard.as_str(),
                encounter.id.to_string(),
                encounter.tenant_id,
                encounter.facility_id,
                patient.full_name,
                age_years,
                patient.sex,
                stage.as_str(),
                encounter.current_stage_entered_at,
                encounter.routing_status.as_str(),
                vitals_summary,
                classification.consultation.as_str(),
                classification.overall.as_str(),
                classification.has_unpaid_items as i32,
                now,
            ],
        )?;
    }

    Ok(())
}

/// Best-effort refresh used by every write path. Logs and retries once;
/// never propagates, so the underlying write stands regardless.
pub fn refresh_after_write(conn: &Connection, ctx: &CareContext, encounter_id: &Uuid) {
    if let Err(first) = refresh_encounter(conn, ctx, encounter_id) {
        tracing::warn!(encounter = %encounter_id, error = %first,
            "queue projection refresh failed; retrying once");
        if let Err(second) = refresh_encounter(conn, ctx, encounter_id) {
            tracing::error!(encounter = %encounter_id, error = %second,
                "queue projection refresh failed twice; dashboards stale until the next write");
        }
    }
}

/// Rebuild every projection row for a facility. Recovery path for startup
/// after a crash or a reported stale dashboard.
pub fn rebuild_facility(conn: &Connection, ctx: &CareContext) -> Result<usize, DatabaseError> {
    let encounters = encounter_repo::active_encounters(conn, &ctx.tenant_id, &ctx.facility_id)?;
    let count = encounters.len();
    for enc in &encounters {
        refresh_encounter(conn, ctx, &enc.id)?;
    }
    tracing::info!(facility = %ctx.facility_id, encounters = count, "queue projections rebuilt");
    Ok(count)
}

/// Ordered queue rows for one dashboard, oldest arrival first.
pub fn get_queue(
    conn: &Connection,
    ctx: &CareContext,
    dashboard: &Dashboard,
) -> Result<Vec<QueueProjectionRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT encounter_id, patient_name, patient_age_years, patient_sex, current_stage,
         entered_at, routing_status, vitals_summary, consultation_payment_status,
         overall_payment_status, has_unpaid_items
         FROM queue_projections
         WHERE dashboard = ?1 AND tenant_id = ?2 AND facility_id = ?3
         ORDER BY entered_at ASC",
    )?;

    let now = Utc::now();
    let rows = stmt.query_map(
        params![dashboard.as_str(), ctx.tenant_id, ctx.facility_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, DateTime<Utc>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, i64>(10)?,
            ))
        },
    )?;

    let mut queue = Vec::new();
    for row in rows {
        let (id, name, age, sex, stage, entered_at, routing, vitals, consult, overall, unpaid) =
            row?;
        queue.push(QueueProjectionRow {
            encounter_id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            patient_name: name,
            patient_age_years: age,
            patient_sex: sex,
            current_stage: Stage::from_str(&stage)?,
            entered_at,
            wait_minutes: (now - entered_at).num_minutes().max(0),
            routing_status: RoutingStatus::from_str(&routing)?,
            vitals_summary: vitals,
            consultation_payment_status: PaymentStatus::from_str(&consult)?,
            overall_payment_status: PaymentStatus::from_str(&overall)?,
            has_unpaid_items: unpaid != 0,
        });
    }
    Ok(queue)
}

/// The cashier routing queue: encounters the system advanced past a payment
/// gate that still need a human hand-off, with where to walk the patient.
pub fn encounters_awaiting_routing(
    conn: &Connection,
    ctx: &CareContext,
) -> Result<Vec<AwaitingRoutingRow>, DatabaseError> {
    let encounters =
        encounter_repo::awaiting_routing_encounters(conn, &ctx.tenant_id, &ctx.facility_id)?;

    let now = Utc::now();
    let mut rows = Vec::new();
    for enc in encounters {
        let stage = enc.resolved_stage().stage().clone();
        let patient = patient_repo::get_patient(conn, &ctx.tenant_id, &enc.patient_id)?;
        let pending_items = line_item_repo::unsettled_descriptions(conn, &enc.id)?;
        // A pre-advanced encounter's destination is its own current stage;
        // one still sitting at a gate suggests the resolver's pick.
        let suggested_next_stage = if stage.is_paying() {
            routing::resolve_next(conn, &enc.id, &stage)?.unwrap_or_else(|| stage.clone())
        } else {
            stage.clone()
        };
        rows.push(AwaitingRoutingRow {
            encounter_id: enc.id,
            patient_name: patient.full_name,
            current_stage: stage,
            pending_items,
            wait_minutes: (now - enc.current_stage_entered_at).num_minutes().max(0),
            suggested_next_stage,
        });
    }
    Ok(rows)
}
