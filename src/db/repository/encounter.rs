use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{RoutingStatus, Stage};
use crate::models::{Encounter, TimelineEntry};

pub fn insert_encounter(conn: &Connection, enc: &Encounter) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO encounters (id, tenant_id, facility_id, patient_id, current_stage,
         current_stage_entered_at, routing_status, consultation_fee, total_billed,
         timeline, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            enc.id.to_string(),
            enc.tenant_id,
            enc.facility_id,
            enc.patient_id.to_string(),
            enc.current_stage.as_str(),
            enc.current_stage_entered_at,
            enc.routing_status.as_str(),
            enc.consultation_fee,
            enc.total_billed,
            timeline_to_json(enc.timeline.as_deref())?,
            enc.created_at,
        ],
    )?;
    Ok(())
}

/// Fetch an encounter within the caller's tenant/facility scope. An encounter
/// outside that scope is indistinguishable from a missing one.
pub fn get_encounter(
    conn: &Connection,
    tenant_id: &str,
    facility_id: &str,
    id: &Uuid,
) -> Result<Encounter, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, facility_id, patient_id, current_stage,
         current_stage_entered_at, routing_status, consultation_fee, total_billed,
         timeline, created_at
         FROM encounters WHERE id = ?1 AND tenant_id = ?2 AND facility_id = ?3",
    )?;

    let mut rows = stmt.query_map(params![id.to_string(), tenant_id, facility_id], |row| {
        Ok(encounter_row_from_rusqlite(row))
    })?;

    match rows.next() {
        Some(row) => encounter_from_row(row??),
        None => Err(DatabaseError::NotFound {
            entity_type: "Encounter".into(),
            id: id.to_string(),
        }),
    }
}

/// Active (non-terminal) encounters in a facility, oldest stage arrival first.
pub fn active_encounters(
    conn: &Connection,
    tenant_id: &str,
    facility_id: &str,
) -> Result<Vec<Encounter>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, facility_id, patient_id, current_stage,
         current_stage_entered_at, routing_status, consultation_fee, total_billed,
         timeline, created_at
         FROM encounters
         WHERE tenant_id = ?1 AND facility_id = ?2
           AND current_stage NOT IN ('discharged', 'cancelled')
         ORDER BY current_stage_entered_at ASC",
    )?;

    let rows = stmt.query_map(params![tenant_id, facility_id], |row| {
        Ok(encounter_row_from_rusqlite(row))
    })?;

    let mut encounters = Vec::new();
    for row in rows {
        encounters.push(encounter_from_row(row??)?);
    }
    Ok(encounters)
}

/// Encounters the system advanced past a payment gate that still need a
/// human to physically route the patient.
pub fn awaiting_routing_encounters(
    conn: &Connection,
    tenant_id: &str,
    facility_id: &str,
) -> Result<Vec<Encounter>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, facility_id, patient_id, current_stage,
         current_stage_entered_at, routing_status, consultation_fee, total_billed,
         timeline, created_at
         FROM encounters
         WHERE tenant_id = ?1 AND facility_id = ?2 AND routing_status = 'awaiting_routing'
         ORDER BY current_stage_entered_at ASC",
    )?;

    let rows = stmt.query_map(params![tenant_id, facility_id], |row| {
        Ok(encounter_row_from_rusqlite(row))
    })?;

    let mut encounters = Vec::new();
    for row in rows {
        encounters.push(encounter_from_row(row??)?);
    }
    Ok(encounters)
}

/// Apply the mutable half of a stage transition. Guarded on the expected
/// current stage so a racing transition that committed first leaves this
/// writer with zero affected rows instead of silently overwriting.
///
/// Only the transition engine may call this; it is the single write path for
/// `current_stage`, `routing_status` and the timeline.
pub(crate) fn update_stage_state(
    conn: &Connection,
    id: &Uuid,
    expected_stage: &Stage,
    new_stage: &Stage,
    entered_at: DateTime<Utc>,
    routing_status: &RoutingStatus,
    timeline: &[TimelineEntry],
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE encounters
         SET current_stage = ?1, current_stage_entered_at = ?2, routing_status = ?3,
             timeline = ?4
         WHERE id = ?5 AND current_stage = ?6",
        params![
            new_stage.as_str(),
            entered_at,
            routing_status.as_str(),
            timeline_to_json(Some(timeline))?,
            id.to_string(),
            expected_stage.as_str(),
        ],
    )?;
    Ok(changed == 1)
}

/// Acknowledge a system-applied advance: flips routing_status back to routed
/// without touching the stage or the timeline.
pub(crate) fn mark_routed(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE encounters SET routing_status = 'routed' WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Encounter".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Add a freshly ordered charge to the denormalized running total.
pub(crate) fn add_to_total_billed(
    conn: &Connection,
    id: &Uuid,
    amount: f64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE encounters SET total_billed = total_billed + ?1 WHERE id = ?2",
        params![amount, id.to_string()],
    )?;
    Ok(())
}

fn timeline_to_json(timeline: Option<&[TimelineEntry]>) -> Result<Option<String>, DatabaseError> {
    timeline
        .map(|t| {
            serde_json::to_string(t)
                .map_err(|e| DatabaseError::ConstraintViolation(format!("timeline JSON: {e}")))
        })
        .transpose()
}

// Internal row type for Encounter mapping
struct EncounterRow {
    id: String,
    tenant_id: String,
    facility_id: String,
    patient_id: String,
    current_stage: String,
    current_stage_entered_at: DateTime<Utc>,
    routing_status: String,
    consultation_fee: f64,
    total_billed: f64,
    timeline: Option<String>,
    created_at: DateTime<Utc>,
}

fn encounter_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<EncounterRow, rusqlite::Error> {
    Ok(EncounterRow {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        facility_id: row.get(2)?,
        patient_id: row.get(3)?,
        current_stage: row.get(4)?,
        current_stage_entered_at: row.get(5)?,
        routing_status: row.get(6)?,
        consultation_fee: row.get(7)?,
        total_billed: row.get(8)?,
        timeline: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn encounter_from_row(row: EncounterRow) -> Result<Encounter, DatabaseError> {
    let timeline = row
        .timeline
        .map(|json| {
            serde_json::from_str::<Vec<TimelineEntry>>(&json)
                .map_err(|e| DatabaseError::ConstraintViolation(format!("timeline JSON: {e}")))
        })
        .transpose()?;

    Ok(Encounter {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        tenant_id: row.tenant_id,
        facility_id: row.facility_id,
        patient_id: Uuid::parse_str(&row.patient_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        current_stage: Stage::from_str(&row.current_stage)?,
        current_stage_entered_at: row.current_stage_entered_at,
        routing_status: RoutingStatus::from_str(&row.routing_status)?,
        consultation_fee: row.consultation_fee,
        total_billed: row.total_billed,
        timeline,
        created_at: row.created_at,
    })
}
