use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::Stage;
use crate::models::StageTransitionEvent;

/// Append one ledger entry. The ledger is the source of truth for an
/// encounter's history; rows are never updated or deleted, and a failed
/// append must abort the surrounding transition.
pub(crate) fn append_event(
    conn: &Connection,
    encounter_id: &Uuid,
    previous_stage: Option<&Stage>,
    new_stage: &Stage,
    actor_id: Option<&Uuid>,
    occurred_at: DateTime<Utc>,
    context: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO stage_events (encounter_id, previous_stage, new_stage, actor_id,
         occurred_at, context)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            encounter_id.to_string(),
            previous_stage.map(|s| s.as_str()),
            new_stage.as_str(),
            actor_id.map(|id| id.to_string()),
            occurred_at,
            context,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The most recent ledger entry for an encounter, if any.
pub fn latest_event(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<Option<StageTransitionEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, encounter_id, previous_stage, new_stage, actor_id, occurred_at, context
         FROM stage_events WHERE encounter_id = ?1
         ORDER BY id DESC LIMIT 1",
    )?;

    let mut rows = stmt.query_map(params![encounter_id.to_string()], |row| {
        Ok(event_row_from_rusqlite(row))
    })?;

    match rows.next() {
        Some(row) => Ok(Some(event_from_row(row??)?)),
        None => Ok(None),
    }
}

/// Full transition history for an encounter, oldest first.
pub fn events_for_encounter(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<Vec<StageTransitionEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, encounter_id, previous_stage, new_stage, actor_id, occurred_at, context
         FROM stage_events WHERE encounter_id = ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![encounter_id.to_string()], |row| {
        Ok(event_row_from_rusqlite(row))
    })?;

    let mut events = Vec::new();
    for row in rows {
        events.push(event_from_row(row??)?);
    }
    Ok(events)
}

// Internal row type for StageTransitionEvent mapping
struct EventRow {
    id: i64,
    encounter_id: String,
    previous_stage: Option<String>,
    new_stage: String,
    actor_id: Option<String>,
    occurred_at: DateTime<Utc>,
    context: Option<String>,
}

fn event_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<EventRow, rusqlite::Error> {
    Ok(EventRow {
        id: row.get(0)?,
        encounter_id: row.get(1)?,
        previous_stage: row.get(2)?,
        new_stage: row.get(3)?,
        actor_id: row.get(4)?,
        occurred_at: row.get(5)?,
        context: row.get(6)?,
    })
}

fn event_from_row(row: EventRow) -> Result<StageTransitionEvent, DatabaseError> {
    Ok(StageTransitionEvent {
        id: row.id,
        encounter_id: Uuid::parse_str(&row.encounter_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        previous_stage: row.previous_stage.as_deref().map(Stage::from_str).transpose()?,
        new_stage: Stage::from_str(&row.new_stage)?,
        actor_id: row.actor_id.and_then(|s| Uuid::parse_str(&s).ok()),
        occurred_at: row.occurred_at,
        context: row.context,
    })
}
