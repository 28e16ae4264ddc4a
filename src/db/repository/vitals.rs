use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Vitals;

pub fn insert_vitals(conn: &Connection, vitals: &Vitals) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO vitals (id, encounter_id, recorded_by, temperature_c, pulse_bpm,
         systolic_mmhg, diastolic_mmhg, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            vitals.id.to_string(),
            vitals.encounter_id.to_string(),
            vitals.recorded_by.map(|id| id.to_string()),
            vitals.temperature_c,
            vitals.pulse_bpm,
            vitals.systolic_mmhg,
            vitals.diastolic_mmhg,
            vitals.recorded_at,
        ],
    )?;
    Ok(())
}

/// Most recent vitals capture for an encounter, if any.
pub fn latest_vitals(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<Option<Vitals>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, encounter_id, recorded_by, temperature_c, pulse_bpm, systolic_mmhg,
         diastolic_mmhg, recorded_at
         FROM vitals WHERE encounter_id = ?1
         ORDER BY recorded_at DESC LIMIT 1",
    )?;

    let mut rows = stmt.query_map(params![encounter_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, Option<i64>>(4)?,
            row.get::<_, Option<i64>>(5)?,
            row.get::<_, Option<i64>>(6)?,
            row.get::<_, DateTime<Utc>>(7)?,
        ))
    })?;

    match rows.next() {
        Some(row) => {
            let (id, encounter_id, recorded_by, temp, pulse, sys, dia, recorded_at) = row?;
            Ok(Some(Vitals {
                id: Uuid::parse_str(&id)
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
                encounter_id: Uuid::parse_str(&encounter_id)
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
                recorded_by: recorded_by.and_then(|s| Uuid::parse_str(&s).ok()),
                temperature_c: temp,
                pulse_bpm: pulse,
                systolic_mmhg: sys,
                diastolic_mmhg: dia,
                recorded_at,
            }))
        }
        None => Ok(None),
    }
}
