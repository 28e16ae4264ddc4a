use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, tenant_id, full_name, date_of_birth, sex, phone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.tenant_id,
            patient.full_name,
            patient.date_of_birth.map(|d| d.to_string()),
            patient.sex,
            patient.phone,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, tenant_id: &str, id: &Uuid) -> Result<Patient, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, full_name, date_of_birth, sex, phone
         FROM patients WHERE id = ?1 AND tenant_id = ?2",
    )?;

    let mut rows = stmt.query_map(params![id.to_string(), tenant_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    match rows.next() {
        Some(row) => {
            let (id, tenant_id, full_name, dob, sex, phone) = row?;
            Ok(Patient {
                id: Uuid::parse_str(&id)
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
                tenant_id,
                full_name,
                date_of_birth: dob.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                sex,
                phone,
            })
        }
        None => Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id.to_string(),
        }),
    }
}
