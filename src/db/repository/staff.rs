use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::StaffRole;
use crate::models::Staff;

pub fn insert_staff(conn: &Connection, staff: &Staff) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO staff (id, tenant_id, full_name, role) VALUES (?1, ?2, ?3, ?4)",
        params![
            staff.id.to_string(),
            staff.tenant_id,
            staff.full_name,
            staff.role.as_str(),
        ],
    )?;
    Ok(())
}

/// Resolve a staff member within a tenant. `None` means the identity does
/// not exist in this tenant's directory — callers treat that as
/// unauthenticated, not as a broken reference.
pub fn get_staff(
    conn: &Connection,
    tenant_id: &str,
    id: &Uuid,
) -> Result<Option<Staff>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, full_name, role FROM staff WHERE id = ?1 AND tenant_id = ?2",
    )?;

    let mut rows = stmt.query_map(params![id.to_string(), tenant_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    match rows.next() {
        Some(row) => {
            let (id, tenant_id, full_name, role) = row?;
            Ok(Some(Staff {
                id: Uuid::parse_str(&id)
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
                tenant_id,
                full_name,
                role: StaffRole::from_str(&role)?,
            }))
        }
        None => Ok(None),
    }
}
