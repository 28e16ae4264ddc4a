use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{LineItemType, PaymentStatus};
use crate::models::LineItem;

/// The 3-axis payment view the dashboards show per encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentClassification {
    pub consultation: PaymentStatus,
    pub overall: PaymentStatus,
    pub has_unpaid_items: bool,
}

pub fn insert_line_item(conn: &Connection, item: &LineItem) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO line_items (id, encounter_id, item_type, description, amount,
         payment_status, ordered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            item.id.to_string(),
            item.encounter_id.to_string(),
            item.item_type.as_str(),
            item.description,
            item.amount,
            item.payment_status.as_str(),
            item.ordered_at,
        ],
    )?;
    Ok(())
}

pub fn get_line_item(conn: &Connection, id: &Uuid) -> Result<LineItem, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, encounter_id, item_type, description, amount, payment_status, ordered_at
         FROM line_items WHERE id = ?1",
    )?;

    let mut rows = stmt.query_map(params![id.to_string()], |row| Ok(item_row_from_rusqlite(row)))?;

    match rows.next() {
        Some(row) => item_from_row(row??),
        None => Err(DatabaseError::NotFound {
            entity_type: "LineItem".into(),
            id: id.to_string(),
        }),
    }
}

pub fn line_items_for_encounter(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<Vec<LineItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, encounter_id, item_type, description, amount, payment_status, ordered_at
         FROM line_items WHERE encounter_id = ?1 ORDER BY ordered_at ASC",
    )?;

    let rows = stmt.query_map(params![encounter_id.to_string()], |row| {
        Ok(item_row_from_rusqlite(row))
    })?;

    let mut items = Vec::new();
    for row in rows {
        items.push(item_from_row(row??)?);
    }
    Ok(items)
}

/// Settlement write used by the billing hook.
pub(crate) fn update_payment_status(
    conn: &Connection,
    id: &Uuid,
    status: &PaymentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE line_items SET payment_status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "LineItem".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Full rescan of the payment gate: an encounter is fully settled when no
/// non-waived item remains unpaid or partial. Deliberately not incremental so
/// out-of-order settlement events and late-added charges are tolerated.
pub fn is_fully_settled(conn: &Connection, encounter_id: &Uuid) -> Result<bool, DatabaseError> {
    let outstanding: i64 = conn.query_row(
        "SELECT COUNT(*) FROM line_items
         WHERE encounter_id = ?1 AND payment_status IN ('unpaid', 'partial')",
        params![encounter_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(outstanding == 0)
}

/// Order-existence check used by the routing resolver.
pub fn has_item_of_type(
    conn: &Connection,
    encounter_id: &Uuid,
    item_type: &LineItemType,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM line_items WHERE encounter_id = ?1 AND item_type = ?2",
        params![encounter_id.to_string(), item_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Descriptions of items still unpaid or partial, for the routing queue.
pub fn unsettled_descriptions(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT description FROM line_items
         WHERE encounter_id = ?1 AND payment_status IN ('unpaid', 'partial')
         ORDER BY ordered_at ASC",
    )?;

    let rows = stmt.query_map(params![encounter_id.to_string()], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Compute the 3-axis payment classification for the queue projections.
pub fn payment_classification(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<PaymentClassification, DatabaseError> {
    let items = line_items_for_encounter(conn, encounter_id)?;

    let consultation = items
        .iter()
        .find(|i| i.item_type == LineItemType::Consultation)
        .map(|i| i.payment_status.clone())
        .unwrap_or(PaymentStatus::Unpaid);

    let billable: Vec<&LineItem> = items
        .iter()
        .filter(|i| i.payment_status != PaymentStatus::Waived)
        .collect();
    let overall = if billable.is_empty() {
        if items.is_empty() { PaymentStatus::Unpaid } else { PaymentStatus::Waived }
    } else if billable.iter().all(|i| i.payment_status == PaymentStatus::Paid) {
        PaymentStatus::Paid
    } else if billable.iter().any(|i| i.payment_status.is_settled())
        || billable.iter().any(|i| i.payment_status == PaymentStatus::Partial)
    {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    };

    let has_unpaid_items = items
        .iter()
        .any(|i| matches!(i.payment_status, PaymentStatus::Unpaid | PaymentStatus::Partial));

    Ok(PaymentClassification { consultation, overall, has_unpaid_items })
}

// Internal row type for LineItem mapping
struct ItemRow {
    id: String,
    encounter_id: String,
    item_type: String,
    description: String,
    amount: f64,
    payment_status: String,
    ordered_at: DateTime<Utc>,
}

fn item_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ItemRow, rusqlite::Error> {
    Ok(ItemRow {
        id: row.get(0)?,
        encounter_id: row.get(1)?,
        item_type: row.get(2)?,
        description: row.get(3)?,
        amount: row.get(4)?,
        payment_status: row.get(5)?,
        ordered_at: row.get(6)?,
    })
}

fn item_from_row(row: ItemRow) -> Result<LineItem, DatabaseError> {
    Ok(LineItem {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        encounter_id: Uuid::parse_str(&row.encounter_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        item_type: LineItemType::from_str(&row.item_type)?,
        description: row.description,
        amount: row.amount,
        payment_status: PaymentStatus::from_str(&row.payment_status)?,
        ordered_at: row.ordered_at,
    })
}
