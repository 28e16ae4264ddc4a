//! Routing decision resolver: given the payment gate an encounter is leaving,
//! choose the concrete destination from the orders that exist. Pure apart
//! from the order-existence reads, and idempotent: the same encounter state
//! always resolves to the same stage.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::line_item;
use crate::db::DatabaseError;
use crate::models::enums::{LineItemType, Stage};

/// Resolve where an encounter goes after clearing the given payment stage.
/// Returns `None` when the source stage is not payment-gated.
pub fn resolve_next(
    conn: &Connection,
    encounter_id: &Uuid,
    source_stage: &Stage,
) -> Result<Option<Stage>, DatabaseError> {
    let next = match source_stage {
        Stage::PayingConsultation => Some(Stage::AtTriage),
        Stage::PayingDiagnosis => {
            // Lab takes priority over imaging, imaging over pharmacy. No
            // downstream order at all sends the patient back to the doctor
            // (default branch pending product confirmation).
            if line_item::has_item_of_type(conn, encounter_id, &LineItemType::Lab)? {
                Some(Stage::AtLab)
            } else if line_item::has_item_of_type(conn, encounter_id, &LineItemType::Imaging)? {
                Some(Stage::AtImaging)
            } else if line_item::has_item_of_type(conn, encounter_id, &LineItemType::Medication)? {
                Some(Stage::AtPharmacy)
            } else {
                Some(Stage::WithDoctor)
            }
        }
        Stage::PayingPharmacy => Some(Stage::AtPharmacy),
        _ => None,
    };
    Ok(next)
}
