//! Front-desk registration: creates the encounter at `registered`, opens the
//! journey timeline, raises the consultation charge and writes the first
//! ledger entry. Everything after this point belongs to the transition
//! engine.

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::access::{self, CareContext};
use crate::db::repository::{
    encounter as encounter_repo, event as event_repo, line_item as line_item_repo,
    patient as patient_repo,
};
use crate::models::enums::{LineItemType, PaymentStatus, RoutingStatus, Stage};
use crate::models::{Encounter, LineItem, TimelineEntry};
use crate::projection;
use crate::transition::{busy_to_conflict, TransitionError};

/// Register a patient for a new encounter. Returns the created encounter.
pub fn register_encounter(
    conn: &Connection,
    ctx: &CareContext,
    patient_id: &Uuid,
    consultation_fee: f64,
    actor_id: Option<Uuid>,
) -> Result<Encounter, TransitionError> {
    let actor = access::resolve_actor(conn, ctx, actor_id)?
        .ok_or(TransitionError::Unauthenticated)?;

    // The patient must exist in the caller's tenant before a journey starts.
    patient_repo::get_patient(conn, &ctx.tenant_id, patient_id)?;

    let now = Utc::now();
    let encounter = Encounter {
        id: Uuid::new_v4(),
        tenant_id: ctx.tenant_id.clone(),
        facility_id: ctx.facility_id.clone(),
        patient_id: *patient_id,
        current_stage: Stage::Registered,
        current_stage_entered_at: now,
        routing_status: RoutingStatus::Routed,
        consultation_fee,
        total_billed: consultation_fee,
        timeline: Some(vec![TimelineEntry {
            stage: Stage::Registered,
            arrived_at: now,
            completed_at: None,
            completed_by: None,
            wait_minutes: None,
        }]),
        created_at: now,
    };

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(busy_to_conflict)?;

    encounter_repo::insert_encounter(&tx, &encounter)?;

    if consultation_fee > 0.0 {
        line_item_repo::insert_line_item(
            &tx,
            &LineItem {
                id: Uuid::new_v4(),
                encounter_id: encounter.id,
                item_type: LineItemType::Consultation,
                description: "Consultation fee".into(),
                amount: consultation_fee,
                payment_status: PaymentStatus::Unpaid,
                ordered_at: now,
            },
        )?;
    }

    event_repo::append_event(
        &tx,
        &encounter.id,
        None,
        &Stage::Registered,
        Some(&actor.id),
        now,
        Some("registered at reception"),
    )?;

    tx.commit().map_err(busy_to_conflict)?;

    tracing::info!(encounter = %encounter.id, patient = %patient_id, "encounter registered");
    projection::refresh_after_write(conn, ctx, &encounter.id);

    Ok(encounter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::event::events_for_encounter;
    use crate::db::repository::line_item::line_items_for_encounter;
    use crate::db::sqlite::open_memory_database;
    use rusqlite::params;

    fn setup() -> (Connection, CareContext, Uuid, Uuid) {
        let conn = open_memory_database().unwrap();
        let ctx = CareContext::new("tn-1", "fc-1");
        let receptionist = Uuid::new_v4();
        conn.execute(
            "INSERT INTO staff (id, tenant_id, full_name, role)
             VALUES (?1, 'tn-1', 'Grace Front', 'receptionist')",
            params![receptionist.to_string()],
        )
        .unwrap();
        let patient = Uuid::new_v4();
        conn.execute(
            "INSERT INTO patients (id, tenant_id, full_name) VALUES (?1, 'tn-1', 'Kwame Mensah')",
            params![patient.to_string()],
        )
        .unwrap();
        (conn, ctx, receptionist, patient)
    }

    #[test]
    fn registration_creates_open_timeline_and_first_ledger_entry() {
        let (conn, ctx, receptionist, patient) = setup();

        let enc = register_encounter(&conn, &ctx, &patient, 50.0, Some(receptionist)).unwrap();
        assert_eq!(enc.current_stage, Stage::Registered);
        assert_eq!(enc.routing_status, RoutingStatus::Routed);

        let events = events_for_encounter(&conn, &enc.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].previous_stage, None);
        assert_eq!(events[0].new_stage, Stage::Registered);
        assert_eq!(events[0].actor_id, Some(receptionist));

        let items = line_items_for_encounter(&conn, &enc.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_type, LineItemType::Consultation);
        assert_eq!(items[0].payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn zero_fee_registration_raises_no_charge() {
        let (conn, ctx, receptionist, patient) = setup();
        let enc = register_encounter(&conn, &ctx, &patient, 0.0, Some(receptionist)).unwrap();

        let items = line_items_for_encounter(&conn, &enc.id).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn registration_requires_an_identity() {
        let (conn, ctx, _receptionist, patient) = setup();
        let err = register_encounter(&conn, &ctx, &patient, 50.0, None).unwrap_err();
        assert!(matches!(err, TransitionError::Unauthenticated));
    }

    #[test]
    fn registration_rejects_unknown_patient() {
        let (conn, ctx, receptionist, _patient) = setup();
        let err =
            register_encounter(&conn, &ctx, &Uuid::new_v4(), 50.0, Some(receptionist)).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Database(crate::db::DatabaseError::NotFound { .. })
        ));
    }
}
