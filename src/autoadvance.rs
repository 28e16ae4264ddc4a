//! Payment-gated auto-advance.
//!
//! Runs after every settlement. If the encounter sits at a payment gate and
//! a full rescan shows every non-waived charge settled, the engine advances
//! the stage itself (system actor, no role check) and flags the encounter as
//! awaiting physical routing. The rescan is deliberately not incremental:
//! out-of-order settlement events and late-added charges fall out correctly
//! without bookkeeping.

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::access::CareContext;
use crate::db::repository::{encounter as encounter_repo, line_item as line_item_repo};
use crate::db::DatabaseError;
use crate::models::enums::RoutingStatus;
use crate::projection;
use crate::routing;
use crate::transition::{apply_stage_change, busy_to_conflict, TransitionError, TransitionOutcome};

/// Recheck one encounter's payment gate and advance it if cleared.
///
/// Returns `Ok(None)` when there was nothing to do: the encounter is not at
/// a payment gate, or charges are still outstanding.
pub fn on_settlement(
    conn: &Connection,
    ctx: &CareContext,
    encounter_id: &Uuid,
) -> Result<Option<TransitionOutcome>, TransitionError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(busy_to_conflict)?;

    let encounter = match encounter_repo::get_encounter(
        &tx,
        &ctx.tenant_id,
        &ctx.facility_id,
        encounter_id,
    ) {
        Ok(enc) => enc,
        Err(DatabaseError::NotFound { .. }) => return Err(TransitionError::NotFound(*encounter_id)),
        Err(e) => return Err(e.into()),
    };

    let current = encounter.resolved_stage().stage().clone();
    if !current.is_paying() {
        tracing::debug!(encounter = %encounter_id, stage = current.as_str(),
            "settlement outside a payment gate; nothing to advance");
        return Ok(None);
    }

    if !line_item_repo::is_fully_settled(&tx, encounter_id)? {
        tracing::debug!(encounter = %encounter_id, "charges still outstanding; gate stays closed");
        return Ok(None);
    }

    let Some(next) = routing::resolve_next(&tx, encounter_id, &current)? else {
        return Ok(None);
    };

    let outcome = apply_stage_change(
        &tx,
        &encounter,
        &current,
        &next,
        None, // system actor
        RoutingStatus::AwaitingRouting,
        Some("payment gate cleared"),
        Utc::now(),
    )?;
    tx.commit().map_err(busy_to_conflict)?;

    projection::refresh_after_write(conn, ctx, encounter_id);

    Ok(Some(outcome))
}

/// Fire-and-forget wrapper used by the settlement hook. The payment is
/// already committed when this runs; failures are logged (with one retry on
/// a lost race) and never reach the payer.
pub fn on_settlement_best_effort(conn: &Connection, ctx: &CareContext, encounter_id: &Uuid) {
    match on_settlement(conn, ctx, encounter_id) {
        Ok(Some(outcome)) => {
            tracing::info!(
                encounter = %encounter_id,
                from = outcome.previous_stage.as_str(),
                to = outcome.new_stage.as_str(),
                "auto-advanced after settlement; awaiting physical routing"
            );
        }
        Ok(None) => {}
        Err(TransitionError::ConcurrentModification) => {
            // Someone moved the encounter while we were checking; recheck
            // once against the committed state.
            if let Err(e) = on_settlement(conn, ctx, encounter_id) {
                tracing::warn!(encounter = %encounter_id, error = %e,
                    "auto-advance retry failed; payment remains committed");
            }
        }
        Err(e) => {
            tracing::warn!(encounter = %encounter_id, error = %e,
                "auto-advance failed; payment remains committed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{add_line_item, settle_line_item};
    use crate::db::repository::event::events_for_encounter;
    use crate::db::repository::line_item::line_items_for_encounter;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{LineItemType, PaymentStatus, Stage};
    use crate::registration::register_encounter;
    use crate::transition::advance_stage;
    use rusqlite::params;

    struct Floor {
        conn: Connection,
        ctx: CareContext,
        receptionist: Uuid,
        cashier: Uuid,
        doctor: Uuid,
        admin: Uuid,
        patient: Uuid,
    }

    fn setup_floor() -> Floor {
        let conn = open_memory_database().unwrap();
        let ctx = CareContext::new("tn-1", "fc-1");
        let mut ids = Vec::new();
        for (name, role) in [
            ("Grace Front", "receptionist"),
            ("Paul Till", "cashier"),
            ("Dr. Okafor", "doctor"),
            ("Root Admin", "admin"),
        ] {
            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO staff (id, tenant_id, full_name, role) VALUES (?1, 'tn-1', ?2, ?3)",
                params![id.to_string(), name, role],
            )
            .unwrap();
            ids.push(id);
        }
        let patient = Uuid::new_v4();
        conn.execute(
            "INSERT INTO patients (id, tenant_id, full_name) VALUES (?1, 'tn-1', 'Amina Diallo')",
            params![patient.to_string()],
        )
        .unwrap();
        Floor {
            conn,
            ctx,
            receptionist: ids[0],
            cashier: ids[1],
            doctor: ids[2],
            admin: ids[3],
            patient,
        }
    }

    /// Scenario: reception → consultation gate → settle → triage, with the
    /// cashier acknowledging the pre-advanced stage afterwards.
    #[test]
    fn settlement_clears_the_consultation_gate() {
        let floor = setup_floor();
        let enc = register_encounter(&floor.conn, &floor.ctx, &floor.patient, 50.0, Some(floor.receptionist))
            .unwrap();
        advance_stage(&floor.conn, &floor.ctx, &enc.id, Stage::PayingConsultation, Some(floor.receptionist))
            .unwrap();

        let items = line_items_for_encounter(&floor.conn, &enc.id).unwrap();
        settle_line_item(&floor.conn, &floor.ctx, &items[0].id, PaymentStatus::Paid, Some(floor.cashier))
            .unwrap();

        let loaded =
            encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::AtTriage);
        assert_eq!(loaded.routing_status, RoutingStatus::AwaitingRouting);

        // The system wrote the ledger entry, not a person.
        let events = events_for_encounter(&floor.conn, &enc.id).unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.new_stage, Stage::AtTriage);
        assert!(last.actor_id.is_none());
        assert_eq!(last.context.as_deref(), Some("payment gate cleared"));

        // Cashier's own advance to the stage the system already applied:
        // stage unchanged, routing acknowledged.
        let outcome = advance_stage(&floor.conn, &floor.ctx, &enc.id, Stage::AtTriage, Some(floor.cashier))
            .unwrap();
        assert_eq!(outcome.previous_stage, Stage::AtTriage);
        assert_eq!(outcome.new_stage, Stage::AtTriage);

        let loaded =
            encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::AtTriage);
        assert_eq!(loaded.routing_status, RoutingStatus::Routed);

        // The acknowledgement wrote no new ledger entry.
        assert_eq!(events_for_encounter(&floor.conn, &enc.id).unwrap().len(), events.len());
    }

    /// Scenario: diagnostics gate with one unpaid lab and one paid imaging
    /// order. Only the final settlement opens the gate, and lab wins.
    #[test]
    fn gate_opens_only_when_every_charge_is_settled_and_lab_wins() {
        let floor = setup_floor();
        let enc = register_encounter(&floor.conn, &floor.ctx, &floor.patient, 50.0, Some(floor.receptionist))
            .unwrap();

        // Walk to the diagnostics gate via admin (journey plumbing, not what
        // is under test here).
        for stage in [
            Stage::PayingConsultation,
            Stage::AtTriage,
            Stage::VitalsTaken,
            Stage::WithDoctor,
            Stage::PayingDiagnosis,
        ] {
            advance_stage(&floor.conn, &floor.ctx, &enc.id, stage, Some(floor.admin)).unwrap();
        }
        let lab = add_line_item(&floor.conn, &floor.ctx, &enc.id, LineItemType::Lab, "CBC panel", 20.0, Some(floor.doctor))
            .unwrap();
        let imaging = add_line_item(&floor.conn, &floor.ctx, &enc.id, LineItemType::Imaging, "Chest X-ray", 35.0, Some(floor.doctor))
            .unwrap();

        // Consultation fee from registration is still open; waive it so only
        // the diagnostics charges gate the stage. The unpaid orders keep the
        // gate closed through this settlement.
        let items = line_items_for_encounter(&floor.conn, &enc.id).unwrap();
        let consult = items.iter().find(|i| i.item_type == LineItemType::Consultation).unwrap();
        settle_line_item(&floor.conn, &floor.ctx, &consult.id, PaymentStatus::Waived, Some(floor.cashier))
            .unwrap();

        // Imaging settles first — lab still unpaid, no advance.
        settle_line_item(&floor.conn, &floor.ctx, &imaging.id, PaymentStatus::Paid, Some(floor.cashier))
            .unwrap();
        let loaded = encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::PayingDiagnosis);
        assert_eq!(loaded.routing_status, RoutingStatus::Routed);

        // Lab settles — gate opens, and lab outranks imaging as destination.
        settle_line_item(&floor.conn, &floor.ctx, &lab.id, PaymentStatus::Paid, Some(floor.cashier))
            .unwrap();
        let loaded = encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::AtLab);
        assert_eq!(loaded.routing_status, RoutingStatus::AwaitingRouting);
    }

    #[test]
    fn settlement_outside_a_payment_gate_is_a_no_op() {
        let floor = setup_floor();
        let enc = register_encounter(&floor.conn, &floor.ctx, &floor.patient, 50.0, Some(floor.receptionist))
            .unwrap();

        // Still at `registered` — settling the consultation fee changes the
        // payment picture but must not move the patient.
        let items = line_items_for_encounter(&floor.conn, &enc.id).unwrap();
        settle_line_item(&floor.conn, &floor.ctx, &items[0].id, PaymentStatus::Paid, Some(floor.cashier))
            .unwrap();

        let loaded = encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::Registered);

        let result = on_settlement(&floor.conn, &floor.ctx, &enc.id).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn waived_charges_open_the_gate_too() {
        let floor = setup_floor();
        let enc = register_encounter(&floor.conn, &floor.ctx, &floor.patient, 50.0, Some(floor.receptionist))
            .unwrap();
        advance_stage(&floor.conn, &floor.ctx, &enc.id, Stage::PayingConsultation, Some(floor.receptionist))
            .unwrap();

        let items = line_items_for_encounter(&floor.conn, &enc.id).unwrap();
        settle_line_item(&floor.conn, &floor.ctx, &items[0].id, PaymentStatus::Waived, Some(floor.cashier))
            .unwrap();

        let loaded = encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::AtTriage);
    }

    #[test]
    fn late_added_charge_closes_a_reopened_gate() {
        let floor = setup_floor();
        let enc = register_encounter(&floor.conn, &floor.ctx, &floor.patient, 50.0, Some(floor.receptionist))
            .unwrap();
        advance_stage(&floor.conn, &floor.ctx, &enc.id, Stage::PayingConsultation, Some(floor.receptionist))
            .unwrap();

        // A second charge lands before the first settles. Settling only the
        // first must keep the gate closed.
        let extra = add_line_item(&floor.conn, &floor.ctx, &enc.id, LineItemType::Service, "Card replacement", 2.0, Some(floor.cashier))
            .unwrap();
        let items = line_items_for_encounter(&floor.conn, &enc.id).unwrap();
        let consult = items.iter().find(|i| i.item_type == LineItemType::Consultation).unwrap();

        settle_line_item(&floor.conn, &floor.ctx, &consult.id, PaymentStatus::Paid, Some(floor.cashier))
            .unwrap();
        let loaded = encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::PayingConsultation);

        settle_line_item(&floor.conn, &floor.ctx, &extra.id, PaymentStatus::Paid, Some(floor.cashier))
            .unwrap();
        let loaded = encounter_repo::get_encounter(&floor.conn, "tn-1", "fc-1", &enc.id).unwrap();
        assert_eq!(loaded.current_stage, Stage::AtTriage);
    }

    #[test]
    fn direct_call_reports_none_when_already_advanced() {
        let floor = setup_floor();
        let enc = register_encounter(&floor.conn, &floor.ctx, &floor.patient, 50.0, Some(floor.receptionist))
            .unwrap();
        advance_stage(&floor.conn, &floor.ctx, &enc.id, Stage::PayingConsultation, Some(floor.receptionist))
            .unwrap();
        let items = line_items_for_encounter(&floor.conn, &enc.id).unwrap();
        settle_line_item(&floor.conn, &floor.ctx, &items[0].id, PaymentStatus::Paid, Some(floor.cashier))
            .unwrap();

        // The settlement hook already advanced the encounter; a duplicate
        // settlement notification finds no gate to open.
        let result = on_settlement(&floor.conn, &floor.ctx, &enc.id).unwrap();
        assert!(result.is_none());

        let events = events_for_encounter(&floor.conn, &enc.id).unwrap();
        let auto_events: Vec<_> = events.iter().filter(|e| e.actor_id.is_none()).collect();
        assert_eq!(auto_events.len(), 1);
    }
}
