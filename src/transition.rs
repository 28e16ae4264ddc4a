//! Role-authorized stage transitions.
//!
//! This module and `autoadvance` are the only writers of an encounter's
//! `current_stage`, `routing_status` and timeline: everything funnels
//! through [`apply_stage_change`], which is `pub(crate)` on purpose. The
//! close-entry / open-entry / ledger-append sequence runs inside one SQLite
//! transaction; a failed ledger write aborts the whole transition.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::access::{self, CareContext};
use crate::catalog;
use crate::db::repository::{encounter as encounter_repo, event as event_repo};
use crate::db::DatabaseError;
use crate::models::enums::{RoutingStatus, Stage, StaffRole};
use crate::models::{Encounter, TimelineEntry};
use crate::projection;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("No staff identity could be resolved for this request")]
    Unauthenticated,

    #[error("Role {role} may not move a patient out of {stage}",
        role = .role.as_str(), stage = .stage.as_str())]
    Forbidden { role: StaffRole, stage: Stage },

    #[error("Cannot move an encounter from {from} to {to}",
        from = .from.as_str(), to = .to.as_str())]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Encounter not found: {0}")]
    NotFound(Uuid),

    #[error("Encounter was modified by a concurrent transition")]
    ConcurrentModification,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The structured result every manual transition returns.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub encounter_id: Uuid,
    pub previous_stage: Stage,
    pub new_stage: Stage,
    pub routing_status: RoutingStatus,
}

/// Move an encounter to `requested_stage` on behalf of a staff member.
///
/// Validation order: identity, super-operator bypass, current-stage read
/// (timeline first, denormalized column only for legacy rows), discharged
/// fail-fast, capability intersection, catalog reachability. Requesting the
/// stage the encounter is already at acknowledges a pending auto-advance
/// instead (stage unchanged, routing flips back to routed).
pub fn advance_stage(
    conn: &Connection,
    ctx: &CareContext,
    encounter_id: &Uuid,
    requested_stage: Stage,
    actor_id: Option<Uuid>,
) -> Result<TransitionOutcome, TransitionError> {
    let actor = access::resolve_actor(conn, ctx, actor_id)?
        .ok_or(TransitionError::Unauthenticated)?;

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

    // Super-operator bypass: skips the role check, the catalog and the
    // terminal fail-fast. Whether terminal encounters should really be
    // movable this way is an open product question; the behavior is kept
    // as-is and isolated here.
    if access::is_super_operator(&actor.role) {
        let outcome = if requested_stage == current {
            acknowledge_routing(&tx, &encounter, &current)?
        } else {
            apply_stage_change(
                &tx,
                &encounter,
                &current,
                &requested_stage,
                Some(&actor.id),
                RoutingStatus::Routed,
                Some("super-operator override"),
                Utc::now(),
            )?
        };
        tx.commit().map_err(busy_to_conflict)?;
        projection::refresh_after_write(conn, ctx, encounter_id);
        return Ok(outcome);
    }

    // Routing acknowledgement: the system already advanced the stage after a
    // payment; the staff member is confirming the physical hand-off. The
    // caller is authorized against the stage the system advanced *from*
    // (that is whose queue the acknowledgement belongs to). Terminal stages
    // never take this path; they always reject below.
    if requested_stage == current && !current.is_terminal() {
        let gate_stage = event_repo::latest_event(&tx, encounter_id)?
            .and_then(|e| e.previous_stage)
            .unwrap_or_else(|| current.clone());
        if let Some(required) = catalog::required_capability(&gate_stage) {
            if !access::holds_capability(&actor.role, &required) {
                return Err(TransitionError::Forbidden { role: actor.role, stage: gate_stage });
            }
        }
        let outcome = acknowledge_routing(&tx, &encounter, &current)?;
        tx.commit().map_err(busy_to_conflict)?;
        projection::refresh_after_write(conn, ctx, encounter_id);
        return Ok(outcome);
    }

    // Discharged is dead before any catalog lookup.
    if current == Stage::Discharged {
        return Err(TransitionError::InvalidTransition { from: current, to: requested_stage });
    }

    if let Some(required) = catalog::required_capability(&current) {
        if !access::holds_capability(&actor.role, &required) {
            return Err(TransitionError::Forbidden { role: actor.role, stage: current });
        }
    }

    if !catalog::is_allowed(&current, &requested_stage) {
        return Err(TransitionError::InvalidTransition { from: current, to: requested_stage });
    }

    let outcome = apply_stage_change(
        &tx,
        &encounter,
        &current,
        &requested_stage,
        Some(&actor.id),
        RoutingStatus::Routed,
        None,
        Utc::now(),
    )?;
    tx.commit().map_err(busy_to_conflict)?;

    projection::refresh_after_write(conn, ctx, encounter_id);

    Ok(outcome)
}

/// Apply one stage change: close the open timeline entry, open one for the
/// new stage (already closed when the new stage is terminal), update the
/// denormalized columns behind an optimistic stage guard, and append the
/// ledger entry. Callers run this inside an open transaction.
///
/// The only two callers are `advance_stage` above and the payment
/// auto-advance; nothing else may construct a stage mutation.
pub(crate) fn apply_stage_change(
    conn: &Connection,
    encounter: &Encounter,
    current: &Stage,
    new_stage: &Stage,
    actor_id: Option<&Uuid>,
    routing_status: RoutingStatus,
    context: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, TransitionError> {
    let mut timeline = encounter.timeline.clone().unwrap_or_default();

    match timeline.iter_mut().find(|e| e.is_open()) {
        Some(open) => {
            open.completed_at = Some(now);
            open.completed_by = actor_id.copied();
            open.wait_minutes = Some((now - open.arrived_at).num_minutes().max(0));
        }
        None => {
            // Legacy rows predate the timeline; backfill the stretch the
            // denormalized columns know about so the journey stays whole.
            timeline.push(TimelineEntry {
                stage: current.clone(),
                arrived_at: encounter.current_stage_entered_at,
                completed_at: Some(now),
                completed_by: actor_id.copied(),
                wait_minutes: Some(
                    (now - encounter.current_stage_entered_at).num_minutes().max(0),
                ),
            });
        }
    }

    timeline.push(TimelineEntry {
        stage: new_stage.clone(),
        arrived_at: now,
        completed_at: new_stage.is_terminal().then_some(now),
        completed_by: new_stage.is_terminal().then(|| actor_id.copied()).flatten(),
        wait_minutes: new_stage.is_terminal().then_some(0),
    });

    let won = encounter_repo::update_stage_state(
        conn,
        &encounter.id,
        &encounter.current_stage,
        new_stage,
        now,
        &routing_status,
        &timeline,
    )?;
    if !won {
        return Err(TransitionError::ConcurrentModification);
    }

    event_repo::append_event(
        conn,
        &encounter.id,
        Some(current),
        new_stage,
        actor_id,
        now,
        context,
    )?;

    tracing::info!(
        encounter = %encounter.id,
        from = current.as_str(),
        to = new_stage.as_str(),
        system = actor_id.is_none(),
        "stage transition applied"
    );

    Ok(TransitionOutcome {
        encounter_id: encounter.id,
        previous_stage: current.clone(),
        new_stage: new_stage.clone(),
        routing_status,
    })
}

fn acknowledge_routing(
    conn: &Connection,
    encounter: &Encounter,
    current: &Stage,
) -> Result<TransitionOutcome, TransitionError> {
    if encounter.routing_status == RoutingStatus::AwaitingRouting {
        encounter_repo::mark_routed(conn, &encounter.id)?;
        tracing::debug!(encounter = %encounter.id, stage = current.as_str(), "routing acknowledged");
    }
    Ok(TransitionOutcome {
        encounter_id: encounter.id,
        previous_stage: current.clone(),
        new_stage: current.clone(),
        routing_status: RoutingStatus::Routed,
    })
}

pub(crate) fn busy_to_conflict(e: rusqlite::Error) -> TransitionError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
            TransitionError::ConcurrentModification
        }
        _ => TransitionError::Database(e.into()),
    }
}
