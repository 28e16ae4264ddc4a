//! The billing seam: raising charges and the settlement notification hook.
//!
//! Line items are owned by the billing collaborator; the lifecycle engine
//! only needs to hear about settlements. `settle_line_item` commits the
//! payment update first and then fires the payment-gated auto-advance as a
//! best-effort follow-up; a routing failure must never undo a payment.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::access::{self, CareContext};
use crate::autoadvance;
use crate::db::repository::{
    encounter as encounter_repo, line_item as line_item_repo,
};
use crate::db::DatabaseError;
use crate::models::enums::{LineItemType, PaymentStatus};
use crate::models::LineItem;
use crate::projection;
use crate::transition::TransitionError;

/// Attach a new charge (consultation follow-up, lab order, imaging order,
/// prescription, sundry service) to an encounter.
pub fn add_line_item(
    conn: &Connection,
    ctx: &CareContext,
    encounter_id: &Uuid,
    item_type: LineItemType,
    description: &str,
    amount: f64,
    actor_id: Option<Uuid>,
) -> Result<LineItem, TransitionError> {
    access::resolve_actor(conn, ctx, actor_id)?
        .ok_or(TransitionError::Unauthenticated)?;

    // Scope check: an encounter outside the caller's facility is not found.
    match encounter_repo::get_encounter(conn, &ctx.tenant_id, &ctx.facility_id, encounter_id) {
        Ok(_) => {}
        Err(DatabaseError::NotFound { .. }) => return Err(TransitionError::NotFound(*encounter_id)),
        Err(e) => return Err(e.into()),
    }

    let item = LineItem {
        id: Uuid::new_v4(),
        encounter_id: *encounter_id,
        item_type,
        description: description.into(),
        amount,
        payment_status: PaymentStatus::Unpaid,
        ordered_at: Utc::now(),
    };
    line_item_repo::insert_line_item(conn, &item)?;
    encounter_repo::add_to_total_billed(conn, encounter_id, amount)?;

    projection::refresh_after_write(conn, ctx, encounter_id);

    Ok(item)
}

/// Settlement notification hook. Updates the item's payment status and only
/// after that commit rechecks the encounter's payment gate.
pub fn settle_line_item(
    conn: &Connection,
    ctx: &CareContext,
    line_item_id: &Uuid,
    status: PaymentStatus,
    actor_id: Option<Uuid>,
) -> Result<LineItem, TransitionError> {
    access::resolve_actor(conn, ctx, actor_id)?
        .ok_or(TransitionError::Unauthenticated)?;

    let item = match line_item_repo::get_line_item(conn, line_item_id) {
        Ok(item) => item,
        Err(DatabaseError::NotFound { .. }) => return Err(TransitionError::NotFound(*line_item_id)),
        Err(e) => return Err(e.into()),
    };

    // Cross-tenant settlements read as not found, same as encounter lookups.
    match encounter_repo::get_encounter(conn, &ctx.tenant_id, &ctx.facility_id, &item.encounter_id)
    {
        Ok(_) => {}
        Err(DatabaseError::NotFound { .. }) => return Err(TransitionError::NotFound(*line_item_id)),
        Err(e) => return Err(e.into()),
    }

    line_item_repo::update_payment_status(conn, line_item_id, &status)?;
    tracing::info!(
        item = %line_item_id,
        encounter = %item.encounter_id,
        status = status.as_str(),
        "line item settled"
    );

    projection::refresh_after_write(conn, ctx, &item.encounter_id);

    // The payment above is committed; whatever happens to routing now is the
    // engine's problem, not the payer's.
    if status.is_settled() {
        autoadvance::on_settlement_best_effort(conn, ctx, &item.encounter_id);
    }

    Ok(LineItem { payment_status: status, ..item })
}
