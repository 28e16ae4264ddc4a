use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{PaymentStatus, RoutingStatus, Stage};

/// One cached wide row per active encounter per dashboard. Derived from the
/// encounter, patient, vitals and line items; never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueProjectionRow {
    pub encounter_id: Uuid,
    pub patient_name: String,
    pub patient_age_years: Option<i64>,
    pub patient_sex: Option<String>,
    pub current_stage: Stage,
    pub entered_at: DateTime<Utc>,
    pub wait_minutes: i64,
    pub routing_status: RoutingStatus,
    pub vitals_summary: Option<String>,
    pub consultation_payment_status: PaymentStatus,
    pub overall_payment_status: PaymentStatus,
    pub has_unpaid_items: bool,
}

/// A cashier routing-queue row: the system already advanced the stage after
/// payment; a human still has to walk the patient there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwaitingRoutingRow {
    pub encounter_id: Uuid,
    pub patient_name: String,
    pub current_stage: Stage,
    pub pending_items: Vec<String>,
    pub wait_minutes: i64,
    pub suggested_next_stage: Stage,
}
