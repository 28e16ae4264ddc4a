use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{LineItemType, PaymentStatus};

/// A billable unit attached to an encounter. Owned by the billing
/// collaborator; the lifecycle engine reads these to evaluate payment gates
/// and order existence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub encounter_id: Uuid,
    pub item_type: LineItemType,
    pub description: String,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub ordered_at: DateTime<Utc>,
}
