use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Stage;

/// One entry of the append-only stage transition ledger. The rowid gives the
/// total order per encounter; the latest event's `new_stage` always equals
/// the encounter's current stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransitionEvent {
    pub id: i64,
    pub encounter_id: Uuid,
    /// `None` for the registration event.
    pub previous_stage: Option<Stage>,
    pub new_stage: Stage,
    /// `None` when the transition was system-driven (payment auto-advance).
    pub actor_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub context: Option<String>,
}
