use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{RoutingStatus, Stage};

/// One episode of a patient's visit, registration through discharge or
/// cancellation. Mutated only by the transition engine; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: Uuid,
    pub tenant_id: String,
    pub facility_id: String,
    pub patient_id: Uuid,
    pub current_stage: Stage,
    pub current_stage_entered_at: DateTime<Utc>,
    pub routing_status: RoutingStatus,
    pub consultation_fee: f64,
    pub total_billed: f64,
    /// Ordered journey timeline. `None` for encounters created before
    /// timeline tracking existed (legacy rows).
    pub timeline: Option<Vec<TimelineEntry>>,
    pub created_at: DateTime<Utc>,
}

/// One stop on the journey timeline. Open (no `completed_at`) while the
/// patient is at that stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub stage: Stage,
    pub arrived_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_minutes: Option<i64>,
}

impl TimelineEntry {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

/// Where the current stage was read from. Legacy rows predate the journey
/// timeline and only carry the denormalized column; keeping the source
/// tagged stops new code from leaning on the fallback by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentStage {
    /// Read from the timeline's open entry (or its last closed entry for
    /// terminal encounters).
    Tracked(Stage),
    /// Read from the denormalized `current_stage` column of a pre-timeline
    /// encounter.
    LegacyField(Stage),
}

impl CurrentStage {
    pub fn stage(&self) -> &Stage {
        match self {
            CurrentStage::Tracked(s) | CurrentStage::LegacyField(s) => s,
        }
    }
}

impl Encounter {
    /// The single open timeline entry, if any.
    pub fn open_entry(&self) -> Option<&TimelineEntry> {
        self.timeline
            .as_ref()
            .and_then(|t| t.iter().find(|e| e.is_open()))
    }

    /// Resolve the current stage, preferring the timeline's open entry and
    /// falling back to the denormalized column only for legacy encounters.
    pub fn resolved_stage(&self) -> CurrentStage {
        match &self.timeline {
            Some(timeline) if !timeline.is_empty() => {
                let stage = timeline
                    .iter()
                    .find(|e| e.is_open())
                    .or_else(|| timeline.last())
                    .map(|e| e.stage.clone())
                    .unwrap_or_else(|| self.current_stage.clone());
                CurrentStage::Tracked(stage)
            }
            _ => CurrentStage::LegacyField(self.current_stage.clone()),
        }
    }
}
