use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vitals {
    pub id: Uuid,
    pub encounter_id: Uuid,
    pub recorded_by: Option<Uuid>,
    pub temperature_c: Option<f64>,
    pub pulse_bpm: Option<i64>,
    pub systolic_mmhg: Option<i64>,
    pub diastolic_mmhg: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

impl Vitals {
    /// Compact one-line summary for queue rows, e.g. "37.2°C · 82bpm · 120/80".
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(t) = self.temperature_c {
            parts.push(format!("{t:.1}°C"));
        }
        if let Some(p) = self.pulse_bpm {
            parts.push(format!("{p}bpm"));
        }
        if let (Some(s), Some(d)) = (self.systolic_mmhg, self.diastolic_mmhg) {
            parts.push(format!("{s}/{d}"));
        }
        parts.join(" · ")
    }
}
