//! The stage catalog: which stages a patient may move to next, and which
//! capability a staff member needs to move them out of the current one.
//! Pure lookups; the catalog never touches the database.

use crate::models::enums::{Capability, Stage};

/// Allowed next stages. Terminal stages return an empty slice. Any
/// non-terminal stage may also be cancelled.
pub fn allowed_next(stage: &Stage) -> &'static [Stage] {
    match stage {
        Stage::Registered => &[Stage::PayingConsultation, Stage::Cancelled],
        Stage::PayingConsultation => &[Stage::AtTriage, Stage::Cancelled],
        Stage::AtTriage => &[Stage::VitalsTaken, Stage::Cancelled],
        Stage::VitalsTaken => &[Stage::WithDoctor, Stage::Cancelled],
        Stage::WithDoctor => &[
            Stage::PayingDiagnosis,
            Stage::PayingPharmacy,
            Stage::Admitted,
            Stage::Discharged,
            Stage::Cancelled,
        ],
        Stage::PayingDiagnosis => &[
            Stage::AtLab,
            Stage::AtImaging,
            Stage::AtPharmacy,
            Stage::WithDoctor,
            Stage::Cancelled,
        ],
        // A patient with both lab and imaging orders visits the lab first.
        Stage::AtLab => &[Stage::WithDoctor, Stage::AtImaging, Stage::Cancelled],
        Stage::AtImaging => &[Stage::WithDoctor, Stage::Cancelled],
        Stage::PayingPharmacy => &[Stage::AtPharmacy, Stage::Cancelled],
        Stage::AtPharmacy => &[Stage::Discharged, Stage::Cancelled],
        Stage::Admitted => &[Stage::Discharged, Stage::Cancelled],
        Stage::Discharged | Stage::Cancelled => &[],
    }
}

/// The capability required to move a patient out of a stage. Terminal stages
/// have no leaving capability.
pub fn required_capability(stage: &Stage) -> Option<Capability> {
    match stage {
        Stage::Registered => Some(Capability::Reception),
        Stage::PayingConsultation | Stage::PayingDiagnosis | Stage::PayingPharmacy => {
            Some(Capability::Billing)
        }
        Stage::AtTriage | Stage::VitalsTaken => Some(Capability::Triage),
        Stage::WithDoctor => Some(Capability::Consultation),
        Stage::AtLab => Some(Capability::Laboratory),
        Stage::AtImaging => Some(Capability::Imaging),
        Stage::AtPharmacy => Some(Capability::Pharmacy),
        Stage::Admitted => Some(Capability::Ward),
        Stage::Discharged | Stage::Cancelled => None,
    }
}

pub fn is_allowed(from: &Stage, to: &Stage) -> bool {
    allowed_next(from).contains(to)
}
