use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Stage {
    Registered => "registered",
    PayingConsultation => "paying_consultation",
    AtTriage => "at_triage",
    VitalsTaken => "vitals_taken",
    WithDoctor => "with_doctor",
    PayingDiagnosis => "paying_diagnosis",
    AtLab => "at_lab",
    AtImaging => "at_imaging",
    PayingPharmacy => "paying_pharmacy",
    AtPharmacy => "at_pharmacy",
    Admitted => "admitted",
    Discharged => "discharged",
    Cancelled => "cancelled",
});

impl Stage {
    /// Terminal stages close the journey; nothing leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Discharged | Stage::Cancelled)
    }

    /// Payment-gated stages: settlement of all charges advances the
    /// encounter automatically.
    pub fn is_paying(&self) -> bool {
        matches!(
            self,
            Stage::PayingConsultation | Stage::PayingDiagnosis | Stage::PayingPharmacy
        )
    }
}

str_enum!(RoutingStatus {
    Routed => "routed",
    AwaitingRouting => "awaiting_routing",
});

str_enum!(PaymentStatus {
    Unpaid => "unpaid",
    Partial => "partial",
    Paid => "paid",
    Waived => "waived",
});

impl PaymentStatus {
    /// Settled items no longer hold back a payment gate.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Waived)
    }
}

str_enum!(LineItemType {
    Consultation => "consultation",
    Lab => "lab",
    Imaging => "imaging",
    Medication => "medication",
    Service => "service",
});

str_enum!(StaffRole {
    Receptionist => "receptionist",
    Cashier => "cashier",
    Nurse => "nurse",
    Doctor => "doctor",
    LabTech => "lab_tech",
    ImagingTech => "imaging_tech",
    Pharmacist => "pharmacist",
    Admin => "admin",
});

str_enum!(Capability {
    Reception => "reception",
    Billing => "billing",
    Triage => "triage",
    Consultation => "consultation",
    Laboratory => "laboratory",
    Imaging => "imaging",
    Pharmacy => "pharmacy",
    Ward => "ward",
});

str_enum!(Dashboard {
    Nurse => "nurse",
    Doctor => "doctor",
    Cashier => "cashier",
});
