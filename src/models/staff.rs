use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::StaffRole;

/// Minimal mirror of the RBAC collaborator's staff record. Role semantics
/// (capabilities, super-operator) are resolved in `access`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub tenant_id: String,
    pub full_name: String,
    pub role: StaffRole,
}
