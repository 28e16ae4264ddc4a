//! Caller scoping and the capability oracle.
//!
//! Every operation takes an explicit `CareContext` (tenant, facility and the
//! session identity) instead of relying on ambient session state. Role
//! semantics are resolved here and nowhere else: the rest of the engine asks
//! "which capabilities does this role hold" and "is this role a
//! super-operator" without knowing what the roles mean.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::staff;
use crate::db::DatabaseError;
use crate::models::enums::{Capability, StaffRole};
use crate::models::Staff;

/// The scope every engine call runs under. Built by the transport layer
/// (HTTP headers, CLI flags); nothing in the engine reads session state
/// implicitly.
#[derive(Debug, Clone)]
pub struct CareContext {
    pub tenant_id: String,
    pub facility_id: String,
    /// The authenticated staff member of the session, when there is one.
    pub session_staff_id: Option<Uuid>,
}

impl CareContext {
    pub fn new(tenant_id: impl Into<String>, facility_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            facility_id: facility_id.into(),
            session_staff_id: None,
        }
    }

    pub fn with_session(mut self, staff_id: Uuid) -> Self {
        self.session_staff_id = Some(staff_id);
        self
    }
}

/// Capabilities held by a role. Single source of truth for the role →
/// capability mapping the RBAC collaborator would otherwise provide.
pub fn capabilities_for(role: &StaffRole) -> &'static [Capability] {
    match role {
        StaffRole::Receptionist => &[Capability::Reception],
        StaffRole::Cashier => &[Capability::Billing],
        StaffRole::Nurse => &[Capability::Triage, Capability::Ward],
        StaffRole::Doctor => &[Capability::Consultation, Capability::Ward],
        StaffRole::LabTech => &[Capability::Laboratory],
        StaffRole::ImagingTech => &[Capability::Imaging],
        StaffRole::Pharmacist => &[Capability::Pharmacy],
        StaffRole::Admin => &[
            Capability::Reception,
            Capability::Billing,
            Capability::Triage,
            Capability::Consultation,
            Capability::Laboratory,
            Capability::Imaging,
            Capability::Pharmacy,
            Capability::Ward,
        ],
    }
}

/// Super-operators skip role and transition validation entirely.
pub fn is_super_operator(role: &StaffRole) -> bool {
    matches!(role, StaffRole::Admin)
}

pub fn holds_capability(role: &StaffRole, capability: &Capability) -> bool {
    capabilities_for(role).contains(capability)
}

/// Resolve the acting identity: an explicit actor wins over the session one.
/// `None` means the identity could not be resolved within the caller's
/// tenant; the caller treats that as unauthenticated.
pub fn resolve_actor(
    conn: &Connection,
    ctx: &CareContext,
    explicit_actor: Option<Uuid>,
) -> Result<Option<Staff>, DatabaseError> {
    let Some(actor_id) = explicit_actor.or(ctx.session_staff_id) else {
        return Ok(None);
    };
    staff::get_staff(conn, &ctx.tenant_id, &actor_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::staff::insert_staff;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn every_role_holds_at_least_one_capability() {
        for role in [
            StaffRole::Receptionist,
            StaffRole::Cashier,
            StaffRole::Nurse,
            StaffRole::Doctor,
            StaffRole::LabTech,
            StaffRole::ImagingTech,
            StaffRole::Pharmacist,
            StaffRole::Admin,
        ] {
            assert!(!capabilities_for(&role).is_empty());
        }
    }

    #[test]
    fn only_admin_is_super_operator() {
        assert!(is_super_operator(&StaffRole::Admin));
        assert!(!is_super_operator(&StaffRole::Doctor));
        assert!(!is_super_operator(&StaffRole::Cashier));
    }

    #[test]
    fn nurse_cannot_bill_cashier_cannot_triage() {
        assert!(holds_capability(&StaffRole::Nurse, &Capability::Triage));
        assert!(!holds_capability(&StaffRole::Nurse, &Capability::Billing));
        assert!(holds_capability(&StaffRole::Cashier, &Capability::Billing));
        assert!(!holds_capability(&StaffRole::Cashier, &Capability::Triage));
    }

    #[test]
    fn explicit_actor_wins_over_session() {
        let conn = open_memory_database().unwrap();
        let session_staff = Staff {
            id: Uuid::new_v4(),
            tenant_id: "tn-1".into(),
            full_name: "Session Cashier".into(),
            role: StaffRole::Cashier,
        };
        let explicit_staff = Staff {
            id: Uuid::new_v4(),
            tenant_id: "tn-1".into(),
            full_name: "Explicit Nurse".into(),
            role: StaffRole::Nurse,
        };
        insert_staff(&conn, &session_staff).unwrap();
        insert_staff(&conn, &explicit_staff).unwrap();

        let ctx = CareContext::new("tn-1", "fc-1").with_session(session_staff.id);
        let resolved = resolve_actor(&conn, &ctx, Some(explicit_staff.id)).unwrap().unwrap();
        assert_eq!(resolved.id, explicit_staff.id);

        let resolved = resolve_actor(&conn, &ctx, None).unwrap().unwrap();
        assert_eq!(resolved.id, session_staff.id);
    }

    #[test]
    fn unresolved_identity_is_none() {
        let conn = open_memory_database().unwrap();
        let ctx = CareContext::new("tn-1", "fc-1");
        assert!(resolve_actor(&conn, &ctx, None).unwrap().is_none());
        assert!(resolve_actor(&conn, &ctx, Some(Uuid::new_v4())).unwrap().is_none());
    }

    #[test]
    fn actor_from_another_tenant_does_not_resolve() {
        let conn = open_memory_database().unwrap();
        let other = Staff {
            id: Uuid::new_v4(),
            tenant_id: "tn-2".into(),
            full_name: "Other Tenant".into(),
            role: StaffRole::Doctor,
        };
        insert_staff(&conn, &other).unwrap();

        let ctx = CareContext::new("tn-1", "fc-1");
        assert!(resolve_actor(&conn, &ctx, Some(other.id)).unwrap().is_none());
    }
}
