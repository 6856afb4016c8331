//! Access gate: capability lookup over roles and the organizer relation.
//!
//! Roles form a strict ladder (regular < cashier < manager < superuser); the
//! organizer relation grants event-scoped management to an otherwise-regular
//! user without elevating their global role.

use crate::models::user::Role;

/// Capability set checked by route handlers and engine services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Read published/own resources.
    View,
    /// Record purchases, process redemptions.
    Create,
    /// Manage promotions, events, adjustments, sub-manager role changes.
    Moderate,
    /// Manager/superuser assignment.
    Administer,
}

/// Minimum role holding each capability.
fn required_role(capability: Capability) -> Role {
    match capability {
        Capability::View => Role::Regular,
        Capability::Create => Role::Cashier,
        Capability::Moderate => Role::Manager,
        Capability::Administer => Role::Superuser,
    }
}

/// True when `role` holds `capability`. Higher roles hold every lower
/// capability.
pub fn role_has(role: Role, capability: Capability) -> bool {
    role.at_least(required_role(capability))
}

/// Event-scoped management: global moderators, or organizers of that event.
pub fn can_manage_event(role: Role, is_organizer: bool) -> bool {
    role_has(role, Capability::Moderate) || is_organizer
}

/// Why a role change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChangeDenied {
    /// The actor's role cannot assign the requested role.
    ActorRank,
    /// Suspicious users cannot be made cashiers.
    SuspiciousCashier,
}

/// Checks whether `actor` may set a user's role to `new_role`.
///
/// Managers assign regular/cashier; only superusers assign manager or
/// superuser. Suspicious users are barred from the cashier role regardless
/// of who asks.
pub fn check_role_change(
    actor: Role,
    new_role: Role,
    target_suspicious: bool,
) -> Result<(), RoleChangeDenied> {
    let needed = match new_role {
        Role::Regular | Role::Cashier => Role::Manager,
        Role::Manager | Role::Superuser => Role::Superuser,
    };
    if !actor.at_least(needed) {
        return Err(RoleChangeDenied::ActorRank);
    }
    if new_role == Role::Cashier && target_suspicious {
        return Err(RoleChangeDenied::SuspiciousCashier);
    }
    Ok(())
}
