#![warn(missing_docs)]
//! # warden-policy
//!
//! ## Purpose
//! Stateless permission evaluation for the `warden` admin console.
//!
//! ## Responsibilities
//! - Rank roles on a fixed integer worth scale.
//! - Provide the comparison primitives every feature permission composes.
//! - Map each administrative action to an explicit allow expression.
//!
//! ## Data flow
//! UI/feature code snapshots the active [`Identity`] from the session layer
//! at call time and asks [`is_allowed`] before enabling an action. The
//! backend stays authoritative; these checks only gate the UI.
//!
//! ## Ownership and lifetimes
//! All predicates borrow their inputs; nothing is cached between calls, so a
//! changed identity is picked up by the next check.
//!
//! ## Error model
//! Predicates are total and infallible. A missing identity denies every
//! action: evaluation fails closed, never open.
//!
//! ## Example
//! ```rust
//! use warden_core::{Identity, Role};
//! use warden_policy::{AdminAction, is_allowed};
//!
//! let manager = Identity::new("u-1", Some(Role::Manager), false);
//! assert!(is_allowed(Some(&manager), AdminAction::CreateUser));
//! assert!(!is_allowed(None, AdminAction::CreateUser));
//! ```

use warden_core::{Identity, Role};

/// Worth assigned to role names that are not part of the known table.
///
/// Strictly below [`Role::Blocked`] so an unrecognized backend role can never
/// outrank a listed one.
pub const UNLISTED_ROLE_WORTH: i32 = -100;

/// Returns the fixed worth of a role on the total privilege order.
pub fn worth(role: Role) -> i32 {
    match role {
        Role::Blocked => -99,
        Role::NotRelevant => -1,
        Role::Visitor => 0,
        Role::Contributor => 10,
        Role::Manager => 20,
        Role::Admin => 98,
    }
}

/// Returns the worth of a backend wire role name.
///
/// Names outside the known table evaluate to [`UNLISTED_ROLE_WORTH`].
pub fn name_worth(name: &str) -> i32 {
    Role::from_name(name).map(worth).unwrap_or(UNLISTED_ROLE_WORTH)
}

/// Returns `true` when `identity` meets the `required` role floor.
///
/// Global administrators pass every floor regardless of nominal role; an
/// identity without a role is evaluated as [`Role::Visitor`].
pub fn is_same_role_or_higher(required: Role, identity: &Identity) -> bool {
    identity.is_global_admin || worth(required) <= effective_worth(identity)
}

/// Returns `true` when `identity` strictly outranks the `reference` role.
///
/// Used when an actor must outrank a *target* identity rather than merely
/// meet a floor; equal rank is not enough.
pub fn is_strictly_higher(reference: Role, identity: &Identity) -> bool {
    identity.is_global_admin || worth(reference) < effective_worth(identity)
}

/// Returns `true` when `identity` is the target itself and is not blocked.
pub fn is_self_and_not_blocked(identity: &Identity, target: &Identity) -> bool {
    identity.id == target.id && identity.role != Some(Role::Blocked)
}

fn effective_worth(identity: &Identity) -> i32 {
    worth(identity.role.unwrap_or(Role::Visitor))
}

fn target_role(target: &Identity) -> Role {
    target.role.unwrap_or(Role::Visitor)
}

/// Privileged console action evaluated against the active identity.
///
/// Target-carrying variants borrow the identity the action would affect; the
/// others are gated by a role floor alone.
#[derive(Debug, Clone, Copy)]
pub enum AdminAction<'a> {
    /// Browse the user listing.
    ListUsers,
    /// Create a new user account.
    CreateUser,
    /// Edit the account details of `target`.
    EditUser {
        /// Identity the edit would apply to.
        target: &'a Identity,
    },
    /// Delete the account of `target`.
    DeleteUser {
        /// Identity the deletion would apply to.
        target: &'a Identity,
    },
    /// Change the assigned role of any user.
    SetUserRole,
    /// Create a new group.
    CreateGroup,
    /// Edit group details.
    EditGroup,
    /// Delete a group.
    DeleteGroup,
    /// Add or remove ordinary group members.
    EditGroupMembers,
    /// Add or remove members of a privilege-granting group.
    EditPrivilegeGroupMembers,
}

/// Evaluates whether the active identity may perform `action`.
///
/// # Semantics
/// Every arm is a short boolean expression over the comparison primitives and
/// a per-action role floor. `None` (no resolved identity) denies everything.
pub fn is_allowed(identity: Option<&Identity>, action: AdminAction<'_>) -> bool {
    let Some(identity) = identity else {
        return false;
    };

    match action {
        AdminAction::ListUsers => is_same_role_or_higher(Role::Visitor, identity),
        AdminAction::CreateUser => is_same_role_or_higher(Role::Contributor, identity),
        AdminAction::EditUser { target } => {
            is_self_and_not_blocked(identity, target)
                || is_same_role_or_higher(Role::Admin, identity)
                || (is_same_role_or_higher(Role::Manager, identity)
                    && is_strictly_higher(target_role(target), identity))
        }
        AdminAction::DeleteUser { target } => {
            is_same_role_or_higher(Role::Admin, identity)
                || (is_same_role_or_higher(Role::Manager, identity)
                    && is_strictly_higher(target_role(target), identity))
        }
        AdminAction::SetUserRole => is_same_role_or_higher(Role::Admin, identity),
        AdminAction::CreateGroup => is_same_role_or_higher(Role::Contributor, identity),
        AdminAction::EditGroup | AdminAction::DeleteGroup => {
            is_same_role_or_higher(Role::Manager, identity)
        }
        AdminAction::EditGroupMembers => is_same_role_or_higher(Role::Contributor, identity),
        AdminAction::EditPrivilegeGroupMembers => is_same_role_or_higher(Role::Admin, identity),
    }
}
