//! Space access control.
//!
//! The owner of a space may do anything with it. Everyone may read a
//! public space. Beyond that, a personal space (owner == creator) is closed
//! to other users, while an organization space is opened to the
//! organization's members according to their role.
//!
//! Callers turn a denial into `NotFound` so that private spaces do not
//! reveal their existence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use spacehub_state::Space;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Decides whether `user` may perform `action` on `space`.
pub trait PermissionChecker: Send + Sync {
    fn check(&self, user: &str, space: &Space, action: Action) -> bool;
}

/// Membership role inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Read,
    Write,
    Admin,
}

impl Role {
    fn allows(self, action: Action) -> bool {
        match action {
            Action::Read => true,
            Action::Create | Action::Update => self >= Role::Write,
            Action::Delete => self == Role::Admin,
        }
    }
}

/// Permission checker backed by a static organization → member → role table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgPermissions {
    orgs: HashMap<String, HashMap<String, Role>>,
}

impl OrgPermissions {
    pub fn new(orgs: HashMap<String, HashMap<String, Role>>) -> Self {
        Self { orgs }
    }

    pub fn grant(&mut self, org: &str, member: &str, role: Role) {
        self.orgs
            .entry(org.to_string())
            .or_default()
            .insert(member.to_string(), role);
    }

    fn role(&self, org: &str, member: &str) -> Option<Role> {
        self.orgs.get(org)?.get(member).copied()
    }
}

impl PermissionChecker for OrgPermissions {
    fn check(&self, user: &str, space: &Space, action: Action) -> bool {
        if user == space.owner {
            return true;
        }
        if action == Action::Read && space.is_public() {
            return true;
        }
        if space.is_personal() {
            return false;
        }
        self.role(&space.owner, user)
            .is_some_and(|role| role.allows(action))
    }
}
