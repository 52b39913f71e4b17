//! Acting user
//!
//! Every workflow operation is performed on behalf of an [`Actor`]: the
//! user's id, roles and affiliation loaded at request time.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, WorkflowError};
use crate::roles::{Role, RoleSet};
use crate::scope::{within_scope, Affiliation, Scope, ScopePolicy};

#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub id: Uuid,
    pub display_name: String,
    pub roles: RoleSet,
    pub affiliation: Affiliation,
}

impl Actor {
    pub fn has(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    /// Fail with `MissingCapability` unless the actor holds `role`
    pub fn require(&self, role: Role) -> Result<()> {
        self.require_any(&[role])
    }

    /// Fail with `MissingCapability` unless the actor holds one of `roles`
    pub fn require_any(&self, roles: &[Role]) -> Result<()> {
        if self.roles.contains_any(roles) {
            return Ok(());
        }
        let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
        Err(WorkflowError::MissingCapability(format!(
            "user {} needs one of [{}]",
            self.id,
            names.join(", ")
        )))
    }

    /// Administrative scope from the roles the actor holds
    pub fn scope(&self) -> Scope {
        Scope::resolve(&self.roles, &self.affiliation)
    }

    /// Fail with `OutOfScope` unless `target` lies within the actor's scope
    pub fn require_scope(&self, target: &Affiliation, policy: ScopePolicy, what: &str) -> Result<()> {
        if within_scope(&self.scope(), target, policy) {
            Ok(())
        } else {
            Err(WorkflowError::OutOfScope(format!(
                "{} is outside the scope of user {}",
                what, self.id
            )))
        }
    }
}
