//! Roles and role sets
//!
//! A user holds any combination of roles. Roles are only ever added during
//! normal workflow operation (assigning an adviser grants `adviser`,
//! approving a committee grants `panel` / `committee_chairperson`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Adviser,
    Faculty,
    Panel,
    CommitteeChairperson,
    ProgramChairperson,
    Dean,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Student,
        Role::Adviser,
        Role::Faculty,
        Role::Panel,
        Role::CommitteeChairperson,
        Role::ProgramChairperson,
        Role::Dean,
    ];

    /// Code stored in `user_roles.role`
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Adviser => "adviser",
            Role::Faculty => "faculty",
            Role::Panel => "panel",
            Role::CommitteeChairperson => "committee_chairperson",
            Role::ProgramChairperson => "program_chairperson",
            Role::Dean => "dean",
        }
    }

    /// Roles that may sit on a defense committee or advise
    pub fn is_faculty_like(&self) -> bool {
        matches!(
            self,
            Role::Faculty | Role::Adviser | Role::Panel | Role::CommitteeChairperson
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| WorkflowError::Validation(format!("unknown role '{}'", s)))
    }
}

/// Set of roles held by one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role; returns true when it was not already held
    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn contains_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.0.contains(r))
    }

    /// Holds at least one role that qualifies for committee or adviser duty
    pub fn is_faculty_eligible(&self) -> bool {
        self.0.iter().any(Role::is_faculty_like)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_parse_accepts_display_spelling() {
        assert_eq!(
            "Program Chairperson".parse::<Role>().unwrap(),
            Role::ProgramChairperson
        );
        assert!("registrar".parse::<Role>().is_err());
    }

    #[test]
    fn test_insert_reports_new_roles_only() {
        let mut roles = RoleSet::new();
        assert!(roles.insert(Role::Faculty));
        assert!(!roles.insert(Role::Faculty));
        assert!(roles.insert(Role::Adviser));
        assert!(roles.contains(Role::Faculty));
        assert!(roles.contains_any(&[Role::Dean, Role::Adviser]));
        assert!(!roles.contains_any(&[Role::Dean, Role::Student]));
    }

    #[test]
    fn test_faculty_eligibility() {
        let student: RoleSet = [Role::Student].into_iter().collect();
        let dean: RoleSet = [Role::Dean].into_iter().collect();
        let faculty: RoleSet = [Role::Faculty, Role::Dean].into_iter().collect();
        assert!(!student.is_faculty_eligible());
        assert!(!dean.is_faculty_eligible());
        assert!(faculty.is_faculty_eligible());
    }
}
