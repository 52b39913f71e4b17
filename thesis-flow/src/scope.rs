//! Administrative scope resolution
//!
//! An administrator's scope is derived from their own affiliation and the
//! administrative roles they hold. A target is in scope when it matches
//! ANY populated scope attribute. An entirely empty scope is resolved by
//! [`ScopePolicy`].

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::roles::{Role, RoleSet};

/// Program / department / college a user belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub program: Option<String>,
    pub department: Option<String>,
    pub college: Option<String>,
}

impl Affiliation {
    pub fn new(
        program: Option<String>,
        department: Option<String>,
        college: Option<String>,
    ) -> Self {
        Self {
            program: clean(program),
            department: clean(department),
            college: clean(college),
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Attributes an administrator may act upon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub program: Option<String>,
    pub department: Option<String>,
    pub college: Option<String>,
}

impl Scope {
    /// Scope one administrative role grants over its holder's affiliation
    ///
    /// Program chairpersons manage their program and department; deans
    /// manage their department and college. Other roles carry no scope.
    pub fn for_role(role: Role, affiliation: &Affiliation) -> Scope {
        match role {
            Role::ProgramChairperson => Scope {
                program: affiliation.program.clone(),
                department: affiliation.department.clone(),
                college: None,
            },
            Role::Dean => Scope {
                program: None,
                department: affiliation.department.clone(),
                college: affiliation.college.clone(),
            },
            _ => Scope::default(),
        }
    }

    /// Union of the scopes granted by every administrative role held
    pub fn resolve(roles: &RoleSet, affiliation: &Affiliation) -> Scope {
        let mut scope = Scope::default();
        for role in roles.iter() {
            let granted = Scope::for_role(*role, affiliation);
            scope.program = scope.program.or(granted.program);
            scope.department = scope.department.or(granted.department);
            scope.college = scope.college.or(granted.college);
        }
        scope
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_none() && self.department.is_none() && self.college.is_none()
    }
}

/// Behavior when an administrator's scope has no populated attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopePolicy {
    /// Empty scope matches nothing
    #[default]
    Deny,
    /// Empty scope matches everything
    Open,
}

impl ScopePolicy {
    pub fn from_open_flag(open_when_unset: bool) -> Self {
        if open_when_unset {
            ScopePolicy::Open
        } else {
            ScopePolicy::Deny
        }
    }
}

fn same(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Whether `target` lies within `scope`
pub fn within_scope(scope: &Scope, target: &Affiliation, policy: ScopePolicy) -> bool {
    if scope.is_empty() {
        return match policy {
            ScopePolicy::Deny => false,
            ScopePolicy::Open => {
                warn!("Administrator has no program/department/college; open scope policy grants access");
                true
            }
        };
    }

    same(&scope.program, &target.program)
        || same(&scope.department, &target.department)
        || same(&scope.college, &target.college)
}

/// SQL fragment restricting rows of a users table alias to a scope
#[derive(Debug, Clone, PartialEq)]
pub struct ScopePredicate {
    pub sql: String,
    pub binds: Vec<String>,
}

/// Build the WHERE fragment equivalent to [`within_scope`] for `alias`
///
/// The fragment uses positional `?` placeholders; bind `binds` in order.
pub fn scope_predicate(scope: &Scope, policy: ScopePolicy, alias: &str) -> ScopePredicate {
    if scope.is_empty() {
        let sql = match policy {
            ScopePolicy::Deny => "0 = 1",
            ScopePolicy::Open => "1 = 1",
        };
        return ScopePredicate {
            sql: sql.to_string(),
            binds: Vec::new(),
        };
    }

    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for (column, value) in [
        ("program", &scope.program),
        ("department", &scope.department),
        ("college", &scope.college),
    ] {
        if let Some(value) = value {
            clauses.push(format!("{}.{} = ? COLLATE NOCASE", alias, column));
            binds.push(value.clone());
        }
    }

    ScopePredicate {
        sql: format!("({})", clauses.join(" OR ")),
        binds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn affiliation(program: &str, department: &str, college: &str) -> Affiliation {
        Affiliation::new(
            Some(program.to_string()),
            Some(department.to_string()),
            Some(college.to_string()),
        )
    }

    #[test]
    fn test_program_chair_scope() {
        let roles: RoleSet = [Role::ProgramChairperson].into_iter().collect();
        let scope = Scope::resolve(&roles, &affiliation("MSIT", "Computing", "CCS"));
        assert_eq!(scope.program.as_deref(), Some("MSIT"));
        assert_eq!(scope.department.as_deref(), Some("Computing"));
        assert_eq!(scope.college, None);
    }

    #[test]
    fn test_dean_scope() {
        let roles: RoleSet = [Role::Dean].into_iter().collect();
        let scope = Scope::resolve(&roles, &affiliation("MSIT", "Computing", "CCS"));
        assert_eq!(scope.program, None);
        assert_eq!(scope.college.as_deref(), Some("CCS"));
    }

    #[test]
    fn test_any_populated_attribute_matches() {
        let scope = Scope {
            program: Some("MSIT".into()),
            department: None,
            college: None,
        };
        let inside = affiliation("msit", "Physics", "CAS");
        let outside = affiliation("MSCS", "Computing", "CCS");
        assert!(within_scope(&scope, &inside, ScopePolicy::Deny));
        assert!(!within_scope(&scope, &outside, ScopePolicy::Deny));
    }

    #[test]
    fn test_empty_scope_follows_policy() {
        let target = affiliation("MSIT", "Computing", "CCS");
        assert!(!within_scope(&Scope::default(), &target, ScopePolicy::Deny));
        assert!(within_scope(&Scope::default(), &target, ScopePolicy::Open));
    }

    #[test]
    fn test_blank_affiliation_fields_are_unset() {
        let a = Affiliation::new(Some("  ".into()), None, Some(" CCS ".into()));
        assert_eq!(a.program, None);
        assert_eq!(a.college.as_deref(), Some("CCS"));
    }

    #[test]
    fn test_predicate_mirrors_scope() {
        let scope = Scope {
            program: Some("MSIT".into()),
            department: Some("Computing".into()),
            college: None,
        };
        let p = scope_predicate(&scope, ScopePolicy::Deny, "u");
        assert_eq!(
            p.sql,
            "(u.program = ? COLLATE NOCASE OR u.department = ? COLLATE NOCASE)"
        );
        assert_eq!(p.binds, vec!["MSIT".to_string(), "Computing".to_string()]);

        assert_eq!(scope_predicate(&Scope::default(), ScopePolicy::Deny, "u").sql, "0 = 1");
        assert_eq!(scope_predicate(&Scope::default(), ScopePolicy::Open, "u").sql, "1 = 1");
    }
}
