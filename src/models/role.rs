//! Authorization entities: roles, permissions and assignments.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{invalid, require, EntityKind, Id, Validate};
use crate::{Error, Result};

/// A named group of users scoped to an organization or a project.
///
/// Roles double as teams: membership is a `MEMBER_OF` edge and the
/// container holds the role through `HAS_TEAM`. System roles are seeded
/// once and carry well-known IDs outside the regular ID alphabet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Id,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Member user IDs
    #[serde(default)]
    pub members: Vec<Id>,

    /// Permission edge IDs granted to the role
    #[serde(default)]
    pub permissions: Vec<Id>,

    /// True for seeded system roles; never settable through the repository
    #[serde(default)]
    pub system: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Role {
    /// Create a new non-system role with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Id::nil(EntityKind::Role),
            name: name.into(),
            description: None,
            members: Vec::new(),
            permissions: Vec::new(),
            system: false,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Role {
    fn validate(&self) -> Result<()> {
        require("role", "name", &self.name)
    }
}

/// Seeded instance-wide roles with fixed node IDs.
///
/// Members of a system role bypass per-resource permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRole {
    Owner,
    Admin,
    Support,
}

impl SystemRole {
    /// The fixed node ID of the seeded role.
    pub fn id(&self) -> &'static str {
        match self {
            SystemRole::Owner => "SystemRoleOwner",
            SystemRole::Admin => "SystemRoleAdmin",
            SystemRole::Support => "SystemRoleSupport",
        }
    }

    pub fn all() -> &'static [SystemRole] {
        &[SystemRole::Owner, SystemRole::Admin, SystemRole::Support]
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SystemRole::Owner => "owner",
            SystemRole::Admin => "admin",
            SystemRole::Support => "support",
        };
        write!(f, "{}", s)
    }
}

/// Capability level carried by a permission edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Read,
    Write,
    Create,
    Delete,
    /// Implies every other kind
    All,
}

impl PermissionKind {
    pub fn all() -> &'static [PermissionKind] {
        &[
            PermissionKind::Read,
            PermissionKind::Write,
            PermissionKind::Create,
            PermissionKind::Delete,
            PermissionKind::All,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::Read => "read",
            PermissionKind::Write => "write",
            PermissionKind::Create => "create",
            PermissionKind::Delete => "delete",
            PermissionKind::All => "all",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(PermissionKind::Read),
            "write" => Ok(PermissionKind::Write),
            "create" => Ok(PermissionKind::Create),
            "delete" => Ok(PermissionKind::Delete),
            "all" => Ok(PermissionKind::All),
            other => Err(Error::MalformedResult(format!(
                "unknown permission kind `{other}`"
            ))),
        }
    }
}

/// A capability grant, stored as a `HAS_PERMISSION` edge from subject to
/// target.
///
/// The subject is a user or a role; the target is any node. The edge ID
/// lives on the relationship so a grant can be addressed and revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Id,

    /// Granting user or role
    pub subject: Id,

    /// Resource the capability applies to
    pub target: Id,

    pub kind: PermissionKind,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Permission {
    /// Grant `kind` on `target` to `subject`.
    pub fn new(subject: Id, target: Id, kind: PermissionKind) -> Self {
        Self {
            id: Id::nil(EntityKind::Permission),
            subject,
            target,
            kind,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Permission {
    fn validate(&self) -> Result<()> {
        if self.subject == self.target {
            return Err(invalid("permission", "subject and target must differ"));
        }
        Ok(())
    }
}

/// Function a user performs on a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    #[default]
    Assignee,
    Reviewer,
}

impl fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignmentKind::Assignee => "assignee",
            AssignmentKind::Reviewer => "reviewer",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AssignmentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "assignee" => Ok(AssignmentKind::Assignee),
            "reviewer" => Ok(AssignmentKind::Reviewer),
            other => Err(Error::MalformedResult(format!(
                "unknown assignment kind `{other}`"
            ))),
        }
    }
}

/// A user-to-resource assignment, stored as an `ASSIGNED_TO` edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Id,

    /// Assigned user
    pub user: Id,

    /// Issue, project or other resource the user works on
    pub resource: Id,

    #[serde(default)]
    pub kind: AssignmentKind,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// Assign `user` to `resource` with the given function.
    pub fn new(user: Id, resource: Id, kind: AssignmentKind) -> Self {
        Self {
            id: Id::nil(EntityKind::Assignment),
            user,
            resource,
            kind,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Assignment {
    fn validate(&self) -> Result<()> {
        if self.user == self.resource {
            return Err(invalid("assignment", "user and resource must differ"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_requires_name() {
        assert!(Role::new("Maintainers").validate().is_ok());
        assert!(Role::new("  ").validate().is_err());
    }

    #[test]
    fn test_system_role_ids() {
        assert_eq!(SystemRole::Owner.id(), "SystemRoleOwner");
        assert_eq!(SystemRole::Admin.id(), "SystemRoleAdmin");
        assert_eq!(SystemRole::Support.id(), "SystemRoleSupport");
        assert_eq!(SystemRole::all().len(), 3);
    }

    #[test]
    fn test_permission_kind_roundtrip() {
        for kind in PermissionKind::all() {
            assert_eq!(kind.to_string().parse::<PermissionKind>().unwrap(), *kind);
        }
        assert!("admin".parse::<PermissionKind>().is_err());
    }

    #[test]
    fn test_permission_rejects_self_grant() {
        let node = Id::new(EntityKind::User);
        let perm = Permission::new(node.clone(), node, PermissionKind::Read);
        assert!(perm.validate().is_err());
    }

    #[test]
    fn test_permission_between_distinct_nodes() {
        let perm = Permission::new(
            Id::new(EntityKind::User),
            Id::new(EntityKind::Project),
            PermissionKind::Write,
        );
        assert!(perm.validate().is_ok());
    }

    #[test]
    fn test_assignment_rejects_self_reference() {
        let node = Id::new(EntityKind::User);
        let assignment = Assignment::new(node.clone(), node, AssignmentKind::Assignee);
        assert!(assignment.validate().is_err());
    }

    #[test]
    fn test_assignment_kind_roundtrip() {
        for kind in [AssignmentKind::Assignee, AssignmentKind::Reviewer] {
            assert_eq!(kind.to_string().parse::<AssignmentKind>().unwrap(), kind);
        }
        assert!("owner".parse::<AssignmentKind>().is_err());
    }

    #[test]
    fn test_role_serialization_roundtrip() {
        let mut role = Role::new("Maintainers");
        role.members.push(Id::new(EntityKind::User));
        let json = serde_json::to_string(&role).unwrap();
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, role.name);
        assert_eq!(back.members, role.members);
        assert!(!back.system);
    }
}
