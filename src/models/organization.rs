//! The containment hierarchy: organizations, namespaces and projects.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::user::is_valid_email;
use crate::models::{invalid, require, EntityKind, Id, Validate};
use crate::Result;

fn project_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{3,6}$").expect("project key pattern is valid"))
}

/// Organization lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    #[default]
    Active,
    Deleted,
}

impl fmt::Display for OrganizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrganizationStatus::Active => "active",
            OrganizationStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// Top-level tenant of the system.
///
/// An organization always has at least one member: its creator is added in
/// the same transaction that creates the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Id,

    pub name: String,

    /// Contact address
    pub email: String,

    #[serde(default)]
    pub logo: Option<String>,

    #[serde(default)]
    pub website: Option<String>,

    #[serde(default)]
    pub status: OrganizationStatus,

    /// Member user IDs
    #[serde(default)]
    pub members: Vec<Id>,

    /// Owned namespace IDs
    #[serde(default)]
    pub namespaces: Vec<Id>,

    /// Owned role IDs
    #[serde(default)]
    pub teams: Vec<Id>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Organization {
    /// Create a new organization with the given name and contact address.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Id::nil(EntityKind::Organization),
            name: name.into(),
            email: email.into(),
            logo: None,
            website: None,
            status: OrganizationStatus::default(),
            members: Vec::new(),
            namespaces: Vec::new(),
            teams: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Organization {
    fn validate(&self) -> Result<()> {
        require("organization", "name", &self.name)?;
        if !is_valid_email(&self.email) {
            return Err(invalid(
                "organization",
                format!("malformed email `{}`", self.email),
            ));
        }
        Ok(())
    }
}

/// A grouping of projects and documents inside an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub id: Id,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Owned project IDs
    #[serde(default)]
    pub projects: Vec<Id>,

    /// Owned document IDs
    #[serde(default)]
    pub documents: Vec<Id>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Namespace {
    /// Create a new namespace with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Id::nil(EntityKind::Namespace),
            name: name.into(),
            description: None,
            projects: Vec::new(),
            documents: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Namespace {
    fn validate(&self) -> Result<()> {
        require("namespace", "name", &self.name)
    }
}

/// Project lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Pending,
    Active,
    Archived,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

/// A unit of work delivery living inside a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,

    /// Short alphanumeric key, globally unique (e.g. `CAPS`); prefixes
    /// issue references
    pub key: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub logo: Option<String>,

    #[serde(default)]
    pub status: ProjectStatus,

    /// Owned role IDs
    #[serde(default)]
    pub teams: Vec<Id>,

    /// Owned document IDs
    #[serde(default)]
    pub documents: Vec<Id>,

    /// Owned issue IDs
    #[serde(default)]
    pub issues: Vec<Id>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Create a new project with the given key and name.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Id::nil(EntityKind::Project),
            key: key.into(),
            name: name.into(),
            description: None,
            logo: None,
            status: ProjectStatus::default(),
            teams: Vec::new(),
            documents: Vec::new(),
            issues: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Project {
    fn validate(&self) -> Result<()> {
        if !project_key_pattern().is_match(&self.key) {
            return Err(invalid(
                "project",
                format!("key `{}` must match [A-Z0-9]{{3,6}}", self.key),
            ));
        }
        require("project", "name", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_organization() {
        let org = Organization::new("ACME Inc.", "hello@acme.example.com");
        assert!(org.validate().is_ok());
    }

    #[test]
    fn test_organization_requires_name() {
        let org = Organization::new("", "hello@acme.example.com");
        assert!(org.validate().is_err());
    }

    #[test]
    fn test_organization_rejects_bad_email() {
        let org = Organization::new("ACME", "not-an-email");
        assert!(org.validate().is_err());
    }

    #[test]
    fn test_namespace_requires_name() {
        assert!(Namespace::new("platform").validate().is_ok());
        assert!(Namespace::new(" ").validate().is_err());
    }

    #[test]
    fn test_project_key_pattern() {
        for key in ["CAP", "CAPS01", "A1B"] {
            assert!(Project::new(key, "Capstan").validate().is_ok(), "rejected `{key}`");
        }
        for key in ["", "ab", "CA", "lower", "TOOLONG1", "CAP-1"] {
            assert!(Project::new(key, "Capstan").validate().is_err(), "accepted `{key}`");
        }
    }

    #[test]
    fn test_project_requires_name() {
        assert!(Project::new("CAPS", "").validate().is_err());
    }

    #[test]
    fn test_organization_serialization_roundtrip() {
        let mut org = Organization::new("ACME", "hello@acme.example.com");
        org.members.push(Id::new(EntityKind::User));
        let json = serde_json::to_string(&org).unwrap();
        let back: Organization = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, org.name);
        assert_eq!(back.members, org.members);
        assert_eq!(back.status, OrganizationStatus::Active);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OrganizationStatus::Deleted).unwrap(),
            r#""deleted""#
        );
        assert_eq!(
            serde_json::to_string(&ProjectStatus::Archived).unwrap(),
            r#""archived""#
        );
    }
}
