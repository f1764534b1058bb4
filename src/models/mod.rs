//! Domain entities for the work-management graph.
//!
//! This module defines the core data structures:
//! - [`Id`] / [`EntityKind`] - typed identifiers doubling as graph labels
//! - [`EdgeKind`] - the closed registry of relationship types
//! - `User`, `Organization`, `Namespace`, `Project` - the containment
//!   hierarchy
//! - `Document`, `Comment`, `Attachment`, `Label` - content entities
//! - `Issue`, `IssueRelation`, `Assignment` - work tracking
//! - `Role`, `Permission` - authorization
//! - `Todo`, `UserToken` - per-user state
//!
//! Every entity implements [`Validate`]; repositories run the contract on
//! the way in (before a write) and on the way out (after hydrating a query
//! result).

pub mod document;
pub mod edge;
pub mod id;
pub mod issue;
pub mod organization;
pub mod role;
pub mod todo;
pub mod user;

pub use document::{Attachment, Comment, Document, Label};
pub use edge::EdgeKind;
pub use id::{EntityKind, Id, RAW_LEN};
pub use issue::{
    Issue, IssueKind, IssuePriority, IssueRelation, IssueRelationKind, IssueResolution,
    IssueStatus,
};
pub use organization::{
    Namespace, Organization, OrganizationStatus, Project, ProjectStatus,
};
pub use role::{Assignment, AssignmentKind, Permission, PermissionKind, Role, SystemRole};
pub use todo::{Todo, TodoPriority};
pub use user::{TokenContext, User, UserStatus, UserToken};

use crate::{Error, Result};

/// Per-entity validation contract.
///
/// Implementations check the entity's structural invariants (non-empty
/// names, well-formed email addresses, source distinct from target, ...).
/// Existence of referenced entities is the graph's concern, not the
/// contract's.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Build an [`Error::InvalidEntity`] for a failed invariant.
pub(crate) fn invalid(entity: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidEntity {
        entity,
        reason: reason.into(),
    }
}

/// Require a non-empty, non-blank string field.
pub(crate) fn require(entity: &'static str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(entity, format!("{field} must not be empty")));
    }
    Ok(())
}
