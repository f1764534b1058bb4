//! Edge-kind registry.
//!
//! A closed enumeration of every relationship type that may appear in a
//! query. Queries assemble relationship strings exclusively through this
//! registry, so a typo'd edge name is a compile error rather than a silent
//! non-match in the graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Type of relationship between two graph nodes.
///
/// Every relationship carries its own `id` and `created_at` properties;
/// mutation-capable relationships (the `MERGE`-upserted ones) also carry
/// `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Subject holds a permission on target (the permission entity itself).
    HasPermission,
    /// Organization or project owns a role.
    HasTeam,
    /// Organization owns a namespace.
    HasNamespace,
    /// Namespace owns a project.
    HasProject,
    /// Child entity is owned by its parent container.
    BelongsTo,
    /// Issue is a child of its parent issue (epic/story hierarchy).
    KindOf,
    /// Parent container owns a comment.
    HasComment,
    /// Target carries a label.
    HasLabel,
    /// User is assigned to a resource.
    AssignedTo,
    /// User is a member of an organization or role.
    MemberOf,
    /// User created an entity.
    Created,
    /// Organization invited a user.
    Invited,
    /// User speaks a language.
    Speaks,
    /// User authored a comment.
    Commented,
    /// Parent container owns an attachment.
    HasAttachment,
    /// Issue relates to another issue (the issue-relation entity).
    RelatedTo,
    /// User watches an issue.
    Watches,
}

impl EdgeKind {
    /// The relationship type string used in queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::HasPermission => "HAS_PERMISSION",
            EdgeKind::HasTeam => "HAS_TEAM",
            EdgeKind::HasNamespace => "HAS_NAMESPACE",
            EdgeKind::HasProject => "HAS_PROJECT",
            EdgeKind::BelongsTo => "BELONGS_TO",
            EdgeKind::KindOf => "KIND_OF",
            EdgeKind::HasComment => "HAS_COMMENT",
            EdgeKind::HasLabel => "HAS_LABEL",
            EdgeKind::AssignedTo => "ASSIGNED_TO",
            EdgeKind::MemberOf => "MEMBER_OF",
            EdgeKind::Created => "CREATED",
            EdgeKind::Invited => "INVITED",
            EdgeKind::Speaks => "SPEAKS",
            EdgeKind::Commented => "COMMENTED",
            EdgeKind::HasAttachment => "HAS_ATTACHMENT",
            EdgeKind::RelatedTo => "RELATED_TO",
            EdgeKind::Watches => "WATCHES",
        }
    }

    /// All edge kinds.
    pub fn all() -> &'static [EdgeKind] {
        &[
            EdgeKind::HasPermission,
            EdgeKind::HasTeam,
            EdgeKind::HasNamespace,
            EdgeKind::HasProject,
            EdgeKind::BelongsTo,
            EdgeKind::KindOf,
            EdgeKind::HasComment,
            EdgeKind::HasLabel,
            EdgeKind::AssignedTo,
            EdgeKind::MemberOf,
            EdgeKind::Created,
            EdgeKind::Invited,
            EdgeKind::Speaks,
            EdgeKind::Commented,
            EdgeKind::HasAttachment,
            EdgeKind::RelatedTo,
            EdgeKind::Watches,
        ]
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::all()
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| Error::InvalidEdgeKind(s.to_string()))
    }
}
