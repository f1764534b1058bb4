//! Issues and the relations between them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{invalid, require, EntityKind, Id, Validate};
use crate::{Error, Result};

/// Classification of an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Epic,
    Story,
    #[default]
    Task,
    Bug,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::Epic => "epic",
            IssueKind::Story => "story",
            IssueKind::Task => "task",
            IssueKind::Bug => "bug",
        };
        write!(f, "{}", s)
    }
}

/// Workflow state of an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Blocked,
    Review,
    Done,
    Closed,
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Blocked => "blocked",
            IssueStatus::Review => "review",
            IssueStatus::Done => "done",
            IssueStatus::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Priority of an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssuePriority::Low => "low",
            IssuePriority::Medium => "medium",
            IssuePriority::High => "high",
            IssuePriority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Terminal resolution of a closed issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueResolution {
    Fixed,
    WontFix,
    Duplicate,
    Invalid,
}

impl fmt::Display for IssueResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueResolution::Fixed => "fixed",
            IssueResolution::WontFix => "wont_fix",
            IssueResolution::Duplicate => "duplicate",
            IssueResolution::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

/// A work item tracked inside a project.
///
/// `numeric_id` is assigned by the repository at create time: one greater
/// than the highest numeric ID already present in the owning project. The
/// reporter becomes an implicit watcher in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Id,

    /// Per-project sequence number; 0 until first persisted
    #[serde(default)]
    pub numeric_id: i64,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub kind: IssueKind,

    #[serde(default)]
    pub status: IssueStatus,

    #[serde(default)]
    pub priority: IssuePriority,

    #[serde(default)]
    pub resolution: Option<IssueResolution>,

    /// Reporting user; set by the repository
    #[serde(default)]
    pub reported_by: Option<Id>,

    /// Parent issue for epic/story hierarchies
    #[serde(default)]
    pub parent: Option<Id>,

    /// User IDs assigned to the issue
    #[serde(default)]
    pub assignees: Vec<Id>,

    /// Attached label IDs
    #[serde(default)]
    pub labels: Vec<Id>,

    /// Comment IDs
    #[serde(default)]
    pub comments: Vec<Id>,

    /// Attachment IDs
    #[serde(default)]
    pub attachments: Vec<Id>,

    /// User IDs watching the issue
    #[serde(default)]
    pub watchers: Vec<Id>,

    /// Issue-relation edge IDs
    #[serde(default)]
    pub relations: Vec<Id>,

    /// External links
    #[serde(default)]
    pub links: Vec<String>,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Create a new issue reported by the given user.
    pub fn new(title: impl Into<String>, kind: IssueKind, reported_by: Id) -> Self {
        Self {
            id: Id::nil(EntityKind::Issue),
            numeric_id: 0,
            title: title.into(),
            description: None,
            kind,
            status: IssueStatus::default(),
            priority: IssuePriority::default(),
            resolution: None,
            reported_by: Some(reported_by),
            parent: None,
            assignees: Vec::new(),
            labels: Vec::new(),
            comments: Vec::new(),
            attachments: Vec::new(),
            watchers: Vec::new(),
            relations: Vec::new(),
            links: Vec::new(),
            due_date: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Issue {
    fn validate(&self) -> Result<()> {
        require("issue", "title", &self.title)?;
        if self.numeric_id < 0 {
            return Err(invalid("issue", "numeric_id must not be negative"));
        }
        Ok(())
    }
}

/// Kind of a relation between two issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueRelationKind {
    /// Source prevents target from progressing
    Blocks,
    /// Source is a subtask of target
    SubtaskOf,
    /// Informational link
    RelatesTo,
    /// Source duplicates target
    DuplicateOf,
}

impl fmt::Display for IssueRelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueRelationKind::Blocks => "blocks",
            IssueRelationKind::SubtaskOf => "subtask_of",
            IssueRelationKind::RelatesTo => "relates_to",
            IssueRelationKind::DuplicateOf => "duplicate_of",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for IssueRelationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blocks" => Ok(IssueRelationKind::Blocks),
            "subtask_of" => Ok(IssueRelationKind::SubtaskOf),
            "relates_to" => Ok(IssueRelationKind::RelatesTo),
            "duplicate_of" => Ok(IssueRelationKind::DuplicateOf),
            other => Err(Error::MalformedResult(format!(
                "unknown issue relation kind `{other}`"
            ))),
        }
    }
}

/// A typed relation between two issues, stored as a `RELATED_TO` edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRelation {
    pub id: Id,

    pub source: Id,

    pub target: Id,

    pub kind: IssueRelationKind,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl IssueRelation {
    /// Create a new relation between two issues.
    pub fn new(source: Id, target: Id, kind: IssueRelationKind) -> Self {
        Self {
            id: Id::nil(EntityKind::IssueRelation),
            source,
            target,
            kind,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for IssueRelation {
    fn validate(&self) -> Result<()> {
        if self.source == self.target {
            return Err(invalid(
                "issue relation",
                "source and target must differ",
            ));
        }
        Ok(())
    }
}
