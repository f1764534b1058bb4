//! Personal todo items.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{invalid, require, EntityKind, Id, Validate};
use crate::Result;

/// Urgency of a todo item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoPriority {
    #[default]
    Normal,
    Important,
    Urgent,
    Critical,
}

impl fmt::Display for TodoPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TodoPriority::Normal => "normal",
            TodoPriority::Important => "important",
            TodoPriority::Urgent => "urgent",
            TodoPriority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// A private reminder owned by a single user.
///
/// Ownership is a `BELONGS_TO` edge to the owning user; the owner also
/// gets an `all` permission grant at create time, so todos are invisible
/// to everyone else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: Id,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: TodoPriority,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    /// Owning user; set by the repository
    #[serde(default)]
    pub owned_by: Option<Id>,

    /// Authoring user; set by the repository
    #[serde(default)]
    pub created_by: Option<Id>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// Create a new todo owned and authored by the given user.
    pub fn new(title: impl Into<String>, owner: Id) -> Self {
        Self {
            id: Id::nil(EntityKind::Todo),
            title: title.into(),
            description: None,
            priority: TodoPriority::default(),
            completed: false,
            due_date: None,
            owned_by: Some(owner.clone()),
            created_by: Some(owner),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Todo {
    fn validate(&self) -> Result<()> {
        require("todo", "title", &self.title)?;
        match &self.owned_by {
            Some(owner) if !owner.is_nil() => {}
            _ => return Err(invalid("todo", "owner must be set")),
        }
        match &self.created_by {
            Some(creator) if !creator.is_nil() => {}
            _ => return Err(invalid("todo", "creator must be set")),
        }
        Ok(())
    }
}
