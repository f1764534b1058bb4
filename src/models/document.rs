//! Content entities: documents, comments, attachments and labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{require, EntityKind, Id, Validate};
use crate::Result;

/// A document stored in the object store and tracked in the graph.
///
/// A document belongs to exactly one container (user, organization,
/// namespace or project); the containment is a `BELONGS_TO` edge, not a
/// property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Id,

    pub name: String,

    /// Short preview of the document body
    #[serde(default)]
    pub excerpt: Option<String>,

    /// Object-store key of the document body
    pub file_id: String,

    /// Authoring user; set by the repository
    #[serde(default)]
    pub created_by: Option<Id>,

    /// Attached label IDs
    #[serde(default)]
    pub labels: Vec<Id>,

    /// Comment IDs
    #[serde(default)]
    pub comments: Vec<Id>,

    /// Attachment IDs
    #[serde(default)]
    pub attachments: Vec<Id>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a new document pointing at the given object-store file.
    pub fn new(
        name: impl Into<String>,
        file_id: impl Into<String>,
        created_by: Id,
    ) -> Self {
        Self {
            id: Id::nil(EntityKind::Document),
            name: name.into(),
            excerpt: None,
            file_id: file_id.into(),
            created_by: Some(created_by),
            labels: Vec::new(),
            comments: Vec::new(),
            attachments: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Document {
    fn validate(&self) -> Result<()> {
        require("document", "name", &self.name)?;
        require("document", "file_id", &self.file_id)
    }
}

/// A file attached to a document or an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Id,

    pub name: String,

    /// Object-store key of the attachment body
    pub file_id: String,

    /// Authoring user; set by the repository
    #[serde(default)]
    pub created_by: Option<Id>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Attachment {
    /// Create a new attachment pointing at the given object-store file.
    pub fn new(name: impl Into<String>, file_id: impl Into<String>, created_by: Id) -> Self {
        Self {
            id: Id::nil(EntityKind::Attachment),
            name: name.into(),
            file_id: file_id.into(),
            created_by: Some(created_by),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Attachment {
    fn validate(&self) -> Result<()> {
        require("attachment", "name", &self.name)?;
        require("attachment", "file_id", &self.file_id)
    }
}

/// A comment under a document or an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Id,

    pub content: String,

    /// Authoring user; set by the repository
    #[serde(default)]
    pub created_by: Option<Id>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Create a new comment authored by the given user.
    pub fn new(content: impl Into<String>, created_by: Id) -> Self {
        Self {
            id: Id::nil(EntityKind::Comment),
            content: content.into(),
            created_by: Some(created_by),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Comment {
    fn validate(&self) -> Result<()> {
        require("comment", "content", &self.content)
    }
}

/// A label attachable to documents and issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: Id,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Label {
    /// Create a new label with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Id::nil(EntityKind::Label),
            name: name.into(),
            description: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for Label {
    fn validate(&self) -> Result<()> {
        require("label", "name", &self.name)
    }
}
