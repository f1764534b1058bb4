//! Capstan - persistence and authorization core for collaborative work management.
//!
//! This library mediates all access to a property-graph database (Neo4j over
//! Bolt) that stores the domain entities of a work-management application:
//! users, organizations, namespaces, projects, issues, documents, comments,
//! attachments, labels, todos, roles, permissions and the relationships
//! between them. It also answers authorization questions expressed as graph
//! traversals ("does this user hold a `write` permission on that project?").
//!
//! The main pieces:
//! - [`models`] - domain entities, typed identifiers and the edge-kind
//!   registry that names every relationship used in queries.
//! - [`storage`] - the database handle, session-runtime primitives and one
//!   repository per entity family.
//! - [`auth`] - password hashing and opaque token envelopes.
//! - [`convert`] - JSON-mediated cross-type conversion used by the record
//!   mapper.

pub mod auth;
pub mod convert;
pub mod models;
pub mod storage;

use std::fmt;

/// Verb half of the per-entity error kinds ("failed to create organization").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Library-level error type for capstan operations.
///
/// The taxonomy is kind-oriented: cross-cutting kinds appear as their own
/// variants, while per-entity per-verb failures are expressed by
/// [`Error::Repository`], which names the entity and verb and preserves the
/// lower-level cause.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `get` demanded exactly one record and none came back.
    #[error("entity not found")]
    NotFound,

    #[error("invalid ID: {0}")]
    InvalidId(String),

    #[error("invalid edge kind: {0}")]
    InvalidEdgeKind(String),

    /// A query result could not be mapped back onto a valid entity.
    #[error("malformed query result: {0}")]
    MalformedResult(String),

    #[error("unexpected record count: expected {expected}, got {got}")]
    ReadResourceCount { expected: usize, got: usize },

    /// The driver rejected its configuration.
    #[error("invalid database driver: {0}")]
    InvalidDriver(String),

    /// The connection settings cannot describe a reachable database.
    #[error("invalid database configuration: {0}")]
    InvalidDatabase(String),

    /// A repository was handed an identifier kind it cannot address.
    #[error("invalid repository for this identifier kind")]
    InvalidRepository,

    #[error("marshal error: {0}")]
    Marshal(String),

    #[error("unmarshal error: {0}")]
    Unmarshal(String),

    /// An entity failed its `Validate` contract.
    #[error("invalid {entity}: {reason}")]
    InvalidEntity {
        entity: &'static str,
        reason: String,
    },

    #[error("database error: {0}")]
    Database(#[from] neo4rs::Error),

    #[error("password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    /// Per-entity per-verb kind wrapping the lower-level cause.
    #[error("failed to {op} {entity}: {source}")]
    Repository {
        entity: &'static str,
        op: Operation,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap a lower-level cause as "failed to create `entity`".
    pub fn create(entity: &'static str) -> impl FnOnce(Error) -> Error {
        Self::repository(entity, Operation::Create)
    }

    /// Wrap a lower-level cause as "failed to read `entity`".
    pub fn read(entity: &'static str) -> impl FnOnce(Error) -> Error {
        Self::repository(entity, Operation::Read)
    }

    /// Wrap a lower-level cause as "failed to update `entity`".
    pub fn update(entity: &'static str) -> impl FnOnce(Error) -> Error {
        Self::repository(entity, Operation::Update)
    }

    /// Wrap a lower-level cause as "failed to delete `entity`".
    pub fn delete(entity: &'static str) -> impl FnOnce(Error) -> Error {
        Self::repository(entity, Operation::Delete)
    }

    fn repository(entity: &'static str, op: Operation) -> impl FnOnce(Error) -> Error {
        move |source| Error::Repository {
            entity,
            op,
            source: Box::new(source),
        }
    }

    /// True when this error is, or wraps, [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound => true,
            Error::Repository { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Result type alias for capstan operations.
pub type Result<T> = std::result::Result<T, Error>;
