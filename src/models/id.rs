//! Typed identifiers.
//!
//! Every entity and relationship in the graph carries an `id` property: a
//! fixed-width, URL-safe random string. In code the string is paired with an
//! [`EntityKind`] naming the entity family (or relationship kind) it belongs
//! to; the kind doubles as the node label used in queries. Only the raw
//! string travels on the wire - the kind is implicit in the call site.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::models::EdgeKind;
use crate::{Error, Result};

/// Width of the raw component, in characters.
pub const RAW_LEN: usize = 26;

/// Crockford-style base32 alphabet, lowercase. 26 characters at 5 bits each
/// cover the 128 bits of entropy minted per identifier.
const ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";

/// Entity family (or relationship kind) an identifier belongs to.
///
/// The variant name doubles as the graph label: `EntityKind::User` maps to
/// the `User` node label, and `EntityKind::Relation(EdgeKind::MemberOf)`
/// maps to the `MEMBER_OF` relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Organization,
    Namespace,
    Project,
    Document,
    Comment,
    Attachment,
    Label,
    Issue,
    IssueRelation,
    Role,
    Todo,
    Permission,
    Assignment,
    UserToken,
    /// Identifier carried by a relationship rather than a node.
    Relation(EdgeKind),
}

impl EntityKind {
    /// The graph label (node label or relationship type) for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Organization => "Organization",
            EntityKind::Namespace => "Namespace",
            EntityKind::Project => "Project",
            EntityKind::Document => "Document",
            EntityKind::Comment => "Comment",
            EntityKind::Attachment => "Attachment",
            EntityKind::Label => "Label",
            EntityKind::Issue => "Issue",
            EntityKind::IssueRelation => "IssueRelation",
            EntityKind::Role => "Role",
            EntityKind::Todo => "Todo",
            EntityKind::Permission => "Permission",
            EntityKind::Assignment => "Assignment",
            EntityKind::UserToken => "UserToken",
            EntityKind::Relation(kind) => kind.as_str(),
        }
    }

    /// All node-label kinds (excludes relationship kinds). Used by the
    /// schema bootstrap to create per-label uniqueness constraints.
    pub fn node_labels() -> &'static [EntityKind] {
        &[
            EntityKind::User,
            EntityKind::Organization,
            EntityKind::Namespace,
            EntityKind::Project,
            EntityKind::Document,
            EntityKind::Comment,
            EntityKind::Attachment,
            EntityKind::Label,
            EntityKind::Issue,
            EntityKind::Role,
            EntityKind::Todo,
            EntityKind::UserToken,
        ]
    }

    /// Parse a graph label back into a kind. Relationship type strings are
    /// recognised as well.
    pub fn from_label(label: &str) -> Result<Self> {
        let kind = match label {
            "User" => EntityKind::User,
            "Organization" => EntityKind::Organization,
            "Namespace" => EntityKind::Namespace,
            "Project" => EntityKind::Project,
            "Document" => EntityKind::Document,
            "Comment" => EntityKind::Comment,
            "Attachment" => EntityKind::Attachment,
            "Label" => EntityKind::Label,
            "Issue" => EntityKind::Issue,
            "IssueRelation" => EntityKind::IssueRelation,
            "Role" => EntityKind::Role,
            "Todo" => EntityKind::Todo,
            "Permission" => EntityKind::Permission,
            "Assignment" => EntityKind::Assignment,
            "UserToken" => EntityKind::UserToken,
            other => match other.parse::<EdgeKind>() {
                Ok(edge) => EntityKind::Relation(edge),
                Err(_) => {
                    return Err(Error::MalformedResult(format!("unknown label `{other}`")));
                }
            },
        };
        Ok(kind)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A typed identifier: a fixed-width random string tagged with the entity
/// family it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id {
    raw: String,
    kind: EntityKind,
}

impl Id {
    /// Mint a fresh identifier with 128 bits of entropy.
    pub fn new(kind: EntityKind) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            raw: encode(u128::from_be_bytes(bytes)),
            kind,
        }
    }

    /// The nil identifier of a kind: all-zero raw component. Deterministic
    /// and equal across calls.
    pub fn nil(kind: EntityKind) -> Self {
        Self {
            raw: "0".repeat(RAW_LEN),
            kind,
        }
    }

    /// Parse a serialised identifier. The kind is supplied by the caller,
    /// so the same string can legitimately refer to entities of different
    /// families. Fails with [`Error::InvalidId`] on a malformed input.
    pub fn parse(s: &str, kind: EntityKind) -> Result<Self> {
        if s.len() != RAW_LEN || !s.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(Error::InvalidId(s.to_string()));
        }
        Ok(Self {
            raw: s.to_string(),
            kind,
        })
    }

    /// The raw component; this is the wire format.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The entity family this identifier names.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The graph label used in queries that mention this identifier.
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// True when the raw component is all zeroes.
    pub fn is_nil(&self) -> bool {
        self.raw.bytes().all(|b| b == b'0')
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn encode(mut n: u128) -> String {
    let mut buf = [0u8; RAW_LEN];
    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(n & 0x1f) as usize];
        n >>= 5;
    }
    buf.iter().map(|b| *b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdgeKind;

    #[test]
    fn test_new_id_has_fixed_width() {
        let id = Id::new(EntityKind::User);
        assert_eq!(id.raw().len(), RAW_LEN);
        assert!(id.raw().bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_new_ids_are_unique() {
        let a = Id::new(EntityKind::User);
        let b = Id::new(EntityKind::User);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = Id::new(EntityKind::Project);
        let parsed = Id::parse(&id.to_string(), EntityKind::Project).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.to_string(), id.to_string());
    }

    #[test]
    fn test_parse_rejects_wrong_width() {
        assert!(matches!(
            Id::parse("abc", EntityKind::User),
            Err(Error::InvalidId(_))
        ));
        let long = "a".repeat(RAW_LEN + 1);
        assert!(matches!(
            Id::parse(&long, EntityKind::User),
            Err(Error::InvalidId(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_alphabet() {
        // 'u' and 'l' are excluded from the Crockford alphabet; uppercase
        // is rejected outright.
        let bad = "U".repeat(RAW_LEN);
        assert!(matches!(
            Id::parse(&bad, EntityKind::User),
            Err(Error::InvalidId(_))
        ));
        let bad = "l".repeat(RAW_LEN);
        assert!(Id::parse(&bad, EntityKind::User).is_err());
    }

    #[test]
    fn test_nil_is_deterministic() {
        let a = Id::nil(EntityKind::Document);
        let b = Id::nil(EntityKind::Document);
        assert_eq!(a, b);
        assert!(a.is_nil());
        assert_eq!(a.raw(), "0".repeat(RAW_LEN));
    }

    #[test]
    fn test_nil_differs_per_kind() {
        assert_ne!(Id::nil(EntityKind::User), Id::nil(EntityKind::Document));
    }

    #[test]
    fn test_new_is_not_nil() {
        assert!(!Id::new(EntityKind::Issue).is_nil());
    }

    #[test]
    fn test_label_matches_kind() {
        assert_eq!(Id::new(EntityKind::Organization).label(), "Organization");
        assert_eq!(
            Id::new(EntityKind::Relation(EdgeKind::MemberOf)).label(),
            "MEMBER_OF"
        );
    }

    #[test]
    fn test_entity_kind_from_label() {
        assert_eq!(
            EntityKind::from_label("Project").unwrap(),
            EntityKind::Project
        );
        assert_eq!(
            EntityKind::from_label("HAS_PERMISSION").unwrap(),
            EntityKind::Relation(EdgeKind::HasPermission)
        );
        assert!(EntityKind::from_label("Widget").is_err());
    }

    #[test]
    fn test_entity_kind_label_roundtrip() {
        for kind in EntityKind::node_labels() {
            assert_eq!(EntityKind::from_label(kind.label()).unwrap(), *kind);
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = Id::new(EntityKind::Comment);
        let json = serde_json::to_string(&id).unwrap();
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_encode_zero() {
        assert_eq!(encode(0), "0".repeat(RAW_LEN));
    }

    #[test]
    fn test_encode_max_fits_width() {
        assert_eq!(encode(u128::MAX).len(), RAW_LEN);
    }
}
