//! Users and their login tokens.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{invalid, require, EntityKind, Id, Validate};
use crate::{Error, Result};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Check an email address against the RFC-like pattern shared by users and
/// organizations.
pub(crate) fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// Account lifecycle state.
///
/// Transitions are linear along `pending -> active -> inactive`; `deleted`
/// is reachable from anywhere and terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
    Inactive,
    Deleted,
}

impl UserStatus {
    fn order(&self) -> Option<usize> {
        match self {
            UserStatus::Pending => Some(0),
            UserStatus::Active => Some(1),
            UserStatus::Inactive => Some(2),
            UserStatus::Deleted => None,
        }
    }

    /// True when the lifecycle permits moving from `self` to `target`.
    pub fn can_transition_to(&self, target: UserStatus) -> bool {
        match (self.order(), target.order()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(from), Some(to)) => from.abs_diff(to) == 1,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// An account in the system.
///
/// The `permissions` and `documents` fields are neighbour-ID lists
/// reconstructed from edges at read time; they are never written as node
/// properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Id,

    /// Login name, unique across the deployment
    pub username: String,

    /// Contact address, unique across the deployment
    pub email: String,

    /// Password hash; `auth::UNUSABLE_PASSWORD` marks an account that
    /// cannot log in
    pub password: String,

    /// Lifecycle state
    #[serde(default)]
    pub status: UserStatus,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    /// Profile picture URL
    #[serde(default)]
    pub picture: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub bio: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    /// External profile links
    #[serde(default)]
    pub links: Vec<String>,

    /// ISO 639-1 language codes
    #[serde(default)]
    pub languages: Vec<String>,

    /// Outgoing permission-edge IDs
    #[serde(default)]
    pub permissions: Vec<Id>,

    /// IDs of documents owned by this user
    #[serde(default)]
    pub documents: Vec<Id>,

    /// Set on first persist, never mutated afterwards
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Set on every successful mutation; absent until the first one
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user with the given username, email and password hash.
    /// The ID is assigned by the repository on create.
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: Id::nil(EntityKind::User),
            username: username.into(),
            email: email.into(),
            password: password.into(),
            status: UserStatus::default(),
            first_name: None,
            last_name: None,
            picture: None,
            title: None,
            bio: None,
            phone: None,
            address: None,
            links: Vec::new(),
            languages: Vec::new(),
            permissions: Vec::new(),
            documents: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for User {
    fn validate(&self) -> Result<()> {
        require("user", "username", &self.username)?;
        if !is_valid_email(&self.email) {
            return Err(invalid("user", format!("malformed email `{}`", self.email)));
        }
        require("user", "password", &self.password)?;
        Ok(())
    }
}

/// Purpose of an issued user token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenContext {
    /// Email confirmation after signup
    Confirm,
    /// Password reset flow
    PasswordReset,
    /// Organization invitation
    Invitation,
}

impl fmt::Display for TokenContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenContext::Confirm => "confirm",
            TokenContext::PasswordReset => "password_reset",
            TokenContext::Invitation => "invitation",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TokenContext {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "confirm" => Ok(TokenContext::Confirm),
            "password_reset" => Ok(TokenContext::PasswordReset),
            "invitation" => Ok(TokenContext::Invitation),
            other => Err(Error::MalformedResult(format!(
                "unknown token context `{other}`"
            ))),
        }
    }
}

/// A single-use token issued to a user for a specific flow.
///
/// Exactly one live token exists per `(user, context)` pair; re-issuing
/// replaces the stored hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserToken {
    pub id: Id,

    /// Owning user; set by the repository
    #[serde(default)]
    pub user: Option<Id>,

    /// Address the token was sent to
    pub email: String,

    /// Hash of the token secret (never the secret itself)
    pub token_hash: String,

    /// Flow this token belongs to
    pub context: TokenContext,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserToken {
    /// Create a new token record for the given address, hash and context.
    pub fn new(email: impl Into<String>, token_hash: impl Into<String>, context: TokenContext) -> Self {
        Self {
            id: Id::nil(EntityKind::UserToken),
            user: None,
            email: email.into(),
            token_hash: token_hash.into(),
            context,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Validate for UserToken {
    fn validate(&self) -> Result<()> {
        if !is_valid_email(&self.email) {
            return Err(invalid(
                "user token",
                format!("malformed email `{}`", self.email),
            ));
        }
        require("user token", "token_hash", &self.token_hash)?;
        Ok(())
    }
}

/// Derive capitalised first and last name parts from the local part of an
/// email address. Recognised separators are `.`, `-` and `_`; an empty
/// local part yields two empty strings, and a single part yields an empty
/// last name.
pub fn email_to_name_parts(email: &str) -> (String, String) {
    let local = email.split('@').next().unwrap_or_default();
    if local.is_empty() {
        return (String::new(), String::new());
    }
    let mut parts = local.splitn(2, ['.', '-', '_']);
    let first = capitalise(parts.next().unwrap_or_default());
    let last = capitalise(parts.next().unwrap_or_default());
    (first, last)
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_user() -> User {
        User::new("john", "john.doe@example.com", "$2b$04$hash")
    }

    #[test]
    fn test_valid_user_passes() {
        assert!(valid_user().validate().is_ok());
    }

    #[test]
    fn test_user_requires_username() {
        let mut user = valid_user();
        user.username = "  ".to_string();
        assert!(matches!(
            user.validate(),
            Err(Error::InvalidEntity { entity: "user", .. })
        ));
    }

    #[test]
    fn test_user_rejects_malformed_email() {
        for email in ["", "plain", "missing@tld", "two@@example.com", "sp ace@example.com"] {
            let mut user = valid_user();
            user.email = email.to_string();
            assert!(user.validate().is_err(), "accepted `{email}`");
        }
    }

    #[test]
    fn test_user_accepts_common_emails() {
        for email in ["a@b.co", "first.last@example.com", "x+tag@sub.example.org"] {
            let mut user = valid_user();
            user.email = email.to_string();
            assert!(user.validate().is_ok(), "rejected `{email}`");
        }
    }

    #[test]
    fn test_status_linear_transitions() {
        assert!(UserStatus::Pending.can_transition_to(UserStatus::Active));
        assert!(UserStatus::Active.can_transition_to(UserStatus::Pending));
        assert!(UserStatus::Active.can_transition_to(UserStatus::Inactive));
        assert!(!UserStatus::Pending.can_transition_to(UserStatus::Inactive));
    }

    #[test]
    fn test_status_deleted_is_terminal() {
        assert!(UserStatus::Active.can_transition_to(UserStatus::Deleted));
        assert!(UserStatus::Pending.can_transition_to(UserStatus::Deleted));
        assert!(!UserStatus::Deleted.can_transition_to(UserStatus::Active));
        assert!(!UserStatus::Deleted.can_transition_to(UserStatus::Deleted));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&UserStatus::Inactive).unwrap(),
            r#""inactive""#
        );
    }

    #[test]
    fn test_user_serialization_roundtrip() {
        let user = valid_user();
        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back.username, user.username);
        assert_eq!(back.email, user.email);
        assert_eq!(back.status, user.status);
        assert!(back.created_at.is_none());
    }

    #[test]
    fn test_token_context_roundtrip() {
        for context in [
            TokenContext::Confirm,
            TokenContext::PasswordReset,
            TokenContext::Invitation,
        ] {
            assert_eq!(
                context.to_string().parse::<TokenContext>().unwrap(),
                context
            );
        }
        assert!("other".parse::<TokenContext>().is_err());
    }

    #[test]
    fn test_user_token_validation() {
        let token = UserToken::new("a@b.co", "hash", TokenContext::Confirm);
        assert!(token.validate().is_ok());

        let mut bad = token.clone();
        bad.token_hash = String::new();
        assert!(bad.validate().is_err());

        let mut bad = token;
        bad.email = "nope".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_email_to_name_parts_separators() {
        assert_eq!(
            email_to_name_parts("first.last@host"),
            ("First".to_string(), "Last".to_string())
        );
        assert_eq!(
            email_to_name_parts("first-last@host"),
            ("First".to_string(), "Last".to_string())
        );
        assert_eq!(
            email_to_name_parts("FIRST_LAST@host"),
            ("First".to_string(), "Last".to_string())
        );
    }

    #[test]
    fn test_email_to_name_parts_single_part() {
        assert_eq!(
            email_to_name_parts("admin@host"),
            ("Admin".to_string(), String::new())
        );
    }

    #[test]
    fn test_email_to_name_parts_empty_local() {
        assert_eq!(
            email_to_name_parts("@host"),
            (String::new(), String::new())
        );
        assert_eq!(email_to_name_parts(""), (String::new(), String::new()));
    }
}
