//! Common test utilities for capstan integration tests.
//!
//! The integration suite needs a live Neo4j instance. Tests are skipped
//! unless `CAPSTAN_TEST_HOST` is set; connection details come from:
//! - `CAPSTAN_TEST_HOST` / `CAPSTAN_TEST_PORT` (default 7687)
//! - `CAPSTAN_TEST_USER` (default `neo4j`)
//! - `CAPSTAN_TEST_PASSWORD` (default empty)
//!
//! Each test creates its own entities with unique names, so the suite can
//! run against a shared database, but tests are serialised to keep
//! whole-graph queries stable.

#![allow(dead_code)]

use capstan::models::{EntityKind, Id, User};
use capstan::storage::{Database, DatabaseConfig, UserRepository};

/// Connect to the test database, or `None` when the environment does not
/// provide one. Tests early-return on `None`.
pub async fn database() -> Option<Database> {
    let host = std::env::var("CAPSTAN_TEST_HOST").ok()?;
    let config = DatabaseConfig {
        host,
        port: std::env::var("CAPSTAN_TEST_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(7687),
        username: std::env::var("CAPSTAN_TEST_USER").unwrap_or_else(|_| "neo4j".to_string()),
        password: std::env::var("CAPSTAN_TEST_PASSWORD").unwrap_or_default(),
        ..DatabaseConfig::default()
    };
    let db = Database::connect(&config)
        .await
        .expect("failed to connect to the test database");
    db.ping().await.expect("test database did not answer");
    db.ensure_constraints()
        .await
        .expect("failed to bootstrap constraints");
    Some(db)
}

/// A unique suffix for names and addresses, so tests never collide on the
/// unique-email and unique-key constraints.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Id::new(EntityKind::User).raw())
}

/// Create and persist a user with a unique username and email.
pub async fn seed_user(db: &Database) -> User {
    let users = UserRepository::new(db.clone());
    let name = unique("user");
    let user = User::new(&name, format!("{name}@example.com"), "$2b$04$seedhash");
    users.create(&user).await.expect("failed to seed user")
}
