//! User repository.

use neo4rs::query;

use crate::auth::UNUSABLE_PASSWORD;
use crate::models::{EdgeKind, EntityKind, Id, User, UserStatus, Validate};
use crate::storage::{append_props, entity_properties, mapper, now, set_clauses, Database};
use crate::{Error, Result};

const ENTITY: &str = "user";

/// Fields reconstructed from edges at read time, never stored as
/// properties.
const EXCLUDE: &[&str] = &["permissions", "documents"];

#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new user. The returned value carries the minted ID and
    /// `created_at`.
    pub async fn create(&self, user: &User) -> Result<User> {
        self.try_create(user).await.map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, user: &User) -> Result<User> {
        user.validate()?;
        let id = Id::new(EntityKind::User);
        let props = entity_properties(user, EXCLUDE)?;
        let (clauses, params) = set_clauses("u", &props);
        let cypher = format!(
            "CREATE (u:User {{id: $id}}) \
             SET u.created_at = $now, {clauses} \
             RETURN u.id AS id"
        );
        let q = query(&cypher).param("id", id.raw()).param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a user with its neighbour-ID lists.
    pub async fn get(&self, id: &Id) -> Result<User> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<User> {
        let cypher = format!(
            "MATCH (u:User {{id: $id}}) \
             OPTIONAL MATCH (u)-[p:{perm}]->() \
             OPTIONAL MATCH (d:Document)-[:{belongs}]->(u) \
             RETURN u, collect(DISTINCT p.id) AS permissions, \
                    collect(DISTINCT d.id) AS documents",
            perm = EdgeKind::HasPermission.as_str(),
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        self.hydrate(&row)
    }

    /// Fetch a user by its unique email address.
    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        let cypher = format!(
            "MATCH (u:User {{email: $email}}) \
             OPTIONAL MATCH (u)-[p:{perm}]->() \
             OPTIONAL MATCH (d:Document)-[:{belongs}]->(u) \
             RETURN u, collect(DISTINCT p.id) AS permissions, \
                    collect(DISTINCT d.id) AS documents",
            perm = EdgeKind::HasPermission.as_str(),
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("email", email))
            .await
            .map_err(Error::read(ENTITY))?;
        self.hydrate(&row).map_err(Error::read(ENTITY))
    }

    fn hydrate(&self, row: &neo4rs::Row) -> Result<User> {
        let mut user: User = mapper::hydrate_node(row, "u", EntityKind::User, &[])?;
        user.permissions = mapper::id_list(row, "permissions", EntityKind::Permission)?;
        user.documents = mapper::id_list(row, "documents", EntityKind::Document)?;
        Ok(user)
    }

    /// List users, newest first. Neighbour-ID lists are not populated.
    pub async fn get_all(&self, skip: usize, limit: usize) -> Result<Vec<User>> {
        let cypher = "MATCH (u:User) RETURN u \
                      ORDER BY u.created_at DESC SKIP $skip LIMIT $limit";
        let rows = self
            .db
            .read_all(
                query(cypher)
                    .param("skip", skip as i64)
                    .param("limit", limit as i64),
            )
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(|row| mapper::hydrate_node(row, "u", EntityKind::User, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite a user's properties. The status change must be a legal
    /// lifecycle transition.
    pub async fn update(&self, user: &User) -> Result<User> {
        self.try_update(user).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, user: &User) -> Result<User> {
        user.validate()?;
        let current = self.try_get(&user.id).await?;
        if current.status != user.status && !current.status.can_transition_to(user.status) {
            return Err(Error::InvalidEntity {
                entity: ENTITY,
                reason: format!(
                    "illegal status transition {} -> {}",
                    current.status, user.status
                ),
            });
        }
        let props = entity_properties(user, EXCLUDE)?;
        let (clauses, params) = set_clauses("u", &props);
        let cypher = format!(
            "MATCH (u:User {{id: $id}}) \
             SET u.updated_at = $now, {clauses} \
             RETURN u.id AS id"
        );
        let q = query(&cypher)
            .param("id", user.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&user.id).await
    }

    /// Delete a user. The default is a soft delete: the account moves to
    /// the `deleted` status and its password hash becomes unusable, but the
    /// node and its history stay. `force` removes the node and every
    /// incident edge. Both forms are idempotent.
    pub async fn delete(&self, id: &Id, force: bool) -> Result<()> {
        self.try_delete(id, force)
            .await
            .map_err(Error::delete(ENTITY))
    }

    async fn try_delete(&self, id: &Id, force: bool) -> Result<()> {
        if force {
            let q = query("MATCH (u:User {id: $id}) DETACH DELETE u").param("id", id.raw());
            return self.db.write_and_consume(q).await;
        }
        let q = query(
            "MATCH (u:User {id: $id}) \
             SET u.status = $status, u.password = $password, u.updated_at = $now",
        )
        .param("id", id.raw())
        .param("status", UserStatus::Deleted.to_string())
        .param("password", UNUSABLE_PASSWORD)
        .param("now", now());
        self.db.write_and_consume(q).await
    }
}
