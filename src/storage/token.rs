//! User-token repository.
//!
//! Exactly one live token exists per `(user, context)` pair: creation is a
//! `MERGE` keyed on the context under the owning user, so re-issuing a
//! token replaces the stored hash instead of accumulating stale records.

use neo4rs::{query, Row};

use crate::models::{EdgeKind, EntityKind, Id, TokenContext, UserToken, Validate};
use crate::storage::{mapper, now, Database};
use crate::{Error, Result};

const ENTITY: &str = "user token";

#[derive(Clone)]
pub struct UserTokenRepository {
    db: Database,
}

impl UserTokenRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a token for a user, replacing any live token of the same
    /// context.
    pub async fn create(&self, token: &UserToken, user: &Id) -> Result<UserToken> {
        self.try_create(token, user)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, token: &UserToken, user: &Id) -> Result<UserToken> {
        token.validate()?;
        let cypher = format!(
            "MATCH (u:User {{id: $user}}) \
             MERGE (t:UserToken {{context: $context}})-[b:{belongs}]->(u) \
             ON CREATE SET t.id = $id, t.created_at = $now, \
                           b.id = $edge, b.created_at = $now \
             ON MATCH SET t.updated_at = $now \
             SET t.email = $email, t.token_hash = $hash \
             RETURN t.id AS id",
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let q = query(&cypher)
            .param("user", user.raw())
            .param("context", token.context.to_string())
            .param("id", Id::new(EntityKind::UserToken).raw())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::BelongsTo)).raw(),
            )
            .param("now", now())
            .param("email", token.email.as_str())
            .param("hash", token.token_hash.as_str());
        let row = self.db.write_single(q).await?;
        let id = mapper::id(&row, "id", EntityKind::UserToken)?;
        self.try_get(&id).await
    }

    /// Fetch a token by ID.
    pub async fn get(&self, id: &Id) -> Result<UserToken> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<UserToken> {
        let cypher = format!(
            "MATCH (t:UserToken {{id: $id}}) \
             OPTIONAL MATCH (t)-[:{belongs}]->(u:User) \
             RETURN t, u.id AS user",
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        Self::hydrate(&row)
    }

    /// Fetch the live token of a user for a given context.
    pub async fn get_by_user(&self, user: &Id, context: TokenContext) -> Result<UserToken> {
        let cypher = format!(
            "MATCH (t:UserToken {{context: $context}})-[:{belongs}]->(u:User {{id: $user}}) \
             RETURN t, u.id AS user",
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let row = self
            .db
            .read_single(
                query(&cypher)
                    .param("user", user.raw())
                    .param("context", context.to_string()),
            )
            .await
            .map_err(Error::read(ENTITY))?;
        Self::hydrate(&row).map_err(Error::read(ENTITY))
    }

    fn hydrate(row: &Row) -> Result<UserToken> {
        let mut props = mapper::node_properties(&mapper::node(row, "t")?)?;
        if let Some(user) = mapper::optional_id(row, "user", EntityKind::User)? {
            props.insert(
                "user".to_string(),
                serde_json::to_value(&user).map_err(|e| Error::Marshal(e.to_string()))?,
            );
        }
        mapper::hydrate_map(props, EntityKind::UserToken, &[])
    }

    /// Remove a token by ID. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (t:UserToken {id: $id}) DETACH DELETE t").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }

    /// Remove a user's live token for a context. Idempotent.
    pub async fn delete_by_user(&self, user: &Id, context: TokenContext) -> Result<()> {
        let cypher = format!(
            "MATCH (t:UserToken {{context: $context}})-[:{belongs}]->(u:User {{id: $user}}) \
             DETACH DELETE t",
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let q = query(&cypher)
            .param("user", user.raw())
            .param("context", context.to_string());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
