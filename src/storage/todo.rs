//! Todo repository.

use neo4rs::query;

use crate::models::{EdgeKind, EntityKind, Id, PermissionKind, Todo, Validate};
use crate::storage::{append_props, entity_properties, mapper, now, set_clauses, Database};
use crate::{Error, Result};

const ENTITY: &str = "todo";

const EXCLUDE: &[&str] = &["owned_by", "created_by"];

#[derive(Clone)]
pub struct TodoRepository {
    db: Database,
}

impl TodoRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new todo. The item is attached to its owner and the
    /// creator receives an `all` permission grant in the same transaction,
    /// which keeps todos private by default.
    pub async fn create(&self, todo: &Todo) -> Result<Todo> {
        self.try_create(todo).await.map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, todo: &Todo) -> Result<Todo> {
        todo.validate()?;
        let owner = todo.owned_by.as_ref().ok_or_else(|| Error::InvalidEntity {
            entity: ENTITY,
            reason: "owner must be set".to_string(),
        })?;
        let creator = todo.created_by.as_ref().ok_or_else(|| Error::InvalidEntity {
            entity: ENTITY,
            reason: "creator must be set".to_string(),
        })?;
        let id = Id::new(EntityKind::Todo);
        let props = entity_properties(todo, EXCLUDE)?;
        let (clauses, params) = set_clauses("t", &props);
        let cypher = format!(
            "MATCH (o:User {{id: $owner}}) \
             MATCH (u:User {{id: $creator}}) \
             CREATE (t:Todo {{id: $id}}) \
             SET t.created_at = $now, {clauses} \
             CREATE (t)-[:{belongs} {{id: $belongs_edge, created_at: $now}}]->(o) \
             CREATE (u)-[:{created} {{id: $created_edge, created_at: $now}}]->(t) \
             CREATE (u)-[:{perm} {{id: $perm_edge, kind: $kind, created_at: $now}}]->(t) \
             RETURN t.id AS id",
            belongs = EdgeKind::BelongsTo.as_str(),
            created = EdgeKind::Created.as_str(),
            perm = EdgeKind::HasPermission.as_str(),
        );
        let q = query(&cypher)
            .param("owner", owner.raw())
            .param("creator", creator.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "belongs_edge",
                Id::new(EntityKind::Relation(EdgeKind::BelongsTo)).raw(),
            )
            .param(
                "created_edge",
                Id::new(EntityKind::Relation(EdgeKind::Created)).raw(),
            )
            .param("perm_edge", Id::new(EntityKind::Permission).raw())
            .param("kind", PermissionKind::All.as_str());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a todo.
    pub async fn get(&self, id: &Id) -> Result<Todo> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Todo> {
        let cypher = format!(
            "MATCH (t:Todo {{id: $id}}) \
             OPTIONAL MATCH (t)-[:{belongs}]->(owner:User) \
             OPTIONAL MATCH (creator:User)-[:{created}]->(t) \
             RETURN t, owner.id AS owned_by, creator.id AS created_by",
            belongs = EdgeKind::BelongsTo.as_str(),
            created = EdgeKind::Created.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut props = mapper::node_properties(&mapper::node(&row, "t")?)?;
        // owner and creator live on edges; splice them in before the
        // Validate contract runs
        if let Some(owner) = mapper::optional_id(&row, "owned_by", EntityKind::User)? {
            props.insert(
                "owned_by".to_string(),
                serde_json::to_value(&owner).map_err(|e| Error::Marshal(e.to_string()))?,
            );
        }
        if let Some(creator) = mapper::optional_id(&row, "created_by", EntityKind::User)? {
            props.insert(
                "created_by".to_string(),
                serde_json::to_value(&creator).map_err(|e| Error::Marshal(e.to_string()))?,
            );
        }
        mapper::hydrate_map(props, EntityKind::Todo, &[])
    }

    /// List a user's todos, newest first.
    pub async fn get_all(&self, owner: &Id, skip: usize, limit: usize) -> Result<Vec<Todo>> {
        self.try_get_all(owner, skip, limit)
            .await
            .map_err(Error::read(ENTITY))
    }

    async fn try_get_all(&self, owner: &Id, skip: usize, limit: usize) -> Result<Vec<Todo>> {
        let cypher = format!(
            "MATCH (t:Todo)-[:{belongs}]->(o:User {{id: $owner}}) \
             OPTIONAL MATCH (creator:User)-[:{created}]->(t) \
             RETURN t, o.id AS owned_by, creator.id AS created_by \
             ORDER BY t.created_at DESC SKIP $skip LIMIT $limit",
            belongs = EdgeKind::BelongsTo.as_str(),
            created = EdgeKind::Created.as_str(),
        );
        let rows = self
            .db
            .read_all(
                query(&cypher)
                    .param("owner", owner.raw())
                    .param("skip", skip as i64)
                    .param("limit", limit as i64),
            )
            .await?;
        rows.iter()
            .map(|row| {
                let mut props = mapper::node_properties(&mapper::node(row, "t")?)?;
                for (column, key) in [("owned_by", "owned_by"), ("created_by", "created_by")] {
                    if let Some(id) = mapper::optional_id(row, column, EntityKind::User)? {
                        props.insert(
                            key.to_string(),
                            serde_json::to_value(&id)
                                .map_err(|e| Error::Marshal(e.to_string()))?,
                        );
                    }
                }
                mapper::hydrate_map(props, EntityKind::Todo, &[])
            })
            .collect()
    }

    /// Overwrite a todo's properties.
    pub async fn update(&self, todo: &Todo) -> Result<Todo> {
        self.try_update(todo).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, todo: &Todo) -> Result<Todo> {
        todo.validate()?;
        let props = entity_properties(todo, EXCLUDE)?;
        let (clauses, params) = set_clauses("t", &props);
        let cypher = format!(
            "MATCH (t:Todo {{id: $id}}) \
             SET t.updated_at = $now, {clauses} \
             RETURN t.id AS id"
        );
        let q = query(&cypher)
            .param("id", todo.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&todo.id).await
    }

    /// Remove a todo and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (t:Todo {id: $id}) DETACH DELETE t").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
