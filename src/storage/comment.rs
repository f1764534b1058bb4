//! Comment repository.

use neo4rs::query;

use crate::models::{Comment, EdgeKind, EntityKind, Id, PermissionKind, Validate};
use crate::storage::{
    append_props, entity_properties, mapper, node_label, now, set_clauses, Database,
};
use crate::{Error, Result};

const ENTITY: &str = "comment";

const EXCLUDE: &[&str] = &["created_by"];

#[derive(Clone)]
pub struct CommentRepository {
    db: Database,
}

impl CommentRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new comment under its parent (document or issue). The
    /// author is linked through `COMMENTED` and receives an `all`
    /// permission grant on the comment in the same transaction.
    pub async fn create(&self, comment: &Comment, parent: &Id) -> Result<Comment> {
        self.try_create(comment, parent)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, comment: &Comment, parent: &Id) -> Result<Comment> {
        comment.validate()?;
        let creator = comment
            .created_by
            .as_ref()
            .ok_or_else(|| Error::InvalidEntity {
                entity: ENTITY,
                reason: "created_by must be set".to_string(),
            })?;
        let id = Id::new(EntityKind::Comment);
        let props = entity_properties(comment, EXCLUDE)?;
        let (clauses, params) = set_clauses("c", &props);
        let cypher = format!(
            "MATCH (p:{parent_label} {{id: $parent}}) \
             MATCH (u:User {{id: $creator}}) \
             CREATE (c:Comment {{id: $id}}) \
             SET c.created_at = $now, {clauses} \
             CREATE (p)-[:{has} {{id: $has_edge, created_at: $now}}]->(c) \
             CREATE (u)-[:{commented} {{id: $commented_edge, created_at: $now}}]->(c) \
             CREATE (u)-[:{perm} {{id: $perm_edge, kind: $kind, created_at: $now}}]->(c) \
             RETURN c.id AS id",
            parent_label = node_label(parent)?,
            has = EdgeKind::HasComment.as_str(),
            commented = EdgeKind::Commented.as_str(),
            perm = EdgeKind::HasPermission.as_str(),
        );
        let q = query(&cypher)
            .param("parent", parent.raw())
            .param("creator", creator.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "has_edge",
                Id::new(EntityKind::Relation(EdgeKind::HasComment)).raw(),
            )
            .param(
                "commented_edge",
                Id::new(EntityKind::Relation(EdgeKind::Commented)).raw(),
            )
            .param("perm_edge", Id::new(EntityKind::Permission).raw())
            .param("kind", PermissionKind::All.as_str());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a comment.
    pub async fn get(&self, id: &Id) -> Result<Comment> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Comment> {
        let cypher = format!(
            "MATCH (c:Comment {{id: $id}}) \
             OPTIONAL MATCH (author:User)-[:{commented}]->(c) \
             RETURN c, author.id AS created_by",
            commented = EdgeKind::Commented.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut comment: Comment = mapper::hydrate_node(&row, "c", EntityKind::Comment, &[])?;
        comment.created_by = mapper::optional_id(&row, "created_by", EntityKind::User)?;
        Ok(comment)
    }

    /// List a parent's comments, newest first.
    pub async fn get_all(&self, parent: &Id, skip: usize, limit: usize) -> Result<Vec<Comment>> {
        let cypher = format!(
            "MATCH (p:{parent_label} {{id: $parent}})-[:{has}]->(c:Comment) \
             OPTIONAL MATCH (author:User)-[:{commented}]->(c) \
             RETURN c, author.id AS created_by \
             ORDER BY c.created_at DESC SKIP $skip LIMIT $limit",
            parent_label = node_label(parent).map_err(Error::read(ENTITY))?,
            has = EdgeKind::HasComment.as_str(),
            commented = EdgeKind::Commented.as_str(),
        );
        let rows = self
            .db
            .read_all(
                query(&cypher)
                    .param("parent", parent.raw())
                    .param("skip", skip as i64)
                    .param("limit", limit as i64),
            )
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(|row| {
                let mut comment: Comment =
                    mapper::hydrate_node(row, "c", EntityKind::Comment, &[])?;
                comment.created_by = mapper::optional_id(row, "created_by", EntityKind::User)?;
                Ok(comment)
            })
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite a comment's properties.
    pub async fn update(&self, comment: &Comment) -> Result<Comment> {
        self.try_update(comment).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, comment: &Comment) -> Result<Comment> {
        comment.validate()?;
        let props = entity_properties(comment, EXCLUDE)?;
        let (clauses, params) = set_clauses("c", &props);
        let cypher = format!(
            "MATCH (c:Comment {{id: $id}}) \
             SET c.updated_at = $now, {clauses} \
             RETURN c.id AS id"
        );
        let q = query(&cypher)
            .param("id", comment.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&comment.id).await
    }

    /// Remove a comment and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (c:Comment {id: $id}) DETACH DELETE c").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
