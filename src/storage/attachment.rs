//! Attachment repository.

use neo4rs::query;

use crate::models::{Attachment, EdgeKind, EntityKind, Id, PermissionKind, Validate};
use crate::storage::{
    append_props, entity_properties, mapper, node_label, now, set_clauses, Database,
};
use crate::{Error, Result};

const ENTITY: &str = "attachment";

const EXCLUDE: &[&str] = &["created_by"];

#[derive(Clone)]
pub struct AttachmentRepository {
    db: Database,
}

impl AttachmentRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new attachment under its parent (document or issue). The
    /// uploader receives an `all` permission grant on the attachment in
    /// the same transaction.
    pub async fn create(&self, attachment: &Attachment, parent: &Id) -> Result<Attachment> {
        self.try_create(attachment, parent)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, attachment: &Attachment, parent: &Id) -> Result<Attachment> {
        attachment.validate()?;
        let creator = attachment
            .created_by
            .as_ref()
            .ok_or_else(|| Error::InvalidEntity {
                entity: ENTITY,
                reason: "created_by must be set".to_string(),
            })?;
        let id = Id::new(EntityKind::Attachment);
        let props = entity_properties(attachment, EXCLUDE)?;
        let (clauses, params) = set_clauses("a", &props);
        let cypher = format!(
            "MATCH (p:{parent_label} {{id: $parent}}) \
             MATCH (u:User {{id: $creator}}) \
             CREATE (a:Attachment {{id: $id}}) \
             SET a.created_at = $now, {clauses} \
             CREATE (p)-[:{has} {{id: $has_edge, created_at: $now}}]->(a) \
             CREATE (u)-[:{created} {{id: $created_edge, created_at: $now}}]->(a) \
             CREATE (u)-[:{perm} {{id: $perm_edge, kind: $kind, created_at: $now}}]->(a) \
             RETURN a.id AS id",
            parent_label = node_label(parent)?,
            has = EdgeKind::HasAttachment.as_str(),
            created = EdgeKind::Created.as_str(),
            perm = EdgeKind::HasPermission.as_str(),
        );
        let q = query(&cypher)
            .param("parent", parent.raw())
            .param("creator", creator.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "has_edge",
                Id::new(EntityKind::Relation(EdgeKind::HasAttachment)).raw(),
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

    /// Fetch an attachment.
    pub async fn get(&self, id: &Id) -> Result<Attachment> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Attachment> {
        let cypher = format!(
            "MATCH (a:Attachment {{id: $id}}) \
             OPTIONAL MATCH (creator:User)-[:{created}]->(a) \
             RETURN a, creator.id AS created_by",
            created = EdgeKind::Created.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut attachment: Attachment =
            mapper::hydrate_node(&row, "a", EntityKind::Attachment, &[])?;
        attachment.created_by = mapper::optional_id(&row, "created_by", EntityKind::User)?;
        Ok(attachment)
    }

    /// List a parent's attachments, newest first.
    pub async fn get_all(
        &self,
        parent: &Id,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Attachment>> {
        let cypher = format!(
            "MATCH (p:{parent_label} {{id: $parent}})-[:{has}]->(a:Attachment) \
             RETURN a ORDER BY a.created_at DESC SKIP $skip LIMIT $limit",
            parent_label = node_label(parent).map_err(Error::read(ENTITY))?,
            has = EdgeKind::HasAttachment.as_str(),
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
            .map(|row| mapper::hydrate_node(row, "a", EntityKind::Attachment, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite an attachment's properties.
    pub async fn update(&self, attachment: &Attachment) -> Result<Attachment> {
        self.try_update(attachment)
            .await
            .map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, attachment: &Attachment) -> Result<Attachment> {
        attachment.validate()?;
        let props = entity_properties(attachment, EXCLUDE)?;
        let (clauses, params) = set_clauses("a", &props);
        let cypher = format!(
            "MATCH (a:Attachment {{id: $id}}) \
             SET a.updated_at = $now, {clauses} \
             RETURN a.id AS id"
        );
        let q = query(&cypher)
            .param("id", attachment.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&attachment.id).await
    }

    /// Remove an attachment and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (a:Attachment {id: $id}) DETACH DELETE a").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
