//! Document repository.

use neo4rs::query;

use crate::models::{Document, EdgeKind, EntityKind, Id, Validate};
use crate::storage::{
    append_props, entity_properties, mapper, node_label, now, set_clauses, Database,
};
use crate::{Error, Result};

const ENTITY: &str = "document";

const EXCLUDE: &[&str] = &["created_by", "labels", "comments", "attachments"];

#[derive(Clone)]
pub struct DocumentRepository {
    db: Database,
}

impl DocumentRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new document inside its container (user, organization,
    /// namespace or project). The author is recorded through a `CREATED`
    /// edge in the same transaction.
    pub async fn create(&self, document: &Document, container: &Id) -> Result<Document> {
        self.try_create(document, container)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, document: &Document, container: &Id) -> Result<Document> {
        document.validate()?;
        let creator = document
            .created_by
            .as_ref()
            .ok_or_else(|| Error::InvalidEntity {
                entity: ENTITY,
                reason: "created_by must be set".to_string(),
            })?;
        let id = Id::new(EntityKind::Document);
        let props = entity_properties(document, EXCLUDE)?;
        let (clauses, params) = set_clauses("d", &props);
        let cypher = format!(
            "MATCH (c:{container_label} {{id: $container}}) \
             MATCH (u:User {{id: $creator}}) \
             CREATE (d:Document {{id: $id}}) \
             SET d.created_at = $now, {clauses} \
             CREATE (d)-[:{belongs} {{id: $belongs_edge, created_at: $now}}]->(c) \
             CREATE (u)-[:{created} {{id: $created_edge, created_at: $now}}]->(d) \
             RETURN d.id AS id",
            container_label = node_label(container)?,
            belongs = EdgeKind::BelongsTo.as_str(),
            created = EdgeKind::Created.as_str(),
        );
        let q = query(&cypher)
            .param("container", container.raw())
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
            );
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a document with its neighbour-ID lists.
    pub async fn get(&self, id: &Id) -> Result<Document> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Document> {
        let cypher = format!(
            "MATCH (d:Document {{id: $id}}) \
             OPTIONAL MATCH (creator:User)-[:{created}]->(d) \
             OPTIONAL MATCH (d)-[:{label}]->(l:Label) \
             OPTIONAL MATCH (d)-[:{comment}]->(c:Comment) \
             OPTIONAL MATCH (d)-[:{attachment}]->(a:Attachment) \
             RETURN d, creator.id AS created_by, \
                    collect(DISTINCT l.id) AS labels, \
                    collect(DISTINCT c.id) AS comments, \
                    collect(DISTINCT a.id) AS attachments",
            created = EdgeKind::Created.as_str(),
            label = EdgeKind::HasLabel.as_str(),
            comment = EdgeKind::HasComment.as_str(),
            attachment = EdgeKind::HasAttachment.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut document: Document =
            mapper::hydrate_node(&row, "d", EntityKind::Document, &[])?;
        document.created_by = mapper::optional_id(&row, "created_by", EntityKind::User)?;
        document.labels = mapper::id_list(&row, "labels", EntityKind::Label)?;
        document.comments = mapper::id_list(&row, "comments", EntityKind::Comment)?;
        document.attachments = mapper::id_list(&row, "attachments", EntityKind::Attachment)?;
        Ok(document)
    }

    /// List a container's documents, newest first.
    pub async fn get_all(
        &self,
        container: &Id,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let cypher = format!(
            "MATCH (d:Document)-[:{belongs}]->(c:{container_label} {{id: $container}}) \
             RETURN d ORDER BY d.created_at DESC SKIP $skip LIMIT $limit",
            belongs = EdgeKind::BelongsTo.as_str(),
            container_label = node_label(container).map_err(Error::read(ENTITY))?,
        );
        let rows = self
            .db
            .read_all(
                query(&cypher)
                    .param("container", container.raw())
                    .param("skip", skip as i64)
                    .param("limit", limit as i64),
            )
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(|row| mapper::hydrate_node(row, "d", EntityKind::Document, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite a document's properties.
    pub async fn update(&self, document: &Document) -> Result<Document> {
        self.try_update(document)
            .await
            .map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, document: &Document) -> Result<Document> {
        document.validate()?;
        let props = entity_properties(document, EXCLUDE)?;
        let (clauses, params) = set_clauses("d", &props);
        let cypher = format!(
            "MATCH (d:Document {{id: $id}}) \
             SET d.updated_at = $now, {clauses} \
             RETURN d.id AS id"
        );
        let q = query(&cypher)
            .param("id", document.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&document.id).await
    }

    /// Remove a document and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (d:Document {id: $id}) DETACH DELETE d").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
