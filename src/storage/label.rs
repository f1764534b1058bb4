//! Label repository.

use neo4rs::query;

use crate::models::{EdgeKind, EntityKind, Id, Label, Validate};
use crate::storage::{
    append_props, entity_properties, mapper, node_label, now, set_clauses, Database,
};
use crate::{Error, Result};

const ENTITY: &str = "label";

#[derive(Clone)]
pub struct LabelRepository {
    db: Database,
}

impl LabelRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new label.
    pub async fn create(&self, label: &Label) -> Result<Label> {
        self.try_create(label).await.map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, label: &Label) -> Result<Label> {
        label.validate()?;
        let id = Id::new(EntityKind::Label);
        let props = entity_properties(label, &[])?;
        let (clauses, params) = set_clauses("l", &props);
        let cypher = format!(
            "CREATE (l:Label {{id: $id}}) \
             SET l.created_at = $now, {clauses} \
             RETURN l.id AS id"
        );
        let q = query(&cypher).param("id", id.raw()).param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a label.
    pub async fn get(&self, id: &Id) -> Result<Label> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Label> {
        let row = self
            .db
            .read_single(query("MATCH (l:Label {id: $id}) RETURN l").param("id", id.raw()))
            .await?;
        mapper::hydrate_node(&row, "l", EntityKind::Label, &[])
    }

    /// List labels, newest first.
    pub async fn get_all(&self, skip: usize, limit: usize) -> Result<Vec<Label>> {
        let cypher = "MATCH (l:Label) RETURN l \
                      ORDER BY l.created_at DESC SKIP $skip LIMIT $limit";
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
            .map(|row| mapper::hydrate_node(row, "l", EntityKind::Label, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite a label's properties.
    pub async fn update(&self, label: &Label) -> Result<Label> {
        self.try_update(label).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, label: &Label) -> Result<Label> {
        label.validate()?;
        let props = entity_properties(label, &[])?;
        let (clauses, params) = set_clauses("l", &props);
        let cypher = format!(
            "MATCH (l:Label {{id: $id}}) \
             SET l.updated_at = $now, {clauses} \
             RETURN l.id AS id"
        );
        let q = query(&cypher)
            .param("id", label.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&label.id).await
    }

    /// Remove a label and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (l:Label {id: $id}) DETACH DELETE l").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }

    /// Attach a label to a target (document or issue). Idempotent.
    pub async fn attach_to(&self, label: &Id, target: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (l:Label {{id: $label}}) \
             MATCH (t:{target_label} {{id: $target}}) \
             MERGE (t)-[h:{has}]->(l) \
             ON CREATE SET h.id = $edge, h.created_at = $now \
             ON MATCH SET h.updated_at = $now \
             RETURN h.id AS id",
            target_label = node_label(target).map_err(Error::update(ENTITY))?,
            has = EdgeKind::HasLabel.as_str(),
        );
        let q = query(&cypher)
            .param("label", label.raw())
            .param("target", target.raw())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::HasLabel)).raw(),
            )
            .param("now", now());
        self.db
            .write_single(q)
            .await
            .map(|_| ())
            .map_err(Error::update(ENTITY))
    }

    /// Detach a label from a target. Idempotent.
    pub async fn detach_from(&self, label: &Id, target: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (t:{target_label} {{id: $target}})-[h:{has}]->(l:Label {{id: $label}}) \
             DELETE h",
            target_label = node_label(target).map_err(Error::update(ENTITY))?,
            has = EdgeKind::HasLabel.as_str(),
        );
        let q = query(&cypher)
            .param("label", label.raw())
            .param("target", target.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::update(ENTITY))
    }
}
