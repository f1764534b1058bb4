//! Namespace repository.

use neo4rs::query;

use crate::models::{EdgeKind, EntityKind, Id, Namespace, Validate};
use crate::storage::{append_props, entity_properties, mapper, now, set_clauses, Database};
use crate::{Error, Result};

const ENTITY: &str = "namespace";

const EXCLUDE: &[&str] = &["projects", "documents"];

#[derive(Clone)]
pub struct NamespaceRepository {
    db: Database,
}

impl NamespaceRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new namespace under an organization.
    pub async fn create(&self, namespace: &Namespace, org: &Id) -> Result<Namespace> {
        self.try_create(namespace, org)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, namespace: &Namespace, org: &Id) -> Result<Namespace> {
        namespace.validate()?;
        let id = Id::new(EntityKind::Namespace);
        let props = entity_properties(namespace, EXCLUDE)?;
        let (clauses, params) = set_clauses("n", &props);
        let cypher = format!(
            "MATCH (o:Organization {{id: $org}}) \
             CREATE (n:Namespace {{id: $id}}) \
             SET n.created_at = $now, {clauses} \
             CREATE (o)-[:{has} {{id: $edge, created_at: $now}}]->(n) \
             RETURN n.id AS id",
            has = EdgeKind::HasNamespace.as_str(),
        );
        let q = query(&cypher)
            .param("org", org.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::HasNamespace)).raw(),
            );
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a namespace with its neighbour-ID lists.
    pub async fn get(&self, id: &Id) -> Result<Namespace> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Namespace> {
        let cypher = format!(
            "MATCH (n:Namespace {{id: $id}}) \
             OPTIONAL MATCH (n)-[:{project}]->(p:Project) \
             OPTIONAL MATCH (d:Document)-[:{belongs}]->(n) \
             RETURN n, collect(DISTINCT p.id) AS projects, \
                    collect(DISTINCT d.id) AS documents",
            project = EdgeKind::HasProject.as_str(),
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut namespace: Namespace =
            mapper::hydrate_node(&row, "n", EntityKind::Namespace, &[])?;
        namespace.projects = mapper::id_list(&row, "projects", EntityKind::Project)?;
        namespace.documents = mapper::id_list(&row, "documents", EntityKind::Document)?;
        Ok(namespace)
    }

    /// List an organization's namespaces, newest first.
    pub async fn get_all(&self, org: &Id, skip: usize, limit: usize) -> Result<Vec<Namespace>> {
        let cypher = format!(
            "MATCH (o:Organization {{id: $org}})-[:{has}]->(n:Namespace) \
             RETURN n ORDER BY n.created_at DESC SKIP $skip LIMIT $limit",
            has = EdgeKind::HasNamespace.as_str(),
        );
        let rows = self
            .db
            .read_all(
                query(&cypher)
                    .param("org", org.raw())
                    .param("skip", skip as i64)
                    .param("limit", limit as i64),
            )
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(|row| mapper::hydrate_node(row, "n", EntityKind::Namespace, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite a namespace's properties.
    pub async fn update(&self, namespace: &Namespace) -> Result<Namespace> {
        self.try_update(namespace)
            .await
            .map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, namespace: &Namespace) -> Result<Namespace> {
        namespace.validate()?;
        let props = entity_properties(namespace, EXCLUDE)?;
        let (clauses, params) = set_clauses("n", &props);
        let cypher = format!(
            "MATCH (n:Namespace {{id: $id}}) \
             SET n.updated_at = $now, {clauses} \
             RETURN n.id AS id"
        );
        let q = query(&cypher)
            .param("id", namespace.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&namespace.id).await
    }

    /// Remove a namespace and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (n:Namespace {id: $id}) DETACH DELETE n").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
