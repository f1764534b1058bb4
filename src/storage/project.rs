//! Project repository.

use neo4rs::query;

use crate::models::{EdgeKind, EntityKind, Id, Project, Validate};
use crate::storage::{append_props, entity_properties, mapper, now, set_clauses, Database};
use crate::{Error, Result};

const ENTITY: &str = "project";

const EXCLUDE: &[&str] = &["teams", "documents", "issues"];

#[derive(Clone)]
pub struct ProjectRepository {
    db: Database,
}

impl ProjectRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new project under a namespace.
    pub async fn create(&self, project: &Project, namespace: &Id) -> Result<Project> {
        self.try_create(project, namespace)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, project: &Project, namespace: &Id) -> Result<Project> {
        project.validate()?;
        let id = Id::new(EntityKind::Project);
        let props = entity_properties(project, EXCLUDE)?;
        let (clauses, params) = set_clauses("p", &props);
        let cypher = format!(
            "MATCH (n:Namespace {{id: $namespace}}) \
             CREATE (p:Project {{id: $id}}) \
             SET p.created_at = $now, {clauses} \
             CREATE (n)-[:{has} {{id: $edge, created_at: $now}}]->(p) \
             RETURN p.id AS id",
            has = EdgeKind::HasProject.as_str(),
        );
        let q = query(&cypher)
            .param("namespace", namespace.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::HasProject)).raw(),
            );
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a project with its neighbour-ID lists.
    pub async fn get(&self, id: &Id) -> Result<Project> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Project> {
        let cypher = format!(
            "MATCH (p:Project {{id: $id}}) {tail}",
            tail = Self::aggregate_tail(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        self.hydrate(&row)
    }

    /// Fetch a project by its unique key.
    pub async fn get_by_key(&self, key: &str) -> Result<Project> {
        let cypher = format!(
            "MATCH (p:Project {{key: $key}}) {tail}",
            tail = Self::aggregate_tail(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("key", key))
            .await
            .map_err(Error::read(ENTITY))?;
        self.hydrate(&row).map_err(Error::read(ENTITY))
    }

    fn aggregate_tail() -> String {
        format!(
            "OPTIONAL MATCH (p)-[:{team}]->(r:Role) \
             OPTIONAL MATCH (d:Document)-[:{belongs}]->(p) \
             OPTIONAL MATCH (i:Issue)-[:{belongs}]->(p) \
             RETURN p, collect(DISTINCT r.id) AS teams, \
                    collect(DISTINCT d.id) AS documents, \
                    collect(DISTINCT i.id) AS issues",
            team = EdgeKind::HasTeam.as_str(),
            belongs = EdgeKind::BelongsTo.as_str(),
        )
    }

    fn hydrate(&self, row: &neo4rs::Row) -> Result<Project> {
        let mut project: Project = mapper::hydrate_node(row, "p", EntityKind::Project, &[])?;
        project.teams = mapper::id_list(row, "teams", EntityKind::Role)?;
        project.documents = mapper::id_list(row, "documents", EntityKind::Document)?;
        project.issues = mapper::id_list(row, "issues", EntityKind::Issue)?;
        Ok(project)
    }

    /// List a namespace's projects, newest first.
    pub async fn get_all(
        &self,
        namespace: &Id,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Project>> {
        let cypher = format!(
            "MATCH (n:Namespace {{id: $namespace}})-[:{has}]->(p:Project) \
             RETURN p ORDER BY p.created_at DESC SKIP $skip LIMIT $limit",
            has = EdgeKind::HasProject.as_str(),
        );
        let rows = self
            .db
            .read_all(
                query(&cypher)
                    .param("namespace", namespace.raw())
                    .param("skip", skip as i64)
                    .param("limit", limit as i64),
            )
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(|row| mapper::hydrate_node(row, "p", EntityKind::Project, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite a project's properties.
    pub async fn update(&self, project: &Project) -> Result<Project> {
        self.try_update(project).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, project: &Project) -> Result<Project> {
        project.validate()?;
        let props = entity_properties(project, EXCLUDE)?;
        let (clauses, params) = set_clauses("p", &props);
        let cypher = format!(
            "MATCH (p:Project {{id: $id}}) \
             SET p.updated_at = $now, {clauses} \
             RETURN p.id AS id"
        );
        let q = query(&cypher)
            .param("id", project.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&project.id).await
    }

    /// Remove a project and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (p:Project {id: $id}) DETACH DELETE p").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
