//! Assignment repository.
//!
//! Assignments live on `ASSIGNED_TO` edges from a user to the resource
//! they work on; the edge carries the assignment ID and kind.

use neo4rs::{query, Row};

use crate::models::{Assignment, EdgeKind, EntityKind, Id, Validate};
use crate::storage::{mapper, node_label, now, Database};
use crate::{Error, Result};

const ENTITY: &str = "assignment";

#[derive(Clone)]
pub struct AssignmentRepository {
    db: Database,
}

impl AssignmentRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Assign a user to a resource. Idempotent per `(user, resource,
    /// kind)` triple: re-assigning stamps `updated_at` on the existing
    /// edge.
    pub async fn create(&self, assignment: &Assignment) -> Result<Assignment> {
        self.try_create(assignment)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, assignment: &Assignment) -> Result<Assignment> {
        assignment.validate()?;
        let cypher = format!(
            "MATCH (u:User {{id: $user}}) \
             MATCH (t:{resource_label} {{id: $resource}}) \
             MERGE (u)-[a:{assigned} {{kind: $kind}}]->(t) \
             ON CREATE SET a.id = $edge, a.created_at = $now \
             ON MATCH SET a.updated_at = $now \
             RETURN a.id AS id",
            resource_label = node_label(&assignment.resource)?,
            assigned = EdgeKind::AssignedTo.as_str(),
        );
        let q = query(&cypher)
            .param("user", assignment.user.raw())
            .param("resource", assignment.resource.raw())
            .param("kind", assignment.kind.to_string())
            .param("edge", Id::new(EntityKind::Assignment).raw())
            .param("now", now());
        let row = self.db.write_single(q).await?;
        let mut stored = assignment.clone();
        stored.id = mapper::id(&row, "id", EntityKind::Assignment)?;
        Ok(stored)
    }

    /// Fetch an assignment by its edge ID.
    pub async fn get(&self, id: &Id) -> Result<Assignment> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Assignment> {
        let cypher = format!(
            "MATCH (u:User)-[a:{assigned} {{id: $id}}]->(t) \
             RETURN a.id AS id, a.kind AS kind, \
                    a.created_at AS created_at, a.updated_at AS updated_at, \
                    u.id AS user, t.id AS resource, labels(t) AS resource_labels",
            assigned = EdgeKind::AssignedTo.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        Self::hydrate(&row)
    }

    fn hydrate(row: &Row) -> Result<Assignment> {
        let labels: Vec<String> = row
            .get("resource_labels")
            .map_err(|e| Error::MalformedResult(format!("missing resource labels: {e}")))?;
        let resource_kind = labels
            .iter()
            .find_map(|label| EntityKind::from_label(label).ok())
            .ok_or_else(|| {
                Error::MalformedResult(format!("unrecognised resource labels {labels:?}"))
            })?;
        let assignment = Assignment {
            id: mapper::id(row, "id", EntityKind::Assignment)?,
            user: mapper::id(row, "user", EntityKind::User)?,
            resource: mapper::id(row, "resource", resource_kind)?,
            kind: mapper::string(row, "kind")?.parse()?,
            created_at: mapper::optional_timestamp(row, "created_at")?,
            updated_at: mapper::optional_timestamp(row, "updated_at")?,
        };
        assignment.validate()?;
        Ok(assignment)
    }

    /// Every assignment held by a user, newest first.
    pub async fn get_by_user(&self, user: &Id) -> Result<Vec<Assignment>> {
        let cypher = format!(
            "MATCH (u:User {{id: $user}})-[a:{assigned}]->(t) \
             RETURN a.id AS id, a.kind AS kind, \
                    a.created_at AS created_at, a.updated_at AS updated_at, \
                    u.id AS user, t.id AS resource, labels(t) AS resource_labels \
             ORDER BY a.created_at DESC",
            assigned = EdgeKind::AssignedTo.as_str(),
        );
        let rows = self
            .db
            .read_all(query(&cypher).param("user", user.raw()))
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(Self::hydrate)
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Every assignment on a resource, newest first.
    pub async fn get_by_resource(&self, resource: &Id) -> Result<Vec<Assignment>> {
        let cypher = format!(
            "MATCH (u:User)-[a:{assigned}]->(t:{resource_label} {{id: $resource}}) \
             RETURN a.id AS id, a.kind AS kind, \
                    a.created_at AS created_at, a.updated_at AS updated_at, \
                    u.id AS user, t.id AS resource, labels(t) AS resource_labels \
             ORDER BY a.created_at DESC",
            assigned = EdgeKind::AssignedTo.as_str(),
            resource_label = node_label(resource).map_err(Error::read(ENTITY))?,
        );
        let rows = self
            .db
            .read_all(query(&cypher).param("resource", resource.raw()))
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(Self::hydrate)
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Remove an assignment by its edge ID. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH ()-[a:{assigned} {{id: $id}}]->() DELETE a",
            assigned = EdgeKind::AssignedTo.as_str(),
        );
        let q = query(&cypher).param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }
}
