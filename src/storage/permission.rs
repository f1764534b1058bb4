//! Permission repository and the authorisation queries built on it.
//!
//! A permission is modelled as an edge, not a node:
//! `(subject)-[:HAS_PERMISSION {id, kind, created_at}]->(target)`. Keeping
//! grants in the graph lets the authorisation checks compose with the rest
//! of the topology in a single query.

use neo4rs::{query, Row};

use crate::models::{
    EdgeKind, EntityKind, Id, Permission, PermissionKind, SystemRole, Validate,
};
use crate::storage::{mapper, node_label, now, Database};
use crate::{Error, Result};

const ENTITY: &str = "permission";

#[derive(Clone)]
pub struct PermissionRepository {
    db: Database,
}

impl PermissionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Grant a permission. Idempotent per `(subject, target)` pair:
    /// granting again replaces the kind instead of adding a second edge.
    pub async fn create(&self, permission: &Permission) -> Result<Permission> {
        self.try_create(permission)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, permission: &Permission) -> Result<Permission> {
        permission.validate()?;
        let cypher = format!(
            "MATCH (s:{subject_label} {{id: $subject}}) \
             MATCH (t:{target_label} {{id: $target}}) \
             MERGE (s)-[p:{perm}]->(t) \
             ON CREATE SET p.id = $edge, p.created_at = $now \
             ON MATCH SET p.updated_at = $now \
             SET p.kind = $kind \
             RETURN p.id AS id",
            subject_label = node_label(&permission.subject)?,
            target_label = node_label(&permission.target)?,
            perm = EdgeKind::HasPermission.as_str(),
        );
        let q = query(&cypher)
            .param("subject", permission.subject.raw())
            .param("target", permission.target.raw())
            .param("kind", permission.kind.as_str())
            .param("edge", Id::new(EntityKind::Permission).raw())
            .param("now", now());
        let row = self.db.write_single(q).await?;
        let mut stored = permission.clone();
        stored.id = mapper::id(&row, "id", EntityKind::Permission)?;
        Ok(stored)
    }

    /// Fetch a permission by its edge ID.
    pub async fn get(&self, id: &Id) -> Result<Permission> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Permission> {
        let cypher = format!(
            "MATCH (s)-[p:{perm} {{id: $id}}]->(t) \
             RETURN p.id AS id, p.kind AS kind, \
                    p.created_at AS created_at, p.updated_at AS updated_at, \
                    s.id AS subject, labels(s) AS subject_labels, \
                    t.id AS target, labels(t) AS target_labels",
            perm = EdgeKind::HasPermission.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        Self::hydrate(&row)
    }

    fn hydrate(row: &Row) -> Result<Permission> {
        let permission = Permission {
            id: mapper::id(row, "id", EntityKind::Permission)?,
            subject: mapper::id(row, "subject", Self::node_kind(row, "subject_labels")?)?,
            target: mapper::id(row, "target", Self::node_kind(row, "target_labels")?)?,
            kind: mapper::string(row, "kind")?.parse()?,
            created_at: mapper::optional_timestamp(row, "created_at")?,
            updated_at: mapper::optional_timestamp(row, "updated_at")?,
        };
        permission.validate()?;
        Ok(permission)
    }

    fn node_kind(row: &Row, column: &str) -> Result<EntityKind> {
        let labels: Vec<String> = row
            .get(column)
            .map_err(|e| Error::MalformedResult(format!("missing column `{column}`: {e}")))?;
        labels
            .iter()
            .find_map(|label| EntityKind::from_label(label).ok())
            .ok_or_else(|| Error::MalformedResult(format!("unrecognised labels {labels:?}")))
    }

    /// Every grant held by a subject, newest first.
    pub async fn get_by_subject(&self, subject: &Id) -> Result<Vec<Permission>> {
        let subject_label = node_label(subject).map_err(Error::read(ENTITY))?;
        let cypher = format!(
            "MATCH (s:{subject_label} {{id: $subject}})-[p:{perm}]->(t) \
             RETURN p.id AS id, p.kind AS kind, \
                    p.created_at AS created_at, p.updated_at AS updated_at, \
                    s.id AS subject, labels(s) AS subject_labels, \
                    t.id AS target, labels(t) AS target_labels \
             ORDER BY p.created_at DESC",
            perm = EdgeKind::HasPermission.as_str(),
        );
        let rows = self
            .db
            .read_all(query(&cypher).param("subject", subject.raw()))
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(Self::hydrate)
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Change the kind of an existing grant.
    pub async fn update(&self, permission: &Permission) -> Result<Permission> {
        self.try_update(permission)
            .await
            .map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, permission: &Permission) -> Result<Permission> {
        permission.validate()?;
        let cypher = format!(
            "MATCH ()-[p:{perm} {{id: $id}}]->() \
             SET p.kind = $kind, p.updated_at = $now \
             RETURN p.id AS id",
            perm = EdgeKind::HasPermission.as_str(),
        );
        let q = query(&cypher)
            .param("id", permission.id.raw())
            .param("kind", permission.kind.as_str())
            .param("now", now());
        self.db.write_single(q).await?;
        self.try_get(&permission.id).await
    }

    /// Revoke a grant by its edge ID. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH ()-[p:{perm} {{id: $id}}]->() DELETE p",
            perm = EdgeKind::HasPermission.as_str(),
        );
        let q = query(&cypher).param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }

    /// True when `subject` may act on `target` with any of the given
    /// kinds.
    ///
    /// Three grant paths count: a direct edge, a grant held on a role that
    /// in turn holds an edge to the target, and membership in a system
    /// role. An `all` grant satisfies every requested kind, so the
    /// requested set is widened with it before the query runs. A missing
    /// subject or target is simply `false`.
    pub async fn has_permission(
        &self,
        subject: &Id,
        target: &Id,
        kinds: &[PermissionKind],
    ) -> Result<bool> {
        let mut wanted: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
        let all = PermissionKind::All.as_str().to_string();
        if !wanted.contains(&all) {
            wanted.push(all);
        }
        let subject_label = node_label(subject).map_err(Error::read(ENTITY))?;
        let target_label = node_label(target).map_err(Error::read(ENTITY))?;
        let cypher = format!(
            "MATCH (s:{subject_label} {{id: $subject}}) \
             MATCH (t:{target_label} {{id: $target}}) \
             OPTIONAL MATCH (s)-[direct:{perm}]->(t) \
             WHERE direct.kind IN $kinds \
             OPTIONAL MATCH (s)-[held:{perm}]->(r:Role)-[:{perm}]->(t) \
             WHERE held.kind IN $kinds \
             OPTIONAL MATCH (s)-[:{member}]->(sys:Role {{system: true}}) \
             RETURN count(direct) + count(held) + count(sys) > 0 AS allowed",
            perm = EdgeKind::HasPermission.as_str(),
            member = EdgeKind::MemberOf.as_str(),
        );
        let q = query(&cypher)
            .param("subject", subject.raw())
            .param("target", target.raw())
            .param("kinds", wanted);
        match self.db.read_single(q).await {
            Ok(row) => row
                .get("allowed")
                .map_err(|e| Error::MalformedResult(e.to_string()))
                .map_err(Error::read(ENTITY)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(Error::read(ENTITY)(e)),
        }
    }

    /// True when `subject` is a member of one of the given seeded system
    /// roles. An empty set means any system role.
    pub async fn has_system_role(&self, subject: &Id, roles: &[SystemRole]) -> Result<bool> {
        let ids: Vec<String> = if roles.is_empty() {
            SystemRole::all().iter().map(|r| r.id().to_string()).collect()
        } else {
            roles.iter().map(|r| r.id().to_string()).collect()
        };
        let subject_label = node_label(subject).map_err(Error::read(ENTITY))?;
        let cypher = format!(
            "MATCH (s:{subject_label} {{id: $subject}}) \
             OPTIONAL MATCH (s)-[:{member}]->(r:Role {{system: true}}) \
             WHERE r.id IN $roles \
             RETURN count(r) > 0 AS held",
            member = EdgeKind::MemberOf.as_str(),
        );
        let q = query(&cypher)
            .param("subject", subject.raw())
            .param("roles", ids);
        match self.db.read_single(q).await {
            Ok(row) => row
                .get("held")
                .map_err(|e| Error::MalformedResult(e.to_string()))
                .map_err(Error::read(ENTITY)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(Error::read(ENTITY)(e)),
        }
    }

    /// True when any path of length at least two connects the two nodes,
    /// in either direction. Used as a coarse "are these entities related
    /// at all" check.
    pub async fn has_any_relation(&self, source: &Id, target: &Id) -> Result<bool> {
        let source_label = node_label(source).map_err(Error::read(ENTITY))?;
        let target_label = node_label(target).map_err(Error::read(ENTITY))?;
        let cypher = format!(
            "MATCH (s:{source_label} {{id: $source}}) \
             MATCH (t:{target_label} {{id: $target}}) \
             OPTIONAL MATCH path = shortestPath((s)-[*]-(t)) \
             RETURN path IS NOT NULL AND length(path) >= 2 AS related",
        );
        let q = query(&cypher)
            .param("source", source.raw())
            .param("target", target.raw());
        match self.db.read_single(q).await {
            Ok(row) => row
                .get("related")
                .map_err(|e| Error::MalformedResult(e.to_string()))
                .map_err(Error::read(ENTITY)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(Error::read(ENTITY)(e)),
        }
    }
}
