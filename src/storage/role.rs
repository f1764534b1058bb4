//! Role repository.
//!
//! Roles double as teams. System roles are seeded out of band with
//! well-known IDs and `system = true`; the repository only ever creates
//! regular roles.

use neo4rs::query;

use crate::models::{EdgeKind, EntityKind, Id, PermissionKind, Role, Validate};
use crate::storage::{
    append_props, entity_properties, mapper, node_label, now, set_clauses, Database,
};
use crate::{Error, Result};

const ENTITY: &str = "role";

/// `system` is excluded so callers can never promote a role through a
/// write.
const EXCLUDE: &[&str] = &["members", "permissions", "system"];

#[derive(Clone)]
pub struct RoleRepository {
    db: Database,
}

impl RoleRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new role under its container (organization or project).
    /// The creator becomes the first member and receives an `all`
    /// permission grant in the same transaction.
    pub async fn create(&self, role: &Role, container: &Id, creator: &Id) -> Result<Role> {
        self.try_create(role, container, creator)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, role: &Role, container: &Id, creator: &Id) -> Result<Role> {
        role.validate()?;
        let id = Id::new(EntityKind::Role);
        let props = entity_properties(role, EXCLUDE)?;
        let (clauses, params) = set_clauses("r", &props);
        let cypher = format!(
            "MATCH (c:{container_label} {{id: $container}}) \
             MATCH (u:User {{id: $creator}}) \
             CREATE (r:Role {{id: $id}}) \
             SET r.created_at = $now, r.system = false, {clauses} \
             CREATE (c)-[:{team} {{id: $team_edge, created_at: $now}}]->(r) \
             CREATE (u)-[:{member} {{id: $member_edge, created_at: $now}}]->(r) \
             CREATE (u)-[:{perm} {{id: $perm_edge, kind: $kind, created_at: $now}}]->(r) \
             RETURN r.id AS id",
            container_label = node_label(container)?,
            team = EdgeKind::HasTeam.as_str(),
            member = EdgeKind::MemberOf.as_str(),
            perm = EdgeKind::HasPermission.as_str(),
        );
        let q = query(&cypher)
            .param("container", container.raw())
            .param("creator", creator.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "team_edge",
                Id::new(EntityKind::Relation(EdgeKind::HasTeam)).raw(),
            )
            .param(
                "member_edge",
                Id::new(EntityKind::Relation(EdgeKind::MemberOf)).raw(),
            )
            .param("perm_edge", Id::new(EntityKind::Permission).raw())
            .param("kind", PermissionKind::All.as_str());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch a role with its neighbour-ID lists.
    pub async fn get(&self, id: &Id) -> Result<Role> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Role> {
        let cypher = format!(
            "MATCH (r:Role {{id: $id}}) \
             OPTIONAL MATCH (u:User)-[:{member}]->(r) \
             OPTIONAL MATCH (r)-[p:{perm}]->() \
             RETURN r, collect(DISTINCT u.id) AS members, \
                    collect(DISTINCT p.id) AS permissions",
            member = EdgeKind::MemberOf.as_str(),
            perm = EdgeKind::HasPermission.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut role: Role = mapper::hydrate_node(&row, "r", EntityKind::Role, &[])?;
        role.members = mapper::id_list(&row, "members", EntityKind::User)?;
        role.permissions = mapper::id_list(&row, "permissions", EntityKind::Permission)?;
        Ok(role)
    }

    /// List a container's roles, newest first.
    pub async fn get_all(&self, container: &Id, skip: usize, limit: usize) -> Result<Vec<Role>> {
        let cypher = format!(
            "MATCH (c:{container_label} {{id: $container}})-[:{team}]->(r:Role) \
             RETURN r ORDER BY r.created_at DESC SKIP $skip LIMIT $limit",
            container_label = node_label(container).map_err(Error::read(ENTITY))?,
            team = EdgeKind::HasTeam.as_str(),
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
            .map(|row| mapper::hydrate_node(row, "r", EntityKind::Role, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite a role's properties. The `system` flag is never written.
    pub async fn update(&self, role: &Role) -> Result<Role> {
        self.try_update(role).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, role: &Role) -> Result<Role> {
        role.validate()?;
        let props = entity_properties(role, EXCLUDE)?;
        let (clauses, params) = set_clauses("r", &props);
        let cypher = format!(
            "MATCH (r:Role {{id: $id}}) \
             SET r.updated_at = $now, {clauses} \
             RETURN r.id AS id"
        );
        let q = query(&cypher)
            .param("id", role.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&role.id).await
    }

    /// Remove a role and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (r:Role {id: $id}) DETACH DELETE r").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }

    /// Add a user to a role. Idempotent.
    pub async fn add_member(&self, role: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (r:Role {{id: $role}}) \
             MATCH (u:User {{id: $user}}) \
             MERGE (u)-[m:{member}]->(r) \
             ON CREATE SET m.id = $edge, m.created_at = $now \
             ON MATCH SET m.updated_at = $now \
             RETURN m.id AS id",
            member = EdgeKind::MemberOf.as_str(),
        );
        let q = query(&cypher)
            .param("role", role.raw())
            .param("user", user.raw())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::MemberOf)).raw(),
            )
            .param("now", now());
        self.db
            .write_single(q)
            .await
            .map(|_| ())
            .map_err(Error::update(ENTITY))
    }

    /// Add a user to a seeded system role. Idempotent. System roles carry
    /// well-known IDs outside the regular alphabet, so membership goes
    /// through this method instead of [`RoleRepository::add_member`].
    pub async fn add_system_member(
        &self,
        role: crate::models::SystemRole,
        user: &Id,
    ) -> Result<()> {
        let cypher = format!(
            "MATCH (r:Role {{id: $role, system: true}}) \
             MATCH (u:User {{id: $user}}) \
             MERGE (u)-[m:{member}]->(r) \
             ON CREATE SET m.id = $edge, m.created_at = $now \
             ON MATCH SET m.updated_at = $now \
             RETURN m.id AS id",
            member = EdgeKind::MemberOf.as_str(),
        );
        let q = query(&cypher)
            .param("role", role.id())
            .param("user", user.raw())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::MemberOf)).raw(),
            )
            .param("now", now());
        self.db
            .write_single(q)
            .await
            .map(|_| ())
            .map_err(Error::update(ENTITY))
    }

    /// Remove a user from a role. Idempotent.
    pub async fn remove_member(&self, role: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (u:User {{id: $user}})-[m:{member}]->(r:Role {{id: $role}}) \
             DELETE m",
            member = EdgeKind::MemberOf.as_str(),
        );
        let q = query(&cypher)
            .param("role", role.raw())
            .param("user", user.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::update(ENTITY))
    }
}
