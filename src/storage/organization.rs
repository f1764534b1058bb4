//! Organization repository.

use neo4rs::query;

use crate::models::{EdgeKind, EntityKind, Id, Organization, Validate};
use crate::storage::{append_props, entity_properties, mapper, now, set_clauses, Database};
use crate::{Error, Result};

const ENTITY: &str = "organization";

const EXCLUDE: &[&str] = &["members", "namespaces", "teams"];

#[derive(Clone)]
pub struct OrganizationRepository {
    db: Database,
}

impl OrganizationRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new organization. The creator becomes its first member
    /// and is recorded as such in the same transaction, so an organization
    /// is never observable without a member.
    pub async fn create(&self, org: &Organization, creator: &Id) -> Result<Organization> {
        self.try_create(org, creator)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, org: &Organization, creator: &Id) -> Result<Organization> {
        org.validate()?;
        let id = Id::new(EntityKind::Organization);
        let props = entity_properties(org, EXCLUDE)?;
        let (clauses, params) = set_clauses("o", &props);
        let cypher = format!(
            "MATCH (u:User {{id: $creator}}) \
             CREATE (o:Organization {{id: $id}}) \
             SET o.created_at = $now, {clauses} \
             CREATE (u)-[:{member} {{id: $member_edge, created_at: $now}}]->(o) \
             CREATE (u)-[:{created} {{id: $created_edge, created_at: $now}}]->(o) \
             RETURN o.id AS id",
            member = EdgeKind::MemberOf.as_str(),
            created = EdgeKind::Created.as_str(),
        );
        let q = query(&cypher)
            .param("creator", creator.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "member_edge",
                Id::new(EntityKind::Relation(EdgeKind::MemberOf)).raw(),
            )
            .param(
                "created_edge",
                Id::new(EntityKind::Relation(EdgeKind::Created)).raw(),
            );
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch an organization with its neighbour-ID lists.
    pub async fn get(&self, id: &Id) -> Result<Organization> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Organization> {
        let cypher = format!(
            "MATCH (o:Organization {{id: $id}}) \
             OPTIONAL MATCH (u:User)-[:{member}]->(o) \
             OPTIONAL MATCH (o)-[:{namespace}]->(n:Namespace) \
             OPTIONAL MATCH (o)-[:{team}]->(r:Role) \
             RETURN o, collect(DISTINCT u.id) AS members, \
                    collect(DISTINCT n.id) AS namespaces, \
                    collect(DISTINCT r.id) AS teams",
            member = EdgeKind::MemberOf.as_str(),
            namespace = EdgeKind::HasNamespace.as_str(),
            team = EdgeKind::HasTeam.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut org: Organization =
            mapper::hydrate_node(&row, "o", EntityKind::Organization, &[])?;
        org.members = mapper::id_list(&row, "members", EntityKind::User)?;
        org.namespaces = mapper::id_list(&row, "namespaces", EntityKind::Namespace)?;
        org.teams = mapper::id_list(&row, "teams", EntityKind::Role)?;
        Ok(org)
    }

    /// List organizations, newest first. Neighbour-ID lists are not
    /// populated.
    pub async fn get_all(&self, skip: usize, limit: usize) -> Result<Vec<Organization>> {
        let cypher = "MATCH (o:Organization) RETURN o \
                      ORDER BY o.created_at DESC SKIP $skip LIMIT $limit";
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
            .map(|row| mapper::hydrate_node(row, "o", EntityKind::Organization, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite an organization's properties.
    pub async fn update(&self, org: &Organization) -> Result<Organization> {
        self.try_update(org).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, org: &Organization) -> Result<Organization> {
        org.validate()?;
        let props = entity_properties(org, EXCLUDE)?;
        let (clauses, params) = set_clauses("o", &props);
        let cypher = format!(
            "MATCH (o:Organization {{id: $id}}) \
             SET o.updated_at = $now, {clauses} \
             RETURN o.id AS id"
        );
        let q = query(&cypher).param("id", org.id.raw()).param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&org.id).await
    }

    /// Remove an organization and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (o:Organization {id: $id}) DETACH DELETE o").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }

    /// Add a user as a member. Idempotent: re-adding stamps `updated_at`
    /// on the edge and preserves its original `created_at`.
    pub async fn add_member(&self, org: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (o:Organization {{id: $org}}) \
             MATCH (u:User {{id: $user}}) \
             MERGE (u)-[m:{member}]->(o) \
             ON CREATE SET m.id = $edge, m.created_at = $now \
             ON MATCH SET m.updated_at = $now \
             RETURN m.id AS id",
            member = EdgeKind::MemberOf.as_str(),
        );
        let q = query(&cypher)
            .param("org", org.raw())
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

    /// Remove a user from the membership. Idempotent.
    pub async fn remove_member(&self, org: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (u:User {{id: $user}})-[m:{member}]->(o:Organization {{id: $org}}) \
             DELETE m",
            member = EdgeKind::MemberOf.as_str(),
        );
        let q = query(&cypher)
            .param("org", org.raw())
            .param("user", user.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::update(ENTITY))
    }

    /// Record an outstanding invitation for a user. Idempotent.
    pub async fn add_invitation(&self, org: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (o:Organization {{id: $org}}) \
             MATCH (u:User {{id: $user}}) \
             MERGE (o)-[i:{invited}]->(u) \
             ON CREATE SET i.id = $edge, i.created_at = $now \
             ON MATCH SET i.updated_at = $now \
             RETURN i.id AS id",
            invited = EdgeKind::Invited.as_str(),
        );
        let q = query(&cypher)
            .param("org", org.raw())
            .param("user", user.raw())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::Invited)).raw(),
            )
            .param("now", now());
        self.db
            .write_single(q)
            .await
            .map(|_| ())
            .map_err(Error::update(ENTITY))
    }

    /// Drop an outstanding invitation. Idempotent.
    pub async fn remove_invitation(&self, org: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (o:Organization {{id: $org}})-[i:{invited}]->(u:User {{id: $user}}) \
             DELETE i",
            invited = EdgeKind::Invited.as_str(),
        );
        let q = query(&cypher)
            .param("org", org.raw())
            .param("user", user.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::update(ENTITY))
    }
}
