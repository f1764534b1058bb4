//! Issue repository.

use neo4rs::query;

use crate::models::{
    EdgeKind, EntityKind, Id, Issue, IssueRelation, Validate,
};
use crate::storage::{append_props, entity_properties, mapper, now, set_clauses, Database};
use crate::{Error, Result};

const ENTITY: &str = "issue";
const RELATION_ENTITY: &str = "issue relation";

/// `numeric_id` is assigned in-query at create time and immutable after.
const EXCLUDE: &[&str] = &[
    "numeric_id",
    "reported_by",
    "parent",
    "assignees",
    "labels",
    "comments",
    "attachments",
    "watchers",
    "relations",
];

#[derive(Clone)]
pub struct IssueRepository {
    db: Database,
}

impl IssueRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new issue inside a project. The issue receives the next
    /// per-project `numeric_id` and the reporter becomes a watcher, all in
    /// one transaction so concurrent creates cannot race the sequence
    /// outside the graph engine's own serialization.
    pub async fn create(&self, issue: &Issue, project: &Id) -> Result<Issue> {
        self.try_create(issue, project)
            .await
            .map_err(Error::create(ENTITY))
    }

    async fn try_create(&self, issue: &Issue, project: &Id) -> Result<Issue> {
        issue.validate()?;
        let reporter = issue
            .reported_by
            .as_ref()
            .ok_or_else(|| Error::InvalidEntity {
                entity: ENTITY,
                reason: "reported_by must be set".to_string(),
            })?;
        let id = Id::new(EntityKind::Issue);
        let props = entity_properties(issue, EXCLUDE)?;
        let (clauses, params) = set_clauses("i", &props);

        let parent_tail = match &issue.parent {
            Some(_) => format!(
                " WITH i MATCH (par:Issue {{id: $parent}}) \
                 CREATE (i)-[:{kind_of} {{id: $parent_edge, created_at: $now}}]->(par)",
                kind_of = EdgeKind::KindOf.as_str(),
            ),
            None => String::new(),
        };
        let cypher = format!(
            "MATCH (p:Project {{id: $project}}) \
             MATCH (u:User {{id: $reporter}}) \
             OPTIONAL MATCH (other:Issue)-[:{belongs}]->(p) \
             WITH p, u, coalesce(max(other.numeric_id), 0) + 1 AS next \
             CREATE (i:Issue {{id: $id}}) \
             SET i.created_at = $now, i.numeric_id = next, {clauses} \
             CREATE (i)-[:{belongs} {{id: $belongs_edge, created_at: $now}}]->(p) \
             CREATE (u)-[:{created} {{id: $created_edge, created_at: $now}}]->(i) \
             CREATE (u)-[:{watches} {{id: $watches_edge, created_at: $now}}]->(i)\
             {parent_tail} \
             RETURN i.id AS id",
            belongs = EdgeKind::BelongsTo.as_str(),
            created = EdgeKind::Created.as_str(),
            watches = EdgeKind::Watches.as_str(),
        );
        let mut q = query(&cypher)
            .param("project", project.raw())
            .param("reporter", reporter.raw())
            .param("id", id.raw())
            .param("now", now())
            .param(
                "belongs_edge",
                Id::new(EntityKind::Relation(EdgeKind::BelongsTo)).raw(),
            )
            .param(
                "created_edge",
                Id::new(EntityKind::Relation(EdgeKind::Created)).raw(),
            )
            .param(
                "watches_edge",
                Id::new(EntityKind::Relation(EdgeKind::Watches)).raw(),
            );
        if let Some(parent) = &issue.parent {
            q = q.param("parent", parent.raw()).param(
                "parent_edge",
                Id::new(EntityKind::Relation(EdgeKind::KindOf)).raw(),
            );
        }
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&id).await
    }

    /// Fetch an issue with its neighbour-ID lists.
    pub async fn get(&self, id: &Id) -> Result<Issue> {
        self.try_get(id).await.map_err(Error::read(ENTITY))
    }

    async fn try_get(&self, id: &Id) -> Result<Issue> {
        let cypher = format!(
            "MATCH (i:Issue {{id: $id}}) \
             OPTIONAL MATCH (reporter:User)-[:{created}]->(i) \
             OPTIONAL MATCH (i)-[:{kind_of}]->(par:Issue) \
             OPTIONAL MATCH (assignee:User)-[:{assigned}]->(i) \
             OPTIONAL MATCH (i)-[:{label}]->(l:Label) \
             OPTIONAL MATCH (i)-[:{comment}]->(c:Comment) \
             OPTIONAL MATCH (i)-[:{attachment}]->(a:Attachment) \
             OPTIONAL MATCH (watcher:User)-[:{watches}]->(i) \
             OPTIONAL MATCH (i)-[rel:{related}]-(:Issue) \
             RETURN i, reporter.id AS reported_by, par.id AS parent, \
                    collect(DISTINCT assignee.id) AS assignees, \
                    collect(DISTINCT l.id) AS labels, \
                    collect(DISTINCT c.id) AS comments, \
                    collect(DISTINCT a.id) AS attachments, \
                    collect(DISTINCT watcher.id) AS watchers, \
                    collect(DISTINCT rel.id) AS relations",
            created = EdgeKind::Created.as_str(),
            kind_of = EdgeKind::KindOf.as_str(),
            assigned = EdgeKind::AssignedTo.as_str(),
            label = EdgeKind::HasLabel.as_str(),
            comment = EdgeKind::HasComment.as_str(),
            attachment = EdgeKind::HasAttachment.as_str(),
            watches = EdgeKind::Watches.as_str(),
            related = EdgeKind::RelatedTo.as_str(),
        );
        let row = self
            .db
            .read_single(query(&cypher).param("id", id.raw()))
            .await?;
        let mut issue: Issue = mapper::hydrate_node(&row, "i", EntityKind::Issue, &[])?;
        issue.reported_by = mapper::optional_id(&row, "reported_by", EntityKind::User)?;
        issue.parent = mapper::optional_id(&row, "parent", EntityKind::Issue)?;
        issue.assignees = mapper::id_list(&row, "assignees", EntityKind::User)?;
        issue.labels = mapper::id_list(&row, "labels", EntityKind::Label)?;
        issue.comments = mapper::id_list(&row, "comments", EntityKind::Comment)?;
        issue.attachments = mapper::id_list(&row, "attachments", EntityKind::Attachment)?;
        issue.watchers = mapper::id_list(&row, "watchers", EntityKind::User)?;
        issue.relations = mapper::id_list(&row, "relations", EntityKind::IssueRelation)?;
        Ok(issue)
    }

    /// List a project's issues, newest first.
    pub async fn get_all(&self, project: &Id, skip: usize, limit: usize) -> Result<Vec<Issue>> {
        let cypher = format!(
            "MATCH (i:Issue)-[:{belongs}]->(p:Project {{id: $project}}) \
             RETURN i ORDER BY i.created_at DESC SKIP $skip LIMIT $limit",
            belongs = EdgeKind::BelongsTo.as_str(),
        );
        let rows = self
            .db
            .read_all(
                query(&cypher)
                    .param("project", project.raw())
                    .param("skip", skip as i64)
                    .param("limit", limit as i64),
            )
            .await
            .map_err(Error::read(ENTITY))?;
        rows.iter()
            .map(|row| mapper::hydrate_node(row, "i", EntityKind::Issue, &[]))
            .collect::<Result<_>>()
            .map_err(Error::read(ENTITY))
    }

    /// Overwrite an issue's mutable properties. `numeric_id` never
    /// changes.
    pub async fn update(&self, issue: &Issue) -> Result<Issue> {
        self.try_update(issue).await.map_err(Error::update(ENTITY))
    }

    async fn try_update(&self, issue: &Issue) -> Result<Issue> {
        issue.validate()?;
        let props = entity_properties(issue, EXCLUDE)?;
        let (clauses, params) = set_clauses("i", &props);
        let cypher = format!(
            "MATCH (i:Issue {{id: $id}}) \
             SET i.updated_at = $now, {clauses} \
             RETURN i.id AS id"
        );
        let q = query(&cypher)
            .param("id", issue.id.raw())
            .param("now", now());
        let q = append_props(q, &params)?;
        self.db.write_single(q).await?;
        self.try_get(&issue.id).await
    }

    /// Remove an issue and every incident edge. Idempotent.
    pub async fn delete(&self, id: &Id) -> Result<()> {
        let q = query("MATCH (i:Issue {id: $id}) DETACH DELETE i").param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(ENTITY))
    }

    /// Subscribe a user to an issue. Idempotent.
    pub async fn add_watcher(&self, issue: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (i:Issue {{id: $issue}}) \
             MATCH (u:User {{id: $user}}) \
             MERGE (u)-[w:{watches}]->(i) \
             ON CREATE SET w.id = $edge, w.created_at = $now \
             ON MATCH SET w.updated_at = $now \
             RETURN w.id AS id",
            watches = EdgeKind::Watches.as_str(),
        );
        let q = query(&cypher)
            .param("issue", issue.raw())
            .param("user", user.raw())
            .param(
                "edge",
                Id::new(EntityKind::Relation(EdgeKind::Watches)).raw(),
            )
            .param("now", now());
        self.db
            .write_single(q)
            .await
            .map(|_| ())
            .map_err(Error::update(ENTITY))
    }

    /// Unsubscribe a user from an issue. Idempotent.
    pub async fn remove_watcher(&self, issue: &Id, user: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (u:User {{id: $user}})-[w:{watches}]->(i:Issue {{id: $issue}}) \
             DELETE w",
            watches = EdgeKind::Watches.as_str(),
        );
        let q = query(&cypher)
            .param("issue", issue.raw())
            .param("user", user.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::update(ENTITY))
    }

    /// Relate two issues. Idempotent per `(source, target, kind)` triple.
    pub async fn add_relation(&self, relation: &IssueRelation) -> Result<IssueRelation> {
        self.try_add_relation(relation)
            .await
            .map_err(Error::create(RELATION_ENTITY))
    }

    async fn try_add_relation(&self, relation: &IssueRelation) -> Result<IssueRelation> {
        relation.validate()?;
        let cypher = format!(
            "MATCH (s:Issue {{id: $source}}) \
             MATCH (t:Issue {{id: $target}}) \
             MERGE (s)-[r:{related} {{kind: $kind}}]->(t) \
             ON CREATE SET r.id = $edge, r.created_at = $now \
             ON MATCH SET r.updated_at = $now \
             RETURN r.id AS id",
            related = EdgeKind::RelatedTo.as_str(),
        );
        let q = query(&cypher)
            .param("source", relation.source.raw())
            .param("target", relation.target.raw())
            .param("kind", relation.kind.to_string())
            .param("edge", Id::new(EntityKind::IssueRelation).raw())
            .param("now", now());
        let row = self.db.write_single(q).await?;
        let mut stored = relation.clone();
        stored.id = mapper::id(&row, "id", EntityKind::IssueRelation)?;
        Ok(stored)
    }

    /// Remove a relation by its edge ID. Idempotent.
    pub async fn remove_relation(&self, id: &Id) -> Result<()> {
        let cypher = format!(
            "MATCH (:Issue)-[r:{related} {{id: $id}}]-(:Issue) DELETE r",
            related = EdgeKind::RelatedTo.as_str(),
        );
        let q = query(&cypher).param("id", id.raw());
        self.db
            .write_and_consume(q)
            .await
            .map_err(Error::delete(RELATION_ENTITY))
    }

    /// Every relation an issue participates in, on either end.
    pub async fn get_relations(&self, issue: &Id) -> Result<Vec<IssueRelation>> {
        self.try_get_relations(issue)
            .await
            .map_err(Error::read(RELATION_ENTITY))
    }

    async fn try_get_relations(&self, issue: &Id) -> Result<Vec<IssueRelation>> {
        let cypher = format!(
            "MATCH (s:Issue {{id: $id}})-[r:{related}]-(t:Issue) \
             RETURN r.id AS id, r.kind AS kind, \
                    CASE WHEN startNode(r) = s THEN s.id ELSE t.id END AS source, \
                    CASE WHEN startNode(r) = s THEN t.id ELSE s.id END AS target",
            related = EdgeKind::RelatedTo.as_str(),
        );
        let rows = self
            .db
            .read_all(query(&cypher).param("id", issue.raw()))
            .await?;
        rows.iter()
            .map(|row| {
                let relation = IssueRelation {
                    id: mapper::id(row, "id", EntityKind::IssueRelation)?,
                    source: mapper::id(row, "source", EntityKind::Issue)?,
                    target: mapper::id(row, "target", EntityKind::Issue)?,
                    kind: mapper::string(row, "kind")?.parse()?,
                    created_at: None,
                    updated_at: None,
                };
                relation.validate()?;
                Ok(relation)
            })
            .collect()
    }
}
