//! Graph persistence: the database handle and one repository per entity
//! family.
//!
//! All Cypher lives here. Repositories hold a cheap [`Database`] clone and
//! expose async CRUD plus the relationship operations of their entity.
//! Node labels and relationship types are interpolated from the closed
//! [`crate::models::EntityKind`] and [`crate::models::EdgeKind`] registries;
//! every value coming from a caller travels as a bound parameter.

pub mod assignment;
pub mod attachment;
pub mod comment;
pub mod document;
pub mod issue;
pub mod label;
pub mod mapper;
pub mod namespace;
pub mod organization;
pub mod permission;
pub mod project;
pub mod role;
pub mod todo;
pub mod token;
pub mod user;

pub use assignment::AssignmentRepository;
pub use attachment::AttachmentRepository;
pub use comment::CommentRepository;
pub use document::DocumentRepository;
pub use issue::IssueRepository;
pub use label::LabelRepository;
pub use namespace::NamespaceRepository;
pub use organization::OrganizationRepository;
pub use permission::PermissionRepository;
pub use project::ProjectRepository;
pub use role::RoleRepository;
pub use todo::TodoRepository;
pub use token::UserTokenRepository;
pub use user::UserRepository;

use neo4rs::{query, Graph, Query, Row};
use serde::{Deserialize, Serialize};

use crate::models::{EntityKind, Id};
use crate::{Error, Result};

/// Connection settings for the graph database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Target database; the server default when unset
    pub database: Option<String>,
    /// Rows pulled per fetch message
    pub fetch_size: usize,
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7687,
            username: "neo4j".to_string(),
            password: String::new(),
            database: None,
            fetch_size: 500,
            max_connections: 16,
        }
    }
}

impl DatabaseConfig {
    /// The Bolt URI these settings point at.
    pub fn uri(&self) -> String {
        format!("bolt://{}:{}", self.host, self.port)
    }
}

/// Handle to the graph database. Cheap to clone; every repository holds
/// one.
#[derive(Clone)]
pub struct Database {
    graph: Graph,
}

impl Database {
    /// Connect to the database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(Error::InvalidDatabase("host must be set".to_string()));
        }
        let mut builder = neo4rs::ConfigBuilder::default()
            .uri(config.uri())
            .user(&config.username)
            .password(&config.password)
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let driver_config = builder
            .build()
            .map_err(|e| Error::InvalidDriver(e.to_string()))?;
        let graph = Graph::connect(driver_config).await?;
        Ok(Self { graph })
    }

    /// Round-trip a trivial query to check the connection.
    pub async fn ping(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }

    /// Create the uniqueness constraints the repositories rely on (`id`
    /// per node label, plus `User.email` and `Project.key`) and the
    /// supporting indexes behind the `ORDER BY created_at` listings.
    ///
    /// Failures are logged and skipped so the bootstrap works against
    /// servers where the constraints already exist in an older syntax or
    /// the user lacks schema privileges.
    pub async fn ensure_constraints(&self) -> Result<()> {
        let mut statements = Vec::new();
        for kind in EntityKind::node_labels() {
            let label = kind.label();
            statements.push(format!(
                "CREATE CONSTRAINT {}_id_unique IF NOT EXISTS \
                 FOR (n:{label}) REQUIRE n.id IS UNIQUE",
                label.to_lowercase()
            ));
            statements.push(format!(
                "CREATE INDEX {}_created_at IF NOT EXISTS \
                 FOR (n:{label}) ON (n.created_at)",
                label.to_lowercase()
            ));
        }
        statements.push(
            "CREATE CONSTRAINT user_email_unique IF NOT EXISTS \
             FOR (n:User) REQUIRE n.email IS UNIQUE"
                .to_string(),
        );
        statements.push(
            "CREATE CONSTRAINT project_key_unique IF NOT EXISTS \
             FOR (n:Project) REQUIRE n.key IS UNIQUE"
                .to_string(),
        );
        statements.push(
            "CREATE INDEX user_status IF NOT EXISTS \
             FOR (n:User) ON (n.status)"
                .to_string(),
        );

        for statement in statements {
            if let Err(e) = self.graph.run(query(&statement)).await {
                tracing::warn!("constraint bootstrap skipped a statement: {e}");
            }
        }
        Ok(())
    }

    /// Seed the three system roles (owner, admin, support) with their
    /// well-known IDs. Idempotent; run once at bootstrap next to
    /// [`Database::ensure_constraints`].
    pub async fn ensure_system_roles(&self) -> Result<()> {
        for role in crate::models::SystemRole::all() {
            let q = query(
                "MERGE (r:Role {id: $id}) \
                 ON CREATE SET r.name = $name, r.system = true, r.created_at = $now",
            )
            .param("id", role.id())
            .param("name", role.to_string())
            .param("now", now());
            self.graph.run(q).await?;
        }
        Ok(())
    }

    /// Run a write that returns nothing.
    pub(crate) async fn write_and_consume(&self, q: Query) -> Result<()> {
        self.graph.run(q).await?;
        Ok(())
    }

    /// Run a query and demand exactly one row.
    pub(crate) async fn read_single(&self, q: Query) -> Result<Row> {
        let rows = self.read_all(q).await?;
        let got = rows.len();
        let mut rows = rows.into_iter();
        match (rows.next(), got) {
            (Some(row), 1) => Ok(row),
            (None, _) => Err(Error::NotFound),
            (_, got) => Err(Error::ReadResourceCount { expected: 1, got }),
        }
    }

    /// Run a write that returns exactly one row; zero rows means a MATCH in
    /// the statement found nothing.
    pub(crate) async fn write_single(&self, q: Query) -> Result<Row> {
        self.read_single(q).await
    }

    /// Run a query and collect every row.
    pub(crate) async fn read_all(&self, q: Query) -> Result<Vec<Row>> {
        let mut result = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Resolve the node label of a caller-supplied identifier before it is
/// interpolated into a query pattern.
///
/// Repositories address nodes; an identifier minted for a relationship
/// kind would splice a relationship type where a node label belongs, so it
/// is rejected with [`Error::InvalidRepository`].
pub(crate) fn node_label(id: &Id) -> Result<&'static str> {
    if EntityKind::node_labels().contains(&id.kind()) {
        Ok(id.label())
    } else {
        Err(Error::InvalidRepository)
    }
}

/// Serialize an entity into the flat property map stored on its node.
///
/// `exclude` names the fields that are not node properties: the `id` is
/// bound separately and relationship fields (anything `Id`-valued) live as
/// edges.
pub(crate) fn entity_properties<T: Serialize>(
    entity: &T,
    exclude: &[&str],
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let value = serde_json::to_value(entity).map_err(|e| Error::Marshal(e.to_string()))?;
    let serde_json::Value::Object(mut props) = value else {
        return Err(Error::Marshal("entity did not serialize to a map".to_string()));
    };
    for key in exclude {
        props.remove(*key);
    }
    props.remove("id");
    props.remove("created_at");
    props.remove("updated_at");
    Ok(props)
}

/// Build `SET` clause text and the parameter bindings behind it.
///
/// Null-valued properties are inlined as `= null` so an update clears
/// them; everything else binds through a generated `$vN` parameter.
pub(crate) fn set_clauses(
    alias: &str,
    props: &serde_json::Map<String, serde_json::Value>,
) -> (String, Vec<(String, serde_json::Value)>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    for (i, (key, value)) in props.iter().enumerate() {
        if value.is_null() {
            clauses.push(format!("{alias}.{key} = null"));
        } else {
            let name = format!("v{i}");
            clauses.push(format!("{alias}.{key} = ${name}"));
            params.push((name, value.clone()));
        }
    }
    (clauses.join(", "), params)
}

/// Bind a JSON value as a query parameter.
///
/// Nulls never reach this point (inlined by [`set_clauses`]); nested
/// objects and mixed arrays are not valid node properties.
pub(crate) fn append_json_param(q: Query, key: &str, value: &serde_json::Value) -> Result<Query> {
    use serde_json::Value;
    let q = match value {
        Value::Null => q,
        Value::Bool(b) => q.param(key, *b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.param(key, i)
            } else if let Some(f) = n.as_f64() {
                q.param(key, f)
            } else {
                return Err(Error::Marshal(format!("unrepresentable number `{n}`")));
            }
        }
        Value::String(s) => q.param(key, s.as_str()),
        Value::Array(items) => {
            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => strings.push(s.clone()),
                    other => {
                        return Err(Error::Marshal(format!(
                            "unsupported array element `{other}` for property `{key}`"
                        )));
                    }
                }
            }
            q.param(key, strings)
        }
        Value::Object(_) => {
            return Err(Error::Marshal(format!(
                "nested object is not a valid property for `{key}`"
            )));
        }
    };
    Ok(q)
}

/// Bind a whole property map, extending an existing query.
pub(crate) fn append_props(
    mut q: Query,
    params: &[(String, serde_json::Value)],
) -> Result<Query> {
    for (key, value) in params {
        q = append_json_param(q, key, value)?;
    }
    Ok(q)
}

/// The current wall-clock instant in the string format timestamps are
/// stored as.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeKind, EntityKind, Id, Label};

    #[test]
    fn test_entity_properties_excludes_relationship_fields() {
        let mut label = Label::new("backend");
        label.id = Id::new(EntityKind::Label);
        label.description = Some("server side".to_string());
        let props = entity_properties(&label, &[]).unwrap();
        assert!(!props.contains_key("id"));
        assert!(!props.contains_key("created_at"));
        assert_eq!(props["name"], "backend");
        assert_eq!(props["description"], "server side");
    }

    #[test]
    fn test_entity_properties_honours_exclusions() {
        let label = Label::new("backend");
        let props = entity_properties(&label, &["name"]).unwrap();
        assert!(!props.contains_key("name"));
    }

    #[test]
    fn test_unset_optionals_survive_as_nulls() {
        // an unset optional must reach the SET clause as `= null`,
        // otherwise an update could never clear a stored value
        let label = Label::new("backend");
        let props = entity_properties(&label, &[]).unwrap();
        assert!(props.contains_key("description"));
        assert!(props["description"].is_null());
        let (text, params) = set_clauses("n", &props);
        assert!(text.contains("n.description = null"));
        assert!(params.iter().all(|(_, value)| !value.is_null()));
    }

    #[test]
    fn test_set_clauses_inlines_nulls() {
        let mut props = serde_json::Map::new();
        props.insert("name".to_string(), serde_json::json!("backend"));
        props.insert("logo".to_string(), serde_json::Value::Null);
        let (text, params) = set_clauses("n", &props);
        assert!(text.contains("n.logo = null"));
        assert!(text.contains("n.name = $"));
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].1, serde_json::json!("backend"));
    }

    #[test]
    fn test_set_clauses_empty_map() {
        let (text, params) = set_clauses("n", &serde_json::Map::new());
        assert!(text.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_append_json_param_rejects_objects() {
        let q = query("RETURN 1");
        let Err(err) = append_json_param(q, "p", &serde_json::json!({"a": 1})) else {
            panic!("nested object should be rejected");
        };
        assert!(matches!(err, Error::Marshal(_)));
    }

    #[test]
    fn test_append_json_param_rejects_mixed_arrays() {
        let q = query("RETURN 1");
        let Err(err) = append_json_param(q, "p", &serde_json::json!(["a", 1])) else {
            panic!("mixed array should be rejected");
        };
        assert!(matches!(err, Error::Marshal(_)));
    }

    #[test]
    fn test_default_config_uri() {
        let config = DatabaseConfig::default();
        assert_eq!(config.uri(), "bolt://127.0.0.1:7687");
    }

    #[test]
    fn test_node_label_rejects_relationship_kinds() {
        let org = Id::new(EntityKind::Organization);
        assert_eq!(node_label(&org).unwrap(), "Organization");

        let membership = Id::new(EntityKind::Relation(EdgeKind::MemberOf));
        assert!(matches!(node_label(&membership), Err(Error::InvalidRepository)));
        let grant = Id::new(EntityKind::Permission);
        assert!(matches!(node_label(&grant), Err(Error::InvalidRepository)));
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_host() {
        let config = DatabaseConfig {
            host: String::new(),
            ..DatabaseConfig::default()
        };
        let Err(err) = Database::connect(&config).await else {
            panic!("connect should reject an empty host");
        };
        assert!(matches!(err, Error::InvalidDatabase(_)));
    }
}
