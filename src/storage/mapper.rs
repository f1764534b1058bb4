//! Hydration of query results back into typed entities.
//!
//! Nodes come off the wire as flat property maps. The mapper strips the
//! properties an entity does not own, swaps the raw `id` string for a
//! typed identifier and runs the entity's `Validate` contract, so a
//! corrupted record surfaces as [`Error::MalformedResult`] instead of a
//! half-built value.

use neo4rs::{Node, Row};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::convert::any_to_any;
use crate::models::{EntityKind, Id, Validate};
use crate::{Error, Result};

/// Pull the node bound to `alias` out of a row.
pub(crate) fn node(row: &Row, alias: &str) -> Result<Node> {
    row.get::<Node>(alias)
        .map_err(|e| Error::MalformedResult(format!("missing node `{alias}`: {e}")))
}

/// A node's properties as a JSON map.
pub(crate) fn node_properties(node: &Node) -> Result<Map<String, Value>> {
    node.to::<Map<String, Value>>()
        .map_err(|e| Error::MalformedResult(e.to_string()))
}

/// Hydrate the node bound to `alias` into an entity of the given kind.
pub(crate) fn hydrate_node<T>(
    row: &Row,
    alias: &str,
    kind: EntityKind,
    exclude: &[&str],
) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let node = node(row, alias)?;
    hydrate_map(node_properties(&node)?, kind, exclude)
}

/// Hydrate a raw property map into an entity of the given kind.
pub(crate) fn hydrate_map<T>(
    mut props: Map<String, Value>,
    kind: EntityKind,
    exclude: &[&str],
) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    for key in exclude {
        props.remove(*key);
    }
    let raw = match props.remove("id") {
        Some(Value::String(s)) => s,
        _ => return Err(Error::MalformedResult("missing id property".to_string())),
    };
    let id = Id::parse(&raw, kind)
        .map_err(|_| Error::MalformedResult(format!("malformed id `{raw}`")))?;
    props.insert(
        "id".to_string(),
        serde_json::to_value(&id).map_err(|e| Error::Marshal(e.to_string()))?,
    );

    let entity: T = any_to_any(&Value::Object(props))
        .map_err(|e| Error::MalformedResult(e.to_string()))?;
    entity
        .validate()
        .map_err(|e| Error::MalformedResult(e.to_string()))?;
    Ok(entity)
}

/// Read a `collect(...)` column of raw id strings into typed identifiers.
pub(crate) fn id_list(row: &Row, column: &str, kind: EntityKind) -> Result<Vec<Id>> {
    let raws: Vec<String> = row
        .get(column)
        .map_err(|e| Error::MalformedResult(format!("missing column `{column}`: {e}")))?;
    raws.iter()
        .map(|raw| {
            Id::parse(raw, kind)
                .map_err(|_| Error::MalformedResult(format!("malformed id `{raw}` in `{column}`")))
        })
        .collect()
}

/// Read a single required string column.
pub(crate) fn string(row: &Row, column: &str) -> Result<String> {
    row.get(column)
        .map_err(|e| Error::MalformedResult(format!("missing column `{column}`: {e}")))
}

/// Read a required id column into a typed identifier.
pub(crate) fn id(row: &Row, column: &str, kind: EntityKind) -> Result<Id> {
    let raw = string(row, column)?;
    Id::parse(&raw, kind)
        .map_err(|_| Error::MalformedResult(format!("malformed id `{raw}` in `{column}`")))
}

/// Read a nullable RFC3339 timestamp column.
pub(crate) fn optional_timestamp(
    row: &Row,
    column: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    let raw: Option<String> = row
        .get(column)
        .map_err(|e| Error::MalformedResult(format!("missing column `{column}`: {e}")))?;
    match raw {
        Some(raw) => {
            let parsed = chrono::DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                Error::MalformedResult(format!("malformed timestamp `{raw}`: {e}"))
            })?;
            Ok(Some(parsed.with_timezone(&chrono::Utc)))
        }
        None => Ok(None),
    }
}

/// Read a nullable id column into a typed identifier.
pub(crate) fn optional_id(row: &Row, column: &str, kind: EntityKind) -> Result<Option<Id>> {
    let raw: Option<String> = row
        .get(column)
        .map_err(|e| Error::MalformedResult(format!("missing column `{column}`: {e}")))?;
    match raw {
        Some(raw) => Ok(Some(Id::parse(&raw, kind).map_err(|_| {
            Error::MalformedResult(format!("malformed id `{raw}` in `{column}`"))
        })?)),
        None => Ok(None),
    }
}
