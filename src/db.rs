use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::Neo4jSettings;
use crate::error::{GraphError, Result};
use crate::query::{CypherQuery, Row};

const SERVER_INFO_QUERY: &str = "CALL dbms.components() YIELD name, versions, edition \
     RETURN name, versions[0] AS version, edition";

/// Metadata reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub address: String,
    pub product: String,
    pub version: String,
    pub edition: String,
}

/// An established capability to open sessions against the database.
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Opens a session. The session is released when dropped.
    async fn session(&self) -> Result<Box<dyn GraphSession>>;

    async fn server_info(&self) -> Result<ServerInfo>;

    /// Gives up the client's claim on its resources. Sessions still in flight
    /// keep their own share of the underlying pool until they are dropped.
    async fn close(&self);
}

/// A short-lived context for running queries.
#[async_trait]
pub trait GraphSession: Send {
    /// Runs `query` and returns every record, flattened, in server order.
    /// Columns within a row are keyed by name; see [`flatten_record`] for ordering.
    async fn execute(&mut self, query: &CypherQuery) -> Result<Vec<Row>>;
}

/// Builds clients from resolved settings.
#[async_trait]
pub trait GraphConnector: Send + Sync {
    async fn connect(&self, settings: &Neo4jSettings) -> Result<Arc<dyn GraphClient>>;
}

/// Connector backed by the `neo4rs` driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct Neo4jConnector;

#[async_trait]
impl GraphConnector for Neo4jConnector {
    async fn connect(&self, settings: &Neo4jSettings) -> Result<Arc<dyn GraphClient>> {
        let client = Neo4jClient::connect(settings).await?;
        Ok(Arc::new(client))
    }
}

#[derive(Clone)]
pub struct Neo4jClient {
    graph: Graph,
    address: String,
}

impl Neo4jClient {
    pub async fn connect(settings: &Neo4jSettings) -> Result<Self> {
        let missing = settings.missing_keys();
        if !missing.is_empty() {
            return Err(GraphError::Unavailable(format!(
                "missing configuration: {}",
                missing.join(", ")
            )));
        }

        let mut builder = ConfigBuilder::default()
            .uri(&settings.uri)
            .user(&settings.username)
            .password(&settings.password)
            .max_connections(settings.max_connections);
        if let Some(db) = &settings.database {
            builder = builder.db(db.as_str());
        }
        if let Some(fetch_size) = settings.fetch_size {
            builder = builder.fetch_size(fetch_size);
        }

        let config = builder.build().map_err(|e| {
            GraphError::Unavailable(format!("invalid Neo4j configuration: {}", e))
        })?;

        let graph = Graph::connect(config).await.map_err(|e| {
            GraphError::Unavailable(format!("failed to connect to {}: {}", settings.uri, e))
        })?;

        info!("Connected to Neo4j at {}", settings.uri);
        Ok(Self {
            graph,
            address: settings.uri.clone(),
        })
    }
}

#[async_trait]
impl GraphClient for Neo4jClient {
    async fn session(&self) -> Result<Box<dyn GraphSession>> {
        Ok(Box::new(Neo4jSession {
            graph: self.graph.clone(),
        }))
    }

    async fn server_info(&self) -> Result<ServerInfo> {
        let mut result = self.graph.execute(neo4rs::query(SERVER_INFO_QUERY)).await?;

        match result.next().await? {
            Some(row) => server_info_from_row(&self.address, &row),
            None => Err(GraphError::Decode(
                "server returned no component metadata".to_string(),
            )),
        }
    }

    async fn close(&self) {
        // The pool shuts down once the last Graph clone is dropped, including
        // the ones held by sessions still in flight.
        info!("Closing Neo4j client for {}", self.address);
    }
}

/// Session over the pooled graph. Each result stream holds a pooled
/// connection until it has been drained and dropped.
pub struct Neo4jSession {
    graph: Graph,
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn execute(&mut self, query: &CypherQuery) -> Result<Vec<Row>> {
        let mut result = self.graph.execute(query.to_bolt()?).await?;

        let mut rows = Vec::new();
        while let Some(record) = result.next().await? {
            rows.push(flatten_record(&record)?);
        }

        debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}

/// Flattens one driver record into a row.
///
/// neo4rs 0.8 keeps a record's fields in a hash map and does not expose the
/// server's column list, so columns come back sorted by name. Nodes and
/// relationships flatten to their property maps.
pub fn flatten_record(record: &neo4rs::Row) -> Result<Row> {
    let columns = record
        .to_strict::<BTreeMap<String, Value>>()
        .map_err(|e| {
            error!("Failed to flatten record: {}", e);
            GraphError::Decode(e.to_string())
        })?;
    Ok(columns.into_iter().collect())
}

fn server_info_from_row(address: &str, row: &neo4rs::Row) -> Result<ServerInfo> {
    let field = |key: &str| {
        row.get::<String>(key)
            .map_err(|e| GraphError::Decode(format!("component metadata field '{}': {}", key, e)))
    };

    Ok(ServerInfo {
        address: address.to_string(),
        product: field("name")?,
        version: field("version")?,
        edition: field("edition")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo4rs::{BoltInteger, BoltList, BoltMap, BoltNode, BoltString, BoltType};
    use serde_json::json;

    fn record(columns: Vec<(&str, BoltType)>) -> neo4rs::Row {
        let mut fields = BoltList::new();
        let mut data = BoltList::new();
        for (name, value) in columns {
            fields.push(BoltType::String(BoltString::new(name)));
            data.push(value);
        }
        neo4rs::Row::new(fields, data)
    }

    fn int(n: i64) -> BoltType {
        BoltType::Integer(BoltInteger::new(n))
    }

    fn text(s: &str) -> BoltType {
        BoltType::String(BoltString::new(s))
    }

    #[test]
    fn columns_are_sorted_by_name() {
        let row = record(vec![
            ("zeta", int(0)),
            ("alpha", int(1)),
            ("mid", int(2)),
            ("beta", int(3)),
            ("omega", int(4)),
            ("gamma", int(5)),
        ]);

        let flat = flatten_record(&row).unwrap();

        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["alpha", "beta", "gamma", "mid", "omega", "zeta"]);
        assert_eq!(flat["zeta"], json!(0));
        assert_eq!(flat["alpha"], json!(1));
        assert_eq!(flat["gamma"], json!(5));
    }

    #[test]
    fn single_column_row() {
        let flat = flatten_record(&record(vec![("n", int(1))])).unwrap();
        assert_eq!(Value::Object(flat), json!({ "n": 1 }));
    }

    #[test]
    fn lists_and_maps_flatten_to_json() {
        let mut list = BoltList::new();
        list.push(text("a"));
        list.push(int(2));
        list.push(BoltType::Null(neo4rs::BoltNull));

        let mut map = BoltMap::new();
        map.put(BoltString::new("depth"), int(3));
        map.put(BoltString::new("label"), text("root"));

        let flat = flatten_record(&record(vec![
            ("items", BoltType::List(list)),
            ("meta", BoltType::Map(map)),
        ]))
        .unwrap();

        assert_eq!(
            Value::Object(flat),
            json!({ "items": ["a", 2, null], "meta": { "depth": 3, "label": "root" } })
        );
    }

    #[test]
    fn nodes_flatten_to_their_properties() {
        let mut labels = BoltList::new();
        labels.push(text("Person"));
        let mut properties = BoltMap::new();
        properties.put(BoltString::new("name"), text("Alice"));
        let node = BoltNode::new(BoltInteger::new(42), labels, properties);

        let flat = flatten_record(&record(vec![("p", BoltType::Node(node))])).unwrap();

        assert_eq!(Value::Object(flat), json!({ "p": { "name": "Alice" } }));
    }

    #[test]
    fn server_info_reads_component_columns() {
        let row = record(vec![
            ("name", text("Neo4j Kernel")),
            ("version", text("5.20.0")),
            ("edition", text("community")),
        ]);

        let info = server_info_from_row("bolt://db:7687", &row).unwrap();

        assert_eq!(
            info,
            ServerInfo {
                address: "bolt://db:7687".to_string(),
                product: "Neo4j Kernel".to_string(),
                version: "5.20.0".to_string(),
                edition: "community".to_string(),
            }
        );
    }

    #[test]
    fn malformed_server_info_is_a_decode_error() {
        let row = record(vec![
            ("name", text("Neo4j Kernel")),
            ("version", int(5)),
            ("edition", text("community")),
        ]);

        match server_info_from_row("bolt://db:7687", &row) {
            Err(GraphError::Decode(msg)) => assert!(msg.contains("version")),
            other => panic!("expected a decode error, got {:?}", other),
        }
    }

    #[test]
    fn missing_server_info_column_is_a_decode_error() {
        let row = record(vec![("name", text("Neo4j Kernel")), ("version", text("5.20.0"))]);

        assert!(matches!(
            server_info_from_row("bolt://db:7687", &row),
            Err(GraphError::Decode(_))
        ));
    }
}
