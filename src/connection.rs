//! The shared graph connection.
//!
//! A [`GraphConnection`] is built once by the application and passed by
//! reference to whatever needs the database. The underlying client is created
//! on first use and reused until [`GraphConnection::close`] is called.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::{ConfigProvider, Neo4jSettings};
use crate::db::{GraphClient, GraphConnector, Neo4jConnector, ServerInfo};
use crate::error::Result;
use crate::query::{CypherQuery, QueryParams, Row};

pub struct GraphConnection {
    settings: Neo4jSettings,
    connector: Arc<dyn GraphConnector>,
    client: Mutex<Option<Arc<dyn GraphClient>>>,
}

impl GraphConnection {
    pub fn new(settings: Neo4jSettings) -> Self {
        Self::with_connector(settings, Arc::new(Neo4jConnector))
    }

    pub fn with_connector(settings: Neo4jSettings, connector: Arc<dyn GraphConnector>) -> Self {
        Self {
            settings,
            connector,
            client: Mutex::new(None),
        }
    }

    pub fn from_provider(provider: &dyn ConfigProvider) -> Self {
        Self::new(Neo4jSettings::resolve(provider))
    }

    pub fn from_env() -> Self {
        Self::new(Neo4jSettings::from_env())
    }

    pub fn settings(&self) -> &Neo4jSettings {
        &self.settings
    }

    /// Returns the shared client, connecting on the first call.
    ///
    /// Concurrent first callers wait on the same construction. A failed
    /// construction is logged and returned; the next call tries again.
    pub async fn handle(&self) -> Result<Arc<dyn GraphClient>> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        info!("Creating Neo4j client for {}", display_uri(&self.settings));
        match self.connector.connect(&self.settings).await {
            Ok(client) => {
                *slot = Some(Arc::clone(&client));
                Ok(client)
            }
            Err(e) => {
                error!("Failed to create Neo4j client: {}", e);
                Err(e)
            }
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Closes the shared client. A later [`handle`](Self::handle) call connects afresh.
    pub async fn close(&self) {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            client.close().await;
            info!("Neo4j client closed");
        }
    }

    /// Runs `query` with optional named parameters and returns the flattened rows.
    pub async fn run_query(&self, query: &str, params: Option<QueryParams>) -> Result<Vec<Row>> {
        self.run(CypherQuery::with_params(query, params)).await
    }

    pub async fn run(&self, query: CypherQuery) -> Result<Vec<Row>> {
        let client = self.handle().await?;

        let result: Result<Vec<Row>> = async {
            let mut session = client.session().await?;
            session.execute(&query).await
        }
        .await;

        match result {
            Ok(rows) => {
                debug!("{} rows from: {}", rows.len(), query.text());
                Ok(rows)
            }
            Err(e) => {
                error!("Query failed: {} ({})", e, query.text());
                Err(e)
            }
        }
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        self.handle().await?.server_info().await
    }

    /// True when the server answers a metadata request. Failures are logged, not returned.
    pub async fn verify_connection(&self) -> bool {
        match self.server_info().await {
            Ok(info) => {
                info!(
                    "Neo4j reachable at {} ({} {} {})",
                    info.address, info.product, info.version, info.edition
                );
                true
            }
            Err(e) => {
                error!("Neo4j connection check failed: {}", e);
                false
            }
        }
    }
}

fn display_uri(settings: &Neo4jSettings) -> &str {
    if settings.uri.is_empty() {
        "[NOT SET]"
    } else {
        &settings.uri
    }
}
