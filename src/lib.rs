pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod query;

pub use config::{
    default_provider, BuildTimeEnv, ConfigProvider, Neo4jSettings, ProcessEnv, RuntimeEnvironment,
    StaticConfig,
};
pub use connection::GraphConnection;
pub use db::{
    GraphClient, GraphConnector, GraphSession, Neo4jClient, Neo4jConnector, Neo4jSession,
    ServerInfo,
};
pub use error::{GraphError, Result};
pub use query::{CypherQuery, QueryParams, Row};
