use thiserror::Error;

/// Failures surfaced by the graph connection facade.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The shared handle could not be constructed.
    #[error("graph database unavailable: {0}")]
    Unavailable(String),

    /// Error reported by the Neo4j driver while opening a session or running a query.
    #[error(transparent)]
    Driver(#[from] neo4rs::Error),

    /// A returned record could not be flattened into a row.
    #[error("failed to decode record: {0}")]
    Decode(String),

    /// A query parameter has no Bolt representation.
    #[error("invalid query parameter: {0}")]
    Parameter(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
