//! Connection settings for the graph database.
//!
//! Values are looked up through a [`ConfigProvider`], chosen once at startup
//! from the [`RuntimeEnvironment`]. Server builds read the process
//! environment; browser (wasm32) builds read values baked in at compile time.
//! Missing values never fail resolution: they are logged and left empty so the
//! failure surfaces on the first connection attempt instead.

use std::collections::HashMap;
use std::env;
use std::fmt;

use tracing::{info, warn};

pub const URI_KEY: &str = "NEO4J_URI";
pub const USERNAME_KEY: &str = "NEO4J_USERNAME";
pub const PASSWORD_KEY: &str = "NEO4J_PASSWORD";
pub const DATABASE_KEY: &str = "NEO4J_DATABASE";
pub const MAX_CONNECTIONS_KEY: &str = "NEO4J_MAX_CONNECTIONS";
pub const FETCH_SIZE_KEY: &str = "NEO4J_FETCH_SIZE";

pub const DEFAULT_MAX_CONNECTIONS: usize = 5;

const KNOWN_SCHEMES: [&str; 6] = [
    "neo4j://",
    "neo4j+s://",
    "neo4j+ssc://",
    "bolt://",
    "bolt+s://",
    "bolt+ssc://",
];

/// Where a configuration value comes from.
pub trait ConfigProvider: Send + Sync {
    /// Short name used in diagnostics.
    fn source(&self) -> &'static str;

    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment variables. Call `dotenvy::dotenv()` beforehand to pick up a `.env` file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl ConfigProvider for ProcessEnv {
    fn source(&self) -> &'static str {
        "process environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// Values captured from the build environment when the crate was compiled.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildTimeEnv;

impl ConfigProvider for BuildTimeEnv {
    fn source(&self) -> &'static str {
        "build-time environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            URI_KEY => option_env!("NEO4J_URI"),
            USERNAME_KEY => option_env!("NEO4J_USERNAME"),
            PASSWORD_KEY => option_env!("NEO4J_PASSWORD"),
            DATABASE_KEY => option_env!("NEO4J_DATABASE"),
            MAX_CONNECTIONS_KEY => option_env!("NEO4J_MAX_CONNECTIONS"),
            FETCH_SIZE_KEY => option_env!("NEO4J_FETCH_SIZE"),
            _ => None,
        };
        value.map(str::to_string)
    }
}

/// In-memory key/value configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigProvider for StaticConfig {
    fn source(&self) -> &'static str {
        "static configuration"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    Browser,
    Server,
}

impl RuntimeEnvironment {
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            RuntimeEnvironment::Browser
        } else {
            RuntimeEnvironment::Server
        }
    }

    pub fn provider(self) -> Box<dyn ConfigProvider> {
        match self {
            RuntimeEnvironment::Browser => Box::new(BuildTimeEnv),
            RuntimeEnvironment::Server => Box::new(ProcessEnv),
        }
    }
}

/// Provider for the environment this binary is running in.
pub fn default_provider() -> Box<dyn ConfigProvider> {
    RuntimeEnvironment::detect().provider()
}

/// Resolved connection parameters. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Neo4jSettings {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub max_connections: usize,
    pub fetch_size: Option<usize>,
}

impl Neo4jSettings {
    pub fn new(uri: &str, username: &str, password: &str) -> Self {
        Self {
            uri: uri.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            database: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            fetch_size: None,
        }
    }

    /// Resolves settings from `provider`. Missing required values are logged
    /// and replaced with empty strings.
    pub fn resolve(provider: &dyn ConfigProvider) -> Self {
        let source = provider.source();

        let required = |key: &str| -> String {
            match non_blank(provider.get(key)) {
                Some(value) => value,
                None => {
                    warn!("{} is not set in the {}; using an empty value", key, source);
                    String::new()
                }
            }
        };

        let uri = required(URI_KEY);
        let username = required(USERNAME_KEY);
        let password = required(PASSWORD_KEY);

        if !uri.is_empty() && !KNOWN_SCHEMES.iter().any(|s| uri.starts_with(s)) {
            warn!(
                "{} '{}' has an unexpected scheme; expected neo4j://host:port or bolt://host:port",
                URI_KEY, uri
            );
        }

        let max_connections = parse_number(provider, MAX_CONNECTIONS_KEY)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let fetch_size = parse_number(provider, FETCH_SIZE_KEY);

        let settings = Self {
            uri,
            username,
            password,
            database: non_blank(provider.get(DATABASE_KEY)),
            max_connections,
            fetch_size,
        };

        info!(
            "Resolved Neo4j settings from the {}: uri={} user={} max_connections={}",
            source,
            if settings.uri.is_empty() { "[NOT SET]" } else { settings.uri.as_str() },
            if settings.username.is_empty() { "[NOT SET]" } else { settings.username.as_str() },
            settings.max_connections
        );

        settings
    }

    /// Resolves settings from the provider matching the detected runtime.
    pub fn from_env() -> Self {
        Self::resolve(default_provider().as_ref())
    }

    /// Required keys that resolved to empty values.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        [
            (URI_KEY, &self.uri),
            (USERNAME_KEY, &self.username),
            (PASSWORD_KEY, &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(key, _)| key)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_keys().is_empty()
    }
}

impl fmt::Debug for Neo4jSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jSettings")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(provider: &dyn ConfigProvider, key: &str) -> Option<usize> {
    let raw = non_blank(provider.get(key))?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!("{} has invalid value '{}'; using the default", key, raw);
            None
        }
    }
}
