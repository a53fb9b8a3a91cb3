//! Configuration for the ScopeGraph gateway
//!
//! Settings come from the environment (optionally seeded from a `.env` file).
//! Invalid values are logged and the default is kept.

pub mod partition;
pub mod styles;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::data::ConfigError;

pub use partition::PartitionScheme;
pub use styles::{
    LabelStyle, RelationshipStyle, ResolvedNodeStyle, ResolvedRelationshipStyle, StyleConfig,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAPPER_WORKERS: usize = 4;
pub const DEFAULT_ELEMENT_BUDGET: usize = 1000;

/// What to do with a query that has no MATCH clause to scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscopedQueryPolicy {
    /// Run it unscoped and log a warning.
    #[default]
    PassThrough,
    /// Refuse it as invalid input.
    Reject,
}

impl FromStr for UnscopedQueryPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass_through" | "pass-through" => Ok(Self::PassThrough),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::Invalid(format!("unknown unscoped query policy: {}", other))),
        }
    }
}

/// What to do when the tenant's partition label does not exist in the store yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPartitionPolicy {
    /// Always scope; a tenant without data only sees shared elements.
    #[default]
    ScopeAnyway,
    /// Check the label catalog first and run unscoped when the label is absent.
    SkipScoping,
}

impl FromStr for MissingPartitionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scope_anyway" | "scope-anyway" => Ok(Self::ScopeAnyway),
            "skip_scoping" | "skip-scoping" => Ok(Self::SkipScoping),
            other => Err(ConfigError::Invalid(format!(
                "unknown missing partition policy: {}",
                other
            ))),
        }
    }
}

/// Retry behaviour of the query executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Configuration for the Neo4j connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub pool_size: usize,
    pub connection_retry_count: u32,
    pub connection_retry_delay_ms: u64,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "neo4j://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: "password".to_string(),
            database: None,
            pool_size: 10,
            connection_retry_count: 3,
            connection_retry_delay_ms: 2000,
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub neo4j: Neo4jConfig,

    /// Attempts per query, counting the first one
    pub max_attempts: u32,

    /// Fixed pause between attempts
    pub retry_delay_ms: u64,

    /// Concurrent column workers per record
    pub mapper_workers: usize,

    /// Nodes plus relationships admitted per response
    pub element_budget: usize,

    pub partition_prefix: String,
    pub shared_label: String,

    /// Regex a tenant id must match in full
    pub tenant_pattern: String,

    pub unscoped_query_policy: UnscopedQueryPolicy,
    pub missing_partition_policy: MissingPartitionPolicy,

    /// YAML style table; the built-in table is used when unset
    pub styles_file: Option<String>,

    pub bind_address: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            neo4j: Neo4jConfig::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            mapper_workers: DEFAULT_MAPPER_WORKERS,
            element_budget: DEFAULT_ELEMENT_BUDGET,
            partition_prefix: partition::DEFAULT_PARTITION_PREFIX.to_string(),
            shared_label: partition::DEFAULT_SHARED_LABEL.to_string(),
            tenant_pattern: partition::DEFAULT_TENANT_PATTERN.to_string(),
            unscoped_query_policy: UnscopedQueryPolicy::default(),
            missing_partition_policy: MissingPartitionPolicy::default(),
            styles_file: None,
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: String, target: &mut T) {
    match raw.parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!("Invalid {} value: {}", key, raw),
    }
}

impl GatewayConfig {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(uri) = lookup("NEO4J_URI") {
            config.neo4j.uri = uri;
        }
        if let Some(username) = lookup("NEO4J_USERNAME") {
            config.neo4j.username = username;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            config.neo4j.password = password;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            config.neo4j.database = Some(database);
        }
        if let Some(pool_size) = lookup("NEO4J_POOL_SIZE") {
            parse_or_warn("NEO4J_POOL_SIZE", pool_size, &mut config.neo4j.pool_size);
        }

        if let Some(attempts) = lookup("GATEWAY_MAX_ATTEMPTS") {
            parse_or_warn("GATEWAY_MAX_ATTEMPTS", attempts, &mut config.max_attempts);
        }
        if let Some(delay) = lookup("GATEWAY_RETRY_DELAY_MS") {
            parse_or_warn("GATEWAY_RETRY_DELAY_MS", delay, &mut config.retry_delay_ms);
        }
        if let Some(workers) = lookup("GATEWAY_MAPPER_WORKERS") {
            parse_or_warn("GATEWAY_MAPPER_WORKERS", workers, &mut config.mapper_workers);
        }
        if let Some(budget) = lookup("GATEWAY_ELEMENT_BUDGET") {
            parse_or_warn("GATEWAY_ELEMENT_BUDGET", budget, &mut config.element_budget);
        }

        if let Some(prefix) = lookup("GATEWAY_PARTITION_PREFIX") {
            config.partition_prefix = prefix;
        }
        if let Some(shared) = lookup("GATEWAY_SHARED_LABEL") {
            config.shared_label = shared;
        }
        if let Some(pattern) = lookup("GATEWAY_TENANT_PATTERN") {
            config.tenant_pattern = pattern;
        }
        if let Some(policy) = lookup("GATEWAY_UNSCOPED_POLICY") {
            parse_or_warn("GATEWAY_UNSCOPED_POLICY", policy, &mut config.unscoped_query_policy);
        }
        if let Some(policy) = lookup("GATEWAY_MISSING_PARTITION_POLICY") {
            parse_or_warn(
                "GATEWAY_MISSING_PARTITION_POLICY",
                policy,
                &mut config.missing_partition_policy,
            );
        }
        if let Some(path) = lookup("GATEWAY_STYLES_FILE") {
            config.styles_file = Some(path);
        }

        if let Some(host) = lookup("SERVER_HOST") {
            config.bind_address = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            parse_or_warn("SERVER_PORT", port, &mut config.port);
        }

        config.validate()?;
        info!(
            uri = %config.neo4j.uri,
            max_attempts = config.max_attempts,
            element_budget = config.element_budget,
            "Gateway configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.mapper_workers == 0 {
            return Err(ConfigError::Invalid("mapper_workers must be at least 1".into()));
        }
        self.partition_scheme().map(|_| ())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn partition_scheme(&self) -> Result<PartitionScheme, ConfigError> {
        PartitionScheme::new(
            self.partition_prefix.clone(),
            self.shared_label.clone(),
            &self.tenant_pattern,
        )
    }

    pub fn load_styles(&self) -> Result<StyleConfig, ConfigError> {
        match &self.styles_file {
            Some(path) => StyleConfig::from_file(path),
            None => Ok(StyleConfig::builtin()),
        }
    }
}
