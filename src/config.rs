// Copyright (c) 2025 - Cowboy AI, Inc.
//! Gateway configuration
//!
//! Everything is read from environment variables. [`GatewayConfig::from_lookup`]
//! takes any lookup function so tests can supply a map instead of touching
//! the process environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `POSTGRES_USER`, `POSTGRES_DB` | required |
//! | `POSTGRES_PASSWORD` | empty |
//! | `POSTGRES_HOST` / `POSTGRES_PORT` | `localhost` / `5432` |
//! | `POSTGRES_MAX_CONNECTIONS` | `10` |
//! | `NEO4J_USER`, `NEO4J_PASSWORD` | required |
//! | `NEO4J_HOST` / `NEO4J_PORT` | `localhost` / `7687` |
//! | `NEO4J_DATABASE` | `neo4j` |
//! | `GATEWAY_BIND` | `0.0.0.0:9090` |
//! | `GATEWAY_SCANNER` | `parser` |
//! | `GATEWAY_QUERY_TIMEOUT_SECS` | unset |
//! | `AUDIT_QUEUE_CAPACITY` | `1024` |
//! | `AUDIT_MAX_ATTEMPTS` | `3` |
//! | `AUDIT_DRAIN_TIMEOUT_SECS` | `10` |

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::audit::AuditSettings;
use crate::errors::{GatewayError, GatewayResult};
use crate::scanner::ScannerKind;

/// Neo4j connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    /// Bolt URI (e.g., "bolt://localhost:7687")
    pub uri: String,

    pub user: String,

    pub password: String,

    /// Database name (defaults to "neo4j")
    pub database: Option<String>,
}

impl Neo4jConfig {
    pub fn new(uri: String, user: String, password: String) -> Self {
        Self {
            uri,
            user,
            password,
            database: None,
        }
    }

    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    /// Get the database name (defaults to "neo4j" if not set)
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or("neo4j")
    }
}

/// Permission store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub postgres: PostgresConfig,
    pub neo4j: Neo4jConfig,
    pub bind: SocketAddr,
    pub scanner: ScannerKind,
    pub query_timeout: Option<Duration>,
    pub audit: AuditSettings,
    pub audit_drain_timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let postgres = PostgresConfig {
            host: env.or("POSTGRES_HOST", "localhost"),
            port: env.parse_or("POSTGRES_PORT", 5432)?,
            user: env.required("POSTGRES_USER")?,
            password: env.or("POSTGRES_PASSWORD", ""),
            database: env.required("POSTGRES_DB")?,
            max_connections: env.parse_or("POSTGRES_MAX_CONNECTIONS", 10)?,
        };

        let neo4j_host = env.or("NEO4J_HOST", "localhost");
        let neo4j_port: u16 = env.parse_or("NEO4J_PORT", 7687)?;
        let neo4j = Neo4jConfig::new(
            format!("bolt://{}:{}", neo4j_host, neo4j_port),
            env.required("NEO4J_USER")?,
            env.required("NEO4J_PASSWORD")?,
        )
        .with_database(env.or("NEO4J_DATABASE", "neo4j"));

        let defaults = AuditSettings::default();
        let audit = AuditSettings {
            capacity: env.parse_or("AUDIT_QUEUE_CAPACITY", defaults.capacity)?,
            max_attempts: env.parse_or("AUDIT_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff: defaults.backoff,
        };

        Ok(Self {
            postgres,
            neo4j,
            bind: env.parse_or("GATEWAY_BIND", SocketAddr::from(([0, 0, 0, 0], 9090)))?,
            scanner: env.parse_or("GATEWAY_SCANNER", ScannerKind::Parser)?,
            query_timeout: env
                .parse::<u64>("GATEWAY_QUERY_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            audit,
            audit_drain_timeout: Duration::from_secs(env.parse_or("AUDIT_DRAIN_TIMEOUT_SECS", 10)?),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> GatewayResult<String> {
        self.get(key)
            .ok_or_else(|| GatewayError::Configuration(format!("{} not set", key)))
    }

    fn parse<T>(&self, key: &str) -> GatewayResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    GatewayError::Configuration(format!("invalid {} '{}': {}", key, raw, e))
                })
            })
            .transpose()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> GatewayResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("POSTGRES_USER", "gateway"),
        ("POSTGRES_DB", "permissions"),
        ("NEO4J_USER", "neo4j"),
        ("NEO4J_PASSWORD", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.postgres.host, "localhost");
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.postgres.max_connections, 10);
        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(config.neo4j.database(), "neo4j");
        assert_eq!(config.bind, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(config.scanner, ScannerKind::Parser);
        assert_eq!(config.query_timeout, None);
        assert_eq!(config.audit.capacity, 1024);
        assert_eq!(config.audit.max_attempts, 3);
        assert_eq!(config.audit_drain_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("NEO4J_HOST", "graph.internal"),
            ("NEO4J_PORT", "7688"),
            ("NEO4J_DATABASE", "people"),
            ("GATEWAY_SCANNER", "regex"),
            ("GATEWAY_QUERY_TIMEOUT_SECS", "30"),
            ("GATEWAY_BIND", "127.0.0.1:8080"),
        ]);
        let config = GatewayConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.neo4j.uri, "bolt://graph.internal:7688");
        assert_eq!(config.neo4j.database(), "people");
        assert_eq!(config.scanner, ScannerKind::Regex);
        assert_eq!(config.query_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.bind.port(), 8080);
    }

    #[test]
    fn test_missing_required_variable() {
        let err = GatewayConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(err.to_string().contains("POSTGRES_USER"));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("POSTGRES_PORT", "not-a-port"));
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&pairs)),
            Err(GatewayError::Configuration(_))
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("GATEWAY_SCANNER", "antlr"));
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&pairs)),
            Err(GatewayError::Configuration(_))
        ));
    }
}
