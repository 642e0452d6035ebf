// Copyright (c) 2025 - Cowboy AI, Inc.
//! Graph backend
//!
//! The admission engine hands admitted queries to a [`GraphBackend`] and
//! returns whatever rows come back. Rows are JSON objects keyed by the
//! column names of the query.

use async_trait::async_trait;

use crate::errors::GatewayResult;

/// One result row, column name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Executes admitted Cypher
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn run(&self, cypher: &str) -> GatewayResult<Vec<Row>>;
}

#[cfg(feature = "neo4j")]
pub use self::neo4j::Neo4jBackend;

#[cfg(feature = "neo4j")]
mod neo4j {
    use async_trait::async_trait;
    use neo4rs::{query, ConfigBuilder, Graph};
    use tracing::{debug, info};

    use super::{GraphBackend, Row};
    use crate::config::Neo4jConfig;
    use crate::errors::{GatewayError, GatewayResult};

    /// Neo4j over Bolt
    #[derive(Clone)]
    pub struct Neo4jBackend {
        graph: Graph,
    }

    impl Neo4jBackend {
        /// Connect with basic auth to the configured database
        pub async fn connect(config: &Neo4jConfig) -> GatewayResult<Self> {
            info!("Connecting to Neo4j at {}", config.uri);

            let bolt = ConfigBuilder::default()
                .uri(config.uri.as_str())
                .user(config.user.as_str())
                .password(config.password.as_str())
                .db(config.database())
                .build()?;
            let graph = Graph::connect(bolt).await?;

            info!("Connected to Neo4j database '{}'", config.database());
            Ok(Self { graph })
        }
    }

    #[async_trait]
    impl GraphBackend for Neo4jBackend {
        async fn run(&self, cypher: &str) -> GatewayResult<Vec<Row>> {
            let mut result = self.graph.execute(query(cypher)).await?;
            let mut rows = Vec::new();

            while let Some(row) = result.next().await? {
                let row = row
                    .to::<Row>()
                    .map_err(|e| GatewayError::Graph(e.to_string()))?;
                rows.push(row);
            }

            debug!("Query returned {} rows", rows.len());
            Ok(rows)
        }
    }
}
