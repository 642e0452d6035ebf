// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for gateway infrastructure operations
//!
//! Policy outcomes (forbidden queries, refused rewrites, authentication
//! failures) have their own error types next to the code that produces them.
//! This module covers the collaborators: configuration, the permission store,
//! the graph backend and the audit pipeline.

use thiserror::Error;

/// Errors that can occur in gateway infrastructure operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Relational store error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Graph backend error, message kept verbatim from the driver
    #[error("{0}")]
    Graph(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored permission document could not be interpreted
    #[error("Invalid permission document: {0}")]
    InvalidPermissions(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Audit pipeline error
    #[error("Audit error: {0}")]
    Audit(String),
}

/// Result type for gateway infrastructure operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(feature = "neo4j")]
impl From<neo4rs::Error> for GatewayError {
    fn from(err: neo4rs::Error) -> Self {
        GatewayError::Graph(err.to_string())
    }
}
