// Copyright (c) 2025 - Cowboy AI, Inc.
//! Confidentiality gateway for Cypher graph queries
//!
//! Every query submitted through the gateway is scanned into a structural
//! fingerprint, checked against the caller's permission model, and then
//! executed as written, executed in a rewritten form that drops disallowed
//! properties from its projection, or refused. Each verdict is written to an
//! audit log.

pub mod admission;
pub mod audit;
pub mod auth;
pub mod config;
pub mod cypher;
pub mod errors;
pub mod fingerprint;
pub mod graph;
pub mod http;
pub mod permissions;
pub mod policy;
pub mod rewriter;
pub mod scanner;
pub mod store;

// Re-export commonly used types
pub use admission::{Admission, AdmissionEngine, AdmissionError};
pub use audit::{AuditHandle, AuditQueue, AuditRecord, AuditSettings, AuditSink, Decision};
pub use auth::{AuthError, Authenticator, Credentials};
pub use config::{GatewayConfig, Neo4jConfig, PostgresConfig};
pub use errors::{GatewayError, GatewayResult};
pub use fingerprint::{Name, QueryFingerprint};
pub use graph::{GraphBackend, Row};
pub use permissions::{Operation, OperationPermissions, Permissions};
pub use policy::{check, Analysis, Violation};
pub use rewriter::{rewrite, Rewrite, RewriteRefusal};
pub use scanner::{ParseTreeScanner, QueryScanner, RegexScanner, ScanError, ScannerKind};
pub use store::{PermissionStore, PgStore, User};

#[cfg(feature = "neo4j")]
pub use graph::Neo4jBackend;
