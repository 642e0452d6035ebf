// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cypher-guard
//!
//! In-memory collaborators for the admission engine and the HTTP surface:
//!
//! - [`MockGraph`] records every dispatched query and answers with one row
//! - [`MemoryStore`] holds users and organizations and doubles as the audit sink
//! - [`Harness`] wires both into an engine with a live audit queue
//!
//! Timestamps are fixed so records compare deterministically.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cypher_guard::store::Organization;
use cypher_guard::{
    AdmissionEngine, AuditQueue, AuditRecord, AuditSettings, AuditSink, GatewayError,
    GatewayResult, GraphBackend, OperationPermissions, PermissionStore, Permissions, Row,
    ScannerKind, User,
};

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub const ADA_EMAIL: &str = "ada@example.com";
pub const ADA_TOKEN: &str = "ada-token";
pub const ADA_ID: i32 = 1;

pub const EVE_EMAIL: &str = "eve@example.com";
pub const EVE_TOKEN: &str = "eve-token";
pub const EVE_ID: i32 = 2;

pub const ORG_ID: i32 = 10;

pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

// ============================================================================
// Permission models
// ============================================================================

/// Person reader: labels `{person}`, properties `{person: [name]}`,
/// relationships `{knows}`, read-only on person
pub fn person_reader() -> Permissions {
    Permissions::builder()
        .label("Person")
        .relationship("KNOWS")
        .properties("Person", ["name"])
        .operations("Person", OperationPermissions::READ_ONLY)
        .build()
}

/// Same document as [`person_reader`], as stored in Postgres
pub const PERSON_READER_JSON: &str = r#"{
    "allowed_labels": ["Person"],
    "allowed_relationships": ["KNOWS"],
    "allowed_properties": {"Person": ["name"]},
    "operation_permissions": {
        "Person": {"read": true, "create": false, "update": false, "delete": false}
    }
}"#;

// ============================================================================
// Graph backend
// ============================================================================

/// Records dispatched queries and returns a single fixed row
#[derive(Default)]
pub struct MockGraph {
    queries: Mutex<Vec<String>>,
    failure: Option<String>,
}

impl MockGraph {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn row() -> Row {
        match json!({"p.name": "Ada"}) {
            serde_json::Value::Object(row) => row,
            _ => unreachable!(),
        }
    }
}

#[async_trait]
impl GraphBackend for MockGraph {
    async fn run(&self, cypher: &str) -> GatewayResult<Vec<Row>> {
        self.queries.lock().unwrap().push(cypher.to_string());
        match &self.failure {
            Some(message) => Err(GatewayError::Graph(message.clone())),
            None => Ok(vec![Self::row()]),
        }
    }
}

// ============================================================================
// Permission store and audit sink
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    users: HashMap<String, User>,
    organizations: HashMap<i32, Organization>,
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryStore {
    /// Organization 10 with the person-reader default, Ada without an
    /// override and Eve with a corrupt override
    pub fn seeded() -> Self {
        let mut store = Self::default();
        store.add_organization(ORG_ID, PERSON_READER_JSON);
        store.add_user(ADA_ID, ADA_EMAIL, ADA_TOKEN, None);
        store.add_user(EVE_ID, EVE_EMAIL, EVE_TOKEN, Some("{not json"));
        store
    }

    pub fn add_organization(&mut self, id: i32, default_permissions: &str) {
        self.organizations.insert(
            id,
            Organization {
                id,
                name: format!("org-{}", id),
                default_permissions: default_permissions.to_string(),
                created_at: fixed_timestamp(),
                updated_at: fixed_timestamp(),
            },
        );
    }

    pub fn add_user(&mut self, id: i32, email: &str, token: &str, override_permissions: Option<&str>) {
        self.users.insert(
            email.to_string(),
            User {
                id,
                org_id: ORG_ID,
                name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
                hashed_bearer_token: bcrypt::hash(token, 4).expect("bcrypt hash"),
                override_permissions: override_permissions.map(str::to_string),
                created_at: fixed_timestamp(),
                updated_at: fixed_timestamp(),
            },
        );
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn user_by_email(&self, email: &str) -> GatewayResult<Option<User>> {
        Ok(self.users.get(email).cloned())
    }

    async fn organization(&self, id: i32) -> GatewayResult<Option<Organization>> {
        Ok(self.organizations.get(&id).cloned())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, record: &AuditRecord) -> GatewayResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Engine wired to in-memory collaborators
pub struct Harness {
    pub engine: AdmissionEngine,
    pub graph: Arc<MockGraph>,
    pub store: Arc<MemoryStore>,
    queue: AuditQueue,
}

impl Harness {
    pub fn new(kind: ScannerKind) -> Self {
        Self::with_graph(kind, MockGraph::default())
    }

    pub fn with_graph(kind: ScannerKind, graph: MockGraph) -> Self {
        let graph = Arc::new(graph);
        let store = Arc::new(MemoryStore::seeded());
        let queue = AuditQueue::spawn(
            store.clone(),
            AuditSettings {
                backoff: Duration::from_millis(1),
                ..AuditSettings::default()
            },
        );
        let engine = AdmissionEngine::new(kind.build(), graph.clone(), queue.handle());

        Self {
            engine,
            graph,
            store,
            queue,
        }
    }

    /// Drain the audit queue and return everything that was written
    pub async fn finish(self) -> Vec<AuditRecord> {
        let Harness {
            engine,
            store,
            queue,
            ..
        } = self;
        drop(engine);
        queue
            .shutdown(Duration::from_secs(5))
            .await
            .expect("audit queue drains");
        store.records()
    }
}
