// Copyright (c) 2025 - Cowboy AI, Inc.
//! Permission store
//!
//! Users, their organizations and the audit log live in Postgres. A user's
//! effective permission document is their own override when one is set and
//! non-empty, otherwise their organization's default.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::audit::{AuditRecord, AuditSink};
use crate::config::PostgresConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::permissions::Permissions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Organization {
    pub id: i32,
    pub name: String,
    /// JSON permission document
    pub default_permissions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub org_id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_bearer_token: String,
    /// JSON permission document replacing the organization default
    pub override_permissions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The override document, if one is set and non-empty
    pub fn permission_override(&self) -> Option<&str> {
        self.override_permissions
            .as_deref()
            .filter(|doc| !doc.trim().is_empty())
    }
}

/// Row of the `logs` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LogEntry {
    pub id: i32,
    pub user_id: i32,
    pub query: String,
    pub decision: String,
    pub rewritten_query: String,
    pub created_at: DateTime<Utc>,
}

/// Read access to users, organizations and permission documents
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn user_by_email(&self, email: &str) -> GatewayResult<Option<User>>;

    async fn organization(&self, id: i32) -> GatewayResult<Option<Organization>>;

    /// Resolve and normalise the permission document that applies to `user`
    async fn effective_permissions(&self, user: &User) -> GatewayResult<Permissions> {
        if let Some(document) = user.permission_override() {
            debug!(user_id = user.id, "Using user permission override");
            return Permissions::from_json(document);
        }

        let org = self.organization(user.org_id).await?.ok_or_else(|| {
            GatewayError::InvalidPermissions(format!(
                "organization {} of user {} not found",
                user.org_id, user.id
            ))
        })?;
        Permissions::from_json(&org.default_permissions)
    }
}

/// Postgres-backed store and audit sink
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &PostgresConfig) -> GatewayResult<Self> {
        info!(
            "Connecting to Postgres at {}:{}/{}",
            config.host, config.port, config.database
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await?;
        info!("Connected to Postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> GatewayResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }

    /// Most recent audit entries for one user, newest first
    pub async fn recent_logs(&self, user_id: i32, limit: i64) -> GatewayResult<Vec<LogEntry>> {
        let entries = sqlx::query_as::<_, LogEntry>(
            "SELECT id, user_id, query, decision, rewritten_query, created_at \
             FROM logs WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn user_by_email(&self, email: &str) -> GatewayResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, org_id, name, email, hashed_bearer_token, \
             override_permissions::text AS override_permissions, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn organization(&self, id: i32) -> GatewayResult<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(
            "SELECT id, name, default_permissions::text AS default_permissions, \
             created_at, updated_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(org)
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn record(&self, record: &AuditRecord) -> GatewayResult<()> {
        sqlx::query(
            "INSERT INTO logs (user_id, query, decision, rewritten_query, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.user_id)
        .bind(&record.query)
        .bind(record.decision.as_str())
        .bind(&record.rewritten_query)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
