// Copyright (c) 2025 - Cowboy AI, Inc.
//! HTTP surface
//!
//! - `GET /health` answers `Ok`
//! - `POST /query` takes `{"cypher": "..."}` with `User-Email` and
//!   `Authorization: Bearer <token>` headers and answers
//!   `{"data": [...], "rewritten": bool, "rewriteReason"?: "..."}`
//!
//! Errors are plain text. A request is handled in a fixed order: method,
//! authentication, body, empty query, permission lookup, admission.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::admission::{AdmissionEngine, AdmissionError};
use crate::auth::{AuthError, Authenticator};
use crate::graph::Row;
use crate::policy::join_violations;
use crate::store::PermissionStore;

/// Shared request state
#[derive(Clone)]
pub struct AppState {
    engine: AdmissionEngine,
    store: Arc<dyn PermissionStore>,
    auth: Authenticator,
}

impl AppState {
    pub fn new(engine: AdmissionEngine, store: Arc<dyn PermissionStore>) -> Self {
        let auth = Authenticator::new(store.clone());
        Self {
            engine,
            store,
            auth,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub cypher: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub data: Vec<Row>,
    pub rewritten: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite_reason: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
pub async fn health_handler() -> &'static str {
    "Ok"
}

/// POST /query
pub async fn query_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user = match state.auth.authenticate_headers(&headers).await {
        Ok(user) => user,
        Err(e) => return auth_failure(e),
    };

    let request = match serde_json::from_slice::<QueryRequest>(&body) {
        Ok(r) => r,
        Err(e) => return text(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if request.cypher.is_empty() {
        return text(StatusCode::BAD_REQUEST, "The 'cypher' field is required");
    }

    let permissions = match state.store.effective_permissions(&user).await {
        Ok(p) => p,
        Err(e) => {
            error!(user_id = user.id, error = %e, "Permission lookup failed");
            return text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    match state.engine.admit(user.id, &request.cypher, &permissions).await {
        Ok(admission) => {
            let response = QueryResponse {
                rewrite_reason: admission.rewrite_reason(),
                rewritten: admission.rewritten,
                data: admission.rows,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(AdmissionError::Forbidden { violations, .. }) => {
            text(StatusCode::FORBIDDEN, join_violations(&violations))
        }
        Err(e) => text(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn auth_failure(e: AuthError) -> Response {
    if e.is_unauthorized() {
        debug!(reason = %e, "Authentication failed");
        text(StatusCode::UNAUTHORIZED, e.to_string())
    } else {
        error!(error = %e, "Authentication could not complete");
        text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

fn text(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}
