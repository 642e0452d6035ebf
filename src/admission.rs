// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query admission
//!
//! The [`AdmissionEngine`] decides, for one user and one query, whether the
//! query runs as written, runs in a rewritten form, or is refused:
//!
//! ```text
//! scan ──► check ──allowed──► execute ──► audit Allowed
//!            │
//!            └─denied──► rewrite ──► re-check ──► execute ──► audit Rewritten
//!                           │            │
//!                           └────────────┴──refused──► audit Blocked
//! ```
//!
//! Audit records are submitted only after the verdict is final and, for
//! admitted queries, after the backend has answered. Backend failures and
//! timeouts are not audited.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::audit::{AuditHandle, AuditRecord, Decision};
use crate::errors::GatewayError;
use crate::graph::{GraphBackend, Row};
use crate::permissions::Permissions;
use crate::policy::{self, join_violations, Analysis, Violation};
use crate::rewriter::{self, RewriteRefusal};
use crate::scanner::{QueryScanner, ScanError};

/// Why a query was not answered
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Not allowed and could not be rewritten into something allowed
    #[error("query forbidden: {}", join_violations(.violations))]
    Forbidden {
        violations: Vec<Violation>,
        refusal: RewriteRefusal,
        /// The rewrite that failed its re-check, if one was produced
        attempted_rewrite: Option<String>,
    },

    #[error(transparent)]
    Malformed(#[from] ScanError),

    /// Graph execution failed; the driver message is kept verbatim
    #[error(transparent)]
    Backend(GatewayError),

    #[error("query execution timed out after {0:?}")]
    Timeout(Duration),
}

/// An answered query
#[derive(Debug, Clone)]
pub struct Admission {
    pub rows: Vec<Row>,
    pub rewritten: bool,
    /// Query actually executed when `rewritten`, empty otherwise
    pub rewritten_query: String,
    /// Violations of the submitted query, empty unless `rewritten`
    pub violations: Vec<Violation>,
}

impl Admission {
    /// Comma-joined violations, present only for rewritten queries
    pub fn rewrite_reason(&self) -> Option<String> {
        self.rewritten.then(|| join_violations(&self.violations))
    }

    pub fn decision(&self) -> Decision {
        if self.rewritten {
            Decision::Rewritten
        } else {
            Decision::Allowed
        }
    }
}

/// Scan, check, rewrite, execute and audit
#[derive(Clone)]
pub struct AdmissionEngine {
    scanner: Arc<dyn QueryScanner>,
    backend: Arc<dyn GraphBackend>,
    audit: AuditHandle,
    timeout: Option<Duration>,
}

impl AdmissionEngine {
    pub fn new(
        scanner: Arc<dyn QueryScanner>,
        backend: Arc<dyn GraphBackend>,
        audit: AuditHandle,
    ) -> Self {
        Self {
            scanner,
            backend,
            audit,
            timeout: None,
        }
    }

    /// Bound graph execution time
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Admit one query on behalf of `user_id`
    pub async fn admit(
        &self,
        user_id: i32,
        cypher: &str,
        permissions: &Permissions,
    ) -> Result<Admission, AdmissionError> {
        let span = tracing::info_span!(
            "admission",
            request_id = %Uuid::now_v7(),
            user_id,
            scanner = %self.scanner.kind(),
            decision = tracing::field::Empty,
        );

        async move {
            let result = self.decide(user_id, cypher, permissions).await;
            match &result {
                Ok(admission) => {
                    tracing::Span::current().record("decision", admission.decision().as_str());
                }
                Err(AdmissionError::Forbidden { .. } | AdmissionError::Malformed(_)) => {
                    tracing::Span::current().record("decision", Decision::Blocked.as_str());
                }
                Err(_) => {}
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn decide(
        &self,
        user_id: i32,
        cypher: &str,
        permissions: &Permissions,
    ) -> Result<Admission, AdmissionError> {
        let fingerprint = match self.scanner.scan(cypher) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!(error = %e, "Query could not be scanned");
                self.audit.submit(AuditRecord::blocked(user_id, cypher));
                return Err(e.into());
            }
        };
        debug!(
            labels = ?fingerprint.labels,
            relationships = ?fingerprint.relationships,
            properties = ?fingerprint.properties,
            operation = %fingerprint.operation,
            "Query scanned"
        );

        let analysis = policy::check(&fingerprint, permissions);
        if analysis.allowed {
            let rows = self.execute(cypher).await?;
            info!(rows = rows.len(), "Query allowed");
            self.audit.submit(AuditRecord::allowed(user_id, cypher));
            return Ok(Admission {
                rows,
                rewritten: false,
                rewritten_query: String::new(),
                violations: analysis.violations,
            });
        }
        debug!(violations = %analysis.reason(), "Policy check failed");

        let rewrite = match rewriter::rewrite(cypher, &analysis) {
            Ok(rewrite) => rewrite,
            Err(refusal) => return Err(self.forbid(user_id, cypher, analysis, refusal, None)),
        };
        if let Err(refusal) = self.recheck(&rewrite.query, permissions) {
            return Err(self.forbid(user_id, cypher, analysis, refusal, Some(rewrite.query)));
        }

        let rows = self.execute(&rewrite.query).await?;
        info!(
            rows = rows.len(),
            removed = ?rewrite.removed_fields,
            "Query rewritten"
        );
        self.audit
            .submit(AuditRecord::rewritten(user_id, cypher, rewrite.query.as_str()));

        Ok(Admission {
            rows,
            rewritten: true,
            rewritten_query: rewrite.query,
            violations: analysis.violations,
        })
    }

    /// Scan and check a rewritten query again
    fn recheck(&self, rewritten: &str, permissions: &Permissions) -> Result<(), RewriteRefusal> {
        let fingerprint = self
            .scanner
            .scan(rewritten)
            .map_err(|e| RewriteRefusal::RecheckFailed(e.to_string()))?;
        let analysis = policy::check(&fingerprint, permissions);
        if analysis.allowed {
            Ok(())
        } else {
            Err(RewriteRefusal::RecheckFailed(analysis.reason()))
        }
    }

    fn forbid(
        &self,
        user_id: i32,
        cypher: &str,
        analysis: Analysis,
        refusal: RewriteRefusal,
        attempted_rewrite: Option<String>,
    ) -> AdmissionError {
        warn!(
            violations = %analysis.reason(),
            refusal = %refusal,
            "Query blocked"
        );
        self.audit.submit(AuditRecord::blocked(user_id, cypher));
        AdmissionError::Forbidden {
            violations: analysis.violations,
            refusal,
            attempted_rewrite,
        }
    }

    async fn execute(&self, cypher: &str) -> Result<Vec<Row>, AdmissionError> {
        let run = self.backend.run(cypher);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| {
                    warn!(timeout = ?limit, "Graph execution timed out");
                    AdmissionError::Timeout(limit)
                })?,
            None => run.await,
        };

        result.map_err(|e| {
            error!(error = %e, "Graph execution failed");
            AdmissionError::Backend(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditQueue, AuditSettings, AuditSink};
    use crate::errors::GatewayResult;
    use crate::permissions::OperationPermissions;
    use crate::scanner::ScannerKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        queries: Mutex<Vec<String>>,
        records: Mutex<Vec<AuditRecord>>,
        fail_with: Option<String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl GraphBackend for Recorder {
        async fn run(&self, cypher: &str) -> GatewayResult<Vec<Row>> {
            self.queries.lock().unwrap().push(cypher.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.fail_with {
                Some(message) => Err(GatewayError::Graph(message.clone())),
                None => Ok(vec![Row::new()]),
            }
        }
    }

    #[async_trait]
    impl AuditSink for Recorder {
        async fn record(&self, record: &AuditRecord) -> GatewayResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn person_reader() -> Permissions {
        Permissions::builder()
            .label("Person")
            .properties("Person", ["name"])
            .operations("Person", OperationPermissions::READ_ONLY)
            .build()
    }

    async fn run(
        recorder: Arc<Recorder>,
        timeout: Option<Duration>,
        cypher: &str,
    ) -> Result<Admission, AdmissionError> {
        let queue = AuditQueue::spawn(recorder.clone(), AuditSettings::default());
        let engine = AdmissionEngine::new(ScannerKind::Parser.build(), recorder, queue.handle())
            .with_timeout(timeout);
        let result = engine.admit(42, cypher, &person_reader()).await;
        drop(engine);
        queue.shutdown(Duration::from_secs(5)).await.unwrap();
        result
    }

    #[tokio::test]
    async fn test_allowed_query_is_dispatched_and_audited() {
        let recorder = Arc::new(Recorder::default());
        let admission = run(recorder.clone(), None, "MATCH (p:Person) RETURN p.name")
            .await
            .unwrap();

        assert!(!admission.rewritten);
        assert_eq!(admission.rewrite_reason(), None);
        assert_eq!(admission.rows.len(), 1);
        assert_eq!(
            *recorder.queries.lock().unwrap(),
            vec!["MATCH (p:Person) RETURN p.name"]
        );
        let records = recorder.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Allowed);
        assert_eq!(records[0].user_id, 42);
    }

    #[tokio::test]
    async fn test_malformed_query_is_blocked() {
        let recorder = Arc::new(Recorder::default());
        let err = run(recorder.clone(), None, "MATCH (p:Person RETURN p")
            .await
            .unwrap_err();

        assert!(matches!(err, AdmissionError::Malformed(_)));
        assert!(recorder.queries.lock().unwrap().is_empty());
        assert_eq!(recorder.records.lock().unwrap()[0].decision, Decision::Blocked);
    }

    #[tokio::test]
    async fn test_backend_error_is_verbatim_and_not_audited() {
        let recorder = Arc::new(Recorder {
            fail_with: Some("Neo.ClientError.Statement.SyntaxError".to_string()),
            ..Default::default()
        });
        let err = run(recorder.clone(), None, "MATCH (p:Person) RETURN p.name")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Neo.ClientError.Statement.SyntaxError");
        assert!(recorder.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_not_audited() {
        let recorder = Arc::new(Recorder {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let err = run(
            recorder.clone(),
            Some(Duration::from_millis(10)),
            "MATCH (p:Person) RETURN p.name",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AdmissionError::Timeout(_)));
        assert!(recorder.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_error_display() {
        let recorder = Arc::new(Recorder::default());
        let err = run(recorder, None, "MATCH (c:Company) RETURN c.name")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "query forbidden: disallowed label 'Company'"
        );
    }
}
