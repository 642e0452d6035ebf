// Copyright (c) 2025 - Cowboy AI, Inc.
//! Audit pipeline
//!
//! Every admission verdict produces one [`AuditRecord`]. Records are handed
//! to a bounded queue and written by a single background worker, so a slow
//! or failing audit store never delays a response:
//!
//! - [`AuditHandle::submit`] never waits; a full or closed queue drops the
//!   record with a warning
//! - the worker retries each write a bounded number of times with linear
//!   back-off, then logs and moves on
//! - [`AuditQueue::shutdown`] stops intake and waits for the backlog to
//!   drain, up to a deadline

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{GatewayError, GatewayResult};

/// Verdict recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Allowed,
    Blocked,
    Rewritten,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "Allowed",
            Decision::Blocked => "Blocked",
            Decision::Rewritten => "Rewritten",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: i32,
    /// Query as submitted by the caller
    pub query: String,
    pub decision: Decision,
    /// Query actually executed; empty unless `decision` is `Rewritten`
    pub rewritten_query: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn allowed(user_id: i32, query: impl Into<String>) -> Self {
        Self::new(user_id, query, Decision::Allowed, String::new())
    }

    pub fn blocked(user_id: i32, query: impl Into<String>) -> Self {
        Self::new(user_id, query, Decision::Blocked, String::new())
    }

    pub fn rewritten(user_id: i32, query: impl Into<String>, rewritten: impl Into<String>) -> Self {
        Self::new(user_id, query, Decision::Rewritten, rewritten.into())
    }

    fn new(user_id: i32, query: impl Into<String>, decision: Decision, rewritten_query: String) -> Self {
        Self {
            user_id,
            query: query.into(),
            decision,
            rewritten_query,
            created_at: Utc::now(),
        }
    }
}

/// Durable destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> GatewayResult<()>;
}

/// Queue sizing and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditSettings {
    pub capacity: usize,
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly per attempt
    pub backoff: Duration,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Cheap, cloneable submission side of the audit queue
#[derive(Debug, Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditHandle {
    /// Enqueue a record without waiting. Returns `false` when the record
    /// was dropped.
    pub fn submit(&self, record: AuditRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(
                    user_id = record.user_id,
                    decision = %record.decision,
                    "Audit queue full, dropping record"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                warn!(
                    user_id = record.user_id,
                    decision = %record.decision,
                    "Audit queue closed, dropping record"
                );
                false
            }
        }
    }
}

/// Owner of the audit worker task
pub struct AuditQueue {
    handle: AuditHandle,
    stop: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

impl AuditQueue {
    /// Create the queue and start its worker on the current runtime
    pub fn spawn(sink: Arc<dyn AuditSink>, settings: AuditSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.capacity.max(1));
        let (stop, stop_rx) = oneshot::channel();
        let worker = tokio::spawn(run_worker(sink, settings, rx, stop_rx));

        Self {
            handle: AuditHandle { tx },
            stop,
            worker,
        }
    }

    pub fn handle(&self) -> AuditHandle {
        self.handle.clone()
    }

    /// Stop accepting records and wait for the worker to write the backlog.
    /// A worker still busy at the deadline is aborted.
    pub async fn shutdown(self, drain_timeout: Duration) -> GatewayResult<()> {
        let AuditQueue {
            handle,
            stop,
            mut worker,
        } = self;
        drop(handle);
        let _ = stop.send(());

        match tokio::time::timeout(drain_timeout, &mut worker).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_error)) => Err(GatewayError::Audit(format!(
                "audit worker failed: {}",
                join_error
            ))),
            Err(_) => {
                worker.abort();
                Err(GatewayError::Timeout(format!(
                    "audit queue did not drain within {:?}",
                    drain_timeout
                )))
            }
        }
    }
}

async fn run_worker(
    sink: Arc<dyn AuditSink>,
    settings: AuditSettings,
    mut rx: mpsc::Receiver<AuditRecord>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    info!("Starting audit writer");
    let mut listening = true;

    loop {
        tokio::select! {
            signal = &mut stop_rx, if listening => {
                listening = false;
                if signal.is_ok() {
                    debug!("Audit queue closed, draining backlog");
                    rx.close();
                }
            }
            record = rx.recv() => match record {
                Some(record) => write_with_retry(sink.as_ref(), &record, &settings).await,
                None => break,
            },
        }
    }

    info!("Audit writer stopped");
}

async fn write_with_retry(sink: &dyn AuditSink, record: &AuditRecord, settings: &AuditSettings) {
    let attempts = settings.max_attempts.max(1);
    for attempt in 1..=attempts {
        match sink.record(record).await {
            Ok(()) => {
                debug!(user_id = record.user_id, decision = %record.decision, "Audit record written");
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "Audit write failed, retrying");
                tokio::time::sleep(settings.backoff * attempt).await;
            }
            Err(e) => {
                error!(
                    user_id = record.user_id,
                    decision = %record.decision,
                    error = %e,
                    "Audit write failed after {} attempts, record lost",
                    attempts
                );
            }
        }
    }
}
