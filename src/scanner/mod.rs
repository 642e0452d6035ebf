// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query scanners
//!
//! A scanner turns Cypher text into a [`QueryFingerprint`]. Two strategies
//! sit behind the same [`QueryScanner`] contract:
//!
//! - [`RegexScanner`]: pattern matching over lexically normalised text. It
//!   never fails and is cheap, but it does not understand the grammar.
//! - [`ParseTreeScanner`]: a full parse followed by a tree walk. It refuses
//!   input it cannot parse.
//!
//! Scanners hold no mutable state and are shared across requests.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cypher::ParseError;
use crate::errors::GatewayError;
use crate::fingerprint::QueryFingerprint;

pub mod lexical;
pub mod tree;

pub use lexical::RegexScanner;
pub use tree::ParseTreeScanner;

/// The scanner could not produce a fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("unparsable query: {0}")]
    Parse(#[from] ParseError),
}

/// Extracts a fingerprint from one query
pub trait QueryScanner: Send + Sync {
    fn scan(&self, cypher: &str) -> Result<QueryFingerprint, ScanError>;

    fn kind(&self) -> ScannerKind;
}

/// Scanner selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    Regex,
    #[default]
    Parser,
}

impl ScannerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerKind::Regex => "regex",
            ScannerKind::Parser => "parser",
        }
    }

    /// Construct the scanner this kind names
    pub fn build(self) -> Arc<dyn QueryScanner> {
        match self {
            ScannerKind::Regex => Arc::new(RegexScanner::new()),
            ScannerKind::Parser => Arc::new(ParseTreeScanner::new()),
        }
    }
}

impl fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScannerKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regex" => Ok(ScannerKind::Regex),
            "parser" => Ok(ScannerKind::Parser),
            other => Err(GatewayError::Configuration(format!(
                "unknown scanner '{}', expected 'regex' or 'parser'",
                other
            ))),
        }
    }
}
