// Copyright (c) 2025 - Cowboy AI, Inc.
//! Projection rewriting
//!
//! Salvages a query whose only violations are disallowed properties by
//! dropping the offending fields from its final `RETURN` clause.
//!
//! This is a syntactic approximation, not a Cypher transformation:
//!
//! - the final `RETURN` is the last `return` keyword followed by whitespace
//!   outside string literals and comments, and its tail runs to the end of
//!   the text (including any `ORDER BY`, `SKIP` or `LIMIT`)
//! - the tail is split on top-level commas
//! - a field is dropped when it contains `.prop` for a disallowed `prop`,
//!   compared case-insensitively
//!
//! Rewrites can therefore be wrong in both directions, which is why the
//! admission engine scans and checks every rewritten query again before
//! running it.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::policy::Analysis;

/// Why a query could not be rewritten
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteRefusal {
    #[error("cannot safely rewrite: {0}")]
    NonPropertyViolation(String),

    #[error("cannot safely rewrite: no RETURN clause")]
    NoReturnClause,

    #[error("cannot safely rewrite: every returned field is disallowed")]
    EmptyProjection,

    #[error("cannot safely rewrite: rewritten query is still not allowed ({0})")]
    RecheckFailed(String),
}

/// A successful rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub query: String,
    /// Fields removed from the `RETURN` clause, trimmed
    pub removed_fields: Vec<String>,
}

impl Rewrite {
    pub fn is_noop(&self) -> bool {
        self.removed_fields.is_empty()
    }
}

fn return_keyword() -> &'static Regex {
    static RETURN: OnceLock<Regex> = OnceLock::new();
    RETURN.get_or_init(|| Regex::new(r"(?i)\breturn\s+").unwrap())
}

/// Rewrite `cypher` so that none of the disallowed properties in
/// `analysis` is projected.
pub fn rewrite(cypher: &str, analysis: &Analysis) -> Result<Rewrite, RewriteRefusal> {
    if let Some(other) = analysis.violations.iter().find(|v| !v.is_property()) {
        return Err(RewriteRefusal::NonPropertyViolation(other.to_string()));
    }

    let needles: Vec<String> = analysis
        .disallowed_properties()
        .map(|p| format!(".{}", p.key()))
        .collect();
    if needles.is_empty() {
        return Ok(Rewrite {
            query: cypher.to_string(),
            removed_fields: Vec::new(),
        });
    }

    let masked = mask_literals(cypher);
    let Some(keyword) = return_keyword().find_iter(&masked).last() else {
        return Err(RewriteRefusal::NoReturnClause);
    };

    let prefix = &cypher[..keyword.start()];
    let tail = &cypher[keyword.end()..];

    let mut kept = Vec::new();
    let mut removed_fields = Vec::new();
    for field in split_top_level(tail) {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let lowered = field.to_ascii_lowercase();
        if needles.iter().any(|needle| lowered.contains(needle.as_str())) {
            removed_fields.push(field.to_string());
        } else {
            kept.push(field);
        }
    }

    if kept.is_empty() {
        return Err(RewriteRefusal::EmptyProjection);
    }

    Ok(Rewrite {
        query: format!("{}RETURN {}", prefix, kept.join(", ")),
        removed_fields,
    })
}

/// Split on commas that are not nested in brackets or string literals
pub fn split_top_level(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && quote != b'`' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    parts.push(&text[start.min(text.len())..]);
    parts
}

/// Same-length copy with string literal contents and comments replaced by
/// spaces, so byte offsets carry over to the original text
fn mask_literals(cypher: &str) -> String {
    let bytes = cypher.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = bytes[i..]
                    .iter()
                    .position(|b| *b == b'\n')
                    .map_or(bytes.len(), |p| i + p);
                blank(&mut out, i, end);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = cypher[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 2);
                blank(&mut out, i, end);
                i = end;
            }
            quote @ (b'\'' | b'"' | b'`') => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != quote {
                    if bytes[j] == b'\\' && quote != b'`' {
                        j += 1;
                    }
                    j += 1;
                }
                let end = j.min(bytes.len());
                blank(&mut out, i + 1, end);
                i = end + 1;
            }
            _ => i += 1,
        }
    }

    match String::from_utf8(out) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

fn blank(out: &mut [u8], from: usize, to: usize) {
    for b in &mut out[from..to] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}
