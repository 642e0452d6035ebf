// Copyright (c) 2025 - Cowboy AI, Inc.
//! Regex scanner
//!
//! Extracts a fingerprint with a handful of patterns applied to the query
//! text. The text is normalised first:
//!
//! - `// line` and `/* block */` comments are blanked
//! - string literal contents (`'...'`, `"..."`) are blanked, quotes kept
//! - backtick-quoted names made of `[A-Za-z0-9_]` lose their backticks
//!
//! so that keywords inside literals do not change the operation and quoting
//! a label does not hide it from the label pattern. Names that still carry
//! backticks (`` `My Label` ``) are matched as quoted names and unquoted.
//!
//! The scanner does not know the grammar. Label predicates (`WHERE n:L`),
//! `SET n:L` and dotted function names (`apoc.coll.sum`) are read as
//! whatever the patterns make of them.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use super::{QueryScanner, ScanError, ScannerKind};
use crate::fingerprint::{ClauseFlags, QueryFingerprint};

/// Pattern-matching scanner
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexScanner;

struct Patterns {
    /// `(var:A:B` captures `:A:B`
    labels: Regex,
    /// `-[var:T|U` captures `T|U`
    relationships: Regex,
    /// `.key` where key starts with a letter or underscore
    properties: Regex,
    /// write keywords as whole words, not after `.`, `:`, `$` or a backtick
    operations: Regex,
    name: Regex,
}

/// A bare name or a backtick-quoted one, with doubled backticks as escapes
const NAME: &str = r"(?:`(?:[^`]|``)+`|[A-Za-z0-9_]+)";

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        labels: Regex::new(&format!(
            r"\(\s*{NAME}?\s*(:\s*{NAME}(?:\s*[:|&]\s*:?\s*{NAME})*)"
        ))
        .unwrap(),
        relationships: Regex::new(&format!(
            r"-\[\s*{NAME}?\s*:\s*({NAME}(?:\s*\|\s*:?\s*{NAME})*)"
        ))
        .unwrap(),
        properties: Regex::new(r"\.\s*(`(?:[^`]|``)+`|[A-Za-z_][A-Za-z0-9_]*)").unwrap(),
        operations: Regex::new(
            r"(?i)(?:^|[^.:$`A-Za-z0-9_])(create|merge|set|remove|delete)\b",
        )
        .unwrap(),
        name: Regex::new(NAME).unwrap(),
    })
}

impl RegexScanner {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint without the `Result` wrapper; this scanner cannot fail
    pub fn fingerprint(&self, cypher: &str) -> QueryFingerprint {
        let text = normalize(cypher);
        let p = patterns();
        let mut fp = QueryFingerprint::new();

        for caps in p.labels.captures_iter(&text) {
            for name in p.name.find_iter(&caps[1]) {
                fp.add_label(&unquote(name.as_str()));
            }
        }

        for caps in p.relationships.captures_iter(&text) {
            for name in p.name.find_iter(&caps[1]) {
                fp.add_relationship(&unquote(name.as_str()));
            }
        }

        for caps in p.properties.captures_iter(&text) {
            fp.add_property(&unquote(&caps[1]));
        }

        let mut flags = ClauseFlags::default();
        for caps in p.operations.captures_iter(&text) {
            match caps[1].to_ascii_lowercase().as_str() {
                "create" | "merge" => flags.create = true,
                "set" | "remove" => flags.update = true,
                _ => flags.delete = true,
            }
        }
        fp.operation = flags.operation();

        fp
    }
}

impl QueryScanner for RegexScanner {
    fn scan(&self, cypher: &str) -> Result<QueryFingerprint, ScanError> {
        Ok(self.fingerprint(cypher))
    }

    fn kind(&self) -> ScannerKind {
        ScannerKind::Regex
    }
}

fn unquote(name: &str) -> Cow<'_, str> {
    match name.strip_prefix('`').and_then(|n| n.strip_suffix('`')) {
        Some(inner) => Cow::Owned(inner.replace("``", "`")),
        None => Cow::Borrowed(name),
    }
}

/// Blank comments and string contents, unquote simple backtick names.
///
/// Unterminated strings and comments are blanked to the end of input.
pub fn normalize(cypher: &str) -> String {
    let bytes = cypher.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out.push(b' ');
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out.extend_from_slice(b"  ");
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        out.extend_from_slice(b"  ");
                        i += 2;
                        break;
                    }
                    out.push(if bytes[i] == b'\n' { b'\n' } else { b' ' });
                    i += 1;
                }
            }
            quote @ (b'\'' | b'"') => {
                out.push(quote);
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => {
                            let n = if i + 1 < bytes.len() { 2 } else { 1 };
                            out.extend(std::iter::repeat(b' ').take(n));
                            i += n;
                        }
                        b if b == quote => {
                            out.push(quote);
                            i += 1;
                            break;
                        }
                        _ => {
                            out.push(b' ');
                            i += 1;
                        }
                    }
                }
            }
            b'`' => {
                let start = i;
                i += 1;
                let mut content = Vec::new();
                let mut closed = false;
                while i < bytes.len() {
                    if bytes[i] == b'`' {
                        if bytes.get(i + 1) == Some(&b'`') {
                            content.push(b'`');
                            i += 2;
                            continue;
                        }
                        i += 1;
                        closed = true;
                        break;
                    }
                    content.push(bytes[i]);
                    i += 1;
                }
                let simple = !content.is_empty()
                    && content.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_');
                if closed && simple {
                    out.extend_from_slice(&content);
                } else {
                    out.extend_from_slice(&bytes[start..i]);
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Multi-byte sequences are either copied whole or blanked byte by byte
    match String::from_utf8(out) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
