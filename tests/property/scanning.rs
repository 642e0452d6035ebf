// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Scanners
//!
//! Generated path patterns with labels, relationship types, filters and
//! write clauses. Both scanners must agree on them, and case must never
//! matter.

use cypher_guard::{Operation, ParseTreeScanner, QueryScanner, RegexScanner};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

const KEYWORDS: &[&str] = &[
    "all", "and", "any", "as", "asc", "ascending", "by", "call", "case", "collect", "contains",
    "count", "create", "delete", "desc", "descending", "detach", "distinct", "else", "end", "ends",
    "exists", "false", "foreach", "in", "is", "limit", "load", "match", "merge", "none", "not",
    "null", "on", "optional", "or", "order", "remove", "return", "set", "single", "skip", "starts",
    "then", "true", "union", "unwind", "when", "where", "with", "xor", "yield",
];

fn not_keyword(word: &String) -> bool {
    !KEYWORDS.contains(&word.to_ascii_lowercase().as_str())
}

fn name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,8}(_[A-Z][a-z]{1,4})?".prop_filter("not a keyword", not_keyword)
}

fn variable() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,3}".prop_filter("not a keyword", not_keyword)
}

fn property_key() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{1,8}".prop_filter("not a keyword", not_keyword)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Create,
    Set,
    Delete,
}

/// `MATCH (a:L1)-[:T]->(b:L2) [WHERE a.k = 1] [write clauses] RETURN b.k2`
#[derive(Debug, Clone)]
struct Shape {
    a: String,
    b: String,
    start: String,
    end: String,
    rel_type: String,
    filter: Option<String>,
    returned: String,
    writes: Vec<Write>,
}

impl Shape {
    fn cypher(&self) -> String {
        let mut q = format!(
            "MATCH ({a}:{start})-[:{rel}]->({b}:{end})",
            a = self.a,
            b = self.b,
            start = self.start,
            end = self.end,
            rel = self.rel_type
        );
        if let Some(key) = &self.filter {
            q.push_str(&format!(" WHERE {}.{} = 1", self.a, key));
        }
        for write in &self.writes {
            match write {
                Write::Create => q.push_str(&format!(" CREATE ({})-[:{}]->({})", self.b, self.rel_type, self.a)),
                Write::Set => q.push_str(&format!(" SET {}.{} = 2", self.b, self.returned)),
                Write::Delete => q.push_str(&format!(" DETACH DELETE {}", self.a)),
            }
        }
        q.push_str(&format!(" RETURN {}.{}", self.b, self.returned));
        q
    }

    fn expected_operation(&self) -> Operation {
        Operation::resolve(
            self.writes.contains(&Write::Create),
            self.writes.contains(&Write::Set),
            self.writes.contains(&Write::Delete),
        )
    }
}

fn write_clause() -> impl Strategy<Value = Write> {
    prop_oneof![Just(Write::Create), Just(Write::Set), Just(Write::Delete)]
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        (variable(), variable()).prop_filter("distinct variables", |(a, b)| a != b),
        name(),
        name(),
        name(),
        prop::option::of(property_key()),
        property_key(),
        prop::collection::vec(write_clause(), 0..3),
    )
        .prop_map(|((a, b), start, end, rel_type, filter, returned, writes)| Shape {
            a,
            b,
            start,
            end,
            rel_type: rel_type.to_uppercase(),
            filter,
            returned,
            writes,
        })
}

/// Flip the case of the characters selected by `mask`
fn recase(text: &str, mask: &[bool]) -> String {
    text.chars()
        .zip(mask.iter().cycle())
        .map(|(c, flip)| {
            if *flip && c.is_ascii_lowercase() {
                c.to_ascii_uppercase()
            } else if *flip {
                c.to_ascii_lowercase()
            } else {
                c
            }
        })
        .collect()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: both scanners produce the same fingerprint
    #[test]
    fn prop_scanners_agree(shape in shape()) {
        let query = shape.cypher();
        let regex = RegexScanner::new().scan(&query).unwrap();
        let parser = ParseTreeScanner::new().scan(&query).unwrap();
        prop_assert_eq!(regex, parser, "query: {}", query);
    }

    /// Property: operation precedence is create > update > delete > read
    #[test]
    fn prop_operation_precedence(shape in shape()) {
        let query = shape.cypher();
        let expected = shape.expected_operation();
        prop_assert_eq!(RegexScanner::new().scan(&query).unwrap().operation, expected);
        prop_assert_eq!(ParseTreeScanner::new().scan(&query).unwrap().operation, expected);
    }

    /// Property: case variants yield identical fingerprints
    #[test]
    fn prop_case_insensitive(
        shape in shape(),
        mask in prop::collection::vec(any::<bool>(), 1..16),
    ) {
        let query = shape.cypher();
        let variant = recase(&query, &mask);

        let parser = ParseTreeScanner::new();
        prop_assert_eq!(parser.scan(&query).unwrap(), parser.scan(&variant).unwrap());

        let regex = RegexScanner::new();
        prop_assert_eq!(regex.scan(&query).unwrap(), regex.scan(&variant).unwrap());
    }

    /// Property: the regex scanner never fails
    #[test]
    fn prop_regex_scanner_is_total(text in "\\PC{0,64}") {
        prop_assert!(RegexScanner::new().scan(&text).is_ok());
    }
}
