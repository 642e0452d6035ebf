// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Admission Verdicts
//!
//! Generates projections over a fixed pool of property names and random
//! allow-lists, then checks that the verdict, the dispatched query and the
//! audit trail line up.

use cypher_guard::{
    check, rewrite, AdmissionError, Decision, OperationPermissions, Permissions, QueryScanner,
    RegexScanner, ScannerKind,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

use crate::fixtures::Harness;

// ============================================================================
// Strategies
// ============================================================================

const PROPERTY_POOL: &[&str] = &["name", "age", "ssn", "dob", "email", "salary"];

/// Non-empty ordered selection of returned properties
fn returned_fields() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(PROPERTY_POOL.to_vec(), 1..=PROPERTY_POOL.len())
}

/// Any subset of the pool, possibly empty
fn allowed_fields() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(PROPERTY_POOL.to_vec(), 0..=PROPERTY_POOL.len())
}

fn scanner_kind() -> impl Strategy<Value = ScannerKind> {
    prop_oneof![Just(ScannerKind::Regex), Just(ScannerKind::Parser)]
}

fn projection(fields: &[&str]) -> String {
    let items: Vec<String> = fields.iter().map(|f| format!("p.{}", f)).collect();
    format!("MATCH (p:Person) RETURN {}", items.join(", "))
}

fn permissions(allowed: &[&str]) -> Permissions {
    Permissions::builder()
        .label("Person")
        .properties("Person", allowed.iter().copied())
        .operations("Person", OperationPermissions::READ_ONLY)
        .build()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: verdicts follow the property allow-list
    ///
    /// All fields allowed runs the query as written, some allowed runs the
    /// projection of the allowed ones, none allowed is forbidden and nothing
    /// is dispatched.
    #[test]
    fn prop_verdict_matches_allow_list(
        fields in returned_fields(),
        allowed in allowed_fields(),
        kind in scanner_kind(),
    ) {
        let query = projection(&fields);
        let perms = permissions(&allowed);
        let kept: Vec<&str> = fields.iter().copied().filter(|f| allowed.contains(f)).collect();

        let (result, dispatched, records) = tokio_test::block_on(async {
            let harness = Harness::new(kind);
            let result = harness.engine.admit(1, &query, &perms).await;
            let dispatched = harness.graph.dispatched();
            let records = harness.finish().await;
            (result, dispatched, records)
        });

        prop_assert_eq!(records.len(), 1, "exactly one audit record per verdict");

        if kept.len() == fields.len() {
            let admission = result.unwrap();
            prop_assert!(!admission.rewritten);
            prop_assert_eq!(dispatched, vec![query.clone()]);
            prop_assert_eq!(records[0].decision, Decision::Allowed);
        } else if kept.is_empty() {
            let forbidden = matches!(result, Err(AdmissionError::Forbidden { .. }));
            prop_assert!(forbidden, "expected Forbidden");
            prop_assert!(dispatched.is_empty());
            prop_assert_eq!(records[0].decision, Decision::Blocked);
        } else {
            let admission = result.unwrap();
            let expected = projection(&kept);
            prop_assert!(admission.rewritten);
            prop_assert_eq!(&admission.rewritten_query, &expected);
            prop_assert_eq!(dispatched, vec![expected.clone()]);
            prop_assert_eq!(records[0].decision, Decision::Rewritten);
            prop_assert_eq!(&records[0].rewritten_query, &expected);
        }
    }

    /// Property: rewriting only removes disallowed properties
    ///
    /// The rewritten query references a subset of the original properties
    /// with every disallowed one gone.
    #[test]
    fn prop_rewrite_removes_only_disallowed(
        fields in returned_fields(),
        allowed in allowed_fields(),
    ) {
        let query = projection(&fields);
        let scanner = RegexScanner::new();
        let original = scanner.fingerprint(&query);
        let analysis = check(&original, &permissions(&allowed));

        if let Ok(rewritten) = rewrite(&query, &analysis) {
            let after = scanner.fingerprint(&rewritten.query);
            let before: BTreeSet<&str> = original.property_keys();
            let disallowed: BTreeSet<&str> =
                analysis.disallowed_properties().map(|p| p.key()).collect();

            for key in after.property_keys() {
                prop_assert!(before.contains(key));
                prop_assert!(!disallowed.contains(key), "{} survived the rewrite", key);
            }
        }
    }

    /// Property: rewriting is idempotent
    ///
    /// A rewritten query has no property violations left, so rewriting it
    /// again changes nothing.
    #[test]
    fn prop_rewrite_is_idempotent(
        fields in returned_fields(),
        allowed in allowed_fields(),
    ) {
        let query = projection(&fields);
        let perms = permissions(&allowed);
        let scanner = RegexScanner::new();
        let analysis = check(&scanner.fingerprint(&query), &perms);

        if let Ok(once) = rewrite(&query, &analysis) {
            let again = check(&scanner.scan(&once.query).unwrap(), &perms);
            prop_assert!(again.allowed);
            let twice = rewrite(&once.query, &again).unwrap();
            prop_assert!(twice.is_noop());
            prop_assert_eq!(twice.query, once.query);
        }
    }
}
