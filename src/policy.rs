// Copyright (c) 2025 - Cowboy AI, Inc.
//! Policy checking
//!
//! Compares a [`QueryFingerprint`] with a user's [`Permissions`]. Four
//! checks always run in full and in this order:
//!
//! 1. every label must be allowed
//! 2. every relationship type must be allowed
//! 3. every property must be readable under some label
//! 4. every label with an operation entry must allow the detected operation
//!
//! Violations are typed. Their display strings are part of the external
//! contract (the HTTP 403 body and `rewriteReason`).

use serde::Serialize;
use std::fmt;

use crate::fingerprint::{Name, Operation, QueryFingerprint};
use crate::permissions::Permissions;

/// One reason a query is not admissible as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    DisallowedLabel { label: Name },
    DisallowedRelationship { rel_type: Name },
    DisallowedProperty { property: Name },
    OperationNotAllowed { operation: Operation, label: Name },
}

impl Violation {
    /// Property name when this is a property violation
    pub fn property(&self) -> Option<&Name> {
        match self {
            Violation::DisallowedProperty { property } => Some(property),
            _ => None,
        }
    }

    pub fn is_property(&self) -> bool {
        self.property().is_some()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DisallowedLabel { label } => write!(f, "disallowed label '{}'", label),
            Violation::DisallowedRelationship { rel_type } => {
                write!(f, "disallowed relationship type '{}'", rel_type)
            }
            Violation::DisallowedProperty { property } => {
                write!(f, "disallowed property '{}'", property)
            }
            Violation::OperationNotAllowed { operation, label } => write!(
                f,
                "operation '{}' is not allowed on label '{}'",
                operation,
                label.key()
            ),
        }
    }
}

/// Join violations for display: `"v1, v2"`
pub fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Verdict of one policy check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub allowed: bool,
    pub operation: Operation,
    pub violations: Vec<Violation>,
}

impl Analysis {
    /// True when there is at least one violation and all are property violations
    pub fn only_property_violations(&self) -> bool {
        !self.violations.is_empty() && self.violations.iter().all(Violation::is_property)
    }

    /// Disallowed property names, in report order
    pub fn disallowed_properties(&self) -> impl Iterator<Item = &Name> {
        self.violations.iter().filter_map(Violation::property)
    }

    pub fn reason(&self) -> String {
        join_violations(&self.violations)
    }
}

/// Run all four checks
pub fn check(fp: &QueryFingerprint, perms: &Permissions) -> Analysis {
    let mut violations = Vec::new();

    for label in &fp.labels {
        if !perms.allows_label(label.key()) {
            violations.push(Violation::DisallowedLabel {
                label: label.clone(),
            });
        }
    }

    for rel_type in &fp.relationships {
        if !perms.allows_relationship(rel_type.key()) {
            violations.push(Violation::DisallowedRelationship {
                rel_type: rel_type.clone(),
            });
        }
    }

    for property in &fp.properties {
        if !perms.allows_property(property.key()) {
            violations.push(Violation::DisallowedProperty {
                property: property.clone(),
            });
        }
    }

    for label in &fp.labels {
        if perms.operation_allowed(label.key(), fp.operation) == Some(false) {
            violations.push(Violation::OperationNotAllowed {
                operation: fp.operation,
                label: label.clone(),
            });
        }
    }

    Analysis {
        allowed: violations.is_empty(),
        operation: fp.operation,
        violations,
    }
}
