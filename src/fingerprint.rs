// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query Fingerprint
//!
//! The structural summary of one Cypher query: which node labels,
//! relationship types and property keys it references, and which kind of
//! operation it performs. Both scanners produce this value and the policy
//! checker consumes it.
//!
//! Names compare case-insensitively. A [`Name`] keeps the spelling it was
//! first seen with so that violations can quote the query back to the
//! caller, while equality, ordering and hashing use the lower-case key.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

pub use crate::permissions::Operation;

/// A label, relationship type or property key as written in a query
#[derive(Debug, Clone)]
pub struct Name {
    raw: String,
    folded: String,
}

impl Name {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let folded = raw.to_ascii_lowercase();
        Self { raw, folded }
    }

    /// Spelling as it appeared in the query
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical lower-case form used for every comparison
    pub fn key(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Name {
    fn from(raw: &str) -> Self {
        Name::new(raw)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.folded)
    }
}

/// Structural summary of a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryFingerprint {
    pub labels: BTreeSet<Name>,
    pub relationships: BTreeSet<Name>,
    pub properties: BTreeSet<Name>,
    pub operation: Operation,
}

impl QueryFingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label. The first spelling seen wins.
    pub fn add_label(&mut self, raw: &str) {
        self.labels.insert(Name::new(raw));
    }

    pub fn add_relationship(&mut self, raw: &str) {
        let raw = raw.trim_start_matches(':');
        self.relationships.insert(Name::new(raw));
    }

    pub fn add_property(&mut self, raw: &str) {
        self.properties.insert(Name::new(raw));
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains(&Name::new(name))
    }

    pub fn has_relationship(&self, name: &str) -> bool {
        self.relationships.contains(&Name::new(name))
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(&Name::new(name))
    }

    /// Lower-case keys of the property set
    pub fn property_keys(&self) -> BTreeSet<&str> {
        self.properties.iter().map(Name::key).collect()
    }
}

/// Write clauses observed while scanning, folded into an [`Operation`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClauseFlags {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl ClauseFlags {
    pub fn operation(&self) -> Operation {
        Operation::resolve(self.create, self.update, self.delete)
    }
}
