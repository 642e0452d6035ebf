// Copyright (c) 2025 - Cowboy AI, Inc.
//! Permission Model
//!
//! A per-user, read-only snapshot of what a caller may touch in the graph.
//! Permission documents are stored as JSON (organization defaults and user
//! overrides) and normalised at load time:
//!
//! - every name is case-folded to lower-case ASCII
//! - relationship entries may be plain strings or `{direction, types}`
//!   objects; both flatten into one set of types
//! - the union of all per-label property lists is precomputed as the
//!   globally readable property set
//!
//! # Example
//!
//! ```rust
//! use cypher_guard::permissions::{Operation, Permissions};
//!
//! let perms = Permissions::from_json(r#"{
//!     "allowed_labels": ["Person"],
//!     "allowed_relationships": [{"direction": "outgoing", "types": ["KNOWS"]}],
//!     "allowed_properties": {"Person": ["name"]},
//!     "operation_permissions": {"Person": {"read": true}}
//! }"#).unwrap();
//!
//! assert!(perms.allows_label("person"));
//! assert!(perms.allows_relationship("knows"));
//! assert!(perms.allows_property("NAME"));
//! assert_eq!(perms.operation_allowed("person", Operation::Create), Some(false));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::errors::{GatewayError, GatewayResult};

/// The kind of data access a query performs
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Resolve the operation of a query from the write clauses it contains.
    ///
    /// Precedence is `create > update > delete > read`.
    pub fn resolve(has_create: bool, has_update: bool, has_delete: bool) -> Self {
        if has_create {
            Operation::Create
        } else if has_update {
            Operation::Update
        } else if has_delete {
            Operation::Delete
        } else {
            Operation::Read
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRUD flags for one label. Absent flags deny.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationPermissions {
    pub read: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl OperationPermissions {
    /// Everything allowed
    pub const ALL: Self = Self {
        read: true,
        create: true,
        update: true,
        delete: true,
    };

    /// Read only
    pub const READ_ONLY: Self = Self {
        read: true,
        create: false,
        update: false,
        delete: false,
    };

    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::Read => self.read,
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Traversal direction attached to a relationship permission.
///
/// Informational only: the admission engine checks relationship types and
/// never uses a direction to relax a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

impl FromStr for Direction {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            "both" => Ok(Direction::Both),
            other => Err(GatewayError::InvalidPermissions(format!(
                "unknown relationship direction '{}'",
                other
            ))),
        }
    }
}

/// One relationship entry as stored: either a bare type name or a
/// directional rule covering several types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipRule {
    Type(String),
    Directed {
        #[serde(default)]
        direction: Option<String>,
        #[serde(default)]
        types: Vec<String>,
    },
}

/// Permission document exactly as persisted in the relational store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionDocument {
    #[serde(default)]
    pub allowed_labels: Vec<String>,
    #[serde(default)]
    pub allowed_relationships: Vec<RelationshipRule>,
    #[serde(default)]
    pub allowed_properties: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operation_permissions: BTreeMap<String, OperationPermissions>,
}

/// Normalised, case-folded permission snapshot for one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    labels: BTreeSet<String>,
    relationships: BTreeSet<String>,
    directions: BTreeMap<String, BTreeSet<Direction>>,
    properties: BTreeMap<String, BTreeSet<String>>,
    readable_properties: BTreeSet<String>,
    operations: BTreeMap<String, OperationPermissions>,
}

impl Permissions {
    /// Parse and normalise a stored JSON permission document
    pub fn from_json(json: &str) -> GatewayResult<Self> {
        let document: PermissionDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Normalise a permission document.
    ///
    /// Fails only when a relationship rule names an unknown direction.
    pub fn from_document(document: PermissionDocument) -> GatewayResult<Self> {
        let mut perms = Permissions {
            labels: document.allowed_labels.iter().map(|l| fold(l)).collect(),
            ..Default::default()
        };

        for rule in document.allowed_relationships {
            match rule {
                RelationshipRule::Type(name) => {
                    perms.relationships.insert(fold(&name));
                }
                RelationshipRule::Directed { direction, types } => {
                    let direction = direction
                        .as_deref()
                        .map(str::parse::<Direction>)
                        .transpose()?;
                    for name in types {
                        let name = fold(&name);
                        if let Some(direction) = direction {
                            perms
                                .directions
                                .entry(name.clone())
                                .or_default()
                                .insert(direction);
                        }
                        perms.relationships.insert(name);
                    }
                }
            }
        }

        for (label, props) in document.allowed_properties {
            let props: BTreeSet<String> = props.iter().map(|p| fold(p)).collect();
            perms.readable_properties.extend(props.iter().cloned());
            perms.properties.entry(fold(&label)).or_default().extend(props);
        }

        for (label, ops) in document.operation_permissions {
            perms.operations.insert(fold(&label), ops);
        }

        Ok(perms)
    }

    /// Start an empty permission set for programmatic construction
    pub fn builder() -> PermissionsBuilder {
        PermissionsBuilder::default()
    }

    pub fn allows_label(&self, label: &str) -> bool {
        self.labels.contains(&fold(label))
    }

    pub fn allows_relationship(&self, rel_type: &str) -> bool {
        self.relationships.contains(&fold(rel_type))
    }

    /// Whether a property is readable under any label
    pub fn allows_property(&self, property: &str) -> bool {
        self.readable_properties.contains(&fold(property))
    }

    /// Per-label operation verdict. `None` when the label carries no
    /// operation constraint.
    pub fn operation_allowed(&self, label: &str, operation: Operation) -> Option<bool> {
        self.operations
            .get(&fold(label))
            .map(|ops| ops.allows(operation))
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn relationships(&self) -> &BTreeSet<String> {
        &self.relationships
    }

    /// Directions recorded for a relationship type, for display
    pub fn directions(&self, rel_type: &str) -> Option<&BTreeSet<Direction>> {
        self.directions.get(&fold(rel_type))
    }

    pub fn properties_for(&self, label: &str) -> Option<&BTreeSet<String>> {
        self.properties.get(&fold(label))
    }

    pub fn readable_properties(&self) -> &BTreeSet<String> {
        &self.readable_properties
    }

    pub fn operations(&self) -> &BTreeMap<String, OperationPermissions> {
        &self.operations
    }
}

/// Builder for permission snapshots that do not come from the store
#[derive(Debug, Default)]
pub struct PermissionsBuilder {
    document: PermissionDocument,
}

impl PermissionsBuilder {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.document.allowed_labels.push(label.into());
        self
    }

    pub fn relationship(mut self, rel_type: impl Into<String>) -> Self {
        self.document
            .allowed_relationships
            .push(RelationshipRule::Type(rel_type.into()));
        self
    }

    pub fn properties<I, S>(mut self, label: impl Into<String>, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document
            .allowed_properties
            .entry(label.into())
            .or_default()
            .extend(props.into_iter().map(Into::into));
        self
    }

    pub fn operations(mut self, label: impl Into<String>, ops: OperationPermissions) -> Self {
        self.document.operation_permissions.insert(label.into(), ops);
        self
    }

    pub fn build(self) -> Permissions {
        // Builder rules never carry a direction, so normalisation cannot fail.
        Permissions::from_document(self.document).unwrap_or_default()
    }
}

fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}
