// Copyright (c) 2025 - Cowboy AI, Inc.
//! Parse-tree scanner
//!
//! Parses the query and walks the tree once, collecting:
//!
//! - labels from node patterns, label predicates and `SET`/`REMOVE` labels
//! - relationship types from relationship patterns
//! - property keys from property lookups and map-projection selectors
//! - write clauses: `CREATE`/`MERGE` (create), `SET`/`REMOVE` (update),
//!   `DELETE` (delete)
//!
//! Unparsable input is a [`ScanError`].

use tracing::debug;

use super::{QueryScanner, ScanError, ScannerKind};
use crate::cypher::ast::{
    Clause, Expr, MapProjectionItem, NodePattern, RelationshipPattern, RemoveItem, SetItem,
};
use crate::cypher::visit::{self, Visitor};
use crate::cypher::{parse, Statement};
use crate::fingerprint::{ClauseFlags, QueryFingerprint};

/// Grammar-based scanner
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseTreeScanner;

impl ParseTreeScanner {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint of an already parsed statement
    pub fn fingerprint(&self, statement: &Statement) -> QueryFingerprint {
        let mut collector = Collector::default();
        collector.visit_statement(statement);
        collector.fingerprint.operation = collector.flags.operation();
        collector.fingerprint
    }
}

impl QueryScanner for ParseTreeScanner {
    fn scan(&self, cypher: &str) -> Result<QueryFingerprint, ScanError> {
        let statement = parse(cypher).map_err(|err| {
            debug!(error = %err, "query did not parse");
            ScanError::Parse(err)
        })?;
        Ok(self.fingerprint(&statement))
    }

    fn kind(&self) -> ScannerKind {
        ScannerKind::Parser
    }
}

#[derive(Default)]
struct Collector {
    fingerprint: QueryFingerprint,
    flags: ClauseFlags,
}

impl Visitor for Collector {
    fn visit_clause(&mut self, clause: &Clause) {
        match clause {
            Clause::Create(_) | Clause::Merge { .. } => self.flags.create = true,
            Clause::Set(_) | Clause::Remove(_) => self.flags.update = true,
            Clause::Delete { .. } => self.flags.delete = true,
            _ => {}
        }
        if let Clause::Merge {
            on_create,
            on_match,
            ..
        } = clause
        {
            if !on_create.is_empty() || !on_match.is_empty() {
                self.flags.update = true;
            }
        }
        visit::walk_clause(self, clause);
    }

    fn visit_node(&mut self, node: &NodePattern) {
        for label in &node.labels {
            self.fingerprint.add_label(label);
        }
        visit::walk_node(self, node);
    }

    fn visit_relationship(&mut self, rel: &RelationshipPattern) {
        for rel_type in &rel.types {
            self.fingerprint.add_relationship(rel_type);
        }
        visit::walk_relationship(self, rel);
    }

    fn visit_set_item(&mut self, item: &SetItem) {
        if let SetItem::Labels { labels, .. } = item {
            for label in labels {
                self.fingerprint.add_label(label);
            }
        }
        visit::walk_set_item(self, item);
    }

    fn visit_remove_item(&mut self, item: &RemoveItem) {
        if let RemoveItem::Labels { labels, .. } = item {
            for label in labels {
                self.fingerprint.add_label(label);
            }
        }
        visit::walk_remove_item(self, item);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Property { key, .. } => self.fingerprint.add_property(key),
            Expr::HasLabels { labels, .. } => {
                for label in labels {
                    self.fingerprint.add_label(label);
                }
            }
            Expr::MapProjection { items, .. } => {
                for item in items {
                    if let MapProjectionItem::Property(key) = item {
                        self.fingerprint.add_property(key);
                    }
                }
            }
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Operation;
    use pretty_assertions::assert_eq;

    fn scan(cypher: &str) -> QueryFingerprint {
        ParseTreeScanner::new().scan(cypher).unwrap()
    }

    fn keys(set: &std::collections::BTreeSet<crate::fingerprint::Name>) -> Vec<&str> {
        set.iter().map(|n| n.key()).collect()
    }

    #[test]
    fn test_basic_fingerprint() {
        let fp = scan("MATCH (p:Person)-[:KNOWS]->(f:Person) RETURN p.name, f.age");
        assert_eq!(keys(&fp.labels), vec!["person"]);
        assert_eq!(keys(&fp.relationships), vec!["knows"]);
        assert_eq!(keys(&fp.properties), vec!["age", "name"]);
        assert_eq!(fp.operation, Operation::Read);
    }

    #[test]
    fn test_string_literals_do_not_leak() {
        let fp = scan("MATCH (n:Person) WHERE n.bio = 'CREATE (x:Secret) SET x.ssn = 1' RETURN n.name");
        assert_eq!(fp.operation, Operation::Read);
        assert_eq!(keys(&fp.labels), vec!["person"]);
        assert_eq!(keys(&fp.properties), vec!["bio", "name"]);
    }

    #[test]
    fn test_label_predicates_and_set_labels() {
        let fp = scan("MATCH (n:Person) WHERE n:Admin SET n:Flagged REMOVE n:Draft RETURN n");
        assert_eq!(keys(&fp.labels), vec!["admin", "draft", "flagged", "person"]);
        assert_eq!(fp.operation, Operation::Update);
    }

    #[test]
    fn test_map_projection_selectors() {
        let fp = scan("MATCH (p:Person) RETURN p {.name, .ssn, .*}");
        assert_eq!(keys(&fp.properties), vec!["name", "ssn"]);
    }

    #[test]
    fn test_nested_structures_are_walked() {
        let fp = scan(
            "MATCH (p:Person) WHERE EXISTS { (p)-[:OWNS]->(:Car) } \
             CALL { MATCH (c:Company) RETURN c } \
             RETURN [(p)-[:KNOWS]->(f) | f.salary], c.name \
             UNION MATCH (x:Vault) RETURN x.code AS name",
        );
        assert_eq!(keys(&fp.labels), vec!["car", "company", "person", "vault"]);
        assert_eq!(keys(&fp.relationships), vec!["knows", "owns"]);
        assert_eq!(keys(&fp.properties), vec!["code", "name", "salary"]);
    }

    #[test]
    fn test_write_clause_flags() {
        assert_eq!(scan("CREATE (n:Person) SET n.name = 'x'").operation, Operation::Create);
        assert_eq!(scan("MERGE (n:Person {id: 1})").operation, Operation::Create);
        assert_eq!(scan("MATCH (n) SET n.a = 1 DELETE n").operation, Operation::Update);
        assert_eq!(scan("MATCH (n) DETACH DELETE n").operation, Operation::Delete);
        assert_eq!(
            scan("MATCH (n) FOREACH (x IN [1] | CREATE (:Log))").operation,
            Operation::Create
        );
    }

    #[test]
    fn test_dotted_function_names_are_not_properties() {
        let fp = scan("MATCH (n:Person) RETURN apoc.coll.sum([n.age])");
        assert_eq!(keys(&fp.properties), vec!["age"]);
    }

    #[test]
    fn test_unparsable_query_is_an_error() {
        let result = ParseTreeScanner::new().scan("MATCH (n:Person RETURN n");
        assert!(matches!(result, Err(ScanError::Parse(_))));
    }

    #[test]
    fn test_case_variants_produce_equal_fingerprints() {
        assert_eq!(
            scan("match (P:PERSON)-[:knows]->(f) return P.NAME"),
            scan("MATCH (p:Person)-[:KNOWS]->(f) RETURN p.name")
        );
    }
}
