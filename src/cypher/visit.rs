// Copyright (c) 2025 - Cowboy AI, Inc.
//! Read-only AST traversal.
//!
//! Implement [`Visitor`] and override the hooks of interest; every default
//! hook delegates to the matching `walk_*` function, so an override that
//! wants to keep descending calls the walker itself.

use super::ast::*;

pub trait Visitor {
    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }

    fn visit_clause(&mut self, clause: &Clause) {
        walk_clause(self, clause);
    }

    fn visit_node(&mut self, node: &NodePattern) {
        walk_node(self, node);
    }

    fn visit_relationship(&mut self, rel: &RelationshipPattern) {
        walk_relationship(self, rel);
    }

    fn visit_set_item(&mut self, item: &SetItem) {
        walk_set_item(self, item);
    }

    fn visit_remove_item(&mut self, item: &RemoveItem) {
        walk_remove_item(self, item);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(v: &mut V, statement: &Statement) {
    for query in &statement.queries {
        for clause in &query.clauses {
            v.visit_clause(clause);
        }
    }
}

pub fn walk_clause<V: Visitor + ?Sized>(v: &mut V, clause: &Clause) {
    match clause {
        Clause::Match {
            pattern,
            where_clause,
            ..
        } => {
            walk_pattern(v, pattern);
            walk_opt(v, where_clause.as_ref());
        }
        Clause::Unwind { expr, .. } => v.visit_expr(expr),
        Clause::With(projection) | Clause::Return(projection) => {
            walk_projection(v, projection)
        }
        Clause::Create(pattern) => walk_pattern(v, pattern),
        Clause::Merge {
            part,
            on_create,
            on_match,
        } => {
            walk_pattern_element(v, &part.element);
            for item in on_create.iter().chain(on_match) {
                v.visit_set_item(item);
            }
        }
        Clause::Set(items) => {
            for item in items {
                v.visit_set_item(item);
            }
        }
        Clause::Remove(items) => {
            for item in items {
                v.visit_remove_item(item);
            }
        }
        Clause::Delete { exprs, .. } => {
            for expr in exprs {
                v.visit_expr(expr);
            }
        }
        Clause::Call(call) => {
            for arg in call.args.iter().flatten() {
                v.visit_expr(arg);
            }
            walk_opt(v, call.where_clause.as_ref());
        }
        Clause::CallSubquery(statement) => v.visit_statement(statement),
        Clause::Foreach { list, body, .. } => {
            v.visit_expr(list);
            for clause in body {
                v.visit_clause(clause);
            }
        }
        Clause::LoadCsv { source, .. } => v.visit_expr(source),
    }
}

pub fn walk_projection<V: Visitor + ?Sized>(v: &mut V, projection: &Projection) {
    for item in &projection.items {
        v.visit_expr(&item.expr);
    }
    for sort in &projection.order_by {
        v.visit_expr(&sort.expr);
    }
    walk_opt(v, projection.skip.as_ref());
    walk_opt(v, projection.limit.as_ref());
    walk_opt(v, projection.where_clause.as_ref());
}

pub fn walk_pattern<V: Visitor + ?Sized>(v: &mut V, pattern: &Pattern) {
    for part in pattern {
        walk_pattern_element(v, &part.element);
    }
}

pub fn walk_pattern_element<V: Visitor + ?Sized>(v: &mut V, element: &PatternElement) {
    v.visit_node(&element.start);
    for (rel, node) in &element.chain {
        v.visit_relationship(rel);
        v.visit_node(node);
    }
}

pub fn walk_node<V: Visitor + ?Sized>(v: &mut V, node: &NodePattern) {
    walk_opt(v, node.properties.as_ref());
}

pub fn walk_relationship<V: Visitor + ?Sized>(v: &mut V, rel: &RelationshipPattern) {
    walk_opt(v, rel.properties.as_ref());
}

pub fn walk_set_item<V: Visitor + ?Sized>(v: &mut V, item: &SetItem) {
    match item {
        SetItem::Property { target, value } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        SetItem::Variable { value, .. } => v.visit_expr(value),
        SetItem::Labels { .. } => {}
    }
}

pub fn walk_remove_item<V: Visitor + ?Sized>(v: &mut V, item: &RemoveItem) {
    match item {
        RemoveItem::Property(expr) => v.visit_expr(expr),
        RemoveItem::Labels { .. } => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Literal(_) | Expr::Parameter(_) | Expr::Variable(_) | Expr::CountStar => {}
        Expr::List(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        Expr::Map(entries) => {
            for (_, value) in entries {
                v.visit_expr(value);
            }
        }
        Expr::Property { target, .. } | Expr::HasLabels { target, .. } => v.visit_expr(target),
        Expr::Index { target, index } => {
            v.visit_expr(target);
            v.visit_expr(index);
        }
        Expr::Slice { target, from, to } => {
            v.visit_expr(target);
            walk_opt(v, from.as_deref());
            walk_opt(v, to.as_deref());
        }
        Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => v.visit_expr(expr),
        Expr::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
        Expr::Case {
            subject,
            alternatives,
            default,
        } => {
            walk_opt(v, subject.as_deref());
            for (when, then) in alternatives {
                v.visit_expr(when);
                v.visit_expr(then);
            }
            walk_opt(v, default.as_deref());
        }
        Expr::ListComprehension {
            list, filter, map, ..
        } => {
            v.visit_expr(list);
            walk_opt(v, filter.as_deref());
            walk_opt(v, map.as_deref());
        }
        Expr::PatternComprehension {
            pattern,
            filter,
            map,
            ..
        } => {
            walk_pattern_element(v, pattern);
            walk_opt(v, filter.as_deref());
            v.visit_expr(map);
        }
        Expr::Quantified { list, filter, .. } => {
            v.visit_expr(list);
            walk_opt(v, filter.as_deref());
        }
        Expr::PatternPredicate(element) => walk_pattern_element(v, element),
        Expr::Subquery { body, .. } => match body.as_ref() {
            SubqueryBody::Pattern {
                pattern,
                where_clause,
            } => {
                walk_pattern(v, pattern);
                walk_opt(v, where_clause.as_ref());
            }
            SubqueryBody::Query(statement) => v.visit_statement(statement),
        },
        Expr::MapProjection { items, .. } => {
            for item in items {
                if let MapProjectionItem::Literal(_, value) = item {
                    v.visit_expr(value);
                }
            }
        }
    }
}

fn walk_opt<V: Visitor + ?Sized>(v: &mut V, expr: Option<&Expr>) {
    if let Some(expr) = expr {
        v.visit_expr(expr);
    }
}
