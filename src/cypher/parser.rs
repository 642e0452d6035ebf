// Copyright (c) 2025 - Cowboy AI, Inc.
//! Recursive-descent Cypher parser.
//!
//! Covers the read and write clauses a gateway sees in practice: `MATCH`,
//! `OPTIONAL MATCH`, `WHERE`, `WITH`, `UNWIND`, `RETURN` (with `ORDER BY`,
//! `SKIP`, `LIMIT`), `CREATE`, `MERGE` with `ON CREATE`/`ON MATCH`, `SET`,
//! `REMOVE`, `[DETACH] DELETE`, procedure `CALL ... YIELD`, `CALL { }`
//! subqueries, `FOREACH`, `LOAD CSV` and `UNION [ALL]`.
//!
//! Expressions follow the openCypher precedence ladder. Patterns inside
//! expressions (pattern predicates and pattern comprehensions) are found by
//! speculative parsing: the parser records its position, tries the pattern
//! form and restores on failure. A failed attempt is remembered by position
//! so nested brackets are never re-tried, which keeps the work linear in the
//! nesting depth.
//!
//! Nesting is capped at [`MAX_DEPTH`]: parenthesised expressions, operator
//! chains, unary prefixes and subqueries all count towards it.
//!
//! Anything outside the grammar is an error. Callers that make access
//! decisions treat that as a refusal, never as "nothing found".

use super::ast::*;
use super::lexer::{tokenize, LexError, Token, TokenKind};
use std::collections::HashSet;

/// Deepest expression or clause nesting the parser accepts
pub const MAX_DEPTH: usize = 128;

/// Parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, found {found} at offset {offset}")]
    Unexpected {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("query is empty")]
    Empty,

    #[error("multiple statements are not supported (second statement at offset {0})")]
    MultipleStatements(usize),

    #[error("query nests deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },
}

type PResult<T> = Result<T, ParseError>;

/// Words that cannot be used as bare variable names in expressions
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "ASCENDING", "BY", "CALL", "CASE", "CONTAINS", "CREATE", "DELETE",
    "DESC", "DESCENDING", "DETACH", "DISTINCT", "ELSE", "END", "ENDS", "FOREACH", "IN", "IS",
    "LIMIT", "LOAD", "MATCH", "MERGE", "NOT", "ON", "OPTIONAL", "OR", "ORDER", "REMOVE", "RETURN",
    "SET", "SKIP", "STARTS", "THEN", "UNION", "UNWIND", "WHEN", "WHERE", "WITH", "XOR", "YIELD",
];

/// Keywords that open a clause
const CLAUSE_KEYWORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "UNWIND", "WITH", "RETURN", "CREATE", "MERGE", "SET", "REMOVE", "DELETE",
    "DETACH", "CALL", "FOREACH", "LOAD",
];

/// Parse one Cypher statement. A single trailing `;` is accepted.
pub fn parse(input: &str) -> Result<Statement, ParseError> {
    let mut parser = Parser::new(input)?;
    if parser.at(&TokenKind::Eof) {
        return Err(ParseError::Empty);
    }

    let statement = parser.statement()?;

    if parser.eat(&TokenKind::Semicolon) && !parser.at(&TokenKind::Eof) {
        return Err(ParseError::MultipleStatements(parser.peek().span.start));
    }
    if !parser.at(&TokenKind::Eof) {
        return Err(parser.unexpected("end of query"));
    }
    Ok(statement)
}

/// Cypher parser over a token list
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    /// Positions where a speculative pattern parse already failed
    dead_ends: HashSet<usize>,
}

/// Saved parser position for speculative parsing
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(input: &str) -> PResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            depth: 0,
            dead_ends: HashSet::new(),
        })
    }

    // ---------------------------------------------------------------
    // Token stream
    // ---------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_n(0)
    }

    fn peek_n(&self, n: usize) -> &Token {
        // The lexer always terminates the list with Eof
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)]
    }

    fn kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.kind().is_keyword(keyword)
    }

    fn at_keywords(&self, keywords: &[&str]) -> bool {
        keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_n(i).kind.is_keyword(kw))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::Unexpected {
            expected: expected.to_string(),
            found: token.kind.to_string(),
            offset: token.span.start,
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            depth: self.depth,
        }
    }

    /// Rewind to `checkpoint` and never try the same speculation there again
    fn abandon(&mut self, checkpoint: Checkpoint) {
        self.dead_ends.insert(checkpoint.pos);
        self.pos = checkpoint.pos;
        self.depth = checkpoint.depth;
    }

    /// Go one nesting level deeper. Callers restore the depth they saved.
    fn descend(&mut self) -> PResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_DEPTH,
                offset: self.peek().span.start,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn at_name(&self) -> bool {
        matches!(self.kind(), TokenKind::Ident(_) | TokenKind::QuotedIdent(_))
    }

    /// Any identifier, keywords included (labels, types, keys, aliases)
    fn name(&mut self, what: &str) -> PResult<String> {
        match self.kind() {
            TokenKind::Ident(s) | TokenKind::QuotedIdent(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn at_clause_start(&self) -> bool {
        CLAUSE_KEYWORDS.iter().any(|kw| self.at_keyword(kw))
    }

    // ---------------------------------------------------------------
    // Statements and clauses
    // ---------------------------------------------------------------

    fn statement(&mut self) -> PResult<Statement> {
        let base = self.depth;
        self.descend()?;
        let mut queries = vec![self.single_query()?];
        let mut union_all = Vec::new();
        while self.eat_keyword("UNION") {
            union_all.push(self.eat_keyword("ALL"));
            queries.push(self.single_query()?);
        }
        self.depth = base;
        Ok(Statement { queries, union_all })
    }

    fn single_query(&mut self) -> PResult<SingleQuery> {
        let mut clauses = Vec::new();
        while let Some(clause) = self.clause()? {
            clauses.push(clause);
        }
        if clauses.is_empty() {
            return Err(self.unexpected("a clause"));
        }
        Ok(SingleQuery { clauses })
    }

    fn clause(&mut self) -> PResult<Option<Clause>> {
        let TokenKind::Ident(word) = self.kind() else {
            return Ok(None);
        };
        let word = word.to_ascii_uppercase();

        let clause = match word.as_str() {
            "MATCH" => {
                self.advance();
                self.match_clause(false)?
            }
            "OPTIONAL" => {
                self.advance();
                self.expect_keyword("MATCH")?;
                self.match_clause(true)?
            }
            "UNWIND" => {
                self.advance();
                let expr = self.expr()?;
                self.expect_keyword("AS")?;
                let variable = self.name("variable")?;
                Clause::Unwind { expr, variable }
            }
            "WITH" => {
                self.advance();
                Clause::With(self.projection(true)?)
            }
            "RETURN" => {
                self.advance();
                Clause::Return(self.projection(false)?)
            }
            "CREATE" => {
                self.advance();
                Clause::Create(self.pattern()?)
            }
            "MERGE" => {
                self.advance();
                self.merge_clause()?
            }
            "SET" => {
                self.advance();
                Clause::Set(self.set_items()?)
            }
            "REMOVE" => {
                self.advance();
                Clause::Remove(self.remove_items()?)
            }
            "DETACH" => {
                self.advance();
                self.expect_keyword("DELETE")?;
                Clause::Delete {
                    detach: true,
                    exprs: self.expr_list()?,
                }
            }
            "DELETE" => {
                self.advance();
                Clause::Delete {
                    detach: false,
                    exprs: self.expr_list()?,
                }
            }
            "CALL" => {
                self.advance();
                if self.eat(&TokenKind::LBrace) {
                    let inner = self.statement()?;
                    self.expect(&TokenKind::RBrace, "'}'")?;
                    Clause::CallSubquery(Box::new(inner))
                } else {
                    Clause::Call(self.procedure_call()?)
                }
            }
            "FOREACH" => {
                self.advance();
                self.foreach_clause()?
            }
            "LOAD" => {
                self.advance();
                self.load_csv_clause()?
            }
            _ => return Ok(None),
        };
        Ok(Some(clause))
    }

    fn match_clause(&mut self, optional: bool) -> PResult<Clause> {
        let pattern = self.pattern()?;
        let where_clause = self.where_opt()?;
        Ok(Clause::Match {
            optional,
            pattern,
            where_clause,
        })
    }

    fn where_opt(&mut self) -> PResult<Option<Expr>> {
        if self.eat_keyword("WHERE") {
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    fn merge_clause(&mut self) -> PResult<Clause> {
        let part = self.pattern_part()?;
        let mut on_create = Vec::new();
        let mut on_match = Vec::new();
        loop {
            if self.at_keywords(&["ON", "CREATE"]) {
                self.advance();
                self.advance();
                self.expect_keyword("SET")?;
                on_create.extend(self.set_items()?);
            } else if self.at_keywords(&["ON", "MATCH"]) {
                self.advance();
                self.advance();
                self.expect_keyword("SET")?;
                on_match.extend(self.set_items()?);
            } else {
                break;
            }
        }
        Ok(Clause::Merge {
            part,
            on_create,
            on_match,
        })
    }

    fn projection(&mut self, is_with: bool) -> PResult<Projection> {
        let mut projection = Projection {
            distinct: self.eat_keyword("DISTINCT"),
            ..Default::default()
        };

        if self.eat(&TokenKind::Star) {
            projection.star = true;
            if self.eat(&TokenKind::Comma) {
                projection.items = self.projection_items()?;
            }
        } else {
            projection.items = self.projection_items()?;
        }

        if self.at_keywords(&["ORDER", "BY"]) {
            self.advance();
            self.advance();
            loop {
                let expr = self.expr()?;
                let descending = if self.eat_keyword("DESC") || self.eat_keyword("DESCENDING") {
                    true
                } else {
                    let _ = self.eat_keyword("ASC") || self.eat_keyword("ASCENDING");
                    false
                };
                projection.order_by.push(SortItem { expr, descending });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        if self.eat_keyword("SKIP") {
            projection.skip = Some(self.expr()?);
        }
        if self.eat_keyword("LIMIT") {
            projection.limit = Some(self.expr()?);
        }
        if is_with {
            projection.where_clause = self.where_opt()?;
        }
        Ok(projection)
    }

    fn projection_items(&mut self) -> PResult<Vec<ProjectionItem>> {
        let mut items = Vec::new();
        loop {
            let expr = self.expr()?;
            let alias = if self.eat_keyword("AS") {
                Some(self.name("alias")?)
            } else {
                None
            };
            items.push(ProjectionItem { expr, alias });
            if !self.eat(&TokenKind::Comma) {
                return Ok(items);
            }
        }
    }

    fn set_items(&mut self) -> PResult<Vec<SetItem>> {
        let mut items = vec![self.set_item()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.set_item()?);
        }
        Ok(items)
    }

    fn set_item(&mut self) -> PResult<SetItem> {
        if self.at_name() {
            let next = self.peek_n(1).kind.clone();
            match next {
                TokenKind::Colon => {
                    let variable = self.name("variable")?;
                    let labels = self.label_chain()?;
                    return Ok(SetItem::Labels { variable, labels });
                }
                TokenKind::Eq | TokenKind::PlusEq => {
                    let variable = self.name("variable")?;
                    let merge = self.advance().kind == TokenKind::PlusEq;
                    let value = self.expr()?;
                    return Ok(SetItem::Variable {
                        variable,
                        value,
                        merge,
                    });
                }
                _ => {}
            }
        }

        let target = self.property_target()?;
        self.expect(&TokenKind::Eq, "'='")?;
        let value = self.expr()?;
        Ok(SetItem::Property { target, value })
    }

    fn remove_items(&mut self) -> PResult<Vec<RemoveItem>> {
        let mut items = Vec::new();
        loop {
            if self.at_name() && self.peek_n(1).kind == TokenKind::Colon {
                let variable = self.name("variable")?;
                let labels = self.label_chain()?;
                items.push(RemoveItem::Labels { variable, labels });
            } else {
                items.push(RemoveItem::Property(self.property_target()?));
            }
            if !self.eat(&TokenKind::Comma) {
                return Ok(items);
            }
        }
    }

    /// `expr.key` as the target of SET or REMOVE
    fn property_target(&mut self) -> PResult<Expr> {
        let offset = self.peek().span.start;
        let target = self.postfix_expr()?;
        if matches!(target, Expr::Property { .. }) {
            Ok(target)
        } else {
            Err(ParseError::Unexpected {
                expected: "property expression".to_string(),
                found: "expression".to_string(),
                offset,
            })
        }
    }

    /// `:A:B` as used by SET, REMOVE and label predicates
    fn label_chain(&mut self) -> PResult<Vec<String>> {
        let mut labels = Vec::new();
        while self.eat(&TokenKind::Colon) {
            labels.push(self.name("label")?);
        }
        if labels.is_empty() {
            return Err(self.unexpected("':'"));
        }
        Ok(labels)
    }

    fn procedure_call(&mut self) -> PResult<ProcedureCall> {
        let name = self.dotted_name()?;
        let args = if self.eat(&TokenKind::LParen) {
            Some(self.expr_list_until(&TokenKind::RParen, "')'")?)
        } else {
            None
        };

        let mut call = ProcedureCall {
            name,
            args,
            yield_star: false,
            yields: Vec::new(),
            where_clause: None,
        };

        if self.eat_keyword("YIELD") {
            if self.eat(&TokenKind::Star) {
                call.yield_star = true;
            } else {
                loop {
                    let field = self.name("yield field")?;
                    let alias = if self.eat_keyword("AS") {
                        Some(self.name("alias")?)
                    } else {
                        None
                    };
                    call.yields.push(YieldItem { field, alias });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            call.where_clause = self.where_opt()?;
        }
        Ok(call)
    }

    fn dotted_name(&mut self) -> PResult<String> {
        let mut name = self.name("name")?;
        while self.at(&TokenKind::Dot) && self.peek_n(1).kind.is_name() {
            self.advance();
            name.push('.');
            name.push_str(&self.name("name")?);
        }
        Ok(name)
    }

    fn foreach_clause(&mut self) -> PResult<Clause> {
        self.expect(&TokenKind::LParen, "'('")?;
        let variable = self.name("variable")?;
        self.expect_keyword("IN")?;
        let list = self.expr()?;
        self.expect(&TokenKind::Pipe, "'|'")?;
        let base = self.depth;
        self.descend()?;
        let mut body = Vec::new();
        while let Some(clause) = self.clause()? {
            body.push(clause);
        }
        if body.is_empty() {
            return Err(self.unexpected("a clause"));
        }
        self.depth = base;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Clause::Foreach {
            variable,
            list,
            body,
        })
    }

    fn load_csv_clause(&mut self) -> PResult<Clause> {
        self.expect_keyword("CSV")?;
        let with_headers = if self.eat_keyword("WITH") {
            self.expect_keyword("HEADERS")?;
            true
        } else {
            false
        };
        self.expect_keyword("FROM")?;
        let source = self.expr()?;
        self.expect_keyword("AS")?;
        let variable = self.name("variable")?;
        let field_terminator = if self.eat_keyword("FIELDTERMINATOR") {
            match self.advance().kind {
                TokenKind::Str(s) => Some(s),
                _ => return Err(self.unexpected("string literal")),
            }
        } else {
            None
        };
        Ok(Clause::LoadCsv {
            with_headers,
            source,
            variable,
            field_terminator,
        })
    }

    // ---------------------------------------------------------------
    // Patterns
    // ---------------------------------------------------------------

    fn pattern(&mut self) -> PResult<Pattern> {
        let mut parts = vec![self.pattern_part()?];
        while self.eat(&TokenKind::Comma) {
            parts.push(self.pattern_part()?);
        }
        Ok(parts)
    }

    fn pattern_part(&mut self) -> PResult<PatternPart> {
        let variable = if self.at_name() && self.peek_n(1).kind == TokenKind::Eq {
            let v = self.name("path variable")?;
            self.advance();
            Some(v)
        } else {
            None
        };

        let kind = if self.peek_n(1).kind == TokenKind::LParen && self.at_keyword("shortestPath") {
            PathKind::ShortestPath
        } else if self.peek_n(1).kind == TokenKind::LParen && self.at_keyword("allShortestPaths") {
            PathKind::AllShortestPaths
        } else {
            PathKind::Plain
        };

        let element = if kind == PathKind::Plain {
            self.pattern_element()?
        } else {
            self.advance();
            self.advance();
            let element = self.pattern_element()?;
            self.expect(&TokenKind::RParen, "')'")?;
            element
        };

        Ok(PatternPart {
            variable,
            kind,
            element,
        })
    }

    fn pattern_element(&mut self) -> PResult<PatternElement> {
        let start = self.node_pattern()?;
        let mut chain = Vec::new();
        while self.at_relationship_start() {
            let rel = self.relationship_pattern()?;
            let node = self.node_pattern()?;
            chain.push((rel, node));
        }
        Ok(PatternElement { start, chain })
    }

    fn at_relationship_start(&self) -> bool {
        match self.kind() {
            TokenKind::Minus => true,
            TokenKind::Lt => self.peek_n(1).kind == TokenKind::Minus,
            _ => false,
        }
    }

    fn node_pattern(&mut self) -> PResult<NodePattern> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut node = NodePattern::default();

        if self.at_name() {
            node.variable = Some(self.name("variable")?);
        }

        if self.eat(&TokenKind::Colon) {
            node.labels.push(self.name("label")?);
            while matches!(
                self.kind(),
                TokenKind::Colon | TokenKind::Pipe | TokenKind::Amp
            ) {
                self.advance();
                self.eat(&TokenKind::Colon);
                node.labels.push(self.name("label")?);
            }
        }

        node.properties = self.pattern_properties()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(node)
    }

    fn pattern_properties(&mut self) -> PResult<Option<Expr>> {
        match self.kind() {
            TokenKind::LBrace => Ok(Some(self.map_literal()?)),
            TokenKind::Param(p) => {
                let p = p.clone();
                self.advance();
                Ok(Some(Expr::Parameter(p)))
            }
            _ => Ok(None),
        }
    }

    fn relationship_pattern(&mut self) -> PResult<RelationshipPattern> {
        let left = self.eat(&TokenKind::Lt);
        self.expect(&TokenKind::Minus, "'-'")?;

        let mut rel = RelationshipPattern {
            direction: RelDirection::Undirected,
            variable: None,
            types: Vec::new(),
            range: None,
            properties: None,
        };

        if self.eat(&TokenKind::LBracket) {
            if self.at_name() {
                rel.variable = Some(self.name("variable")?);
            }
            if self.eat(&TokenKind::Colon) {
                rel.types.push(self.name("relationship type")?);
                while self.eat(&TokenKind::Pipe) {
                    self.eat(&TokenKind::Colon);
                    rel.types.push(self.name("relationship type")?);
                }
            }
            if self.eat(&TokenKind::Star) {
                rel.range = Some(self.range_literal()?);
            }
            rel.properties = self.pattern_properties()?;
            self.expect(&TokenKind::RBracket, "']'")?;
        }

        self.expect(&TokenKind::Minus, "'-'")?;
        let right = self.eat(&TokenKind::Gt);

        rel.direction = match (left, right) {
            (true, false) => RelDirection::Left,
            (false, true) => RelDirection::Right,
            _ => RelDirection::Undirected,
        };
        Ok(rel)
    }

    fn range_literal(&mut self) -> PResult<RangeLiteral> {
        let min = self.integer_opt()?;
        if self.eat(&TokenKind::DotDot) {
            let max = self.integer_opt()?;
            Ok(RangeLiteral { min, max })
        } else {
            Ok(RangeLiteral { min, max: min })
        }
    }

    fn integer_opt(&mut self) -> PResult<Option<u64>> {
        let TokenKind::Number(text) = self.kind() else {
            return Ok(None);
        };
        match text.parse::<u64>() {
            Ok(n) => {
                self.advance();
                Ok(Some(n))
            }
            Err(_) => Err(self.unexpected("integer")),
        }
    }

    // ---------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------

    fn expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut exprs = vec![self.expr()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr_list_until(&mut self, close: &TokenKind, what: &str) -> PResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        if self.eat(close) {
            return Ok(exprs);
        }
        loop {
            exprs.push(self.expr()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close, what)?;
                return Ok(exprs);
            }
        }
    }

    pub(crate) fn expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        self.descend()?;
        let expr = self.or_expr()?;
        self.depth = base;
        Ok(expr)
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.xor_expr()?;
        while self.eat_keyword("OR") {
            self.descend()?;
            let right = self.xor_expr()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn xor_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.and_expr()?;
        while self.eat_keyword("XOR") {
            self.descend()?;
            let right = self.and_expr()?;
            left = binary(BinaryOp::Xor, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.not_expr()?;
        while self.eat_keyword("AND") {
            self.descend()?;
            let right = self.not_expr()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn not_expr(&mut self) -> PResult<Expr> {
        if self.eat_keyword("NOT") {
            let base = self.depth;
            self.descend()?;
            let expr = self.not_expr()?;
            self.depth = base;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.comparison_expr()
    }

    fn comparison_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.predicate_expr()?;
        loop {
            let op = match self.kind() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Neq => BinaryOp::Neq,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::RegexMatch => BinaryOp::RegexMatch,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.descend()?;
            let right = self.predicate_expr()?;
            left = binary(op, left, right);
        }
    }

    /// String, list and null predicates
    fn predicate_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.additive_expr()?;
        loop {
            let op = if self.at_keywords(&["STARTS", "WITH"]) {
                self.advance();
                self.advance();
                BinaryOp::StartsWith
            } else if self.at_keywords(&["ENDS", "WITH"]) {
                self.advance();
                self.advance();
                BinaryOp::EndsWith
            } else if self.eat_keyword("CONTAINS") {
                BinaryOp::Contains
            } else if self.eat_keyword("IN") {
                BinaryOp::In
            } else if self.eat_keyword("IS") {
                let negated = self.eat_keyword("NOT");
                self.expect_keyword("NULL")?;
                self.descend()?;
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                };
                continue;
            } else {
                self.depth = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.additive_expr()?;
            left = binary(op, left, right);
        }
    }

    fn additive_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.descend()?;
            let right = self.multiplicative_expr()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.power_expr()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.descend()?;
            let right = self.power_expr()?;
            left = binary(op, left, right);
        }
    }

    fn power_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut left = self.unary_expr()?;
        while self.eat(&TokenKind::Caret) {
            self.descend()?;
            let right = self.unary_expr()?;
            left = binary(BinaryOp::Pow, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn unary_expr(&mut self) -> PResult<Expr> {
        let op = match self.kind() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.postfix_expr(),
        };
        self.advance();
        let base = self.depth;
        self.descend()?;
        let expr = self.unary_expr()?;
        self.depth = base;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn postfix_expr(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let mut expr = self.atom()?;
        loop {
            if matches!(
                self.kind(),
                TokenKind::Dot | TokenKind::LBracket | TokenKind::Colon
            ) {
                self.descend()?;
            }
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let key = self.name("property key")?;
                    expr = Expr::Property {
                        target: Box::new(expr),
                        key,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    expr = self.index_or_slice(expr)?;
                }
                TokenKind::Colon => {
                    let labels = self.label_chain()?;
                    expr = Expr::HasLabels {
                        target: Box::new(expr),
                        labels,
                    };
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn index_or_slice(&mut self, target: Expr) -> PResult<Expr> {
        let target = Box::new(target);
        if self.eat(&TokenKind::DotDot) {
            let to = self.slice_bound()?;
            self.expect(&TokenKind::RBracket, "']'")?;
            return Ok(Expr::Slice {
                target,
                from: None,
                to,
            });
        }

        let first = self.expr()?;
        if self.eat(&TokenKind::DotDot) {
            let to = self.slice_bound()?;
            self.expect(&TokenKind::RBracket, "']'")?;
            return Ok(Expr::Slice {
                target,
                from: Some(Box::new(first)),
                to,
            });
        }

        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(Expr::Index {
            target,
            index: Box::new(first),
        })
    }

    fn slice_bound(&mut self) -> PResult<Option<Box<Expr>>> {
        if self.at(&TokenKind::RBracket) {
            Ok(None)
        } else {
            Ok(Some(Box::new(self.expr()?)))
        }
    }

    fn atom(&mut self) -> PResult<Expr> {
        match self.kind().clone() {
            TokenKind::Number(text) => {
                self.advance();
                Ok(Expr::Literal(number_literal(text)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Param(p) => {
                self.advance();
                Ok(Expr::Parameter(p))
            }
            TokenKind::LBracket | TokenKind::LBrace | TokenKind::LParen => self.bracketed_atom(),
            TokenKind::QuotedIdent(name) => {
                self.advance();
                self.variable_or_projection(name)
            }
            TokenKind::Ident(word) => self.word_atom(&word),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn word_atom(&mut self, word: &str) -> PResult<Expr> {
        let next = self.peek_n(1).kind.clone();
        let upper = word.to_ascii_uppercase();

        match upper.as_str() {
            "TRUE" => {
                self.advance();
                return Ok(Expr::Literal(Literal::Boolean(true)));
            }
            "FALSE" => {
                self.advance();
                return Ok(Expr::Literal(Literal::Boolean(false)));
            }
            "NULL" => {
                self.advance();
                return Ok(Expr::Literal(Literal::Null));
            }
            "CASE" => return self.case_expr(),
            "COUNT"
                if next == TokenKind::LParen
                    && self.peek_n(2).kind == TokenKind::Star
                    && self.peek_n(3).kind == TokenKind::RParen =>
            {
                for _ in 0..4 {
                    self.advance();
                }
                return Ok(Expr::CountStar);
            }
            "EXISTS" | "COUNT" | "COLLECT" if next == TokenKind::LBrace => {
                let kind = match upper.as_str() {
                    "EXISTS" => SubqueryKind::Exists,
                    "COUNT" => SubqueryKind::Count,
                    _ => SubqueryKind::Collect,
                };
                return self.subquery_expr(kind);
            }
            "ALL" | "ANY" | "NONE" | "SINGLE"
                if next == TokenKind::LParen
                    && self.peek_n(2).kind.is_name()
                    && self.peek_n(3).kind.is_keyword("IN") =>
            {
                let quantifier = match upper.as_str() {
                    "ALL" => Quantifier::All,
                    "ANY" => Quantifier::Any,
                    "NONE" => Quantifier::None,
                    _ => Quantifier::Single,
                };
                return self.quantified_expr(quantifier);
            }
            _ => {}
        }

        if self.at_function_call() {
            return self.function_call();
        }

        if RESERVED.contains(&upper.as_str()) {
            return Err(self.unexpected("expression"));
        }

        self.advance();
        self.variable_or_projection(word.to_string())
    }

    fn variable_or_projection(&mut self, variable: String) -> PResult<Expr> {
        if self.at(&TokenKind::LBrace) {
            self.map_projection(variable)
        } else {
            Ok(Expr::Variable(variable))
        }
    }

    /// `name(` or `ns.name(`
    fn at_function_call(&self) -> bool {
        let mut i = 0;
        loop {
            if !matches!(self.peek_n(i).kind, TokenKind::Ident(_)) {
                return false;
            }
            match self.peek_n(i + 1).kind {
                TokenKind::LParen => return true,
                TokenKind::Dot => i += 2,
                _ => return false,
            }
        }
    }

    fn function_call(&mut self) -> PResult<Expr> {
        let name = self.dotted_name()?;
        self.expect(&TokenKind::LParen, "'('")?;
        let distinct = self.eat_keyword("DISTINCT");
        let args = self.expr_list_until(&TokenKind::RParen, "')'")?;
        Ok(Expr::FunctionCall {
            name,
            distinct,
            args,
        })
    }

    fn case_expr(&mut self) -> PResult<Expr> {
        self.expect_keyword("CASE")?;
        let subject = if self.at_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.expr()?))
        };

        let mut alternatives = Vec::new();
        while self.eat_keyword("WHEN") {
            let when = self.expr()?;
            self.expect_keyword("THEN")?;
            let then = self.expr()?;
            alternatives.push((when, then));
        }
        if alternatives.is_empty() {
            return Err(self.unexpected("WHEN"));
        }

        let default = if self.eat_keyword("ELSE") {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect_keyword("END")?;

        Ok(Expr::Case {
            subject,
            alternatives,
            default,
        })
    }

    fn quantified_expr(&mut self, quantifier: Quantifier) -> PResult<Expr> {
        self.advance();
        self.expect(&TokenKind::LParen, "'('")?;
        let variable = self.name("variable")?;
        self.expect_keyword("IN")?;
        let list = self.expr()?;
        let filter = self.where_opt()?.map(Box::new);
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::Quantified {
            quantifier,
            variable,
            list: Box::new(list),
            filter,
        })
    }

    fn subquery_expr(&mut self, kind: SubqueryKind) -> PResult<Expr> {
        self.advance();
        self.expect(&TokenKind::LBrace, "'{'")?;
        let body = if self.at_clause_start() {
            SubqueryBody::Query(Box::new(self.statement()?))
        } else {
            let pattern = self.pattern()?;
            let where_clause = self.where_opt()?;
            SubqueryBody::Pattern {
                pattern,
                where_clause,
            }
        };
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Expr::Subquery {
            kind,
            body: Box::new(body),
        })
    }

    /// Each bracket level recurses through the whole precedence ladder, so
    /// it counts one extra level on top of the expression it holds
    fn bracketed_atom(&mut self) -> PResult<Expr> {
        let base = self.depth;
        self.descend()?;
        let expr = match self.kind() {
            TokenKind::LBracket => self.bracket_atom()?,
            TokenKind::LBrace => self.map_literal()?,
            _ => self.paren_atom()?,
        };
        self.depth = base;
        Ok(expr)
    }

    /// `[` opens a list comprehension, a pattern comprehension or a list
    fn bracket_atom(&mut self) -> PResult<Expr> {
        if self.peek_n(1).kind.is_name() && self.peek_n(2).kind.is_keyword("IN") {
            return self.list_comprehension();
        }

        let maybe_pattern = self.peek_n(1).kind == TokenKind::LParen
            || (self.peek_n(1).kind.is_name() && self.peek_n(2).kind == TokenKind::Eq);
        if maybe_pattern && !self.dead_ends.contains(&self.pos) {
            let checkpoint = self.checkpoint();
            match self.pattern_comprehension() {
                Ok(expr) => return Ok(expr),
                Err(err @ ParseError::TooDeep { .. }) => return Err(err),
                Err(_) => self.abandon(checkpoint),
            }
        }

        self.advance();
        let items = self.expr_list_until(&TokenKind::RBracket, "']'")?;
        Ok(Expr::List(items))
    }

    fn list_comprehension(&mut self) -> PResult<Expr> {
        self.expect(&TokenKind::LBracket, "'['")?;
        let variable = self.name("variable")?;
        self.expect_keyword("IN")?;
        let list = self.expr()?;
        let filter = self.where_opt()?.map(Box::new);
        let map = if self.eat(&TokenKind::Pipe) {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(Expr::ListComprehension {
            variable,
            list: Box::new(list),
            filter,
            map,
        })
    }

    fn pattern_comprehension(&mut self) -> PResult<Expr> {
        self.expect(&TokenKind::LBracket, "'['")?;
        let variable = if self.at_name() {
            let v = self.name("path variable")?;
            self.expect(&TokenKind::Eq, "'='")?;
            Some(v)
        } else {
            None
        };
        let pattern = self.pattern_element()?;
        if pattern.chain.is_empty() {
            return Err(self.unexpected("relationship pattern"));
        }
        let filter = self.where_opt()?.map(Box::new);
        self.expect(&TokenKind::Pipe, "'|'")?;
        let map = self.expr()?;
        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(Expr::PatternComprehension {
            variable,
            pattern: Box::new(pattern),
            filter,
            map: Box::new(map),
        })
    }

    /// `(` opens a pattern predicate or a parenthesised expression
    fn paren_atom(&mut self) -> PResult<Expr> {
        if !self.dead_ends.contains(&self.pos) {
            let checkpoint = self.checkpoint();
            match self.pattern_element() {
                Ok(element) if !element.chain.is_empty() => {
                    return Ok(Expr::PatternPredicate(Box::new(element)));
                }
                Err(err @ ParseError::TooDeep { .. }) => return Err(err),
                _ => self.abandon(checkpoint),
            }
        }

        self.expect(&TokenKind::LParen, "'('")?;
        let expr = self.expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(expr)
    }

    fn map_literal(&mut self) -> PResult<Expr> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut entries = Vec::new();
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::Map(entries));
        }
        loop {
            let key = self.name("map key")?;
            self.expect(&TokenKind::Colon, "':'")?;
            let value = self.expr()?;
            entries.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace, "'}'")?;
                return Ok(Expr::Map(entries));
            }
        }
    }

    fn map_projection(&mut self, variable: String) -> PResult<Expr> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut items = Vec::new();
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::MapProjection { variable, items });
        }
        loop {
            if self.eat(&TokenKind::Dot) {
                if self.eat(&TokenKind::Star) {
                    items.push(MapProjectionItem::AllProperties);
                } else {
                    items.push(MapProjectionItem::Property(self.name("property key")?));
                }
            } else if self.peek_n(1).kind == TokenKind::Colon {
                let key = self.name("map key")?;
                self.advance();
                items.push(MapProjectionItem::Literal(key, self.expr()?));
            } else {
                items.push(MapProjectionItem::Variable(self.name("variable")?));
            }

            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBrace, "'}'")?;
                return Ok(Expr::MapProjection { variable, items });
            }
        }
    }
}

impl TokenKind {
    fn is_name(&self) -> bool {
        matches!(self, TokenKind::Ident(_) | TokenKind::QuotedIdent(_))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn number_literal(text: String) -> Literal {
    let is_hex = text.starts_with("0x") || text.starts_with("0X");
    if !is_hex && text.contains(['.', 'e', 'E']) {
        Literal::Float(text)
    } else {
        Literal::Integer(text)
    }
}
