// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cypher abstract syntax tree.
//!
//! The tree keeps every name exactly as written (labels, relationship
//! types, property keys, variables). It is shaped for inspection, not for
//! evaluation: literals stay textual and nothing is resolved.

/// A complete statement: one or more single queries joined by `UNION`
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub queries: Vec<SingleQuery>,
    /// One entry per `UNION` keyword; `true` for `UNION ALL`
    pub union_all: Vec<bool>,
}

/// A clause sequence without `UNION`
#[derive(Debug, Clone, PartialEq)]
pub struct SingleQuery {
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match {
        optional: bool,
        pattern: Pattern,
        where_clause: Option<Expr>,
    },
    Unwind {
        expr: Expr,
        variable: String,
    },
    With(Projection),
    Return(Projection),
    Create(Pattern),
    Merge {
        part: PatternPart,
        on_create: Vec<SetItem>,
        on_match: Vec<SetItem>,
    },
    Set(Vec<SetItem>),
    Remove(Vec<RemoveItem>),
    Delete {
        detach: bool,
        exprs: Vec<Expr>,
    },
    Call(ProcedureCall),
    CallSubquery(Box<Statement>),
    Foreach {
        variable: String,
        list: Expr,
        body: Vec<Clause>,
    },
    LoadCsv {
        with_headers: bool,
        source: Expr,
        variable: String,
        field_terminator: Option<String>,
    },
}

impl Clause {
    /// Clause keyword for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Clause::Match { optional: true, .. } => "OPTIONAL MATCH",
            Clause::Match { .. } => "MATCH",
            Clause::Unwind { .. } => "UNWIND",
            Clause::With(_) => "WITH",
            Clause::Return(_) => "RETURN",
            Clause::Create(_) => "CREATE",
            Clause::Merge { .. } => "MERGE",
            Clause::Set(_) => "SET",
            Clause::Remove(_) => "REMOVE",
            Clause::Delete { detach: true, .. } => "DETACH DELETE",
            Clause::Delete { .. } => "DELETE",
            Clause::Call(_) | Clause::CallSubquery(_) => "CALL",
            Clause::Foreach { .. } => "FOREACH",
            Clause::LoadCsv { .. } => "LOAD CSV",
        }
    }
}

/// Body of `WITH` and `RETURN`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub distinct: bool,
    /// `*` leading the item list
    pub star: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<SortItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
    /// Only `WITH` carries a `WHERE`
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    /// Dotted procedure name, e.g. `db.labels`
    pub name: String,
    /// `None` for the argument-less form without parentheses
    pub args: Option<Vec<Expr>>,
    pub yield_star: bool,
    pub yields: Vec<YieldItem>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YieldItem {
    pub field: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    /// `n.prop = expr`
    Property { target: Expr, value: Expr },
    /// `n = map` or `n += map`
    Variable {
        variable: String,
        value: Expr,
        merge: bool,
    },
    /// `n:Label:Other`
    Labels {
        variable: String,
        labels: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveItem {
    Property(Expr),
    Labels {
        variable: String,
        labels: Vec<String>,
    },
}

/// Comma-separated pattern parts
pub type Pattern = Vec<PatternPart>;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternPart {
    /// Path variable in `p = (...)`
    pub variable: Option<String>,
    pub kind: PathKind,
    pub element: PatternElement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Plain,
    ShortestPath,
    AllShortestPaths,
}

/// A node followed by zero or more relationship/node hops
#[derive(Debug, Clone, PartialEq)]
pub struct PatternElement {
    pub start: NodePattern,
    pub chain: Vec<(RelationshipPattern, NodePattern)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelDirection {
    /// `<-[]-`
    Left,
    /// `-[]->`
    Right,
    /// `-[]-` or `<-[]->`
    Undirected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub direction: RelDirection,
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub range: Option<RangeLiteral>,
    pub properties: Option<Expr>,
}

/// Variable-length bounds in `*min..max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeLiteral {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(String),
    Float(String),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    Xor,
    And,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    RegexMatch,
    StartsWith,
    EndsWith,
    Contains,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Any,
    None,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryKind {
    Exists,
    Count,
    Collect,
}

/// Body of `EXISTS { ... }` and friends
#[derive(Debug, Clone, PartialEq)]
pub enum SubqueryBody {
    Pattern {
        pattern: Pattern,
        where_clause: Option<Expr>,
    },
    Query(Box<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapProjectionItem {
    /// `.key`
    Property(String),
    /// `.*`
    AllProperties,
    /// `key: expr`
    Literal(String, Expr),
    /// bare `variable`
    Variable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Parameter(String),
    Variable(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Property {
        target: Box<Expr>,
        key: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
    },
    /// Label predicate `n:Label`
    HasLabels {
        target: Box<Expr>,
        labels: Vec<String>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    FunctionCall {
        name: String,
        distinct: bool,
        args: Vec<Expr>,
    },
    CountStar,
    Case {
        subject: Option<Box<Expr>>,
        alternatives: Vec<(Expr, Expr)>,
        default: Option<Box<Expr>>,
    },
    ListComprehension {
        variable: String,
        list: Box<Expr>,
        filter: Option<Box<Expr>>,
        map: Option<Box<Expr>>,
    },
    PatternComprehension {
        variable: Option<String>,
        pattern: Box<PatternElement>,
        filter: Option<Box<Expr>>,
        map: Box<Expr>,
    },
    Quantified {
        quantifier: Quantifier,
        variable: String,
        list: Box<Expr>,
        filter: Option<Box<Expr>>,
    },
    /// Pattern used as a predicate, e.g. `WHERE (a)-[:KNOWS]->()`
    PatternPredicate(Box<PatternElement>),
    Subquery {
        kind: SubqueryKind,
        body: Box<SubqueryBody>,
    },
    MapProjection {
        variable: String,
        items: Vec<MapProjectionItem>,
    },
}
