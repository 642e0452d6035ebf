// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cypher front end: lexer, AST, recursive-descent parser and visitor.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod visit;

pub use ast::Statement;
pub use lexer::LexError;
pub use parser::{parse, ParseError};
pub use visit::Visitor;
