//! Lexer and parser for the Source Language.
//!
//! This crate turns source text into positioned syntax trees: a logos
//! lexer with automatic semicolon insertion, and a recursive-descent
//! parser covering the full surface grammar — declarations with
//! receivers and type parameters, composite literals, three-index
//! slices, type assertions and switches, `range` clauses, constraint
//! unions and `~T` terms. Types parse through the same expression
//! machinery as values, so a consumer can treat a type name in value
//! position uniformly.
//!
//! The interpreter core (`argus`) consumes only the data shapes defined
//! here; no evaluation logic lives in this crate.

pub mod ast;
mod error;
mod lexer;
mod parser;
mod pos;
mod token;

pub use crate::{
    error::SyntaxError,
    parser::{parse_expr, parse_file},
    pos::Pos,
};
