//! # home-parser
//!
//! Builds an arena-allocated AST from a [`home_lexer::Token`] stream using a
//! Pratt expression parser and recursive-descent statement/item parsing.
//! See [`Parser::parse_module`].

pub mod arena;
pub mod ast;
pub mod error;
pub mod parser;

pub use arena::Arena;
pub use error::{ParseError, ParseErrorKind};
pub use parser::Parser;
