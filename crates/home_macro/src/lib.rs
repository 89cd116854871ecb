//! # home-macro
//!
//! Declarative macro expansion"), implemented as a rewrite over the *token* stream rather
//! than a dedicated AST node: [`expand::expand_macros`] runs right after
//! [`home_lexer::Lexer::tokenize`] and before [`home_parser::Parser::new`],
//! so a macro invocation is ordinary syntax by the time anything
//! downstream — the parser, type checker, borrow checker, optimizer,
//! codegen — ever sees it. See DESIGN.md for why this crate sits at the
//! token layer instead of adding an `ItemKind::Macro` the other five
//! passes would each need to learn about.

pub mod error;
pub mod expand;

pub use error::{MacroError, MacroErrorKind};
pub use expand::expand_macros;
