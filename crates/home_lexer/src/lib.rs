//! # home-lexer
//!
//! Converts `home` source text into a token stream. See [`Lexer::tokenize`].

pub mod error;
pub mod lexer;
pub mod token;

pub use error::{LexError, LexErrorKind};
pub use lexer::Lexer;
pub use token::{NumberBase, NumberSuffix, Token, TokenKind};
