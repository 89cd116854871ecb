//! Token-stream macro expansion",
//! §3 "macro" declarations): runs between [`home_lexer::Lexer::tokenize`]
//! and [`home_parser::Parser::parse_module`] so nothing downstream (the
//! type checker, borrow checker, every optimizer pass, codegen) needs to
//! know macros exist by the time it sees a token stream — the expanded
//! stream is ordinary code.
//!
//! Declarative and non-hygienic: `macro name(a, b) { body }` declares a
//! template; `name!(x, y)` splices `body` into the stream with every
//! occurrence of `a`/`b` replaced by `x`/`y`'s token sequence. There is no
//! token-tree matching beyond balanced-delimiter counting and no repeated
//! (`$(...)*`-style) bindings, matching the simple, single-shape argument
//! lists a macro declaration's parameters can take.

use std::collections::HashMap;

use home_base::{Span, Symbol};
use home_lexer::{Token, TokenKind};

use crate::error::{MacroError, MacroErrorKind};

const MAX_EXPANSION_PASSES: usize = 64;

struct MacroDef {
    params: Vec<Symbol>,
    body: Vec<Token>,
}

/// Expands every macro declaration and invocation in `tokens`, returning
/// the expanded stream plus any errors encountered. Always returns a
/// stream the parser can still attempt to parse: a malformed macro
/// declaration or invocation is reported and its tokens are dropped
/// rather than aborting the whole file.
pub fn expand_macros(tokens: Vec<Token>) -> (Vec<Token>, Vec<MacroError>) {
    let mut errors = Vec::new();
    let (mut tokens, defs) = collect_definitions(tokens, &mut errors);

    if defs.is_empty() {
        return (tokens, errors);
    }

    for _ in 0..MAX_EXPANSION_PASSES {
        let (expanded, changed) = expand_one_pass(&tokens, &defs, &mut errors);
        tokens = expanded;
        if !changed {
            return (tokens, errors);
        }
    }

    let last_span = tokens.last().map(|t| t.span).unwrap_or(Span::default());
    errors.push(MacroError::new(MacroErrorKind::RecursionLimitExceeded, last_span));
    (tokens, errors)
}

/// Scans `tokens` for `macro NAME(params) { body }` declarations,
/// registers each as a [`MacroDef`], and returns the stream with those
/// declarations removed (they carry no meaning past expansion time).
fn collect_definitions(tokens: Vec<Token>, errors: &mut Vec<MacroError>) -> (Vec<Token>, HashMap<Symbol, MacroDef>) {
    let mut defs = HashMap::new();
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if tokens[i].kind != TokenKind::KwMacro {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        }

        let decl_span = tokens[i].span;
        let Some(Token { kind: TokenKind::Ident(name), .. }) = tokens.get(i + 1) else {
            errors.push(MacroError::new(MacroErrorKind::ExpectedName, decl_span));
            i += 1;
            continue;
        };
        let name = *name;

        if !matches!(tokens.get(i + 2).map(|t| &t.kind), Some(TokenKind::LParen)) {
            errors.push(MacroError::new(MacroErrorKind::ExpectedParamList, decl_span));
            i += 2;
            continue;
        }

        let Some((params, after_params)) = parse_param_list(&tokens, i + 3, errors) else {
            i = tokens.len();
            continue;
        };

        if !matches!(tokens.get(after_params).map(|t| &t.kind), Some(TokenKind::LBrace)) {
            errors.push(MacroError::new(MacroErrorKind::ExpectedBody, decl_span));
            i = after_params;
            continue;
        }

        let Some((body, after_body)) = extract_balanced(&tokens, after_params + 1, TokenKind::LBrace, TokenKind::RBrace) else {
            errors.push(MacroError::new(MacroErrorKind::UnterminatedBody, decl_span));
            i = tokens.len();
            continue;
        };

        defs.insert(name, MacroDef { params, body });
        i = after_body;
    }

    (out, defs)
}

/// Parses a comma-separated parameter list starting just past the `(`,
/// returning the parameter symbols and the index just past the `)`.
fn parse_param_list(tokens: &[Token], mut i: usize, errors: &mut Vec<MacroError>) -> Option<(Vec<Symbol>, usize)> {
    let mut params = Vec::new();
    if matches!(tokens.get(i).map(|t| &t.kind), Some(TokenKind::RParen)) {
        return Some((params, i + 1));
    }
    loop {
        match tokens.get(i).map(|t| &t.kind) {
            Some(TokenKind::Ident(sym)) => {
                params.push(*sym);
                i += 1;
            }
            other => {
                let span = tokens.get(i).map(|t| t.span).unwrap_or(Span::default());
                errors.push(MacroError::new(MacroErrorKind::ExpectedParamName, span));
                let _ = other;
                return None;
            }
        }
        match tokens.get(i).map(|t| &t.kind) {
            Some(TokenKind::Comma) => i += 1,
            Some(TokenKind::RParen) => return Some((params, i + 1)),
            _ => {
                let span = tokens.get(i).map(|t| t.span).unwrap_or(Span::default());
                errors.push(MacroError::new(MacroErrorKind::ExpectedParamList, span));
                return None;
            }
        }
    }
}

/// Given `open`/`close` already balanced at depth 1 (the opener at
/// `start - 1` has already been consumed), returns the tokens strictly
/// between the matching pair and the index just past the closer.
fn extract_balanced(tokens: &[Token], start: usize, open: TokenKind, close: TokenKind) -> Option<(Vec<Token>, usize)> {
    let mut depth = 1usize;
    let mut i = start;
    let mut body = Vec::new();
    while i < tokens.len() {
        if tokens[i].kind == open {
            depth += 1;
        } else if tokens[i].kind == close {
            depth -= 1;
            if depth == 0 {
                return Some((body, i + 1));
            }
        }
        body.push(tokens[i].clone());
        i += 1;
    }
    None
}

/// Splits the tokens strictly between a balanced `(...)` pair (`start`
/// points just past the `(`) into top-level comma-separated argument
/// slices, returning the slices and the index just past the `)`.
fn split_arguments(tokens: &[Token], start: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut depth = 0i32;
    let mut i = start;
    let mut args = Vec::new();
    let mut current = Vec::new();

    if matches!(tokens.get(start).map(|t| &t.kind), Some(TokenKind::RParen)) {
        return Some((Vec::new(), start + 1));
    }

    while i < tokens.len() {
        match &tokens[i].kind {
            TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => {
                depth += 1;
                current.push(tokens[i].clone());
            }
            TokenKind::RParen if depth == 0 => {
                args.push(current);
                return Some((args, i + 1));
            }
            TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                depth -= 1;
                current.push(tokens[i].clone());
            }
            TokenKind::Comma if depth == 0 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(tokens[i].clone()),
        }
        i += 1;
    }
    None
}

/// Runs one left-to-right scan, replacing every well-formed
/// `name!(args)` invocation of a known macro with its substituted body.
/// Returns whether any invocation was expanded, so the caller can detect
/// a fixed point.
fn expand_one_pass(tokens: &[Token], defs: &HashMap<Symbol, MacroDef>, errors: &mut Vec<MacroError>) -> (Vec<Token>, bool) {
    let mut out = Vec::with_capacity(tokens.len());
    let mut changed = false;
    let mut i = 0;

    while i < tokens.len() {
        let is_invocation = matches!(&tokens[i].kind, TokenKind::Ident(sym) if defs.contains_key(sym))
            && matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::Bang))
            && matches!(tokens.get(i + 2).map(|t| &t.kind), Some(TokenKind::LParen));

        if !is_invocation {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        }

        let TokenKind::Ident(name) = &tokens[i].kind else { unreachable!() };
        let name = *name;
        let invocation_span = tokens[i].span;
        let def = &defs[&name];

        let Some((args, after_args)) = split_arguments(tokens, i + 3) else {
            errors.push(MacroError::new(MacroErrorKind::UnterminatedInvocation, invocation_span));
            out.push(tokens[i].clone());
            i += 1;
            continue;
        };

        if args.len() != def.params.len() {
            errors.push(MacroError::new(MacroErrorKind::ArityMismatch(String::new(), args.len(), def.params.len()), invocation_span));
            i = after_args;
            changed = true;
            continue;
        }

        let bindings: HashMap<Symbol, &[Token]> = def.params.iter().copied().zip(args.iter().map(Vec::as_slice)).collect();

        for token in &def.body {
            match &token.kind {
                TokenKind::Ident(sym) if bindings.contains_key(sym) => {
                    for arg_token in bindings[sym] {
                        out.push(Token::new(arg_token.kind.clone(), invocation_span));
                    }
                }
                kind => out.push(Token::new(kind.clone(), invocation_span)),
            }
        }

        i = after_args;
        changed = true;
    }

    (out, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_base::Interner;
    use home_lexer::Lexer;

    fn lex(src: &str) -> Vec<Token> {
        let mut interner = Interner::new();
        let (tokens, errors) = Lexer::new(src, &mut interner).tokenize();
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    }

    #[test]
    fn a_file_with_no_macros_passes_through_unchanged() {
        let tokens = lex("fn main() -> i32 { return 1; }");
        let (expanded, errors) = expand_macros(tokens.clone());
        assert!(errors.is_empty());
        assert_eq!(kinds(&expanded), kinds(&tokens));
    }

    #[test]
    fn a_simple_invocation_is_spliced_in_with_arguments_substituted() {
        let tokens = lex("macro double(x) { x + x } fn main() -> i32 { return double!(21); }");
        let (expanded, errors) = expand_macros(tokens);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        // The macro declaration itself is gone; `double!(21)` became `21 + 21`.
        assert!(!expanded.iter().any(|t| t.kind == TokenKind::KwMacro));
        let int_count = expanded.iter().filter(|t| matches!(t.kind, TokenKind::Int { .. })).count();
        assert_eq!(int_count, 2);
        let plus_count = expanded.iter().filter(|t| t.kind == TokenKind::Plus).count();
        assert_eq!(plus_count, 1);
    }

    #[test]
    fn an_arity_mismatch_is_reported_and_the_invocation_is_dropped() {
        let tokens = lex("macro add(a, b) { a + b } fn main() -> i32 { return add!(1); }");
        let (_expanded, errors) = expand_macros(tokens);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, MacroErrorKind::ArityMismatch(_, 1, 2)));
    }

    #[test]
    fn nested_invocations_expand_to_a_fixed_point() {
        let tokens = lex("macro inc(x) { x + 1 } macro twice(x) { inc!(inc!(x)) } fn main() -> i32 { return twice!(0); }");
        let (expanded, errors) = expand_macros(tokens);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let plus_count = expanded.iter().filter(|t| t.kind == TokenKind::Plus).count();
        assert_eq!(plus_count, 2);
        assert!(!expanded.iter().any(|t| matches!(&t.kind, TokenKind::Ident(_))));
    }

    #[test]
    fn an_unknown_bang_call_is_left_alone() {
        let tokens = lex("fn main() -> i32 { return not_a_macro!(1); }");
        let (expanded, errors) = expand_macros(tokens.clone());
        assert!(errors.is_empty());
        assert_eq!(kinds(&expanded), kinds(&tokens));
    }

    #[test]
    fn an_unterminated_macro_body_is_reported() {
        let tokens = lex("macro broken(x) { x + 1");
        let (_expanded, errors) = expand_macros(tokens);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, MacroErrorKind::UnterminatedBody));
    }
}
