//! Source text to token stream.
//!
//! The lexer is eager: [`Lexer::tokenize`] consumes the whole source and
//! returns a `Vec<Token>` plus any [`LexError`]s encountered, rather than a
//! lazy iterator, so the parser can freely look ahead.

use crate::error::{LexError, LexErrorKind};
use crate::token::{keyword_kind, NumberBase, NumberSuffix, Token, TokenKind};
use home_base::{Interner, Span};

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    interner: &'a mut Interner,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, interner: &'a mut Interner) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            interner,
            errors: Vec::new(),
        }
    }

    /// Tokenizes the entire source. Recoverable errors are collected rather
    /// than aborting the scan, so later tokens are still produced for a
    /// best-effort parse.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia(&mut tokens);
            if self.pos >= self.bytes.len() {
                tokens.push(Token::new(TokenKind::Eof, Span::new(self.pos, self.pos)));
                break;
            }
            let token = self.next_token();
            tokens.push(token);
        }
        (tokens, self.errors)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn bump_if(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skips whitespace and comments; doc comments (`///`) are emitted as
    /// [`TokenKind::DocComment`] trivia tokens rather than discarded.
    fn skip_trivia(&mut self, tokens: &mut Vec<Token>) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    if self.peek_at(2) == Some(b'/') && self.peek_at(3) != Some(b'/') {
                        let start = self.pos;
                        self.pos += 3;
                        let text_start = self.pos;
                        while !matches!(self.peek(), None | Some(b'\n')) {
                            self.pos += 1;
                        }
                        let text = self.source[text_start..self.pos].trim();
                        let sym = self.interner.intern(text);
                        tokens.push(Token::new(TokenKind::DocComment(sym), Span::new(start, self.pos)));
                    } else {
                        while !matches!(self.peek(), None | Some(b'\n')) {
                            self.pos += 1;
                        }
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut depth = 1;
                    while depth > 0 {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                depth -= 1;
                            }
                            (Some(b'/'), Some(b'*')) => {
                                self.pos += 2;
                                depth += 1;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                self.errors.push(LexError::new(
                                    LexErrorKind::UnterminatedBlockComment,
                                    Span::new(start, self.pos),
                                ));
                                return;
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.advance().expect("checked non-empty by caller");

        let kind = match b {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'@' => TokenKind::At,
            b'?' => TokenKind::Question,
            b':' => {
                if self.bump_if(b':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            b'.' => {
                if self.bump_if(b'.') {
                    if self.bump_if(b'=') {
                        TokenKind::DotDotEq
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            b'+' => {
                if self.bump_if(b'=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.bump_if(b'>') {
                    TokenKind::Arrow
                } else if self.bump_if(b'=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.bump_if(b'=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.bump_if(b'=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => TokenKind::Percent,
            b'=' => {
                if self.bump_if(b'=') {
                    TokenKind::EqEq
                } else if self.bump_if(b'>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Eq
                }
            }
            b'!' => {
                if self.bump_if(b'=') {
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.bump_if(b'=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.bump_if(b'=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            b'&' => {
                if self.bump_if(b'&') {
                    TokenKind::AmpAmp
                } else if self.peek() == Some(b'm') && self.source[self.pos..].starts_with("mut") {
                    self.pos += 3;
                    TokenKind::AmpMut
                } else {
                    TokenKind::Amp
                }
            }
            b'|' => {
                if self.bump_if(b'|') {
                    TokenKind::PipePipe
                } else {
                    TokenKind::Pipe
                }
            }
            b'"' => return self.lex_string(start),
            b'\'' => return self.lex_char_or_lifetime(start),
            b'r' if matches!(self.peek(), Some(b'"') | Some(b'#')) => return self.lex_raw_string(start),
            b'0'..=b'9' => return self.lex_number(start),
            b if is_ident_start(b) => return self.lex_ident(start),
            other => {
                let ch = self.source[start..].chars().next().unwrap_or(other as char);
                self.errors
                    .push(LexError::new(LexErrorKind::UnexpectedChar(ch), Span::new(start, self.pos)));
                TokenKind::Bang
            }
        };

        Token::new(kind, Span::new(start, self.pos))
    }

    fn lex_ident(&mut self, start: usize) -> Token {
        while matches!(self.peek(), Some(b) if is_ident_continue(b)) {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let span = Span::new(start, self.pos);
        let kind = match text {
            "true" => TokenKind::Bool { value: true },
            "false" => TokenKind::Bool { value: false },
            _ => keyword_kind(text).unwrap_or_else(|| TokenKind::Ident(self.interner.intern(text))),
        };
        Token::new(kind, span)
    }

    /// Numeric literals: `0b`/`0o`/`0x` bases, `_` digit separators, an
    /// optional fractional/exponent part, and an optional type suffix
    /// (`42i64`, `1.5f32`).
    fn lex_number(&mut self, start: usize) -> Token {
        let base = if self.bytes[start] == b'0' {
            match self.peek() {
                Some(b'b') => {
                    self.pos += 1;
                    NumberBase::Binary
                }
                Some(b'o') => {
                    self.pos += 1;
                    NumberBase::Octal
                }
                Some(b'x') => {
                    self.pos += 1;
                    NumberBase::Hex
                }
                _ => NumberBase::Decimal,
            }
        } else {
            NumberBase::Decimal
        };

        let digits_start = self.pos;
        let is_digit: fn(u8) -> bool = match base {
            NumberBase::Binary => |b| b == b'0' || b == b'1' || b == b'_',
            NumberBase::Octal => |b| (b'0'..=b'7').contains(&b) || b == b'_',
            NumberBase::Hex => |b| b.is_ascii_hexdigit() || b == b'_',
            NumberBase::Decimal => |b| b.is_ascii_digit() || b == b'_',
        };
        while matches!(self.peek(), Some(b) if is_digit(b)) {
            self.pos += 1;
        }
        if self.pos == digits_start && base != NumberBase::Decimal {
            self.errors.push(LexError::new(
                LexErrorKind::InvalidNumber(self.source[start..self.pos].to_string()),
                Span::new(start, self.pos),
            ));
        }

        let mut is_float = false;
        if base == NumberBase::Decimal {
            if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
                is_float = true;
                self.pos += 1;
                while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'_') {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(), Some(b'e') | Some(b'E')) {
                let save = self.pos;
                self.pos += 1;
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.pos += 1;
                }
                if matches!(self.peek(), Some(b'0'..=b'9')) {
                    is_float = true;
                    while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                } else {
                    self.pos = save;
                }
            }
        }

        let digits_end = self.pos;
        let suffix = self.lex_number_suffix();
        let text = self.interner.intern(&self.source[start..digits_end].replace('_', ""));
        let span = Span::new(start, self.pos);

        let kind = if is_float {
            TokenKind::Float { text, suffix }
        } else {
            TokenKind::Int { text, base, suffix }
        };
        Token::new(kind, span)
    }

    fn lex_number_suffix(&mut self) -> NumberSuffix {
        let rest = &self.source[self.pos..];
        for (text, suffix, len) in [
            ("i8", NumberSuffix::I8, 2),
            ("i16", NumberSuffix::I16, 3),
            ("i32", NumberSuffix::I32, 3),
            ("i64", NumberSuffix::I64, 3),
            ("u8", NumberSuffix::U8, 2),
            ("u16", NumberSuffix::U16, 3),
            ("u32", NumberSuffix::U32, 3),
            ("u64", NumberSuffix::U64, 3),
            ("f32", NumberSuffix::F32, 3),
            ("f64", NumberSuffix::F64, 3),
        ] {
            if rest.starts_with(text) && !rest[len..].starts_with(|c: char| c.is_alphanumeric() || c == '_') {
                self.pos += len;
                return suffix;
            }
        }
        NumberSuffix::None
    }

    fn lex_char_or_lifetime(&mut self, start: usize) -> Token {
        let content_start = self.pos;
        let value = match self.peek() {
            Some(b'\\') => {
                self.pos += 1;
                self.read_escape(start)
            }
            Some(_) => {
                let ch = self.source[self.pos..].chars().next().unwrap();
                self.pos += ch.len_utf8();
                Some(ch)
            }
            None => None,
        };
        if self.pos == content_start {
            self.errors.push(LexError::new(LexErrorKind::EmptyChar, Span::new(start, self.pos)));
        }
        if !self.bump_if(b'\'') {
            self.errors
                .push(LexError::new(LexErrorKind::UnterminatedChar, Span::new(start, self.pos)));
        }
        Token::new(TokenKind::Char { value: value.unwrap_or('\0') }, Span::new(start, self.pos))
    }

    fn read_escape(&mut self, literal_start: usize) -> Option<char> {
        let esc = self.advance()?;
        Some(match esc {
            b'n' => '\n',
            b't' => '\t',
            b'r' => '\r',
            b'0' => '\0',
            b'\\' => '\\',
            b'\'' => '\'',
            b'"' => '"',
            other => {
                self.errors.push(LexError::new(
                    LexErrorKind::InvalidEscape(other as char),
                    Span::new(literal_start, self.pos),
                ));
                other as char
            }
        })
    }

    /// Lexes a (possibly interpolated) string literal starting at the
    /// opening `"`. Interpolation holes (`{expr}`) are not expanded here;
    /// the lexer only marks the boundary with `StrStart`/`StrMid`/`StrEnd`,
    /// the parser re-lexes each hole's contents as an expression.
    fn lex_string(&mut self, start: usize) -> Token {
        let mut buf = String::new();
        loop {
            match self.peek() {
                None => {
                    self.errors
                        .push(LexError::new(LexErrorKind::UnterminatedString, Span::new(start, self.pos)));
                    break;
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'{') if self.peek_at(1) != Some(b'{') => {
                    self.pos += 1;
                    let sym = self.interner.intern(&buf);
                    return Token::new(TokenKind::StrStart { value: sym }, Span::new(start, self.pos));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if let Some(ch) = self.read_escape(start) {
                        buf.push(ch);
                    }
                }
                Some(_) => {
                    let ch = self.source[self.pos..].chars().next().unwrap();
                    self.pos += ch.len_utf8();
                    buf.push(ch);
                }
            }
        }
        let sym = self.interner.intern(&buf);
        Token::new(TokenKind::Str { value: sym }, Span::new(start, self.pos))
    }

    /// Continues lexing a string after an interpolation hole's closing `}`,
    /// called by the parser once it has parsed the embedded expression.
    pub fn continue_string(&mut self, start: usize) -> Token {
        let mut buf = String::new();
        loop {
            match self.peek() {
                None => {
                    self.errors
                        .push(LexError::new(LexErrorKind::UnterminatedString, Span::new(start, self.pos)));
                    let sym = self.interner.intern(&buf);
                    return Token::new(TokenKind::StrEnd { value: sym }, Span::new(start, self.pos));
                }
                Some(b'"') => {
                    self.pos += 1;
                    let sym = self.interner.intern(&buf);
                    return Token::new(TokenKind::StrEnd { value: sym }, Span::new(start, self.pos));
                }
                Some(b'{') if self.peek_at(1) != Some(b'{') => {
                    self.pos += 1;
                    let sym = self.interner.intern(&buf);
                    return Token::new(TokenKind::StrMid { value: sym }, Span::new(start, self.pos));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if let Some(ch) = self.read_escape(start) {
                        buf.push(ch);
                    }
                }
                Some(_) => {
                    let ch = self.source[self.pos..].chars().next().unwrap();
                    self.pos += ch.len_utf8();
                    buf.push(ch);
                }
            }
        }
    }

    /// `r"..."` / `r#"..."#` raw strings: no escape processing, any number
    /// of `#` delimiters to allow embedded quotes.
    fn lex_raw_string(&mut self, start: usize) -> Token {
        self.pos += 1; // consume 'r'
        let mut hashes = 0;
        while self.bump_if(b'#') {
            hashes += 1;
        }
        if !self.bump_if(b'"') {
            self.errors
                .push(LexError::new(LexErrorKind::UnterminatedRawString, Span::new(start, self.pos)));
            return Token::new(TokenKind::Str { value: Symbol::EMPTY }, Span::new(start, self.pos));
        }
        let content_start = self.pos;
        let closing: String = std::iter::once('"').chain(std::iter::repeat('#').take(hashes)).collect();
        let end = match self.source[content_start..].find(&closing) {
            Some(rel) => content_start + rel,
            None => {
                self.errors
                    .push(LexError::new(LexErrorKind::UnterminatedRawString, Span::new(start, self.pos)));
                self.source.len()
            }
        };
        let text = &self.source[content_start..end];
        self.pos = (end + closing.len()).min(self.bytes.len());
        let sym = self.interner.intern(text);
        Token::new(TokenKind::Str { value: sym }, Span::new(start, self.pos))
    }
}

use home_base::Symbol;

fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_ident_continue(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn lex(src: &str) -> (Vec<Token>, Vec<LexError>, Interner) {
        let mut interner = Interner::new();
        let (tokens, errors) = {
            let lexer = Lexer::new(src, &mut interner);
            lexer.tokenize()
        };
        (tokens, errors, interner)
    }

    #[test]
    fn lexes_keywords_and_idents() {
        let (tokens, errors, _) = lex("let x = foo");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::KwLet);
        assert!(matches!(tokens[1].kind, TokenKind::Ident(_)));
        assert_eq!(tokens[2].kind, TokenKind::Eq);
    }

    #[test]
    fn lexes_hex_and_binary_with_underscores() {
        let (tokens, errors, interner) = lex("0xFF_FF 0b1010_1010");
        assert!(errors.is_empty());
        match &tokens[0].kind {
            TokenKind::Int { text, base, .. } => {
                assert_eq!(*base, NumberBase::Hex);
                assert_eq!(interner.resolve(*text), "FFFF");
            }
            other => panic!("expected int, got {other:?}"),
        }
        assert!(matches!(tokens[1].kind, TokenKind::Int { base: NumberBase::Binary, .. }));
    }

    #[test]
    fn lexes_float_with_suffix() {
        let (tokens, errors, _) = lex("3.14f32");
        assert!(errors.is_empty());
        assert!(matches!(tokens[0].kind, TokenKind::Float { suffix: NumberSuffix::F32, .. }));
    }

    #[test]
    fn lexes_string_with_escapes() {
        let (tokens, errors, interner) = lex(r#""hi\n""#);
        assert!(errors.is_empty());
        match &tokens[0].kind {
            TokenKind::Str { value } => assert_eq!(interner.resolve(*value), "hi\n"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn lexes_raw_string_with_hashes() {
        let (tokens, errors, interner) = lex(r##"r#"has "quotes" inside"#"##);
        assert!(errors.is_empty());
        match &tokens[0].kind {
            TokenKind::Str { value } => assert_eq!(interner.resolve(*value), "has \"quotes\" inside"),
            other => panic!("expected raw string, got {other:?}"),
        }
    }

    #[test]
    fn lexes_interpolated_string_start() {
        let (tokens, errors, interner) = lex(r#""hello {name}!""#);
        assert!(errors.is_empty());
        match &tokens[0].kind {
            TokenKind::StrStart { value } => assert_eq!(interner.resolve(*value), "hello "),
            other => panic!("expected str start, got {other:?}"),
        }
    }

    #[test]
    fn reports_unterminated_string() {
        let (_, errors, _) = lex("\"unterminated");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn captures_doc_comments() {
        let (tokens, errors, interner) = lex("/// does a thing\nfn f() {}");
        assert!(errors.is_empty());
        match &tokens[0].kind {
            TokenKind::DocComment(sym) => assert_eq!(interner.resolve(*sym), "does a thing"),
            other => panic!("expected doc comment, got {other:?}"),
        }
    }

    #[test]
    fn skips_nested_block_comments() {
        let (tokens, errors, _) = lex("/* outer /* inner */ still outer */ let x = 1");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::KwLet);
    }
}

/// Spec §8 property 1: lexing is a lossless, deterministic round-trip over
/// identifiers and integer literals — re-lexing the text a token's span
/// covers reproduces that same token, in order, with no errors.
#[cfg(test)]
mod lex_properties {
    use super::tests::lex;
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Atom {
        Ident(String),
        Int(String),
    }

    fn atom() -> impl Strategy<Value = Atom> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(|s| Atom::Ident(format!("var_{s}"))),
            "[1-9][0-9]{0,5}".prop_map(Atom::Int),
        ]
    }

    proptest! {
        #[test]
        fn ident_and_int_sequence_round_trips(atoms in prop::collection::vec(atom(), 1..16)) {
            let texts: Vec<String> = atoms
                .iter()
                .map(|a| match a {
                    Atom::Ident(s) => s.clone(),
                    Atom::Int(s) => s.clone(),
                })
                .collect();
            let src = texts.join(" ");
            let (tokens, errors, interner) = lex(&src);

            prop_assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
            prop_assert_eq!(tokens.len(), atoms.len() + 1, "one token per atom plus a trailing Eof");
            prop_assert!(tokens.last().unwrap().is_eof());

            for (token, atom) in tokens.iter().zip(atoms.iter()) {
                match (&token.kind, atom) {
                    (TokenKind::Ident(sym), Atom::Ident(expected)) => {
                        prop_assert_eq!(interner.resolve(*sym), expected.as_str());
                    }
                    (TokenKind::Int { text, base, suffix }, Atom::Int(expected)) => {
                        prop_assert_eq!(*base, NumberBase::Decimal);
                        prop_assert_eq!(*suffix, NumberSuffix::None);
                        prop_assert_eq!(interner.resolve(*text), expected.as_str());
                    }
                    (kind, atom) => prop_assert!(false, "token {kind:?} did not match generated atom {atom:?}"),
                }
                prop_assert_eq!(&src[token.span.start..token.span.end], match atom {
                    Atom::Ident(s) => s.as_str(),
                    Atom::Int(s) => s.as_str(),
                }, "token span must cover exactly the source text it was lexed from");
            }
        }
    }
}
