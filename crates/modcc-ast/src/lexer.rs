//! Hand-written lexer: character buffer in, token stream out.
//!
//! `parse()` advances; `peek()` must not, and two consecutive `peek()` calls
//! must agree (§4.1, §8 "peek idempotence"). We get that for free by caching
//! the peeked token rather than the save/restore-position dance the original
//! C++ lexer uses.

use crate::diagnostics::Location;
use crate::token::{classify_identifier, Token, TokenKind};

/// Lexical analysis errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// An unexpected character was encountered outside any recognised token.
    #[error("{location}: found unexpected character '{found}' when trying to find next token")]
    UnexpectedChar {
        /// Where the bad character was found.
        location: Location,
        /// The offending character.
        found: char,
    },
    /// A `\r` was not immediately followed by `\n`.
    #[error("{location}: bad line ending: \\n must follow \\r")]
    BadLineEnding {
        /// Where the bad line ending was found.
        location: Location,
    },
    /// A numeric literal had more than one decimal point.
    #[error("{location}: number '{spelling}' has more than one decimal point")]
    MalformedNumber {
        /// Where the literal starts.
        location: Location,
        /// The text scanned so far.
        spelling: String,
    },
}

/// Converts a source buffer into a [`Token`] stream with one-token lookahead.
pub struct Lexer<'src> {
    chars: Vec<char>,
    source: &'src str,
    pos: usize,
    line: u32,
    column: u32,
    peeked: Option<Token>,
    last_error: Option<LexError>,
}

impl<'src> Lexer<'src> {
    /// Create a lexer over `source`.
    pub fn new(source: &'src str) -> Self {
        Self {
            chars: source.chars().collect(),
            source,
            pos: 0,
            line: 1,
            column: 1,
            peeked: None,
            last_error: None,
        }
    }

    /// The original source buffer.
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// The most recent lexical error, if any token returned since the last
    /// call was `Reserved`.
    pub fn last_error(&self) -> Option<&LexError> {
        self.last_error.as_ref()
    }

    fn current(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn at(&self, offset: usize) -> char {
        self.chars.get(self.pos + offset).copied().unwrap_or('\0')
    }

    fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> char {
        let c = self.current();
        if c != '\0' {
            self.pos += 1;
            self.column += 1;
        }
        c
    }

    fn newline(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.column = 1;
    }

    /// Advance and return the next token.
    pub fn parse(&mut self) -> Token {
        if let Some(t) = self.peeked.take() {
            return t;
        }
        self.scan()
    }

    /// Return the next token without advancing past it.
    pub fn peek(&mut self) -> Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan());
        }
        self.peeked.clone().expect("just populated")
    }

    fn scan(&mut self) -> Token {
        loop {
            let loc = self.location();
            let c = self.current();
            match c {
                '\0' => return Token::eof(loc),
                ' ' | '\t' | '\u{0B}' | '\u{0C}' => {
                    self.bump();
                    continue;
                }
                '\n' => {
                    self.newline();
                    continue;
                }
                '\r' => {
                    self.pos += 1;
                    if self.current() != '\n' {
                        self.last_error = Some(LexError::BadLineEnding { location: loc });
                        return Token::new(TokenKind::Reserved, "", loc);
                    }
                    self.newline();
                    continue;
                }
                ':' => {
                    while self.current() != '\0' && self.current() != '\n' {
                        self.pos += 1;
                        self.column += 1;
                    }
                    continue;
                }
                '0'..='9' | '.' => return self.scan_number(loc),
                c if c.is_ascii_alphabetic() || c == '_' => return self.scan_identifier(loc),
                '(' => return self.single(loc, TokenKind::LParen),
                ')' => return self.single(loc, TokenKind::RParen),
                '{' => return self.single(loc, TokenKind::LBrace),
                '}' => return self.single(loc, TokenKind::RBrace),
                ',' => return self.single(loc, TokenKind::Comma),
                '\'' => return self.single(loc, TokenKind::Prime),
                '+' => return self.single(loc, TokenKind::Plus),
                '-' => return self.single(loc, TokenKind::Minus),
                '*' => return self.single(loc, TokenKind::Star),
                '/' => return self.single(loc, TokenKind::Slash),
                '^' => return self.single(loc, TokenKind::Caret),
                '=' => return self.scan_compound(loc, '=', TokenKind::Eq, TokenKind::EqEq),
                '!' => {
                    // `!=` is the only valid use; a lone `!` has no meaning in this DSL.
                    let start = self.pos;
                    self.bump();
                    if self.current() == '=' {
                        self.bump();
                        let spelling: String = self.chars[start..self.pos].iter().collect();
                        return Token::new(TokenKind::NotEq, spelling, loc);
                    }
                    self.last_error = Some(LexError::UnexpectedChar {
                        location: loc,
                        found: '!',
                    });
                    return Token::new(TokenKind::Reserved, "!", loc);
                }
                '<' => return self.scan_compound(loc, '=', TokenKind::Lt, TokenKind::Le),
                '>' => return self.scan_compound(loc, '=', TokenKind::Gt, TokenKind::Ge),
                other => {
                    self.bump();
                    self.last_error = Some(LexError::UnexpectedChar {
                        location: loc,
                        found: other,
                    });
                    return Token::new(TokenKind::Reserved, other.to_string(), loc);
                }
            }
        }
    }

    fn single(&mut self, loc: Location, kind: TokenKind) -> Token {
        let c = self.bump();
        Token::new(kind, c.to_string(), loc)
    }

    fn scan_compound(&mut self, loc: Location, second: char, plain: TokenKind, compound: TokenKind) -> Token {
        let start = self.pos;
        self.bump();
        if self.current() == second {
            self.bump();
            let spelling: String = self.chars[start..self.pos].iter().collect();
            Token::new(compound, spelling, loc)
        } else {
            let spelling: String = self.chars[start..self.pos].iter().collect();
            Token::new(plain, spelling, loc)
        }
    }

    fn scan_number(&mut self, loc: Location) -> Token {
        let start = self.pos;
        let mut num_points = if self.current() == '.' { 1 } else { 0 };
        self.bump();
        loop {
            match self.current() {
                '0'..='9' => {
                    self.bump();
                }
                '.' => {
                    num_points += 1;
                    self.bump();
                }
                _ => break,
            }
        }
        let spelling: String = self.chars[start..self.pos].iter().collect();
        if num_points > 1 {
            self.last_error = Some(LexError::MalformedNumber {
                location: loc,
                spelling: spelling.clone(),
            });
            return Token::new(TokenKind::Reserved, spelling, loc);
        }
        Token::new(TokenKind::Number, spelling, loc)
    }

    fn scan_identifier(&mut self, loc: Location) -> Token {
        let start = self.pos;
        self.bump();
        while matches!(self.current(), 'a'..='z' | 'A'..='Z' | '0'..='9' | '_') {
            self.bump();
        }
        let spelling: String = self.chars[start..self.pos].iter().collect();
        let kind = classify_identifier(&spelling);
        Token::new(kind, spelling, loc)
    }

    /// Re-lex a single token's spelling in isolation. Used by the round-trip
    /// property test (§8): every token produced by `parse()` must reproduce
    /// the same kind when its spelling alone is fed back through the lexer.
    pub fn relex_spelling(spelling: &str) -> TokenKind {
        let mut lexer = Lexer::new(spelling);
        lexer.parse().kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lexer.parse();
            let is_eof = t.kind == TokenKind::Eof;
            out.push(t);
            if is_eof {
                break;
            }
        }
        out
    }

    #[test]
    fn skips_whitespace_and_line_comments() {
        let toks = lex_all("  x = 1 : this is a comment\ny = 2");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Eq,
                TokenKind::Number,
                TokenKind::Identifier,
                TokenKind::Eq,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_operators_are_distinct_tokens() {
        let toks = lex_all("<= >= == !=");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Le, TokenKind::Ge, TokenKind::EqEq, TokenKind::NotEq, TokenKind::Eof]
        );
    }

    #[test]
    fn numbers_allow_leading_dot_and_reject_two_points() {
        let toks = lex_all(".5");
        assert_eq!(toks[0].kind, TokenKind::Number);
        assert_eq!(toks[0].spelling, ".5");

        let mut lexer = Lexer::new("1.2.3");
        let t = lexer.parse();
        assert_eq!(t.kind, TokenKind::Reserved);
        assert!(matches!(lexer.last_error(), Some(LexError::MalformedNumber { .. })));
    }

    #[test]
    fn bad_carriage_return_is_an_error() {
        let mut lexer = Lexer::new("x\ry");
        let _ = lexer.parse(); // "x"
        let t = lexer.parse();
        assert_eq!(t.kind, TokenKind::Reserved);
        assert!(matches!(lexer.last_error(), Some(LexError::BadLineEnding { .. })));
    }

    #[test]
    fn peek_is_idempotent_and_parse_agrees() {
        let mut lexer = Lexer::new("alpha beta");
        let p1 = lexer.peek();
        let p2 = lexer.peek();
        assert_eq!(p1, p2);
        let parsed = lexer.parse();
        assert_eq!(parsed, p1);
    }

    #[test]
    fn round_trip_spelling_reproduces_token_kind() {
        let toks = lex_all("NEURON foo 3.14 <= cnexp");
        for t in toks {
            if t.kind == TokenKind::Eof {
                continue;
            }
            assert_eq!(Lexer::relex_spelling(&t.spelling), t.kind, "token {:?}", t);
        }
    }
}
