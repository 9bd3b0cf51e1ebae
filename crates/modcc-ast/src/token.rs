//! Token kinds, the keyword table, and the binary-operator precedence table.
//!
//! Both tables are process-wide and built lazily exactly once (spec §5:
//! "Process-wide lookup tables... built lazily once and thereafter treated
//! as read-only... safe under concurrent first-touch"). `std::sync::OnceLock`
//! gives that guarantee without pulling in an extra crate.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::diagnostics::Location;

/// The closed set of lexical token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals and names
    /// Numeric literal.
    Number,
    /// Identifier not matching any keyword.
    Identifier,

    // Block keywords
    Title,
    Neuron,
    State,
    Units,
    Parameter,
    Assigned,
    Breakpoint,
    Initial,
    Derivative,
    Procedure,
    Function,
    NetReceive,

    // NEURON-block attributes
    Threadsafe,
    Suffix,
    PointProcess,
    Useion,
    Read,
    Write,
    NonspecificCurrent,
    Range,
    Global,

    // Statement keywords
    Solve,
    Method,
    If,
    Else,
    Local,

    // Integration method names
    Cnexp,

    // Intrinsic unary functions
    Exp,
    Log,
    Sin,
    Cos,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Prime,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    /// End of input.
    Eof,
    /// A character (or fragment) the lexer could not classify; carries no
    /// further meaning beyond letting the parser resynchronise or abort.
    Reserved,
}

impl TokenKind {
    /// True for the five block keywords that dispatch to a procedure/
    /// net-receive body at the parser's top level.
    pub fn is_procedure_like_block(self) -> bool {
        matches!(
            self,
            TokenKind::Initial
                | TokenKind::Derivative
                | TokenKind::Breakpoint
                | TokenKind::Procedure
                | TokenKind::Function
                | TokenKind::NetReceive
        )
    }
}

/// A single lexed token: its kind, its verbatim spelling, and its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Which kind of token this is.
    pub kind: TokenKind,
    /// The exact source text that produced this token (numeric literals
    /// included, so re-lexing the spelling in isolation reproduces the
    /// same token kind).
    pub spelling: String,
    /// Where the token starts in the source buffer.
    pub location: Location,
}

impl Token {
    /// Construct a token.
    pub fn new(kind: TokenKind, spelling: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            location,
        }
    }

    /// An EOF token at the given location.
    pub fn eof(location: Location) -> Self {
        Self::new(TokenKind::Eof, "", location)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.spelling)
    }
}

/// Case-sensitive keyword table, built once.
fn keyword_table() -> &'static HashMap<&'static str, TokenKind> {
    static TABLE: OnceLock<HashMap<&'static str, TokenKind>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use TokenKind::*;
        HashMap::from([
            ("TITLE", Title),
            ("NEURON", Neuron),
            ("STATE", State),
            ("UNITS", Units),
            ("PARAMETER", Parameter),
            ("ASSIGNED", Assigned),
            ("BREAKPOINT", Breakpoint),
            ("INITIAL", Initial),
            ("DERIVATIVE", Derivative),
            ("PROCEDURE", Procedure),
            ("FUNCTION", Function),
            ("NET_RECEIVE", NetReceive),
            ("THREADSAFE", Threadsafe),
            ("SUFFIX", Suffix),
            ("POINT_PROCESS", PointProcess),
            ("USEION", Useion),
            ("READ", Read),
            ("WRITE", Write),
            ("NONSPECIFIC_CURRENT", NonspecificCurrent),
            ("RANGE", Range),
            ("GLOBAL", Global),
            ("SOLVE", Solve),
            ("METHOD", Method),
            ("if", If),
            ("else", Else),
            ("LOCAL", Local),
            ("cnexp", Cnexp),
            ("exp", Exp),
            ("log", Log),
            ("sin", Sin),
            ("cos", Cos),
        ])
    })
}

/// Look up `spelling` in the keyword table, falling back to `Identifier`.
pub fn classify_identifier(spelling: &str) -> TokenKind {
    keyword_table()
        .get(spelling)
        .copied()
        .unwrap_or(TokenKind::Identifier)
}

/// Binary-operator precedence, highest binds tightest. Relational and
/// equality operators are deliberately lower than arithmetic so that
/// `a + b < c * d` parses as `(a + b) < (c * d)`.
pub fn precedence_of(kind: TokenKind) -> Option<u8> {
    static TABLE: OnceLock<HashMap<TokenKind, u8>> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        use TokenKind::*;
        HashMap::from([
            (Eq, 2),
            (EqEq, 4),
            (NotEq, 4),
            (Lt, 5),
            (Le, 5),
            (Gt, 5),
            (Ge, 5),
            (Plus, 10),
            (Minus, 10),
            (Star, 20),
            (Slash, 20),
            (Caret, 30),
        ])
    });
    table.get(&kind).copied()
}

/// True for the operator tokens that classify as relational/equality
/// comparisons (the original's `ConditionalExpression` subclass marker).
pub fn is_relational(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::EqEq | TokenKind::NotEq | TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge
    )
}

/// `^` is the only right-associative binary operator.
pub fn is_right_associative(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Caret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(classify_identifier("NEURON"), TokenKind::Neuron);
        assert_eq!(classify_identifier("neuron"), TokenKind::Identifier);
        assert_eq!(classify_identifier("if"), TokenKind::If);
        assert_eq!(classify_identifier("IF"), TokenKind::Identifier);
    }

    #[test]
    fn precedence_orders_mul_above_add_above_relational() {
        let mul = precedence_of(TokenKind::Star).unwrap();
        let add = precedence_of(TokenKind::Plus).unwrap();
        let rel = precedence_of(TokenKind::Lt).unwrap();
        assert!(mul > add);
        assert!(add > rel);
    }

    #[test]
    fn caret_is_right_associative_and_highest() {
        let pow = precedence_of(TokenKind::Caret).unwrap();
        let mul = precedence_of(TokenKind::Star).unwrap();
        assert!(pow > mul);
        assert!(is_right_associative(TokenKind::Caret));
        assert!(!is_right_associative(TokenKind::Star));
    }
}
