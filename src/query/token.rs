//! Lexical tokens of the query language.

use std::fmt;

/// Byte range of a token or expression within the query text.
///
/// `start` is inclusive and `end` exclusive. The [`Display`](fmt::Display)
/// form is 1-based and inclusive, e.g. `5-8` for the fifth to eighth
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end > self.start + 1 {
            write!(f, "{}-{}", self.start + 1, self.end)
        } else {
            write!(f, "{}", self.start + 1)
        }
    }
}

/// The kind and payload of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `true` or `false`
    Boolean(bool),
    /// A bare word consisting only of digits
    Integer(usize),
    /// A bare word or a quoted string, quotes removed
    String(String),
    /// `,`
    Comma,
    /// `(`
    ParenLeft,
    /// `)`
    ParenRight,
    /// `delta`
    Delta,
    /// `inter`
    Intersect,
    /// `+` or `union`
    Union,
    /// `-` or `minus`
    Subtract,
}

impl TokenKind {
    /// Returns true for the four binary set operators.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Delta | TokenKind::Intersect | TokenKind::Union | TokenKind::Subtract
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Boolean(v) => write!(f, "{}", v),
            TokenKind::Integer(v) => write!(f, "{}", v),
            TokenKind::String(v) => write!(f, "{}", v),
            TokenKind::Comma => write!(f, ","),
            TokenKind::ParenLeft => write!(f, "("),
            TokenKind::ParenRight => write!(f, ")"),
            TokenKind::Delta => write!(f, "delta"),
            TokenKind::Intersect => write!(f, "inter"),
            TokenKind::Union => write!(f, "+"),
            TokenKind::Subtract => write!(f, "-"),
        }
    }
}

/// A token with its position in the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
