//! Conversion of query text into a stream of positioned tokens.

use tracing::trace;

use super::token::{Span, Token, TokenKind};

/// Characters that terminate a bare word, in addition to whitespace.
const WORD_TERMINATORS: &[char] = &['(', ')', '=', ',', '"', '\''];

/// Errors raised while splitting a query into tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    /// A quoted string runs until the end of the input.
    #[error("unclosed string at position {span}: {value}")]
    UnclosedString { value: String, span: Span },

    /// A character that cannot start any token.
    #[error("unexpected character {ch:?} at position {span}")]
    UnexpectedCharacter { ch: char, span: Span },
}

impl TokenizeError {
    /// Position of the offending input.
    pub fn span(&self) -> Span {
        match self {
            TokenizeError::UnclosedString { span, .. }
            | TokenizeError::UnexpectedCharacter { span, .. } => *span,
        }
    }
}

/// Streaming tokenizer over a query string.
///
/// Yields `Some(Ok(token))` for each token, `None` at the end of input and
/// stops after the first error.
///
/// # Example
///
/// ```
/// use depscope::query::{TokenKind, Tokenizer};
///
/// let kinds: Vec<TokenKind> = Tokenizer::new("deps(foo)")
///     .map(|t| t.unwrap().kind)
///     .collect();
/// assert_eq!(kinds.len(), 4);
/// assert_eq!(kinds[0], TokenKind::String("deps".into()));
/// ```
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            failed: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn punctuation(&mut self, kind: TokenKind) -> Token {
        let start = self.pos;
        self.pos += 1;
        Token::new(kind, start, self.pos)
    }

    fn quoted(&mut self, quote: char) -> Result<Token, TokenizeError> {
        let start = self.pos;
        let body_start = start + quote.len_utf8();
        let body = &self.input[body_start..];

        match body.find(quote) {
            Some(offset) => {
                self.pos = body_start + offset + quote.len_utf8();
                Ok(Token::new(
                    TokenKind::String(body[..offset].to_string()),
                    start,
                    self.pos,
                ))
            }
            None => Err(TokenizeError::UnclosedString {
                value: body.to_string(),
                span: Span::new(start, self.input.len()),
            }),
        }
    }

    fn bare_word(&mut self) -> Token {
        let start = self.pos;
        let end = self.input[start..]
            .find(|c: char| c.is_whitespace() || WORD_TERMINATORS.contains(&c))
            .map_or(self.input.len(), |offset| start + offset);
        self.pos = end;

        let word = &self.input[start..end];
        let kind = match word {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "minus" => TokenKind::Subtract,
            "union" => TokenKind::Union,
            "inter" => TokenKind::Intersect,
            "delta" => TokenKind::Delta,
            _ if word.bytes().all(|b| b.is_ascii_digit()) => match word.parse() {
                Ok(v) => TokenKind::Integer(v),
                Err(_) => TokenKind::String(word.to_string()),
            },
            _ => TokenKind::String(word.to_string()),
        };
        Token::new(kind, start, end)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '(' => self.punctuation(TokenKind::ParenLeft),
            ')' => self.punctuation(TokenKind::ParenRight),
            ',' => self.punctuation(TokenKind::Comma),
            '-' => self.punctuation(TokenKind::Subtract),
            '+' => self.punctuation(TokenKind::Union),
            '"' | '\'' => self.quoted(c)?,
            '=' => {
                return Err(TokenizeError::UnexpectedCharacter {
                    ch: c,
                    span: Span::new(self.pos, self.pos + 1),
                })
            }
            _ => self.bare_word(),
        };
        trace!(token = %token, span = %token.span, "tokenized");
        Ok(Some(token))
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Tokenizes the whole query, failing on the first lexical error.
pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Result<Token, TokenizeError> {
        let mut tokens = Tokenizer::new(input);
        let token = tokens.next().unwrap();
        if token.is_ok() {
            assert!(tokens.next().is_none(), "trailing tokens for {input:?}");
        }
        token
    }

    fn string(value: &str, start: usize, end: usize) -> Token {
        Token::new(TokenKind::String(value.to_string()), start, end)
    }

    #[test]
    fn test_single_strings() {
        assert_eq!(single("foo").unwrap(), string("foo", 0, 3));
        assert_eq!(single("42foo").unwrap(), string("42foo", 0, 5));
        assert_eq!(
            single("foo-bar+dead").unwrap(),
            string("foo-bar+dead", 0, 12)
        );
        assert_eq!(single("foo/bar").unwrap(), string("foo/bar", 0, 7));
        assert_eq!(single("\"foo\"").unwrap(), string("foo", 0, 5));
        assert_eq!(single("'foo'").unwrap(), string("foo", 0, 5));
        assert_eq!(single("'a b,c'").unwrap(), string("a b,c", 0, 7));
    }

    #[test]
    fn test_single_keywords() {
        let cases = [
            ("-", TokenKind::Subtract, 1),
            ("minus", TokenKind::Subtract, 5),
            ("+", TokenKind::Union, 1),
            ("union", TokenKind::Union, 5),
            ("inter", TokenKind::Intersect, 5),
            ("delta", TokenKind::Delta, 5),
            ("(", TokenKind::ParenLeft, 1),
            (")", TokenKind::ParenRight, 1),
            (",", TokenKind::Comma, 1),
            ("true", TokenKind::Boolean(true), 4),
            ("false", TokenKind::Boolean(false), 5),
            ("42", TokenKind::Integer(42), 2),
        ];
        for (input, kind, len) in cases {
            assert_eq!(single(input).unwrap(), Token::new(kind, 0, len), "{input}");
        }
    }

    #[test]
    fn test_unclosed_string() {
        for input in ["\"foo", "'foo"] {
            let err = single(input).unwrap_err();
            assert_eq!(
                err,
                TokenizeError::UnclosedString {
                    value: "foo".to_string(),
                    span: Span::new(0, 4),
                }
            );
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(Tokenizer::new("").next().is_none());
        assert!(Tokenizer::new("  \t\n").next().is_none());
    }

    #[test]
    fn test_stream_function_call() {
        let tokens = tokenize("deps(foo)").unwrap();
        assert_eq!(
            tokens,
            vec![
                string("deps", 0, 4),
                Token::new(TokenKind::ParenLeft, 4, 5),
                string("foo", 5, 8),
                Token::new(TokenKind::ParenRight, 8, 9),
            ]
        );
    }

    #[test]
    fn test_stream_comma_separated() {
        let tokens = tokenize("foo, 42, bar").unwrap();
        assert_eq!(
            tokens,
            vec![
                string("foo", 0, 3),
                Token::new(TokenKind::Comma, 3, 4),
                Token::new(TokenKind::Integer(42), 5, 7),
                Token::new(TokenKind::Comma, 7, 8),
                string("bar", 9, 12),
            ]
        );
    }

    #[test]
    fn test_stream_complex() {
        let tokens = tokenize(r#"deps("foo", 2, true) union rdeps(bar - dead/beef)"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                string("deps", 0, 4),
                Token::new(TokenKind::ParenLeft, 4, 5),
                string("foo", 5, 10),
                Token::new(TokenKind::Comma, 10, 11),
                Token::new(TokenKind::Integer(2), 12, 13),
                Token::new(TokenKind::Comma, 13, 14),
                Token::new(TokenKind::Boolean(true), 15, 19),
                Token::new(TokenKind::ParenRight, 19, 20),
                Token::new(TokenKind::Union, 21, 26),
                string("rdeps", 27, 32),
                Token::new(TokenKind::ParenLeft, 32, 33),
                string("bar", 33, 36),
                Token::new(TokenKind::Subtract, 37, 38),
                string("dead/beef", 39, 48),
                Token::new(TokenKind::ParenRight, 48, 49),
            ]
        );
    }

    #[test]
    fn test_stream_stops_at_unclosed_string() {
        let mut tokens = Tokenizer::new(r#"rdeps union( foo, "bar)"#);
        let ok: Vec<Token> = tokens.by_ref().map_while(|t| t.ok()).collect();

        assert_eq!(ok.len(), 5);
        assert_eq!(ok[4], Token::new(TokenKind::Comma, 16, 17));
        assert!(tokens.next().is_none());

        let err = tokenize(r#"rdeps union( foo, "bar)"#).unwrap_err();
        assert_eq!(err.span(), Span::new(18, 23));
    }

    #[test]
    fn test_equals_sign_is_rejected() {
        let err = tokenize("foo = bar").unwrap_err();
        assert_eq!(
            err,
            TokenizeError::UnexpectedCharacter {
                ch: '=',
                span: Span::new(4, 5),
            }
        );
    }
}
