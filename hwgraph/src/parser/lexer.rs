//! S-expression tokenizer
//!
//! Splits KiCad file text into parentheses, bare atoms and quoted strings.
//! Whitespace outside quotes only separates tokens. Quoted strings keep
//! their escapes until they are handed out, so most tokens borrow directly
//! from the input.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use logos::{Logos, SpannedIter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A byte offset resolved to a 1-based line and (byte) column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Resolve `offset` against `input`. Offsets past the end clamp to it.
    pub fn locate(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());
        let before = &input.as_bytes()[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = before
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let column = offset - line_start + 1;
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated quoted string starting at {location}")]
    UnterminatedString { location: Location },
    #[error("invalid token {text:?} at {location}")]
    InvalidToken { text: String, location: Location },
}

impl LexError {
    pub fn location(&self) -> Location {
        match self {
            LexError::UnterminatedString { location } | LexError::InvalidToken { location, .. } => {
                *location
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    OpenParen,
    CloseParen,
    Atom(&'a str),
    /// Contents of a quoted string with escapes resolved
    QuotedString(Cow<'a, str>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken<'a> {
    pub token: Token<'a>,
    pub span: Range<usize>,
}

#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r#""([^"\\]|\\[\s\S])*""#)]
    Quoted,
    #[regex(r#"[^"() \t\r\n\f]+"#)]
    Atom,
}

/// Lazy token stream over one input. Stops after the first error.
pub struct Lexer<'a> {
    input: &'a str,
    iter: SpannedIter<'a, RawToken>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            iter: RawToken::lexer(input).spanned(),
            failed: false,
        }
    }

    /// A fresh lexer over the same input, positioned at the start.
    pub fn restart(&self) -> Self {
        Self::new(self.input)
    }

    pub fn input(&self) -> &'a str {
        self.input
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<SpannedToken<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (raw, span) = self.iter.next()?;
        let token = match raw {
            Ok(RawToken::LParen) => Token::OpenParen,
            Ok(RawToken::RParen) => Token::CloseParen,
            Ok(RawToken::Atom) => Token::Atom(&self.input[span.clone()]),
            Ok(RawToken::Quoted) => {
                let inner = &self.input[span.start + 1..span.end - 1];
                Token::QuotedString(unescape(inner))
            }
            Err(()) => {
                self.failed = true;
                let location = Location::locate(self.input, span.start);
                let text = &self.input[span.clone()];
                return Some(Err(if text.starts_with('"') {
                    LexError::UnterminatedString { location }
                } else {
                    LexError::InvalidToken {
                        text: text.to_string(),
                        location,
                    }
                }));
            }
        };
        Some(Ok(SpannedToken { token, span }))
    }
}

/// Tokenize the whole input eagerly.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken<'_>>, LexError> {
    Lexer::new(input).collect()
}

fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }
    let mut s = String::with_capacity(raw.len());
    let mut escaped = false;
    for ch in raw.chars() {
        if escaped {
            match ch {
                'n' => s.push('\n'),
                't' => s.push('\t'),
                'r' => s.push('\r'),
                _ => s.push(ch),
            }
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            s.push(ch);
        }
    }
    Cow::Owned(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_basic_stream() {
        let input = "(a \"b\" \"\" \n)";
        assert_eq!(
            tokens(input),
            vec![
                Token::OpenParen,
                Token::Atom("a"),
                Token::QuotedString(Cow::Borrowed("b")),
                Token::QuotedString(Cow::Borrowed("")),
                Token::CloseParen,
            ]
        );
    }

    #[test]
    fn test_spans_point_into_input() {
        let input = "(at 1.27 -2.54)";
        let toks = tokenize(input).unwrap();
        assert_eq!(&input[toks[2].span.clone()], "1.27");
        assert_eq!(&input[toks[3].span.clone()], "-2.54");
    }

    #[rstest]
    #[case(r#""say \"hi\"""#, "say \"hi\"")]
    #[case(r#""back\\slash""#, "back\\slash")]
    #[case(r#""two\nlines""#, "two\nlines")]
    #[case(r#""(not a list)""#, "(not a list)")]
    fn test_quoted_escapes(#[case] input: &str, #[case] expected: &str) {
        let toks = tokens(input);
        assert_eq!(toks, vec![Token::QuotedString(Cow::Owned(expected.to_string()))]);
    }

    #[test]
    fn test_unterminated_string() {
        let input = "(a \"ok\")\n (b \"open";
        let err = tokenize(input).unwrap_err();
        match err {
            LexError::UnterminatedString { location } => {
                assert_eq!(location.line, 2);
                assert_eq!(location.column, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_lexer_stops_after_error() {
        let mut lexer = Lexer::new("(a \"open");
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_restart() {
        let mut lexer = Lexer::new("(x)");
        let first: Vec<_> = lexer.by_ref().collect();
        let again: Vec<_> = lexer.restart().collect();
        assert_eq!(first, again);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_location() {
        let loc = Location::locate("ab\ncd", 4);
        assert_eq!((loc.line, loc.column), (2, 2));
    }
}
