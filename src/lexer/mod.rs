//! Lexer for primer source text
//!
//! Token kinds are generated with logos; this module turns the logos stream
//! into owned [`Token`]s with spans and line-break flags, terminated by `Eof`.

mod tokens;

pub use tokens::{Token, TokenKind};

use crate::common::Span;
use crate::diagnostics::{EvalError, Result};
use logos::Logos;

/// Lex a complete source string
pub fn lex(source: &str) -> Result<Vec<Token>> {
    lex_at(source, 0)
}

/// Lex a source fragment that starts `base` bytes into an enclosing source.
///
/// Interpolation segments are lexed this way so that every span, and every
/// error raised from them, points into the string literal they came from.
pub fn lex_at(source: &str, base: usize) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    let mut prev_end = 0;

    while let Some(kind) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start, range.end).offset(base);
        let kind = kind.map_err(|()| EvalError::InvalidToken {
            text: lexer.slice().to_string(),
            span: Some(span.into()),
        })?;

        let newline_before = !tokens.is_empty() && source[prev_end..range.start].contains('\n');
        prev_end = range.end;

        tokens.push(Token {
            kind,
            span,
            text: lexer.slice().to_string(),
            newline_before,
        });
    }

    let end = Span::new(source.len(), source.len()).offset(base);
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: end,
        text: String::new(),
        newline_before: source[prev_end..].contains('\n'),
    });

    tracing::trace!("lexed {} tokens", tokens.len());
    Ok(tokens)
}
