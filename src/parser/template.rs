//! String templates: literal text with embedded `{expr}` segments
//!
//! `{{` and `}}` produce literal braces. Backslash escapes (`\n`, `\t`, `\"`,
//! `\\`, `\{`, `\}`) are resolved in the text parts.

use crate::ast::Segment;
use crate::common::Span;
use crate::diagnostics::{EvalError, Result};

/// Split `raw` into text and expression segments. `base` is the offset of
/// `raw` inside the enclosing source, used for spans.
pub fn parse_template(raw: &str, base: usize) -> Result<Vec<Segment>> {
    let chars: Vec<(usize, char)> = raw.char_indices().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        match (c, next) {
            ('\\', Some(escaped)) => {
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '"' | '\\' | '{' | '}' => text.push(escaped),
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                }
                i += 2;
            }
            ('{', Some('{')) => {
                text.push('{');
                i += 2;
            }
            ('}', Some('}')) => {
                text.push('}');
                i += 2;
            }
            ('{', _) => {
                let close = find_close(&chars, i).ok_or(EvalError::UnterminatedInterpolation {
                    span: Some(Span::new(base + pos, base + pos + 1).into()),
                })?;
                let inner_start = pos + 1;
                let inner_end = chars[close].0;
                let expr =
                    super::parse_expression(&raw[inner_start..inner_end], base + inner_start)?;

                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Expr(expr));
                i = close + 1;
            }
            ('}', _) => {
                return Err(EvalError::UnexpectedToken {
                    expected: "`}}` for a literal brace".to_string(),
                    found: "}".to_string(),
                    span: Some(Span::new(base + pos, base + pos + 1).into()),
                });
            }
            _ => {
                text.push(c);
                i += 1;
            }
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// Index of the `}` closing the `{` at `open`, honouring nested braces
fn find_close(chars: &[(usize, char)], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (j, &(_, c)) in chars.iter().enumerate().skip(open + 1) {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(j),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}
