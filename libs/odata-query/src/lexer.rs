//! `$filter` tokenizer.

use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    LParen,
    RParen,
    Comma,
    /// Raw content between the outer quotes of a string literal.
    Str(&'a str),
    /// Keyword, operator, literal or property path.
    Word(&'a str),
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b',' | b'\'')
}

/// Split a filter string into tokens.
///
/// A quote immediately after a closing quote re-opens the literal, so `'O''Neil'`
/// yields the single literal `O''Neil`. No escape processing is applied.
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] for an unterminated string literal.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token<'_>>, Error> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            b'\'' => {
                let (content, next) = scan_string(input, pos)?;
                tokens.push(Token::Str(content));
                pos = next;
            }
            b if b.is_ascii_whitespace() => pos += 1,
            _ => {
                let start = pos;
                while pos < bytes.len() && !is_delimiter(bytes[pos]) {
                    pos += 1;
                }
                tokens.push(Token::Word(&input[start..pos]));
            }
        }
    }

    Ok(tokens)
}

/// Scan a literal opening at byte `open`; returns its content and the offset past it.
fn scan_string(input: &str, open: usize) -> Result<(&str, usize), Error> {
    let bytes = input.as_bytes();
    let mut pos = open + 1;
    loop {
        let Some(offset) = bytes[pos..].iter().position(|&b| b == b'\'') else {
            return Err(Error::InvalidFilter(format!(
                "unterminated string literal starting at position {open}"
            )));
        };
        let close = pos + offset;
        if bytes.get(close + 1) == Some(&b'\'') {
            pos = close + 2;
            continue;
        }
        return Ok((&input[open + 1..close], close + 1));
    }
}
