//! Line processing and tokenization for TPM text.
//!
//! TPM is line oriented: every significant line is either a block header, a
//! brace, or a `key = value` property. Only whole-line `//` comments exist; a
//! `//` after other content belongs to the line.

use super::parser::{ParseError, ParseResult};

/// A token on a header or brace line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Alphanumeric/underscore run (e.g. `mesh`, `fileinfo`)
    Identifier(String),

    /// Double-quoted text, quotes stripped
    String(String),

    /// `{`
    OpenBrace,

    /// `}`
    CloseBrace,

    /// `=`
    Equals,
}

/// A trimmed, non-empty, non-comment line with its 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Split text into significant lines.
///
/// Lines are trimmed; empty lines and lines starting with `//` are dropped.
pub fn significant_lines(content: &str) -> Vec<SourceLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = raw.trim();
            if text.is_empty() || text.starts_with("//") {
                None
            } else {
                Some(SourceLine {
                    number: i + 1,
                    text: text.to_string(),
                })
            }
        })
        .collect()
}

/// True for characters allowed in identifiers.
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// True if `s` is a non-empty identifier.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_identifier_char)
}

/// Tokenize one significant line.
pub fn tokenize(line: &SourceLine) -> ParseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        match c {
            '{' => {
                chars.next();
                tokens.push(Token::OpenBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::CloseBrace);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '"' => {
                chars.next(); // consume opening quote
                let mut text = String::new();
                let mut closed = false;
                for sc in chars.by_ref() {
                    if sc == '"' {
                        closed = true;
                        break;
                    }
                    text.push(sc);
                }
                if !closed {
                    return Err(ParseError::UnterminatedString { line: line.number });
                }
                tokens.push(Token::String(text));
            }
            c if is_identifier_char(c) => {
                let mut ident = String::new();
                while let Some(&ic) = chars.peek() {
                    if !is_identifier_char(ic) {
                        break;
                    }
                    ident.push(ic);
                    chars.next();
                }
                tokens.push(Token::Identifier(ident));
            }
            other => {
                return Err(ParseError::UnexpectedCharacter {
                    line: line.number,
                    found: other,
                });
            }
        }
    }

    Ok(tokens)
}
