//! TPM block parser.
//!
//! Turns significant lines into a [`Document`]. The grammar is small:
//!
//! ```text
//! document := block*
//! block    := block-type ["block-name"] "{" property* "}"
//! property := key "=" raw-value
//! ```
//!
//! The opening brace may sit on the header line or on its own line. Property
//! values are kept as raw text; their grammar depends on the key and is
//! handled by [`super::decode`].

use std::collections::VecDeque;

use thiserror::Error;

use super::document::{Block, Document, Property};
use super::lexer::{is_identifier, significant_lines, tokenize, SourceLine, Token};

/// Errors that can occur while parsing TPM text.
///
/// Parse errors are fatal for the whole document; every variant carries the
/// 1-based line it was detected on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unterminated string on line {line}")]
    UnterminatedString { line: usize },

    #[error("Unexpected character '{found}' on line {line}")]
    UnexpectedCharacter { line: usize, found: char },

    #[error("Malformed block header on line {line}: expected a block type and optional quoted name")]
    MalformedHeader { line: usize },

    #[error("Expected '{{' on line {line}")]
    ExpectedOpenBrace { line: usize },

    #[error("Malformed property on line {line}: expected `key = value` or '}}'")]
    MalformedProperty { line: usize },

    #[error("Unbalanced brace on line {line}")]
    UnbalancedBlock { line: usize },

    #[error("Unexpected end of file inside block starting on line {line}")]
    UnexpectedEof { line: usize },
}

impl ParseError {
    /// Line the error was reported on.
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnterminatedString { line }
            | ParseError::UnexpectedCharacter { line, .. }
            | ParseError::MalformedHeader { line }
            | ParseError::ExpectedOpenBrace { line }
            | ParseError::MalformedProperty { line }
            | ParseError::UnbalancedBlock { line }
            | ParseError::UnexpectedEof { line } => *line,
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// TPM file parser.
pub struct TpmParser {
    lines: VecDeque<SourceLine>,
}

impl TpmParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> Self {
        Self {
            lines: significant_lines(content).into(),
        }
    }

    /// Parse the whole input into a document.
    pub fn parse(&mut self) -> ParseResult<Document> {
        let mut document = Document::new();

        while let Some(header) = self.lines.pop_front() {
            document.push(self.parse_block(header)?);
        }

        log::debug!("Parsed TPM document with {} blocks", document.len());
        Ok(document)
    }

    /// Parse one block, starting from its header line.
    fn parse_block(&mut self, header: SourceLine) -> ParseResult<Block> {
        let (block_type, name, has_brace) = self.parse_header(&header)?;

        if !has_brace {
            self.expect_opening_brace(header.number)?;
        }

        let mut block = Block::new(block_type, name);
        block.line = header.number;

        loop {
            let line = match self.lines.pop_front() {
                Some(line) => line,
                None => return Err(ParseError::UnexpectedEof { line: header.number }),
            };

            if line.text == "}" {
                break;
            }

            block.properties.push(Self::parse_property(&line)?);
        }

        Ok(block)
    }

    /// Parse `type ["name"] [{]`.
    fn parse_header(&self, line: &SourceLine) -> ParseResult<(String, Option<String>, bool)> {
        let mut tokens = tokenize(line)?.into_iter();

        let block_type = match tokens.next() {
            Some(Token::Identifier(ident)) => ident,
            Some(Token::OpenBrace) | Some(Token::CloseBrace) => {
                return Err(ParseError::UnbalancedBlock { line: line.number })
            }
            _ => return Err(ParseError::MalformedHeader { line: line.number }),
        };

        let mut name = None;
        let mut has_brace = false;
        let mut next = tokens.next();

        if let Some(Token::String(s)) = next {
            name = Some(s);
            next = tokens.next();
        }

        if let Some(Token::OpenBrace) = next {
            has_brace = true;
            next = tokens.next();
        }

        if next.is_some() {
            return Err(ParseError::MalformedHeader { line: line.number });
        }

        Ok((block_type, name, has_brace))
    }

    /// Expect and consume a line holding only `{`.
    fn expect_opening_brace(&mut self, header_line: usize) -> ParseResult<()> {
        match self.lines.pop_front() {
            Some(line) if line.text == "{" => Ok(()),
            Some(line) => Err(ParseError::ExpectedOpenBrace { line: line.number }),
            None => Err(ParseError::UnexpectedEof { line: header_line }),
        }
    }

    /// Parse a `key = value` line. The value is everything after the first `=`.
    fn parse_property(line: &SourceLine) -> ParseResult<Property> {
        let Some((key, value)) = line.text.split_once('=') else {
            if line.text.contains('{') {
                return Err(ParseError::UnbalancedBlock { line: line.number });
            }
            return Err(ParseError::MalformedProperty { line: line.number });
        };

        let key = key.trim();
        let value = value.trim();

        if !is_identifier(key) || value.is_empty() {
            return Err(ParseError::MalformedProperty { line: line.number });
        }

        // Strings have no escapes, so an odd quote count cannot close
        if value.matches('"').count() % 2 != 0 {
            return Err(ParseError::UnterminatedString { line: line.number });
        }

        Ok(Property {
            key: key.to_string(),
            value: value.to_string(),
            line: line.number,
        })
    }
}

/// Parse TPM text into a raw document.
pub fn parse_tpm(content: &str) -> ParseResult<Document> {
    let mut parser = TpmParser::new(content);
    parser.parse()
}
