//! TPM text output.
//!
//! Writes a [`Document`] in the layout TPM tools expect:
//!
//! ```text
//! mesh "Box"
//! {
//!     v = (0,0,0)
//! }
//!
//! ```
//!
//! One tab indents each property and a blank line follows every block.

use thiserror::Error;

use super::document::{Block, Document};
use super::lexer::is_identifier;

/// Values the text format cannot represent.
///
/// `context` names where the value came from, e.g. `material "Bark" colormap`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportConstraintError {
    #[error("{context}: strings cannot contain '\"'")]
    QuoteInString { context: String },

    #[error("{context}: strings cannot contain line breaks")]
    LineBreakInString { context: String },

    #[error("{context}: value is empty")]
    EmptyValue { context: String },

    #[error("{context}: value has leading or trailing whitespace")]
    PaddedValue { context: String },

    #[error("{context}: value has an unmatched '\"'")]
    UnbalancedQuotes { context: String },

    #[error("{context}: number is not finite")]
    NonFiniteNumber { context: String },

    #[error("`{identifier}` is not a valid block type or property key")]
    InvalidIdentifier { identifier: String },
}

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Check text that will be written inside double quotes.
pub fn check_string(context: &str, s: &str) -> Result<(), ExportConstraintError> {
    if s.contains('"') {
        return Err(ExportConstraintError::QuoteInString {
            context: context.to_string(),
        });
    }
    if s.contains(is_line_break) {
        return Err(ExportConstraintError::LineBreakInString {
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Check a raw property value reads back unchanged.
pub fn check_value(context: &str, value: &str) -> Result<(), ExportConstraintError> {
    let context = || context.to_string();

    if value.contains(is_line_break) {
        return Err(ExportConstraintError::LineBreakInString { context: context() });
    }
    if value.trim().is_empty() {
        return Err(ExportConstraintError::EmptyValue { context: context() });
    }
    if value.trim() != value {
        return Err(ExportConstraintError::PaddedValue { context: context() });
    }
    if value.matches('"').count() % 2 != 0 {
        return Err(ExportConstraintError::UnbalancedQuotes { context: context() });
    }
    Ok(())
}

fn check_identifier(identifier: &str) -> Result<(), ExportConstraintError> {
    if is_identifier(identifier) {
        Ok(())
    } else {
        Err(ExportConstraintError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

fn write_block(out: &mut String, block: &Block) -> Result<(), ExportConstraintError> {
    check_identifier(&block.block_type)?;

    match &block.name {
        Some(name) => {
            check_string(&block.label(), name)?;
            out.push_str(&format!("{} \"{}\"\n", block.block_type, name));
        }
        None => {
            out.push_str(&format!("{}\n", block.block_type));
        }
    }
    out.push_str("{\n");

    for property in &block.properties {
        check_identifier(&property.key)?;
        check_value(
            &format!("{} {}", block.label(), property.key),
            &property.value,
        )?;
        out.push_str(&format!("\t{} = {}\n", property.key, property.value));
    }

    out.push_str("}\n\n");
    Ok(())
}

/// Render a document as TPM text.
pub fn write_document(document: &Document) -> Result<String, ExportConstraintError> {
    let mut out = String::new();

    for block in &document.blocks {
        write_block(&mut out, block)?;
    }

    log::debug!(
        "Wrote TPM document with {} blocks ({} bytes)",
        document.len(),
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm::parse_tpm;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_layout() {
        let mut doc = Document::new();
        doc.push(Block::new("fileinfo", None).with_property("formatversion", "1.0.1"));
        doc.push(
            Block::new("material", Some("Bark".to_string()))
                .with_property("colormap", "\"bark.bmp\""),
        );

        let text = write_document(&doc).unwrap();
        assert_eq!(
            text,
            "fileinfo\n{\n\tformatversion = 1.0.1\n}\n\nmaterial \"Bark\"\n{\n\tcolormap = \"bark.bmp\"\n}\n\n"
        );
    }

    #[test]
    fn test_parse_write_parse_is_stable() {
        let source = r#"
// header comment
fileinfo
{
formatversion = 1.0.1
}
mesh "Box" {
   m = "a"
   m = "b"
   v = (0, 0, 0)
   note = 1 // kept
}
custom
{
}
"#;
        let doc = parse_tpm(source).unwrap();
        let text = write_document(&doc).unwrap();
        let reparsed = parse_tpm(&text).unwrap();
        assert_eq!(reparsed, doc);
        assert_eq!(write_document(&reparsed).unwrap(), text);
    }

    #[test]
    fn test_quote_in_name_rejected() {
        let mut doc = Document::new();
        doc.push(Block::new("material", Some("Bad\"Name".to_string())));

        assert!(matches!(
            write_document(&doc),
            Err(ExportConstraintError::QuoteInString { .. })
        ));
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        let mut doc = Document::new();
        doc.push(Block::new("bad type", None));
        assert_eq!(
            write_document(&doc).unwrap_err(),
            ExportConstraintError::InvalidIdentifier {
                identifier: "bad type".to_string()
            }
        );

        let mut doc = Document::new();
        doc.push(Block::new("mesh", Some("A".to_string())).with_property("x y", "1"));
        assert!(matches!(
            write_document(&doc),
            Err(ExportConstraintError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_line_break_rejected() {
        assert!(matches!(
            check_string("fileinfo comments", "two\nlines"),
            Err(ExportConstraintError::LineBreakInString { .. })
        ));

        let mut doc = Document::new();
        doc.push(Block::new("custom", None).with_property("value", "a\rb"));
        assert!(matches!(
            write_document(&doc),
            Err(ExportConstraintError::LineBreakInString { .. })
        ));
    }

    #[test]
    fn test_unreadable_values_rejected() {
        let write = |value: &str| {
            let mut doc = Document::new();
            doc.push(Block::new("fileinfo", None).with_property("version", value));
            write_document(&doc)
        };

        assert_eq!(
            write("").unwrap_err(),
            ExportConstraintError::EmptyValue {
                context: "fileinfo version".to_string()
            }
        );
        assert!(matches!(
            write("  "),
            Err(ExportConstraintError::EmptyValue { .. })
        ));
        assert!(matches!(
            write(" 2"),
            Err(ExportConstraintError::PaddedValue { .. })
        ));
        assert!(matches!(
            write("\"open"),
            Err(ExportConstraintError::UnbalancedQuotes { .. })
        ));
        assert!(write("\"a\",\"b\"").is_ok());
    }
}
