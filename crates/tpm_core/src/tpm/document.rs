//! Raw TPM document types.
//!
//! A [`Document`] is the syntactic view of a TPM file: typed, optionally named
//! blocks holding `key = value` properties whose values are still undecoded
//! text. Keys may repeat (that is how arrays are encoded), so properties are an
//! ordered list rather than a map.

use serde::{Deserialize, Serialize};

/// A single `key = value` entry inside a block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Property {
    /// Property key (an identifier)
    pub key: String,

    /// Raw value text, trimmed, exactly as it appeared after the first `=`
    pub value: String,

    /// 1-based source line (0 for properties built in memory)
    #[serde(default)]
    pub line: usize,
}

impl Property {
    /// Create a property that did not come from a source file.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            line: 0,
        }
    }
}

// Source positions are diagnostics only.
impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

/// A typed block such as `mesh "Box" { ... }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Block type identifier (`mesh`, `material`, ...)
    pub block_type: String,

    /// Block name, without its enclosing quotes
    pub name: Option<String>,

    /// Properties in source order, duplicates retained
    pub properties: Vec<Property>,

    /// 1-based line of the block header (0 for blocks built in memory)
    #[serde(default)]
    pub line: usize,
}

impl Block {
    /// Create an empty block.
    pub fn new(block_type: impl Into<String>, name: Option<String>) -> Self {
        Self {
            block_type: block_type.into(),
            name,
            properties: Vec::new(),
            line: 0,
        }
    }

    /// Append a property.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.push(Property::new(key, value));
    }

    /// Builder-style variant of [`Block::push`].
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// First property with the given key.
    pub fn first(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// All properties with the given key, in source order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Property> + 'a {
        self.properties.iter().filter(move |p| p.key == key)
    }

    /// Number of properties with the given key.
    pub fn count(&self, key: &str) -> usize {
        self.all(key).count()
    }

    /// Human-readable label used in diagnostics, e.g. `mesh "Box"`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} \"{}\"", self.block_type, name),
            None => self.block_type.clone(),
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.block_type == other.block_type
            && self.name == other.name
            && self.properties == other.properties
    }
}

/// An ordered sequence of blocks, as parsed or as about to be written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block.
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True if the document holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks of the given type, in document order.
    pub fn blocks_of_type<'a>(&'a self, block_type: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.block_type == block_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_keys_kept_in_order() {
        let block = Block::new("mesh", Some("Box".to_string()))
            .with_property("m", "\"a\"")
            .with_property("v", "(0,0,0)")
            .with_property("m", "\"b\"");

        let materials: Vec<&str> = block.all("m").map(|p| p.value.as_str()).collect();
        assert_eq!(materials, vec!["\"a\"", "\"b\""]);
        assert_eq!(block.count("m"), 2);
        assert_eq!(block.first("v").map(|p| p.value.as_str()), Some("(0,0,0)"));
        assert!(block.first("f").is_none());
    }

    #[test]
    fn test_equality_ignores_lines() {
        let mut a = Block::new("bone", Some("$JArm00".to_string())).with_property("position", "(0,0,0)");
        let b = a.clone();
        a.line = 12;
        a.properties[0].line = 14;
        assert_eq!(a, b);
    }

    #[test]
    fn test_label() {
        assert_eq!(Block::new("fileinfo", None).label(), "fileinfo");
        assert_eq!(Block::new("mesh", Some("Box".to_string())).label(), "mesh \"Box\"");
    }
}
