//! TPM text format support.
//!
//! TPM is the plain-text model format used by Trespasser tools: a sequence of
//! typed, optionally named blocks holding `key = value` properties.
//!
//! ```text
//! // comment
//! material "Bark"
//! {
//!     colormap = "bark.bmp"
//! }
//! ```
//!
//! Reading goes text -> [`Document`] ([`parse_tpm`]) -> [`Scene`](crate::Scene)
//! ([`build_scene`]). Writing goes back through [`lower_scene`] and
//! [`write_document`]. [`parse`], [`import`] and [`serialize`] chain the steps.

pub mod builder;
pub mod decode;
pub mod document;
pub mod lexer;
pub mod loader;
pub mod lower;
pub mod parser;
pub mod writer;

pub use builder::{build_scene, BuildError, BuildReport};
pub use decode::DecodeError;
pub use document::{Block, Document, Property};
pub use loader::{import, parse, serialize, TpmError, TpmResult};
pub use lower::lower_scene;
pub use parser::{parse_tpm, ParseError, ParseResult};
pub use writer::{write_document, ExportConstraintError};
