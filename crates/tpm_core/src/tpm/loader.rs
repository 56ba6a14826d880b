//! High-level TPM import and export.
//!
//! These chain the lower layers: text is parsed into a [`Document`](super::Document), built
//! into a [`Scene`], and on the way out lowered and written back to text.
//!
//! # Example
//!
//! ```ignore
//! use tpm_core::tpm::{parse, serialize};
//! use tpm_core::ExportOptions;
//!
//! let scene = parse(&std::fs::read_to_string("jungle.tpm")?)?;
//! println!("{} instances", scene.instances.len());
//! let text = serialize(&scene, &ExportOptions::default())?;
//! ```

use thiserror::Error;

use super::builder::{build_scene, BuildError, BuildReport};
use super::lower::lower_scene;
use super::parser::{parse_tpm, ParseError};
use super::writer::{write_document, ExportConstraintError};
use crate::options::ExportOptions;
use crate::scene::Scene;

/// Errors from the combined import and export entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TpmError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Export error: {0}")]
    Export(#[from] ExportConstraintError),
}

/// Result type for import and export.
pub type TpmResult<T> = Result<T, TpmError>;

/// Parse and build a scene, failing on the first error of any kind.
pub fn parse(text: &str) -> TpmResult<Scene> {
    let document = parse_tpm(text)?;
    Ok(build_scene(&document).into_scene()?)
}

/// Parse and build a scene, keeping every entity that builds.
///
/// Only syntax errors fail the call; per-entity errors are in the report.
pub fn import(text: &str) -> Result<BuildReport, ParseError> {
    let document = parse_tpm(text)?;
    let report = build_scene(&document);

    if !report.is_clean() {
        log::warn!(
            "Imported with {} entity errors; the scene is partial",
            report.errors.len()
        );
    }
    Ok(report)
}

/// Lower and write a scene as TPM text.
pub fn serialize(scene: &Scene, options: &ExportOptions) -> TpmResult<String> {
    let document = lower_scene(scene, options)?;
    let text = write_document(&document)?;

    log::info!(
        "Exported {} materials, {} meshes, {} skins, {} bones, {} instances",
        scene.materials.len(),
        scene.meshes.len(),
        scene.skins.len(),
        scene.bones.len(),
        scene.instances.len()
    );
    Ok(text)
}
