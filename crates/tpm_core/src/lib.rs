//! TPM Core - Trespasser model import and export.
//!
//! This crate provides:
//!
//! - **TPM text format**: lexing, block parsing, typed value decoding and
//!   deterministic writing ([`tpm`])
//! - **Scene model**: `Scene`, `Material`, `Mesh`, `Skin`, `Bone`, `Instance`
//! - **Export rules**: alpha-face emission policies ([`faces`]) and
//!   vertex-group to bone binding ([`skin`])
//! - **Host bridge**: [`SceneSink`] / [`SceneSource`] traits for applications
//!   that own the real scene graph
//!
//! # Example
//!
//! ```ignore
//! use tpm_core::tpm::{import, serialize};
//! use tpm_core::ExportOptions;
//!
//! let report = import(&std::fs::read_to_string("raptor.tpm")?)?;
//! for err in &report.errors {
//!     eprintln!("skipped: {err}");
//! }
//! let text = serialize(&report.scene, &ExportOptions::default())?;
//! ```

pub mod bridge;
pub mod faces;
pub mod mesh;
pub mod options;
pub mod scene;
pub mod skin;
pub mod texture;
pub mod tpm;

// Re-export commonly used types
pub use bridge::{collect_scene, export_from, import_into, BridgeError, SceneSink, SceneSource};
pub use faces::AlphaFacePolicy;
pub use mesh::{Face, Mesh, Skin};
pub use options::{ExportOptions, ImportOptions};
pub use scene::{Bone, FileInfo, Instance, Material, Scene, Version};
pub use tpm::{import, parse, serialize, TpmError};
