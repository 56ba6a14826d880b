//! Import and export settings.
//!
//! Plain data with `serde` support so hosts can persist them between sessions.
//! Missing fields take their defaults when deserializing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::faces::AlphaFacePolicy;
use crate::scene::FileInfo;

/// Settings for reading TPM files into a host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Search textures here instead of next to the TPM file
    pub texture_root: Option<PathBuf>,

    /// Look textures up by file name only
    pub strip_texture_directories: bool,

    /// Replace host materials that share a name with an imported one
    pub overwrite_existing_materials: bool,

    /// Place imported objects in the host's active collection
    pub import_to_active_collection: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            texture_root: None,
            strip_texture_directories: true,
            overwrite_existing_materials: false,
            import_to_active_collection: false,
        }
    }
}

/// Settings for writing a scene as TPM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// How faces with alpha materials are emitted
    pub alpha_faces: AlphaFacePolicy,

    /// Mirror the normals of emitted back faces across the face plane
    pub reflect_back_normals: bool,

    /// Stable-sort each mesh's faces by material slot
    pub sort_faces_by_material: bool,

    /// Written when the scene has no file info; `None` omits the block
    pub default_file_info: Option<FileInfo>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            alpha_faces: AlphaFacePolicy::default(),
            reflect_back_normals: false,
            sort_faces_by_material: false,
            default_file_info: Some(FileInfo::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::EXPORT_FORMAT_VERSION;

    #[test]
    fn test_defaults() {
        let import = ImportOptions::default();
        assert!(import.strip_texture_directories);
        assert!(!import.overwrite_existing_materials);

        let export = ExportOptions::default();
        assert_eq!(export.alpha_faces, AlphaFacePolicy::ForwardOnly);
        assert_eq!(
            export.default_file_info.map(|info| info.format_version),
            Some(EXPORT_FORMAT_VERSION)
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: ExportOptions =
            serde_json::from_str(r#"{ "alpha_faces": "double_sided" }"#).unwrap();
        assert_eq!(options.alpha_faces, AlphaFacePolicy::DoubleSided);
        assert!(!options.sort_faces_by_material);
        assert!(options.default_file_info.is_some());

        let options: ImportOptions =
            serde_json::from_str(r#"{ "texture_root": "/textures" }"#).unwrap();
        assert_eq!(options.texture_root, Some(PathBuf::from("/textures")));
        assert!(options.strip_texture_directories);
    }

    #[test]
    fn test_json_round_trip() {
        let options = ExportOptions {
            alpha_faces: AlphaFacePolicy::MaterialDependent,
            reflect_back_normals: true,
            sort_faces_by_material: true,
            default_file_info: None,
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: ExportOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
