//! Texture path handling for material maps.
//!
//! TPM material maps are plain path strings. On export only the file name is
//! kept. On import a map is looked up relative to a search root, either by
//! file name alone or by its full relative path.

use std::path::{Path, PathBuf};

use crate::options::ImportOptions;

/// The file-name component of a map path.
///
/// Both `/` and `\` count as separators, since TPM files are authored on
/// Windows and read everywhere.
pub fn strip_directories(map: &str) -> &str {
    map.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(map)
}

/// Where texture maps are looked up on import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TexturePathPolicy {
    /// Directory map paths are joined onto
    pub search_root: PathBuf,

    /// Drop the directory part of map paths before joining
    pub strip_directories: bool,
}

impl TexturePathPolicy {
    pub fn new(search_root: impl Into<PathBuf>, strip_directories: bool) -> Self {
        Self {
            search_root: search_root.into(),
            strip_directories,
        }
    }

    /// Policy for a TPM file located in `tpm_dir`.
    ///
    /// The options' texture root overrides the file's own directory.
    pub fn from_options(options: &ImportOptions, tpm_dir: &Path) -> Self {
        let search_root = options
            .texture_root
            .clone()
            .unwrap_or_else(|| tpm_dir.to_path_buf());

        Self::new(search_root, options.strip_texture_directories)
    }

    /// Full path a map is expected at.
    pub fn resolve(&self, map: &str) -> PathBuf {
        if self.strip_directories {
            self.search_root.join(strip_directories(map))
        } else {
            self.search_root.join(map.replace('\\', "/"))
        }
    }

    /// Resolve a map and check it with a host-supplied existence test.
    ///
    /// A missing texture is not an error for the import; it is logged and
    /// `None` is returned so the host can leave the slot empty.
    pub fn locate(&self, map: &str, exists: impl Fn(&Path) -> bool) -> Option<PathBuf> {
        let path = self.resolve(map);
        if exists(&path) {
            Some(path)
        } else {
            log::warn!("Texture `{}` not found at {}", map, path.display());
            None
        }
    }
}
