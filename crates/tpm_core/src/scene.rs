//! Scene model for TPM content.
//!
//! A [`Scene`] is the semantic view of a TPM file: materials, meshes, skins,
//! bones and instances, cross-referenced by name. It is derived from a
//! [`Document`](crate::tpm::Document) on import, or assembled by a host bridge
//! and lowered back to a document on export.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tpm_math::{pose_matrix, Mat4, Vec3};

use crate::mesh::{Mesh, Skin};
use crate::tpm::{Block, Property};

/// Which texture slot of a material a map path belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapKind {
    Color,
    Bump,
    Opacity,
}

impl MapKind {
    /// Property key used for this map in a `material` block.
    pub fn key(self) -> &'static str {
        match self {
            MapKind::Color => "colormap",
            MapKind::Bump => "bumpmap",
            MapKind::Opacity => "opacitymap",
        }
    }
}

/// A material definition.
///
/// TPM materials are nothing but up to three texture maps. Whether back faces
/// are culled is not stored in the file; hosts set `backface_culling` before
/// export so the alpha-face policy can consult it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material name
    pub name: String,

    /// Path to the colour texture
    pub color_map: Option<String>,

    /// Path to the bump texture
    pub bump_map: Option<String>,

    /// Path to the opacity texture
    pub opacity_map: Option<String>,

    /// Host-side backface culling flag (never written)
    #[serde(default)]
    pub backface_culling: bool,

    /// Unrecognised properties, kept verbatim
    #[serde(default)]
    pub extra: Vec<Property>,
}

impl Material {
    /// Create a material with no maps.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True if the material has an alpha (opacity) input.
    pub fn has_alpha_input(&self) -> bool {
        self.opacity_map.is_some()
    }

    /// Check if this material uses any textures.
    pub fn has_textures(&self) -> bool {
        self.maps().next().is_some()
    }

    /// Present texture maps, in colour, bump, opacity order.
    pub fn maps(&self) -> impl Iterator<Item = (MapKind, &str)> {
        [
            (MapKind::Color, &self.color_map),
            (MapKind::Bump, &self.bump_map),
            (MapKind::Opacity, &self.opacity_map),
        ]
        .into_iter()
        .filter_map(|(kind, path)| path.as_deref().map(|p| (kind, p)))
    }

    /// Mutable access to one map slot.
    pub fn map_mut(&mut self, kind: MapKind) -> &mut Option<String> {
        match kind {
            MapKind::Color => &mut self.color_map,
            MapKind::Bump => &mut self.bump_map,
            MapKind::Opacity => &mut self.opacity_map,
        }
    }
}

/// A placed copy of a mesh or skin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance name
    pub name: String,

    /// Name of the referenced mesh or skin
    pub mesh: String,

    /// Translation
    pub position: Vec3,

    /// Euler rotation in degrees, applied X then Y then Z
    pub rotation: Vec3,

    /// Uniform scale
    pub scale: f32,

    /// Unrecognised properties, kept verbatim
    #[serde(default)]
    pub extra: Vec<Property>,
}

impl Instance {
    /// Create an instance at the origin with unit scale.
    pub fn new(name: impl Into<String>, mesh: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mesh: mesh.into(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: 1.0,
            extra: Vec::new(),
        }
    }

    /// Get the 4x4 model matrix for this instance.
    pub fn model_matrix(&self) -> Mat4 {
        pose_matrix(self.position, self.rotation, self.scale)
    }
}

/// A skeleton joint, named `$J{MeshName}{NN}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    pub position: Vec3,
    /// Euler rotation in degrees, applied X then Y then Z
    pub rotation: Vec3,
    #[serde(default)]
    pub extra: Vec<Property>,
}

impl Bone {
    pub fn new(name: impl Into<String>, position: Vec3, rotation: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            rotation,
            extra: Vec::new(),
        }
    }

    /// Joint pose matrix (unit scale).
    pub fn model_matrix(&self) -> Mat4 {
        pose_matrix(self.position, self.rotation, 1.0)
    }
}

/// A `major.minor.revision` version triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Format version written by this exporter when a scene carries none.
pub const EXPORT_FORMAT_VERSION: Version = Version::new(1, 0, 1);

/// Contents of the `fileinfo` block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// TPM format version (required)
    pub format_version: Version,

    /// Content name
    pub name: Option<String>,

    /// Content version, free text
    pub version: Option<String>,

    /// Source file the content came from
    pub source: Option<String>,

    /// Export timestamp
    pub date: Option<NaiveDateTime>,

    /// Free-form comments
    pub comments: Option<String>,

    /// Unrecognised properties, kept verbatim
    #[serde(default)]
    pub extra: Vec<Property>,
}

impl FileInfo {
    /// Create a file info block with only a format version.
    pub fn new(format_version: Version) -> Self {
        Self {
            format_version,
            name: None,
            version: None,
            source: None,
            date: None,
            comments: None,
            extra: Vec::new(),
        }
    }
}

impl Default for FileInfo {
    fn default() -> Self {
        Self::new(EXPORT_FORMAT_VERSION)
    }
}

/// Borrowed view of whatever an instance points at.
#[derive(Clone, Copy, Debug)]
pub enum Geometry<'a> {
    Mesh(&'a Mesh),
    Skin(&'a Skin),
}

impl<'a> Geometry<'a> {
    /// The underlying mesh data.
    pub fn mesh(&self) -> &'a Mesh {
        match self {
            Geometry::Mesh(mesh) => mesh,
            Geometry::Skin(skin) => &skin.mesh,
        }
    }
}

/// A complete TPM scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Optional `fileinfo` block
    pub file_info: Option<FileInfo>,

    /// Materials, in document order
    pub materials: Vec<Material>,

    /// Plain meshes, in document order
    pub meshes: Vec<Mesh>,

    /// Skinned meshes, in document order
    pub skins: Vec<Skin>,

    /// Bones, in document order
    pub bones: Vec<Bone>,

    /// Instances, in document order
    pub instances: Vec<Instance>,

    /// Blocks of unknown type, kept for output fidelity
    #[serde(default)]
    pub passthrough: Vec<Block>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a material by name.
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// Look up a plain mesh by name.
    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.meshes.iter().find(|m| m.name == name)
    }

    /// Look up a skin by name.
    pub fn skin(&self, name: &str) -> Option<&Skin> {
        self.skins.iter().find(|s| s.name() == name)
    }

    /// Look up a bone by name.
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// Look up an instance by name.
    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }

    /// Look up a mesh or skin by name.
    pub fn geometry(&self, name: &str) -> Option<Geometry<'_>> {
        self.mesh(name)
            .map(Geometry::Mesh)
            .or_else(|| self.skin(name).map(Geometry::Skin))
    }

    /// Get total triangle count across all instances.
    pub fn total_triangle_count(&self) -> usize {
        self.instances
            .iter()
            .filter_map(|instance| self.geometry(&instance.mesh))
            .map(|geometry| geometry.mesh().triangle_count())
            .sum()
    }

    /// True if nothing was built into the scene.
    pub fn is_empty(&self) -> bool {
        self.file_info.is_none()
            && self.materials.is_empty()
            && self.meshes.is_empty()
            && self.skins.is_empty()
            && self.bones.is_empty()
            && self.instances.is_empty()
            && self.passthrough.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Face;

    fn triangle(name: &str) -> Mesh {
        Mesh {
            name: name.to_string(),
            material_names: vec!["Bark".to_string()],
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z],
            uvs: vec![tpm_math::Vec2::ZERO],
            faces: vec![Face {
                vertices: [0, 1, 2],
                uvs: [0, 0, 0],
                normals: [0, 0, 0],
                material: 0,
            }],
            extra: Vec::new(),
        }
    }

    #[test]
    fn test_scene_lookup() {
        let mut scene = Scene::new();
        scene.meshes.push(triangle("Tree"));
        scene.skins.push(Skin::new(triangle("Raptor"), vec![0, 0, 0]));
        scene.instances.push(Instance::new("Tree01", "Tree"));
        scene.instances.push(Instance::new("Raptor01", "Raptor"));
        scene.instances.push(Instance::new("Raptor02", "Raptor"));

        assert!(matches!(scene.geometry("Tree"), Some(Geometry::Mesh(_))));
        assert!(matches!(scene.geometry("Raptor"), Some(Geometry::Skin(_))));
        assert!(scene.geometry("Missing").is_none());
        assert_eq!(scene.total_triangle_count(), 3);
        assert!(!scene.is_empty());
        assert!(Scene::new().is_empty());
    }

    #[test]
    fn test_instance_matrix() {
        let mut instance = Instance::new("I", "Tree");
        instance.position = Vec3::new(1.0, 2.0, 3.0);
        instance.rotation = Vec3::new(0.0, 0.0, 90.0);
        instance.scale = 2.0;

        let p = instance.model_matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 4.0, 3.0)).length() < 0.001);
    }

    #[test]
    fn test_material_maps() {
        let mut material = Material::new("Leaves");
        assert!(!material.has_textures());
        assert!(!material.has_alpha_input());

        material.color_map = Some("leaves.bmp".to_string());
        *material.map_mut(MapKind::Opacity) = Some("leaves_a.bmp".to_string());

        let maps: Vec<(MapKind, &str)> = material.maps().collect();
        assert_eq!(
            maps,
            vec![(MapKind::Color, "leaves.bmp"), (MapKind::Opacity, "leaves_a.bmp")]
        );
        assert!(material.has_alpha_input());
        assert_eq!(MapKind::Bump.key(), "bumpmap");
    }

    #[test]
    fn test_version_display() {
        assert_eq!(EXPORT_FORMAT_VERSION.to_string(), "1.0.1");
        assert_eq!(FileInfo::default().format_version, Version::new(1, 0, 1));
    }
}
