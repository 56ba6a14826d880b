//! Mesh and skin geometry for the TPM scene model.
//!
//! Geometry is stored the way TPM stores it: parallel arrays of positions,
//! normals and texture coordinates, and triangles that index each array
//! separately. Indices are 0-based in memory; the wire format is 1-based.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tpm_math::{Vec2, Vec3};

use crate::tpm::{BuildError, Property};

/// A triangle with separate vertex, texture-coordinate and normal indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    /// Indices into [`Mesh::positions`]
    pub vertices: [u32; 3],

    /// Indices into [`Mesh::uvs`]
    pub uvs: [u32; 3],

    /// Indices into [`Mesh::normals`]
    pub normals: [u32; 3],

    /// Index into [`Mesh::material_names`]
    pub material: u32,
}

impl Face {
    /// Create a face whose three index triples are identical.
    pub fn uniform(indices: [u32; 3], material: u32) -> Self {
        Self {
            vertices: indices,
            uvs: indices,
            normals: indices,
            material,
        }
    }

    /// The same triangle wound the other way: `(a, b, c) -> (a, c, b)`.
    pub fn reversed(&self) -> Self {
        let flip = |[a, b, c]: [u32; 3]| [a, c, b];
        Self {
            vertices: flip(self.vertices),
            uvs: flip(self.uvs),
            normals: flip(self.normals),
            material: self.material,
        }
    }
}

/// A triangle mesh as stored in a `mesh` block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Mesh name (unique among meshes and skins)
    pub name: String,

    /// Material slots, by material name
    pub material_names: Vec<String>,

    /// Vertex positions
    pub positions: Vec<Vec3>,

    /// Normals, referenced per face corner
    pub normals: Vec<Vec3>,

    /// Texture coordinates, referenced per face corner
    pub uvs: Vec<Vec2>,

    /// Triangles
    pub faces: Vec<Face>,

    /// Unrecognised properties, kept verbatim
    #[serde(default)]
    pub extra: Vec<Property>,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Axis-aligned bounds of the vertex positions, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Name of the material assigned to a face, if its slot exists.
    pub fn face_material(&self, face: &Face) -> Option<&str> {
        self.material_names.get(face.material as usize).map(String::as_str)
    }

    /// Check that every face index is within the bounds of its array.
    ///
    /// `block` names the block type for diagnostics (`mesh` or `skin`).
    pub fn check_indices(&self, block: &str) -> Result<(), BuildError> {
        for (i, face) in self.faces.iter().enumerate() {
            let arrays: [(&'static str, &[u32; 3], usize); 3] = [
                ("vertex", &face.vertices, self.positions.len()),
                ("texture coordinate", &face.uvs, self.uvs.len()),
                ("normal", &face.normals, self.normals.len()),
            ];

            for (what, indices, len) in arrays {
                if let Some(&index) = indices.iter().find(|&&idx| idx as usize >= len) {
                    return Err(BuildError::IndexOutOfRange {
                        mesh: self.name.clone(),
                        face: i + 1,
                        what,
                        index: index + 1,
                        len,
                    });
                }
            }

            if face.material as usize >= self.material_names.len() {
                return Err(BuildError::DanglingReference {
                    entity: format!("{} \"{}\"", block, self.name),
                    target: format!("material slot {}", face.material + 1),
                });
            }
        }
        Ok(())
    }
}

/// A skinned mesh: a mesh whose vertices each follow one bone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    /// Geometry, exactly as for a plain mesh
    pub mesh: Mesh,

    /// Bone index per vertex (parallel to `mesh.positions`)
    pub bone_indices: Vec<u8>,

    /// Bone index -> bone name
    pub bones: BTreeMap<u8, String>,
}

impl Skin {
    /// Create a skin from geometry and per-vertex bone indices.
    pub fn new(mesh: Mesh, bone_indices: Vec<u8>) -> Self {
        Self {
            mesh,
            bone_indices,
            bones: BTreeMap::new(),
        }
    }

    /// Skin name.
    pub fn name(&self) -> &str {
        &self.mesh.name
    }

    /// Name of the bone driving a vertex, if it is known.
    pub fn vertex_bone(&self, vertex: usize) -> Option<&str> {
        let index = self.bone_indices.get(vertex)?;
        self.bones.get(index).map(String::as_str)
    }

    /// Bone indices used by at least one vertex, ascending.
    pub fn used_bone_indices(&self) -> Vec<u8> {
        let mut used: Vec<u8> = self.bone_indices.clone();
        used.sort_unstable();
        used.dedup();
        used
    }
}
