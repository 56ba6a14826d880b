//! Export-time handling of faces whose material has an alpha input.
//!
//! TPM triangles are single-sided. A see-through surface authored as
//! double-sided in a host therefore has to be written as two triangles, one
//! per winding, when it should stay visible from behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tpm_math::{reflect_across_plane, triangle_normal, Vec3};

use crate::mesh::{Face, Mesh};
use crate::scene::Material;

/// How faces with an alpha-bearing material are emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaFacePolicy {
    /// Emit every face once
    #[default]
    ForwardOnly,

    /// Emit alpha faces in both windings
    DoubleSided,

    /// Emit a back face unless the material culls back faces
    MaterialDependent,
}

/// The two material attributes the resolver looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceMaterial {
    pub has_alpha_input: bool,
    pub backface_culling: bool,
}

impl FaceMaterial {
    pub fn new(has_alpha_input: bool, backface_culling: bool) -> Self {
        Self {
            has_alpha_input,
            backface_culling,
        }
    }

    /// Attributes of a scene material.
    pub fn of(material: &Material) -> Self {
        Self::new(material.has_alpha_input(), material.backface_culling)
    }

    /// Whether a face with these attributes gets a back face under `policy`.
    pub fn needs_back_face(&self, policy: AlphaFacePolicy) -> bool {
        if !self.has_alpha_input {
            return false;
        }
        match policy {
            AlphaFacePolicy::ForwardOnly => false,
            AlphaFacePolicy::DoubleSided => true,
            AlphaFacePolicy::MaterialDependent => !self.backface_culling,
        }
    }
}

/// Which winding an emitted face has relative to its source face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Facing {
    Front,
    Back,
}

/// Resolve alpha faces, tagging every emitted face with its facing.
///
/// `attributes` runs parallel to `faces`; a face without an entry is treated
/// as opaque. Output keeps source order, and a back face immediately follows
/// its forward face.
pub fn resolve_alpha_faces_tagged(
    faces: &[Face],
    attributes: &[FaceMaterial],
    policy: AlphaFacePolicy,
) -> Vec<(Face, Facing)> {
    let mut out = Vec::with_capacity(faces.len());

    for (i, face) in faces.iter().enumerate() {
        out.push((*face, Facing::Front));

        let attrs = attributes.get(i).copied().unwrap_or_default();
        if attrs.needs_back_face(policy) {
            out.push((face.reversed(), Facing::Back));
        }
    }

    out
}

/// Resolve alpha faces into the final face list.
pub fn resolve_alpha_faces(
    faces: &[Face],
    attributes: &[FaceMaterial],
    policy: AlphaFacePolicy,
) -> Vec<Face> {
    resolve_alpha_faces_tagged(faces, attributes, policy)
        .into_iter()
        .map(|(face, _)| face)
        .collect()
}

/// Give back faces their own normals, mirrored across the face plane.
///
/// Each normal a back face references is reflected across the plane of the
/// triangle and appended to `mesh.normals`; the back face is repointed at the
/// new normals. Equal reflected normals are appended once. Degenerate
/// triangles and out-of-range indices are left alone.
pub fn reflect_back_normals(mesh: &mut Mesh, tagged: &mut [(Face, Facing)]) {
    let mut shared: HashMap<[u32; 3], u32> = HashMap::new();

    for (face, facing) in tagged.iter_mut() {
        if *facing != Facing::Back {
            continue;
        }

        let corners: Option<Vec<Vec3>> = face
            .vertices
            .iter()
            .map(|&v| mesh.positions.get(v as usize).copied())
            .collect();
        let Some(plane) = corners.and_then(|c| triangle_normal(c[0], c[1], c[2])) else {
            continue;
        };

        let mut reflected = face.normals;
        for slot in reflected.iter_mut() {
            let Some(&normal) = mesh.normals.get(*slot as usize) else {
                continue;
            };

            let mirrored = reflect_across_plane(normal, plane);
            let key = mirrored.to_array().map(f32::to_bits);
            *slot = *shared.entry(key).or_insert_with(|| {
                mesh.normals.push(mirrored);
                (mesh.normals.len() - 1) as u32
            });
        }
        face.normals = reflected;
    }
}
