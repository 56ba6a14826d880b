//! Semantic scene building.
//!
//! Interprets the blocks of a parsed [`Document`] as materials, meshes, skins,
//! bones and instances. Building runs in two passes: the first decodes each
//! block on its own, the second checks face indices and resolves the
//! name references between entities.
//!
//! Failures are per entity. A block that fails is left out of the scene and
//! its error is collected in the [`BuildReport`]; everything else still builds.
//! An instance whose mesh failed is therefore reported as dangling.

use std::collections::HashSet;

use thiserror::Error;

use super::decode::{
    decode_face, decode_float, decode_skin_vertex, decode_string, decode_timestamp, decode_vec2,
    decode_vec3, decode_version, DecodeError, DecodeResult,
};
use super::document::{Block, Document, Property};
use crate::mesh::{Mesh, Skin};
use crate::scene::{Bone, FileInfo, Instance, Material, MapKind, Scene};
use crate::skin::{bones_for_skin, check_bone_name, MAX_BONE_INDEX};

/// Errors that can occur while building scene entities.
///
/// `entity` fields hold the block label, e.g. `mesh "Box"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("{block_type} block on line {line} has no name")]
    MissingName { block_type: String, line: usize },

    #[error("{entity} is missing required property `{key}`")]
    MissingProperty { entity: String, key: String },

    #[error("{entity} has more than one `{key}`")]
    DuplicateUnique { entity: String, key: String },

    #[error("{entity} is defined more than once")]
    DuplicateName { entity: String },

    #[error("{entity}: invalid `{key}` on line {line}: {source}")]
    InvalidValue {
        entity: String,
        key: String,
        line: usize,
        source: DecodeError,
    },

    #[error("mesh \"{mesh}\" face {face}: {what} index {index} is out of range ({len} available)")]
    IndexOutOfRange {
        mesh: String,
        face: usize,
        what: &'static str,
        index: u32,
        len: usize,
    },

    #[error("{entity} references missing {target}")]
    DanglingReference { entity: String, target: String },

    #[error("`{name}` is not a valid bone name (expected a two-digit bone index suffix)")]
    InvalidBoneName { name: String },

    #[error("skin \"{skin}\" vertex {vertex}: bone index {index} is greater than 99")]
    InvalidBoneIndex { skin: String, vertex: usize, index: u32 },

    #[error("skin \"{skin}\": groups `{first}` and `{second}` both map to bone {index:02}")]
    DuplicateBoneIndex {
        skin: String,
        index: u8,
        first: String,
        second: String,
    },

    #[error("skin \"{skin}\" vertex {vertex} belongs to no bone group")]
    UnboundVertex { skin: String, vertex: usize },

    #[error("skin \"{skin}\" has {vertices} vertices but {bone_indices} bone indices")]
    BoneCountMismatch {
        skin: String,
        vertices: usize,
        bone_indices: usize,
    },
}

/// Outcome of building a scene: every entity that built, plus the errors of
/// those that did not.
#[derive(Clone, Debug, Default)]
pub struct BuildReport {
    pub scene: Scene,
    pub errors: Vec<BuildError>,
}

impl BuildReport {
    /// True if every block built.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// The scene, or the first error if any entity failed.
    pub fn into_scene(self) -> Result<Scene, BuildError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.scene),
        }
    }
}

const FILE_INFO_KEYS: &[&str] = &["formatversion", "name", "version", "source", "date", "comments"];
const MATERIAL_KEYS: &[&str] = &["colormap", "bumpmap", "opacitymap"];
const BONE_KEYS: &[&str] = &["position", "rotation"];
const INSTANCE_KEYS: &[&str] = &["mesh", "position", "rotation", "scale"];

/// Typed access to the properties of one block.
struct BlockReader<'a> {
    block: &'a Block,
    entity: String,
}

impl<'a> BlockReader<'a> {
    fn new(block: &'a Block) -> Self {
        Self {
            block,
            entity: block.label(),
        }
    }

    fn decode<T>(
        &self,
        property: &Property,
        decode: impl FnOnce(&str) -> DecodeResult<T>,
    ) -> Result<T, BuildError> {
        decode(&property.value).map_err(|source| BuildError::InvalidValue {
            entity: self.entity.clone(),
            key: property.key.clone(),
            line: property.line,
            source,
        })
    }

    /// The single occurrence of a key, if any.
    fn unique(&self, key: &str) -> Result<Option<&'a Property>, BuildError> {
        let mut found = self.block.properties.iter().filter(|p| p.key == key);
        let first = found.next();

        if found.next().is_some() {
            return Err(BuildError::DuplicateUnique {
                entity: self.entity.clone(),
                key: key.to_string(),
            });
        }
        Ok(first)
    }

    fn optional<T>(
        &self,
        key: &str,
        decode: impl FnOnce(&str) -> DecodeResult<T>,
    ) -> Result<Option<T>, BuildError> {
        self.unique(key)?
            .map(|property| self.decode(property, decode))
            .transpose()
    }

    fn required<T>(
        &self,
        key: &str,
        decode: impl FnOnce(&str) -> DecodeResult<T>,
    ) -> Result<T, BuildError> {
        self.optional(key, decode)?
            .ok_or_else(|| BuildError::MissingProperty {
                entity: self.entity.clone(),
                key: key.to_string(),
            })
    }

    /// Properties whose key is not in `known`, in order.
    fn extra(&self, known: &[&str]) -> Vec<Property> {
        self.block
            .properties
            .iter()
            .filter(|p| !known.contains(&p.key.as_str()))
            .cloned()
            .collect()
    }
}

fn text(raw: &str) -> DecodeResult<String> {
    Ok(decode_string(raw))
}

/// Reserve a name within one collection.
fn claim(names: &mut HashSet<String>, block: &Block, name: &str) -> Result<(), BuildError> {
    if names.insert(name.to_string()) {
        Ok(())
    } else {
        Err(BuildError::DuplicateName {
            entity: block.label(),
        })
    }
}

/// Builds a [`Scene`] from document blocks.
struct SceneBuilder {
    scene: Scene,
    errors: Vec<BuildError>,

    seen_file_info: bool,
    material_names: HashSet<String>,
    geometry_names: HashSet<String>,
    bone_names: HashSet<String>,
    instance_names: HashSet<String>,

    /// Decoded but not yet cross-checked
    pending_meshes: Vec<Mesh>,
    pending_skins: Vec<Skin>,
    pending_instances: Vec<Instance>,
}

impl SceneBuilder {
    fn new() -> Self {
        Self {
            scene: Scene::new(),
            errors: Vec::new(),
            seen_file_info: false,
            material_names: HashSet::new(),
            geometry_names: HashSet::new(),
            bone_names: HashSet::new(),
            instance_names: HashSet::new(),
            pending_meshes: Vec::new(),
            pending_skins: Vec::new(),
            pending_instances: Vec::new(),
        }
    }

    fn report(&mut self, err: BuildError) {
        log::warn!("{}", err);
        self.errors.push(err);
    }

    fn process_block(&mut self, block: &Block) {
        let result = match block.block_type.as_str() {
            "fileinfo" => self.process_file_info(block),
            "material" => self.process_material(block),
            "mesh" => self.process_mesh(block),
            "skin" => self.process_skin(block),
            "bone" => self.process_bone(block),
            "instance" => self.process_instance(block),
            other => {
                log::debug!("Keeping unknown block `{}` from line {}", other, block.line);
                self.scene.passthrough.push(block.clone());
                Ok(())
            }
        };

        if let Err(err) = result {
            self.report(err);
        }
    }

    fn block_name(block: &Block) -> Result<&str, BuildError> {
        block.name.as_deref().ok_or_else(|| BuildError::MissingName {
            block_type: block.block_type.clone(),
            line: block.line,
        })
    }

    fn process_file_info(&mut self, block: &Block) -> Result<(), BuildError> {
        if std::mem::replace(&mut self.seen_file_info, true) {
            return Err(BuildError::DuplicateUnique {
                entity: block.label(),
                key: "fileinfo".to_string(),
            });
        }

        let reader = BlockReader::new(block);
        self.scene.file_info = Some(FileInfo {
            format_version: reader.required("formatversion", decode_version)?,
            name: reader.optional("name", text)?,
            version: reader.optional("version", text)?,
            source: reader.optional("source", text)?,
            date: reader.optional("date", decode_timestamp)?,
            comments: reader.optional("comments", text)?,
            extra: reader.extra(FILE_INFO_KEYS),
        });
        Ok(())
    }

    fn process_material(&mut self, block: &Block) -> Result<(), BuildError> {
        let name = Self::block_name(block)?;
        claim(&mut self.material_names, block, name)?;

        let reader = BlockReader::new(block);
        let mut material = Material::new(name);
        for kind in [MapKind::Color, MapKind::Bump, MapKind::Opacity] {
            *material.map_mut(kind) = reader.optional(kind.key(), text)?;
        }
        material.extra = reader.extra(MATERIAL_KEYS);

        self.scene.materials.push(material);
        Ok(())
    }

    /// Decode the parallel arrays shared by `mesh` and `skin` blocks.
    ///
    /// Skin vertices also carry a bone index, returned alongside.
    fn read_geometry(
        reader: &BlockReader<'_>,
        name: &str,
        skinned: bool,
    ) -> Result<(Mesh, Vec<u32>), BuildError> {
        let mut mesh = Mesh::new(name);
        let mut bone_indices = Vec::new();

        for property in &reader.block.properties {
            match property.key.as_str() {
                "m" => mesh.material_names.push(decode_string(&property.value)),
                "v" if skinned => {
                    let (position, bone) = reader.decode(property, decode_skin_vertex)?;
                    mesh.positions.push(position);
                    bone_indices.push(bone);
                }
                "v" => mesh.positions.push(reader.decode(property, decode_vec3)?),
                "n" => mesh.normals.push(reader.decode(property, decode_vec3)?),
                "t" => mesh.uvs.push(reader.decode(property, decode_vec2)?),
                "f" => mesh.faces.push(reader.decode(property, decode_face)?),
                _ => mesh.extra.push(property.clone()),
            }
        }

        Ok((mesh, bone_indices))
    }

    fn process_mesh(&mut self, block: &Block) -> Result<(), BuildError> {
        let name = Self::block_name(block)?;
        claim(&mut self.geometry_names, block, name)?;

        let reader = BlockReader::new(block);
        let (mesh, _) = Self::read_geometry(&reader, name, false)?;

        self.pending_meshes.push(mesh);
        Ok(())
    }

    fn process_skin(&mut self, block: &Block) -> Result<(), BuildError> {
        let name = Self::block_name(block)?;
        claim(&mut self.geometry_names, block, name)?;

        let reader = BlockReader::new(block);
        let (mesh, raw_indices) = Self::read_geometry(&reader, name, true)?;

        let bone_indices = raw_indices
            .into_iter()
            .enumerate()
            .map(|(i, index)| {
                u8::try_from(index)
                    .ok()
                    .filter(|&index| index <= MAX_BONE_INDEX)
                    .ok_or_else(|| BuildError::InvalidBoneIndex {
                        skin: name.to_string(),
                        vertex: i + 1,
                        index,
                    })
            })
            .collect::<Result<Vec<u8>, BuildError>>()?;

        self.pending_skins.push(Skin::new(mesh, bone_indices));
        Ok(())
    }

    fn process_bone(&mut self, block: &Block) -> Result<(), BuildError> {
        let name = Self::block_name(block)?;
        check_bone_name(name)?;
        claim(&mut self.bone_names, block, name)?;

        let reader = BlockReader::new(block);
        let mut bone = Bone::new(
            name,
            reader.required("position", decode_vec3)?,
            reader.required("rotation", decode_vec3)?,
        );
        bone.extra = reader.extra(BONE_KEYS);

        self.scene.bones.push(bone);
        Ok(())
    }

    fn process_instance(&mut self, block: &Block) -> Result<(), BuildError> {
        let name = Self::block_name(block)?;
        claim(&mut self.instance_names, block, name)?;

        let reader = BlockReader::new(block);
        let instance = Instance {
            name: name.to_string(),
            mesh: reader.required("mesh", text)?,
            position: reader.required("position", decode_vec3)?,
            rotation: reader.required("rotation", decode_vec3)?,
            scale: reader.required("scale", decode_float)?,
            extra: reader.extra(INSTANCE_KEYS),
        };

        self.pending_instances.push(instance);
        Ok(())
    }

    /// Check face indices and material references of decoded geometry.
    fn check_geometry(
        mesh: &Mesh,
        block_type: &str,
        materials: &HashSet<String>,
    ) -> Result<(), BuildError> {
        mesh.check_indices(block_type)?;

        match mesh
            .material_names
            .iter()
            .find(|name| !materials.contains(name.as_str()))
        {
            Some(missing) => Err(BuildError::DanglingReference {
                entity: format!("{} \"{}\"", block_type, mesh.name),
                target: format!("material \"{}\"", missing),
            }),
            None => Ok(()),
        }
    }

    /// Second pass: resolve references between the entities that built.
    fn finish(mut self) -> BuildReport {
        let materials: HashSet<String> =
            self.scene.materials.iter().map(|m| m.name.clone()).collect();

        for mesh in std::mem::take(&mut self.pending_meshes) {
            match Self::check_geometry(&mesh, "mesh", &materials) {
                Ok(()) => self.scene.meshes.push(mesh),
                Err(err) => self.report(err),
            }
        }

        for mut skin in std::mem::take(&mut self.pending_skins) {
            if let Err(err) = Self::check_geometry(&skin.mesh, "skin", &materials) {
                self.report(err);
                continue;
            }

            skin.bones = bones_for_skin(skin.name(), &self.scene.bones);
            for index in skin.used_bone_indices() {
                if !skin.bones.contains_key(&index) {
                    log::warn!(
                        "Skin \"{}\" uses bone {:02} but has no matching bone block",
                        skin.name(),
                        index
                    );
                }
            }
            self.scene.skins.push(skin);
        }

        let geometry: HashSet<String> = self
            .scene
            .meshes
            .iter()
            .map(|m| m.name.clone())
            .chain(self.scene.skins.iter().map(|s| s.name().to_string()))
            .collect();

        for instance in std::mem::take(&mut self.pending_instances) {
            if geometry.contains(&instance.mesh) {
                self.scene.instances.push(instance);
            } else {
                self.report(BuildError::DanglingReference {
                    entity: format!("instance \"{}\"", instance.name),
                    target: format!("mesh \"{}\"", instance.mesh),
                });
            }
        }

        log::info!(
            "Built scene: {} materials, {} meshes, {} skins, {} bones, {} instances ({} errors)",
            self.scene.materials.len(),
            self.scene.meshes.len(),
            self.scene.skins.len(),
            self.scene.bones.len(),
            self.scene.instances.len(),
            self.errors.len()
        );

        BuildReport {
            scene: self.scene,
            errors: self.errors,
        }
    }
}

/// Build a scene from a parsed document.
///
/// Never fails as a whole; see [`BuildReport`].
pub fn build_scene(document: &Document) -> BuildReport {
    let mut builder = SceneBuilder::new();

    for block in &document.blocks {
        builder.process_block(block);
    }

    builder.finish()
}
