//! Scene to document lowering for export.
//!
//! Blocks are emitted in a fixed order chosen for deterministic output:
//! `fileinfo`, materials, meshes then skins, bones, instances, and finally
//! any passthrough blocks. Within each group the scene's order is kept. TPM
//! readers do not depend on this order.

use std::collections::HashSet;

use tpm_math::{Vec2, Vec3};

use super::builder::BuildError;
use super::decode::{
    encode_face, encode_float, encode_skin_vertex, encode_string, encode_timestamp,
    encode_vec2, encode_vec3, encode_version,
};
use super::document::{Block, Document, Property};
use super::loader::TpmError;
use super::writer::{check_string, check_value, ExportConstraintError};
use crate::faces::{reflect_back_normals, resolve_alpha_faces_tagged, FaceMaterial};
use crate::mesh::{Face, Mesh, Skin};
use crate::options::ExportOptions;
use crate::scene::{Bone, FileInfo, Instance, Material, Scene};
use crate::skin::{check_bone_name, MAX_BONE_INDEX};
use crate::texture::strip_directories;

fn quoted(context: &str, s: &str) -> Result<String, ExportConstraintError> {
    check_string(context, s)?;
    Ok(encode_string(s))
}

fn finite(context: &str, values: &[f32]) -> Result<(), ExportConstraintError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ExportConstraintError::NonFiniteNumber {
            context: context.to_string(),
        })
    }
}

fn float(context: &str, v: f32) -> Result<String, ExportConstraintError> {
    finite(context, &[v])?;
    Ok(encode_float(v))
}

fn vec2(context: &str, v: Vec2) -> Result<String, ExportConstraintError> {
    finite(context, &v.to_array())?;
    Ok(encode_vec2(v))
}

fn vec3(context: &str, v: Vec3) -> Result<String, ExportConstraintError> {
    finite(context, &v.to_array())?;
    Ok(encode_vec3(v))
}

/// Start a named block after checking the name can be written.
fn named_block(block_type: &str, name: &str) -> Result<Block, ExportConstraintError> {
    check_string(&format!("{} name", block_type), name)?;
    Ok(Block::new(block_type, Some(name.to_string())))
}

/// Reserve a block's name within one collection.
fn claim(names: &mut HashSet<String>, block: &Block) -> Result<(), BuildError> {
    let name = block.name.as_deref().unwrap_or_default();
    if names.insert(name.to_string()) {
        Ok(())
    } else {
        Err(BuildError::DuplicateName {
            entity: block.label(),
        })
    }
}

fn push_extra(block: &mut Block, extra: &[Property]) {
    block.properties.extend(extra.iter().cloned());
}

fn lower_file_info(info: &FileInfo) -> Result<Block, ExportConstraintError> {
    let mut block = Block::new("fileinfo", None);
    block.push("formatversion", encode_version(info.format_version));

    if let Some(name) = &info.name {
        block.push("name", quoted("fileinfo name", name)?);
    }
    if let Some(version) = &info.version {
        check_string("fileinfo version", version)?;
        check_value("fileinfo version", version)?;
        block.push("version", version.as_str());
    }
    if let Some(source) = &info.source {
        block.push("source", quoted("fileinfo source", source)?);
    }
    if let Some(date) = &info.date {
        block.push("date", encode_timestamp(date));
    }
    if let Some(comments) = &info.comments {
        block.push("comments", quoted("fileinfo comments", comments)?);
    }

    push_extra(&mut block, &info.extra);
    Ok(block)
}

fn lower_material(material: &Material) -> Result<Block, ExportConstraintError> {
    let mut block = named_block("material", &material.name)?;
    let label = block.label();

    for (kind, map) in material.maps() {
        let context = format!("{} {}", label, kind.key());
        block.push(kind.key(), quoted(&context, strip_directories(map))?);
    }

    push_extra(&mut block, &material.extra);
    Ok(block)
}

/// Final face list of a mesh, plus any normals added for back faces.
fn export_faces(
    mesh: &Mesh,
    block_type: &str,
    scene: &Scene,
    options: &ExportOptions,
) -> Result<(Vec<Face>, Vec<Vec3>), BuildError> {
    let mut slots = Vec::with_capacity(mesh.material_names.len());
    for name in &mesh.material_names {
        let material = scene
            .material(name)
            .ok_or_else(|| BuildError::DanglingReference {
                entity: format!("{} \"{}\"", block_type, mesh.name),
                target: format!("material \"{}\"", name),
            })?;
        slots.push(FaceMaterial::of(material));
    }

    let attributes: Vec<FaceMaterial> = mesh
        .faces
        .iter()
        .map(|face| slots.get(face.material as usize).copied().unwrap_or_default())
        .collect();
    let mut tagged = resolve_alpha_faces_tagged(&mesh.faces, &attributes, options.alpha_faces);

    let mut normals = mesh.normals.clone();
    if options.reflect_back_normals {
        let mut scratch = Mesh {
            positions: mesh.positions.clone(),
            normals,
            ..Mesh::new(mesh.name.as_str())
        };
        reflect_back_normals(&mut scratch, &mut tagged);
        normals = scratch.normals;
    }

    let mut faces: Vec<Face> = tagged.into_iter().map(|(face, _)| face).collect();
    if options.sort_faces_by_material {
        faces.sort_by_key(|face| face.material);
    }

    if faces.len() != mesh.faces.len() {
        log::debug!(
            "{} \"{}\": {} faces become {} on export",
            block_type,
            mesh.name,
            mesh.faces.len(),
            faces.len()
        );
    }

    Ok((faces, normals))
}

/// Lower the geometry of a mesh or skin.
///
/// `bone_indices` is present for skins and runs parallel to the positions.
fn lower_geometry(
    block_type: &str,
    mesh: &Mesh,
    bone_indices: Option<&[u8]>,
    scene: &Scene,
    options: &ExportOptions,
) -> Result<Block, TpmError> {
    mesh.check_indices(block_type)?;
    let (faces, normals) = export_faces(mesh, block_type, scene, options)?;

    let mut block = named_block(block_type, &mesh.name)?;
    let label = block.label();

    for name in &mesh.material_names {
        block.push("m", quoted(&format!("{} m", label), name)?);
    }

    let context = format!("{} v", label);
    for (i, position) in mesh.positions.iter().enumerate() {
        let value = match bone_indices {
            Some(bones) => {
                finite(&context, &position.to_array())?;
                encode_skin_vertex(*position, bones[i])
            }
            None => vec3(&context, *position)?,
        };
        block.push("v", value);
    }

    let context = format!("{} t", label);
    for uv in &mesh.uvs {
        block.push("t", vec2(&context, *uv)?);
    }

    let context = format!("{} n", label);
    for normal in &normals {
        block.push("n", vec3(&context, *normal)?);
    }

    for face in &faces {
        block.push("f", encode_face(face));
    }

    push_extra(&mut block, &mesh.extra);
    Ok(block)
}

/// Check a skin's bone indices before writing it.
fn check_skin(skin: &Skin) -> Result<(), BuildError> {
    if skin.bone_indices.len() != skin.mesh.positions.len() {
        return Err(BuildError::BoneCountMismatch {
            skin: skin.name().to_string(),
            vertices: skin.mesh.positions.len(),
            bone_indices: skin.bone_indices.len(),
        });
    }

    match skin
        .bone_indices
        .iter()
        .position(|&index| index > MAX_BONE_INDEX)
    {
        Some(vertex) => Err(BuildError::InvalidBoneIndex {
            skin: skin.name().to_string(),
            vertex: vertex + 1,
            index: u32::from(skin.bone_indices[vertex]),
        }),
        None => Ok(()),
    }
}

fn lower_bone(bone: &Bone) -> Result<Block, TpmError> {
    check_bone_name(&bone.name)?;
    let mut block = named_block("bone", &bone.name)?;
    let label = block.label();

    block.push("position", vec3(&format!("{} position", label), bone.position)?);
    block.push("rotation", vec3(&format!("{} rotation", label), bone.rotation)?);

    push_extra(&mut block, &bone.extra);
    Ok(block)
}

fn lower_instance(instance: &Instance, scene: &Scene) -> Result<Block, TpmError> {
    if scene.geometry(&instance.mesh).is_none() {
        return Err(BuildError::DanglingReference {
            entity: format!("instance \"{}\"", instance.name),
            target: format!("mesh \"{}\"", instance.mesh),
        }
        .into());
    }

    let mut block = named_block("instance", &instance.name)?;
    let label = block.label();

    block.push("mesh", quoted(&format!("{} mesh", label), &instance.mesh)?);
    block.push(
        "position",
        vec3(&format!("{} position", label), instance.position)?,
    );
    block.push(
        "rotation",
        vec3(&format!("{} rotation", label), instance.rotation)?,
    );
    block.push("scale", float(&format!("{} scale", label), instance.scale)?);

    push_extra(&mut block, &instance.extra);
    Ok(block)
}

/// Lower a scene to a document ready for writing.
///
/// Applies the alpha-face policy, map path stripping and skin validation, and
/// rejects names a reader would refuse: duplicates and malformed bone names.
/// The first entity that cannot be written fails the whole export.
pub fn lower_scene(scene: &Scene, options: &ExportOptions) -> Result<Document, TpmError> {
    let mut document = Document::new();

    if let Some(info) = scene.file_info.as_ref().or(options.default_file_info.as_ref()) {
        document.push(lower_file_info(info)?);
    }

    let mut names = HashSet::new();
    for material in &scene.materials {
        let block = lower_material(material)?;
        claim(&mut names, &block)?;
        document.push(block);
    }

    // Meshes and skins share one namespace
    let mut names = HashSet::new();
    for mesh in &scene.meshes {
        let block = lower_geometry("mesh", mesh, None, scene, options)?;
        claim(&mut names, &block)?;
        document.push(block);
    }

    for skin in &scene.skins {
        check_skin(skin)?;
        let block = lower_geometry(
            "skin",
            &skin.mesh,
            Some(&skin.bone_indices),
            scene,
            options,
        )?;
        claim(&mut names, &block)?;
        document.push(block);
    }

    let mut names = HashSet::new();
    for bone in &scene.bones {
        let block = lower_bone(bone)?;
        claim(&mut names, &block)?;
        document.push(block);
    }

    let mut names = HashSet::new();
    for instance in &scene.instances {
        let block = lower_instance(instance, scene)?;
        claim(&mut names, &block)?;
        document.push(block);
    }

    document.blocks.extend(scene.passthrough.iter().cloned());

    log::debug!("Lowered scene to {} blocks", document.len());
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::AlphaFacePolicy;
    use pretty_assertions::assert_eq;

    fn leaf_scene() -> Scene {
        let mut scene = Scene::new();

        let mut leaf = Material::new("Leaf");
        leaf.color_map = Some("C:\\art\\leaf.bmp".to_string());
        leaf.opacity_map = Some("maps/leaf_a.bmp".to_string());
        scene.materials.push(leaf);
        scene.materials.push(Material::new("Bark"));

        let mut mesh = Mesh::new("Tree");
        mesh.material_names = vec!["Leaf".to_string(), "Bark".to_string()];
        mesh.positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        mesh.uvs = vec![Vec2::ZERO];
        mesh.normals = vec![Vec3::Z];
        mesh.faces = vec![
            Face {
                vertices: [0, 1, 2],
                uvs: [0, 0, 0],
                normals: [0, 0, 0],
                material: 1,
            },
            Face {
                vertices: [0, 1, 2],
                uvs: [0, 0, 0],
                normals: [0, 0, 0],
                material: 0,
            },
        ];
        scene.meshes.push(mesh);

        scene.instances.push(Instance::new("Tree01", "Tree"));
        scene
    }

    fn values<'a>(block: &'a Block, key: &'a str) -> Vec<&'a str> {
        block.all(key).map(|p| p.value.as_str()).collect()
    }

    #[test]
    fn test_canonical_block_order() {
        let mut scene = leaf_scene();
        scene.bones.push(Bone::new("$JTree00", Vec3::ZERO, Vec3::ZERO));
        scene.passthrough.push(Block::new("custom", None));

        let doc = lower_scene(&scene, &ExportOptions::default()).unwrap();
        let labels: Vec<String> = doc.blocks.iter().map(Block::label).collect();
        assert_eq!(
            labels,
            vec![
                "fileinfo",
                "material \"Leaf\"",
                "material \"Bark\"",
                "mesh \"Tree\"",
                "bone \"$JTree00\"",
                "instance \"Tree01\"",
                "custom",
            ]
        );
        assert_eq!(values(&doc.blocks[0], "formatversion"), vec!["1.0.1"]);
    }

    #[test]
    fn test_map_directories_stripped() {
        let doc = lower_scene(&leaf_scene(), &ExportOptions::default()).unwrap();
        let leaf = &doc.blocks[1];
        assert_eq!(values(leaf, "colormap"), vec!["\"leaf.bmp\""]);
        assert_eq!(values(leaf, "opacitymap"), vec!["\"leaf_a.bmp\""]);
    }

    #[test]
    fn test_double_sided_alpha_faces() {
        let options = ExportOptions {
            alpha_faces: AlphaFacePolicy::DoubleSided,
            ..ExportOptions::default()
        };
        let doc = lower_scene(&leaf_scene(), &options).unwrap();
        assert_eq!(
            values(&doc.blocks[3], "f"),
            vec![
                "(1,2,3),(1,1,1),(1,1,1),2",
                "(1,2,3),(1,1,1),(1,1,1),1",
                "(1,3,2),(1,1,1),(1,1,1),1",
            ]
        );
    }

    #[test]
    fn test_sort_and_reflect() {
        let options = ExportOptions {
            alpha_faces: AlphaFacePolicy::DoubleSided,
            reflect_back_normals: true,
            sort_faces_by_material: true,
            default_file_info: None,
        };
        let doc = lower_scene(&leaf_scene(), &options).unwrap();
        let mesh = &doc.blocks[2];
        assert_eq!(mesh.label(), "mesh \"Tree\"");
        assert_eq!(values(mesh, "n"), vec!["(0,0,1)", "(0,0,-1)"]);
        assert_eq!(
            values(mesh, "f"),
            vec![
                "(1,2,3),(1,1,1),(1,1,1),1",
                "(1,3,2),(1,1,1),(2,2,2),1",
                "(1,2,3),(1,1,1),(1,1,1),2",
            ]
        );
    }

    #[test]
    fn test_quote_in_name_fails_export() {
        let mut scene = leaf_scene();
        scene.instances[0].name = "Tree\"01".to_string();

        let err = lower_scene(&scene, &ExportOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            TpmError::Export(ExportConstraintError::QuoteInString { .. })
        ));
    }

    #[test]
    fn test_non_finite_fails_export() {
        let mut scene = leaf_scene();
        scene.instances[0].scale = f32::NAN;

        let err = lower_scene(&scene, &ExportOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            TpmError::Export(ExportConstraintError::NonFiniteNumber { .. })
        ));
    }

    #[test]
    fn test_skin_validation() {
        let mut scene = Scene::new();
        let mut mesh = Mesh::new("Raptor");
        mesh.positions = vec![Vec3::ZERO, Vec3::X];
        scene.skins.push(Skin::new(mesh.clone(), vec![0]));

        let err = lower_scene(&scene, &ExportOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            TpmError::Build(BuildError::BoneCountMismatch {
                vertices: 2,
                bone_indices: 1,
                ..
            })
        ));

        scene.skins[0] = Skin::new(mesh.clone(), vec![0, 100]);
        let err = lower_scene(&scene, &ExportOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            TpmError::Build(BuildError::InvalidBoneIndex { vertex: 2, index: 100, .. })
        ));

        scene.skins[0] = Skin::new(mesh, vec![0, 7]);
        let doc = lower_scene(&scene, &ExportOptions::default()).unwrap();
        assert_eq!(values(&doc.blocks[1], "v"), vec!["(0,0,0),0", "(1,0,0),7"]);
    }

    #[test]
    fn test_dangling_instance_fails_export() {
        let mut scene = leaf_scene();
        scene.instances.push(Instance::new("Ghost01", "Ghost"));

        assert!(matches!(
            lower_scene(&scene, &ExportOptions::default()),
            Err(TpmError::Build(BuildError::DanglingReference { .. }))
        ));
    }

    #[test]
    fn test_empty_file_version_fails_export() {
        let mut scene = leaf_scene();
        scene.file_info = Some(FileInfo {
            version: Some(String::new()),
            ..FileInfo::default()
        });

        let err = lower_scene(&scene, &ExportOptions::default()).unwrap_err();
        assert_eq!(
            err,
            TpmError::Export(ExportConstraintError::EmptyValue {
                context: "fileinfo version".to_string()
            })
        );

        scene.file_info = Some(FileInfo {
            version: Some(" 3 ".to_string()),
            ..FileInfo::default()
        });
        assert!(matches!(
            lower_scene(&scene, &ExportOptions::default()),
            Err(TpmError::Export(ExportConstraintError::PaddedValue { .. }))
        ));
    }

    #[test]
    fn test_duplicate_names_fail_export() {
        let mut scene = leaf_scene();
        scene.materials.push(Material::new("Bark"));
        assert_eq!(
            lower_scene(&scene, &ExportOptions::default()).unwrap_err(),
            TpmError::Build(BuildError::DuplicateName {
                entity: "material \"Bark\"".to_string()
            })
        );

        let mut scene = leaf_scene();
        let tree = scene.meshes[0].clone();
        scene.skins.push(Skin::new(tree, vec![0, 0, 0]));
        assert_eq!(
            lower_scene(&scene, &ExportOptions::default()).unwrap_err(),
            TpmError::Build(BuildError::DuplicateName {
                entity: "skin \"Tree\"".to_string()
            })
        );

        let mut scene = leaf_scene();
        scene.instances.push(Instance::new("Tree01", "Tree"));
        assert!(matches!(
            lower_scene(&scene, &ExportOptions::default()),
            Err(TpmError::Build(BuildError::DuplicateName { .. }))
        ));

        // Same name in different collections is fine
        let mut scene = leaf_scene();
        scene.meshes[0].name = "Leaf".to_string();
        scene.instances[0].mesh = "Leaf".to_string();
        assert!(lower_scene(&scene, &ExportOptions::default()).is_ok());
    }

    #[test]
    fn test_bone_names_checked_on_export() {
        let mut scene = leaf_scene();
        scene.bones.push(Bone::new("Elbow", Vec3::ZERO, Vec3::ZERO));
        assert_eq!(
            lower_scene(&scene, &ExportOptions::default()).unwrap_err(),
            TpmError::Build(BuildError::InvalidBoneName {
                name: "Elbow".to_string()
            })
        );

        scene.bones[0].name = "$JTree01".to_string();
        scene.bones.push(Bone::new("$JTree01", Vec3::ZERO, Vec3::ZERO));
        assert!(matches!(
            lower_scene(&scene, &ExportOptions::default()),
            Err(TpmError::Build(BuildError::DuplicateName { .. }))
        ));
    }
}
