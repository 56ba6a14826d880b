//! Host application bridge.
//!
//! The core never touches a host's scene graph. Importing hands built
//! entities to a [`SceneSink`]; exporting reads them back from a
//! [`SceneSource`], including the vertex-group weights that become bone
//! indices.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tpm_math::Vec3;

use crate::mesh::{Mesh, Skin};
use crate::options::{ExportOptions, ImportOptions};
use crate::scene::{Bone, FileInfo, Instance, MapKind, Material, Scene};
use crate::skin::{bind_skin, bone_name, BoneGroups, VertexWeight};
use crate::texture::TexturePathPolicy;
use crate::tpm::{serialize, BuildError, BuildReport, TpmError};

/// Errors from moving a scene between a host and TPM.
#[derive(Error, Debug)]
pub enum BridgeError<E> {
    #[error("Host error: {0}")]
    Host(E),

    #[error(transparent)]
    Tpm(#[from] TpmError),
}

impl<E> From<BuildError> for BridgeError<E> {
    fn from(err: BuildError) -> Self {
        BridgeError::Tpm(TpmError::Build(err))
    }
}

/// Receives imported entities and creates them in the host.
///
/// Calls arrive in dependency order: materials, meshes, skins, bones, then
/// instances.
pub trait SceneSink {
    type Error;

    /// `textures` holds the maps that were found, with resolved paths.
    fn create_material(
        &mut self,
        material: &Material,
        textures: &[(MapKind, PathBuf)],
        options: &ImportOptions,
    ) -> Result<(), Self::Error>;

    fn create_mesh(&mut self, mesh: &Mesh) -> Result<(), Self::Error>;

    fn create_skin(&mut self, skin: &Skin) -> Result<(), Self::Error>;

    fn create_bone(&mut self, bone: &Bone) -> Result<(), Self::Error>;

    fn create_instance(
        &mut self,
        instance: &Instance,
        options: &ImportOptions,
    ) -> Result<(), Self::Error>;

    /// Whether a texture file exists on the host side.
    fn texture_exists(&self, path: &Path) -> bool;

    /// Surface a non-fatal problem to the user.
    fn warn(&mut self, message: &str);
}

/// Feed a built scene into a host.
///
/// Build errors and missing textures are passed to [`SceneSink::warn`];
/// only errors raised by the sink itself stop the import.
pub fn import_into<S: SceneSink>(
    report: &BuildReport,
    sink: &mut S,
    options: &ImportOptions,
    tpm_dir: &Path,
) -> Result<(), BridgeError<S::Error>> {
    for err in &report.errors {
        sink.warn(&err.to_string());
    }

    let scene = &report.scene;
    let policy = TexturePathPolicy::from_options(options, tpm_dir);

    for material in &scene.materials {
        let mut textures = Vec::new();
        for (kind, map) in material.maps() {
            match policy.locate(map, |path| sink.texture_exists(path)) {
                Some(path) => textures.push((kind, path)),
                None => sink.warn(&format!(
                    "Material \"{}\": texture `{}` not found",
                    material.name, map
                )),
            }
        }
        sink.create_material(material, &textures, options)
            .map_err(BridgeError::Host)?;
    }

    for mesh in &scene.meshes {
        sink.create_mesh(mesh).map_err(BridgeError::Host)?;
    }
    for skin in &scene.skins {
        sink.create_skin(skin).map_err(BridgeError::Host)?;
    }
    for bone in &scene.bones {
        sink.create_bone(bone).map_err(BridgeError::Host)?;
    }
    for instance in &scene.instances {
        sink.create_instance(instance, options)
            .map_err(BridgeError::Host)?;
    }

    log::info!(
        "Imported {} materials, {} meshes, {} skins, {} bones, {} instances into host",
        scene.materials.len(),
        scene.meshes.len(),
        scene.skins.len(),
        scene.bones.len(),
        scene.instances.len()
    );
    Ok(())
}

/// A vertex group of a host skin, with the pose of its bone.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupSource {
    /// Group name; must end in a two-digit bone index
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
}

/// A host skin: geometry plus vertex-group weights.
#[derive(Clone, Debug, PartialEq)]
pub struct SkinSource {
    pub mesh: Mesh,
    pub groups: Vec<GroupSource>,

    /// Group memberships per vertex, parallel to `mesh.positions`
    pub weights: Vec<Vec<VertexWeight>>,
}

/// Supplies host content for export.
pub trait SceneSource {
    type Error;

    fn file_info(&self) -> Result<Option<FileInfo>, Self::Error>;

    /// Materials with `backface_culling` set from the host.
    fn materials(&self) -> Result<Vec<Material>, Self::Error>;

    fn meshes(&self) -> Result<Vec<Mesh>, Self::Error>;

    fn skins(&self) -> Result<Vec<SkinSource>, Self::Error>;

    fn instances(&self) -> Result<Vec<Instance>, Self::Error>;
}

/// Turn a host skin into a TPM skin and its bones.
fn collect_skin(source: SkinSource) -> Result<(Skin, Vec<Bone>), BuildError> {
    let name = source.mesh.name.clone();

    if source.weights.len() != source.mesh.positions.len() {
        return Err(BuildError::BoneCountMismatch {
            skin: name,
            vertices: source.mesh.positions.len(),
            bone_indices: source.weights.len(),
        });
    }

    let names: Vec<&str> = source.groups.iter().map(|g| g.name.as_str()).collect();
    let groups = BoneGroups::new(&name, &names)?;
    let binding = bind_skin(&name, &groups, &source.weights)?;

    let mut bones = Vec::with_capacity(source.groups.len());
    let mut skin = Skin::new(source.mesh, binding.bone_indices);

    // Every group becomes a bone, used or not
    for (i, group) in source.groups.iter().enumerate() {
        if let Some(index) = groups.bone_index(i) {
            let bone = Bone::new(bone_name(&name, index), group.position, group.rotation);
            skin.bones.insert(index, bone.name.clone());
            bones.push(bone);
        }
    }

    Ok((skin, bones))
}

/// Gather host content into a scene, binding skins to bones.
pub fn collect_scene<S: SceneSource>(source: &S) -> Result<Scene, BridgeError<S::Error>> {
    let mut scene = Scene::new();

    scene.file_info = source.file_info().map_err(BridgeError::Host)?;
    scene.materials = source.materials().map_err(BridgeError::Host)?;
    scene.meshes = source.meshes().map_err(BridgeError::Host)?;

    for skin_source in source.skins().map_err(BridgeError::Host)? {
        let (skin, bones) = collect_skin(skin_source)?;
        scene.skins.push(skin);
        scene.bones.extend(bones);
    }

    scene.instances = source.instances().map_err(BridgeError::Host)?;

    log::debug!(
        "Collected scene from host: {} meshes, {} skins, {} instances",
        scene.meshes.len(),
        scene.skins.len(),
        scene.instances.len()
    );
    Ok(scene)
}

/// Collect host content and write it as TPM text.
pub fn export_from<S: SceneSource>(
    source: &S,
    options: &ExportOptions,
) -> Result<String, BridgeError<S::Error>> {
    let scene = collect_scene(source)?;
    Ok(serialize(&scene, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Face;
    use crate::tpm::{import, parse};
    use tpm_math::Vec2;

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<String>,
        warnings: Vec<String>,
        textures: Vec<(MapKind, PathBuf)>,
    }

    impl SceneSink for RecordingSink {
        type Error = String;

        fn create_material(
            &mut self,
            material: &Material,
            textures: &[(MapKind, PathBuf)],
            _options: &ImportOptions,
        ) -> Result<(), String> {
            self.calls.push(format!("material {}", material.name));
            self.textures.extend(textures.iter().cloned());
            Ok(())
        }

        fn create_mesh(&mut self, mesh: &Mesh) -> Result<(), String> {
            self.calls.push(format!("mesh {}", mesh.name));
            Ok(())
        }

        fn create_skin(&mut self, skin: &Skin) -> Result<(), String> {
            self.calls.push(format!("skin {}", skin.name()));
            Ok(())
        }

        fn create_bone(&mut self, bone: &Bone) -> Result<(), String> {
            self.calls.push(format!("bone {}", bone.name));
            Ok(())
        }

        fn create_instance(
            &mut self,
            instance: &Instance,
            options: &ImportOptions,
        ) -> Result<(), String> {
            if options.import_to_active_collection {
                return Err("no active collection".to_string());
            }
            self.calls.push(format!("instance {}", instance.name));
            Ok(())
        }

        fn texture_exists(&self, path: &Path) -> bool {
            path.ends_with("bark.bmp")
        }

        fn warn(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }
    }

    // Blocks deliberately out of dependency order
    const SCENE: &str = r#"
instance "Raptor01"
{
    mesh = "Raptor"
    position = (0,0,0)
    rotation = (0,0,0)
    scale = 1
}
instance "Lost"
{
    mesh = "Nowhere"
    position = (0,0,0)
    rotation = (0,0,0)
    scale = 1
}
bone "$JRaptor00"
{
    position = (0,0,0)
    rotation = (0,0,0)
}
skin "Raptor"
{
    m = "Hide"
    v = (0,0,0),0
}
material "Hide"
{
    colormap = "art\bark.bmp"
    bumpmap = "art\bump.bmp"
}
"#;

    #[test]
    fn test_import_into_dependency_order() {
        let report = import(SCENE).unwrap();
        let mut sink = RecordingSink::default();

        import_into(&report, &mut sink, &ImportOptions::default(), Path::new("/level")).unwrap();

        assert_eq!(
            sink.calls,
            vec![
                "material Hide",
                "skin Raptor",
                "bone $JRaptor00",
                "instance Raptor01",
            ]
        );
        assert_eq!(
            sink.textures,
            vec![(MapKind::Color, PathBuf::from("/level/bark.bmp"))]
        );
        // Dangling instance, then the missing bump map
        assert_eq!(sink.warnings.len(), 2);
        assert!(sink.warnings[1].contains("bump.bmp"));
    }

    #[test]
    fn test_host_error_stops_import() {
        let report = import(SCENE).unwrap();
        let mut sink = RecordingSink::default();
        let options = ImportOptions {
            import_to_active_collection: true,
            ..ImportOptions::default()
        };

        let err = import_into(&report, &mut sink, &options, Path::new("/level")).unwrap_err();
        assert!(matches!(err, BridgeError::Host(ref msg) if msg == "no active collection"));
    }

    struct HostScene {
        skin: SkinSource,
    }

    impl SceneSource for HostScene {
        type Error = String;

        fn file_info(&self) -> Result<Option<FileInfo>, String> {
            Ok(None)
        }

        fn materials(&self) -> Result<Vec<Material>, String> {
            Ok(vec![Material::new("Hide")])
        }

        fn meshes(&self) -> Result<Vec<Mesh>, String> {
            Ok(Vec::new())
        }

        fn skins(&self) -> Result<Vec<SkinSource>, String> {
            Ok(vec![self.skin.clone()])
        }

        fn instances(&self) -> Result<Vec<Instance>, String> {
            Ok(vec![Instance::new("Raptor01", "Raptor")])
        }
    }

    fn host_skin() -> SkinSource {
        let mut mesh = Mesh::new("Raptor");
        mesh.material_names = vec!["Hide".to_string()];
        mesh.positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        mesh.uvs = vec![Vec2::ZERO];
        mesh.normals = vec![Vec3::Z];
        mesh.faces = vec![Face {
            vertices: [0, 1, 2],
            uvs: [0, 0, 0],
            normals: [0, 0, 0],
            material: 0,
        }];

        SkinSource {
            mesh,
            groups: vec![
                GroupSource {
                    name: "Body00".to_string(),
                    position: Vec3::ZERO,
                    rotation: Vec3::ZERO,
                },
                GroupSource {
                    name: "Head04".to_string(),
                    position: Vec3::Y,
                    rotation: Vec3::new(0.0, 0.0, 45.0),
                },
            ],
            weights: vec![
                vec![VertexWeight::new(0, 1.0)],
                vec![VertexWeight::new(0, 0.5), VertexWeight::new(1, 0.5)],
                vec![VertexWeight::new(1, 0.9)],
            ],
        }
    }

    #[test]
    fn test_collect_scene_binds_skins() {
        let scene = collect_scene(&HostScene { skin: host_skin() }).unwrap();

        let skin = scene.skin("Raptor").unwrap();
        assert_eq!(skin.bone_indices, vec![0, 0, 4]);
        assert_eq!(skin.vertex_bone(2), Some("$JRaptor04"));

        let names: Vec<&str> = scene.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["$JRaptor00", "$JRaptor04"]);
        assert_eq!(scene.bone("$JRaptor04").unwrap().position, Vec3::Y);
    }

    #[test]
    fn test_export_from_round_trips() {
        let text = export_from(&HostScene { skin: host_skin() }, &ExportOptions::default()).unwrap();
        let scene = parse(&text).unwrap();

        assert_eq!(scene.skin("Raptor").unwrap().bone_indices, vec![0, 0, 4]);
        assert_eq!(scene.instances.len(), 1);
        assert!(scene.file_info.is_some());
    }

    #[test]
    fn test_collect_scene_rejects_bad_weights() {
        let mut skin = host_skin();
        skin.weights.pop();
        let err = collect_scene(&HostScene { skin }).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Tpm(TpmError::Build(BuildError::BoneCountMismatch { .. }))
        ));

        let mut skin = host_skin();
        skin.weights[1].clear();
        let err = collect_scene(&HostScene { skin }).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Tpm(TpmError::Build(BuildError::UnboundVertex { vertex: 2, .. }))
        ));
    }
}
