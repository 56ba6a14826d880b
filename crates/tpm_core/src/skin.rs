//! Bone naming and vertex-group to bone binding.
//!
//! TPM skins give every vertex exactly one bone index. Bones are ordinary
//! `bone` blocks named `$J{MeshName}{NN}`, where `NN` is the two-digit index.
//!
//! On export a host supplies vertex groups and per-vertex weights instead.
//! Groups are matched to bones purely by the two-digit suffix of their name
//! (`VertexGroup04` drives bone 4), and each vertex keeps its heaviest group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scene::Bone;
use crate::tpm::BuildError;

/// Prefix shared by every bone name.
pub const BONE_PREFIX: &str = "$J";

/// Largest bone index a two-digit suffix can express.
pub const MAX_BONE_INDEX: u8 = 99;

/// Read the two-digit bone index at the end of a name.
///
/// The name must end in exactly two decimal digits preceded by a non-digit:
/// `Bone04` gives 4, while `Bone4`, `Bone004` and `04` are rejected.
pub fn parse_bone_suffix(name: &str) -> Result<u8, BuildError> {
    let invalid = || BuildError::InvalidBoneName {
        name: name.to_string(),
    };

    let chars: Vec<char> = name.chars().collect();
    let [.., before, tens, ones] = chars.as_slice() else {
        return Err(invalid());
    };

    if before.is_ascii_digit() {
        return Err(invalid());
    }

    match (tens.to_digit(10), ones.to_digit(10)) {
        (Some(tens), Some(ones)) => Ok((tens * 10 + ones) as u8),
        _ => Err(invalid()),
    }
}

/// Check a `bone` block name and return its index.
///
/// Valid names are `$J`, a non-empty mesh name, then the two-digit index.
pub fn check_bone_name(name: &str) -> Result<u8, BuildError> {
    let invalid = || BuildError::InvalidBoneName {
        name: name.to_string(),
    };

    let rest = name.strip_prefix(BONE_PREFIX).ok_or_else(invalid)?;
    parse_bone_suffix(rest).map_err(|_| invalid())
}

/// Canonical bone name for a skin: `$J{mesh}{NN}`.
pub fn bone_name(mesh: &str, index: u8) -> String {
    format!("{}{}{:02}", BONE_PREFIX, mesh, index)
}

/// Derive a skin's bone map from the scene's bones.
///
/// Only bones named `$J{skin}NN` take part. The remainder after the prefix
/// must be exactly the two digits; anything else belongs to another skin or
/// is not a bone of this one.
pub fn bones_for_skin<'a>(
    skin: &str,
    bones: impl IntoIterator<Item = &'a Bone>,
) -> BTreeMap<u8, String> {
    let prefix = format!("{}{}", BONE_PREFIX, skin);

    bones
        .into_iter()
        .filter_map(|bone| {
            let digits = bone.name.strip_prefix(&prefix)?;
            if digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()) {
                digits.parse::<u8>().ok().map(|index| (index, bone.name.clone()))
            } else {
                None
            }
        })
        .collect()
}

/// Membership of a vertex in one vertex group.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexWeight {
    /// Index into the skin's group list
    pub group: usize,

    /// Influence of the group on the vertex
    pub weight: f32,
}

impl VertexWeight {
    pub fn new(group: usize, weight: f32) -> Self {
        Self { group, weight }
    }
}

/// A skin's vertex groups with their parsed bone indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoneGroups {
    skin: String,
    names: Vec<String>,
    indices: Vec<u8>,
}

impl BoneGroups {
    /// Parse the suffix of every group name.
    ///
    /// Two groups resolving to the same index is an error, since the bone
    /// each vertex follows would be ambiguous.
    pub fn new<S: AsRef<str>>(skin: &str, names: &[S]) -> Result<Self, BuildError> {
        let mut first_with_index: BTreeMap<u8, &str> = BTreeMap::new();
        let mut indices = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            let index = parse_bone_suffix(name)?;

            if let Some(first) = first_with_index.insert(index, name) {
                return Err(BuildError::DuplicateBoneIndex {
                    skin: skin.to_string(),
                    index,
                    first: first.to_string(),
                    second: name.to_string(),
                });
            }
            indices.push(index);
        }

        Ok(Self {
            skin: skin.to_string(),
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            indices,
        })
    }

    pub fn skin(&self) -> &str {
        &self.skin
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Group name at a position.
    pub fn name(&self, group: usize) -> Option<&str> {
        self.names.get(group).map(String::as_str)
    }

    /// Bone index of a group.
    pub fn bone_index(&self, group: usize) -> Option<u8> {
        self.indices.get(group).copied()
    }

    /// Pick the bone a vertex follows.
    ///
    /// See [`reduce_weights`].
    pub fn reduce(&self, weights: &[VertexWeight]) -> Option<u8> {
        reduce_weights(self, weights)
    }
}

/// Reduce a vertex's group memberships to a single bone index.
///
/// The heaviest group wins; equal weights go to the lowest bone index.
/// Memberships naming an unknown group or carrying a NaN weight are ignored.
/// Returns `None` when nothing usable remains.
pub fn reduce_weights(groups: &BoneGroups, weights: &[VertexWeight]) -> Option<u8> {
    weights
        .iter()
        .filter(|w| !w.weight.is_nan())
        .filter_map(|w| groups.bone_index(w.group).map(|index| (index, w.weight)))
        .fold(None, |best: Option<(u8, f32)>, (index, weight)| match best {
            Some((best_index, best_weight))
                if best_weight > weight || (best_weight == weight && best_index < index) =>
            {
                best
            }
            _ => Some((index, weight)),
        })
        .map(|(index, _)| index)
}

/// Result of binding a skin's vertices to bones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SkinBinding {
    /// Bone index per vertex
    pub bone_indices: Vec<u8>,

    /// Bone index -> canonical bone name, for every index in use
    pub bones: BTreeMap<u8, String>,
}

/// Bind every vertex of a skin to one bone.
///
/// `weights` holds one membership list per vertex. A vertex with no usable
/// membership is [`BuildError::UnboundVertex`] (1-based vertex number).
pub fn bind_skin(
    skin: &str,
    groups: &BoneGroups,
    weights: &[Vec<VertexWeight>],
) -> Result<SkinBinding, BuildError> {
    let mut binding = SkinBinding::default();
    binding.bone_indices.reserve(weights.len());

    for (vertex, memberships) in weights.iter().enumerate() {
        let index = groups
            .reduce(memberships)
            .ok_or_else(|| BuildError::UnboundVertex {
                skin: skin.to_string(),
                vertex: vertex + 1,
            })?;

        binding.bone_indices.push(index);
        binding
            .bones
            .entry(index)
            .or_insert_with(|| bone_name(skin, index));
    }

    log::debug!(
        "Bound {} vertices of skin \"{}\" to {} bones",
        binding.bone_indices.len(),
        skin,
        binding.bones.len()
    );

    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_math::Vec3;

    #[test]
    fn test_parse_bone_suffix() {
        assert_eq!(parse_bone_suffix("Bone04").unwrap(), 4);
        assert_eq!(parse_bone_suffix("VertexGroup99").unwrap(), 99);
        assert_eq!(parse_bone_suffix("$JRaptor00").unwrap(), 0);

        for bad in ["Bone4", "Bone004", "04", "Bone", "", "Bone0x"] {
            assert_eq!(
                parse_bone_suffix(bad).unwrap_err(),
                BuildError::InvalidBoneName {
                    name: bad.to_string()
                },
                "{bad}"
            );
        }
    }

    #[test]
    fn test_check_bone_name() {
        assert_eq!(check_bone_name("$JRaptor07").unwrap(), 7);
        assert_eq!(check_bone_name("$JA00").unwrap(), 0);

        for bad in ["Elbow", "Raptor07", "$J07", "$JRaptor7", "$JRaptor123", "$j Raptor07"] {
            assert_eq!(
                check_bone_name(bad).unwrap_err(),
                BuildError::InvalidBoneName {
                    name: bad.to_string()
                },
                "{bad}"
            );
        }
    }

    #[test]
    fn test_bone_name() {
        assert_eq!(bone_name("Raptor", 0), "$JRaptor00");
        assert_eq!(bone_name("Raptor", 12), "$JRaptor12");
    }

    #[test]
    fn test_bones_for_skin() {
        let bones = vec![
            Bone::new("$JRaptor00", Vec3::ZERO, Vec3::ZERO),
            Bone::new("$JRaptor07", Vec3::ZERO, Vec3::ZERO),
            Bone::new("$JRaptorTail01", Vec3::ZERO, Vec3::ZERO),
            Bone::new("$JRaptor123", Vec3::ZERO, Vec3::ZERO),
            Bone::new("Root02", Vec3::ZERO, Vec3::ZERO),
        ];

        let map = bones_for_skin("Raptor", &bones);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&0], "$JRaptor00");
        assert_eq!(map[&7], "$JRaptor07");
    }

    #[test]
    fn test_duplicate_suffix() {
        let err = BoneGroups::new("Raptor", &["Neck04", "Tail04"]).unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateBoneIndex {
                skin: "Raptor".to_string(),
                index: 4,
                first: "Neck04".to_string(),
                second: "Tail04".to_string(),
            }
        );
    }

    #[test]
    fn test_reduce_picks_heaviest() {
        let groups = BoneGroups::new("Raptor", &["Hip00", "Leg03", "Foot05"]).unwrap();
        let weights = [
            VertexWeight::new(0, 0.2),
            VertexWeight::new(1, 0.7),
            VertexWeight::new(2, 0.1),
        ];
        assert_eq!(groups.reduce(&weights), Some(3));
        assert_eq!(groups.reduce(&[]), None);
    }

    #[test]
    fn test_reduce_tie_breaks_on_lowest_suffix() {
        let groups = BoneGroups::new("Raptor", &["Foot05", "Leg03", "Hip08"]).unwrap();
        let weights = [
            VertexWeight::new(0, 0.5),
            VertexWeight::new(1, 0.5),
            VertexWeight::new(2, 0.5),
        ];
        assert_eq!(reduce_weights(&groups, &weights), Some(3));
    }

    #[test]
    fn test_reduce_ignores_nan_and_unknown_groups() {
        let groups = BoneGroups::new("Raptor", &["Hip00", "Leg03"]).unwrap();
        let weights = [
            VertexWeight::new(0, f32::NAN),
            VertexWeight::new(7, 1.0),
            VertexWeight::new(1, 0.1),
        ];
        assert_eq!(groups.reduce(&weights), Some(3));
    }

    #[test]
    fn test_bind_skin() {
        let groups = BoneGroups::new("Raptor", &["Body00", "Head12"]).unwrap();
        let weights = vec![
            vec![VertexWeight::new(0, 1.0)],
            vec![VertexWeight::new(0, 0.3), VertexWeight::new(1, 0.6)],
            vec![VertexWeight::new(1, 1.0)],
        ];

        let binding = bind_skin("Raptor", &groups, &weights).unwrap();
        assert_eq!(binding.bone_indices, vec![0, 12, 12]);
        assert_eq!(binding.bones[&0], "$JRaptor00");
        assert_eq!(binding.bones[&12], "$JRaptor12");
    }

    #[test]
    fn test_bind_skin_unbound_vertex() {
        let groups = BoneGroups::new("Raptor", &["Body00"]).unwrap();
        let weights = vec![vec![VertexWeight::new(0, 1.0)], vec![]];

        let err = bind_skin("Raptor", &groups, &weights).unwrap_err();
        assert_eq!(
            err,
            BuildError::UnboundVertex {
                skin: "Raptor".to_string(),
                vertex: 2
            }
        );
    }
}
