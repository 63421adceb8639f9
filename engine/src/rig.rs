//! Typed per-person rig payloads as produced by the reconstruction server.

use {
    serde::Deserialize as _,
    std::{collections::BTreeMap, convert::TryFrom as _},
};

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct MeshData {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,

    #[serde(rename = "skinIndices")]
    pub skin_indices: Vec<[u16; 4]>,

    #[serde(rename = "skinWeights")]
    pub skin_weights: Vec<[f32; 4]>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct SkeletonData {
    pub joint_names: Vec<String>,

    /// Parent joint index, `-1` for roots.
    pub parents: Vec<i32>,

    pub joint_positions: Vec<[f32; 3]>,

    #[serde(default)]
    pub rest_offsets: Option<Vec<[f32; 3]>>,
}

impl SkeletonData {
    pub fn len(&self) -> usize {
        self.joint_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joint_names.is_empty()
    }

    /// Parent of joint `index`. Call only on validated payloads.
    pub fn parent(&self, index: usize) -> Option<usize> {
        usize::try_from(self.parents[index]).ok()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.joint_names.iter().position(|n| n == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub root_translation: Option<[f32; 3]>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct RigPayload {
    pub mesh: MeshData,
    pub skeleton: SkeletonData,

    #[serde(default)]
    pub animation_targets: BTreeMap<String, i64>,

    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, thiserror::Error)]
pub enum SceneLoadError {
    #[error("Person {person}: malformed rig payload")]
    Malformed {
        person: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Person {person}: {what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        person: usize,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Person {person}: {what} index {index} is out of range 0..{len}")]
    IndexOutOfRange {
        person: usize,
        what: &'static str,
        index: i64,
        len: usize,
    },

    #[error("Person {person}: joint {joint} is part of a parent cycle")]
    CyclicHierarchy { person: usize, joint: usize },

    #[error("{count} persons exceed the limit of {max}")]
    TooManyPersons { count: usize, max: usize },
}

impl RigPayload {
    /// Deserializes and validates payload of one person.
    pub fn parse(
        person: usize,
        value: &serde_json::Value,
    ) -> Result<Self, SceneLoadError> {
        let payload = RigPayload::deserialize(value)
            .map_err(|source| SceneLoadError::Malformed { person, source })?;
        payload.validate(person)?;
        Ok(payload)
    }

    /// Parses every payload of a session.
    pub fn parse_all(
        values: &[serde_json::Value],
        max_persons: usize,
    ) -> Result<Vec<Self>, SceneLoadError> {
        if values.len() > max_persons {
            return Err(SceneLoadError::TooManyPersons {
                count: values.len(),
                max: max_persons,
            });
        }

        values
            .iter()
            .enumerate()
            .map(|(person, value)| RigPayload::parse(person, value))
            .collect()
    }

    pub fn root_translation(&self) -> Option<[f32; 3]> {
        self.metadata.as_ref()?.root_translation
    }

    /// Checks array lengths and index ranges.
    ///
    /// Hierarchy cycles are detected when the skeleton is built.
    pub fn validate(&self, person: usize) -> Result<(), SceneLoadError> {
        let mesh = &self.mesh;
        let skeleton = &self.skeleton;
        let vertices = mesh.vertices.len();
        let joints = skeleton.joint_names.len();

        let lengths = [
            ("skinIndices", vertices, mesh.skin_indices.len()),
            ("skinWeights", vertices, mesh.skin_weights.len()),
            ("parents", joints, skeleton.parents.len()),
            ("joint_positions", joints, skeleton.joint_positions.len()),
        ];

        for &(what, expected, actual) in &lengths {
            if expected != actual {
                return Err(SceneLoadError::LengthMismatch {
                    person,
                    what,
                    expected,
                    actual,
                });
            }
        }

        if let Some(offsets) = &skeleton.rest_offsets {
            if offsets.len() != joints {
                return Err(SceneLoadError::LengthMismatch {
                    person,
                    what: "rest_offsets",
                    expected: joints,
                    actual: offsets.len(),
                });
            }
        }

        let out_of_range = |what, index: i64, len| {
            SceneLoadError::IndexOutOfRange {
                person,
                what,
                index,
                len,
            }
        };

        for face in &mesh.faces {
            for &index in face {
                if index as usize >= vertices {
                    return Err(out_of_range("face", index.into(), vertices));
                }
            }
        }

        for joints_of_vertex in &mesh.skin_indices {
            for &index in joints_of_vertex {
                if index as usize >= joints {
                    return Err(out_of_range("skin", index.into(), joints));
                }
            }
        }

        for &parent in &skeleton.parents {
            if parent < -1 || (parent >= 0 && parent as usize >= joints) {
                return Err(out_of_range("parent", parent.into(), joints));
            }
        }

        for &bone in self.animation_targets.values() {
            if bone < 0 || bone as u64 >= joints as u64 {
                return Err(out_of_range("animation target", bone, joints));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn two_joints() -> serde_json::Value {
        json!({
            "mesh": {
                "vertices": [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
                "faces": [[0, 1, 2]],
                "skinIndices": [[0, 0, 0, 0], [1, 0, 0, 0], [0, 0, 0, 0]],
                "skinWeights": [[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]]
            },
            "skeleton": {
                "joint_names": ["pelvis", "neck"],
                "parents": [-1, 0],
                "joint_positions": [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            },
            "animation_targets": { "neck": 1 },
            "metadata": { "root_translation": [0.5, 0.0, 2.0] }
        })
    }

    #[test]
    fn parses_valid_payload() {
        let payload = RigPayload::parse(0, &two_joints()).unwrap();
        assert_eq!(payload.skeleton.parent(0), None);
        assert_eq!(payload.skeleton.parent(1), Some(0));
        assert_eq!(payload.root_translation(), Some([0.5, 0.0, 2.0]));
        assert_eq!(payload.skeleton.find("neck"), Some(1));
    }

    #[test]
    fn null_metadata_means_no_root_translation() {
        let mut value = two_joints();
        value["metadata"] = serde_json::Value::Null;
        let payload = RigPayload::parse(0, &value).unwrap();
        assert_eq!(payload.root_translation(), None);
    }

    #[test]
    fn wrong_arity_is_malformed() {
        let mut value = two_joints();
        value["mesh"]["vertices"][1] = json!([0.0, 1.0]);
        assert!(matches!(
            RigPayload::parse(3, &value),
            Err(SceneLoadError::Malformed { person: 3, .. })
        ));
    }

    #[test]
    fn skin_arrays_must_match_vertices() {
        let mut value = two_joints();
        value["mesh"]["skinWeights"] = json!([[1.0, 0.0, 0.0, 0.0]]);
        assert!(matches!(
            RigPayload::parse(0, &value),
            Err(SceneLoadError::LengthMismatch {
                what: "skinWeights",
                expected: 3,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn indices_must_be_in_range() {
        let mut value = two_joints();
        value["mesh"]["faces"] = json!([[0, 1, 7]]);
        assert!(matches!(
            RigPayload::parse(0, &value),
            Err(SceneLoadError::IndexOutOfRange { what: "face", index: 7, .. })
        ));

        let mut value = two_joints();
        value["skeleton"]["parents"] = json!([-1, 2]);
        assert!(matches!(
            RigPayload::parse(0, &value),
            Err(SceneLoadError::IndexOutOfRange { what: "parent", .. })
        ));

        let mut value = two_joints();
        value["animation_targets"] = json!({ "head": 5 });
        assert!(matches!(
            RigPayload::parse(0, &value),
            Err(SceneLoadError::IndexOutOfRange {
                what: "animation target",
                ..
            })
        ));
    }

    #[test]
    fn person_limit_is_enforced() {
        let values = vec![two_joints(), two_joints(), two_joints()];
        assert!(matches!(
            RigPayload::parse_all(&values, 2),
            Err(SceneLoadError::TooManyPersons { count: 3, max: 2 })
        ));
        assert_eq!(RigPayload::parse_all(&values, 3).unwrap().len(), 3);
    }
}
