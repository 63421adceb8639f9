use {
    crate::{
        scene::{PersonSceneEntry, Scene},
        skeleton::euler_xyz,
    },
    nalgebra as na,
    std::{
        collections::{BTreeMap, BTreeSet},
        f32::consts::PI,
    },
};

/// Local joint rotation in radians, applied X then Y then Z.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize,
)]
pub struct JointRotation {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl JointRotation {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        JointRotation { x, y, z }
    }

    pub fn quaternion(&self) -> na::UnitQuaternion<f32> {
        euler_xyz(self.x, self.y, self.z)
    }

    pub fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Joint name to rotation for one person.
pub type RotationMap = BTreeMap<String, JointRotation>;

/// Saved rotations of every person.
///
/// Pure data. Survives selection changes and scene rebuilds.
#[derive(
    Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct JointRotationState(BTreeMap<usize, RotationMap>);

impl JointRotationState {
    pub fn person(&self, person: usize) -> Option<&RotationMap> {
        self.0.get(&person)
    }

    pub fn rotation(&self, person: usize, joint: &str) -> JointRotation {
        self.person(person)
            .and_then(|map| map.get(joint))
            .copied()
            .unwrap_or_default()
    }

    /// Sets one axis of a joint. Values are clamped to `[-PI, PI]`.
    pub fn set_axis(&mut self, person: usize, joint: &str, axis: Axis, value: f32) {
        let value = if value.is_finite() {
            value.max(-PI).min(PI)
        } else {
            0.0
        };

        self.0
            .entry(person)
            .or_default()
            .entry(joint.to_owned())
            .or_default()
            .set(axis, value);
    }

    /// Forgets rotations of one person.
    pub fn reset(&mut self, person: usize) {
        self.0.remove(&person);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Drops rotations of persons that no longer exist.
    pub fn retain_persons(&mut self, count: usize) {
        self.0.retain(|&person, _| person < count);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &RotationMap)> {
        self.0.iter().map(|(&person, map)| (person, map))
    }
}

/// Rotation for a joint the person's rig does not expose.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error,
)]
#[error("Person {person} has no joint '{joint}'")]
pub struct UnknownJointWarning {
    pub person: usize,
    pub joint: String,
}

/// Writes saved rotations into person skeletons and refreshes skinning.
#[derive(Debug, Default)]
pub struct PoseApplier {
    warnings: BTreeSet<UnknownJointWarning>,
}

impl PoseApplier {
    pub fn new() -> Self {
        PoseApplier::default()
    }

    pub fn reset_to_bind_pose(&self, person: &mut PersonSceneEntry) {
        person.skeleton.reset_pose();
        person.skeleton.propagate();
        person.mesh.deform(&person.skeleton);
    }

    /// Resets person to bind pose and applies rotations of known joints.
    pub fn apply_rotations(
        &mut self,
        person: &mut PersonSceneEntry,
        rotations: &RotationMap,
    ) {
        person.skeleton.reset_pose();

        for (joint, rotation) in rotations {
            match person.target(joint) {
                Some(bone) => {
                    person.skeleton.set_rotation(bone, rotation.quaternion());
                }
                None => {
                    let warning = UnknownJointWarning {
                        person: person.index,
                        joint: joint.clone(),
                    };
                    tracing::trace!("{}", warning);
                    self.warnings.insert(warning);
                }
            }
        }

        person.skeleton.propagate();
        person.mesh.deform(&person.skeleton);
    }

    /// Reapplies saved rotations of every person.
    ///
    /// Persons without saved rotations are put in bind pose.
    pub fn sync(&mut self, scene: &mut Scene, state: &JointRotationState) {
        let empty = RotationMap::new();
        for person in scene.persons_mut() {
            let rotations = state.person(person.index).unwrap_or(&empty);
            self.apply_rotations(person, rotations);
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &UnknownJointWarning> {
        self.warnings.iter()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

const UPPER_BODY: [&str; 7] = [
    "head",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
];

const LOWER_BODY: [&str; 7] = [
    "pelvis",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

const FINGER_KEYWORDS: [&str; 3] = ["thumb", "finger", "pinky"];

/// Controllable joints of a person grouped by body part.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointGroups {
    pub upper_body: Vec<String>,
    pub lower_body: Vec<String>,
    pub left_hand: Vec<String>,
    pub right_hand: Vec<String>,
}

impl JointGroups {
    pub fn from_targets(targets: &BTreeMap<String, usize>) -> Self {
        let present = |names: &[&str]| -> Vec<String> {
            names
                .iter()
                .filter(|name| targets.contains_key(**name))
                .map(|&name| name.to_owned())
                .collect()
        };

        let fingers = targets.keys().filter(|name| {
            let lower = name.to_lowercase();
            FINGER_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        });

        let (left_hand, right_hand) = fingers.fold(
            (Vec::new(), Vec::new()),
            |(mut left, mut right), name| {
                if name.contains("left") {
                    left.push(name.clone());
                } else if name.contains("right") {
                    right.push(name.clone());
                }
                (left, right)
            },
        );

        JointGroups {
            upper_body: present(&UPPER_BODY),
            lower_body: present(&LOWER_BODY),
            left_hand,
            right_hand,
        }
    }
}
