use {
    crate::rig::{SceneLoadError, SkeletonData},
    nalgebra as na,
    smallvec::SmallVec,
};

/// Rotation applying X, then Y, then Z about the bone's own axes.
pub fn euler_xyz(x: f32, y: f32, z: f32) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::from_axis_angle(&na::Vector3::x_axis(), x)
        * na::UnitQuaternion::from_axis_angle(&na::Vector3::y_axis(), y)
        * na::UnitQuaternion::from_axis_angle(&na::Vector3::z_axis(), z)
}

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,

    /// Non-owning link up the tree.
    pub parent: Option<usize>,

    pub children: SmallVec<[usize; 4]>,

    /// Translation relative to parent joint.
    pub offset: na::Vector3<f32>,

    pub rotation: na::UnitQuaternion<f32>,
}

impl Bone {
    pub fn local(&self) -> na::Isometry3<f32> {
        na::Isometry3::from_parts(self.offset.into(), self.rotation)
    }
}

/// Arena of bones addressed by index.
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    roots: Vec<usize>,

    /// Every bone after its parent.
    order: Vec<usize>,

    globals: Vec<na::Isometry3<f32>>,
    inverse_bind: Vec<na::Isometry3<f32>>,
}

impl Skeleton {
    /// Builds bind pose skeleton from validated joint arrays.
    pub fn from_rig(
        person: usize,
        data: &SkeletonData,
    ) -> Result<Self, SceneLoadError> {
        let mut bones: Vec<Bone> = (0..data.len())
            .map(|index| {
                let position = na::Vector3::from(data.joint_positions[index]);
                let parent = data.parent(index);
                let offset = match parent {
                    Some(parent) => {
                        position
                            - na::Vector3::from(data.joint_positions[parent])
                    }
                    None => position,
                };

                Bone {
                    name: data.joint_names[index].clone(),
                    parent,
                    children: SmallVec::new(),
                    offset,
                    rotation: na::UnitQuaternion::identity(),
                }
            })
            .collect();

        let mut roots = Vec::new();
        for index in 0..bones.len() {
            match bones[index].parent {
                Some(parent) => bones[parent].children.push(index),
                None => roots.push(index),
            }
        }

        let mut order = Vec::with_capacity(bones.len());
        let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(bones[index].children.iter().rev().copied());
        }

        // Bones on a parent cycle are unreachable from any root.
        if order.len() != bones.len() {
            let mut reached = vec![false; bones.len()];
            for &index in &order {
                reached[index] = true;
            }
            let joint = reached.iter().position(|r| !r).unwrap_or(0);
            return Err(SceneLoadError::CyclicHierarchy { person, joint });
        }

        let mut skeleton = Skeleton {
            globals: vec![na::Isometry3::identity(); bones.len()],
            inverse_bind: Vec::new(),
            bones,
            roots,
            order,
        };

        skeleton.propagate();
        skeleton.inverse_bind =
            skeleton.globals.iter().map(|g| g.inverse()).collect();

        Ok(skeleton)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    pub fn set_rotation(
        &mut self,
        index: usize,
        rotation: na::UnitQuaternion<f32>,
    ) -> bool {
        match self.bones.get_mut(index) {
            Some(bone) => {
                bone.rotation = rotation;
                true
            }
            None => false,
        }
    }

    /// Resets every local rotation to identity. Globals are stale until
    /// [`Skeleton::propagate`].
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.rotation = na::UnitQuaternion::identity();
        }
    }

    /// Recomputes global transforms top-down from roots.
    pub fn propagate(&mut self) {
        for &index in &self.order {
            let bone = &self.bones[index];
            self.globals[index] = match bone.parent {
                Some(parent) => self.globals[parent] * bone.local(),
                None => bone.local(),
            };
        }
    }

    /// Transform from bone space to skeleton space.
    pub fn global(&self, index: usize) -> na::Isometry3<f32> {
        self.globals[index]
    }

    pub fn joint_position(&self, index: usize) -> na::Point3<f32> {
        self.globals[index].translation.vector.into()
    }

    /// Transform moving bind-pose points along with the bone.
    pub fn skin_transform(&self, index: usize) -> na::Isometry3<f32> {
        self.globals[index] * self.inverse_bind[index]
    }

    pub fn skin_transforms(&self) -> Vec<na::Isometry3<f32>> {
        (0..self.bones.len())
            .map(|index| self.skin_transform(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::f32::consts::FRAC_PI_2};

    fn chain() -> SkeletonData {
        SkeletonData {
            joint_names: vec!["pelvis".into(), "spine".into(), "neck".into()],
            parents: vec![-1, 0, 1],
            joint_positions: vec![
                [0.0, 1.0, 0.0],
                [0.0, 1.5, 0.0],
                [0.0, 2.0, 0.0],
            ],
            rest_offsets: None,
        }
    }

    #[test]
    fn offsets_are_relative_to_parent() {
        let skeleton = Skeleton::from_rig(0, &chain()).unwrap();
        assert_eq!(skeleton.roots(), [0]);
        assert_eq!(skeleton.bones()[0].offset, na::Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(skeleton.bones()[2].offset, na::Vector3::new(0.0, 0.5, 0.0));
        assert_eq!(skeleton.bones()[1].children.as_slice(), [2]);
        assert_eq!(skeleton.bones()[2].parent, Some(1));
    }

    #[test]
    fn bind_pose_skin_transforms_are_identity() {
        let skeleton = Skeleton::from_rig(0, &chain()).unwrap();
        for transform in skeleton.skin_transforms() {
            assert!((transform.to_homogeneous()
                - na::Matrix4::identity())
            .norm()
                < 1e-6);
        }
    }

    #[test]
    fn rotation_propagates_to_descendants() {
        let mut skeleton = Skeleton::from_rig(0, &chain()).unwrap();
        skeleton.set_rotation(1, euler_xyz(0.0, 0.0, FRAC_PI_2));
        skeleton.propagate();

        // Rotating spine about Z swings the neck from +Y to -X.
        let neck = skeleton.joint_position(2);
        assert!((neck - na::Point3::new(-0.5, 1.5, 0.0)).norm() < 1e-5);

        skeleton.reset_pose();
        skeleton.propagate();
        let neck = skeleton.joint_position(2);
        assert!((neck - na::Point3::new(0.0, 2.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut data = chain();
        data.parents = vec![-1, 2, 1];
        assert!(matches!(
            Skeleton::from_rig(4, &data),
            Err(SceneLoadError::CyclicHierarchy { person: 4, joint: 1 })
        ));
    }

    #[test]
    fn forests_have_several_roots() {
        let mut data = chain();
        data.parents = vec![-1, 0, -1];
        let skeleton = Skeleton::from_rig(0, &data).unwrap();
        assert_eq!(skeleton.roots(), [0, 2]);
        assert_eq!(skeleton.bones()[2].offset, na::Vector3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn euler_order_is_x_then_y_then_z() {
        let q = euler_xyz(0.3, -0.2, 0.1);
        let expected = na::Rotation3::from_axis_angle(&na::Vector3::x_axis(), 0.3)
            * na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), -0.2)
            * na::Rotation3::from_axis_angle(&na::Vector3::z_axis(), 0.1);
        assert!((q.to_rotation_matrix().matrix() - expected.matrix()).norm() < 1e-6);
    }
}
