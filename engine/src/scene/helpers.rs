use {
    super::{MaterialPalette, ResourceHandle, ResourceKind, ResourceRegistry},
    crate::rig::SkeletonData,
    nalgebra as na,
    palette::Srgb,
};

/// Joint spheres and parent/child bone segments of a person.
///
/// Drawn at the payload joint positions, so they show the rest pose
/// regardless of posing.
#[derive(Clone, Debug)]
pub struct DebugHelpers {
    joints: Vec<na::Point3<f32>>,
    bones: Vec<[usize; 2]>,
    pub joint_radius: f32,
    pub position: na::Vector3<f32>,
    pub visible: bool,
    pub joint_color: Srgb,
    pub bone_color: Srgb,
}

impl DebugHelpers {
    pub fn from_rig(
        data: &SkeletonData,
        joint_radius: f32,
        palette: &MaterialPalette,
        selected: bool,
    ) -> Self {
        let joints = data
            .joint_positions
            .iter()
            .map(|&p| na::Point3::from(p))
            .collect();

        let bones = (0..data.len())
            .filter_map(|child| Some([data.parent(child)?, child]))
            .collect();

        DebugHelpers {
            joints,
            bones,
            joint_radius,
            position: na::Vector3::zeros(),
            visible: true,
            joint_color: palette.joint(selected),
            bone_color: palette.bone(selected),
        }
    }

    /// Allocates one sphere per joint and one line set for all bones.
    pub fn allocate(&self, registry: &mut ResourceRegistry) -> Vec<ResourceHandle> {
        let mut handles = Vec::with_capacity(self.joints.len() * 2 + 2);
        for _ in &self.joints {
            handles.push(registry.allocate(ResourceKind::HelperGeometry));
            handles.push(registry.allocate(ResourceKind::HelperMaterial));
        }
        if !self.bones.is_empty() {
            handles.push(registry.allocate(ResourceKind::HelperGeometry));
            handles.push(registry.allocate(ResourceKind::HelperMaterial));
        }
        handles
    }

    pub fn set_selected(&mut self, palette: &MaterialPalette, selected: bool) {
        self.joint_color = palette.joint(selected);
        self.bone_color = palette.bone(selected);
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Joint centers in scene space.
    pub fn joints(&self) -> impl Iterator<Item = na::Point3<f32>> + '_ {
        self.joints.iter().map(move |p| p + self.position)
    }

    /// Bone segments in scene space.
    pub fn segments(
        &self,
    ) -> impl Iterator<Item = (na::Point3<f32>, na::Point3<f32>)> + '_ {
        self.bones.iter().map(move |&[parent, child]| {
            (
                self.joints[parent] + self.position,
                self.joints[child] + self.position,
            )
        })
    }
}
