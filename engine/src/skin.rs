use {
    crate::{rig::MeshData, skeleton::Skeleton},
    nalgebra as na,
    parry3d::{bounding_volume::Aabb, shape::Triangle},
};

/// Linear blend skinned triangle mesh.
///
/// Keeps bind pose positions and the positions deformed by the latest
/// skeleton pose, both in mesh space.
#[derive(Clone, Debug)]
pub struct SkinnedMesh {
    positions: Vec<na::Point3<f32>>,
    indices: Vec<[u32; 3]>,
    skin_indices: Vec<[u16; 4]>,
    skin_weights: Vec<[f32; 4]>,
    deformed: Vec<na::Point3<f32>>,
}

impl SkinnedMesh {
    /// Builds mesh from validated payload arrays.
    pub fn from_mesh(data: &MeshData) -> Self {
        let positions: Vec<_> =
            data.vertices.iter().map(|&v| na::Point3::from(v)).collect();

        SkinnedMesh {
            deformed: positions.clone(),
            positions,
            indices: data.faces.clone(),
            skin_indices: data.skin_indices.clone(),
            skin_weights: data.skin_weights.clone(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn positions(&self) -> &[na::Point3<f32>] {
        &self.positions
    }

    pub fn deformed(&self) -> &[na::Point3<f32>] {
        &self.deformed
    }

    /// Bounds of bind pose vertices.
    ///
    /// Returns `None` for an empty mesh or non-finite coordinates.
    pub fn bounding_box(&self) -> Option<Aabb> {
        let (first, rest) = self.positions.split_first()?;

        let mut mins = *first;
        let mut maxs = *first;
        for p in rest {
            mins = mins.inf(p);
            maxs = maxs.sup(p);
        }

        if mins.iter().chain(maxs.iter()).all(|c| c.is_finite()) {
            Some(Aabb::new(mins, maxs))
        } else {
            None
        }
    }

    /// Moves vertices along with the current pose of the skeleton.
    pub fn deform(&mut self, skeleton: &Skeleton) {
        let transforms = skeleton.skin_transforms();

        for (index, bind) in self.positions.iter().enumerate() {
            let joints = self.skin_indices[index];
            let weights = self.skin_weights[index];

            let mut sum = 0.0;
            let mut acc = na::Vector3::zeros();

            for (&joint, &weight) in joints.iter().zip(&weights) {
                if weight == 0.0 {
                    continue;
                }
                if let Some(transform) = transforms.get(usize::from(joint)) {
                    acc += (transform * bind).coords * weight;
                    sum += weight;
                }
            }

            self.deformed[index] = if sum.abs() > f32::EPSILON {
                (acc / sum).into()
            } else {
                *bind
            };
        }
    }

    /// Deformed triangles in mesh space.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.indices.iter().map(move |&[a, b, c]| {
            Triangle::new(
                self.deformed[a as usize],
                self.deformed[b as usize],
                self.deformed[c as usize],
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{rig::SkeletonData, skeleton::euler_xyz},
        std::f32::consts::FRAC_PI_2,
    };

    fn arm() -> (SkinnedMesh, Skeleton) {
        let mesh = SkinnedMesh::from_mesh(&MeshData {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            faces: vec![[0, 1, 2]],
            skin_indices: vec![[0, 0, 0, 0], [0, 1, 0, 0], [1, 0, 0, 0]],
            skin_weights: vec![
                [1.0, 0.0, 0.0, 0.0],
                [0.5, 0.5, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
            ],
        });

        let skeleton = Skeleton::from_rig(
            0,
            &SkeletonData {
                joint_names: vec!["shoulder".into(), "elbow".into()],
                parents: vec![-1, 0],
                joint_positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
                rest_offsets: None,
            },
        )
        .unwrap();

        (mesh, skeleton)
    }

    #[test]
    fn bounding_box_covers_vertices() {
        let (mesh, _) = arm();
        let aabb = mesh.bounding_box().unwrap();
        assert_eq!(aabb.mins, na::Point3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.maxs, na::Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn empty_or_broken_mesh_has_no_bounds() {
        let mut data = MeshData {
            vertices: vec![],
            faces: vec![],
            skin_indices: vec![],
            skin_weights: vec![],
        };
        assert!(SkinnedMesh::from_mesh(&data).bounding_box().is_none());

        data.vertices.push([f32::NAN, 0.0, 0.0]);
        data.skin_indices.push([0; 4]);
        data.skin_weights.push([1.0, 0.0, 0.0, 0.0]);
        assert!(SkinnedMesh::from_mesh(&data).bounding_box().is_none());
    }

    #[test]
    fn blend_follows_weights() {
        let (mut mesh, mut skeleton) = arm();
        skeleton.set_rotation(1, euler_xyz(0.0, 0.0, FRAC_PI_2));
        skeleton.propagate();
        mesh.deform(&skeleton);

        let deformed = mesh.deformed();
        // Rigid on the shoulder.
        assert!((deformed[0] - na::Point3::origin()).norm() < 1e-6);
        // Elbow rotates about itself, so a point on the joint stays put.
        assert!((deformed[1] - na::Point3::new(1.0, 0.0, 0.0)).norm() < 1e-6);
        // Zero weights keep bind position.
        assert!((deformed[2] - na::Point3::new(2.0, 0.0, 0.0)).norm() < 1e-6);
    }
}
