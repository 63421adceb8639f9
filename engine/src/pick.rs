use {
    crate::{camera::Camera, scene::Scene},
    nalgebra as na,
    ordered_float::OrderedFloat,
    parry3d::query::{Ray, RayCast as _},
};

/// Resolves pointer positions to persons by ray casting their meshes.
///
/// Only skinned person meshes are hit tested, debug helpers are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectionPicker;

impl SelectionPicker {
    /// Converts pointer position in pixels to normalized device
    /// coordinates. Returns `None` for an empty viewport.
    pub fn ndc(
        pointer: na::Point2<f32>,
        viewport: na::Vector2<f32>,
    ) -> Option<na::Point2<f32>> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }

        Some(na::Point2::new(
            pointer.x / viewport.x * 2.0 - 1.0,
            -(pointer.y / viewport.y * 2.0) + 1.0,
        ))
    }

    /// Index of the person under the pointer.
    pub fn pick(
        &self,
        camera: &Camera,
        scene: &Scene,
        pointer: na::Point2<f32>,
        viewport: na::Vector2<f32>,
    ) -> Option<usize> {
        let ndc = Self::ndc(pointer, viewport)?;
        let (person, toi) = self.cast(&camera.ray(ndc), scene)?;
        tracing::debug!("Picked person {} at distance {}", person, toi);
        Some(person)
    }

    /// Nearest person hit by the ray and distance to the hit.
    pub fn cast(&self, ray: &Ray, scene: &Scene) -> Option<(usize, f32)> {
        scene
            .persons()
            .iter()
            .filter_map(|person| {
                let local = Ray::new(ray.origin - person.position, ray.dir);
                person
                    .mesh
                    .triangles()
                    .filter_map(|triangle| {
                        triangle.cast_local_ray(&local, f32::MAX, true)
                    })
                    .min_by_key(|&toi| OrderedFloat(toi))
                    .map(|toi| (person.index, toi))
            })
            .min_by_key(|&(_, toi)| OrderedFloat(toi))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::config::SceneConfig, serde_json::json};

    fn quad_person(root: [f32; 3]) -> serde_json::Value {
        json!({
            "mesh": {
                "vertices": [
                    [-0.5, 0.0, 0.0], [0.5, 0.0, 0.0],
                    [0.5, 1.0, 0.0], [-0.5, 1.0, 0.0]
                ],
                "faces": [[0, 1, 2], [0, 2, 3]],
                "skinIndices": [[0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
                "skinWeights": [
                    [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]
                ]
            },
            "skeleton": {
                "joint_names": ["pelvis"],
                "parents": [-1],
                "joint_positions": [[0.0, 0.0, 0.0]]
            },
            "metadata": { "root_translation": root }
        })
    }

    fn scene(roots: [[f32; 3]; 2]) -> Scene {
        let mut scene = Scene::new(&SceneConfig::default());
        scene
            .rebuild_from_values(&[quad_person(roots[0]), quad_person(roots[1])])
            .unwrap();
        scene
    }

    #[test]
    fn pointer_maps_to_ndc() {
        let viewport = na::Vector2::new(800.0, 600.0);
        assert_eq!(
            SelectionPicker::ndc(na::Point2::new(0.0, 0.0), viewport),
            Some(na::Point2::new(-1.0, 1.0))
        );
        assert_eq!(
            SelectionPicker::ndc(na::Point2::new(400.0, 600.0), viewport),
            Some(na::Point2::new(0.0, -1.0))
        );
        assert_eq!(
            SelectionPicker::ndc(na::Point2::origin(), na::Vector2::zeros()),
            None
        );
    }

    #[test]
    fn hits_placed_meshes() {
        let scene = scene([[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let picker = SelectionPicker;

        let ray = Ray::new(na::Point3::new(1.0, 0.3, 5.0), -na::Vector3::z());
        let (person, toi) = picker.cast(&ray, &scene).unwrap();
        assert_eq!(person, 1);
        assert!((toi - 5.0).abs() < 1e-5);

        // Back faces are hit too.
        let ray = Ray::new(na::Point3::new(-1.0, 0.3, -5.0), na::Vector3::z());
        assert_eq!(picker.cast(&ray, &scene).map(|(p, _)| p), Some(0));

        let ray = Ray::new(na::Point3::new(5.0, 0.3, 5.0), -na::Vector3::z());
        assert_eq!(picker.cast(&ray, &scene), None);
    }

    #[test]
    fn nearest_hit_wins() {
        // Placed at z = 1 and z = -1.
        let scene = scene([[0.0, 0.0, 0.0], [0.0, 0.0, 2.0]]);
        let picker = SelectionPicker;

        let ray = Ray::new(na::Point3::new(0.1, 0.3, 5.0), -na::Vector3::z());
        assert_eq!(picker.cast(&ray, &scene).map(|(p, _)| p), Some(0));

        let ray = Ray::new(na::Point3::new(0.1, 0.3, -5.0), na::Vector3::z());
        assert_eq!(picker.cast(&ray, &scene).map(|(p, _)| p), Some(1));
    }

    #[test]
    fn camera_pick_selects_person_in_view_center() {
        let scene = scene([[0.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        let mut camera = Camera::from_config(&Default::default(), 1.0);
        camera.orbit.look_at(
            na::Point3::new(-1.5, 0.4, 4.0),
            na::Point3::new(-1.5, 0.4, 0.0),
        );

        let viewport = na::Vector2::new(100.0, 100.0);
        let picked = SelectionPicker.pick(
            &camera,
            &scene,
            na::Point2::new(50.0, 50.0),
            viewport,
        );
        assert_eq!(picked, Some(0));

        // Upper right corner of the view is empty.
        let picked = SelectionPicker.pick(
            &camera,
            &scene,
            na::Point2::new(100.0, 0.0),
            viewport,
        );
        assert_eq!(picked, None);
    }
}
