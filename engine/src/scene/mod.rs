//! Multi-person rig scene.

mod build;
mod head;
mod helpers;
mod layout;
mod material;
mod resources;

pub use self::{
    build::RigSceneBuilder,
    head::{resolve_head, resolve_targets},
    helpers::DebugHelpers,
    layout::{centroid, placement},
    material::{Material, MaterialPalette},
    resources::{ResourceHandle, ResourceKind, ResourceRegistry},
};

use {
    crate::{
        config::SceneConfig,
        rig::{RigPayload, SceneLoadError},
        skeleton::Skeleton,
        skin::SkinnedMesh,
    },
    nalgebra as na,
    parry3d::bounding_volume::{Aabb, BoundingVolume as _},
    std::collections::BTreeMap,
};

/// Everything built for one payload entry.
#[derive(Debug)]
pub struct PersonSceneEntry {
    pub index: usize,
    pub mesh: SkinnedMesh,
    pub skeleton: Skeleton,
    pub helpers: DebugHelpers,
    pub material: Material,

    /// Joint name to bone index, including the resolved head.
    pub targets: BTreeMap<String, usize>,

    pub head: Option<usize>,

    /// Offset of mesh and helpers in the scene.
    pub position: na::Vector3<f32>,

    /// Bind pose bounds in mesh space.
    pub bounds: Option<Aabb>,

    resources: Vec<ResourceHandle>,
}

impl PersonSceneEntry {
    pub fn root_bones(&self) -> &[usize] {
        self.skeleton.roots()
    }

    pub fn target(&self, joint: &str) -> Option<usize> {
        self.targets.get(joint).copied()
    }

    pub fn resources(&self) -> &[ResourceHandle] {
        &self.resources
    }

    /// Bind pose bounds moved to the person's place.
    pub fn placed_bounds(&self) -> Option<Aabb> {
        let bounds = self.bounds?;
        Some(Aabb::new(
            bounds.mins + self.position,
            bounds.maxs + self.position,
        ))
    }
}

/// Per-person entries plus the resources they own.
#[derive(Debug)]
pub struct Scene {
    persons: Vec<PersonSceneEntry>,
    registry: ResourceRegistry,
    palette: MaterialPalette,
    joint_radius: f32,
    max_persons: usize,
    show_joints: bool,
    selected: usize,
}

impl Scene {
    pub fn new(cfg: &SceneConfig) -> Self {
        Scene {
            persons: Vec::new(),
            registry: ResourceRegistry::new(),
            palette: cfg.palette,
            joint_radius: cfg.joint_radius,
            max_persons: cfg.max_persons,
            show_joints: true,
            selected: 0,
        }
    }

    /// Replaces all persons with ones built from raw payloads.
    pub fn rebuild_from_values(
        &mut self,
        values: &[serde_json::Value],
    ) -> Result<(), SceneLoadError> {
        self.dispose();
        let payloads = RigPayload::parse_all(values, self.max_persons)?;
        self.rebuild(&payloads)
    }

    /// Replaces all persons.
    ///
    /// Previous persons are released first. On error the scene is left
    /// empty with no live resources.
    #[tracing::instrument(skip(self, payloads), fields(persons = payloads.len()))]
    pub fn rebuild(
        &mut self,
        payloads: &[RigPayload],
    ) -> Result<(), SceneLoadError> {
        self.dispose();

        let persons = RigSceneBuilder::new(&mut self.registry)
            .with_palette(self.palette)
            .with_joint_radius(self.joint_radius)
            .with_max_persons(self.max_persons)
            .with_selected(self.selected)
            .with_show_joints(self.show_joints)
            .build(payloads)?;

        tracing::info!(
            "Scene built with {} person(s), {} live resources",
            persons.len(),
            self.registry.live()
        );
        self.persons = persons;
        Ok(())
    }

    /// Releases every person.
    pub fn dispose(&mut self) {
        for person in self.persons.drain(..) {
            self.registry.release_all(person.resources);
        }
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn persons(&self) -> &[PersonSceneEntry] {
        &self.persons
    }

    pub fn person(&self, index: usize) -> Option<&PersonSceneEntry> {
        self.persons.get(index)
    }

    pub fn person_mut(&mut self, index: usize) -> Option<&mut PersonSceneEntry> {
        self.persons.get_mut(index)
    }

    pub fn persons_mut(&mut self) -> &mut [PersonSceneEntry] {
        &mut self.persons
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn show_joints(&self) -> bool {
        self.show_joints
    }

    pub fn set_show_joints(&mut self, show: bool) {
        self.show_joints = show;
        for person in &mut self.persons {
            person.helpers.visible = show;
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Moves highlight to another person.
    pub fn set_selected(&mut self, selected: usize) {
        self.selected = selected;
        let palette = self.palette;
        for person in &mut self.persons {
            let is_selected = person.index == selected;
            person.material = palette.person(is_selected);
            person.helpers.set_selected(&palette, is_selected);
        }
    }

    /// Combined bounds of all placed persons.
    pub fn bounds(&self) -> Option<Aabb> {
        self.persons
            .iter()
            .filter_map(PersonSceneEntry::placed_bounds)
            .fold(None, |acc: Option<Aabb>, aabb| {
                Some(match acc {
                    Some(acc) => acc.merged(&aabb),
                    None => aabb,
                })
            })
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn person(root: Option<[f32; 3]>) -> serde_json::Value {
        let mut value = json!({
            "mesh": {
                "vertices": [[0.0, -1.0, 0.0], [0.1, 0.5, 0.0], [-0.1, 0.5, 0.0]],
                "faces": [[0, 1, 2]],
                "skinIndices": [[0, 0, 0, 0], [1, 0, 0, 0], [1, 0, 0, 0]],
                "skinWeights": [[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]]
            },
            "skeleton": {
                "joint_names": ["pelvis", "neck"],
                "parents": [-1, 0],
                "joint_positions": [[0.0, 0.0, 0.0], [0.0, 0.5, 0.0]]
            },
            "animation_targets": { "neck": 1 }
        });
        if let Some(root) = root {
            value["metadata"] = json!({ "root_translation": root });
        }
        value
    }

    #[test]
    fn rebuild_releases_previous_resources() {
        let mut scene = Scene::new(&SceneConfig::default());
        scene
            .rebuild_from_values(&[person(None), person(None)])
            .unwrap();
        let live = scene.registry().live();
        // Mesh, material, skeleton, 2 joints and a line set per person.
        assert_eq!(live, 2 * (3 + 2 * 2 + 2));

        scene.rebuild_from_values(&[person(None)]).unwrap();
        assert_eq!(scene.registry().live(), live / 2);

        scene.dispose();
        assert_eq!(scene.registry().live(), 0);
    }

    #[test]
    fn failed_rebuild_leaves_empty_scene() {
        let mut scene = Scene::new(&SceneConfig::default());
        scene.rebuild_from_values(&[person(None)]).unwrap();

        let mut broken = person(None);
        broken["skeleton"]["parents"] = json!([1, 0]);
        let err = scene
            .rebuild_from_values(&[person(None), broken])
            .unwrap_err();

        assert!(matches!(err, SceneLoadError::CyclicHierarchy { person: 1, .. }));
        assert!(scene.is_empty());
        assert_eq!(scene.registry().live(), 0);
    }

    #[test]
    fn persons_stand_on_ground_and_share_helper_offset() {
        let mut scene = Scene::new(&SceneConfig::default());
        scene
            .rebuild_from_values(&[
                person(Some([1.0, 0.0, 2.0])),
                person(Some([-1.0, 0.0, 4.0])),
            ])
            .unwrap();

        let first = scene.person(0).unwrap();
        assert_eq!(first.position, na::Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(first.helpers.position, first.position);

        let second = scene.person(1).unwrap();
        assert_eq!(second.position, na::Vector3::new(-1.0, 1.0, -1.0));

        let bounds = scene.bounds().unwrap();
        assert_eq!(bounds.mins.y, 0.0);
    }

    #[test]
    fn selection_and_joint_visibility_update_entries() {
        let mut scene = Scene::new(&SceneConfig::default());
        scene
            .rebuild_from_values(&[person(None), person(None)])
            .unwrap();

        let palette = MaterialPalette::default();
        assert_eq!(scene.person(0).unwrap().material, palette.person(true));

        scene.set_selected(1);
        assert_eq!(scene.person(0).unwrap().material, palette.person(false));
        assert_eq!(scene.person(1).unwrap().material, palette.person(true));

        scene.set_show_joints(false);
        assert!(scene.persons().iter().all(|p| !p.helpers.visible));
    }

    #[test]
    fn too_many_persons_is_rejected() {
        let mut cfg = SceneConfig::default();
        cfg.max_persons = 1;
        let mut scene = Scene::new(&cfg);
        assert!(matches!(
            scene.rebuild_from_values(&[person(None), person(None)]),
            Err(SceneLoadError::TooManyPersons { count: 2, max: 1 })
        ));
    }
}
