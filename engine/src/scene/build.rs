use {
    super::{
        head::{resolve_head, resolve_targets},
        layout::{centroid, placement},
        DebugHelpers, MaterialPalette, PersonSceneEntry, ResourceKind,
        ResourceRegistry,
    },
    crate::{
        rig::{RigPayload, SceneLoadError},
        skeleton::Skeleton,
        skin::SkinnedMesh,
    },
};

/// Turns rig payloads into per-person scene entries.
///
/// Every entry allocates its resources from the registry. When any person
/// fails to build, resources of already built persons are released
/// before the error is returned.
pub struct RigSceneBuilder<'a> {
    registry: &'a mut ResourceRegistry,
    palette: MaterialPalette,
    joint_radius: f32,
    max_persons: usize,
    selected: usize,
    show_joints: bool,
}

impl<'a> RigSceneBuilder<'a> {
    pub fn new(registry: &'a mut ResourceRegistry) -> Self {
        RigSceneBuilder {
            registry,
            palette: MaterialPalette::default(),
            joint_radius: 0.02,
            max_persons: 64,
            selected: 0,
            show_joints: true,
        }
    }

    pub fn with_palette(mut self, palette: MaterialPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_joint_radius(mut self, radius: f32) -> Self {
        self.joint_radius = radius;
        self
    }

    pub fn with_max_persons(mut self, max_persons: usize) -> Self {
        self.max_persons = max_persons;
        self
    }

    pub fn with_selected(mut self, selected: usize) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_show_joints(mut self, show_joints: bool) -> Self {
        self.show_joints = show_joints;
        self
    }

    pub fn build(
        self,
        payloads: &[RigPayload],
    ) -> Result<Vec<PersonSceneEntry>, SceneLoadError> {
        if payloads.len() > self.max_persons {
            return Err(SceneLoadError::TooManyPersons {
                count: payloads.len(),
                max: self.max_persons,
            });
        }

        let center = centroid(payloads.iter().map(RigPayload::root_translation));
        tracing::debug!(
            "Building {} person(s) around [{}, {}]",
            payloads.len(),
            center[0],
            center[1]
        );

        let mut entries: Vec<PersonSceneEntry> =
            Vec::with_capacity(payloads.len());

        for (index, payload) in payloads.iter().enumerate() {
            match self.build_person(index, payload, center) {
                Ok(entry) => entries.push(entry.allocate(self.registry)),
                Err(err) => {
                    for entry in entries.drain(..) {
                        self.registry.release_all(entry.resources);
                    }
                    return Err(err);
                }
            }
        }

        Ok(entries)
    }

    fn build_person(
        &self,
        index: usize,
        payload: &RigPayload,
        center: [f32; 2],
    ) -> Result<PersonSceneEntry, SceneLoadError> {
        payload.validate(index)?;

        let skeleton = Skeleton::from_rig(index, &payload.skeleton)?;
        let mesh = SkinnedMesh::from_mesh(&payload.mesh);

        let bounds = mesh.bounding_box();
        if bounds.is_none() {
            tracing::warn!(
                "Person {}: no bounding box, keeping mesh at ground level 0",
                index
            );
        }

        let head = resolve_head(&payload.skeleton, &payload.animation_targets);
        match head {
            Some(head) => tracing::debug!(
                "Person {}: head resolved to '{}' ({})",
                index,
                payload.skeleton.joint_names[head],
                head
            ),
            None => tracing::debug!(
                "Person {}: unable to resolve head, only neck is controllable",
                index
            ),
        }
        let targets = resolve_targets(&payload.animation_targets, head);

        let position =
            placement(payload.root_translation(), center, bounds.as_ref());

        let selected = index == self.selected;
        let mut helpers = DebugHelpers::from_rig(
            &payload.skeleton,
            self.joint_radius,
            &self.palette,
            selected,
        );
        helpers.position = position;
        helpers.visible = self.show_joints;

        tracing::debug!(
            "Person {}: {} vertices, {} joints, placed at {:?}",
            index,
            mesh.vertex_count(),
            skeleton.len(),
            position
        );

        Ok(PersonSceneEntry {
            index,
            mesh,
            skeleton,
            helpers,
            material: self.palette.person(selected),
            targets,
            head,
            position,
            bounds,
            resources: Vec::new(),
        })
    }
}

impl PersonSceneEntry {
    fn allocate(mut self, registry: &mut ResourceRegistry) -> Self {
        self.resources = vec![
            registry.allocate(ResourceKind::MeshBuffers),
            registry.allocate(ResourceKind::Material),
            registry.allocate(ResourceKind::Skeleton),
        ];
        self.resources.extend(self.helpers.allocate(registry));
        self
    }
}
