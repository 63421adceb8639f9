use {
    crate::{
        camera::Camera,
        clocks::ClockIndex,
        config::CameraConfig,
        fps_counter::FpsCounter,
        light::Lighting,
        pick::SelectionPicker,
        scene::{Material, PersonSceneEntry, Scene},
    },
    nalgebra as na,
    std::{fmt::Display, time::Duration},
};

#[derive(Debug, thiserror::Error)]
pub enum RenderInitError {
    #[error("Failed to create render surface: {0}")]
    SurfaceUnavailable(String),

    #[error("Render surface has zero size {width}x{height}")]
    ZeroSized { width: u32, height: u32 },
}

/// Target that consumes drawn frames.
pub trait Surface {
    /// Size in pixels.
    fn size(&self) -> (u32, u32);

    fn present(&mut self, frame: &Frame);
}

/// Draw data of one person.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonDraw {
    pub index: usize,
    pub position: na::Vector3<f32>,
    pub material: Material,

    /// Linear base color and emitted radiance.
    pub color: [f32; 3],
    pub radiance: [f32; 3],
    pub triangles: usize,

    /// Helper overlay in scene space. Empty while helpers are hidden.
    pub joints: Vec<na::Point3<f32>>,
    pub segments: Vec<(na::Point3<f32>, na::Point3<f32>)>,
}

impl PersonDraw {
    fn new(person: &PersonSceneEntry) -> Self {
        let helpers = &person.helpers;
        let (joints, segments) = if helpers.visible {
            (helpers.joints().collect(), helpers.segments().collect())
        } else {
            (Vec::new(), Vec::new())
        };

        PersonDraw {
            index: person.index,
            position: person.position,
            material: person.material,
            color: person.material.linear_color(),
            radiance: person.material.radiance(),
            triangles: person.mesh.triangle_count(),
            joints,
            segments,
        }
    }
}

/// Everything a surface needs to draw one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub eye: na::Point3<f32>,
    pub view: na::Isometry3<f32>,
    pub projection: na::Matrix4<f32>,
    pub lighting: Lighting,
    pub persons: Vec<PersonDraw>,
}

/// Continuous redraw driven by host frame clock.
pub struct RenderLoop<S> {
    surface: S,
    camera: Camera,
    lighting: Lighting,
    fps: FpsCounter,
    frames: u64,
}

fn aspect(width: u32, height: u32) -> Result<f32, RenderInitError> {
    if width == 0 || height == 0 {
        return Err(RenderInitError::ZeroSized { width, height });
    }
    Ok(width as f32 / height as f32)
}

impl<S> RenderLoop<S>
where
    S: Surface,
{
    pub fn new(surface: S, cfg: &CameraConfig) -> Result<Self, RenderInitError> {
        let (width, height) = surface.size();
        let aspect = aspect(width, height)?;

        tracing::info!("Render loop started on {}x{} surface", width, height);

        Ok(RenderLoop {
            surface,
            camera: Camera::from_config(cfg, aspect),
            lighting: Lighting::default(),
            fps: FpsCounter::new(Duration::from_secs(2)),
            frames: 0,
        })
    }

    /// Creates surface with `factory` and starts the loop on it.
    pub fn create<F, E>(factory: F, cfg: &CameraConfig) -> Result<Self, RenderInitError>
    where
        F: FnOnce() -> Result<S, E>,
        E: Display,
    {
        let surface = factory()
            .map_err(|err| RenderInitError::SurfaceUnavailable(err.to_string()))?;
        Self::new(surface, cfg)
    }

    /// Advances camera motion and draws the scene.
    pub fn tick(&mut self, scene: &Scene, clock: &ClockIndex) {
        self.camera.orbit.update();
        self.fps.add_sample(clock.delta);

        let frame = Frame {
            index: self.frames,
            eye: self.camera.orbit.position(),
            view: self.camera.view(),
            projection: self.camera.projection().to_homogeneous(),
            lighting: self.lighting.clone(),
            persons: scene.persons().iter().map(PersonDraw::new).collect(),
        };

        tracing::trace!("Frame {} with {} person(s)", frame.index, frame.persons.len());
        self.surface.present(&frame);
        self.frames += 1;
    }

    /// Follows surface size change.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderInitError> {
        self.camera.aspect = aspect(width, height)?;
        Ok(())
    }

    /// Aims camera at every placed person.
    pub fn frame_scene(&mut self, scene: &Scene) {
        if let Some(bounds) = scene.bounds() {
            self.camera.frame(&bounds);
        }
    }

    /// Person under the pointer given in surface pixels.
    pub fn pick(&self, scene: &Scene, pointer: na::Point2<f32>) -> Option<usize> {
        let (width, height) = self.surface.size();
        SelectionPicker.pick(
            &self.camera,
            scene,
            pointer,
            na::Vector2::new(width as f32, height as f32),
        )
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }
}

/// Surface that keeps the last frame instead of drawing it.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    presented: u64,
    last: Option<Frame>,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        HeadlessSurface {
            width,
            height,
            presented: 0,
            last: None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }
}

impl Surface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &Frame) {
        self.presented += 1;
        self.last = Some(frame.clone());
    }
}
