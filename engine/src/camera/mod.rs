mod orbit;

pub use self::orbit::OrbitCamera;

use {
    crate::config::CameraConfig,
    nalgebra as na,
    parry3d::{bounding_volume::Aabb, query::Ray},
};

#[derive(Clone, Debug)]
pub struct Camera {
    /// Vertical field of view in radians.
    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
    pub orbit: OrbitCamera,
}

impl Camera {
    pub fn from_config(cfg: &CameraConfig, aspect: f32) -> Self {
        Camera {
            fovy: cfg.fovy_degrees.to_radians(),
            aspect,
            znear: cfg.znear,
            zfar: cfg.zfar,
            orbit: OrbitCamera::from_config(cfg),
        }
    }

    pub fn projection(&self) -> na::Perspective3<f32> {
        na::Perspective3::new(self.aspect, self.fovy, self.znear, self.zfar)
    }

    /// World to camera transform.
    pub fn view(&self) -> na::Isometry3<f32> {
        na::Isometry3::look_at_rh(
            &self.orbit.position(),
            &self.orbit.target(),
            &na::Vector3::y(),
        )
    }

    /// Ray from the eye through a point in normalized device coordinates.
    pub fn ray(&self, ndc: na::Point2<f32>) -> Ray {
        let far = self
            .projection()
            .unproject_point(&na::Point3::new(ndc.x, ndc.y, 1.0));
        let through = self.view().inverse_transform_point(&far);
        let origin = self.orbit.position();

        Ray::new(origin, (through - origin).normalize())
    }

    /// Aims camera at bounds so everything fits the view.
    pub fn frame(&mut self, bounds: &Aabb) {
        let center = bounds.center();
        let size = bounds.maxs - bounds.mins;
        let max_dim = size.x.max(size.y).max(size.z);
        let distance = (max_dim / 2.0 / (self.fovy / 2.0).tan()).abs() * 2.5;

        let position = na::Point3::new(
            center.x,
            center.y + size.y * 0.3,
            center.z + distance,
        );

        tracing::debug!("Framing {:?} from {:?}", center, position);
        self.orbit.look_at(position, center);
    }
}
