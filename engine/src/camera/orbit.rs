use {
    crate::config::CameraConfig,
    nalgebra as na,
    std::f32::consts::PI,
};

const POLAR_EPSILON: f32 = 1e-6;

/// Camera orbiting a target point with damped motion.
///
/// Position is kept in spherical coordinates around the target. Input
/// accumulates into pending deltas that are bled off by `damping` on
/// every [`OrbitCamera::update`].
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    target: na::Point3<f32>,

    /// Angle around Y, zero looking down -Z.
    azimuth: f32,

    /// Angle from +Y.
    polar: f32,

    distance: f32,

    azimuth_delta: f32,
    polar_delta: f32,
    scale: f32,
    pan: na::Vector3<f32>,

    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitCamera {
    pub fn new(position: na::Point3<f32>, target: na::Point3<f32>) -> Self {
        let mut orbit = OrbitCamera {
            target,
            azimuth: 0.0,
            polar: PI / 2.0,
            distance: 1.0,
            azimuth_delta: 0.0,
            polar_delta: 0.0,
            scale: 1.0,
            pan: na::Vector3::zeros(),
            damping: 0.05,
            min_distance: 0.5,
            max_distance: 15.0,
        };
        orbit.look_at(position, target);
        orbit
    }

    pub fn from_config(cfg: &CameraConfig) -> Self {
        let mut orbit = OrbitCamera::new(cfg.position.into(), cfg.target.into());
        orbit.damping = cfg.damping;
        orbit.min_distance = cfg.min_distance;
        orbit.max_distance = cfg.max_distance;
        orbit
    }

    /// Places camera explicitly, dropping pending motion.
    pub fn look_at(&mut self, position: na::Point3<f32>, target: na::Point3<f32>) {
        let offset = position - target;
        let distance = offset.norm();

        self.target = target;
        self.distance = distance;
        if distance > 0.0 {
            self.azimuth = offset.x.atan2(offset.z);
            self.polar = (offset.y / distance).max(-1.0).min(1.0).acos();
        }

        self.azimuth_delta = 0.0;
        self.polar_delta = 0.0;
        self.scale = 1.0;
        self.pan = na::Vector3::zeros();
    }

    /// Queues rotation in radians.
    pub fn rotate(&mut self, azimuth: f32, polar: f32) {
        self.azimuth_delta -= azimuth;
        self.polar_delta -= polar;
    }

    /// Queues distance change. Factors above one move the camera away.
    pub fn dolly(&mut self, factor: f32) {
        if factor > 0.0 && factor.is_finite() {
            self.scale *= factor;
        }
    }

    /// Queues target translation.
    pub fn pan(&mut self, offset: na::Vector3<f32>) {
        self.pan += offset;
    }

    /// Advances damped motion by one frame.
    pub fn update(&mut self) {
        let damping = self.damping.max(0.0).min(1.0);

        self.azimuth += self.azimuth_delta * damping;
        self.polar = (self.polar + self.polar_delta * damping)
            .max(POLAR_EPSILON)
            .min(PI - POLAR_EPSILON);

        self.distance = (self.distance * self.scale)
            .max(self.min_distance)
            .min(self.max_distance);

        self.target += self.pan * damping;

        self.azimuth_delta *= 1.0 - damping;
        self.polar_delta *= 1.0 - damping;
        self.pan *= 1.0 - damping;
        self.scale = 1.0;
    }

    pub fn target(&self) -> na::Point3<f32> {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn position(&self) -> na::Point3<f32> {
        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let (sin_azimuth, cos_azimuth) = self.azimuth.sin_cos();
        self.target
            + na::Vector3::new(
                sin_polar * sin_azimuth,
                cos_polar,
                sin_polar * cos_azimuth,
            ) * self.distance
    }
}
