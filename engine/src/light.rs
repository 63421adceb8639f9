use {
    nalgebra as na,
    palette::{LinSrgb, Srgb},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction light travels in.
    pub direction: na::Vector3<f32>,
    pub radiance: [f32; 3],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    pub radiance: [f32; 3],
}

/// Lights of the viewing stage.
#[derive(Clone, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: AmbientLight,
    pub directional: Vec<DirectionalLight>,
}

fn radiance(color: Srgb, intensity: f32) -> [f32; 3] {
    let linear: LinSrgb = color.into_linear();
    let (r, g, b) = linear.into_components();
    [intensity * r, intensity * g, intensity * b]
}

impl DirectionalLight {
    /// Light shining from `position` towards the origin.
    pub fn from_position(
        position: na::Vector3<f32>,
        color: Srgb,
        intensity: f32,
    ) -> Self {
        DirectionalLight {
            direction: -position.normalize(),
            radiance: radiance(color, intensity),
        }
    }
}

impl Default for Lighting {
    /// White key light, bluish rim light and soft ambient fill.
    fn default() -> Self {
        let white = Srgb::new(1.0, 1.0, 1.0);
        Lighting {
            ambient: AmbientLight {
                radiance: radiance(white, 0.6),
            },
            directional: vec![
                DirectionalLight::from_position(
                    na::Vector3::new(5.0, 10.0, 7.0),
                    white,
                    0.8,
                ),
                DirectionalLight::from_position(
                    na::Vector3::new(-5.0, 5.0, -5.0),
                    Srgb::new(0x6b as f32 / 255.0, 0x8c as f32 / 255.0, 1.0),
                    0.3,
                ),
            ],
        }
    }
}
