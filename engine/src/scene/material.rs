use palette::{LinSrgb, Srgb};

/// Surface parameters of a person mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub color: Srgb,
    pub emissive: Srgb,
    pub emissive_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
}

impl Material {
    /// Base color in linear space.
    pub fn linear_color(&self) -> [f32; 3] {
        let linear: LinSrgb = self.color.into_linear();
        let (r, g, b) = linear.into_components();
        [r, g, b]
    }

    /// Emitted radiance in linear space.
    pub fn radiance(&self) -> [f32; 3] {
        let linear: LinSrgb = self.emissive.into_linear();
        let (r, g, b) = linear.into_components();
        [
            r * self.emissive_intensity,
            g * self.emissive_intensity,
            b * self.emissive_intensity,
        ]
    }
}

/// Colors for persons and their debug helpers.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct MaterialPalette {
    #[serde(with = "serde_color")]
    pub person: Srgb,

    #[serde(with = "serde_color")]
    pub person_selected: Srgb,

    #[serde(with = "serde_color")]
    pub emissive_selected: Srgb,

    pub emissive_intensity: f32,

    #[serde(with = "serde_color")]
    pub joint: Srgb,

    #[serde(with = "serde_color")]
    pub joint_selected: Srgb,

    #[serde(with = "serde_color")]
    pub bone: Srgb,

    #[serde(with = "serde_color")]
    pub bone_selected: Srgb,
}

fn hex(rgb: u32) -> Srgb {
    let channel = |shift: u32| ((rgb >> shift) & 0xff) as f32 / 255.0;
    Srgb::new(channel(16), channel(8), channel(0))
}

impl Default for MaterialPalette {
    fn default() -> Self {
        MaterialPalette {
            person: hex(0x4a9eff),
            person_selected: hex(0x4aefff),
            emissive_selected: hex(0x002244),
            emissive_intensity: 0.3,
            joint: hex(0xff4466),
            joint_selected: hex(0xff6688),
            bone: hex(0x55aaff),
            bone_selected: hex(0x77ccff),
        }
    }
}

impl MaterialPalette {
    pub fn person(&self, selected: bool) -> Material {
        let (color, emissive, emissive_intensity) = if selected {
            (
                self.person_selected,
                self.emissive_selected,
                self.emissive_intensity,
            )
        } else {
            (self.person, Srgb::new(0.0, 0.0, 0.0), 0.0)
        };

        Material {
            color,
            emissive,
            emissive_intensity,
            metalness: 0.3,
            roughness: 0.4,
        }
    }

    pub fn joint(&self, selected: bool) -> Srgb {
        if selected {
            self.joint_selected
        } else {
            self.joint
        }
    }

    pub fn bone(&self, selected: bool) -> Srgb {
        if selected {
            self.bone_selected
        } else {
            self.bone
        }
    }
}

mod serde_color {
    use {palette::Srgb, serde::de::*, std::fmt};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Srgb, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ColorVisitor;

        impl<'de> Visitor<'de> for ColorVisitor {
            type Value = Srgb;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt.write_str("Color HEX code or array of 3 elements")
            }

            fn visit_str<E>(self, s: &str) -> Result<Srgb, E>
            where
                E: Error,
            {
                let digits = s
                    .strip_prefix('#')
                    .filter(|d| d.len() == 6 && d.is_ascii())
                    .and_then(|d| u32::from_str_radix(d, 16).ok());

                match digits {
                    Some(rgb) => Ok(super::hex(rgb)),
                    None => Err(E::invalid_value(Unexpected::Str(s), &self)),
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Srgb, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut next = || -> Result<f32, A::Error> {
                    seq.next_element()?
                        .ok_or_else(|| Error::invalid_length(3, &ColorVisitor))
                };
                let r = next()?;
                let g = next()?;
                let b = next()?;

                Ok(Srgb::new(r, g, b))
            }
        }
        deserializer.deserialize_any(ColorVisitor)
    }
}
