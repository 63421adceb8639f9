use {
    crate::{scene::MaterialPalette, session::Backoff},
    eyre::{Report, WrapErr},
    std::{path::PathBuf, time::Duration},
};

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub polling: PollingConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
}

impl Config {
    /// Loads config from `BODYRIG_CONFIG_PATH` or `./cfg.ron`.
    /// Missing default file yields default config.
    pub fn load_default() -> Result<Self, Report> {
        match std::env::var("BODYRIG_CONFIG_PATH") {
            Ok(path) => Self::load(PathBuf::from(path)),
            Err(_) => {
                let path = PathBuf::from("./cfg.ron");
                if path.exists() {
                    Self::load(path)
                } else {
                    tracing::info!("No config file found, using defaults");
                    Ok(Config::default())
                }
            }
        }
    }

    #[tracing::instrument]
    pub fn load(path: PathBuf) -> Result<Self, Report> {
        let file = std::fs::File::open(&path).wrap_err_with(|| {
            format!("Failed to open config '{}'", path.display())
        })?;
        let config = ron::de::from_reader(file).wrap_err_with(|| {
            format!("Failed to parse config '{}'", path.display())
        })?;
        Ok(config)
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "http://127.0.0.1:5000/".to_owned(),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub directory: PathBuf,
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            directory: PathBuf::from("./.bodyrig"),
            key: "body-session-v1".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub processing_delay_ms: u64,
    pub idle_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            processing_delay_ms: 3000,
            idle_delay_ms: 4000,
            multiplier: 1.5,
            max_delay_ms: 15000,
        }
    }
}

impl PollingConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            processing: Duration::from_millis(self.processing_delay_ms),
            idle: Duration::from_millis(self.idle_delay_ms),
            multiplier: self.multiplier,
            max: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Payload arrays longer than this are rejected.
    pub max_persons: usize,

    /// Radius of debug joint spheres.
    pub joint_radius: f32,

    pub palette: MaterialPalette,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            max_persons: 64,
            joint_radius: 0.02,
            palette: MaterialPalette::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            fovy_degrees: 50.0,
            znear: 0.1,
            zfar: 100.0,
            position: [0.0, 1.5, 4.0],
            target: [0.0, 1.0, 0.0],
            damping: 0.05,
            min_distance: 0.5,
            max_distance: 15.0,
        }
    }
}
