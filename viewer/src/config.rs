use {clap::Parser, color_eyre::Report, std::path::PathBuf, std::time::Duration};

/// Headless viewer for reconstructed body rigs
#[derive(Clone, Debug, Parser)]
#[command(name = "bodyrig-viewer", version, about, long_about = None)]
pub struct ViewerConfig {
    /// Image to submit for reconstruction (png, jpg, jpeg or webp)
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Submit the cached image of the previous session again
    #[arg(long)]
    pub reprocess: bool,

    /// Forget the persisted session before starting
    #[arg(long)]
    pub clear: bool,

    /// Person to select once the scene is built
    #[arg(long)]
    pub person: Option<usize>,

    /// Target height in centimeters to compute body measurements for
    #[arg(long)]
    pub measure: Option<String>,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Redraw rate of the headless render loop
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Seconds to wait for the session before giving up
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,

    /// Seconds before a single HTTP request is abandoned
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,
}

impl ViewerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub engine: bodyrig::Config,
    pub viewer: ViewerConfig,
}

impl Config {
    /// Parses command line and loads engine config next to it.
    pub fn load() -> Result<Self, Report> {
        let viewer = ViewerConfig::parse();
        let engine = bodyrig::Config::load_default()?;
        tracing::info!("Config loaded: {:?}", engine);
        Ok(Config { engine, viewer })
    }
}
