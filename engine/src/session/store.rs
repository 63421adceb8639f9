use {
    super::{SessionId, SessionStatus},
    crate::{config::StoreConfig, pose::JointRotationState},
    std::{
        cell::RefCell,
        fs,
        io,
        path::{Path, PathBuf},
        rc::Rc,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

impl Default for Language {
    fn default() -> Self {
        Language::Zh
    }
}

impl Language {
    pub fn toggled(self) -> Self {
        match self {
            Language::En => Language::Zh,
            Language::Zh => Language::En,
        }
    }
}

/// Cached source image.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub data_url: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub mime: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub last_modified: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// The single record kept between runs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub session_id: Option<SessionId>,

    #[serde(default)]
    pub status: Option<SessionStatus>,

    #[serde(default)]
    pub num_persons: usize,

    #[serde(default)]
    pub selected_person: usize,

    #[serde(default)]
    pub joint_rotations_by_person: JointRotationState,

    #[serde(default)]
    pub language: Language,

    #[serde(default = "default_true")]
    pub show_joints: bool,

    #[serde(default)]
    pub uploaded_image: Option<UploadedImage>,
}

impl Default for PersistedSession {
    fn default() -> Self {
        PersistedSession {
            session_id: None,
            status: None,
            num_persons: 0,
            selected_person: 0,
            joint_rotations_by_person: JointRotationState::default(),
            language: Language::default(),
            show_joints: true,
            uploaded_image: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access session record")]
    Io(#[from] io::Error),

    #[error("Failed to encode session record")]
    Encode(#[from] serde_json::Error),
}

/// Persistence service for [`PersistedSession`].
pub trait SessionStore {
    /// Reads the record.
    ///
    /// Absent or unreadable record yields `None`. A corrupt record is
    /// deleted.
    fn load(&mut self) -> Option<PersistedSession>;

    fn save(&mut self, record: &PersistedSession) -> Result<(), StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;
}

fn decode(raw: &str) -> Option<PersistedSession> {
    match serde_json::from_str(raw) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!("Discarding corrupt session record: {}", err);
            None
        }
    }
}

/// Keeps the record as a JSON file inside a directory.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(directory: impl AsRef<Path>, key: &str) -> Self {
        FileStore {
            path: directory.as_ref().join(format!("{}.json", key)),
        }
    }

    pub fn from_config(cfg: &StoreConfig) -> Self {
        FileStore::new(&cfg.directory, &cfg.key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileStore {
    fn load(&mut self) -> Option<PersistedSession> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(
                    "Failed to read session record '{}': {}",
                    self.path.display(),
                    err
                );
                return None;
            }
        };

        let record = decode(&raw);
        if record.is_none() {
            if let Err(err) = self.clear() {
                tracing::warn!("Failed to delete corrupt record: {}", err);
            }
        }
        record
    }

    fn save(&mut self, record: &PersistedSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write aside and rename so a crash never leaves half a record.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store. Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slot: Rc<RefCell<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.slot.borrow_mut() = Some(raw.into());
    }
}

impl SessionStore for MemoryStore {
    fn load(&mut self) -> Option<PersistedSession> {
        let raw = self.slot.borrow().clone()?;
        let record = decode(&raw);
        if record.is_none() {
            *self.slot.borrow_mut() = None;
        }
        record
    }

    fn save(&mut self, record: &PersistedSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        *self.slot.borrow_mut() = Some(json);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}
