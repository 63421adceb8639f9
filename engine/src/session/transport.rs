use {
    super::{SessionError, SessionId, SessionStatus, UploadedImage},
    base64::{engine::general_purpose::STANDARD, Engine as _},
    futures::future::BoxFuture,
    std::{collections::BTreeMap, path::Path, time::UNIX_EPOCH},
};

/// Network seam of the session synchronizer.
///
/// Implementations map non-success responses to
/// [`SessionError::Transport`] carrying the server's `error` message when
/// one is present. Polling a session the server does not know must
/// resolve to [`SessionError::NotFound`].
pub trait Transport: Send + Sync + 'static {
    fn submit(
        &self,
        image: ImageUpload,
    ) -> BoxFuture<'static, Result<SubmitResponse, SessionError>>;

    fn status(
        &self,
        session: SessionId,
    ) -> BoxFuture<'static, Result<StatusResponse, SessionError>>;

    fn measurements(
        &self,
        request: MeasurementRequest,
    ) -> BoxFuture<'static, Result<MeasurementResponse, SessionError>>;
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub status: Option<SessionStatus>,

    #[serde(default)]
    pub num_persons: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub status: SessionStatus,

    #[serde(default)]
    pub num_persons: Option<usize>,

    /// Rig payloads, validated only when the scene is built.
    #[serde(default)]
    pub rig_data: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MeasurementRequest {
    pub session_id: SessionId,
    pub person_index: usize,
    pub target_height_cm: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct MeasurementUnit {
    pub unit: String,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct MeasurementResponse {
    #[serde(default)]
    pub measurements: BTreeMap<String, f64>,

    #[serde(default)]
    pub schema: BTreeMap<String, MeasurementUnit>,

    #[serde(default)]
    pub actual_height_cm: Option<f64>,

    #[serde(default)]
    pub target_height_cm: Option<f64>,

    #[serde(default)]
    pub scale_factor: Option<f64>,
}

/// Source image for a reconstruction job.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageUpload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub last_modified: Option<u64>,
}

const FALLBACK_NAME: &str = "cached-upload.png";
const FALLBACK_MIME: &str = "image/png";

impl ImageUpload {
    pub fn from_path(path: &Path) -> Result<Self, SessionError> {
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime_for_extension)
            .ok_or_else(|| {
                SessionError::Validation(
                    "Invalid file type. Allowed: png, jpg, jpeg, webp".into(),
                )
            })?;

        let bytes = std::fs::read(path).map_err(|err| {
            SessionError::Validation(format!(
                "Failed to read '{}': {}",
                path.display(),
                err
            ))
        })?;

        let last_modified = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|since| since.as_millis() as u64);

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_NAME.to_owned());

        Ok(ImageUpload {
            name,
            mime: mime.to_owned(),
            bytes,
            last_modified,
        })
    }

    /// Encodes image into a record suitable for persistence.
    pub fn to_uploaded(&self) -> UploadedImage {
        UploadedImage {
            data_url: format!(
                "data:{};base64,{}",
                self.mime,
                STANDARD.encode(&self.bytes)
            ),
            name: self.name.clone(),
            mime: self.mime.clone(),
            size: self.bytes.len() as u64,
            last_modified: self.last_modified,
        }
    }

    /// Decodes image previously cached with [`ImageUpload::to_uploaded`].
    pub fn from_uploaded(image: &UploadedImage) -> Result<Self, SessionError> {
        let (header, payload) =
            image.data_url.split_once(',').ok_or_else(|| {
                SessionError::Validation("Cached image is not a data URL".into())
            })?;

        if !header.ends_with(";base64") {
            return Err(SessionError::Validation(
                "Cached image is not base64 encoded".into(),
            ));
        }

        let bytes = STANDARD.decode(payload.trim()).map_err(|err| {
            SessionError::Validation(format!("Cached image is corrupted: {}", err))
        })?;

        let mime = header
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|mime| !mime.is_empty())
            .map(str::to_owned)
            .or_else(|| Some(image.mime.clone()).filter(|m| !m.is_empty()))
            .unwrap_or_else(|| FALLBACK_MIME.to_owned());

        let name = if image.name.is_empty() {
            FALLBACK_NAME.to_owned()
        } else {
            image.name.clone()
        };

        Ok(ImageUpload {
            name,
            mime,
            bytes,
            last_modified: image.last_modified,
        })
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn cached_image_restores_original_bytes() {
        let upload = ImageUpload {
            name: "crowd.jpg".into(),
            mime: "image/jpeg".into(),
            bytes: vec![0xff, 0xd8, 0xff, 0x00, 0x42],
            last_modified: Some(1_700_000_000_000),
        };

        let cached = upload.to_uploaded();
        assert!(cached.data_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(cached.size, 5);

        assert_eq!(ImageUpload::from_uploaded(&cached).unwrap(), upload);
    }

    #[test]
    fn missing_name_and_mime_fall_back() {
        let cached = UploadedImage {
            data_url: "data:;base64,AAEC".into(),
            name: String::new(),
            mime: String::new(),
            size: 3,
            last_modified: None,
        };
        let upload = ImageUpload::from_uploaded(&cached).unwrap();
        assert_eq!(upload.name, "cached-upload.png");
        assert_eq!(upload.mime, "image/png");
        assert_eq!(upload.bytes, [0, 1, 2]);
    }

    #[test]
    fn rejects_non_data_urls() {
        let cached = UploadedImage {
            data_url: "https://example.com/a.png".into(),
            name: "a.png".into(),
            mime: "image/png".into(),
            size: 0,
            last_modified: None,
        };
        assert!(matches!(
            ImageUpload::from_uploaded(&cached),
            Err(SessionError::Validation(_))
        ));
    }

    #[test]
    fn rejects_unsupported_extensions() {
        let err = ImageUpload::from_path(Path::new("scan.tiff")).unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[test]
    fn status_response_tolerates_unknown_status_and_nulls() {
        let response: StatusResponse = serde_json::from_str(
            r#"{"session_id":"abc","status":"warming","num_persons":null,"error":null}"#,
        )
        .unwrap();
        assert_eq!(response.status, SessionStatus::Unknown);
        assert_eq!(response.num_persons, None);
        assert!(response.rig_data.is_none());
    }
}
