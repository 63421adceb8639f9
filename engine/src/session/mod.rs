//! Tracking of asynchronous reconstruction jobs.
//!
//! [`SessionSynchronizer`] is a sans-IO state machine. It hands out
//! [`Request`]s tagged with [`Ticket`]s and consumes [`Reply`]s.
//! A [`Dispatcher`] carries requests to a [`Transport`] and back.

mod backoff;
mod dispatch;
mod store;
mod sync;
mod transport;

pub use self::{
    backoff::Backoff,
    dispatch::{AsyncDispatcher, Dispatcher, Reply, Request, Ticket},
    store::{
        FileStore, Language, MemoryStore, PersistedSession, SessionStore,
        StoreError, UploadedImage,
    },
    sync::{SessionEvent, SessionSynchronizer},
    transport::{
        ImageUpload, MeasurementRequest, MeasurementResponse,
        MeasurementUnit, StatusResponse, SubmitResponse, Transport,
    },
};

use std::fmt::{self, Display, Formatter};

/// Opaque server-side job identifier.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    /// Returns `true` for statuses after which the server never changes
    /// the session again.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl Display for SessionStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            SessionStatus::Queued => "queued",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Unknown => "unknown",
        })
    }
}

/// Client-side view of a reconstruction job.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    pub num_persons: usize,
    pub error: Option<String>,
}

impl Session {
    pub fn queued(id: SessionId) -> Self {
        Session {
            id,
            status: SessionStatus::Queued,
            num_persons: 0,
            error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// Network failure or non-success response.
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Missing or malformed identifiers and inputs.
    #[error("{0}")]
    Validation(String),

    /// Polled session is unknown to the server.
    #[error("Session expired or not found")]
    NotFound,

    /// Job finished unsuccessfully.
    #[error("{0}")]
    ProcessingFailure(String),
}

impl SessionError {
    pub fn transport(message: impl Into<String>) -> Self {
        SessionError::Transport {
            status: None,
            message: message.into(),
        }
    }
}
