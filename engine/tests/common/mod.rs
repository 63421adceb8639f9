#![allow(dead_code)]

use {
    bodyrig::{
        config::Config,
        session::{
            ImageUpload, MemoryStore, Reply, Request, SessionStatus,
            StatusResponse, SubmitResponse, Ticket,
        },
        App,
    },
    serde_json::{json, Value},
};

/// Dispatcher that records requests and hands back replies queued by
/// the test.
#[derive(Debug, Default)]
pub struct ScriptedDispatcher {
    pub sent: Vec<(Ticket, Request)>,
    replies: Vec<(Ticket, Reply)>,
}

impl ScriptedDispatcher {
    pub fn last(&self) -> Option<&(Ticket, Request)> {
        self.sent.last()
    }

    pub fn last_ticket(&self) -> Ticket {
        self.sent.last().expect("no request was sent").0
    }

    /// Queues reply to the most recent request.
    pub fn reply_last(&mut self, reply: Reply) {
        let ticket = self.last_ticket();
        self.replies.push((ticket, reply));
    }

    pub fn reply(&mut self, ticket: Ticket, reply: Reply) {
        self.replies.push((ticket, reply));
    }

    pub fn submits(&self) -> usize {
        self.sent
            .iter()
            .filter(|(_, request)| matches!(request, Request::Submit(_)))
            .count()
    }

    pub fn polls(&self) -> usize {
        self.sent
            .iter()
            .filter(|(_, request)| matches!(request, Request::Status(_)))
            .count()
    }
}

impl bodyrig::session::Dispatcher for ScriptedDispatcher {
    fn dispatch(&mut self, ticket: Ticket, request: Request) {
        self.sent.push((ticket, request));
    }

    fn drain(&mut self) -> Vec<(Ticket, Reply)> {
        std::mem::take(&mut self.replies)
    }
}

pub type TestApp = App<ScriptedDispatcher, MemoryStore>;

pub fn app(store: &MemoryStore) -> TestApp {
    App::new(&Config::default(), ScriptedDispatcher::default(), store.clone())
}

pub fn image() -> ImageUpload {
    ImageUpload {
        name: "portrait.png".to_owned(),
        mime: "image/png".to_owned(),
        bytes: vec![0x89, b'P', b'N', b'G', 1, 2, 3],
        last_modified: Some(1_700_000_000_000),
    }
}

pub fn submitted(id: &str) -> Reply {
    Reply::Submitted(Ok(SubmitResponse {
        session_id: Some(id.to_owned()),
        status: Some(SessionStatus::Queued),
        num_persons: None,
    }))
}

pub fn status(id: &str, status: SessionStatus, rig_data: Option<Vec<Value>>) -> Reply {
    Reply::Status(Ok(StatusResponse {
        session_id: id.to_owned(),
        status,
        num_persons: rig_data.as_ref().map(Vec::len),
        rig_data,
        error: None,
    }))
}

pub fn completed(id: &str, rig_data: Vec<Value>) -> Reply {
    status(id, SessionStatus::Completed, Some(rig_data))
}

/// Small humanoid whose head is only discoverable as a facial sibling
/// of the neck.
///
/// Joints: pelvis, spine, neck, left_eye, left_shoulder, left_elbow.
pub fn humanoid(root: [f32; 3]) -> Value {
    json!({
        "mesh": {
            "vertices": [
                [-0.2, 0.0, 0.0], [0.2, 0.0, 0.0], [0.2, 1.6, 0.0], [-0.2, 1.6, 0.0],
                [0.3, 1.4, 0.0], [0.6, 1.4, 0.0], [0.6, 1.5, 0.0]
            ],
            "faces": [[0, 1, 2], [0, 2, 3], [4, 5, 6]],
            "skinIndices": [
                [0, 0, 0, 0], [0, 0, 0, 0], [1, 2, 0, 0], [1, 2, 0, 0],
                [4, 0, 0, 0], [5, 0, 0, 0], [5, 4, 0, 0]
            ],
            "skinWeights": [
                [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0],
                [0.5, 0.5, 0.0, 0.0], [0.5, 0.5, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0],
                [0.7, 0.3, 0.0, 0.0]
            ]
        },
        "skeleton": {
            "joint_names": [
                "pelvis", "spine", "neck", "left_eye", "left_shoulder", "left_elbow"
            ],
            "parents": [-1, 0, 1, 1, 1, 4],
            "joint_positions": [
                [0.0, 0.9, 0.0], [0.0, 1.2, 0.0], [0.0, 1.45, 0.0],
                [0.05, 1.5, 0.05], [0.2, 1.4, 0.0], [0.45, 1.4, 0.0]
            ]
        },
        "animation_targets": {
            "pelvis": 0,
            "spine": 1,
            "neck": 2,
            "left_shoulder": 4,
            "left_elbow": 5
        },
        "metadata": { "root_translation": root }
    })
}

/// Drives a fresh upload through submit and the first poll.
pub fn complete_upload(app: &mut TestApp, id: &str, rig_data: Vec<Value>) {
    let now = std::time::Instant::now();
    app.upload(image()).expect("upload rejected");

    app.dispatcher_mut().reply_last(submitted(id));
    app.tick(now);

    app.dispatcher_mut().reply_last(completed(id, rig_data));
    app.tick(now);
}
