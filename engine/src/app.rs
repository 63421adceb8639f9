use {
    crate::{
        broker::EventBroker,
        camera::Camera,
        config::Config,
        pick::SelectionPicker,
        pose::{Axis, JointRotationState, PoseApplier},
        scene::Scene,
        session::{
            Dispatcher, ImageUpload, Language, MeasurementRequest,
            MeasurementResponse, PersistedSession, Reply, Request, Session,
            SessionError, SessionEvent, SessionStatus, SessionStore,
            SessionSynchronizer, Ticket, UploadedImage,
        },
    },
    nalgebra as na,
    std::{
        collections::BTreeMap,
        time::{Instant, SystemTime, UNIX_EPOCH},
    },
};

/// Notifications produced by [`App::tick`] and user actions.
///
/// Events raised by a tick, or by actions since the previous tick,
/// stay readable until the tick after it.
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    SessionUpdated(SessionStatus),
    SceneRebuilt { persons: usize },
    SelectionChanged(usize),
    Failed(String),
}

/// Measurements fetched for one person.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementResult {
    pub response: MeasurementResponse,

    /// Milliseconds since unix epoch.
    pub fetched_at: u64,
}

/// Validates user input for target height in centimeters.
pub fn parse_target_height(input: &str) -> Result<f64, SessionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SessionError::Validation(
            "Please enter a target height".into(),
        ));
    }

    match input.parse::<f64>() {
        Ok(height) if height.is_finite() && height > 0.0 => Ok(height),
        _ => Err(SessionError::Validation(
            "Target height must be a positive number".into(),
        )),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Viewer controller.
///
/// Owns session tracking, the scene built from its result and all UI
/// state that survives restarts. Every state change is written to the
/// store while a session exists.
pub struct App<D, S> {
    dispatcher: D,
    store: S,
    sync: SessionSynchronizer,
    scene: Scene,
    pose: PoseApplier,

    rotations: JointRotationState,
    selected: usize,
    language: Language,
    show_joints: bool,
    uploaded_image: Option<UploadedImage>,

    /// Current session came from the store and its poses must survive
    /// the first scene build.
    restored: bool,
    loading: bool,
    error: Option<String>,
    scene_error: Option<String>,

    measurements: BTreeMap<usize, MeasurementResult>,
    pending_measurement: Option<(Ticket, usize)>,
    measurement_error: Option<String>,

    events: EventBroker<AppEvent>,
}

impl<D, S> App<D, S>
where
    D: Dispatcher,
    S: SessionStore,
{
    pub fn new(cfg: &Config, dispatcher: D, store: S) -> Self {
        App {
            dispatcher,
            store,
            sync: SessionSynchronizer::new(cfg.polling.backoff()),
            scene: Scene::new(&cfg.scene),
            pose: PoseApplier::new(),
            rotations: JointRotationState::default(),
            selected: 0,
            language: Language::default(),
            show_joints: true,
            uploaded_image: None,
            restored: false,
            loading: false,
            error: None,
            scene_error: None,
            measurements: BTreeMap::new(),
            pending_measurement: None,
            measurement_error: None,
            events: EventBroker::new(),
        }
    }

    /// Loads persisted record and resumes its session.
    ///
    /// No submission is made for a restored session, polling continues
    /// with the cached id.
    pub fn restore(&mut self, now: Instant) {
        let record = match self.store.load() {
            Some(record) => record,
            None => {
                tracing::debug!("No persisted session");
                return;
            }
        };

        self.language = record.language;
        self.show_joints = record.show_joints;
        self.scene.set_show_joints(record.show_joints);
        self.uploaded_image = record.uploaded_image;

        let id = match record.session_id {
            Some(id) => id,
            None => return,
        };

        let session = Session {
            id,
            status: record.status.unwrap_or(SessionStatus::Queued),
            num_persons: record.num_persons,
            error: None,
        };

        tracing::info!("Restoring session {} ({})", session.id, session.status);

        self.selected = if record.selected_person < record.num_persons {
            record.selected_person
        } else {
            0
        };
        self.rotations = record.joint_rotations_by_person;
        self.restored = true;
        self.loading = session.status != SessionStatus::Failed;
        self.sync.resume(session, now);
    }

    /// Submits a new image, superseding any tracked session.
    pub fn upload(&mut self, image: ImageUpload) -> Result<(), SessionError> {
        let ticket = match self.sync.submit() {
            Ok(ticket) => ticket,
            Err(err) => {
                tracing::warn!("Upload rejected: {}", err);
                return Err(err);
            }
        };

        tracing::info!("Submitting '{}' ({} bytes)", image.name, image.bytes.len());

        self.scene.dispose();
        self.measurements.clear();
        self.pending_measurement = None;
        self.measurement_error = None;
        self.error = None;
        self.scene_error = None;
        self.restored = false;
        self.loading = true;
        self.uploaded_image = Some(image.to_uploaded());

        self.dispatcher.dispatch(ticket, Request::Submit(image));
        Ok(())
    }

    /// Submits the cached image again.
    pub fn reprocess(&mut self) -> Result<(), SessionError> {
        if self.loading {
            return Err(SessionError::Validation(
                "Processing is still in progress".into(),
            ));
        }

        let image = match &self.uploaded_image {
            Some(cached) => ImageUpload::from_uploaded(cached)?,
            None => {
                return Err(SessionError::Validation(
                    "No cached image to reprocess".into(),
                ))
            }
        };

        self.upload(image)
    }

    /// Forgets the session, its scene and the persisted record.
    pub fn clear_session(&mut self) {
        tracing::info!("Clearing session");

        self.sync.cancel();
        if let Err(err) = self.store.clear() {
            tracing::warn!("Failed to clear session record: {}", err);
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.scene.dispose();
        self.scene.set_selected(0);
        self.rotations.clear();
        self.selected = 0;
        self.uploaded_image = None;
        self.restored = false;
        self.loading = false;
        self.measurements.clear();
        self.pending_measurement = None;
        self.measurement_error = None;
        self.error = None;
        self.scene_error = None;
    }

    /// Applies settled replies and issues due polls.
    pub fn tick(&mut self, now: Instant) {
        self.events.expire();

        for (ticket, reply) in self.dispatcher.drain() {
            match reply {
                Reply::Submitted(result) => {
                    let event = self.sync.on_submitted(ticket, result, now);
                    self.on_session_event(event);
                }
                Reply::Status(result) => {
                    let event = self.sync.on_status(ticket, result, now);
                    self.on_session_event(event);
                }
                Reply::Measured(result) => self.on_measured(ticket, result),
            }
        }

        if let Some((ticket, id)) = self.sync.poll_due(now) {
            tracing::trace!("Polling session {} (attempt {})", id, self.sync.attempt());
            self.dispatcher.dispatch(ticket, Request::Status(id));
        }

        self.events.mark();
    }

    fn on_session_event(&mut self, event: Option<SessionEvent>) {
        let event = match event {
            Some(event) => event,
            None => return,
        };

        match event {
            SessionEvent::Submitted(session) => {
                self.selected = 0;
                self.rotations.clear();
                self.events.add(AppEvent::SessionUpdated(session.status));
                self.persist();
            }
            SessionEvent::Updated(session) => {
                self.events.add(AppEvent::SessionUpdated(session.status));
                self.persist();
            }
            SessionEvent::Completed { session, rig_data } => {
                self.loading = false;
                self.events.add(AppEvent::SessionUpdated(session.status));
                self.load_scene(&rig_data);
                self.persist();
            }
            SessionEvent::Failed(err) => {
                tracing::error!("Session failed: {}", err);
                self.loading = false;
                let message = err.to_string();
                self.error = Some(message.clone());
                self.events.add(AppEvent::Failed(message));
                self.persist();
            }
            SessionEvent::Expired => {
                tracing::warn!("Session expired on server");
                if let Err(err) = self.store.clear() {
                    tracing::warn!("Failed to clear session record: {}", err);
                }
                self.reset();
                let message = SessionError::NotFound.to_string();
                self.error = Some(message.clone());
                self.events.add(AppEvent::Failed(message));
            }
        }
    }

    fn load_scene(&mut self, rig_data: &[serde_json::Value]) {
        if !self.restored {
            self.selected = 0;
            self.rotations.clear();
        }
        self.restored = false;

        self.scene.set_selected(self.selected);
        if let Err(err) = self.scene.rebuild_from_values(rig_data) {
            tracing::error!("Failed to build scene: {}", err);
            let message = err.to_string();
            self.scene_error = Some(message.clone());
            self.events.add(AppEvent::Failed(message));
            return;
        }
        self.scene_error = None;

        let persons = self.scene.len();
        if self.selected >= persons {
            self.selected = 0;
        }
        self.rotations.retain_persons(persons);
        self.scene.set_selected(self.selected);
        self.pose.sync(&mut self.scene, &self.rotations);

        self.events.add(AppEvent::SceneRebuilt { persons });
    }

    fn on_measured(
        &mut self,
        ticket: Ticket,
        result: Result<MeasurementResponse, SessionError>,
    ) {
        let person = match self.pending_measurement {
            Some((pending, person))
                if pending == ticket && self.sync.is_current(ticket) =>
            {
                person
            }
            _ => {
                tracing::debug!("Discarding stale measurement reply");
                return;
            }
        };
        self.pending_measurement = None;

        match result {
            Ok(response) => {
                tracing::info!(
                    "Fetched {} measurement(s) for person {}",
                    response.measurements.len(),
                    person
                );
                self.measurement_error = None;
                self.measurements.insert(
                    person,
                    MeasurementResult {
                        response,
                        fetched_at: unix_millis(),
                    },
                );
            }
            Err(err) => {
                tracing::warn!("Measurement request failed: {}", err);
                self.measurement_error = Some(err.to_string());
            }
        }
    }

    /// Highlights another person.
    ///
    /// Returns `false` if there is no such person.
    pub fn select_person(&mut self, index: usize) -> bool {
        if index >= self.scene.len() {
            tracing::warn!("No person {} to select", index);
            return false;
        }

        self.selected = index;
        self.scene.set_selected(index);
        self.pose.sync(&mut self.scene, &self.rotations);
        self.events.add(AppEvent::SelectionChanged(index));
        self.persist();
        true
    }

    /// Selects person under the pointer given in viewport pixels.
    pub fn pick(
        &mut self,
        camera: &Camera,
        pointer: na::Point2<f32>,
        viewport: na::Vector2<f32>,
    ) -> Option<usize> {
        let person = SelectionPicker.pick(camera, &self.scene, pointer, viewport)?;
        self.select_person(person);
        Some(person)
    }

    /// Sets one axis of a joint of the selected person.
    pub fn set_joint_rotation(&mut self, joint: &str, axis: Axis, value: f32) {
        self.rotations.set_axis(self.selected, joint, axis, value);
        self.pose.sync(&mut self.scene, &self.rotations);
        self.persist();
    }

    /// Returns the selected person to bind pose.
    pub fn reset_pose(&mut self) {
        self.rotations.reset(self.selected);
        self.pose.sync(&mut self.scene, &self.rotations);
        self.persist();
    }

    pub fn set_show_joints(&mut self, show: bool) {
        self.show_joints = show;
        self.scene.set_show_joints(show);
        self.persist();
    }

    pub fn toggle_language(&mut self) {
        self.language = self.language.toggled();
        self.persist();
    }

    /// Requests measurements of the selected person scaled to
    /// `target_height` centimeters given as user input.
    pub fn request_measurements(
        &mut self,
        target_height: &str,
    ) -> Result<(), SessionError> {
        let result = self.try_request_measurements(target_height);
        if let Err(err) = &result {
            self.measurement_error = Some(err.to_string());
        }
        result
    }

    fn try_request_measurements(
        &mut self,
        target_height: &str,
    ) -> Result<(), SessionError> {
        let target_height_cm = parse_target_height(target_height)?;
        let session_id = match self.sync.session() {
            Some(session) => session.id.clone(),
            None => {
                return Err(SessionError::Validation(
                    "No active session".into(),
                ))
            }
        };

        let ticket = self.sync.ticket();
        let person = self.selected;
        self.pending_measurement = Some((ticket, person));
        self.measurement_error = None;

        tracing::debug!(
            "Requesting measurements of person {} at {}cm",
            person,
            target_height_cm
        );
        self.dispatcher.dispatch(
            ticket,
            Request::Measure(MeasurementRequest {
                session_id,
                person_index: person,
                target_height_cm,
            }),
        );
        Ok(())
    }

    fn persist(&mut self) {
        let session = match self.sync.session() {
            Some(session) => session,
            None => return,
        };

        let record = PersistedSession {
            session_id: Some(session.id.clone()),
            status: Some(session.status),
            num_persons: session.num_persons,
            selected_person: self.selected,
            joint_rotations_by_person: self.rotations.clone(),
            language: self.language,
            show_joints: self.show_joints,
            uploaded_image: self.uploaded_image.clone(),
        };

        if let Err(err) = self.store.save(&record) {
            tracing::warn!("Failed to persist session: {}", err);
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.sync.session()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn pose(&self) -> &PoseApplier {
        &self.pose
    }

    pub fn rotations(&self) -> &JointRotationState {
        &self.rotations
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn show_joints(&self) -> bool {
        self.show_joints
    }

    pub fn uploaded_image(&self) -> Option<&UploadedImage> {
        self.uploaded_image.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn scene_error(&self) -> Option<&str> {
        self.scene_error.as_deref()
    }

    pub fn measurement(&self, person: usize) -> Option<&MeasurementResult> {
        self.measurements.get(&person)
    }

    pub fn measurement_error(&self) -> Option<&str> {
        self.measurement_error.as_deref()
    }

    /// Earliest instant the next poll is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.sync.next_due()
    }

    pub fn events(&mut self) -> &mut EventBroker<AppEvent> {
        &mut self.events
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }
}
