use {
    super::{
        Backoff, Session, SessionError, SessionId, SessionStatus,
        StatusResponse, SubmitResponse, Ticket,
    },
    std::time::Instant,
};

/// Observable outcome of applying a reply.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Server accepted the image.
    Submitted(Session),

    /// Poll returned a non-terminal state.
    Updated(Session),

    /// Job finished and produced rig payloads.
    Completed {
        session: Session,
        rig_data: Vec<serde_json::Value>,
    },

    Failed(SessionError),

    /// Server no longer knows the session.
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Idle,
    Submitting { ticket: Ticket },
    Waiting { due: Instant },
    Polling { ticket: Ticket },
}

/// Lifecycle of a single reconstruction job.
///
/// The synchronizer never performs IO. It mints [`Ticket`]s for requests
/// the owner dispatches and consumes the replies. Exactly one request is
/// outstanding at any time and the next poll is scheduled only after the
/// previous one settled.
#[derive(Debug)]
pub struct SessionSynchronizer {
    backoff: Backoff,
    session: Option<Session>,
    generation: u64,
    sequence: u64,
    attempt: u32,
    phase: Phase,
}

impl SessionSynchronizer {
    pub fn new(backoff: Backoff) -> Self {
        SessionSynchronizer {
            backoff,
            session: None,
            generation: 0,
            sequence: 0,
            attempt: 0,
            phase: Phase::Idle,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, Phase::Submitting { .. })
    }

    /// Returns `true` while a poll is scheduled or in flight.
    pub fn is_polling(&self) -> bool {
        matches!(self.phase, Phase::Waiting { .. } | Phase::Polling { .. })
    }

    /// Mints a ticket in current generation.
    pub fn ticket(&mut self) -> Ticket {
        self.sequence += 1;
        Ticket {
            generation: self.generation,
            sequence: self.sequence,
        }
    }

    /// Returns `true` if reply with this ticket still belongs to the
    /// tracked session.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation
    }

    /// Starts a new submission, superseding any tracked session.
    ///
    /// A second submission while one is in flight is rejected.
    pub fn submit(&mut self) -> Result<Ticket, SessionError> {
        if self.is_submitting() {
            return Err(SessionError::Validation(
                "A submission is already in progress".into(),
            ));
        }

        self.supersede();
        let ticket = self.ticket();
        self.phase = Phase::Submitting { ticket };
        Ok(ticket)
    }

    pub fn on_submitted(
        &mut self,
        ticket: Ticket,
        result: Result<SubmitResponse, SessionError>,
        now: Instant,
    ) -> Option<SessionEvent> {
        if self.phase != (Phase::Submitting { ticket }) {
            tracing::debug!("Discarding stale submit reply {:?}", ticket);
            return None;
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.phase = Phase::Idle;
                return Some(SessionEvent::Failed(err));
            }
        };

        let id = match response.session_id.filter(|id| !id.is_empty()) {
            Some(id) => SessionId::new(id),
            None => {
                self.phase = Phase::Idle;
                return Some(SessionEvent::Failed(SessionError::Validation(
                    "Missing session id from server".into(),
                )));
            }
        };

        let mut session = Session::queued(id);
        if let Some(status) = response.status {
            session.status = status;
        }
        if let Some(num_persons) = response.num_persons {
            session.num_persons = num_persons;
        }

        tracing::info!("Session {} submitted", session.id);

        self.attempt = 0;
        self.phase = Phase::Waiting { due: now };
        self.session = Some(session.clone());
        Some(SessionEvent::Submitted(session))
    }

    /// Continues tracking a session restored from persistence.
    ///
    /// Failed sessions are kept but not polled.
    pub fn resume(&mut self, session: Session, now: Instant) {
        self.supersede();

        self.phase = match session.status {
            SessionStatus::Failed => Phase::Idle,
            _ => Phase::Waiting { due: now },
        };

        tracing::info!("Resuming session {} ({})", session.id, session.status);
        self.session = Some(session);
    }

    /// Returns poll request if one is due.
    pub fn poll_due(&mut self, now: Instant) -> Option<(Ticket, SessionId)> {
        match self.phase {
            Phase::Waiting { due } if due <= now => {}
            _ => return None,
        }

        let id = self.session.as_ref()?.id.clone();
        let ticket = self.ticket();
        self.phase = Phase::Polling { ticket };
        Some((ticket, id))
    }

    /// Instant of the next scheduled poll.
    pub fn next_due(&self) -> Option<Instant> {
        match self.phase {
            Phase::Waiting { due } => Some(due),
            _ => None,
        }
    }

    pub fn on_status(
        &mut self,
        ticket: Ticket,
        result: Result<StatusResponse, SessionError>,
        now: Instant,
    ) -> Option<SessionEvent> {
        if self.phase != (Phase::Polling { ticket }) {
            tracing::debug!("Discarding stale status reply {:?}", ticket);
            return None;
        }

        let response = match result {
            Ok(response) => response,
            Err(SessionError::NotFound) => {
                tracing::warn!("Session expired on server");
                self.cancel();
                return Some(SessionEvent::Expired);
            }
            Err(err) => {
                tracing::debug!("Poll failed, retrying: {}", err);
                self.schedule_retry(now);
                return None;
            }
        };

        let session = match &mut self.session {
            Some(session) => session,
            None => {
                self.phase = Phase::Idle;
                return None;
            }
        };

        if !response.session_id.is_empty()
            && response.session_id != session.id.as_str()
        {
            session.id = SessionId::new(response.session_id);
            self.attempt = 0;
        }

        session.status = response.status;
        if let Some(num_persons) = response.num_persons {
            session.num_persons = num_persons;
        }
        session.error = response.error;

        match (response.status, response.rig_data) {
            (SessionStatus::Completed, Some(rig_data)) => {
                let session = session.clone();
                tracing::info!(
                    "Session {} completed with {} payloads",
                    session.id,
                    rig_data.len()
                );
                self.attempt = 0;
                self.phase = Phase::Idle;
                Some(SessionEvent::Completed { session, rig_data })
            }
            (SessionStatus::Failed, _) => {
                let message = session
                    .error
                    .clone()
                    .unwrap_or_else(|| "Processing failed".to_owned());
                tracing::error!("Session {} failed: {}", session.id, message);
                self.attempt = 0;
                self.phase = Phase::Idle;
                Some(SessionEvent::Failed(SessionError::ProcessingFailure(
                    message,
                )))
            }
            _ => {
                let session = session.clone();
                self.schedule_retry(now);
                Some(SessionEvent::Updated(session))
            }
        }
    }

    /// Stops tracking. Replies to earlier requests become stale.
    pub fn cancel(&mut self) {
        self.supersede();
        self.phase = Phase::Idle;
    }

    fn supersede(&mut self) {
        self.generation += 1;
        self.session = None;
        self.attempt = 0;
    }

    fn schedule_retry(&mut self, now: Instant) {
        let status = self
            .session
            .as_ref()
            .map_or(SessionStatus::Unknown, |session| session.status);

        let delay = self.backoff.delay(status, self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        tracing::trace!("Next poll in {:?}", delay);
        self.phase = Phase::Waiting { due: now + delay };
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq, std::time::Duration};

    fn status(status: SessionStatus) -> StatusResponse {
        StatusResponse {
            session_id: "s-1".into(),
            status,
            num_persons: None,
            rig_data: None,
            error: None,
        }
    }

    fn submitted(now: Instant) -> SessionSynchronizer {
        let mut sync = SessionSynchronizer::new(Backoff::default());
        let ticket = sync.submit().unwrap();
        let event = sync.on_submitted(
            ticket,
            Ok(SubmitResponse {
                session_id: Some("s-1".into()),
                status: Some(SessionStatus::Queued),
                num_persons: Some(2),
            }),
            now,
        );
        assert!(matches!(event, Some(SessionEvent::Submitted(_))));
        sync
    }

    #[test]
    fn first_poll_is_immediate_and_single() {
        let now = Instant::now();
        let mut sync = submitted(now);

        let (ticket, id) = sync.poll_due(now).unwrap();
        assert_eq!(id.as_str(), "s-1");
        assert_eq!(ticket.generation, 1);

        // Nothing else until the poll settles.
        assert_eq!(sync.poll_due(now + Duration::from_secs(60)), None);
    }

    #[test]
    fn retries_follow_backoff() {
        let mut now = Instant::now();
        let mut sync = submitted(now);
        let mut seen = Vec::new();

        for _ in 0..5 {
            let (ticket, _) = sync.poll_due(now).unwrap();
            sync.on_status(ticket, Ok(status(SessionStatus::Processing)), now);
            let due = sync.next_due().unwrap();
            seen.push((due - now).as_millis() as u64);
            now = due;
        }

        assert_eq!(seen, [3000, 4500, 6750, 10125, 15000]);
    }

    #[test]
    fn transport_errors_are_retried_silently() {
        let now = Instant::now();
        let mut sync = submitted(now);
        let (ticket, _) = sync.poll_due(now).unwrap();

        let event = sync.on_status(
            ticket,
            Err(SessionError::transport("connection reset")),
            now,
        );
        assert_eq!(event, None);
        assert!(sync.is_polling());
        assert_eq!(
            sync.next_due(),
            Some(now + Duration::from_millis(4000))
        );
    }

    #[test]
    fn missing_num_persons_keeps_previous_count() {
        let now = Instant::now();
        let mut sync = submitted(now);
        let (ticket, _) = sync.poll_due(now).unwrap();
        sync.on_status(ticket, Ok(status(SessionStatus::Processing)), now);
        assert_eq!(sync.session().unwrap().num_persons, 2);
    }

    #[test]
    fn completion_without_rig_data_keeps_polling() {
        let now = Instant::now();
        let mut sync = submitted(now);
        let (ticket, _) = sync.poll_due(now).unwrap();

        let event =
            sync.on_status(ticket, Ok(status(SessionStatus::Completed)), now);
        assert!(matches!(event, Some(SessionEvent::Updated(_))));
        assert!(sync.is_polling());
    }

    #[test]
    fn completion_stops_polling() {
        let now = Instant::now();
        let mut sync = submitted(now);
        let (ticket, _) = sync.poll_due(now).unwrap();

        let mut response = status(SessionStatus::Completed);
        response.rig_data = Some(vec![serde_json::json!({})]);
        let event = sync.on_status(ticket, Ok(response), now);

        match event {
            Some(SessionEvent::Completed { session, rig_data }) => {
                assert_eq!(session.status, SessionStatus::Completed);
                assert_eq!(rig_data.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!sync.is_polling());
        assert_eq!(sync.attempt(), 0);
    }

    #[test]
    fn failure_surfaces_default_message() {
        let now = Instant::now();
        let mut sync = submitted(now);
        let (ticket, _) = sync.poll_due(now).unwrap();

        let event =
            sync.on_status(ticket, Ok(status(SessionStatus::Failed)), now);
        assert_eq!(
            event,
            Some(SessionEvent::Failed(SessionError::ProcessingFailure(
                "Processing failed".into()
            )))
        );
        assert!(!sync.is_polling());
    }

    #[test]
    fn not_found_expires_session() {
        let now = Instant::now();
        let mut sync = submitted(now);
        let (ticket, _) = sync.poll_due(now).unwrap();

        let event = sync.on_status(ticket, Err(SessionError::NotFound), now);
        assert_eq!(event, Some(SessionEvent::Expired));
        assert_eq!(sync.session(), None);
        assert!(!sync.is_polling());
    }

    #[test]
    fn replies_after_cancel_are_discarded() {
        let now = Instant::now();
        let mut sync = submitted(now);
        let (ticket, _) = sync.poll_due(now).unwrap();

        sync.cancel();
        assert!(!sync.is_current(ticket));

        let event =
            sync.on_status(ticket, Ok(status(SessionStatus::Processing)), now);
        assert_eq!(event, None);
        assert_eq!(sync.session(), None);
        assert_eq!(sync.poll_due(now + Duration::from_secs(60)), None);
    }

    #[test]
    fn concurrent_submit_is_rejected() {
        let mut sync = SessionSynchronizer::new(Backoff::default());
        sync.submit().unwrap();
        assert!(matches!(sync.submit(), Err(SessionError::Validation(_))));
    }

    #[test]
    fn submit_without_session_id_is_validation_error() {
        let mut sync = SessionSynchronizer::new(Backoff::default());
        let ticket = sync.submit().unwrap();
        let event = sync.on_submitted(
            ticket,
            Ok(SubmitResponse::default()),
            Instant::now(),
        );
        assert_eq!(
            event,
            Some(SessionEvent::Failed(SessionError::Validation(
                "Missing session id from server".into()
            )))
        );
        assert!(!sync.is_submitting());
    }

    #[test]
    fn resumed_failed_session_is_not_polled() {
        let now = Instant::now();
        let mut sync = SessionSynchronizer::new(Backoff::default());
        let mut session = Session::queued(SessionId::new("old"));
        session.status = SessionStatus::Failed;
        sync.resume(session, now);

        assert_eq!(sync.poll_due(now), None);
        assert!(sync.session().is_some());
    }

    #[test]
    fn changed_session_id_resets_attempt() {
        let mut now = Instant::now();
        let mut sync = submitted(now);

        for _ in 0..3 {
            let (ticket, _) = sync.poll_due(now).unwrap();
            sync.on_status(ticket, Ok(status(SessionStatus::Processing)), now);
            now = sync.next_due().unwrap();
        }
        assert_eq!(sync.attempt(), 3);

        let (ticket, _) = sync.poll_due(now).unwrap();
        let mut response = status(SessionStatus::Processing);
        response.session_id = "s-2".into();
        sync.on_status(ticket, Ok(response), now);

        assert_eq!(sync.session().unwrap().id.as_str(), "s-2");
        assert_eq!(sync.attempt(), 1);
        assert_eq!(
            sync.next_due(),
            Some(now + Duration::from_millis(3000))
        );
    }
}
