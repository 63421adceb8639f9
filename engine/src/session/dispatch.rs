use {
    super::{
        ImageUpload, MeasurementRequest, MeasurementResponse, SessionError,
        SessionId, StatusResponse, SubmitResponse, Transport,
    },
    flume::{Receiver, Sender},
    std::sync::Arc,
    tokio::runtime::Handle as TokioHandle,
};

/// Tags every request so late replies can be recognized.
///
/// `generation` changes whenever the tracked session is superseded or
/// cancelled. Replies from older generations are discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: u64,
    pub sequence: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Submit(ImageUpload),
    Status(SessionId),
    Measure(MeasurementRequest),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Submitted(Result<SubmitResponse, SessionError>),
    Status(Result<StatusResponse, SessionError>),
    Measured(Result<MeasurementResponse, SessionError>),
}

/// Carries requests out of the main context and replies back into it.
pub trait Dispatcher {
    fn dispatch(&mut self, ticket: Ticket, request: Request);

    /// Returns replies that settled since previous call.
    fn drain(&mut self) -> Vec<(Ticket, Reply)>;
}

/// Runs transport futures on a tokio runtime.
/// Replies travel back through a channel and are applied only when the
/// owner drains them.
pub struct AsyncDispatcher<T> {
    transport: Arc<T>,
    runtime: TokioHandle,
    send: Sender<(Ticket, Reply)>,
    recv: Receiver<(Ticket, Reply)>,
}

impl<T> AsyncDispatcher<T>
where
    T: Transport,
{
    pub fn new(transport: T, runtime: TokioHandle) -> Self {
        let (send, recv) = flume::bounded(512);
        AsyncDispatcher {
            transport: Arc::new(transport),
            runtime,
            send,
            recv,
        }
    }
}

impl<T> Dispatcher for AsyncDispatcher<T>
where
    T: Transport,
{
    fn dispatch(&mut self, ticket: Ticket, request: Request) {
        let transport = self.transport.clone();
        let send = self.send.clone();

        self.runtime.spawn(async move {
            let reply = match request {
                Request::Submit(image) => {
                    Reply::Submitted(transport.submit(image).await)
                }
                Request::Status(session) => {
                    Reply::Status(transport.status(session).await)
                }
                Request::Measure(request) => {
                    Reply::Measured(transport.measurements(request).await)
                }
            };

            if send.send_async((ticket, reply)).await.is_err() {
                tracing::debug!("Reply for {:?} dropped, receiver is gone", ticket);
            }
        });
    }

    fn drain(&mut self) -> Vec<(Ticket, Reply)> {
        self.recv.try_iter().collect()
    }
}
