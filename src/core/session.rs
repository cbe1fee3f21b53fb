use tokio_util::sync::CancellationToken;

use crate::core::chat_stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Pending,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled | StreamState::Failed
        )
    }
}

/// Notification produced by [`StreamSession::apply`] for the host UI.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionNotice<'a> {
    Updated { request_id: u64, buffer: &'a str },
    Finished { request_id: u64, state: StreamState },
}

/// Lifecycle of one outstanding completion request. The buffer is
/// append-only, and the first terminal transition wins; events arriving
/// after that are dropped.
#[derive(Debug)]
pub struct StreamSession {
    request_id: u64,
    state: StreamState,
    buffer: String,
    failure: Option<String>,
}

impl StreamSession {
    pub fn new(request_id: u64) -> Self {
        Self {
            request_id,
            state: StreamState::Pending,
            buffer: String::new(),
            failure: None,
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The reconstructed assistant message so far. Still readable after
    /// Cancelled and Failed; partial output is never discarded.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn append_delta(&mut self, delta: &str) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = StreamState::Streaming;
        self.buffer.push_str(delta);
        true
    }

    pub fn complete(&mut self) -> bool {
        self.finish(StreamState::Completed)
    }

    pub fn cancel(&mut self) -> bool {
        self.finish(StreamState::Cancelled)
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.failure = Some(message.into());
        self.finish(StreamState::Failed)
    }

    fn finish(&mut self, state: StreamState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }

    /// Applies one stream event. Returns the notice the owner should fan
    /// out, or `None` when the event arrived after a terminal transition.
    ///
    /// An `Error` event marks the session Failed immediately; the paired
    /// `Done` the service sends afterwards is absorbed here.
    pub fn apply(&mut self, event: &StreamEvent) -> Option<SessionNotice<'_>> {
        let request_id = self.request_id;
        match event {
            StreamEvent::Chunk(delta) => {
                if self.append_delta(delta) {
                    Some(SessionNotice::Updated {
                        request_id,
                        buffer: &self.buffer,
                    })
                } else {
                    None
                }
            }
            StreamEvent::Error(message) => self.fail(message.clone()).then_some(
                SessionNotice::Finished {
                    request_id,
                    state: StreamState::Failed,
                },
            ),
            StreamEvent::Done => self.complete().then_some(SessionNotice::Finished {
                request_id,
                state: StreamState::Completed,
            }),
            StreamEvent::Cancelled => self.cancel().then_some(SessionNotice::Finished {
                request_id,
                state: StreamState::Cancelled,
            }),
        }
    }
}

/// Enforces the one-active-stream-per-compose-surface rule: beginning a new
/// session cancels the prior token before the new id exists, so two sessions
/// can never interleave buffer updates.
#[derive(Debug, Default)]
pub struct StreamController {
    next_id: u64,
    active: Option<(u64, CancellationToken)>,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> (u64, CancellationToken) {
        self.cancel_active();
        self.next_id += 1;
        let token = CancellationToken::new();
        self.active = Some((self.next_id, token.clone()));
        (self.next_id, token)
    }

    pub fn cancel_active(&mut self) {
        if let Some((_, token)) = self.active.take() {
            token.cancel();
        }
    }

    /// True while `request_id` names the live session; used to drop events
    /// from superseded streams.
    pub fn is_current(&self, request_id: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|(id, _)| *id == request_id)
    }

    /// Releases the slot once a session reached a terminal state.
    pub fn clear(&mut self, request_id: u64) {
        if self.is_current(request_id) {
            self.active = None;
        }
    }
}
