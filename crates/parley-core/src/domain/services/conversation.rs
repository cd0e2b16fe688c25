#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use std::collections::HashSet;
use std::mem;

use chrono::DateTime;
use chrono::Utc;
use parley_client::ChatRequest;
use parley_client::ClientError;
use parley_client::PageRequest;
use parley_client::StreamEvent;

use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::MessageStatus;
use crate::domain::models::Notification;
use crate::domain::models::SessionEntry;
use crate::domain::models::SessionSource;
use crate::errors::ControllerError;

pub const DEFAULT_PAGE_SIZE: usize = 20;

const STOPPED_MARKER: &str = "[stopped]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RestoringHistory,
    Streaming,
    Paginating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// First page of a session, replaces the window.
    Initial,
    /// Next older page, prepended to the window.
    Older,
}

/// A history fetch the state machine is waiting on. The response is applied
/// only if it answers the request still in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub session_id: String,
    pub kind: HistoryKind,
    pub page: PageRequest,
    pub epoch: u64,
}

/// Everything needed to start the stream for an accepted send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub request: ChatRequest,
    pub placeholder_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed(ClientError),
    Stopped,
}

#[derive(Debug)]
struct InFlightStream {
    placeholder: Message,
    session_id: Option<String>,
    epoch: u64,
    session_reported: bool,
}

/// Client-side state of the active conversation.
///
/// Every transition is a method; none of them perform I/O. Methods that start
/// backend work return a description of it and the caller reports the result
/// back through the matching `apply_*`/`finish_*` method. View events
/// accumulate until drained with [`Conversation::take_events`].
#[derive(Debug)]
pub struct Conversation {
    page_size: usize,
    active_session_id: Option<String>,
    source: SessionSource,
    window: Vec<Message>,
    // Session whose transcript the window holds. Pagination continues it only.
    window_session: Option<String>,
    offset: usize,
    has_more: bool,
    sessions: Vec<SessionEntry>,
    epoch: u64,
    history: Option<HistoryRequest>,
    stream: Option<InFlightStream>,
    events: Vec<Event>,
}

impl Default for Conversation {
    fn default() -> Self {
        Conversation::new(DEFAULT_PAGE_SIZE)
    }
}

impl Conversation {
    pub fn new(page_size: usize) -> Conversation {
        Conversation {
            page_size: page_size.max(1),
            active_session_id: None,
            source: SessionSource::None,
            window: vec![],
            window_session: None,
            offset: 0,
            has_more: true,
            sessions: vec![],
            epoch: 0,
            history: None,
            stream: None,
            events: vec![],
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn source(&self) -> SessionSource {
        self.source
    }

    pub fn messages(&self) -> &[Message] {
        &self.window
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn sessions(&self) -> &[SessionEntry] {
        &self.sessions
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream_placeholder_id(&self) -> Option<&str> {
        self.stream
            .as_ref()
            .map(|stream| stream.placeholder.id.as_str())
    }

    pub fn phase(&self) -> Phase {
        if self.stream.is_some() {
            return Phase::Streaming;
        }

        match self.history.as_ref().map(|request| request.kind) {
            Some(HistoryKind::Initial) => Phase::RestoringHistory,
            Some(HistoryKind::Older) => Phase::Paginating,
            None => Phase::Idle,
        }
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        mem::take(&mut self.events)
    }

    /// Makes `session_id` active. Sources that need history return the request
    /// for the first page; the window keeps its contents until that page
    /// arrives.
    pub fn select_session(
        &mut self,
        session_id: &str,
        source: SessionSource,
    ) -> Option<HistoryRequest> {
        self.epoch += 1;
        self.active_session_id = Some(session_id.to_string());
        self.source = source;
        self.history = None;
        self.events.push(Event::ActiveSessionChanged {
            session_id: self.active_session_id.clone(),
            source,
        });

        if !source.needs_history_fetch() {
            self.window_session = Some(session_id.to_string());
            return None;
        }

        let request = HistoryRequest {
            session_id: session_id.to_string(),
            kind: HistoryKind::Initial,
            page: PageRequest::new(self.page_size, 0),
            epoch: self.epoch,
        };
        self.history = Some(request.clone());

        Some(request)
    }

    /// Returns the request for the next older page, or `None` when there is
    /// nothing to load, a history fetch is already running or the first page
    /// of the active session never arrived.
    pub fn begin_load_older(&mut self) -> Option<HistoryRequest> {
        if !self.has_more || self.history.is_some() {
            return None;
        }
        let session_id = self.active_session_id.clone()?;
        if self.window_session.as_deref() != Some(session_id.as_str()) {
            return None;
        }

        let request = HistoryRequest {
            session_id,
            kind: HistoryKind::Older,
            page: PageRequest::new(self.page_size, self.offset),
            epoch: self.epoch,
        };
        self.history = Some(request.clone());

        Some(request)
    }

    /// Applies a history response. Returns false when the response answers a
    /// request that is no longer in flight and was dropped.
    pub fn apply_history(
        &mut self,
        request: &HistoryRequest,
        result: Result<Vec<parley_client::Message>, ClientError>,
    ) -> bool {
        if self.history.as_ref() != Some(request) {
            tracing::debug!(
                session_id = %request.session_id,
                offset = request.page.offset,
                "dropping stale history response"
            );
            return false;
        }
        self.history = None;

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                tracing::error!(session_id = %request.session_id, error = %err, "history fetch failed");
                self.events.push(Event::Notification(Notification::error(format!(
                    "Failed to load messages: {err}"
                ))));
                if request.kind == HistoryKind::Initial {
                    self.drop_foreign_window(&request.session_id);
                }
                return true;
            }
        };

        let returned = page.len();
        let has_more = returned == self.page_size;
        let messages = page.into_iter().map(Message::from).collect::<Vec<_>>();

        match request.kind {
            HistoryKind::Initial => {
                self.window = messages.clone();
                self.window_session = Some(request.session_id.clone());
                self.offset = returned;
                self.has_more = has_more;
                self.events.push(Event::HistoryLoaded {
                    session_id: request.session_id.clone(),
                    messages,
                    has_more,
                });
            }
            HistoryKind::Older => {
                let known = self
                    .window
                    .iter()
                    .map(|message| message.id.as_str())
                    .collect::<HashSet<_>>();
                let older = messages
                    .into_iter()
                    .filter(|message| !known.contains(message.id.as_str()))
                    .collect::<Vec<_>>();

                if older.len() < returned {
                    tracing::debug!(
                        returned,
                        kept = older.len(),
                        "dropped messages already in the window"
                    );
                }

                self.window.splice(0..0, older.iter().cloned());
                self.offset += returned;
                self.has_more = has_more;
                self.events.push(Event::OlderLoaded {
                    messages: older,
                    has_more,
                });
            }
        }

        true
    }

    /// Appends the optimistic user message and an empty assistant placeholder
    /// and returns the request that streams the reply into it.
    pub fn begin_send(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<SendTicket, ControllerError> {
        if self.stream.is_some() {
            return Err(ControllerError::SendInFlight);
        }
        if text.trim().is_empty() {
            return Err(ControllerError::EmptyMessage);
        }
        // The first page would replace the window and the optimistic message with it.
        if self.phase() == Phase::RestoringHistory {
            return Err(ControllerError::HistoryLoading);
        }

        let user = Message::new_user(self.active_session_id.clone(), text, now);
        let placeholder = Message::new_placeholder(self.active_session_id.clone(), now);
        let placeholder_id = placeholder.id.clone();

        self.window.push(user.clone());
        self.window.push(placeholder.clone());
        self.events.push(Event::MessageAppended(user));
        self.events.push(Event::MessageAppended(placeholder.clone()));

        self.stream = Some(InFlightStream {
            placeholder,
            session_id: self.active_session_id.clone(),
            epoch: self.epoch,
            session_reported: false,
        });

        Ok(SendTicket {
            request: ChatRequest::new(self.active_session_id.clone(), text),
            placeholder_id,
        })
    }

    /// Applies one event of the stream feeding `placeholder_id`. Returns the
    /// session id when the stream created the session that just became active,
    /// so the caller can persist it.
    pub fn apply_stream_event(&mut self, placeholder_id: &str, event: StreamEvent) -> Option<String> {
        let relevant = self.stream_is_relevant(placeholder_id)?;

        match event {
            StreamEvent::SessionAssigned(session_id) => {
                self.adopt_session(session_id, relevant)
            }
            StreamEvent::TextDelta(delta) => {
                if delta.is_empty() {
                    return None;
                }
                let stream = self.stream.as_mut()?;
                stream.placeholder.append(&delta);
                if !relevant {
                    return None;
                }

                let placeholder = stream.placeholder.clone();
                match self.position_of(placeholder_id) {
                    Some(index) => {
                        self.window[index].append(&delta);
                        self.events.push(Event::StreamDelta {
                            message_id: placeholder_id.to_string(),
                            delta,
                        });
                    }
                    None => self.reinsert_placeholder(placeholder),
                }

                None
            }
        }
    }

    /// Settles the placeholder once its stream ended. Returns true when the
    /// stream completed normally.
    pub fn finish_stream(&mut self, placeholder_id: &str, outcome: StreamOutcome) -> bool {
        let Some(relevant) = self.stream_is_relevant(placeholder_id) else {
            return false;
        };
        let Some(stream) = self.stream.take() else {
            return false;
        };
        let completed = outcome == StreamOutcome::Completed;

        let mut placeholder = stream.placeholder;
        let marker = match outcome {
            StreamOutcome::Completed => {
                placeholder.status = MessageStatus::Complete;
                None
            }
            StreamOutcome::Failed(err) => {
                tracing::error!(error = %err, "chat stream failed");
                self.events.push(Event::Notification(Notification::error(format!(
                    "Reply failed: {err}"
                ))));
                Some(placeholder.mark_failed(&format!("[error: {err}]")))
            }
            StreamOutcome::Stopped => Some(placeholder.mark_failed(STOPPED_MARKER)),
        };

        if !relevant {
            tracing::debug!(
                placeholder_id,
                "stream finished after its conversation was left"
            );
            return completed;
        }

        match self.position_of(placeholder_id) {
            Some(index) => self.window[index] = placeholder.clone(),
            None => self.window.push(placeholder.clone()),
        }
        self.events.push(Event::StreamFinished {
            message: placeholder,
            marker,
        });

        completed
    }

    /// Starts a blank conversation. Not allowed while a reply is streaming.
    pub fn new_chat(&mut self) -> Result<(), ControllerError> {
        if self.stream.is_some() {
            return Err(ControllerError::SendInFlight);
        }
        self.reset();
        Ok(())
    }

    /// Drops a deleted session from the listing. Returns true if it was the
    /// active one, in which case the conversation is reset even while a reply
    /// of that session is still streaming.
    pub fn remove_session(&mut self, session_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|session| session.id != session_id);
        if self.sessions.len() != before {
            self.events.push(Event::SessionsListed(self.sessions.clone()));
        }

        if self.active_session_id.as_deref() != Some(session_id) {
            return false;
        }
        self.reset();
        true
    }

    pub fn notify(&mut self, notification: Notification) {
        self.events.push(Event::Notification(notification));
    }

    pub fn set_sessions(&mut self, sessions: Vec<SessionEntry>) {
        self.sessions = sessions;
        self.events.push(Event::SessionsListed(self.sessions.clone()));
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.active_session_id = None;
        self.source = SessionSource::None;
        self.window.clear();
        self.window_session = None;
        self.offset = 0;
        self.has_more = true;
        self.history = None;
        self.events.push(Event::WindowCleared);
        self.events.push(Event::ActiveSessionChanged {
            session_id: None,
            source: SessionSource::None,
        });
    }

    // Called when the first page of `session_id` failed. A window still
    // showing another session is cleared and nothing is paginated until a
    // first page of `session_id` arrives.
    fn drop_foreign_window(&mut self, session_id: &str) {
        if self.window_session.as_deref() == Some(session_id) {
            return;
        }

        self.window_session = None;
        self.offset = 0;
        self.has_more = false;
        if !self.window.is_empty() {
            self.window.clear();
            self.events.push(Event::WindowCleared);
        }
    }

    // None when `placeholder_id` is not the stream in flight. Otherwise whether
    // the stream may still touch the window: it may while the conversation it
    // started in is shown, or once its own session is selected again.
    fn stream_is_relevant(&self, placeholder_id: &str) -> Option<bool> {
        let stream = self.stream.as_ref()?;
        if stream.placeholder.id != placeholder_id {
            tracing::debug!(placeholder_id, "dropping event of a finished stream");
            return None;
        }

        Some(
            stream.epoch == self.epoch
                || (stream.session_id.is_some() && stream.session_id == self.active_session_id),
        )
    }

    fn adopt_session(&mut self, session_id: String, relevant: bool) -> Option<String> {
        let stream = self.stream.as_mut()?;
        if stream.session_reported {
            if stream.session_id.as_deref() != Some(session_id.as_str()) {
                tracing::warn!(session_id = %session_id, "ignoring second session id reported by stream");
            }
            return None;
        }
        stream.session_reported = true;

        if let Some(existing) = stream.session_id.as_deref() {
            if existing != session_id {
                tracing::warn!(
                    expected = existing,
                    reported = %session_id,
                    "stream reported a different session id"
                );
            }
            return None;
        }
        stream.session_id = Some(session_id.clone());
        stream.placeholder.session_id = Some(session_id.clone());

        if !relevant || self.active_session_id.is_some() {
            return None;
        }

        self.active_session_id = Some(session_id.clone());
        self.window_session = Some(session_id.clone());
        self.source = SessionSource::CreatedBySend;
        // Everything this session holds so far is already in the window.
        self.has_more = false;
        for message in self.window.iter_mut().filter(|m| m.is_local()) {
            if message.session_id.is_none() {
                message.session_id = Some(session_id.clone());
            }
        }
        self.events.push(Event::ActiveSessionChanged {
            session_id: Some(session_id.clone()),
            source: SessionSource::CreatedBySend,
        });

        Some(session_id)
    }

    fn position_of(&self, message_id: &str) -> Option<usize> {
        self.window.iter().position(|message| message.id == message_id)
    }

    fn reinsert_placeholder(&mut self, placeholder: Message) {
        tracing::debug!(message_id = %placeholder.id, "placeholder missing from window, re-inserting");
        self.window.push(placeholder.clone());
        self.events.push(Event::MessageAppended(placeholder));
    }
}
