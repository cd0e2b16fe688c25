#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::StreamExt;
use parley_client::ChatTransport;
use parley_client::ClientError;
use parley_client::Credential;
use parley_client::SessionStore;
use parley_client::SessionSummary;
use parley_client::StreamEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::conversation::Conversation;
use super::conversation::HistoryKind;
use super::conversation::HistoryRequest;
use super::conversation::SendTicket;
use super::conversation::StreamOutcome;
use crate::domain::models::ActiveSessionStore;
use crate::domain::models::Action;
use crate::domain::models::CredentialStore;
use crate::domain::models::Event;
use crate::domain::models::Notification;
use crate::domain::models::SessionEntry;
use crate::domain::models::SessionSource;
use crate::errors::ControllerError;

pub struct ControllerProps {
    pub sessions: Arc<dyn SessionStore>,
    pub transport: Arc<dyn ChatTransport>,
    pub active_session: Arc<dyn ActiveSessionStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub page_size: usize,
}

/// Result of a backend call made by a worker, fed back into the controller loop.
#[derive(Debug)]
pub enum Completion {
    History {
        request: HistoryRequest,
        result: Result<Vec<parley_client::Message>, ClientError>,
    },
    Sessions(Result<Vec<SessionSummary>, ClientError>),
    Deleted {
        session_id: String,
        result: Result<(), ClientError>,
    },
    Stream {
        placeholder_id: String,
        event: StreamEvent,
    },
    StreamFinished {
        placeholder_id: String,
        outcome: StreamOutcome,
    },
}

struct StreamWorker {
    placeholder_id: String,
    handle: JoinHandle<()>,
}

/// Drives a [`Conversation`] from user actions and backend responses.
///
/// Backend calls run in spawned workers. Their results come back over a
/// channel and are applied one at a time, so the conversation is only ever
/// touched from the task that owns the controller.
pub struct SessionController {
    conversation: Conversation,
    props: ControllerProps,
    event_tx: mpsc::UnboundedSender<Event>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    stream_worker: Option<StreamWorker>,
}

impl SessionController {
    pub fn new(props: ControllerProps, event_tx: mpsc::UnboundedSender<Event>) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        SessionController {
            conversation: Conversation::new(props.page_size),
            props,
            event_tx,
            completion_tx,
            completion_rx,
            stream_worker: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Lists sessions and resumes the session persisted by a previous run.
    pub async fn start(&mut self) -> Result<()> {
        let result = self.restore().await;
        self.settle(result)
    }

    pub async fn handle_action(&mut self, action: Action) -> Result<()> {
        tracing::debug!(action = ?action, "action");
        let result = self.dispatch(action).await;
        self.settle(result)
    }

    pub async fn handle_completion(&mut self, completion: Completion) -> Result<()> {
        let result = self.apply(completion).await;
        self.settle(result)
    }

    /// Waits for the next worker result and applies it.
    pub async fn process_next(&mut self) -> Result<()> {
        match self.completion_rx.recv().await {
            Some(completion) => self.handle_completion(completion).await,
            None => Ok(()),
        }
    }

    /// Runs until the action channel closes or the view stops listening.
    pub async fn run(mut self, mut action_rx: mpsc::UnboundedReceiver<Action>) -> Result<()> {
        self.start().await?;

        loop {
            tokio::select! {
                action = action_rx.recv() => {
                    match action {
                        Some(action) => self.handle_action(action).await?,
                        None => break,
                    }
                }
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion).await?;
                }
            }
        }

        if let Some(worker) = self.stream_worker.take() {
            worker.handle.abort();
        }

        Ok(())
    }

    async fn restore(&mut self) -> Result<(), ControllerError> {
        let credential = self.credential().await?;
        self.spawn_list_sessions(credential.clone());

        let session_id = self
            .props
            .active_session
            .get_active_session_id()
            .await
            .map_err(ControllerError::storage)?;

        if let Some(session_id) = session_id {
            tracing::info!(session_id = %session_id, "restoring session");
            if let Some(request) = self
                .conversation
                .select_session(&session_id, SessionSource::RestoredFromStorage)
            {
                self.spawn_history(credential, request);
            }
        }

        Ok(())
    }

    async fn dispatch(&mut self, action: Action) -> Result<(), ControllerError> {
        match action {
            Action::SelectSession(session_id) => {
                let credential = self.credential().await?;
                if let Some(request) = self
                    .conversation
                    .select_session(&session_id, SessionSource::SidebarSelected)
                {
                    self.spawn_history(credential, request);
                }
                self.persist_active_session(Some(&session_id)).await?;
            }
            Action::NewChat => {
                self.conversation.new_chat()?;
                self.persist_active_session(None).await?;
            }
            Action::SendMessage(text) => {
                let credential = self.credential().await?;
                let ticket = self.conversation.begin_send(&text, Utc::now())?;
                self.spawn_stream(credential, ticket);
            }
            Action::LoadOlder => {
                let credential = self.credential().await?;
                if self.conversation.active_session_id().is_none() {
                    return Err(ControllerError::NoActiveSession);
                }
                match self.conversation.begin_load_older() {
                    Some(request) => self.spawn_history(credential, request),
                    None if !self.conversation.has_more() => {
                        self.notify(Notification::info("No older messages"));
                    }
                    None => {
                        tracing::debug!("history fetch already running");
                    }
                }
            }
            Action::DeleteSession(session_id) => {
                let credential = self.credential().await?;
                self.spawn_delete(credential, session_id);
            }
            Action::RefreshSessions => {
                let credential = self.credential().await?;
                self.spawn_list_sessions(credential);
            }
            Action::Stop => {
                let Some(worker) = self.stream_worker.take() else {
                    return Ok(());
                };
                worker.handle.abort();
                self.conversation
                    .finish_stream(&worker.placeholder_id, StreamOutcome::Stopped);
            }
        }

        Ok(())
    }

    async fn apply(&mut self, completion: Completion) -> Result<(), ControllerError> {
        match completion {
            Completion::History { request, result } => {
                let stale_restore = request.kind == HistoryKind::Initial
                    && self.conversation.source() == SessionSource::RestoredFromStorage
                    && matches!(result, Err(ClientError::NotFound(_)));

                if self.conversation.apply_history(&request, result) && stale_restore {
                    tracing::warn!(session_id = %request.session_id, "persisted session no longer exists");
                    self.conversation.remove_session(&request.session_id);
                    self.persist_active_session(None).await?;
                }
            }
            Completion::Sessions(result) => {
                let sessions = result?
                    .into_iter()
                    .map(SessionEntry::from)
                    .collect::<Vec<_>>();
                self.conversation.set_sessions(sessions);
            }
            Completion::Deleted { session_id, result } => {
                if let Err(err) = result {
                    tracing::error!(session_id = %session_id, error = %err, "delete failed");
                    self.notify(Notification::error(format!(
                        "Failed to delete session: {err}"
                    )));
                    return Ok(());
                }

                if self.conversation.remove_session(&session_id) {
                    self.persist_active_session(None).await?;
                }
                self.notify(Notification::info("Session deleted"));
            }
            Completion::Stream {
                placeholder_id,
                event,
            } => {
                if let Some(session_id) = self.conversation.apply_stream_event(&placeholder_id, event)
                {
                    tracing::info!(session_id = %session_id, "session created by send");
                    self.persist_active_session(Some(&session_id)).await?;
                }
            }
            Completion::StreamFinished {
                placeholder_id,
                outcome,
            } => {
                if self
                    .stream_worker
                    .as_ref()
                    .is_some_and(|worker| worker.placeholder_id == placeholder_id)
                {
                    self.stream_worker = None;
                }

                if self.conversation.finish_stream(&placeholder_id, outcome) {
                    let credential = self.credential().await?;
                    self.spawn_list_sessions(credential);
                }
            }
        }

        Ok(())
    }

    async fn credential(&self) -> Result<Credential, ControllerError> {
        self.props
            .credentials
            .load()
            .await
            .map_err(ControllerError::storage)?
            .ok_or(ControllerError::Client(ClientError::AuthMissing))
    }

    async fn persist_active_session(&self, session_id: Option<&str>) -> Result<(), ControllerError> {
        let store = &self.props.active_session;
        let result = match session_id {
            Some(session_id) => store.set_active_session_id(session_id).await,
            None => store.clear_active_session_id().await,
        };

        result.map_err(ControllerError::storage)
    }

    fn spawn_history(&self, credential: Credential, request: HistoryRequest) {
        let sessions = self.props.sessions.clone();
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = sessions
                .fetch_messages(&credential, &request.session_id, request.page)
                .await;
            let _ = completion_tx.send(Completion::History { request, result });
        });
    }

    fn spawn_list_sessions(&self, credential: Credential) {
        let sessions = self.props.sessions.clone();
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = sessions.list_sessions(&credential).await;
            let _ = completion_tx.send(Completion::Sessions(result));
        });
    }

    fn spawn_delete(&self, credential: Credential, session_id: String) {
        let sessions = self.props.sessions.clone();
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = sessions.delete_session(&credential, &session_id).await;
            let _ = completion_tx.send(Completion::Deleted { session_id, result });
        });
    }

    fn spawn_stream(&mut self, credential: Credential, ticket: SendTicket) {
        let transport = self.props.transport.clone();
        let completion_tx = self.completion_tx.clone();
        let placeholder_id = ticket.placeholder_id.clone();

        let handle = tokio::spawn(async move {
            let outcome = match transport.stream_chat(&credential, ticket.request).await {
                Ok(mut stream) => {
                    let mut outcome = StreamOutcome::Completed;
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(event) => {
                                let completion = Completion::Stream {
                                    placeholder_id: ticket.placeholder_id.clone(),
                                    event,
                                };
                                if completion_tx.send(completion).is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                outcome = StreamOutcome::Failed(err);
                                break;
                            }
                        }
                    }
                    outcome
                }
                Err(err) => StreamOutcome::Failed(err),
            };

            let _ = completion_tx.send(Completion::StreamFinished {
                placeholder_id: ticket.placeholder_id,
                outcome,
            });
        });

        self.stream_worker = Some(StreamWorker {
            placeholder_id,
            handle,
        });
    }

    fn notify(&mut self, notification: Notification) {
        self.conversation.notify(notification);
    }

    // Forwards the conversation's events, then reports `result` if it failed.
    // Only a closed view channel is fatal.
    fn settle(&mut self, result: Result<(), ControllerError>) -> Result<()> {
        for event in self.conversation.take_events() {
            self.event_tx.send(event)?;
        }

        if let Err(err) = result {
            tracing::warn!(error = %err, "action failed");
            self.event_tx
                .send(Event::Notification(Notification::error(err.to_string())))?;
        }

        Ok(())
    }
}
