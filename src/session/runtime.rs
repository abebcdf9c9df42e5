//! Owner task for the session controller.
//!
//! Every mutation of session state happens inside one spawned task that
//! drains a command queue. Handshakes and transport traffic run in their own
//! tasks and report back as commands, so the owner never blocks on I/O.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::{Result, StealthError};
use crate::session::controller::{DeltaOutcome, SessionSnapshot, StreamingSessionController};
use crate::session::history::{ConversationHistoryStore, SessionSummary};
use crate::session::model::{Session, SessionRequest, Turn};
use crate::session::transport::{
    Connection, FrameSend, InboundEvent, InputPayload, Outbound, Subscription, Transport,
};

const COMMAND_QUEUE_DEPTH: usize = 64;
const EVENT_BUFFER: usize = 128;

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted { session_id: String },
    #[serde(rename_all = "camelCase")]
    StreamingDelta {
        session_id: String,
        text: String,
        is_complete: bool,
    },
    #[serde(rename_all = "camelCase")]
    StreamingError { session_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    SessionEnded { session_id: String, reason: String },
    SessionErased,
}

/// How an input left the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    /// Text reached the backend.
    Acknowledged,
    Queued,
    /// Capture lane was saturated; the frame was discarded.
    Dropped,
}

enum Command {
    Initialize {
        request: SessionRequest,
        reply: oneshot::Sender<Result<Session>>,
    },
    Connected {
        request: SessionRequest,
        connection: Connection,
        reply: oneshot::Sender<Result<Session>>,
    },
    Send {
        payload: InputPayload,
        reply: oneshot::Sender<Result<Dispatch>>,
    },
    Inbound {
        subscription: u64,
        event: InboundEvent,
    },
    Navigate {
        direction: i32,
        reply: oneshot::Sender<Option<Turn>>,
    },
    ToggleSaved {
        timestamp: i64,
        reply: oneshot::Sender<bool>,
    },
    History {
        session_id: String,
        reply: oneshot::Sender<Vec<Turn>>,
    },
    ListSessions {
        reply: oneshot::Sender<Vec<SessionSummary>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    End {
        reason: String,
        reply: oneshot::Sender<bool>,
    },
    Erase {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable front door to the session owner task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

fn stopped() -> StealthError {
    StealthError::Transport("Session runtime stopped".into())
}

impl SessionHandle {
    /// Spawns the owner task on the current tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>, history: ConversationHistoryStore) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let runtime = SessionRuntime {
            controller: StreamingSessionController::new(history),
            transport,
            subscription: None,
            next_subscription: 0,
            next_outbound: 0,
            pending: HashMap::new(),
            commands: commands.clone(),
            events: events.clone(),
        };
        tokio::spawn(runtime.run(receiver));
        Self { commands, events }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(build(reply)).await.map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Validates, performs the handshake, then replaces any active session.
    pub async fn initialize_session(
        &self,
        api_key: &str,
        profile: &str,
        language: &str,
        custom_instructions: &str,
        enable_google_search: bool,
    ) -> Result<Session> {
        let request = SessionRequest::parse(api_key, profile, language, custom_instructions)?
            .with_google_search(enable_google_search);
        self.request(|reply| Command::Initialize { request, reply }).await?
    }

    /// Text resolves once the backend acknowledges it. Media resolves as soon
    /// as it is queued or dropped.
    pub async fn send_input(&self, payload: InputPayload) -> Result<Dispatch> {
        self.request(|reply| Command::Send { payload, reply }).await?
    }

    pub async fn navigate(&self, direction: i32) -> Result<Option<Turn>> {
        self.request(|reply| Command::Navigate { direction, reply }).await
    }

    pub async fn toggle_saved(&self, timestamp: i64) -> Result<bool> {
        self.request(|reply| Command::ToggleSaved { timestamp, reply }).await
    }

    pub async fn get_history(&self, session_id: &str) -> Result<Vec<Turn>> {
        let session_id = session_id.to_string();
        self.request(|reply| Command::History { session_id, reply }).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.request(|reply| Command::ListSessions { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Returns false when no session was active.
    pub async fn end_session(&self, reason: &str) -> Result<bool> {
        let reason = reason.to_string();
        self.request(|reply| Command::End { reason, reply }).await
    }

    pub async fn erase(&self) -> Result<()> {
        self.request(|reply| Command::Erase { reply }).await?
    }
}

struct SessionRuntime {
    controller: StreamingSessionController,
    transport: Arc<dyn Transport>,
    subscription: Option<Subscription>,
    next_subscription: u64,
    next_outbound: u64,
    pending: HashMap<u64, oneshot::Sender<Result<Dispatch>>>,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionRuntime {
    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) {
        while let Some(command) = receiver.recv().await {
            self.handle(command);
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine; the UI may not be listening yet.
        let _ = self.events.send(event);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Initialize { request, reply } => self.begin_handshake(request, reply),
            Command::Connected {
                request,
                connection,
                reply,
            } => {
                let session = self.install(&request, connection);
                let _ = reply.send(Ok(session));
            }
            Command::Send { payload, reply } => self.send(payload, reply),
            Command::Inbound {
                subscription,
                event,
            } => self.inbound(subscription, event),
            Command::Navigate { direction, reply } => {
                self.controller.navigate(direction);
                let _ = reply.send(self.controller.current_turn());
            }
            Command::ToggleSaved { timestamp, reply } => {
                let _ = reply.send(self.controller.toggle_saved(timestamp));
            }
            Command::History { session_id, reply } => {
                let _ = reply.send(self.controller.history(&session_id));
            }
            Command::ListSessions { reply } => {
                let _ = reply.send(self.controller.list_sessions());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::End { reason, reply } => {
                let _ = reply.send(self.teardown(&reason));
            }
            Command::Erase { reply } => {
                self.teardown("erased");
                let result = self.controller.erase();
                if result.is_ok() {
                    self.emit(SessionEvent::SessionErased);
                }
                let _ = reply.send(result);
            }
        }
    }

    /// The handshake runs off the owner task; its outcome comes back as
    /// `Command::Connected`. A rejected handshake never touches state.
    fn begin_handshake(&self, request: SessionRequest, reply: oneshot::Sender<Result<Session>>) {
        let transport = Arc::clone(&self.transport);
        let commands = self.commands.clone();
        tokio::spawn(async move {
            match transport.connect(&request).await {
                Ok(connection) => {
                    let command = Command::Connected {
                        request,
                        connection,
                        reply,
                    };
                    if let Err(mpsc::error::SendError(Command::Connected { reply, .. })) =
                        commands.send(command).await
                    {
                        let _ = reply.send(Err(stopped()));
                    }
                }
                Err(e) => {
                    log::warn!("Session handshake failed: {}", e);
                    let _ = reply.send(Err(e));
                }
            }
        });
    }

    /// Ends the previous session (if any) and installs the new one in a
    /// single owner-task step.
    fn install(&mut self, request: &SessionRequest, connection: Connection) -> Session {
        self.teardown("superseded by a new session");

        let session = self.controller.start(request);
        self.next_subscription += 1;
        let commands = self.commands.clone();
        self.subscription = Some(Subscription::subscribe(
            self.next_subscription,
            connection,
            move |subscription, event| {
                let commands = commands.clone();
                async move {
                    commands
                        .send(Command::Inbound {
                            subscription,
                            event,
                        })
                        .await
                        .is_ok()
                }
            },
        ));
        self.emit(SessionEvent::SessionStarted {
            session_id: session.id.clone(),
        });
        session
    }

    /// Detaches the transport, fails pending text sends and ends the session.
    /// Emits `SessionEnded` only when a session was actually active.
    fn teardown(&mut self, reason: &str) -> bool {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(StealthError::Transport(format!(
                "Session ended before delivery: {reason}"
            ))));
        }
        match self.controller.end(reason) {
            Some(session_id) => {
                self.emit(SessionEvent::SessionEnded {
                    session_id,
                    reason: reason.to_string(),
                });
                true
            }
            None => false,
        }
    }

    fn send(&mut self, payload: InputPayload, reply: oneshot::Sender<Result<Dispatch>>) {
        let subscription = match (self.controller.ensure_active(), &self.subscription) {
            (Ok(()), Some(subscription)) => subscription,
            (Err(e), _) => {
                let _ = reply.send(Err(e));
                return;
            }
            (Ok(()), None) => {
                let _ = reply.send(Err(StealthError::Transport("Transport detached".into())));
                return;
            }
        };

        self.next_outbound += 1;
        let id = self.next_outbound;
        match payload {
            InputPayload::Text(text) => {
                if let Err(e) = self.controller.record_user_text(&text) {
                    let _ = reply.send(Err(e));
                    return;
                }
                let outbound = Outbound {
                    id,
                    payload: InputPayload::Text(text),
                };
                match subscription.send_text(outbound) {
                    Ok(()) => {
                        self.pending.insert(id, reply);
                    }
                    Err(message) => {
                        let _ = reply.send(Err(StealthError::Transport(message)));
                    }
                }
            }
            media => {
                let kind = media.kind();
                let result = subscription.send_frame(Outbound { id, payload: media });
                if result == FrameSend::Dropped {
                    log::debug!("Dropped {} frame: outbound lane saturated", kind);
                }
                let _ = reply.send(Ok(match result {
                    FrameSend::Queued => Dispatch::Queued,
                    FrameSend::Dropped => Dispatch::Dropped,
                }));
            }
        }
    }

    fn inbound(&mut self, subscription: u64, event: InboundEvent) {
        let current = self.subscription.as_ref().map(Subscription::id);
        if current != Some(subscription) {
            log::debug!("Discarding event from detached subscription {}", subscription);
            return;
        }
        let Some(session_id) = self.controller.session().map(|s| s.id.clone()) else {
            return;
        };

        match event {
            InboundEvent::Delta(delta) => {
                if self.controller.apply_delta(&delta) != DeltaOutcome::Discarded {
                    self.emit(SessionEvent::StreamingDelta {
                        session_id,
                        text: delta.text,
                        is_complete: delta.is_complete,
                    });
                }
            }
            InboundEvent::Error(message) => self.report_error(session_id, message),
            InboundEvent::Acknowledged(id) => {
                if let Some(reply) = self.pending.remove(&id) {
                    let _ = reply.send(Ok(Dispatch::Acknowledged));
                }
            }
            InboundEvent::SendFailed { id, message } => {
                if let Some(reply) = self.pending.remove(&id) {
                    let _ = reply.send(Err(StealthError::Transport(message.clone())));
                }
                self.report_error(session_id, message);
            }
            InboundEvent::Closed { reason } => {
                if let Some(subscription) = self.subscription.take() {
                    subscription.unsubscribe();
                }
                for (_, reply) in self.pending.drain() {
                    let _ = reply.send(Err(StealthError::Transport(reason.clone())));
                }
                self.report_error(session_id, format!("Connection closed: {reason}"));
            }
        }
    }

    fn report_error(&mut self, session_id: String, message: String) {
        if self.controller.apply_error(&message).is_some() {
            log::warn!("Session {} stream error: {}", session_id, message);
            self.emit(SessionEvent::StreamingError {
                session_id,
                message,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::capture::audio::AudioChunk;
    use crate::session::transport::testing::{ScriptedTransport, REJECTED_KEY};
    use crate::session::transport::{StreamingDelta, FRAME_QUEUE_DEPTH};

    fn spawn() -> (SessionHandle, ScriptedTransport) {
        let transport = ScriptedTransport::default();
        let handle = SessionHandle::spawn(
            Arc::new(transport.clone()),
            ConversationHistoryStore::in_memory(),
        );
        (handle, transport)
    }

    async fn start(handle: &SessionHandle) -> Session {
        handle
            .initialize_session("key", "interview", "en-US", "", false)
            .await
            .unwrap()
    }

    async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn rejected_key_leaves_state_untouched() {
        let (handle, _transport) = spawn();
        let err = handle
            .initialize_session(REJECTED_KEY, "interview", "en-US", "", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "AuthError");
        assert!(handle.snapshot().await.unwrap().session.is_none());
    }

    #[tokio::test]
    async fn unknown_profile_is_a_config_error() {
        let (handle, transport) = spawn();
        let err = handle
            .initialize_session("key", "karaoke", "en-US", "", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
        assert_eq!(transport.connections(), 0);
    }

    #[tokio::test]
    async fn text_resolves_on_acknowledgement() {
        let (handle, transport) = spawn();
        let session = start(&handle).await;
        let mut end = transport.take_end();

        let sender = handle.clone();
        let send = tokio::spawn(async move {
            sender.send_input(InputPayload::Text("hello".into())).await
        });
        let outbound = end.text_rx.recv().await.unwrap();
        assert_eq!(outbound.payload, InputPayload::Text("hello".into()));

        let history = handle.get_history(&session.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "hello");

        end.inbound_tx
            .send(InboundEvent::Acknowledged(outbound.id))
            .await
            .unwrap();
        assert_eq!(send.await.unwrap().unwrap(), Dispatch::Acknowledged);
    }

    #[tokio::test]
    async fn saturated_frame_lane_drops_media() {
        let (handle, transport) = spawn();
        start(&handle).await;
        let _end = transport.take_end();

        let chunk = || InputPayload::Audio(AudioChunk::pcm16(vec![0; 32]));
        for _ in 0..FRAME_QUEUE_DEPTH {
            assert_eq!(handle.send_input(chunk()).await.unwrap(), Dispatch::Queued);
        }
        assert_eq!(handle.send_input(chunk()).await.unwrap(), Dispatch::Dropped);
    }

    #[tokio::test]
    async fn stream_error_becomes_error_turn() {
        let (handle, transport) = spawn();
        let session = start(&handle).await;
        let end = transport.take_end();
        let mut events = handle.subscribe_events();

        end.inbound_tx
            .send(InboundEvent::Error("quota exceeded".into()))
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::StreamingError {
                session_id: session.id.clone(),
                message: "quota exceeded".into()
            }
        );
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.turns[0].is_error);
        assert!(snapshot.session.unwrap().is_active());
    }

    #[tokio::test]
    async fn superseded_session_ignores_late_deltas() {
        let (handle, transport) = spawn();
        let first = start(&handle).await;
        let old_end = transport.take_end();
        let second = start(&handle).await;
        let new_end = transport.take_end();

        let _ = old_end
            .inbound_tx
            .send(InboundEvent::Delta(StreamingDelta {
                response_id: 1,
                text: "stale".into(),
                is_complete: true,
            }))
            .await;
        new_end
            .inbound_tx
            .send(InboundEvent::Delta(StreamingDelta {
                response_id: 1,
                text: "fresh".into(),
                is_complete: true,
            }))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.get_history(&first.id).await.unwrap().is_empty());
        let turns = handle.get_history(&second.id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "fresh");
    }

    #[tokio::test]
    async fn end_session_is_idempotent() {
        let (handle, _transport) = spawn();
        start(&handle).await;
        assert!(handle.end_session("user").await.unwrap());
        assert!(!handle.end_session("user").await.unwrap());
        let err = handle
            .send_input(InputPayload::Text("late".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TransportError");
    }

    #[tokio::test]
    async fn erase_wipes_history_and_notifies() {
        let (handle, _transport) = spawn();
        start(&handle).await;
        let mut events = handle.subscribe_events();
        handle.erase().await.unwrap();
        assert!(matches!(next_event(&mut events).await, SessionEvent::SessionEnded { .. }));
        assert_eq!(next_event(&mut events).await, SessionEvent::SessionErased);
        assert!(handle.list_sessions().await.unwrap().is_empty());
    }
}
