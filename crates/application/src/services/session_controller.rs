//! Chat session controller
//!
//! Each session runs as an actor task. User actions arrive as
//! [`SessionCommand`]s, state changes leave as [`SessionEvent`]s on a
//! broadcast channel, and the latest [`SessionSnapshot`] is kept in a watch
//! channel for late subscribers.
//!
//! Streaming, pulling and refreshing run in child tasks that report back over
//! an internal channel, so the actor only ever blocks on its own mailbox.
//! Fragments carry the epoch of the turn that produced them; the session
//! drops any that arrive after a clear.

use std::{fmt, sync::Arc};

use domain::{
    ChatSession, Fragment, ModelCatalog, ModelName, PendingTurn, PullOutcome, PullProgress,
    SessionCommand, SessionEvent, SessionId, SessionSnapshot, SubmitOutcome, Temperature,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::{Instrument, debug, info, info_span, warn};

use super::{
    model_puller::{MISSING_MODEL_NAME, ModelPuller},
    model_registry::ModelRegistryClient,
    response_streamer::ResponseStreamer,
};
use crate::error::ApplicationError;

/// Per-session defaults and channel sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model selected whenever it is listed
    #[serde(default)]
    pub preferred_model: Option<String>,

    /// Temperature a new session starts with
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Events buffered per subscriber before it is considered lagging
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Commands buffered before senders wait
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_event_buffer() -> usize {
    256
}

const fn default_command_buffer() -> usize {
    32
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preferred_model: None,
            default_temperature: default_temperature(),
            event_buffer: default_event_buffer(),
            command_buffer: default_command_buffer(),
        }
    }
}

/// Services shared by every session
#[derive(Debug, Clone)]
pub struct SessionServices {
    pub registry: ModelRegistryClient,
    pub streamer: ResponseStreamer,
    pub puller: ModelPuller,
    pub config: SessionConfig,
}

impl SessionServices {
    /// Bundle the services
    pub fn new(
        registry: ModelRegistryClient,
        streamer: ResponseStreamer,
        puller: ModelPuller,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry,
            streamer,
            puller,
            config,
        }
    }
}

/// Messages from child tasks back to the actor
#[derive(Debug)]
enum Internal {
    Fragment { epoch: u64, fragment: Fragment },
    StreamEnded { epoch: u64 },
    Models {
        models: Vec<String>,
        focus: Option<String>,
    },
    PullProgress(PullProgress),
    PullFinished(PullOutcome),
}

/// Handle to a running session actor.
///
/// Dropping the handle stops the actor together with any stream or pull it
/// started.
pub struct SessionController {
    id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Start a session over an initial model listing
    pub fn spawn(services: Arc<SessionServices>, models: Vec<String>) -> Self {
        let id = SessionId::new();
        let config = &services.config;

        let temperature = Temperature::new(config.default_temperature).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid default temperature, using built-in default");
            Temperature::default()
        });
        let catalog = ModelCatalog::with_models(config.preferred_model.clone(), models);
        let session = ChatSession::new(catalog, temperature);

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::from(&session));
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            session,
            services,
            events: events.clone(),
            snapshot: snapshot_tx,
            internal: internal_tx,
            stream_task: None,
            pull_task: None,
            refresh_task: None,
        };
        let task = tokio::spawn(
            actor
                .run(command_rx, internal_rx)
                .instrument(info_span!("session", session_id = %id)),
        );

        info!(session_id = %id, "Session started");

        Self {
            id,
            commands: command_tx,
            events,
            snapshot: snapshot_rx,
            task,
        }
    }

    /// Session identifier
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Queue a command for the actor
    pub async fn send(&self, command: SessionCommand) -> Result<(), ApplicationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ApplicationError::SessionClosed)
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current state of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every snapshot change
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Whether a turn or pull is running, or someone follows the events
    pub fn is_active(&self) -> bool {
        let snapshot = self.snapshot.borrow();
        snapshot.state.is_busy() || snapshot.pulling.is_some() || self.events.receiver_count() > 0
    }

    /// Stop the actor and everything it started
    pub fn close(&self) {
        self.task.abort();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SessionActor {
    session: ChatSession,
    services: Arc<SessionServices>,
    events: broadcast::Sender<SessionEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
    internal: mpsc::UnboundedSender<Internal>,
    stream_task: Option<JoinHandle<()>>,
    pull_task: Option<JoinHandle<()>>,
    refresh_task: Option<JoinHandle<()>>,
}

impl Drop for SessionActor {
    fn drop(&mut self) {
        for task in [
            self.stream_task.take(),
            self.pull_task.take(),
            self.refresh_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                },
                Some(message) = internal.recv() => self.handle_internal(message),
            }
            self.snapshot
                .send_replace(SessionSnapshot::from(&self.session));
        }
        info!("Session stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        debug!(command = command.name(), "Handling command");
        match command {
            SessionCommand::Submit { message } => self.submit(&message),
            SessionCommand::SelectModel { model } => match self.session.select_model(&model) {
                Ok(()) => self.publish(SessionEvent::models(self.session.catalog())),
                Err(e) => self.notice(e.to_string()),
            },
            SessionCommand::SetTemperature { temperature } => match Temperature::new(temperature) {
                Ok(temperature) => self.session.set_temperature(temperature),
                Err(e) => self.notice(e.to_string()),
            },
            SessionCommand::RefreshModels => self.refresh_models(),
            SessionCommand::PullModel { model } => self.pull_model(&model),
            SessionCommand::Clear => self.clear(),
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Fragment { epoch, fragment } => {
                let before = self.session.state();
                if self.session.apply_fragment(epoch, &fragment) {
                    if self.session.state() != before {
                        self.publish_state();
                    }
                    self.publish_transcript();
                } else {
                    debug!(epoch, "Discarded stale fragment");
                }
            },
            Internal::StreamEnded { epoch } => {
                if self.session.finish_turn(epoch) {
                    self.stream_task = None;
                    self.publish_state();
                }
            },
            Internal::Models { models, focus } => {
                self.session.replace_models(models, focus.as_deref());
                self.publish(SessionEvent::models(self.session.catalog()));
            },
            Internal::PullProgress(progress) => {
                if self.session.record_pull_progress(progress) {
                    self.publish_pull_progress();
                }
            },
            Internal::PullFinished(outcome) => {
                self.pull_task = None;
                if let Some(model) = self.session.finish_pull(&outcome) {
                    info!(model = %model, success = outcome.is_success(), "Pull finished");
                    self.publish_pull_progress();
                }
                self.publish(SessionEvent::PullFinished { outcome });
            },
        }
    }

    fn submit(&mut self, message: &str) {
        match self.session.submit(message) {
            SubmitOutcome::Ignored => debug!("Ignoring empty message"),
            SubmitOutcome::Busy => self.notice("A response is still being generated."),
            SubmitOutcome::NoModel => self.notice("No model selected. Refresh or pull a model first."),
            SubmitOutcome::Started(PendingTurn { epoch, request }) => {
                self.publish_state();
                self.publish_transcript();

                let mut fragments = self.services.streamer.stream_generate(request);
                let tx = self.internal.clone();
                self.stream_task = Some(tokio::spawn(
                    async move {
                        while let Some(fragment) = fragments.next().await {
                            if tx.send(Internal::Fragment { epoch, fragment }).is_err() {
                                return;
                            }
                        }
                        let _ = tx.send(Internal::StreamEnded { epoch });
                    }
                    .in_current_span(),
                ));
            },
        }
    }

    fn clear(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
        self.session.clear();
        self.publish_transcript();
        self.publish_state();
    }

    fn refresh_models(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        let registry = self.services.registry.clone();
        let tx = self.internal.clone();
        self.refresh_task = Some(tokio::spawn(
            async move {
                let models = registry.list_models().await;
                let _ = tx.send(Internal::Models {
                    models,
                    focus: None,
                });
            }
            .in_current_span(),
        ));
    }

    fn pull_model(&mut self, model: &str) {
        let name = match ModelName::parse(model) {
            Ok(name) => name,
            Err(e) => {
                let message = if model.trim().is_empty() {
                    MISSING_MODEL_NAME.to_string()
                } else {
                    format!("Error: {e}")
                };
                self.publish(SessionEvent::PullFinished {
                    outcome: PullOutcome::Failed { message },
                });
                return;
            },
        };
        if !self.session.begin_pull(&name) {
            self.notice("A model pull is already running.");
            return;
        }
        self.publish_pull_progress();

        let puller = self.services.puller.clone();
        let registry = self.services.registry.clone();
        let tx = self.internal.clone();
        self.pull_task = Some(tokio::spawn(
            async move {
                let progress_tx = tx.clone();
                let outcome = puller
                    .pull(name.as_str(), move |progress| {
                        let _ = progress_tx.send(Internal::PullProgress(progress));
                    })
                    .await;
                let _ = tx.send(Internal::PullFinished(outcome));

                let models = registry.list_models().await;
                let _ = tx.send(Internal::Models {
                    models,
                    focus: Some(name.to_string()),
                });
            }
            .in_current_span(),
        ));
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine; the snapshot still carries the state.
        let _ = self.events.send(event);
    }

    fn publish_state(&self) {
        self.publish(SessionEvent::StateChanged {
            state: self.session.state(),
        });
    }

    fn publish_transcript(&self) {
        self.publish(SessionEvent::TranscriptChanged {
            messages: self.session.transcript().messages().to_vec(),
        });
    }

    fn publish_pull_progress(&self) {
        if let Some(progress) = self.session.pull_progress() {
            self.publish(SessionEvent::PullProgress(progress.clone()));
        }
    }

    fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "Notice");
        self.publish(SessionEvent::notice(message));
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, time::Duration};

    use async_trait::async_trait;
    use domain::{MessageRole, TurnState};
    use futures::stream;

    use super::*;
    use crate::{
        ports::{
            MockGenerationPort, MockModelRegistryPort, MockPullProcessPort, ProcessExit,
            PullProcess, TextStream,
        },
        services::{PullConfig, StreamerConfig},
    };

    const WAIT: Duration = Duration::from_secs(5);

    /// Pull process that prints its lines at once, or never finishes
    struct FakeProcess {
        lines: VecDeque<String>,
        code: i32,
        hang: bool,
    }

    #[async_trait]
    impl PullProcess for FakeProcess {
        async fn next_line(&mut self) -> Option<String> {
            if self.hang {
                futures::future::pending::<()>().await;
            }
            self.lines.pop_front()
        }

        async fn wait(&mut self) -> Result<ProcessExit, ApplicationError> {
            Ok(ProcessExit {
                code: Some(self.code),
            })
        }
    }

    struct Fixture {
        generation: MockGenerationPort,
        registry: Vec<String>,
        process: MockPullProcessPort,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                generation: MockGenerationPort::new(),
                registry: vec!["llama3:8b".into()],
                process: MockPullProcessPort::new(),
            }
        }

        fn streaming(mut self, deltas: &'static [&'static str], then_hang: bool) -> Self {
            self.generation.expect_stream_generate().returning(move |_| {
                let items = stream::iter(deltas.iter().map(|d| Ok((*d).to_string())));
                let stream: TextStream = if then_hang {
                    Box::pin(items.chain(stream::pending()))
                } else {
                    Box::pin(items)
                };
                Ok(stream)
            });
            self
        }

        fn pulling(mut self, lines: &'static [&'static str], code: i32, hang: bool) -> Self {
            self.process.expect_spawn().returning(move |_| {
                Ok(Box::new(FakeProcess {
                    lines: lines.iter().map(|l| (*l).to_string()).collect(),
                    code,
                    hang,
                }))
            });
            self
        }

        fn spawn(self, models: Vec<String>) -> SessionController {
            let listing = self.registry;
            let mut registry_port = MockModelRegistryPort::new();
            registry_port
                .expect_list_models()
                .returning(move || Ok(listing.clone()));
            let registry = ModelRegistryClient::new(Arc::new(registry_port));

            let streamer = ResponseStreamer::new(Arc::new(self.generation), StreamerConfig::default());
            let puller = ModelPuller::new(
                Arc::new(self.process),
                registry.clone(),
                PullConfig::default(),
            );
            let services = Arc::new(SessionServices::new(
                registry,
                streamer,
                puller,
                SessionConfig::default(),
            ));
            SessionController::spawn(services, models)
        }
    }

    async fn wait_until<F>(controller: &SessionController, mut predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = controller.snapshot.clone();
        let snapshot = tokio::time::timeout(WAIT, rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for session state")
            .expect("session stopped")
            .clone();
        snapshot
    }

    async fn next_matching<F>(
        events: &mut broadcast::Receiver<SessionEvent>,
        mut predicate: F,
    ) -> SessionEvent
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = events.recv().await.expect("event channel closed");
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn assistant_turns(snapshot: &SessionSnapshot) -> Vec<String> {
        snapshot
            .transcript
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.clone())
            .collect()
    }

    fn models() -> Vec<String> {
        vec!["llama3:8b".into()]
    }

    #[tokio::test]
    async fn streams_fragments_into_one_assistant_turn() {
        let controller = Fixture::new().streaming(&["Hel", "lo"], false).spawn(models());

        controller
            .send(SessionCommand::Submit {
                message: "hi".into(),
            })
            .await
            .unwrap();

        let snapshot = wait_until(&controller, |s| {
            s.state == TurnState::Idle && s.transcript.len() == 2
        })
        .await;
        assert_eq!(assistant_turns(&snapshot), vec!["Hello"]);
        assert_eq!(snapshot.transcript[0].content, "hi");
    }

    #[tokio::test]
    async fn publishes_state_transitions() {
        let controller = Fixture::new().streaming(&["x"], false).spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::Submit {
                message: "hi".into(),
            })
            .await
            .unwrap();

        let mut states = Vec::new();
        while states.last() != Some(&TurnState::Idle) {
            if let SessionEvent::StateChanged { state } =
                next_matching(&mut events, |e| matches!(e, SessionEvent::StateChanged { .. })).await
            {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![TurnState::Sending, TurnState::Streaming, TurnState::Idle]
        );
    }

    #[tokio::test]
    async fn empty_submit_changes_nothing() {
        let controller = Fixture::new().spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::Submit {
                message: "   ".into(),
            })
            .await
            .unwrap();
        controller
            .send(SessionCommand::SelectModel {
                model: "llama3:8b".into(),
            })
            .await
            .unwrap();
        next_matching(&mut events, |e| matches!(e, SessionEvent::ModelsChanged { .. })).await;

        let snapshot = wait_until(&controller, |s| s.catalog.selected().is_some()).await;
        assert!(snapshot.transcript.is_empty());
        assert_eq!(snapshot.state, TurnState::Idle);
    }

    #[tokio::test]
    async fn clear_discards_in_flight_stream() {
        let controller = Fixture::new().streaming(&["par"], true).spawn(models());

        controller
            .send(SessionCommand::Submit {
                message: "hi".into(),
            })
            .await
            .unwrap();
        wait_until(&controller, |s| s.state == TurnState::Streaming).await;

        controller.send(SessionCommand::Clear).await.unwrap();
        let snapshot = wait_until(&controller, |s| s.transcript.is_empty()).await;
        assert_eq!(snapshot.state, TurnState::Idle);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.snapshot().transcript.is_empty());
    }

    #[tokio::test]
    async fn submit_while_streaming_is_rejected() {
        let controller = Fixture::new().streaming(&["par"], true).spawn(models());
        let mut events = controller.subscribe();

        for message in ["one", "two"] {
            controller
                .send(SessionCommand::Submit {
                    message: message.into(),
                })
                .await
                .unwrap();
        }

        next_matching(&mut events, |e| matches!(e, SessionEvent::Notice { .. })).await;
        let users = controller
            .snapshot()
            .transcript
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count();
        assert_eq!(users, 1);
    }

    #[tokio::test]
    async fn submit_without_model_is_rejected() {
        let controller = Fixture::new().spawn(vec![]);
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::Submit {
                message: "hi".into(),
            })
            .await
            .unwrap();

        next_matching(&mut events, |e| matches!(e, SessionEvent::Notice { .. })).await;
        assert!(controller.snapshot().transcript.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_ends_idle_with_error_turn() {
        let mut fixture = Fixture::new();
        fixture
            .generation
            .expect_stream_generate()
            .returning(|_| Err(ApplicationError::Unavailable("connection refused".into())));
        let controller = fixture.spawn(models());

        controller
            .send(SessionCommand::Submit {
                message: "hi".into(),
            })
            .await
            .unwrap();

        let snapshot = wait_until(&controller, |s| {
            s.state == TurnState::Idle && s.transcript.len() == 2
        })
        .await;
        let reply = &assistant_turns(&snapshot)[0];
        assert!(reply.starts_with("Error: "));
        assert!(reply.contains("connection refused"));
    }

    #[tokio::test]
    async fn temperature_is_validated() {
        let controller = Fixture::new().spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::SetTemperature { temperature: 3.0 })
            .await
            .unwrap();
        next_matching(&mut events, |e| matches!(e, SessionEvent::Notice { .. })).await;

        controller
            .send(SessionCommand::SetTemperature { temperature: 0.2 })
            .await
            .unwrap();
        let snapshot =
            wait_until(&controller, |s| (s.temperature.value() - 0.2).abs() < f32::EPSILON).await;
        assert!((snapshot.temperature.value() - 0.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn selecting_unlisted_model_is_rejected() {
        let controller = Fixture::new().spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::SelectModel {
                model: "mistral".into(),
            })
            .await
            .unwrap();

        let event = next_matching(&mut events, |e| matches!(e, SessionEvent::Notice { .. })).await;
        assert!(matches!(event, SessionEvent::Notice { message } if message.contains("mistral")));
        assert_eq!(controller.snapshot().catalog.selected(), Some("llama3:8b"));
    }

    #[tokio::test]
    async fn refresh_replaces_listing() {
        let mut fixture = Fixture::new();
        fixture.registry = vec!["llama3:8b".into(), "phi3:mini".into()];
        let controller = fixture.spawn(models());

        controller.send(SessionCommand::RefreshModels).await.unwrap();

        let snapshot = wait_until(&controller, |s| s.catalog.models().len() == 2).await;
        assert_eq!(snapshot.catalog.selected(), Some("llama3:8b"));
    }

    #[tokio::test]
    async fn pull_selects_pulled_model() {
        let mut fixture = Fixture::new().pulling(&["{\"progress\": 0.5}", "100%"], 0, false);
        fixture.registry = vec!["llama3:8b".into(), "phi3:mini".into()];
        let controller = fixture.spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::PullModel {
                model: "phi3:mini".into(),
            })
            .await
            .unwrap();

        let finished =
            next_matching(&mut events, |e| matches!(e, SessionEvent::PullFinished { .. })).await;
        assert!(matches!(
            finished,
            SessionEvent::PullFinished {
                outcome: PullOutcome::Completed { .. }
            }
        ));

        let snapshot = wait_until(&controller, |s| s.catalog.selected() == Some("phi3:mini")).await;
        let pull = snapshot.pull.expect("pull progress recorded");
        assert!((pull.fraction - 1.0).abs() < f32::EPSILON);
        assert!(snapshot.pulling.is_none());
    }

    #[tokio::test]
    async fn failed_pull_reports_output() {
        let controller = Fixture::new()
            .pulling(&["Error: manifest unknown"], 1, false)
            .spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::PullModel {
                model: "nope".into(),
            })
            .await
            .unwrap();

        let event =
            next_matching(&mut events, |e| matches!(e, SessionEvent::PullFinished { .. })).await;
        let SessionEvent::PullFinished { outcome } = event else {
            unreachable!()
        };
        assert!(!outcome.is_success());
        assert!(outcome.message().contains("manifest unknown"));
    }

    #[tokio::test]
    async fn only_one_pull_at_a_time() {
        let controller = Fixture::new().pulling(&[], 0, true).spawn(models());
        let mut events = controller.subscribe();

        for _ in 0..2 {
            controller
                .send(SessionCommand::PullModel {
                    model: "phi3".into(),
                })
                .await
                .unwrap();
        }

        let event = next_matching(&mut events, |e| matches!(e, SessionEvent::Notice { .. })).await;
        assert!(matches!(event, SessionEvent::Notice { message } if message.contains("already")));
        assert_eq!(controller.snapshot().pulling.as_deref(), Some("phi3"));
    }

    #[tokio::test]
    async fn chatting_continues_during_pull() {
        let controller = Fixture::new()
            .pulling(&[], 0, true)
            .streaming(&["ok"], false)
            .spawn(models());

        controller
            .send(SessionCommand::PullModel {
                model: "phi3".into(),
            })
            .await
            .unwrap();
        controller
            .send(SessionCommand::Submit {
                message: "hi".into(),
            })
            .await
            .unwrap();

        let snapshot = wait_until(&controller, |s| {
            s.state == TurnState::Idle && s.transcript.len() == 2
        })
        .await;
        assert_eq!(assistant_turns(&snapshot), vec!["ok"]);
        assert!(snapshot.pulling.is_some());
    }

    #[tokio::test]
    async fn blank_pull_name_fails_immediately() {
        let controller = Fixture::new().spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::PullModel { model: " ".into() })
            .await
            .unwrap();

        let event =
            next_matching(&mut events, |e| matches!(e, SessionEvent::PullFinished { .. })).await;
        let SessionEvent::PullFinished { outcome } = event else {
            unreachable!()
        };
        assert_eq!(outcome.message(), MISSING_MODEL_NAME);
    }

    #[tokio::test]
    async fn malformed_pull_name_reports_why() {
        let controller = Fixture::new().spawn(models());
        let mut events = controller.subscribe();

        controller
            .send(SessionCommand::PullModel {
                model: "llama 3".into(),
            })
            .await
            .unwrap();

        let event =
            next_matching(&mut events, |e| matches!(e, SessionEvent::PullFinished { .. })).await;
        let SessionEvent::PullFinished { outcome } = event else {
            unreachable!()
        };
        assert!(outcome.message().starts_with("Error: Invalid model name"));
        assert!(outcome.message().contains("llama 3"));
        assert!(controller.snapshot().pulling.is_none());
    }

    #[tokio::test]
    async fn running_work_and_subscribers_keep_session_active() {
        let controller = Fixture::new().pulling(&[], 0, true).spawn(models());
        assert!(!controller.is_active());

        let events = controller.subscribe();
        assert!(controller.is_active());
        drop(events);
        assert!(!controller.is_active());

        controller
            .send(SessionCommand::PullModel {
                model: "phi3".into(),
            })
            .await
            .unwrap();
        wait_until(&controller, |s| s.pulling.is_some()).await;
        assert!(controller.is_active());
    }

    #[tokio::test]
    async fn closed_session_rejects_commands() {
        let controller = Fixture::new().spawn(models());
        controller.close();

        let result = tokio::time::timeout(WAIT, async {
            loop {
                if controller.send(SessionCommand::Clear).await.is_err() && controller.is_closed() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(result.is_ok());
        assert!(controller.is_closed());
    }
}
