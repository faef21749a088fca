//! Application state shared across handlers

use std::{collections::HashMap, sync::Arc, time::Duration};

use application::{
    ApplicationError, ModelPuller, ModelRegistryClient, ResponseStreamer, SessionController,
    SessionServices, WarmupService,
    ports::{GenerationPort, ModelRegistryPort, PullProcessPort},
};
use domain::SessionId;
use infrastructure::{AppConfig, OllamaAdapter, ProcessPullAdapter};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live chat sessions
    pub sessions: Arc<SessionRegistry>,
    /// Services every session is built from
    pub services: Arc<SessionServices>,
    /// Generation port, used for the startup preload
    pub generation: Arc<dyn GenerationPort>,
    /// Application configuration
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the state from explicit ports
    pub fn new(
        config: AppConfig,
        registry: Arc<dyn ModelRegistryPort>,
        generation: Arc<dyn GenerationPort>,
        process: Arc<dyn PullProcessPort>,
    ) -> Self {
        let registry = ModelRegistryClient::new(registry);
        let streamer = ResponseStreamer::new(Arc::clone(&generation), config.chat.rendering.clone());
        let puller = ModelPuller::new(process, registry.clone(), config.pull.progress.clone());
        let services = SessionServices::new(registry, streamer, puller, config.chat.session.clone());

        Self {
            sessions: Arc::new(SessionRegistry::default()),
            services: Arc::new(services),
            generation,
            config: Arc::new(config),
        }
    }

    /// Wire the state against the configured Ollama server and pull command
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the pull command is unusable.
    pub fn from_config(config: AppConfig) -> Result<Self, ApplicationError> {
        let ollama = Arc::new(OllamaAdapter::new(config.inference.clone())?);
        let process = Arc::new(ProcessPullAdapter::new(config.pull.command.clone())?);
        Ok(Self::new(config, ollama.clone(), ollama, process))
    }

    /// Registry client shared by all sessions
    pub fn registry(&self) -> &ModelRegistryClient {
        &self.services.registry
    }

    /// Startup warm-up over the same ports
    pub fn warmup(&self) -> WarmupService {
        WarmupService::new(
            self.services.registry.clone(),
            Arc::clone(&self.generation),
            self.config.startup.clone(),
        )
    }

    /// Start a session over the live model listing
    pub async fn open_session(&self) -> Arc<SessionController> {
        let models = self.registry().list_models().await;
        let controller = SessionController::spawn(Arc::clone(&self.services), models);
        self.sessions.insert(controller)
    }
}

struct SessionEntry {
    controller: Arc<SessionController>,
    last_seen: Instant,
}

/// Sessions by id, with the time each was last used
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    /// Register a running session
    pub fn insert(&self, controller: SessionController) -> Arc<SessionController> {
        let controller = Arc::new(controller);
        self.entries.write().insert(
            controller.id(),
            SessionEntry {
                controller: Arc::clone(&controller),
                last_seen: Instant::now(),
            },
        );
        controller
    }

    /// Look up a session and mark it as used
    pub fn get(&self, id: SessionId) -> Option<Arc<SessionController>> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.controller))
    }

    /// Close and forget a session
    pub fn remove(&self, id: SessionId) -> bool {
        let Some(entry) = self.entries.write().remove(&id) else {
            return false;
        };
        entry.controller.close();
        debug!(session_id = %id, "Session removed");
        true
    }

    /// Close sessions unused for longer than `max_idle`; returns how many.
    ///
    /// A session streaming, pulling or followed by an event subscriber counts
    /// as used.
    pub fn remove_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|id, entry| {
            if entry.controller.is_closed() {
                return false;
            }
            if entry.controller.is_active() {
                entry.last_seen = now;
                return true;
            }
            if now.duration_since(entry.last_seen) < max_idle {
                return true;
            }
            entry.controller.close();
            info!(session_id = %id, "Closing idle session");
            false
        });
        before - entries.len()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Close every session
    pub fn clear(&self) {
        for (_, entry) in self.entries.write().drain() {
            entry.controller.close();
        }
    }
}
