//! Model puller
//!
//! Runs the external download command and turns its free-form output into
//! monotonic progress. Extraction is a pure function so it can be tested
//! without a process; [`ProgressTracker`] adds rate limiting and the synthetic
//! increments that keep a silent download looking alive.

use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, LazyLock},
    time::Duration,
};

use domain::{ModelName, PullOutcome, PullProgress};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::model_registry::ModelRegistryClient;
use crate::ports::PullProcessPort;

/// Failure message for a blank model name
pub const MISSING_MODEL_NAME: &str = "Error: Please specify a model name.";

/// `"progress": 0.42` inside a JSON-looking line
static JSON_PROGRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""progress"\s*:\s*([0-1](?:\.\d+)?)"#).ok());

/// A bare percentage such as `42%`
static TEXT_PERCENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})%").ok());

/// Pull timing and reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullConfig {
    /// Minimum time between progress callbacks in milliseconds
    #[serde(default = "default_emit_interval_ms")]
    pub emit_interval_ms: u64,

    /// Silence after which synthetic progress kicks in, in milliseconds
    #[serde(default = "default_stall_ms")]
    pub stall_ms: u64,

    /// Size of one synthetic increment
    #[serde(default = "default_synthetic_step")]
    pub synthetic_step: f32,

    /// Synthetic progress never goes beyond this
    #[serde(default = "default_synthetic_cap")]
    pub synthetic_cap: f32,

    /// Output lines quoted when the command fails
    #[serde(default = "default_diagnostic_lines")]
    pub diagnostic_lines: usize,

    /// Registry checks after a successful download
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Delay between registry checks in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_emit_interval_ms() -> u64 {
    100
}

const fn default_stall_ms() -> u64 {
    1_000
}

const fn default_synthetic_step() -> f32 {
    0.01
}

const fn default_synthetic_cap() -> f32 {
    0.1
}

const fn default_diagnostic_lines() -> usize {
    20
}

const fn default_poll_attempts() -> u32 {
    5
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            emit_interval_ms: default_emit_interval_ms(),
            stall_ms: default_stall_ms(),
            synthetic_step: default_synthetic_step(),
            synthetic_cap: default_synthetic_cap(),
            diagnostic_lines: default_diagnostic_lines(),
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PullConfig {
    const fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms)
    }

    const fn stall(&self) -> Duration {
        Duration::from_millis(self.stall_ms)
    }

    const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Progress reported by one output line, if any.
///
/// A JSON `progress` field takes precedence; a bare percentage is only
/// considered when there is none. Values are clamped to `[0.0, 1.0]`.
pub fn extract_progress(line: &str) -> Option<f32> {
    if let Some(caps) = JSON_PROGRESS.as_ref().and_then(|re| re.captures(line)) {
        return caps
            .get(1)
            .and_then(|m| m.as_str().parse::<f32>().ok())
            .map(|p| p.clamp(0.0, 1.0));
    }

    TEXT_PERCENT
        .as_ref()
        .and_then(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .map(|pct| (f32::from(pct) / 100.0).clamp(0.0, 1.0))
}

/// Merge a line into the best progress seen so far; never decreases
pub fn advance_progress(previous_best: f32, line: &str) -> f32 {
    extract_progress(line).map_or(previous_best, |p| previous_best.max(p))
}

/// Rate-limited, monotonic progress for one pull
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    emit_interval: Duration,
    stall: Duration,
    synthetic_step: f32,
    synthetic_cap: f32,
    best: f32,
    reported: f32,
    last_emit: Instant,
    last_advance: Instant,
}

impl ProgressTracker {
    /// Start tracking at zero; the start itself counts as an emission
    pub fn new(config: &PullConfig, now: Instant) -> Self {
        Self {
            emit_interval: config.emit_interval(),
            stall: config.stall(),
            synthetic_step: config.synthetic_step,
            synthetic_cap: config.synthetic_cap,
            best: 0.0,
            reported: 0.0,
            last_emit: now,
            last_advance: now,
        }
    }

    /// Feed an output line; returns a value to report if one is due
    pub fn observe(&mut self, line: &str, now: Instant) -> Option<f32> {
        let next = advance_progress(self.best, line);
        if next > self.best {
            self.best = next;
            self.last_advance = now;
        }
        self.due(now)
    }

    /// Advance the clock without output; adds synthetic progress after a stall
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        if now.duration_since(self.last_advance) >= self.stall && self.best < self.synthetic_cap {
            self.best = (self.best + self.synthetic_step).min(self.synthetic_cap);
            self.last_advance = now;
        }
        self.due(now)
    }

    fn due(&mut self, now: Instant) -> Option<f32> {
        if self.best <= self.reported || now.duration_since(self.last_emit) < self.emit_interval {
            return None;
        }
        self.last_emit = now;
        self.reported = self.best;
        Some(self.best)
    }

    /// Best progress seen so far
    pub const fn best(&self) -> f32 {
        self.best
    }

    /// Last value handed out for reporting
    pub const fn reported(&self) -> f32 {
        self.reported
    }
}

/// Service that downloads models through the pull command
#[derive(Clone)]
pub struct ModelPuller {
    process: Arc<dyn PullProcessPort>,
    registry: ModelRegistryClient,
    config: PullConfig,
}

impl fmt::Debug for ModelPuller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPuller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModelPuller {
    /// Create a new puller
    pub fn new(
        process: Arc<dyn PullProcessPort>,
        registry: ModelRegistryClient,
        config: PullConfig,
    ) -> Self {
        Self {
            process,
            registry,
            config,
        }
    }

    /// Download `model`, reporting progress through `on_progress`.
    ///
    /// Every reported fraction is at least the previous one. Dropping the
    /// returned future drops the running process.
    #[instrument(skip(self, on_progress))]
    pub async fn pull<F>(&self, model: &str, mut on_progress: F) -> PullOutcome
    where
        F: FnMut(PullProgress) + Send,
    {
        let Ok(name) = ModelName::parse(model) else {
            return PullOutcome::Failed {
                message: MISSING_MODEL_NAME.to_string(),
            };
        };

        on_progress(PullProgress::started(name.as_str()));

        let mut process = match self.process.spawn(&name).await {
            Ok(process) => process,
            Err(e) => {
                warn!(error = %e, "Failed to start pull command");
                on_progress(PullProgress::failed(name.as_str(), 0.0));
                return PullOutcome::Failed {
                    message: format!("Error during model pull: {e}"),
                };
            },
        };

        let mut tracker = ProgressTracker::new(&self.config, Instant::now());
        let mut tail: VecDeque<String> = VecDeque::with_capacity(self.config.diagnostic_lines);
        let mut ticker = tokio::time::interval(self.config.emit_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                line = process.next_line() => {
                    let Some(line) = line else { break };
                    let line = line.trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(fraction) = tracker.observe(&line, Instant::now()) {
                        on_progress(PullProgress::pulling(name.as_str(), fraction));
                    }
                    if self.config.diagnostic_lines > 0 {
                        if tail.len() == self.config.diagnostic_lines {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                },
                _ = ticker.tick() => {
                    if let Some(fraction) = tracker.tick(Instant::now()) {
                        on_progress(PullProgress::pulling(name.as_str(), fraction));
                    }
                },
            }
        }

        let exit = match process.wait().await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(error = %e, "Failed to reap pull command");
                on_progress(PullProgress::failed(name.as_str(), tracker.best()));
                return PullOutcome::Failed {
                    message: format!("Error during model pull: {e}"),
                };
            },
        };

        if !exit.is_success() {
            warn!(code = ?exit.code, "Pull command failed");
            on_progress(PullProgress::failed(name.as_str(), tracker.best()));
            let diagnostics: Vec<String> = tail.into_iter().collect();
            return PullOutcome::Failed {
                message: format!("Error pulling model:\n{}", diagnostics.join("\n")),
            };
        }

        on_progress(PullProgress::complete(name.as_str()));
        info!("Pull command finished");

        self.await_visibility(&name).await
    }

    /// Poll the registry until the pulled model shows up or attempts run out
    async fn await_visibility(&self, name: &ModelName) -> PullOutcome {
        for attempt in 1..=self.config.poll_attempts {
            if self.registry.is_visible(name).await {
                debug!(attempt, "Pulled model visible in registry");
                return PullOutcome::Completed {
                    model: name.to_string(),
                };
            }
            if attempt < self.config.poll_attempts {
                tokio::time::sleep(self.config.poll_interval()).await;
            }
        }

        warn!(model = %name, "Pulled model not visible in registry yet");
        PullOutcome::CompletedNotVisible {
            model: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;
    use crate::{
        error::ApplicationError,
        ports::{MockModelRegistryPort, MockPullProcessPort, ProcessExit, PullProcess},
    };

    /// Pull process that replays lines with delays, then exits
    struct ScriptedProcess {
        lines: VecDeque<(Duration, String)>,
        deadline: Option<Instant>,
        code: i32,
    }

    #[async_trait]
    impl PullProcess for ScriptedProcess {
        async fn next_line(&mut self) -> Option<String> {
            let delay = self.lines.front()?.0;
            let deadline = *self.deadline.get_or_insert_with(|| Instant::now() + delay);
            tokio::time::sleep_until(deadline).await;
            self.deadline = None;
            self.lines.pop_front().map(|(_, line)| line)
        }

        async fn wait(&mut self) -> Result<ProcessExit, ApplicationError> {
            Ok(ProcessExit {
                code: Some(self.code),
            })
        }
    }

    fn scripted(lines: &[(u64, &str)], code: i32) -> MockPullProcessPort {
        let lines: VecDeque<(Duration, String)> = lines
            .iter()
            .map(|(ms, l)| (Duration::from_millis(*ms), (*l).to_string()))
            .collect();
        let mut port = MockPullProcessPort::new();
        port.expect_spawn().returning(move |_| {
            Ok(Box::new(ScriptedProcess {
                lines: lines.clone(),
                deadline: None,
                code,
            }))
        });
        port
    }

    fn registry_listing(models: Vec<String>) -> (ModelRegistryClient, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut port = MockModelRegistryPort::new();
        port.expect_list_models().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(models.clone())
        });
        (ModelRegistryClient::new(Arc::new(port)), calls)
    }

    fn puller(process: MockPullProcessPort, registry: ModelRegistryClient) -> ModelPuller {
        ModelPuller::new(Arc::new(process), registry, PullConfig::default())
    }

    async fn run(puller: &ModelPuller, model: &str) -> (PullOutcome, Vec<PullProgress>) {
        let mut reports = Vec::new();
        let outcome = puller.pull(model, |p| reports.push(p)).await;
        (outcome, reports)
    }

    fn assert_monotonic(reports: &[PullProgress]) {
        for pair in reports.windows(2) {
            assert!(
                pair[1].fraction >= pair[0].fraction,
                "progress regressed: {} -> {}",
                pair[0].fraction,
                pair[1].fraction
            );
        }
    }

    // ---------------------------------------------------------------------
    // Extraction
    // ---------------------------------------------------------------------

    #[test]
    fn extracts_json_progress() {
        assert_eq!(extract_progress(r#"{"status":"pulling","progress": 0.42}"#), Some(0.42));
        assert_eq!(extract_progress(r#"{"progress":1}"#), Some(1.0));
    }

    #[test]
    fn extracts_bare_percentage() {
        assert_eq!(
            extract_progress("pulling 8eeb52dfb3bb...  45% ▕███     ▏ 2.1 GB/4.7 GB"),
            Some(0.45)
        );
    }

    #[test]
    fn json_field_takes_precedence_over_percent() {
        assert_eq!(extract_progress(r#"{"progress":0.2,"note":"90%"}"#), Some(0.2));
    }

    #[test]
    fn clamps_values_above_one() {
        assert_eq!(extract_progress("150%"), Some(1.0));
        assert_eq!(extract_progress(r#"{"progress":1.5}"#), Some(1.0));
    }

    #[test]
    fn lines_without_progress() {
        assert_eq!(extract_progress("pulling manifest"), None);
        assert_eq!(extract_progress("verifying sha256 digest"), None);
        assert_eq!(extract_progress(""), None);
    }

    #[test]
    fn advance_never_decreases() {
        assert!((advance_progress(0.5, "10%") - 0.5).abs() < f32::EPSILON);
        assert!((advance_progress(0.5, "75%") - 0.75).abs() < f32::EPSILON);
        assert!((advance_progress(0.5, "writing manifest") - 0.5).abs() < f32::EPSILON);
    }

    proptest! {
        #[test]
        fn advance_is_monotonic(lines in prop::collection::vec(
            prop_oneof![
                (0u32..=120).prop_map(|p| format!("downloading {p}%")),
                (0.0f32..=1.0).prop_map(|p| format!("{{\"progress\": {p:.3}}}")),
                "[a-z ]{0,20}",
            ],
            0..50,
        )) {
            let mut best = 0.0f32;
            for line in &lines {
                let next = advance_progress(best, line);
                prop_assert!(next >= best);
                prop_assert!(next <= 1.0);
                best = next;
            }
        }
    }

    // ---------------------------------------------------------------------
    // Tracker
    // ---------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn tracker_rate_limits_reports() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(&PullConfig::default(), start);

        assert_eq!(tracker.observe("10%", start + Duration::from_millis(10)), None);
        assert_eq!(tracker.observe("20%", start + Duration::from_millis(50)), None);
        assert_eq!(
            tracker.observe("30%", start + Duration::from_millis(120)),
            Some(0.3)
        );
        assert_eq!(tracker.observe("40%", start + Duration::from_millis(150)), None);
        assert!((tracker.best() - 0.4).abs() < f32::EPSILON);
        assert_eq!(tracker.tick(start + Duration::from_millis(230)), Some(0.4));
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_synthesizes_progress_when_silent() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(&PullConfig::default(), start);

        assert_eq!(tracker.tick(start + Duration::from_millis(500)), None);
        let first = tracker.tick(start + Duration::from_millis(1000)).unwrap();
        assert!((first - 0.01).abs() < 1e-6);

        let mut now = start + Duration::from_millis(1000);
        for _ in 0..50 {
            now += Duration::from_secs(1);
            tracker.tick(now);
        }
        assert!((tracker.best() - 0.1).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_stops_synthesizing_past_cap() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(&PullConfig::default(), start);
        tracker.observe("50%", start + Duration::from_millis(200));
        tracker.tick(start + Duration::from_secs(10));
        assert!((tracker.best() - 0.5).abs() < f32::EPSILON);
    }

    // ---------------------------------------------------------------------
    // Pull
    // ---------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn successful_pull_reaches_one() {
        let process = scripted(
            &[
                (150, r#"{"progress": 0.1}"#),
                (150, r#"{"progress": 0.5}"#),
                (150, r#"{"progress": 1.0}"#),
            ],
            0,
        );
        let (registry, _) = registry_listing(vec!["phi3:latest".into()]);
        let (outcome, reports) = run(&puller(process, registry), "phi3").await;

        assert_eq!(outcome, PullOutcome::Completed { model: "phi3".into() });
        assert_monotonic(&reports);
        let last = reports.last().unwrap();
        assert!((last.fraction - 1.0).abs() < f32::EPSILON);
        assert_eq!(last.status, "Pull complete: phi3");
        assert!(reports.iter().any(|p| (p.fraction - 0.5).abs() < f32::EPSILON));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pull_quotes_output() {
        let process = scripted(
            &[
                (10, "pulling manifest"),
                (10, "Error: pull model manifest: file does not exist"),
            ],
            1,
        );
        let (registry, calls) = registry_listing(vec![]);
        let (outcome, reports) = run(&puller(process, registry), "nope").await;

        let message = match outcome {
            PullOutcome::Failed { message } => message,
            other => panic!("expected failure, got {other:?}"),
        };
        assert!(message.starts_with("Error pulling model:\n"));
        assert!(message.contains("file does not exist"));
        assert_eq!(reports.last().unwrap().status, "Pull failed for nope");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn diagnostics_keep_only_the_tail() {
        let lines: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        let script: Vec<(u64, &str)> = lines.iter().map(|l| (1, l.as_str())).collect();
        let process = scripted(&script, 2);
        let (registry, _) = registry_listing(vec![]);
        let (outcome, _) = run(&puller(process, registry), "phi3").await;

        let message = outcome.message();
        assert!(!message.contains("line 9\n"));
        assert!(message.contains("line 10"));
        assert!(message.ends_with("line 29"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_reached_progress() {
        let process = scripted(&[(200, "60%"), (10, "connection lost")], 1);
        let (registry, _) = registry_listing(vec![]);
        let (_, reports) = run(&puller(process, registry), "phi3").await;

        assert_monotonic(&reports);
        assert!((reports.last().unwrap().fraction - 0.6).abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn invisible_model_is_caveated_success() {
        let process = scripted(&[(10, "100%")], 0);
        let (registry, calls) = registry_listing(vec!["other".into()]);
        let (outcome, _) = run(&puller(process, registry), "phi3").await;

        assert_eq!(outcome, PullOutcome::CompletedNotVisible { model: "phi3".into() });
        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_download_still_moves() {
        let process = scripted(&[(5_000, "done")], 0);
        let (registry, _) = registry_listing(vec!["phi3".into()]);
        let (_, reports) = run(&puller(process, registry), "phi3").await;

        assert_monotonic(&reports);
        assert!(
            reports
                .iter()
                .any(|p| p.fraction > 0.0 && p.fraction <= 0.1 && p.status.starts_with("Pulling"))
        );
    }

    #[tokio::test]
    async fn blank_name_fails_without_spawning() {
        let mut process = MockPullProcessPort::new();
        process.expect_spawn().never();
        let (registry, _) = registry_listing(vec![]);
        let (outcome, reports) = run(&puller(process, registry), "   ").await;

        assert_eq!(
            outcome,
            PullOutcome::Failed {
                message: "Error: Please specify a model name.".into()
            }
        );
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let mut process = MockPullProcessPort::new();
        process
            .expect_spawn()
            .returning(|_| Err(ApplicationError::Process("ollama: not found".into())));
        let (registry, _) = registry_listing(vec![]);
        let (outcome, _) = run(&puller(process, registry), "phi3").await;

        assert!(!outcome.is_success());
        assert!(outcome.message().contains("not found"));
    }
}
