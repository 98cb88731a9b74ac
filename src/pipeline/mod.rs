//! End-to-end orchestration: media normalization, request assembly, the
//! generation round-trip with a watchdog, validation, record assembly, and
//! persistence. Progress is reported as discrete state transitions; every
//! failure is translated into a displayable message at this boundary.

mod records;

pub use records::{assemble_bulletin, assemble_study_plan, filter_new_events};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use crate::ai::{
    assemble_bulletin_parts, assemble_location_parts, assemble_study_parts, bulletin_schema,
    location_schema, parse_bulletin, parse_locations, parse_study_plan, study_plan_schema,
    GeminiClient, Part,
};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::media::optimize_images;
use crate::models::{Bulletin, GenerationInput, LocationCandidate, MediaBlob, StudyPlan};
use crate::session::UserSession;

/// Discrete processing states, reported to observers in order. `Failed` is
/// terminal; the typed error travels on the return path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    Optimizing,
    Analyzing,
    Researching,
    Finalizing,
    Failed,
}

impl ProcessingState {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingState::Idle => "Done",
            ProcessingState::Optimizing => "Optimizing photos",
            ProcessingState::Analyzing => "Analyzing content",
            ProcessingState::Researching => "Gathering references",
            ProcessingState::Finalizing => "Finalizing",
            ProcessingState::Failed => "Failed",
        }
    }
}

/// One observer notification. The percentage is cosmetic and never used
/// for control flow.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub state: ProcessingState,
    pub percent: u8,
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressUpdate>;

/// What a failure looks like to the person holding the phone. The raw
/// error stays attached for programmatic checks and logging, but only
/// `message` and `detail` are meant for display.
#[derive(Debug)]
pub struct UserFacingError {
    pub message: String,
    pub detail: String,
    pub error: AppError,
}

impl fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.detail)
    }
}

impl From<AppError> for UserFacingError {
    fn from(error: AppError) -> Self {
        let (message, detail) = match &error {
            AppError::EmptyInput => (
                "Nothing to work with",
                "Add a recording, a photo, or some notes before generating.".to_string(),
            ),
            AppError::GenerationUnavailable => (
                "AI features are not set up",
                "Add your Gemini API key to the config file and try again.".to_string(),
            ),
            AppError::GenerationEmptyResponse => (
                "The assistant came back empty-handed",
                "No content was generated. Please try again.".to_string(),
            ),
            AppError::MalformedResponse { .. } => {
                // The offending snippet goes to the log, not the screen.
                tracing::warn!("Malformed generation response: {}", error);
                (
                    "The answer couldn't be read",
                    "The response was not in the expected format. Please try again.".to_string(),
                )
            }
            AppError::IncompleteGeneration => (
                "The result came back empty",
                "The generated plan had no content. Please try again.".to_string(),
            ),
            AppError::ProcessingTimeout(secs) => (
                "This is taking too long",
                format!(
                    "Processing did not finish within {} seconds. It's safe to try again.",
                    secs
                ),
            ),
            AppError::AlreadyProcessing => (
                "Still working",
                "Wait for the current request to finish before starting another.".to_string(),
            ),
            AppError::GenerationApi(_) | AppError::Http(_) => (
                "Couldn't reach the generation service",
                "Check your connection and try again.".to_string(),
            ),
            _ => ("Something went wrong", error.to_string()),
        };

        Self {
            message: message.to_string(),
            detail,
            error,
        }
    }
}

/// Anything that can play the generative model's role. The production
/// implementation is [`GeminiClient`]; tests substitute canned transports.
pub trait Generator: Send + Sync + 'static {
    fn generate(
        &self,
        parts: Vec<Part>,
        schema: Value,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

impl Generator for GeminiClient {
    async fn generate(&self, parts: Vec<Part>, schema: Value) -> Result<String> {
        GeminiClient::generate(self, parts, schema).await
    }
}

/// The processing state machine. One request at a time per instance; a
/// watchdog bounds every generation round-trip.
pub struct Pipeline<G = GeminiClient> {
    generator: Option<Arc<G>>,
    repository: Repository,
    timeout: Duration,
    is_processing: AtomicBool,
    /// Bumped on every run start and on every timeout. A detached
    /// generation task compares its captured epoch before delivering, so a
    /// late success after a timeout is explicitly dropped.
    epoch: Arc<AtomicU64>,
}

impl Pipeline<GeminiClient> {
    pub fn new(config: &Config, repository: Repository) -> Self {
        let generator = config
            .gemini_api_key
            .as_ref()
            .map(|key| Arc::new(GeminiClient::new(key.clone(), config.gemini_model.clone())));

        Self::with_generator(
            generator,
            repository,
            Duration::from_secs(config.processing_timeout_secs),
        )
    }
}

impl<G: Generator> Pipeline<G> {
    pub fn with_generator(
        generator: Option<Arc<G>>,
        repository: Repository,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            repository,
            timeout,
            is_processing: AtomicBool::new(false),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::SeqCst)
    }

    /// Generate a multi-day study plan from whatever the user captured.
    pub async fn generate_study_plan(
        &self,
        session: &UserSession,
        input: GenerationInput,
        progress: &ProgressSender,
    ) -> std::result::Result<StudyPlan, UserFacingError> {
        let _guard = self.begin()?;
        match self.try_generate_study_plan(session, input, progress).await {
            Ok(plan) => {
                report(progress, ProcessingState::Idle, 100);
                Ok(plan)
            }
            Err(e) => {
                report(progress, ProcessingState::Failed, 100);
                Err(e.into())
            }
        }
    }

    /// Scan photographed bulletin pages into a bulletin record plus any
    /// events not already in the user's history.
    pub async fn scan_bulletin(
        &self,
        session: &UserSession,
        images: Vec<MediaBlob>,
        progress: &ProgressSender,
    ) -> std::result::Result<Bulletin, UserFacingError> {
        let _guard = self.begin()?;
        match self.try_scan_bulletin(session, images, progress).await {
            Ok(bulletin) => {
                report(progress, ProcessingState::Idle, 100);
                Ok(bulletin)
            }
            Err(e) => {
                report(progress, ProcessingState::Failed, 100);
                Err(e.into())
            }
        }
    }

    /// Search for churches matching a freeform query. Results are handed
    /// back, never persisted.
    pub async fn search_locations(
        &self,
        query: &str,
        progress: &ProgressSender,
    ) -> std::result::Result<Vec<LocationCandidate>, UserFacingError> {
        let _guard = self.begin()?;
        match self.try_search_locations(query, progress).await {
            Ok(candidates) => {
                report(progress, ProcessingState::Idle, 100);
                Ok(candidates)
            }
            Err(e) => {
                report(progress, ProcessingState::Failed, 100);
                Err(e.into())
            }
        }
    }

    async fn try_generate_study_plan(
        &self,
        session: &UserSession,
        mut input: GenerationInput,
        progress: &ProgressSender,
    ) -> Result<StudyPlan> {
        if !input.images.is_empty() {
            report(progress, ProcessingState::Optimizing, 10);
            input.images = optimize_images(input.images).await;
        }

        let parts = assemble_study_parts(&input, &session.settings)?;
        let schema = study_plan_schema(
            session.settings.duration.day_count(),
            session.settings.capped_refs(),
        );

        report(progress, ProcessingState::Analyzing, 40);
        let raw = self.call_generator(parts, schema).await?;
        report(progress, ProcessingState::Researching, 65);

        let parsed = parse_study_plan(&raw, session.settings.duration.day_count())?;

        report(progress, ProcessingState::Finalizing, 85);
        let plan = assemble_study_plan(parsed, session, input.audio_duration_secs);
        self.repository.save_plan(plan.clone()).await?;

        tracing::info!("Saved study plan '{}' ({} days)", plan.title, plan.days.len());
        Ok(plan)
    }

    async fn try_scan_bulletin(
        &self,
        session: &UserSession,
        images: Vec<MediaBlob>,
        progress: &ProgressSender,
    ) -> Result<Bulletin> {
        report(progress, ProcessingState::Optimizing, 10);
        let images = optimize_images(images).await;

        let parts = assemble_bulletin_parts(&images)?;

        report(progress, ProcessingState::Analyzing, 40);
        let raw = self.call_generator(parts, bulletin_schema()).await?;
        report(progress, ProcessingState::Researching, 65);

        let parsed = parse_bulletin(&raw)?;

        report(progress, ProcessingState::Finalizing, 85);
        let mut bulletin = assemble_bulletin(parsed, session);

        let prior = self.repository.list_events(&session.user_id).await?;
        let before = bulletin.events.len();
        bulletin.events = filter_new_events(bulletin.events, &prior);
        if before > bulletin.events.len() {
            tracing::info!(
                "Dropped {} duplicate event(s) from bulletin scan",
                before - bulletin.events.len()
            );
        }

        self.repository.save_bulletin(bulletin.clone()).await?;
        Ok(bulletin)
    }

    async fn try_search_locations(
        &self,
        query: &str,
        progress: &ProgressSender,
    ) -> Result<Vec<LocationCandidate>> {
        let parts = assemble_location_parts(query)?;

        report(progress, ProcessingState::Researching, 50);
        let raw = self.call_generator(parts, location_schema()).await?;

        parse_locations(&raw)
    }

    /// Run one generation round-trip under the watchdog. Losing the race
    /// detaches the in-flight call instead of aborting it; the task checks
    /// the epoch on completion and drops a stale result on the floor.
    async fn call_generator(&self, parts: Vec<Part>, schema: Value) -> Result<String> {
        let generator = self
            .generator
            .clone()
            .ok_or(AppError::GenerationUnavailable)?;

        let my_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = Arc::clone(&self.epoch);
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = generator.generate(parts, schema).await;
            if epoch.load(Ordering::SeqCst) != my_epoch {
                tracing::info!("Discarding late generation result from a timed-out run");
                return;
            }
            let _ = tx.send(result);
        });

        tokio::select! {
            delivered = rx => match delivered {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("generation task ended without a result").into()),
            },
            _ = sleep(self.timeout) => {
                // Invalidate the in-flight run so its eventual completion
                // is a no-op rather than a silent double-submission.
                self.epoch.fetch_add(1, Ordering::SeqCst);
                Err(AppError::ProcessingTimeout(self.timeout.as_secs()))
            }
        }
    }

    fn begin(&self) -> std::result::Result<ProcessingGuard<'_>, UserFacingError> {
        if self
            .is_processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::AlreadyProcessing.into());
        }
        Ok(ProcessingGuard(&self.is_processing))
    }
}

/// Clears the in-flight flag on every exit path, error or not.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn report(progress: &ProgressSender, state: ProcessingState, percent: u8) {
    // The observer may be gone; progress is cosmetic either way.
    let _ = progress.send(ProgressUpdate { state, percent });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationSettings, StudyDuration, StudyLength};
    use serde_json::json;
    use tempfile::tempdir;

    struct StubGenerator {
        response: String,
        delay: Duration,
    }

    impl StubGenerator {
        fn immediate(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                delay: Duration::ZERO,
            }
        }
    }

    impl Generator for StubGenerator {
        async fn generate(&self, _parts: Vec<Part>, _schema: Value) -> Result<String> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            Ok(self.response.clone())
        }
    }

    fn plan_json(day_count: u32) -> String {
        let days: Vec<Value> = (1..=day_count)
            .map(|d| {
                json!({
                    "day": d,
                    "topic": format!("Topic {}", d),
                    "scripture": "John 3:16",
                    "supportingRefs": ["Rom 8:28", "Ps 23:1"],
                    "body": "…",
                    "reflection": "…",
                    "prayer": "…"
                })
            })
            .collect();
        json!({"title": "Walking in Grace", "speaker": "Pastor Kim", "days": days}).to_string()
    }

    fn bulletin_json() -> String {
        json!({
            "title": "This Week at Grace Chapel",
            "summary": "Announcements and upcoming events.",
            "events": [
                {"title": "Fall Picnic", "date": "2024-10-05", "time": "12:00 PM",
                 "location": "Miller Park", "description": "Bring a side dish"},
                {"title": "Choir Practice", "date": "2024-10-08", "time": "7:00 PM",
                 "location": "Sanctuary", "description": ""}
            ]
        })
        .to_string()
    }

    fn session() -> UserSession {
        UserSession::new(
            "u1",
            GenerationSettings {
                duration: StudyDuration::FiveDays,
                length: StudyLength::Medium,
                supporting_refs: 2,
                home_location: None,
            },
        )
    }

    async fn pipeline_with(
        stub: StubGenerator,
        timeout: Duration,
    ) -> (Pipeline<StubGenerator>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        let pipeline = Pipeline::with_generator(Some(Arc::new(stub)), repo, timeout);
        (pipeline, dir)
    }

    fn progress_channel() -> (ProgressSender, mpsc::UnboundedReceiver<ProgressUpdate>) {
        mpsc::unbounded_channel()
    }

    fn drain_states(rx: &mut mpsc::UnboundedReceiver<ProgressUpdate>) -> Vec<ProcessingState> {
        let mut states = Vec::new();
        while let Ok(update) = rx.try_recv() {
            states.push(update.state);
        }
        states
    }

    #[tokio::test]
    async fn text_only_study_plan_end_to_end() {
        let (pipeline, _dir) =
            pipeline_with(StubGenerator::immediate(plan_json(5)), Duration::from_secs(5))
                .await;
        let (tx, mut rx) = progress_channel();

        let plan = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("sermon notes"), &tx)
            .await
            .unwrap();

        assert_eq!(plan.days.len(), 5);
        assert!(plan.days.iter().all(|d| d.supporting_refs.len() == 2));
        assert!(plan.days.iter().all(|d| !d.is_completed));

        // Text-only input skips the media optimization state.
        let states = drain_states(&mut rx);
        assert!(!states.contains(&ProcessingState::Optimizing));
        assert!(states.contains(&ProcessingState::Analyzing));
        assert_eq!(*states.last().unwrap(), ProcessingState::Idle);

        let stored = pipeline.repository().list_plans("u1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].days.len(), 5);
    }

    #[tokio::test]
    async fn empty_input_fails_before_any_generation() {
        let (pipeline, _dir) =
            pipeline_with(StubGenerator::immediate("unreachable"), Duration::from_secs(5)).await;
        let (tx, _rx) = progress_channel();

        let err = pipeline
            .generate_study_plan(&session(), GenerationInput::default(), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err.error, AppError::EmptyInput));
        assert!(!pipeline.is_processing());
    }

    #[tokio::test]
    async fn missing_api_key_is_unavailable_not_a_crash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        let pipeline: Pipeline<StubGenerator> =
            Pipeline::with_generator(None, repo, Duration::from_secs(5));
        let (tx, _rx) = progress_channel();

        let err = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("notes"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::GenerationUnavailable));
    }

    #[tokio::test]
    async fn duplicate_bulletin_events_are_dropped_on_second_scan() {
        let (pipeline, _dir) =
            pipeline_with(StubGenerator::immediate(bulletin_json()), Duration::from_secs(5)).await;
        let (tx, _rx) = progress_channel();
        let image = || vec![MediaBlob::new(vec![0xff, 0xd8], "image/jpeg")];

        let first = pipeline
            .scan_bulletin(&session(), image(), &tx)
            .await
            .unwrap();
        assert_eq!(first.events.len(), 2);

        let second = pipeline
            .scan_bulletin(&session(), image(), &tx)
            .await
            .unwrap();
        assert!(second.events.is_empty());

        let all = pipeline.repository().list_events("u1").await.unwrap();
        let picnics = all.iter().filter(|e| e.title == "Fall Picnic").count();
        assert_eq!(picnics, 1);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_surfaces_and_late_success_is_never_persisted() {
        let stub = StubGenerator {
            response: plan_json(5),
            delay: Duration::from_secs(10),
        };
        let (pipeline, _dir) = pipeline_with(stub, Duration::from_secs(2)).await;
        let (tx, _rx) = progress_channel();

        let err = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("notes"), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err.error, AppError::ProcessingTimeout(2)));
        // Control is back with the caller before the stub ever resolves.
        assert!(!pipeline.is_processing());

        // Let the detached generation finish; its result must be dropped.
        sleep(Duration::from_secs(15)).await;
        let stored = pipeline.repository().list_plans("u1").await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_are_rejected() {
        let stub = StubGenerator {
            response: plan_json(5),
            delay: Duration::from_secs(5),
        };
        let (pipeline, _dir) = pipeline_with(stub, Duration::from_secs(60)).await;
        let pipeline = Arc::new(pipeline);
        let (tx, _rx) = progress_channel();

        let first = Arc::clone(&pipeline);
        let first_tx = tx.clone();
        let handle = tokio::spawn(async move {
            first
                .generate_study_plan(&session(), GenerationInput::from_text("notes"), &first_tx)
                .await
        });

        // Let the first run claim the in-flight flag.
        sleep(Duration::from_millis(10)).await;
        assert!(pipeline.is_processing());

        let err = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("more notes"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::AlreadyProcessing));

        // The original run is unaffected by the rejected one.
        let plan = handle.await.unwrap().unwrap();
        assert_eq!(plan.days.len(), 5);
    }

    #[tokio::test]
    async fn semantically_empty_plan_fails_and_persists_nothing() {
        let raw = json!({"title": "Hollow", "days": []}).to_string();
        let (pipeline, _dir) =
            pipeline_with(StubGenerator::immediate(raw), Duration::from_secs(5)).await;
        let (tx, mut rx) = progress_channel();

        let err = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("notes"), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err.error, AppError::IncompleteGeneration));
        assert_eq!(*drain_states(&mut rx).last().unwrap(), ProcessingState::Failed);
        assert!(pipeline.repository().list_plans("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_changed_day_count_fails_and_persists_nothing() {
        // Three days delivered against a five-day request.
        let (pipeline, _dir) =
            pipeline_with(StubGenerator::immediate(plan_json(3)), Duration::from_secs(5)).await;
        let (tx, _rx) = progress_channel();

        let err = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("notes"), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err.error, AppError::IncompleteGeneration));
        assert!(pipeline.repository().list_plans("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_response_keeps_snippet_out_of_the_display_pair() {
        let (pipeline, _dir) = pipeline_with(
            StubGenerator::immediate("sorry, I cannot do that"),
            Duration::from_secs(5),
        )
        .await;
        let (tx, _rx) = progress_channel();

        let err = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("notes"), &tx)
            .await
            .unwrap_err();

        assert!(matches!(err.error, AppError::MalformedResponse { .. }));
        assert!(!err.detail.contains("sorry, I cannot do that"));
    }

    #[tokio::test]
    async fn fenced_output_is_accepted() {
        let fenced = format!("```json\n{}\n```", plan_json(5));
        let (pipeline, _dir) =
            pipeline_with(StubGenerator::immediate(fenced), Duration::from_secs(5)).await;
        let (tx, _rx) = progress_channel();

        let plan = pipeline
            .generate_study_plan(&session(), GenerationInput::from_text("notes"), &tx)
            .await
            .unwrap();
        assert_eq!(plan.title, "Walking in Grace");
    }

    #[tokio::test]
    async fn location_search_filters_bad_entries() {
        let raw = json!([
            {"name": "First Baptist", "address": "1 Main St", "latitude": 30.1, "longitude": -97.5},
            {"name": "No coordinates"}
        ])
        .to_string();
        let (pipeline, _dir) =
            pipeline_with(StubGenerator::immediate(raw), Duration::from_secs(5)).await;
        let (tx, _rx) = progress_channel();

        let candidates = pipeline.search_locations("churches near Austin", &tx).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "First Baptist");
    }
}
