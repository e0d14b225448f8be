use crate::contexts::context_pipeline::{group_files, ContextPipeline, StageObserver, StageResponse, GROUP_SIZE};
use crate::contexts::file_materializer::{FileMaterializer, WriteStatus};
use crate::contexts::inference_client::{shared_settings, InferenceClient, OllamaClient, SharedSettings};
use crate::contexts::project_scanner::{FsProjectScanner, ProjectScanner};
use crate::contexts::prompt_builder::build_base_prompt;
use crate::contexts::response_extractor::{PatternExtractor, ResponseExtractor};
use crate::data::{EventSink, InferenceSettings, ProgressEvent, ProjectContext, ProjectMode, PromptStage, Requirement};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

/// Inputs that must be present before a run may start
#[derive(Debug, Error)]
#[error("missing required input: {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<&'static str>,
}

/// Errors that abort a run after validation
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to create project directory {}: {source}", path.display())]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to scan existing project: {0:#}")]
    Scan(anyhow::Error),
}

/// Reasons a run could not be started at all
#[derive(Debug, Error)]
pub enum StartError {
    #[error("a generation run is already in progress")]
    AlreadyRunning,
    #[error("failed to spawn generation thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Everything a caller supplies for one generation run
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub root: PathBuf,
    pub requirement: Requirement,
    pub mode: ProjectMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

/// Counters reported once a run ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub stages: usize,
    pub degraded_stages: usize,
    pub files_written: usize,
    pub write_failures: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    fn failed(started: Instant) -> Self {
        Self {
            status: RunStatus::Failed,
            stages: 0,
            degraded_stages: 0,
            files_written: 0,
            write_failures: 0,
            elapsed: started.elapsed(),
        }
    }
}

/// Releases the single-run flag when a run ends, including by panic.
struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Drives a generation run end to end and reports progress as events.
///
/// At most one run is in flight per orchestrator. Every failure after a run
/// has been accepted is turned into an event; nothing propagates to the
/// caller.
pub struct Orchestrator {
    settings: SharedSettings,
    client: Arc<dyn InferenceClient>,
    extractor: Arc<dyn ResponseExtractor>,
    scanner: Arc<dyn ProjectScanner>,
    materializer: FileMaterializer,
    events: Arc<dyn EventSink>,
    running: Arc<AtomicBool>,
    cancel_requested: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Creates an orchestrator talking to an Ollama-compatible endpoint.
    pub fn new(settings: InferenceSettings, events: impl EventSink + 'static) -> Self {
        let settings = shared_settings(settings);
        Self {
            client: Arc::new(OllamaClient::new(settings.clone())),
            settings,
            extractor: Arc::new(PatternExtractor),
            scanner: Arc::new(FsProjectScanner),
            materializer: FileMaterializer::default(),
            events: Arc::new(events),
            running: Arc::new(AtomicBool::new(false)),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.client = client;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ResponseExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn ProjectScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_materializer(mut self, materializer: FileMaterializer) -> Self {
        self.materializer = materializer;
        self
    }

    /// Settings the next inference call will use.
    pub fn settings(&self) -> InferenceSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replaces the endpoint and model. A call already in flight keeps the
    /// settings it started with.
    pub fn update_settings(&self, api_url: impl Into<String>, model: impl Into<String>) {
        let (api_url, model) = (api_url.into(), model.into());
        {
            let mut settings = self
                .settings
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            settings.api_url = api_url.clone();
            settings.model = model.clone();
        }
        info!(api_url = %api_url, model = %model, "inference settings updated");
        self.emit(ProgressEvent::status(format!(
            "Updated inference settings - API: {}, model: {}",
            api_url, model
        )));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Asks the current run to stop before its next stage.
    pub fn cancel(&self) {
        if self.is_running() {
            self.cancel_requested.store(true, Ordering::SeqCst);
            self.emit(ProgressEvent::status(
                "Cancellation requested; stopping after the current stage",
            ));
        }
    }

    /// Runs generation on the calling thread.
    pub fn generate(&self, request: GenerationRequest) -> Result<RunSummary, StartError> {
        let _guard = self.claim()?;
        Ok(self.run(request))
    }

    /// Runs generation on a background thread.
    ///
    /// The run slot is claimed before the thread starts, so a second call
    /// while a run is in flight is rejected immediately.
    pub fn start(self: &Arc<Self>, request: GenerationRequest) -> Result<JoinHandle<RunSummary>, StartError> {
        let guard = self.claim()?;
        let orchestrator = Arc::clone(self);

        let handle = thread::Builder::new()
            .name("generation".to_string())
            .spawn(move || {
                let _guard = guard;
                orchestrator.run(request)
            })?;

        Ok(handle)
    }

    fn claim(&self) -> Result<RunGuard, StartError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| StartError::AlreadyRunning)?;
        self.cancel_requested.store(false, Ordering::SeqCst);
        Ok(RunGuard {
            running: Arc::clone(&self.running),
        })
    }

    fn emit(&self, event: ProgressEvent) {
        self.events.emit(event);
    }

    fn run(&self, request: GenerationRequest) -> RunSummary {
        let started = Instant::now();

        match self.execute(&request, started) {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "generation run failed");
                self.emit(ProgressEvent::error(format!("Error: {}", e)));
                RunSummary::failed(started)
            }
        }
    }

    fn execute(&self, request: &GenerationRequest, started: Instant) -> Result<RunSummary, OrchestratorError> {
        // Step 1: Validate inputs; nothing is touched when this fails
        validate(request)?;
        self.emit(ProgressEvent::status("Starting to process the project requirement..."));

        // Step 2: Build the project context
        let context = self.prepare_context(request)?;

        // Step 3: Render the base prompt shared by every stage
        let base_prompt = build_base_prompt(&request.requirement, &context);

        self.emit(ProgressEvent::status(format!(
            "Generating code with model {}...",
            self.settings().model
        )));
        self.emit(ProgressEvent::plan("Analyze the requirement and plan the project structure"));

        // Step 4: Run the stages, materializing each response as it arrives
        let mut reporter = StageReporter {
            orchestrator: self,
            root: context.root(),
            files_written: 0,
            write_failures: 0,
        };
        let run = ContextPipeline::new(self.client.as_ref(), self.extractor.as_ref(), context.root())
            .with_cancellation(Arc::clone(&self.cancel_requested))
            .run(&base_prompt, &mut reporter);
        let (files_written, write_failures) = (reporter.files_written, reporter.write_failures);

        // Step 5: Report the outcome
        let degraded_stages = run.failures().count();
        if let Some(first) = run.failures().next() {
            let detail = first
                .failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            self.emit(ProgressEvent::error(format!(
                "{} of {} stage(s) got no usable response from the model; first failure: {}",
                degraded_stages,
                run.stages.len(),
                detail
            )));
        }

        let status = if run.cancelled {
            self.emit(ProgressEvent::status(format!(
                "Generation cancelled after {} stage(s)",
                run.stages.len()
            )));
            RunStatus::Cancelled
        } else {
            self.emit(ProgressEvent::status("Project generation complete!"));
            self.emit(ProgressEvent::plan("All tasks completed"));
            RunStatus::Completed
        };

        info!(
            stages = run.stages.len(),
            degraded_stages, files_written, write_failures, "generation run finished"
        );

        Ok(RunSummary {
            status,
            stages: run.stages.len(),
            degraded_stages,
            files_written,
            write_failures,
            elapsed: started.elapsed(),
        })
    }

    fn prepare_context(&self, request: &GenerationRequest) -> Result<ProjectContext, OrchestratorError> {
        match request.mode {
            ProjectMode::NewProject => {
                self.emit(ProgressEvent::status("Creating new project..."));
                // A dry run leaves the disk untouched, the root included
                if !self.materializer.is_dry_run() {
                    fs::create_dir_all(&request.root).map_err(|source| OrchestratorError::CreateRoot {
                        path: request.root.clone(),
                        source,
                    })?;
                }
                Ok(ProjectContext::new_project(&request.root))
            }
            ProjectMode::ExistingProject => {
                self.emit(ProgressEvent::status("Analyzing existing project..."));
                let files = self
                    .scanner
                    .scan(&request.root)
                    .map_err(OrchestratorError::Scan)?;
                let context = ProjectContext::existing_project(&request.root, files);
                self.emit(ProgressEvent::status(format!("Found {} files", context.total_files())));
                Ok(context)
            }
        }
    }
}

/// Lists every missing input at once.
pub fn validate(request: &GenerationRequest) -> Result<(), ValidationError> {
    let mut missing = Vec::new();
    if request.root.as_os_str().is_empty() {
        missing.push("project root path");
    }
    if request.requirement.is_blank() {
        missing.push("requirement");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { missing })
    }
}

/// Applies each stage's output as soon as the stage finishes and turns it
/// into progress events.
struct StageReporter<'a> {
    orchestrator: &'a Orchestrator,
    root: &'a Path,
    files_written: usize,
    write_failures: usize,
}

impl StageReporter<'_> {
    fn emit(&self, event: ProgressEvent) {
        self.orchestrator.emit(event);
    }
}

impl StageObserver for StageReporter<'_> {
    fn stage_started(&mut self, index: usize, total: Option<usize>, stage: &PromptStage) {
        let position = match total {
            Some(total) => format!("{}/{}", index, total),
            None => index.to_string(),
        };
        self.emit(ProgressEvent::status(format!("Running {} stage ({})...", stage, position)));
    }

    fn files_planned(&mut self, planned: &[String]) {
        if planned.is_empty() {
            self.emit(ProgressEvent::status(
                "No planned files found; generating core files, then remaining files",
            ));
        } else {
            self.emit(ProgressEvent::status(format!(
                "Planned {} file(s) in {} group(s)",
                planned.len(),
                group_files(planned, GROUP_SIZE).len()
            )));
        }
    }

    fn stage_finished(&mut self, index: usize, total: Option<usize>, response: &StageResponse) {
        if let Some(failure) = &response.failure {
            self.emit(ProgressEvent::status(format!(
                "The {} stage failed: {}; continuing",
                response.stage.label(),
                failure
            )));
        }

        let position = match total {
            Some(total) => format!("{}/{}", index, total),
            None => index.to_string(),
        };
        self.emit(ProgressEvent::status(format!("Processing AI response ({})...", position)));

        let orchestrator = self.orchestrator;
        let files = orchestrator.extractor.file_blocks(&response.response);

        for outcome in orchestrator.materializer.apply_all(&files, self.root) {
            match outcome {
                Ok(outcome) => {
                    let message = match outcome.status {
                        WriteStatus::Created | WriteStatus::Overwritten => {
                            self.files_written += 1;
                            format!("Saved file: {}", outcome.relative)
                        }
                        WriteStatus::Unchanged => format!("File unchanged: {}", outcome.relative),
                        WriteStatus::Skipped => format!("Would save file: {}", outcome.relative),
                    };
                    self.emit(ProgressEvent::file(message));
                }
                Err(e) => {
                    self.write_failures += 1;
                    self.emit(ProgressEvent::error(e.to_string()));
                }
            }
        }

        for note in orchestrator.extractor.plan_notes(&response.response) {
            self.emit(ProgressEvent::plan(note.text));
        }

        if files.is_empty() {
            self.emit(ProgressEvent::status("No files found in this response"));
        }
    }
}
