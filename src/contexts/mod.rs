mod context_pipeline;
mod file_materializer;
mod inference_client;
mod orchestrator;
mod project_scanner;
mod prompt_builder;
mod response_extractor;

pub use context_pipeline::{
    group_files, plan_stages, render_stage_prompt, ContextPipeline, PipelineRun, StageObserver,
    StageResponse, GROUP_SIZE,
};
pub use file_materializer::{FileMaterializer, MaterializeError, WriteOutcome, WriteStatus};
pub use inference_client::{
    degraded_response, shared_settings, InferenceClient, InferenceError, OllamaClient,
    SharedSettings, FAILED_RESPONSE_PREFIX,
};
pub use orchestrator::{
    validate, GenerationRequest, Orchestrator, OrchestratorError, RunStatus, RunSummary,
    StartError, ValidationError,
};
pub use project_scanner::{FsProjectScanner, ProjectScanner};
pub use prompt_builder::build_base_prompt;
pub use response_extractor::{PatternExtractor, ResponseExtractor};
