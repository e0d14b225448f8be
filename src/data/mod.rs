mod event;
mod extraction;
mod project;
mod settings;
mod stage;

pub use event::{EventKind, EventSink, ProgressEvent};
pub use extraction::{ExtractedFile, PlanNote};
pub use project::{resolve_path, ProjectContext, ProjectMode, Requirement, EXISTING_FILE_PREVIEW};
pub use settings::{
    InferenceSettings, DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_NUM_PREDICT, DEFAULT_TIMEOUT_SECS,
};
pub use stage::{FileGroup, PromptStage};
