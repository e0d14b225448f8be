use std::fmt;

/// Files requested from the model in a single implementation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileGroup {
    /// No files were planned, so the model is asked for the core files.
    Core,
    /// A slice of the planned file list, in plan order.
    Planned(Vec<String>),
}

/// One step of a pipeline run. Each executed stage owns exactly one prompt
/// and one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptStage {
    Planning,
    Implementation(FileGroup),
    Followup,
    Finalization,
}

impl PromptStage {
    /// Short lowercase label used in progress messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            PromptStage::Planning => "planning",
            PromptStage::Implementation(FileGroup::Core) => "core implementation",
            PromptStage::Implementation(FileGroup::Planned(_)) => "implementation",
            PromptStage::Followup => "follow-up",
            PromptStage::Finalization => "finalization",
        }
    }
}

impl fmt::Display for PromptStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PromptStage::Implementation(FileGroup::Planned(files)) => {
                write!(f, "implementation [{}]", files.join(", "))
            }
            other => write!(f, "{}", other.label()),
        }
    }
}
