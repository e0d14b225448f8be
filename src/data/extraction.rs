/// A file recovered from a `file:` block in model output.
///
/// `content` is exactly what stood between the path line and the closing
/// fence; nothing is trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub path: String,
    pub content: String,
}

impl ExtractedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A "next step" statement found in a response. Reported, never acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNote {
    pub text: String,
}
