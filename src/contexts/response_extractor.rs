use crate::data::{ExtractedFile, PlanNote};
use regex::Regex;
use std::sync::OnceLock;

/// Recovers structure from free-form model output.
///
/// The three passes are independent: each one is best effort and an empty
/// result from one never affects the others.
pub trait ResponseExtractor: Send + Sync {
    /// Every complete `file:` block, left to right.
    fn file_blocks(&self, response: &str) -> Vec<ExtractedFile>;

    /// Paths the model intends to produce, in order of appearance.
    /// Duplicates are kept.
    fn planned_files(&self, response: &str) -> Vec<String>;

    /// "Next step" statements, for progress reporting only.
    fn plan_notes(&self, response: &str) -> Vec<PlanNote>;
}

/// Regex implementation of [`ResponseExtractor`].
///
/// File content runs to the first closing fence after the path line. A
/// literal fence inside the content therefore ends the block early; there
/// is no escaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl ResponseExtractor for PatternExtractor {
    fn file_blocks(&self, response: &str) -> Vec<ExtractedFile> {
        file_block_re()
            .captures_iter(response)
            .filter_map(|caps| {
                let path = caps.get(1)?.as_str().trim();
                if path.is_empty() {
                    return None;
                }
                let content = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                Some(ExtractedFile::new(path, content))
            })
            .collect()
    }

    fn planned_files(&self, response: &str) -> Vec<String> {
        let from_markers: Vec<String> = file_marker_re()
            .captures_iter(response)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|path| !path.is_empty())
            .collect();

        if !from_markers.is_empty() {
            return from_markers;
        }

        match structure_block(response) {
            Some(block) => filename_re()
                .find_iter(block)
                .map(|m| m.as_str().to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    fn plan_notes(&self, response: &str) -> Vec<PlanNote> {
        plan_note_re()
            .captures_iter(response)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|text| !text.is_empty())
            .map(|text| PlanNote {
                text: text.to_string(),
            })
            .collect()
    }
}

/// Finds the text block that follows a "project structure" style heading.
///
/// When a fence opens right after the heading the block is the fenced body,
/// otherwise it runs to the next blank line.
fn structure_block(response: &str) -> Option<&str> {
    let heading = structure_heading_re().find(response)?;
    let rest = response[heading.end()..]
        .trim_start_matches(|c: char| c == ':' || c == '：' || c.is_whitespace());

    if let Some(fenced) = rest.strip_prefix("```") {
        // Skip the info string of the opening fence.
        let body = match fenced.find('\n') {
            Some(idx) => &fenced[idx + 1..],
            None => "",
        };
        let end = body.find("```").unwrap_or(body.len());
        return Some(&body[..end]);
    }

    let end = blank_line_re()
        .find(rest)
        .map(|m| m.start())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn file_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```file:(.+?)\n([\s\S]*?)```").expect("valid regex"))
}

fn file_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```file:(.+?)\n").expect("valid regex"))
}

fn structure_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:project|file|directory|folder)\s+(?:structure|layout|tree)\b|项目结构|文件结构|目录结构")
            .expect("valid regex")
    })
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w\-.]+\.\w+").expect("valid regex"))
}

fn blank_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"))
}

fn plan_note_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)(?:\bnext\s+steps?(?:\s+plan)?|\bi\s+will\s+next|\bnext,?\s+i\s+will|\bthe\s+plan\s+is|\bmy\s+plan\s+is|\bplan\s+as\s+follows|下一步计划|接下来我将|计划如下|我的计划是)\s*[:：]?\s*(.+?)(?:\n[ \t]*\n|\z)",
        )
        .expect("valid regex")
    })
}
