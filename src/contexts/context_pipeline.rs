use crate::contexts::inference_client::{degraded_response, InferenceClient, InferenceError};
use crate::contexts::response_extractor::ResponseExtractor;
use crate::data::{resolve_path, FileGroup, PromptStage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Number of planned files requested per implementation call
pub const GROUP_SIZE: usize = 3;

const PLANNING_SUFFIX: &str =
    "First, analyze the requirement and provide the overall plan and structure design of the project.";
const IMPLEMENT_FILES_SUFFIX: &str = "Please implement the following files:";
const CORE_SUFFIX: &str = "Please start implementing the core files of the project.";
const FOLLOWUP_SUFFIX: &str = "Please continue implementing the other necessary files of the project, including configuration files, helper modules and documentation.";
const FINALIZATION_SUFFIX: &str = "Please check the project for completeness, make sure all necessary files have been created, and explain how to run and test the project.";

/// The prompt and response of one executed stage
#[derive(Debug)]
pub struct StageResponse {
    pub stage: PromptStage,
    pub prompt: String,
    /// Raw model text, or the degraded sentinel when the call failed
    pub response: String,
    pub failure: Option<InferenceError>,
}

impl StageResponse {
    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Result of a pipeline run: every executed stage, in execution order.
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub stages: Vec<StageResponse>,
    /// True when the run stopped early because cancellation was requested
    pub cancelled: bool,
}

impl PipelineRun {
    pub fn responses(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.response.as_str()).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageResponse> {
        self.stages.iter().filter(|s| s.is_degraded())
    }
}

/// Hooks called while a run progresses.
///
/// `stage_finished` runs before the next stage is rendered, so anything it
/// writes to disk is visible to later prompts. `total` is unknown until the
/// planning response has been examined.
pub trait StageObserver {
    fn stage_started(&mut self, _index: usize, _total: Option<usize>, _stage: &PromptStage) {}

    fn files_planned(&mut self, _planned: &[String]) {}

    fn stage_finished(&mut self, _index: usize, _total: Option<usize>, _response: &StageResponse) {}
}

impl StageObserver for () {}

/// Splits `files` into consecutive groups of at most `group_size`, keeping order.
pub fn group_files(files: &[String], group_size: usize) -> Vec<Vec<String>> {
    files
        .chunks(group_size.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Stages that follow planning, given the files the planning response named.
pub fn plan_stages(planned: &[String]) -> Vec<PromptStage> {
    let mut stages: Vec<PromptStage> = if planned.is_empty() {
        vec![
            PromptStage::Implementation(FileGroup::Core),
            PromptStage::Followup,
        ]
    } else {
        group_files(planned, GROUP_SIZE)
            .into_iter()
            .map(|group| PromptStage::Implementation(FileGroup::Planned(group)))
            .collect()
    };
    stages.push(PromptStage::Finalization);
    stages
}

/// Runs the planning, implementation and finalization calls in sequence.
///
/// One call is in flight at a time. The pipeline reads existing files to give
/// the model context but never writes.
pub struct ContextPipeline<'a> {
    client: &'a dyn InferenceClient,
    extractor: &'a dyn ResponseExtractor,
    root: PathBuf,
    cancelled: Option<Arc<AtomicBool>>,
}

impl<'a> ContextPipeline<'a> {
    pub fn new(
        client: &'a dyn InferenceClient,
        extractor: &'a dyn ResponseExtractor,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            extractor,
            root: root.into(),
            cancelled: None,
        }
    }

    /// Stops the run before the next stage once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    pub fn run(&self, base_prompt: &str, observer: &mut dyn StageObserver) -> PipelineRun {
        let mut run = PipelineRun::default();

        let planning = self.execute(1, None, PromptStage::Planning, base_prompt, observer);
        let planned = self.extractor.planned_files(&planning.response);
        info!(planned = planned.len(), "planning stage complete");
        observer.files_planned(&planned);
        run.stages.push(planning);

        let remaining = plan_stages(&planned);
        let total = remaining.len() + 1;

        for (offset, stage) in remaining.into_iter().enumerate() {
            if self.is_cancelled() {
                info!(completed = run.stages.len(), "pipeline cancelled between stages");
                run.cancelled = true;
                break;
            }
            let response = self.execute(offset + 2, Some(total), stage, base_prompt, observer);
            run.stages.push(response);
        }

        run
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn execute(
        &self,
        index: usize,
        total: Option<usize>,
        stage: PromptStage,
        base_prompt: &str,
        observer: &mut dyn StageObserver,
    ) -> StageResponse {
        observer.stage_started(index, total, &stage);
        let prompt = render_stage_prompt(base_prompt, &stage, &self.root);
        info!(stage = %stage, index, prompt_chars = prompt.len(), "running stage");

        let (response, failure) = match self.client.try_complete(&prompt) {
            Ok(text) => (text, None),
            Err(e) => {
                warn!(stage = %stage, error = %e, "stage degraded");
                (degraded_response(&e), Some(e))
            }
        };

        let result = StageResponse {
            stage,
            prompt,
            response,
            failure,
        };
        observer.stage_finished(index, total, &result);
        result
    }
}

/// Appends the stage-specific request to the base prompt.
///
/// Files of a planned group that already exist under `root` are inlined so the
/// model continues from their current content.
pub fn render_stage_prompt(base_prompt: &str, stage: &PromptStage, root: &Path) -> String {
    let mut prompt = format!("{}\n\n", base_prompt);

    match stage {
        PromptStage::Planning => prompt.push_str(PLANNING_SUFFIX),
        PromptStage::Implementation(FileGroup::Core) => prompt.push_str(CORE_SUFFIX),
        PromptStage::Implementation(FileGroup::Planned(files)) => {
            prompt.push_str(IMPLEMENT_FILES_SUFFIX);
            for file in files {
                prompt.push_str(&format!("\n- {}", file));
            }
            for file in files {
                let full_path = resolve_path(root, file);
                if !full_path.is_file() {
                    continue;
                }
                match fs::read_to_string(&full_path) {
                    Ok(content) => prompt.push_str(&format!(
                        "\n\nCurrent content of existing file {}:\n```\n{}\n```",
                        file, content
                    )),
                    Err(e) => prompt.push_str(&format!("\n\nCould not read file {}: {}", file, e)),
                }
            }
        }
        PromptStage::Followup => prompt.push_str(FOLLOWUP_SUFFIX),
        PromptStage::Finalization => prompt.push_str(FINALIZATION_SUFFIX),
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contexts::response_extractor::PatternExtractor;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned responses in order and records every prompt it receives.
    struct ScriptedClient {
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl InferenceClient for ScriptedClient {
        fn try_complete(&self, prompt: &str) -> Result<String, InferenceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.responses.lock().unwrap().pop().unwrap_or_default())
        }
    }

    fn names(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("f{}.py", i)).collect()
    }

    #[test]
    fn test_group_files_partition_law() {
        for n in 0..10 {
            let files = names(0..n);
            let groups = group_files(&files, GROUP_SIZE);

            assert_eq!(groups.len(), n.div_ceil(GROUP_SIZE));
            assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= GROUP_SIZE));
            assert_eq!(groups.concat(), files);
        }
    }

    #[test]
    fn test_plan_stages_with_planned_files() {
        let stages = plan_stages(&names(0..7));

        assert_eq!(stages.len(), 4);
        assert_eq!(
            stages[2],
            PromptStage::Implementation(FileGroup::Planned(vec!["f6.py".to_string()]))
        );
        assert_eq!(stages[3], PromptStage::Finalization);
    }

    #[test]
    fn test_plan_stages_without_planned_files() {
        assert_eq!(
            plan_stages(&[]),
            vec![
                PromptStage::Implementation(FileGroup::Core),
                PromptStage::Followup,
                PromptStage::Finalization,
            ]
        );
    }

    #[test]
    fn test_run_routes_to_groups() {
        let planning = "```file:a.py\n```\n```file:b.py\n```\n```file:c.py\n```\n```file:d.py\n```";
        let client = ScriptedClient::new(&[planning, "g1", "g2", "done"]);
        let dir = TempDir::new().unwrap();

        let run = ContextPipeline::new(&client, &PatternExtractor, dir.path()).run("BASE", &mut ());

        assert_eq!(run.responses(), vec![planning, "g1", "g2", "done"]);
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].starts_with("BASE\n\n"));
        assert!(prompts[0].ends_with(PLANNING_SUFFIX));
        assert!(prompts[1].contains("- a.py\n- b.py\n- c.py"));
        assert!(prompts[2].ends_with("- d.py"));
        assert!(prompts[3].ends_with(FINALIZATION_SUFFIX));
    }

    #[test]
    fn test_run_falls_back_to_two_fixed_calls() {
        let client = ScriptedClient::new(&["no files here", "core", "rest", "done"]);
        let dir = TempDir::new().unwrap();

        let run = ContextPipeline::new(&client, &PatternExtractor, dir.path()).run("BASE", &mut ());

        assert_eq!(run.stages.len(), 4);
        assert_eq!(run.stages[1].stage, PromptStage::Implementation(FileGroup::Core));
        assert_eq!(run.stages[2].stage, PromptStage::Followup);
        let prompts = client.prompts();
        assert!(prompts[1].ends_with(CORE_SUFFIX));
        assert!(prompts[2].ends_with(FOLLOWUP_SUFFIX));
    }

    #[test]
    fn test_existing_file_content_is_inlined() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "print('old')\n").unwrap();

        let prompt = render_stage_prompt(
            "BASE",
            &PromptStage::Implementation(FileGroup::Planned(vec![
                "main.py".to_string(),
                "new.py".to_string(),
            ])),
            dir.path(),
        );

        assert!(prompt.contains("Current content of existing file main.py:\n```\nprint('old')\n\n```"));
        assert!(!prompt.contains("existing file new.py"));
    }

    #[test]
    fn test_observer_sees_stage_before_next_prompt() {
        struct Recorder {
            events: Vec<String>,
        }

        impl StageObserver for Recorder {
            fn stage_started(&mut self, index: usize, total: Option<usize>, stage: &PromptStage) {
                self.events
                    .push(format!("start {} {:?} {}", index, total, stage.label()));
            }

            fn files_planned(&mut self, planned: &[String]) {
                self.events.push(format!("planned {}", planned.len()));
            }

            fn stage_finished(&mut self, index: usize, _total: Option<usize>, _response: &StageResponse) {
                self.events.push(format!("finish {}", index));
            }
        }

        let client = ScriptedClient::new(&["```file:x.py\n```", "", ""]);
        let dir = TempDir::new().unwrap();
        let mut recorder = Recorder { events: Vec::new() };

        ContextPipeline::new(&client, &PatternExtractor, dir.path()).run("BASE", &mut recorder);

        assert_eq!(
            recorder.events,
            vec![
                "start 1 None planning",
                "finish 1",
                "planned 1",
                "start 2 Some(3) implementation",
                "finish 2",
                "start 3 Some(3) finalization",
                "finish 3",
            ]
        );
    }

    #[test]
    fn test_cancellation_stops_between_stages() {
        struct CancelAfterFirst(Arc<AtomicBool>);

        impl StageObserver for CancelAfterFirst {
            fn stage_finished(&mut self, _index: usize, _total: Option<usize>, _response: &StageResponse) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let flag = Arc::new(AtomicBool::new(false));
        let client = ScriptedClient::new(&["plan", "core", "rest", "done"]);
        let dir = TempDir::new().unwrap();

        let run = ContextPipeline::new(&client, &PatternExtractor, dir.path())
            .with_cancellation(flag.clone())
            .run("BASE", &mut CancelAfterFirst(flag));

        assert!(run.cancelled);
        assert_eq!(run.stages.len(), 1);
        assert_eq!(client.prompts().len(), 1);
    }

    #[test]
    fn test_failed_stage_is_degraded_not_fatal() {
        struct Down;

        impl InferenceClient for Down {
            fn try_complete(&self, _prompt: &str) -> Result<String, InferenceError> {
                Err(InferenceError::Transport {
                    detail: "connection refused".to_string(),
                })
            }
        }

        let dir = TempDir::new().unwrap();
        let run = ContextPipeline::new(&Down, &PatternExtractor, dir.path()).run("BASE", &mut ());

        assert_eq!(run.stages.len(), 4);
        assert_eq!(run.failures().count(), 4);
        assert!(run.stages[0].response.contains("connection refused"));
    }
}
