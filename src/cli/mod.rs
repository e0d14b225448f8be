use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

mod progress;

use progress::ProgressIndicator;
use projgen::contexts::{
    FileMaterializer, GenerationRequest, Orchestrator, PatternExtractor, ResponseExtractor,
    RunStatus, WriteStatus,
};
use projgen::data::{EventKind, InferenceSettings, ProgressEvent, ProjectMode, Requirement};
use projgen::registries::{apply_env_overrides, FileSettingsRegistry, SettingsRegistry};

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
    pub json: bool,
}

/// Settings given on the command line; they win over file and environment.
#[derive(Default)]
pub struct SettingsOverrides {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves defaults, then the settings file, then `PROJGEN_*` variables,
/// then command-line flags.
pub fn resolve_settings(config_path: Option<PathBuf>, overrides: SettingsOverrides) -> Result<InferenceSettings> {
    let registry = FileSettingsRegistry::new(config_path);
    let settings = registry
        .load()
        .with_context(|| format!("Failed to load settings from {}", registry.path().display()))?;
    let mut settings = apply_env_overrides(settings, |key| std::env::var(key).ok())
        .context("Invalid settings in environment")?;

    if let Some(api_url) = overrides.api_url {
        settings.api_url = api_url;
    }
    if let Some(model) = overrides.model {
        settings.model = model;
    }
    if let Some(secs) = overrides.timeout_secs {
        settings.timeout = Duration::from_secs(secs);
    }

    Ok(settings)
}

/// Reads the requirement from the flag or from a file.
pub fn load_requirement(text: Option<String>, file: Option<PathBuf>) -> Result<Requirement> {
    match (text, file) {
        (Some(text), _) => Ok(Requirement::new(text)),
        (None, Some(path)) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read requirement file: {}", path.display()))?;
            Ok(Requirement::new(text))
        }
        (None, None) => Ok(Requirement::new(String::new())),
    }
}

pub async fn create_project(
    root: PathBuf,
    requirement: Requirement,
    settings: InferenceSettings,
    config: &Config,
) -> Result<()> {
    let request = GenerationRequest {
        root,
        requirement,
        mode: ProjectMode::NewProject,
    };
    run_generation(request, settings, config).await
}

pub async fn update_project(
    root: PathBuf,
    requirement: Requirement,
    settings: InferenceSettings,
    config: &Config,
) -> Result<()> {
    if !root.is_dir() {
        bail!("Project directory does not exist: {}", root.display());
    }
    let request = GenerationRequest {
        root,
        requirement,
        mode: ProjectMode::ExistingProject,
    };
    run_generation(request, settings, config).await
}

async fn run_generation(
    request: GenerationRequest,
    settings: InferenceSettings,
    config: &Config,
) -> Result<()> {
    info!(
        model = %settings.model,
        api_url = %settings.api_url,
        timeout_secs = settings.timeout.as_secs(),
        "starting generation"
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let orchestrator = Arc::new(
        Orchestrator::new(settings, tx).with_materializer(FileMaterializer::new(config.dry_run)),
    );
    let handle = orchestrator.start(request)?;

    let mut progress = ProgressIndicator::new(config.json);
    let mut ticker = tokio::time::interval(EVENT_POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            Some(event) = rx.recv() => progress.handle(&event),
            _ = ticker.tick() => {
                if handle.is_finished() {
                    break;
                }
            }
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if result.is_ok() {
                    orchestrator.cancel();
                }
            }
        }
    }

    let summary = handle
        .join()
        .map_err(|_| anyhow!("Generation thread panicked"))?;
    while let Ok(event) = rx.try_recv() {
        progress.handle(&event);
    }
    progress.finish(Some(&summary));

    if summary.status == RunStatus::Failed {
        bail!("Generation failed");
    }
    Ok(())
}

/// Applies the file blocks of a saved model response without calling a model.
pub fn extract_response(response_file: &Path, root: &Path, config: &Config) -> Result<()> {
    let response = fs::read_to_string(response_file)
        .with_context(|| format!("Failed to read response file: {}", response_file.display()))?;

    let mut progress = ProgressIndicator::new(config.json);
    let events = extraction_events(&response, root, config);
    for event in &events {
        progress.handle(event);
    }
    progress.finish(None);

    let failures = events.iter().filter(|e| e.kind == EventKind::Error).count();
    if failures > 0 {
        bail!("{} file(s) could not be written", failures);
    }
    Ok(())
}

/// Applies a saved response and describes every step as an event, so all
/// output goes through the progress printer.
fn extraction_events(response: &str, root: &Path, config: &Config) -> Vec<ProgressEvent> {
    let extractor = PatternExtractor;
    let materializer = FileMaterializer::new(config.dry_run);
    let mut events = Vec::new();

    let files = extractor.file_blocks(response);
    if files.is_empty() {
        events.push(ProgressEvent::status("No files found in this response"));
    }

    for outcome in materializer.apply_all(&files, root) {
        events.push(match outcome {
            Ok(outcome) => ProgressEvent::file(match outcome.status {
                WriteStatus::Created | WriteStatus::Overwritten => {
                    format!("Saved file: {}", outcome.relative)
                }
                WriteStatus::Unchanged => format!("File unchanged: {}", outcome.relative),
                WriteStatus::Skipped => format!("Would save file: {}", outcome.relative),
            }),
            Err(e) => ProgressEvent::error(e.to_string()),
        });
    }

    if config.verbose {
        for planned in extractor.planned_files(response) {
            events.push(ProgressEvent::status(format!("Planned file: {}", planned)));
        }
    }
    for note in extractor.plan_notes(response) {
        events.push(ProgressEvent::plan(note.text));
    }

    events
}

pub fn show_settings(settings: &InferenceSettings, config: &Config) -> Result<()> {
    if config.json {
        println!("{}", serde_json::to_string_pretty(settings)?);
    } else {
        print!("{}", serde_yaml::to_string(settings)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_requirement_text_wins_over_file() {
        let requirement =
            load_requirement(Some("todo app".to_string()), Some(PathBuf::from("/absent"))).unwrap();
        assert_eq!(requirement.as_str(), "todo app");
    }

    #[test]
    fn test_requirement_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("req.md");
        fs::write(&path, "build a CLI todo app\n").unwrap();

        let requirement = load_requirement(None, Some(path)).unwrap();

        assert_eq!(requirement.as_str(), "build a CLI todo app\n");
    }

    #[test]
    fn test_missing_requirement_is_left_to_validation() {
        let requirement = load_requirement(None, None).unwrap();
        assert!(requirement.is_blank());
    }

    #[test]
    fn test_verbose_extraction_reports_through_events() {
        let dir = TempDir::new().unwrap();
        let response = "```file:app/main.py\nprint('hi')\n```\n";
        let config = Config {
            verbose: true,
            dry_run: true,
            json: true,
        };

        let events = extraction_events(response, dir.path(), &config);

        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Would save file: app/main.py", "Planned file: app/main.py"]
        );
        assert!(!dir.path().join("app").exists());
    }

    #[test]
    fn test_extract_writes_blocks() {
        let dir = TempDir::new().unwrap();
        let response_file = dir.path().join("response.md");
        fs::write(
            &response_file,
            "Here you go.\n```file:app/main.py\nprint('hi')\n```\n",
        )
        .unwrap();
        let root = dir.path().join("out");
        let config = Config {
            verbose: false,
            dry_run: false,
            json: true,
        };

        extract_response(&response_file, &root, &config).unwrap();

        assert_eq!(
            fs::read_to_string(root.join("app/main.py")).unwrap(),
            "print('hi')\n"
        );
    }
}
