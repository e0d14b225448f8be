use chrono::Local;
use projgen::contexts::RunSummary;
use projgen::data::{EventKind, ProgressEvent};
use serde_json::json;
use std::time::Instant;

/// Prints progress events as they arrive and a summary at the end.
pub struct ProgressIndicator {
    json: bool,
    files: usize,
    errors: usize,
    plans: usize,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            files: 0,
            errors: 0,
            plans: 0,
            start_time: Instant::now(),
        }
    }

    pub fn handle(&mut self, event: &ProgressEvent) {
        match event.kind {
            EventKind::File => self.files += 1,
            EventKind::Error => self.errors += 1,
            EventKind::Plan => self.plans += 1,
            EventKind::Status => {}
        }
        println!("{}", render_event(event, self.json));
    }

    pub fn finish(&self, summary: Option<&RunSummary>) {
        let elapsed = summary
            .map(|s| s.elapsed)
            .unwrap_or_else(|| self.start_time.elapsed());

        if self.json {
            let mut line = json!({
                "kind": "summary",
                "file_events": self.files,
                "error_events": self.errors,
                "plan_events": self.plans,
                "duration_secs": elapsed.as_secs_f64(),
            });
            if let Some(summary) = summary {
                line["status"] = json!(format!("{:?}", summary.status).to_lowercase());
                line["stages"] = json!(summary.stages);
                line["degraded_stages"] = json!(summary.degraded_stages);
                line["files_written"] = json!(summary.files_written);
                line["write_failures"] = json!(summary.write_failures);
            }
            println!("{}", line);
            return;
        }

        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        if let Some(summary) = summary {
            println!("  Status:    {:?}", summary.status);
            println!("  Stages:    {}", summary.stages);
            println!("  Degraded:  {}", summary.degraded_stages);
            println!("  Written:   {}", summary.files_written);
        }
        println!("  Files:     {}", self.files);
        println!("  Errors:    {}", self.errors);
        println!("  Duration:  {:.2}s", elapsed.as_secs_f64());
        println!("{}", "=".repeat(60));
    }
}

/// One line per event: a JSON object, or `[HH:MM:SS] kind  message`.
fn render_event(event: &ProgressEvent, json: bool) -> String {
    if json {
        return serde_json::to_string(event)
            .unwrap_or_else(|e| json!({ "kind": "error", "message": e.to_string() }).to_string());
    }

    let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
    format!("[{}] {:<6} {}", time, event.kind, event.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_line() {
        let event = ProgressEvent::file("Saved file: main.py");
        let line = render_event(&event, false);

        assert!(line.starts_with('['));
        assert!(line.ends_with("] file   Saved file: main.py"));
    }

    #[test]
    fn test_render_json_line() {
        let event = ProgressEvent::error("Error: boom");
        let value: serde_json::Value = serde_json::from_str(&render_event(&event, true)).unwrap();

        assert_eq!(value["kind"], "error");
        assert_eq!(value["message"], "Error: boom");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_counts_by_kind() {
        let mut progress = ProgressIndicator::new(true);
        progress.handle(&ProgressEvent::file("Saved file: a.py"));
        progress.handle(&ProgressEvent::file("Saved file: b.py"));
        progress.handle(&ProgressEvent::plan("All tasks completed"));
        progress.handle(&ProgressEvent::status("Project generation complete!"));

        assert_eq!(progress.files, 2);
        assert_eq!(progress.plans, 1);
        assert_eq!(progress.errors, 0);
    }
}
