use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// Kind of a progress message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Error,
    File,
    Plan,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EventKind::Status => "status",
            EventKind::Error => "error",
            EventKind::File => "file",
            EventKind::Plan => "plan",
        };
        f.pad(name)
    }
}

/// A message from a generation run to whoever is displaying it.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(EventKind::Status, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }

    pub fn file(message: impl Into<String>) -> Self {
        Self::new(EventKind::File, message)
    }

    pub fn plan(message: impl Into<String>) -> Self {
        Self::new(EventKind::Plan, message)
    }
}

/// Destination for progress events.
///
/// Implementations must not block the caller: the generation thread emits
/// events between model calls and never waits for a consumer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl EventSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A closed receiver means nobody is listening any more; the run
        // still has to finish its writes.
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_serializes_kind_lowercase() {
        let event = ProgressEvent::file("Saved file: main.py");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["message"], "Saved file: main.py");
    }

    #[test]
    fn test_sender_sink_is_fifo() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(ProgressEvent::status("first"));
        tx.emit(ProgressEvent::plan("second"));

        assert_eq!(rx.try_recv().unwrap().message, "first");
        assert_eq!(rx.try_recv().unwrap().message, "second");
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.emit(ProgressEvent::error("nobody listens"));
    }
}
