use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Listed { page: usize, keys: usize },
    Message { message: String },
    DownloadStarted { total: usize },
    Downloaded { key: String, index: usize, total: usize },
    DownloadFinished { downloaded: usize },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Listed { page, keys } => println!("[download] page {page}: {keys} keys"),
            ProgressEvent::Message { message } => println!("[download] {message}"),
            ProgressEvent::DownloadStarted { total } => println!("[download] fetching {total} objects"),
            ProgressEvent::Downloaded { key, index, total } => println!("[download] {index}/{total} {key}"),
            ProgressEvent::DownloadFinished { downloaded } => println!("[download] finished ({downloaded} objects)"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}
