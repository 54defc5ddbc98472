//! Terminal progress bar for downloads.

use geotune_training::{ProgressEvent, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Renders download progress with an indicatif bar.
#[derive(Default)]
pub struct BarProgressSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut guard) = self.bar.lock() {
            f(&mut guard);
        }
    }
}

impl ProgressSink for BarProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Listed { page, keys } => {
                tracing::debug!(page, keys, "listing page");
            }
            ProgressEvent::Message { message } => self.with_bar(|bar| match bar {
                Some(bar) => bar.println(message),
                None => eprintln!("{message}"),
            }),
            ProgressEvent::DownloadStarted { total } => self.with_bar(|bar| {
                let pb = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
                if let Ok(style) =
                    ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    pb.set_style(style.progress_chars("=> "));
                }
                *bar = Some(pb);
            }),
            ProgressEvent::Downloaded { key, .. } => self.with_bar(|bar| {
                if let Some(bar) = bar {
                    bar.set_message(key);
                    bar.inc(1);
                }
            }),
            ProgressEvent::DownloadFinished { .. } => self.with_bar(|bar| {
                if let Some(bar) = bar.take() {
                    bar.finish_and_clear();
                }
            }),
        }
    }
}
