//! Progress bar rendering for download runs.

use indicatif::{ProgressBar, ProgressStyle};
use mangadm_core::{ProgressEvent, ProgressSink};

/// Renders batch progress as a single indicatif bar; byte-level item events
/// only refresh the message so concurrent pages don't fight over the bar.
pub(crate) struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    /// Creates the renderer. When `enabled` is false the bar is hidden and
    /// every event is a no-op draw.
    pub(crate) fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len} pages")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Clears the bar at the end of the run.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Batch {
                done,
                total,
                chapter,
            } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(done as u64);
                self.bar
                    .set_message(format!("Chapter {}/{}", chapter.index, chapter.count));
            }
            // Byte counters arrive from several tasks at once; a tick keeps
            // the bar lively without repositioning it.
            ProgressEvent::Item { .. } => self.bar.tick(),
        }
    }
}
