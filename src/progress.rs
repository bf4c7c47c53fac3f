//! Push-style progress events emitted by the download engine.
//!
//! The engine never renders progress itself; it pushes [`ProgressEvent`]s to
//! a caller-supplied [`ProgressSink`]. The CLI binary installs an indicatif
//! renderer; tests and library embedders can install [`NoopProgress`] or a
//! recording sink.

use std::sync::Arc;

/// Position of the current chapter within the run, attached to every event
/// so a renderer can show "Chapter 3/12" alongside byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterContext {
    /// 1-based index of the chapter being processed.
    pub index: usize,
    /// Total number of chapters in the document.
    pub count: usize,
}

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Byte-level progress for one item (page or cover) transfer.
    Item {
        /// Index of the item within its batch (1-based; 0 for the cover).
        id: usize,
        /// Bytes materialized so far, including any resumed offset.
        bytes_done: u64,
        /// Total expected bytes, when the server reported a content length.
        bytes_total: Option<u64>,
        /// Chapter position for display.
        chapter: ChapterContext,
    },
    /// Item-count progress for one chapter's batch.
    Batch {
        /// Number of items that reached a terminal result.
        done: usize,
        /// Total number of items in the batch.
        total: usize,
        /// Chapter position for display.
        chapter: ChapterContext,
    },
}

/// Receiver for progress events. Implementations must be cheap and
/// non-blocking; they are called from concurrent download tasks.
pub trait ProgressSink: Send + Sync {
    /// Handles one progress event.
    fn on_event(&self, event: ProgressEvent);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Handle used by a transfer to report byte progress for one item without
/// knowing about batches or chapters.
#[derive(Clone)]
pub struct ItemReporter {
    sink: Arc<dyn ProgressSink>,
    id: usize,
    chapter: ChapterContext,
}

impl ItemReporter {
    /// Creates a reporter bound to one item id and chapter position.
    pub fn new(sink: Arc<dyn ProgressSink>, id: usize, chapter: ChapterContext) -> Self {
        Self { sink, id, chapter }
    }

    /// Reports the bytes materialized so far for this item.
    pub fn bytes(&self, bytes_done: u64, bytes_total: Option<u64>) {
        self.sink.on_event(ProgressEvent::Item {
            id: self.id,
            bytes_done,
            bytes_total,
            chapter: self.chapter,
        });
    }
}

impl std::fmt::Debug for ItemReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemReporter")
            .field("id", &self.id)
            .field("chapter", &self.chapter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_sink {
    use std::sync::Mutex;

    use super::{ProgressEvent, ProgressSink};

    /// Records every event for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_event(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_sink::RecordingSink;
    use super::*;

    #[test]
    fn test_item_reporter_forwards_id_and_chapter() {
        let sink = Arc::new(RecordingSink::default());
        let chapter = ChapterContext { index: 2, count: 9 };
        let reporter = ItemReporter::new(sink.clone(), 3, chapter);

        reporter.bytes(1024, Some(4096));

        let events = sink.events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[ProgressEvent::Item {
                id: 3,
                bytes_done: 1024,
                bytes_total: Some(4096),
                chapter,
            }]
        );
    }

    #[test]
    fn test_noop_progress_accepts_events() {
        NoopProgress.on_event(ProgressEvent::Batch {
            done: 1,
            total: 2,
            chapter: ChapterContext::default(),
        });
    }
}
