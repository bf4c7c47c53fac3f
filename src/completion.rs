//! Completion detection: decides whether a chapter on disk needs work.
//!
//! Runs purely on `Path` inspection so a re-run over a finished library is
//! network-free. The checks run in precedence order:
//!
//! 1. an archive sibling (`{chapter}.cbz` / `.epub`) means COMPLETE, even
//!    after the source directory was deleted by the archiver;
//! 2. a lingering temp directory means IN-PROGRESS (resume into it);
//! 3. no final directory means NOT-STARTED;
//! 4. temp-suffixed files inside the final directory mean IN-PROGRESS;
//! 5. otherwise the file count must match the expected page count.

use std::path::Path;

use tracing::debug;

use crate::archive::ArchiveFormat;
use crate::download::TEMP_SUFFIX;

/// On-disk state of a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterState {
    /// Fully materialized (directory with all pages, or an archive).
    Complete,

    /// A partial download exists and can be resumed.
    InProgress,

    /// No usable prior state.
    NotStarted,
}

/// Inspects the filesystem and classifies a chapter.
///
/// `expected_pages` is the chapter's image count from the document;
/// `formats` lists the archive formats whose siblings count as complete.
/// IO errors while listing read as [`ChapterState::NotStarted`]; the
/// download path will surface the real error if the directory is truly
/// unusable.
#[must_use]
pub fn chapter_state(
    final_dir: &Path,
    temp_dir: &Path,
    expected_pages: usize,
    formats: &[ArchiveFormat],
) -> ChapterState {
    if has_archive_sibling(final_dir, formats) {
        return ChapterState::Complete;
    }

    if temp_dir.is_dir() {
        return ChapterState::InProgress;
    }

    if !final_dir.is_dir() {
        return ChapterState::NotStarted;
    }

    let entries = match std::fs::read_dir(final_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %final_dir.display(), error = %e, "cannot list chapter directory");
            return ChapterState::NotStarted;
        }
    };

    let mut count = 0usize;
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().contains(TEMP_SUFFIX) {
            return ChapterState::InProgress;
        }
        count += 1;
    }

    if expected_pages > 0 && count == expected_pages {
        ChapterState::Complete
    } else {
        ChapterState::NotStarted
    }
}

/// True when the chapter needs no further work.
#[must_use]
pub fn is_complete(
    final_dir: &Path,
    temp_dir: &Path,
    expected_pages: usize,
    formats: &[ArchiveFormat],
) -> bool {
    chapter_state(final_dir, temp_dir, expected_pages, formats) == ChapterState::Complete
}

fn has_archive_sibling(final_dir: &Path, formats: &[ArchiveFormat]) -> bool {
    let Some(name) = final_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return false;
    };
    formats.iter().any(|format| {
        final_dir
            .with_file_name(format!("{name}.{}", format.extension()))
            .is_file()
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;

    struct Layout {
        _dir: TempDir,
        final_dir: PathBuf,
        temp_dir: PathBuf,
    }

    fn layout() -> Layout {
        let dir = TempDir::new().unwrap();
        let final_dir = dir.path().join("Chapter 1");
        let temp_dir = dir.path().join("Chapter 1_tmp");
        Layout {
            _dir: dir,
            final_dir,
            temp_dir,
        }
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_nothing_on_disk_is_not_started() {
        let l = layout();
        assert_eq!(
            chapter_state(&l.final_dir, &l.temp_dir, 3, ArchiveFormat::ALL),
            ChapterState::NotStarted
        );
    }

    #[test]
    fn test_archive_sibling_is_complete_without_directory() {
        let l = layout();
        touch(&l.final_dir.with_file_name("Chapter 1.cbz"));
        assert_eq!(
            chapter_state(&l.final_dir, &l.temp_dir, 3, ArchiveFormat::ALL),
            ChapterState::Complete
        );
    }

    #[test]
    fn test_epub_sibling_also_counts() {
        let l = layout();
        touch(&l.final_dir.with_file_name("Chapter 1.epub"));
        assert!(is_complete(&l.final_dir, &l.temp_dir, 3, ArchiveFormat::ALL));
    }

    #[test]
    fn test_temp_directory_is_in_progress() {
        let l = layout();
        std::fs::create_dir(&l.temp_dir).unwrap();
        assert_eq!(
            chapter_state(&l.final_dir, &l.temp_dir, 3, ArchiveFormat::ALL),
            ChapterState::InProgress
        );
    }

    #[test]
    fn test_full_directory_is_complete() {
        let l = layout();
        std::fs::create_dir(&l.final_dir).unwrap();
        for name in ["01.jpg", "02.jpg", "03.jpg"] {
            touch(&l.final_dir.join(name));
        }
        assert_eq!(
            chapter_state(&l.final_dir, &l.temp_dir, 3, ArchiveFormat::ALL),
            ChapterState::Complete
        );
    }

    #[test]
    fn test_short_directory_is_not_started() {
        let l = layout();
        std::fs::create_dir(&l.final_dir).unwrap();
        touch(&l.final_dir.join("01.jpg"));
        assert_eq!(
            chapter_state(&l.final_dir, &l.temp_dir, 3, ArchiveFormat::ALL),
            ChapterState::NotStarted
        );
    }

    #[test]
    fn test_temp_suffixed_file_is_in_progress() {
        let l = layout();
        std::fs::create_dir(&l.final_dir).unwrap();
        touch(&l.final_dir.join("01.jpg"));
        touch(&l.final_dir.join("02.jpg_tmp"));
        touch(&l.final_dir.join("03.jpg"));
        assert_eq!(
            chapter_state(&l.final_dir, &l.temp_dir, 3, ArchiveFormat::ALL),
            ChapterState::InProgress
        );
    }

    #[test]
    fn test_zero_expected_pages_never_complete_via_count() {
        let l = layout();
        std::fs::create_dir(&l.final_dir).unwrap();
        assert_eq!(
            chapter_state(&l.final_dir, &l.temp_dir, 0, ArchiveFormat::ALL),
            ChapterState::NotStarted
        );
    }
}
