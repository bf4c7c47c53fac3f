//! The manga document: the JSON file that drives a run.
//!
//! The on-disk format is `{ "details": { ... }, "chapters": [ ... ] }`.
//! Scrapers attach extra fields freely, so both structs carry a flattened
//! map of unknown fields and the whole document is rewritten losslessly
//! when chapters are removed after `--delete-on-success`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Error type for document loading and persistence.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The file is not valid JSON or does not have the expected shape.
    #[error("invalid document {path}: expected {{ \"details\": object, \"chapters\": array }}")]
    Invalid {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// The file could not be read or written.
    #[error("failed to access document {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed as JSON at all.
    #[error("failed to parse document {path}: {source}")]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Series-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MangaDetails {
    /// Series title; directories fall back to "UnknownManga" when absent.
    #[serde(default)]
    pub manganame: Option<String>,

    /// Scrape source site; folds into the base folder name.
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Cover image URL, downloaded next to `details.json` when present.
    #[serde(default)]
    pub cover: Option<String>,

    #[serde(default)]
    pub genre: Vec<String>,

    /// Unknown fields, preserved verbatim on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MangaDetails {
    /// Series title with the documented fallback.
    #[must_use]
    pub fn title(&self) -> &str {
        self.manganame.as_deref().unwrap_or("UnknownManga")
    }

    /// Source site with the documented fallback.
    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or("unknown")
    }
}

/// One chapter entry: a title and its ordered page URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter title; falls back to "UnknownChapter" when absent.
    #[serde(default)]
    pub title: Option<String>,

    /// Page image URLs in reading order.
    #[serde(default)]
    pub images: Vec<String>,

    /// Unknown fields, preserved verbatim on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chapter {
    /// Chapter title with the documented fallback.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("UnknownChapter")
    }
}

/// The full document backing one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaDocument {
    /// Series metadata.
    pub details: MangaDetails,

    /// Chapters in document order (download order).
    pub chapters: Vec<Chapter>,

    /// Unknown top-level fields, preserved verbatim on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MangaDocument {
    /// Loads and validates a document from disk.
    ///
    /// # Errors
    ///
    /// Fails fast on unreadable files, malformed JSON, and documents where
    /// `details` is not an object or `chapters` is not an array. No
    /// filesystem or network side effects happen on failure.
    pub async fn load(path: &Path) -> Result<Self, DocumentError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocumentError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        let value: Value = serde_json::from_str(&raw).map_err(|e| DocumentError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        // Shape check first so a wrong-shaped document reads as "invalid"
        // rather than as a field-level deserialization error.
        let shape_ok = value.get("details").is_some_and(Value::is_object)
            && value.get("chapters").is_some_and(Value::is_array);
        if !shape_ok {
            return Err(DocumentError::Invalid {
                path: path.to_path_buf(),
            });
        }

        let document: Self = serde_json::from_value(value).map_err(|e| DocumentError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(
            path = %path.display(),
            chapters = document.chapters.len(),
            "loaded document"
        );
        Ok(document)
    }

    /// Writes the whole document back to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] when the file cannot be written.
    pub async fn persist(&self, path: &Path) -> Result<(), DocumentError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| DocumentError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| DocumentError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Removes the first chapter equal to `chapter`, returning whether one
    /// was removed.
    pub fn remove_chapter(&mut self, chapter: &Chapter) -> bool {
        match self.chapters.iter().position(|c| c == chapter) {
            Some(index) => {
                self.chapters.remove(index);
                true
            }
            None => false,
        }
    }
}
