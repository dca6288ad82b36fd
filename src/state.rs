//! Reader position persistence.
//!
//! The open book and the reading position live in a single JSON file,
//! by default `.tts_reader_state.json` in the working directory:
//!
//! ```json
//! { "book_path": "books/novel.epub", "position": { "chapter_index": 3, "offset_ms": 41250 } }
//! ```
//!
//! A missing file means there is no prior session. Writes go through a
//! temporary file in the same directory followed by a rename, so a crash
//! mid-write leaves either the old or the new contents.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name of the state file inside the working directory.
pub const STATE_FILE_NAME: &str = ".tts_reader_state.json";

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("I/O error on state file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt state file {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where the reader is inside a book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPosition {
    /// Index into the book's readable chapters.
    #[serde(default)]
    pub chapter_index: usize,
    /// Playback offset into the chapter's audio.
    #[serde(default)]
    pub offset_ms: u64,
}

impl ReadingPosition {
    pub fn new(chapter_index: usize, offset_ms: u64) -> Self {
        Self {
            chapter_index,
            offset_ms,
        }
    }
}

/// The persisted session: which book, and where in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderState {
    pub book_path: String,
    #[serde(default)]
    pub position: ReadingPosition,
}

impl ReaderState {
    pub fn new(book_path: impl Into<String>, position: ReadingPosition) -> Self {
        Self {
            book_path: book_path.into(),
            position,
        }
    }

    /// True when a previous session recorded a book.
    pub fn has_session(&self) -> bool {
        !self.book_path.is_empty()
    }
}

/// Loads and saves [`ReaderState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::in_working_dir()
    }
}

impl StateStore {
    /// Store backed by [`STATE_FILE_NAME`], resolved against the working
    /// directory at the time of each load or save.
    pub fn in_working_dir() -> Self {
        Self::new(STATE_FILE_NAME)
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file.
    ///
    /// Returns the default state when the file does not exist and
    /// [`StateError::CorruptState`] when it is not a JSON object with a
    /// string `book_path`.
    pub fn load(&self) -> Result<ReaderState, StateError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No state file at {}", self.path.display());
                return Ok(ReaderState::default());
            }
            Err(e) => return Err(StateError::Io(e)),
        };

        serde_json::from_str(&raw).map_err(|e| StateError::CorruptState {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Like [`load`](Self::load), but a corrupt file is logged, removed and
    /// replaced by the default state. Other I/O failures also fall back to
    /// the default state.
    pub fn load_or_default(&self) -> ReaderState {
        match self.load() {
            Ok(state) => state,
            Err(StateError::CorruptState { path, reason }) => {
                log::warn!(
                    "Discarding corrupt state file {}: {}",
                    path.display(),
                    reason
                );
                if let Err(e) = std::fs::remove_file(&path) {
                    log::warn!("Failed to remove corrupt state file: {}", e);
                }
                ReaderState::default()
            }
            Err(e) => {
                log::warn!("Failed to read state file: {}. Starting fresh.", e);
                ReaderState::default()
            }
        }
    }

    /// Overwrite the state file with `book_path` and `position`.
    pub fn save(&self, book_path: &str, position: ReadingPosition) -> Result<(), StateError> {
        self.store(&ReaderState::new(book_path, position))
    }

    /// Overwrite the state file with `state`.
    pub fn store(&self, state: &ReaderState) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(state)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StateError::Io(e.error))?;

        log::debug!(
            "Saved state: chapter {} at {} ms",
            state.position.chapter_index,
            state.position.offset_ms
        );
        Ok(())
    }
}
