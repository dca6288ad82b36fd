//! EPUB loading.
//!
//! A [`Book`] is opened from an `.epub` file: the archive is unpacked into
//! a temporary directory (prefix `epub_reader_`) so chapter documents can be
//! handed to a renderer by path, and every spine document with readable
//! text becomes a [`Chapter`] with its sentences and estimated timings.
//!
//! ```rust,no_run
//! use tts_reader::book::Book;
//!
//! let book = Book::open("novel.epub", 54.0)?;
//! for chapter in book.chapters() {
//!     println!("{} ({} sentences)", chapter.title, chapter.sentences.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod export;
pub mod html;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use epub::doc::EpubDoc;

use crate::text::{split_sentences, SentenceTiming};

/// Prefix of the temporary directory a book is unpacked into.
pub const CONTENT_DIR_PREFIX: &str = "epub_reader_";

#[derive(thiserror::Error, Debug)]
pub enum BookError {
    #[error("EPUB not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read EPUB: {0}")]
    Epub(String),
    #[error("Failed to unpack EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No readable chapters found in {0}")]
    NoReadableChapters(PathBuf),
}

/// One readable spine document.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub title: String,
    /// Plain text handed to the synthesis engine.
    pub text: String,
    /// Location of the unpacked XHTML document.
    pub html_path: PathBuf,
    pub sentences: Vec<String>,
    pub timing: SentenceTiming,
}

impl Chapter {
    /// Sentence being spoken at `offset_ms`, by estimated timing.
    pub fn sentence_at(&self, offset_ms: u64) -> Option<usize> {
        self.timing.sentence_at(offset_ms)
    }
}

/// A spine document as raw markup.
pub(crate) struct SpineDocument {
    /// Path of the document inside the archive.
    pub path: PathBuf,
    pub html: String,
}

pub(crate) fn open_doc(path: &Path) -> Result<EpubDoc<BufReader<File>>, BookError> {
    if !path.exists() {
        return Err(BookError::NotFound(path.to_path_buf()));
    }
    EpubDoc::new(path).map_err(|e| BookError::Epub(format!("{}: {e}", path.display())))
}

/// XHTML documents in reading order.
pub(crate) fn spine_documents(doc: &mut EpubDoc<BufReader<File>>) -> Vec<SpineDocument> {
    let spine = doc.spine.clone();
    let mut documents = Vec::with_capacity(spine.len());

    for id in spine {
        let Some((path, mime)) = doc.resources.get(&id).cloned() else {
            log::warn!("Spine item '{}' missing from manifest", id);
            continue;
        };
        if !mime.contains("html") {
            log::debug!("Skipping non-document spine item {} ({})", id, mime);
            continue;
        }
        let Some((bytes, _mime)) = doc.get_resource(&id) else {
            log::warn!("Spine item '{}' could not be read", id);
            continue;
        };
        documents.push(SpineDocument {
            path,
            html: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    documents
}

/// An opened EPUB with its chapters unpacked to disk.
#[derive(Debug)]
pub struct Book {
    path: PathBuf,
    title: Option<String>,
    author: Option<String>,
    chapters: Vec<Chapter>,
    content_dir: Option<tempfile::TempDir>,
}

impl Book {
    /// Open and unpack the EPUB at `path`.
    ///
    /// `ms_per_char` drives the sentence timing estimates (see
    /// [`PlayerConfig::ms_per_char`](crate::PlayerConfig::ms_per_char)).
    pub fn open(path: impl AsRef<Path>, ms_per_char: f64) -> Result<Self, BookError> {
        let path = path.as_ref();
        let mut doc = open_doc(path)?;

        let content_dir = tempfile::Builder::new()
            .prefix(CONTENT_DIR_PREFIX)
            .tempdir()?;
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        archive.extract(content_dir.path())?;
        log::debug!(
            "Unpacked {} entries into {}",
            archive.len(),
            content_dir.path().display()
        );

        let mut chapters = Vec::new();
        for document in spine_documents(&mut doc) {
            let text = html::chapter_text(&document.html);
            if text.trim().is_empty() {
                continue;
            }
            let fallback = document.path.to_string_lossy();
            let title = html::chapter_title(&document.html, &fallback);
            let sentences = split_sentences(&text);
            let timing = SentenceTiming::compute(&sentences, ms_per_char);

            log::info!(
                "Extracted chapter: {} with {} sentences",
                title,
                sentences.len()
            );
            chapters.push(Chapter {
                title,
                text,
                html_path: content_dir.path().join(&document.path),
                sentences,
                timing,
            });
        }

        if chapters.is_empty() {
            return Err(BookError::NoReadableChapters(path.to_path_buf()));
        }
        log::info!("Extracted total {} chapters", chapters.len());

        Ok(Self {
            path: path.to_path_buf(),
            title: doc.mdata("title"),
            author: doc.mdata("creator"),
            chapters,
            content_dir: Some(content_dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    /// Directory the archive was unpacked into.
    pub fn content_dir(&self) -> Option<&Path> {
        self.content_dir.as_ref().map(|dir| dir.path())
    }

    /// Remove the unpacked content now rather than on drop.
    pub fn close(mut self) -> Result<(), BookError> {
        if let Some(dir) = self.content_dir.take() {
            dir.close()?;
        }
        Ok(())
    }
}
