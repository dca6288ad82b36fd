//! The reading session: an open book, the player, and the persisted
//! position kept in step with both.

use std::path::Path;

use crate::audio::SynthesisEngine;
use crate::book::{Book, BookError, Chapter};
use crate::player::{PlayerError, TtsPlayer};
use crate::state::{ReaderState, ReadingPosition, StateError, StateStore};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Book(#[from] BookError),
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error("No book is open")]
    NoBook,
    #[error("No chapter selected")]
    NoChapterSelected,
    #[error("Chapter {index} out of range (book has {count})")]
    ChapterOutOfRange { index: usize, count: usize },
}

/// Drives a [`TtsPlayer`] through a [`Book`] and saves the position
/// whenever it changes.
///
/// ```rust,no_run
/// use tts_reader::{MemoryOutput, ReaderSession, StateStore, TtsPlayer, PlayerConfig};
/// # use tts_reader::{SynthesisEngine, SynthesisResult, VoiceParams, BoxError};
/// # struct Silence;
/// # impl SynthesisEngine for Silence {
/// #     fn synthesize(&mut self, _: &str, _: &VoiceParams) -> Result<SynthesisResult, BoxError> {
/// #         Ok(SynthesisResult { samples: vec![0.0; 24000], sample_rate: 24000 })
/// #     }
/// # }
///
/// let player = TtsPlayer::new(Silence, MemoryOutput::new(), PlayerConfig::default())?;
/// let mut session = ReaderSession::new(StateStore::in_working_dir(), player);
/// if !session.restore()? {
///     session.open_book("novel.epub")?;
/// }
/// session.play()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ReaderSession<E> {
    store: StateStore,
    state: ReaderState,
    player: TtsPlayer<E>,
    book: Option<Book>,
    current_chapter: Option<usize>,
    last_sentence: Option<usize>,
}

impl<E: SynthesisEngine + 'static> ReaderSession<E> {
    /// Create a session, loading any saved state from `store`.
    pub fn new(store: StateStore, player: TtsPlayer<E>) -> Self {
        let state = store.load_or_default();
        Self {
            store,
            state,
            player,
            book: None,
            current_chapter: None,
            last_sentence: None,
        }
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    pub fn player(&self) -> &TtsPlayer<E> {
        &self.player
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        self.book.as_ref().map(Book::chapters).unwrap_or_default()
    }

    pub fn current_chapter_index(&self) -> Option<usize> {
        self.current_chapter
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        let book = self.book.as_ref()?;
        book.chapter(self.current_chapter?)
    }

    /// Reopen the book from the saved state at the saved chapter and
    /// offset. Returns `false` when there is nothing to restore.
    pub fn restore(&mut self) -> Result<bool, SessionError> {
        if !self.state.has_session() {
            return Ok(false);
        }
        let path = self.state.book_path.clone();
        if !Path::new(&path).exists() {
            log::info!("Saved book {} no longer exists", path);
            return Ok(false);
        }
        let saved = self.state.position;

        let book = Book::open(&path, self.player.config().ms_per_char())?;
        let index = saved.chapter_index.min(book.chapters().len() - 1);
        self.replace_book(book);

        self.current_chapter = Some(index);
        let offset_ms = if index == saved.chapter_index {
            saved.offset_ms
        } else {
            0
        };
        self.save_position(ReadingPosition::new(index, offset_ms))?;
        log::info!("Restored {} at chapter {} ({} ms)", path, index, offset_ms);
        Ok(true)
    }

    /// Open a book and start at its first chapter.
    pub fn open_book(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        let book = Book::open(path, self.player.config().ms_per_char())?;
        self.replace_book(book);

        self.state.book_path = path.to_string_lossy().into_owned();
        self.save_position(ReadingPosition::default())?;
        self.select_chapter(0)?;
        log::info!("Loaded: {}", path.display());
        Ok(())
    }

    /// Make `index` the current chapter, rewinding to its start.
    pub fn select_chapter(&mut self, index: usize) -> Result<(), SessionError> {
        let book = self.book.as_ref().ok_or(SessionError::NoBook)?;
        let Some(chapter) = book.chapter(index) else {
            return Err(SessionError::ChapterOutOfRange {
                index,
                count: book.chapters().len(),
            });
        };
        log::info!("Showing chapter {}: {}", index, chapter.title);

        self.current_chapter = Some(index);
        self.last_sentence = None;
        self.player.stop();
        self.save_position(ReadingPosition::new(index, 0))
    }

    /// Speak the current chapter from the saved offset.
    pub fn play(&mut self) -> Result<(), SessionError> {
        let chapter = self
            .current_chapter()
            .ok_or(SessionError::NoChapterSelected)?;
        let text = chapter.text.clone();
        let title = chapter.title.clone();

        self.player.load_text(&text);
        self.player.set_offset_ms(self.state.position.offset_ms);
        self.player.play()?;
        log::info!("Started playback for: {}", title);
        Ok(())
    }

    /// Pause and remember where playback stopped.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.player.pause();
        let offset_ms = self.player.offset_ms();
        self.save_offset(offset_ms)
    }

    pub fn resume(&mut self) {
        self.player.resume();
    }

    /// Stop and rewind the current chapter. The next
    /// [`highlight_changed`](Self::highlight_changed) poll clears the
    /// highlight.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.player.stop();
        self.save_offset(0)
    }

    /// Sentence of the current chapter under the playback cursor.
    pub fn current_sentence(&self) -> Option<usize> {
        self.current_chapter()?.sentence_at(self.player.offset_ms())
    }

    /// Poll for highlight changes.
    ///
    /// Returns `Some(new)` when the highlighted sentence differs from the
    /// previous call (`Some(None)` clears the highlight) and `None` when
    /// nothing changed.
    pub fn highlight_changed(&mut self) -> Option<Option<usize>> {
        let sentence = if self.player.is_playing() {
            self.current_sentence()
        } else {
            None
        };
        if sentence == self.last_sentence {
            return None;
        }
        log::debug!(
            "Sentence changed from {:?} to {:?}",
            self.last_sentence,
            sentence
        );
        self.last_sentence = sentence;
        Some(sentence)
    }

    /// Save the position, stop playback and remove the unpacked book.
    pub fn close(mut self) -> Result<(), SessionError> {
        if self.book.is_some() {
            let offset_ms = self.player.offset_ms();
            self.save_offset(offset_ms)?;
        }
        self.player.stop();
        if let Some(book) = self.book.take() {
            book.close()?;
        }
        Ok(())
    }

    fn replace_book(&mut self, book: Book) {
        self.player.stop();
        if let Some(previous) = self.book.replace(book) {
            if let Err(e) = previous.close() {
                log::warn!("Failed to clean up previous book: {}", e);
            }
        }
        self.current_chapter = None;
        self.last_sentence = None;
    }

    fn save_offset(&mut self, offset_ms: u64) -> Result<(), SessionError> {
        let position = ReadingPosition {
            offset_ms,
            ..self.state.position
        };
        self.save_position(position)
    }

    fn save_position(&mut self, position: ReadingPosition) -> Result<(), SessionError> {
        self.state.position = position;
        self.store.store(&self.state)?;
        Ok(())
    }
}
