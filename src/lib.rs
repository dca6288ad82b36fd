//! # tts-reader
//!
//! A Rust library for reading EPUB books aloud with resumable
//! text-to-speech playback.
//!
//! ## Features
//!
//! - **Position persistence**: the open book and reading position survive
//!   restarts via a small JSON state file
//! - **EPUB chapters**: spine documents unpacked to disk, with plain text,
//!   sentences and estimated sentence timings
//! - **Threaded playback**: synthesis runs ahead of the output on its own
//!   thread; pause, resume and stop at block granularity
//! - **Speech queue**: speak now or queue behind the current text
//! - **Plain-text export**: one `.txt` file per chapter
//!
//! Speech synthesis and the audio device are plugged in through
//! [`SynthesisEngine`] and [`AudioOutput`].
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tts-reader = "2026.2"
//! ```
//!
//! ```ignore
//! use tts_reader::{PlayerConfig, ReaderSession, StateStore, TtsPlayer, WavOutput};
//!
//! let player = TtsPlayer::new(my_engine, WavOutput::new("chapter.wav"), PlayerConfig::default())?;
//! let mut session = ReaderSession::new(StateStore::in_working_dir(), player);
//! if !session.restore()? {
//!     session.open_book("novel.epub")?;
//! }
//! session.play()?;
//! session.player().wait_until_idle(std::time::Duration::from_secs(600));
//! session.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod book;
pub mod config;
pub mod logging;
pub mod player;
pub mod queue;
pub mod session;
pub mod state;
pub mod text;

pub use audio::{
    AudioOutput, AudioSink, BoxError, MemoryOutput, SynthesisEngine, SynthesisResult,
    VoiceParams, WavOutput,
};
pub use book::{Book, BookError, Chapter};
pub use config::{PlayerConfig, PlayerConfigBuilder};
pub use player::{PlayerError, PlayerStatus, TtsPlayer};
pub use queue::{Speaker, SpeechQueue};
pub use session::{ReaderSession, SessionError};
pub use state::{ReaderState, ReadingPosition, StateError, StateStore, STATE_FILE_NAME};
