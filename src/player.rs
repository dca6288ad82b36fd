//! Resumable text-to-speech playback.
//!
//! [`TtsPlayer`] splits the loaded text into segments, synthesizes them on
//! a producer thread into a bounded queue and writes the audio to an
//! [`AudioSink`] in fixed-size blocks from a playback thread. The playback
//! cursor advances per block, so [`TtsPlayer::offset_ms`] is always the
//! position of audio actually handed to the output, and playback can later
//! be restarted from that point with [`TtsPlayer::set_offset_ms`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::{AudioOutput, AudioSink, BoxError, SynthesisEngine, VoiceParams};
use crate::config::PlayerConfig;
use crate::text::segments;

/// How often blocked playback threads re-check for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("Failed to spawn playback thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Audio output error: {0}")]
    Output(String),
    #[error("Invalid player configuration: {0}")]
    InvalidConfig(String),
    #[error("Synthesis thread panicked")]
    SynthesisPanicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
}

type StateListener = Arc<dyn Fn(PlayerStatus) + Send + Sync>;

struct Playback {
    text: String,
    is_playing: bool,
    is_paused: bool,
    offset_samples: u64,
    offset_ms: u64,
    /// Cancellation flag of the active run.
    run: Option<Arc<AtomicBool>>,
    listener: Option<StateListener>,
}

impl Playback {
    fn status(&self) -> PlayerStatus {
        match (self.is_playing, self.is_paused) {
            (_, true) => PlayerStatus::Paused,
            (true, false) => PlayerStatus::Playing,
            (false, false) => PlayerStatus::Idle,
        }
    }

    fn reset_offset(&mut self) {
        self.offset_samples = 0;
        self.offset_ms = 0;
    }
}

struct Shared {
    playback: Mutex<Playback>,
    /// Signalled on resume, stop and the end of a run.
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let (listener, status) = {
            let playback = self.lock();
            (playback.listener.clone(), playback.status())
        };
        if let Some(listener) = listener {
            listener(status);
        }
    }
}

/// Text-to-speech player with pause, resume and offset tracking.
///
/// All methods take `&self`; clones share the same playback.
pub struct TtsPlayer<E> {
    shared: Arc<Shared>,
    engine: Arc<Mutex<E>>,
    output: Arc<dyn AudioOutput>,
    config: PlayerConfig,
}

impl<E> Clone for TtsPlayer<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            engine: Arc::clone(&self.engine),
            output: Arc::clone(&self.output),
            config: self.config.clone(),
        }
    }
}

impl<E: SynthesisEngine + 'static> TtsPlayer<E> {
    /// Fails with [`PlayerError::InvalidConfig`] when `config` breaks the
    /// constraints [`PlayerConfigBuilder`](crate::PlayerConfigBuilder)
    /// enforces.
    pub fn new(
        engine: E,
        output: impl AudioOutput + 'static,
        config: PlayerConfig,
    ) -> Result<Self, PlayerError> {
        config.validate().map_err(PlayerError::InvalidConfig)?;
        Ok(Self {
            shared: Arc::new(Shared {
                playback: Mutex::new(Playback {
                    text: String::new(),
                    is_playing: false,
                    is_paused: false,
                    offset_samples: 0,
                    offset_ms: 0,
                    run: None,
                    listener: None,
                }),
                changed: Condvar::new(),
            }),
            engine: Arc::new(Mutex::new(engine)),
            output: Arc::new(output),
            config,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Register a callback invoked after every status change.
    pub fn set_state_listener(&self, listener: impl Fn(PlayerStatus) + Send + Sync + 'static) {
        self.shared.lock().listener = Some(Arc::new(listener));
    }

    /// Stop any playback and load `text` from its beginning.
    pub fn load_text(&self, text: &str) {
        self.stop();
        let mut playback = self.shared.lock();
        playback.text = text.to_string();
        playback.reset_offset();
    }

    /// Start playing the loaded text from the current offset.
    ///
    /// Does nothing when no text is loaded or playback is already running.
    pub fn play(&self) -> Result<(), PlayerError> {
        let (text, skip_samples, token) = {
            let mut playback = self.shared.lock();
            if playback.text.is_empty() || playback.is_playing {
                return Ok(());
            }
            playback.offset_samples = ms_to_samples(playback.offset_ms, self.config.sample_rate);

            let token = Arc::new(AtomicBool::new(false));
            if let Some(previous) = playback.run.replace(Arc::clone(&token)) {
                previous.store(true, Ordering::SeqCst);
            }
            playback.is_playing = true;
            playback.is_paused = false;
            (playback.text.clone(), playback.offset_samples, token)
        };

        let run = PlaybackRun {
            shared: Arc::clone(&self.shared),
            engine: Arc::clone(&self.engine),
            output: Arc::clone(&self.output),
            config: self.config.clone(),
            token,
        };
        let spawned = thread::Builder::new()
            .name("tts-playback".to_string())
            .spawn(move || run.run(text, skip_samples));

        if let Err(e) = spawned {
            let mut playback = self.shared.lock();
            playback.is_playing = false;
            playback.run = None;
            return Err(PlayerError::Spawn(e));
        }

        log::debug!("Playback started at sample {}", skip_samples);
        self.shared.notify();
        Ok(())
    }

    pub fn pause(&self) {
        {
            let mut playback = self.shared.lock();
            if !playback.is_playing || playback.is_paused {
                return;
            }
            playback.is_paused = true;
        }
        self.shared.notify();
    }

    pub fn resume(&self) {
        {
            let mut playback = self.shared.lock();
            if !playback.is_paused {
                return;
            }
            playback.is_paused = false;
        }
        self.shared.changed.notify_all();
        self.shared.notify();
    }

    /// Cancel playback and forget the loaded text and offset.
    pub fn stop(&self) {
        {
            let mut playback = self.shared.lock();
            playback.is_playing = false;
            playback.is_paused = false;
            playback.reset_offset();
            playback.text.clear();
            if let Some(run) = playback.run.take() {
                run.store(true, Ordering::SeqCst);
            }
        }
        self.shared.changed.notify_all();
        self.shared.notify();
    }

    /// Position of the playback cursor in the loaded text's audio.
    pub fn offset_ms(&self) -> u64 {
        self.shared.lock().offset_ms
    }

    /// Move the cursor; takes effect on the next [`play`](Self::play).
    pub fn set_offset_ms(&self, offset_ms: u64) {
        let mut playback = self.shared.lock();
        playback.offset_ms = offset_ms;
        playback.offset_samples = ms_to_samples(offset_ms, self.config.sample_rate);
    }

    pub fn status(&self) -> PlayerStatus {
        self.shared.lock().status()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.lock().is_playing
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().is_paused
    }

    pub fn text(&self) -> String {
        self.shared.lock().text.clone()
    }

    /// Block until playback is no longer running. Returns `false` on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut playback = self.shared.lock();
        while playback.is_playing {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = (deadline - now).min(POLL_INTERVAL);
            playback = self
                .shared
                .changed
                .wait_timeout(playback, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Everything one playback thread needs.
struct PlaybackRun<E> {
    shared: Arc<Shared>,
    engine: Arc<Mutex<E>>,
    output: Arc<dyn AudioOutput>,
    config: PlayerConfig,
    token: Arc<AtomicBool>,
}

enum Outcome {
    Finished,
    Cancelled,
}

type Segment = Result<Vec<f32>, String>;

impl<E: SynthesisEngine + 'static> PlaybackRun<E> {
    fn cancelled(&self) -> bool {
        self.token.load(Ordering::SeqCst)
    }

    fn run(self, text: String, skip_samples: u64) {
        let (tx, rx) = mpsc::sync_channel(self.config.queue_depth);
        let producer = Producer {
            engine: Arc::clone(&self.engine),
            params: self.config.voice_params(),
            volume: self.config.volume,
            sample_rate: self.config.sample_rate,
            token: Arc::clone(&self.token),
        };
        let outcome = match thread::Builder::new()
            .name("tts-synthesis".to_string())
            .spawn(move || producer.produce(&text, tx))
        {
            Ok(handle) => self.consume(rx, handle, skip_samples),
            Err(e) => Err(PlayerError::Spawn(e).into()),
        };

        let finished_normally = match outcome {
            Ok(Outcome::Finished) => true,
            Ok(Outcome::Cancelled) => false,
            Err(e) => {
                log::error!("Playback failed: {}", e);
                false
            }
        };
        self.finish(finished_normally);
    }

    fn consume(
        &self,
        rx: Receiver<Segment>,
        producer: JoinHandle<()>,
        skip_samples: u64,
    ) -> Result<Outcome, BoxError> {
        let mut sink = self
            .output
            .open(self.config.sample_rate, self.config.block_size)
            .map_err(|e| PlayerError::Output(e.to_string()))?;
        sink.start()?;

        let played = self.pump(sink.as_mut(), rx, producer, skip_samples);
        let stopped = sink.stop();
        let outcome = played?;
        stopped?;
        Ok(outcome)
    }

    fn pump(
        &self,
        sink: &mut dyn AudioSink,
        rx: Receiver<Segment>,
        producer: JoinHandle<()>,
        mut skip_samples: u64,
    ) -> Result<Outcome, BoxError> {
        loop {
            if self.cancelled() {
                return Ok(Outcome::Cancelled);
            }
            let segment = match rx.recv_timeout(POLL_INTERVAL) {
                Ok(segment) => segment?,
                Err(RecvTimeoutError::Timeout) => continue,
                // the sender is gone once the producer returns or unwinds
                Err(RecvTimeoutError::Disconnected) => {
                    return match producer.join() {
                        Ok(()) => Ok(Outcome::Finished),
                        Err(_) => Err(PlayerError::SynthesisPanicked.into()),
                    };
                }
            };

            let len = segment.len() as u64;
            if skip_samples >= len {
                skip_samples -= len;
                continue;
            }
            let start = skip_samples as usize;
            skip_samples = 0;

            if self.play_segment(sink, &segment[start..])? {
                return Ok(Outcome::Cancelled);
            }
        }
    }

    /// Returns `true` when the run was cancelled mid-segment.
    fn play_segment(&self, sink: &mut dyn AudioSink, segment: &[f32]) -> Result<bool, BoxError> {
        for block in segment.chunks(self.config.block_size) {
            if self.cancelled() || self.wait_while_paused(sink)? {
                return Ok(true);
            }
            sink.write(block)?;

            let mut playback = self.shared.lock();
            if !self.cancelled() {
                playback.offset_samples =
                    playback.offset_samples.saturating_add(block.len() as u64);
                playback.offset_ms = samples_to_ms(playback.offset_samples, self.config.sample_rate);
            }
        }
        Ok(false)
    }

    /// Hold the sink stopped while paused. Returns `true` if cancelled.
    fn wait_while_paused(&self, sink: &mut dyn AudioSink) -> Result<bool, BoxError> {
        if !self.shared.lock().is_paused {
            return Ok(false);
        }
        sink.stop()?;

        let mut playback = self.shared.lock();
        while playback.is_paused && !self.cancelled() {
            playback = self
                .shared
                .changed
                .wait_timeout(playback, POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(playback);

        if self.cancelled() {
            return Ok(true);
        }
        sink.start()?;
        Ok(false)
    }

    fn finish(&self, finished_normally: bool) {
        let current = {
            let mut playback = self.shared.lock();
            let current = playback
                .run
                .as_ref()
                .is_some_and(|run| Arc::ptr_eq(run, &self.token));
            if current {
                if finished_normally && playback.is_playing && !playback.is_paused {
                    playback.reset_offset();
                }
                playback.is_playing = false;
                playback.is_paused = false;
                playback.run = None;
            }
            current
        };
        self.shared.changed.notify_all();
        if current {
            log::debug!("Playback thread finished");
            self.shared.notify();
        }
    }
}

struct Producer<E> {
    engine: Arc<Mutex<E>>,
    params: VoiceParams,
    volume: f32,
    sample_rate: u32,
    token: Arc<AtomicBool>,
}

impl<E: SynthesisEngine> Producer<E> {
    fn produce(self, text: &str, tx: SyncSender<Segment>) {
        for segment in segments(text) {
            if self.token.load(Ordering::SeqCst) {
                break;
            }
            let result = self
                .engine
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .synthesize(segment, &self.params);

            let item = match result {
                Ok(audio) => {
                    if audio.sample_rate != self.sample_rate {
                        log::warn!(
                            "Engine produced {} Hz audio, output runs at {} Hz",
                            audio.sample_rate,
                            self.sample_rate
                        );
                    }
                    Ok(to_float32(&audio.samples, self.volume))
                }
                Err(e) => Err(format!("synthesis failed: {e}")),
            };
            let failed = item.is_err();
            // a closed channel means playback ended
            if tx.send(item).is_err() || failed {
                break;
            }
        }
    }
}

/// Apply `volume` and clamp to `[-1.0, 1.0]`. An empty segment becomes a
/// single silent sample.
pub fn to_float32(samples: &[f32], volume: f32) -> Vec<f32> {
    if samples.is_empty() {
        return vec![0.0];
    }
    samples
        .iter()
        .map(|&s| (s * volume).clamp(-1.0, 1.0))
        .collect()
}

/// Saturates at `u64::MAX` for offsets past any real recording.
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> u64 {
    ms.saturating_mul(sample_rate as u64) / 1000
}

/// Returns 0 for a zero `sample_rate`.
pub fn samples_to_ms(samples: u64, sample_rate: u32) -> u64 {
    samples
        .saturating_mul(1000)
        .checked_div(sample_rate as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MemoryOutput, SynthesisResult};
    use crate::config::PlayerConfigBuilder;

    /// Produces `samples_per_char` samples of 0.5 per input character.
    struct FixedEngine {
        samples_per_char: usize,
        fail_on: Option<String>,
        panic_on: Option<String>,
    }

    impl FixedEngine {
        fn new(samples_per_char: usize) -> Self {
            Self {
                samples_per_char,
                fail_on: None,
                panic_on: None,
            }
        }
    }

    impl SynthesisEngine for FixedEngine {
        fn synthesize(
            &mut self,
            text: &str,
            _params: &VoiceParams,
        ) -> Result<SynthesisResult, BoxError> {
            if self.fail_on.as_deref() == Some(text) {
                return Err("engine exploded".into());
            }
            if self.panic_on.as_deref() == Some(text) {
                panic!("engine crashed on {text:?}");
            }
            Ok(SynthesisResult {
                samples: vec![0.5; text.chars().count() * self.samples_per_char],
                sample_rate: 1000,
            })
        }
    }

    /// Memory output whose writes take `delay`, so tests can act mid-playback.
    struct SlowOutput {
        inner: MemoryOutput,
        delay: Duration,
    }

    struct SlowSink {
        inner: Box<dyn AudioSink>,
        delay: Duration,
    }

    impl AudioOutput for SlowOutput {
        fn open(&self, sample_rate: u32, block_size: usize) -> Result<Box<dyn AudioSink>, BoxError> {
            Ok(Box::new(SlowSink {
                inner: self.inner.open(sample_rate, block_size)?,
                delay: self.delay,
            }))
        }
    }

    impl AudioSink for SlowSink {
        fn start(&mut self) -> Result<(), BoxError> {
            self.inner.start()
        }

        fn stop(&mut self) -> Result<(), BoxError> {
            self.inner.stop()
        }

        fn write(&mut self, block: &[f32]) -> Result<(), BoxError> {
            thread::sleep(self.delay);
            self.inner.write(block)
        }
    }

    /// Records sink calls and rejects writes after `accept` blocks.
    #[derive(Clone, Default)]
    struct FlakyOutput {
        events: Arc<Mutex<Vec<&'static str>>>,
        accept: usize,
    }

    struct FlakySink {
        events: Arc<Mutex<Vec<&'static str>>>,
        remaining: usize,
    }

    impl AudioOutput for FlakyOutput {
        fn open(&self, _sample_rate: u32, _block_size: usize) -> Result<Box<dyn AudioSink>, BoxError> {
            Ok(Box::new(FlakySink {
                events: Arc::clone(&self.events),
                remaining: self.accept,
            }))
        }
    }

    impl AudioSink for FlakySink {
        fn start(&mut self) -> Result<(), BoxError> {
            self.events.lock().unwrap().push("start");
            Ok(())
        }

        fn stop(&mut self) -> Result<(), BoxError> {
            self.events.lock().unwrap().push("stop");
            Ok(())
        }

        fn write(&mut self, _block: &[f32]) -> Result<(), BoxError> {
            if self.remaining == 0 {
                self.events.lock().unwrap().push("fail");
                return Err("device unplugged".into());
            }
            self.remaining -= 1;
            self.events.lock().unwrap().push("write");
            Ok(())
        }
    }

    fn config(block_size: usize) -> PlayerConfig {
        PlayerConfigBuilder::default()
            .sample_rate(1000)
            .block_size(block_size)
            .build()
            .unwrap()
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn converts_volume_and_clamps() {
        assert_eq!(to_float32(&[2.0, -2.0, 0.25], 2.0), vec![1.0, -1.0, 0.5]);
    }

    #[test]
    fn empty_segment_becomes_silence() {
        assert_eq!(to_float32(&[], 1.0), vec![0.0]);
    }

    #[test]
    fn ms_sample_conversion_round_trips() {
        assert_eq!(ms_to_samples(1000, 24000), 24000);
        assert_eq!(samples_to_ms(24000, 24000), 1000);
        assert_eq!(samples_to_ms(ms_to_samples(1500, 24000), 24000), 1500);
    }

    #[test]
    fn huge_offsets_saturate_instead_of_overflowing() {
        assert_eq!(ms_to_samples(u64::MAX, 24000), u64::MAX / 1000);
        assert_eq!(samples_to_ms(u64::MAX, 24000), u64::MAX / 24000);
        assert_eq!(samples_to_ms(100, 0), 0);
    }

    #[test]
    fn offset_past_the_end_plays_nothing() {
        let output = MemoryOutput::new();
        let player = TtsPlayer::new(FixedEngine::new(10), output.clone(), config(8)).unwrap();

        player.load_text("abc\ndef");
        player.set_offset_ms(1_000_000_000_000_000);
        player.play().unwrap();
        assert!(player.wait_until_idle(WAIT));

        assert!(output.samples().is_empty());
        assert_eq!(player.status(), PlayerStatus::Idle);
    }

    #[test]
    fn rejects_configs_that_bypass_the_builder() {
        let zero_block = PlayerConfig {
            block_size: 0,
            ..config(4)
        };
        let err = TtsPlayer::new(FixedEngine::new(1), MemoryOutput::new(), zero_block)
            .err()
            .unwrap();
        assert!(matches!(err, PlayerError::InvalidConfig(_)));

        let zero_rate = PlayerConfig {
            sample_rate: 0,
            ..config(4)
        };
        assert!(TtsPlayer::new(FixedEngine::new(1), MemoryOutput::new(), zero_rate).is_err());
    }

    #[test]
    fn plays_every_segment_and_resets_offset_at_end() {
        let output = MemoryOutput::new();
        let player = TtsPlayer::new(FixedEngine::new(10), output.clone(), config(7)).unwrap();

        player.load_text("abc\n\ndefg");
        player.play().unwrap();
        assert!(player.wait_until_idle(WAIT));

        assert_eq!(output.samples().len(), 70);
        assert_eq!(output.streams_opened(), 1);
        assert_eq!(player.offset_ms(), 0);
        assert_eq!(player.status(), PlayerStatus::Idle);
        assert_eq!(player.text(), "abc\n\ndefg");
    }

    #[test]
    fn play_skips_audio_before_saved_offset() {
        let output = MemoryOutput::new();
        let player = TtsPlayer::new(FixedEngine::new(10), output.clone(), config(8)).unwrap();

        player.load_text("abcdefghij\nklmnopqrst");
        player.set_offset_ms(150);
        player.play().unwrap();
        assert!(player.wait_until_idle(WAIT));

        assert_eq!(output.samples().len(), 50);
    }

    #[test]
    fn play_without_text_is_a_no_op() {
        let output = MemoryOutput::new();
        let player = TtsPlayer::new(FixedEngine::new(1), output.clone(), config(4)).unwrap();
        player.play().unwrap();
        assert_eq!(player.status(), PlayerStatus::Idle);
        assert_eq!(output.streams_opened(), 0);
    }

    #[test]
    fn pause_holds_offset_until_resume() {
        let output = SlowOutput {
            inner: MemoryOutput::new(),
            delay: Duration::from_millis(2),
        };
        let memory = output.inner.clone();
        let player = TtsPlayer::new(FixedEngine::new(10), output, config(10)).unwrap();

        player.load_text(&"x".repeat(200));
        player.play().unwrap();
        thread::sleep(Duration::from_millis(30));
        player.pause();
        assert_eq!(player.status(), PlayerStatus::Paused);

        // let the in-flight block land
        thread::sleep(Duration::from_millis(50));
        let paused_at = player.offset_ms();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(player.offset_ms(), paused_at);
        assert!(paused_at < 2000);

        player.resume();
        assert_eq!(player.status(), PlayerStatus::Playing);
        assert!(player.wait_until_idle(WAIT));
        assert_eq!(memory.samples().len(), 2000);
    }

    #[test]
    fn pause_and_resume_ignore_wrong_states() {
        let player = TtsPlayer::new(FixedEngine::new(1), MemoryOutput::new(), config(4)).unwrap();
        player.pause();
        assert!(!player.is_paused());
        player.resume();
        assert_eq!(player.status(), PlayerStatus::Idle);
    }

    #[test]
    fn stop_resets_everything() {
        let output = SlowOutput {
            inner: MemoryOutput::new(),
            delay: Duration::from_millis(2),
        };
        let player = TtsPlayer::new(FixedEngine::new(10), output, config(10)).unwrap();

        player.load_text(&"y".repeat(500));
        player.set_offset_ms(100);
        player.play().unwrap();
        thread::sleep(Duration::from_millis(20));
        player.stop();

        assert_eq!(player.status(), PlayerStatus::Idle);
        assert_eq!(player.offset_ms(), 0);
        assert_eq!(player.text(), "");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(player.offset_ms(), 0);
    }

    #[test]
    fn engine_failure_ends_playback_but_keeps_offset() {
        let output = MemoryOutput::new();
        let engine = FixedEngine {
            fail_on: Some("boom".to_string()),
            ..FixedEngine::new(10)
        };
        let player = TtsPlayer::new(engine, output.clone(), config(5)).unwrap();

        player.load_text("abcde\nboom\nnever");
        player.play().unwrap();
        assert!(player.wait_until_idle(WAIT));

        assert_eq!(output.samples().len(), 50);
        assert_eq!(player.offset_ms(), 50);
        assert_eq!(player.status(), PlayerStatus::Idle);
    }

    #[test]
    fn engine_panic_ends_playback_but_keeps_offset() {
        let output = MemoryOutput::new();
        let engine = FixedEngine {
            panic_on: Some("boom".to_string()),
            ..FixedEngine::new(10)
        };
        let player = TtsPlayer::new(engine, output.clone(), config(5)).unwrap();

        player.load_text("abcde\nboom\nnever");
        player.play().unwrap();
        assert!(player.wait_until_idle(WAIT));

        assert_eq!(output.samples().len(), 50);
        assert_eq!(player.offset_ms(), 50);
        assert_eq!(player.status(), PlayerStatus::Idle);
    }

    #[test]
    fn write_failure_stops_the_sink() {
        let output = FlakyOutput {
            accept: 2,
            ..Default::default()
        };
        let events = Arc::clone(&output.events);
        let player = TtsPlayer::new(FixedEngine::new(10), output, config(5)).unwrap();

        player.load_text("abcdefgh");
        player.play().unwrap();
        assert!(player.wait_until_idle(WAIT));

        assert_eq!(
            *events.lock().unwrap(),
            vec!["start", "write", "write", "fail", "stop"]
        );
        assert_eq!(player.offset_ms(), 10);
    }

    #[test]
    fn listener_sees_playing_then_idle() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let player = TtsPlayer::new(FixedEngine::new(1), MemoryOutput::new(), config(4)).unwrap();
        let sink = Arc::clone(&seen);
        player.set_state_listener(move |status| sink.lock().unwrap().push(status));

        player.load_text("hi");
        player.play().unwrap();
        assert!(player.wait_until_idle(WAIT));
        // the worker notifies after flipping state; give it a moment
        thread::sleep(Duration::from_millis(20));

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&PlayerStatus::Playing));
        assert_eq!(seen.last(), Some(&PlayerStatus::Idle));
    }
}
