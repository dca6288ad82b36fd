//! A queue of texts to speak one after another.
//!
//! [`SpeechQueue`] sits in front of a [`Speaker`]: `speak` interrupts
//! whatever is playing, `add_to_queue` waits its turn. A background worker
//! starts the next queued text whenever the speaker goes idle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::SynthesisEngine;
use crate::player::{PlayerError, TtsPlayer};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Something that can speak one text at a time.
pub trait Speaker: Send + Sync + 'static {
    fn load_text(&self, text: &str);
    fn play(&self) -> Result<(), PlayerError>;
    fn stop(&self);
    /// Playing or paused.
    fn is_busy(&self) -> bool;
}

impl<E: SynthesisEngine + 'static> Speaker for TtsPlayer<E> {
    fn load_text(&self, text: &str) {
        TtsPlayer::load_text(self, text);
    }

    fn play(&self) -> Result<(), PlayerError> {
        TtsPlayer::play(self)
    }

    fn stop(&self) {
        TtsPlayer::stop(self);
    }

    fn is_busy(&self) -> bool {
        self.is_playing() || self.is_paused()
    }
}

struct QueueShared<S> {
    speaker: S,
    pending: Mutex<VecDeque<String>>,
    shutdown: AtomicBool,
}

impl<S: Speaker> QueueShared<S> {
    fn pending(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, text: &str) {
        self.speaker.load_text(text);
        if let Err(e) = self.speaker.play() {
            log::error!("Failed to start speech: {}", e);
        }
    }
}

pub struct SpeechQueue<S: Speaker> {
    shared: Arc<QueueShared<S>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Speaker> SpeechQueue<S> {
    pub fn new(speaker: S) -> std::io::Result<Self> {
        Self::with_poll_interval(speaker, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(speaker: S, poll_interval: Duration) -> std::io::Result<Self> {
        let shared = Arc::new(QueueShared {
            speaker,
            pending: Mutex::new(VecDeque::new()),
            shutdown: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("speech-queue".to_string())
            .spawn(move || {
                while !worker_shared.shutdown.load(Ordering::SeqCst) {
                    {
                        let mut pending = worker_shared.pending();
                        if !pending.is_empty() && !worker_shared.speaker.is_busy() {
                            if let Some(text) = pending.pop_front() {
                                log::debug!("Starting queued text ({} left)", pending.len());
                                worker_shared.start(&text);
                            }
                        }
                    }
                    thread::sleep(poll_interval);
                }
            })?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub fn speaker(&self) -> &S {
        &self.shared.speaker
    }

    /// Drop everything queued and speak `text` right away.
    ///
    /// Returns `false` for blank text.
    pub fn speak(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let mut pending = self.shared.pending();
        pending.clear();
        self.shared.start(text);
        true
    }

    /// Queue `text` behind whatever is playing. Returns `false` for blank text.
    pub fn add_to_queue(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.shared.pending().push_back(text.to_string());
        true
    }

    /// Drop everything queued and stop the speaker.
    pub fn stop(&self) {
        let mut pending = self.shared.pending();
        pending.clear();
        self.shared.speaker.stop();
    }

    pub fn queue_size(&self) -> usize {
        self.shared.pending().len()
    }

    /// Stop the background worker. Queued texts are kept but never played.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Speech queue worker panicked");
            }
        }
    }
}

impl<S: Speaker> Drop for SpeechQueue<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Records what it was asked to play; each play lasts `play_for`.
    #[derive(Default)]
    struct FakeSpeaker {
        inner: Mutex<FakeState>,
        play_for: Duration,
    }

    #[derive(Default)]
    struct FakeState {
        current: String,
        played: Vec<String>,
        busy_until: Option<Instant>,
        stops: usize,
    }

    impl FakeSpeaker {
        fn new(play_for: Duration) -> Self {
            Self {
                play_for,
                ..Self::default()
            }
        }

        fn played(&self) -> Vec<String> {
            self.inner.lock().unwrap().played.clone()
        }
    }

    impl Speaker for FakeSpeaker {
        fn load_text(&self, text: &str) {
            self.inner.lock().unwrap().current = text.to_string();
        }

        fn play(&self) -> Result<(), PlayerError> {
            let mut state = self.inner.lock().unwrap();
            let current = state.current.clone();
            state.played.push(current);
            state.busy_until = Some(Instant::now() + self.play_for);
            Ok(())
        }

        fn stop(&self) {
            let mut state = self.inner.lock().unwrap();
            state.stops += 1;
            state.busy_until = None;
        }

        fn is_busy(&self) -> bool {
            self.inner
                .lock()
                .unwrap()
                .busy_until
                .is_some_and(|until| Instant::now() < until)
        }
    }

    fn wait_until(predicate: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn queue(play_for: Duration) -> SpeechQueue<FakeSpeaker> {
        SpeechQueue::with_poll_interval(FakeSpeaker::new(play_for), Duration::from_millis(5))
            .unwrap()
    }

    #[test]
    fn speak_clears_queue_and_plays_immediately() {
        let queue = queue(Duration::from_millis(200));
        queue.add_to_queue("queued one");
        queue.add_to_queue("queued two");

        assert!(queue.speak("  immediate text  "));

        assert_eq!(queue.speaker().played().last().unwrap(), "immediate text");
        assert_eq!(queue.queue_size(), 0);
    }

    #[test]
    fn queued_texts_play_in_order() {
        let queue = queue(Duration::from_millis(20));
        queue.add_to_queue("first");
        queue.add_to_queue("second");
        queue.add_to_queue("third");

        assert!(wait_until(|| queue.speaker().played().len() == 3));
        assert_eq!(queue.speaker().played(), vec!["first", "second", "third"]);
    }

    #[test]
    fn blank_text_is_rejected() {
        let queue = queue(Duration::from_millis(10));
        assert!(!queue.speak("   "));
        assert!(!queue.add_to_queue("\n\t"));
        assert_eq!(queue.queue_size(), 0);
        assert!(queue.speaker().played().is_empty());
    }

    #[test]
    fn stop_clears_queue_and_stops_speaker() {
        let queue = queue(Duration::from_secs(10));
        queue.speak("long text");
        queue.add_to_queue("later");
        queue.stop();

        assert_eq!(queue.queue_size(), 0);
        assert_eq!(queue.speaker().inner.lock().unwrap().stops, 1);
    }

    #[test]
    fn shutdown_stops_worker() {
        let mut queue = queue(Duration::from_millis(1));
        queue.shutdown();
        queue.add_to_queue("never");
        thread::sleep(Duration::from_millis(30));
        assert!(queue.speaker().played().is_empty());
        assert_eq!(queue.queue_size(), 1);
    }
}
