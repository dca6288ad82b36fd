//! Synthesis and audio output seams.
//!
//! Speech synthesis and the sound device are supplied from outside the
//! crate. [`SynthesisEngine`] is the hook for a TTS backend and
//! [`AudioOutput`] / [`AudioSink`] for the device the player writes to.
//! Two outputs ship with the crate: [`WavOutput`] renders playback into a
//! WAV file and [`MemoryOutput`] keeps the samples in memory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Error type used at the engine and output seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug, Clone, Default)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), BoxError> {
        let mut writer = hound::WavWriter::create(path, float_mono_spec(self.sample_rate))?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Voice selection passed to the engine with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    /// Voice name (e.g. `"af_heart"`).
    pub voice: String,
    /// Speech speed multiplier.
    pub speed: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: "af_heart".to_string(),
            speed: 1.0,
        }
    }
}

/// Common interface for text-to-speech synthesis engines.
///
/// The player calls `synthesize` once per text segment from its producer
/// thread, so implementations must be `Send`.
pub trait SynthesisEngine: Send {
    /// Synthesize speech from the given text.
    fn synthesize(&mut self, text: &str, params: &VoiceParams) -> Result<SynthesisResult, BoxError>;

    /// Synthesize speech from the given text and write to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesisResult::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        wav_path: &Path,
        params: &VoiceParams,
    ) -> Result<(), BoxError> {
        self.synthesize(text, params)?.write_wav(wav_path)
    }
}

/// A device (or stand-in) that playback streams can be opened on.
pub trait AudioOutput: Send + Sync {
    /// Open a mono f32 stream. The sink starts stopped.
    fn open(&self, sample_rate: u32, block_size: usize) -> Result<Box<dyn AudioSink>, BoxError>;
}

/// An open output stream.
pub trait AudioSink: Send {
    fn start(&mut self) -> Result<(), BoxError>;
    fn stop(&mut self) -> Result<(), BoxError>;
    /// Write one block of samples. Blocks until the sink accepted them.
    fn write(&mut self, block: &[f32]) -> Result<(), BoxError>;
}

fn float_mono_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

/// Renders playback into a WAV file instead of a sound device.
///
/// Every `open` truncates the file, so the file holds the most recent run.
#[derive(Debug, Clone)]
pub struct WavOutput {
    path: PathBuf,
}

impl WavOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioOutput for WavOutput {
    fn open(&self, sample_rate: u32, _block_size: usize) -> Result<Box<dyn AudioSink>, BoxError> {
        let writer = hound::WavWriter::create(&self.path, float_mono_spec(sample_rate))?;
        log::debug!("Opened WAV output at {}", self.path.display());
        Ok(Box::new(WavSink {
            writer: Some(writer),
            active: false,
        }))
    }
}

struct WavSink {
    writer: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>>,
    active: bool,
}

impl AudioSink for WavSink {
    fn start(&mut self) -> Result<(), BoxError> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.active = false;
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn write(&mut self, block: &[f32]) -> Result<(), BoxError> {
        if !self.active {
            return Err("write to a stopped WAV sink".into());
        }
        let writer = self.writer.as_mut().ok_or("WAV sink already finalized")?;
        for &sample in block {
            writer.write_sample(sample)?;
        }
        Ok(())
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                log::error!("Failed to finalize WAV output: {}", e);
            }
        }
    }
}

/// Collects everything written to it; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    inner: Arc<Mutex<MemoryBuffer>>,
}

#[derive(Debug, Default)]
struct MemoryBuffer {
    samples: Vec<f32>,
    blocks: usize,
    opened: usize,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// All samples written so far, across every opened stream.
    pub fn samples(&self) -> Vec<f32> {
        self.lock().samples.clone()
    }

    /// Number of `write` calls received.
    pub fn blocks_written(&self) -> usize {
        self.lock().blocks
    }

    /// Number of streams opened.
    pub fn streams_opened(&self) -> usize {
        self.lock().opened
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryBuffer> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AudioOutput for MemoryOutput {
    fn open(&self, _sample_rate: u32, _block_size: usize) -> Result<Box<dyn AudioSink>, BoxError> {
        self.lock().opened += 1;
        Ok(Box::new(MemorySink {
            output: self.clone(),
            active: false,
        }))
    }
}

struct MemorySink {
    output: MemoryOutput,
    active: bool,
}

impl AudioSink for MemorySink {
    fn start(&mut self) -> Result<(), BoxError> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.active = false;
        Ok(())
    }

    fn write(&mut self, block: &[f32]) -> Result<(), BoxError> {
        if !self.active {
            return Err("write to a stopped memory sink".into());
        }
        let mut buffer = self.output.lock();
        buffer.samples.extend_from_slice(block);
        buffer.blocks += 1;
        Ok(())
    }
}
