use derive_builder::Builder;

use crate::audio::VoiceParams;

/// Output sample rate used by the default configuration.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Playback and timing parameters.
///
/// ```rust
/// use tts_reader::PlayerConfigBuilder;
///
/// let config = PlayerConfigBuilder::default()
///     .voice("bf_emma")
///     .speed(0.9)
///     .build()?;
/// assert_eq!(config.sample_rate, 24000);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct PlayerConfig {
    /// Sample rate of the output stream in Hz.
    pub sample_rate: u32,
    /// Samples written to the sink per block.
    pub block_size: usize,
    /// Voice name handed to the engine.
    #[builder(setter(into))]
    pub voice: String,
    /// Speech speed multiplier.
    pub speed: f32,
    /// Gain applied to every synthesized sample before clamping.
    pub volume: f32,
    /// Synthesized segments buffered ahead of the playback cursor.
    pub queue_depth: usize,
    /// Estimated milliseconds per character at speed 1.0, used for
    /// sentence highlight timing.
    pub ms_per_char_base: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: 2048,
            voice: "af_heart".to_string(),
            speed: 1.2,
            volume: 1.0,
            queue_depth: 4,
            ms_per_char_base: 65.0,
        }
    }
}

impl PlayerConfig {
    /// Estimated milliseconds per character at the configured speed.
    pub fn ms_per_char(&self) -> f64 {
        self.ms_per_char_base / self.speed as f64
    }

    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            voice: self.voice.clone(),
            speed: self.speed,
        }
    }

    /// Check the same constraints the builder enforces. Needed for configs
    /// assembled with struct literal syntax.
    pub fn validate(&self) -> Result<(), String> {
        check_positive("sample_rate", self.sample_rate as u64)?;
        check_positive("block_size", self.block_size as u64)?;
        check_positive("queue_depth", self.queue_depth as u64)?;
        check_speed(self.speed)
    }
}

fn check_positive(name: &str, value: u64) -> Result<(), String> {
    if value == 0 {
        return Err(format!("{name} must be positive"));
    }
    Ok(())
}

fn check_speed(speed: f32) -> Result<(), String> {
    if !(speed > 0.0) {
        return Err(format!("speed must be positive, got {speed}"));
    }
    Ok(())
}

impl PlayerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(rate) = self.sample_rate {
            check_positive("sample_rate", rate as u64)?;
        }
        if let Some(size) = self.block_size {
            check_positive("block_size", size as u64)?;
        }
        if let Some(depth) = self.queue_depth {
            check_positive("queue_depth", depth as u64)?;
        }
        if let Some(speed) = self.speed {
            check_speed(speed)?;
        }
        Ok(())
    }
}
