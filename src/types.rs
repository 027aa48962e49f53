use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, StemError};

/// Number of stems produced by one conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StemCount {
    Two,
    Four,
    Five,
}

impl StemCount {
    pub fn count(self) -> usize {
        match self {
            StemCount::Two => 2,
            StemCount::Four => 4,
            StemCount::Five => 5,
        }
    }

    /// Semantic label of each stem, in model output order.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            StemCount::Two => &["vocals", "accompaniment"],
            StemCount::Four => &["vocals", "drums", "bass", "other"],
            StemCount::Five => &["vocals", "piano", "drums", "bass", "other"],
        }
    }
}

impl TryFrom<u8> for StemCount {
    type Error = StemError;

    fn try_from(n: u8) -> Result<Self> {
        match n {
            2 => Ok(StemCount::Two),
            4 => Ok(StemCount::Four),
            5 => Ok(StemCount::Five),
            other => Err(StemError::Config(format!(
                "stem count must be 2, 4 or 5 (got {other})"
            ))),
        }
    }
}

impl From<StemCount> for u8 {
    fn from(s: StemCount) -> u8 {
        s.count() as u8
    }
}

impl fmt::Display for StemCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

/// Transform and patch geometry shared by every stage of a conversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeparationConfig {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop: usize,
    pub patch_length: usize,
    pub mask_epsilon: f32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            n_fft: 4096,
            hop: 1024,
            patch_length: 512,
            mask_epsilon: 1e-10,
        }
    }
}

impl SeparationConfig {
    /// Bins per analysis frame, DC through Nyquist.
    pub fn freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Bins the model sees; everything above is zero-filled on reconstruction.
    pub fn model_bins(&self) -> usize {
        self.n_fft / 4
    }

    /// Hop-aligned sample span of one patch.
    pub fn patch_samples(&self) -> usize {
        self.patch_length * self.hop
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(StemError::Config("sample_rate must be > 0".into()));
        }
        if self.n_fft < 4 || self.n_fft % 4 != 0 {
            return Err(StemError::Config(format!(
                "n_fft must be a positive multiple of 4 (got {})",
                self.n_fft
            )));
        }
        if self.hop == 0 || self.hop > self.n_fft {
            return Err(StemError::Config(format!(
                "hop must be in 1..={} (got {})",
                self.n_fft, self.hop
            )));
        }
        if self.patch_length == 0 {
            return Err(StemError::Config("patch_length must be > 0".into()));
        }
        if !(self.mask_epsilon > 0.0 && self.mask_epsilon.is_finite()) {
            return Err(StemError::Config("mask_epsilon must be a small positive value".into()));
        }
        Ok(())
    }
}

/// Stereo input at the pipeline's fixed sample rate.
#[derive(Clone, Debug)]
pub struct WaveformBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl WaveformBuffer {
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if left.len() != right.len() {
            return Err(StemError::UnsupportedInput(format!(
                "channel length mismatch: L={} R={}",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// One reconstructed stem, same length as the input waveform.
#[derive(Clone, Debug)]
pub struct StemWaveform {
    pub label: &'static str,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

/// A stem encoded as a WAV byte buffer plus its suggested file name.
#[derive(Clone, Debug)]
pub struct EncodedStem {
    pub label: &'static str,
    pub file_name: String,
    pub wav: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SplitOptions {
    pub output_dir: String,
    pub stems: StemCount,
    #[serde(default)]
    pub config: SeparationConfig,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            output_dir: ".".into(),
            stems: StemCount::Two,
            config: SeparationConfig::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SplitResult {
    /// `(label, path)` per stem, in model output order.
    pub stems: Vec<(&'static str, String)>,
}
