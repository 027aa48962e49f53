//! # spectral-stem-splitter
//!
//! Separates a stereo mixture into 2, 4 or 5 stems by running a spectral-mask model
//! over fixed-size STFT patches, then rebuilds each stem with overlap-add and encodes
//! it as 16-bit PCM WAV.

pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod types;

pub use crate::{
    core::{
        audio::{decode_audio_bytes, encode_wav, read_audio},
        splitter::{Conversion, Step, StemSplitter},
    },
    error::{Result, StemError},
    io::progress::{set_split_progress_callback, SplitProgress},
    model::{ModelLoader, Separator},
    types::{
        EncodedStem, SeparationConfig, SplitOptions, SplitResult, StemCount, StemWaveform,
        WaveformBuffer,
    },
};
