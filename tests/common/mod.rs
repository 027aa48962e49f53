#![allow(dead_code)]

use std::{cell::Cell, f32::consts::PI, rc::Rc};

use anyhow::{anyhow, Result};
use ndarray::Array4;
use spectral_stem_splitter::{SeparationConfig, Separator, StemCount, WaveformBuffer};

/// Small geometry so tests run quickly: 256/64 Hann, 4-frame patches.
pub fn small_config() -> SeparationConfig {
    SeparationConfig {
        sample_rate: 44_100,
        n_fft: 256,
        hop: 64,
        patch_length: 4,
        mask_epsilon: 1e-10,
    }
}

/// Every stem gets the input magnitudes back.
pub struct Passthrough {
    pub stems: StemCount,
    pub calls: Rc<Cell<usize>>,
}

impl Passthrough {
    pub fn new(stems: StemCount) -> Self {
        Self {
            stems,
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl Separator for Passthrough {
    fn stems(&self) -> StemCount {
        self.stems
    }

    fn separate(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        self.calls.set(self.calls.get() + 1);
        Ok(vec![input.clone(); self.stems.count()])
    }
}

/// Always answers with silence, like an exhausted device.
pub struct ZeroOutput(pub StemCount);

impl Separator for ZeroOutput {
    fn stems(&self) -> StemCount {
        self.0
    }

    fn separate(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        Ok(vec![Array4::zeros(input.raw_dim()); self.0.count()])
    }
}

/// Constant output regardless of input.
pub struct Constant(pub StemCount, pub f32);

impl Separator for Constant {
    fn stems(&self) -> StemCount {
        self.0
    }

    fn separate(&mut self, input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        Ok(vec![Array4::from_elem(input.raw_dim(), self.1); self.0.count()])
    }
}

/// The model call itself errors.
pub struct Failing(pub StemCount);

impl Separator for Failing {
    fn stems(&self) -> StemCount {
        self.0
    }

    fn separate(&mut self, _input: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        Err(anyhow!("device out of memory"))
    }
}

/// Two tones per channel, both well below a quarter of the sample rate.
pub fn tone_pair(samples: usize, n_fft: usize) -> WaveformBuffer {
    let n = n_fft as f32;
    let left = (0..samples)
        .map(|i| {
            let t = i as f32;
            0.5 * (2.0 * PI * 8.0 * t / n).sin() + 0.2 * (2.0 * PI * 3.3 * t / n).sin()
        })
        .collect();
    let right = (0..samples)
        .map(|i| {
            let t = i as f32;
            0.4 * (2.0 * PI * 12.0 * t / n).cos() - 0.1 * (2.0 * PI * 5.0 * t / n).sin()
        })
        .collect();
    WaveformBuffer {
        left,
        right,
        sample_rate: 44_100,
    }
}

pub fn silence(samples: usize) -> WaveformBuffer {
    WaveformBuffer {
        left: vec![0.0; samples],
        right: vec![0.0; samples],
        sample_rate: 44_100,
    }
}
