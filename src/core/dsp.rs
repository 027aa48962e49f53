use ndarray::{Array2, ArrayView1};
use num_complex::Complex32;
use once_cell::sync::Lazy;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// FFT plans and window for one `(n_fft, hop)` geometry.
pub struct StftPlan {
    n_fft: usize,
    hop: usize,
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
    hann_window: Vec<f32>,
}

static PLAN_CACHE: Lazy<Mutex<HashMap<(usize, usize), Arc<StftPlan>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Magnitude/phase frames of one channel, shape `[frames, n_fft/2 + 1]`.
#[derive(Clone, Debug)]
pub struct ChannelSpectrum {
    pub magnitude: Array2<f32>,
    pub phase: Array2<f32>,
}

impl ChannelSpectrum {
    pub fn frames(&self) -> usize {
        self.magnitude.nrows()
    }

    pub fn bins(&self) -> usize {
        self.magnitude.ncols()
    }
}

pub fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = (n_fft - 1) as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

impl StftPlan {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop,
            fft_forward: planner.plan_fft_forward(n_fft),
            fft_inverse: planner.plan_fft_inverse(n_fft),
            hann_window: compute_hann(n_fft),
        }
    }

    /// Shared plan for this geometry, built on first use.
    pub fn cached(n_fft: usize, hop: usize) -> Arc<StftPlan> {
        let mut cache = PLAN_CACHE.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry((n_fft, hop))
            .or_insert_with(|| Arc::new(StftPlan::new(n_fft, hop)))
            .clone()
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Frames needed to cover `samples`, rounding the tail up.
    pub fn frame_count(&self, samples: usize) -> usize {
        samples.div_ceil(self.hop)
    }

    /// Sum of squared Hann windows at this hop: `3 * n_fft / (8 * hop)`.
    /// Equals 1.5 for 4096/1024.
    pub fn overlap_gain(&self) -> f32 {
        3.0 * self.n_fft as f32 / (8.0 * self.hop as f32)
    }

    /// Forward STFT of one channel. Frame `i` starts at `i * hop`; samples past the
    /// end of `signal` read as zero.
    pub fn analyze(&self, signal: &[f32], frames: usize) -> ChannelSpectrum {
        let n_fft = self.n_fft;
        let bins = self.freq_bins();
        let window = &self.hann_window;

        let mut magnitude = Array2::<f32>::zeros((frames, bins));
        let mut phase = Array2::<f32>::zeros((frames, bins));
        let mut buf = vec![Complex32::zero(); n_fft];

        for fr in 0..frames {
            let start = fr * self.hop;
            for (i, slot) in buf.iter_mut().enumerate() {
                let x = signal.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex32::new(x * window[i], 0.0);
            }

            self.fft_forward.process(&mut buf);

            let mut mag_row = magnitude.row_mut(fr);
            let mut phase_row = phase.row_mut(fr);
            for fi in 0..bins {
                let c = buf[fi];
                mag_row[fi] = (c.re * c.re + c.im * c.im).sqrt();
                phase_row[fi] = c.im.atan2(c.re);
            }
        }

        ChannelSpectrum { magnitude, phase }
    }

    /// Inverse-transform one magnitude/phase frame and overlap-add it into `out` at
    /// `frame * hop`. Writes past the end of `out` are dropped. `scratch` must hold
    /// `n_fft` values.
    pub fn overlap_add(
        &self,
        magnitude: &[f32],
        phase: ArrayView1<'_, f32>,
        frame: usize,
        scratch: &mut [Complex32],
        out: &mut [f32],
    ) {
        let n_fft = self.n_fft;
        let f_bins = self.freq_bins();
        debug_assert_eq!(magnitude.len(), f_bins);
        debug_assert_eq!(phase.len(), f_bins);
        debug_assert_eq!(scratch.len(), n_fft);

        scratch.fill(Complex32::zero());

        for fi in 0..f_bins {
            scratch[fi] = Complex32::from_polar(magnitude[fi], phase[fi]);
        }

        // Negative frequencies are the conjugate mirror
        for fi in 1..n_fft / 2 {
            scratch[n_fft - fi] = scratch[fi].conj();
        }

        // DC and Nyquist are real
        scratch[0].im = 0.0;
        scratch[n_fft / 2].im = 0.0;

        self.fft_inverse.process(scratch);

        let scale = 1.0 / (n_fft as f32);
        let start = frame * self.hop;
        if start >= out.len() {
            return;
        }
        let end = (start + n_fft).min(out.len());
        for (i, o) in out[start..end].iter_mut().enumerate() {
            *o += scratch[i].re * self.hann_window[i] * scale;
        }
    }
}
