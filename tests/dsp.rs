use approx::assert_abs_diff_eq;
use num_complex::Complex32;
use rustfft::num_traits::Zero;
use spectral_stem_splitter::core::dsp::{compute_hann, StftPlan};
use std::f32::consts::PI;

#[test]
fn hann_is_symmetric_with_zero_endpoints() {
    let w = compute_hann(9);
    assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-7);
    assert_abs_diff_eq!(w[8], 0.0, epsilon = 1e-7);
    assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-7);
    for i in 0..9 {
        assert_abs_diff_eq!(w[i], w[8 - i], epsilon = 1e-6);
    }
}

#[test]
fn frame_count_rounds_tail_up() {
    let plan = StftPlan::new(4096, 1024);
    assert_eq!(plan.frame_count(0), 0);
    assert_eq!(plan.frame_count(1), 1);
    assert_eq!(plan.frame_count(1024), 1);
    assert_eq!(plan.frame_count(1025), 2);
    assert_eq!(plan.freq_bins(), 2049);
}

#[test]
fn overlap_gain_for_default_geometry() {
    assert_abs_diff_eq!(StftPlan::new(4096, 1024).overlap_gain(), 1.5, epsilon = 1e-7);
    assert_abs_diff_eq!(StftPlan::new(256, 64).overlap_gain(), 1.5, epsilon = 1e-7);
    assert_abs_diff_eq!(StftPlan::new(256, 128).overlap_gain(), 0.75, epsilon = 1e-7);
}

#[test]
fn cached_plan_is_shared() {
    let a = StftPlan::cached(512, 128);
    let b = StftPlan::cached(512, 128);
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

#[test]
fn analyze_shapes_and_zero_padding() {
    let plan = StftPlan::new(64, 16);
    let signal = vec![0.25f32; 40];
    let frames = plan.frame_count(signal.len());
    let spec = plan.analyze(&signal, frames);

    assert_eq!(spec.frames(), 3);
    assert_eq!(spec.bins(), 33);
    assert_eq!(spec.phase.shape(), &[3, 33]);

    // Frames reaching past the signal see zeros, so their DC energy drops
    let dc0 = spec.magnitude[[0, 0]];
    let dc2 = spec.magnitude[[2, 0]];
    assert!(dc0 > dc2);
    assert!(spec.magnitude.iter().all(|&m| m >= 0.0));

    // Entirely past the end
    let spec = plan.analyze(&signal, 5);
    assert!(spec.magnitude.row(4).iter().all(|&m| m == 0.0));
}

#[test]
fn analyze_peaks_at_tone_bin() {
    let n_fft = 256usize;
    let plan = StftPlan::new(n_fft, 64);
    let k = 10usize;
    let signal: Vec<f32> = (0..n_fft)
        .map(|i| (2.0 * PI * k as f32 * i as f32 / n_fft as f32).cos())
        .collect();
    let spec = plan.analyze(&signal, 1);
    let row = spec.magnitude.row(0);
    let peak = row
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(peak, k);
}

#[test]
fn analyze_is_deterministic() {
    let plan = StftPlan::new(128, 32);
    let signal: Vec<f32> = (0..1000).map(|i| ((i * 7919) % 97) as f32 / 97.0 - 0.5).collect();
    let a = plan.analyze(&signal, plan.frame_count(signal.len()));
    let b = plan.analyze(&signal, plan.frame_count(signal.len()));
    assert_eq!(a.magnitude, b.magnitude);
    assert_eq!(a.phase, b.phase);
}

#[test]
fn analyze_overlap_add_roundtrip() {
    let n_fft = 256usize;
    let hop = 64usize;
    let t = 2048usize;
    let plan = StftPlan::new(n_fft, hop);

    let mut signal = vec![0.0f32; t];
    signal[700] = 0.5;
    for (i, s) in signal.iter_mut().enumerate() {
        *s += (i as f32 * 0.03).sin() * 0.3;
    }

    let frames = plan.frame_count(t);
    let spec = plan.analyze(&signal, frames);

    let mut out = vec![0.0f32; t];
    let mut scratch = vec![Complex32::zero(); n_fft];
    for fr in 0..frames {
        let mag = spec.magnitude.row(fr).to_vec();
        plan.overlap_add(&mag, spec.phase.row(fr), fr, &mut scratch, &mut out);
    }
    let gain = plan.overlap_gain();

    // Only the fully overlapped interior reconstructs
    for i in n_fft..(t - n_fft) {
        assert_abs_diff_eq!(out[i] / gain, signal[i], epsilon = 1e-2);
    }
}

#[test]
fn overlap_add_drops_writes_past_end() {
    let plan = StftPlan::new(64, 16);
    let signal = vec![0.1f32; 64];
    let spec = plan.analyze(&signal, 4);
    let mut out = vec![0.0f32; 40];
    let mut scratch = vec![Complex32::zero(); 64];
    for fr in 0..4 {
        let mag = spec.magnitude.row(fr).to_vec();
        plan.overlap_add(&mag, spec.phase.row(fr), fr, &mut scratch, &mut out);
    }
    assert_eq!(out.len(), 40);
    assert!(out.iter().all(|v| v.is_finite()));
}
