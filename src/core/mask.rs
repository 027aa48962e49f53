use ndarray::{s, Array4, ArrayView1};

/// Per-stem, per-channel mask frames, appended one patch at a time.
#[derive(Clone, Debug)]
pub struct MaskAccumulator {
    bins: usize,
    frames: usize,
    // stems x channel -> row-major [frames * bins]
    masks: Vec<[Vec<f32>; 2]>,
}

impl MaskAccumulator {
    pub fn new(stems: usize, bins: usize) -> Self {
        Self {
            bins,
            frames: 0,
            masks: (0..stems).map(|_| [Vec::new(), Vec::new()]).collect(),
        }
    }

    pub fn with_capacity(stems: usize, bins: usize, frames: usize) -> Self {
        Self {
            bins,
            frames: 0,
            masks: (0..stems)
                .map(|_| {
                    [
                        Vec::with_capacity(frames * bins),
                        Vec::with_capacity(frames * bins),
                    ]
                })
                .collect(),
        }
    }

    pub fn stems(&self) -> usize {
        self.masks.len()
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Frames appended so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Append one patch: `patch_masks[stem]` shaped `(1, L, bins, 2)`.
    pub fn push_patch(&mut self, patch_masks: &[Array4<f32>]) {
        debug_assert_eq!(patch_masks.len(), self.masks.len());
        let mut added = 0;
        for (stem, m) in self.masks.iter_mut().zip(patch_masks) {
            added = m.shape()[1];
            for (ch, dst) in stem.iter_mut().enumerate() {
                // (L, bins) in logical order regardless of memory layout
                dst.extend(m.slice(s![0, .., .., ch]).iter().copied());
            }
        }
        self.frames += added;
    }

    /// Mask row for one stem, channel and frame.
    pub fn frame(&self, stem: usize, ch: usize, frame: usize) -> &[f32] {
        let start = frame * self.bins;
        &self.masks[stem][ch][start..start + self.bins]
    }
}

/// Masked magnitude for one frame: `mask * original` below the model band, zero above.
pub fn band_extend(mask: &[f32], original: ArrayView1<'_, f32>, out: &mut [f32]) {
    debug_assert_eq!(original.len(), out.len());
    let band = mask.len().min(out.len());
    for ((o, &m), &x) in out[..band].iter_mut().zip(mask).zip(original.iter()) {
        *o = m * x;
    }
    out[band..].fill(0.0);
}
