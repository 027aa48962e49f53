use log::{debug, warn};
use ndarray::{s, Array4, Zip};

use crate::{
    core::{dsp::ChannelSpectrum, scheduler::Patch},
    error::{Result, StemError},
    model::Separator,
};

/// Model input for one patch, `(1, L, bins, 2)`, plus whether every magnitude is zero.
pub fn build_patch_input(
    spectrum: &[ChannelSpectrum; 2],
    patch: &Patch,
    model_bins: usize,
) -> (Array4<f32>, bool) {
    let mut x = Array4::<f32>::zeros((1, patch.len, model_bins, 2));
    for (ch, spec) in spectrum.iter().enumerate() {
        let src = spec
            .magnitude
            .slice(s![patch.start_frame..patch.start_frame + patch.len, ..model_bins]);
        x.slice_mut(s![0, .., .., ch]).assign(&src);
    }
    let silent = x.iter().all(|&v| v == 0.0);
    (x, silent)
}

/// Convert raw model outputs into soft power masks, in place.
///
/// Per element: `mask_i = (y_i^2 + eps/N) / (eps + sum_j y_j^2)`, evaluated in f64 so
/// large outputs cannot overflow. Every mask lies in (0, 1] and the masks sum to 1 up
/// to `eps`.
pub fn soft_masks(outputs: &mut [Array4<f32>], eps: f32) {
    let n = outputs.len();
    if n == 0 {
        return;
    }
    let eps = f64::from(eps);
    let eps_share = eps / n as f64;

    let mut sum = outputs[0].mapv(|_| eps);
    for y in outputs.iter() {
        Zip::from(&mut sum).and(y).for_each(|acc, &v| {
            let v = f64::from(v);
            *acc += v * v;
        });
    }
    for y in outputs.iter_mut() {
        Zip::from(y).and(&sum).for_each(|v, &total| {
            let raw = f64::from(*v);
            *v = ((raw * raw + eps_share) / total) as f32;
        });
    }
}

/// Run one patch through the separator and return per-stem masks shaped like the input.
///
/// The input and raw output tensors live only for the duration of this call.
pub fn run_patch<S: Separator + ?Sized>(
    separator: &mut S,
    spectrum: &[ChannelSpectrum; 2],
    patch: &Patch,
    model_bins: usize,
    eps: f32,
) -> Result<Vec<Array4<f32>>> {
    let stems = separator.stems().count();
    let (input, silent) = build_patch_input(spectrum, patch, model_bins);

    let mut outputs = separator
        .separate(&input)
        .map_err(|e| StemError::inference(patch.start_frame, format!("{e:#}")))?;

    if outputs.len() != stems {
        return Err(StemError::inference(
            patch.start_frame,
            format!("model returned {} outputs, expected {}", outputs.len(), stems),
        ));
    }
    if let Some(bad) = outputs.iter().find(|y| y.shape() != input.shape()) {
        return Err(StemError::inference(
            patch.start_frame,
            format!(
                "output shape {:?} does not match input shape {:?}",
                bad.shape(),
                input.shape()
            ),
        ));
    }
    drop(input);

    if silent {
        // Silent patches always succeed: every stem gets an equal share.
        if outputs.iter().all(|y| y.iter().all(|&v| v == 0.0)) {
            warn!("patch {} is silent and produced a null result", patch.index);
        }
        for y in outputs.iter_mut() {
            y.fill(0.0);
        }
    } else {
        if outputs.iter().any(|y| y.iter().any(|v| !v.is_finite())) {
            return Err(StemError::inference(
                patch.start_frame,
                "model output contains non-finite values",
            ));
        }
        if outputs.iter().all(|y| y.iter().all(|&v| v == 0.0)) {
            return Err(StemError::inference(
                patch.start_frame,
                "model returned all-zero output for non-silent input (likely out of memory)",
            ));
        }
    }

    soft_masks(&mut outputs, eps);
    debug!(
        "patch {} (frames {:?}): {} masks, silent={}",
        patch.index,
        patch.frames(),
        outputs.len(),
        silent
    );

    Ok(outputs)
}
