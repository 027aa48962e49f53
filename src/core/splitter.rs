use crate::{
    core::{
        audio::{base_name, encode_wav, finalize_stem, read_audio, stem_file_name, write_stem},
        dsp::{ChannelSpectrum, StftPlan},
        engine::run_patch,
        mask::{band_extend, MaskAccumulator},
        scheduler::{Patch, PatchScheduler},
    },
    error::{Result, StemError},
    io::progress::{emit_split_progress, SplitProgress},
    model::{ModelLoader, Separator},
    types::{
        EncodedStem, SeparationConfig, SplitOptions, SplitResult, StemCount, StemWaveform,
        WaveformBuffer,
    },
};

use log::{debug, info};
use ndarray::Array4;
use num_complex::Complex32;
use rayon::prelude::*;
use rustfft::num_traits::Zero;
use std::{path::Path, sync::Arc};

/// Outcome of one [`Conversion::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Patch {
        index: usize,
        done: usize,
        total: usize,
    },
    Done,
}

/// All state of one conversion. Drop it to abandon the attempt.
pub struct Conversion<'m> {
    config: SeparationConfig,
    stems: StemCount,
    base_name: String,
    plan: Arc<StftPlan>,
    samples: usize,
    spectrum: [ChannelSpectrum; 2],
    masks: MaskAccumulator,
    scheduler: PatchScheduler,
    separator: &'m mut dyn Separator,
}

impl<'m> Conversion<'m> {
    /// Analyze `waveform` (consumed, so the PCM is released once frames exist) and
    /// prepare the patch walk.
    pub fn new(
        separator: &'m mut dyn Separator,
        waveform: WaveformBuffer,
        base_name: impl Into<String>,
        config: SeparationConfig,
    ) -> Result<Self> {
        config.validate()?;
        if waveform.sample_rate != config.sample_rate {
            return Err(StemError::UnsupportedInput(format!(
                "expected {} Hz input, got {} Hz",
                config.sample_rate, waveform.sample_rate
            )));
        }
        if waveform.left.len() != waveform.right.len() {
            return Err(StemError::UnsupportedInput("L/R length mismatch".into()));
        }
        if waveform.is_empty() {
            return Err(StemError::UnsupportedInput("empty audio".into()));
        }

        let stems = separator.stems();
        let plan = StftPlan::cached(config.n_fft, config.hop);
        let samples = waveform.len();
        let frames = plan.frame_count(samples);

        let WaveformBuffer { left, right, .. } = waveform;
        let spectrum = [plan.analyze(&left, frames), plan.analyze(&right, frames)];
        drop((left, right));

        let scheduler = PatchScheduler::new(samples, config.hop, config.patch_length);
        let masks = MaskAccumulator::with_capacity(
            stems.count(),
            config.model_bins(),
            scheduler.submitted_frames(),
        );

        info!(
            "conversion: {} samples, {} frames, {} patches, {} stems",
            samples,
            frames,
            scheduler.total(),
            stems
        );

        Ok(Self {
            config,
            stems,
            base_name: base_name.into(),
            plan,
            samples,
            spectrum,
            masks,
            scheduler,
            separator,
        })
    }

    pub fn stems(&self) -> StemCount {
        self.stems
    }

    /// `(done, total)` patches.
    pub fn progress(&self) -> (usize, usize) {
        (self.scheduler.done(), self.scheduler.total())
    }

    pub fn masks(&self) -> &MaskAccumulator {
        &self.masks
    }

    /// Run inference for the next patch, or report that none are left.
    pub fn step(&mut self) -> Result<Step> {
        let patch: Patch = match self.scheduler.next() {
            Some(p) => p,
            None => return Ok(Step::Done),
        };

        let patch_masks = run_patch(
            &mut *self.separator,
            &self.spectrum,
            &patch,
            self.config.model_bins(),
            self.config.mask_epsilon,
        )?;
        self.masks.push_patch(&patch_masks);

        let (done, total) = self.progress();
        info!("processed patch {}/{}", done, total);

        Ok(Step::Patch {
            index: patch.index,
            done,
            total,
        })
    }

    /// Drive any remaining patches, then rebuild every stem waveform.
    pub fn reconstruct(mut self) -> Result<Vec<StemWaveform>> {
        while let Step::Patch { .. } = self.step()? {}
        Ok(self.resynthesize())
    }

    /// Drive any remaining patches, rebuild and encode every stem.
    pub fn finish(self) -> Result<Vec<EncodedStem>> {
        let sample_rate = self.config.sample_rate;
        let base = self.base_name.clone();
        let waves = self.reconstruct()?;

        waves
            .into_iter()
            .map(|w| {
                Ok(EncodedStem {
                    label: w.label,
                    file_name: stem_file_name(&base, w.label),
                    wav: encode_wav(&w.left, &w.right, sample_rate)?,
                })
            })
            .collect()
    }

    fn resynthesize(self) -> Vec<StemWaveform> {
        let labels = self.stems.labels();
        let frames = self.masks.frames();
        // Samples past the last submitted patch stay silent
        let covered = (frames * self.config.hop).min(self.samples);
        let gain = self.plan.overlap_gain();

        debug!(
            "resynthesizing {} stems from {} frames ({} of {} samples covered)",
            labels.len(),
            frames,
            covered,
            self.samples
        );

        let plan = &*self.plan;
        let spectrum = &self.spectrum;
        let masks = &self.masks;
        let samples = self.samples;

        (0..labels.len())
            .into_par_iter()
            .map(|st| {
                let mut channels = [vec![0.0f32; samples], vec![0.0f32; samples]];
                let mut scratch = vec![Complex32::zero(); plan.n_fft()];
                let mut masked = vec![0.0f32; plan.freq_bins()];

                for (ch, out) in channels.iter_mut().enumerate() {
                    let spec = &spectrum[ch];
                    for fr in 0..frames {
                        band_extend(masks.frame(st, ch, fr), spec.magnitude.row(fr), &mut masked);
                        plan.overlap_add(
                            &masked,
                            spec.phase.row(fr),
                            fr,
                            &mut scratch,
                            &mut out[..covered],
                        );
                    }
                    finalize_stem(&mut out[..covered], gain);
                }

                let [left, right] = channels;
                StemWaveform {
                    label: labels[st],
                    left,
                    right,
                }
            })
            .collect()
    }
}

/// Owns the model loader and the currently loaded separator.
pub struct StemSplitter {
    loader: ModelLoader,
    loaded: Option<Box<dyn Separator>>,
    config: SeparationConfig,
}

impl StemSplitter {
    pub fn new(loader: ModelLoader, config: SeparationConfig) -> Self {
        Self {
            loader,
            loaded: None,
            config,
        }
    }

    pub fn loaded_stems(&self) -> Option<StemCount> {
        self.loaded.as_ref().map(|s| s.stems())
    }

    /// Load (or reuse) the model for `stems` and warm it up on a silent patch.
    pub fn prepare(&mut self, stems: StemCount) -> Result<&mut dyn Separator> {
        if self.loaded_stems() != Some(stems) {
            self.loaded = None;
            info!("loading {}-stem model", stems);

            let mut separator = (self.loader)(stems).map_err(|e| StemError::ModelLoad {
                stems: stems.count(),
                reason: format!("{e:#}"),
            })?;
            if separator.stems() != stems {
                return Err(StemError::ModelLoad {
                    stems: stems.count(),
                    reason: format!("loader returned a {}-stem model", separator.stems()),
                });
            }
            warm_up(&mut *separator, &self.config).map_err(|e| StemError::ModelLoad {
                stems: stems.count(),
                reason: format!("warm-up failed: {e}"),
            })?;

            self.loaded = Some(separator);
        }

        match self.loaded.as_mut() {
            Some(s) => Ok(&mut **s),
            None => Err(StemError::ModelLoad {
                stems: stems.count(),
                reason: "model not loaded".into(),
            }),
        }
    }

    /// Start a conversion with the model for `stems`.
    pub fn begin(
        &mut self,
        stems: StemCount,
        waveform: WaveformBuffer,
        base_name: &str,
    ) -> Result<Conversion<'_>> {
        let config = self.config.clone();
        let separator = self.prepare(stems)?;
        Conversion::new(separator, waveform, base_name, config)
    }

    /// Blocking conversion of an in-memory waveform.
    pub fn split_waveform(
        &mut self,
        stems: StemCount,
        waveform: WaveformBuffer,
        base_name: &str,
    ) -> Result<Vec<EncodedStem>> {
        let mut conversion = self.begin(stems, waveform, base_name)?;

        emit_split_progress(SplitProgress::Stage("infer"));
        loop {
            match conversion.step()? {
                Step::Patch { done, total, .. } => {
                    emit_split_progress(SplitProgress::Patches {
                        done,
                        total,
                        percent: done as f32 / total as f32 * 100.0,
                    });
                }
                Step::Done => break,
            }
        }

        emit_split_progress(SplitProgress::Stage("reconstruct"));
        conversion.finish()
    }

    /// Decode `input_path`, split it and write `<base>_<label>.wav` files.
    pub fn split_file(&mut self, input_path: &str, opts: &SplitOptions) -> Result<SplitResult> {
        if opts.config != self.config {
            self.config = opts.config.clone();
            self.loaded = None;
        }

        emit_split_progress(SplitProgress::Stage("engine_preload"));
        self.prepare(opts.stems)?;

        emit_split_progress(SplitProgress::Stage("read_audio"));
        let path = Path::new(input_path);
        let waveform = read_audio(path, self.config.sample_rate)?;

        let encoded = self.split_waveform(opts.stems, waveform, &base_name(path))?;

        emit_split_progress(SplitProgress::Stage("write_stems"));
        let out_dir = Path::new(&opts.output_dir);
        let mut stems = Vec::with_capacity(encoded.len());
        for stem in &encoded {
            let p = write_stem(out_dir, stem)?;
            stems.push((stem.label, p.to_string_lossy().into_owned()));
        }

        emit_split_progress(SplitProgress::Finished);
        Ok(SplitResult { stems })
    }
}

/// One all-zero patch through the model; surfaces device or shape problems before any
/// audio is touched.
fn warm_up(separator: &mut dyn Separator, config: &SeparationConfig) -> Result<()> {
    let input = Array4::<f32>::zeros((1, config.patch_length, config.model_bins(), 2));
    let outputs = separator.separate(&input).map_err(|e| StemError::inference(0, format!("{e:#}")))?;
    if outputs.len() != separator.stems().count() {
        return Err(StemError::inference(
            0,
            format!("model returned {} outputs", outputs.len()),
        ));
    }
    if let Some(bad) = outputs.iter().find(|y| y.shape() != input.shape()) {
        return Err(StemError::inference(
            0,
            format!("output shape {:?} does not match input {:?}", bad.shape(), input.shape()),
        ));
    }
    Ok(())
}
