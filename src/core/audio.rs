use std::{
    fs::{self, File},
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::Context;
use hound::WavWriter;
use log::{debug, info};
use rubato::{FftFixedIn, Resampler};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSource, MediaSourceStream},
    meta::MetadataOptions,
    probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::{
    error::{Result, StemError},
    types::{EncodedStem, WaveformBuffer},
};

const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Decode an audio file into a stereo buffer at `target_rate`.
///
/// A packet that fails to decode aborts the read with [`StemError::Decode`].
pub fn read_audio<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<WaveformBuffer> {
    let path: &Path = path.as_ref();

    let file: File = File::open(path)
        .map_err(|e| StemError::Decode(format!("failed to open {}: {e}", path.display())))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_source(Box::new(file), hint, target_rate)
}

/// Decode an in-memory audio stream. `extension` is an optional container hint.
pub fn decode_audio_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    target_rate: u32,
) -> Result<WaveformBuffer> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    decode_source(Box::new(Cursor::new(bytes)), hint, target_rate)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
    target_rate: u32,
) -> Result<WaveformBuffer> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| StemError::Decode("no default track found".into()))?;
    let track_id = track.id;

    if let Some(channels) = track.codec_params.channels {
        ensure_stereo(channels.count())?;
    }

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;

        let spec = *decoded.spec();
        ensure_stereo(spec.channels.count())?;
        sample_rate = spec.rate;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        for pair in buffer.samples().chunks_exact(2) {
            left.push(pair[0]);
            right.push(pair[1]);
        }
    }

    if left.is_empty() || sample_rate == 0 {
        return Err(StemError::UnsupportedInput("no audio samples decoded".into()));
    }

    info!(
        "read audio: sample_rate={}, channels=2, frames={}",
        sample_rate,
        left.len()
    );

    resample_to(WaveformBuffer::new(left, right, sample_rate)?, target_rate)
}

fn ensure_stereo(channels: usize) -> Result<()> {
    if channels != 2 {
        return Err(StemError::UnsupportedInput(format!(
            "only stereo sources are supported (got {channels} channels)"
        )));
    }
    Ok(())
}

/// Resample both channels to `target_rate`; the result has exactly
/// `floor(len * target_rate / sample_rate)` samples and is aligned with the input
/// (the resampler latency is trimmed from the front).
pub fn resample_to(wave: WaveformBuffer, target_rate: u32) -> Result<WaveformBuffer> {
    if wave.sample_rate == target_rate {
        return Ok(wave);
    }
    if wave.sample_rate == 0 || target_rate == 0 {
        return Err(StemError::UnsupportedInput("sample rate must be > 0".into()));
    }

    let expected = (wave.len() as u64 * target_rate as u64 / wave.sample_rate as u64) as usize;
    let delay = fft_fixed_in_delay(wave.sample_rate as usize, target_rate as usize);
    debug!(
        "resampling {} frames {} Hz -> {} Hz ({} frames, delay {})",
        wave.len(),
        wave.sample_rate,
        target_rate,
        expected,
        delay
    );

    let mut resampler = FftFixedIn::<f32>::new(
        wave.sample_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        2,
    )
    .context("failed to build resampler")?;

    let wanted = expected + delay;
    let mut out_l = Vec::with_capacity(wanted + 2 * RESAMPLE_CHUNK);
    let mut out_r = Vec::with_capacity(wanted + 2 * RESAMPLE_CHUNK);
    let mut chunk = vec![vec![0f32; RESAMPLE_CHUNK]; 2];
    let mut pos = 0usize;

    while out_l.len() < wanted {
        for (dst, src) in chunk.iter_mut().zip([&wave.left, &wave.right]) {
            dst.fill(0.0);
            let end = (pos + RESAMPLE_CHUNK).min(src.len());
            if pos < end {
                dst[..end - pos].copy_from_slice(&src[pos..end]);
            }
        }

        let out = resampler
            .process(chunk.as_slice(), None)
            .context("resampling failed")?;
        if out[0].is_empty() {
            break;
        }
        out_l.extend_from_slice(&out[0]);
        out_r.extend_from_slice(&out[1]);
        pos += RESAMPLE_CHUNK;
    }

    for out in [&mut out_l, &mut out_r] {
        out.drain(..delay.min(out.len()));
        out.resize(expected, 0.0);
    }

    WaveformBuffer::new(out_l, out_r, target_rate)
}

/// Output latency of [`FftFixedIn`] in output frames: half its output FFT size.
///
/// Sized the way `FftFixedIn::new` sizes its FFTs for [`RESAMPLE_CHUNK`] and
/// [`RESAMPLE_SUB_CHUNKS`].
fn fft_fixed_in_delay(rate_in: usize, rate_out: usize) -> usize {
    let g = gcd(rate_in, rate_out);
    let min_chunk_in = rate_in / g;
    let wanted_subsize = RESAMPLE_CHUNK / RESAMPLE_SUB_CHUNKS;
    let fft_chunks = wanted_subsize.div_ceil(min_chunk_in);
    fft_chunks * (rate_out / g) / 2
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Undo the overlap-add gain and clip to `[-1, 1]`.
pub fn finalize_stem(samples: &mut [f32], gain: f32) {
    for s in samples {
        *s = (*s / gain).clamp(-1.0, 1.0);
    }
}

/// Map `[-1, 1]` onto the full 16-bit range: -1.0 -> -32768, 1.0 -> 32767.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode a stereo pair as 16-bit PCM WAV (44-byte header, interleaved L/R).
pub fn encode_wav(left: &[f32], right: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    if left.len() != right.len() {
        return Err(anyhow::anyhow!("L/R length mismatch").into());
    }

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + left.len() * 4));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for (&l, &r) in left.iter().zip(right) {
            writer.write_sample(sample_to_i16(l))?;
            writer.write_sample(sample_to_i16(r))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Input file name without its last extension.
pub fn base_name(input_path: &Path) -> String {
    input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

pub fn stem_file_name(base: &str, label: &str) -> String {
    format!("{base}_{label}.wav")
}

pub fn write_stem(output_dir: &Path, stem: &EncodedStem) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&stem.file_name);
    fs::write(&path, &stem.wav)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
