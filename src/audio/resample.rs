//! Resampling to the canonical clip rate using rubato.

use crate::error::{Error, Result};
use audioadapter_buffers::direct::SequentialSlice;
use rubato::{Fft, FixedSync, Resampler};

const CHUNK_FRAMES: usize = 1024;

/// Resample mono audio to the target sample rate.
///
/// Returns the input unchanged if already at the target rate.
pub fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples);
    }

    let channels = 1;
    let mut resampler = Fft::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_FRAMES,
        1,
        channels,
        FixedSync::Both,
    )
    .map_err(|e| Error::Resample {
        reason: e.to_string(),
    })?;

    let frames_per_chunk = resampler.input_frames_next();
    let mut output = Vec::with_capacity(estimate_output_len(samples.len(), from_rate, to_rate));

    let process_chunk = |resampler: &mut Fft<f32>, chunk: &[f32]| -> Result<Vec<f32>> {
        let adapter = SequentialSlice::new(chunk, channels, frames_per_chunk).map_err(|e| {
            Error::Resample {
                reason: format!("failed to create input adapter: {e}"),
            }
        })?;
        let resampled = resampler
            .process(&adapter, 0, None)
            .map_err(|e| Error::Resample {
                reason: e.to_string(),
            })?;
        Ok(resampled.take_data())
    };

    let mut pos = 0;
    while pos + frames_per_chunk <= samples.len() {
        let chunk = &samples[pos..pos + frames_per_chunk];
        output.extend_from_slice(&process_chunk(&mut resampler, chunk)?);
        pos += frames_per_chunk;
    }

    // Pad the tail to a full chunk and keep only the proportional output.
    if pos < samples.len() {
        let remaining = samples.len() - pos;
        let mut padded = samples[pos..].to_vec();
        padded.resize(frames_per_chunk, 0.0);

        let tail = process_chunk(&mut resampler, &padded)?;

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let wanted =
            (remaining as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
        output.extend_from_slice(&tail[..wanted.min(tail.len())]);
    }

    Ok(output)
}

/// Estimate output length after resampling.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn estimate_output_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    ((input_len as f64) * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize + CHUNK_FRAMES
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_returns_input() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let result = resample(samples.clone(), 48_000, 48_000).unwrap();
        assert_eq!(result, samples);
    }

    #[test]
    fn upsamples_archive_rate_to_canonical() {
        #[allow(clippy::cast_precision_loss)]
        let samples: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.001).sin()).collect();
        let output = resample(samples, 44_100, 48_000).unwrap();
        // Roughly 48000 samples out of one second of input.
        assert!(output.len() > 46_000);
        assert!(output.len() < 50_000);
    }

    #[test]
    fn downsamples_high_rate_recordings() {
        #[allow(clippy::cast_precision_loss)]
        let samples: Vec<f32> = (0..96_000).map(|i| (i as f32 * 0.001).sin()).collect();
        let output = resample(samples, 96_000, 48_000).unwrap();
        assert!(output.len() > 46_000);
        assert!(output.len() < 50_000);
    }
}
