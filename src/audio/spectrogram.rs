//! Time-frequency preview of a clip.
//!
//! Short-time FFT with a Hann window, power expressed in dB. Bins above the
//! preview ceiling are dropped; bird vocalizations of interest sit well
//! below it and the preview stays compact.

use crate::constants::spectrogram::{HOP, MAX_FREQ_HZ, NFFT, POWER_FLOOR};
use rustfft::{FftPlanner, num_complex::Complex};

/// Spectrogram of a clip: `frames` rows of `bins` dB values each.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Power per (frame, bin) in dB, outer index is time.
    pub frames: Vec<Vec<f32>>,
    /// Frequency width of one bin in Hz.
    pub bin_hz: f32,
    /// Time step between frames in seconds.
    pub hop_seconds: f32,
}

impl Spectrogram {
    /// Number of time frames.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of frequency bins per frame.
    pub fn num_bins(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }
}

/// Compute the preview spectrogram of mono audio.
///
/// Input shorter than one window is zero-padded to a single frame, so every
/// clip yields at least one frame.
pub fn compute(samples: &[f32], sample_rate: u32) -> Spectrogram {
    let rate = sample_rate as f32;
    let bin_hz = rate / NFFT as f32;

    // Keep bins up to the preview ceiling (inclusive), capped at Nyquist.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bins = ((MAX_FREQ_HZ / bin_hz).floor() as usize + 1).min(NFFT / 2 + 1);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(NFFT);

    let window: Vec<f32> = (0..NFFT)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let phase = 2.0 * std::f32::consts::PI * i as f32 / NFFT as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect();

    let num_frames = if samples.len() < NFFT {
        1
    } else {
        (samples.len() - NFFT) / HOP + 1
    };

    let mut buffer = vec![Complex::new(0.0f32, 0.0f32); NFFT];
    let mut frames = Vec::with_capacity(num_frames);

    for frame in 0..num_frames {
        let start = frame * HOP;
        for (i, slot) in buffer.iter_mut().enumerate() {
            let sample = samples.get(start + i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * window[i], 0.0);
        }
        fft.process(&mut buffer);

        let row: Vec<f32> = buffer[..bins]
            .iter()
            .map(|c| 10.0 * c.norm_sqr().max(POWER_FLOOR).log10())
            .collect();
        frames.push(row);
    }

    #[allow(clippy::cast_precision_loss)]
    let hop_seconds = HOP as f32 / rate;

    Spectrogram {
        frames,
        bin_hz,
        hop_seconds,
    }
}
