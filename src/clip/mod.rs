//! Fixed-duration clip extraction from remote audio objects.
//!
//! WAV sources are served by byte-range reads: a small header probe gives
//! the frame geometry, and only the clip window's frames cross the network.
//! Everything else (and any WAV the probe cannot parse) falls back to
//! downloading the whole object and decoding it with symphonia.

use crate::audio::{self, Spectrogram, wav};
use crate::constants::clip::WAV_PROBE_BYTES;
use crate::error::{Error, Result};
use crate::locate::ResolvedAudioRef;
use crate::store::StoreClient;
use std::io::Cursor;
use tracing::{debug, warn};

/// A mono PCM clip at the canonical sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Mono samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Offset of the clip start within the source recording, in seconds.
    pub start_offset_seconds: f64,
    /// True when the source ended before the requested window did.
    pub short: bool,
}

impl AudioClip {
    /// Clip duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = self.samples.len() as f64;
        n / f64::from(self.sample_rate)
    }

    /// Encode the clip as a 16-bit PCM WAV for playback.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::WavEncode { source: e })?;
            for &sample in &self.samples {
                #[allow(clippy::cast_possible_truncation)]
                let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                writer
                    .write_sample(value)
                    .map_err(|e| Error::WavEncode { source: e })?;
            }
            writer.finalize().map_err(|e| Error::WavEncode { source: e })?;
        }
        Ok(cursor.into_inner())
    }

    /// Time-frequency preview of the clip.
    pub fn spectrogram(&self) -> Spectrogram {
        audio::compute_spectrogram(&self.samples, self.sample_rate)
    }
}

/// Produces fixed-duration clips from resolved audio references.
#[derive(Debug, Clone)]
pub struct ClipExtractor {
    store: StoreClient,
    sample_rate: u32,
}

impl ClipExtractor {
    /// Create an extractor emitting clips at the given canonical rate.
    pub fn new(store: StoreClient, sample_rate: u32) -> Self {
        Self { store, sample_rate }
    }

    /// Extract `[offset, offset + duration)` seconds of the source as a
    /// mono clip at the canonical rate.
    ///
    /// Extraction is idempotent: the same reference and window always
    /// produce byte-identical samples. A window starting at or past the
    /// source end is `RangeUnsatisfiable`; a window that starts inside the
    /// source but runs off its end yields a `short` clip.
    pub async fn extract(
        &self,
        audio_ref: &ResolvedAudioRef,
        offset_seconds: f64,
        duration_seconds: f64,
    ) -> Result<AudioClip> {
        if offset_seconds < 0.0
            || !offset_seconds.is_finite()
            || duration_seconds <= 0.0
            || !duration_seconds.is_finite()
        {
            return Err(Error::InvalidClipWindow {
                offset_seconds,
                duration_seconds,
            });
        }

        let key = &audio_ref.remote_object_key;

        if let Some(hint) = audio_ref.duration_hint()
            && offset_seconds >= hint
        {
            return Err(Error::RangeUnsatisfiable {
                key: key.clone(),
                offset_seconds,
                source_duration_seconds: hint,
            });
        }

        let size = self
            .store
            .head(key)
            .await?
            .ok_or_else(|| Error::ObjectNotFound { key: key.clone() })?;

        if audio_ref.byte_range.is_some() || has_wav_extension(key) {
            let probe = self
                .store
                .read_range(key, 0..size.min(WAV_PROBE_BYTES))
                .await?;
            if let Some(info) = wav::parse_header(&probe, size) {
                return self
                    .extract_wav_window(key, &info, offset_seconds, duration_seconds)
                    .await;
            }
            warn!(key, "WAV header probe failed, falling back to full download");
        }

        self.extract_full(key, offset_seconds, duration_seconds).await
    }

    /// Fast path: fetch only the frame-aligned byte range of the window.
    async fn extract_wav_window(
        &self,
        key: &str,
        info: &wav::WavInfo,
        offset_seconds: f64,
        duration_seconds: f64,
    ) -> Result<AudioClip> {
        let source_duration = info.duration_seconds();
        if offset_seconds >= source_duration {
            return Err(Error::RangeUnsatisfiable {
                key: key.to_string(),
                offset_seconds,
                source_duration_seconds: source_duration,
            });
        }

        let end_seconds = (offset_seconds + duration_seconds).min(source_duration);
        let short = end_seconds < offset_seconds + duration_seconds;

        let rate = f64::from(info.sample_rate);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let start_frame = (offset_seconds * rate).floor() as u64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let end_frame = ((end_seconds * rate).ceil() as u64).min(info.total_frames());

        let bpf = info.bytes_per_frame();
        let byte_start = info.data_offset + start_frame * bpf;
        let byte_end = info.data_offset + end_frame * bpf;

        debug!(
            key,
            start_frame,
            end_frame,
            bytes = byte_end - byte_start,
            "range-reading clip window"
        );

        let bytes = self.store.read_range(key, byte_start..byte_end).await?;
        let samples = wav::frames_to_mono_f32(&bytes, info);

        self.finish(samples, info.sample_rate, offset_seconds, duration_seconds, short)
    }

    /// Fallback path: download and decode the whole object.
    async fn extract_full(
        &self,
        key: &str,
        offset_seconds: f64,
        duration_seconds: f64,
    ) -> Result<AudioClip> {
        warn!(key, "encoding does not support range extraction, downloading whole object");

        let bytes = self.store.read_all(key).await?;
        let decoded = audio::decode_object(key, bytes.to_vec())?;

        if offset_seconds >= decoded.duration_seconds {
            return Err(Error::RangeUnsatisfiable {
                key: key.to_string(),
                offset_seconds,
                source_duration_seconds: decoded.duration_seconds,
            });
        }

        let end_seconds = (offset_seconds + duration_seconds).min(decoded.duration_seconds);
        let short = end_seconds < offset_seconds + duration_seconds;

        let rate = f64::from(decoded.sample_rate);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let start = ((offset_seconds * rate).floor() as usize).min(decoded.samples.len());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stop = ((end_seconds * rate).ceil() as usize).min(decoded.samples.len());

        let samples = decoded.samples[start..stop].to_vec();
        self.finish(samples, decoded.sample_rate, offset_seconds, duration_seconds, short)
    }

    /// Resample to the canonical rate and pin full clips to the exact
    /// requested length. Frame alignment and resampler chunking can leave a
    /// few samples of drift either way; truncated sources keep what exists.
    fn finish(
        &self,
        samples: Vec<f32>,
        source_rate: u32,
        start_offset_seconds: f64,
        requested_duration: f64,
        short: bool,
    ) -> Result<AudioClip> {
        let mut samples = audio::resample(samples, source_rate, self.sample_rate)?;

        if !short {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let expected = (requested_duration * f64::from(self.sample_rate)).round() as usize;
            samples.resize(expected, 0.0);
        }

        Ok(AudioClip {
            samples,
            sample_rate: self.sample_rate,
            start_offset_seconds,
            short,
        })
    }
}

fn has_wav_extension(key: &str) -> bool {
    key.rsplit('.')
        .next()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    const RATE: u32 = 48_000;

    fn wav_object(sample_rate: u32, seconds: f64) -> Bytes {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = (f64::from(sample_rate) * seconds) as usize;
            for i in 0..n {
                #[allow(clippy::cast_possible_truncation)]
                let s = ((i % 100) as i16) * 100;
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        Bytes::from(cursor.into_inner())
    }

    fn plain_ref(key: &str) -> ResolvedAudioRef {
        ResolvedAudioRef {
            remote_object_key: key.to_string(),
            byte_range: None,
            duration_hint_millis: None,
        }
    }

    fn memory_store() -> StoreClient {
        StoreClient::new(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn wav_window_is_duration_exact() {
        let store = memory_store();
        store
            .put("audio/rec.wav", wav_object(RATE, 600.0))
            .await
            .unwrap();

        let extractor = ClipExtractor::new(store, RATE);
        let clip = extractor
            .extract(&plain_ref("audio/rec.wav"), 12.0, 3.0)
            .await
            .unwrap();

        assert_eq!(clip.sample_rate, RATE);
        assert_eq!(clip.samples.len(), 3 * RATE as usize);
        assert!((clip.duration_seconds() - 3.0).abs() < 1e-9);
        assert!(!clip.short);
    }

    #[tokio::test]
    async fn extraction_is_idempotent() {
        let store = memory_store();
        store
            .put("audio/rec.wav", wav_object(RATE, 60.0))
            .await
            .unwrap();

        let extractor = ClipExtractor::new(store, RATE);
        let reference = plain_ref("audio/rec.wav");
        let first = extractor.extract(&reference, 10.0, 3.0).await.unwrap();
        let second = extractor.extract(&reference, 10.0, 3.0).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn offset_past_end_is_range_unsatisfiable() {
        let store = memory_store();
        store
            .put("audio/rec.wav", wav_object(RATE, 5.0))
            .await
            .unwrap();

        let extractor = ClipExtractor::new(store, RATE);
        let result = extractor.extract(&plain_ref("audio/rec.wav"), 5.0, 3.0).await;

        assert!(matches!(
            result,
            Err(Error::RangeUnsatisfiable {
                source_duration_seconds,
                ..
            }) if (source_duration_seconds - 5.0).abs() < 1e-6
        ));
    }

    #[tokio::test]
    async fn window_past_end_yields_short_clip() {
        let store = memory_store();
        store
            .put("audio/rec.wav", wav_object(RATE, 5.0))
            .await
            .unwrap();

        let extractor = ClipExtractor::new(store, RATE);
        let clip = extractor
            .extract(&plain_ref("audio/rec.wav"), 4.0, 3.0)
            .await
            .unwrap();

        assert!(clip.short);
        assert!((clip.duration_seconds() - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn non_wav_source_resamples_to_canonical_rate() {
        // WAV content at a foreign rate, stored without a .wav extension so
        // the fallback decode path handles it end to end.
        let store = memory_store();
        store
            .put("audio/rec.bin", wav_object(16_000, 10.0))
            .await
            .unwrap();

        let extractor = ClipExtractor::new(store, RATE);
        let clip = extractor
            .extract(&plain_ref("audio/rec.bin"), 2.0, 3.0)
            .await
            .unwrap();

        assert_eq!(clip.sample_rate, RATE);
        assert_eq!(clip.samples.len(), 3 * RATE as usize);
        assert!(!clip.short);
    }

    #[tokio::test]
    async fn malformed_window_is_rejected_before_any_read() {
        let extractor = ClipExtractor::new(memory_store(), RATE);

        let negative_offset = extractor
            .extract(&plain_ref("audio/rec.wav"), -1.0, 3.0)
            .await;
        assert!(matches!(
            negative_offset,
            Err(Error::InvalidClipWindow { .. })
        ));

        let zero_duration = extractor
            .extract(&plain_ref("audio/rec.wav"), 1.0, 0.0)
            .await;
        assert!(matches!(zero_duration, Err(Error::InvalidClipWindow { .. })));
    }

    #[test]
    fn wav_bytes_roundtrip_preserves_length() {
        let clip = AudioClip {
            samples: vec![0.0, 0.25, -0.25, 1.0, -1.0],
            sample_rate: RATE,
            start_offset_seconds: 0.0,
            short: false,
        };
        let bytes = clip.to_wav_bytes().unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 5);
        assert_eq!(reader.spec().sample_rate, RATE);
    }
}
