//! Full-object decoding using symphonia.
//!
//! Fallback path for encodings that do not support byte-range extraction
//! (FLAC, MP3, AAC, or WAV files the range planner could not parse). The
//! whole object is downloaded and decoded in memory.

use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio data.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Audio samples as mono f32 in range [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Duration in seconds.
    pub duration_seconds: f64,
}

/// Decode an in-memory audio object to mono f32 samples.
///
/// `key` only labels errors. Supports WAV, FLAC, MP3, and AAC.
pub fn decode_object(key: &str, bytes: Vec<u8>) -> Result<DecodedAudio> {
    let corrupt = |source: Box<dyn std::error::Error + Send + Sync>| Error::CorruptAudio {
        key: key.to_string(),
        source,
    };

    let mss = MediaSourceStream::new(
        Box::new(Cursor::new(bytes)),
        MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(ext) = key.rsplit('.').next()
        && !ext.contains('/')
    {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| corrupt(Box::new(e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| corrupt("no decodable audio track".into()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| corrupt("missing sample rate".into()))?;
    let channels = track
        .codec_params
        .channels
        .map_or(1, symphonia::core::audio::Channels::count);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| corrupt(Box::new(e)))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(corrupt(Box::new(e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| corrupt(Box::new(e)))?;

        append_samples(&decoded, channels, &mut samples);
    }

    #[allow(clippy::cast_precision_loss)]
    let duration_seconds = samples.len() as f64 / f64::from(sample_rate);

    Ok(DecodedAudio {
        samples,
        sample_rate,
        duration_seconds,
    })
}

/// Append one decoded buffer to the output as mono f32.
fn append_samples(buffer: &AudioBufferRef, channels: usize, output: &mut Vec<f32>) {
    match buffer {
        AudioBufferRef::F32(buf) => {
            mix_into(output, channels, buf.frames(), |ch, i| buf.chan(ch)[i]);
        }
        AudioBufferRef::S16(buf) => {
            mix_into(output, channels, buf.frames(), |ch, i| {
                s16_to_f32(buf.chan(ch)[i])
            });
        }
        AudioBufferRef::S32(buf) => {
            mix_into(output, channels, buf.frames(), |ch, i| {
                s32_to_f32(buf.chan(ch)[i])
            });
        }
        // Other sample layouts do not occur in the archives this crate
        // reads; packets carrying them contribute nothing.
        _ => {}
    }
}

/// Average the channels of each frame into the output buffer.
fn mix_into(
    output: &mut Vec<f32>,
    channels: usize,
    frames: usize,
    sample: impl Fn(usize, usize) -> f32,
) {
    if channels == 1 {
        output.extend((0..frames).map(|i| sample(0, i)));
        return;
    }

    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    for i in 0..frames {
        let sum: f32 = (0..channels).map(|ch| sample(ch, i)).sum();
        output.push(sum * scale);
    }
}

fn s16_to_f32(sample: i16) -> f32 {
    const I16_NORM: f32 = 32768.0;
    f32::from(sample) / I16_NORM
}

#[allow(clippy::cast_precision_loss)]
fn s32_to_f32(sample: i32) -> f32 {
    const I32_NORM: f32 = 2_147_483_648.0;
    sample as f32 / I32_NORM
}
