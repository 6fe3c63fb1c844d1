//! Minimal RIFF/WAV header parsing for byte-range planning.
//!
//! WAV stores raw frames, so a clip window maps to an exact byte range once
//! the fmt and data chunk positions are known. Only the first few KiB of the
//! object need to be fetched to plan the range; anything the parser cannot
//! handle falls back to a full download and the symphonia decoder.

/// Sample encoding inside the data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavSampleFormat {
    /// Signed integer PCM (16, 24 or 32 bit).
    Int,
    /// IEEE 32-bit float.
    Float,
}

/// Parsed WAV geometry.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Sample encoding.
    pub format: WavSampleFormat,
    /// Byte offset of the first data frame within the object.
    pub data_offset: u64,
    /// Length of the data chunk in bytes.
    pub data_len: u64,
}

impl WavInfo {
    /// Bytes per frame (all channels).
    pub fn bytes_per_frame(&self) -> u64 {
        u64::from(self.channels) * u64::from(self.bits_per_sample / 8)
    }

    /// Total frames in the data chunk.
    pub fn total_frames(&self) -> u64 {
        let bpf = self.bytes_per_frame();
        if bpf == 0 { 0 } else { self.data_len / bpf }
    }

    /// Source duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let frames = self.total_frames() as f64;
        frames / f64::from(self.sample_rate)
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
}

/// Parse a WAV header from the first bytes of an object.
///
/// `object_len` is the full object size; a zero or overlong data chunk size
/// (streamed writers leave it unset) is clamped to the object end.
/// Returns `None` for anything that is not a plain PCM or float WAV.
pub fn parse_header(bytes: &[u8], object_len: u64) -> Option<WavInfo> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut fmt: Option<(u16, u16, u32, u16)> = None; // (format tag, channels, rate, bits)
    let mut pos = 12usize;

    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_size = read_u32(bytes, pos + 4)? as usize;
        let body = pos + 8;

        match chunk_id {
            b"fmt " => {
                let format_tag = read_u16(bytes, body)?;
                let channels = read_u16(bytes, body + 2)?;
                let sample_rate = read_u32(bytes, body + 4)?;
                let bits_per_sample = read_u16(bytes, body + 14)?;
                fmt = Some((format_tag, channels, sample_rate, bits_per_sample));
            }
            b"data" => {
                let (format_tag, channels, sample_rate, bits_per_sample) = fmt?;

                let format = match (format_tag, bits_per_sample) {
                    (1, 16 | 24 | 32) => WavSampleFormat::Int,
                    (3, 32) => WavSampleFormat::Float,
                    _ => return None,
                };
                if channels == 0 || sample_rate == 0 {
                    return None;
                }

                let data_offset = body as u64;
                let declared = chunk_size as u64;
                let available = object_len.saturating_sub(data_offset);
                let data_len = if declared == 0 || declared > available {
                    available
                } else {
                    declared
                };

                return Some(WavInfo {
                    sample_rate,
                    channels,
                    bits_per_sample,
                    format,
                    data_offset,
                    data_len,
                });
            }
            _ => {}
        }

        // Chunks are word-aligned.
        pos = body + chunk_size + (chunk_size & 1);
    }

    None
}

/// Convert raw frame bytes to mono f32 in `[-1.0, 1.0]`, mixing channels.
///
/// Trailing partial frames are dropped.
pub fn frames_to_mono_f32(bytes: &[u8], info: &WavInfo) -> Vec<f32> {
    let bpf = usize::try_from(info.bytes_per_frame()).unwrap_or(usize::MAX);
    if bpf == 0 {
        return Vec::new();
    }
    let channels = usize::from(info.channels);
    let bytes_per_sample = usize::from(info.bits_per_sample / 8);
    let frames = bytes.len() / bpf;

    let mut output = Vec::with_capacity(frames);
    for frame in 0..frames {
        let mut sum = 0.0f32;
        for ch in 0..channels {
            let at = frame * bpf + ch * bytes_per_sample;
            sum += decode_sample(&bytes[at..at + bytes_per_sample], info.format);
        }
        #[allow(clippy::cast_precision_loss)]
        output.push(sum / channels as f32);
    }
    output
}

fn decode_sample(bytes: &[u8], format: WavSampleFormat) -> f32 {
    match (format, bytes.len()) {
        (WavSampleFormat::Int, 2) => {
            const I16_NORM: f32 = 32768.0;
            f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / I16_NORM
        }
        (WavSampleFormat::Int, 3) => {
            const I24_NORM: f32 = 8_388_608.0;
            let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
            #[allow(clippy::cast_precision_loss)]
            {
                raw as f32 / I24_NORM
            }
        }
        (WavSampleFormat::Int, 4) => {
            const I32_NORM: f32 = 2_147_483_648.0;
            let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            #[allow(clippy::cast_precision_loss)]
            {
                raw as f32 / I32_NORM
            }
        }
        (WavSampleFormat::Float, 4) => {
            f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
        }
        _ => 0.0,
    }
}
