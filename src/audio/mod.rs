//! Audio primitives shared by the locator and the clip extractor.

pub mod decode;
pub mod resample;
pub mod spectrogram;
pub mod wav;

pub use decode::{DecodedAudio, decode_object};
pub use resample::resample;
pub use spectrogram::{Spectrogram, compute as compute_spectrogram};
pub use wav::{WavInfo, WavSampleFormat, frames_to_mono_f32, parse_header};
