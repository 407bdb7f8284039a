//! Audio clips and the capture-device seam.
//!
//! The session never touches a device directly; it drives an
//! [`AudioCapture`] so tests can substitute a scripted device and hosts can
//! plug in the cpal-backed microphone (feature `microphone`).

use async_trait::async_trait;
use std::io::Cursor;
use thiserror::Error;

/// Sample rate used for clips sent to the transcription service (16kHz)
pub const CAPTURE_SAMPLE_RATE: u32 = 16000;

/// Errors from acquiring or reading the recording device
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Microphone permission denied")]
    PermissionDenied,
    #[error("No audio input device available: {0}")]
    DeviceUnavailable(String),
    #[error("Audio device failure: {0}")]
    DeviceFailure(String),
    #[error("Not recording")]
    NotRecording,
    #[error("Recording contained no audio")]
    EmptyAudio,
    #[error("Failed to encode audio: {0}")]
    Encoding(String),
}

/// A finished recording ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    bytes: Vec<u8>,
    mime_type: String,
    duration_ms: u64,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            duration_ms,
        }
    }

    /// Encode mono f32 samples as a 16-bit PCM WAV clip.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Result<Self, CaptureError> {
        if samples.is_empty() {
            return Err(CaptureError::EmptyAudio);
        }
        let bytes = encode_wav(samples, sample_rate)?;
        let duration_ms = if sample_rate == 0 {
            0
        } else {
            samples.len() as u64 * 1000 / u64::from(sample_rate)
        };
        Ok(Self::new(bytes, "audio/wav", duration_ms))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode samples to WAV bytes, clamping to [-1.0, 1.0].
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(|e| CaptureError::Encoding(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// A recording device the capture session can drive.
///
/// `start` is the only suspension point (permission prompts, device
/// acquisition). `release` must be synchronous and idempotent: it is what
/// cancellation and drop rely on to free the microphone.
#[async_trait(?Send)]
pub trait AudioCapture {
    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop recording and hand back the clip.
    fn stop(&mut self) -> Result<AudioClip, CaptureError>;

    /// Stop without producing a clip and free the device.
    fn release(&mut self);

    fn is_active(&self) -> bool;
}
