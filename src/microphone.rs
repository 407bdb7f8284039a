//! Live microphone capture through cpal.
//!
//! The input callback mixes to mono and pushes into a lock-free ring buffer;
//! `stop` drops the stream (releasing the device) and drains the buffer
//! into a WAV clip. Clips are encoded at the device's native rate.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use tracing::{error, info, warn};

use crate::audio::{AudioCapture, AudioClip, CaptureError};

/// Longest recording kept when no limit is configured
const DEFAULT_MAX_RECORDING_SECS: u32 = 30;

/// Audio input device information
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// List available input devices
pub fn list_input_devices() -> Result<Vec<AudioDevice>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceFailure(format!("Failed to enumerate input devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .map(|name| AudioDevice {
            id: name.clone(),
            is_default: name == default_name,
            name,
        })
        .collect();

    Ok(devices)
}

/// Get device by ID (name) or return default
fn get_device(device_id: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();

    match device_id {
        Some(id) if id != "default" => host
            .input_devices()
            .map_err(|e| CaptureError::DeviceFailure(format!("Failed to enumerate devices: {}", e)))?
            .find(|d| d.name().map(|n| n == id).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceUnavailable(format!("Device not found: {}", id))),
        _ => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("No default input device".to_string())),
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable("Device no longer available".to_string())
        }
        other => CaptureError::DeviceFailure(format!("Failed to build audio stream: {}", other)),
    }
}

/// Microphone-backed [`AudioCapture`].
///
/// Holds the cpal stream only while recording. Dropping it releases the
/// device.
pub struct MicrophoneCapture {
    device_id: Option<String>,
    max_recording_secs: u32,
    stream: Option<cpal::Stream>,
    consumer: Option<HeapCons<f32>>,
    sample_rate: u32,
}

impl MicrophoneCapture {
    pub fn new(device_id: Option<String>, max_recording_secs: u32) -> Self {
        let max_recording_secs = if max_recording_secs == 0 {
            DEFAULT_MAX_RECORDING_SECS
        } else {
            max_recording_secs
        };
        Self {
            device_id,
            max_recording_secs,
            stream: None,
            consumer: None,
            sample_rate: 0,
        }
    }

    fn open_stream(&mut self) -> Result<(), CaptureError> {
        let device = get_device(self.device_id.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported_config = device
            .default_input_config()
            .map_err(|e| CaptureError::DeviceFailure(format!("Failed to get device config: {}", e)))?;

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels() as usize;
        info!(
            "Recording from {} at {}Hz, {} channels",
            device_name, sample_rate, channels
        );

        let capacity = (self.max_recording_secs as usize).saturating_mul(sample_rate as usize);
        let rb = HeapRb::<f32>::new(capacity.max(1));
        let (mut producer, consumer) = rb.split();

        let stream_config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match supported_config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &_| {
                    for chunk in data.chunks(channels.max(1)) {
                        let mono = chunk.iter().sum::<f32>() / chunk.len() as f32;
                        let _ = producer.try_push(mono);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &_| {
                    for chunk in data.chunks(channels.max(1)) {
                        let mono = chunk.iter().map(|&s| s as f32 / i16::MAX as f32).sum::<f32>()
                            / chunk.len() as f32;
                        let _ = producer.try_push(mono);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            ),
            format => {
                return Err(CaptureError::DeviceFailure(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        }
        .map_err(map_build_error)?;

        stream
            .play()
            .map_err(|e| CaptureError::DeviceFailure(format!("Failed to start audio stream: {}", e)))?;

        self.stream = Some(stream);
        self.consumer = Some(consumer);
        self.sample_rate = sample_rate;
        Ok(())
    }
}

#[async_trait(?Send)]
impl AudioCapture for MicrophoneCapture {
    async fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.open_stream()
    }

    fn stop(&mut self) -> Result<AudioClip, CaptureError> {
        let stream = self.stream.take().ok_or(CaptureError::NotRecording)?;
        drop(stream);

        let mut consumer = self.consumer.take().ok_or(CaptureError::NotRecording)?;
        let mut samples = Vec::new();
        while let Some(sample) = consumer.try_pop() {
            samples.push(sample);
        }
        info!(
            "Recording stopped: {} samples at {}Hz",
            samples.len(),
            self.sample_rate
        );

        AudioClip::from_samples(&samples, self.sample_rate)
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            info!("Microphone released");
        }
        self.consumer = None;
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("MicrophoneCapture dropped while recording; releasing device");
            self.release();
        }
    }
}
