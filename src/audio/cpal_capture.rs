// CpalCapture - live microphone capture with a frequency-analysis tap
//
// The cpal input callback forwards first-channel PCM through the lock-free
// buffer pool. Each read drains the pool into a rolling window of
// `fft_size` samples and runs the spectrum analyser over it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::buffer_pool::{
    BufferPool, CallbackChannels, TapChannels, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE,
};
use super::capture::CaptureDevice;
use crate::analysis::SpectrumAnalyser;
use crate::config::CaptureConfig;
use crate::error::AudioError;

pub struct CpalCapture {
    /// Input audio stream, present while acquired
    stream: Option<cpal::Stream>,
    tap: Option<TapChannels>,
    /// Most recent `fft_size` samples
    window: VecDeque<f32>,
    analyser: SpectrumAnalyser,
    /// Set by the stream error callback
    stream_failed: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CpalCapture {
    pub fn new(config: &CaptureConfig) -> Self {
        let analyser = SpectrumAnalyser::new(config);
        Self {
            stream: None,
            tap: None,
            window: VecDeque::with_capacity(analyser.fft_size()),
            analyser,
            stream_failed: Arc::new(AtomicBool::new(false)),
            sample_rate: 0,
        }
    }

    /// Sample rate of the opened device, 0 before acquisition
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_input_stream(
        &mut self,
        mut channels: CallbackChannels,
    ) -> Result<cpal::Stream, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceUnavailable {
                reason: "No default input device found".to_string(),
            })?;

        let config = device
            .default_input_config()
            .map_err(|e| AudioError::DeviceUnavailable {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = stream_config.channels as usize;
        self.sample_rate = stream_config.sample_rate.0;

        let failed = Arc::clone(&self.stream_failed);
        let err_fn = move |err: cpal::StreamError| {
            log::error!("[Capture] Input stream error: {}", err);
            failed.store(true, Ordering::Relaxed);
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    channels.forward(data, channels_count, |s| s);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    channels.forward(data, channels_count, |s| f32::from(s) / 32768.0);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(map_build_error)?;

        Ok(stream)
    }

    fn drain_tap(&mut self) {
        let fft_size = self.analyser.fft_size();
        let window = &mut self.window;
        if let Some(tap) = self.tap.as_mut() {
            tap.drain(|samples| {
                window.extend(samples.iter().copied());
                let excess = window.len().saturating_sub(fft_size);
                window.drain(..excess);
            });
        }
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable {
            reason: "Input device not available".to_string(),
        },
        cpal::BuildStreamError::BackendSpecific { err } => {
            let description = err.to_string();
            if description.to_lowercase().contains("permission") {
                AudioError::PermissionDenied
            } else {
                AudioError::HardwareError {
                    details: description,
                }
            }
        }
        other => AudioError::StreamOpenFailed {
            reason: format!("{:?}", other),
        },
    }
}

impl CaptureDevice for CpalCapture {
    fn acquire(&mut self) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (callback, tap) = BufferPool::new(DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE);
        self.stream_failed.store(false, Ordering::Relaxed);
        let stream = self.create_input_stream(callback)?;

        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable {
                reason: "Input device disappeared while starting".to_string(),
            },
            other => AudioError::StreamOpenFailed {
                reason: format!("Failed to start input stream: {:?}", other),
            },
        })?;

        log::info!(
            "[Capture] Microphone acquired at {} Hz, {} bins",
            self.sample_rate,
            self.analyser.bin_count()
        );
        self.stream = Some(stream);
        self.tap = Some(tap);
        Ok(())
    }

    fn read_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError> {
        if self.stream_failed.swap(false, Ordering::Relaxed) {
            return Err(AudioError::StreamFailure {
                reason: "Input stream reported an error".to_string(),
            });
        }

        self.drain_tap();
        let window = self.window.make_contiguous();
        self.analyser.analyse(window, out);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("[Capture] Pause on release failed: {}", e);
            }
            drop(stream);
            log::info!("[Capture] Microphone released");
        }
        self.tap = None;
        self.window.clear();
        self.analyser.reset();
    }

    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn is_acquired(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.release();
    }
}
