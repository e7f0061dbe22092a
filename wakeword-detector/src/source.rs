/// Audio sources
///
/// Everything upstream of the scorer: live capture from an input device via
/// cpal, or replay of a recorded WAV file via hound. Both deliver 16kHz mono
/// 16-bit PCM; devices or files at other rates are resampled with rubato.

use crate::audio_buffer::{AudioSample, SAMPLE_RATE};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Chunks queued between the capture callback and the listener thread
const CAPTURE_QUEUE_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No audio input device available")]
    NoDevice,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Resampling failed: {0}")]
    Resampling(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Capture stream closed")]
    Closed,
}

/// A continuous supply of 16kHz mono PCM
pub trait AudioSource {
    /// Block until the next chunk is available. `Ok(None)` marks end of stream.
    fn next_chunk(&mut self) -> Result<Option<Vec<AudioSample>>, SourceError>;

    /// Description for logs
    fn describe(&self) -> String;

    /// Chunks lost upstream because the reader fell behind
    fn overruns(&self) -> u64 {
        0
    }
}

/// Input device summary for the `devices` listing
#[derive(Debug, Clone, Serialize)]
pub struct InputDeviceInfo {
    pub name: String,
    pub channels: u16,
    pub default_sample_rate: u32,
    pub is_default: bool,
}

/// Enumerate input devices on the default host
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, SourceError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| SourceError::Device(e.to_string()))?;

    let mut result = Vec::new();
    for device in devices {
        let name = match device.name() {
            Ok(name) => name,
            Err(e) => {
                warn!("Skipping unnamed input device: {}", e);
                continue;
            }
        };

        let config = match device.default_input_config() {
            Ok(config) => config,
            Err(e) => {
                debug!("No default config for {}: {}", name, e);
                continue;
            }
        };

        result.push(InputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            channels: config.channels(),
            default_sample_rate: config.sample_rate().0,
        });
    }

    Ok(result)
}

/// Fixed-chunk resampler from a device rate to 16kHz
pub struct ChunkResampler {
    inner: SincFixedIn<f32>,
    input_chunk: usize,
}

impl ChunkResampler {
    pub fn new(input_rate: u32, output_rate: u32, input_chunk: usize) -> Result<Self, SourceError> {
        debug!("Resampling: {} Hz -> {} Hz", input_rate, output_rate);

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let inner = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            2.0,
            params,
            input_chunk,
            1, // mono
        )
        .map_err(|e| SourceError::Resampling(e.to_string()))?;

        Ok(Self { inner, input_chunk })
    }

    /// Number of input samples consumed per call
    pub fn input_chunk(&self) -> usize {
        self.input_chunk
    }

    /// Resample one chunk; short input is zero-padded
    pub fn process(&mut self, input: &[AudioSample]) -> Result<Vec<AudioSample>, SourceError> {
        let mut wave: Vec<f32> = input
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect();
        wave.resize(self.input_chunk, 0.0);

        let waves = vec![wave];
        let output = self
            .inner
            .process(&waves, None)
            .map_err(|e| SourceError::Resampling(e.to_string()))?;

        Ok(output[0]
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect())
    }
}

/// Live capture from an input device
///
/// The cpal stream is not `Send` on every platform, so open the source on
/// the thread that will read from it.
pub struct MicrophoneSource {
    _stream: cpal::Stream,
    receiver: mpsc::Receiver<Vec<AudioSample>>,
    resampler: Option<ChunkResampler>,
    pending: Vec<AudioSample>,
    overruns: Arc<AtomicU64>,
    device_name: String,
    device_rate: u32,
}

impl MicrophoneSource {
    /// Open the first input device whose name contains `device_name`
    /// (case-insensitive), or the default input device
    pub fn open(device_name: Option<&str>, chunk_size: usize) -> Result<Self, SourceError> {
        let host = cpal::default_host();
        let device = select_device(&host, device_name)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let target = cpal::SampleRate(SAMPLE_RATE as u32);
        let supported = device
            .supported_input_configs()
            .map_err(|e| SourceError::Device(e.to_string()))?
            .filter(|range| {
                matches!(
                    range.sample_format(),
                    cpal::SampleFormat::I16 | cpal::SampleFormat::F32
                )
            })
            .find(|range| range.min_sample_rate() <= target && range.max_sample_rate() >= target);

        let stream_config = match supported {
            Some(range) => range.with_sample_rate(target),
            None => {
                let fallback = device
                    .default_input_config()
                    .map_err(|e| SourceError::Device(e.to_string()))?;
                info!(
                    "Device doesn't support {} Hz, recording at {} Hz and resampling",
                    SAMPLE_RATE,
                    fallback.sample_rate().0
                );
                fallback
            }
        };

        let device_rate = stream_config.sample_rate().0;
        let channels = stream_config.channels() as usize;
        let sample_format = stream_config.sample_format();
        let config = stream_config.config();

        let (sender, receiver) = mpsc::channel(CAPTURE_QUEUE_DEPTH);
        let overruns = Arc::new(AtomicU64::new(0));

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                build_capture_stream::<i16>(&device, &config, channels, sender, overruns.clone())?
            }
            cpal::SampleFormat::F32 => {
                build_capture_stream::<f32>(&device, &config, channels, sender, overruns.clone())?
            }
            other => return Err(SourceError::UnsupportedFormat(format!("{:?}", other))),
        };

        stream
            .play()
            .map_err(|e| SourceError::Device(e.to_string()))?;

        // Scale the chunk so each read covers the same duration of audio
        let resampler = if device_rate != SAMPLE_RATE as u32 {
            let device_chunk = chunk_size * device_rate as usize / SAMPLE_RATE;
            Some(ChunkResampler::new(device_rate, SAMPLE_RATE as u32, device_chunk)?)
        } else {
            None
        };

        info!(
            device = %name,
            device_rate,
            channels,
            "Audio capture stream started"
        );

        Ok(Self {
            _stream: stream,
            receiver,
            resampler,
            pending: Vec::new(),
            overruns,
            device_name: name,
            device_rate,
        })
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }
}

impl AudioSource for MicrophoneSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<AudioSample>>, SourceError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return self.receiver.blocking_recv().map(Some).ok_or(SourceError::Closed);
        };

        let needed = resampler.input_chunk();
        while self.pending.len() < needed {
            let chunk = self.receiver.blocking_recv().ok_or(SourceError::Closed)?;
            self.pending.extend_from_slice(&chunk);
        }

        let input: Vec<AudioSample> = self.pending.drain(..needed).collect();
        resampler.process(&input).map(Some)
    }

    fn describe(&self) -> String {
        format!("microphone '{}' @ {} Hz", self.device_name, self.device_rate)
    }

    fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

fn select_device(host: &cpal::Host, wanted: Option<&str>) -> Result<cpal::Device, SourceError> {
    if let Some(wanted) = wanted {
        let wanted_lower = wanted.to_lowercase();
        let devices = host
            .input_devices()
            .map_err(|e| SourceError::Device(e.to_string()))?;

        for device in devices {
            if let Ok(name) = device.name() {
                if name.to_lowercase().contains(&wanted_lower) {
                    info!("Found input device: {}", name);
                    return Ok(device);
                }
            }
        }

        warn!("No input device matching '{}', using default", wanted);
    }

    host.default_input_device().ok_or(SourceError::NoDevice)
}

fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sender: mpsc::Sender<Vec<AudioSample>>,
    overruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, SourceError>
where
    T: cpal::SizedSample,
    i16: cpal::FromSample<T>,
{
    let channels = channels.max(1);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Keep the first channel; never block the audio callback
                let mono: Vec<AudioSample> = data
                    .chunks(channels)
                    .map(|frame| i16::from_sample(frame[0]))
                    .collect();

                if sender.try_send(mono).is_err() {
                    overruns.fetch_add(1, Ordering::Relaxed);
                }
            },
            |err| {
                error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| SourceError::Device(e.to_string()))
}

/// Replays a 16-bit PCM WAV file in fixed chunks
pub struct WavFileSource {
    samples: Vec<AudioSample>,
    position: usize,
    chunk_size: usize,
    resampler: Option<ChunkResampler>,
    path: String,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(SourceError::UnsupportedFormat(format!(
                "{:?} {}-bit (need 16-bit PCM)",
                spec.sample_format, spec.bits_per_sample
            )));
        }

        let channels = spec.channels.max(1) as usize;
        let interleaved = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?;
        let samples: Vec<AudioSample> = interleaved.chunks(channels).map(|f| f[0]).collect();

        let (chunk_size, resampler) = if spec.sample_rate != SAMPLE_RATE as u32 {
            let device_chunk = chunk_size * spec.sample_rate as usize / SAMPLE_RATE;
            (
                device_chunk,
                Some(ChunkResampler::new(spec.sample_rate, SAMPLE_RATE as u32, device_chunk)?),
            )
        } else {
            (chunk_size, None)
        };

        info!(
            path = %path.display(),
            samples = samples.len(),
            sample_rate = spec.sample_rate,
            "Opened WAV source"
        );

        Ok(Self {
            samples,
            position: 0,
            chunk_size: chunk_size.max(1),
            resampler,
            path: path.display().to_string(),
        })
    }
}

impl AudioSource for WavFileSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<AudioSample>>, SourceError> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }

        let end = (self.position + self.chunk_size).min(self.samples.len());
        let chunk = &self.samples[self.position..end];
        self.position = end;

        match self.resampler.as_mut() {
            Some(resampler) => resampler.process(chunk).map(Some),
            None => Ok(Some(chunk.to_vec())),
        }
    }

    fn describe(&self) -> String {
        format!("wav file '{}'", self.path)
    }
}
