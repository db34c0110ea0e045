use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Sample, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use log::{error, info, warn};

use super::render::{fill_output, ToneBank};
use super::SynthConfig;
use crate::error::AudioError;
use crate::messaging::FrequencyReceiver;

/// What the device actually accepted
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub host: String,
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: String,
    /// `None` when the device picked its own buffer size
    pub buffer_size: Option<u32>,
}

/// Owns the thread that keeps the cpal stream alive.
///
/// `cpal::Stream` is not `Send` on every platform, so the stream is built,
/// played and dropped on this thread. Dropping the shutdown sender or sending
/// on it ends the thread.
pub(crate) struct AudioThread {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
    info: StreamInfo,
}

impl AudioThread {
    pub(crate) fn spawn(
        config: SynthConfig,
        receiver: FrequencyReceiver,
        faults: Arc<AtomicU64>,
    ) -> Result<Self, AudioError> {
        let (ready_tx, ready_rx) = bounded::<Result<StreamInfo, AudioError>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("sector-piano-audio".to_string())
            .spawn(move || {
                let stream = match open_stream(&config, &receiver, &faults) {
                    Ok((stream, info)) => {
                        let _ = ready_tx.send(Ok(info));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until stop; a disconnected sender also counts
                let _ = shutdown_rx.recv();
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause output stream: {}", e);
                }
                drop(stream);
            })
            .map_err(|e| AudioError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(info)) => Ok(AudioThread {
                shutdown: shutdown_tx,
                handle,
                info,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::ThreadSpawn(
                    "audio thread exited before opening the stream".to_string(),
                ))
            }
        }
    }

    pub(crate) fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Stop the stream and wait until the device is released
    pub(crate) fn shutdown(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            error!("Audio thread panicked during shutdown");
        }
    }
}

fn open_stream(
    synth: &SynthConfig,
    receiver: &FrequencyReceiver,
    faults: &Arc<AtomicU64>,
) -> Result<(Stream, StreamInfo), AudioError> {
    let host = cpal::default_host();
    info!("Using audio host: {}", host.id().name());

    let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!("Using output device: {}", device_name);

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;
    info!("Device default config: {:?}", supported);

    let sample_format = supported.sample_format();
    let device_default: StreamConfig = supported.into();

    // Requested rate, channel count and buffer first, then whatever the device prefers
    let mut requested = device_default.clone();
    requested.sample_rate = cpal::SampleRate(synth.sample_rate);
    requested.buffer_size = BufferSize::Fixed(synth.buffer_size);
    if let Some(channels) = synth.output_channels {
        requested.channels = channels;
    }

    let (stream, config) = match build_for_format(&device, &requested, sample_format, synth, receiver, faults) {
        Ok(stream) => (stream, requested),
        Err(AudioError::UnsupportedSampleFormat(format)) => {
            return Err(AudioError::UnsupportedSampleFormat(format));
        }
        Err(e) => {
            warn!("Requested stream config rejected ({}), falling back to device default", e);
            let stream = build_for_format(&device, &device_default, sample_format, synth, receiver, faults)?;
            (stream, device_default)
        }
    };

    stream.play().map_err(|e| AudioError::PlayStream(e.to_string()))?;

    let info = StreamInfo {
        host: host.id().name().to_string(),
        device_name,
        sample_rate: config.sample_rate.0,
        channels: config.channels,
        sample_format: format!("{:?}", sample_format),
        buffer_size: match config.buffer_size {
            BufferSize::Fixed(frames) => Some(frames),
            BufferSize::Default => None,
        },
    };
    info!(
        "Audio stream started: {} Hz, {} channel(s), {}, buffer {:?}",
        info.sample_rate, info.channels, info.sample_format, info.buffer_size
    );
    Ok((stream, info))
}

fn build_for_format(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    synth: &SynthConfig,
    receiver: &FrequencyReceiver,
    faults: &Arc<AtomicU64>,
) -> Result<Stream, AudioError> {
    // Render at the rate the stream really runs at
    let bank = ToneBank::new(&SynthConfig {
        sample_rate: config.sample_rate.0,
        ..synth.clone()
    });
    let receiver = receiver.clone();
    let faults = Arc::clone(faults);

    match sample_format {
        SampleFormat::F32 => create_stream::<f32>(device, config, bank, receiver, faults),
        SampleFormat::I16 => create_stream::<i16>(device, config, bank, receiver, faults),
        SampleFormat::U16 => create_stream::<u16>(device, config, bank, receiver, faults),
        other => Err(AudioError::UnsupportedSampleFormat(format!("{:?}", other))),
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut bank: ToneBank,
    receiver: FrequencyReceiver,
    faults: Arc<AtomicU64>,
) -> Result<Stream, AudioError>
where
    T: Sample + Send + 'static + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_fn = |err| error!("an error occurred on the audio stream: {}", err);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_output(&mut bank, &receiver, data, &faults, |bank, data| {
                    bank.render_interleaved(data, channels)
                });
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}
