use rodio::{
    Device, DeviceTrait, OutputStream, OutputStreamBuilder,
    cpal::{
        BufferSize, SampleFormat, SampleRate, StreamConfig, default_host,
        traits::HostTrait,
    },
};

use crate::audio::error::ConnectError;

pub const DEFAULT_DEVICE: &str = "default";

pub fn find_device(name: &str) -> Result<Device, ConnectError> {
    let host = default_host();
    if name == DEFAULT_DEVICE {
        return host
            .default_output_device()
            .ok_or_else(|| ConnectError::Device("no default output device".into()));
    }

    host.output_devices()
        .map_err(|e| ConnectError::Device(e.to_string()))?
        .find(|device| device.name().is_ok_and(|n| n == name))
        .ok_or_else(|| ConnectError::ChannelUnavailable(name.to_owned()))
}

pub fn setup_device_config(device: &Device) -> (StreamConfig, SampleFormat) {
    let best = device
        .supported_output_configs()
        .ok()
        .and_then(|configs| configs.max_by_key(|cfg| cfg.max_sample_rate().0));

    match best {
        Some(cfg) => (
            StreamConfig {
                channels: cfg.channels(),
                sample_rate: cfg.max_sample_rate(),
                buffer_size: BufferSize::Fixed(4096),
            },
            cfg.sample_format(),
        ),
        None => (
            StreamConfig {
                channels: 2,
                sample_rate: SampleRate(48000),
                buffer_size: BufferSize::Fixed(4096),
            },
            SampleFormat::F32,
        ),
    }
}

pub fn open_output(device: Device) -> Result<OutputStream, ConnectError> {
    let (config, sample_format) = setup_device_config(&device);
    OutputStreamBuilder::default()
        .with_buffer_size(config.buffer_size)
        .with_sample_rate(config.sample_rate.0)
        .with_device(device)
        .with_sample_format(sample_format)
        .open_stream_or_fallback()
        .map_err(|e| ConnectError::Device(e.to_string()))
}
