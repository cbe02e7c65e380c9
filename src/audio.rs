#[cfg(feature = "desktop")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
#[cfg(feature = "desktop")]
use cpal::{SampleFormat, Stream};
#[cfg(feature = "desktop")]
use std::sync::mpsc::SyncSender;

#[cfg(feature = "desktop")]
use crate::error::SessionError;

/// Handle over the live microphone stream. Dropping it releases the device,
/// so storing it in the shell state gives guaranteed cleanup on stop, on
/// error, and on teardown.
#[cfg(feature = "desktop")]
pub struct CaptureStream {
    pub stream: Stream,
    pub sample_rate_hz: u32,
}

/// Acquires the default input device and starts streaming mono f32 chunks
/// into `frame_tx`. Denial or absence of a device surfaces as
/// `DeviceUnavailable` before any session state changes.
#[cfg(feature = "desktop")]
pub fn open_capture_stream(frame_tx: SyncSender<Vec<f32>>) -> Result<CaptureStream, SessionError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SessionError::DeviceUnavailable("no input device".to_string()))?;
    let supported = device
        .default_input_config()
        .map_err(|error| SessionError::DeviceUnavailable(error.to_string()))?;

    let sample_format = supported.sample_format();
    let stream_config = supported.config();
    let sample_rate_hz = stream_config.sample_rate.0;
    let channels = usize::from(stream_config.channels.max(1));

    let error_callback = move |error| {
        eprintln!("capture stream error: {error}");
    };

    let stream = match sample_format {
        SampleFormat::F32 => {
            let tx = frame_tx.clone();
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        let _ = tx.try_send(mix_to_mono_f32(data, channels));
                    },
                    error_callback,
                    None,
                )
                .map_err(|error| SessionError::DeviceUnavailable(error.to_string()))?
        }
        SampleFormat::I16 => {
            let tx = frame_tx.clone();
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        let _ = tx.try_send(mix_to_mono_i16(data, channels));
                    },
                    error_callback,
                    None,
                )
                .map_err(|error| SessionError::DeviceUnavailable(error.to_string()))?
        }
        SampleFormat::U16 => {
            let tx = frame_tx.clone();
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        let _ = tx.try_send(mix_to_mono_u16(data, channels));
                    },
                    error_callback,
                    None,
                )
                .map_err(|error| SessionError::DeviceUnavailable(error.to_string()))?
        }
        _ => {
            return Err(SessionError::DeviceUnavailable(format!(
                "unsupported input sample format: {sample_format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|error| SessionError::DeviceUnavailable(error.to_string()))?;

    Ok(CaptureStream {
        stream,
        sample_rate_hz,
    })
}

pub fn mix_to_mono_f32(input: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return input.to_vec();
    }

    let mut output = Vec::with_capacity(input.len() / channels);
    for frame in input.chunks_exact(channels) {
        let sum = frame.iter().copied().sum::<f32>();
        output.push(sum / channels as f32);
    }
    output
}

pub fn mix_to_mono_i16(input: &[i16], channels: usize) -> Vec<f32> {
    let scale = f32::from(i16::MAX);
    if channels <= 1 {
        return input.iter().map(|sample| f32::from(*sample) / scale).collect();
    }

    let mut output = Vec::with_capacity(input.len() / channels);
    for frame in input.chunks_exact(channels) {
        let mut sum = 0f32;
        for sample in frame {
            sum += f32::from(*sample) / scale;
        }
        output.push(sum / channels as f32);
    }
    output
}

pub fn mix_to_mono_u16(input: &[u16], channels: usize) -> Vec<f32> {
    let to_signed = |sample: u16| (f32::from(sample) / f32::from(u16::MAX)) * 2.0 - 1.0;
    if channels <= 1 {
        return input.iter().map(|sample| to_signed(*sample)).collect();
    }

    let mut output = Vec::with_capacity(input.len() / channels);
    for frame in input.chunks_exact(channels) {
        let mut sum = 0f32;
        for sample in frame {
            sum += to_signed(*sample);
        }
        output.push(sum / channels as f32);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_f32_passes_through() {
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(mix_to_mono_f32(&input, 1), input);
    }

    #[test]
    fn averages_stereo_f32_frames() {
        let stereo = vec![0.2_f32, 0.6, -0.2, 0.2];
        assert_eq!(mix_to_mono_f32(&stereo, 2), vec![0.4, 0.0]);
    }

    #[test]
    fn converts_i16_to_float_range() {
        let mono = mix_to_mono_i16(&[i16::MIN, 0, i16::MAX], 1);
        assert!(mono[0] < -0.99);
        assert_eq!(mono[1], 0.0);
        assert!(mono[2] > 0.99);
    }

    #[test]
    fn centers_u16_around_zero() {
        let mono = mix_to_mono_u16(&[0, u16::MAX], 1);
        assert!(mono[0] < -0.99);
        assert!(mono[1] > 0.99);
    }
}
