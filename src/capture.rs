use std::io::Cursor;

use crate::clip::round_to_tenth;

/// Granularity of the cosmetic elapsed-time preview.
pub const TICK_SECONDS: f64 = 0.1;

/// One in-flight recording. The device layer pushes mono f32 chunks in;
/// `finish` consumes the session and derives the authoritative duration from
/// the accumulated sample count, never from the preview ticks.
#[derive(Debug)]
pub struct CaptureSession {
    sample_rate_hz: u32,
    samples: Vec<f32>,
    ticks: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinishedCapture {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
    pub duration_seconds: f64,
}

impl CaptureSession {
    pub fn begin(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            samples: Vec::new(),
            ticks: 0,
        }
    }

    pub fn push_chunk(&mut self, chunk: &[f32]) {
        self.samples.extend_from_slice(chunk);
    }

    /// Advances the UI preview counter by exactly one tick.
    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn elapsed_preview_seconds(&self) -> f64 {
        round_to_tenth(self.ticks as f64 * TICK_SECONDS)
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn finish(self) -> FinishedCapture {
        let duration = if self.sample_rate_hz == 0 {
            0.0
        } else {
            self.samples.len() as f64 / f64::from(self.sample_rate_hz)
        };

        FinishedCapture {
            duration_seconds: round_to_tenth(duration),
            samples: self.samples,
            sample_rate_hz: self.sample_rate_hz,
        }
    }
}

/// Finalizes captured PCM into a 16-bit mono WAV artifact.
pub fn encode_wav(samples: &[f32], sample_rate_hz: u32) -> Result<Vec<u8>, String> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|error| format!("failed to start wav artifact: {error}"))?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let value = (clamped * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(value)
                .map_err(|error| format!("failed to write wav sample: {error}"))?;
        }
        writer
            .finalize()
            .map_err(|error| format!("failed to finalize wav artifact: {error}"))?;
    }

    Ok(cursor.into_inner())
}
