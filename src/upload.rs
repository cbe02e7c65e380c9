use std::io::Cursor;

use crate::clip::round_to_tenth;
use crate::error::SessionError;

/// A user-selected file handed over by the view layer: declared media type
/// plus the raw payload. Ownership of the bytes stays on this path; the feed
/// only ever sees the resulting `audio_ref`.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

pub fn is_audio_media_type(media_type: &str) -> bool {
    media_type.trim().to_ascii_lowercase().starts_with("audio/")
}

/// Metadata probe for an uploaded artifact. Rejects payloads whose declared
/// type is not audio, and audio payloads whose metadata cannot be read, with
/// `UnsupportedMediaType`; no record is created either way.
pub fn probe_duration(upload: &UploadedAudio) -> Result<f64, SessionError> {
    if !is_audio_media_type(&upload.media_type) {
        return Err(SessionError::UnsupportedMediaType(upload.media_type.clone()));
    }

    let reader = hound::WavReader::new(Cursor::new(&upload.bytes))
        .map_err(|_| SessionError::UnsupportedMediaType(upload.media_type.clone()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(SessionError::UnsupportedMediaType(upload.media_type.clone()));
    }

    let frames = reader.duration();
    Ok(round_to_tenth(f64::from(frames) / f64::from(spec.sample_rate)))
}
