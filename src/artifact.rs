use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Audio artifacts live as WAV files next to the key-value store. The feed
/// only holds the resulting path string.
pub fn default_artifacts_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("fartcaster").join("clips")
}

pub fn save_artifact(dir: &Path, file_stem: &str, bytes: &[u8]) -> Result<PathBuf, String> {
    fs::create_dir_all(dir).map_err(io_to_string)?;
    let path = dir.join(format!("{file_stem}.wav"));
    fs::write(&path, bytes).map_err(io_to_string)?;
    Ok(path)
}

/// Best-effort cleanup when a clip is deleted. Refs that do not point at a
/// local file are left alone.
pub fn remove_artifact(audio_ref: &str) -> bool {
    let path = Path::new(audio_ref);
    if !path.is_file() {
        return false;
    }
    fs::remove_file(path).is_ok()
}

fn io_to_string(error: io::Error) -> String {
    error.to_string()
}
