use chrono::Local;
use serde::{Deserialize, Serialize};

pub type ClipId = u64;

/// One recorded or uploaded cast. `tokens_awarded` and `rating_score` are
/// fixed at creation; `play_count` is the only field mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipRecord {
    pub id: ClipId,
    pub owner_name: String,
    pub audio_ref: String,
    pub duration_seconds: f64,
    pub tokens_awarded: u32,
    #[serde(default = "default_rating_score")]
    pub rating_score: f64,
    pub created_at_display: String,
    #[serde(default)]
    pub play_count: u32,
}

fn default_rating_score() -> f64 {
    3.0
}

/// Durations and ratings carry one decimal of precision.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn local_clock_display() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
