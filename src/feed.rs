use crate::clip::{ClipId, ClipRecord};

pub const MAX_FEED_CLIPS: usize = 20;

/// Newest-first collection of clip records, capped at [`MAX_FEED_CLIPS`].
/// Mutations here are in-memory only; the session layer follows each one with
/// a full persistence write.
#[derive(Debug, Clone, Default)]
pub struct ClipFeed {
    clips: Vec<ClipRecord>,
}

impl ClipFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the feed from a persisted sequence, re-applying the cap.
    pub fn from_clips(mut clips: Vec<ClipRecord>) -> Self {
        clips.truncate(MAX_FEED_CLIPS);
        Self { clips }
    }

    /// Prepends the clip; when the cap is exceeded the oldest (tail) record
    /// is evicted.
    pub fn insert(&mut self, clip: ClipRecord) {
        self.clips.insert(0, clip);
        self.clips.truncate(MAX_FEED_CLIPS);
    }

    /// Returns false when no clip matches, leaving the feed untouched.
    pub fn increment_play(&mut self, id: ClipId) -> bool {
        match self.clips.iter_mut().find(|clip| clip.id == id) {
            Some(clip) => {
                clip.play_count += 1;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ClipId) -> Option<ClipRecord> {
        let index = self.clips.iter().position(|clip| clip.id == id)?;
        Some(self.clips.remove(index))
    }

    pub fn get(&self, id: ClipId) -> Option<&ClipRecord> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.get(id).is_some()
    }

    pub fn clips(&self) -> &[ClipRecord] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn max_id(&self) -> Option<ClipId> {
        self.clips.iter().map(|clip| clip.id).max()
    }
}
