use serde::Serialize;

use crate::clip::ClipId;

/// Outcome of a toggle: the caller increments the play count only on
/// `Started`, never on `Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackChange {
    Paused,
    Started { stopped: Option<ClipId> },
}

/// Tracks the single clip allowed to be playing at any time. The audio output
/// itself is an opaque capability owned by the view layer; this controller
/// only decides which clip, if any, holds it.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PlaybackController {
    playing: Option<ClipId>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: ClipId) -> PlaybackChange {
        if self.playing == Some(id) {
            self.playing = None;
            return PlaybackChange::Paused;
        }

        let stopped = self.playing.take();
        self.playing = Some(id);
        PlaybackChange::Started { stopped }
    }

    /// Natural end of the artifact; no side effects beyond clearing the slot.
    pub fn finished(&mut self) {
        self.playing = None;
    }

    /// Returns true when the removed clip was the one playing.
    pub fn clip_removed(&mut self, id: ClipId) -> bool {
        if self.playing == Some(id) {
            self.playing = None;
            return true;
        }
        false
    }

    pub fn stop(&mut self) -> Option<ClipId> {
        self.playing.take()
    }

    pub fn playing(&self) -> Option<ClipId> {
        self.playing
    }

    pub fn is_playing(&self, id: ClipId) -> bool {
        self.playing == Some(id)
    }
}
