use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Serialize;

use crate::capture::{CaptureSession, FinishedCapture};
use crate::clip::{local_clock_display, round_to_tenth, ClipId, ClipRecord};
use crate::error::SessionError;
use crate::feed::ClipFeed;
use crate::identity::{GateState, IdentityGate};
use crate::playback::{PlaybackChange, PlaybackController};
use crate::reward;
use crate::runtime_log;
use crate::store::{self, KeyValue};
use crate::upload::{self, UploadedAudio};

/// Derived view state handed to the UI on every render.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub gate: GateState,
    pub display_name: Option<String>,
    pub balance: u64,
    pub clip_count: usize,
    pub playing: Option<ClipId>,
    pub capturing: bool,
    pub capture_preview_seconds: f64,
    pub success_banner: bool,
    pub loading: bool,
}

/// The owning aggregate: store adapter, clip feed, playback controller,
/// identity gate, and the optional in-flight capture all live here, so there
/// is exactly one place mutating shared state.
///
/// Every feed or balance mutation is followed by a full re-serialization
/// write. Those writes are fire-and-forget: a failure is appended to the
/// runtime log and the in-memory state stays authoritative.
pub struct Session<S: KeyValue> {
    store: S,
    feed: ClipFeed,
    playback: PlaybackController,
    gate: IdentityGate,
    capture: Option<CaptureSession>,
    balance: u64,
    last_clip_id: ClipId,
    loading: bool,
    success_banner: bool,
    log_path: Option<PathBuf>,
}

impl<S: KeyValue> Session<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            feed: ClipFeed::new(),
            playback: PlaybackController::new(),
            gate: IdentityGate::new(),
            capture: None,
            balance: 0,
            last_clip_id: 0,
            loading: true,
            success_banner: false,
            log_path: None,
        }
    }

    pub fn set_log_path(&mut self, path: PathBuf) {
        self.log_path = Some(path);
    }

    /// Startup hydration. Malformed or absent records fall back to defaults;
    /// this never fails.
    pub fn load(&mut self) {
        self.feed = ClipFeed::from_clips(store::load_clips(&self.store));
        self.balance = store::load_balance(&self.store);
        self.last_clip_id = self.feed.max_id().unwrap_or(0);
        self.gate.hydrate(store::load_identity(&self.store));
        self.loading = false;
    }

    pub fn sign_in_local(&mut self, raw_username: &str) -> Result<(), SessionError> {
        let identity = self.gate.sign_in_local(raw_username)?.clone();
        if let Err(error) = store::save_identity(&self.store, &identity) {
            self.log("error", "store.identity_write", &error.to_string());
        }
        Ok(())
    }

    pub fn sign_in_federated(
        &mut self,
        handle: &str,
        avatar_ref: &str,
        provider_token: &str,
    ) -> Result<(), SessionError> {
        let identity = self
            .gate
            .sign_in_federated(handle, avatar_ref, provider_token)?
            .clone();
        if let Err(error) = store::save_identity(&self.store, &identity) {
            self.log("error", "store.identity_write", &error.to_string());
        }
        Ok(())
    }

    /// Back to the sign-in prompt. Stops playback and discards any in-flight
    /// capture; the feed and balance stay in the device-local store.
    pub fn sign_out(&mut self) {
        self.gate.sign_out();
        self.playback.stop();
        self.capture = None;
        self.success_banner = false;
        if let Err(error) = store::clear_identity(&self.store) {
            self.log("error", "store.identity_write", &error.to_string());
        }
    }

    pub fn begin_capture(&mut self, sample_rate_hz: u32) -> Result<(), SessionError> {
        if !self.gate.is_authenticated() {
            return Err(SessionError::NotSignedIn);
        }
        if self.capture.is_some() {
            return Err(SessionError::CaptureAlreadyActive);
        }
        self.capture = Some(CaptureSession::begin(sample_rate_hz));
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Ignored when no capture is active.
    pub fn feed_capture(&mut self, chunk: &[f32]) {
        if let Some(capture) = self.capture.as_mut() {
            capture.push_chunk(chunk);
        }
    }

    /// Advances the cosmetic preview counter and returns its value.
    pub fn capture_tick(&mut self) -> f64 {
        match self.capture.as_mut() {
            Some(capture) => {
                capture.tick();
                capture.elapsed_preview_seconds()
            }
            None => 0.0,
        }
    }

    pub fn capture_preview_seconds(&self) -> f64 {
        self.capture
            .as_ref()
            .map(CaptureSession::elapsed_preview_seconds)
            .unwrap_or(0.0)
    }

    /// Stops the in-flight capture and yields the finalized samples with the
    /// authoritative duration. No-op when nothing is being captured.
    pub fn end_capture(&mut self) -> Option<FinishedCapture> {
        self.capture.take().map(CaptureSession::finish)
    }

    /// Abandons the in-flight capture without creating a record.
    pub fn cancel_capture(&mut self) -> bool {
        self.capture.take().is_some()
    }

    /// Turns a finalized duration plus artifact ref into a clip record:
    /// computes the reward, stamps owner and creation time, prepends to the
    /// feed, credits the balance, and persists both records independently.
    pub fn commit_clip<R: Rng>(
        &mut self,
        rng: &mut R,
        duration_seconds: f64,
        audio_ref: &str,
    ) -> Result<ClipRecord, SessionError> {
        let owner_name = self
            .gate
            .display_name()
            .ok_or(SessionError::NotSignedIn)?
            .to_string();

        let earned = reward::compute_reward(duration_seconds, rng);
        let record = ClipRecord {
            id: self.allocate_clip_id(),
            owner_name,
            audio_ref: audio_ref.to_string(),
            duration_seconds: round_to_tenth(duration_seconds.max(0.0)),
            tokens_awarded: earned.tokens,
            rating_score: earned.rating,
            created_at_display: local_clock_display(),
            play_count: 0,
        };

        self.feed.insert(record.clone());
        self.balance += u64::from(earned.tokens);
        self.persist_feed();
        self.persist_balance();
        self.success_banner = true;
        Ok(record)
    }

    /// Upload path: media-type check and metadata probe, then the same record
    /// path as a finished capture.
    pub fn upload_clip<R: Rng>(
        &mut self,
        rng: &mut R,
        uploaded: &UploadedAudio,
        audio_ref: &str,
    ) -> Result<ClipRecord, SessionError> {
        let duration = upload::probe_duration(uploaded)?;
        self.commit_clip(rng, duration, audio_ref)
    }

    /// Returns `None` for an unknown clip id. A new play start increments the
    /// clip's play count; pausing does not.
    pub fn toggle_playback(&mut self, id: ClipId) -> Option<PlaybackChange> {
        if !self.feed.contains(id) {
            return None;
        }

        let change = self.playback.toggle(id);
        if matches!(change, PlaybackChange::Started { .. }) {
            self.feed.increment_play(id);
            self.persist_feed();
        }
        Some(change)
    }

    pub fn playback_finished(&mut self) {
        self.playback.finished();
    }

    /// Removes the clip, stopping playback first when it is the one playing.
    pub fn delete_clip(&mut self, id: ClipId) -> Option<ClipRecord> {
        self.playback.clip_removed(id);
        let removed = self.feed.remove(id)?;
        self.persist_feed();
        Some(removed)
    }

    pub fn dismiss_success_banner(&mut self) {
        self.success_banner = false;
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            gate: self.gate.state(),
            display_name: self.gate.display_name().map(str::to_string),
            balance: self.balance,
            clip_count: self.feed.len(),
            playing: self.playback.playing(),
            capturing: self.capture.is_some(),
            capture_preview_seconds: self.capture_preview_seconds(),
            success_banner: self.success_banner,
            loading: self.loading,
        }
    }

    pub fn feed(&self) -> &ClipFeed {
        &self.feed
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn playing(&self) -> Option<ClipId> {
        self.playback.playing()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    fn allocate_clip_id(&mut self) -> ClipId {
        let id = current_unix_ms().max(self.last_clip_id + 1);
        self.last_clip_id = id;
        id
    }

    fn persist_feed(&self) {
        if let Err(error) = store::save_clips(&self.store, self.feed.clips()) {
            self.log("error", "store.clips_write", &error.to_string());
        }
    }

    fn persist_balance(&self) {
        if let Err(error) = store::save_balance(&self.store, self.balance) {
            self.log("error", "store.tokens_write", &error.to_string());
        }
    }

    fn log(&self, level: &str, event: &str, detail: &str) {
        if let Some(path) = &self.log_path {
            let _ = runtime_log::append(path, level, event, detail);
        }
    }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::encode_wav;
    use crate::store::{MemoryStore, StoreError};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn signed_in_session() -> Session<MemoryStore> {
        let mut session = Session::new(MemoryStore::new());
        session.load();
        session
            .sign_in_local("gasper")
            .expect("sign-in should succeed");
        session
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn cast_clip(session: &mut Session<MemoryStore>, seconds: f64) -> ClipRecord {
        session
            .begin_capture(16_000)
            .expect("capture should begin");
        session.feed_capture(&vec![0.1; (seconds * 16_000.0) as usize]);
        let finished = session.end_capture().expect("capture should finish");
        session
            .commit_clip(&mut rng(), finished.duration_seconds, "clips/test.wav")
            .expect("clip should commit")
    }

    #[test]
    fn load_with_empty_store_yields_defaults() {
        let mut session = Session::new(MemoryStore::new());
        assert!(session.status().loading);

        session.load();
        let status = session.status();
        assert!(!status.loading);
        assert_eq!(status.gate, GateState::Unauthenticated);
        assert_eq!(status.balance, 0);
        assert_eq!(status.clip_count, 0);
    }

    #[test]
    fn capture_before_sign_in_is_rejected() {
        let mut session = Session::new(MemoryStore::new());
        session.load();
        assert!(matches!(
            session.begin_capture(16_000),
            Err(SessionError::NotSignedIn)
        ));
    }

    #[test]
    fn second_concurrent_capture_is_rejected() {
        let mut session = signed_in_session();
        session
            .begin_capture(16_000)
            .expect("first capture should begin");

        assert!(matches!(
            session.begin_capture(16_000),
            Err(SessionError::CaptureAlreadyActive)
        ));
        assert!(session.is_capturing());
    }

    #[test]
    fn finishing_a_capture_creates_a_record_and_credits_tokens() {
        let mut session = signed_in_session();
        let record = cast_clip(&mut session, 3.2);

        assert_eq!(record.duration_seconds, 3.2);
        assert!(record.tokens_awarded >= 58 && record.tokens_awarded <= 82);
        assert!(record.rating_score >= 3.0 && record.rating_score < 5.0);
        assert_eq!(record.play_count, 0);
        assert_eq!(record.owner_name, "gasper");

        let status = session.status();
        assert_eq!(status.clip_count, 1);
        assert_eq!(status.balance, u64::from(record.tokens_awarded));
        assert!(status.success_banner);
        assert!(!session.is_capturing());
    }

    #[test]
    fn preview_ticks_do_not_leak_into_the_authoritative_duration() {
        let mut session = signed_in_session();
        session
            .begin_capture(16_000)
            .expect("capture should begin");
        for _ in 0..50 {
            session.capture_tick();
        }
        assert_eq!(session.capture_preview_seconds(), 5.0);

        session.feed_capture(&vec![0.1; 16_000]);
        let finished = session.end_capture().expect("capture should finish");
        assert_eq!(finished.duration_seconds, 1.0);
    }

    #[test]
    fn ending_with_no_capture_is_a_no_op() {
        let mut session = signed_in_session();
        assert!(session.end_capture().is_none());
        assert_eq!(session.capture_tick(), 0.0);
    }

    #[test]
    fn cancel_discards_the_capture_without_a_record() {
        let mut session = signed_in_session();
        session
            .begin_capture(16_000)
            .expect("capture should begin");

        assert!(session.cancel_capture());
        assert!(!session.cancel_capture());
        assert_eq!(session.status().clip_count, 0);
        assert_eq!(session.balance(), 0);
    }

    #[test]
    fn clip_ids_are_unique_and_increasing() {
        let mut session = signed_in_session();
        let first = cast_clip(&mut session, 0.5);
        let second = cast_clip(&mut session, 0.5);
        let third = cast_clip(&mut session, 0.5);

        assert!(second.id > first.id);
        assert!(third.id > second.id);
    }

    #[test]
    fn committed_clips_are_persisted_to_the_store() {
        let store = MemoryStore::new();
        let mut session = Session::new(store);
        session.load();
        session
            .sign_in_local("gasper")
            .expect("sign-in should succeed");
        cast_clip(&mut session, 1.0);
        let balance = session.balance();

        // A fresh session over the same store sees the same state.
        let mut reloaded = Session::new(session.store);
        reloaded.load();
        assert_eq!(reloaded.status().clip_count, 1);
        assert_eq!(reloaded.balance(), balance);
        assert_eq!(reloaded.gate_state(), GateState::Authenticated);
    }

    #[test]
    fn upload_of_non_audio_changes_nothing() {
        let mut session = signed_in_session();
        let uploaded = UploadedAudio {
            file_name: "cast.mp4".to_string(),
            media_type: "video/mp4".to_string(),
            bytes: vec![0; 16],
        };

        let result = session.upload_clip(&mut rng(), &uploaded, "clips/cast.mp4");
        assert!(matches!(
            result,
            Err(SessionError::UnsupportedMediaType(_))
        ));
        assert_eq!(session.status().clip_count, 0);
        assert_eq!(session.balance(), 0);
        assert!(!session.status().success_banner);
    }

    #[test]
    fn upload_of_a_wav_creates_a_record() {
        let mut session = signed_in_session();
        let bytes = encode_wav(&vec![0.1; 24_000], 16_000).expect("wav should encode");
        let uploaded = UploadedAudio {
            file_name: "cast.wav".to_string(),
            media_type: "audio/wav".to_string(),
            bytes,
        };

        let record = session
            .upload_clip(&mut rng(), &uploaded, "clips/cast.wav")
            .expect("upload should succeed");
        assert_eq!(record.duration_seconds, 1.5);
        assert_eq!(session.status().clip_count, 1);
    }

    #[test]
    fn toggling_between_clips_moves_the_single_playing_slot() {
        let mut session = signed_in_session();
        let first = cast_clip(&mut session, 0.5);
        let second = cast_clip(&mut session, 0.5);

        let start_first = session.toggle_playback(first.id);
        assert_eq!(
            start_first,
            Some(PlaybackChange::Started { stopped: None })
        );

        let start_second = session.toggle_playback(second.id);
        assert_eq!(
            start_second,
            Some(PlaybackChange::Started {
                stopped: Some(first.id)
            })
        );

        assert_eq!(session.playing(), Some(second.id));
        let feed = session.feed();
        assert_eq!(feed.get(first.id).map(|c| c.play_count), Some(1));
        assert_eq!(feed.get(second.id).map(|c| c.play_count), Some(1));
    }

    #[test]
    fn pausing_does_not_increment_the_play_count() {
        let mut session = signed_in_session();
        let clip = cast_clip(&mut session, 0.5);

        session.toggle_playback(clip.id);
        session.toggle_playback(clip.id);

        assert_eq!(session.playing(), None);
        assert_eq!(session.feed().get(clip.id).map(|c| c.play_count), Some(1));
    }

    #[test]
    fn toggling_an_unknown_clip_is_a_no_op() {
        let mut session = signed_in_session();
        assert_eq!(session.toggle_playback(404), None);
        assert_eq!(session.playing(), None);
    }

    #[test]
    fn natural_completion_clears_the_playing_clip() {
        let mut session = signed_in_session();
        let clip = cast_clip(&mut session, 0.5);
        session.toggle_playback(clip.id);

        session.playback_finished();
        assert_eq!(session.playing(), None);
        assert_eq!(session.feed().get(clip.id).map(|c| c.play_count), Some(1));
    }

    #[test]
    fn deleting_the_playing_clip_stops_playback() {
        let mut session = signed_in_session();
        let clip = cast_clip(&mut session, 0.5);
        session.toggle_playback(clip.id);

        let removed = session.delete_clip(clip.id);
        assert_eq!(removed.map(|c| c.id), Some(clip.id));
        assert_eq!(session.playing(), None);
        assert_eq!(session.status().clip_count, 0);
    }

    #[test]
    fn deleting_an_unknown_clip_is_a_no_op() {
        let mut session = signed_in_session();
        cast_clip(&mut session, 0.5);

        assert!(session.delete_clip(404).is_none());
        assert_eq!(session.status().clip_count, 1);
    }

    #[test]
    fn sign_out_keeps_the_feed_and_balance_for_the_next_sign_in() {
        let mut session = signed_in_session();
        let clip = cast_clip(&mut session, 1.0);
        let balance = session.balance();
        session.toggle_playback(clip.id);

        session.sign_out();
        let status = session.status();
        assert_eq!(status.gate, GateState::Unauthenticated);
        assert_eq!(status.playing, None);
        assert_eq!(status.clip_count, 1);
        assert_eq!(status.balance, balance);

        session
            .sign_in_local("gasper")
            .expect("sign-in should succeed");
        assert_eq!(session.status().clip_count, 1);
        assert_eq!(session.balance(), balance);
    }

    #[test]
    fn sign_out_discards_an_in_flight_capture() {
        let mut session = signed_in_session();
        session
            .begin_capture(16_000)
            .expect("capture should begin");

        session.sign_out();
        assert!(!session.is_capturing());
        assert!(session.end_capture().is_none());
    }

    struct FailingStore;

    impl KeyValue for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Write("disk full".to_string()))
        }
    }

    #[test]
    fn persistence_failure_keeps_the_in_memory_state() {
        let mut session = Session::new(FailingStore);
        session.load();
        session
            .sign_in_local("gasper")
            .expect("sign-in should survive a failing store");

        let record = session
            .commit_clip(&mut rng(), 2.0, "clips/unsaved.wav")
            .expect("commit should survive a failing store");

        assert_eq!(session.status().clip_count, 1);
        assert_eq!(session.balance(), u64::from(record.tokens_awarded));
    }

    #[test]
    fn banner_raises_on_commit_and_dismisses_on_request() {
        let mut session = signed_in_session();
        assert!(!session.status().success_banner);

        cast_clip(&mut session, 0.5);
        assert!(session.status().success_banner);

        session.dismiss_success_banner();
        assert!(!session.status().success_banner);
    }
}
