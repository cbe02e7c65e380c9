pub mod artifact;
pub mod audio;
pub mod capture;
pub mod clip;
pub mod error;
pub mod feed;
pub mod identity;
pub mod playback;
pub mod reward;
pub mod runtime_log;
pub mod session;
pub mod store;
pub mod upload;

#[cfg(feature = "desktop")]
use clip::{ClipId, ClipRecord};
#[cfg(feature = "desktop")]
use error::SessionError;
#[cfg(feature = "desktop")]
use playback::PlaybackChange;
#[cfg(feature = "desktop")]
use serde::Serialize;
#[cfg(feature = "desktop")]
use session::{Session, SessionStatus};
#[cfg(feature = "desktop")]
use std::path::PathBuf;
#[cfg(feature = "desktop")]
use std::sync::mpsc;
#[cfg(feature = "desktop")]
use std::sync::Mutex;
#[cfg(feature = "desktop")]
use std::thread;
#[cfg(feature = "desktop")]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(feature = "desktop")]
use store::FileStore;
#[cfg(feature = "desktop")]
use tauri::Manager;
#[cfg(feature = "desktop")]
use tauri_plugin_opener::OpenerExt;
#[cfg(feature = "desktop")]
use upload::UploadedAudio;

#[cfg(feature = "desktop")]
struct AppState {
    session: Mutex<Session<FileStore>>,
}

/// The cpal stream handle is not Send, so a dedicated thread owns it for the
/// whole capture and releases the device when told to stop (or when the
/// spawning side goes away).
#[cfg(feature = "desktop")]
struct CaptureWorker {
    stop_tx: mpsc::Sender<()>,
    frames_rx: mpsc::Receiver<Vec<f32>>,
    sample_rate_hz: u32,
    handle: thread::JoinHandle<()>,
}

#[cfg(feature = "desktop")]
impl CaptureWorker {
    fn spawn() -> Result<Self, SessionError> {
        let (frames_tx, frames_rx) = mpsc::sync_channel::<Vec<f32>>(64);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, SessionError>>();

        let handle = thread::spawn(move || {
            let stream = match audio::open_capture_stream(frames_tx) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(stream.sample_rate_hz));
                    stream
                }
                Err(error) => {
                    let _ = ready_tx.send(Err(error));
                    return;
                }
            };
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(sample_rate_hz)) => Ok(Self {
                stop_tx,
                frames_rx,
                sample_rate_hz,
                handle,
            }),
            Ok(Err(error)) => {
                let _ = handle.join();
                Err(error)
            }
            Err(_) => Err(SessionError::DeviceUnavailable(
                "capture worker exited before reporting".to_string(),
            )),
        }
    }

    fn drain_into(&self, session: &mut Session<FileStore>) {
        while let Ok(chunk) = self.frames_rx.try_recv() {
            session.feed_capture(&chunk);
        }
    }

    fn shutdown(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}

#[cfg(feature = "desktop")]
#[derive(Default)]
struct CaptureDeviceState {
    worker: Mutex<Option<CaptureWorker>>,
}

#[cfg(feature = "desktop")]
struct ArtifactState {
    dir: PathBuf,
}

#[cfg(feature = "desktop")]
struct RuntimeLogState {
    path: PathBuf,
}

/// What the webview should do with its audio element after a toggle.
#[cfg(feature = "desktop")]
#[derive(Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum PlaybackDirective {
    None,
    Pause,
    Play { clip_id: ClipId, audio_ref: String },
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn health_check() -> &'static str {
    "ok"
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_status(state: tauri::State<'_, AppState>) -> Result<SessionStatus, String> {
    let session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_feed(state: tauri::State<'_, AppState>) -> Result<Vec<ClipRecord>, String> {
    let session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    Ok(session.feed().clips().to_vec())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn sign_in_local(
    state: tauri::State<'_, AppState>,
    logs: tauri::State<'_, RuntimeLogState>,
    username: String,
) -> Result<SessionStatus, String> {
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session
        .sign_in_local(&username)
        .map_err(|error| error.to_string())?;

    let _ = runtime_log::append(&logs.path, "info", "identity.sign_in", "local sign-in");
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn sign_in_federated(
    state: tauri::State<'_, AppState>,
    logs: tauri::State<'_, RuntimeLogState>,
    handle: String,
    avatar_ref: String,
    provider_token: String,
) -> Result<SessionStatus, String> {
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session
        .sign_in_federated(&handle, &avatar_ref, &provider_token)
        .map_err(|error| error.to_string())?;

    let _ = runtime_log::append(&logs.path, "info", "identity.sign_in", "federated sign-in");
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn sign_out(
    state: tauri::State<'_, AppState>,
    device: tauri::State<'_, CaptureDeviceState>,
    logs: tauri::State<'_, RuntimeLogState>,
) -> Result<SessionStatus, String> {
    release_capture_device(&device)?;

    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session.sign_out();

    let _ = runtime_log::append(&logs.path, "info", "identity.sign_out", "signed out");
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn begin_capture(
    state: tauri::State<'_, AppState>,
    device: tauri::State<'_, CaptureDeviceState>,
    logs: tauri::State<'_, RuntimeLogState>,
) -> Result<SessionStatus, String> {
    {
        let session = state
            .session
            .lock()
            .map_err(|_| "failed to acquire session state".to_string())?;
        if session.is_capturing() {
            return Err(SessionError::CaptureAlreadyActive.to_string());
        }
    }

    let worker = CaptureWorker::spawn().map_err(|error| {
        let _ = runtime_log::append(&logs.path, "warn", "capture.denied", &error.to_string());
        error.to_string()
    })?;

    // Device slot before session: every handler that needs both takes them
    // in this order.
    let mut slot = device
        .worker
        .lock()
        .map_err(|_| "failed to acquire capture device state".to_string())?;
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    if let Err(error) = session.begin_capture(worker.sample_rate_hz) {
        worker.shutdown();
        return Err(error.to_string());
    }
    *slot = Some(worker);

    let _ = runtime_log::append(&logs.path, "info", "capture.begin", "recording started");
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn capture_tick(
    state: tauri::State<'_, AppState>,
    device: tauri::State<'_, CaptureDeviceState>,
) -> Result<f64, String> {
    let slot = device
        .worker
        .lock()
        .map_err(|_| "failed to acquire capture device state".to_string())?;
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    if let Some(worker) = slot.as_ref() {
        worker.drain_into(&mut session);
    }

    Ok(session.capture_tick())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn finish_capture(
    state: tauri::State<'_, AppState>,
    device: tauri::State<'_, CaptureDeviceState>,
    artifacts: tauri::State<'_, ArtifactState>,
    logs: tauri::State<'_, RuntimeLogState>,
) -> Result<Option<ClipRecord>, String> {
    let worker = device
        .worker
        .lock()
        .map_err(|_| "failed to acquire capture device state".to_string())?
        .take();

    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;

    if let Some(worker) = worker {
        worker.drain_into(&mut session);
        worker.shutdown();
    }

    let finished = match session.end_capture() {
        Some(finished) => finished,
        None => return Ok(None),
    };

    let wav = capture::encode_wav(&finished.samples, finished.sample_rate_hz)?;
    let path = artifact::save_artifact(&artifacts.dir, &artifact_stem(), &wav)?;
    let record = session
        .commit_clip(
            &mut rand::thread_rng(),
            finished.duration_seconds,
            &path.to_string_lossy(),
        )
        .map_err(|error| error.to_string())?;

    let _ = runtime_log::append(
        &logs.path,
        "info",
        "clip.cast",
        &format!(
            "captured {}s for {} tokens",
            record.duration_seconds, record.tokens_awarded
        ),
    );
    Ok(Some(record))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn cancel_capture(
    state: tauri::State<'_, AppState>,
    device: tauri::State<'_, CaptureDeviceState>,
    logs: tauri::State<'_, RuntimeLogState>,
) -> Result<SessionStatus, String> {
    release_capture_device(&device)?;

    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    if session.cancel_capture() {
        let _ = runtime_log::append(&logs.path, "info", "capture.cancel", "recording abandoned");
    }
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn upload_clip(
    state: tauri::State<'_, AppState>,
    artifacts: tauri::State<'_, ArtifactState>,
    logs: tauri::State<'_, RuntimeLogState>,
    file_name: String,
    media_type: String,
    bytes: Vec<u8>,
) -> Result<ClipRecord, String> {
    let uploaded = UploadedAudio {
        file_name,
        media_type,
        bytes,
    };
    let duration = upload::probe_duration(&uploaded).map_err(|error| {
        let _ = runtime_log::append(&logs.path, "warn", "upload.rejected", &error.to_string());
        error.to_string()
    })?;

    let path = artifact::save_artifact(&artifacts.dir, &artifact_stem(), &uploaded.bytes)?;

    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    let record = session
        .commit_clip(&mut rand::thread_rng(), duration, &path.to_string_lossy())
        .map_err(|error| error.to_string())?;

    let _ = runtime_log::append(
        &logs.path,
        "info",
        "clip.upload",
        &format!(
            "accepted {} ({}s) for {} tokens",
            uploaded.file_name, record.duration_seconds, record.tokens_awarded
        ),
    );
    Ok(record)
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn toggle_playback(
    state: tauri::State<'_, AppState>,
    clip_id: ClipId,
) -> Result<PlaybackDirective, String> {
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;

    let directive = match session.toggle_playback(clip_id) {
        None => PlaybackDirective::None,
        Some(PlaybackChange::Paused) => PlaybackDirective::Pause,
        Some(PlaybackChange::Started { .. }) => {
            let audio_ref = session
                .feed()
                .get(clip_id)
                .map(|clip| clip.audio_ref.clone())
                .unwrap_or_default();
            PlaybackDirective::Play { clip_id, audio_ref }
        }
    };
    Ok(directive)
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn playback_finished(state: tauri::State<'_, AppState>) -> Result<(), String> {
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session.playback_finished();
    Ok(())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn delete_clip(
    state: tauri::State<'_, AppState>,
    logs: tauri::State<'_, RuntimeLogState>,
    clip_id: ClipId,
) -> Result<SessionStatus, String> {
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;

    if let Some(removed) = session.delete_clip(clip_id) {
        artifact::remove_artifact(&removed.audio_ref);
        let _ = runtime_log::append(
            &logs.path,
            "info",
            "clip.delete",
            &format!("deleted clip {}", removed.id),
        );
    }
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn dismiss_success_banner(state: tauri::State<'_, AppState>) -> Result<SessionStatus, String> {
    let mut session = state
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session.dismiss_success_banner();
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_runtime_logs(
    logs: tauri::State<'_, RuntimeLogState>,
    limit: Option<usize>,
) -> Result<Vec<String>, String> {
    let normalized_limit = limit.unwrap_or(40).clamp(1, 200);
    runtime_log::read_recent(&logs.path, normalized_limit)
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn clear_runtime_logs(logs: tauri::State<'_, RuntimeLogState>) -> Result<(), String> {
    runtime_log::clear(&logs.path)
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn reveal_clips_dir(
    app: tauri::AppHandle,
    artifacts: tauri::State<'_, ArtifactState>,
) -> Result<(), String> {
    std::fs::create_dir_all(&artifacts.dir).map_err(|error| error.to_string())?;
    app.opener()
        .reveal_item_in_dir(&artifacts.dir)
        .map_err(|error| error.to_string())
}

#[cfg(feature = "desktop")]
fn release_capture_device(device: &tauri::State<'_, CaptureDeviceState>) -> Result<(), String> {
    let worker = device
        .worker
        .lock()
        .map_err(|_| "failed to acquire capture device state".to_string())?
        .take();
    if let Some(worker) = worker {
        worker.shutdown();
    }
    Ok(())
}

#[cfg(feature = "desktop")]
fn artifact_stem() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let logs_path = runtime_log::default_log_path();
    let mut session = Session::new(FileStore::new(FileStore::default_root()));
    session.set_log_path(logs_path.clone());
    session.load();

    let _ = runtime_log::append(&logs_path, "info", "app.start", "application startup");

    tauri::Builder::default()
        .manage(AppState {
            session: Mutex::new(session),
        })
        .manage(CaptureDeviceState::default())
        .manage(ArtifactState {
            dir: artifact::default_artifacts_dir(),
        })
        .manage(RuntimeLogState {
            path: logs_path,
        })
        .on_window_event(|window, event| {
            if matches!(event, tauri::WindowEvent::CloseRequested { .. }) {
                let device = window.app_handle().state::<CaptureDeviceState>();
                if let Ok(mut slot) = device.worker.lock() {
                    if let Some(worker) = slot.take() {
                        worker.shutdown();
                    }
                }
                let logs = window.app_handle().state::<RuntimeLogState>();
                let _ = runtime_log::append(&logs.path, "info", "app.stop", "application shutdown");
            }
        })
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            health_check,
            get_status,
            get_feed,
            sign_in_local,
            sign_in_federated,
            sign_out,
            begin_capture,
            capture_tick,
            finish_capture,
            cancel_capture,
            upload_clip,
            toggle_playback,
            playback_finished,
            delete_clip,
            dismiss_success_banner,
            get_runtime_logs,
            clear_runtime_logs,
            reveal_clips_dir
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(not(feature = "desktop"))]
pub fn run() {}
