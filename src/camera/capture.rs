//! Camera helper handle and public API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::controller::SessionController;
use super::error::CameraError;
use super::listener::{CameraListener, ListenerSlot};
use super::platform::CameraPlatform;
use super::settings::CameraSettings;
use super::types::{CameraIdentity, Resolution, SessionState};
use super::worker::BackgroundWorker;

/// Name of the thread that runs every camera callback.
pub const WORKER_NAME: &str = "camera-background";

/// Camera helper handle.
///
/// Owns the camera worker thread and the session controller. The host keeps
/// its listener alive; the helper only holds a weak reference to it, so a
/// dropped host stops receiving events without further cleanup.
///
/// `start`, `stop`, `switch_camera` and `release` are idempotent. None of
/// them may be called from inside a listener callback: `stop` and `release`
/// join the worker the callbacks run on.
pub struct CameraHelper {
    /// State machine driven on the worker
    controller: Arc<SessionController>,
    /// Worker thread, started on every `start()`
    worker: Mutex<BackgroundWorker>,
    released: AtomicBool,
}

impl std::fmt::Debug for CameraHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraHelper")
            .field("controller", &self.controller)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CameraHelper {
    /// Create a helper for `platform`. Nothing is opened until `start()`.
    pub fn new<L: CameraListener + 'static>(
        platform: Arc<dyn CameraPlatform>,
        settings: CameraSettings,
        listener: &Arc<L>,
    ) -> Self {
        Self {
            controller: SessionController::new(platform, settings, ListenerSlot::new(listener)),
            worker: Mutex::new(BackgroundWorker::new(WORKER_NAME)),
            released: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        self.controller.settings()
    }

    /// Start the worker and open the camera.
    ///
    /// Opening is asynchronous; the outcome arrives as `on_camera_opened` or
    /// `on_camera_error`. Calling `start()` while a camera is open does
    /// nothing. Always safe to call again after an error.
    pub fn start(&self) {
        if self.released.load(Ordering::SeqCst) {
            log::debug!("Ignoring start on a released camera helper");
            return;
        }
        let started = self.lock_worker().start();
        match started {
            Ok(handle) => {
                self.controller.attach_worker(handle);
                self.controller.request_open();
            }
            Err(e) => self
                .controller
                .report(CameraError::Worker(e.to_string())),
        }
    }

    /// Close the camera and stop the worker.
    ///
    /// Returns once the teardown and every callback queued before it have
    /// run. A pending switch is cancelled.
    pub fn stop(&self) {
        if !self.is_running() {
            return;
        }
        self.controller.cancel_pending();
        self.controller.request_close();
        self.lock_worker().stop();
        self.controller.detach_worker();
    }

    /// Switch between the front and back cameras.
    ///
    /// While streaming this closes the current camera and reopens the other
    /// one once the close completes. Otherwise it only changes which camera
    /// the next `start()` opens.
    pub fn switch_camera(&self) {
        self.controller.request_switch();
    }

    /// Stop everything and detach the listener. No callback fires once this
    /// returns, and later calls to the other operations do nothing.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop();
        self.controller.release();
        log::debug!("Camera helper released");
    }

    /// Tell the helper the preview surface can now be used. Resumes an open
    /// that was waiting for it.
    pub fn surface_available(&self) {
        self.controller.surface_available();
    }

    /// Tell the helper the view hosting the preview was resized.
    pub fn surface_size_changed(&self, view: Resolution) {
        self.controller.surface_size_changed(view);
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    /// Camera of the current or most recent session.
    pub fn camera_identity(&self) -> Option<CameraIdentity> {
        self.controller.identity()
    }

    /// Negotiated preview size of the current or most recent session.
    pub fn preview_size(&self) -> Option<Resolution> {
        self.controller.preview_size()
    }

    /// Check if the worker thread is currently running.
    pub fn is_running(&self) -> bool {
        self.lock_worker().is_running()
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, BackgroundWorker> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CameraHelper {
    fn drop(&mut self) {
        self.release();
    }
}
