//! Camera session state machine.
//!
//! Every transition runs on the camera worker: caller-thread entry points
//! only queue tasks, and platform callbacks arrive as [`DeviceEvent`]s on the
//! same queue. The device and session handles never leave [`SessionCore`].

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::admission::{AdmissionGuard, AdmissionLock};
use super::buffer_pool::FrameBufferPool;
use super::error::{CameraError, PlatformError};
use super::frame_utils::convert_to_nv21;
use super::listener::{CameraListener, ListenerSlot, OpenedInfo, PreviewFrame};
use super::orientation::{delivered_orientation, preview_transform};
use super::platform::{
    CameraDevice, CameraPlatform, CaptureRequest, CaptureSession, CapturedImage, DeviceCallbacks,
    DeviceEvent, EventSink, ImageFormat,
};
use super::settings::CameraSettings;
use super::size_select::select_preview_size;
use super::types::{CameraIdentity, PreviewGeometry, Resolution, SensorOrientation, SessionState};
use super::worker::WorkerHandle;

/// Outputs negotiated for the camera about to be opened.
#[derive(Debug, Clone)]
struct OutputSelection {
    identity: CameraIdentity,
    sensor: SensorOrientation,
    size: Resolution,
    fell_back: bool,
}

/// State owned by the worker. Callers only read it through accessors.
struct SessionCore {
    state: SessionState,
    /// Camera the next open tries first
    requested: Option<CameraIdentity>,
    /// Camera of the current (or last) session
    identity: Option<CameraIdentity>,
    target: Option<OutputSelection>,
    device: Option<Box<dyn CameraDevice>>,
    session: Option<Box<dyn CaptureSession>>,
    request: Option<CaptureRequest>,
    /// Reopen with `requested` once the platform confirms the close
    switch_pending: bool,
    /// A switch is underway, from its close until the reopen starts
    switch_in_flight: bool,
    awaiting_surface: bool,
}

impl SessionCore {
    fn new(requested: Option<CameraIdentity>) -> Self {
        Self {
            state: SessionState::Idle,
            requested,
            identity: None,
            target: None,
            device: None,
            session: None,
            request: None,
            switch_pending: false,
            switch_in_flight: false,
            awaiting_surface: false,
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::debug!("Camera state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn preview_size(&self) -> Option<Resolution> {
        self.target.as_ref().map(|t| t.size)
    }
}

/// Per-frame scratch space, guarded as one unit so the three planes of a
/// frame are never mixed with the next frame's.
#[derive(Default)]
struct FrameScratch {
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
    pool: FrameBufferPool,
}

/// Drives one camera through open, configure, stream and close.
pub struct SessionController {
    me: Weak<SessionController>,
    platform: Arc<dyn CameraPlatform>,
    settings: CameraSettings,
    listener: ListenerSlot,
    admission: AdmissionLock,
    core: Mutex<SessionCore>,
    frames: Mutex<FrameScratch>,
    worker: Mutex<Option<WorkerHandle>>,
    /// Bumped to invalidate queued opens
    epoch: AtomicU64,
    /// The admission token was handed to an open awaiting its outcome
    open_holds_token: AtomicBool,
    released: AtomicBool,
}

impl SessionController {
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        settings: CameraSettings,
        listener: ListenerSlot,
    ) -> Arc<Self> {
        let requested = settings.camera().cloned();
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            platform,
            settings,
            listener,
            admission: AdmissionLock::new(),
            core: Mutex::new(SessionCore::new(requested)),
            frames: Mutex::new(FrameScratch::default()),
            worker: Mutex::new(None),
            epoch: AtomicU64::new(0),
            open_holds_token: AtomicBool::new(false),
            released: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.lock_core().state
    }

    /// Camera of the current or most recent session.
    pub fn identity(&self) -> Option<CameraIdentity> {
        self.lock_core().identity.clone()
    }

    /// Camera the next open will try first.
    pub fn requested_camera(&self) -> Option<CameraIdentity> {
        self.lock_core().requested.clone()
    }

    pub fn preview_size(&self) -> Option<Resolution> {
        self.lock_core().preview_size()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Route queued work and platform callbacks through `worker`.
    pub fn attach_worker(&self, worker: WorkerHandle) {
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(worker);
    }

    pub fn detach_worker(&self) {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Queue an open. Ignored on the worker if a device is already held.
    pub fn request_open(&self) {
        if self.is_released() {
            return;
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        if !self.post(move |c| c.open_camera(epoch)) {
            log::warn!("Camera worker not running, open request dropped");
        }
    }

    /// Take the admission lock on the calling thread and queue the teardown.
    ///
    /// Blocks for at most the open timeout. On timeout the teardown still
    /// runs, without the token, so an open that never completed is abandoned.
    pub fn request_close(&self) {
        let timeout = self.settings.open_timeout();
        let guard = self.admission.try_acquire_for(timeout);
        let timed_out = guard.is_none();

        let posted = self.post(move |c| {
            if timed_out {
                c.report(CameraError::AdmissionTimeout(timeout));
            }
            c.close_camera(guard);
        });
        if !posted {
            log::debug!("Camera worker not running, closing inline");
            self.close_camera(None);
        }
    }

    /// Flip between the front and back cameras.
    ///
    /// With no device held this only records the camera for the next open.
    /// While a device is held it marks a switch and starts a close; the
    /// reopen is queued when the platform confirms the close. Further calls
    /// are no-ops until the reopen starts.
    pub fn request_switch(&self) {
        if self.is_released() {
            return;
        }
        let close_now = {
            let mut core = self.lock_core();
            if core.switch_in_flight {
                log::debug!("Camera switch already in progress");
                return;
            }
            let holding = core.device.is_some();
            let (first, second) = if holding {
                (&core.identity, &core.requested)
            } else {
                (&core.requested, &core.identity)
            };
            let current = first
                .clone()
                .or_else(|| second.clone())
                .unwrap_or_else(CameraIdentity::back);

            let Some(target) = current.flipped() else {
                log::warn!("Camera {} has no counterpart to switch to", current);
                return;
            };
            log::info!("Switching camera {} -> {}", current, target);
            core.requested = Some(target);

            if holding {
                core.switch_pending = true;
                core.switch_in_flight = true;
            }
            holding
        };
        if close_now {
            self.request_close();
        }
    }

    /// Invalidate queued opens, including a reopen for a pending switch.
    pub fn cancel_pending(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut core = self.lock_core();
        core.switch_pending = false;
        core.switch_in_flight = false;
    }

    /// Detach the listener and make the controller inert.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.cancel_pending();
        self.listener.clear();
        self.lock_core().awaiting_surface = false;
    }

    /// The host's preview surface became usable. Runs an open that was
    /// deferred waiting for it.
    pub fn surface_available(&self) {
        let awaiting = self.lock_core().awaiting_surface;
        if awaiting {
            log::debug!("Preview surface ready, resuming open");
            self.request_open();
        }
    }

    /// Refit the preview to a new view size.
    pub fn surface_size_changed(&self, view: Resolution) {
        let Some(size) = self.preview_size() else {
            return;
        };
        let transform = preview_transform(
            view,
            size,
            self.settings.display_rotation(),
            self.settings.mirror(),
        );
        self.settings.surface().set_transform(&transform);
    }

    /// Log `error` and hand it to the listener.
    pub(crate) fn report(&self, error: CameraError) {
        if error.is_warning() {
            log::warn!("{error}");
        } else {
            log::error!("Camera error: {error}");
        }
        self.emit(|l| l.on_camera_error(&error));
    }

    fn emit(&self, f: impl FnOnce(&dyn CameraListener)) {
        if self.is_released() {
            return;
        }
        if let Some(listener) = self.listener.get() {
            f(listener.as_ref());
        }
    }

    /// Free the token handed to an open, if that open still holds it.
    fn release_open_token(&self) {
        if self.open_holds_token.swap(false, Ordering::SeqCst) {
            self.admission.release();
        }
    }

    fn lock_core(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn worker_handle(&self) -> Option<WorkerHandle> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn post(&self, task: impl FnOnce(&SessionController) + Send + 'static) -> bool {
        let Some(worker) = self.worker_handle() else {
            return false;
        };
        let me = self.me.clone();
        worker.post(move || {
            if let Some(controller) = me.upgrade() {
                task(&controller);
            }
        })
    }

    fn callbacks(&self) -> Option<DeviceCallbacks> {
        let worker = self.worker_handle()?;
        let sink: Weak<dyn EventSink> = self.me.clone();
        Some(DeviceCallbacks::new(worker, sink))
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.is_released() || self.epoch.load(Ordering::SeqCst) != epoch
    }

    fn open_camera(&self, epoch: u64) {
        if self.is_stale(epoch) {
            log::debug!("Dropping cancelled camera open");
            return;
        }
        let surface = Arc::clone(self.settings.surface());
        let preferred = {
            let mut core = self.lock_core();
            core.switch_in_flight = false;
            if core.device.is_some() || !core.state.accepts_open() {
                log::debug!("Camera open ignored in state {}", core.state);
                return;
            }
            if !surface.is_available() {
                log::info!("Preview surface not ready, deferring camera open");
                core.awaiting_surface = true;
                return;
            }
            core.awaiting_surface = false;
            core.requested.clone()
        };

        let selection = match self.select_outputs(preferred) {
            Ok(selection) => selection,
            Err(e) => {
                self.report(e);
                return;
            }
        };
        if selection.fell_back {
            self.report(CameraError::NoSuitableSize {
                fallback: selection.size,
            });
        }
        surface.set_transform(&preview_transform(
            surface.view_size(),
            selection.size,
            self.settings.display_rotation(),
            self.settings.mirror(),
        ));

        let timeout = self.settings.open_timeout();
        let Some(guard) = self.admission.try_acquire_for(timeout) else {
            self.report(CameraError::AdmissionTimeout(timeout));
            return;
        };
        let Some(callbacks) = self.callbacks() else {
            return;
        };
        let identity = selection.identity.clone();
        {
            let mut core = self.lock_core();
            if self.is_stale(epoch) || core.device.is_some() || !core.state.accepts_open() {
                return;
            }
            core.target = Some(selection);
            core.transition(SessionState::Opening);
        }

        log::info!("Opening camera {}", identity);
        match self.platform.open_device(&identity, callbacks) {
            Ok(()) => {
                self.open_holds_token.store(true, Ordering::SeqCst);
                guard.hand_off();
            }
            Err(e) => {
                {
                    let mut core = self.lock_core();
                    if core.state == SessionState::Opening {
                        core.transition(SessionState::Idle);
                    }
                }
                drop(guard);
                self.report(e.into());
            }
        }
    }

    /// Pick the camera and preview size: the preferred camera first, then
    /// every enumerated camera in order.
    fn select_outputs(
        &self,
        preferred: Option<CameraIdentity>,
    ) -> Result<OutputSelection, CameraError> {
        let mut order: Vec<CameraIdentity> = preferred.into_iter().collect();
        match self.platform.camera_ids() {
            Ok(ids) => {
                for id in ids {
                    if !order.contains(&id) {
                        order.push(id);
                    }
                }
            }
            Err(e) if order.is_empty() => return Err(e.into()),
            Err(e) => log::warn!("Camera enumeration failed: {e}"),
        }

        let mut last_error: Option<PlatformError> = None;
        for id in order {
            let characteristics = match self.platform.characteristics(&id) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("Skipping camera {}: {}", id, e);
                    last_error = Some(e);
                    continue;
                }
            };
            let Some(sizes) = characteristics.output_sizes else {
                log::debug!("Camera {} has no stream configuration", id);
                continue;
            };
            let Some(selection) = select_preview_size(&sizes, self.settings.size_constraints())
            else {
                log::debug!("Camera {} advertises no preview sizes", id);
                continue;
            };
            log::debug!("Camera {} preview size {}", id, selection.size);
            return Ok(OutputSelection {
                identity: id,
                sensor: characteristics.sensor_orientation,
                size: selection.size,
                fell_back: selection.fell_back,
            });
        }

        Err(match last_error {
            Some(e) => e.into(),
            None => CameraError::DeviceUnavailable(
                "no camera offers a usable preview configuration".to_string(),
            ),
        })
    }

    fn close_camera(&self, guard: Option<AdmissionGuard>) {
        let (session, device, switching) = {
            let mut core = self.lock_core();
            let session = core.session.take();
            let device = core.device.take();
            core.request = None;
            if session.is_some() || device.is_some() {
                core.transition(SessionState::Closing);
            }
            (session, device, core.switch_pending)
        };

        if let Some(mut session) = session {
            session.close();
        }
        let had_device = device.is_some();
        if let Some(mut device) = device {
            device.close();
        }

        {
            let mut core = self.lock_core();
            if had_device {
                if !(switching && core.switch_pending) {
                    core.transition(SessionState::Closed);
                    core.switch_in_flight = false;
                }
            } else if !core.state.accepts_open() {
                log::debug!("Abandoning camera in state {}", core.state);
                core.transition(SessionState::Idle);
                core.switch_pending = false;
                core.switch_in_flight = false;
            }
        }

        match guard {
            Some(guard) => drop(guard),
            // No token of our own: only an abandoned open's token is freed.
            None => self.release_open_token(),
        }
        if had_device {
            log::info!("Camera closed");
            self.emit(|l| l.on_camera_closed());
        }
    }

    fn on_opened(&self, mut device: Box<dyn CameraDevice>) {
        self.release_open_token();
        let mut core = self.lock_core();
        let target = match core.target.clone() {
            Some(target) if core.state == SessionState::Opening => target,
            _ => {
                drop(core);
                log::debug!("Closing camera {} opened after cancellation", device.identity());
                device.close();
                return;
            }
        };

        let identity = device.identity().clone();
        core.identity = Some(identity.clone());
        core.transition(SessionState::Open);

        self.settings.surface().set_buffer_size(target.size);
        let request = CaptureRequest::preview(target.size);
        core.transition(SessionState::ConfiguringSession);
        let result = match self.callbacks() {
            Some(callbacks) => device.create_capture_session(&request, callbacks),
            None => Err(PlatformError::Failed("camera worker stopped".to_string())),
        };
        core.device = Some(device);
        core.request = Some(request);
        if result.is_err() {
            core.transition(SessionState::Error);
        }
        drop(core);

        let info = OpenedInfo {
            orientation: delivered_orientation(
                &identity,
                target.sensor,
                self.settings.display_rotation(),
            ),
            identity,
            preview_size: target.size,
            mirrored: self.settings.mirror(),
        };
        log::info!(
            "Camera {} opened at {}, orientation {}",
            info.identity,
            info.preview_size,
            info.orientation
        );
        self.emit(|l| l.on_camera_opened(&info));

        if let Err(e) = result {
            self.report(CameraError::SessionConfigFailed(e.to_string()));
        }
    }

    fn on_session_configured(&self, mut session: Box<dyn CaptureSession>) {
        let mut core = self.lock_core();
        if core.device.is_none() || core.state != SessionState::ConfiguringSession {
            drop(core);
            log::debug!("Closing capture session configured after teardown");
            session.close();
            return;
        }

        let result = match core.request.as_ref() {
            Some(request) => session.set_repeating_request(request),
            None => Err(PlatformError::Failed("no capture request".to_string())),
        };
        core.session = Some(session);
        match result {
            Ok(()) => {
                core.transition(SessionState::Streaming);
                log::info!("Camera streaming");
            }
            Err(e) => {
                core.transition(SessionState::Error);
                drop(core);
                self.report(CameraError::SessionConfigFailed(e.to_string()));
            }
        }
    }

    fn on_session_configure_failed(&self) {
        {
            let mut core = self.lock_core();
            if core.state != SessionState::ConfiguringSession {
                return;
            }
            core.transition(SessionState::Error);
        }
        self.report(CameraError::SessionConfigFailed(
            "the platform rejected the session outputs".to_string(),
        ));
    }

    /// The device went away or failed; drop everything and go back to Idle.
    fn on_device_lost(&self, error: impl FnOnce(Option<CameraIdentity>) -> CameraError) {
        self.release_open_token();
        let (session, device, identity) = {
            let mut core = self.lock_core();
            let identity = core
                .identity
                .clone()
                .or_else(|| core.target.as_ref().map(|t| t.identity.clone()));
            core.request = None;
            core.switch_pending = false;
            core.switch_in_flight = false;
            core.transition(SessionState::Idle);
            (core.session.take(), core.device.take(), identity)
        };
        if let Some(mut session) = session {
            session.close();
        }
        if let Some(mut device) = device {
            device.close();
        }
        self.report(error(identity));
    }

    fn on_closed(&self) {
        let reopen = {
            let mut core = self.lock_core();
            if core.state != SessionState::Closing {
                log::trace!("Close confirmation in state {}", core.state);
                return;
            }
            core.transition(SessionState::Closed);
            let reopen = mem::take(&mut core.switch_pending);
            core.switch_in_flight = reopen;
            reopen
        };
        if reopen {
            let epoch = self.epoch.load(Ordering::SeqCst);
            if !self.post(move |c| c.open_camera(epoch)) {
                log::warn!("Camera worker stopped before reopening");
            }
        }
    }

    fn on_image(&self, image: Box<dyn CapturedImage>) {
        let size = {
            let core = self.lock_core();
            if core.state != SessionState::Streaming {
                return;
            }
            match core.preview_size() {
                Some(size) => size,
                None => return,
            }
        };
        if image.format() != ImageFormat::Yuv420888 {
            log::trace!("Ignoring image in format {:?}", image.format());
            return;
        }
        let Some(listener) = self.listener.get() else {
            return;
        };

        let mut scratch = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        let FrameScratch { y, u, v, pool } = &mut *scratch;
        let [y_plane, u_plane, v_plane] = image.planes();
        refill(y, y_plane);
        refill(u, u_plane);
        refill(v, v_plane);
        let row_stride = image.row_stride();
        drop(image);

        let nv21 = if self.settings.convert_frames() {
            match PreviewGeometry::new(size.width, size.height, row_stride) {
                Some(geometry) => {
                    let out = pool.acquire(geometry);
                    match convert_to_nv21(y, u, v, geometry, out) {
                        Ok(_) => Some(&*out),
                        Err(e) => {
                            log::warn!("Frame not converted: {e}");
                            None
                        }
                    }
                }
                None => {
                    log::warn!("Frame row stride {} is narrower than {}", row_stride, size);
                    None
                }
            }
        } else {
            None
        };

        let frame = PreviewFrame {
            y,
            u,
            v,
            size,
            row_stride,
            nv21,
            visible: self.settings.crop().visible_size(size),
        };
        if !self.is_released() {
            listener.on_preview_frame(&frame);
        }
    }

    /// Events that arrive after release are swallowed; resources they carry
    /// are closed.
    fn discard(&self, event: DeviceEvent) {
        log::debug!("Camera released, discarding {:?}", event);
        match event {
            DeviceEvent::Opened(mut device) => {
                self.release_open_token();
                device.close();
            }
            DeviceEvent::SessionConfigured(mut session) => session.close(),
            _ => {}
        }
    }
}

impl EventSink for SessionController {
    fn handle_event(&self, event: DeviceEvent) {
        log::trace!("Camera event {:?}", event);
        if self.is_released() {
            self.discard(event);
            return;
        }
        match event {
            DeviceEvent::Opened(device) => self.on_opened(device),
            DeviceEvent::SessionConfigured(session) => self.on_session_configured(session),
            DeviceEvent::SessionConfigureFailed => self.on_session_configure_failed(),
            DeviceEvent::Disconnected => self.on_device_lost(|identity| {
                CameraError::Disconnected(identity.unwrap_or_else(CameraIdentity::back))
            }),
            DeviceEvent::Error(code) => self.on_device_lost(|_| CameraError::fatal(code)),
            DeviceEvent::Closed => self.on_closed(),
            DeviceEvent::ImageAvailable(image) => self.on_image(image),
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

/// Copy `src` into `dst`, keeping the allocation when the length is unchanged.
fn refill(dst: &mut Vec<u8>, src: &[u8]) {
    if dst.len() != src.len() {
        log::trace!("Plane buffer resized {} -> {}", dst.len(), src.len());
    }
    dst.clear();
    dst.extend_from_slice(src);
}
