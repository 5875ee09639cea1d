//! In-process camera platform.
//!
//! Implements the platform traits without hardware: devices open instantly,
//! sessions stream synthetic frames from their own thread, and failures can
//! be injected. Used by the CLI and the integration tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::error::PlatformError;
use super::frame_utils::ChromaLayout;
use super::orientation::PreviewTransform;
use super::platform::{
    CameraCharacteristics, CameraDevice, CameraPlatform, CaptureRequest, CaptureSession,
    CapturedImage, DeviceCallbacks, DeviceEvent, ImageFormat, PreviewSurface, MAX_READER_IMAGES,
};
use super::types::{CameraIdentity, Resolution, SensorOrientation};

/// Default time between synthetic frames (about 30 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// One simulated camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedCamera {
    pub identity: CameraIdentity,
    pub sensor_orientation: SensorOrientation,
    /// `None` simulates a device without a stream configuration
    pub output_sizes: Option<Vec<Resolution>>,
    /// Plane layout of produced frames
    pub chroma: ChromaLayout,
    /// Extra bytes at the end of every row
    pub row_padding: u32,
}

impl SimulatedCamera {
    /// Back camera: sensor mounted at 90°, 4:2:0 planes.
    pub fn back() -> Self {
        Self {
            identity: CameraIdentity::back(),
            sensor_orientation: SensorOrientation::from_degrees(90),
            output_sizes: Some(default_sizes()),
            chroma: ChromaLayout::Yuv420,
            row_padding: 0,
        }
    }

    /// Front camera: sensor mounted at 270°, chroma planes at half the luma
    /// length.
    pub fn front() -> Self {
        Self {
            identity: CameraIdentity::front(),
            sensor_orientation: SensorOrientation::from_degrees(270),
            output_sizes: Some(default_sizes()),
            chroma: ChromaLayout::Yuv422,
            row_padding: 0,
        }
    }

    pub fn with_sizes(mut self, sizes: Option<Vec<Resolution>>) -> Self {
        self.output_sizes = sizes;
        self
    }

    pub fn with_row_padding(mut self, padding: u32) -> Self {
        self.row_padding = padding;
        self
    }

    fn characteristics(&self) -> CameraCharacteristics {
        CameraCharacteristics {
            sensor_orientation: self.sensor_orientation,
            output_sizes: self.output_sizes.clone(),
        }
    }
}

fn default_sizes() -> Vec<Resolution> {
    vec![
        Resolution::FULL_HD,
        Resolution::HIGH,
        Resolution::MEDIUM,
        Resolution::LOW,
    ]
}

/// Failures to inject into the next operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedBehavior {
    /// `open_device` fails with an access error
    pub deny_open: bool,
    /// `open_device` succeeds but the outcome is never reported
    pub silent_open: bool,
    /// Session configuration is reported as failed
    pub fail_configure: bool,
    /// The repeating request is rejected
    pub fail_repeating: bool,
}

/// Counters kept by the simulated platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedStats {
    pub opens: usize,
    pub closes: usize,
    /// Devices currently open
    pub open_now: usize,
    pub max_concurrent_open: usize,
    /// Cameras in the order they were opened
    pub opened_ids: Vec<CameraIdentity>,
    pub frames_delivered: u64,
}

#[derive(Default)]
struct Shared {
    behavior: Mutex<SimulatedBehavior>,
    stats: Mutex<SimulatedStats>,
    last_callbacks: Mutex<Option<DeviceCallbacks>>,
}

impl Shared {
    fn behavior(&self) -> SimulatedBehavior {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> MutexGuard<'_, SimulatedStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Camera platform backed by synthetic devices.
pub struct SimulatedPlatform {
    cameras: Vec<SimulatedCamera>,
    frame_interval: Duration,
    shared: Arc<Shared>,
}

impl Default for SimulatedPlatform {
    /// Back and front camera.
    fn default() -> Self {
        Self::new(vec![SimulatedCamera::back(), SimulatedCamera::front()])
    }
}

impl std::fmt::Debug for SimulatedPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPlatform")
            .field("cameras", &self.cameras)
            .field("frame_interval", &self.frame_interval)
            .finish_non_exhaustive()
    }
}

impl SimulatedPlatform {
    pub fn new(cameras: Vec<SimulatedCamera>) -> Self {
        Self {
            cameras,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn cameras(&self) -> &[SimulatedCamera] {
        &self.cameras
    }

    pub fn set_behavior(&self, behavior: SimulatedBehavior) {
        *self
            .shared
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    pub fn behavior(&self) -> SimulatedBehavior {
        self.shared.behavior()
    }

    pub fn stats(&self) -> SimulatedStats {
        self.shared.stats().clone()
    }

    /// Callbacks passed to the most recent `open_device`.
    pub fn last_callbacks(&self) -> Option<DeviceCallbacks> {
        self.shared
            .last_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Report a device error on the most recent device. Returns whether the
    /// event was queued.
    pub fn inject_device_error(&self, code: i32) -> bool {
        self.last_callbacks()
            .is_some_and(|cb| cb.deliver(DeviceEvent::Error(code)))
    }

    /// Report that the most recent device was disconnected.
    pub fn inject_disconnect(&self) -> bool {
        self.last_callbacks()
            .is_some_and(|cb| cb.deliver(DeviceEvent::Disconnected))
    }

    fn camera(&self, id: &CameraIdentity) -> Result<&SimulatedCamera, PlatformError> {
        self.cameras
            .iter()
            .find(|c| &c.identity == id)
            .ok_or_else(|| PlatformError::NotFound(id.clone()))
    }
}

impl CameraPlatform for SimulatedPlatform {
    fn camera_ids(&self) -> Result<Vec<CameraIdentity>, PlatformError> {
        Ok(self.cameras.iter().map(|c| c.identity.clone()).collect())
    }

    fn characteristics(&self, id: &CameraIdentity) -> Result<CameraCharacteristics, PlatformError> {
        Ok(self.camera(id)?.characteristics())
    }

    fn open_device(&self, id: &CameraIdentity, callbacks: DeviceCallbacks) -> Result<(), PlatformError> {
        let camera = self.camera(id)?.clone();
        *self
            .shared
            .last_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(callbacks.clone());

        let behavior = self.shared.behavior();
        if behavior.deny_open {
            return Err(PlatformError::AccessDenied(format!(
                "camera {id} requires permission"
            )));
        }
        if behavior.silent_open {
            log::debug!("Simulated camera {} opening silently", id);
            return Ok(());
        }

        {
            let mut stats = self.shared.stats();
            stats.opens += 1;
            stats.open_now += 1;
            stats.max_concurrent_open = stats.max_concurrent_open.max(stats.open_now);
            stats.opened_ids.push(id.clone());
        }
        let device = SimulatedDevice {
            camera,
            frame_interval: self.frame_interval,
            shared: Arc::clone(&self.shared),
            callbacks: callbacks.clone(),
            closed: false,
        };
        callbacks.deliver(DeviceEvent::Opened(Box::new(device)));
        Ok(())
    }
}

struct SimulatedDevice {
    camera: SimulatedCamera,
    frame_interval: Duration,
    shared: Arc<Shared>,
    callbacks: DeviceCallbacks,
    closed: bool,
}

impl SimulatedDevice {
    /// Update the counters once. Returns whether this call closed the device.
    fn mark_closed(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        let mut stats = self.shared.stats();
        stats.closes += 1;
        stats.open_now = stats.open_now.saturating_sub(1);
        true
    }
}

impl CameraDevice for SimulatedDevice {
    fn identity(&self) -> &CameraIdentity {
        &self.camera.identity
    }

    fn create_capture_session(
        &mut self,
        request: &CaptureRequest,
        callbacks: DeviceCallbacks,
    ) -> Result<(), PlatformError> {
        let size = request
            .reader_size()
            .ok_or_else(|| PlatformError::Failed("capture request has no frame reader".to_string()))?;
        if self.shared.behavior().fail_configure {
            callbacks.deliver(DeviceEvent::SessionConfigureFailed);
            return Ok(());
        }
        let session = SimulatedSession {
            camera: self.camera.clone(),
            size,
            frame_interval: self.frame_interval,
            shared: Arc::clone(&self.shared),
            callbacks: callbacks.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(AtomicU32::new(0)),
            thread: None,
        };
        callbacks.deliver(DeviceEvent::SessionConfigured(Box::new(session)));
        Ok(())
    }

    fn close(&mut self) {
        if self.mark_closed() {
            log::debug!("Simulated camera {} closed", self.camera.identity);
            self.callbacks.deliver(DeviceEvent::Closed);
        }
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.mark_closed();
    }
}

struct SimulatedSession {
    camera: SimulatedCamera,
    size: Resolution,
    frame_interval: Duration,
    shared: Arc<Shared>,
    callbacks: DeviceCallbacks,
    stop: Arc<AtomicBool>,
    /// Images handed out and not yet dropped
    pending: Arc<AtomicU32>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureSession for SimulatedSession {
    fn set_repeating_request(&mut self, _request: &CaptureRequest) -> Result<(), PlatformError> {
        if self.shared.behavior().fail_repeating {
            return Err(PlatformError::Failed("repeating request rejected".to_string()));
        }
        if self.thread.is_some() {
            return Ok(());
        }

        let producer = FrameProducer {
            camera: self.camera.clone(),
            size: self.size,
            interval: self.frame_interval,
            shared: Arc::clone(&self.shared),
            callbacks: self.callbacks.clone(),
            stop: Arc::clone(&self.stop),
            pending: Arc::clone(&self.pending),
        };
        let thread = thread::Builder::new()
            .name("simulated-frames".to_string())
            .spawn(move || producer.run())
            .map_err(|e| PlatformError::Failed(format!("failed to start frame thread: {e}")))?;
        self.thread = Some(thread);
        Ok(())
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Simulated frame thread panicked");
            }
        }
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        self.close();
    }
}

struct FrameProducer {
    camera: SimulatedCamera,
    size: Resolution,
    interval: Duration,
    shared: Arc<Shared>,
    callbacks: DeviceCallbacks,
    stop: Arc<AtomicBool>,
    pending: Arc<AtomicU32>,
}

impl FrameProducer {
    fn run(self) {
        let mut frame_no: u64 = 0;
        while !self.stop.load(Ordering::SeqCst) {
            thread::sleep(self.interval);
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            // Reader full: the platform drops the frame.
            if self.pending.load(Ordering::SeqCst) >= MAX_READER_IMAGES {
                continue;
            }
            let image = synthesize(&self.camera, self.size, frame_no, Arc::clone(&self.pending));
            if !self.callbacks.deliver(DeviceEvent::ImageAvailable(Box::new(image))) {
                break;
            }
            self.shared.stats().frames_delivered += 1;
            frame_no += 1;
        }
    }
}

/// Synthetic frame with a moving luma gradient and flat chroma. Counts as
/// pending until dropped.
fn synthesize(
    camera: &SimulatedCamera,
    size: Resolution,
    frame_no: u64,
    pending: Arc<AtomicU32>,
) -> SimulatedImage {
    let row_stride = size.width.saturating_add(camera.row_padding);
    let y_len = row_stride as usize * size.height as usize;
    let chroma_len = match camera.chroma {
        ChromaLayout::Yuv420 => y_len / 4,
        ChromaLayout::Yuv422 => y_len / 2,
    };

    pending.fetch_add(1, Ordering::SeqCst);
    let mut y = vec![0u8; y_len];
    for (row, line) in y.chunks_mut(row_stride as usize).enumerate() {
        for (col, px) in line.iter_mut().enumerate() {
            *px = if col < size.width as usize {
                (col as u64 + row as u64 + frame_no) as u8
            } else {
                0
            };
        }
    }
    SimulatedImage {
        y,
        u: vec![0x60; chroma_len],
        v: vec![0xa0; chroma_len],
        row_stride,
        pending,
    }
}

struct SimulatedImage {
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
    row_stride: u32,
    pending: Arc<AtomicU32>,
}

impl CapturedImage for SimulatedImage {
    fn format(&self) -> ImageFormat {
        ImageFormat::Yuv420888
    }

    fn planes(&self) -> [&[u8]; 3] {
        [&self.y, &self.u, &self.v]
    }

    fn row_stride(&self) -> u32 {
        self.row_stride
    }
}

impl Drop for SimulatedImage {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Preview surface that records what the camera sets on it.
#[derive(Debug)]
pub struct SimulatedSurface {
    available: AtomicBool,
    view: Mutex<Resolution>,
    buffer_size: Mutex<Option<Resolution>>,
    transform: Mutex<Option<PreviewTransform>>,
}

impl SimulatedSurface {
    /// An available surface hosted in a view of `view` pixels.
    pub fn new(view: Resolution) -> Self {
        Self {
            available: AtomicBool::new(true),
            view: Mutex::new(view),
            buffer_size: Mutex::new(None),
            transform: Mutex::new(None),
        }
    }

    /// A surface that is not ready yet.
    pub fn pending(view: Resolution) -> Self {
        let surface = Self::new(view);
        surface.set_available(false);
        surface
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_view_size(&self, view: Resolution) {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = view;
    }

    /// Last buffer size set by the camera.
    pub fn buffer_size(&self) -> Option<Resolution> {
        *self.buffer_size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last transform set by the camera.
    pub fn transform(&self) -> Option<PreviewTransform> {
        *self.transform.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreviewSurface for SimulatedSurface {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn view_size(&self) -> Resolution {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_buffer_size(&self, size: Resolution) {
        *self.buffer_size.lock().unwrap_or_else(PoisonError::into_inner) = Some(size);
    }

    fn set_transform(&self, transform: &PreviewTransform) {
        *self.transform.lock().unwrap_or_else(PoisonError::into_inner) = Some(*transform);
    }
}
