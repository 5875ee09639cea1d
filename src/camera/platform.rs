//! Platform camera service boundary.
//!
//! The hardware camera stack is an external collaborator. It is reached
//! through the traits in this module; everything it reports asynchronously
//! comes back as a [`DeviceEvent`] posted through [`DeviceCallbacks`], which
//! puts the event on the camera worker's queue.

use std::sync::Weak;

use super::error::PlatformError;
use super::orientation::PreviewTransform;
use super::types::{CameraIdentity, Resolution, SensorOrientation};
use super::worker::WorkerHandle;

/// Images the frame reader may hold at once; further frames are dropped by
/// the platform until one is returned.
pub const MAX_READER_IMAGES: u32 = 2;

/// Static properties of one camera device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraCharacteristics {
    pub sensor_orientation: SensorOrientation,
    /// Sizes the device can stream to a preview surface. `None` when the
    /// device has no stream configuration at all.
    pub output_sizes: Option<Vec<Resolution>>,
}

/// Pixel format of an image produced by the frame reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Flexible planar YUV 4:2:0 with three planes.
    Yuv420888,
    Jpeg,
    Other(u32),
}

/// Capture request template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    /// Favors frame rate over image quality.
    Preview,
}

/// Autofocus mode set on the capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofocusMode {
    Off,
    ContinuousPicture,
}

/// Surfaces a capture session streams into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// The host's preview surface.
    Preview { size: Resolution },
    /// The reader that hands raw frames to the controller.
    FrameReader {
        size: Resolution,
        format: ImageFormat,
        max_images: u32,
    },
}

/// Repeating request issued once the session is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub autofocus: AutofocusMode,
    pub targets: Vec<OutputTarget>,
}

impl CaptureRequest {
    /// Continuous-autofocus preview into the preview surface and the frame
    /// reader, both at `size`.
    pub fn preview(size: Resolution) -> Self {
        Self {
            template: RequestTemplate::Preview,
            autofocus: AutofocusMode::ContinuousPicture,
            targets: vec![
                OutputTarget::Preview { size },
                OutputTarget::FrameReader {
                    size,
                    format: ImageFormat::Yuv420888,
                    max_images: MAX_READER_IMAGES,
                },
            ],
        }
    }

    /// Outputs the capture session must be created with.
    pub fn outputs(&self) -> &[OutputTarget] {
        &self.targets
    }

    /// Size of the frame reader target, if the request has one.
    pub fn reader_size(&self) -> Option<Resolution> {
        self.targets.iter().find_map(|t| match t {
            OutputTarget::FrameReader { size, .. } => Some(*size),
            OutputTarget::Preview { .. } => None,
        })
    }
}

/// Camera service: enumeration and device opening.
pub trait CameraPlatform: Send + Sync {
    fn camera_ids(&self) -> Result<Vec<CameraIdentity>, PlatformError>;

    fn characteristics(&self, id: &CameraIdentity) -> Result<CameraCharacteristics, PlatformError>;

    /// Start opening `id`. The outcome arrives later as
    /// [`DeviceEvent::Opened`], [`DeviceEvent::Error`] or
    /// [`DeviceEvent::Disconnected`].
    fn open_device(&self, id: &CameraIdentity, callbacks: DeviceCallbacks) -> Result<(), PlatformError>;
}

/// An open camera device.
pub trait CameraDevice: Send {
    fn identity(&self) -> &CameraIdentity;

    /// Start configuring a session for `request`'s outputs. The outcome
    /// arrives as [`DeviceEvent::SessionConfigured`] or
    /// [`DeviceEvent::SessionConfigureFailed`].
    fn create_capture_session(
        &mut self,
        request: &CaptureRequest,
        callbacks: DeviceCallbacks,
    ) -> Result<(), PlatformError>;

    /// Close the device. The platform confirms with [`DeviceEvent::Closed`].
    fn close(&mut self);
}

/// A configured capture session.
pub trait CaptureSession: Send {
    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), PlatformError>;

    fn close(&mut self);
}

/// One frame from the frame reader. The platform owns the plane memory;
/// dropping the image hands it back.
pub trait CapturedImage: Send {
    fn format(&self) -> ImageFormat;

    /// Y, U and V planes, in that order.
    fn planes(&self) -> [&[u8]; 3];

    /// Row stride of the luma plane.
    fn row_stride(&self) -> u32;
}

/// The host surface the preview is rendered into.
pub trait PreviewSurface: Send + Sync {
    /// Whether the surface can accept a stream yet.
    fn is_available(&self) -> bool;

    /// Current size of the view hosting the surface.
    fn view_size(&self) -> Resolution;

    /// Size of the buffers the camera will render into the surface.
    fn set_buffer_size(&self, size: Resolution);

    fn set_transform(&self, transform: &PreviewTransform);
}

/// Asynchronous notifications from the platform.
pub enum DeviceEvent {
    Opened(Box<dyn CameraDevice>),
    Disconnected,
    Error(i32),
    Closed,
    SessionConfigured(Box<dyn CaptureSession>),
    SessionConfigureFailed,
    ImageAvailable(Box<dyn CapturedImage>),
}

impl DeviceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceEvent::Opened(_) => "opened",
            DeviceEvent::Disconnected => "disconnected",
            DeviceEvent::Error(_) => "error",
            DeviceEvent::Closed => "closed",
            DeviceEvent::SessionConfigured(_) => "session-configured",
            DeviceEvent::SessionConfigureFailed => "session-configure-failed",
            DeviceEvent::ImageAvailable(_) => "image-available",
        }
    }
}

impl std::fmt::Debug for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::Error(code) => write!(f, "DeviceEvent::Error({code})"),
            other => write!(f, "DeviceEvent::{}", other.name()),
        }
    }
}

/// Receiver of device events on the worker thread.
pub(crate) trait EventSink: Send + Sync {
    fn handle_event(&self, event: DeviceEvent);
}

/// Route by which the platform reports events back to the controller.
///
/// Cheap to clone. Delivery only queues the event; the controller handles it
/// on the camera worker, in posting order.
#[derive(Clone)]
pub struct DeviceCallbacks {
    worker: WorkerHandle,
    sink: Weak<dyn EventSink>,
}

impl DeviceCallbacks {
    pub(crate) fn new(worker: WorkerHandle, sink: Weak<dyn EventSink>) -> Self {
        Self { worker, sink }
    }

    /// Queue `event` for the controller.
    ///
    /// Returns `false` when the worker has stopped; the event is dropped.
    pub fn deliver(&self, event: DeviceEvent) -> bool {
        let sink = self.sink.clone();
        self.worker.post(move || {
            if let Some(sink) = sink.upgrade() {
                sink.handle_event(event);
            }
        })
    }
}

impl std::fmt::Debug for DeviceCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCallbacks")
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}
