//! Host-facing event interface.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::error::CameraError;
use super::frame_utils::ChromaLayout;
use super::types::{CameraIdentity, Resolution};

/// Details delivered when a camera finishes opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedInfo {
    pub identity: CameraIdentity,
    pub preview_size: Resolution,
    /// Clockwise rotation to apply to frames so they appear upright.
    pub orientation: u32,
    pub mirrored: bool,
}

/// One captured frame, borrowed for the duration of the callback.
///
/// The plane slices and the NV21 buffer are reused for the next frame; copy
/// anything that must outlive the callback.
#[derive(Debug, Clone, Copy)]
pub struct PreviewFrame<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub size: Resolution,
    pub row_stride: u32,
    /// Planes reassembled into NV21, `row_stride * height * 3 / 2` bytes.
    /// `None` when conversion is disabled or the plane layout is unsupported.
    pub nv21: Option<&'a [u8]>,
    /// Part of `size` the crop policy keeps.
    pub visible: Resolution,
}

impl PreviewFrame<'_> {
    pub fn chroma_layout(&self) -> Option<ChromaLayout> {
        ChromaLayout::detect(self.y.len(), self.u.len())
    }
}

/// Lifecycle and data callbacks. All of them run on the camera worker thread.
///
/// Every method defaults to doing nothing.
pub trait CameraListener: Send + Sync {
    fn on_camera_opened(&self, _info: &OpenedInfo) {}

    fn on_preview_frame(&self, _frame: &PreviewFrame<'_>) {}

    fn on_camera_closed(&self) {}

    fn on_camera_error(&self, _error: &CameraError) {}
}

/// Non-owning reference to the host listener.
///
/// The host keeps its listener alive; once it is dropped, or the slot is
/// cleared, events go nowhere.
#[derive(Clone, Default)]
pub struct ListenerSlot {
    inner: Arc<Mutex<Option<Weak<dyn CameraListener>>>>,
}

impl ListenerSlot {
    pub fn new<L: CameraListener + 'static>(listener: &Arc<L>) -> Self {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn CameraListener> = weak;
        Self {
            inner: Arc::new(Mutex::new(Some(weak))),
        }
    }

    /// The listener, if still attached and alive.
    pub fn get(&self) -> Option<Arc<dyn CameraListener>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn clear(&self) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_attached(&self) -> bool {
        self.get().is_some()
    }
}
