//! Camera lifecycle and frame delivery.
//!
//! This module provides a high-level API for previewing a platform camera:
//! - Device enumeration via [`list_devices`]
//! - Lifecycle control via [`CameraHelper`]
//! - Configuration via [`CameraSettings`]
//! - Events via [`CameraListener`]
//!
//! The hardware camera service is reached through the traits in
//! [`platform`]; [`simulated`] implements them in-process.

mod admission;
mod buffer_pool;
mod capture;
mod controller;
mod device;
mod error;
mod frame_utils;
mod listener;
mod orientation;
pub mod platform;
mod sampling;
mod settings;
pub mod simulated;
mod size_select;
mod types;
mod worker;

pub use admission::{AdmissionGuard, AdmissionLock};
pub use buffer_pool::FrameBufferPool;
pub use capture::{CameraHelper, WORKER_NAME};
pub use controller::SessionController;
pub use device::{list_devices, CameraInfo};
pub use error::{device_error, CameraError, ConvertError, PlatformError, SettingsError};
pub use frame_utils::{
    convert_to_nv21, nv21_len, yuv420_to_nv21, yuv422_to_nv21, ChromaLayout, CropPolicy,
};
pub use listener::{CameraListener, ListenerSlot, OpenedInfo, PreviewFrame};
pub use orientation::{
    delivered_orientation, frame_transform, preview_transform, FrameTransform, PreviewTransform,
};
pub use platform::{
    CameraCharacteristics, CameraDevice, CameraPlatform, CaptureRequest, CaptureSession,
    CapturedImage, DeviceCallbacks, DeviceEvent, ImageFormat, PreviewSurface,
};
pub use sampling::{FrameSampler, DEFAULT_SAMPLE_INTERVAL};
pub use settings::{CameraSettings, CameraSettingsBuilder, DEFAULT_OPEN_TIMEOUT};
pub use size_select::{select_preview_size, SizeConstraints, SizeSelection};
pub use types::{
    CameraIdentity, DisplayRotation, ParseResolutionError, PreviewGeometry, Resolution,
    SensorOrientation, SessionState,
};
pub use worker::{BackgroundWorker, WorkerHandle};
