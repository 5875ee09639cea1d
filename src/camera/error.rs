//! Error types for camera operations.
//!
//! Construction-time problems surface as [`SettingsError`] from the settings
//! builder. Everything that goes wrong at runtime is a [`CameraError`] and is
//! delivered to the host only through `CameraListener::on_camera_error`.

use std::time::Duration;

use super::types::{CameraIdentity, Resolution};

/// Runtime camera failures reported to the listener.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("timed out after {0:?} waiting to lock camera opening")]
    AdmissionTimeout(Duration),

    #[error("camera access denied: {0}")]
    DeviceAccessDenied(String),

    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("can not find suitable preview size, now using default {fallback}")]
    NoSuitableSize { fallback: Resolution },

    #[error("capture session configuration failed: {0}")]
    SessionConfigFailed(String),

    #[error("camera device error occurred, code is {code} ({reason})")]
    FatalDeviceError { code: i32, reason: &'static str },

    #[error("camera {0} disconnected")]
    Disconnected(CameraIdentity),

    #[error("camera worker thread failed: {0}")]
    Worker(String),
}

impl CameraError {
    /// Build a fatal device error, attaching a description for known codes.
    pub fn fatal(code: i32) -> Self {
        CameraError::FatalDeviceError {
            code,
            reason: device_error_reason(code),
        }
    }

    /// Warnings are reported but do not stop streaming.
    pub fn is_warning(&self) -> bool {
        matches!(self, CameraError::NoSuitableSize { .. })
    }
}

/// Device error codes reported by the platform's device state callback.
pub mod device_error {
    /// The device is already opened by a higher-priority client.
    pub const CAMERA_IN_USE: i32 = 1;
    /// Too many devices are open system-wide.
    pub const MAX_CAMERAS_IN_USE: i32 = 2;
    /// Device policy forbids opening the camera.
    pub const CAMERA_DISABLED: i32 = 3;
    /// The device hit a fatal error.
    pub const CAMERA_DEVICE: i32 = 4;
    /// The camera service hit a fatal error.
    pub const CAMERA_SERVICE: i32 = 5;
}

fn device_error_reason(code: i32) -> &'static str {
    match code {
        device_error::CAMERA_IN_USE => "camera in use",
        device_error::MAX_CAMERAS_IN_USE => "max cameras in use",
        device_error::CAMERA_DISABLED => "camera disabled by policy",
        device_error::CAMERA_DEVICE => "fatal device error",
        device_error::CAMERA_SERVICE => "fatal camera service error",
        _ => "unknown",
    }
}

/// Errors returned by platform trait implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("camera {0} not found")]
    NotFound(CameraIdentity),

    #[error("{0}")]
    Failed(String),
}

impl From<PlatformError> for CameraError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::AccessDenied(msg) => CameraError::DeviceAccessDenied(msg),
            PlatformError::NotFound(id) => {
                CameraError::DeviceUnavailable(format!("camera {id} not found"))
            }
            PlatformError::Failed(msg) => CameraError::DeviceUnavailable(msg),
        }
    }
}

/// Construction-time validation failures of `CameraSettingsBuilder::build`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("a preview surface target is required")]
    MissingTarget,

    #[error("a display rotation is required")]
    MissingRotation,

    #[error("display rotation must be 0, 90, 180 or 270 degrees, got {0}")]
    InvalidRotation(u32),

    #[error("max preview size {max} must be at least min preview size {min}")]
    InvalidBounds { max: Resolution, min: Resolution },
}

/// Errors raised by the planar to semi-planar converter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid frame geometry {width}x{height} with row stride {row_stride}")]
    InvalidGeometry {
        width: u32,
        height: u32,
        row_stride: u32,
    },

    #[error("unsupported luma/chroma plane ratio ({y_len} / {u_len} bytes)")]
    UnsupportedLayout { y_len: usize, u_len: usize },

    #[error("output buffer holds {actual} bytes, expected {expected}")]
    OutputSize { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_display() {
        let e = CameraError::fatal(device_error::CAMERA_IN_USE);
        assert_eq!(
            e.to_string(),
            "camera device error occurred, code is 1 (camera in use)"
        );
        assert!(CameraError::fatal(42).to_string().contains("unknown"));
    }

    #[test]
    fn test_no_suitable_size_is_warning() {
        let warning = CameraError::NoSuitableSize {
            fallback: Resolution::FULL_HD,
        };
        assert!(warning.is_warning());
        assert!(warning.to_string().contains("1920x1080"));
        assert!(!CameraError::fatal(4).is_warning());
    }

    #[test]
    fn test_platform_error_mapping() {
        assert_eq!(
            CameraError::from(PlatformError::AccessDenied("policy".into())),
            CameraError::DeviceAccessDenied("policy".into())
        );
        assert!(matches!(
            CameraError::from(PlatformError::NotFound(CameraIdentity::front())),
            CameraError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn test_settings_error_display() {
        let e = SettingsError::InvalidBounds {
            max: Resolution::HIGH,
            min: Resolution::FULL_HD,
        };
        assert_eq!(
            e.to_string(),
            "max preview size 1280x720 must be at least min preview size 1920x1080"
        );
    }
}
