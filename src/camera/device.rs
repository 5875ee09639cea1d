//! Camera device enumeration.

use std::fmt;

use super::error::CameraError;
use super::platform::CameraPlatform;
use super::types::{CameraIdentity, Resolution, SensorOrientation};

/// Information about an available camera device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub identity: CameraIdentity,
    pub sensor_orientation: SensorOrientation,
    /// Advertised preview sizes, empty when the device has no stream
    /// configuration
    pub output_sizes: Vec<Resolution>,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let facing = if self.identity.is_front() {
            "front"
        } else if self.identity.is_back() {
            "back"
        } else {
            "external"
        };
        write!(
            f,
            "{} ({}, sensor {}°)",
            self.identity,
            facing,
            self.sensor_orientation.degrees()
        )
    }
}

/// List all camera devices the platform reports.
///
/// If no cameras are found, returns an empty vector (not an error).
pub fn list_devices(platform: &dyn CameraPlatform) -> Result<Vec<CameraInfo>, CameraError> {
    platform
        .camera_ids()?
        .into_iter()
        .map(|identity| -> Result<CameraInfo, CameraError> {
            let characteristics = platform.characteristics(&identity)?;
            Ok(CameraInfo {
                identity,
                sensor_orientation: characteristics.sensor_orientation,
                output_sizes: characteristics.output_sizes.unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::simulated::{SimulatedCamera, SimulatedPlatform};

    #[test]
    fn test_list_devices_reports_every_camera() {
        let platform = SimulatedPlatform::default();
        let devices = list_devices(&platform).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].identity, CameraIdentity::back());
        assert_eq!(devices[0].to_string(), "0 (back, sensor 90°)");
        assert_eq!(devices[1].to_string(), "1 (front, sensor 270°)");
        assert!(devices[1].output_sizes.contains(&Resolution::HIGH));
    }

    #[test]
    fn test_list_devices_without_stream_configuration() {
        let platform = SimulatedPlatform::new(vec![SimulatedCamera::back().with_sizes(None)]);
        let devices = list_devices(&platform).unwrap();
        assert!(devices[0].output_sizes.is_empty());
    }

    #[test]
    fn test_list_devices_empty_is_ok() {
        let platform = SimulatedPlatform::new(Vec::new());
        assert!(list_devices(&platform).unwrap().is_empty());
    }
}
