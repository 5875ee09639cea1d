//! Orientation math shared by the session controller and hosts.

use super::types::{CameraIdentity, DisplayRotation, Resolution, SensorOrientation};

/// Rotation (degrees clockwise) a host must apply to frames from `identity`
/// so they appear upright on a display rotated by `display`.
pub fn delivered_orientation(
    identity: &CameraIdentity,
    sensor: SensorOrientation,
    display: DisplayRotation,
) -> u32 {
    let sensor = sensor.degrees();
    let display = display.degrees();
    if identity.is_front() {
        (360 - (sensor + display) % 360) % 360
    } else {
        (sensor + 360 - display) % 360
    }
}

/// Display transform for the preview surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewTransform {
    /// Rotation around the view centre, in degrees (may be negative).
    pub rotation_degrees: i32,
    /// Uniform scale around the view centre.
    pub scale: f32,
    /// Whether the preview buffer's axes are swapped to fill the view.
    pub swap_axes: bool,
    /// Horizontal flip requested by the host.
    pub mirrored: bool,
}

impl PreviewTransform {
    pub const IDENTITY: PreviewTransform = PreviewTransform {
        rotation_degrees: 0,
        scale: 1.0,
        swap_axes: false,
        mirrored: false,
    };
}

/// Fit a `preview` buffer into a `view` on a display rotated by `rotation`.
///
/// Sideways displays swap the buffer axes, scale to cover the view and rotate
/// by `90 * (index - 2)`: -90 for 90° and +90 for 270°.
pub fn preview_transform(
    view: Resolution,
    preview: Resolution,
    rotation: DisplayRotation,
    mirrored: bool,
) -> PreviewTransform {
    let mut transform = PreviewTransform {
        mirrored,
        ..PreviewTransform::IDENTITY
    };
    if rotation.is_sideways() {
        if !preview.is_empty() {
            transform.scale = f32::max(
                view.height as f32 / preview.height as f32,
                view.width as f32 / preview.width as f32,
            );
        }
        transform.rotation_degrees = 90 * (rotation.index() as i32 - 2);
        transform.swap_axes = true;
    } else if rotation == DisplayRotation::Rotation180 {
        transform.rotation_degrees = 180;
    }
    transform
}

/// How a host should turn a decoded raw frame into what the preview shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTransform {
    pub rotation_degrees: i32,
    pub mirror_horizontal: bool,
}

/// Rotation and flip for raw frames from `identity`.
///
/// Back camera frames rotate by the delivered orientation, front camera
/// frames by its negation. Front frames are already mirrored by the sensor,
/// so a flip is needed when exactly one of "front camera" and "host mirror"
/// holds.
pub fn frame_transform(identity: &CameraIdentity, orientation: u32, mirror: bool) -> FrameTransform {
    let orientation = orientation as i32;
    FrameTransform {
        rotation_degrees: if identity.is_front() { -orientation } else { orientation },
        mirror_horizontal: identity.is_front() ^ mirror,
    }
}
