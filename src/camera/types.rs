//! Camera types and data structures.

use std::fmt;
use std::str::FromStr;

/// Opaque camera device identifier as advertised by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraIdentity(String);

impl CameraIdentity {
    /// Platform id of the back-facing camera.
    pub const BACK_ID: &'static str = "0";
    /// Platform id of the front-facing camera.
    pub const FRONT_ID: &'static str = "1";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn back() -> Self {
        Self::new(Self::BACK_ID)
    }

    pub fn front() -> Self {
        Self::new(Self::FRONT_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_front(&self) -> bool {
        self.0 == Self::FRONT_ID
    }

    pub fn is_back(&self) -> bool {
        self.0 == Self::BACK_ID
    }

    /// The opposite well-known camera.
    ///
    /// Returns `None` for identities other than FRONT and BACK, which have no
    /// defined counterpart.
    pub fn flipped(&self) -> Option<Self> {
        if self.is_back() {
            Some(Self::front())
        } else if self.is_front() {
            Some(Self::back())
        } else {
            None
        }
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Camera resolution (width x height in pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// QVGA (320x240)
    pub const LOW: Resolution = Resolution::new(320, 240);

    /// VGA (640x480)
    pub const MEDIUM: Resolution = Resolution::new(640, 480);

    /// 720p (1280x720)
    pub const HIGH: Resolution = Resolution::new(1280, 720);

    /// 1080p (1920x1080)
    pub const FULL_HD: Resolution = Resolution::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Height divided by width, the ratio preview sizes are scored on.
    pub fn height_ratio(&self) -> f32 {
        self.height as f32 / self.width as f32
    }

    /// Whether either dimension exceeds `bound`.
    pub fn exceeds(&self, bound: Resolution) -> bool {
        self.width > bound.width || self.height > bound.height
    }

    /// Whether either dimension falls below `bound`.
    pub fn falls_below(&self, bound: Resolution) -> bool {
        self.width < bound.width || self.height < bound.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when parsing a `WIDTHxHEIGHT` string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resolution '{0}', expected WIDTHxHEIGHT (e.g. 1920x1080)")]
pub struct ParseResolutionError(String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseResolutionError(s.to_string());
        let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Resolution { width, height })
    }
}

/// Layout of one frame's luma plane: visible size plus the padded row length.
///
/// Invariant: `row_stride >= width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewGeometry {
    width: u32,
    height: u32,
    row_stride: u32,
}

impl PreviewGeometry {
    /// Returns `None` when the stride is narrower than the width or any
    /// dimension is zero.
    pub fn new(width: u32, height: u32, row_stride: u32) -> Option<Self> {
        if width == 0 || height == 0 || row_stride < width {
            return None;
        }
        Some(Self {
            width,
            height,
            row_stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_stride(&self) -> u32 {
        self.row_stride
    }

    pub fn size(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Bytes in the luma region of a semi-planar buffer.
    pub fn luma_len(&self) -> usize {
        self.row_stride as usize * self.height as usize
    }

    /// Total bytes of an NV21 buffer for this geometry.
    pub fn nv21_len(&self) -> usize {
        let luma = self.luma_len();
        luma + luma / 2
    }
}

/// Clockwise rotation of the image sensor relative to the device's natural
/// orientation. Read once from the device characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorOrientation(u32);

impl SensorOrientation {
    pub fn from_degrees(degrees: u32) -> Self {
        Self(degrees % 360)
    }

    pub fn degrees(&self) -> u32 {
        self.0
    }
}

/// Rotation of the host display, as reported by the windowing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Self::Rotation0),
            90 => Some(Self::Rotation90),
            180 => Some(Self::Rotation180),
            270 => Some(Self::Rotation270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u32 {
        self.index() * 90
    }

    /// Quarter turns (0..=3), the windowing system's rotation constant.
    pub fn index(&self) -> u32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 1,
            Self::Rotation180 => 2,
            Self::Rotation270 => 3,
        }
    }

    /// Whether the display is rotated a quarter turn from natural orientation.
    pub fn is_sideways(&self) -> bool {
        matches!(self, Self::Rotation90 | Self::Rotation270)
    }
}

/// Lifecycle state of the camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Opening,
    Open,
    ConfiguringSession,
    Streaming,
    Closing,
    Closed,
    Error,
}

impl SessionState {
    /// Whether a new open may be issued from this state.
    pub fn accepts_open(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::ConfiguringSession => "configuring-session",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_flip() {
        assert_eq!(CameraIdentity::back().flipped(), Some(CameraIdentity::front()));
        assert_eq!(CameraIdentity::front().flipped(), Some(CameraIdentity::back()));
        assert_eq!(CameraIdentity::new("usb-2").flipped(), None);
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!(
            "1920x1080".parse::<Resolution>().unwrap(),
            Resolution::FULL_HD
        );
        assert_eq!(" 640X480 ".parse::<Resolution>().unwrap(), Resolution::MEDIUM);
        assert!("1920".parse::<Resolution>().is_err());
        assert!("0x480".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::HIGH.to_string(), "1280x720");
    }

    #[test]
    fn test_geometry_rejects_narrow_stride() {
        assert!(PreviewGeometry::new(640, 480, 630).is_none());
        assert!(PreviewGeometry::new(0, 480, 640).is_none());
        let geometry = PreviewGeometry::new(640, 480, 704).unwrap();
        assert_eq!(geometry.luma_len(), 704 * 480);
        assert_eq!(geometry.nv21_len(), 704 * 480 * 3 / 2);
    }

    #[test]
    fn test_display_rotation_degrees() {
        for degrees in [0, 90, 180, 270] {
            let rotation = DisplayRotation::from_degrees(degrees).unwrap();
            assert_eq!(rotation.degrees(), degrees);
        }
        assert!(DisplayRotation::from_degrees(45).is_none());
        assert!(DisplayRotation::Rotation270.is_sideways());
        assert!(!DisplayRotation::Rotation180.is_sideways());
    }

    #[test]
    fn test_sensor_orientation_normalizes() {
        assert_eq!(SensorOrientation::from_degrees(450).degrees(), 90);
    }
}
