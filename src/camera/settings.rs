//! Immutable camera settings and their validating builder.

use std::sync::Arc;
use std::time::Duration;

use super::error::SettingsError;
use super::frame_utils::CropPolicy;
use super::platform::PreviewSurface;
use super::size_select::SizeConstraints;
use super::types::{CameraIdentity, DisplayRotation, Resolution};

/// How long an open or close waits for the admission lock.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_millis(2500);

/// Settings for a camera helper. Built with [`CameraSettings::builder`].
#[derive(Clone)]
pub struct CameraSettings {
    surface: Arc<dyn PreviewSurface>,
    camera: Option<CameraIdentity>,
    constraints: SizeConstraints,
    display_rotation: DisplayRotation,
    mirror: bool,
    open_timeout: Duration,
    convert_frames: bool,
    crop: CropPolicy,
}

impl CameraSettings {
    pub fn builder() -> CameraSettingsBuilder {
        CameraSettingsBuilder::default()
    }

    pub fn surface(&self) -> &Arc<dyn PreviewSurface> {
        &self.surface
    }

    /// Camera to try first. Other cameras are tried in enumeration order.
    pub fn camera(&self) -> Option<&CameraIdentity> {
        self.camera.as_ref()
    }

    pub fn size_constraints(&self) -> &SizeConstraints {
        &self.constraints
    }

    pub fn display_rotation(&self) -> DisplayRotation {
        self.display_rotation
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    /// Whether frames are reassembled into NV21 before delivery.
    pub fn convert_frames(&self) -> bool {
        self.convert_frames
    }

    pub fn crop(&self) -> CropPolicy {
        self.crop
    }
}

impl std::fmt::Debug for CameraSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSettings")
            .field("camera", &self.camera)
            .field("constraints", &self.constraints)
            .field("display_rotation", &self.display_rotation)
            .field("mirror", &self.mirror)
            .field("open_timeout", &self.open_timeout)
            .field("convert_frames", &self.convert_frames)
            .field("crop", &self.crop)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CameraSettings`].
#[derive(Default)]
pub struct CameraSettingsBuilder {
    surface: Option<Arc<dyn PreviewSurface>>,
    camera: Option<CameraIdentity>,
    constraints: SizeConstraints,
    display_rotation: Option<u32>,
    mirror: bool,
    open_timeout: Option<Duration>,
    convert_frames: Option<bool>,
    crop: CropPolicy,
}

impl CameraSettingsBuilder {
    /// Surface the preview renders into. Required.
    pub fn preview_on(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn camera(mut self, id: CameraIdentity) -> Self {
        self.camera = Some(id);
        self
    }

    pub fn max_preview_size(mut self, size: Resolution) -> Self {
        self.constraints.max = Some(size);
        self
    }

    pub fn min_preview_size(mut self, size: Resolution) -> Self {
        self.constraints.min = Some(size);
        self
    }

    /// Preview size to use if the device offers it.
    pub fn preview_size(mut self, size: Resolution) -> Self {
        self.constraints.exact = Some(size);
        self
    }

    /// Size of the host view, used to match the preview aspect ratio.
    pub fn viewport_size(mut self, size: Resolution) -> Self {
        self.constraints.viewport = Some(size);
        self
    }

    /// Display rotation in degrees (0, 90, 180 or 270). Required.
    pub fn display_rotation_degrees(mut self, degrees: u32) -> Self {
        self.display_rotation = Some(degrees);
        self
    }

    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = Some(timeout);
        self
    }

    pub fn convert_frames(mut self, convert: bool) -> Self {
        self.convert_frames = Some(convert);
        self
    }

    pub fn crop(mut self, crop: CropPolicy) -> Self {
        self.crop = crop;
        self
    }

    pub fn build(self) -> Result<CameraSettings, SettingsError> {
        let surface = self.surface.ok_or(SettingsError::MissingTarget)?;
        let degrees = self.display_rotation.ok_or(SettingsError::MissingRotation)?;
        let display_rotation =
            DisplayRotation::from_degrees(degrees).ok_or(SettingsError::InvalidRotation(degrees))?;

        if let (Some(max), Some(min)) = (self.constraints.max, self.constraints.min) {
            if max.falls_below(min) {
                return Err(SettingsError::InvalidBounds { max, min });
            }
        }
        if self.constraints.viewport.is_none() {
            log::warn!("Viewport size not set, preview aspect ratio follows the largest size");
        }

        Ok(CameraSettings {
            surface,
            camera: self.camera,
            constraints: self.constraints,
            display_rotation,
            mirror: self.mirror,
            open_timeout: self.open_timeout.unwrap_or(DEFAULT_OPEN_TIMEOUT),
            convert_frames: self.convert_frames.unwrap_or(true),
            crop: self.crop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::simulated::SimulatedSurface;

    fn surface() -> Arc<dyn PreviewSurface> {
        Arc::new(SimulatedSurface::new(Resolution::new(1080, 1920)))
    }

    #[test]
    fn test_build_defaults() {
        let settings = CameraSettings::builder()
            .preview_on(surface())
            .display_rotation_degrees(90)
            .build()
            .unwrap();
        assert_eq!(settings.display_rotation(), DisplayRotation::Rotation90);
        assert_eq!(settings.open_timeout(), DEFAULT_OPEN_TIMEOUT);
        assert!(settings.convert_frames());
        assert!(!settings.mirror());
        assert!(settings.camera().is_none());
        assert_eq!(settings.crop(), CropPolicy::None);
    }

    #[test]
    fn test_missing_target() {
        let err = CameraSettings::builder()
            .display_rotation_degrees(0)
            .build()
            .unwrap_err();
        assert_eq!(err, SettingsError::MissingTarget);
    }

    #[test]
    fn test_rotation_required_and_validated() {
        let err = CameraSettings::builder().preview_on(surface()).build().unwrap_err();
        assert_eq!(err, SettingsError::MissingRotation);

        let err = CameraSettings::builder()
            .preview_on(surface())
            .display_rotation_degrees(45)
            .build()
            .unwrap_err();
        assert_eq!(err, SettingsError::InvalidRotation(45));
    }

    #[test]
    fn test_invalid_bounds() {
        let err = CameraSettings::builder()
            .preview_on(surface())
            .display_rotation_degrees(0)
            .max_preview_size(Resolution::new(1920, 700))
            .min_preview_size(Resolution::HIGH)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SettingsError::InvalidBounds {
                max: Resolution::new(1920, 700),
                min: Resolution::HIGH,
            }
        );
    }

    #[test]
    fn test_equal_bounds_accepted() {
        let settings = CameraSettings::builder()
            .preview_on(surface())
            .display_rotation_degrees(270)
            .max_preview_size(Resolution::HIGH)
            .min_preview_size(Resolution::HIGH)
            .preview_size(Resolution::HIGH)
            .viewport_size(Resolution::new(720, 1280))
            .camera(CameraIdentity::front())
            .mirror(true)
            .build()
            .unwrap();
        assert_eq!(settings.size_constraints().exact, Some(Resolution::HIGH));
        assert_eq!(settings.camera(), Some(&CameraIdentity::front()));
        assert!(settings.mirror());
    }
}
