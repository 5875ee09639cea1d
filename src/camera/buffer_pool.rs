//! Single-slot pool for the converted NV21 output buffer.

use super::types::PreviewGeometry;

/// Owns the one reusable output buffer.
///
/// Only the most recent frame is ever needed, so there is no history: the
/// buffer is reused while the geometry stays the same and replaced when it
/// changes.
#[derive(Debug, Default)]
pub struct FrameBufferPool {
    geometry: Option<PreviewGeometry>,
    buffer: Vec<u8>,
    generation: u64,
}

impl FrameBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the output buffer for `geometry`, allocating it on first use or
    /// when the geometry differs from the previous frame's.
    ///
    /// The returned slice is exactly `geometry.nv21_len()` bytes and stays
    /// valid until the next call.
    pub fn acquire(&mut self, geometry: PreviewGeometry) -> &mut [u8] {
        if self.geometry != Some(geometry) {
            log::debug!(
                "Allocating {} byte frame buffer for {}x{} (stride {})",
                geometry.nv21_len(),
                geometry.width(),
                geometry.height(),
                geometry.row_stride()
            );
            self.buffer = vec![0; geometry.nv21_len()];
            self.geometry = Some(geometry);
            self.generation += 1;
        }
        &mut self.buffer
    }

    /// Geometry of the live buffer, if one has been allocated.
    pub fn geometry(&self) -> Option<PreviewGeometry> {
        self.geometry
    }

    /// Number of allocations so far; changes whenever the buffer is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
