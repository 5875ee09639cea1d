//! Planar to semi-planar frame conversion.
//!
//! Cameras deliver YUV frames as three separate planes. Consumers such as
//! JPEG encoders want a single NV21 buffer: the luma plane followed by one
//! chroma region of interleaved V/U pairs.
//!
//! Both converters work on whole stride-sized rows. When the hardware pads
//! rows (`row_stride > width`) the padding columns are copied as-is; they
//! carry no real chroma, so rendering the full stride shows a green seam at
//! the right edge, and even rendering only `width` columns can leave a
//! one-pixel green edge because the last chroma column is often incomplete.
//! [`CropPolicy`] lets a consumer trim that edge explicitly.

use super::error::ConvertError;
use super::types::{PreviewGeometry, Resolution};

/// Chroma plane layout of an incoming frame, detected from plane sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaLayout {
    /// Chroma planes carry half as many bytes as luma (`y / u == 2`).
    ///
    /// This is what a 4:2:0 source with interleaved chroma storage (pixel
    /// stride 2) looks like: each plane holds every chroma sample of both
    /// channels, so only every other byte belongs to the plane's channel.
    Yuv422,
    /// Chroma planes carry a quarter of the luma bytes (`y / u == 4`),
    /// already subsampled both ways.
    Yuv420,
}

impl ChromaLayout {
    /// Detect the layout from the luma and chroma plane lengths.
    pub fn detect(y_len: usize, u_len: usize) -> Option<Self> {
        if u_len == 0 {
            return None;
        }
        match y_len / u_len {
            2 => Some(ChromaLayout::Yuv422),
            4 => Some(ChromaLayout::Yuv420),
            _ => None,
        }
    }
}

/// Region of the NV21 buffer a consumer should treat as the picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropPolicy {
    /// Use the full preview size and accept the padding artifact.
    #[default]
    None,
    /// Drop the last pixel column, hiding the green chroma edge.
    TrimTrailingColumn,
    /// Drop the last pixel row.
    TrimTrailingRow,
}

impl CropPolicy {
    /// Visible size of a frame with the given preview size.
    pub fn visible_size(&self, size: Resolution) -> Resolution {
        match self {
            CropPolicy::None => size,
            CropPolicy::TrimTrailingColumn => {
                Resolution::new(size.width.saturating_sub(1).max(1), size.height)
            }
            CropPolicy::TrimTrailingRow => {
                Resolution::new(size.width, size.height.saturating_sub(1).max(1))
            }
        }
    }
}

/// Length of the NV21 buffer for `row_stride` x `height`.
pub fn nv21_len(row_stride: u32, height: u32) -> usize {
    let luma = row_stride as usize * height as usize;
    luma + luma / 2
}

/// Reassemble a frame whose chroma planes hold half the luma bytes.
///
/// Chroma pairs are taken from every other byte of the U and V planes and
/// written V-then-U into the chroma region of `nv21`. Reads stop at the end
/// of the shorter plane; output bytes that have no source stay untouched.
pub fn yuv422_to_nv21(y: &[u8], u: &[u8], v: &[u8], nv21: &mut [u8], stride: u32, height: u32) {
    let luma_len = copy_luma(y, nv21, stride, height);
    let pairs = u.len().div_ceil(2).min(v.len().div_ceil(2));
    interleave_chroma(nv21, luma_len, pairs, |i| (v[i * 2], u[i * 2]));
}

/// Reassemble a frame whose chroma planes are already 2x2 subsampled.
///
/// U and V samples are interleaved one-for-one, V first, into the chroma
/// region of `nv21`.
pub fn yuv420_to_nv21(y: &[u8], u: &[u8], v: &[u8], nv21: &mut [u8], stride: u32, height: u32) {
    let luma_len = copy_luma(y, nv21, stride, height);
    let pairs = u.len().min(v.len());
    interleave_chroma(nv21, luma_len, pairs, |i| (v[i], u[i]));
}

/// Convert three planes into `nv21`, choosing the converter from the plane
/// size ratio.
///
/// `nv21` must be exactly [`PreviewGeometry::nv21_len`] bytes.
pub fn convert_to_nv21(
    y: &[u8],
    u: &[u8],
    v: &[u8],
    geometry: PreviewGeometry,
    nv21: &mut [u8],
) -> Result<ChromaLayout, ConvertError> {
    let expected = geometry.nv21_len();
    if nv21.len() != expected {
        return Err(ConvertError::OutputSize {
            expected,
            actual: nv21.len(),
        });
    }
    let layout = ChromaLayout::detect(y.len(), u.len()).ok_or(ConvertError::UnsupportedLayout {
        y_len: y.len(),
        u_len: u.len(),
    })?;

    let stride = geometry.row_stride();
    let height = geometry.height();
    match layout {
        ChromaLayout::Yuv422 => yuv422_to_nv21(y, u, v, nv21, stride, height),
        ChromaLayout::Yuv420 => yuv420_to_nv21(y, u, v, nv21, stride, height),
    }
    Ok(layout)
}

/// Copy luma verbatim into the first `stride * height` bytes. Returns the
/// offset where the chroma region starts.
fn copy_luma(y: &[u8], nv21: &mut [u8], stride: u32, height: u32) -> usize {
    let luma_len = (stride as usize * height as usize).min(nv21.len());
    let n = y.len().min(luma_len);
    nv21[..n].copy_from_slice(&y[..n]);
    luma_len
}

fn interleave_chroma(
    nv21: &mut [u8],
    offset: usize,
    pairs: usize,
    sample: impl Fn(usize) -> (u8, u8),
) {
    for (i, pair) in nv21[offset..].chunks_exact_mut(2).take(pairs).enumerate() {
        let (v, u) = sample(i);
        pair[0] = v;
        pair[1] = u;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planes_420(stride: usize, height: usize) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let y: Vec<u8> = (0..stride * height).map(|i| i as u8).collect();
        let chroma = stride / 2 * height / 2;
        let u = (0..chroma).map(|i| 100 + i as u8).collect();
        let v = (0..chroma).map(|i| 200u8.wrapping_add(i as u8)).collect();
        (y, u, v)
    }

    #[test]
    fn test_detect_layout() {
        assert_eq!(ChromaLayout::detect(64, 32), Some(ChromaLayout::Yuv422));
        assert_eq!(ChromaLayout::detect(64, 31), Some(ChromaLayout::Yuv422));
        assert_eq!(ChromaLayout::detect(64, 16), Some(ChromaLayout::Yuv420));
        assert_eq!(ChromaLayout::detect(64, 64), None);
        assert_eq!(ChromaLayout::detect(64, 0), None);
    }

    #[test]
    fn test_yuv420_interleaves_v_then_u() {
        let (y, u, v) = planes_420(4, 2);
        let geometry = PreviewGeometry::new(4, 2, 4).unwrap();
        let mut nv21 = vec![0u8; geometry.nv21_len()];

        let layout = convert_to_nv21(&y, &u, &v, geometry, &mut nv21).unwrap();

        assert_eq!(layout, ChromaLayout::Yuv420);
        assert_eq!(&nv21[..8], &y[..]);
        assert_eq!(&nv21[8..], &[200, 100, 201, 101]);
    }

    #[test]
    fn test_yuv422_takes_every_other_sample() {
        let y = vec![7u8; 16];
        // Interleaved chroma storage: the U plane is U0 V0 U1 V1 ...
        let u = vec![10u8, 20, 11, 21, 12, 22, 13, 23];
        let v = vec![20u8, 10, 21, 11, 22, 12, 23, 13];
        let geometry = PreviewGeometry::new(4, 4, 4).unwrap();
        let mut nv21 = vec![0u8; geometry.nv21_len()];

        let layout = convert_to_nv21(&y, &u, &v, geometry, &mut nv21).unwrap();

        assert_eq!(layout, ChromaLayout::Yuv422);
        assert_eq!(&nv21[..16], &y[..]);
        assert_eq!(&nv21[16..], &[20, 10, 21, 11, 22, 12, 23, 13]);
    }

    #[test]
    fn test_output_length_matches_geometry() {
        for (width, height, stride) in [(4, 2, 4), (6, 4, 8), (320, 240, 384), (3, 3, 3)] {
            let geometry = PreviewGeometry::new(width, height, stride).unwrap();
            assert_eq!(
                geometry.nv21_len(),
                stride as usize * height as usize * 3 / 2
            );
            assert_eq!(geometry.nv21_len(), nv21_len(stride, height));
        }
    }

    #[test]
    fn test_luma_agrees_between_layouts() {
        let stride = 8usize;
        let height = 4usize;
        let y: Vec<u8> = (0..stride * height).map(|i| (i * 3) as u8).collect();
        let u420 = vec![128u8; stride * height / 4];
        let u422 = vec![128u8; stride * height / 2];
        let geometry = PreviewGeometry::new(6, height as u32, stride as u32).unwrap();

        let mut a = vec![0u8; geometry.nv21_len()];
        let mut b = vec![0u8; geometry.nv21_len()];
        convert_to_nv21(&y, &u420, &u420, geometry, &mut a).unwrap();
        convert_to_nv21(&y, &u422, &u422, geometry, &mut b).unwrap();

        let luma = geometry.luma_len();
        assert_eq!(a[..luma], b[..luma]);
    }

    #[test]
    fn test_short_planes_do_not_overrun() {
        // Platforms often report the last row without its padding.
        let geometry = PreviewGeometry::new(6, 4, 8).unwrap();
        let y = vec![1u8; 8 * 3 + 6];
        let u = vec![2u8; 7];
        let v = vec![3u8; 7];
        let mut nv21 = vec![0xAAu8; geometry.nv21_len()];

        convert_to_nv21(&y, &u, &v, geometry, &mut nv21).unwrap();

        assert_eq!(nv21[y.len() - 1], 1);
        assert_eq!(nv21[y.len()], 0xAA);
        let chroma = &nv21[geometry.luma_len()..];
        assert_eq!(&chroma[..14], &[3u8, 2].repeat(7)[..]);
        assert!(chroma[14..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_rejects_wrong_output_size() {
        let geometry = PreviewGeometry::new(4, 2, 4).unwrap();
        let mut nv21 = vec![0u8; 10];
        let err = convert_to_nv21(&[0; 8], &[0; 2], &[0; 2], geometry, &mut nv21).unwrap_err();
        assert_eq!(
            err,
            ConvertError::OutputSize {
                expected: 12,
                actual: 10
            }
        );
    }

    #[test]
    fn test_rejects_unknown_ratio() {
        let geometry = PreviewGeometry::new(4, 2, 4).unwrap();
        let mut nv21 = vec![0u8; geometry.nv21_len()];
        let err = convert_to_nv21(&[0; 8], &[0; 8], &[0; 8], geometry, &mut nv21).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedLayout { .. }));
    }

    #[test]
    fn test_crop_policy() {
        let size = Resolution::new(640, 480);
        assert_eq!(CropPolicy::None.visible_size(size), size);
        assert_eq!(
            CropPolicy::TrimTrailingColumn.visible_size(size),
            Resolution::new(639, 480)
        );
        assert_eq!(
            CropPolicy::TrimTrailingRow.visible_size(size),
            Resolution::new(640, 479)
        );
    }
}
