//! Preview size selection from the sizes a device advertises.

use super::types::Resolution;

/// Caller constraints on the preview size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeConstraints {
    /// Largest acceptable size (both dimensions)
    pub max: Option<Resolution>,
    /// Smallest acceptable size (both dimensions)
    pub min: Option<Resolution>,
    /// Size to use verbatim when the device offers it within bounds
    pub exact: Option<Resolution>,
    /// Host viewfinder size, used for aspect-ratio scoring
    pub viewport: Option<Resolution>,
}

impl SizeConstraints {
    fn admits(&self, size: &Resolution) -> bool {
        if self.max.is_some_and(|max| size.exceeds(max)) {
            return false;
        }
        if self.min.is_some_and(|min| size.falls_below(min)) {
            return false;
        }
        true
    }
}

/// Result of [`select_preview_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSelection {
    pub size: Resolution,
    /// No candidate satisfied the bounds; `size` is the largest advertised one.
    pub fell_back: bool,
}

/// Choose the preview size that best fits `constraints`.
///
/// Candidates are ranked largest first. An exact match within bounds wins
/// outright; otherwise the candidate whose height/width ratio is closest to
/// the viewport's (normalized to at most 1) is chosen, the larger one on ties.
/// When the bounds exclude every candidate the largest advertised size is
/// returned with `fell_back` set.
///
/// Returns `None` only when no non-empty candidate is advertised.
pub fn select_preview_size(
    candidates: &[Resolution],
    constraints: &SizeConstraints,
) -> Option<SizeSelection> {
    let mut sorted: Vec<Resolution> = candidates.iter().copied().filter(|s| !s.is_empty()).collect();
    sorted.sort_by(|a, b| b.width.cmp(&a.width).then(b.height.cmp(&a.height)));
    let largest = *sorted.first()?;

    let filtered: Vec<Resolution> = sorted.into_iter().filter(|s| constraints.admits(s)).collect();
    let Some(&first) = filtered.first() else {
        log::warn!(
            "No preview size within bounds (max {:?}, min {:?}), using {}",
            constraints.max,
            constraints.min,
            largest
        );
        return Some(SizeSelection {
            size: largest,
            fell_back: true,
        });
    };

    if let Some(exact) = constraints.exact {
        if filtered.contains(&exact) {
            return Some(SizeSelection {
                size: exact,
                fell_back: false,
            });
        }
        log::debug!("Requested preview size {} not offered within bounds", exact);
    }

    let target = normalized_ratio(constraints.viewport.filter(|v| !v.is_empty()).unwrap_or(first));
    let mut best = first;
    for size in &filtered[1..] {
        if (size.height_ratio() - target).abs() < (best.height_ratio() - target).abs() {
            best = *size;
        }
    }

    Some(SizeSelection {
        size: best,
        fell_back: false,
    })
}

/// Width/height of `size`, inverted when above 1 so portrait and landscape
/// viewports score the same way.
fn normalized_ratio(size: Resolution) -> f32 {
    let ratio = size.width as f32 / size.height as f32;
    if ratio > 1.0 {
        1.0 / ratio
    } else {
        ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(list: &[(u32, u32)]) -> Vec<Resolution> {
        list.iter().map(|&(w, h)| Resolution::new(w, h)).collect()
    }

    fn advertised() -> Vec<Resolution> {
        sizes(&[
            (640, 480),
            (1920, 1080),
            (1280, 720),
            (1440, 1080),
            (320, 240),
            (1280, 960),
        ])
    }

    #[test]
    fn test_exact_match_short_circuits() {
        let constraints = SizeConstraints {
            max: Some(Resolution::FULL_HD),
            min: Some(Resolution::MEDIUM),
            exact: Some(Resolution::new(1280, 960)),
            viewport: Some(Resolution::new(1080, 1920)),
        };
        let mut candidates = advertised();
        for _ in 0..candidates.len() {
            let selection = select_preview_size(&candidates, &constraints).unwrap();
            assert_eq!(selection.size, Resolution::new(1280, 960));
            assert!(!selection.fell_back);
            candidates.rotate_left(1);
        }
    }

    #[test]
    fn test_viewport_ratio_scoring() {
        // A 9:16 portrait viewport normalizes to 0.5625, matching 16:9 sizes.
        let constraints = SizeConstraints {
            viewport: Some(Resolution::new(1080, 1920)),
            ..Default::default()
        };
        let selection = select_preview_size(&advertised(), &constraints).unwrap();
        assert_eq!(selection.size, Resolution::FULL_HD);

        let constraints = SizeConstraints {
            viewport: Some(Resolution::new(480, 640)),
            ..Default::default()
        };
        let selection = select_preview_size(&advertised(), &constraints).unwrap();
        // 1440x1080 is the first 4:3 candidate in largest-first order.
        assert_eq!(selection.size, Resolution::new(1440, 1080));
    }

    #[test]
    fn test_bounds_filter_candidates() {
        let constraints = SizeConstraints {
            max: Some(Resolution::HIGH),
            min: Some(Resolution::MEDIUM),
            viewport: Some(Resolution::new(720, 1280)),
            ..Default::default()
        };
        let selection = select_preview_size(&advertised(), &constraints).unwrap();
        assert_eq!(selection.size, Resolution::HIGH);
    }

    #[test]
    fn test_without_viewport_uses_largest_ratio() {
        let selection =
            select_preview_size(&advertised(), &SizeConstraints::default()).unwrap();
        assert_eq!(selection.size, Resolution::FULL_HD);
    }

    #[test]
    fn test_falls_back_to_largest_when_bounds_exclude_all() {
        let constraints = SizeConstraints {
            max: Some(Resolution::new(200, 200)),
            ..Default::default()
        };
        let selection = select_preview_size(&advertised(), &constraints).unwrap();
        assert_eq!(selection.size, Resolution::FULL_HD);
        assert!(selection.fell_back);
    }

    #[test]
    fn test_ties_keep_larger_candidate() {
        let candidates = sizes(&[(640, 360), (1280, 720), (960, 540)]);
        let constraints = SizeConstraints {
            viewport: Some(Resolution::new(1600, 900)),
            ..Default::default()
        };
        let selection = select_preview_size(&candidates, &constraints).unwrap();
        assert_eq!(selection.size, Resolution::HIGH);
    }

    #[test]
    fn test_sort_breaks_width_ties_by_height() {
        let candidates = sizes(&[(1280, 720), (1280, 960)]);
        let selection =
            select_preview_size(&candidates, &SizeConstraints::default()).unwrap();
        assert_eq!(selection.size, Resolution::new(1280, 960));
    }

    #[test]
    fn test_empty_candidates() {
        assert!(select_preview_size(&[], &SizeConstraints::default()).is_none());
        assert!(select_preview_size(&sizes(&[(0, 480)]), &SizeConstraints::default()).is_none());
    }
}
