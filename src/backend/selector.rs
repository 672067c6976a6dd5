// Device selection - Filter, score and pick one physical device
//
// Filtering keeps devices that can do what the caller asked for (graphics,
// and presentation to the surface when requested). Scoring is a crude
// "bigger limits means more capable GPU" sum, not a calibrated heuristic.

use super::capability::DeviceCandidate;
use super::surface::NativeWindow;
use crate::error::{Error, Result};

/// What the caller needs from the device
#[derive(Debug, Clone, Copy, Default)]
pub struct Requirements {
    pub needs_presentation: bool,
    pub needs_graphics_queue: bool,
    pub window: Option<NativeWindow>,
}

/// Answers whether a queue family of a device can present to the surface.
///
/// Implemented by the live surface; presentation support is always queried,
/// never assumed.
pub trait PresentationSupport {
    fn supports_presentation(&self, device: &DeviceCandidate, queue_family: u32) -> bool;
}

/// Used when no surface exists. Confirms nothing.
pub struct Headless;

impl PresentationSupport for Headless {
    fn supports_presentation(&self, _device: &DeviceCandidate, _queue_family: u32) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub candidate: DeviceCandidate,
    pub graphics_family: u32,
    /// Set exactly when presentation was required
    pub present_family: Option<u32>,
}

/// Sum of the five limits used to rank devices
pub fn score(candidate: &DeviceCandidate) -> u64 {
    let limits = &candidate.limits;
    [
        limits.color_sample_counts,
        limits.depth_sample_counts,
        limits.max_image_dimension_1d,
        limits.max_image_dimension_2d,
        limits.max_image_dimension_3d,
    ]
    .iter()
    .map(|&value| u64::from(value))
    .sum()
}

/// Pick the best device for `requirements`.
///
/// Ties in score keep the earlier device. Queue family resolution on the
/// other hand keeps the *last* matching family (see [`resolve_families`]).
pub fn select_device(
    candidates: Vec<DeviceCandidate>,
    requirements: &Requirements,
    presentation: &dyn PresentationSupport,
) -> Result<SelectedDevice> {
    let mut best: Option<(u64, SelectedDevice)> = None;

    for candidate in candidates {
        let Some(selected) = resolve_families(candidate, requirements, presentation) else {
            continue;
        };

        let candidate_score = score(&selected.candidate);
        log::debug!(
            "GPU '{}' qualifies with score {}",
            selected.candidate.name,
            candidate_score
        );

        let replace = match &best {
            Some((best_score, _)) => candidate_score > *best_score,
            None => true,
        };
        if replace {
            best = Some((candidate_score, selected));
        }
    }

    let (best_score, selected) = best.ok_or(Error::NoSuitableDevice)?;

    log::info!(
        "Selected GPU: {} (score {}, graphics family {}, present family {:?})",
        selected.candidate.name,
        best_score,
        selected.graphics_family,
        selected.present_family
    );

    Ok(selected)
}

/// Apply the filter to one candidate and record its queue families.
///
/// Returns `None` when the candidate does not qualify. When several families
/// match, the last one in enumeration order wins for both the graphics and
/// the presentation family.
fn resolve_families(
    candidate: DeviceCandidate,
    requirements: &Requirements,
    presentation: &dyn PresentationSupport,
) -> Option<SelectedDevice> {
    let mut graphics_family = None;
    let mut present_family = None;
    let mut graphics_present_family = None;

    for family in &candidate.queue_families {
        if family.has_graphics() {
            graphics_family = Some(family.index);
        }

        if requirements.needs_presentation
            && family.queue_count > 0
            && presentation.supports_presentation(&candidate, family.index)
        {
            present_family = Some(family.index);
            if family.has_graphics() {
                graphics_present_family = Some(family.index);
            }
        }
    }

    let graphics_family = graphics_family?;

    if requirements.needs_presentation {
        if !candidate.supports_extension(ash::extensions::khr::Swapchain::name()) {
            log::debug!("GPU '{}' lacks VK_KHR_swapchain", candidate.name);
            return None;
        }
        // A graphics family must itself be able to present
        graphics_present_family?;
    }

    Some(SelectedDevice {
        candidate,
        graphics_family,
        present_family: if requirements.needs_presentation {
            present_family
        } else {
            None
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::capability::tests::{candidate, family};
    use crate::backend::capability::DeviceLimits;
    use std::collections::HashSet;

    /// Presentation answers keyed by (device name, family index)
    struct FakeSurface(HashSet<(String, u32)>);

    impl FakeSurface {
        fn new(supported: &[(&str, u32)]) -> Self {
            Self(
                supported
                    .iter()
                    .map(|(name, index)| (name.to_string(), *index))
                    .collect(),
            )
        }
    }

    impl PresentationSupport for FakeSurface {
        fn supports_presentation(&self, device: &DeviceCandidate, queue_family: u32) -> bool {
            self.0.contains(&(device.name.clone(), queue_family))
        }
    }

    fn with_limits(name: &str, limits: DeviceLimits) -> DeviceCandidate {
        let mut device = candidate(name, vec![family(0, true, 1)]);
        device.limits = limits;
        device
    }

    fn limits(base: u32) -> DeviceLimits {
        DeviceLimits {
            color_sample_counts: 15,
            depth_sample_counts: 15,
            max_image_dimension_1d: base,
            max_image_dimension_2d: base,
            max_image_dimension_3d: base / 8,
        }
    }

    fn graphics_only() -> Requirements {
        Requirements {
            needs_presentation: false,
            needs_graphics_queue: true,
            window: None,
        }
    }

    fn presenting() -> Requirements {
        Requirements {
            needs_presentation: true,
            needs_graphics_queue: true,
            window: None,
        }
    }

    #[test]
    fn test_empty_candidate_list_is_not_found() {
        for requirements in [graphics_only(), presenting(), Requirements::default()] {
            let result = select_device(Vec::new(), &requirements, &Headless);
            assert!(matches!(result, Err(Error::NoSuitableDevice)));
        }
    }

    #[test]
    fn test_score_sums_the_five_limits() {
        let device = with_limits("gpu", limits(8192));
        assert_eq!(score(&device), 15 + 15 + 8192 + 8192 + 1024);
    }

    #[test]
    fn test_score_does_not_overflow() {
        let device = with_limits(
            "huge",
            DeviceLimits {
                color_sample_counts: u32::MAX,
                depth_sample_counts: u32::MAX,
                max_image_dimension_1d: u32::MAX,
                max_image_dimension_2d: u32::MAX,
                max_image_dimension_3d: u32::MAX,
            },
        );
        assert_eq!(score(&device), u64::from(u32::MAX) * 5);
    }

    #[test]
    fn test_highest_score_wins() {
        let devices = vec![
            with_limits("small", limits(4096)),
            with_limits("big", limits(16384)),
            with_limits("medium", limits(8192)),
        ];

        let selected = select_device(devices, &graphics_only(), &Headless).unwrap();
        assert_eq!(selected.candidate.name, "big");
    }

    #[test]
    fn test_bumping_any_limit_keeps_winner() {
        let bumps: [fn(&mut DeviceLimits); 5] = [
            |l: &mut DeviceLimits| l.color_sample_counts += 1,
            |l: &mut DeviceLimits| l.depth_sample_counts += 1,
            |l: &mut DeviceLimits| l.max_image_dimension_1d += 1,
            |l: &mut DeviceLimits| l.max_image_dimension_2d += 1,
            |l: &mut DeviceLimits| l.max_image_dimension_3d += 1,
        ];

        for bump in bumps {
            let mut winner = limits(8192);
            bump(&mut winner);
            let devices = vec![
                with_limits("rival", limits(8192)),
                with_limits("winner", winner),
            ];

            let selected = select_device(devices, &graphics_only(), &Headless).unwrap();
            assert_eq!(selected.candidate.name, "winner");
        }
    }

    #[test]
    fn test_equal_scores_keep_first_enumerated() {
        let devices = vec![
            with_limits("first", limits(8192)),
            with_limits("second", limits(8192)),
        ];

        let selected = select_device(devices, &graphics_only(), &Headless).unwrap();
        assert_eq!(selected.candidate.name, "first");
    }

    #[test]
    fn test_devices_without_graphics_are_filtered() {
        let mut compute_only = candidate("compute", vec![family(0, false, 4)]);
        compute_only.limits = limits(32768);
        let devices = vec![compute_only, with_limits("graphics", limits(1024))];

        let selected = select_device(devices, &graphics_only(), &Headless).unwrap();
        assert_eq!(selected.candidate.name, "graphics");
        assert_eq!(selected.present_family, None);
    }

    #[test]
    fn test_presentation_requires_confirmed_graphics_family() {
        // Only a non-graphics family of "a" can present
        let a = candidate("a", vec![family(0, true, 1), family(1, false, 1)]);
        let b = candidate("b", vec![family(0, true, 1)]);
        let surface = FakeSurface::new(&[("a", 1)]);

        let result = select_device(vec![a, b], &presenting(), &surface);
        assert!(matches!(result, Err(Error::NoSuitableDevice)));
    }

    #[test]
    fn test_presentation_without_surface_finds_nothing() {
        let devices = vec![with_limits("gpu", limits(8192))];
        let result = select_device(devices, &presenting(), &Headless);
        assert!(matches!(result, Err(Error::NoSuitableDevice)));
    }

    #[test]
    fn test_presentation_requires_swapchain_extension() {
        let mut device = candidate("gpu", vec![family(0, true, 1)]);
        device.extensions.clear();
        let surface = FakeSurface::new(&[("gpu", 0)]);

        let result = select_device(vec![device], &presenting(), &surface);
        assert!(matches!(result, Err(Error::NoSuitableDevice)));
    }

    #[test]
    fn test_queue_resolution_is_last_wins() {
        let device = candidate(
            "gpu",
            vec![
                family(0, true, 1),
                family(1, false, 1),
                family(2, true, 1),
                family(3, false, 1),
            ],
        );
        let surface = FakeSurface::new(&[("gpu", 0), ("gpu", 2), ("gpu", 3)]);

        let selected = select_device(vec![device], &presenting(), &surface).unwrap();
        assert_eq!(selected.graphics_family, 2);
        assert_eq!(selected.present_family, Some(3));
    }

    #[test]
    fn test_empty_families_are_skipped() {
        let device = candidate("gpu", vec![family(0, true, 1), family(1, true, 0)]);
        let selected = select_device(vec![device], &graphics_only(), &Headless).unwrap();
        assert_eq!(selected.graphics_family, 0);
    }
}
