//! NTSC/PAL detection from frame timing

use crate::pokey::VideoStandard;
use crate::song::Snapshot;

/// Guess the video standard from the spacing of consecutive frames.
///
/// The median gap is compared against the NTSC and PAL frame periods.
/// Falls back to NTSC when there is nothing to measure.
pub fn detect_standard(snapshots: &[Snapshot]) -> VideoStandard {
    let mut gaps: Vec<f64> = snapshots
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .filter(|gap| *gap > 0.0)
        .collect();

    if gaps.is_empty() {
        return VideoStandard::Ntsc;
    }

    gaps.sort_by(f64::total_cmp);
    let median = gaps[gaps.len() / 2];

    let pal = VideoStandard::Pal.frame_period();
    let ntsc = VideoStandard::Ntsc.frame_period();
    if (median - pal).abs() < (median - ntsc).abs() {
        VideoStandard::Pal
    } else {
        VideoStandard::Ntsc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(period: f64, count: usize) -> Vec<Snapshot> {
        (0..count)
            .map(|i| Snapshot::new(i as f64 * period, vec![[0; 9]]))
            .collect()
    }

    #[test]
    fn test_detects_pal() {
        assert_eq!(detect_standard(&frames(1.0 / 50.0, 100)), VideoStandard::Pal);
    }

    #[test]
    fn test_detects_ntsc() {
        assert_eq!(detect_standard(&frames(1.0 / 60.0, 100)), VideoStandard::Ntsc);
    }

    #[test]
    fn test_outliers_do_not_change_the_median() {
        let mut snapshots = frames(1.0 / 50.0, 20);
        snapshots.push(Snapshot::new(10.0, vec![[0; 9]]));
        assert_eq!(detect_standard(&snapshots), VideoStandard::Pal);
    }

    #[test]
    fn test_defaults_to_ntsc() {
        assert_eq!(detect_standard(&[]), VideoStandard::Ntsc);
        assert_eq!(detect_standard(&frames(0.02, 1)), VideoStandard::Ntsc);
    }
}
