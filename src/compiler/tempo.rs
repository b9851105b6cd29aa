//! Tempo estimation from note onsets
//!
//! Bass lines tend to fall on the beat, so the most common gap between
//! low-note onsets is a good first guess at the beat length.

use std::collections::BTreeMap;

/// Notes below this MIDI key count as low notes
pub const LOW_NOTE_LIMIT: u8 = 60;

/// Histogram bin width in seconds
const BIN: f64 = 0.01;
const MIN_INTERVAL: f64 = 0.05;
const MAX_INTERVAL: f64 = 2.0;

/// Estimated tempo in BPM, folded into [70, 140).
///
/// `onsets` must be sorted. Returns `None` with fewer than two usable
/// intervals.
pub fn estimate_tempo(onsets: &[f64]) -> Option<f64> {
    let mut histogram: BTreeMap<u32, usize> = BTreeMap::new();
    for pair in onsets.windows(2) {
        let interval = pair[1] - pair[0];
        if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
            continue;
        }
        *histogram.entry((interval / BIN).round() as u32).or_default() += 1;
    }

    if histogram.values().sum::<usize>() < 2 {
        return None;
    }

    // Ties go to the shorter interval
    let (&bin, _) = histogram.iter().rev().max_by_key(|&(_, &count)| count)?;

    let mut bpm = 60.0 / (bin as f64 * BIN);
    while bpm < 70.0 {
        bpm *= 2.0;
    }
    while bpm >= 140.0 {
        bpm /= 2.0;
    }
    Some(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(interval: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| 1.0 + i as f64 * interval).collect()
    }

    #[test]
    fn test_steady_beat() {
        let bpm = estimate_tempo(&steady(0.6, 16)).unwrap();
        assert!((bpm - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_folding() {
        // 0.25 s = 240 BPM, folded to 120
        let bpm = estimate_tempo(&steady(0.25, 16)).unwrap();
        assert!((bpm - 120.0).abs() < 1e-9);
        // 1.2 s = 50 BPM, folded to 100
        let bpm = estimate_tempo(&steady(1.2, 8)).unwrap();
        assert!((bpm - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_most_common_interval_wins() {
        let mut onsets = steady(0.5, 10);
        let last = *onsets.last().unwrap();
        onsets.push(last + 0.3);
        onsets.push(last + 0.6);
        let bpm = estimate_tempo(&onsets).unwrap();
        assert!((bpm - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_not_enough_onsets() {
        assert_eq!(estimate_tempo(&[]), None);
        assert_eq!(estimate_tempo(&[1.0, 1.5]), None);
        // Gaps outside the usable range are ignored
        assert_eq!(estimate_tempo(&[0.0, 0.01, 0.02, 5.0]), None);
    }
}
