//! Polynomial counter periods
//!
//! The AUDC distortion selector picks which counters gate a channel's
//! divide-by-N output. The pitch heard is the divided clock stretched by the
//! repetition period of that counter combination.

/// 4-bit polynomial counter period
pub const POLY4: u32 = 15;
/// 5-bit polynomial counter period
pub const POLY5: u32 = 31;
/// 9-bit polynomial counter period
pub const POLY9: u32 = 511;
/// 17-bit polynomial counter period
pub const POLY17: u32 = 131_071;
/// Square wave: two half-periods per cycle
pub const PURE: u32 = 2;

/// Periods indexed by selector, with the long counter at 17 bits
const PERIODS: [u32; 8] = [
    POLY17 * POLY5, // 0: 17-bit + 5-bit noise
    POLY5,          // 1: 5-bit rumble
    POLY4 * POLY5,  // 2: 4-bit + 5-bit rumble
    POLY5,          // 3: 5-bit rumble
    POLY17,         // 4: 17-bit soft noise
    PURE,           // 5: pure tone
    POLY4,          // 6: 4-bit buzz
    PURE,           // 7: pure tone (undocumented alias)
];

/// Period of the counter combination chosen by `selector`.
///
/// `poly9` is AUDCTL bit 7, which shortens the 17-bit counter to 9 bits.
pub fn period(selector: u8, poly9: bool) -> u32 {
    match (selector & 0x07, poly9) {
        (0, true) => POLY9 * POLY5,
        (4, true) => POLY9,
        (s, _) => PERIODS[s as usize],
    }
}

/// Selectors treated as pitched content.
pub fn is_tonal(selector: u8) -> bool {
    matches!(selector & 0x07, 5 | 6 | 7)
}

/// Short human-readable timbre description
pub fn describe(selector: u8) -> &'static str {
    match selector & 0x07 {
        0 => "17-bit + 5-bit noise",
        1 | 3 => "5-bit rumble",
        2 => "4-bit + 5-bit rumble",
        4 => "17-bit noise",
        6 => "4-bit buzz",
        _ => "pure tone",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tonal_selectors() {
        let tonal: Vec<u8> = (0..8).filter(|&s| is_tonal(s)).collect();
        assert_eq!(tonal, vec![5, 6, 7]);
    }

    #[test]
    fn test_poly9_replaces_long_counter() {
        assert_eq!(period(0, false), POLY17 * POLY5);
        assert_eq!(period(0, true), POLY9 * POLY5);
        assert_eq!(period(4, false), POLY17);
        assert_eq!(period(4, true), POLY9);
        // Other entries are unaffected
        for s in [1, 2, 3, 5, 6, 7] {
            assert_eq!(period(s, false), period(s, true));
        }
    }

    #[test]
    fn test_pure_tone_aliases() {
        assert_eq!(period(5, false), PURE);
        assert_eq!(period(7, false), PURE);
        assert_eq!(describe(7), describe(5));
    }
}
