//! MIDI variable-length quantities
//!
//! Seven bits per byte, most significant group first, high bit set on every
//! byte but the last.

/// Largest value a variable-length quantity may hold
pub const MAX: u32 = 0x0FFF_FFFF;

/// Append the encoding of `value` to `out`
pub fn write(out: &mut Vec<u8>, value: u32) {
    debug_assert!(value <= MAX);
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

/// Encode `value` into a new buffer
pub fn encode(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    write(&mut out, value);
    out
}

/// Decode a quantity from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// input ends mid-quantity or runs past four bytes.
pub fn decode(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value = 0u32;
    for (i, &b) in bytes.iter().enumerate().take(4) {
        value = (value << 7) | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(0x40), vec![0x40]);
        assert_eq!(encode(0x7F), vec![0x7F]);
        assert_eq!(encode(0x80), vec![0x81, 0x00]);
        assert_eq!(encode(0x2000), vec![0xC0, 0x00]);
        assert_eq!(encode(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(encode(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(encode(0x1F_FFFF), vec![0xFF, 0xFF, 0x7F]);
        assert_eq!(encode(0x20_0000), vec![0x81, 0x80, 0x80, 0x00]);
        assert_eq!(encode(MAX), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_round_trip_across_range() {
        let mut value = 0u32;
        while value <= MAX {
            let bytes = encode(value);
            assert_eq!(decode(&bytes), Some((value, bytes.len())));
            // Step through every byte-length boundary without visiting all values
            value = value * 3 + 1;
        }
        for value in [0x7F, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000, MAX] {
            assert_eq!(decode(&encode(value)), Some((value, encode(value).len())));
        }
    }

    #[test]
    fn test_decode_stops_at_last_byte() {
        assert_eq!(decode(&[0x81, 0x00, 0x55]), Some((0x80, 2)));
        assert_eq!(decode(&[0x81]), None);
        assert_eq!(decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F]), None);
    }
}
