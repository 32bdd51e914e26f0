//! Parsing Utilities.

/// Parses the leading integer of `s` the way C's `strtol(s, NULL, 0)` does,
/// as a machine word.
///
/// - Leading whitespace is skipped, then an optional `+` or `-`.
/// - The base follows from the prefix: `0x`/`0X` is hexadecimal, a leading
///   `0` is octal, anything else is decimal.
/// - Parsing stops at the first character that is not a digit of the base;
///   the rest of the string is ignored.
/// - A string with no digits parses as `0`.
/// - Accumulation wraps at the word size, and `-N` is the two's complement
///   of `N`. Any 64-bit address parses exactly.
///
/// ```
/// use kmon::util::strtol;
///
/// assert_eq!(strtol("0x10"), 16);
/// assert_eq!(strtol("010"), 8);
/// assert_eq!(strtol("  -12abc"), 12usize.wrapping_neg());
/// assert_eq!(strtol("0xffffff0000100000"), 0xffff_ff00_0010_0000);
/// ```
pub fn strtol(s: &str) -> usize {
    let s = s.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let bytes = s.as_bytes();
    let (radix, digits) = match bytes {
        [b'0', b'x' | b'X', d, ..] if d.is_ascii_hexdigit() => (16, &bytes[2..]),
        [b'0', ..] => (8, bytes),
        _ => (10, bytes),
    };

    let value = digits
        .iter()
        .map_while(|&b| (b as char).to_digit(radix))
        .fold(0usize, |value, digit| {
            value
                .wrapping_mul(radix as usize)
                .wrapping_add(digit as usize)
        });
    if negative { value.wrapping_neg() } else { value }
}

/// Rounds `value` down to the closest multiple of `align`.
///
/// `align` must not be zero.
#[inline]
pub const fn round_down(value: usize, align: usize) -> usize {
    value - value % align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strtol_picks_the_base_from_the_prefix() {
        assert_eq!(strtol("0x10"), 16);
        assert_eq!(strtol("0XfF"), 255);
        assert_eq!(strtol("010"), 8);
        assert_eq!(strtol("16"), 16);
        assert_eq!(strtol("0"), 0);
    }

    #[test]
    fn strtol_signs_and_whitespace() {
        assert_eq!(strtol("-1"), usize::MAX);
        assert_eq!(strtol("+7"), 7);
        assert_eq!(strtol(" \t42"), 42);
        assert_eq!(strtol("-0x20"), 32usize.wrapping_neg());
    }

    #[test]
    fn strtol_stops_at_the_first_invalid_digit() {
        assert_eq!(strtol("12abc"), 12);
        assert_eq!(strtol("019"), 1);
        // "0x" without a hex digit is the number 0 followed by junk.
        assert_eq!(strtol("0xg"), 0);
        assert_eq!(strtol(""), 0);
        assert_eq!(strtol("abc"), 0);
        assert_eq!(strtol("-"), 0);
    }

    #[test]
    fn strtol_covers_the_whole_address_space() {
        assert_eq!(strtol("0xffffff0000100000"), 0xffff_ff00_0010_0000);
        assert_eq!(strtol("0xffffffff80001000"), 0xffff_ffff_8000_1000);
        assert_eq!(strtol("0xffffffffffffffff"), usize::MAX);
        assert_eq!(strtol("18446744073709551615"), usize::MAX);
        // Digits past the word size wrap around.
        assert_eq!(strtol("0x10000000000000001"), 1);
    }

    #[test]
    fn round_down_to_pages() {
        assert_eq!(round_down(0x0040_0fff, 0x1000), 0x0040_0000);
        assert_eq!(round_down(0x0040_1000, 0x1000), 0x0040_1000);
        assert_eq!(round_down(1023, 1024), 0);
    }
}
