//! Tolerant UTF-8 decoding into source units
//!
//! The decoder never fails. Every input byte belongs to exactly one
//! [`SourceUnit`]; a malformed sequence becomes a single invalid unit that
//! spans the bytes its leading byte claimed, so a bogus 5-byte sequence
//! yields one unit rather than five.

/// One decoded character of the input, valid or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceUnit {
    /// Decoded character, `None` when the sequence is malformed
    pub codepoint: Option<char>,
    /// Number of input bytes consumed by this unit (always at least 1)
    pub byte_len: usize,
}

impl SourceUnit {
    /// Whether the unit decoded to a Unicode scalar value
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.codepoint.is_some()
    }
}

/// Number of bytes a leading byte claims under the original length-prefix
/// scheme, which still knows about 5 and 6 byte forms.
///
/// Stray continuation bytes and `0xFE`/`0xFF` claim a single byte.
#[inline]
pub fn unit_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0x80..=0xBF => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        0xF8..=0xFB => 5,
        0xFC..=0xFD => 6,
        0xFE..=0xFF => 1,
    }
}

/// Decode `input` lazily into source units
pub fn decode(input: &[u8]) -> Decoder<'_> {
    Decoder { input, pos: 0 }
}

/// Iterator over the source units of a byte buffer
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Bytes not yet consumed
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }
}

impl Iterator for Decoder<'_> {
    type Item = SourceUnit;

    fn next(&mut self) -> Option<SourceUnit> {
        let rest = self.remaining();
        let &lead = rest.first()?;

        let claimed = unit_len(lead);
        let byte_len = claimed.min(rest.len());
        let codepoint = decode_sequence(&rest[..byte_len], claimed);

        self.pos += byte_len;
        Some(SourceUnit {
            codepoint,
            byte_len,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.input.len() - self.pos;
        (remaining.div_ceil(6), Some(remaining))
    }
}

impl std::iter::FusedIterator for Decoder<'_> {}

/// Decode one sequence of `claimed` bytes, of which `seq` is what the buffer
/// actually holds.
fn decode_sequence(seq: &[u8], claimed: usize) -> Option<char> {
    let (&lead, tail) = seq.split_first()?;

    let (mut value, min) = match claimed {
        1 => return lead.is_ascii().then_some(char::from(lead)),
        // Truncated at the end of the buffer
        _ if seq.len() < claimed => return None,
        2 => (u32::from(lead & 0x1F), 0x80),
        3 => (u32::from(lead & 0x0F), 0x800),
        4 => (u32::from(lead & 0x07), 0x1_0000),
        // 5 and 6 byte forms are gone from modern UTF-8
        _ => return None,
    };

    for &byte in tail {
        if byte & 0xC0 != 0x80 {
            return None;
        }
        value = (value << 6) | u32::from(byte & 0x3F);
    }

    // Overlong forms, surrogates and values past U+10FFFF
    if value < min {
        return None;
    }
    char::from_u32(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn units(input: &[u8]) -> Vec<SourceUnit> {
        decode(input).collect()
    }

    fn valid(ch: char) -> SourceUnit {
        SourceUnit {
            codepoint: Some(ch),
            byte_len: ch.len_utf8(),
        }
    }

    fn invalid(byte_len: usize) -> SourceUnit {
        SourceUnit {
            codepoint: None,
            byte_len,
        }
    }

    #[test]
    fn test_ascii_units() {
        assert_eq!(units(b"Hi!"), vec![valid('H'), valid('i'), valid('!')]);
        assert!(units(b"").is_empty());
    }

    #[test]
    fn test_multibyte_units() {
        // 2, 3 and 4 byte forms: a-umlaut, Cyrillic tse, Gothic ahsa
        let input = "\u{E4}\u{446}\u{10330}";
        assert_eq!(
            units(input.as_bytes()),
            vec![valid('\u{E4}'), valid('\u{446}'), valid('\u{10330}')]
        );
    }

    #[test]
    fn test_legacy_five_byte_form_is_one_unit() {
        let input = [0xF8, 0x80, 0x80, 0x80, 0x80];
        assert_eq!(units(&input), vec![invalid(5)]);
    }

    #[test]
    fn test_legacy_six_byte_form_is_one_unit() {
        let input = [0xFC, 0x84, 0x80, 0x80, 0x80, 0x80, b'a'];
        assert_eq!(units(&input), vec![invalid(6), valid('a')]);
    }

    #[test]
    fn test_truncated_sequence_is_clamped() {
        // Euro sign missing its last byte
        assert_eq!(units(&[b'x', 0xE2, 0x82]), vec![valid('x'), invalid(2)]);
        assert_eq!(units(&[0xF8, 0x80]), vec![invalid(2)]);
    }

    #[test]
    fn test_bad_continuation_consumes_claimed_length() {
        assert_eq!(units(&[0xC3, b'A', b'B']), vec![invalid(2), valid('B')]);
    }

    #[test]
    fn test_stray_bytes_are_single_units() {
        assert_eq!(
            units(&[0x80, 0xBF, 0xFE, 0xFF]),
            vec![invalid(1), invalid(1), invalid(1), invalid(1)]
        );
    }

    #[test]
    fn test_overlong_and_surrogate_rejected() {
        // Overlong NUL and overlong slash
        assert_eq!(units(&[0xC0, 0x80]), vec![invalid(2)]);
        assert_eq!(units(&[0xE0, 0x80, 0xAF]), vec![invalid(3)]);
        // UTF-16 surrogate half
        assert_eq!(units(&[0xED, 0xA0, 0x80]), vec![invalid(3)]);
        // Past U+10FFFF
        assert_eq!(units(&[0xF4, 0x90, 0x80, 0x80]), vec![invalid(4)]);
    }

    #[test]
    fn test_unit_len_table() {
        assert_eq!(unit_len(b'a'), 1);
        assert_eq!(unit_len(0x9F), 1);
        assert_eq!(unit_len(0xC3), 2);
        assert_eq!(unit_len(0xE2), 3);
        assert_eq!(unit_len(0xF0), 4);
        assert_eq!(unit_len(0xF8), 5);
        assert_eq!(unit_len(0xFD), 6);
        assert_eq!(unit_len(0xFF), 1);
    }

    #[test]
    fn test_decoder_restarts_per_call() {
        let input = [0xE2, 0x82];
        assert_eq!(units(&input), units(&input));
    }

    proptest! {
        #[test]
        fn prop_units_cover_every_byte(input in prop::collection::vec(any::<u8>(), 0..256)) {
            let units = units(&input);
            prop_assert!(units.iter().all(|u| u.byte_len >= 1));
            prop_assert_eq!(units.iter().map(|u| u.byte_len).sum::<usize>(), input.len());
        }

        #[test]
        fn prop_valid_utf8_matches_std(text in ".{0,64}") {
            let decoded: Vec<char> = decode(text.as_bytes())
                .map(|u| u.codepoint)
                .collect::<Option<_>>()
                .unwrap();
            prop_assert_eq!(decoded, text.chars().collect::<Vec<_>>());
        }
    }
}
