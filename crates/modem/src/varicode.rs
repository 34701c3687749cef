//! PSK31 varicode
//!
//! Every ASCII character maps to a 1-10 bit codeword that starts and ends
//! with a one and never holds two consecutive zeros, so `00` delimits
//! characters on the air.

use crate::{ModemError, Result};
use packetmodem_core::bitstream::BitBuffer;

/// Longest codeword in the table
pub const MAX_CODE_LENGTH: u8 = 10;

/// `(codeword, length)` per ASCII value, codeword sent MSB first
pub const VARICODE_TABLE: [(u16, u8); 128] = [
    (0b1010101011, 10), // NUL
    (0b1011011011, 10), // SOH
    (0b1011101101, 10), // STX
    (0b1101110111, 10), // ETX
    (0b1011101011, 10), // EOT
    (0b1101011111, 10), // ENQ
    (0b1011101111, 10), // ACK
    (0b1011111101, 10), // BEL
    (0b1011111111, 10), // BS
    (0b11101111, 8),    // HT
    (0b11101, 5),       // LF
    (0b1101101111, 10), // VT
    (0b1011011101, 10), // FF
    (0b11111, 5),       // CR
    (0b1101110101, 10), // SO
    (0b1110101011, 10), // SI
    (0b1011110111, 10), // DLE
    (0b1011110101, 10), // DC1
    (0b1110101101, 10), // DC2
    (0b1110101111, 10), // DC3
    (0b1101011011, 10), // DC4
    (0b1101101011, 10), // NAK
    (0b1101101101, 10), // SYN
    (0b1101010111, 10), // ETB
    (0b1101111011, 10), // CAN
    (0b1101111101, 10), // EM
    (0b1110110111, 10), // SUB
    (0b1101010101, 10), // ESC
    (0b1101011101, 10), // FS
    (0b1110111011, 10), // GS
    (0b1011111011, 10), // RS
    (0b1101111111, 10), // US
    (0b1, 1),           // SP
    (0b111111111, 9),   // !
    (0b101011111, 9),   // "
    (0b111110101, 9),   // #
    (0b111011011, 9),   // $
    (0b1011010101, 10), // %
    (0b1010111011, 10), // &
    (0b101111111, 9),   // '
    (0b11111011, 8),    // (
    (0b11110111, 8),    // )
    (0b101101111, 9),   // *
    (0b111011111, 9),   // +
    (0b1110101, 7),     // ,
    (0b110101, 6),      // -
    (0b1010111, 7),     // .
    (0b110101111, 9),   // /
    (0b10110111, 8),    // 0
    (0b10111101, 8),    // 1
    (0b11101101, 8),    // 2
    (0b11111111, 8),    // 3
    (0b101110111, 9),   // 4
    (0b101011011, 9),   // 5
    (0b101101011, 9),   // 6
    (0b110101101, 9),   // 7
    (0b110101011, 9),   // 8
    (0b110110111, 9),   // 9
    (0b11110101, 8),    // :
    (0b110111101, 9),   // ;
    (0b111101101, 9),   // <
    (0b1010101, 7),     // =
    (0b111010111, 9),   // >
    (0b1010101111, 10), // ?
    (0b1010111101, 10), // @
    (0b1111101, 7),     // A
    (0b11101011, 8),    // B
    (0b10101101, 8),    // C
    (0b10110101, 8),    // D
    (0b1110111, 7),     // E
    (0b11011011, 8),    // F
    (0b11111101, 8),    // G
    (0b101010101, 9),   // H
    (0b1111111, 7),     // I
    (0b111111101, 9),   // J
    (0b101111101, 9),   // K
    (0b11010111, 8),    // L
    (0b10111011, 8),    // M
    (0b11011101, 8),    // N
    (0b10101011, 8),    // O
    (0b11010101, 8),    // P
    (0b111011101, 9),   // Q
    (0b10101111, 8),    // R
    (0b1101111, 7),     // S
    (0b1101101, 7),     // T
    (0b101010111, 9),   // U
    (0b110110101, 9),   // V
    (0b101011101, 9),   // W
    (0b101110101, 9),   // X
    (0b101111011, 9),   // Y
    (0b1010101101, 10), // Z
    (0b111110111, 9),   // [
    (0b111101111, 9),   // \
    (0b111111011, 9),   // ]
    (0b1010111111, 10), // ^
    (0b101101101, 9),   // _
    (0b1011011111, 10), // `
    (0b1011, 4),        // a
    (0b1011111, 7),     // b
    (0b101111, 6),      // c
    (0b101101, 6),      // d
    (0b11, 2),          // e
    (0b111101, 6),      // f
    (0b1011011, 7),     // g
    (0b101011, 6),      // h
    (0b1101, 4),        // i
    (0b111101011, 9),   // j
    (0b10111111, 8),    // k
    (0b11011, 5),       // l
    (0b111011, 6),      // m
    (0b1111, 4),        // n
    (0b111, 3),         // o
    (0b111111, 6),      // p
    (0b110111111, 9),   // q
    (0b10101, 5),       // r
    (0b10111, 5),       // s
    (0b101, 3),         // t
    (0b110111, 6),      // u
    (0b1111011, 7),     // v
    (0b1101011, 7),     // w
    (0b11011111, 8),    // x
    (0b1011101, 7),     // y
    (0b111010101, 9),   // z
    (0b1010110111, 10), // {
    (0b110111011, 9),   // |
    (0b1010110101, 10), // }
    (0b1011010111, 10), // ~
    (0b1110110101, 10), // DEL
];

/// Codeword for `character`
pub fn lookup(character: char) -> Result<(u16, u8)> {
    if !character.is_ascii() {
        return Err(ModemError::UnsupportedCharacter { character });
    }
    Ok(VARICODE_TABLE[character as usize])
}

/// Append the codeword for `character` followed by the `00` gap
pub fn add_character(bits: &mut BitBuffer, character: char) -> Result<()> {
    let (code, length) = lookup(character)?;
    for position in (0..length).rev() {
        bits.add_bit((code >> position) & 1 == 1);
    }
    bits.add_zero_bit();
    bits.add_zero_bit();
    Ok(())
}

/// Varicode bits for `text`, committed
pub fn encode_text(text: &str) -> Result<BitBuffer> {
    let mut bits = BitBuffer::new();
    for character in text.chars() {
        add_character(&mut bits, character)?;
    }
    bits.flush();
    Ok(bits)
}

/// Streaming varicode decoder
#[derive(Debug, Clone, Default)]
pub struct VaricodeDecoder {
    code: u16,
    length: u8,
    zeros: u8,
}

impl VaricodeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one bit; returns a character when a `00` gap closes a codeword
    ///
    /// Unknown or over-long codewords are dropped.
    pub fn push_bit(&mut self, bit: u8) -> Option<char> {
        if bit == 1 {
            if self.length > 0 && self.zeros == 1 {
                self.code <<= 1;
                self.length += 1;
            }
            self.zeros = 0;
            self.code = (self.code << 1) | 1;
            self.length += 1;

            if self.length > MAX_CODE_LENGTH {
                self.reset();
            }
            return None;
        }

        self.zeros = self.zeros.saturating_add(1);
        if self.zeros < 2 || self.length == 0 {
            return None;
        }

        let (code, length) = (self.code, self.length);
        self.reset();
        VARICODE_TABLE
            .iter()
            .position(|&entry| entry == (code, length))
            .map(|ascii| ascii as u8 as char)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Decode every remaining bit of `bits`
    pub fn decode(&mut self, bits: &mut BitBuffer) -> String {
        std::iter::from_fn(|| bits.pop_next_bit())
            .filter_map(|bit| self.push_bit(bit))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_table_is_prefix_free_under_gap() {
        for (ascii, &(code, length)) in VARICODE_TABLE.iter().enumerate() {
            assert!(length >= 1 && length <= MAX_CODE_LENGTH, "{}", ascii);
            assert_eq!(code >> (length - 1), 1, "{} must start with a one", ascii);
            assert_eq!(code & 1, 1, "{} must end with a one", ascii);
            let zeros_pair = (0..length - 1).any(|i| (code >> i) & 0b11 == 0);
            assert!(!zeros_pair, "{} holds 00", ascii);
        }

        let mut seen = std::collections::HashSet::new();
        for entry in VARICODE_TABLE {
            assert!(seen.insert(entry), "duplicate codeword {:?}", entry);
        }
    }

    #[test]
    fn test_known_codewords() {
        assert_eq!(lookup(' ').unwrap(), (0b1, 1));
        assert_eq!(lookup('e').unwrap(), (0b11, 2));
        assert_eq!(lookup('a').unwrap(), (0b1011, 4));
        assert_eq!(lookup('3').unwrap(), (0b11111111, 8));
        assert_eq!(lookup('\n').unwrap(), (0b11101, 5));
    }

    #[test]
    fn test_character_bits_and_gap() {
        let mut bits = BitBuffer::new();
        add_character(&mut bits, 'a').unwrap();
        add_character(&mut bits, 'e').unwrap();
        bits.flush();
        assert_eq!(bits.to_string(), "10110011 00");
    }

    #[test]
    fn test_unsupported_character() {
        assert_eq!(
            encode_text("naïve").unwrap_err(),
            ModemError::UnsupportedCharacter { character: 'ï' }
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let text = "CQ CQ de N0CALL 73, 0123456789 {~}\r\n";
        let mut bits = BitBuffer::new();
        // idle preamble ahead of the first character
        bits.add_bits(&[0x00, 0x00], 16);
        for character in text.chars() {
            add_character(&mut bits, character).unwrap();
        }
        bits.flush();

        assert_eq!(VaricodeDecoder::new().decode(&mut bits), text);
    }

    #[test]
    fn test_decoder_drops_overlong_runs() {
        let mut decoder = VaricodeDecoder::new();
        for _ in 0..32 {
            assert_eq!(decoder.push_bit(1), None);
        }
        let mut bits = encode_text("ok").unwrap();
        // the ones before the first gap are garbage; the next codeword decodes
        let decoded = decoder.decode(&mut bits);
        assert!(decoded.ends_with('k'), "{:?}", decoded);
    }

    #[quickcheck]
    fn prop_ascii_text_survives_varicode(text: String) -> bool {
        let text: String = text.chars().filter(char::is_ascii).collect();
        let mut bits = encode_text(&text).unwrap();
        VaricodeDecoder::new().decode(&mut bits) == text
    }
}
