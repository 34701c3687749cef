//! HDLC bit-level framing: flags, bit-stuffing and NRZI line coding

use packetmodem_core::bitstream::BitBuffer;

/// Frame delimiter, always sent unstuffed
pub const FLAG: u8 = 0x7E;

/// Consecutive ones after which a zero is forced into the stream
const MAX_CONSECUTIVE_ONES: u32 = 5;

/// Append `count` unstuffed flag bytes
pub fn add_flags(bits: &mut BitBuffer, count: usize) {
    for _ in 0..count {
        bits.add_byte(FLAG);
    }
}

/// Append `bytes` least-significant bit first with a zero inserted after
/// every run of five ones
///
/// Returns the number of stuffed zeros.
pub fn stuff_bytes(bits: &mut BitBuffer, bytes: &[u8]) -> usize {
    let mut ones = 0;
    let mut stuffed = 0;

    for &byte in bytes {
        for position in 0..8 {
            let bit = (byte >> position) & 1 == 1;
            bits.add_bit(bit);

            if bit {
                ones += 1;
                if ones == MAX_CONSECUTIVE_ONES {
                    bits.add_zero_bit();
                    stuffed += 1;
                    ones = 0;
                }
            } else {
                ones = 0;
            }
        }
    }

    stuffed
}

/// Read stuffed bits up to the closing flag and reassemble bytes
///
/// A zero after five ones is dropped; a sixth one marks the closing flag,
/// whose leading bits form an incomplete byte and are discarded. Returns
/// `None` if the stream runs out before a closing flag.
pub fn destuff(bits: &mut BitBuffer) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut ones = 0;
    let mut current = 0u8;
    let mut count = 0;

    loop {
        let bit = bits.pop_next_bit()?;

        if ones == MAX_CONSECUTIVE_ONES {
            if bit == 1 {
                return Some(bytes);
            }
            ones = 0;
            continue;
        }

        if bit == 1 {
            ones += 1;
        } else {
            ones = 0;
        }

        current |= bit << count;
        count += 1;
        if count == 8 {
            bytes.push(current);
            current = 0;
            count = 0;
        }
    }
}

/// NRZI-encode: a zero toggles the line level, a one keeps it
///
/// Consumes every committed bit of `input`. The line starts low.
pub fn nrzi_encode(input: &mut BitBuffer) -> BitBuffer {
    let mut output = BitBuffer::new();
    let mut level = false;
    while let Some(bit) = input.pop_next_bit() {
        if bit == 0 {
            level = !level;
        }
        output.add_bit(level);
    }
    output.flush();
    output
}

/// Inverse of [`nrzi_encode`]: an unchanged level is a one, a change a zero
pub fn nrzi_decode(input: &mut BitBuffer) -> BitBuffer {
    let mut output = BitBuffer::new();
    let mut previous = 0;
    while let Some(level) = input.pop_next_bit() {
        output.add_bit(level == previous);
        previous = level;
    }
    output.flush();
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(bits: &mut BitBuffer) -> Vec<u8> {
        std::iter::from_fn(|| bits.pop_next_bit()).collect()
    }

    #[test]
    fn test_stuffing_inserts_zero_after_five_ones() {
        let mut bits = BitBuffer::new();
        let stuffed = stuff_bytes(&mut bits, &[0xff]);
        bits.flush();

        assert_eq!(stuffed, 1);
        assert_eq!(collect(&mut bits), vec![1, 1, 1, 1, 1, 0, 1, 1, 1]);
    }

    #[test]
    fn test_stuffing_emits_lsb_first() {
        let mut bits = BitBuffer::new();
        stuff_bytes(&mut bits, &[0x01]);
        bits.flush();
        assert_eq!(collect(&mut bits), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_destuff_round_trip() {
        let payload = [0xff, 0x7e, 0x3f, 0x00, 0xf8, 0x1f];
        let mut bits = BitBuffer::new();
        stuff_bytes(&mut bits, &payload);
        add_flags(&mut bits, 1);
        bits.flush();

        assert_eq!(destuff(&mut bits), Some(payload.to_vec()));
    }

    #[test]
    fn test_destuff_without_closing_flag() {
        let mut bits = BitBuffer::new();
        stuff_bytes(&mut bits, &[0x12, 0x34]);
        bits.flush();
        assert_eq!(destuff(&mut bits), None);
    }

    #[test]
    fn test_nrzi_levels() {
        let mut bits = BitBuffer::new();
        bits.add_bits(&[0b1100_1010], 8);
        bits.flush();

        let mut encoded = nrzi_encode(&mut bits);
        // start low: 1 1 keep, 0 toggle, 0 toggle, 1 keep, 0 toggle, 1 keep, 0 toggle
        assert_eq!(encoded.to_bytes(), vec![0b0010_0110]);

        let mut decoded = nrzi_decode(&mut encoded);
        assert_eq!(decoded.pop_next_byte(), Some(0b1100_1010));
    }

    #[test]
    fn test_nrzi_is_polarity_independent() {
        let mut bits = BitBuffer::from_bytes(&[0x5a, 0xc3]);
        let encoded = nrzi_encode(&mut bits);

        let mut inverted = BitBuffer::new();
        for level in encoded.iter() {
            inverted.add_bit(level == 0);
        }
        inverted.flush();

        // only the very first bit depends on the assumed idle level
        let mut decoded = nrzi_decode(&mut inverted);
        decoded.skip_bits(1);
        let mut reference = BitBuffer::from_bytes(&[0x5a, 0xc3]);
        reference.skip_bits(1);
        assert_eq!(collect(&mut decoded), collect(&mut reference));
    }
}
