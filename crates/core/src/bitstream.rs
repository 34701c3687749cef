//! Ordered bit buffer shared by the modems and the AX.25 framer
//!
//! Bits are stored MSB-first in 32-bit words. Writes land in a word that is
//! only readable once it is full or once [`BitBuffer::flush`] commits it, so a
//! reader never observes a half-written word. Reads are destructive and walk
//! forward from the oldest committed bit.

use std::fmt;

const WORD_BITS: usize = 32;

/// Appendable, poppable sequence of bits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    words: Vec<u32>,
    written: usize,
    committed: usize,
    read_position: usize,
}

impl BitBuffer {
    /// Create an empty bit buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding every bit of `data`, already committed
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.add_bits(data, data.len() * 8);
        buffer.flush();
        buffer
    }

    /// Append `num_bits` bits read MSB-first from `data`
    ///
    /// Requests beyond the end of `data` are clamped to the available bits.
    pub fn add_bits(&mut self, data: &[u8], num_bits: usize) {
        let num_bits = num_bits.min(data.len() * 8);
        for i in 0..num_bits {
            let byte = data[i / 8];
            self.add_bit((byte >> (7 - (i % 8))) & 1 == 1);
        }
    }

    /// Append a single bit
    pub fn add_bit(&mut self, bit: bool) {
        let word_index = self.written / WORD_BITS;
        if word_index >= self.words.len() {
            self.words.push(0);
        }
        if bit {
            self.words[word_index] |= 1 << (WORD_BITS - 1 - self.written % WORD_BITS);
        }
        self.written += 1;
        if self.written % WORD_BITS == 0 {
            self.committed = self.written;
        }
    }

    pub fn add_one_bit(&mut self) {
        self.add_bit(true);
    }

    pub fn add_zero_bit(&mut self) {
        self.add_bit(false);
    }

    /// Append a full byte, MSB first
    pub fn add_byte(&mut self, byte: u8) {
        self.add_bits(&[byte], 8);
    }

    /// Append a full byte, LSB first (AX.25 transmission order)
    pub fn add_byte_lsb_first(&mut self, byte: u8) {
        self.add_byte(byte.reverse_bits());
    }

    /// Pad the partially written word and commit its bits
    ///
    /// Words are allocated zeroed and bits are written in place, so the
    /// partial word already holds its zero padding and flushing only moves
    /// the commit point. The padding is never counted or returned by a read,
    /// and later writes continue in the same word.
    pub fn flush(&mut self) {
        self.committed = self.written;
    }

    /// Remove and return the next bit, or `None` once the buffer is exhausted
    pub fn pop_next_bit(&mut self) -> Option<u8> {
        let bit = self.peek_next_bit()?;
        self.read_position += 1;
        Some(bit)
    }

    /// Return the next bit without consuming it
    pub fn peek_next_bit(&self) -> Option<u8> {
        if self.read_position >= self.committed {
            return None;
        }
        Some(self.bit_at(self.read_position))
    }

    /// Return the next eight bits as a byte without consuming them
    ///
    /// `None` when fewer than eight committed bits remain.
    pub fn peek_next_byte(&self) -> Option<u8> {
        if self.len() < 8 {
            return None;
        }
        Some((0..8).fold(0u8, |byte, offset| {
            (byte << 1) | self.bit_at(self.read_position + offset)
        }))
    }

    /// Remove and return the next eight bits as a byte
    pub fn pop_next_byte(&mut self) -> Option<u8> {
        let byte = self.peek_next_byte()?;
        self.read_position += 8;
        Some(byte)
    }

    /// Discard up to `count` bits from the front
    pub fn skip_bits(&mut self, count: usize) {
        self.read_position = (self.read_position + count).min(self.committed);
    }

    /// Number of committed bits not yet read
    pub fn len(&self) -> usize {
        self.committed - self.read_position
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bits ever written, committed or not
    pub fn total_bits(&self) -> usize {
        self.written
    }

    /// Bits written since the last commit
    pub fn pending_bits(&self) -> usize {
        self.written - self.committed
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Pack the remaining committed bits MSB-first, zero-padding the last byte
    pub fn to_bytes(&self) -> Vec<u8> {
        let remaining = self.len();
        let mut bytes = vec![0u8; remaining.div_ceil(8)];
        for i in 0..remaining {
            if self.bit_at(self.read_position + i) == 1 {
                bytes[i / 8] |= 1 << (7 - i % 8);
            }
        }
        bytes
    }

    /// Iterate over the remaining committed bits without consuming them
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (self.read_position..self.committed).map(move |position| self.bit_at(position))
    }

    fn bit_at(&self, position: usize) -> u8 {
        let word = self.words[position / WORD_BITS];
        ((word >> (WORD_BITS - 1 - position % WORD_BITS)) & 1) as u8
    }
}

impl fmt::Display for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bit) in self.iter().enumerate() {
            if i > 0 && i % 8 == 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", bit)?;
        }
        Ok(())
    }
}
