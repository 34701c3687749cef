//! APRS base-91 integers
//!
//! Digits are the printable characters `!` (0) through `{` (90), most
//! significant first.

use crate::{CodecError, Result};

pub const BASE: u32 = 91;

/// Character of digit zero
const DIGIT_OFFSET: u8 = 33;

/// Encode `value` as exactly `width` base-91 digits
pub fn encode(value: u32, width: usize) -> Result<Vec<u8>> {
    let limit = u32::try_from(width)
        .ok()
        .and_then(|w| BASE.checked_pow(w));
    if let Some(limit) = limit {
        if value >= limit {
            return Err(CodecError::Base91Overflow { value, width });
        }
    }

    let mut digits = vec![DIGIT_OFFSET; width];
    let mut remaining = value;
    for digit in digits.iter_mut().rev() {
        *digit += (remaining % BASE) as u8;
        remaining /= BASE;
    }
    Ok(digits)
}

/// Decode base-91 digits; `None` on an empty input, a character outside the
/// alphabet or overflow
pub fn decode(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u32, |value, &c| {
        let digit = c.checked_sub(DIGIT_OFFSET).filter(|&d| (d as u32) < BASE)?;
        value.checked_mul(BASE)?.checked_add(digit as u32)
    })
}
