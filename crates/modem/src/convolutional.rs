//! QPSK convolutional phase coding
//!
//! The last five data bits index a fixed table of phase shifts; the carrier
//! phase is the running sum of those shifts.

use serde::{Deserialize, Serialize};

/// Carrier phase, in quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Zero,
    Ninety,
    OneEighty,
    TwoSeventy,
}

impl Phase {
    fn quarter_turns(self) -> u8 {
        match self {
            Phase::Zero => 0,
            Phase::Ninety => 1,
            Phase::OneEighty => 2,
            Phase::TwoSeventy => 3,
        }
    }

    fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Phase::Zero,
            1 => Phase::Ninety,
            2 => Phase::OneEighty,
            _ => Phase::TwoSeventy,
        }
    }

    /// Phase angle in radians
    pub fn radians(self) -> f64 {
        self.quarter_turns() as f64 * std::f64::consts::FRAC_PI_2
    }

    /// 0 <-> 180, the BPSK reversal
    pub fn reversed(self) -> Self {
        self.shifted(Shift::Pi)
    }

    pub fn shifted(self, shift: Shift) -> Self {
        let turns = match shift {
            Shift::Zero => 0,
            Shift::PiOverTwo => 1,
            Shift::Pi => 2,
            Shift::MinusPiOverTwo => 3,
        };
        Self::from_quarter_turns(self.quarter_turns() + turns)
    }
}

/// Phase change applied between two symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Zero,
    PiOverTwo,
    MinusPiOverTwo,
    Pi,
}

/// Shift for each 5-bit register value, oldest bit most significant
const CONVOLUTIONAL_CODE: [Shift; 32] = {
    use Shift::*;
    [
        Pi, PiOverTwo, MinusPiOverTwo, Zero, MinusPiOverTwo, Zero, Pi, PiOverTwo,
        Zero, MinusPiOverTwo, PiOverTwo, Pi, PiOverTwo, Pi, Zero, MinusPiOverTwo,
        PiOverTwo, Pi, Zero, MinusPiOverTwo, Zero, MinusPiOverTwo, PiOverTwo, Pi,
        MinusPiOverTwo, Zero, Pi, PiOverTwo, Pi, PiOverTwo, MinusPiOverTwo, Zero,
    ]
};

pub const REGISTER_MASK: u8 = 0b1_1111;

pub fn shift_for(register: u8) -> Shift {
    CONVOLUTIONAL_CODE[(register & REGISTER_MASK) as usize]
}

/// Phase reached from `current` through the shift selected by `register`
pub fn shifted_phase(register: u8, current: Phase) -> Phase {
    current.shifted(shift_for(register))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_corners() {
        assert_eq!(shift_for(0b00000), Shift::Pi);
        assert_eq!(shift_for(0b00011), Shift::Zero);
        assert_eq!(shift_for(0b10000), Shift::PiOverTwo);
        assert_eq!(shift_for(0b11110), Shift::MinusPiOverTwo);
        assert_eq!(shift_for(0b11111), Shift::Zero);
        // only the low five bits count
        assert_eq!(shift_for(0b1110_0011), Shift::Zero);
    }

    #[test]
    fn test_phase_arithmetic() {
        assert_eq!(Phase::Zero.shifted(Shift::PiOverTwo), Phase::Ninety);
        assert_eq!(Phase::Zero.shifted(Shift::MinusPiOverTwo), Phase::TwoSeventy);
        assert_eq!(Phase::TwoSeventy.shifted(Shift::PiOverTwo), Phase::Zero);
        assert_eq!(Phase::Ninety.shifted(Shift::Pi), Phase::TwoSeventy);
        assert_eq!(Phase::OneEighty.reversed(), Phase::Zero);
        assert_eq!(Phase::OneEighty.shifted(Shift::Zero), Phase::OneEighty);
        assert!((Phase::TwoSeventy.radians() - 3.0 * std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_idle_register_keeps_reversing() {
        // an all-zero register is the QPSK idle: a reversal every symbol
        let mut phase = Phase::Zero;
        for _ in 0..4 {
            let next = shifted_phase(0, phase);
            assert_eq!(next, phase.reversed());
            phase = next;
        }
    }
}
