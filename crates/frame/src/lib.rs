//! packetmodem frame - AX.25 UI framing
//!
//! This crate provides AX.25 addresses, the CRC-16 frame check sequence,
//! HDLC flags and bit-stuffing, NRZI line coding, and UI frame assembly and
//! parsing on top of [`packetmodem_core::bitstream::BitBuffer`].

pub mod address;
pub mod fcs;
pub mod hdlc;
pub mod frame;
pub mod error;

pub use error::{FrameError, FrameRejection, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        address::Address,
        fcs::calculate_fcs,
        frame::{Frame, FrameBuilder},
        error::{FrameError, FrameRejection, Result},
    };
}
