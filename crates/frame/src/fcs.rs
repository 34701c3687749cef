//! AX.25 frame check sequence (CRC-16/X.25, nibble-table driven)

const FCS_TABLE: [u16; 16] = [
    0x0000, 0x1081, 0x2102, 0x3183, 0x4204, 0x5285, 0x6306, 0x7387,
    0x8408, 0x9489, 0xa50a, 0xb58b, 0xc60c, 0xd68d, 0xe70e, 0xf78f,
];

/// Compute the ones-complemented CRC over `data`
///
/// On air the low byte goes first, see [`fcs_bytes`].
pub fn calculate_fcs(data: &[u8]) -> u16 {
    let crc = data.iter().fold(0xffffu16, |crc, &byte| {
        let crc = (crc >> 4) ^ FCS_TABLE[((crc ^ byte as u16) & 0x0f) as usize];
        (crc >> 4) ^ FCS_TABLE[((crc ^ (byte >> 4) as u16) & 0x0f) as usize]
    });
    !crc
}

/// Transmission order of an FCS value
pub fn fcs_bytes(fcs: u16) -> [u8; 2] {
    fcs.to_le_bytes()
}
