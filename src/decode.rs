//! Field extraction for 16-bit instruction words.
//!
//! ```text
//!  15..12  11..8  7..4  3..0
//!  family    x     y     n
//!          |--------nnn-----|
//!                |----kk----|
//! ```

/// Low 12 bits, an absolute address.
#[must_use]
pub fn address(o: u16) -> u16 {
    o & 0x0FFF
}

/// Low byte, an 8-bit immediate.
#[must_use]
pub fn opcode_value(o: u16) -> u8 {
    (o & 0x00FF) as u8
}

/// Low nibble, a 4-bit immediate.
#[must_use]
pub fn nibble(o: u16) -> u8 {
    (o & 0x000F) as u8
}

#[must_use]
pub fn register_x(o: u16) -> usize {
    usize::from((o & 0x0F00) >> 8)
}

#[must_use]
pub fn register_y(o: u16) -> usize {
    usize::from((o & 0x00F0) >> 4)
}

#[must_use]
pub fn register_xy(o: u16) -> (usize, usize) {
    (register_x(o), register_y(o))
}
