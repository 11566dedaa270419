pub const KEY_COUNT: usize = 16;

/// Level state of the sixteen hexadecimal keys. Only the host writes it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keypad {
    keys: [bool; KEY_COUNT],
}

impl Keypad {
    // Keys are addressed by their low nibble.
    pub fn set(&mut self, key: u8, down: bool) {
        self.keys[usize::from(key & 0x0F)] = down;
    }

    #[must_use]
    pub fn is_pressed(&self, key: u8) -> bool {
        self.keys[usize::from(key & 0x0F)]
    }

    #[must_use]
    pub fn first_pressed(&self) -> Option<u8> {
        // position is in 0..16, so the cast is lossless
        self.keys.iter().position(|&k| k).map(|num| num as u8)
    }

    pub fn release_all(&mut self) {
        self.keys = [false; KEY_COUNT];
    }
}
