use std::collections::HashMap;
use std::sync::OnceLock;

/// The machine variant being emulated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Target {
    #[default]
    Chip8,
    SuperChip,
}

/// Fixed characteristics of a `Target`.
#[derive(Debug, Copy, Clone)]
pub struct Profile {
    screen_width: u8,
    screen_height: u8,
    lores_display_wait: bool,
    default_screen_scale: u8,
    memory_capacity: usize,
    superchip_opcodes: bool,
}

impl Profile {
    // Widest framebuffer the target can switch to.
    #[must_use]
    pub fn screen_width(self) -> u8 {
        self.screen_width
    }

    #[must_use]
    pub fn screen_height(self) -> u8 {
        self.screen_height
    }

    // Whether a host should end its cycle batch after a low resolution draw.
    #[must_use]
    pub fn lores_display_wait(self) -> bool {
        self.lores_display_wait
    }

    #[must_use]
    pub fn default_screen_scale(self) -> u8 {
        self.default_screen_scale
    }

    #[must_use]
    pub fn memory_capacity(self) -> usize {
        self.memory_capacity
    }

    // Scrolling, resolution switching, 16x16 sprites and RPL flags.
    #[must_use]
    pub fn superchip_opcodes(self) -> bool {
        self.superchip_opcodes
    }
}

#[must_use]
pub fn profiles() -> &'static HashMap<Target, Profile> {
    static LOCK: OnceLock<HashMap<Target, Profile>> = OnceLock::new();
    LOCK.get_or_init(|| {
        HashMap::from([
            (
                Target::Chip8,
                Profile {
                    screen_width: 64,
                    screen_height: 32,
                    lores_display_wait: true,
                    default_screen_scale: 12,
                    memory_capacity: 4_096,
                    superchip_opcodes: false,
                },
            ),
            (
                Target::SuperChip,
                Profile {
                    screen_width: 128,
                    screen_height: 64,
                    lores_display_wait: false,
                    default_screen_scale: 6,
                    memory_capacity: 4_096,
                    superchip_opcodes: true,
                },
            ),
        ])
    })
}

impl Target {
    #[must_use]
    pub fn profile(self) -> Profile {
        // every variant is registered above
        profiles()[&self]
    }
}
