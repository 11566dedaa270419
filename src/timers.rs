#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tone {
    Start,
    Stop,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    pub(crate) delay: u8,
    pub(crate) sound: u8,
    // buzzer state as last reported to the host
    announced: bool,
}

impl Timers {
    #[must_use]
    pub fn delay(&self) -> u8 {
        self.delay
    }

    #[must_use]
    pub fn sound(&self) -> u8 {
        self.sound
    }

    // the buzzer sounds exactly while the sound timer is nonzero
    #[must_use]
    pub fn tone_active(&self) -> bool {
        self.sound > 0
    }

    /// One 60Hz period. Both counters stop at zero, and `Tone::Stop` comes
    /// back on the tick the sound timer reaches zero.
    pub fn tick(&mut self) -> Option<Tone> {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
        self.poll_tone()
    }

    /// Report the buzzer transition since the last report, if any. A sound
    /// timer that was set and ran out between two polls reports nothing.
    pub fn poll_tone(&mut self) -> Option<Tone> {
        match (self.announced, self.tone_active()) {
            (false, true) => {
                self.announced = true;
                Some(Tone::Start)
            }
            (true, false) => {
                self.announced = false;
                Some(Tone::Stop)
            }
            _ => None,
        }
    }
}
