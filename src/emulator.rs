use std::thread;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use log::info;

use schip8::profiles;
use schip8::Chip8;
use schip8::Options;
use schip8::Profile;
use schip8::StepOutcome;
use schip8::Target;
use schip8::Tone;

use crate::hardware::Hardware;
use crate::hardware::Input;
use crate::Action;

const TICK: Duration = Duration::from_millis(1_000 / 60);

pub(super) struct Emulator {
    profile: Profile,
    hardware: Hardware,
    chip8: Chip8,
    cycles_per_frame: u16,
}

impl Emulator {
    pub(super) fn new(
        scale: Option<u8>,
        target: Target,
        options: Options,
        cycles_per_frame: u16,
    ) -> Result<Self> {
        let profile: Profile = *profiles()
            .get(&target)
            .context("Unknown target architecture")?;

        let hardware = Hardware::new(scale.unwrap_or(profile.default_screen_scale()), profile)?;

        let chip8 = Chip8::new(target, options, Box::new(rand::rng()));

        Ok(Emulator {
            profile,
            hardware,
            chip8,
            cycles_per_frame,
        })
    }

    pub(super) fn process(&mut self, filename: &str) -> Result<()> {
        let size = self
            .chip8
            .load_file(filename)
            .with_context(|| format!("Unable to load {filename}"))?;
        info!("loaded {filename} ({size} bytes)");

        loop {
            // we always want a refresh after a frame, even if about to quit
            if matches!(self.run_frame()?, Some(Action::Quit))
                | matches!(self.refresh()?, Some(Action::Quit))
            {
                break;
            }
        }

        Ok(())
    }

    fn run_frame(&mut self) -> Result<Option<Action>> {
        let start = Instant::now();

        for _cycle in 0..self.cycles_per_frame {
            let outcome = self
                .chip8
                .step()
                .with_context(|| format!("Halted at {:#05X}", self.chip8.pc()))?;
            let tone = self.chip8.poll_tone();
            self.sound(tone)?;

            match outcome {
                StepOutcome::Executed { redraw: true }
                    if self.profile.lores_display_wait() && !self.chip8.extended_mode() =>
                {
                    break
                }
                StepOutcome::WaitingForKey => break,
                StepOutcome::Exited => return Ok(Some(Action::Quit)),
                StepOutcome::Executed { .. } | StepOutcome::Skipped { .. } => {}
            }

            if start.elapsed() >= TICK {
                break;
            }
        }

        let remaining = TICK.saturating_sub(start.elapsed());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }

        Ok(None)
    }

    fn sound(&mut self, tone: Option<Tone>) -> Result<()> {
        match tone {
            Some(Tone::Start) => self.hardware.sound_start(),
            Some(Tone::Stop) => self.hardware.sound_stop(),
            None => Ok(()),
        }
    }

    fn refresh(&mut self) -> Result<Option<Action>> {
        let tone = self.chip8.tick();
        self.sound(tone)?;

        if self.chip8.graphics_needs_refresh() {
            self.hardware
                .refresh_graphics(self.chip8.graphics(), self.chip8.resolution_scale())?;
            self.chip8.graphics_clear_refresh();
        }

        let mut action = None;
        for input in self.hardware.inputs() {
            match input {
                Input::Quit => action = Some(Action::Quit),
                Input::Key { key, down } => self.chip8.set_key(key, down),
            }
        }

        Ok(action)
    }
}
