use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{Error, Result};
use sdl3::event::Event;
use sdl3::keyboard::Keycode;
use sdl3::pixels::Color;
use sdl3::render::{Canvas, FRect};
use sdl3::video::Window;
use sdl3::{EventPump, VideoSubsystem};

use schip8::{Framebuffer, Profile};

use crate::audio::Audio;

const WHITE: Color = Color::RGB(255, 255, 255);
const BLACK: Color = Color::RGB(0, 0, 0);

/// Host events the emulator cares about.
pub(super) enum Input {
    Quit,
    Key { key: u8, down: bool },
}

// maps SDL keycodes to keypad values
//   1 2 3 4      1 2 3 C
//   Q W E R  ->  4 5 6 D
//   A S D F      7 8 9 E
//   Z X C V      A 0 B F
fn key_mapping() -> &'static HashMap<Keycode, u8> {
    static LOCK: OnceLock<HashMap<Keycode, u8>> = OnceLock::new();
    LOCK.get_or_init(|| {
        HashMap::from([
            (Keycode::_1, 0x1),
            (Keycode::_2, 0x2),
            (Keycode::_3, 0x3),
            (Keycode::_4, 0xC),
            (Keycode::Q, 0x4),
            (Keycode::W, 0x5),
            (Keycode::E, 0x6),
            (Keycode::R, 0xD),
            (Keycode::A, 0x7),
            (Keycode::S, 0x8),
            (Keycode::D, 0x9),
            (Keycode::F, 0xE),
            (Keycode::Z, 0xA),
            (Keycode::X, 0x0),
            (Keycode::C, 0xB),
            (Keycode::V, 0xF),
        ])
    })
}

fn translate(event: &Event) -> Option<Input> {
    match event {
        Event::Quit { .. }
        | Event::KeyDown {
            keycode: Some(Keycode::Escape),
            ..
        } => Some(Input::Quit),
        Event::KeyDown {
            repeat: false,
            keycode: Some(code),
            ..
        } => key_mapping()
            .get(code)
            .map(|&key| Input::Key { key, down: true }),
        Event::KeyUp {
            repeat: false,
            keycode: Some(code),
            ..
        } => key_mapping()
            .get(code)
            .map(|&key| Input::Key { key, down: false }),
        _ => None,
    }
}

pub(super) struct Hardware {
    canvas: Canvas<Window>,
    scale: u8,
    audio: Audio,
    events: EventPump,
}

impl Hardware {
    pub(super) fn new(scale: u8, profile: Profile) -> Result<Self> {
        let sdl_context = sdl3::init()?;

        let video = sdl_context.video()?;

        Ok(Self {
            scale,
            canvas: Self::init_video(&video, scale, profile)?,
            audio: Audio::new(&sdl_context)?,
            events: sdl_context.event_pump()?,
        })
    }

    fn init_video(video_subsys: &VideoSubsystem, scale: u8, profile: Profile) -> Result<Canvas<Window>> {
        let window = video_subsys
            .window(
                "schip8",
                u32::from(profile.screen_width()) * u32::from(scale),
                u32::from(profile.screen_height()) * u32::from(scale),
            )
            .position_centered()
            .build()
            .map_err(Error::new)?;

        let mut canvas = window.into_canvas();

        canvas.set_draw_color(BLACK);
        canvas.clear();
        canvas.present();
        Ok(canvas)
    }

    /// Paint every lit pixel. `resolution_scale` enlarges low resolution
    /// frames to fill a window sized for the widest mode.
    pub(super) fn refresh_graphics(
        &mut self,
        gfx: &Framebuffer,
        resolution_scale: u8,
    ) -> Result<()> {
        let size = f32::from(self.scale) * f32::from(resolution_scale);
        let width = gfx.width();

        self.canvas.set_draw_color(BLACK);
        self.canvas.clear();
        self.canvas.set_draw_color(WHITE);

        for offset in gfx.pixels().iter_ones() {
            let (xline, yline) = (offset % width, offset / width);
            // coordinates are below 128, exact in f32
            let rect = FRect::new(xline as f32 * size, yline as f32 * size, size, size);
            self.canvas.fill_rect(rect)?;
        }
        self.canvas.present();

        Ok(())
    }

    pub(super) fn sound_start(&mut self) -> Result<()> {
        self.audio.play()
    }

    pub(super) fn sound_stop(&mut self) -> Result<()> {
        self.audio.pause()
    }

    pub(super) fn inputs(&mut self) -> impl Iterator<Item = Input> + '_ {
        self.events.poll_iter().filter_map(|event| translate(&event))
    }
}
