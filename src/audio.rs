use anyhow::Error;
use anyhow::Result;
use sdl3::audio::AudioCallback;
use sdl3::audio::AudioSpec;
use sdl3::audio::AudioStreamWithCallback;
use sdl3::AudioSubsystem;

const SAMPLE_RATE: i32 = 44_100;
const TONE_HZ: f32 = 440.0;
const VOLUME: f32 = 0.25;

#[must_use]
struct SquareWave {
    phase_inc: f32,
    phase: f32,
    volume: f32,
}

impl SquareWave {
    fn new(pitch: f32, volume: f32) -> Self {
        Self {
            // sample rate is exactly representable
            phase_inc: pitch / SAMPLE_RATE as f32,
            phase: 0.0,
            volume,
        }
    }
}

impl AudioCallback<f32> for SquareWave {
    fn callback(&mut self, out: &mut [f32]) {
        for x in out.iter_mut() {
            *x = if self.phase <= 0.5 {
                self.volume
            } else {
                -self.volume
            };
            self.phase = (self.phase + self.phase_inc) % 1.0;
        }
    }
}

/// The buzzer: a paused square wave stream resumed while the tone is on.
#[must_use]
pub(super) struct Audio {
    _audio_subsystem: AudioSubsystem, // must outlive the stream
    stream: AudioStreamWithCallback<SquareWave>,
    is_playing: bool,
}

impl Audio {
    pub(super) fn new(context: &sdl3::Sdl) -> Result<Self> {
        let audio_subsystem = context.audio()?;

        let desired_spec = AudioSpec {
            freq: Some(SAMPLE_RATE),
            channels: Some(1), // mono
            format: Some(sdl3::audio::AudioFormat::F32LE),
        };

        let stream = audio_subsystem
            .open_playback_stream(&desired_spec, SquareWave::new(TONE_HZ, VOLUME))
            .map_err(Error::msg)?;

        Ok(Audio {
            _audio_subsystem: audio_subsystem,
            stream,
            is_playing: false,
        })
    }

    pub(super) fn play(&mut self) -> Result<()> {
        if !self.is_playing {
            self.stream.resume()?;
            self.is_playing = true;
        }
        Ok(())
    }

    pub(super) fn pause(&mut self) -> Result<()> {
        if self.is_playing {
            self.stream.pause()?;
            self.is_playing = false;
        }
        Ok(())
    }
}
