//! CHIP-8 and SuperChip interpreter core.
//!
//! The host owns a [`Chip8`], loads a ROM into it, then calls
//! [`Chip8::step`] as often as it likes and [`Chip8::tick`] at 60Hz. Between
//! steps it renders [`Chip8::graphics`] when dirty and feeds key state in with
//! [`Chip8::set_key`].

pub mod chip8;
pub mod decode;
pub mod display;
pub mod error;
pub mod font;
pub mod keypad;
pub mod profile;
pub mod timers;

pub use crate::chip8::{Chip8, Options, StepOutcome, UnknownOpcodePolicy};
pub use crate::display::Framebuffer;
pub use crate::error::{EngineError, LoadError};
pub use crate::keypad::Keypad;
pub use crate::profile::{profiles, Profile, Target};
pub use crate::timers::Tone;
