use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use log::{debug, trace, warn};
use rand::{Rng, RngCore};

use crate::decode::{address, nibble, opcode_value, register_x, register_xy, register_y};
use crate::display::Framebuffer;
use crate::error::{EngineError, LoadError};
use crate::font::{FONTSET, FONT_ADDR, FONT_GLYPH_SIZE};
use crate::font::{HIRES_FONTSET, HIRES_FONT_ADDR, HIRES_FONT_GLYPH_SIZE};
use crate::keypad::Keypad;
use crate::profile::{Profile, Target};
use crate::timers::{Timers, Tone};

pub const PROGRAM_START: u16 = 0x200;
pub const STACK_DEPTH: usize = 16;
pub const RPL_FLAG_COUNT: usize = 16;

pub const LORES_WIDTH: usize = 64;
pub const LORES_HEIGHT: usize = 32;

const FLAG: usize = 0xF;
const SCROLL_COLUMNS: usize = 4;

/// What `step` does with a word no handler claims.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UnknownOpcodePolicy {
    /// Fail the step with `EngineError::UnknownOpcode`.
    #[default]
    Halt,
    /// Log a warning and move on to the next instruction.
    Skip,
}

/// Behaviour toggles for the historically ambiguous opcodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Options {
    /// `FX55`/`FX65` leave I pointing past the transferred block.
    pub compatibility_mode: bool,
    /// `8XY6`/`8XYE` shift VY into VX instead of shifting VX in place.
    pub shift_reads_vy: bool,
    pub unknown_opcode: UnknownOpcodePolicy,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction ran. `redraw` is set when it touched the framebuffer.
    Executed { redraw: bool },
    /// `FX0A` found no key held. Nothing changed, the same instruction runs
    /// again on the next step.
    WaitingForKey,
    /// An unrecognised word was passed over under `UnknownOpcodePolicy::Skip`.
    Skipped { opcode: u16, address: u16 },
    /// The program executed `00FD`.
    Exited,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Advance {
    Next,
    Skip,
    Jump(u16),
    Hold,
    Exit,
}

fn skip_if(condition: bool) -> Advance {
    if condition {
        Advance::Skip
    } else {
        Advance::Next
    }
}

pub struct Chip8 {
    target: Target,
    profile: Profile,
    options: Options,

    v: [u8; 16], // registers

    i: u16, // index, not masked to 12 bits after FX1E

    pc: u16,

    // 0x000-0x04F - 4x5 font
    // 0x050-0x0EF - 8x10 SuperChip font
    // 0x200-0xFFF - program ROM and work RAM
    memory: Box<[u8]>,

    stack: [u16; STACK_DEPTH],
    sp: usize,

    timers: Timers,
    keypad: Keypad,
    gfx: Framebuffer,

    compatibility_mode: bool,
    hires: bool,

    // survives `init`
    rpl: [u8; RPL_FLAG_COUNT],

    // set by handlers that modify the framebuffer during the current step
    drew: bool,

    rng: Box<dyn RngCore>,
}

impl Chip8 {
    #[must_use]
    pub fn new(target: Target, options: Options, rng: Box<dyn RngCore>) -> Self {
        let profile = target.profile();
        let mut chip8 = Self {
            target,
            profile,
            options,
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
            memory: vec![0; profile.memory_capacity()].into_boxed_slice(),
            stack: [0; STACK_DEPTH],
            sp: 0,
            timers: Timers::default(),
            keypad: Keypad::default(),
            gfx: Framebuffer::new(LORES_WIDTH, LORES_HEIGHT),
            compatibility_mode: options.compatibility_mode,
            hires: false,
            rpl: [0; RPL_FLAG_COUNT],
            drew: false,
            rng,
        };
        chip8.init();
        chip8
    }

    /// Reset to power-on state: zeroed memory with fonts, PC at 0x200, empty
    /// stack, low resolution. RPL flags are kept.
    pub fn init(&mut self) {
        self.memory.fill(0);
        let small = usize::from(FONT_ADDR);
        self.memory[small..small + FONTSET.len()].copy_from_slice(&FONTSET);
        let large = usize::from(HIRES_FONT_ADDR);
        self.memory[large..large + HIRES_FONTSET.len()].copy_from_slice(&HIRES_FONTSET);

        self.v = [0; 16];
        self.i = 0;
        self.pc = PROGRAM_START;
        self.stack = [0; STACK_DEPTH];
        self.sp = 0;
        self.timers.delay = 0;
        self.timers.sound = 0;
        self.keypad.release_all();
        self.gfx = Framebuffer::new(LORES_WIDTH, LORES_HEIGHT);
        self.compatibility_mode = self.options.compatibility_mode;
        self.hires = false;
        self.drew = false;

        debug!("reset {:?} machine", self.target);
    }

    #[must_use]
    pub fn program_capacity(&self) -> usize {
        self.memory.len() - usize::from(PROGRAM_START)
    }

    /// Copy a ROM image to 0x200. Oversized images are rejected whole.
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<usize, LoadError> {
        let capacity = self.program_capacity();
        if rom_data.len() > capacity {
            return Err(LoadError::TooLarge {
                size: rom_data.len(),
                capacity,
            });
        }

        let start = usize::from(PROGRAM_START);
        self.memory[start..start + rom_data.len()].copy_from_slice(rom_data);
        debug!("loaded {} byte ROM", rom_data.len());

        Ok(rom_data.len())
    }

    pub fn load_from(&mut self, mut reader: impl Read) -> Result<usize, LoadError> {
        let mut rom_data = Vec::new();
        reader.read_to_end(&mut rom_data)?;
        self.load_rom(&rom_data)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, LoadError> {
        self.load_from(File::open(path)?)
    }

    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    #[must_use]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    #[must_use]
    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    #[must_use]
    pub fn index(&self) -> u16 {
        self.i
    }

    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.sp
    }

    #[must_use]
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    #[must_use]
    pub fn rpl_flags(&self) -> &[u8; RPL_FLAG_COUNT] {
        &self.rpl
    }

    #[must_use]
    pub fn delay_timer(&self) -> u8 {
        self.timers.delay()
    }

    #[must_use]
    pub fn sound_timer(&self) -> u8 {
        self.timers.sound()
    }

    #[must_use]
    pub fn tone_active(&self) -> bool {
        self.timers.tone_active()
    }

    #[must_use]
    pub fn graphics(&self) -> &Framebuffer {
        &self.gfx
    }

    #[must_use]
    pub fn graphics_needs_refresh(&self) -> bool {
        self.gfx.is_dirty()
    }

    pub fn graphics_clear_refresh(&mut self) {
        self.gfx.clear_dirty();
    }

    /// How many host pixels wide one framebuffer pixel is, relative to the
    /// largest resolution of the target.
    #[must_use]
    pub fn resolution_scale(&self) -> u8 {
        // profile widths are at most 128, so the ratio fits
        (usize::from(self.profile.screen_width()) / self.gfx.width()) as u8
    }

    #[must_use]
    pub fn compatibility_mode(&self) -> bool {
        self.compatibility_mode
    }

    pub fn set_compatibility_mode(&mut self, enabled: bool) {
        self.compatibility_mode = enabled;
    }

    #[must_use]
    pub fn extended_mode(&self) -> bool {
        self.hires
    }

    /// Switch display resolution. Targets without SuperChip support stay at
    /// 64x32.
    pub fn set_extended_mode(&mut self, enabled: bool) {
        if !self.profile.superchip_opcodes() {
            debug!("{:?} has no extended display mode", self.target);
            return;
        }

        self.hires = enabled;
        if enabled {
            self.gfx.resize(
                usize::from(self.profile.screen_width()),
                usize::from(self.profile.screen_height()),
            );
        } else {
            self.gfx.resize(LORES_WIDTH, LORES_HEIGHT);
        }
        debug!("display now {}x{}", self.gfx.width(), self.gfx.height());
    }

    pub fn set_key(&mut self, key: u8, down: bool) {
        self.keypad.set(key, down);
    }

    pub fn press_key(&mut self, key: u8) {
        self.keypad.set(key, true);
    }

    pub fn release_key(&mut self, key: u8) {
        self.keypad.set(key, false);
    }

    #[must_use]
    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    /// One 60Hz timer period. Returns `Tone::Stop` on the tick the sound
    /// timer runs out.
    pub fn tick(&mut self) -> Option<Tone> {
        self.timers.tick()
    }

    /// Buzzer transition caused by the steps since the last poll or tick,
    /// such as `FX18` loading the sound timer.
    pub fn poll_tone(&mut self) -> Option<Tone> {
        self.timers.poll_tone()
    }

    /// Fetch, decode and execute the instruction at PC.
    pub fn step(&mut self) -> Result<StepOutcome, EngineError> {
        let address = self.pc;
        let opcode = self.fetch(address)?;
        trace!("{address:#05X}: {opcode:04X}");

        self.drew = false;

        let advance = match self.execute(opcode) {
            Ok(advance) => advance,
            Err(EngineError::UnknownOpcode { opcode, address })
                if self.options.unknown_opcode == UnknownOpcodePolicy::Skip =>
            {
                warn!("skipping unknown opcode {opcode:04X} at {address:#05X}");
                self.pc = self.pc.wrapping_add(2);
                return Ok(StepOutcome::Skipped { opcode, address });
            }
            Err(err) => return Err(err),
        };

        match advance {
            Advance::Next => self.pc = self.pc.wrapping_add(2),
            Advance::Skip => self.pc = self.pc.wrapping_add(4),
            Advance::Jump(target) => self.pc = target,
            Advance::Hold => return Ok(StepOutcome::WaitingForKey),
            Advance::Exit => return Ok(StepOutcome::Exited),
        }

        Ok(StepOutcome::Executed { redraw: self.drew })
    }

    fn fetch(&self, address: u16) -> Result<u16, EngineError> {
        let a = usize::from(address);
        match self.memory.get(a..a + 2) {
            Some(&[high, low]) => Ok(u16::from_be_bytes([high, low])),
            _ => Err(EngineError::AddressOutOfRange { address: a + 1 }),
        }
    }

    fn execute(&mut self, opcode: u16) -> Result<Advance, EngineError> {
        let superchip = self.profile.superchip_opcodes();

        Ok(match opcode {
            0x00E0 => self.c8_display_clear(),
            0x00EE => self.c8_flow_return()?,
            0x00FA => self.emu_compatibility_on(),

            o if superchip && o & 0xFFF0 == 0x00C0 => self.sc_scroll_down(o),
            0x00FB if superchip => self.sc_scroll_right(),
            0x00FC if superchip => self.sc_scroll_left(),
            0x00FD if superchip => Advance::Exit,
            0x00FE if superchip => self.sc_resolution(false),
            0x00FF if superchip => self.sc_resolution(true),

            o if o & 0xF000 == 0x1000 => Advance::Jump(address(o)),
            o if o & 0xF000 == 0x2000 => self.c8_flow_gosub(o)?,

            o if o & 0xF000 == 0x3000 => self.c8_cond_skip_eq_num(o),
            o if o & 0xF000 == 0x4000 => self.c8_cond_skip_neq_num(o),
            o if o & 0xF00F == 0x5000 => self.c8_cond_skip_eq_reg(o),

            o if o & 0xF000 == 0x6000 => self.c8_const_set_num(o),
            o if o & 0xF000 == 0x7000 => self.c8_const_add_num(o),

            o if o & 0xF00F == 0x8000 => self.c8_assign_set_reg(o),
            o if o & 0xF00F == 0x8001 => self.c8_bitop_or_reg(o),
            o if o & 0xF00F == 0x8002 => self.c8_bitop_and_reg(o),
            o if o & 0xF00F == 0x8003 => self.c8_bitop_xor_reg(o),
            o if o & 0xF00F == 0x8004 => self.c8_math_add_reg(o),
            o if o & 0xF00F == 0x8005 => self.c8_math_sub_reg(o),
            o if o & 0xF00F == 0x8006 => self.c8_bitop_shr_reg(o),
            o if o & 0xF00F == 0x8007 => self.c8_math_neg_reg(o),
            o if o & 0xF00F == 0x800E => self.c8_bitop_shl_reg(o),

            o if o & 0xF00F == 0x9000 => self.c8_cond_skip_neq_reg(o),
            o if o & 0xF000 == 0xA000 => self.c8_mem_store(o),
            o if o & 0xF000 == 0xB000 => self.c8_flow_jump(o),
            o if o & 0xF000 == 0xC000 => self.c8_rand_and_reg(o),

            o if superchip && o & 0xF00F == 0xD000 => self.sc_draw_large_sprite(o)?,
            o if o & 0xF000 == 0xD000 => self.c8_draw_sprite(o)?,

            o if o & 0xF0FF == 0xE09E => self.c8_key_pressed_skip(o),
            o if o & 0xF0FF == 0xE0A1 => self.c8_key_not_pressed_skip(o),

            o if o & 0xF0FF == 0xF007 => self.c8_timer_delay_store(o),
            o if o & 0xF0FF == 0xF00A => self.c8_key_wait(o),
            o if o & 0xF0FF == 0xF015 => self.c8_timer_delay_set(o),
            o if o & 0xF0FF == 0xF018 => self.c8_timer_sound_set(o),
            o if o & 0xF0FF == 0xF01E => self.c8_mem_addi(o),
            o if o & 0xF0FF == 0xF029 => self.c8_mem_spriteaddr(o),
            o if superchip && o & 0xF0FF == 0xF030 => self.sc_mem_large_spriteaddr(o),
            o if o & 0xF0FF == 0xF033 => self.c8_bcd_store(o)?,
            o if o & 0xF0FF == 0xF055 => self.c8_mem_reg_dump(o)?,
            o if o & 0xF0FF == 0xF065 => self.c8_mem_reg_load(o)?,
            o if superchip && o & 0xF0FF == 0xF075 => self.sc_rpl_save(o),
            o if superchip && o & 0xF0FF == 0xF085 => self.sc_rpl_restore(o),

            o => {
                return Err(EngineError::UnknownOpcode {
                    opcode: o,
                    address: self.pc,
                })
            }
        })
    }

    // Range of `len` bytes starting at I, if it lies inside memory.
    fn index_span(&self, len: usize) -> Result<Range<usize>, EngineError> {
        let start = usize::from(self.i);
        let end = start + len;
        if end > self.memory.len() {
            return Err(EngineError::AddressOutOfRange { address: end - 1 });
        }
        Ok(start..end)
    }

    fn c8_display_clear(&mut self) -> Advance {
        // 00E0 - clear the screen
        self.gfx.clear();
        self.drew = true;
        Advance::Next
    }

    fn c8_flow_return(&mut self) -> Result<Advance, EngineError> {
        // 00EE - return from a subroutine
        if self.sp == 0 {
            return Err(EngineError::StackUnderflow { address: self.pc });
        }
        self.sp -= 1;
        Ok(Advance::Jump(self.stack[self.sp].wrapping_add(2)))
    }

    fn emu_compatibility_on(&mut self) -> Advance {
        // 00FA - emulator extension, FX55/FX65 advance I from now on
        self.compatibility_mode = true;
        debug!("compatibility mode enabled by program");
        Advance::Next
    }

    fn c8_flow_gosub(&mut self, o: u16) -> Result<Advance, EngineError> {
        // 2NNN - subroutine
        if self.sp == STACK_DEPTH {
            return Err(EngineError::StackOverflow { address: self.pc });
        }
        self.stack[self.sp] = self.pc;
        self.sp += 1;
        Ok(Advance::Jump(address(o)))
    }

    fn c8_cond_skip_eq_num(&mut self, o: u16) -> Advance {
        // 3XNN - Skip the following instruction if the value of register VX equals NN
        skip_if(self.v[register_x(o)] == opcode_value(o))
    }

    fn c8_cond_skip_neq_num(&mut self, o: u16) -> Advance {
        // 4XNN - Skip the following instruction if the value of register VX is not equal to NN
        skip_if(self.v[register_x(o)] != opcode_value(o))
    }

    fn c8_cond_skip_eq_reg(&mut self, o: u16) -> Advance {
        // 5XY0 - Skip the following instruction if VX equals VY
        let (reg_x, reg_y) = register_xy(o);
        skip_if(self.v[reg_x] == self.v[reg_y])
    }

    fn c8_const_set_num(&mut self, o: u16) -> Advance {
        // 6XNN - store NN in register X
        self.v[register_x(o)] = opcode_value(o);
        Advance::Next
    }

    fn c8_const_add_num(&mut self, o: u16) -> Advance {
        // 7XNN - Add the value NN to register VX (carry flag is not changed)
        let reg = register_x(o);
        self.v[reg] = self.v[reg].wrapping_add(opcode_value(o));
        Advance::Next
    }

    fn c8_assign_set_reg(&mut self, o: u16) -> Advance {
        // 8XY0
        let (reg_x, reg_y) = register_xy(o);
        self.v[reg_x] = self.v[reg_y];
        Advance::Next
    }

    fn c8_bitop_or_reg(&mut self, o: u16) -> Advance {
        // 8XY1
        let (reg_x, reg_y) = register_xy(o);
        self.v[reg_x] |= self.v[reg_y];
        Advance::Next
    }

    fn c8_bitop_and_reg(&mut self, o: u16) -> Advance {
        // 8XY2
        let (reg_x, reg_y) = register_xy(o);
        self.v[reg_x] &= self.v[reg_y];
        Advance::Next
    }

    fn c8_bitop_xor_reg(&mut self, o: u16) -> Advance {
        // 8XY3
        let (reg_x, reg_y) = register_xy(o);
        self.v[reg_x] ^= self.v[reg_y];
        Advance::Next
    }

    fn c8_math_add_reg(&mut self, o: u16) -> Advance {
        // 8XY4 - VX += VY, VF = 1 on carry
        let (reg_x, reg_y) = register_xy(o);

        let (result, carry) = self.v[reg_x].overflowing_add(self.v[reg_y]);
        self.v[reg_x] = result;
        self.v[FLAG] = u8::from(carry);
        Advance::Next
    }

    fn c8_math_sub_reg(&mut self, o: u16) -> Advance {
        // 8XY5 - VX -= VY, VF = 1 if no borrow
        let (reg_x, reg_y) = register_xy(o);

        let (result, borrow) = self.v[reg_x].overflowing_sub(self.v[reg_y]);
        self.v[reg_x] = result;
        self.v[FLAG] = u8::from(!borrow);
        Advance::Next
    }

    fn shift_source(&self, o: u16) -> u8 {
        if self.options.shift_reads_vy {
            self.v[register_y(o)]
        } else {
            self.v[register_x(o)]
        }
    }

    fn c8_bitop_shr_reg(&mut self, o: u16) -> Advance {
        // 8XY6 - VF takes the bit shifted out
        let val = self.shift_source(o);
        self.v[register_x(o)] = val >> 1;
        self.v[FLAG] = val & 0x01;
        Advance::Next
    }

    fn c8_math_neg_reg(&mut self, o: u16) -> Advance {
        // 8XY7 - VX = VY - VX, VF = 1 if no borrow
        let (reg_x, reg_y) = register_xy(o);

        let (result, borrow) = self.v[reg_y].overflowing_sub(self.v[reg_x]);
        self.v[reg_x] = result;
        self.v[FLAG] = u8::from(!borrow);
        Advance::Next
    }

    fn c8_bitop_shl_reg(&mut self, o: u16) -> Advance {
        // 8XYE
        let val = self.shift_source(o);
        self.v[register_x(o)] = val << 1;
        self.v[FLAG] = val >> 7;
        Advance::Next
    }

    fn c8_cond_skip_neq_reg(&mut self, o: u16) -> Advance {
        // 9XY0
        let (reg_x, reg_y) = register_xy(o);
        skip_if(self.v[reg_x] != self.v[reg_y])
    }

    fn c8_mem_store(&mut self, o: u16) -> Advance {
        // ANNN - store NNN in I
        self.i = address(o);
        Advance::Next
    }

    fn c8_flow_jump(&mut self, o: u16) -> Advance {
        // BNNN - goto NNN + V0
        Advance::Jump(address(o) + u16::from(self.v[0]))
    }

    fn c8_rand_and_reg(&mut self, o: u16) -> Advance {
        // CXNN - VX = random byte & NN
        self.v[register_x(o)] = self.rng.random::<u8>() & opcode_value(o);
        Advance::Next
    }

    fn draw(
        &mut self,
        reg_x: usize,
        reg_y: usize,
        rows: usize,
        bytes_per_row: usize,
    ) -> Result<Advance, EngineError> {
        let sprite = self.index_span(rows * bytes_per_row)?;
        let x = usize::from(self.v[reg_x]);
        let y = usize::from(self.v[reg_y]);

        let collision = self
            .gfx
            .draw_sprite(x, y, &self.memory[sprite], bytes_per_row);
        self.v[FLAG] = u8::from(collision);
        self.drew = true;
        Ok(Advance::Next)
    }

    fn c8_draw_sprite(&mut self, o: u16) -> Result<Advance, EngineError> {
        // DXYN - Draw a sprite at position VX, VY with N bytes of sprite data starting at I
        // Set VF to 01 if any set pixels are changed to unset, and 00 otherwise
        let (reg_x, reg_y) = register_xy(o);
        self.draw(reg_x, reg_y, usize::from(nibble(o)), 1)
    }

    fn sc_draw_large_sprite(&mut self, o: u16) -> Result<Advance, EngineError> {
        // DXY0 - 16x16 sprite in extended mode, 8x16 otherwise
        let (reg_x, reg_y) = register_xy(o);
        let bytes_per_row = if self.hires { 2 } else { 1 };
        self.draw(reg_x, reg_y, 16, bytes_per_row)
    }

    fn sc_scroll_down(&mut self, o: u16) -> Advance {
        // 00CN
        self.gfx.scroll_down(usize::from(nibble(o)));
        self.drew = true;
        Advance::Next
    }

    fn sc_scroll_right(&mut self) -> Advance {
        // 00FB
        self.gfx.scroll_right(SCROLL_COLUMNS);
        self.drew = true;
        Advance::Next
    }

    fn sc_scroll_left(&mut self) -> Advance {
        // 00FC
        self.gfx.scroll_left(SCROLL_COLUMNS);
        self.drew = true;
        Advance::Next
    }

    fn sc_resolution(&mut self, hires: bool) -> Advance {
        // 00FE / 00FF
        self.set_extended_mode(hires);
        self.drew = true;
        Advance::Next
    }

    fn c8_key_pressed_skip(&mut self, o: u16) -> Advance {
        // EX9E - Skip the following instruction if the key in VX is pressed
        skip_if(self.keypad.is_pressed(self.v[register_x(o)]))
    }

    fn c8_key_not_pressed_skip(&mut self, o: u16) -> Advance {
        // EXA1 - Skip the following instruction if the key in VX is not pressed
        skip_if(!self.keypad.is_pressed(self.v[register_x(o)]))
    }

    fn c8_key_wait(&mut self, o: u16) -> Advance {
        // FX0A - Wait for a keypress and store the result in register VX
        match self.keypad.first_pressed() {
            Some(key) => {
                self.v[register_x(o)] = key;
                Advance::Next
            }
            None => Advance::Hold,
        }
    }

    fn c8_timer_delay_store(&mut self, o: u16) -> Advance {
        // FX07
        self.v[register_x(o)] = self.timers.delay;
        Advance::Next
    }

    fn c8_timer_delay_set(&mut self, o: u16) -> Advance {
        // FX15
        self.timers.delay = self.v[register_x(o)];
        Advance::Next
    }

    fn c8_timer_sound_set(&mut self, o: u16) -> Advance {
        // FX18
        self.timers.sound = self.v[register_x(o)];
        Advance::Next
    }

    fn c8_mem_addi(&mut self, o: u16) -> Advance {
        // FX1E - I += VX, VF = 1 if the sum leaves the 12-bit address space
        let sum = u32::from(self.i) + u32::from(self.v[register_x(o)]);

        // kept unmasked, memory accesses past the end are caught by index_span
        self.i = sum as u16;
        self.v[FLAG] = u8::from(sum > 0xFFF);
        Advance::Next
    }

    fn c8_mem_spriteaddr(&mut self, o: u16) -> Advance {
        // FX29 - I = address of the 4x5 glyph for VX
        self.i = FONT_ADDR + u16::from(self.v[register_x(o)]) * FONT_GLYPH_SIZE;
        Advance::Next
    }

    fn sc_mem_large_spriteaddr(&mut self, o: u16) -> Advance {
        // FX30 - I = address of the 8x10 glyph for VX
        self.i = HIRES_FONT_ADDR + u16::from(self.v[register_x(o)]) * HIRES_FONT_GLYPH_SIZE;
        Advance::Next
    }

    fn c8_bcd_store(&mut self, o: u16) -> Result<Advance, EngineError> {
        // FX33 - decimal digits of VX at I, I + 1, I + 2
        let span = self.index_span(3)?;
        let val = self.v[register_x(o)];

        self.memory[span].copy_from_slice(&[val / 100, (val / 10) % 10, val % 10]);
        Ok(Advance::Next)
    }

    fn c8_mem_reg_dump(&mut self, o: u16) -> Result<Advance, EngineError> {
        // FX55 - Store V0 to VX inclusive in memory starting at address I
        let count = register_x(o) + 1;
        let span = self.index_span(count)?;

        self.memory[span].copy_from_slice(&self.v[..count]);
        self.advance_index_after_transfer(count);
        Ok(Advance::Next)
    }

    fn c8_mem_reg_load(&mut self, o: u16) -> Result<Advance, EngineError> {
        // FX65 - Fill V0 to VX inclusive from memory starting at address I
        let count = register_x(o) + 1;
        let span = self.index_span(count)?;

        self.v[..count].copy_from_slice(&self.memory[span]);
        self.advance_index_after_transfer(count);
        Ok(Advance::Next)
    }

    fn advance_index_after_transfer(&mut self, count: usize) {
        if self.compatibility_mode {
            // count is at most 16
            self.i = self.i.wrapping_add(count as u16);
        }
    }

    fn sc_rpl_save(&mut self, o: u16) -> Advance {
        // FX75
        let count = register_x(o) + 1;
        self.rpl[..count].copy_from_slice(&self.v[..count]);
        Advance::Next
    }

    fn sc_rpl_restore(&mut self, o: u16) -> Advance {
        // FX85
        let count = register_x(o) + 1;
        self.v[..count].copy_from_slice(&self.rpl[..count]);
        Advance::Next
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn machine_with(target: Target, options: Options) -> Chip8 {
        Chip8::new(target, options, Box::new(StdRng::seed_from_u64(8)))
    }

    fn machine() -> Chip8 {
        machine_with(Target::Chip8, Options::default())
    }

    fn superchip() -> Chip8 {
        machine_with(Target::SuperChip, Options::default())
    }

    // place `opcode` at PC and run it
    fn exec(chip8: &mut Chip8, opcode: u16) -> Result<StepOutcome, EngineError> {
        let pc = usize::from(chip8.pc);
        chip8.memory[pc..pc + 2].copy_from_slice(&opcode.to_be_bytes());
        chip8.step()
    }

    fn run(chip8: &mut Chip8, opcode: u16) -> StepOutcome {
        exec(chip8, opcode).expect("instruction should execute")
    }

    #[test]
    fn power_on_state() {
        let chip8 = machine();
        assert_eq!(chip8.pc(), 0x200);
        assert_eq!(chip8.stack_depth(), 0);
        assert_eq!(chip8.index(), 0);
        assert_eq!(chip8.registers(), &[0; 16]);
        assert_eq!(&chip8.memory()[..80], &FONTSET[..]);
        assert_eq!(&chip8.memory()[0x50..0xF0], &HIRES_FONTSET[..]);
        assert!(chip8.memory()[0x200..].iter().all(|&b| b == 0));
        assert_eq!(chip8.graphics().width(), 64);
        assert!(chip8.graphics_needs_refresh());
    }

    #[test]
    fn load_places_rom_at_program_start() {
        let mut chip8 = machine();
        assert_eq!(chip8.load_rom(&[0x12, 0x34, 0x56]).unwrap(), 3);
        assert_eq!(chip8.memory()[0x200], 0x12);
        assert_eq!(chip8.memory()[0x202], 0x56);
    }

    #[test]
    fn load_size_limit() {
        let mut chip8 = machine();
        let fits = vec![0xAB; 4096 - 0x200];
        assert_eq!(chip8.load_rom(&fits).unwrap(), 3584);
        assert_eq!(chip8.memory()[0xFFF], 0xAB);

        let mut chip8 = machine();
        let too_big = vec![0xAB; 4096 - 0x200 + 1];
        assert!(matches!(
            chip8.load_rom(&too_big),
            Err(LoadError::TooLarge {
                size: 3585,
                capacity: 3584
            })
        ));
        assert!(chip8.memory()[0x200..].iter().all(|&b| b == 0));
    }

    #[test]
    fn load_from_reader() {
        let mut chip8 = machine();
        let rom: &[u8] = &[0x60, 0x2A];
        assert_eq!(chip8.load_from(rom).unwrap(), 2);
        run(&mut chip8, u16::from_be_bytes([0x60, 0x2A]));
        assert_eq!(chip8.registers()[0], 0x2A);
    }

    #[test]
    fn load_missing_file() {
        let mut chip8 = machine();
        assert!(matches!(
            chip8.load_file("/nonexistent/rom.ch8"),
            Err(LoadError::Io(_))
        ));
    }

    #[test]
    fn add_registers_sets_carry() {
        let mut chip8 = machine();
        for a in 0..=255_u8 {
            for b in 0..=255_u8 {
                chip8.pc = 0x200;
                chip8.v[1] = a;
                chip8.v[2] = b;
                run(&mut chip8, 0x8124);
                assert_eq!(chip8.v[1], a.wrapping_add(b));
                assert_eq!(chip8.v[FLAG], u8::from(u16::from(a) + u16::from(b) > 255));
            }
        }
    }

    #[test]
    fn sub_registers_flags_no_borrow() {
        let mut chip8 = machine();
        for a in 0..=255_u8 {
            for b in 0..=255_u8 {
                chip8.pc = 0x200;
                chip8.v[3] = a;
                chip8.v[4] = b;
                run(&mut chip8, 0x8345);
                assert_eq!(chip8.v[3], a.wrapping_sub(b));
                assert_eq!(chip8.v[FLAG], u8::from(a >= b));

                chip8.v[3] = a;
                chip8.v[4] = b;
                run(&mut chip8, 0x8347);
                assert_eq!(chip8.v[3], b.wrapping_sub(a));
                assert_eq!(chip8.v[FLAG], u8::from(b >= a));
            }
        }
    }

    #[test]
    fn flag_wins_over_result_in_vf() {
        let mut chip8 = machine();
        chip8.v[0xF] = 0x10;
        chip8.v[0x1] = 0x02;
        run(&mut chip8, 0x8F14);
        assert_eq!(chip8.v[0xF], 0);

        chip8.v[0xF] = 0xFF;
        run(&mut chip8, 0x8F14);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn shifts_move_one_bit() {
        let mut chip8 = machine();
        chip8.v[5] = 0b1000_0011;
        run(&mut chip8, 0x8506);
        assert_eq!(chip8.v[5], 0b0100_0001);
        assert_eq!(chip8.v[FLAG], 1);

        chip8.v[5] = 0b1000_0010;
        run(&mut chip8, 0x850E);
        assert_eq!(chip8.v[5], 0b0000_0100);
        assert_eq!(chip8.v[FLAG], 1);

        chip8.v[5] = 0b0100_0010;
        run(&mut chip8, 0x850E);
        assert_eq!(chip8.v[5], 0b1000_0100);
        assert_eq!(chip8.v[FLAG], 0);

        run(&mut chip8, 0x8506);
        assert_eq!(chip8.v[5], 0b0100_0010);
        assert_eq!(chip8.v[FLAG], 0);
    }

    #[test]
    fn shift_quirk_reads_vy() {
        let mut chip8 = machine_with(
            Target::Chip8,
            Options {
                shift_reads_vy: true,
                ..Options::default()
            },
        );
        chip8.v[1] = 0xFF;
        chip8.v[2] = 0x81;
        run(&mut chip8, 0x8126);
        assert_eq!(chip8.v[1], 0x40);
        assert_eq!(chip8.v[FLAG], 1);
        assert_eq!(chip8.v[2], 0x81);
    }

    #[test]
    fn add_immediate_and_index_scenario() {
        let mut chip8 = machine();
        run(&mut chip8, 0x6005);
        chip8.v[FLAG] = 0x42;
        run(&mut chip8, 0x700A);
        assert_eq!(chip8.v[0], 0x0F);
        assert_eq!(chip8.v[FLAG], 0x42);

        run(&mut chip8, 0xA300);
        assert_eq!(chip8.index(), 0x300);

        chip8.i = 0xFF8;
        run(&mut chip8, 0xF01E);
        assert_eq!(chip8.index(), 0x1007);
        assert_eq!(chip8.v[FLAG], 1);

        chip8.i = 0x100;
        run(&mut chip8, 0xF01E);
        assert_eq!(chip8.index(), 0x10F);
        assert_eq!(chip8.v[FLAG], 0);
    }

    #[test]
    fn add_immediate_wraps() {
        let mut chip8 = machine();
        chip8.v[7] = 0xFE;
        run(&mut chip8, 0x7703);
        assert_eq!(chip8.v[7], 0x01);
        assert_eq!(chip8.v[FLAG], 0);
    }

    #[test]
    fn call_and_return_at_every_depth() {
        for depth in 1..=STACK_DEPTH {
            let mut chip8 = machine();
            for level in 0..depth {
                let target = 0x300 + 0x10 * level as u16;
                run(&mut chip8, 0x2000 | target);
                assert_eq!(chip8.pc(), target);
            }
            assert_eq!(chip8.stack_depth(), depth);

            for _ in 0..depth {
                run(&mut chip8, 0x00EE);
            }
            assert_eq!(chip8.pc(), 0x202);
            assert_eq!(chip8.stack_depth(), 0);
        }
    }

    #[test]
    fn seventeenth_call_overflows() {
        let mut chip8 = machine();
        for level in 0..STACK_DEPTH {
            run(&mut chip8, 0x2300 + 0x10 * level as u16);
        }

        let pc = chip8.pc();
        let stack = chip8.stack;
        assert_eq!(
            exec(&mut chip8, 0x2F00),
            Err(EngineError::StackOverflow { address: pc })
        );
        assert_eq!(chip8.pc(), pc);
        assert_eq!(chip8.stack, stack);
        assert_eq!(chip8.stack_depth(), STACK_DEPTH);
    }

    #[test]
    fn return_on_empty_stack() {
        let mut chip8 = machine();
        assert_eq!(
            exec(&mut chip8, 0x00EE),
            Err(EngineError::StackUnderflow { address: 0x200 })
        );
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn jumps() {
        let mut chip8 = machine();
        run(&mut chip8, 0x1456);
        assert_eq!(chip8.pc(), 0x456);

        chip8.v[0] = 0x10;
        run(&mut chip8, 0xB300);
        assert_eq!(chip8.pc(), 0x310);
    }

    #[test]
    fn conditional_skips() {
        let mut chip8 = machine();
        chip8.v[1] = 0x33;
        chip8.v[2] = 0x33;

        let cases = [
            (0x3133, 0x204),
            (0x3134, 0x202),
            (0x4133, 0x202),
            (0x4134, 0x204),
            (0x5120, 0x204),
            (0x9120, 0x202),
        ];
        for (opcode, expected) in cases {
            chip8.pc = 0x200;
            run(&mut chip8, opcode);
            assert_eq!(chip8.pc(), expected, "{opcode:04X}");
        }

        chip8.v[2] = 0x34;
        chip8.pc = 0x200;
        run(&mut chip8, 0x9120);
        assert_eq!(chip8.pc(), 0x204);
    }

    #[test]
    fn bitwise_ops() {
        let mut chip8 = machine();
        chip8.v[1] = 0b1100;
        chip8.v[2] = 0b1010;
        run(&mut chip8, 0x8121);
        assert_eq!(chip8.v[1], 0b1110);
        run(&mut chip8, 0x8122);
        assert_eq!(chip8.v[1], 0b1010);
        run(&mut chip8, 0x8123);
        assert_eq!(chip8.v[1], 0);
        run(&mut chip8, 0x8120);
        assert_eq!(chip8.v[1], 0b1010);
    }

    #[test]
    fn random_respects_mask() {
        let mut chip8 = machine();
        run(&mut chip8, 0xC300);
        assert_eq!(chip8.v[3], 0);

        for _ in 0..64 {
            run(&mut chip8, 0xC30F);
            assert_eq!(chip8.v[3] & 0xF0, 0);
        }
    }

    #[test]
    fn draw_twice_restores_screen() {
        let mut chip8 = machine();
        chip8.i = 0x300;
        chip8.memory[0x300..0x303].copy_from_slice(&[0xFF, 0x81, 0xFF]);
        chip8.v[0] = 60;
        chip8.v[1] = 30;

        assert_eq!(
            run(&mut chip8, 0xD013),
            StepOutcome::Executed { redraw: true }
        );
        assert_eq!(chip8.v[FLAG], 0);
        assert_eq!(chip8.graphics().pixels().count_ones(), 18);
        assert!(chip8.graphics().pixel(3, 31));
        assert!(chip8.graphics().pixel(3, 0));
        assert!(!chip8.graphics().pixel(4, 0));

        run(&mut chip8, 0xD013);
        assert_eq!(chip8.v[FLAG], 1);
        assert!(chip8.graphics().pixels().not_any());
    }

    #[test]
    fn clear_screen_marks_dirty() {
        let mut chip8 = machine();
        chip8.memory[0x300] = 0x80;
        chip8.i = 0x300;
        run(&mut chip8, 0xD001);
        chip8.graphics_clear_refresh();

        assert_eq!(
            run(&mut chip8, 0x00E0),
            StepOutcome::Executed { redraw: true }
        );
        assert!(chip8.graphics_needs_refresh());
        assert!(chip8.graphics().pixels().not_any());

        chip8.graphics_clear_refresh();
        assert_eq!(
            run(&mut chip8, 0x6000),
            StepOutcome::Executed { redraw: false }
        );
        assert!(!chip8.graphics_needs_refresh());
    }

    #[test]
    fn font_addresses() {
        let mut chip8 = superchip();
        chip8.v[4] = 0xA;
        run(&mut chip8, 0xF429);
        assert_eq!(chip8.index(), 50);
        run(&mut chip8, 0xF430);
        assert_eq!(chip8.index(), 0x50 + 100);
    }

    #[test]
    fn binary_coded_decimal() {
        let mut chip8 = machine();
        chip8.i = 0x400;
        for (val, digits) in [(0_u8, [0_u8, 0, 0]), (7, [0, 0, 7]), (42, [0, 4, 2]), (255, [2, 5, 5])] {
            chip8.v[9] = val;
            run(&mut chip8, 0xF933);
            assert_eq!(chip8.memory()[0x400..0x403], digits);
        }
        assert_eq!(chip8.index(), 0x400);
    }

    #[test]
    fn register_dump_and_load_leave_index() {
        let mut chip8 = machine();
        chip8.v = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        chip8.i = 0x500;

        run(&mut chip8, 0xF355);
        assert_eq!(chip8.memory()[0x500..0x505], [1, 2, 3, 4, 0]);
        assert_eq!(chip8.index(), 0x500);

        chip8.memory[0x500..0x503].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
        run(&mut chip8, 0xF165);
        assert_eq!(chip8.v[..4], [0xAA, 0xBB, 3, 4]);
        assert_eq!(chip8.index(), 0x500);
    }

    #[test]
    fn register_dump_and_load_advance_index_in_compatibility_mode() {
        let mut chip8 = machine_with(
            Target::Chip8,
            Options {
                compatibility_mode: true,
                ..Options::default()
            },
        );
        chip8.v[..3].copy_from_slice(&[7, 8, 9]);
        chip8.i = 0x500;

        run(&mut chip8, 0xF255);
        assert_eq!(chip8.memory()[0x500..0x503], [7, 8, 9]);
        assert_eq!(chip8.index(), 0x503);

        chip8.i = 0x500;
        chip8.v[..3].copy_from_slice(&[0, 0, 0]);
        run(&mut chip8, 0xFF65);
        assert_eq!(chip8.v[..3], [7, 8, 9]);
        assert_eq!(chip8.index(), 0x510);
    }

    #[test]
    fn program_can_enable_compatibility_mode() {
        let mut chip8 = machine();
        assert!(!chip8.compatibility_mode());
        run(&mut chip8, 0x00FA);
        assert!(chip8.compatibility_mode());

        chip8.i = 0x600;
        run(&mut chip8, 0xF055);
        assert_eq!(chip8.index(), 0x601);

        chip8.init();
        assert!(!chip8.compatibility_mode());
    }

    #[test]
    fn indexed_access_past_memory_fails_cleanly() {
        let mut chip8 = machine();
        chip8.i = 0xFFE;
        chip8.v[0] = 123;
        assert_eq!(
            exec(&mut chip8, 0xF033),
            Err(EngineError::AddressOutOfRange { address: 0x1000 })
        );
        assert_eq!(chip8.memory()[0xFFE..], [0, 0]);
        assert_eq!(chip8.pc(), 0x200);

        chip8.i = 0x1007;
        assert!(matches!(
            exec(&mut chip8, 0xD005),
            Err(EngineError::AddressOutOfRange { .. })
        ));
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn fetch_past_memory_fails() {
        let mut chip8 = machine();
        chip8.pc = 0xFFF;
        assert_eq!(
            chip8.step(),
            Err(EngineError::AddressOutOfRange { address: 0x1000 })
        );
    }

    #[test]
    fn key_wait_does_not_block() {
        let mut chip8 = machine();
        assert_eq!(run(&mut chip8, 0xF50A), StepOutcome::WaitingForKey);
        assert_eq!(chip8.pc(), 0x200);
        assert_eq!(chip8.step(), Ok(StepOutcome::WaitingForKey));

        chip8.press_key(0x3);
        assert_eq!(chip8.step(), Ok(StepOutcome::Executed { redraw: false }));
        assert_eq!(chip8.v[5], 0x3);
        assert_eq!(chip8.pc(), 0x202);
    }

    #[test]
    fn key_skips() {
        let mut chip8 = machine();
        chip8.v[2] = 0xE;

        run(&mut chip8, 0xE29E);
        assert_eq!(chip8.pc(), 0x202);
        run(&mut chip8, 0xE2A1);
        assert_eq!(chip8.pc(), 0x206);

        chip8.press_key(0xE);
        run(&mut chip8, 0xE29E);
        assert_eq!(chip8.pc(), 0x20A);
        run(&mut chip8, 0xE2A1);
        assert_eq!(chip8.pc(), 0x20C);

        chip8.release_key(0xE);
        run(&mut chip8, 0xE29E);
        assert_eq!(chip8.pc(), 0x20E);
    }

    #[test]
    fn timers_through_opcodes() {
        let mut chip8 = machine();
        chip8.v[0] = 2;
        run(&mut chip8, 0xF015);
        run(&mut chip8, 0xF018);
        assert!(chip8.tone_active());
        assert_eq!(chip8.poll_tone(), Some(Tone::Start));
        assert_eq!(chip8.tick(), None);

        run(&mut chip8, 0xF107);
        assert_eq!(chip8.v[1], 1);

        assert_eq!(chip8.tick(), Some(Tone::Stop));
        assert!(!chip8.tone_active());
        assert_eq!(chip8.tick(), None);
        assert_eq!(chip8.delay_timer(), 0);
        assert_eq!(chip8.sound_timer(), 0);
    }

    #[test]
    fn one_frame_tone_stops_when_timer_hits_zero() {
        let mut chip8 = machine();
        chip8.v[0] = 1;
        run(&mut chip8, 0xF018);
        assert_eq!(chip8.poll_tone(), Some(Tone::Start));

        assert_eq!(chip8.tick(), Some(Tone::Stop));
        assert_eq!(chip8.sound_timer(), 0);
        assert!(!chip8.tone_active());
    }

    #[test]
    fn reset_while_sounding_reports_stop() {
        let mut chip8 = machine();
        chip8.v[0] = 30;
        run(&mut chip8, 0xF018);
        assert_eq!(chip8.poll_tone(), Some(Tone::Start));

        chip8.init();
        assert!(!chip8.tone_active());
        assert_eq!(chip8.poll_tone(), Some(Tone::Stop));
    }

    #[test]
    fn unknown_opcode_halts_by_default() {
        let mut chip8 = machine();
        assert_eq!(
            exec(&mut chip8, 0x5121),
            Err(EngineError::UnknownOpcode {
                opcode: 0x5121,
                address: 0x200
            })
        );
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn unknown_opcode_can_be_skipped() {
        let mut chip8 = machine_with(
            Target::Chip8,
            Options {
                unknown_opcode: UnknownOpcodePolicy::Skip,
                ..Options::default()
            },
        );
        assert_eq!(
            run(&mut chip8, 0xE1FF),
            StepOutcome::Skipped {
                opcode: 0xE1FF,
                address: 0x200
            }
        );
        assert_eq!(chip8.pc(), 0x202);
    }

    #[test]
    fn superchip_opcodes_are_unknown_on_chip8() {
        for opcode in [0x00C2, 0x00FB, 0x00FC, 0x00FD, 0x00FE, 0x00FF, 0xF130, 0xF175, 0xF185] {
            let mut chip8 = machine();
            assert!(
                matches!(exec(&mut chip8, opcode), Err(EngineError::UnknownOpcode { .. })),
                "{opcode:04X}"
            );
        }
    }

    #[test]
    fn chip8_draws_nothing_for_zero_rows() {
        let mut chip8 = machine();
        chip8.v[FLAG] = 1;
        assert_eq!(
            run(&mut chip8, 0xD000),
            StepOutcome::Executed { redraw: true }
        );
        assert_eq!(chip8.v[FLAG], 0);
        assert!(chip8.graphics().pixels().not_any());
    }

    #[test]
    fn extended_mode_switches_resolution() {
        let mut chip8 = superchip();
        run(&mut chip8, 0x00FF);
        assert!(chip8.extended_mode());
        assert_eq!((chip8.graphics().width(), chip8.graphics().height()), (128, 64));
        assert_eq!(chip8.resolution_scale(), 1);

        run(&mut chip8, 0x00FE);
        assert!(!chip8.extended_mode());
        assert_eq!((chip8.graphics().width(), chip8.graphics().height()), (64, 32));
        assert_eq!(chip8.resolution_scale(), 2);
    }

    #[test]
    fn chip8_ignores_extended_mode_request() {
        let mut chip8 = machine();
        chip8.set_extended_mode(true);
        assert!(!chip8.extended_mode());
        assert_eq!(chip8.graphics().width(), 64);
    }

    #[test]
    fn large_sprite_in_extended_mode() {
        let mut chip8 = superchip();
        run(&mut chip8, 0x00FF);
        chip8.i = 0x400;
        chip8.memory[0x400..0x420].fill(0xFF);
        chip8.v[0] = 120;
        chip8.v[1] = 60;

        run(&mut chip8, 0xD010);
        assert_eq!(chip8.v[FLAG], 0);
        assert_eq!(chip8.graphics().pixels().count_ones(), 256);
        assert!(chip8.graphics().pixel(127, 63));
        assert!(chip8.graphics().pixel(7, 11));
        assert!(!chip8.graphics().pixel(8, 12));

        run(&mut chip8, 0xD010);
        assert_eq!(chip8.v[FLAG], 1);
        assert!(chip8.graphics().pixels().not_any());
    }

    #[test]
    fn large_sprite_in_low_resolution_is_eight_wide() {
        let mut chip8 = superchip();
        chip8.i = 0x400;
        chip8.memory[0x400..0x420].fill(0xFF);

        run(&mut chip8, 0xD010);
        assert_eq!(chip8.graphics().pixels().count_ones(), 128);
    }

    #[test]
    fn scrolling() {
        let mut chip8 = superchip();
        run(&mut chip8, 0x00FF);
        chip8.i = 0x400;
        chip8.memory[0x400] = 0x80;
        chip8.v[0] = 10;
        chip8.v[1] = 10;
        run(&mut chip8, 0xD011);
        chip8.graphics_clear_refresh();

        assert_eq!(
            run(&mut chip8, 0x00C3),
            StepOutcome::Executed { redraw: true }
        );
        assert!(chip8.graphics().pixel(10, 13));

        run(&mut chip8, 0x00FB);
        assert!(chip8.graphics().pixel(14, 13));

        run(&mut chip8, 0x00FC);
        run(&mut chip8, 0x00FC);
        assert!(chip8.graphics().pixel(6, 13));
        assert_eq!(chip8.graphics().pixels().count_ones(), 1);
        assert!(chip8.graphics_needs_refresh());
    }

    #[test]
    fn exit_stays_put() {
        let mut chip8 = superchip();
        assert_eq!(run(&mut chip8, 0x00FD), StepOutcome::Exited);
        assert_eq!(chip8.step(), Ok(StepOutcome::Exited));
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn rpl_flags_survive_reset() {
        let mut chip8 = superchip();
        chip8.v[..4].copy_from_slice(&[9, 8, 7, 6]);
        run(&mut chip8, 0xF375);
        assert_eq!(chip8.rpl_flags()[..5], [9, 8, 7, 6, 0]);

        chip8.init();
        assert_eq!(chip8.registers(), &[0; 16]);

        run(&mut chip8, 0xF285);
        assert_eq!(chip8.v[..4], [9, 8, 7, 0]);
    }
}
