use anyhow::Result;
use clap::Parser;

use schip8::{Options, Target, UnknownOpcodePolicy};

mod audio;
mod emulator;
mod hardware;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Action {
    Quit,
}

#[derive(Debug, Parser)]
#[command(version, about = "CHIP-8 / SuperChip interpreter")]
struct Args {
    /// ROM filename to load
    rom: String,

    /// Machine variant to emulate
    #[arg(short, long, value_enum, default_value_t = Target::Chip8)]
    target: Target,

    /// Scale factor for the window
    #[arg(short, long)]
    scale: Option<u8>,

    /// Advance I after FX55/FX65
    #[arg(long)]
    compat: bool,

    /// Shift VY into VX for 8XY6/8XYE
    #[arg(long)]
    shift_vy: bool,

    /// What to do with unrecognised instructions
    #[arg(long, value_enum, default_value_t = UnknownOpcodePolicy::Halt)]
    unknown_opcode: UnknownOpcodePolicy,

    /// Instructions executed per 60Hz frame
    #[arg(long, default_value_t = 10)]
    cycles_per_frame: u16,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let options = Options {
        compatibility_mode: args.compat,
        shift_reads_vy: args.shift_vy,
        unknown_opcode: args.unknown_opcode,
    };

    let mut emulator =
        emulator::Emulator::new(args.scale, args.target, options, args.cycles_per_frame)?;

    emulator.process(&args.rom)
}
