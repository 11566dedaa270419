use thiserror::Error;

/// Failure to place a ROM image into memory. Memory is left untouched.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read ROM")]
    Io(#[from] std::io::Error),

    #[error("ROM is too large ({size} bytes), program space is {capacity} bytes")]
    TooLarge { size: usize, capacity: usize },
}

/// Faults raised by a single `step`. The machine state is not modified when
/// one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("stack overflow calling from {address:#05X}")]
    StackOverflow { address: u16 },

    #[error("stack underflow returning from {address:#05X}")]
    StackUnderflow { address: u16 },

    #[error("unknown opcode {opcode:#06X} at {address:#05X}")]
    UnknownOpcode { opcode: u16, address: u16 },

    #[error("memory access out of range at {address:#06X}")]
    AddressOutOfRange { address: usize },
}
