/*!
error.rs - Fatal error kinds for ROM loading and CPU execution.

These are the only conditions the core treats as unrecoverable; every
other out-of-range or unimplemented access is handled silently (reads
return 0, writes are dropped) per the bus/mapper contracts.
*/

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmuError {
    #[error("invalid ROM image: {0}")]
    InvalidRom(String),

    #[error("unsupported mapper id: {0}")]
    UnsupportedMapper(u16),

    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    #[error("renderer initialization failed: {0}")]
    RendererInit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
