//! Narrow traits the PPU's rendering code is generic over, so the per-dot
//! and full-frame renderers don't need a concrete `Bus` to be unit tested.

/// Everything the PPU needs from the rest of the system to fetch pattern,
/// nametable, attribute and palette bytes during rendering.
pub trait PpuBus {
    /// Read a byte from PPU address space (`$0000-$3FFF`), applying mapper
    /// CHR banking and nametable mirroring the same way a real `$2007`
    /// access would.
    fn ppu_read(&self, addr: u16) -> u8;
}
