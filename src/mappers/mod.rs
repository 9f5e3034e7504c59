/*!
mappers::mod - Tagged-enum dispatch over the supported cartridge mappers.

The mapper set is small and closed (eight variants), so `MapperState` is
a plain enum carrying each mapper's own bank-map arrays and registers
rather than a `dyn Mapper` trait object. Every variant shares the
bank-mapping primitives in `bankmap` and exposes the same method
surface, dispatched here with a single `match` per operation.
*/

pub(crate) mod aorom;
pub(crate) mod bankmap;
pub(crate) mod cnrom;
pub(crate) mod gnrom;
pub(crate) mod mmc1;
pub(crate) mod mmc2;
pub(crate) mod mmc3;
pub(crate) mod nrom;
pub(crate) mod unrom;

use crate::error::EmuError;
use crate::rom::Mirroring;

use aorom::Aorom;
use cnrom::Cnrom;
use gnrom::Gnrom;
use mmc1::Mmc1;
use mmc2::Mmc2;
use mmc3::Mmc3;
use nrom::Nrom;
use unrom::Unrom;

#[derive(Debug, Clone)]
pub enum MapperState {
    Nrom(Nrom),
    Mmc1(Mmc1),
    Unrom(Unrom),
    Cnrom(Cnrom),
    Mmc3(Mmc3),
    Aorom(Aorom),
    Mmc2(Mmc2),
    Gnrom(Gnrom),
}

impl MapperState {
    pub fn new(mapper_id: u16, prg_page_count: usize, chr_page_count: usize) -> Result<Self, EmuError> {
        Ok(match mapper_id {
            0 => MapperState::Nrom(Nrom::new(prg_page_count, chr_page_count)),
            1 => MapperState::Mmc1(Mmc1::new(prg_page_count, chr_page_count)),
            2 => MapperState::Unrom(Unrom::new(prg_page_count, chr_page_count)),
            3 => MapperState::Cnrom(Cnrom::new(prg_page_count, chr_page_count)),
            4 => MapperState::Mmc3(Mmc3::new(prg_page_count, chr_page_count)),
            7 => MapperState::Aorom(Aorom::new(prg_page_count, chr_page_count)),
            9 => MapperState::Mmc2(Mmc2::new(prg_page_count, chr_page_count)),
            66 => MapperState::Gnrom(Gnrom::new(prg_page_count, chr_page_count)),
            other => return Err(EmuError::UnsupportedMapper(other)),
        })
    }

    pub fn reset(&mut self, prg_page_count: usize, chr_page_count: usize) {
        match self {
            MapperState::Nrom(m) => m.reset(prg_page_count, chr_page_count),
            MapperState::Mmc1(m) => m.reset(prg_page_count, chr_page_count),
            MapperState::Unrom(m) => m.reset(prg_page_count, chr_page_count),
            MapperState::Cnrom(m) => m.reset(prg_page_count, chr_page_count),
            MapperState::Mmc3(m) => m.reset(prg_page_count, chr_page_count),
            MapperState::Aorom(m) => m.reset(prg_page_count, chr_page_count),
            MapperState::Mmc2(m) => m.reset(prg_page_count, chr_page_count),
            MapperState::Gnrom(m) => m.reset(prg_page_count, chr_page_count),
        }
    }

    pub fn read_prg(&self, prg: &[u8], addr: u16) -> u8 {
        match self {
            MapperState::Nrom(m) => m.read_prg(prg, addr),
            MapperState::Mmc1(m) => m.read_prg(prg, addr),
            MapperState::Unrom(m) => m.read_prg(prg, addr),
            MapperState::Cnrom(m) => m.read_prg(prg, addr),
            MapperState::Mmc3(m) => m.read_prg(prg, addr),
            MapperState::Aorom(m) => m.read_prg(prg, addr),
            MapperState::Mmc2(m) => m.read_prg(prg, addr),
            MapperState::Gnrom(m) => m.read_prg(prg, addr),
        }
    }

    pub fn write_prg(&mut self, addr: u16, value: u8) {
        match self {
            MapperState::Nrom(m) => m.write_prg(addr, value),
            MapperState::Mmc1(m) => m.write_prg(addr, value),
            MapperState::Unrom(m) => m.write_prg(addr, value),
            MapperState::Cnrom(m) => m.write_prg(addr, value),
            MapperState::Mmc3(m) => m.write_prg(addr, value),
            MapperState::Aorom(m) => m.write_prg(addr, value),
            MapperState::Mmc2(m) => m.write_prg(addr, value),
            MapperState::Gnrom(m) => m.write_prg(addr, value),
        }
    }

    pub fn read_chr(&self, chr: &[u8], addr: u16) -> u8 {
        match self {
            MapperState::Nrom(m) => m.read_chr(chr, addr),
            MapperState::Mmc1(m) => m.read_chr(chr, addr),
            MapperState::Unrom(m) => m.read_chr(chr, addr),
            MapperState::Cnrom(m) => m.read_chr(chr, addr),
            MapperState::Mmc3(m) => m.read_chr(chr, addr),
            MapperState::Aorom(m) => m.read_chr(chr, addr),
            MapperState::Mmc2(m) => m.read_chr(chr, addr),
            MapperState::Gnrom(m) => m.read_chr(chr, addr),
        }
    }

    pub fn write_chr(&self, chr: &mut [u8], addr: u16, value: u8) {
        match self {
            MapperState::Nrom(m) => m.write_chr(chr, addr, value),
            MapperState::Mmc1(m) => m.write_chr(chr, addr, value),
            MapperState::Unrom(m) => m.write_chr(chr, addr, value),
            MapperState::Cnrom(m) => m.write_chr(chr, addr, value),
            MapperState::Mmc3(m) => m.write_chr(chr, addr, value),
            MapperState::Aorom(m) => m.write_chr(chr, addr, value),
            MapperState::Mmc2(m) => m.write_chr(chr, addr, value),
            MapperState::Gnrom(m) => m.write_chr(chr, addr, value),
        }
    }

    pub fn mirroring(&self) -> Option<Mirroring> {
        match self {
            MapperState::Nrom(m) => m.mirroring(),
            MapperState::Mmc1(m) => m.mirroring(),
            MapperState::Unrom(m) => m.mirroring(),
            MapperState::Cnrom(m) => m.mirroring(),
            MapperState::Mmc3(m) => m.mirroring(),
            MapperState::Aorom(m) => m.mirroring(),
            MapperState::Mmc2(m) => m.mirroring(),
            MapperState::Gnrom(m) => m.mirroring(),
        }
    }

    /// Called once per rendered (or pre-render) PPU scanline; only MMC3
    /// does anything with it.
    pub fn irq_tick(&mut self) {
        match self {
            MapperState::Mmc3(m) => m.irq_tick(),
            MapperState::Nrom(m) => m.irq_tick(),
            MapperState::Mmc1(m) => m.irq_tick(),
            MapperState::Unrom(m) => m.irq_tick(),
            MapperState::Cnrom(m) => m.irq_tick(),
            MapperState::Aorom(m) => m.irq_tick(),
            MapperState::Mmc2(m) => m.irq_tick(),
            MapperState::Gnrom(m) => m.irq_tick(),
        }
    }

    pub fn irq_pending(&self) -> bool {
        match self {
            MapperState::Mmc3(m) => m.irq_pending(),
            MapperState::Nrom(m) => m.irq_pending(),
            MapperState::Mmc1(m) => m.irq_pending(),
            MapperState::Unrom(m) => m.irq_pending(),
            MapperState::Cnrom(m) => m.irq_pending(),
            MapperState::Aorom(m) => m.irq_pending(),
            MapperState::Mmc2(m) => m.irq_pending(),
            MapperState::Gnrom(m) => m.irq_pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_mapper_id_is_rejected() {
        let err = MapperState::new(255, 2, 1).unwrap_err();
        assert!(matches!(err, EmuError::UnsupportedMapper(255)));
    }

    #[test]
    fn nrom_round_trips_through_the_enum() {
        let mut m = MapperState::new(0, 2, 1).unwrap();
        let prg = vec![0x55u8; 2 * 0x2000];
        assert_eq!(m.read_prg(&prg, 0x8000), 0x55);
        m.write_prg(0x8000, 0); // no-op, must not panic
        assert_eq!(m.mirroring(), None);
    }
}
