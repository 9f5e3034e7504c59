/*!
cartridge.rs - Owns the parsed ROM image, PRG RAM, and mapper state, and
routes the CPU/PPU address spaces across them.

PRG RAM ($6000-$7FFF) is addressed directly by `Cartridge`, wrapped to
the cartridge's actual PRG RAM size; everything above $8000 and all CHR
accesses are delegated to the active `MapperState` variant.
*/

use std::fs;
use std::path::Path;

use crate::error::EmuError;
use crate::mappers::MapperState;
use crate::rom::{Mirroring, RomImage};

#[derive(Debug)]
pub struct Cartridge {
    pub rom: RomImage,
    prg_ram: Vec<u8>,
    mapper: MapperState,
}

impl Cartridge {
    pub fn from_ines_bytes(data: &[u8]) -> Result<Self, EmuError> {
        let rom = RomImage::from_ines_bytes(data)?;
        let mapper = MapperState::new(rom.mapper_id, rom.prg_page_count, rom.chr_page_count)?;
        let prg_ram = vec![0u8; rom.prg_ram_len];
        Ok(Self { rom, prg_ram, mapper })
    }

    pub fn from_ines_file<P: AsRef<Path>>(path: P) -> Result<Self, EmuError> {
        let bytes = fs::read(path)?;
        Self::from_ines_bytes(&bytes)
    }

    pub fn reset(&mut self) {
        self.mapper.reset(self.rom.prg_page_count, self.rom.chr_page_count);
    }

    // -------------- CPU bus --------------

    pub fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.read_prg_ram(addr),
            0x8000..=0xFFFF => self.mapper.read_prg(&self.rom.prg, addr),
            _ => 0,
        }
    }

    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.write_prg_ram(addr, value),
            0x8000..=0xFFFF => self.mapper.write_prg(addr, value),
            _ => {}
        }
    }

    fn read_prg_ram(&self, addr: u16) -> u8 {
        if self.prg_ram.is_empty() {
            return 0;
        }
        let idx = (addr as usize - 0x6000) % self.prg_ram.len();
        self.prg_ram[idx]
    }

    fn write_prg_ram(&mut self, addr: u16, value: u8) {
        if self.prg_ram.is_empty() {
            return;
        }
        let len = self.prg_ram.len();
        let idx = (addr as usize - 0x6000) % len;
        self.prg_ram[idx] = value;
    }

    // -------------- PPU bus (CHR, $0000-$1FFF) --------------

    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.mapper.read_chr(&self.rom.chr, addr)
    }

    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.rom.chr_is_ram {
            self.mapper.write_chr(&mut self.rom.chr, addr, value);
        }
    }

    // -------------- IRQ --------------

    pub fn irq_tick(&mut self) {
        self.mapper.irq_tick();
    }

    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    // -------------- Accessors --------------

    pub fn mapper_id(&self) -> u16 {
        self.rom.mapper_id
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring().unwrap_or(self.rom.mirroring)
    }

    pub fn battery_backed(&self) -> bool {
        self.rom.battery
    }

    pub fn has_prg_ram(&self) -> bool {
        !self.prg_ram.is_empty()
    }

    pub fn prg_rom_len(&self) -> usize {
        self.rom.prg.len()
    }

    pub fn chr_len(&self) -> usize {
        self.rom.chr.len()
    }

    pub fn prg_ram_len(&self) -> usize {
        self.prg_ram.len()
    }

    pub fn prg_ram(&self) -> &[u8] {
        &self.prg_ram
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_ines;

    #[test]
    fn parse_simple_nrom_32k_chr8k() {
        let flags6 = 0b0000_0001; // vertical mirroring
        let flags7 = 0u8;
        let data = build_ines(2, 1, flags6, flags7, 1, None);
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");

        assert_eq!(cart.mapper_id(), 0);
        assert_eq!(cart.mirroring(), Mirroring::Vertical);
        assert!(cart.has_prg_ram());
        assert_eq!(cart.prg_rom_len(), 32 * 1024);
        assert_eq!(cart.chr_len(), 8 * 1024);

        assert_eq!(cart.cpu_read(0x8000), 0xAA);
        assert_eq!(cart.cpu_read(0xFFFF), 0xAA);
    }

    #[test]
    fn parse_nrom_16k_chr_ram() {
        let flags6 = 0b0000_0000; // horizontal
        let flags7 = 0u8;
        let data = build_ines(1, 0, flags6, flags7, 0, None);
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");

        assert_eq!(cart.mapper_id(), 0);
        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
        assert!(cart.has_prg_ram());
        assert_eq!(cart.prg_rom_len(), 16 * 1024);
        assert_eq!(cart.chr_len(), 8 * 1024);

        let first_half = cart.cpu_read(0x8000);
        let second_half = cart.cpu_read(0xC000);
        assert_eq!(first_half, second_half);
    }

    #[test]
    fn trainer_moves_data_offset() {
        let mut trainer = [0u8; 512];
        for (i, b) in trainer.iter_mut().enumerate() {
            *b = (i & 0xFF) as u8;
        }
        let flags6 = 0b0000_0100; // trainer present
        let flags7 = 0u8;
        let data = build_ines(1, 1, flags6, flags7, 1, Some(&trainer));
        let cart = Cartridge::from_ines_bytes(&data).expect("parse");
        assert_eq!(cart.mapper_id(), 0);
        assert!(cart.has_prg_ram());
    }

    #[test]
    fn ines2_rejected() {
        let flags6 = 0u8;
        let flags7 = 0b0000_1000;
        let data = build_ines(1, 1, flags6, flags7, 1, None);
        let err = Cartridge::from_ines_bytes(&data).unwrap_err();
        assert!(matches!(err, EmuError::InvalidRom(_)));
    }

    #[test]
    fn prg_ram_read_write() {
        let flags6 = 0u8;
        let flags7 = 0u8;
        let data = build_ines(2, 1, flags6, flags7, 1, None);
        let mut cart = Cartridge::from_ines_bytes(&data).expect("parse");

        cart.cpu_write(0x6000, 0x42);
        assert_eq!(cart.cpu_read(0x6000), 0x42);

        let len = cart.prg_ram_len();
        if len > 0 {
            cart.cpu_write(0x6000 + (len as u16), 0x99);
            assert_eq!(cart.cpu_read(0x6000), 0x99);
        }
    }

    #[test]
    fn unsupported_mapper_id_surfaces_as_error() {
        let flags6 = 0xF0u8; // mapper low nibble = 0xF
        let flags7 = 0xF0u8; // mapper high nibble = 0xF -> mapper 255
        let data = build_ines(1, 1, flags6, flags7, 1, None);
        let err = Cartridge::from_ines_bytes(&data).unwrap_err();
        assert!(matches!(err, EmuError::UnsupportedMapper(255)));
    }
}
