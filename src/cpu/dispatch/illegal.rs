/*!
illegal.rs - Undocumented ("illegal") 6502 opcode family handler

Overview
========
Covers the commonly tested undocumented opcodes not already folded into
the arithmetic (RRA/ISC) or compare (AXS) families:

LAX: A7 (zp), B7 (zp,Y), AF (abs), BF (abs,Y*), A3 ((ind,X)), B3 ((ind),Y*)
SAX: 87 (zp), 97 (zp,Y), 8F (abs), 83 ((ind,X))
DCP: C7 (zp), D7 (zp,X), CF (abs), DF (abs,X), DB (abs,Y), C3 ((ind,X)), D3 ((ind),Y)
SLO: 07 (zp), 17 (zp,X), 0F (abs), 1F (abs,X), 1B (abs,Y), 03 ((ind,X)), 13 ((ind),Y)
RLA: 27 (zp), 37 (zp,X), 2F (abs), 3F (abs,X), 3B (abs,Y), 23 ((ind,X)), 33 ((ind),Y)
SRE: 47 (zp), 57 (zp,X), 4F (abs), 5F (abs,X), 5B (abs,Y), 43 ((ind,X)), 53 ((ind),Y)
ANC: 0B, 2B (immediate, two duplicate encodings)
ALR: 4B (immediate)
ARR: 6B (immediate)
SHY: 9C (abs,X, unstable high-byte-AND store)
SHX: 9E (abs,Y, unstable high-byte-AND store)

(*) LAX's abs,Y and (ind),Y forms get the usual +1 page-cross read penalty;
    the RMW-style opcodes (DCP/SLO/RLA/SRE) never discount for page-cross
    since real hardware always pays the extra cycle on indexed RMW.

Design & Integration
====================
Same contract as the other family handlers: `handle` is tried after the
documented families in the fallback dispatcher's chain, and returns `false`
for anything it doesn't recognize so the chain can fall through to
`finalize::handle_trivial_or_unknown`.
*/

#![allow(dead_code)]

use crate::bus::Bus;
use crate::cpu::regs::CpuRegs;

use crate::cpu::addressing::{
    addr_abs, addr_abs_x, addr_abs_y, addr_abs_y_pc, addr_ind_x, addr_ind_y, addr_ind_y_pc,
    addr_zp, addr_zp_x, addr_zp_y, fetch_byte, fetch_word,
};
use crate::cpu::execute::{alr, anc, arr, dcp, lax, rla, sax, slo, sre};

pub(super) fn handle<C: CpuRegs>(opcode: u8, cpu: &mut C, bus: &mut Bus, cycles: &mut u32) -> bool {
    match opcode {
        // ---------------- LAX ----------------
        0xA7 => {
            let addr = addr_zp(cpu, bus);
            let v = bus.read(addr);
            lax(cpu, v);
        }
        0xB7 => {
            let addr = addr_zp_y(cpu, bus);
            let v = bus.read(addr);
            lax(cpu, v);
        }
        0xAF => {
            let addr = addr_abs(cpu, bus);
            let v = bus.read(addr);
            lax(cpu, v);
        }
        0xBF => {
            let (addr, crossed) = addr_abs_y_pc(cpu, bus);
            let v = bus.read(addr);
            lax(cpu, v);
            add_page_cross_penalty(cycles, crossed);
        }
        0xA3 => {
            let addr = addr_ind_x(cpu, bus);
            let v = bus.read(addr);
            lax(cpu, v);
        }
        0xB3 => {
            let (addr, crossed) = addr_ind_y_pc(cpu, bus);
            let v = bus.read(addr);
            lax(cpu, v);
            add_page_cross_penalty(cycles, crossed);
        }

        // ---------------- SAX ----------------
        0x87 => {
            let addr = addr_zp(cpu, bus);
            let v = sax(cpu);
            bus.write(addr, v);
        }
        0x97 => {
            let addr = addr_zp_y(cpu, bus);
            let v = sax(cpu);
            bus.write(addr, v);
        }
        0x8F => {
            let addr = addr_abs(cpu, bus);
            let v = sax(cpu);
            bus.write(addr, v);
        }
        0x83 => {
            let addr = addr_ind_x(cpu, bus);
            let v = sax(cpu);
            bus.write(addr, v);
        }

        // ---------------- DCP ----------------
        0xC7 => {
            let addr = addr_zp(cpu, bus);
            dcp(cpu, bus, addr);
        }
        0xD7 => {
            let addr = addr_zp_x(cpu, bus);
            dcp(cpu, bus, addr);
        }
        0xCF => {
            let addr = addr_abs(cpu, bus);
            dcp(cpu, bus, addr);
        }
        0xDF => {
            let addr = addr_abs_x(cpu, bus);
            dcp(cpu, bus, addr);
        }
        0xDB => {
            let addr = addr_abs_y(cpu, bus);
            dcp(cpu, bus, addr);
        }
        0xC3 => {
            let addr = addr_ind_x(cpu, bus);
            dcp(cpu, bus, addr);
        }
        0xD3 => {
            let addr = addr_ind_y(cpu, bus);
            dcp(cpu, bus, addr);
        }

        // ---------------- SLO ----------------
        0x07 => {
            let addr = addr_zp(cpu, bus);
            slo(cpu, bus, addr);
        }
        0x17 => {
            let addr = addr_zp_x(cpu, bus);
            slo(cpu, bus, addr);
        }
        0x0F => {
            let addr = addr_abs(cpu, bus);
            slo(cpu, bus, addr);
        }
        0x1F => {
            let addr = addr_abs_x(cpu, bus);
            slo(cpu, bus, addr);
        }
        0x1B => {
            let addr = addr_abs_y(cpu, bus);
            slo(cpu, bus, addr);
        }
        0x03 => {
            let addr = addr_ind_x(cpu, bus);
            slo(cpu, bus, addr);
        }
        0x13 => {
            let addr = addr_ind_y(cpu, bus);
            slo(cpu, bus, addr);
        }

        // ---------------- RLA ----------------
        0x27 => {
            let addr = addr_zp(cpu, bus);
            rla(cpu, bus, addr);
        }
        0x37 => {
            let addr = addr_zp_x(cpu, bus);
            rla(cpu, bus, addr);
        }
        0x2F => {
            let addr = addr_abs(cpu, bus);
            rla(cpu, bus, addr);
        }
        0x3F => {
            let addr = addr_abs_x(cpu, bus);
            rla(cpu, bus, addr);
        }
        0x3B => {
            let addr = addr_abs_y(cpu, bus);
            rla(cpu, bus, addr);
        }
        0x23 => {
            let addr = addr_ind_x(cpu, bus);
            rla(cpu, bus, addr);
        }
        0x33 => {
            let addr = addr_ind_y(cpu, bus);
            rla(cpu, bus, addr);
        }

        // ---------------- SRE ----------------
        0x47 => {
            let addr = addr_zp(cpu, bus);
            sre(cpu, bus, addr);
        }
        0x57 => {
            let addr = addr_zp_x(cpu, bus);
            sre(cpu, bus, addr);
        }
        0x4F => {
            let addr = addr_abs(cpu, bus);
            sre(cpu, bus, addr);
        }
        0x5F => {
            let addr = addr_abs_x(cpu, bus);
            sre(cpu, bus, addr);
        }
        0x5B => {
            let addr = addr_abs_y(cpu, bus);
            sre(cpu, bus, addr);
        }
        0x43 => {
            let addr = addr_ind_x(cpu, bus);
            sre(cpu, bus, addr);
        }
        0x53 => {
            let addr = addr_ind_y(cpu, bus);
            sre(cpu, bus, addr);
        }

        // ---------------- ANC / ALR / ARR (immediate) ----------------
        0x0B | 0x2B => {
            let v = fetch_byte(cpu, bus);
            anc(cpu, v);
        }
        0x4B => {
            let v = fetch_byte(cpu, bus);
            alr(cpu, v);
        }
        0x6B => {
            let v = fetch_byte(cpu, bus);
            arr(cpu, v);
        }

        // ---------------- SHY / SHX (unstable high-byte-AND stores) ----------------
        0x9C => {
            let base = fetch_word(cpu, bus);
            let addr = base.wrapping_add(cpu.x() as u16);
            let v = cpu.y() & ((base >> 8) as u8).wrapping_add(1);
            bus.write(addr, v);
        }
        0x9E => {
            let base = fetch_word(cpu, bus);
            let addr = base.wrapping_add(cpu.y() as u16);
            let v = cpu.x() & ((base >> 8) as u8).wrapping_add(1);
            bus.write(addr, v);
        }

        _ => return false,
    }
    true
}

#[inline]
fn add_page_cross_penalty(cycles: &mut u32, crossed: bool) {
    if crossed {
        *cycles += 1;
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::Bus;
    use crate::cartridge::Cartridge;
    use crate::cpu::core::Cpu;
    use crate::test_utils::build_nrom_with_prg;

    fn setup(prg: &[u8]) -> (Cpu, Bus) {
        let rom = build_nrom_with_prg(prg, 1, 1, None);
        let cart = Cartridge::from_ines_bytes(&rom).expect("parse");
        let mut bus = Bus::new();
        bus.attach_cartridge(cart);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        (cpu, bus)
    }

    #[test]
    fn lax_zero_page_loads_a_and_x() {
        // LAX $10, with $10 holding 0x37
        let (mut cpu, mut bus) = setup(&[0xA7, 0x10, 0x00]);
        bus.write(0x0010, 0x37);
        let _ = cpu.step(&mut bus); // LAX
        assert_eq!(cpu.a(), 0x37);
        assert_eq!(cpu.x(), 0x37);
    }

    #[test]
    fn sax_zero_page_stores_a_and_x() {
        // LDA #$F0; LDX #$3C; SAX $10
        let (mut cpu, mut bus) = setup(&[0xA9, 0xF0, 0xA2, 0x3C, 0x87, 0x10, 0x00]);
        let _ = cpu.step(&mut bus); // LDA
        let _ = cpu.step(&mut bus); // LDX
        let _ = cpu.step(&mut bus); // SAX
        assert_eq!(bus.read(0x0010), 0x30);
    }

    #[test]
    fn dcp_zero_page_decrements_and_compares() {
        // LDA #$10; DCP $10, with $10 holding 0x11 -> decrements to 0x10, CMP sets Z
        let (mut cpu, mut bus) = setup(&[0xA9, 0x10, 0xC7, 0x10, 0x00]);
        bus.write(0x0010, 0x11);
        let _ = cpu.step(&mut bus); // LDA
        let _ = cpu.step(&mut bus); // DCP
        assert_eq!(bus.read(0x0010), 0x10);
    }

    #[test]
    fn anc_immediate_matches_and_then_copies_negative_to_carry() {
        // LDA #$FF; ANC #$80
        let (mut cpu, mut bus) = setup(&[0xA9, 0xFF, 0x0B, 0x80, 0x00]);
        let _ = cpu.step(&mut bus); // LDA
        let _ = cpu.step(&mut bus); // ANC
        assert_eq!(cpu.a(), 0x80);
    }
}
