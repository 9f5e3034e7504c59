/*!
dispatch.rs - Orchestrator for a single 6502 CPU step (DMA / interrupts / dispatch)

Overview
========
Coordinates a single CPU instruction step:
1. Handles OAM DMA stall (burn 1 cycle; no opcode fetch).
2. Services pending NMI or maskable IRQ (7-cycle interrupt entry).
3. Falls back to the match-based fallback dispatcher for remaining opcodes (which now delegates any trivial or unknown opcode to the consolidated `fallback_final` handler).

Architecture
============
- Orchestrator: resolves pre-instruction concerns (DMA, interrupts) and
  delegates instruction execution.
- Fallback dispatcher (`dispatch::fallback::step`): performs opcode fetch,
  family handler chain (including the illegal-opcode family), and delegates
  finalization (RMW adjustment + bus tick) to `finalize::finalize_and_tick`
  or directly to `finalize::handle_trivial_or_unknown` for NOP / unknown.

Cycle Ticking
=============
- DMA & interrupt paths tick cycles directly here.
- Fallback path ticks once in its own finalizer (after RMW adjustment).

Design Notes
============
- Unknown opcodes in fallback cause `cpu.halted = true` (via `finalize::handle_trivial_or_unknown`).
*/

#![allow(dead_code)]

use crate::bus::Bus;
pub(crate) mod arithmetic;
pub(crate) mod branches;
pub(crate) mod compare; // extracted compare (CMP/CPX/CPY) opcode family handler
pub(crate) mod control_flow;
mod fallback; // fallback match-based dispatcher (formerly legacy)
pub(crate) mod finalize; // centralized finalization & trivial/unknown opcode handling
pub(crate) mod illegal; // undocumented/"illegal" opcode family handler
pub(crate) mod load_store; // extracted load/store family handler
pub(crate) mod logical;
pub(crate) mod misc;
pub(crate) mod rmw; // extracted RMW / shift / INC / DEC opcode family handler // extracted control-flow (JMP/JSR/RTS/RTI/BRK) // extracted transfers / stack / flags opcode family handler
use crate::cpu::execute::{
    get_flag,
    push_status_with_break,
    push_word,
    set_flag, // for interrupt handling
};
use crate::cpu::regs::CpuRegs;
use crate::cpu::state::IRQ_DISABLE;

/// Execute one CPU step (including DMA stall / interrupts) and return cycles consumed.
pub(crate) fn step<C: CpuRegs>(cpu: &mut C, bus: &mut Bus) -> u32 {
    // 1. OAM DMA stall: burn one cycle and return (no opcode consumed)
    if bus.dma_is_active() {
        bus.tick(1);
        return 1;
    }

    // 2. Non-maskable interrupt (NMI)
    if bus.nmi_pending {
        service_interrupt(cpu, bus, 0xFFFA);
        bus.nmi_pending = false;
        // 7 cycles already ticked in service_interrupt
        return 7;
    }

    // 3. Maskable IRQ (line asserted & I flag clear)
    if bus.irq_line && !get_flag(cpu, IRQ_DISABLE) {
        service_interrupt(cpu, bus, 0xFFFE);
        // 7 cycles already ticked
        return 7;
    }

    // 4. Fallback: fallback dispatcher owns full fetch/decode/execute
    fallback::step(cpu, bus)
}

/// Common interrupt entry sequence (push PC, status with Break=0; set I; load vector).
/// Ticks 7 cycles (interrupt entry timing).
fn service_interrupt<C: CpuRegs>(cpu: &mut C, bus: &mut Bus, vector_addr: u16) {
    // Push current PC
    let current_pc = cpu.pc();
    push_word(cpu, bus, current_pc);
    // Push processor status with Break flag cleared
    push_status_with_break(cpu, bus, false);
    // Set Interrupt Disable
    set_flag(cpu, IRQ_DISABLE, true);
    // Load new PC from vector
    let new_pc = bus.read_word(vector_addr);
    cpu.set_pc(new_pc);
    // Total cycles: 7 (lump-sum interrupt entry)
    bus.tick(7);
}
