#![doc = r#"
PPU renderer module

Responsibilities
- Orchestrates per-dot timing and scanline/frame progression.
- Hosts `Ppu::tick`, the cycle-accurate entry point that drives the loopy `v`/`t`
  latch copies, the background/sprite fetch pipelines, and per-pixel output.
- Integrates background and sprite helpers at the correct dots.

Submodules (structure overview)
- `registers.rs` — CPU-visible register semantics ($2000–$2007)
- `memory.rs` — OAM peek/poke and OAM DMA helpers
- `oam_eval.rs` — sprite evaluation phases (CLEAR/EVALUATE/FETCH)
- `fetch.rs` — per-dot background fetch, palette lookup, and bg_opaque updates
- `sprite.rs` — sprite shift registers and per-dot sprite pixel output
- `renderer.rs` — this module: timing orchestration and composition

Public API
- `Ppu::tick(&mut self, bus: &impl PpuBus)`: advance one PPU dot (invoked 3x per CPU cycle).

Notes
- Uses the canonical `crate::bus::interfaces::PpuBus` for bus-facing reads.
- Child modules implement inherent methods on `Ppu` and access private fields directly.
"#]

use super::*;

impl Ppu {
    /// Advance one PPU dot (invoked 3x per CPU cycle by the bus).
    ///
    /// Dot/scanline phases on visible and pre-render lines:
    ///   * CLEAR secondary OAM: dots   1- 64
    ///   * EVALUATE (primary OAM): dots 65-256
    ///   * FETCH sprite patterns: dots 257-320
    ///   * IDLE / BG prefetch: dots 321-340
    /// Visible dots for pixel generation: 1-256 on scanlines 0-239.
    ///
    /// `v`/`t` latch copies follow the nesdev "PPU scrolling" timing: the
    /// pre-render line's dot 1 does the full `v = t` latch once per frame,
    /// and every visible scanline's dot 1 re-copies `t`'s horizontal bits
    /// (coarse-X, nametable-X) into `v`. `v`'s fine-Y/coarse-Y/nametable-Y
    /// bits increment once per visible scanline at dot 256, mirroring real
    /// hardware's end-of-line Y increment.
    pub fn tick<B: crate::bus::interfaces::PpuBus>(&mut self, bus: &B) {
        self.dot = self.dot.wrapping_add(1);

        let rendering_enabled = (self.mask & 0x18) != 0;

        // Entering first dot of a scanline: handle vblank / pre-render housekeeping
        if self.dot == 1 {
            if self.scanline == 241 {
                // Entering VBlank
                self.set_vblank(true);
                if self.nmi_enabled() {
                    self.nmi_latch = true;
                }
            } else if self.scanline == -1 {
                // Pre-render line: clear status flags at start, and latch the
                // full scroll address (both horizontal and vertical bits) from
                // `t` into `v` ahead of the frame's first visible scanline.
                self.set_vblank(false);
                self.set_sprite_zero_hit(false);
                self.set_sprite_overflow(false);
                self.frame_complete = false;
                if rendering_enabled {
                    self.v = self.t;
                }
            } else if self.scanline >= 0 && self.scanline < NES_HEIGHT as i16 {
                // Start of a visible scanline: load sprite shift registers from
                // fetched patterns, then re-copy only the horizontal half of `t`
                // into `v` so mid-frame $2005/$2006 writes take effect per-line.
                self.load_sprite_shift_registers();
                if rendering_enabled {
                    self.v = (self.v & !0x041F) | (self.t & 0x041F);
                }
            }
        }

        let visible_scanline = self.scanline >= 0 && self.scanline < NES_HEIGHT as i16;
        let prerender_line = self.scanline == -1;

        if visible_scanline || prerender_line {
            // --- Sprite pipeline phases ---
            if self.dot >= 1 && self.dot <= 64 {
                self.oam_clear_step();
            } else if self.dot >= 65 && self.dot <= 256 {
                self.oam_evaluate_step();
            } else if self.dot >= 257 && self.dot <= 320 {
                self.oam_fetch_step(bus);
            } else if self.dot >= 321 && self.dot <= 340 {
                // BG prefetch phase; sprite pipeline idle
            }

            // Per-dot background + sprite pixel production
            if visible_scanline && (1..=256).contains(&self.dot) {
                self.per_dot_background_pixel(bus);
                self.produce_sprite_pixel(bus, (self.dot - 1) as usize, self.scanline as usize);
                if self.dot == 256 && rendering_enabled {
                    self.increment_fine_y();
                }
            }
        }

        // End-of-scanline wrap
        if self.dot >= 341 {
            self.dot = 0;
            self.scanline += 1;
            self.scanline_end_latch = true;
            if self.scanline > 260 {
                self.scanline = -1;
                self.frame_complete = true;
            }
        }
    }

    /// Loopy fine-Y/coarse-Y increment, run once per visible scanline at dot
    /// 256. Wraps coarse-Y at the 30th row (toggling the vertical nametable
    /// bit) but also at row 31, which nametable writers sometimes leave `v`
    /// parked on without toggling the nametable (nesdev "PPU scrolling").
    pub(in crate::ppu) fn increment_fine_y(&mut self) {
        if (self.v & 0x7000) != 0x7000 {
            self.v += 0x1000;
        } else {
            self.v &= !0x7000;
            let mut y = (self.v & 0x03E0) >> 5;
            if y == 29 {
                y = 0;
                self.v ^= 0x0800;
            } else if y == 31 {
                y = 0;
            } else {
                y += 1;
            }
            self.v = (self.v & !0x03E0) | (y << 5);
        }
    }

    /// Hand the already-composited framebuffer to a host renderer, one
    /// pixel at a time. Layering has already happened inside `tick`; every
    /// pixel is reported as `BackgroundTile` except where the background
    /// itself was transparent, which the host needs for its own
    /// sprite-0-hit clipping if it composites further.
    pub fn present<R: crate::render::Renderer>(&self, renderer: &mut R) {
        for y in 0..NES_HEIGHT {
            for x in 0..NES_WIDTH {
                let fi = (y * NES_WIDTH + x) * BYTES_PER_PIXEL;
                let rgb = (
                    self.framebuffer[fi],
                    self.framebuffer[fi + 1],
                    self.framebuffer[fi + 2],
                );
                if self.bg_opaque[y * NES_WIDTH + x] == 0 {
                    renderer.set_transparent_pixel(x as u32, y as u32);
                }
                renderer.set_pixel(crate::render::Layer::BackgroundTile, x as u32, y as u32, rgb);
            }
        }
        renderer.update();
    }
}
