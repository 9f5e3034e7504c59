/*!
render - Renderer and host-input contracts.

The renderer and the keyboard/gamepad are host concerns (`display`/
`screenshot` features, or whatever the embedding application uses), not
something the core crate can depend on concretely. Both surfaces are
expressed here as traits so `Bus`/`Ppu` can hand a finished frame to
*something* and pull button state from *something* without pulling
`pixels`/`winit` into the library's mandatory dependency graph.
*/

use crate::controller::Button;
use crate::error::EmuError;

/// Compositing layer a pixel belongs to; layering is the renderer's job, not
/// the core's - the PPU only tags which layer a pixel came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Layer {
    BackgroundTile,
    ForegroundSprite,
    BackgroundSprite,
}

/// What the host must provide to present a finished PPU frame.
pub trait Renderer {
    fn init(&mut self) -> Result<(), EmuError>;
    fn cleanup(&mut self);

    /// Present whatever has been written since the last `update`.
    fn update(&mut self);

    fn clear(&mut self, bg_color: (u8, u8, u8));
    fn set_pixel(&mut self, layer: Layer, x: u32, y: u32, rgb: (u8, u8, u8));

    /// Mark a background pixel transparent (color index 0); used by the host
    /// to reproduce sprite-0-hit clipping if it composites layers itself.
    fn set_transparent_pixel(&mut self, x: u32, y: u32);
    fn is_transparent_pixel(&self, x: u32, y: u32) -> bool;
}

/// What the host must provide to feed player-1 button state into the core.
/// `poll` returns the set of button transitions observed since the last
/// call; the bus forwards each as `Controller::set_button`.
pub trait InputSource {
    fn poll(&mut self) -> Vec<(Button, bool)>;
}
