use crate::SCREEN_WIDTH;
use crate::bus::VideoBus;
use crate::color::Colorizer;
use crate::fifo::{Pixel, PixelFifo};
use crate::hardware::ColorMode;
use crate::oam_scan::{OamScanResult, SpriteSlot};
use crate::registers::{LcdControl, Register};
use crate::savestate::{SaveState, SnapshotError, StateReader, StateWriter};
use crate::window::WindowState;

/// Winner of the background/sprite priority decision for one dot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Background(Pixel),
    Sprite(Pixel),
    /// DMG-style background switched off and no visible sprite.
    Blank,
}

/// Pick the pixel that reaches the screen.
///
/// DMG rules (monochrome and compatibility): LCDC.0 blanks the background;
/// an opaque sprite wins unless its BG-priority bit is set over a non-zero
/// background. CGB rules: LCDC.0 is the master priority switch, background
/// color 0 always loses, otherwise either side's priority bit gives the dot
/// to the background.
pub fn resolve_priority(
    bg: Pixel,
    sprite: Option<Pixel>,
    lcdc: LcdControl,
    color_mode: ColorMode,
) -> Resolved {
    let sprite = sprite.filter(|s| lcdc.sprites_enabled() && !s.is_transparent());
    if color_mode.uses_dmg_priority() {
        let bg = lcdc.bg_enabled().then_some(bg);
        match (bg, sprite) {
            (Some(b), Some(s)) if s.priority && !b.is_transparent() => Resolved::Background(b),
            (_, Some(s)) => Resolved::Sprite(s),
            (Some(b), None) => Resolved::Background(b),
            (None, None) => Resolved::Blank,
        }
    } else {
        match sprite {
            None => Resolved::Background(bg),
            Some(s) if !lcdc.bg_enabled() || bg.is_transparent() => Resolved::Sprite(s),
            Some(s) if s.priority || bg.priority => Resolved::Background(bg),
            Some(s) => Resolved::Sprite(s),
        }
    }
}

/// Pops the FIFOs into framebuffer columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compositor {
    lcd_x: u8,
    bg_discarded: u8,
    window_discard: u8,
    next_sprite: u8,
    glitch_pending: bool,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_line(&mut self) {
        *self = Self::default();
    }

    /// Next framebuffer column to be written.
    pub fn lcd_x(&self) -> u8 {
        self.lcd_x
    }

    pub fn line_done(&self) -> bool {
        usize::from(self.lcd_x) >= SCREEN_WIDTH
    }

    /// Index into the scan result of the next sprite to fetch.
    pub fn next_sprite(&self) -> u8 {
        self.next_sprite
    }

    pub fn glitch_pending(&self) -> bool {
        self.glitch_pending
    }

    /// The next candidate sprite, if it has reached the current column.
    pub fn pending_sprite(&self, sprites: &OamScanResult) -> Option<SpriteSlot> {
        sprites
            .get(usize::from(self.next_sprite))
            .filter(|s| u16::from(s.x) <= u16::from(self.lcd_x) + 8)
            .copied()
    }

    /// Claim the pending sprite for fetching.
    pub fn take_sprite(&mut self, sprites: &OamScanResult) -> Option<SpriteSlot> {
        let sprite = self.pending_sprite(sprites)?;
        self.next_sprite += 1;
        Some(sprite)
    }

    pub fn begin_window(&mut self, discard: u8) {
        self.window_discard = discard;
    }

    pub fn queue_glitch_pixel(&mut self) {
        self.glitch_pending = true;
    }

    /// Run the output stage for one dot. Returns the column written and its
    /// color, or `None` when the dot was spent discarding or waiting.
    pub fn tick<B: VideoBus + ?Sized>(
        &mut self,
        bus: &B,
        bg_fifo: &mut PixelFifo,
        sprite_fifo: &mut PixelFifo,
        window: &mut WindowState,
        colorizer: &Colorizer,
    ) -> Option<(u8, u32)> {
        if self.line_done() {
            return None;
        }
        if self.window_discard > 0 {
            if bg_fifo.pop().is_some() {
                self.window_discard -= 1;
            }
            return None;
        }
        if self.lcd_x == 0 && !window.is_active() && !self.glitch_pending {
            let scroll = bus.read_register(Register::Scx) & 7;
            if self.bg_discarded < scroll {
                if bg_fifo.pop().is_some() {
                    self.bg_discarded += 1;
                }
                return None;
            }
        }

        let bg = if self.glitch_pending {
            self.glitch_pending = false;
            Pixel::default()
        } else {
            bg_fifo.pop()?
        };
        let sprite = sprite_fifo.pop();

        let lcdc = bus.lcdc();
        let color = match resolve_priority(bg, sprite, lcdc, bus.color_mode()) {
            Resolved::Background(p) | Resolved::Sprite(p) => colorizer.pixel_color(bus, &p),
            Resolved::Blank => colorizer.blank_color(bus),
        };
        let column = self.lcd_x;
        self.lcd_x += 1;
        window.note_pixel();
        Some((column, color))
    }
}

impl SaveState for Compositor {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.lcd_x);
        w.u8(self.bg_discarded);
        w.u8(self.window_discard);
        w.u8(self.next_sprite);
        w.bool(self.glitch_pending);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        Ok(Compositor {
            lcd_x: r.bounded_u8("compositor.lcd_x", SCREEN_WIDTH as u8)?,
            bg_discarded: r.bounded_u8("compositor.bg_discarded", 7)?,
            window_discard: r.bounded_u8("compositor.window_discard", 7)?,
            next_sprite: r.u8()?,
            glitch_pending: r.bool("compositor.glitch_pending")?,
        })
    }
}
