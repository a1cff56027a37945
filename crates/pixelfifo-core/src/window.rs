use log::trace;

use crate::SCREEN_WIDTH;
use crate::hardware::Model;
use crate::savestate::{SaveState, SnapshotError, StateReader, StateWriter};

/// What happened when the window was switched off during Drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowDisable {
    /// The window was being fetched on this line.
    pub was_active: bool,
    /// The next output pixel must be replaced by a color-0 background pixel.
    pub glitch: bool,
}

/// Window line counter and trigger bookkeeping.
///
/// `line` is -1 until the window first triggers in a frame. Each trigger
/// saves the counter and then increments it, so the first window line
/// fetched is line 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowState {
    line: i16,
    saved: i16,
    enable_latch: bool,
    active: bool,
    wy_triggered: bool,
    pixels_drawn: u8,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            line: -1,
            saved: -1,
            enable_latch: false,
            active: false,
            wy_triggered: false,
            pixels_drawn: 0,
        }
    }
}

impl WindowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters back to "not triggered this frame".
    pub fn reset_frame(&mut self) {
        *self = Self::default();
    }

    /// Latch LCDC.5 at the start of Drawing.
    pub fn start_line(&mut self, enabled: bool) {
        self.enable_latch = enabled;
        self.active = false;
        self.pixels_drawn = 0;
    }

    pub fn line(&self) -> i16 {
        self.line
    }

    pub fn saved(&self) -> i16 {
        self.saved
    }

    /// Whether the fetcher is producing window pixels on this line.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn wy_triggered(&self) -> bool {
        self.wy_triggered
    }

    pub fn check_vertical(&mut self, enabled: bool, wy: u8, ly: u8) {
        if enabled && wy == ly {
            self.wy_triggered = true;
        }
    }

    pub fn should_trigger(&self, enabled: bool, lcd_x: u8, wx: u8) -> bool {
        !self.active
            && enabled
            && self.wy_triggered
            && (u16::from(lcd_x) + 7 == u16::from(wx) || (wx < 7 && lcd_x == 0))
    }

    /// Start window fetching. Returns how many leading window pixels are
    /// dropped (non-zero only for WX < 7).
    pub fn trigger(&mut self, wx: u8) -> u8 {
        self.saved = self.line;
        self.line += 1;
        self.active = true;
        self.pixels_drawn = 0;
        trace!("window triggered at WX={wx}, line counter {}", self.line);
        7u8.saturating_sub(wx)
    }

    /// Count one window pixel written to the framebuffer.
    pub fn note_pixel(&mut self) {
        if self.active && usize::from(self.pixels_drawn) < SCREEN_WIDTH {
            self.pixels_drawn += 1;
        }
    }

    /// Track LCDC.5 during Drawing. A 1 to 0 edge ends window fetching; if no
    /// window pixel was drawn since the trigger, the increment is undone.
    ///
    /// On DMG hardware, once the window has triggered this frame, disabling
    /// it while `(WX + SCX) & 7 == 7` corrupts the next pixel.
    pub fn update_enable(
        &mut self,
        enabled: bool,
        model: Model,
        wx: u8,
        scx: u8,
    ) -> Option<WindowDisable> {
        let falling = self.enable_latch && !enabled;
        self.enable_latch = enabled;
        if !falling {
            return None;
        }

        let was_active = self.active;
        if was_active && self.pixels_drawn == 0 {
            self.line = self.saved;
        }
        self.active = false;

        let glitch = model == Model::Dmg
            && self.line >= 0
            && wx.wrapping_add(scx) & 7 == 7;
        if glitch {
            trace!("window disable glitch armed (WX={wx}, SCX={scx})");
        }
        Some(WindowDisable { was_active, glitch })
    }
}

impl SaveState for WindowState {
    fn save_state(&self, w: &mut StateWriter) {
        w.i16(self.line);
        w.i16(self.saved);
        w.bool(self.enable_latch);
        w.bool(self.active);
        w.bool(self.wy_triggered);
        w.u8(self.pixels_drawn);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        let line = r.i16()?;
        if !(-1..=255).contains(&line) {
            return Err(SnapshotError::invalid("window.line", line));
        }
        let saved = r.i16()?;
        if !(-1..=line.max(-1)).contains(&saved) {
            return Err(SnapshotError::invalid("window.saved", saved));
        }
        Ok(WindowState {
            line,
            saved,
            enable_latch: r.bool("window.enable_latch")?,
            active: r.bool("window.active")?,
            wy_triggered: r.bool("window.wy_triggered")?,
            pixels_drawn: r.bounded_u8("window.pixels_drawn", SCREEN_WIDTH as u8)?,
        })
    }
}
