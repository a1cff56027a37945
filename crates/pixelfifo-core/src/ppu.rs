use bitflags::bitflags;
use log::{debug, warn};

use crate::bus::{Interrupt, VideoBus};
use crate::color::Colorizer;
use crate::compositor::Compositor;
use crate::config::PpuConfig;
use crate::fetcher::{FetchMode, Fetcher};
use crate::fifo::PixelFifo;
use crate::hardware::Model;
use crate::oam_scan::OamScanner;
use crate::registers::{LcdMode, Register, StatInterrupts};
use crate::savestate::{SaveState, SnapshotError, StateReader, StateWriter};
use crate::window::WindowState;
use crate::{Frame, SCREEN_HEIGHT, SCREEN_WIDTH};

#[cfg(feature = "ppu-trace")]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}
#[cfg(not(feature = "ppu-trace"))]
macro_rules! ppu_trace {
    ($($arg:tt)*) => {};
}

// Timing constants in dots
pub const DOTS_PER_LINE: u16 = 456;
pub const LINES_PER_FRAME: u8 = 154;
pub const DOTS_PER_FRAME: u32 = DOTS_PER_LINE as u32 * LINES_PER_FRAME as u32;
const OAM_SCAN_DOTS: u16 = 80;
const VBLANK_START_LINE: u8 = SCREEN_HEIGHT as u8;
/// The visible mode is committed once per 4-dot step.
const MODE_STEP_DOTS: u16 = 4;

// After the display is switched back on, line 0 starts this far in with the
// scan already past this many OAM entries.
const ENABLE_START_DOT: u16 = 8;
const ENABLE_SCAN_INDEX: u8 = 4;

bitflags! {
    /// What happened during a call to [`Ppu::advance`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct PpuEvents: u8 {
        const HBLANK           = 0b0000_0001;
        const VBLANK           = 0b0000_0010;
        const FRAME_READY      = 0b0000_0100;
        const DISPLAY_ENABLED  = 0b0000_1000;
        const DISPLAY_DISABLED = 0b0001_0000;
        const STAT_INTERRUPT   = 0b0010_0000;
    }
}

/// Dot position, modes and the STAT interrupt line.
///
/// `mode` is the internal mode that sequences the pipeline; `stat_mode` is
/// what software reads back and trails `mode` by one 4-dot step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanlineClock {
    dot: u16,
    mode: LcdMode,
    stat_mode: LcdMode,
    ly: u8,
    stat_line: bool,
    stat_fired: bool,
    lyc_match: bool,
}

impl ScanlineClock {
    /// Next dot to be processed on the current line.
    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn mode(&self) -> LcdMode {
        self.mode
    }

    pub fn stat_mode(&self) -> LcdMode {
        self.stat_mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    /// Level of the OR'd STAT sources after the last dot.
    pub fn stat_line(&self) -> bool {
        self.stat_line
    }

    /// Whether the last dot produced a rising edge on the STAT line.
    pub fn stat_fired(&self) -> bool {
        self.stat_fired
    }

    pub fn lyc_match(&self) -> bool {
        self.lyc_match
    }
}

fn read_mode(r: &mut StateReader<'_>, field: &'static str) -> Result<LcdMode, SnapshotError> {
    let bits = r.u8()?;
    LcdMode::from_bits(bits).ok_or_else(|| SnapshotError::invalid(field, bits))
}

impl SaveState for ScanlineClock {
    fn save_state(&self, w: &mut StateWriter) {
        w.u16(self.dot);
        w.u8(self.mode.bits());
        w.u8(self.stat_mode.bits());
        w.u8(self.ly);
        w.bool(self.stat_line);
        w.bool(self.stat_fired);
        w.bool(self.lyc_match);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        let dot = r.u16()?;
        if dot >= DOTS_PER_LINE {
            return Err(SnapshotError::invalid("clock.dot", dot));
        }
        Ok(ScanlineClock {
            dot,
            mode: read_mode(r, "clock.mode")?,
            stat_mode: read_mode(r, "clock.stat_mode")?,
            ly: r.bounded_u8("clock.ly", LINES_PER_FRAME - 1)?,
            stat_line: r.bool("clock.stat_line")?,
            stat_fired: r.bool("clock.stat_fired")?,
            lyc_match: r.bool("clock.lyc_match")?,
        })
    }
}

pub type FrameCallback = Box<dyn FnMut(&Frame)>;

/// The picture pipeline.
///
/// Owns the scanline clock and every pipeline stage; memory and registers
/// are reached through the [`VideoBus`] passed to each call.
pub struct Ppu {
    model: Model,
    enabled: bool,
    /// First line after the display was switched on: STAT reads mode 0 until
    /// Drawing starts.
    lcd_turning_on: bool,
    /// Suppress the frame callback for the first frame after switch-on.
    skip_frame: bool,
    frames: u64,

    clock: ScanlineClock,
    scanner: OamScanner,
    compositor: Compositor,
    window: WindowState,
    bg_fifo: PixelFifo,
    sprite_fifo: PixelFifo,
    fetcher: Fetcher,

    framebuffer: Box<Frame>,
    colorizer: Colorizer,
    frame_callback: Option<FrameCallback>,
}

impl Ppu {
    /// A pipeline with the display off, as at power-on before LCDC.7 is set.
    pub fn new(model: Model) -> Self {
        Self {
            model,
            enabled: false,
            lcd_turning_on: false,
            skip_frame: false,
            frames: 0,
            clock: ScanlineClock::default(),
            scanner: OamScanner::new(),
            compositor: Compositor::new(),
            window: WindowState::new(),
            bg_fifo: PixelFifo::new(),
            sprite_fifo: PixelFifo::new(),
            fetcher: Fetcher::new(),
            framebuffer: Box::new([0; SCREEN_WIDTH * SCREEN_HEIGHT]),
            colorizer: Colorizer::default(),
            frame_callback: None,
        }
    }

    pub fn with_config(config: &PpuConfig) -> Self {
        let mut ppu = Self::new(config.model);
        ppu.colorizer = config.colorizer();
        ppu
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn colorizer(&self) -> Colorizer {
        self.colorizer
    }

    pub fn set_colorizer(&mut self, colorizer: Colorizer) {
        self.colorizer = colorizer;
    }

    /// Register the presentation hook, called with every completed frame.
    pub fn set_frame_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Frame) + 'static,
    {
        self.frame_callback = Some(Box::new(callback));
    }

    pub fn clear_frame_callback(&mut self) {
        self.frame_callback = None;
    }

    /// Initialize the pipeline to the running state the boot ROM leaves
    /// behind: display on, start of line 0, no frame suppressed. The bus must
    /// report LCDC.7 set or the next dot switches the display off again.
    pub fn apply_boot_state(&mut self) {
        self.enabled = true;
        self.lcd_turning_on = false;
        self.skip_frame = false;
        self.clock = ScanlineClock {
            mode: LcdMode::OamScan,
            stat_mode: LcdMode::OamScan,
            ..ScanlineClock::default()
        };
        self.reset_line_state();
        self.window.reset_frame();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Mode as software sees it in STAT.
    pub fn mode(&self) -> LcdMode {
        if self.enabled {
            self.clock.stat_mode
        } else {
            LcdMode::HBlank
        }
    }

    /// Mode that currently sequences the pipeline.
    pub fn internal_mode(&self) -> LcdMode {
        self.clock.mode
    }

    pub fn ly(&self) -> u8 {
        self.clock.ly
    }

    pub fn dot(&self) -> u16 {
        self.clock.dot
    }

    /// Number of VBlank periods entered since power-on.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn framebuffer(&self) -> &Frame {
        &self.framebuffer
    }

    pub fn clock(&self) -> &ScanlineClock {
        &self.clock
    }

    pub fn scanner(&self) -> &OamScanner {
        &self.scanner
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn window(&self) -> &WindowState {
        &self.window
    }

    pub fn bg_fifo(&self) -> &PixelFifo {
        &self.bg_fifo
    }

    pub fn sprite_fifo(&self) -> &PixelFifo {
        &self.sprite_fifo
    }

    /// STAT bits 0-2: visible mode and the LY==LYC flag.
    pub fn status_bits(&self) -> u8 {
        self.mode().bits() | if self.clock.lyc_match { 0x04 } else { 0 }
    }

    pub fn oam_read_locked(&self) -> bool {
        self.enabled && matches!(self.clock.mode, LcdMode::OamScan | LcdMode::Drawing)
    }

    /// OAM stays writable during the shortened scan of the first line after
    /// switch-on.
    pub fn oam_write_locked(&self) -> bool {
        self.enabled
            && match self.clock.mode {
                LcdMode::Drawing => true,
                LcdMode::OamScan => !self.lcd_turning_on,
                _ => false,
            }
    }

    /// CGB hardware also blocks VRAM reads on the last OAM scan dot.
    pub fn vram_read_locked(&self) -> bool {
        self.enabled
            && match self.clock.mode {
                LcdMode::Drawing => true,
                LcdMode::OamScan => {
                    self.model == Model::Cgb && self.clock.dot == OAM_SCAN_DOTS - 1
                }
                _ => false,
            }
    }

    pub fn vram_write_locked(&self) -> bool {
        self.enabled && self.clock.mode == LcdMode::Drawing
    }

    /// Whether an HBlank block copy may run now.
    pub fn hblank_dma_ready(&self) -> bool {
        !self.enabled || self.clock.mode == LcdMode::HBlank
    }

    /// Run the pipeline for `dots` dots.
    ///
    /// Work is done one dot at a time, so splitting a dot count across
    /// several calls gives the same result as a single call.
    pub fn advance<B: VideoBus + ?Sized>(&mut self, dots: u32, bus: &mut B) -> PpuEvents {
        let mut events = PpuEvents::empty();
        for _ in 0..dots {
            events |= self.tick(bus);
        }
        events
    }

    /// Apply a change of LCDC.7. Called at the start of every dot; a bus
    /// owner may also call it right after an LCDC write.
    pub fn sync_display_enable<B: VideoBus + ?Sized>(&mut self, bus: &B) -> PpuEvents {
        let on = bus.lcdc().display_enabled();
        match (self.enabled, on) {
            (false, true) => {
                self.enable_display(bus);
                PpuEvents::DISPLAY_ENABLED
            }
            (true, false) => {
                self.disable_display();
                PpuEvents::DISPLAY_DISABLED
            }
            _ => PpuEvents::empty(),
        }
    }

    fn enable_display<B: VideoBus + ?Sized>(&mut self, bus: &B) {
        debug!("LCD enabled, frame {}", self.frames);
        self.enabled = true;
        self.lcd_turning_on = true;
        self.skip_frame = true;
        self.clock = ScanlineClock {
            dot: ENABLE_START_DOT,
            mode: LcdMode::OamScan,
            stat_mode: LcdMode::HBlank,
            ly: 0,
            lyc_match: bus.read_register(Register::Lyc) == 0,
            ..ScanlineClock::default()
        };
        self.reset_line_state();
        self.scanner.reset_to(ENABLE_SCAN_INDEX);
        self.window.reset_frame();
    }

    fn disable_display(&mut self) {
        debug!(
            "LCD disabled at LY={} dot={} ({})",
            self.clock.ly, self.clock.dot, self.clock.mode
        );
        self.enabled = false;
        self.lcd_turning_on = false;
        self.clock = ScanlineClock {
            lyc_match: self.clock.lyc_match,
            ..ScanlineClock::default()
        };
        self.reset_line_state();
        self.window.reset_frame();
    }

    /// Clear the per-line pipeline: scan result, fetcher, FIFOs, compositor.
    fn reset_line_state(&mut self) {
        self.scanner.reset();
        self.fetcher.reset();
        self.bg_fifo.clear();
        self.sprite_fifo.clear();
        self.compositor.start_line();
    }

    fn tick<B: VideoBus + ?Sized>(&mut self, bus: &mut B) -> PpuEvents {
        let mut events = self.sync_display_enable(bus);
        if !self.enabled {
            return events;
        }

        let dot = self.clock.dot;
        match self.clock.mode {
            LcdMode::OamScan => {
                let lcdc = bus.lcdc();
                self.scanner.tick(dot, self.clock.ly, bus);
                self.window.check_vertical(
                    lcdc.window_enabled(),
                    bus.read_register(Register::Wy),
                    self.clock.ly,
                );
            }
            LcdMode::Drawing => self.draw_dot(bus),
            LcdMode::HBlank | LcdMode::VBlank => {}
        }

        if dot % MODE_STEP_DOTS == MODE_STEP_DOTS - 1 {
            self.clock.stat_mode = if self.lcd_turning_on {
                LcdMode::HBlank
            } else {
                self.clock.mode
            };
        }

        self.clock.dot += 1;
        match self.clock.mode {
            LcdMode::OamScan if self.scanner.is_done() => self.enter_drawing(bus),
            LcdMode::Drawing if self.compositor.line_done() => {
                self.enter_hblank();
                events |= PpuEvents::HBLANK;
            }
            _ => {}
        }

        if self.clock.dot == DOTS_PER_LINE {
            self.clock.dot = 0;
            self.clock.ly = (self.clock.ly + 1) % LINES_PER_FRAME;
            match self.clock.ly {
                VBLANK_START_LINE => events |= self.enter_vblank(bus),
                ly if ly < VBLANK_START_LINE => self.enter_oam_scan(),
                _ => {}
            }
        }

        self.clock.lyc_match = self.clock.ly == bus.read_register(Register::Lyc);
        if self.update_stat(bus) {
            events |= PpuEvents::STAT_INTERRUPT;
        }
        events
    }

    fn draw_dot<B: VideoBus + ?Sized>(&mut self, bus: &B) {
        let lcdc = bus.lcdc();
        let ly = self.clock.ly;
        let wx = bus.read_register(Register::Wx);
        let scx = bus.read_register(Register::Scx);

        if let Some(disable) =
            self.window
                .update_enable(lcdc.window_enabled(), self.model, wx, scx)
        {
            if disable.was_active {
                self.fetcher.leave_window();
            }
            if disable.glitch {
                self.compositor.queue_glitch_pixel();
            }
        }
        self.window
            .check_vertical(lcdc.window_enabled(), bus.read_register(Register::Wy), ly);

        if self.fetcher.mode() != FetchMode::Sprite && self.fetcher.dummy_done() {
            if let Some(sprite) = self.compositor.take_sprite(self.scanner.result()) {
                self.fetcher.begin_sprite(sprite, self.compositor.lcd_x());
            }
        }

        self.fetcher.tick(
            bus,
            ly,
            self.window.line(),
            &mut self.bg_fifo,
            &mut self.sprite_fifo,
        );

        if !self.fetcher.dummy_done()
            || self.fetcher.mode() == FetchMode::Sprite
            || self.compositor.pending_sprite(self.scanner.result()).is_some()
        {
            return;
        }

        if self
            .window
            .should_trigger(lcdc.window_enabled(), self.compositor.lcd_x(), wx)
        {
            let discard = self.window.trigger(wx);
            self.bg_fifo.clear();
            self.fetcher.enter_window();
            self.compositor.begin_window(discard);
            return;
        }

        if let Some((column, color)) = self.compositor.tick(
            bus,
            &mut self.bg_fifo,
            &mut self.sprite_fifo,
            &mut self.window,
            &self.colorizer,
        ) {
            self.framebuffer[usize::from(ly) * SCREEN_WIDTH + usize::from(column)] = color;
        }
    }

    fn enter_drawing<B: VideoBus + ?Sized>(&mut self, bus: &B) {
        debug_assert_eq!(self.clock.dot, OAM_SCAN_DOTS);
        self.clock.mode = LcdMode::Drawing;
        self.lcd_turning_on = false;
        self.window.start_line(bus.lcdc().window_enabled());
        self.compositor.start_line();
        self.fetcher.reset();
    }

    fn enter_hblank(&mut self) {
        ppu_trace!(
            "LY={} drawing ended at dot {} ({} sprites)",
            self.clock.ly,
            self.clock.dot,
            self.scanner.result().len()
        );
        self.clock.mode = LcdMode::HBlank;
        self.fetcher.reset();
        self.bg_fifo.clear();
        self.sprite_fifo.clear();
    }

    fn enter_oam_scan(&mut self) {
        self.clock.mode = LcdMode::OamScan;
        self.reset_line_state();
    }

    fn enter_vblank<B: VideoBus + ?Sized>(&mut self, bus: &mut B) -> PpuEvents {
        self.clock.mode = LcdMode::VBlank;
        if self.model == Model::Dmg {
            self.clock.stat_mode = LcdMode::VBlank;
        }
        self.reset_line_state();
        self.window.reset_frame();
        self.frames = self.frames.wrapping_add(1);
        bus.request_interrupt(Interrupt::VBlank);

        let mut events = PpuEvents::VBLANK;
        if self.skip_frame {
            self.skip_frame = false;
            debug!("Suppressing first frame after LCD enable");
        } else {
            if let Some(callback) = self.frame_callback.as_mut() {
                callback(&self.framebuffer);
            }
            events |= PpuEvents::FRAME_READY;
        }
        events
    }

    /// Evaluate the STAT line and request an interrupt on a rising edge.
    fn update_stat<B: VideoBus + ?Sized>(&mut self, bus: &mut B) -> bool {
        let enables = StatInterrupts::from_bits_truncate(bus.read_register(Register::Stat));
        let mode_source = match self.clock.stat_mode {
            LcdMode::HBlank => enables.contains(StatInterrupts::HBLANK),
            LcdMode::VBlank => enables.contains(StatInterrupts::VBLANK),
            LcdMode::OamScan => enables.contains(StatInterrupts::OAM_SCAN),
            LcdMode::Drawing => false,
        };
        let level =
            mode_source || (self.clock.lyc_match && enables.contains(StatInterrupts::LINE_COMPARE));
        let fired = level && !self.clock.stat_line;
        self.clock.stat_line = level;
        self.clock.stat_fired = fired;
        if fired {
            bus.request_interrupt(Interrupt::Stat);
        }
        fired
    }

    /// Serialize every pipeline field in snapshot order.
    pub fn save_state(&self) -> Vec<u8> {
        let mut w = StateWriter::with_header();
        w.bool(self.enabled);
        w.bool(self.lcd_turning_on);
        w.bool(self.skip_frame);
        w.u64(self.frames);
        self.clock.save_state(&mut w);
        self.scanner.save_state(&mut w);
        self.compositor.save_state(&mut w);
        self.window.save_state(&mut w);
        self.bg_fifo.save_state(&mut w);
        self.sprite_fifo.save_state(&mut w);
        self.fetcher.save_state(&mut w);
        for &pixel in self.framebuffer.iter() {
            w.u32(pixel);
        }
        w.into_inner()
    }

    /// Restore a snapshot made by [`Ppu::save_state`]. On error the pipeline
    /// is left exactly as it was.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        match Self::parse_state(data) {
            Ok(state) => {
                self.commit_state(state);
                Ok(())
            }
            Err(e) => {
                warn!("Rejected PPU snapshot: {e}");
                Err(e)
            }
        }
    }

    fn parse_state(data: &[u8]) -> Result<ParsedState, SnapshotError> {
        let mut r = StateReader::with_header(data)?;
        let enabled = r.bool("enabled")?;
        let lcd_turning_on = r.bool("lcd_turning_on")?;
        let skip_frame = r.bool("skip_frame")?;
        let frames = r.u64()?;
        let clock = ScanlineClock::load_state(&mut r)?;
        let scanner = OamScanner::load_state(&mut r)?;
        let compositor = Compositor::load_state(&mut r)?;
        let window = WindowState::load_state(&mut r)?;
        let bg_fifo = PixelFifo::load_state(&mut r)?;
        let sprite_fifo = PixelFifo::load_state(&mut r)?;
        let fetcher = Fetcher::load_state(&mut r)?;
        let mut framebuffer: Box<Frame> = Box::new([0; SCREEN_WIDTH * SCREEN_HEIGHT]);
        for pixel in framebuffer.iter_mut() {
            *pixel = r.u32()?;
            if *pixel > 0x00FF_FFFF {
                return Err(SnapshotError::invalid("framebuffer", *pixel));
            }
        }
        r.finish()?;

        if usize::from(compositor.next_sprite()) > scanner.result().len() {
            return Err(SnapshotError::invalid(
                "compositor.next_sprite",
                compositor.next_sprite(),
            ));
        }
        let in_vblank = clock.mode() == LcdMode::VBlank;
        if in_vblank != (clock.ly() >= VBLANK_START_LINE) {
            return Err(SnapshotError::invalid("clock.ly", clock.ly()));
        }
        match clock.mode() {
            LcdMode::OamScan if clock.dot() >= OAM_SCAN_DOTS => {
                return Err(SnapshotError::invalid("clock.dot", clock.dot()));
            }
            // one entry per two dots, counted from the start of the line
            LcdMode::OamScan if u16::from(scanner.index()) != clock.dot() / 2 => {
                return Err(SnapshotError::invalid("scan.index", scanner.index()));
            }
            LcdMode::Drawing if clock.dot() < OAM_SCAN_DOTS => {
                return Err(SnapshotError::invalid("clock.dot", clock.dot()));
            }
            _ => {}
        }

        Ok(ParsedState {
            enabled,
            lcd_turning_on,
            skip_frame,
            frames,
            clock,
            scanner,
            compositor,
            window,
            bg_fifo,
            sprite_fifo,
            fetcher,
            framebuffer,
        })
    }

    fn commit_state(&mut self, state: ParsedState) {
        self.enabled = state.enabled;
        self.lcd_turning_on = state.lcd_turning_on;
        self.skip_frame = state.skip_frame;
        self.frames = state.frames;
        self.clock = state.clock;
        self.scanner = state.scanner;
        self.compositor = state.compositor;
        self.window = state.window;
        self.bg_fifo = state.bg_fifo;
        self.sprite_fifo = state.sprite_fifo;
        self.fetcher = state.fetcher;
        self.framebuffer = state.framebuffer;
    }
}

struct ParsedState {
    enabled: bool,
    lcd_turning_on: bool,
    skip_frame: bool,
    frames: u64,
    clock: ScanlineClock,
    scanner: OamScanner,
    compositor: Compositor,
    window: WindowState,
    bg_fifo: PixelFifo,
    sprite_fifo: PixelFifo,
    fetcher: Fetcher,
    framebuffer: Box<Frame>,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new(Model::Dmg)
    }
}
