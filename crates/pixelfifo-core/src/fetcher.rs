use crate::bus::{Layer, VideoBus};
use crate::fifo::{FIFO_CAPACITY, PaletteRef, Pixel, PixelFifo};
use crate::oam_scan::SpriteSlot;
use crate::registers::{self, LcdControl, Register, TileAttributes};
use crate::savestate::{SaveState, SnapshotError, StateReader, StateWriter};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchMode {
    #[default]
    Background,
    Window,
    Sprite,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchStep {
    #[default]
    TileId,
    DataLow,
    DataHigh,
    Push,
}

impl FetchMode {
    fn tag(self) -> u8 {
        match self {
            FetchMode::Background => 0,
            FetchMode::Window => 1,
            FetchMode::Sprite => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FetchMode::Background),
            1 => Some(FetchMode::Window),
            2 => Some(FetchMode::Sprite),
            _ => None,
        }
    }
}

impl FetchStep {
    fn tag(self) -> u8 {
        match self {
            FetchStep::TileId => 0,
            FetchStep::DataLow => 1,
            FetchStep::DataHigh => 2,
            FetchStep::Push => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FetchStep::TileId),
            1 => Some(FetchStep::DataLow),
            2 => Some(FetchStep::DataHigh),
            3 => Some(FetchStep::Push),
            _ => None,
        }
    }
}

/// Address of one tile row's low bitplane within a VRAM bank.
///
/// Bit 12 is set for ids 0x00-0x7F in signed (0x8800) addressing mode, which
/// places them at 0x9000-0x97FF.
pub fn tile_data_address(lcdc: LcdControl, tile_id: u8, fine_y: u8) -> u16 {
    let extra = u16::from(!lcdc.unsigned_tile_data() && tile_id < 0x80) << 12;
    extra | u16::from(tile_id) << 4 | u16::from(fine_y & 7) << 1
}

#[inline(always)]
fn color_bits(low: u8, high: u8, bit: u8) -> u8 {
    ((high >> bit) & 1) << 1 | ((low >> bit) & 1)
}

/// Four-step tile fetcher feeding both pixel FIFOs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fetcher {
    mode: FetchMode,
    step: FetchStep,
    /// Tile column, shared by background and window fetches.
    cursor: u8,
    tile_id: u8,
    attributes: TileAttributes,
    data_low: u8,
    data_high: u8,
    /// Mode and step a sprite fetch interrupted.
    suspended: (FetchMode, FetchStep),
    staging: [Pixel; FIFO_CAPACITY],
    ready: bool,
    dummy_done: bool,
    sprite: SpriteSlot,
    sprite_clip: u8,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to the start-of-line state, dummy fetch pending.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn step(&self) -> FetchStep {
        self.step
    }

    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    /// Whether the discarded first fetch of the line has finished.
    pub fn dummy_done(&self) -> bool {
        self.dummy_done
    }

    /// Whether the staging buffer holds a decoded background/window tile.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn staging(&self) -> &[Pixel; FIFO_CAPACITY] {
        &self.staging
    }

    /// Switch to window fetching from column 0.
    pub fn enter_window(&mut self) {
        self.mode = FetchMode::Window;
        self.step = FetchStep::TileId;
        self.cursor = 0;
        self.ready = false;
    }

    /// Return to background fetching, keeping the shared cursor.
    pub fn leave_window(&mut self) {
        match self.mode {
            FetchMode::Window => {
                self.mode = FetchMode::Background;
                self.step = FetchStep::TileId;
                self.ready = false;
            }
            FetchMode::Sprite if self.suspended.0 == FetchMode::Window => {
                self.suspended = (FetchMode::Background, FetchStep::TileId);
                self.ready = false;
            }
            _ => {}
        }
    }

    /// Suspend the current fetch and start fetching `sprite`. Pixels left of
    /// column `lcd_x` are clipped.
    pub fn begin_sprite(&mut self, sprite: SpriteSlot, lcd_x: u8) {
        debug_assert!(self.mode != FetchMode::Sprite);
        self.suspended = (self.mode, self.step);
        self.mode = FetchMode::Sprite;
        self.step = FetchStep::TileId;
        self.sprite = sprite;
        let clip = (u16::from(lcd_x) + 8).saturating_sub(u16::from(sprite.x));
        self.sprite_clip = clip.min(FIFO_CAPACITY as u16) as u8;
    }

    /// Run one fetcher step.
    pub fn tick<B: VideoBus + ?Sized>(
        &mut self,
        bus: &B,
        ly: u8,
        window_line: i16,
        bg_fifo: &mut PixelFifo,
        sprite_fifo: &mut PixelFifo,
    ) {
        match self.mode {
            FetchMode::Background | FetchMode::Window => {
                self.tick_tile(bus, ly, window_line, bg_fifo)
            }
            FetchMode::Sprite => self.tick_sprite(bus, ly, sprite_fifo),
        }
    }

    fn map_address<B: VideoBus + ?Sized>(&self, bus: &B, ly: u8, window_line: i16) -> u16 {
        let lcdc = bus.lcdc();
        match self.mode {
            FetchMode::Window => {
                let row = (window_line.max(0) as u16 >> 3) & 31;
                lcdc.window_map_base() + row * 32 + u16::from(self.cursor & 31)
            }
            _ => {
                let scy = bus.read_register(Register::Scy);
                let scx = bus.read_register(Register::Scx);
                let row = u16::from(ly.wrapping_add(scy) >> 3);
                let col = u16::from((scx >> 3).wrapping_add(self.cursor) & 31);
                lcdc.bg_map_base() + row * 32 + col
            }
        }
    }

    fn fine_y<B: VideoBus + ?Sized>(&self, bus: &B, ly: u8, window_line: i16) -> u8 {
        let y = match self.mode {
            FetchMode::Window => window_line.max(0) as u8,
            _ => ly.wrapping_add(bus.read_register(Register::Scy)),
        } & 7;
        if self.attributes.y_flip() { 7 - y } else { y }
    }

    fn tile_row_address<B: VideoBus + ?Sized>(&self, bus: &B, ly: u8, window_line: i16) -> u16 {
        tile_data_address(bus.lcdc(), self.tile_id, self.fine_y(bus, ly, window_line))
    }

    fn tick_tile<B: VideoBus + ?Sized>(
        &mut self,
        bus: &B,
        ly: u8,
        window_line: i16,
        bg_fifo: &mut PixelFifo,
    ) {
        match self.step {
            FetchStep::TileId => {
                let addr = self.map_address(bus, ly, window_line);
                self.tile_id = bus.vram_byte(0, addr);
                self.attributes = if bus.color_mode().uses_cgb_attributes() {
                    TileAttributes::from_bits_retain(bus.vram_byte(1, addr))
                } else {
                    TileAttributes::empty()
                };
                self.step = FetchStep::DataLow;
            }
            FetchStep::DataLow => {
                let addr = self.tile_row_address(bus, ly, window_line);
                self.data_low = bus.vram_byte(self.attributes.vram_bank(), addr);
                self.step = FetchStep::DataHigh;
            }
            FetchStep::DataHigh => {
                let addr = self.tile_row_address(bus, ly, window_line) + 1;
                self.data_high = bus.vram_byte(self.attributes.vram_bank(), addr);
                self.decode_tile(bus);
                self.step = FetchStep::Push;
            }
            FetchStep::Push => {
                if !self.dummy_done {
                    self.dummy_done = true;
                    self.ready = false;
                    self.step = FetchStep::TileId;
                } else if bg_fifo.push_batch(&self.staging) {
                    self.cursor = self.cursor.wrapping_add(1);
                    self.ready = false;
                    self.step = FetchStep::TileId;
                }
            }
        }
    }

    fn decode_tile<B: VideoBus + ?Sized>(&mut self, bus: &B) {
        let palette = if bus.color_mode().uses_cgb_attributes() {
            PaletteRef::Color {
                layer: Layer::Background,
                index: self.attributes.palette(),
            }
        } else {
            PaletteRef::Register(registers::BGP)
        };
        let flip = self.attributes.x_flip();
        for (i, pixel) in self.staging.iter_mut().enumerate() {
            let i = i as u8;
            let bit = if flip { i } else { 7 - i };
            *pixel = Pixel {
                color: color_bits(self.data_low, self.data_high, bit),
                palette,
                priority: self.attributes.priority(),
                oam_index: 0,
            };
        }
        self.ready = true;
    }

    fn sprite_row_address<B: VideoBus + ?Sized>(&self, bus: &B, ly: u8) -> u16 {
        let height = bus.lcdc().sprite_height();
        let attrs = self.sprite.attributes;
        let mut row = (u16::from(ly) + 16).wrapping_sub(u16::from(self.sprite.y)) as u8 & (height - 1);
        if attrs.y_flip() {
            row = height - 1 - row;
        }
        let tile = if height == 16 {
            self.sprite.tile & 0xFE
        } else {
            self.sprite.tile
        };
        u16::from(tile) << 4 | u16::from(row) << 1
    }

    fn sprite_bank<B: VideoBus + ?Sized>(&self, bus: &B) -> u8 {
        if bus.color_mode().uses_cgb_attributes() {
            self.sprite.attributes.vram_bank()
        } else {
            0
        }
    }

    fn tick_sprite<B: VideoBus + ?Sized>(&mut self, bus: &B, ly: u8, sprite_fifo: &mut PixelFifo) {
        match self.step {
            FetchStep::TileId => self.step = FetchStep::DataLow,
            FetchStep::DataLow => {
                let addr = self.sprite_row_address(bus, ly);
                self.data_low = bus.vram_byte(self.sprite_bank(bus), addr);
                self.step = FetchStep::DataHigh;
            }
            FetchStep::DataHigh => {
                let addr = self.sprite_row_address(bus, ly) + 1;
                self.data_high = bus.vram_byte(self.sprite_bank(bus), addr);
                self.step = FetchStep::Push;
            }
            FetchStep::Push => {
                let pixels = self.decode_sprite(bus);
                let color_mode = bus.color_mode();
                let index_priority = color_mode.uses_cgb_attributes()
                    && bus.read_register(Register::Opri) & 0x01 == 0;
                let clip = usize::from(self.sprite_clip);
                sprite_fifo.merge_sprite(&pixels[clip..], index_priority);
                (self.mode, self.step) = self.suspended;
            }
        }
    }

    fn decode_sprite<B: VideoBus + ?Sized>(&self, bus: &B) -> [Pixel; FIFO_CAPACITY] {
        let attrs = self.sprite.attributes;
        let palette = if bus.color_mode().uses_cgb_attributes() {
            PaletteRef::Color {
                layer: Layer::Object,
                index: attrs.cgb_palette(),
            }
        } else if attrs.dmg_palette() {
            PaletteRef::Register(registers::OBP1)
        } else {
            PaletteRef::Register(registers::OBP0)
        };
        let mut pixels = [Pixel::TRANSPARENT; FIFO_CAPACITY];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let i = i as u8;
            let bit = if attrs.x_flip() { i } else { 7 - i };
            *pixel = Pixel {
                color: color_bits(self.data_low, self.data_high, bit),
                palette,
                priority: attrs.bg_priority(),
                oam_index: self.sprite.oam_index,
            };
        }
        pixels
    }
}

fn read_mode(r: &mut StateReader<'_>, field: &'static str) -> Result<FetchMode, SnapshotError> {
    let tag = r.u8()?;
    FetchMode::from_tag(tag).ok_or_else(|| SnapshotError::invalid(field, tag))
}

fn read_step(r: &mut StateReader<'_>, field: &'static str) -> Result<FetchStep, SnapshotError> {
    let tag = r.u8()?;
    FetchStep::from_tag(tag).ok_or_else(|| SnapshotError::invalid(field, tag))
}

impl SaveState for Fetcher {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.mode.tag());
        w.u8(self.step.tag());
        w.u8(self.cursor);
        w.u8(self.tile_id);
        w.u8(self.attributes.bits());
        w.u8(self.data_low);
        w.u8(self.data_high);
        w.u8(self.suspended.0.tag());
        w.u8(self.suspended.1.tag());
        for pixel in &self.staging {
            pixel.save_state(w);
        }
        w.bool(self.ready);
        w.bool(self.dummy_done);
        self.sprite.save_state(w);
        w.u8(self.sprite_clip);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        let mode = read_mode(r, "fetcher.mode")?;
        let step = read_step(r, "fetcher.step")?;
        let cursor = r.u8()?;
        let tile_id = r.u8()?;
        let attributes = TileAttributes::from_bits_retain(r.u8()?);
        let data_low = r.u8()?;
        let data_high = r.u8()?;
        let suspended_mode = read_mode(r, "fetcher.suspended_mode")?;
        if suspended_mode == FetchMode::Sprite {
            return Err(SnapshotError::invalid(
                "fetcher.suspended_mode",
                suspended_mode.tag(),
            ));
        }
        let suspended_step = read_step(r, "fetcher.suspended_step")?;
        let mut staging = [Pixel::default(); FIFO_CAPACITY];
        for pixel in &mut staging {
            *pixel = Pixel::load_state(r)?;
        }
        Ok(Fetcher {
            mode,
            step,
            cursor,
            tile_id,
            attributes,
            data_low,
            data_high,
            suspended: (suspended_mode, suspended_step),
            staging,
            ready: r.bool("fetcher.ready")?,
            dummy_done: r.bool("fetcher.dummy_done")?,
            sprite: SpriteSlot::load_state(r)?,
            sprite_clip: r.bounded_u8("fetcher.sprite_clip", FIFO_CAPACITY as u8)?,
        })
    }
}
