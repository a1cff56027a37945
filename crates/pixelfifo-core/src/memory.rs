use crate::bus::{Interrupt, Layer, VideoBus};
use crate::hardware::ColorMode;
use crate::registers::{self, Register, StatInterrupts};

// Internal memory sizes
pub const VRAM_BANK_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;
const PAL_RAM_SIZE: usize = 0x40;
const PAL_INDEX_MASK: u8 = 0x3F;
const PAL_UNUSED_BIT: u8 = 0x40;
const PAL_AUTO_INCREMENT_BIT: u8 = 0x80;

/// Plain-array memory and register file for the picture pipeline.
///
/// Accessors here are unguarded; CPU-side access that must honor the
/// pipeline's lock windows goes through [`crate::video::VideoUnit`]. LY and
/// the mode/coincidence bits of STAT belong to the pipeline and are not
/// stored here.
pub struct VideoMemory {
    vram: [[u8; VRAM_BANK_SIZE]; 2],
    vram_bank: u8,
    oam: [u8; OAM_SIZE],

    color_mode: ColorMode,
    oam_dma_active: bool,

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    lyc: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    bgpi: u8,
    bgpd: [u8; PAL_RAM_SIZE],
    obpi: u8,
    obpd: [u8; PAL_RAM_SIZE],
    /// Object priority mode register (OPRI)
    opri: u8,

    interrupt_flags: u8,
}

impl VideoMemory {
    pub fn new(color_mode: ColorMode) -> Self {
        Self {
            vram: [[0; VRAM_BANK_SIZE]; 2],
            vram_bank: 0,
            oam: [0; OAM_SIZE],
            color_mode,
            oam_dma_active: false,
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            bgpi: PAL_UNUSED_BIT,
            bgpd: [0; PAL_RAM_SIZE],
            obpi: PAL_UNUSED_BIT,
            obpd: [0; PAL_RAM_SIZE],
            opri: 0,
            interrupt_flags: 0,
        }
    }

    pub fn set_color_mode(&mut self, color_mode: ColorMode) {
        self.color_mode = color_mode;
    }

    fn cgb(&self) -> bool {
        self.color_mode.is_cgb_hardware()
    }

    pub fn vram(&self, bank: u8, addr: u16) -> u8 {
        self.vram[usize::from(bank & 1)][usize::from(addr) % VRAM_BANK_SIZE]
    }

    pub fn write_vram(&mut self, bank: u8, addr: u16, val: u8) {
        self.vram[usize::from(bank & 1)][usize::from(addr) % VRAM_BANK_SIZE] = val;
    }

    /// Copy `data` into VRAM starting at `addr` in `bank`.
    pub fn load_vram(&mut self, bank: u8, addr: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            self.write_vram(bank, addr.wrapping_add(offset as u16), byte);
        }
    }

    /// Bank selected through VBK for CPU accesses.
    pub fn vram_bank(&self) -> u8 {
        self.vram_bank
    }

    pub fn oam(&self, addr: u16) -> u8 {
        self.oam.get(usize::from(addr)).copied().unwrap_or(0xFF)
    }

    pub fn write_oam(&mut self, addr: u16, val: u8) {
        if let Some(slot) = self.oam.get_mut(usize::from(addr)) {
            *slot = val;
        }
    }

    /// Write the four bytes of OAM entry `index` (0-39).
    pub fn write_sprite(&mut self, index: usize, y: u8, x: u8, tile: u8, attributes: u8) {
        let base = (index % 40) * 4;
        self.oam[base..base + 4].copy_from_slice(&[y, x, tile, attributes]);
    }

    /// While set, the pipeline's OAM reads are reported as blocked.
    pub fn set_oam_dma_active(&mut self, active: bool) {
        self.oam_dma_active = active;
    }

    pub fn oam_dma_active(&self) -> bool {
        self.oam_dma_active
    }

    /// Pending bits of the IF register owned by this memory.
    pub fn interrupt_flags(&self) -> u8 {
        self.interrupt_flags
    }

    pub fn clear_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupt_flags &= !interrupt.mask();
    }

    /// Return and clear all pending interrupt bits.
    pub fn take_interrupts(&mut self) -> u8 {
        std::mem::take(&mut self.interrupt_flags)
    }

    /// STAT interrupt-enable bits as last written.
    pub fn stat_enables(&self) -> StatInterrupts {
        StatInterrupts::from_bits_truncate(self.stat)
    }

    /// Load the default CGB palettes used when running a DMG cartridge in
    /// compatibility mode. These values are based on the behavior of the
    /// official boot ROM.
    pub fn apply_dmg_compatibility_palettes(&mut self) {
        const OBJ_PAL: [u16; 4] = [0x7FFF, 0x421F, 0x1CF2, 0x0000];
        const BG_PAL: [u16; 4] = [0x7FFF, 0x1BEF, 0x6180, 0x0000];

        let (obj0, rest) = self.obpd.split_at_mut(8);
        let (obj1, _) = rest.split_at_mut(8);
        Self::write_palette(obj0, OBJ_PAL);
        Self::write_palette(obj1, OBJ_PAL);

        let (bg0, _) = self.bgpd.split_at_mut(8);
        Self::write_palette(bg0, BG_PAL);

        self.bgp = 0xE4;
        self.obp0 = 0xD0;
        self.obp1 = 0xE0;
    }

    /// Write four 15-bit colors into color palette `palette` of `layer`.
    pub fn set_cgb_palette(&mut self, layer: Layer, palette: usize, colors: [u16; 4]) {
        let ram = match layer {
            Layer::Background => &mut self.bgpd,
            Layer::Object => &mut self.obpd,
        };
        let base = (palette % 8) * 8;
        Self::write_palette(&mut ram[base..base + 8], colors);
    }

    fn write_palette(slice: &mut [u8], pal: [u16; 4]) {
        for (i, &c) in pal.iter().enumerate() {
            slice[i * 2] = (c & 0xFF) as u8;
            slice[i * 2 + 1] = (c >> 8) as u8;
        }
    }

    fn sanitize_palette_index(value: u8) -> u8 {
        (value & (PAL_AUTO_INCREMENT_BIT | PAL_INDEX_MASK)) | PAL_UNUSED_BIT
    }

    fn palette_ram_index(index: u8) -> usize {
        (index & PAL_INDEX_MASK) as usize
    }

    fn step_palette_index(index: &mut u8) {
        let current = *index;
        let idx = current & PAL_INDEX_MASK;
        let next_idx = if current & PAL_AUTO_INCREMENT_BIT != 0 {
            idx.wrapping_add(1) & PAL_INDEX_MASK
        } else {
            idx
        };
        let auto = current & PAL_AUTO_INCREMENT_BIT;
        *index = auto | PAL_UNUSED_BIT | next_idx;
    }

    /// CPU read of a register stored here. STAT returns only the enable
    /// bits (plus the always-set bit 7) and LY is not handled.
    pub fn read_reg(&mut self, addr: u16) -> u8 {
        match addr {
            registers::LCDC => self.lcdc,
            registers::STAT => (self.stat & StatInterrupts::WRITABLE_MASK) | 0x80,
            registers::SCY => self.scy,
            registers::SCX => self.scx,
            registers::LYC => self.lyc,
            registers::BGP => self.bgp,
            registers::OBP0 => self.obp0,
            registers::OBP1 => self.obp1,
            registers::WY => self.wy,
            registers::WX => self.wx,
            registers::VBK => {
                if self.cgb() {
                    self.vram_bank | 0xFE
                } else {
                    0xFF
                }
            }
            registers::BCPS => {
                if self.cgb() {
                    self.bgpi
                } else {
                    0xFF
                }
            }
            registers::BCPD => {
                if self.cgb() {
                    self.bgpd[Self::palette_ram_index(self.bgpi)]
                } else {
                    0xFF
                }
            }
            registers::OCPS => {
                if self.cgb() {
                    self.obpi
                } else {
                    0xFF
                }
            }
            registers::OCPD => {
                if self.cgb() {
                    self.obpd[Self::palette_ram_index(self.obpi)]
                } else {
                    0xFF
                }
            }
            registers::OPRI => {
                if self.cgb() {
                    self.opri | 0xFE
                } else {
                    0xFF
                }
            }
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            registers::LCDC => self.lcdc = val,
            registers::STAT => self.stat = val & StatInterrupts::WRITABLE_MASK,
            registers::SCY => self.scy = val,
            registers::SCX => self.scx = val,
            registers::LYC => self.lyc = val,
            registers::BGP => self.bgp = val,
            registers::OBP0 => self.obp0 = val,
            registers::OBP1 => self.obp1 = val,
            registers::WY => self.wy = val,
            registers::WX => self.wx = val,
            registers::VBK => {
                if self.cgb() {
                    self.vram_bank = val & 0x01;
                }
            }
            registers::BCPS => {
                if self.cgb() {
                    self.bgpi = Self::sanitize_palette_index(val);
                }
            }
            registers::BCPD => {
                if self.cgb() {
                    let idx = Self::palette_ram_index(self.bgpi);
                    self.bgpd[idx] = val;
                    Self::step_palette_index(&mut self.bgpi);
                }
            }
            registers::OCPS => {
                if self.cgb() {
                    self.obpi = Self::sanitize_palette_index(val);
                }
            }
            registers::OCPD => {
                if self.cgb() {
                    let idx = Self::palette_ram_index(self.obpi);
                    self.obpd[idx] = val;
                    Self::step_palette_index(&mut self.obpi);
                }
            }
            registers::OPRI => {
                if self.cgb() {
                    self.opri = val & 0x01;
                }
            }
            _ => {}
        }
    }

    /// A locked BCPD/OCPD access must not reach `read_reg`/`write_reg`,
    /// since those step the palette index.
    pub(crate) fn is_palette_data_port(addr: u16) -> bool {
        matches!(addr, registers::BCPD | registers::OCPD)
    }
}

impl Default for VideoMemory {
    fn default() -> Self {
        Self::new(ColorMode::Monochrome)
    }
}

impl VideoBus for VideoMemory {
    fn read_vram(&self, bank: u8, addr: u16) -> Option<u8> {
        Some(self.vram(bank, addr))
    }

    fn read_oam(&self, addr: u16) -> Option<u8> {
        if self.oam_dma_active {
            None
        } else {
            self.oam.get(usize::from(addr)).copied()
        }
    }

    fn read_palette(&self, layer: Layer, index: u8) -> u8 {
        let idx = Self::palette_ram_index(index);
        match layer {
            Layer::Background => self.bgpd[idx],
            Layer::Object => self.obpd[idx],
        }
    }

    fn read_register(&self, register: Register) -> u8 {
        match register {
            Register::Lcdc => self.lcdc,
            Register::Stat => self.stat,
            Register::Scy => self.scy,
            Register::Scx => self.scx,
            Register::Lyc => self.lyc,
            Register::Bgp => self.bgp,
            Register::Obp0 => self.obp0,
            Register::Obp1 => self.obp1,
            Register::Wy => self.wy,
            Register::Wx => self.wx,
            Register::Opri => self.opri,
        }
    }

    fn request_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupt_flags |= interrupt.mask();
    }

    fn color_mode(&self) -> ColorMode {
        self.color_mode
    }
}
