use log::debug;

use crate::Frame;
use crate::bus::{Interrupt, VideoBus};
use crate::config::PpuConfig;
use crate::hardware::ColorMode;
use crate::memory::VideoMemory;
use crate::ppu::{Ppu, PpuEvents};
use crate::registers::{self, LcdMode};

// CPU-visible address ranges
const VRAM_START: u16 = 0x8000;
const VRAM_END: u16 = 0x9FFF;
const OAM_START: u16 = 0xFE00;
const OAM_END: u16 = 0xFE9F;

/// Value returned for a CPU read the pipeline is blocking.
pub const LOCKED_READ: u8 = 0xFF;

/// The pipeline together with the memory it renders from.
///
/// CPU accesses made through [`VideoUnit::read`] and [`VideoUnit::write`]
/// honor the pipeline's VRAM, OAM and palette lock windows.
pub struct VideoUnit {
    ppu: Ppu,
    memory: VideoMemory,
    /// Events raised by register writes, reported by the next `step`.
    pending: PpuEvents,
}

impl VideoUnit {
    pub fn new(config: &PpuConfig) -> Self {
        Self {
            ppu: Ppu::with_config(config),
            memory: VideoMemory::new(config.model.native_color_mode()),
            pending: PpuEvents::empty(),
        }
    }

    /// Register values and pipeline position left by the boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.memory.write_reg(registers::LCDC, 0x91);
        self.memory.write_reg(registers::BGP, 0xFC);
        if self.memory.color_mode() == ColorMode::Compatibility {
            self.memory.apply_dmg_compatibility_palettes();
        }
        self.ppu.apply_boot_state();
        self.pending = PpuEvents::empty();
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn memory(&self) -> &VideoMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut VideoMemory {
        &mut self.memory
    }

    pub fn framebuffer(&self) -> &Frame {
        self.ppu.framebuffer()
    }

    /// Switch between DMG and CGB coloring after the cartridge header is
    /// known.
    pub fn set_color_mode(&mut self, color_mode: ColorMode) {
        debug!("Video color mode set to {color_mode:?}");
        self.memory.set_color_mode(color_mode);
        if color_mode == ColorMode::Compatibility {
            self.memory.apply_dmg_compatibility_palettes();
        }
    }

    /// Advance the pipeline by `dots` dots.
    pub fn step(&mut self, dots: u32) -> PpuEvents {
        let events = std::mem::take(&mut self.pending);
        events | self.ppu.advance(dots, &mut self.memory)
    }

    pub fn take_interrupts(&mut self) -> u8 {
        self.memory.take_interrupts()
    }

    pub fn interrupt_pending(&self, interrupt: Interrupt) -> bool {
        self.memory.interrupt_flags() & interrupt.mask() != 0
    }

    /// CGB palette data ports are inaccessible while pixels are being drawn.
    fn palette_locked(&self) -> bool {
        self.memory.color_mode().is_cgb_hardware()
            && self.ppu.is_enabled()
            && self.ppu.internal_mode() == LcdMode::Drawing
    }

    fn oam_read_blocked(&self) -> bool {
        self.ppu.oam_read_locked() || self.memory.oam_dma_active()
    }

    fn oam_write_blocked(&self) -> bool {
        self.ppu.oam_write_locked() || self.memory.oam_dma_active()
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        match addr {
            VRAM_START..=VRAM_END => {
                if self.ppu.vram_read_locked() {
                    LOCKED_READ
                } else {
                    self.memory
                        .vram(self.memory.vram_bank(), addr - VRAM_START)
                }
            }
            OAM_START..=OAM_END => {
                if self.oam_read_blocked() {
                    LOCKED_READ
                } else {
                    self.memory.oam(addr - OAM_START)
                }
            }
            registers::STAT => self.memory.read_reg(addr) | self.ppu.status_bits(),
            registers::LY => self.ppu.ly(),
            _ if VideoMemory::is_palette_data_port(addr) && self.palette_locked() => LOCKED_READ,
            _ => self.memory.read_reg(addr),
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            VRAM_START..=VRAM_END => {
                if !self.ppu.vram_write_locked() {
                    let bank = self.memory.vram_bank();
                    self.memory.write_vram(bank, addr - VRAM_START, val);
                }
            }
            OAM_START..=OAM_END => {
                if !self.oam_write_blocked() {
                    self.memory.write_oam(addr - OAM_START, val);
                }
            }
            registers::LY => {}
            registers::LCDC => {
                self.memory.write_reg(addr, val);
                self.pending |= self.ppu.sync_display_enable(&self.memory);
            }
            _ if VideoMemory::is_palette_data_port(addr) && self.palette_locked() => {}
            _ => self.memory.write_reg(addr, val),
        }
    }
}
