use crate::hardware::ColorMode;
use crate::registers::{LcdControl, Register};

/// Value a blocked VRAM/OAM read returns.
pub const BLOCKED_READ: u8 = 0xFF;

/// Interrupt lines the pipeline can raise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    Stat,
}

impl Interrupt {
    /// Bit in the IF register (0xFF0F).
    pub const fn mask(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::Stat => 0x02,
        }
    }
}

/// Which palette RAM a color palette lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Background,
    Object,
}

/// Memory and register access the pipeline needs from the rest of the system.
///
/// The pipeline owns no memory. Every dot it re-reads the registers it depends
/// on, so a write that lands between two calls to [`crate::ppu::Ppu::advance`]
/// is observed at the next dot.
pub trait VideoBus {
    /// Read VRAM by bank (0 or 1) and bank-relative offset (0x0000-0x1FFF).
    /// `None` means the access is blocked.
    fn read_vram(&self, bank: u8, addr: u16) -> Option<u8>;

    /// Read OAM by offset (0x00-0x9F). `None` means the access is blocked,
    /// e.g. while an OAM DMA transfer owns the bus.
    fn read_oam(&self, addr: u16) -> Option<u8>;

    /// Read one byte of color palette RAM (index 0x00-0x3F).
    fn read_palette(&self, layer: Layer, index: u8) -> u8;

    fn read_register(&self, register: Register) -> u8;

    fn request_interrupt(&mut self, interrupt: Interrupt);

    fn color_mode(&self) -> ColorMode;

    fn vram_byte(&self, bank: u8, addr: u16) -> u8 {
        self.read_vram(bank, addr).unwrap_or(BLOCKED_READ)
    }

    fn oam_byte(&self, addr: u16) -> u8 {
        self.read_oam(addr).unwrap_or(BLOCKED_READ)
    }

    fn lcdc(&self) -> LcdControl {
        LcdControl::from_bits_retain(self.read_register(Register::Lcdc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blocked;

    impl VideoBus for Blocked {
        fn read_vram(&self, _bank: u8, _addr: u16) -> Option<u8> {
            None
        }

        fn read_oam(&self, _addr: u16) -> Option<u8> {
            None
        }

        fn read_palette(&self, _layer: Layer, _index: u8) -> u8 {
            0
        }

        fn read_register(&self, _register: Register) -> u8 {
            0x91
        }

        fn request_interrupt(&mut self, _interrupt: Interrupt) {}

        fn color_mode(&self) -> ColorMode {
            ColorMode::Monochrome
        }
    }

    #[test]
    fn blocked_reads_return_all_ones() {
        let bus = Blocked;
        assert_eq!(bus.vram_byte(0, 0x1800), 0xFF);
        assert_eq!(bus.oam_byte(0x00), 0xFF);
        assert!(bus.lcdc().display_enabled());
    }

    #[test]
    fn interrupt_masks_match_if_register() {
        assert_eq!(Interrupt::VBlank.mask(), 0x01);
        assert_eq!(Interrupt::Stat.mask(), 0x02);
    }
}
