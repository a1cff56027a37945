#![allow(dead_code)]

use std::sync::Once;

use pixelfifo_core::SCREEN_WIDTH;
use pixelfifo_core::config::PpuConfig;
use pixelfifo_core::hardware::Model;
use pixelfifo_core::memory::VideoMemory;
use pixelfifo_core::ppu::Ppu;
use pixelfifo_core::registers;
use pixelfifo_core::video::VideoUnit;

static LOGGER: Once = Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Write one tile (16 bytes) where every row is `low`/`high`.
pub fn fill_tile(mem: &mut VideoMemory, bank: u8, tile: u8, low: u8, high: u8) {
    let base = u16::from(tile) * 16;
    for row in 0..8 {
        mem.load_vram(bank, base + row * 2, &[low, high]);
    }
}

/// Point every entry of a 32x32 tile map at `tile`.
pub fn fill_map(mem: &mut VideoMemory, map_base: u16, tile: u8) {
    mem.load_vram(0, map_base - 0x8000, &[tile; 32 * 32]);
}

/// A DMG pipeline and memory in the post-boot state.
pub fn booted_dmg() -> (Ppu, VideoMemory) {
    booted(Model::Dmg)
}

pub fn booted(model: Model) -> (Ppu, VideoMemory) {
    init_logging();
    let mut mem = VideoMemory::new(model.native_color_mode());
    mem.write_reg(registers::LCDC, 0x91);
    mem.write_reg(registers::BGP, 0xE4);
    let mut ppu = Ppu::new(model);
    ppu.apply_boot_state();
    (ppu, mem)
}

pub fn booted_unit(model: Model) -> VideoUnit {
    init_logging();
    let mut unit = VideoUnit::new(&PpuConfig {
        model,
        ..PpuConfig::default()
    });
    unit.apply_boot_state();
    unit.write(registers::BGP, 0xE4);
    unit
}

/// A busy scene: scrolled background with varied tiles, a window and a few
/// sprites spread over the first lines.
pub fn busy_scene(mem: &mut VideoMemory) {
    for tile in 0..8u8 {
        fill_tile(mem, 0, tile, tile.wrapping_mul(0x25), tile.wrapping_mul(0x53));
    }
    let map: Vec<u8> = (0..32 * 32).map(|i| (i % 7) as u8).collect();
    mem.load_vram(0, 0x1800, &map);
    fill_map(mem, 0x9C00, 5);

    mem.write_reg(registers::SCX, 5);
    mem.write_reg(registers::SCY, 3);
    mem.write_reg(registers::WY, 20);
    mem.write_reg(registers::WX, 90);
    mem.write_reg(registers::OBP0, 0xE4);
    mem.write_reg(registers::OBP1, 0x1B);
    mem.write_reg(registers::LCDC, 0xF3);

    for i in 0..12 {
        let n = i as u8;
        mem.write_sprite(i, 16 + n * 3, 4 + n * 13, 2 + (n % 5), (n & 1) << 4);
    }
}

pub fn line(frame: &[u32], ly: usize) -> &[u32] {
    &frame[ly * SCREEN_WIDTH..(ly + 1) * SCREEN_WIDTH]
}
