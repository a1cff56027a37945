mod common;

use std::cell::Cell;
use std::rc::Rc;

use pixelfifo_core::bus::Layer;
use pixelfifo_core::color::{Colorizer, dmg_shade};
use pixelfifo_core::fifo::Pixel;
use pixelfifo_core::hardware::{ColorMode, Model};
use pixelfifo_core::memory::VideoMemory;
use pixelfifo_core::ppu::{DOTS_PER_FRAME, DOTS_PER_LINE, Ppu, PpuEvents};
use pixelfifo_core::registers::{self, LcdMode};
use pixelfifo_core::{SCREEN_HEIGHT, SCREEN_WIDTH};

use common::{booted, booted_dmg, booted_unit, fill_map, fill_tile, line};

#[test]
fn full_frame_wraps_and_presents_once() {
    let (mut ppu, mut mem) = booted_dmg();
    let presented = Rc::new(Cell::new(0u32));
    let counter = presented.clone();
    ppu.set_frame_callback(move |_| counter.set(counter.get() + 1));

    let events = ppu.advance(DOTS_PER_FRAME, &mut mem);
    assert!(events.contains(PpuEvents::VBLANK | PpuEvents::FRAME_READY));
    assert_eq!((ppu.ly(), ppu.dot()), (0, 0));
    assert_eq!(ppu.internal_mode(), LcdMode::OamScan);
    assert_eq!(presented.get(), 1);
    assert_eq!(ppu.frames(), 1);
}

#[test]
fn first_frame_after_enable_is_not_presented() {
    common::init_logging();
    let mut mem = VideoMemory::default();
    let mut ppu = Ppu::new(Model::Dmg);
    let presented = Rc::new(Cell::new(0u32));
    let counter = presented.clone();
    ppu.set_frame_callback(move |_| counter.set(counter.get() + 1));

    mem.write_reg(registers::LCDC, 0x91);
    let first = ppu.advance(DOTS_PER_FRAME, &mut mem);
    assert!(first.contains(PpuEvents::DISPLAY_ENABLED | PpuEvents::VBLANK));
    assert!(!first.contains(PpuEvents::FRAME_READY));
    assert_eq!(presented.get(), 0);

    let second = ppu.advance(DOTS_PER_FRAME, &mut mem);
    assert!(second.contains(PpuEvents::FRAME_READY));
    assert_eq!(presented.get(), 1);
    assert_eq!(ppu.frames(), 2);
}

#[test]
fn lines_take_456_dots_and_vblank_lasts_ten_lines() {
    let (mut ppu, mut mem) = booted_dmg();
    for ly in 0..SCREEN_HEIGHT as u8 {
        assert_eq!(ppu.ly(), ly);
        let events = ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
        assert!(events.contains(PpuEvents::HBLANK), "line {ly}");
    }
    assert_eq!(ppu.internal_mode(), LcdMode::VBlank);
    for ly in 144..154u8 {
        assert_eq!(ppu.ly(), ly);
        let events = ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
        assert!(!events.contains(PpuEvents::HBLANK));
    }
    assert_eq!(ppu.ly(), 0);
}

fn expected_bg_line(mem: &VideoMemory, scx: u8) -> Vec<u32> {
    let palette = Colorizer::default().dmg_palette.colors();
    (0..SCREEN_WIDTH)
        .map(|x| {
            let bx = (x + usize::from(scx)) & 0xFF;
            let tile = mem.vram(0, 0x1800 + (bx / 8) as u16);
            let low = mem.vram(0, u16::from(tile) * 16);
            let high = mem.vram(0, u16::from(tile) * 16 + 1);
            let bit = 7 - (bx % 8);
            let color = ((high >> bit) & 1) << 1 | ((low >> bit) & 1);
            palette[usize::from(dmg_shade(0xE4, color))]
        })
        .collect()
}

#[test]
fn first_line_matches_direct_tile_decode() {
    for scx in [0u8, 3, 7] {
        let (mut ppu, mut mem) = booted_dmg();
        for tile in 0..4u8 {
            fill_tile(&mut mem, 0, tile, 0x0F ^ (tile * 0x11), 0x33 ^ (tile * 0x29));
        }
        let map: Vec<u8> = (0..32u8).map(|i| i % 4).collect();
        mem.load_vram(0, 0x1800, &map);
        mem.write_reg(registers::SCX, scx);
        // Window enabled but WX can never be reached.
        mem.write_reg(registers::WX, 0xFF);
        mem.write_reg(registers::LCDC, 0xB1);

        ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
        assert_eq!(
            line(ppu.framebuffer(), 0),
            expected_bg_line(&mem, scx).as_slice(),
            "SCX={scx}"
        );
    }
}

#[test]
fn drawing_lengthens_with_scroll_and_sprites() {
    let hblank_dot = |scx: u8, sprites: usize| {
        let (mut ppu, mut mem) = booted_dmg();
        mem.write_reg(registers::SCX, scx);
        mem.write_reg(registers::LCDC, 0x93);
        for i in 0..sprites {
            mem.write_sprite(i, 16, 40 + i as u8 * 8, 0, 0);
        }
        let mut dot = 0;
        while ppu.internal_mode() != LcdMode::HBlank {
            ppu.advance(1, &mut mem);
            dot += 1;
        }
        dot
    };
    assert_eq!(hblank_dot(0, 0), 247);
    assert_eq!(hblank_dot(5, 0), 252);
    assert!(hblank_dot(0, 3) > 247);
    assert!(hblank_dot(0, 10) > hblank_dot(0, 3));
}

#[test]
fn disabled_background_is_blank_under_sprite_on_dmg() {
    let (mut ppu, mut mem) = booted_dmg();
    fill_tile(&mut mem, 0, 0, 0xFF, 0xFF);
    fill_tile(&mut mem, 0, 1, 0xFF, 0xFF);
    mem.write_reg(registers::OBP0, 0xE4);
    mem.write_sprite(0, 16, 28, 1, 0);
    mem.write_reg(registers::LCDC, 0x82);

    ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
    let palette = Colorizer::default().dmg_palette.colors();
    let row = line(ppu.framebuffer(), 0);
    for (x, &px) in row.iter().enumerate() {
        let expected = if (20..28).contains(&x) {
            palette[3]
        } else {
            palette[0]
        };
        assert_eq!(px, expected, "column {x}");
    }
}

#[test]
fn sprites_left_of_screen_are_clipped() {
    let (mut ppu, mut mem) = booted_dmg();
    // colors 0,0,2,2,1,1,3,3 across the row
    fill_tile(&mut mem, 0, 1, 0x0F, 0x33);
    fill_tile(&mut mem, 0, 2, 0xFF, 0xFF);
    mem.write_reg(registers::OBP0, 0xE4);
    mem.write_sprite(0, 16, 0, 2, 0);
    mem.write_sprite(1, 16, 4, 1, 0);
    mem.write_reg(registers::LCDC, 0x93);

    ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
    let palette = Colorizer::default().dmg_palette.colors();
    let row = line(ppu.framebuffer(), 0);
    assert_eq!(&row[..4], &[palette[1], palette[1], palette[3], palette[3]]);
    assert!(row[4..].iter().all(|&px| px == palette[0]));
}

#[test]
fn ten_sprite_limit_per_line() {
    let (mut ppu, mut mem) = booted_dmg();
    fill_tile(&mut mem, 0, 1, 0xFF, 0xFF);
    mem.write_reg(registers::OBP0, 0xE4);
    for i in 0..12 {
        mem.write_sprite(i, 16, 8 + i as u8 * 10, 1, 0);
    }
    mem.write_reg(registers::LCDC, 0x93);

    ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
    assert_eq!(ppu.scanner().result().len(), 10);
    let black = Colorizer::default().dmg_palette.colors()[3];
    let row = line(ppu.framebuffer(), 0);
    assert_eq!(row[90], black);
    assert_ne!(row[100], black);
    assert_ne!(row[110], black);
}

/// Where a mid-line window disable landed on line 1.
struct GlitchLine {
    row: Vec<u32>,
    color0: u32,
    /// Column due on the dot after the LCDC write.
    column: usize,
    /// Color of the background FIFO's front pixel at the time of the write.
    queued: u32,
}

fn glitch_line(model: Model, color_mode: ColorMode, scx: u8) -> GlitchLine {
    let mut unit = booted_unit(model);
    unit.set_color_mode(color_mode);
    let mem = unit.memory_mut();
    fill_tile(mem, 0, 0, 0xFF, 0x00);
    fill_tile(mem, 0, 1, 0xFF, 0xFF);
    fill_map(mem, 0x9C00, 1);
    mem.write_reg(registers::SCX, scx);
    mem.write_reg(registers::WY, 0);
    mem.write_reg(registers::WX, 15);
    unit.write(registers::LCDC, 0xF1);

    // Line 0 triggers the window for the frame; disable it partway into line 1
    // while window pixels are still queued.
    unit.step(u32::from(DOTS_PER_LINE) + 130);
    while unit.ppu().bg_fifo().len() < 2 {
        unit.step(1);
    }
    assert_eq!(unit.ppu().ly(), 1);
    assert!(unit.ppu().window().is_active());

    let colorizer = Colorizer::default();
    let column = usize::from(unit.ppu().compositor().lcd_x());
    let front = *unit.ppu().bg_fifo().peek(0).unwrap();
    let queued = colorizer.pixel_color(unit.memory(), &front);
    unit.write(registers::LCDC, 0xD1);
    unit.step(1);
    assert_eq!(usize::from(unit.ppu().compositor().lcd_x()), column + 1);
    unit.step(u32::from(DOTS_PER_LINE) - 1);

    GlitchLine {
        row: line(unit.framebuffer(), 1).to_vec(),
        color0: colorizer.pixel_color(unit.memory(), &Pixel::default()),
        column,
        queued,
    }
}

#[test]
fn window_disable_glitch_inserts_color_zero_pixel_on_dmg() {
    let glitch = glitch_line(Model::Dmg, ColorMode::Monochrome, 0);
    let glitched: Vec<usize> = (0..SCREEN_WIDTH)
        .filter(|&x| glitch.row[x] == glitch.color0)
        .collect();
    assert_eq!(glitched, vec![glitch.column]);
    // The color-0 pixel is substituted for a pop; the queued window pixel
    // follows it.
    let black = Colorizer::default().dmg_palette.colors()[3];
    assert_eq!(glitch.queued, black);
    assert_eq!(glitch.row[glitch.column + 1], glitch.queued);
    assert!(glitch.row[..glitch.column].iter().all(|&px| px != glitch.color0));

    // (WX + SCX) & 7 != 7
    let glitch = glitch_line(Model::Dmg, ColorMode::Monochrome, 1);
    assert!(glitch.row.iter().all(|&px| px != glitch.color0));
    assert_eq!(glitch.row[glitch.column], glitch.queued);

    let glitch = glitch_line(Model::Cgb, ColorMode::Compatibility, 0);
    assert!(glitch.row.iter().all(|&px| px != glitch.color0));
}

#[test]
fn palette_write_mid_line_applies_from_the_next_column() {
    let mut unit = booted_unit(Model::Dmg);
    // color 1 everywhere
    fill_tile(unit.memory_mut(), 0, 0, 0xFF, 0x00);

    unit.step(u32::from(DOTS_PER_LINE) + 150);
    assert_eq!(unit.ppu().ly(), 1);
    assert_eq!(unit.ppu().internal_mode(), LcdMode::Drawing);
    let column = usize::from(unit.ppu().compositor().lcd_x());
    assert!(column > 0 && column < SCREEN_WIDTH);

    // color 1 goes from shade 1 to shade 3
    unit.write(registers::BGP, 0xEC);
    unit.step(u32::from(DOTS_PER_LINE) - 150);

    let palette = Colorizer::default().dmg_palette.colors();
    let row = line(unit.framebuffer(), 1);
    assert!(row[..column].iter().all(|&px| px == palette[1]), "{column}");
    assert!(row[column..].iter().all(|&px| px == palette[3]), "{column}");
    // Line 0 was drawn entirely with the old palette.
    assert!(line(unit.framebuffer(), 0).iter().all(|&px| px == palette[1]));
}

#[test]
fn sprites_are_scanned_on_the_first_line_after_enable() {
    common::init_logging();
    let mut mem = VideoMemory::default();
    fill_tile(&mut mem, 0, 1, 0xFF, 0xFF);
    mem.write_reg(registers::BGP, 0xE4);
    mem.write_reg(registers::OBP0, 0xE4);
    // Entries 0-3 are already behind the scan when the display comes on.
    mem.write_sprite(2, 16, 60, 1, 0);
    mem.write_sprite(10, 16, 28, 1, 0);
    mem.write_reg(registers::LCDC, 0x93);

    let mut ppu = Ppu::new(Model::Dmg);
    let events = ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
    assert!(events.contains(PpuEvents::DISPLAY_ENABLED | PpuEvents::HBLANK));

    let palette = Colorizer::default().dmg_palette.colors();
    let row = line(ppu.framebuffer(), 0);
    for (x, &px) in row.iter().enumerate() {
        let expected = if (20..28).contains(&x) {
            palette[3]
        } else {
            palette[0]
        };
        assert_eq!(px, expected, "column {x}");
    }
}

#[test]
fn window_line_counter_only_advances_on_drawn_lines() {
    let mut unit = booted_unit(Model::Dmg);
    let mem = unit.memory_mut();
    mem.write_reg(registers::WY, 2);
    mem.write_reg(registers::WX, 7);
    unit.write(registers::LCDC, 0xF1);

    unit.step(u32::from(DOTS_PER_LINE) * 2);
    assert_eq!(unit.ppu().window().line(), -1);
    unit.step(u32::from(DOTS_PER_LINE) * 3);
    assert_eq!(unit.ppu().window().line(), 2);

    // Window off for two lines: the counter holds.
    unit.write(registers::LCDC, 0xD1);
    unit.step(u32::from(DOTS_PER_LINE) * 2);
    unit.write(registers::LCDC, 0xF1);
    unit.step(u32::from(DOTS_PER_LINE));
    assert_eq!(unit.ppu().window().line(), 3);
}

#[test]
fn cgb_sprite_overlap_follows_oam_order_or_x() {
    for (opri, expected_palette) in [(0u8, 0u8), (1, 1)] {
        let (mut ppu, mut mem) = booted(Model::Cgb);
        fill_tile(&mut mem, 0, 1, 0xFF, 0x00);
        mem.set_cgb_palette(Layer::Object, 0, [0, 0x001F, 0, 0]);
        mem.set_cgb_palette(Layer::Object, 1, [0, 0x03E0, 0, 0]);
        mem.write_reg(registers::OPRI, opri);
        // OAM 0 further right on palette 0; OAM 1 further left on palette 1.
        mem.write_sprite(0, 16, 20, 1, 0);
        mem.write_sprite(1, 16, 16, 1, 1);
        mem.write_reg(registers::LCDC, 0x93);

        ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
        let colorizer = Colorizer::default();
        let row = line(ppu.framebuffer(), 0);
        let left = colorizer.cgb_color(&mem, Layer::Object, 1, 1);
        let right = colorizer.cgb_color(&mem, Layer::Object, 0, 1);
        let overlap = colorizer.cgb_color(&mem, Layer::Object, expected_palette, 1);
        assert!(row[8..12].iter().all(|&px| px == left), "OPRI={opri}");
        assert!(row[12..16].iter().all(|&px| px == overlap), "OPRI={opri}");
        assert!(row[16..20].iter().all(|&px| px == right), "OPRI={opri}");
    }
}

#[test]
fn cgb_tile_attributes_select_bank_and_palette() {
    let (mut ppu, mut mem) = booted(Model::Cgb);
    assert_eq!(pixelfifo_core::bus::VideoBus::color_mode(&mem), ColorMode::Color);
    fill_tile(&mut mem, 1, 0, 0xFF, 0xFF);
    // palette 3, bank 1
    mem.load_vram(1, 0x1800, &[0x0B; 32]);
    mem.set_cgb_palette(Layer::Background, 3, [0, 0, 0, 0x7C00]);

    ppu.advance(u32::from(DOTS_PER_LINE), &mut mem);
    let blue = Colorizer::default().cgb_color(&mem, Layer::Background, 3, 3);
    assert_eq!(blue, 0x0000_00FF);
    assert!(line(ppu.framebuffer(), 0).iter().all(|&px| px == blue));
}
