use serde::{Deserialize, Serialize};

use crate::bus::{Layer, VideoBus};
use crate::fifo::{PaletteRef, Pixel};
use crate::hardware::ColorMode;
use crate::registers::{self, Register};

/// Shades for the four DMG color indices in 0x00RRGGBB order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DmgPalette {
    #[default]
    Green,
    Grayscale,
}

impl DmgPalette {
    pub const fn colors(self) -> [u32; 4] {
        match self {
            DmgPalette::Green => [0x009BBC0F, 0x008BAC0F, 0x00306230, 0x000F380F],
            DmgPalette::Grayscale => [0x00FFFFFF, 0x00AAAAAA, 0x00555555, 0x00000000],
        }
    }
}

/// How 15-bit CGB colors are mapped to 24-bit output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorCorrection {
    /// Linear 5-bit to 8-bit expansion.
    #[default]
    Disabled,
    /// Per-channel perceptual curve, no channel mixing.
    Curves,
    /// Channel mixing approximating the CGB LCD response.
    LcdMix,
}

// Perceptual 5-bit to 8-bit curve
const CHANNEL_CURVE: [u8; 32] = [
    0, 6, 12, 20, 28, 36, 45, 56, 66, 76, 88, 100, 113, 125, 137, 149, 161, 172, 182, 192, 202,
    210, 218, 225, 232, 238, 243, 247, 250, 252, 254, 255,
];

#[inline]
fn expand_5bit(v: u16) -> u32 {
    let v = (v & 0x1F) as u32;
    (v << 3) | (v >> 2)
}

/// Decode a little-endian 15-bit BGR color to 0x00RRGGBB.
pub fn decode_cgb_color(lo: u8, hi: u8, correction: ColorCorrection) -> u32 {
    let raw = (u16::from(hi) << 8) | u16::from(lo);
    let r = raw & 0x1F;
    let g = (raw >> 5) & 0x1F;
    let b = (raw >> 10) & 0x1F;
    let (r, g, b) = match correction {
        ColorCorrection::Disabled => (expand_5bit(r), expand_5bit(g), expand_5bit(b)),
        ColorCorrection::Curves => (
            u32::from(CHANNEL_CURVE[usize::from(r)]),
            u32::from(CHANNEL_CURVE[usize::from(g)]),
            u32::from(CHANNEL_CURVE[usize::from(b)]),
        ),
        ColorCorrection::LcdMix => {
            let (r, g, b) = (u32::from(r), u32::from(g), u32::from(b));
            (
                (r * 26 + g * 4 + b * 2).min(960) >> 2,
                (g * 24 + b * 8).min(960) >> 2,
                (r * 6 + g * 4 + b * 22).min(960) >> 2,
            )
        }
    };
    (r << 16) | (g << 8) | b
}

/// Shade a 2-bit color index through a BGP/OBP register value.
#[inline(always)]
pub fn dmg_shade(palette: u8, color_id: u8) -> u8 {
    (palette >> ((color_id & 3) * 2)) & 0x03
}

/// Turns resolved pixels into framebuffer colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Colorizer {
    pub dmg_palette: DmgPalette,
    pub correction: ColorCorrection,
}

impl Colorizer {
    pub fn new(dmg_palette: DmgPalette, correction: ColorCorrection) -> Self {
        Self {
            dmg_palette,
            correction,
        }
    }

    /// Get a color palette entry as 0x00RRGGBB.
    pub fn cgb_color<B: VideoBus + ?Sized>(
        &self,
        bus: &B,
        layer: Layer,
        palette: u8,
        color_id: u8,
    ) -> u32 {
        let off = (palette & 7) * 8 + (color_id & 3) * 2;
        let lo = bus.read_palette(layer, off);
        let hi = bus.read_palette(layer, off + 1);
        decode_cgb_color(lo, hi, self.correction)
    }

    pub fn pixel_color<B: VideoBus + ?Sized>(&self, bus: &B, pixel: &Pixel) -> u32 {
        match pixel.palette {
            PaletteRef::Register(addr) => {
                let register = Register::shade_register(addr).unwrap_or(Register::Bgp);
                let shade = dmg_shade(bus.read_register(register), pixel.color);
                match bus.color_mode() {
                    ColorMode::Monochrome => self.dmg_palette.colors()[usize::from(shade)],
                    _ => {
                        let (layer, palette) = match addr {
                            registers::OBP0 => (Layer::Object, 0),
                            registers::OBP1 => (Layer::Object, 1),
                            _ => (Layer::Background, 0),
                        };
                        self.cgb_color(bus, layer, palette, shade)
                    }
                }
            }
            PaletteRef::Color { layer, index } => self.cgb_color(bus, layer, index, pixel.color),
        }
    }

    /// Output when the background layer is switched off on DMG-style
    /// hardware and no sprite covers the dot.
    pub fn blank_color<B: VideoBus + ?Sized>(&self, bus: &B) -> u32 {
        match bus.color_mode() {
            ColorMode::Monochrome => self.dmg_palette.colors()[0],
            _ => self.cgb_color(bus, Layer::Background, 0, 0),
        }
    }
}
