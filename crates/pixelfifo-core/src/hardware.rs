use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Console hardware the pipeline is modelling.
///
/// The model decides the timing quirks (VBlank mode visibility, the window
/// disable glitch, VRAM lock edges); the [`ColorMode`] decides how pixels are
/// colored.
pub enum Model {
    #[default]
    Dmg,
    Cgb,
}

impl Model {
    /// Color mode the hardware boots into before any cartridge is inspected.
    pub const fn native_color_mode(self) -> ColorMode {
        match self {
            Model::Dmg => ColorMode::Monochrome,
            Model::Cgb => ColorMode::Color,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// Active coloring mode reported by the bus.
pub enum ColorMode {
    /// DMG hardware, four shades through BGP/OBP0/OBP1.
    #[default]
    Monochrome,
    /// CGB hardware running CGB software: per-tile attributes, 8+8 palettes.
    Color,
    /// CGB hardware running DMG software: DMG rules, CGB palette RAM colors.
    Compatibility,
}

impl ColorMode {
    #[inline]
    /// Returns whether the pipeline runs on color hardware.
    pub const fn is_cgb_hardware(self) -> bool {
        matches!(self, ColorMode::Color | ColorMode::Compatibility)
    }

    #[inline]
    /// Returns whether CGB tile attributes, banks and palettes are in use.
    pub const fn uses_cgb_attributes(self) -> bool {
        matches!(self, ColorMode::Color)
    }

    #[inline]
    /// Returns whether DMG priority rules apply (monochrome and compatibility).
    pub const fn uses_dmg_priority(self) -> bool {
        !self.uses_cgb_attributes()
    }
}
