use bitflags::bitflags;
use std::fmt;

// Register addresses in the I/O page
pub const LCDC: u16 = 0xFF40;
pub const STAT: u16 = 0xFF41;
pub const SCY: u16 = 0xFF42;
pub const SCX: u16 = 0xFF43;
pub const LY: u16 = 0xFF44;
pub const LYC: u16 = 0xFF45;
pub const BGP: u16 = 0xFF47;
pub const OBP0: u16 = 0xFF48;
pub const OBP1: u16 = 0xFF49;
pub const WY: u16 = 0xFF4A;
pub const WX: u16 = 0xFF4B;
pub const VBK: u16 = 0xFF4F;
pub const BCPS: u16 = 0xFF68;
pub const BCPD: u16 = 0xFF69;
pub const OCPS: u16 = 0xFF6A;
pub const OCPD: u16 = 0xFF6B;
pub const OPRI: u16 = 0xFF6C;

/// Registers the pipeline reads from the bus while rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    Lcdc,
    Stat,
    Scy,
    Scx,
    Lyc,
    Bgp,
    Obp0,
    Obp1,
    Wy,
    Wx,
    Opri,
}

impl Register {
    pub const fn address(self) -> u16 {
        match self {
            Register::Lcdc => LCDC,
            Register::Stat => STAT,
            Register::Scy => SCY,
            Register::Scx => SCX,
            Register::Lyc => LYC,
            Register::Bgp => BGP,
            Register::Obp0 => OBP0,
            Register::Obp1 => OBP1,
            Register::Wy => WY,
            Register::Wx => WX,
            Register::Opri => OPRI,
        }
    }

    /// Shading register at `address`, if it is one of BGP/OBP0/OBP1.
    pub const fn shade_register(address: u16) -> Option<Register> {
        match address {
            BGP => Some(Register::Bgp),
            OBP0 => Some(Register::Obp0),
            OBP1 => Some(Register::Obp1),
            _ => None,
        }
    }
}

bitflags! {
    /// LCDC (0xFF40).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct LcdControl: u8 {
        const DISPLAY_ENABLE     = 0b1000_0000;
        const WINDOW_TILE_MAP    = 0b0100_0000;
        const WINDOW_ENABLE      = 0b0010_0000;
        const TILE_DATA_UNSIGNED = 0b0001_0000;
        const BG_TILE_MAP        = 0b0000_1000;
        const TALL_SPRITES       = 0b0000_0100;
        const SPRITES_ENABLE     = 0b0000_0010;
        const BG_ENABLE          = 0b0000_0001;
    }
}

// VRAM layout constants (bank-relative)
const BG_MAP_0_BASE: u16 = 0x1800;
const BG_MAP_1_BASE: u16 = 0x1C00;

impl LcdControl {
    pub fn display_enabled(self) -> bool {
        self.contains(Self::DISPLAY_ENABLE)
    }

    pub fn window_enabled(self) -> bool {
        self.contains(Self::WINDOW_ENABLE)
    }

    pub fn sprites_enabled(self) -> bool {
        self.contains(Self::SPRITES_ENABLE)
    }

    /// On DMG this gates background and window; on CGB it is the master
    /// priority switch.
    pub fn bg_enabled(self) -> bool {
        self.contains(Self::BG_ENABLE)
    }

    pub fn unsigned_tile_data(self) -> bool {
        self.contains(Self::TILE_DATA_UNSIGNED)
    }

    pub fn sprite_height(self) -> u8 {
        if self.contains(Self::TALL_SPRITES) {
            16
        } else {
            8
        }
    }

    pub fn bg_map_base(self) -> u16 {
        if self.contains(Self::BG_TILE_MAP) {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        }
    }

    pub fn window_map_base(self) -> u16 {
        if self.contains(Self::WINDOW_TILE_MAP) {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        }
    }
}

bitflags! {
    /// Writable interrupt-enable half of STAT (0xFF41).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct StatInterrupts: u8 {
        const LINE_COMPARE = 0b0100_0000;
        const OAM_SCAN     = 0b0010_0000;
        const VBLANK       = 0b0001_0000;
        const HBLANK       = 0b0000_1000;
    }
}

impl StatInterrupts {
    pub const WRITABLE_MASK: u8 = 0x78;
}

/// Scanline modes, numbered as they appear in the low STAT bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LcdMode {
    #[default]
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Drawing = 3,
}

impl LcdMode {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(LcdMode::HBlank),
            1 => Some(LcdMode::VBlank),
            2 => Some(LcdMode::OamScan),
            3 => Some(LcdMode::Drawing),
            _ => None,
        }
    }
}

impl fmt::Display for LcdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LcdMode::HBlank => write!(f, "HBlank"),
            LcdMode::VBlank => write!(f, "VBlank"),
            LcdMode::OamScan => write!(f, "OAM Scan"),
            LcdMode::Drawing => write!(f, "Drawing"),
        }
    }
}

bitflags! {
    /// OAM attribute byte (byte 3 of a sprite entry).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct SpriteAttributes: u8 {
        const BG_PRIORITY = 0b1000_0000;
        const Y_FLIP      = 0b0100_0000;
        const X_FLIP      = 0b0010_0000;
        const DMG_PALETTE = 0b0001_0000;
        const BANK        = 0b0000_1000;
        const CGB_PALETTE = 0b0000_0111;
    }
}

impl SpriteAttributes {
    pub fn bg_priority(self) -> bool {
        self.contains(Self::BG_PRIORITY)
    }

    pub fn y_flip(self) -> bool {
        self.contains(Self::Y_FLIP)
    }

    pub fn x_flip(self) -> bool {
        self.contains(Self::X_FLIP)
    }

    /// OBP1 when set, OBP0 otherwise.
    pub fn dmg_palette(self) -> bool {
        self.contains(Self::DMG_PALETTE)
    }

    pub fn vram_bank(self) -> u8 {
        u8::from(self.contains(Self::BANK))
    }

    pub fn cgb_palette(self) -> u8 {
        self.bits() & Self::CGB_PALETTE.bits()
    }
}

bitflags! {
    /// CGB background map attribute byte (VRAM bank 1).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct TileAttributes: u8 {
        const PRIORITY = 0b1000_0000;
        const Y_FLIP   = 0b0100_0000;
        const X_FLIP   = 0b0010_0000;
        const BANK     = 0b0000_1000;
        const PALETTE  = 0b0000_0111;
    }
}

impl TileAttributes {
    pub fn priority(self) -> bool {
        self.contains(Self::PRIORITY)
    }

    pub fn y_flip(self) -> bool {
        self.contains(Self::Y_FLIP)
    }

    pub fn x_flip(self) -> bool {
        self.contains(Self::X_FLIP)
    }

    pub fn vram_bank(self) -> u8 {
        u8::from(self.contains(Self::BANK))
    }

    pub fn palette(self) -> u8 {
        self.bits() & Self::PALETTE.bits()
    }
}
