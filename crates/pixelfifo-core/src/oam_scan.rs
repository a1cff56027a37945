use crate::bus::VideoBus;
use crate::registers::SpriteAttributes;
use crate::savestate::{SaveState, SnapshotError, StateReader, StateWriter};

// Sprite limits
pub const MAX_SPRITES_PER_LINE: usize = 10;
pub const TOTAL_SPRITES: u8 = 40;

/// One OAM entry latched during the scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteSlot {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub attributes: SpriteAttributes,
    pub oam_index: u8,
}

/// Up to ten sprites for a line, ascending by x with ties in OAM order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OamScanResult {
    slots: [SpriteSlot; MAX_SPRITES_PER_LINE],
    len: u8,
}

impl OamScanResult {
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == MAX_SPRITES_PER_LINE
    }

    pub fn get(&self, index: usize) -> Option<&SpriteSlot> {
        self.as_slice().get(index)
    }

    pub fn as_slice(&self) -> &[SpriteSlot] {
        &self.slots[..self.len()]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Insert after every slot whose x is not greater, keeping scan order
    /// on ties. Returns false when the list is already full.
    pub fn insert(&mut self, slot: SpriteSlot) -> bool {
        if self.is_full() {
            return false;
        }
        let len = self.len();
        let pos = self.as_slice().partition_point(|s| s.x <= slot.x);
        self.slots.copy_within(pos..len, pos + 1);
        self.slots[pos] = slot;
        self.len += 1;
        true
    }
}

/// Walks the 40 OAM entries at two dots per entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OamScanner {
    index: u8,
    result: OamScanResult,
}

impl OamScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a scan with `index` entries already considered done.
    pub fn reset_to(&mut self, index: u8) {
        self.index = index.min(TOTAL_SPRITES);
        self.result.clear();
    }

    pub fn reset(&mut self) {
        self.reset_to(0);
    }

    /// Next OAM entry to be evaluated.
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn is_done(&self) -> bool {
        self.index >= TOTAL_SPRITES
    }

    pub fn result(&self) -> &OamScanResult {
        &self.result
    }

    /// Run the scan for one dot. An entry is evaluated on the second dot of
    /// its pair.
    pub fn tick<B: VideoBus + ?Sized>(&mut self, dot: u16, ly: u8, bus: &B) {
        if self.is_done() || dot % 2 == 0 {
            return;
        }
        self.evaluate(ly, bus);
        self.index += 1;
    }

    fn evaluate<B: VideoBus + ?Sized>(&mut self, ly: u8, bus: &B) {
        if self.result.is_full() {
            return;
        }
        let base = u16::from(self.index) * 4;
        let y = u16::from(bus.oam_byte(base));
        let height = u16::from(bus.lcdc().sprite_height());
        let line = u16::from(ly) + 16;
        if line < y || line >= y + height {
            return;
        }
        self.result.insert(SpriteSlot {
            y: y as u8,
            x: bus.oam_byte(base + 1),
            tile: bus.oam_byte(base + 2),
            attributes: SpriteAttributes::from_bits_retain(bus.oam_byte(base + 3)),
            oam_index: self.index,
        });
    }
}

impl SaveState for SpriteSlot {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.y);
        w.u8(self.x);
        w.u8(self.tile);
        w.u8(self.attributes.bits());
        w.u8(self.oam_index);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        Ok(SpriteSlot {
            y: r.u8()?,
            x: r.u8()?,
            tile: r.u8()?,
            attributes: SpriteAttributes::from_bits_retain(r.u8()?),
            oam_index: r.bounded_u8("sprite.oam_index", TOTAL_SPRITES - 1)?,
        })
    }
}

impl SaveState for OamScanResult {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.len);
        for slot in self.as_slice() {
            slot.save_state(w);
        }
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        let len = r.bounded_u8("scan.len", MAX_SPRITES_PER_LINE as u8)?;
        let mut result = OamScanResult::default();
        for i in 0..usize::from(len) {
            result.slots[i] = SpriteSlot::load_state(r)?;
        }
        result.len = len;
        let sorted = result
            .as_slice()
            .windows(2)
            .all(|pair| (pair[0].x, pair[0].oam_index) < (pair[1].x, pair[1].oam_index));
        if !sorted {
            return Err(SnapshotError::invalid("scan.order", len));
        }
        Ok(result)
    }
}

impl SaveState for OamScanner {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.index);
        self.result.save_state(w);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        Ok(OamScanner {
            index: r.bounded_u8("scan.index", TOTAL_SPRITES)?,
            result: OamScanResult::load_state(r)?,
        })
    }
}
