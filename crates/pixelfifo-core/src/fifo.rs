use crate::bus::Layer;
use crate::registers::{self, Register};
use crate::savestate::{SaveState, SnapshotError, StateReader, StateWriter};

pub const FIFO_CAPACITY: usize = 8;

/// Where a pixel's final color comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteRef {
    /// Monochrome shade register (BGP, OBP0 or OBP1) by address.
    Register(u16),
    /// One of the eight color palettes of a layer.
    Color { layer: Layer, index: u8 },
}

impl Default for PaletteRef {
    fn default() -> Self {
        PaletteRef::Register(registers::BGP)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pixel {
    /// 2-bit color index; 0 is transparent for sprites.
    pub color: u8,
    pub palette: PaletteRef,
    /// BG-over-OBJ bit (sprite attribute bit 7 or CGB tile attribute bit 7).
    pub priority: bool,
    /// OAM index of the sprite that produced this pixel.
    pub oam_index: u8,
}

impl Pixel {
    pub const TRANSPARENT: Pixel = Pixel {
        color: 0,
        palette: PaletteRef::Register(registers::OBP0),
        priority: false,
        oam_index: u8::MAX,
    };

    pub fn is_transparent(&self) -> bool {
        self.color == 0
    }
}

/// Capacity-8 ring buffer of pixels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelFifo {
    buf: [Pixel; FIFO_CAPACITY],
    head: u8,
    tail: u8,
    size: u8,
}

impl PixelFifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        usize::from(self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.size = 0;
    }

    fn push(&mut self, pixel: Pixel) {
        debug_assert!(self.len() < FIFO_CAPACITY);
        self.buf[usize::from(self.tail)] = pixel;
        self.tail = (self.tail + 1) % FIFO_CAPACITY as u8;
        self.size += 1;
    }

    pub fn pop(&mut self) -> Option<Pixel> {
        if self.size == 0 {
            return None;
        }
        let pixel = self.buf[usize::from(self.head)];
        self.head = (self.head + 1) % FIFO_CAPACITY as u8;
        self.size -= 1;
        Some(pixel)
    }

    /// Pixel `index` positions from the front.
    pub fn peek(&self, index: usize) -> Option<&Pixel> {
        (index < self.len()).then(|| &self.buf[(usize::from(self.head) + index) % FIFO_CAPACITY])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pixel> + '_ {
        (0..self.len()).filter_map(move |i| self.peek(i))
    }

    /// Background/window push: the whole batch is accepted only when the
    /// FIFO has fully drained.
    pub fn push_batch(&mut self, batch: &[Pixel; FIFO_CAPACITY]) -> bool {
        if self.size != 0 {
            return false;
        }
        for &pixel in batch {
            self.push(pixel);
        }
        true
    }

    /// Sprite merge: pads the FIFO with transparent pixels up to the batch
    /// length, then lets each opaque incoming pixel replace a transparent
    /// one. With `index_priority` set an opaque pixel also replaces one from
    /// a sprite with a higher OAM index.
    pub fn merge_sprite(&mut self, incoming: &[Pixel], index_priority: bool) {
        debug_assert!(incoming.len() <= FIFO_CAPACITY);
        while self.len() < incoming.len() {
            self.push(Pixel::TRANSPARENT);
        }
        for (i, pixel) in incoming.iter().enumerate() {
            if pixel.is_transparent() {
                continue;
            }
            let slot = &mut self.buf[(usize::from(self.head) + i) % FIFO_CAPACITY];
            if slot.is_transparent() || (index_priority && pixel.oam_index < slot.oam_index) {
                *slot = *pixel;
            }
        }
    }
}

impl SaveState for Pixel {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.color);
        match self.palette {
            PaletteRef::Register(addr) => {
                w.u8(0);
                w.u16(addr);
            }
            PaletteRef::Color { layer, index } => {
                w.u8(1);
                w.u8(match layer {
                    Layer::Background => 0,
                    Layer::Object => 1,
                });
                w.u8(index);
            }
        }
        w.bool(self.priority);
        w.u8(self.oam_index);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        let color = r.bounded_u8("pixel.color", 3)?;
        let palette = match r.u8()? {
            0 => {
                let addr = r.u16()?;
                if Register::shade_register(addr).is_none() {
                    return Err(SnapshotError::invalid("pixel.palette.register", addr));
                }
                PaletteRef::Register(addr)
            }
            1 => {
                let layer = match r.u8()? {
                    0 => Layer::Background,
                    1 => Layer::Object,
                    other => return Err(SnapshotError::invalid("pixel.palette.layer", other)),
                };
                let index = r.bounded_u8("pixel.palette.index", 7)?;
                PaletteRef::Color { layer, index }
            }
            other => return Err(SnapshotError::invalid("pixel.palette", other)),
        };
        Ok(Pixel {
            color,
            palette,
            priority: r.bool("pixel.priority")?,
            oam_index: r.u8()?,
        })
    }
}

impl SaveState for PixelFifo {
    fn save_state(&self, w: &mut StateWriter) {
        for pixel in &self.buf {
            pixel.save_state(w);
        }
        w.u8(self.head);
        w.u8(self.tail);
        w.u8(self.size);
    }

    fn load_state(r: &mut StateReader<'_>) -> Result<Self, SnapshotError> {
        let mut buf = [Pixel::default(); FIFO_CAPACITY];
        for slot in &mut buf {
            *slot = Pixel::load_state(r)?;
        }
        let head = r.bounded_u8("fifo.head", FIFO_CAPACITY as u8 - 1)?;
        let tail = r.bounded_u8("fifo.tail", FIFO_CAPACITY as u8 - 1)?;
        let size = r.bounded_u8("fifo.size", FIFO_CAPACITY as u8)?;
        if tail != (head + size) % FIFO_CAPACITY as u8 {
            return Err(SnapshotError::invalid("fifo.tail", tail));
        }
        Ok(PixelFifo {
            buf,
            head,
            tail,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bg(color: u8) -> Pixel {
        Pixel {
            color,
            ..Pixel::default()
        }
    }

    fn sprite(color: u8, oam_index: u8) -> Pixel {
        Pixel {
            color,
            palette: PaletteRef::Register(registers::OBP1),
            priority: false,
            oam_index,
        }
    }

    #[test]
    fn background_push_requires_empty_fifo() {
        let mut fifo = PixelFifo::new();
        let batch = [bg(1); FIFO_CAPACITY];
        assert!(fifo.push_batch(&batch));
        assert_eq!(fifo.len(), 8);
        assert!(!fifo.push_batch(&[bg(2); FIFO_CAPACITY]));

        for _ in 0..7 {
            fifo.pop();
        }
        assert!(!fifo.push_batch(&[bg(2); FIFO_CAPACITY]));
        assert_eq!(fifo.pop(), Some(bg(1)));
        assert_eq!(fifo.pop(), None);
        assert!(fifo.push_batch(&[bg(2); FIFO_CAPACITY]));
        assert_eq!(fifo.pop(), Some(bg(2)));
    }

    #[test]
    fn ring_wraps_after_partial_drain() {
        let mut fifo = PixelFifo::new();
        fifo.merge_sprite(&[sprite(1, 0); 5], false);
        for _ in 0..5 {
            fifo.pop();
        }
        fifo.merge_sprite(&[sprite(2, 1); 8], false);
        assert_eq!(fifo.len(), 8);
        assert!(fifo.iter().all(|p| p.color == 2));
    }

    #[test]
    fn merge_only_fills_transparent_slots() {
        let mut fifo = PixelFifo::new();
        fifo.merge_sprite(&[sprite(0, 3), sprite(1, 3), sprite(2, 3)], false);
        fifo.merge_sprite(&[sprite(3, 1); 4], false);

        let colors: Vec<u8> = fifo.iter().map(|p| p.color).collect();
        assert_eq!(colors, vec![3, 1, 2, 3]);
        assert_eq!(fifo.peek(1).map(|p| p.oam_index), Some(3));
        assert_eq!(fifo.peek(3).map(|p| p.oam_index), Some(1));
    }

    #[test]
    fn merge_with_index_priority_prefers_lower_oam_index() {
        let mut fifo = PixelFifo::new();
        fifo.merge_sprite(&[sprite(1, 5); 8], true);
        fifo.merge_sprite(&[sprite(2, 2), sprite(0, 2), sprite(3, 9)], true);

        let winners: Vec<(u8, u8)> = fifo.iter().take(3).map(|p| (p.color, p.oam_index)).collect();
        assert_eq!(winners, vec![(2, 2), (1, 5), (1, 5)]);
    }

    #[test]
    fn snapshot_rejects_inconsistent_pointers() {
        let mut fifo = PixelFifo::new();
        fifo.merge_sprite(&[sprite(1, 0); 3], false);
        let mut w = StateWriter::new();
        fifo.save_state(&mut w);
        let mut data = w.into_inner();

        let restored = PixelFifo::load_state(&mut StateReader::new(&data));
        assert_eq!(restored, Ok(fifo));

        let size_at = data.len() - 1;
        data[size_at] = 9;
        assert_eq!(
            PixelFifo::load_state(&mut StateReader::new(&data)),
            Err(SnapshotError::invalid("fifo.size", 9u8))
        );
        data[size_at] = 2;
        assert_eq!(
            PixelFifo::load_state(&mut StateReader::new(&data)),
            Err(SnapshotError::invalid("fifo.tail", 3u8))
        );
    }
}
