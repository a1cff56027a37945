//! Dot-accurate picture pipeline for the Game Boy / Game Boy Color.
//!
//! This crate contains the scanline renderer only: OAM scan, the pixel
//! fetcher, the two pixel FIFOs, the compositor and the mode/STAT controller
//! that sequences them. Everything else (CPU, DMA engines, cartridges,
//! presentation) talks to it through the [`bus::VideoBus`] trait, the lock
//! predicates on [`ppu::Ppu`] and the events returned from
//! [`ppu::Ppu::advance`].

/// Memory/register collaborator consumed by the pipeline.
pub mod bus;

/// DMG shading, CGB 15-bit color decoding and color correction.
pub mod color;

/// Pixel compositor: discards, priority resolution and framebuffer writes.
pub mod compositor;

/// Pipeline configuration loaded from TOML.
pub mod config;

/// Background/window/sprite tile fetcher.
pub mod fetcher;

/// Fixed-capacity pixel FIFOs.
pub mod fifo;

/// Hardware models and color modes.
pub mod hardware;

/// Reference implementation of [`bus::VideoBus`] backed by plain arrays.
pub mod memory;

/// Per-line sprite attribute scan.
pub mod oam_scan;

/// Mode/STAT controller that owns and drives the pipeline.
pub mod ppu;

/// Typed views of the LCD registers and attribute bytes.
pub mod registers;

/// Versioned binary snapshots of pipeline state.
pub mod savestate;

/// Owning driver that pairs the pipeline with its memory.
pub mod video;

/// Window line counter, triggers and the window-disable glitch.
pub mod window;

/// Screen resolution used by the picture pipeline.
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

/// A finished frame as 0x00RRGGBB pixels.
pub type Frame = [u32; SCREEN_WIDTH * SCREEN_HEIGHT];
