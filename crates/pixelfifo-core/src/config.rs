use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::color::{ColorCorrection, Colorizer, DmgPalette};
use crate::hardware::Model;

/// Settings that shape the pipeline's output but are not part of its
/// emulated state (they are not stored in snapshots).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PpuConfig {
    pub model: Model,
    pub color_correction: ColorCorrection,
    pub dmg_palette: DmgPalette,
}

impl PpuConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn colorizer(&self) -> Colorizer {
        Colorizer::new(self.dmg_palette, self.color_correction)
    }

    /// Missing files give the defaults silently; malformed ones are logged.
    pub fn load_from_file(path: &Path) -> PpuConfig {
        let text = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                debug!("No PPU config at {}: {e}; using defaults", path.display());
                return PpuConfig::default();
            }
        };

        match Self::from_toml(&text) {
            Ok(cfg) => {
                debug!("Loaded PPU config from {}: {cfg:?}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to parse PPU config {}: {e}; using defaults",
                    path.display()
                );
                PpuConfig::default()
            }
        }
    }

    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = self.to_toml().map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}
