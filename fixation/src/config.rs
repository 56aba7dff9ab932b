use crate::error::{FixationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "fixation.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_blocks_per_epoch")]
    pub blocks_per_epoch: u64,
    #[serde(default = "default_epochs_to_save")]
    pub epochs_to_save: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            blocks_per_epoch: default_blocks_per_epoch(),
            epochs_to_save: default_epochs_to_save(),
        }
    }
}

fn default_blocks_per_epoch() -> u64 {
    20
}

fn default_epochs_to_save() -> u64 {
    20
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<()> {
        self.window().map(|_| ())
    }

    /// Retention window length in blocks.
    pub fn window(&self) -> Result<u64> {
        if self.blocks_per_epoch == 0 {
            return Err(FixationError::InvalidRetentionConfig(
                "blocks_per_epoch must be positive".into(),
            ));
        }
        if self.epochs_to_save == 0 {
            return Err(FixationError::InvalidRetentionConfig(
                "epochs_to_save must be positive".into(),
            ));
        }
        self.blocks_per_epoch
            .checked_mul(self.epochs_to_save)
            .ok_or_else(|| {
                FixationError::InvalidRetentionConfig("retention window overflows u64".into())
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixationConfig {
    /// Directory of the on-disk ledger; in-memory when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl FixationConfig {
    /// Read `fixation.toml` from `dir`, falling back to defaults when absent.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        let cfg: FixationConfig = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)
                .map_err(|e| FixationError::Config(format!("{}: {e}", path.display())))?,
            Err(err) if err.kind() == ErrorKind::NotFound => FixationConfig::default(),
            Err(err) => {
                return Err(FixationError::Config(format!("{}: {err}", path.display())));
            }
        };
        cfg.retention.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let path = dir.as_ref().join(CONFIG_FILE);
        let text = toml::to_string(self).map_err(|e| FixationError::Config(e.to_string()))?;
        fs::write(&path, text)
            .map_err(|e| FixationError::Config(format!("{}: {e}", path.display())))
    }
}
