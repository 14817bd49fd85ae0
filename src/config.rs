//! Persistent capture settings.
//!
//! Stored as JSON, by default in
//! `$HOME/.config/libseek-pi/config.json`. Missing fields
//! take their defaults and unknown fields are ignored, so
//! files written by older or newer tools still load.

use std::{
    env,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::warn;
use serde_derive::*;

use crate::{temperature::TemperatureModel, variant::CameraVariant};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub camera_type: CameraVariant,
    pub ffc_path: Option<PathBuf>,
    pub frame_count: usize,
    pub temperature: TemperatureModel,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            camera_type: CameraVariant::Pro,
            ffc_path: None,
            frame_count: 1,
            temperature: TemperatureModel::default(),
        }
    }
}

/// `$HOME/.config/libseek-pi/config.json`, if `$HOME` is set.
pub fn default_config_path() -> Option<PathBuf> {
    let home = env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("libseek-pi")
            .join("config.json"),
    )
}

impl CaptureConfig {
    /// Strictly read a config file.
    pub fn try_from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening config `{}`", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config `{}`", path.display()))
    }

    /// Read a config file, falling back to defaults when it
    /// is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::try_from_path(path).unwrap_or_else(|e| {
            warn!("{:#}; using defaults", e);
            Self::default()
        })
    }

    /// Write the config as pretty JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating config dir `{}`", dir.display()))?;
        }
        let mut wtr = BufWriter::new(
            File::create(path).with_context(|| format!("creating `{}`", path.display()))?,
        );
        serde_json::to_writer_pretty(&mut wtr, self)?;
        wtr.flush()?;
        Ok(())
    }
}
