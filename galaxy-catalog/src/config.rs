//! Catalog configuration.
//!
//! ```toml
//! filename = "alphaq_v2.1.1.json"
//! version = "2.1.1"
//! lightcone = true
//! layout = "galaxy"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::version::CatalogVersion;

/// How native data is partitioned inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// All galaxies under one `galaxyProperties` group.
    #[default]
    Galaxy,
    /// One group per halo, filterable on halo attributes.
    Cluster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub filename: PathBuf,
    /// Schema version the caller expects the file to declare.
    #[serde(default = "default_version")]
    pub version: String,
    /// Whether this is a light-cone catalog. Passed through uninterpreted.
    #[serde(default)]
    pub lightcone: bool,
    #[serde(default)]
    pub layout: Layout,
}

fn default_version() -> String {
    "0.0".to_string()
}

impl CatalogConfig {
    pub fn new(filename: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            version: version.into(),
            lightcone: false,
            layout: Layout::default(),
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_lightcone(mut self, lightcone: bool) -> Self {
        self.lightcone = lightcone;
        self
    }

    /// Loads a TOML config file. A relative `filename` is resolved against
    /// the directory containing the config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog config: {:?}", path))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid catalog config: {:?}", path))?;

        if config.filename.is_relative() {
            if let Some(dir) = path.parent() {
                config.filename = dir.join(&config.filename);
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: CatalogConfig =
            toml::from_str(content).context("Failed to parse catalog config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.filename.as_os_str().is_empty() {
            anyhow::bail!("Catalog filename cannot be empty");
        }
        self.expected_version()?;
        Ok(())
    }

    pub fn expected_version(&self) -> Result<CatalogVersion> {
        self.version.parse()
    }
}
