use crate::control::ToggleLabels;
use crate::encoding::EncodingTableId;
use crate::layers::{ClusterOptions, PopupTemplate, RegionStyle, TemplateField};
use crate::viewport::FitPolicy;
use crate::widget::TileLayer;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub labels: ToggleLabels,
    #[serde(default)]
    pub base_layers: Vec<BaseLayerConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Initial view, used until a dataset is framed.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center: [f64; 2], // [lat, lon]
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [-38.859, -68.097],
            zoom: 13,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ViewportConfig {
    pub policy: FitPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BaseLayerConfig {
    #[serde(flatten)]
    pub tiles: TileLayer,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Points,
    Regions,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub location: String, // file path (relative to the config) or http(s) URL
    pub kind: SourceKind,
    pub encoding: EncodingTableId,
    pub encoding_key: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub template: Vec<TemplateField>,
    #[serde(default)]
    pub cluster: ClusterOptions,
    #[serde(default)]
    pub region_style: RegionStyle,
}

fn default_visible() -> bool {
    true
}

impl SourceConfig {
    pub fn popup_template(&self) -> PopupTemplate {
        if !self.template.is_empty() {
            return PopupTemplate::new(self.template.clone());
        }
        match self.kind {
            SourceKind::Points => PopupTemplate::accommodation(),
            SourceKind::Regions => PopupTemplate::named(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Layer names must be unique across base layers and sources.
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let names = self
            .base_layers
            .iter()
            .map(|b| &b.tiles.name)
            .chain(self.sources.iter().map(|s| &s.name));
        for name in names {
            if name.trim().is_empty() {
                return Err(anyhow!("Layer names must not be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(anyhow!("Duplicate layer name in configuration: {}", name));
            }
        }
        Ok(())
    }
}
