use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub datasets: HashMap<String, DatasetConfig>,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatasetConfig {
    /// CSV, GeoJSON or shapefile, or a directory holding several named layers.
    pub path: PathBuf,
    /// Layer name inside a directory source.
    pub layer: Option<String>,
    /// Overrides the coordinate system declared by a geometry source.
    pub crs: Option<String>,
    /// Adds `distance_km` from the `distance` column (metres).
    #[serde(default)]
    pub derive_distance_km: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub title: String,
    pub description: String,
    /// Initial view as [lat, lon].
    pub center: [f64; 2],
    pub zoom: u8,
    pub tile_layers: Vec<TileLayerConfig>,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            title: "Risk Assessment Map for Transition Metal Mining".to_string(),
            description: "Environmental and socioeconomic factors related to transition metal \
                mining impacts on Indigenous communities in Australia. Use the layer control to \
                toggle data layers on and off."
                .to_string(),
            // Centre of Australia.
            center: [-25.2744, 133.7751],
            zoom: 4,
            tile_layers: vec![
                TileLayerConfig {
                    name: "Google Satellite".to_string(),
                    url: "https://mt1.google.com/vt/lyrs=s&x={x}&y={y}&z={z}".to_string(),
                    attribution: "Google".to_string(),
                },
                TileLayerConfig {
                    name: "OpenStreetMap".to_string(),
                    url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
                    attribution: "OpenStreetMap".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TileLayerConfig {
    pub name: String,
    pub url: String,
    pub attribution: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 3000 }
    }
}

impl AppConfig {
    /// Reads the TOML file. Relative dataset and output paths resolve against
    /// the directory containing the config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for dataset in self.datasets.values_mut() {
            if dataset.path.is_relative() {
                dataset.path = base.join(&dataset.path);
            }
        }
        if self.output.dir.is_relative() {
            self.output.dir = base.join(&self.output.dir);
        }
    }
}
