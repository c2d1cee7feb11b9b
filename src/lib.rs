//! Risk-layer rendering for mining deposit maps.
//!
//! Datasets are loaded and harmonized to WGS84 by [`data`], scalar values
//! are encoded by the scales in [`scale`], and [`compose`] turns the active
//! [`layers`] into styled features that a [`render::MapRenderer`] draws.

pub mod compose;
pub mod config;
pub mod crs;
pub mod data;
pub mod error;
pub mod layers;
pub mod render;
pub mod scale;
pub mod server;
pub mod types;

pub use compose::{compose, RenderPass};
pub use data::{DatasetLoader, DatasetProvider};
pub use error::RiskMapError;
pub use layers::{Category, LayerId, LayerToggleSet};
