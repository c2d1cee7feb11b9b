//! Layer catalogue and the exclusive category toggle state.

use crate::error::{Result, RiskMapError};
use crate::types::Color;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Environmental,
    Aboriginal,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Environmental, Category::Aboriginal];

    pub fn title(&self) -> &'static str {
        match self {
            Category::Environmental => "Environmental",
            Category::Aboriginal => "Aboriginal",
        }
    }

    pub fn base_layer(&self) -> LayerId {
        match self {
            Category::Environmental => LayerId::Environmental,
            Category::Aboriginal => LayerId::Aboriginal,
        }
    }

    /// Optional layers of this category, in render order.
    pub fn sub_layers(&self) -> &'static [LayerId] {
        match self {
            Category::Environmental => &[
                LayerId::Soil,
                LayerId::Waterways,
                LayerId::Biodiversity,
                LayerId::Vegetation,
            ],
            Category::Aboriginal => &[
                LayerId::CulturalHeritage,
                LayerId::Socioeconomic,
                LayerId::Health,
            ],
        }
    }
}

impl FromStr for Category {
    type Err = RiskMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "environmental" => Ok(Category::Environmental),
            "aboriginal" => Ok(Category::Aboriginal),
            other => Err(RiskMapError::InvalidToggle(format!("unknown category '{other}'"))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Every layer the map can show. Declaration order is render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerId {
    Environmental,
    Soil,
    Waterways,
    Biodiversity,
    Vegetation,
    Aboriginal,
    CulturalHeritage,
    Socioeconomic,
    Health,
}

/// How a value is shown in the popup (and, for gradients, what gets coloured).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    None,
    Integer,
    Decimals(i32),
}

impl Rounding {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Rounding::None => value,
            Rounding::Integer => value.round_ties_even(),
            Rounding::Decimals(places) => {
                let factor = 10f64.powi(*places);
                (value * factor).round_ties_even() / factor
            }
        }
    }

    pub fn format(&self, value: f64) -> String {
        match self {
            Rounding::Integer => format!("{:.0}", self.apply(value)),
            _ => format!("{}", self.apply(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    Fixed(f64, f64),
    /// The metric column's own extrema.
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerEncoding {
    Gradient {
        column: &'static str,
        domain: Domain,
        colors: &'static [Color],
        rounding: Rounding,
        unit: &'static str,
    },
    /// Soil classes: discrete colour per risk string.
    Categorical { column: &'static str },
    Radius {
        column: &'static str,
        fill: Color,
        rounding: Rounding,
        unit: &'static str,
    },
}

impl LayerId {
    pub const ALL: [LayerId; 9] = [
        LayerId::Environmental,
        LayerId::Soil,
        LayerId::Waterways,
        LayerId::Biodiversity,
        LayerId::Vegetation,
        LayerId::Aboriginal,
        LayerId::CulturalHeritage,
        LayerId::Socioeconomic,
        LayerId::Health,
    ];

    /// Identifier used in configuration, query strings and CLI flags.
    pub fn key(&self) -> &'static str {
        match self {
            LayerId::Environmental => "environmental",
            LayerId::Soil => "soil",
            LayerId::Waterways => "waterways",
            LayerId::Biodiversity => "biodiversity",
            LayerId::Vegetation => "vegetation",
            LayerId::Aboriginal => "aboriginal",
            LayerId::CulturalHeritage => "cultural_heritage",
            LayerId::Socioeconomic => "socioeconomic",
            LayerId::Health => "health",
        }
    }

    /// Name of the configured dataset the layer draws from.
    pub fn dataset(&self) -> &'static str {
        self.key()
    }

    pub fn title(&self) -> &'static str {
        match self {
            LayerId::Environmental => "Environmental Risk",
            LayerId::Soil => "Soil Classifications",
            LayerId::Waterways => "Waterways Distances",
            LayerId::Biodiversity => "Biodiversity",
            LayerId::Vegetation => "Vegetation",
            LayerId::Aboriginal => "Aboriginal Risk",
            LayerId::CulturalHeritage => "Cultural Heritage Sites Distances",
            LayerId::Socioeconomic => "Socioeconomic",
            LayerId::Health => "Health",
        }
    }

    /// Metric label shown in the popup.
    pub fn metric(&self) -> &'static str {
        match self {
            LayerId::Environmental => "Environmental Risk",
            LayerId::Soil => "Soil Risk",
            LayerId::Waterways => "Distance to Waterway",
            LayerId::Biodiversity => "Species Count",
            LayerId::Vegetation => "Vegetation",
            LayerId::Aboriginal => "Aboriginal Risk",
            LayerId::CulturalHeritage => "Distance to Cultural Heritage Site",
            LayerId::Socioeconomic => "Socioeconomic Score",
            LayerId::Health => "Health Score",
        }
    }

    pub fn popup_width(&self) -> u32 {
        match self {
            LayerId::Waterways | LayerId::Socioeconomic | LayerId::Health => 250,
            LayerId::CulturalHeritage => 350,
            _ => 200,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            LayerId::Environmental
            | LayerId::Soil
            | LayerId::Waterways
            | LayerId::Biodiversity
            | LayerId::Vegetation => Category::Environmental,
            _ => Category::Aboriginal,
        }
    }

    pub fn is_base(&self) -> bool {
        *self == self.category().base_layer()
    }

    pub fn encoding(&self) -> LayerEncoding {
        const FOREST: &[Color] = &[Color::WHITE, Color::rgb(0x22, 0x8B, 0x22)];
        const WATER: &[Color] = &[Color::WHITE, Color::BLUE];
        const SIENNA: &[Color] = &[Color::WHITE, Color::rgb(0xA0, 0x52, 0x2D)];
        const HERITAGE: &[Color] = &[Color::WHITE, Color::RED];
        const VIOLET: &[Color] = &[Color::WHITE, Color::rgb(0x79, 0x00, 0xFF)];
        const DARK_RED: &[Color] = &[Color::WHITE, Color::rgb(0x8B, 0x00, 0x00)];

        match self {
            LayerId::Environmental => LayerEncoding::Gradient {
                column: "environmental_risk",
                domain: Domain::Fixed(0.0, 1.0),
                colors: FOREST,
                rounding: Rounding::Decimals(2),
                unit: "",
            },
            LayerId::Soil => LayerEncoding::Categorical { column: "risk" },
            LayerId::Waterways => LayerEncoding::Gradient {
                column: "distance_km",
                domain: Domain::Data,
                colors: WATER,
                rounding: Rounding::Decimals(2),
                unit: " km",
            },
            LayerId::Biodiversity => LayerEncoding::Radius {
                column: "species_count",
                fill: Color::ORANGE,
                rounding: Rounding::Integer,
                unit: "",
            },
            LayerId::Vegetation => LayerEncoding::Radius {
                column: "%vegetation",
                fill: Color::GREEN,
                rounding: Rounding::Decimals(1),
                unit: "%",
            },
            LayerId::Aboriginal => LayerEncoding::Gradient {
                column: "aboriginal_risk",
                domain: Domain::Fixed(0.0, 1.0),
                colors: SIENNA,
                rounding: Rounding::Decimals(2),
                unit: "",
            },
            LayerId::CulturalHeritage => LayerEncoding::Gradient {
                column: "distance_km",
                domain: Domain::Data,
                colors: HERITAGE,
                rounding: Rounding::Decimals(2),
                unit: " km",
            },
            LayerId::Socioeconomic => LayerEncoding::Gradient {
                column: "socioeconomic",
                domain: Domain::Data,
                colors: VIOLET,
                rounding: Rounding::None,
                unit: "",
            },
            LayerId::Health => LayerEncoding::Gradient {
                column: "health",
                domain: Domain::Data,
                colors: DARK_RED,
                rounding: Rounding::None,
                unit: "",
            },
        }
    }
}

impl FromStr for LayerId {
    type Err = RiskMapError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let key = match key.as_str() {
            "chs" => "cultural_heritage",
            other => other,
        };
        LayerId::ALL
            .into_iter()
            .find(|layer| layer.key() == key)
            .ok_or_else(|| RiskMapError::InvalidToggle(format!("unknown layer '{}'", s.trim())))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvironmentalLayers {
    pub soil: bool,
    pub waterways: bool,
    pub biodiversity: bool,
    pub vegetation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AboriginalLayers {
    pub cultural_heritage: bool,
    pub socioeconomic: bool,
    pub health: bool,
}

/// Which layers a render pass draws. Exactly one category is active and its
/// base layer is always drawn; sub-layers can only belong to that category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerToggleSet {
    Environmental(EnvironmentalLayers),
    Aboriginal(AboriginalLayers),
}

impl Default for LayerToggleSet {
    fn default() -> Self {
        LayerToggleSet::new(Category::Environmental)
    }
}

impl LayerToggleSet {
    /// The category with every sub-layer switched off.
    pub fn new(category: Category) -> Self {
        match category {
            Category::Environmental => LayerToggleSet::Environmental(EnvironmentalLayers::default()),
            Category::Aboriginal => LayerToggleSet::Aboriginal(AboriginalLayers::default()),
        }
    }

    pub fn from_parts<I>(category: Category, layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = LayerId>,
    {
        layers
            .into_iter()
            .try_fold(LayerToggleSet::new(category), |toggles, layer| toggles.with_layer(layer, true))
    }

    pub fn category(&self) -> Category {
        match self {
            LayerToggleSet::Environmental(_) => Category::Environmental,
            LayerToggleSet::Aboriginal(_) => Category::Aboriginal,
        }
    }

    /// Switching to a different category drops every sub-layer toggle.
    pub fn select_category(self, category: Category) -> Self {
        if self.category() == category {
            self
        } else {
            LayerToggleSet::new(category)
        }
    }

    pub fn with_layer(self, layer: LayerId, on: bool) -> Result<Self> {
        if layer.category() != self.category() {
            return Err(RiskMapError::InvalidToggle(format!(
                "layer '{}' belongs to the {} category but {} is active",
                layer,
                layer.category(),
                self.category()
            )));
        }
        if layer.is_base() {
            return Ok(self);
        }

        let mut toggles = self;
        match &mut toggles {
            LayerToggleSet::Environmental(env) => match layer {
                LayerId::Soil => env.soil = on,
                LayerId::Waterways => env.waterways = on,
                LayerId::Biodiversity => env.biodiversity = on,
                _ => env.vegetation = on,
            },
            LayerToggleSet::Aboriginal(abo) => match layer {
                LayerId::CulturalHeritage => abo.cultural_heritage = on,
                LayerId::Socioeconomic => abo.socioeconomic = on,
                _ => abo.health = on,
            },
        }
        Ok(toggles)
    }

    pub fn is_active(&self, layer: LayerId) -> bool {
        match (self, layer) {
            (LayerToggleSet::Environmental(_), LayerId::Environmental) => true,
            (LayerToggleSet::Environmental(env), LayerId::Soil) => env.soil,
            (LayerToggleSet::Environmental(env), LayerId::Waterways) => env.waterways,
            (LayerToggleSet::Environmental(env), LayerId::Biodiversity) => env.biodiversity,
            (LayerToggleSet::Environmental(env), LayerId::Vegetation) => env.vegetation,
            (LayerToggleSet::Aboriginal(_), LayerId::Aboriginal) => true,
            (LayerToggleSet::Aboriginal(abo), LayerId::CulturalHeritage) => abo.cultural_heritage,
            (LayerToggleSet::Aboriginal(abo), LayerId::Socioeconomic) => abo.socioeconomic,
            (LayerToggleSet::Aboriginal(abo), LayerId::Health) => abo.health,
            _ => false,
        }
    }

    /// Active layers in render order: base layer first, then sub-layers.
    pub fn active_layers(&self) -> Vec<LayerId> {
        LayerId::ALL
            .into_iter()
            .filter(|layer| self.is_active(*layer))
            .collect()
    }
}
