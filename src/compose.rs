//! Turns the active layers into an ordered list of styled features.

use crate::data::DatasetProvider;
use crate::error::{Result, RiskMapError};
use crate::layers::{Domain, LayerEncoding, LayerId, LayerToggleSet};
use crate::scale::{GradientScale, SizeScale};
use crate::types::{value_range, Color, Dataset, Feature, RiskRecord};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

pub const DEFAULT_RADIUS: f64 = 8.0;

/// A layer that could not be drawn in this pass.
#[derive(Debug)]
pub struct LayerFailure {
    pub layer: LayerId,
    pub error: RiskMapError,
}

impl Serialize for LayerFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LayerFailure", 2)?;
        state.serialize_field("layer", &self.layer)?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}

/// Output of one render pass.
#[derive(Debug, Default, Serialize)]
pub struct RenderPass {
    pub features: Vec<Feature>,
    pub failures: Vec<LayerFailure>,
}

impl RenderPass {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Composes every active layer in render order. A layer whose dataset or
/// columns are invalid contributes no features and is reported in
/// `failures`; the remaining layers still render.
pub fn compose<P>(toggles: &LayerToggleSet, datasets: &P) -> RenderPass
where
    P: DatasetProvider + ?Sized,
{
    let mut pass = RenderPass::default();

    for layer in toggles.active_layers() {
        let result = datasets
            .load(layer.dataset())
            .and_then(|dataset| compose_layer(layer, &dataset));
        match result {
            Ok(features) => {
                debug!("Layer '{}' produced {} features", layer, features.len());
                pass.features.extend(features);
            }
            Err(error) => {
                warn!("Skipping layer '{}': {}", layer, error);
                pass.failures.push(LayerFailure { layer, error });
            }
        }
    }

    pass
}

/// Builds the features of a single layer, all or nothing.
pub fn compose_layer(layer: LayerId, dataset: &Dataset) -> Result<Vec<Feature>> {
    match layer.encoding() {
        LayerEncoding::Gradient {
            column,
            domain,
            colors,
            rounding,
            unit,
        } => {
            let values = dataset.numbers(column)?;
            let (min, max) = match domain {
                Domain::Fixed(min, max) => (min, max),
                Domain::Data => match value_range(&values) {
                    Some(range) => range,
                    None => return Ok(Vec::new()),
                },
            };
            let scale = GradientScale::new(min, max, colors)?;

            Ok(dataset
                .records
                .iter()
                .zip(values)
                .map(|(record, raw)| {
                    let shown = rounding.apply(raw);
                    let risk = RiskRecord {
                        label: record.label.clone(),
                        position: record.position,
                        metric: layer.metric(),
                        display: format!("{}{}", rounding.format(raw), unit),
                    };
                    Feature::new(layer, risk, scale.evaluate(shown), DEFAULT_RADIUS)
                })
                .collect())
        }
        LayerEncoding::Categorical { column } => dataset
            .records
            .iter()
            .map(|record| -> Result<Feature> {
                let risk = dataset.text(record, column)?;
                let color = soil_color(&risk);
                let risk = RiskRecord {
                    label: record.label.clone(),
                    position: record.position,
                    metric: layer.metric(),
                    display: risk.replace(" Risk", ""),
                };
                Ok(Feature::new(layer, risk, color, DEFAULT_RADIUS))
            })
            .collect(),
        LayerEncoding::Radius {
            column,
            fill,
            rounding,
            unit,
        } => {
            let values = dataset.numbers(column)?;
            let Some((min, max)) = value_range(&values) else {
                return Ok(Vec::new());
            };
            let scale = SizeScale::new(min, max);

            Ok(dataset
                .records
                .iter()
                .zip(values)
                .map(|(record, raw)| {
                    let risk = RiskRecord {
                        label: record.label.clone(),
                        position: record.position,
                        metric: layer.metric(),
                        display: format!("{}{}", rounding.format(raw), unit),
                    };
                    Feature::new(layer, risk, fill, scale.evaluate(raw))
                })
                .collect())
        }
    }
}

/// Discrete soil classes, matched case-sensitively; anything else is low risk.
pub fn soil_color(risk: &str) -> Color {
    match risk {
        "High Risk" => Color::RED,
        "Moderate Risk" => Color::ORANGE,
        _ => Color::GREEN,
    }
}
