//! Renderer boundary: GeoJSON export and the Leaflet page around it.

use crate::compose::RenderPass;
use crate::config::{AppConfig, MapConfig};
use crate::layers::Category;
use crate::types::{escape_html, Feature};
use anyhow::{Context, Result};
use geojson::{FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub const FILL_OPACITY: f64 = 0.9;

/// Anything that can draw the output of a render pass.
pub trait MapRenderer {
    fn draw(&mut self, pass: &RenderPass) -> Result<()>;
}

/// Writes `features.geojson` and a self-contained `map.html` to the output directory.
pub struct FileRenderer {
    map: MapConfig,
    dir: PathBuf,
}

impl FileRenderer {
    pub fn new(config: &AppConfig) -> Self {
        FileRenderer {
            map: config.map.clone(),
            dir: config.output.dir.clone(),
        }
    }

    pub fn geojson_path(&self) -> PathBuf {
        self.dir.join("features.geojson")
    }

    pub fn page_path(&self) -> PathBuf {
        self.dir.join("map.html")
    }
}

impl MapRenderer for FileRenderer {
    fn draw(&mut self, pass: &RenderPass) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {:?}", self.dir))?;

        let collection = feature_collection(&pass.features);
        let geojson_path = self.geojson_path();
        fs::write(&geojson_path, serde_json::to_string(&collection)?)
            .with_context(|| format!("Failed to write {:?}", geojson_path))?;

        let page_path = self.page_path();
        fs::write(&page_path, static_page(&self.map, &pass.features)?)
            .with_context(|| format!("Failed to write {:?}", page_path))?;

        info!(
            "Wrote {} features to {:?} and {:?}",
            pass.features.len(),
            geojson_path,
            page_path
        );
        Ok(())
    }
}

/// One point feature per marker, style and popup carried as properties.
pub fn feature_collection(features: &[Feature]) -> FeatureCollection {
    let features = features
        .iter()
        .map(|feature| {
            let mut properties = JsonObject::new();
            properties.insert("layer".to_string(), json!(feature.layer.key()));
            properties.insert("layer_title".to_string(), json!(feature.layer.title()));
            properties.insert("color".to_string(), json!(feature.color.to_hex()));
            properties.insert("radius".to_string(), json!(feature.radius));
            properties.insert("label".to_string(), json!(feature.popup.label));
            properties.insert("metric".to_string(), json!(feature.popup.metric));
            properties.insert("value".to_string(), json!(feature.popup.value));
            properties.insert("popup_html".to_string(), json!(feature.popup.html()));
            properties.insert("popup_width".to_string(), json!(feature.popup.width));

            geojson::Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    feature.position.x(),
                    feature.position.y(),
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// A page showing a fixed set of features.
pub fn static_page(map: &MapConfig, features: &[Feature]) -> Result<String> {
    let collection = script_json(&serde_json::to_value(feature_collection(features))?)?;
    page(map, "", &format!("draw({collection});"))
}

/// A page with the category selector and sub-layer checkboxes that fetches
/// a new render pass from `/api/features` on every change.
pub fn interactive_page(map: &MapConfig) -> Result<String> {
    let catalogue = script_json(&layer_catalogue())?;
    let controls = r#"<div id="controls">
  <label for="category">Choose Layer</label>
  <select id="category"></select>
  <div id="sublayers"></div>
  <div id="failures"></div>
</div>"#;
    let boot = INTERACTIVE_BOOT.replace("__CATALOGUE__", &catalogue);
    page(map, controls, &boot)
}

/// Categories with their sub-layers, as served by `/api/layers`.
pub fn layer_catalogue() -> serde_json::Value {
    let categories: Vec<serde_json::Value> = Category::ALL
        .iter()
        .map(|category| {
            json!({
                "key": category,
                "title": category.title(),
                "base": category.base_layer().key(),
                "layers": category
                    .sub_layers()
                    .iter()
                    .map(|layer| json!({ "key": layer.key(), "title": layer.title() }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    json!(categories)
}

fn page(map: &MapConfig, controls: &str, boot: &str) -> Result<String> {
    let base = script_json(&json!({
        "center": map.center,
        "zoom": map.zoom,
        "tile_layers": map.tile_layers,
        "fill_opacity": FILL_OPACITY,
    }))?;

    Ok(PAGE_TEMPLATE
        .replace("__TITLE__", &escape_html(&map.title))
        .replace("__DESCRIPTION__", &escape_html(&map.description))
        .replace("__CONTROLS__", controls)
        .replace("__BASE__", &base)
        .replace("__BOOT__", boot))
}

// JSON that is safe to inline in a <script> element.
fn script_json(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  body { margin: 0; font-family: sans-serif; display: flex; flex-direction: column; height: 100vh; }
  header { padding: 0.5rem 1rem; }
  main { flex: 1; display: flex; }
  #controls { width: 16rem; padding: 0.5rem 1rem; }
  #controls label { display: block; margin: 0.25rem 0; }
  #failures { color: #8b0000; margin-top: 1rem; }
  #map { flex: 1; }
</style>
</head>
<body>
<header>
  <h1>__TITLE__</h1>
  <p>__DESCRIPTION__</p>
</header>
<main>
__CONTROLS__
<div id="map"></div>
</main>
<script>
const BASE = __BASE__;
const map = L.map('map', { center: BASE.center, zoom: BASE.zoom });
const baseLayers = {};
BASE.tile_layers.forEach((tiles, i) => {
  const layer = L.tileLayer(tiles.url, { attribution: tiles.attribution });
  if (i === 0) layer.addTo(map);
  baseLayers[tiles.name] = layer;
});
const control = L.control.layers(baseLayers, {}).addTo(map);
let overlays = [];

function draw(collection) {
  overlays.forEach(group => { map.removeLayer(group); control.removeLayer(group); });
  overlays = [];
  const groups = {};
  collection.features.forEach(feature => {
    const p = feature.properties;
    let group = groups[p.layer];
    if (!group) {
      group = L.layerGroup().addTo(map);
      groups[p.layer] = group;
      overlays.push(group);
      control.addOverlay(group, p.layer_title);
    }
    const [lon, lat] = feature.geometry.coordinates;
    L.circleMarker([lat, lon], {
      radius: p.radius,
      color: p.color,
      fill: true,
      fillColor: p.color,
      fillOpacity: BASE.fill_opacity,
    }).bindPopup(p.popup_html, { maxWidth: p.popup_width }).addTo(group);
  });
}

__BOOT__
</script>
</body>
</html>
"#;

const INTERACTIVE_BOOT: &str = r#"const CATALOGUE = __CATALOGUE__;
const select = document.getElementById('category');
const sublayers = document.getElementById('sublayers');
const failures = document.getElementById('failures');

CATALOGUE.forEach(category => {
  const option = document.createElement('option');
  option.value = category.key;
  option.textContent = category.title;
  select.appendChild(option);
});

function renderCheckboxes() {
  sublayers.innerHTML = '';
  const category = CATALOGUE.find(c => c.key === select.value);
  category.layers.forEach(layer => {
    const label = document.createElement('label');
    const box = document.createElement('input');
    box.type = 'checkbox';
    box.value = layer.key;
    box.addEventListener('change', refresh);
    label.appendChild(box);
    label.appendChild(document.createTextNode(' ' + layer.title));
    sublayers.appendChild(label);
  });
}

async function refresh() {
  const layers = Array.from(sublayers.querySelectorAll('input:checked')).map(b => b.value);
  const params = new URLSearchParams({ category: select.value, layers: layers.join(',') });
  const response = await fetch('/api/features?' + params);
  if (!response.ok) {
    failures.textContent = await response.text();
    return;
  }
  const pass = await response.json();
  draw(pass.collection);
  failures.textContent = pass.failures.map(f => f.layer + ': ' + f.message).join('\n');
}

select.addEventListener('change', () => { renderCheckboxes(); refresh(); });
renderCheckboxes();
refresh();"#;
