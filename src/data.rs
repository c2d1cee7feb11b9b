//! Dataset loading, derived fields and the memoizing loader.

use crate::config::{AppConfig, DatasetConfig};
use crate::crs::{self, Crs};
use crate::error::{Result, RiskMapError};
use crate::types::{AttributeValue, Dataset, Record};
use csv::ReaderBuilder;
use geo::{Centroid, Point};
use geojson::GeoJson;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub const LABEL_COLUMN: &str = "deposit";
pub const LONGITUDE_COLUMN: &str = "long";
pub const LATITUDE_COLUMN: &str = "lat";
pub const DISTANCE_COLUMN: &str = "distance";
pub const DISTANCE_KM_COLUMN: &str = "distance_km";

/// Access to harmonized datasets by name.
pub trait DatasetProvider {
    fn load(&self, name: &str) -> Result<Arc<Dataset>>;
}

impl DatasetProvider for HashMap<String, Arc<Dataset>> {
    fn load(&self, name: &str) -> Result<Arc<Dataset>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RiskMapError::UnknownDataset(name.to_string()))
    }
}

/// File-backed provider. Each source is read and harmonized once, then
/// served from the cache for the rest of the process.
pub struct DatasetLoader {
    sources: HashMap<String, DatasetConfig>,
    cache: Mutex<HashMap<String, Arc<Dataset>>>,
}

impl DatasetLoader {
    pub fn new(sources: HashMap<String, DatasetConfig>) -> Self {
        DatasetLoader {
            sources,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.datasets.clone())
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

impl DatasetProvider for DatasetLoader {
    fn load(&self, name: &str) -> Result<Arc<Dataset>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dataset) = cache.get(name) {
            debug!("Dataset '{}' served from cache", name);
            return Ok(Arc::clone(dataset));
        }

        let source = self
            .sources
            .get(name)
            .ok_or_else(|| RiskMapError::UnknownDataset(name.to_string()))?;
        let dataset = Arc::new(load_dataset(name, source)?);
        cache.insert(name.to_string(), Arc::clone(&dataset));
        Ok(dataset)
    }
}

/// Reads one source, derives computed fields and reprojects it to WGS84.
pub fn load_dataset(name: &str, source: &DatasetConfig) -> Result<Dataset> {
    let path = resolve_source_path(source)?;
    info!("Loading dataset '{}' from {:?}", name, path);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| RiskMapError::UnsupportedFormat(format!("{:?} has no extension", path)))?;

    let mut dataset = match extension.as_str() {
        "csv" => {
            if source.crs.is_some() {
                warn!("Ignoring crs override for tabular dataset '{}'", name);
            }
            load_csv(name, &path)?
        }
        "json" | "geojson" => load_geojson(name, &path, source.crs.as_deref())?,
        "shp" => load_shapefile(name, &path, source.crs.as_deref())?,
        other => return Err(RiskMapError::UnsupportedFormat(other.to_string())),
    };

    if source.derive_distance_km {
        derive_distance_km(&mut dataset)?;
    }

    let dataset = crs::harmonize(dataset)?;
    info!("Loaded {} records for dataset '{}'", dataset.records.len(), name);
    Ok(dataset)
}

// A directory source holds one file per named layer.
fn resolve_source_path(source: &DatasetConfig) -> Result<PathBuf> {
    if !source.path.is_dir() {
        if let Some(layer) = &source.layer {
            return Err(RiskMapError::UnsupportedFormat(format!(
                "layer '{}' requested but {:?} is not a directory source",
                layer, source.path
            )));
        }
        return Ok(source.path.clone());
    }

    let layer = source.layer.as_deref().ok_or_else(|| {
        RiskMapError::UnsupportedFormat(format!(
            "{:?} is a directory; choose one of its layers with `layer`",
            source.path
        ))
    })?;
    ["geojson", "json", "shp", "csv"]
        .iter()
        .map(|ext| source.path.join(format!("{layer}.{ext}")))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            RiskMapError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("layer '{}' not found in {:?}", layer, source.path),
            ))
        })
}

/// Adds `distance_km = distance / 1000` to every record.
pub fn derive_distance_km(dataset: &mut Dataset) -> Result<()> {
    let kilometres = dataset
        .records
        .iter()
        .map(|record| dataset.number(record, DISTANCE_COLUMN).map(|m| m / 1000.0))
        .collect::<Result<Vec<f64>>>()?;

    for (record, km) in dataset.records.iter_mut().zip(kilometres) {
        record
            .attributes
            .insert(DISTANCE_KM_COLUMN.to_string(), AttributeValue::Number(km));
    }
    Ok(())
}

/// Flat table with `long`/`lat` columns. Points are built directly in WGS84.
pub fn load_csv(name: &str, path: &Path) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = rdr.headers()?.clone();

    let column = |wanted: &str| {
        headers
            .iter()
            .position(|h| h == wanted)
            .ok_or_else(|| RiskMapError::MissingColumn {
                dataset: name.to_string(),
                column: wanted.to_string(),
            })
    };
    let label_idx = column(LABEL_COLUMN)?;
    let lon_idx = column(LONGITUDE_COLUMN)?;
    let lat_idx = column(LATITUDE_COLUMN)?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let label = row.get(label_idx).unwrap_or("").to_string();

        let coordinate = |idx: usize, column: &str| {
            let raw = row.get(idx).unwrap_or("");
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| RiskMapError::MalformedValue {
                    dataset: name.to_string(),
                    column: column.to_string(),
                    label: label.clone(),
                    value: raw.to_string(),
                })
        };
        let position = Point::new(
            coordinate(lon_idx, LONGITUDE_COLUMN)?,
            coordinate(lat_idx, LATITUDE_COLUMN)?,
        );

        let attributes = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.to_string(), AttributeValue::from_text(v)))
            .collect();

        records.push(Record {
            label,
            position,
            attributes,
        });
    }

    Ok(Dataset {
        name: name.to_string(),
        crs: Crs::Wgs84,
        records,
    })
}

pub fn load_geojson(name: &str, path: &Path, crs_override: Option<&str>) -> Result<Dataset> {
    let file = File::open(path)?;
    let geojson = GeoJson::from_reader(BufReader::new(file))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(RiskMapError::UnsupportedFormat(format!(
                "{:?} must be a GeoJSON FeatureCollection",
                path
            )))
        }
    };

    // Legacy `crs` member; RFC 7946 sources without one are WGS84.
    let declared = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str())
        .map(Crs::parse);
    let crs = crs_override.map(Crs::parse).or(declared).unwrap_or(Crs::Wgs84);

    let mut records = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let attributes: HashMap<String, AttributeValue> = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, json_attribute(value)))
            .collect();

        let label = label_from(name, &attributes)?;
        let geometry = feature.geometry.ok_or_else(|| RiskMapError::InvalidGeometry {
            dataset: name.to_string(),
            reason: format!("feature {index} ('{label}') has no geometry"),
        })?;
        let position = match geometry.value {
            geojson::Value::Point(coords) if coords.len() >= 2 => Point::new(coords[0], coords[1]),
            value => {
                let geometry: geo::Geometry<f64> =
                    value.try_into().map_err(|e| RiskMapError::InvalidGeometry {
                        dataset: name.to_string(),
                        reason: format!("feature {index} ('{label}'): {e}"),
                    })?;
                representative_point(name, &label, &geometry)?
            }
        };

        records.push(Record {
            label,
            position,
            attributes,
        });
    }

    Ok(Dataset {
        name: name.to_string(),
        crs,
        records,
    })
}

pub fn load_shapefile(name: &str, path: &Path, crs_override: Option<&str>) -> Result<Dataset> {
    let crs = match crs_override {
        Some(code) => Crs::parse(code),
        None => {
            let prj = path.with_extension("prj");
            match fs::read_to_string(&prj) {
                Ok(wkt) => Crs::from_wkt(&wkt),
                Err(_) => {
                    debug!("No .prj next to {:?}, assuming {}", path, Crs::Wgs84);
                    Crs::Wgs84
                }
            }
        }
    };

    let mut reader = shapefile::Reader::from_path(path)?;
    let mut records = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let fields: HashMap<String, shapefile::dbase::FieldValue> = record.into();
        let attributes: HashMap<String, AttributeValue> = fields
            .into_iter()
            .map(|(key, value)| (key, dbase_attribute(value)))
            .collect();
        let label = label_from(name, &attributes)?;

        let position = match shape {
            shapefile::Shape::Point(p) => Point::new(p.x, p.y),
            shapefile::Shape::PointM(p) => Point::new(p.x, p.y),
            shapefile::Shape::PointZ(p) => Point::new(p.x, p.y),
            shapefile::Shape::NullShape => {
                return Err(RiskMapError::InvalidGeometry {
                    dataset: name.to_string(),
                    reason: format!("'{label}' has a null shape"),
                })
            }
            other => {
                let geometry: geo::Geometry<f64> =
                    other.try_into().map_err(|e| RiskMapError::InvalidGeometry {
                        dataset: name.to_string(),
                        reason: format!("'{label}': {:?}", e),
                    })?;
                representative_point(name, &label, &geometry)?
            }
        };

        records.push(Record {
            label,
            position,
            attributes,
        });
    }

    Ok(Dataset {
        name: name.to_string(),
        crs,
        records,
    })
}

// Markers sit on the centroid of non-point geometries.
fn representative_point(name: &str, label: &str, geometry: &geo::Geometry<f64>) -> Result<Point<f64>> {
    geometry.centroid().ok_or_else(|| RiskMapError::InvalidGeometry {
        dataset: name.to_string(),
        reason: format!("'{label}' has an empty geometry"),
    })
}

fn label_from(name: &str, attributes: &HashMap<String, AttributeValue>) -> Result<String> {
    attributes
        .get(LABEL_COLUMN)
        .map(|value| value.to_string())
        .ok_or_else(|| RiskMapError::MissingColumn {
            dataset: name.to_string(),
            column: LABEL_COLUMN.to_string(),
        })
}

fn json_attribute(value: serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Null,
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(AttributeValue::Number)
            .unwrap_or_else(|| AttributeValue::Text(n.to_string())),
        serde_json::Value::String(s) => AttributeValue::Text(s),
        other => AttributeValue::Text(other.to_string()),
    }
}

fn dbase_attribute(value: shapefile::dbase::FieldValue) -> AttributeValue {
    use shapefile::dbase::FieldValue;

    match value {
        FieldValue::Character(Some(s)) => AttributeValue::Text(s.trim().to_string()),
        FieldValue::Memo(s) => AttributeValue::Text(s),
        FieldValue::Numeric(Some(n)) => AttributeValue::Number(n),
        FieldValue::Float(Some(n)) => AttributeValue::Number(f64::from(n)),
        FieldValue::Integer(n) => AttributeValue::Number(f64::from(n)),
        FieldValue::Double(n) => AttributeValue::Number(n),
        FieldValue::Currency(n) => AttributeValue::Number(n),
        FieldValue::Logical(Some(b)) => AttributeValue::Text(b.to_string()),
        _ => AttributeValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, file: &str, content: &str) -> PathBuf {
        let path = dir.join(file);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn source(path: PathBuf) -> DatasetConfig {
        DatasetConfig {
            path,
            layer: None,
            crs: None,
            derive_distance_km: false,
        }
    }

    const WATERWAYS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [121.5, -30.75]},
             "properties": {"deposit": "Kambalda", "distance": 1500}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [118.6, -20.3]},
             "properties": {"deposit": "Radio Hill", "distance": 250.0}}
        ]
    }"#;

    #[test]
    fn test_load_csv_builds_wgs84_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "health_data.csv",
            "deposit,long,lat,health\nNova,127.1,-31.6,0.8\nSavannah, 128.2 ,-17.1,0.25\n",
        );

        let dataset = load_csv("health", &path).unwrap();
        assert_eq!(dataset.crs, Crs::Wgs84);
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[1].label, "Savannah");
        assert_eq!(dataset.records[1].position, Point::new(128.2, -17.1));
        assert_eq!(dataset.numbers("health").unwrap(), vec![0.8, 0.25]);
    }

    #[test]
    fn test_load_csv_requires_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.csv", "deposit,lat,health\nNova,-31.6,0.8\n");
        assert!(matches!(
            load_csv("health", &path),
            Err(RiskMapError::MissingColumn { column, .. }) if column == "long"
        ));

        let path = write(dir.path(), "bad2.csv", "deposit,long,lat\nNova,east,-31.6\n");
        assert!(matches!(
            load_csv("health", &path),
            Err(RiskMapError::MalformedValue { column, .. }) if column == "long"
        ));
    }

    #[test]
    fn test_derive_distance_km() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "waterways.geojson", WATERWAYS);
        let mut config = source(path);
        config.derive_distance_km = true;

        let dataset = load_dataset("waterways", &config).unwrap();
        assert_eq!(dataset.numbers(DISTANCE_KM_COLUMN).unwrap(), vec![1.5, 0.25]);
        assert_eq!(dataset.numbers(DISTANCE_COLUMN).unwrap(), vec![1500.0, 250.0]);
    }

    #[test]
    fn test_distance_km_is_not_derived_unless_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "waterways.geojson", WATERWAYS);
        let dataset = load_dataset("waterways", &source(path)).unwrap();
        assert!(matches!(
            dataset.numbers(DISTANCE_KM_COLUMN),
            Err(RiskMapError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_wgs84_geojson_positions_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "waterways.geojson", WATERWAYS);
        let dataset = load_dataset("waterways", &source(path)).unwrap();

        let position = dataset.records[0].position;
        assert_eq!(position.x().to_bits(), 121.5_f64.to_bits());
        assert_eq!(position.y().to_bits(), (-30.75_f64).to_bits());
    }

    #[test]
    fn test_geojson_declared_mercator_is_reprojected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "soil.geojson",
            r#"{
                "type": "FeatureCollection",
                "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
                "features": [
                    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                     "properties": {"deposit": "Null Island", "risk": "High Risk"}}
                ]
            }"#,
        );

        let dataset = load_dataset("soil", &source(path)).unwrap();
        assert_eq!(dataset.crs, Crs::Wgs84);
        assert_eq!(dataset.records[0].position, Point::new(0.0, 0.0));
        assert_eq!(dataset.text(&dataset.records[0], "risk").unwrap(), "High Risk");
    }

    #[test]
    fn test_unsupported_crs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "soil.geojson", WATERWAYS);
        let mut config = source(path);
        config.crs = Some("EPSG:28350".to_string());

        assert!(matches!(
            load_dataset("soil", &config),
            Err(RiskMapError::UnsupportedCrs(code)) if code == "EPSG:28350"
        ));
    }

    #[test]
    fn test_truncated_geojson_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "waterways.geojson",
            r#"{"type": "FeatureCollection", "features": ["#,
        );
        assert!(matches!(
            load_dataset("waterways", &source(path)),
            Err(RiskMapError::Json(_))
        ));
    }

    fn write_deposit_shapefile(path: &Path, points: &[(&str, f64, f64, f64)]) {
        use shapefile::dbase::{FieldValue, Record as DbaseRecord, TableWriterBuilder};

        let table = TableWriterBuilder::new()
            .add_character_field("deposit".try_into().unwrap(), 50)
            .add_numeric_field("distance".try_into().unwrap(), 10, 2);
        let mut writer = shapefile::Writer::from_path(path, table).unwrap();
        for (deposit, x, y, distance) in points {
            let mut record = DbaseRecord::default();
            record.insert(
                "deposit".to_string(),
                FieldValue::Character(Some(deposit.to_string())),
            );
            record.insert("distance".to_string(), FieldValue::Numeric(Some(*distance)));
            writer
                .write_shape_and_record(&shapefile::Point::new(*x, *y), &record)
                .unwrap();
        }
    }

    // Forward spherical Mercator, metres.
    fn mercator(lon: f64, lat: f64) -> (f64, f64) {
        const R: f64 = 6_378_137.0;
        let x = R * lon.to_radians();
        let y = R * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    const WEB_MERCATOR_PRJ: &str = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#;

    #[test]
    fn test_shapefile_without_prj_is_wgs84() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waterways.shp");
        write_deposit_shapefile(
            &path,
            &[("Kambalda", 121.5, -30.75, 1500.0), ("Radio Hill", 118.6, -20.3, 250.0)],
        );

        let mut config = source(path);
        config.derive_distance_km = true;
        let dataset = load_dataset("waterways", &config).unwrap();

        assert_eq!(dataset.crs, Crs::Wgs84);
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.records[0].label, "Kambalda");
        assert_eq!(dataset.records[1].label, "Radio Hill");
        assert_eq!(dataset.records[0].position, Point::new(121.5, -30.75));
        assert_eq!(dataset.numbers(DISTANCE_COLUMN).unwrap(), vec![1500.0, 250.0]);
        assert_eq!(dataset.numbers(DISTANCE_KM_COLUMN).unwrap(), vec![1.5, 0.25]);
    }

    #[test]
    fn test_shapefile_with_mercator_prj_is_reprojected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waterways.shp");
        let (x, y) = mercator(121.5, -30.75);
        write_deposit_shapefile(&path, &[("Kambalda", x, y, 1500.0)]);
        write(dir.path(), "waterways.prj", WEB_MERCATOR_PRJ);

        let dataset = load_dataset("waterways", &source(path)).unwrap();
        assert_eq!(dataset.crs, Crs::Wgs84);

        let position = dataset.records[0].position;
        assert!((position.x() - 121.5).abs() < 1e-9, "lon {}", position.x());
        assert!((position.y() + 30.75).abs() < 1e-9, "lat {}", position.y());
        assert_eq!(dataset.records[0].label, "Kambalda");
        assert_eq!(dataset.numbers(DISTANCE_COLUMN).unwrap(), vec![1500.0]);
    }

    #[test]
    fn test_shapefile_crs_override_beats_prj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waterways.shp");
        let (x, y) = mercator(118.6, -20.3);
        write_deposit_shapefile(&path, &[("Radio Hill", x, y, 250.0)]);
        write(
            dir.path(),
            "waterways.prj",
            r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
        );

        let mut config = source(path);
        config.crs = Some("EPSG:3857".to_string());
        let dataset = load_dataset("waterways", &config).unwrap();

        let position = dataset.records[0].position;
        assert!((position.x() - 118.6).abs() < 1e-9);
        assert!((position.y() + 20.3).abs() < 1e-9);
    }

    #[test]
    fn test_shapefile_with_unsupported_prj_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soil.shp");
        write_deposit_shapefile(&path, &[("Nova", 500_000.0, 6_500_000.0, 0.0)]);
        write(
            dir.path(),
            "soil.prj",
            r#"PROJCS["GDA94 / MGA zone 51",GEOGCS["GDA94",DATUM["Geocentric_Datum_of_Australia_1994",SPHEROID["GRS 1980",6378137,298.257222101]]],PROJECTION["Transverse_Mercator"]]"#,
        );

        assert!(matches!(
            load_dataset("soil", &source(path)),
            Err(RiskMapError::UnsupportedCrs(name)) if name == "GDA94 / MGA zone 51"
        ));
    }

    #[test]
    fn test_polygon_features_use_centroid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "vegetation.geojson",
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature",
                     "geometry": {"type": "Polygon", "coordinates": [[[120.0, -30.0], [122.0, -30.0], [122.0, -28.0], [120.0, -28.0], [120.0, -30.0]]]},
                     "properties": {"deposit": "Mt Keith", "%vegetation": 42.0}}
                ]
            }"#,
        );

        let dataset = load_dataset("vegetation", &source(path)).unwrap();
        let position = dataset.records[0].position;
        assert!((position.x() - 121.0).abs() < 1e-9);
        assert!((position.y() + 29.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_deposit_label_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "biodiversity.geojson",
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [120.0, -30.0]},
                 "properties": {"species_count": 4}}
            ]}"#,
        );
        assert!(matches!(
            load_dataset("biodiversity", &source(path)),
            Err(RiskMapError::MissingColumn { column, .. }) if column == LABEL_COLUMN
        ));
    }

    #[test]
    fn test_directory_source_selects_named_layer() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "waterways.geojson", WATERWAYS);
        write(dir.path(), "health.csv", "deposit,long,lat,health\nNova,127.1,-31.6,0.8\n");

        let mut config = source(dir.path().to_path_buf());
        config.layer = Some("health".to_string());
        let dataset = load_dataset("health", &config).unwrap();
        assert_eq!(dataset.records.len(), 1);

        config.layer = None;
        assert!(matches!(
            load_dataset("health", &config),
            Err(RiskMapError::UnsupportedFormat(_))
        ));

        config.layer = Some("roads".to_string());
        assert!(matches!(load_dataset("health", &config), Err(RiskMapError::Io(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "soil.gpx", "<gpx/>");
        assert!(matches!(
            load_dataset("soil", &source(path)),
            Err(RiskMapError::UnsupportedFormat(ext)) if ext == "gpx"
        ));
    }

    #[test]
    fn test_loader_caches_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "health.csv", "deposit,long,lat,health\nNova,127.1,-31.6,0.8\n");
        let loader = DatasetLoader::new(HashMap::from([("health".to_string(), source(path.clone()))]));

        assert!(!loader.is_cached("health"));
        let first = loader.load("health").unwrap();
        assert!(loader.is_cached("health"));

        // The cached copy survives the source disappearing.
        fs::remove_file(&path).unwrap();
        let second = loader.load("health").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_loader_unknown_dataset() {
        let loader = DatasetLoader::new(HashMap::new());
        assert!(matches!(loader.load("soil"), Err(RiskMapError::UnknownDataset(_))));
    }

    #[test]
    fn test_loader_does_not_cache_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.csv");
        let loader = DatasetLoader::new(HashMap::from([("health".to_string(), source(path.clone()))]));

        assert!(loader.load("health").is_err());
        fs::write(&path, "deposit,long,lat,health\nNova,127.1,-31.6,0.8\n").unwrap();
        assert_eq!(loader.load("health").unwrap().records.len(), 1);
    }
}
