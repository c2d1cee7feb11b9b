//! Coordinate reference systems and harmonization to WGS84.

use crate::error::{Result, RiskMapError};
use crate::types::Dataset;
use geo::Point;
use std::f64::consts::PI;
use std::fmt;
use tracing::{debug, info};

// Spherical radius used by EPSG:3857.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, the reference system every dataset is harmonized to.
    Wgs84,
    /// EPSG:3857 spherical Web Mercator.
    WebMercator,
    Other(String),
}

impl Crs {
    /// Parses an authority code or URN such as `EPSG:4326` or
    /// `urn:ogc:def:crs:EPSG::3857`.
    pub fn parse(code: &str) -> Self {
        let normalized = code.trim().to_ascii_uppercase();
        let tail = normalized
            .rsplit(|c: char| c == ':' || c == '/')
            .next()
            .unwrap_or_default();
        match (normalized.as_str(), tail) {
            (_, "4326") | (_, "CRS84") | ("WGS84", _) => Crs::Wgs84,
            (_, "3857") | (_, "900913") | (_, "3785") | (_, "102100") => Crs::WebMercator,
            _ => Crs::Other(code.trim().to_string()),
        }
    }

    /// Identifies a CRS from a shapefile `.prj` WKT string.
    pub fn from_wkt(wkt: &str) -> Self {
        let upper = wkt.to_ascii_uppercase();
        let is_web_mercator = [
            "MERCATOR_AUXILIARY_SPHERE",
            "PSEUDO_MERCATOR",
            "PSEUDO-MERCATOR",
            "POPULAR_VISUALISATION",
            "WEB_MERCATOR",
        ]
        .iter()
        .any(|marker| upper.contains(marker));

        if upper.trim_start().starts_with("PROJCS") {
            if is_web_mercator {
                return Crs::WebMercator;
            }
        } else if upper.trim_start().starts_with("GEOGCS")
            && ["WGS_1984", "WGS 84", "WGS84"].iter().any(|m| upper.contains(m))
        {
            return Crs::Wgs84;
        }

        Crs::Other(wkt_name(wkt).unwrap_or_else(|| wkt.trim().to_string()))
    }

    pub fn code(&self) -> String {
        match self {
            Crs::Wgs84 => "EPSG:4326".to_string(),
            Crs::WebMercator => "EPSG:3857".to_string(),
            Crs::Other(name) => name.clone(),
        }
    }

    /// Transforms a point from this system into WGS84 longitude/latitude.
    pub fn to_wgs84(&self, point: Point<f64>) -> Result<Point<f64>> {
        match self {
            Crs::Wgs84 => Ok(point),
            Crs::WebMercator => {
                let lon = (point.x() / EARTH_RADIUS_M).to_degrees();
                let lat = (2.0 * (point.y() / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
                Ok(Point::new(lon, lat))
            }
            Crs::Other(name) => Err(RiskMapError::UnsupportedCrs(name.clone())),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

// PROJCS["GDA94 / MGA zone 53",GEOGCS[...]] -> GDA94 / MGA zone 53
fn wkt_name(wkt: &str) -> Option<String> {
    let start = wkt.find("[\"")? + 2;
    let len = wkt[start..].find('"')?;
    Some(wkt[start..start + len].to_string())
}

/// Brings a dataset into WGS84. A dataset already in WGS84 is returned untouched.
pub fn harmonize(mut dataset: Dataset) -> Result<Dataset> {
    if dataset.crs != Crs::Wgs84 {
        info!(
            "Reprojecting dataset '{}' from {} to {}",
            dataset.name,
            dataset.crs,
            Crs::Wgs84
        );
        let source = dataset.crs.clone();
        for record in &mut dataset.records {
            record.position = source.to_wgs84(record.position)?;
        }
        dataset.crs = Crs::Wgs84;
    } else {
        debug!("Dataset '{}' already in {}", dataset.name, Crs::Wgs84);
    }

    for record in &dataset.records {
        let (lon, lat) = (record.position.x(), record.position.y());
        if !(lon.is_finite() && lat.is_finite() && (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)) {
            return Err(RiskMapError::InvalidGeometry {
                dataset: dataset.name.clone(),
                reason: format!("'{}' lies outside WGS84 bounds at ({lon}, {lat})", record.label),
            });
        }
    }

    Ok(dataset)
}
