use crate::crs::Crs;
use crate::error::{Result, RiskMapError};
use crate::layers::LayerId;
use geo::Point;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const RED: Color = Color::rgb(0xFF, 0x00, 0x00);
    pub const ORANGE: Color = Color::rgb(0xFF, 0xA5, 0x00);
    pub const GREEN: Color = Color::rgb(0x00, 0x80, 0x00);
    pub const BLUE: Color = Color::rgb(0x00, 0x00, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// Parses `#RRGGBB` (the `#` is optional) or one of the CSS names used by the layer table.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "white" => return Ok(Color::WHITE),
            "red" => return Ok(Color::RED),
            "orange" => return Ok(Color::ORANGE),
            "green" => return Ok(Color::GREEN),
            "blue" => return Ok(Color::BLUE),
            _ => {}
        }

        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(RiskMapError::InvalidColor(value.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| RiskMapError::InvalidColor(value.to_string()))
        };
        Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A single attribute cell of a dataset record.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Null,
}

impl AttributeValue {
    /// Interprets a raw text cell, preferring a number when it parses as one.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return AttributeValue::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => AttributeValue::Number(n),
            Err(_) => AttributeValue::Text(trimmed.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(n) => write!(f, "{n}"),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Null => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Deposit name.
    pub label: String,
    /// (longitude, latitude) in the dataset's coordinate system.
    pub position: Point<f64>,
    pub attributes: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub crs: Crs,
    pub records: Vec<Record>,
}

impl Dataset {
    fn cell<'a>(&self, record: &'a Record, column: &str) -> Result<&'a AttributeValue> {
        record
            .attributes
            .get(column)
            .ok_or_else(|| RiskMapError::MissingColumn {
                dataset: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Reads a finite numeric cell; anything else is a malformed value.
    pub fn number(&self, record: &Record, column: &str) -> Result<f64> {
        match self.cell(record, column)? {
            AttributeValue::Number(n) if n.is_finite() => Ok(*n),
            other => Err(RiskMapError::MalformedValue {
                dataset: self.name.clone(),
                column: column.to_string(),
                label: record.label.clone(),
                value: other.to_string(),
            }),
        }
    }

    /// Reads a cell as display text. Null cells read as the empty string.
    pub fn text(&self, record: &Record, column: &str) -> Result<String> {
        Ok(self.cell(record, column)?.to_string())
    }

    /// Collects `column` over every record, failing on the first bad cell.
    pub fn numbers(&self, column: &str) -> Result<Vec<f64>> {
        self.records
            .iter()
            .map(|record| self.number(record, column))
            .collect()
    }
}

/// Smallest and largest of `values`, or `None` when empty.
pub fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |range, &v| match range {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// The per-record view the composer encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRecord {
    pub label: String,
    pub position: Point<f64>,
    pub metric: &'static str,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub label: String,
    pub metric: String,
    pub value: String,
    /// Preferred popup width in pixels.
    pub width: u32,
}

impl Popup {
    pub fn html(&self) -> String {
        format!(
            "<b>{}</b><br><b>{}:</b> {}",
            escape_html(&self.label),
            escape_html(&self.metric),
            escape_html(&self.value)
        )
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One renderable marker. Built once per render pass and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub layer: LayerId,
    #[serde(serialize_with = "serialize_position")]
    pub position: Point<f64>,
    pub color: Color,
    pub radius: f64,
    pub popup: Popup,
}

impl Feature {
    pub fn new(layer: LayerId, record: RiskRecord, color: Color, radius: f64) -> Self {
        Feature {
            layer,
            position: record.position,
            color,
            radius,
            popup: Popup {
                label: record.label,
                metric: record.metric.to_string(),
                value: record.display,
                width: layer.popup_width(),
            },
        }
    }
}

fn serialize_position<S: Serializer>(
    position: &Point<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    [position.x(), position.y()].serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_named_colors() {
        assert_eq!(Color::parse("#228B22").unwrap(), Color::rgb(0x22, 0x8B, 0x22));
        assert_eq!(Color::parse("7900ff").unwrap(), Color::rgb(0x79, 0x00, 0xFF));
        assert_eq!(Color::parse("orange").unwrap(), Color::ORANGE);
        assert!(Color::parse("#12345").is_err());
        assert!(Color::parse("#zz0000").is_err());
        assert_eq!(Color::rgb(0xA0, 0x52, 0x2D).to_hex(), "#a0522d");
    }

    #[test]
    fn test_attribute_from_text() {
        assert_eq!(AttributeValue::from_text(" 0.25 "), AttributeValue::Number(0.25));
        assert_eq!(
            AttributeValue::from_text("High Risk"),
            AttributeValue::Text("High Risk".to_string())
        );
        assert_eq!(AttributeValue::from_text(""), AttributeValue::Null);
    }

    #[test]
    fn test_number_reports_missing_and_malformed_cells() {
        let record = Record {
            label: "Nova".to_string(),
            position: Point::new(130.0, -20.0),
            attributes: HashMap::from([(
                "health".to_string(),
                AttributeValue::Text("n/a".to_string()),
            )]),
        };
        let dataset = Dataset {
            name: "health".to_string(),
            crs: Crs::Wgs84,
            records: vec![record.clone()],
        };

        assert!(matches!(
            dataset.number(&record, "socioeconomic"),
            Err(RiskMapError::MissingColumn { .. })
        ));
        assert!(matches!(
            dataset.number(&record, "health"),
            Err(RiskMapError::MalformedValue { .. })
        ));
        assert_eq!(dataset.text(&record, "health").unwrap(), "n/a");
    }

    #[test]
    fn test_value_range() {
        assert_eq!(value_range(&[]), None);
        assert_eq!(value_range(&[3.0, -1.0, 7.5]), Some((-1.0, 7.5)));
    }

    #[test]
    fn test_popup_html_escapes_label() {
        let popup = Popup {
            label: "Smith & Sons <East>".to_string(),
            metric: "Health Score".to_string(),
            value: "0.4".to_string(),
            width: 250,
        };
        assert_eq!(
            popup.html(),
            "<b>Smith &amp; Sons &lt;East&gt;</b><br><b>Health Score:</b> 0.4"
        );
    }
}
