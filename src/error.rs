use thiserror::Error;

/// Errors raised while loading datasets or composing risk layers.
#[derive(Error, Debug)]
pub enum RiskMapError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to parse GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read shapefile: {0}")]
    Shapefile(String),
    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),
    #[error("no dataset configured under the name '{0}'")]
    UnknownDataset(String),
    #[error("dataset '{dataset}' has no column '{column}'")]
    MissingColumn { dataset: String, column: String },
    #[error("dataset '{dataset}': column '{column}' of '{label}' holds malformed value '{value}'")]
    MalformedValue {
        dataset: String,
        column: String,
        label: String,
        value: String,
    },
    #[error("dataset '{dataset}': invalid geometry ({reason})")]
    InvalidGeometry { dataset: String, reason: String },
    #[error("unsupported coordinate system: {0}")]
    UnsupportedCrs(String),
    #[error("invalid colour: {0}")]
    InvalidColor(String),
    #[error("a gradient needs at least two anchor colours, got {0}")]
    TooFewColors(usize),
    #[error("invalid layer toggle: {0}")]
    InvalidToggle(String),
}

impl From<shapefile::Error> for RiskMapError {
    fn from(err: shapefile::Error) -> Self {
        RiskMapError::Shapefile(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RiskMapError>;
