use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid waypoints header: expected `{expected}`, found `{found}`")]
    InvalidHeader {
        expected: &'static str,
        found: String,
    },
    #[error("line {line}: invalid {field} `{value}`")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("invalid coordinate `{0}`")]
    InvalidCoordinate(String),
    #[error("GeoJSON contains no features")]
    NoFeatures,
    #[error("no LineString geometry found")]
    NoLineString,
    #[error("no valid coordinates found")]
    NoCoordinates,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid XML in {document}: {source}")]
    Xml {
        document: &'static str,
        #[source]
        source: xmltree::ParseError,
    },
    #[error("failed to open archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to read archive entry `{name}`: {source}")]
    ArchiveEntry {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("file is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("unsupported file extension `{0}`")]
    UnsupportedExtension(String),
}

impl ParseError {
    /// Archive was readable but does not look like a DJI mission.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, ParseError::UnsupportedFormat(_))
    }
}

#[derive(Debug, Error)]
pub enum TerrainAnalysisError {
    #[error("invalid flight plan data: {0}")]
    InvalidFlightPlan(String),
    #[error("no valid LineString geometry")]
    NoLineString,
    #[error("elevation source not ready: {0}")]
    OracleNotReady(#[from] crate::oracle::OracleError),
    #[error("terrain analysis cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("flight plan has no route to export")]
    EmptyRoute,
}
