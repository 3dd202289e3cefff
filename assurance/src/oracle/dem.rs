use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;
use tokio::sync::OnceCell;

use super::{ElevationOracle, OracleError};

#[derive(Debug, Error)]
pub enum DemLoadError {
    #[error("failed to open DEM file {path:?}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to read DEM data: {0}")]
    Read(#[source] std::io::Error),
    #[error("DEM file missing header field `{0}`")]
    MissingHeader(&'static str),
    #[error("DEM file has invalid numeric header for `{field}`: {source}")]
    InvalidHeader {
        field: &'static str,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("DEM file has invalid integer header for `{field}`: {source}")]
    InvalidHeaderInt {
        field: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("DEM cell {index} is not a number: {source}")]
    InvalidCell {
        index: usize,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("DEM grid must have at least one row and column")]
    EmptyGrid,
    #[error("DEM grid has {expected} cells but file provided {actual}")]
    UnexpectedCellCount { expected: usize, actual: usize },
}

/// ESRI ArcInfo ASCII grid in geographic coordinates (degrees).
#[derive(Debug)]
pub struct ArcAsciiDem {
    ncols: usize,
    nrows: usize,
    xllcorner: f64,
    yllcorner: f64,
    cellsize: f64,
    nodata: f64,
    lat_max: f64,
    lon_max: f64,
    values: Vec<f64>,
}

const HEADER_LINES: usize = 6;

impl ArcAsciiDem {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DemLoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DemLoadError::Io {
            source,
            path: path.into(),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(mut reader: impl BufRead) -> Result<Self, DemLoadError> {
        let mut header_buf = String::new();

        let mut ncols: Option<usize> = None;
        let mut nrows: Option<usize> = None;
        let mut xllcorner = None;
        let mut yllcorner = None;
        let mut cellsize = None;
        let mut nodata = None;

        for _ in 0..HEADER_LINES {
            header_buf.clear();
            if reader.read_line(&mut header_buf).map_err(DemLoadError::Read)? == 0 {
                break;
            }
            let mut parts = header_buf.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };

            match key.to_lowercase().as_str() {
                "ncols" => ncols = Some(parse_int("ncols", value)?),
                "nrows" => nrows = Some(parse_int("nrows", value)?),
                "xllcorner" | "xllcenter" => xllcorner = Some(parse_float("xllcorner", value)?),
                "yllcorner" | "yllcenter" => yllcorner = Some(parse_float("yllcorner", value)?),
                "cellsize" => cellsize = Some(parse_float("cellsize", value)?),
                "nodata_value" => nodata = Some(parse_float("nodata_value", value)?),
                _ => {}
            }
        }

        let ncols = ncols.ok_or(DemLoadError::MissingHeader("ncols"))?;
        let nrows = nrows.ok_or(DemLoadError::MissingHeader("nrows"))?;
        let xllcorner = xllcorner.ok_or(DemLoadError::MissingHeader("xllcorner"))?;
        let yllcorner = yllcorner.ok_or(DemLoadError::MissingHeader("yllcorner"))?;
        let cellsize = cellsize.ok_or(DemLoadError::MissingHeader("cellsize"))?;
        let nodata = nodata.unwrap_or(-9999.0);
        if ncols == 0 || nrows == 0 {
            return Err(DemLoadError::EmptyGrid);
        }

        let lat_max = yllcorner + cellsize * ((nrows - 1) as f64);
        let lon_max = xllcorner + cellsize * ((ncols - 1) as f64);

        let mut values = Vec::with_capacity(ncols * nrows);
        for line in reader.lines() {
            let line = line.map_err(DemLoadError::Read)?;
            for token in line.split_whitespace() {
                let value = token
                    .parse::<f64>()
                    .map_err(|source| DemLoadError::InvalidCell {
                        index: values.len(),
                        source,
                    })?;
                values.push(value);
            }
        }

        let expected = ncols * nrows;
        if values.len() != expected {
            return Err(DemLoadError::UnexpectedCellCount {
                expected,
                actual: values.len(),
            });
        }

        Ok(Self {
            ncols,
            nrows,
            xllcorner,
            yllcorner,
            cellsize,
            nodata,
            lat_max,
            lon_max,
            values,
        })
    }

    /// Bilinear sample; nodata corners are dropped and the rest averaged.
    pub fn sample(&self, lat: f64, lon: f64) -> Option<f64> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if lon < self.xllcorner || lon > self.lon_max || lat < self.yllcorner || lat > self.lat_max
        {
            return None;
        }
        let col = ((lon - self.xllcorner) / self.cellsize).clamp(0.0, (self.ncols - 1) as f64);
        let row = ((self.lat_max - lat) / self.cellsize).clamp(0.0, (self.nrows - 1) as f64);

        let x0 = col.floor() as usize;
        let y0 = row.floor() as usize;
        let x1 = (x0 + 1).min(self.ncols - 1);
        let y1 = (y0 + 1).min(self.nrows - 1);

        let q11 = self.value(y0, x0);
        let q21 = self.value(y0, x1);
        let q12 = self.value(y1, x0);
        let q22 = self.value(y1, x1);

        let tx = col - x0 as f64;
        let ty = row - y0 as f64;

        match (q11, q21, q12, q22) {
            (Some(a), Some(b), Some(c), Some(d)) => {
                let top = a * (1.0 - tx) + b * tx;
                let bottom = c * (1.0 - tx) + d * tx;
                Some(top * (1.0 - ty) + bottom * ty)
            }
            _ => {
                let valid: Vec<f64> = [q11, q21, q12, q22].into_iter().flatten().collect();
                (!valid.is_empty()).then(|| valid.iter().sum::<f64>() / valid.len() as f64)
            }
        }
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        let value = self.values.get(row * self.ncols + col).copied()?;
        if (value - self.nodata).abs() < f64::EPSILON {
            None
        } else {
            Some(value)
        }
    }
}

fn parse_int(field: &'static str, value: &str) -> Result<usize, DemLoadError> {
    value
        .parse()
        .map_err(|source| DemLoadError::InvalidHeaderInt { field, source })
}

fn parse_float(field: &'static str, value: &str) -> Result<f64, DemLoadError> {
    value
        .parse()
        .map_err(|source| DemLoadError::InvalidHeader { field, source })
}

/// Elevation oracle over a local DEM. The grid is loaded on a blocking
/// thread the first time readiness is awaited.
#[derive(Debug)]
pub struct DemOracle {
    path: Option<PathBuf>,
    grid: OnceCell<Arc<ArcAsciiDem>>,
}

impl DemOracle {
    pub fn from_grid(grid: ArcAsciiDem) -> Self {
        Self {
            path: None,
            grid: OnceCell::new_with(Some(Arc::new(grid))),
        }
    }

    pub fn lazy(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            grid: OnceCell::new(),
        }
    }

    async fn load(&self) -> Result<Arc<ArcAsciiDem>, OracleError> {
        let path = self.path.clone().ok_or(OracleError::NotReady)?;
        let grid = tokio::task::spawn_blocking(move || {
            let grid = ArcAsciiDem::from_path(&path)?;
            tracing::info!("loaded DEM grid from {}", path.display());
            Ok::<_, DemLoadError>(grid)
        })
        .await??;
        Ok(Arc::new(grid))
    }
}

impl ElevationOracle for DemOracle {
    fn is_ready(&self) -> bool {
        self.grid.initialized()
    }

    async fn wait_until_ready(&self) -> Result<(), OracleError> {
        self.grid.get_or_try_init(|| self.load()).await?;
        Ok(())
    }

    async fn query_elevation(&self, lon: f64, lat: f64) -> Result<Option<f64>, OracleError> {
        let grid = self.grid.get().ok_or(OracleError::NotReady)?;
        Ok(grid.sample(lat, lon))
    }
}
