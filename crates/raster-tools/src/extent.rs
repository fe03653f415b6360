//! Geographic extent used for clipping.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};

/// Rectangular lon/lat box in degrees (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    /// Create an extent, rejecting boxes that are empty or leave lon/lat range.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> RasterResult<Self> {
        let extent = Self {
            west,
            south,
            east,
            north,
        };
        extent.validate()?;
        Ok(extent)
    }

    pub fn validate(&self) -> RasterResult<()> {
        let values = [self.west, self.south, self.east, self.north];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RasterError::InvalidExtent(format!(
                "non-finite coordinate in {:?}",
                self
            )));
        }
        if self.west >= self.east || self.south >= self.north {
            return Err(RasterError::InvalidExtent(format!(
                "west/south must be below east/north: {:?}",
                self
            )));
        }
        if self.west < -180.0 || self.east > 180.0 || self.south < -90.0 || self.north > 90.0 {
            return Err(RasterError::InvalidExtent(format!(
                "outside lon/lat range: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Corner order expected by `gdal_translate -projwin`: ulx uly lrx lry.
    pub fn projwin(&self) -> [f64; 4] {
        [self.west, self.north, self.east, self.south]
    }
}
