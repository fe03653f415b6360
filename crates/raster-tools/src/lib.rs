//! External raster processing used by the ingestion pipeline.
//!
//! Each stage is a trait so the pipeline can be driven against fakes:
//! - [`SceneDecoder`]: native sensor file to one geo-referenced raster per composite
//! - [`ExtentClipper`]: crop a raster to a geographic [`Extent`]
//! - [`BandExporter`]: write a single band of a raster to its own file
//!
//! The provided implementations shell out to command-line tools and treat a
//! non-zero exit status as failure.

pub mod command;
pub mod decode;
pub mod error;
pub mod extent;
pub mod gdal;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

pub use decode::{ResampleCommand, TargetGrid};
pub use error::{RasterError, RasterResult};
pub use extent::Extent;
pub use gdal::{GdalBandExporter, GdalClipper};

/// Decodes a native sensor file into per-composite rasters.
#[async_trait]
pub trait SceneDecoder: Send + Sync {
    /// Materialize `{out_dir}/{composite}.tif` for every requested composite.
    ///
    /// Returns the raster path keyed by composite name.
    async fn decode(
        &self,
        native_file: &Path,
        composites: &[String],
        out_dir: &Path,
    ) -> RasterResult<HashMap<String, PathBuf>>;
}

/// Crops a raster to a rectangular extent.
#[async_trait]
pub trait ExtentClipper: Send + Sync {
    async fn clip(&self, extent: &Extent, input: &Path, output: &Path) -> RasterResult<()>;
}

/// Extracts one band of a raster into a single-band file.
#[async_trait]
pub trait BandExporter: Send + Sync {
    async fn export_band(&self, input: &Path, band: u32, output: &Path) -> RasterResult<()>;
}

/// The three collaborators the pipeline needs, bundled.
#[derive(Clone)]
pub struct Toolchain {
    pub decoder: Arc<dyn SceneDecoder>,
    pub clipper: Arc<dyn ExtentClipper>,
    pub exporter: Arc<dyn BandExporter>,
}

impl Toolchain {
    pub fn new(
        decoder: Arc<dyn SceneDecoder>,
        clipper: Arc<dyn ExtentClipper>,
        exporter: Arc<dyn BandExporter>,
    ) -> Self {
        Self {
            decoder,
            clipper,
            exporter,
        }
    }

    /// Command-line backed toolchain: a resample program for decoding and
    /// `gdal_translate` for clipping and band export.
    pub fn from_commands(
        resample_program: impl Into<PathBuf>,
        grid: TargetGrid,
        gdal_translate: impl Into<PathBuf>,
    ) -> Self {
        let gdal_translate = gdal_translate.into();
        Self {
            decoder: Arc::new(ResampleCommand::new(resample_program, grid)),
            clipper: Arc::new(GdalClipper::new(gdal_translate.clone())),
            exporter: Arc::new(GdalBandExporter::new(gdal_translate)),
        }
    }
}
