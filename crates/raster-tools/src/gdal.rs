//! Clipping and band export through `gdal_translate`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::command::run_tool;
use crate::error::{RasterError, RasterResult};
use crate::extent::Extent;
use crate::{BandExporter, ExtentClipper};

/// Crops to an extent with `gdal_translate -projwin`, writing GeoTIFF.
#[derive(Debug, Clone)]
pub struct GdalClipper {
    program: PathBuf,
}

impl GdalClipper {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn clip_args(extent: &Extent, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-of".into(), "GTiff".into(), "-projwin".into()];
    args.extend(extent.projwin().iter().map(|v| OsString::from(v.to_string())));
    args.push(input.as_os_str().to_owned());
    args.push(output.as_os_str().to_owned());
    args
}

#[async_trait]
impl ExtentClipper for GdalClipper {
    async fn clip(&self, extent: &Extent, input: &Path, output: &Path) -> RasterResult<()> {
        extent.validate()?;
        debug!(input = %input.display(), output = %output.display(), "Clipping raster");
        run_tool(&self.program, &clip_args(extent, input, output)).await?;
        ensure_written(output)
    }
}

/// Writes one band with `gdal_translate -b <band>`.
#[derive(Debug, Clone)]
pub struct GdalBandExporter {
    program: PathBuf,
}

impl GdalBandExporter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn band_args(input: &Path, band: u32, output: &Path) -> Vec<OsString> {
    vec![
        "-b".into(),
        band.to_string().into(),
        input.as_os_str().to_owned(),
        output.as_os_str().to_owned(),
    ]
}

#[async_trait]
impl BandExporter for GdalBandExporter {
    async fn export_band(&self, input: &Path, band: u32, output: &Path) -> RasterResult<()> {
        debug!(input = %input.display(), band, output = %output.display(), "Exporting band");
        run_tool(&self.program, &band_args(input, band, output)).await?;
        ensure_written(output)
    }
}

fn ensure_written(output: &Path) -> RasterResult<()> {
    if output.is_file() {
        Ok(())
    } else {
        Err(RasterError::MissingOutput(output.to_path_buf()))
    }
}
