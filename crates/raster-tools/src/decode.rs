//! Scene decode/resample through an external resampling program.
//!
//! The program is invoked once per scene as
//!
//! ```text
//! <program> --reader <reader> --upper-right-corner NE
//!           --area-epsg 4326 --resolution 0.035 --area-extent -180,-90,180,90
//!           --base-dir <out_dir> --composites a,b <native_file>
//! ```
//!
//! and must write `<out_dir>/<composite>.tif` for every composite.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::command::run_tool;
use crate::error::{RasterError, RasterResult};
use crate::SceneDecoder;

/// Fixed global grid the scene is reprojected onto.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGrid {
    pub epsg: u32,
    /// Pixel size in degrees
    pub resolution: f64,
    /// min_x, min_y, max_x, max_y
    pub area_extent: [f64; 4],
    /// Name of the sensor-file reader, e.g. `seviri_l1b_native`
    pub reader: String,
    /// Orientation of the output image, `NE` puts north-east in the upper right
    pub upper_right_corner: String,
}

impl TargetGrid {
    /// Global EPSG:4326 grid at 0.035° for SEVIRI level 1.5 native files.
    pub fn seviri_world() -> Self {
        Self {
            epsg: 4326,
            resolution: 0.035,
            area_extent: [-180.0, -90.0, 180.0, 90.0],
            reader: "seviri_l1b_native".to_string(),
            upper_right_corner: "NE".to_string(),
        }
    }
}

/// [`SceneDecoder`] backed by an external resampling program.
#[derive(Debug, Clone)]
pub struct ResampleCommand {
    program: PathBuf,
    grid: TargetGrid,
}

impl ResampleCommand {
    pub fn new(program: impl Into<PathBuf>, grid: TargetGrid) -> Self {
        Self {
            program: program.into(),
            grid,
        }
    }

    fn args(&self, native_file: &Path, composites: &[String], out_dir: &Path) -> Vec<OsString> {
        let extent = self
            .grid
            .area_extent
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");

        vec![
            "--reader".into(),
            self.grid.reader.clone().into(),
            "--upper-right-corner".into(),
            self.grid.upper_right_corner.clone().into(),
            "--area-epsg".into(),
            self.grid.epsg.to_string().into(),
            "--resolution".into(),
            self.grid.resolution.to_string().into(),
            "--area-extent".into(),
            extent.into(),
            "--base-dir".into(),
            out_dir.as_os_str().to_owned(),
            "--composites".into(),
            composites.join(",").into(),
            native_file.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl SceneDecoder for ResampleCommand {
    #[instrument(skip(self, composites), fields(program = %self.program.display()))]
    async fn decode(
        &self,
        native_file: &Path,
        composites: &[String],
        out_dir: &Path,
    ) -> RasterResult<HashMap<String, PathBuf>> {
        info!(composites = ?composites, "Resampling scene");
        run_tool(&self.program, &self.args(native_file, composites, out_dir)).await?;
        collect_outputs(composites, out_dir)
    }
}

/// Check every `{out_dir}/{composite}.tif` exists and map them by name.
pub fn collect_outputs(
    composites: &[String],
    out_dir: &Path,
) -> RasterResult<HashMap<String, PathBuf>> {
    composites
        .iter()
        .map(|name| {
            let path = out_dir.join(format!("{}.tif", name));
            if path.is_file() {
                Ok((name.clone(), path))
            } else {
                Err(RasterError::MissingOutput(path))
            }
        })
        .collect()
}
