//! Deterministic file naming for intermediate and exported rasters.
//!
//! The same scene time always maps to the same names, so a retried run
//! overwrites what an earlier failed attempt left behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Timestamp used in file names: UTC, seconds and millis zeroed, literal `Z`.
pub fn file_timestamp(target: DateTime<Utc>) -> String {
    target.format("%Y-%m-%dT%H:%M:00.000Z").to_string()
}

/// `{work}/{composite}.tif`, as written by the decoder.
pub fn decoded_raster(work_dir: &Path, composite: &str) -> PathBuf {
    work_dir.join(format!("{}.tif", composite))
}

/// `{work}/{composite}/{composite}_{timestamp}.tif`
pub fn clipped_raster(work_dir: &Path, composite: &str, target: DateTime<Utc>) -> PathBuf {
    work_dir
        .join(composite)
        .join(format!("{}_{}.tif", composite, file_timestamp(target)))
}

/// `{output}/{composite}`
pub fn composite_output_dir(output_dir: &Path, composite: &str) -> PathBuf {
    output_dir.join(composite)
}

/// `{output}/{composite}/band{N}_{composite}_{timestamp}.tif`
pub fn band_output(
    output_dir: &Path,
    composite: &str,
    band: u32,
    target: DateTime<Utc>,
) -> PathBuf {
    composite_output_dir(output_dir, composite).join(format!(
        "band{}_{}_{}.tif",
        band,
        composite,
        file_timestamp(target)
    ))
}
