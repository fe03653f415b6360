//! Download → extract → decode → clip → export → commit for one scene.
//!
//! Each run gets its own temporary working area which is removed on every exit
//! path. The cursor state is written only after every band of every composite
//! has been exported, so a failed run leaves the state untouched and the next
//! cycle retries the same scene from scratch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use eumdac_client::Catalog;
use raster_tools::Toolchain;

use crate::dataset::{CompositeDefinition, Dataset};
use crate::error::{IngestError, IngestResult};
use crate::layout;
use crate::state::StateStore;

/// Runs the full processing chain for one product.
pub struct PipelineRunner {
    catalog: Arc<dyn Catalog>,
    toolchain: Toolchain,
    store: Arc<StateStore>,
    output_dir: PathBuf,
    /// Parent of per-run working areas; system temp dir when unset
    temp_root: Option<PathBuf>,
}

impl PipelineRunner {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        toolchain: Toolchain,
        store: Arc<StateStore>,
        output_dir: PathBuf,
        temp_root: Option<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            toolchain,
            store,
            output_dir,
            temp_root,
        }
    }

    /// Process `product_id` as the scene for `target` and advance the cursor.
    #[instrument(skip(self, dataset), fields(collection = %dataset.collection))]
    pub async fn run(
        &self,
        dataset: &Dataset,
        product_id: &str,
        target: DateTime<Utc>,
    ) -> IngestResult<()> {
        let workdir = self.create_workdir()?;
        let work = workdir.path();
        info!(workdir = %work.display(), "Starting pipeline run");

        let archive = self.download(&dataset.collection, product_id, work).await?;
        let native = extract_archive(archive, work.to_path_buf(), product_id.to_string()).await?;

        let names = dataset.composite_names();
        info!(native = %native.display(), composites = ?names, "Decoding scene");
        let rasters = self.toolchain.decoder.decode(&native, &names, work).await?;

        for composite in &dataset.composites {
            self.export_composite(dataset, composite, &rasters, work, target)
                .await?;
        }

        self.store.commit(target)?;

        if let Err(e) = workdir.close() {
            warn!(error = %e, "Failed to remove working area");
        }
        info!("Pipeline run complete");
        Ok(())
    }

    fn create_workdir(&self) -> IngestResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("meteosat-");
        match &self.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| IngestError::io(root, e))?;
                builder.tempdir_in(root).map_err(|e| IngestError::io(root, e))
            }
            None => builder
                .tempdir()
                .map_err(|e| IngestError::io(std::env::temp_dir(), e)),
        }
    }

    /// Stream the product archive into `work`, returning its path.
    async fn download(
        &self,
        collection: &str,
        product_id: &str,
        work: &Path,
    ) -> IngestResult<PathBuf> {
        let mut download = self.catalog.open(collection, product_id).await?;
        let path = work.join(&download.filename);
        info!(
            file = %download.filename,
            content_length = ?download.content_length,
            "Downloading product"
        );

        let mut file = File::create(&path)
            .await
            .map_err(|e| IngestError::io(&path, e))?;
        let mut written = 0u64;

        while let Some(chunk) = download.stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| IngestError::io(&path, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| IngestError::io(&path, e))?;
        file.sync_all().await.map_err(|e| IngestError::io(&path, e))?;

        if let Some(expected) = download.content_length {
            if expected != written {
                return Err(IngestError::Download(format!(
                    "size mismatch: expected {} bytes, got {}",
                    expected, written
                )));
            }
        }

        info!(bytes = written, "Download complete");
        Ok(path)
    }

    #[instrument(skip(self, dataset, composite, rasters, work), fields(composite = %composite.name))]
    async fn export_composite(
        &self,
        dataset: &Dataset,
        composite: &CompositeDefinition,
        rasters: &HashMap<String, PathBuf>,
        work: &Path,
        target: DateTime<Utc>,
    ) -> IngestResult<()> {
        let input = rasters
            .get(&composite.name)
            .cloned()
            .unwrap_or_else(|| layout::decoded_raster(work, &composite.name));

        let clipped = layout::clipped_raster(work, &composite.name, target);
        if let Some(parent) = clipped.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::io(parent, e))?;
        }
        self.toolchain
            .clipper
            .clip(&dataset.extent, &input, &clipped)
            .await?;
        debug!(clipped = %clipped.display(), "Clipped to extent");

        let out_dir = layout::composite_output_dir(&self.output_dir, &composite.name);
        fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| IngestError::io(&out_dir, e))?;

        for &band in &composite.export_bands {
            let output = layout::band_output(&self.output_dir, &composite.name, band, target);
            remove_stale(&output).await?;
            self.toolchain
                .exporter
                .export_band(&clipped, band, &output)
                .await?;
            info!(band, output = %output.display(), "Exported band");
        }

        Ok(())
    }
}

/// Remove an output left by an earlier failed attempt.
async fn remove_stale(path: &Path) -> IngestResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Replacing existing output");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IngestError::io(path, e)),
    }
}

/// Unpack `archive` into `work`, delete it, and return the native sensor file.
async fn extract_archive(archive: PathBuf, work: PathBuf, product_id: String) -> IngestResult<PathBuf> {
    tokio::task::spawn_blocking(move || extract_blocking(&archive, &work, &product_id))
        .await
        .map_err(|e| IngestError::Archive(format!("extraction task failed: {}", e)))?
}

fn extract_blocking(archive: &Path, work: &Path, product_id: &str) -> IngestResult<PathBuf> {
    let file = std::fs::File::open(archive).map_err(|e| IngestError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| IngestError::Archive(format!("{}: {}", archive.display(), e)))?;
    zip.extract(work)
        .map_err(|e| IngestError::Archive(format!("{}: {}", archive.display(), e)))?;
    debug!(entries = zip.len(), "Extracted archive");
    drop(zip);

    std::fs::remove_file(archive).map_err(|e| IngestError::io(archive, e))?;

    find_native_file(work, product_id)
}

/// The `.nat` file named after the product, or the only `.nat` file present.
fn find_native_file(work: &Path, product_id: &str) -> IngestResult<PathBuf> {
    let candidates: Vec<PathBuf> = WalkDir::new(work)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("nat")))
        .collect();

    if let Some(exact) = candidates
        .iter()
        .find(|p| p.file_stem().map_or(false, |s| s == product_id))
    {
        return Ok(exact.clone());
    }

    match candidates.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(IngestError::Archive(format!(
            "no native file found for {}",
            product_id
        ))),
        many => Err(IngestError::Archive(format!(
            "{} native files found for {}, none named after it",
            many.len(),
            product_id
        ))),
    }
}
