//! In-memory stand-ins for the catalog and the raster toolchain.
//!
//! Every fake consults a shared [`FailurePlan`] so a test can make exactly one
//! pipeline stage fail and then clear it to simulate a later successful retry.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use eumdac_client::{Catalog, CatalogError, CatalogResult, Product, ProductDownload};
use futures::stream::{self, StreamExt};
use raster_tools::{
    BandExporter, Extent, ExtentClipper, RasterError, RasterResult, SceneDecoder, Toolchain,
};

/// Pipeline stage a fake can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Search,
    Download,
    Decode,
    Clip,
    Export,
}

/// Set of stages currently forced to fail. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    stages: Arc<Mutex<HashSet<Stage>>>,
}

impl FailurePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, stage: Stage) {
        self.stages.lock().unwrap().insert(stage);
    }

    pub fn clear(&self) {
        self.stages.lock().unwrap().clear();
    }

    pub fn should_fail(&self, stage: Stage) -> bool {
        self.stages.lock().unwrap().contains(&stage)
    }

    fn tool_failure(&self, stage: Stage) -> RasterResult<()> {
        if self.should_fail(stage) {
            Err(RasterError::ToolFailed {
                program: format!("fake-{:?}", stage).to_lowercase(),
                status: "exit status: 1".to_string(),
                stderr: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Catalog serving a fixed product list and in-memory archives.
///
/// Search filters by the requested window, like the real endpoint.
pub struct FakeCatalog {
    products: Mutex<Vec<Product>>,
    archives: Mutex<HashMap<String, Vec<u8>>>,
    failures: FailurePlan,
    windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    downloads: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(failures: FailurePlan) -> Self {
        Self {
            products: Mutex::new(Vec::new()),
            archives: Mutex::new(HashMap::new()),
            failures,
            windows: Mutex::new(Vec::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Publish a product and the archive served for it.
    pub fn publish(&self, product: Product, archive: Vec<u8>) {
        self.archives
            .lock()
            .unwrap()
            .insert(product.identifier.clone(), archive);
        self.products.lock().unwrap().push(product);
    }

    /// List a product in search results without an archive behind it.
    pub fn list_only(&self, product: Product) {
        self.products.lock().unwrap().push(product);
    }

    /// Search windows requested so far.
    pub fn search_windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.windows.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn search(
        &self,
        _collection: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CatalogResult<Vec<Product>> {
        self.windows.lock().unwrap().push((start, end));
        if self.failures.should_fail(Stage::Search) {
            return Err(CatalogError::Status {
                status: 503,
                url: "fake://search".to_string(),
            });
        }
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .cloned()
            .collect())
    }

    async fn open(&self, _collection: &str, identifier: &str) -> CatalogResult<ProductDownload> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let archive = self
            .archives
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .ok_or_else(|| CatalogError::Status {
                status: 404,
                url: format!("fake://download/{}", identifier),
            })?;

        let filename = format!("{}.zip", identifier);
        let content_length = Some(archive.len() as u64);

        // Serve in two chunks; an injected failure cuts the stream after the first.
        let mid = archive.len() / 2;
        let first = Bytes::copy_from_slice(&archive[..mid]);
        let second: CatalogResult<Bytes> = if self.failures.should_fail(Stage::Download) {
            Err(CatalogError::InvalidResponse(
                "connection reset mid-stream".to_string(),
            ))
        } else {
            Ok(Bytes::copy_from_slice(&archive[mid..]))
        };

        Ok(ProductDownload {
            filename,
            content_length,
            stream: stream::iter(vec![Ok(first), second]).boxed(),
        })
    }
}

/// Decoder writing `{composite}:{native file contents}` per composite.
pub struct FakeDecoder {
    failures: FailurePlan,
    pub calls: AtomicUsize,
}

#[async_trait]
impl SceneDecoder for FakeDecoder {
    async fn decode(
        &self,
        native_file: &Path,
        composites: &[String],
        out_dir: &Path,
    ) -> RasterResult<HashMap<String, PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.tool_failure(Stage::Decode)?;

        let native = tokio::fs::read(native_file).await?;
        let mut outputs = HashMap::new();
        for name in composites {
            let path = out_dir.join(format!("{}.tif", name));
            let mut contents = format!("{}:", name).into_bytes();
            contents.extend_from_slice(&native);
            tokio::fs::write(&path, contents).await?;
            outputs.insert(name.clone(), path);
        }
        Ok(outputs)
    }
}

/// Clipper prefixing the input with the extent it was asked for.
pub struct FakeClipper {
    failures: FailurePlan,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ExtentClipper for FakeClipper {
    async fn clip(&self, extent: &Extent, input: &Path, output: &Path) -> RasterResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.tool_failure(Stage::Clip)?;

        let mut contents = format!(
            "clip[{},{},{},{}]:",
            extent.west, extent.south, extent.east, extent.north
        )
        .into_bytes();
        contents.extend_from_slice(&tokio::fs::read(input).await?);
        tokio::fs::write(output, contents).await?;
        Ok(())
    }
}

/// Exporter writing `band{N}:{input contents}`.
pub struct FakeExporter {
    failures: FailurePlan,
    pub calls: AtomicUsize,
}

#[async_trait]
impl BandExporter for FakeExporter {
    async fn export_band(&self, input: &Path, band: u32, output: &Path) -> RasterResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.tool_failure(Stage::Export)?;

        let mut contents = format!("band{}:", band).into_bytes();
        contents.extend_from_slice(&tokio::fs::read(input).await?);
        tokio::fs::write(output, contents).await?;
        Ok(())
    }
}

/// The three fake tools, kept so tests can inspect call counts.
pub struct FakeTools {
    pub decoder: Arc<FakeDecoder>,
    pub clipper: Arc<FakeClipper>,
    pub exporter: Arc<FakeExporter>,
}

impl FakeTools {
    pub fn new(failures: FailurePlan) -> Self {
        Self {
            decoder: Arc::new(FakeDecoder {
                failures: failures.clone(),
                calls: AtomicUsize::new(0),
            }),
            clipper: Arc::new(FakeClipper {
                failures: failures.clone(),
                calls: AtomicUsize::new(0),
            }),
            exporter: Arc::new(FakeExporter {
                failures,
                calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(
            self.decoder.clone(),
            self.clipper.clone(),
            self.exporter.clone(),
        )
    }

    pub fn export_calls(&self) -> usize {
        self.exporter.calls.load(Ordering::SeqCst)
    }
}
