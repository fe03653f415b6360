//! The update cycle: try to advance the cursor by one scene.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use eumdac_client::Catalog;
use raster_tools::Toolchain;

use crate::availability;
use crate::config::IngestConfig;
use crate::cursor;
use crate::dataset::Dataset;
use crate::error::IngestResult;
use crate::pipeline::PipelineRunner;
use crate::state::{format_cursor_date, StateStore};

/// What a cycle did when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The target scene is not in the catalog yet; nothing changed
    NotAvailable { target: DateTime<Utc> },
    /// The target scene was processed and the cursor moved to it
    Processed {
        target: DateTime<Utc>,
        product_id: String,
    },
}

impl CycleOutcome {
    pub fn target(&self) -> DateTime<Utc> {
        match self {
            CycleOutcome::NotAvailable { target } | CycleOutcome::Processed { target, .. } => {
                *target
            }
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::NotAvailable { target } => {
                write!(f, "not available: {}", format_cursor_date(*target))
            }
            CycleOutcome::Processed { target, product_id } => {
                write!(f, "processed {} ({})", format_cursor_date(*target), product_id)
            }
        }
    }
}

/// A job the scheduler runs once per tick.
#[async_trait]
pub trait UpdateJob: Send + Sync {
    fn name(&self) -> &str;

    async fn run_cycle(&self) -> IngestResult<CycleOutcome>;
}

/// One catalog collection kept up to date on disk.
pub struct MeteosatSource {
    dataset: Dataset,
    catalog: Arc<dyn Catalog>,
    store: Arc<StateStore>,
    runner: PipelineRunner,
}

impl MeteosatSource {
    /// Wire up a source from configuration. Opens (and if needed creates) the
    /// state file.
    pub fn new(
        config: &IngestConfig,
        dataset: Dataset,
        catalog: Arc<dyn Catalog>,
        toolchain: Toolchain,
    ) -> IngestResult<Self> {
        let store = Arc::new(StateStore::open(&config.state_dir, &dataset.source)?);
        let runner = PipelineRunner::new(
            catalog.clone(),
            toolchain,
            store.clone(),
            config.output_dir.clone(),
            config.temp_dir.clone(),
        );

        Ok(Self {
            dataset,
            catalog,
            store,
            runner,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn store(&self) -> Arc<StateStore> {
        self.store.clone()
    }

    /// Run one cycle as of the current wall clock.
    pub async fn update(&self) -> IngestResult<CycleOutcome> {
        self.update_at(Utc::now()).await
    }

    /// Run one cycle as if the wall clock read `now`.
    ///
    /// Reads the state once, and writes it at most once at the very end.
    #[instrument(skip(self), fields(source = %self.dataset.source))]
    pub async fn update_at(&self, now: DateTime<Utc>) -> IngestResult<CycleOutcome> {
        let state = self.store.read()?;
        let target = cursor::next_target(&state, now);
        info!(target = %format_cursor_date(target), "Checking for scene");

        let resolved =
            availability::resolve(self.catalog.as_ref(), &self.dataset.collection, target).await?;

        let Some(product_id) = resolved else {
            info!(target = %format_cursor_date(target), "Scene not published yet");
            return Ok(CycleOutcome::NotAvailable { target });
        };

        info!(product_id = %product_id, "Scene available, processing");
        self.runner.run(&self.dataset, &product_id, target).await?;

        Ok(CycleOutcome::Processed { target, product_id })
    }
}

#[async_trait]
impl UpdateJob for MeteosatSource {
    fn name(&self) -> &str {
        &self.dataset.source
    }

    async fn run_cycle(&self) -> IngestResult<CycleOutcome> {
        self.update().await
    }
}
