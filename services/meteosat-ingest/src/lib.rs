//! Meteosat scene ingestion.
//!
//! Keeps a local archive of clipped, per-band SEVIRI rasters in step with the
//! EUMETSAT Data Store, one 15-minute scene per successful cycle:
//! - [`cursor`] picks the scene to look for from the persisted [`state`]
//! - [`availability`] checks whether the catalog has published it
//! - [`pipeline`] downloads, decodes, clips and exports it, then commits
//! - [`source`] composes the above into one idempotent update cycle
//! - [`scheduler`] runs cycles on an interval without ever overlapping them

pub mod availability;
pub mod config;
pub mod cursor;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod scheduler;
pub mod server;
pub mod source;
pub mod state;
pub mod status;

pub use config::{ConfigError, IngestConfig};
pub use dataset::{CompositeDefinition, Dataset};
pub use error::{ErrorKind, IngestError, IngestResult};
pub use scheduler::Scheduler;
pub use source::{CycleOutcome, MeteosatSource, UpdateJob};
pub use state::{CursorState, StateStore};
pub use status::{CycleReport, CycleTracker};
