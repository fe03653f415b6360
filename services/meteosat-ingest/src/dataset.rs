//! Static description of the ingested data source.

use raster_tools::{Extent, TargetGrid};
use serde::Serialize;

/// A composite to derive and the bands exported from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeDefinition {
    pub name: String,
    /// 1-based band indices, each exported to its own file
    pub export_bands: Vec<u32>,
}

impl CompositeDefinition {
    pub fn new(name: impl Into<String>, export_bands: &[u32]) -> Self {
        Self {
            name: name.into(),
            export_bands: export_bands.to_vec(),
        }
    }
}

/// One catalog collection and what to produce from each of its scenes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    /// Short name, also the state file stem
    pub source: String,
    /// Catalog collection id
    pub collection: String,
    pub composites: Vec<CompositeDefinition>,
    /// Region every output is cropped to
    pub extent: Extent,
    #[serde(skip)]
    pub grid: TargetGrid,
}

impl Dataset {
    /// Meteosat SEVIRI level 1.5 full disk, cropped to Africa.
    pub fn meteosat() -> Self {
        Self {
            source: "meteosat".to_string(),
            collection: "EO:EUM:DAT:MSG:HRSEVIRI".to_string(),
            composites: vec![
                CompositeDefinition::new("natural_color_with_night_ir_hires", &[1, 2, 3]),
                CompositeDefinition::new("ir108_3d", &[1]),
            ],
            extent: Extent {
                west: -25.3605509351584004,
                south: -34.8219979618462006,
                east: 63.4957562687202994,
                north: 37.3404070787983002,
            },
            grid: TargetGrid::seviri_world(),
        }
    }

    pub fn composite_names(&self) -> Vec<String> {
        self.composites.iter().map(|c| c.name.clone()).collect()
    }
}
