//! Harvest pipeline: taxonomy walk, detail fetches, flattening, CSV export.

pub mod export;
pub mod pipeline;

pub use export::{ExportPaths, write_datasets};
pub use pipeline::{
    HarvestOutcome, HarvestProgress, HarvestReport, SilentProgress, collect, harvest,
};
