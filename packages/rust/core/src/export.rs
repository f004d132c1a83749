//! CSV export of the three flattened datasets.
//!
//! One file per dataset, named with the run timestamp so successive harvests
//! never clobber each other.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use pestres_shared::{PestresError, Result};

use crate::pipeline::HarvestOutcome;

/// Locations of the three written datasets.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    /// Commodity-MRL pairs.
    pub commodity_mrl: PathBuf,
    /// Pesticide-MRL pairs.
    pub pesticide_mrl: PathBuf,
    /// Pesticide metadata.
    pub pesticide: PathBuf,
}

/// Write the three datasets under `out_dir`, stamped with `at`.
///
/// All three files are written even when a dataset is empty.
pub fn write_datasets(
    out_dir: &Path,
    outcome: &HarvestOutcome,
    at: DateTime<Local>,
) -> Result<ExportPaths> {
    std::fs::create_dir_all(out_dir).map_err(|e| PestresError::io(out_dir, e))?;

    let stamp = at.format("%Y-%m-%dT%H:%M:%S");
    let paths = ExportPaths {
        commodity_mrl: out_dir.join(format!("commodity_mrl_codex_alimentarius_{stamp}.csv")),
        pesticide_mrl: out_dir.join(format!("pesticide_mrl_codex_alimentarius_{stamp}.csv")),
        pesticide: out_dir.join(format!("pesticide_codex_alimentarius_{stamp}.csv")),
    };

    write_rows(&paths.commodity_mrl, &outcome.commodity_rows)?;
    info!(path = %paths.commodity_mrl.display(), rows = outcome.commodity_rows.len(),
        "saved commodity MRL dataset");

    write_rows(&paths.pesticide_mrl, &outcome.pesticide_rows)?;
    info!(path = %paths.pesticide_mrl.display(), rows = outcome.pesticide_rows.len(),
        "saved pesticide MRL dataset");

    write_rows(&paths.pesticide, &outcome.pesticide_detail_rows)?;
    info!(path = %paths.pesticide.display(), rows = outcome.pesticide_detail_rows.len(),
        "saved pesticide dataset");

    Ok(paths)
}

/// Serialize rows to one CSV file; the header comes from the row type's
/// field names.
fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| PestresError::Export(format!("{}: {e}", path.display())))?;

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| PestresError::Export(format!("{}: {e}", path.display())))?;
    }

    writer.flush().map_err(|e| PestresError::io(path, e))?;
    Ok(())
}
