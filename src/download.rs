use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::ExportFormat;
use crate::error::Result;

/// Write an exported report into `dir` as `threat-intel-report-<stamp>.<ext>`.
/// Never overwrites: a numeric suffix is added on collision.
pub fn save_report(
    dir: &Path,
    format: ExportFormat,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let stem = format!("threat-intel-report-{}", now.format("%Y%m%d-%H%M%S"));
    let mut path = dir.join(format!("{}.{}", stem, format.extension()));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}-{}.{}", stem, n, format.extension()));
        n += 1;
    }

    fs::write(&path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), mime = format.mime_type(), "Saved report");
    Ok(path)
}
