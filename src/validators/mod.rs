//! Validators
//!
//! Each validator scans the configured root, inspects the collections it
//! targets and writes one report. Shared plumbing lives here:
//!
//! - `RunContext`: engine handle, settings, status sink and run token
//! - `ValidationSummary`: what a validator produced
//! - `visit_collections`: the per-container loop with per-item resilience
//!
//! # Error policy
//!
//! - Configuration and report I/O errors abort the validator
//! - Engine errors abort only the current container, which is recorded as
//!   a failure and reported to status before the loop moves on

mod codes;
mod duplicates;
mod inventory;
mod overlaps;
mod small_areas;
mod sheet_number;
mod topology;
mod ward_mismatch;

use std::fmt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::Settings;
use crate::discovery::{resolve, scan_containers, ResolvedCollection};
use crate::engine::{GeoEngine, GeometryKind};
use crate::errors::{QcError, QcResult};
use crate::report::{CsvReport, StatusSink};

pub use codes::{InvalidParcelNumbers, InvalidSheetNumbers, InvalidWardNumbers};
pub use duplicates::{DuplicateChildren, DuplicateParcels};
pub use inventory::{SegmentCounts, SuspiciousColumn};
pub use overlaps::FeatureOverlaps;
pub use sheet_number::SheetNumberCheck;
pub use small_areas::SmallAreas;
pub use topology::{clean_base_name, TopologyOverlaps, OVERLAP_REPORTS_DIR, SUMMARY_FILE};
pub use ward_mismatch::{classify_ward, WardMismatch, WardReading};

/// Shared inputs for one run
pub struct RunContext<'a> {
    pub engine: &'a dyn GeoEngine,
    pub settings: &'a Settings,
    pub status: &'a dyn StatusSink,
    run_token: String,
}

impl<'a> RunContext<'a> {
    pub fn new(
        engine: &'a dyn GeoEngine,
        settings: &'a Settings,
        status: &'a dyn StatusSink,
    ) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            engine,
            settings,
            status,
            run_token: id[..8].to_string(),
        }
    }

    /// Token unique to this run, used to name staging artifacts
    pub fn run_token(&self) -> &str {
        &self.run_token
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    pub fn report_path(&self, file_name: &str) -> PathBuf {
        self.settings.root.join(file_name)
    }

    /// Containers under the root; none at all is a configuration error
    pub fn containers(&self) -> QcResult<Vec<PathBuf>> {
        let containers = scan_containers(&self.settings.root, &self.settings.exclusions)?;
        if containers.is_empty() {
            return Err(QcError::configuration(format!(
                "No MDB files found in: {}",
                self.settings.root.display()
            )));
        }
        Ok(containers)
    }

    /// Record a per-item failure and tell the user
    pub fn item_failed(&self, summary: &mut ValidationSummary, subject: &str, err: &dyn fmt::Display) {
        let message = format!("Error processing {}: {}", subject, err);
        tracing::warn!(subject, error = %err, "item failed");
        self.status.set(&message);
        summary.failures.push(message);
    }
}

/// What one validator run produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSummary {
    /// Containers scanned
    pub containers: usize,
    /// Report rows (or findings) emitted
    pub rows: usize,
    /// Files written
    pub reports: Vec<PathBuf>,
    /// Per-item failure messages
    pub failures: Vec<String>,
}

impl ValidationSummary {
    /// Write a report and account for it
    pub fn write_report(&mut self, report: &CsvReport) -> QcResult<()> {
        report.write()?;
        self.rows += report.row_count();
        self.reports.push(report.path().to_path_buf());
        Ok(())
    }
}

/// One quality check
pub trait Validator {
    /// Stable identifier used for selection
    fn id(&self) -> &'static str;

    /// Display name used in status lines
    fn name(&self) -> &'static str;

    /// Main output, relative to the root
    fn report_file(&self) -> &'static str;

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary>;
}

/// File name of a container, for status lines
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Visit every matching collection of every container
///
/// Collections whose geometry differs from `geometry` (when given) are
/// skipped. Engine errors, from resolution or from `visit`, fail only the
/// current container; other errors stop the loop.
pub(crate) fn visit_collections<F>(
    ctx: &RunContext<'_>,
    names: &[&str],
    geometry: Option<GeometryKind>,
    summary: &mut ValidationSummary,
    mut visit: F,
) -> QcResult<()>
where
    F: FnMut(&ResolvedCollection) -> QcResult<()>,
{
    let containers = ctx.containers()?;
    let total = containers.len();
    summary.containers = total;

    for (index, container) in containers.iter().enumerate() {
        let base = file_name(container);
        ctx.status
            .set(&format!("Processing ({}/{}) {}", index + 1, total, base));

        let result = resolve(ctx.engine, container, names)
            .map_err(QcError::from)
            .and_then(|collections| {
                for collection in &collections {
                    if geometry.is_some_and(|g| g != collection.geometry) {
                        tracing::debug!(
                            collection = %collection.path,
                            geometry = %collection.geometry,
                            "skipping collection with unexpected geometry"
                        );
                        continue;
                    }
                    visit(collection)?;
                }
                Ok(())
            });

        match result {
            Ok(()) => {}
            Err(QcError::Engine(e)) => ctx.item_failed(summary, &container.display().to_string(), &e),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
