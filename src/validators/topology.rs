//! Parcel self-overlap detection through a staged topology
//!
//! For each container the Parcel collection is copied into a per-run
//! staging namespace, a topology with overlap and gap rules is validated,
//! and the exported polygon errors are joined back to parcel attributes.
//!
//! Outputs, under `<root>/Overlap_Reports/`:
//! - `<stem>/<base>_Overlaps.csv` per container with overlaps
//! - `<stem>/<base>_Overlaps` error features (engine folder workspace)
//! - `Parcel_Overlap_Report_Summary.txt`
//!
//! `<stem>` is the container's file stem, made unique within the run;
//! `<base>` is the stem reduced by [`clean_base_name`].

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::discovery::{resolve, ResolvedCollection};
use crate::engine::{
    DatasetPath, EngineResult, FieldKind, GeometryKind, Row, ScopedNamespace, TopologyRule, Value,
    DESTINATION_ID_FIELD, ORIGIN_ID_FIELD, SHAPE_AREA_FIELD,
};
use crate::errors::{QcError, QcResult};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::report::CsvReport;

use super::{file_name, RunContext, ValidationSummary, Validator};

pub const OVERLAP_REPORTS_DIR: &str = "Overlap_Reports";
pub const SUMMARY_FILE: &str = "Parcel_Overlap_Report_Summary.txt";

const PARCEL_LAYER: &str = "Parcel";
const STAGED_NAME: &str = "Parcel1";
const TOPOLOGY_NAME: &str = "Parcel_Topology";
const ERROR_BASENAME: &str = "temp_overlap_errors";

/// Keep ASCII letters, digits and `-_.() `, then turn spaces into `_`
pub fn clean_base_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || "-_.() ".contains(*c))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// Output folder and file base for one container
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputName {
    folder: String,
    base: String,
}

/// One output name per container, in the same order
///
/// Folders are never empty or `.`/`..` and never repeat (compared
/// case-insensitively); repeats get `_2`, `_3`, ... appended. The base is
/// the cleaned stem, or `container_<n>` when cleaning leaves nothing.
fn output_names(containers: &[PathBuf]) -> Vec<OutputName> {
    let mut used: HashSet<String> = HashSet::new();
    containers
        .iter()
        .enumerate()
        .map(|(index, container)| {
            let fallback = format!("container_{}", index + 1);
            let raw = stem(container);
            let raw = if matches!(raw.trim(), "" | "." | "..") {
                fallback.clone()
            } else {
                raw
            };
            let mut folder = raw.clone();
            let mut n = 2;
            while !used.insert(folder.to_lowercase()) {
                folder = format!("{}_{}", raw, n);
                n += 1;
            }
            let base = match clean_base_name(&raw) {
                b if b.trim_matches('.').is_empty() => fallback,
                b => b,
            };
            OutputName { folder, base }
        })
        .collect()
}

/// What one container produced
struct ContainerOutcome {
    overlaps: usize,
    report: Option<PathBuf>,
}

pub struct TopologyOverlaps;

impl TopologyOverlaps {
    fn find_parcel(
        &self,
        ctx: &RunContext<'_>,
        container: &Path,
    ) -> EngineResult<Option<ResolvedCollection>> {
        Ok(resolve(ctx.engine, container, &[PARCEL_LAYER])?
            .into_iter()
            .find(|c| c.namespace.is_none() && c.geometry == GeometryKind::Polygon))
    }

    /// Stage, validate and correlate one container
    fn process(
        &self,
        ctx: &RunContext<'_>,
        parcel: &ResolvedCollection,
        out_dir: &Path,
        base: &str,
    ) -> QcResult<ContainerOutcome> {
        let engine = ctx.engine;
        let container = parcel.container.as_path();
        let namespace_name = format!("{}_{}", ctx.settings.topology_prefix, ctx.run_token());

        let mut staging = ScopedNamespace::create(engine, container, &namespace_name, &parcel.path)?;
        if ctx.settings.keep_topology {
            staging.keep();
        }

        let staged = staging.dataset(STAGED_NAME);
        engine.copy_features(&parcel.path, &staged)?;

        let topology = engine.create_topology(
            container,
            staging.name(),
            TOPOLOGY_NAME,
            ctx.settings.cluster_tolerance,
        )?;
        engine.add_to_topology(&topology, &staged)?;
        engine.add_topology_rule(&topology, TopologyRule::MustNotOverlap, &staged)?;
        engine.add_topology_rule(&topology, TopologyRule::MustNotHaveGaps, &staged)?;
        engine.validate_topology(&topology)?;
        let errors = engine.export_topology_errors(&topology, ERROR_BASENAME)?;

        // Attribute columns of the staged copy, keyed by object id
        let fields: Vec<String> = engine
            .describe(&staged)?
            .fields
            .into_iter()
            .filter(|f| !matches!(f.kind, FieldKind::Oid | FieldKind::Geometry))
            .map(|f| f.name)
            .filter(|n| !n.starts_with("Shape_") && !n.starts_with("OBJECTID"))
            .collect();
        let mut columns: Vec<&str> = vec!["OID@"];
        columns.extend(fields.iter().map(String::as_str));
        let attributes: HashMap<i64, Vec<Value>> = engine
            .search(&staged, &columns)?
            .into_iter()
            .map(|row| (row.id, row.values.into_iter().skip(1).collect()))
            .collect();

        reset_dir(out_dir)?;

        let mut header: Vec<String> = [
            "Overlap_ID",
            "Source_MDB",
            "Parcel_Layer",
            "Parcel1_ID",
            "Parcel2_ID",
            "Overlap_Area_SQM",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(fields.iter().map(|f| format!("Parcel1_{}", f)));
        header.extend(fields.iter().map(|f| format!("Parcel2_{}", f)));
        let mut report =
            CsvReport::with_header(out_dir.join(format!("{}_Overlaps.csv", base)), header);

        let source = file_name(container);
        let error_rows =
            engine.search(&errors, &[ORIGIN_ID_FIELD, DESTINATION_ID_FIELD, SHAPE_AREA_FIELD])?;
        for cells in correlate(&error_rows, &attributes, &source, &parcel.name) {
            report.push(cells);
        }

        let features = DatasetPath::in_folder(out_dir, format!("{}_Overlaps", base));
        if engine.exists(&features) {
            engine.delete(&features)?;
        }

        if report.is_empty() {
            ctx.status.set("  No overlapping parcels found");
            if let Err(e) = fs::remove_dir(out_dir) {
                tracing::debug!(dir = %out_dir.display(), error = %e, "could not remove empty output folder");
            }
            log_event_with_fields(Event::ReportRemoved, &[("container", &source)]);
            return Ok(ContainerOutcome {
                overlaps: 0,
                report: None,
            });
        }

        engine.copy_features(&errors, &features)?;
        report.write()?;
        ctx.status.set(&format!("  Found {} overlaps", report.row_count()));
        if ctx.settings.keep_topology {
            ctx.status.set("  Keeping topology layer as requested");
            log_event_with_fields(
                Event::TopologyKept,
                &[("container", &source), ("namespace", staging.name())],
            );
        }
        Ok(ContainerOutcome {
            overlaps: report.row_count(),
            report: Some(report.path().to_path_buf()),
        })
    }

    fn write_summary(
        &self,
        path: &Path,
        processed: usize,
        overlaps: usize,
        reports: &[PathBuf],
        failures: &[String],
    ) -> QcResult<()> {
        let mut text = String::new();
        let _ = writeln!(text, "Parcel Overlap Validation Summary");
        let _ = writeln!(text, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(text, "Processed {} MDB files", processed);
        let _ = writeln!(text, "Found {} overlaps", overlaps);
        let _ = writeln!(text, "Reports generated at:");
        for report in reports {
            let _ = writeln!(text, "{}", report.display());
        }
        if !failures.is_empty() {
            let _ = writeln!(text, "Failures:");
            for failure in failures {
                let _ = writeln!(text, "{}", failure);
            }
        }
        fs::write(path, text).map_err(|e| QcError::report(path.display().to_string(), e))
    }
}

impl Validator for TopologyOverlaps {
    fn id(&self) -> &'static str {
        "topology-overlaps"
    }

    fn name(&self) -> &'static str {
        "Parcel Topology Overlaps"
    }

    fn report_file(&self) -> &'static str {
        "Overlap_Reports/Parcel_Overlap_Report_Summary.txt"
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("TOPOLOGY_OVERLAPS");
        let containers = match ctx.containers() {
            Ok(c) => c,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };
        let out_root = ctx.root().join(OVERLAP_REPORTS_DIR);
        fs::create_dir_all(&out_root)
            .map_err(|e| QcError::report(out_root.display().to_string(), e))?;

        let mut summary = ValidationSummary {
            containers: containers.len(),
            ..ValidationSummary::default()
        };
        ctx.status.set(&format!(
            "Starting parcel overlap validation using topology on {} MDB files...",
            containers.len()
        ));

        let names = output_names(&containers);
        for (container, name) in containers.iter().zip(&names) {
            let source = file_name(container);
            let out_dir = out_root.join(&name.folder);
            ctx.status.set(&format!("Processing: {}", source));

            let outcome = self
                .find_parcel(ctx, container)
                .map_err(QcError::from)
                .and_then(|parcel| match parcel {
                    Some(parcel) => self.process(ctx, &parcel, &out_dir, &name.base).map(Some),
                    None => Ok(None),
                });
            match outcome {
                Ok(Some(outcome)) => {
                    summary.rows += outcome.overlaps;
                    summary.reports.extend(outcome.report);
                }
                Ok(None) => {
                    ctx.status
                        .set(&format!("  Layer '{}' not found - skipping", PARCEL_LAYER));
                    log_event_with_fields(
                        Event::ContainerSkipped,
                        &[("container", &source), ("reason", "no root Parcel polygon layer")],
                    );
                }
                Err(QcError::Engine(e)) => ctx.item_failed(&mut summary, &source, &e),
                Err(e) => {
                    scope.fail(&e.to_string());
                    return Err(e);
                }
            }
        }

        let summary_path = out_root.join(SUMMARY_FILE);
        self.write_summary(
            &summary_path,
            containers.len(),
            summary.rows,
            &summary.reports,
            &summary.failures,
        )?;
        ctx.status.set(&format!(
            "Validation complete. Summary report: {}",
            summary_path.display()
        ));
        summary.reports.push(summary_path);
        scope.complete_with_rows(summary.rows);
        Ok(summary)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn object_id(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

/// Join exported overlap errors back to parcel attributes
///
/// Self pairs and ids absent from `attributes` are dropped; surviving rows
/// are numbered from 1.
fn correlate(
    errors: &[Row],
    attributes: &HashMap<i64, Vec<Value>>,
    source: &str,
    layer: &str,
) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for error in errors {
        let (Some(origin), Some(destination)) = (object_id(error.get(0)), object_id(error.get(1)))
        else {
            continue;
        };
        if origin == destination {
            continue;
        }
        let (Some(first), Some(second)) = (attributes.get(&origin), attributes.get(&destination))
        else {
            continue;
        };
        let mut cells = vec![
            (rows.len() + 1).to_string(),
            source.to_string(),
            layer.to_string(),
            origin.to_string(),
            destination.to_string(),
            error.get(2).to_string(),
        ];
        cells.extend(first.iter().chain(second.iter()).map(Value::to_string));
        rows.push(cells);
    }
    rows
}

/// Remove a previous run's output folder and recreate it empty
fn reset_dir(dir: &Path) -> QcResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| QcError::report(dir.display().to_string(), e))?;
    }
    fs::create_dir_all(dir).map_err(|e| QcError::report(dir.display().to_string(), e))
}
