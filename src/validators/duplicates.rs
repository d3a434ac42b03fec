//! Duplicate detection via grouped frequency
//!
//! The engine groups a collection on key fields into a scratch table with a
//! `FREQUENCY` column; every group seen more than once is a duplicate.

use crate::config::DuplicateKeyPolicy;
use crate::engine::{GeometryKind, Row, ScopedDataset, FREQUENCY_FIELD};
use crate::errors::QcResult;
use crate::observability::ObservationScope;
use crate::report::CsvReport;

use super::{visit_collections, RunContext, ValidationSummary, Validator};

pub const DUPLICATE_PARCELS_REPORT: &str = "duplicate_parcels_report.csv";
pub const DUPLICATE_CHILDREN_REPORT: &str = "duplicate_segments_construction_report.csv";

const CONSTRUCTION_KEY: [&str; 3] = ["ParFID", "Shape_Area", "Shape_Length"];
const SEGMENTS_KEY: [&str; 2] = ["ParFID", "Shape_Length"];

fn frequency_of(row: &Row, index: usize) -> i64 {
    row.get(index).as_f64().map(|f| f as i64).unwrap_or(0)
}

/// Parcels sharing a key (PARCELNO alone, or WARDNO + GRIDS1 + PARCELNO)
pub struct DuplicateParcels;

impl Validator for DuplicateParcels {
    fn id(&self) -> &'static str {
        "duplicate-parcels"
    }

    fn name(&self) -> &'static str {
        "Duplicate Parcels"
    }

    fn report_file(&self) -> &'static str {
        DUPLICATE_PARCELS_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("DUPLICATE_PARCELS");
        let policy = ctx.settings.duplicate_key;
        let key = policy.fields();
        let mut report = CsvReport::new(
            ctx.report_path(DUPLICATE_PARCELS_REPORT),
            &["Source File", "WARDNO", "GRIDS1", "PARCELNO", "Frequency"],
        );
        let mut summary = ValidationSummary::default();

        let mut columns: Vec<&str> = key.to_vec();
        columns.push(FREQUENCY_FIELD);
        // PARCELNO is the last key field under every policy
        let parcel_index = key.len() - 1;
        let frequency_index = key.len();

        let visited = visit_collections(
            ctx,
            &["Parcel"],
            Some(GeometryKind::Polygon),
            &mut summary,
            |collection| {
                let table = ScopedDataset::scratch(ctx.engine, "freq");
                ctx.engine.frequency(&collection.path, table.path(), key)?;
                for row in ctx.engine.search(table.path(), &columns)? {
                    let parcel = row.get(parcel_index);
                    if parcel.is_zero() || frequency_of(&row, frequency_index) <= 1 {
                        continue;
                    }
                    let (ward, grids) = match policy {
                        DuplicateKeyPolicy::Composite => {
                            (row.get(0).to_string(), row.get(1).to_string())
                        }
                        DuplicateKeyPolicy::ParcelNo => (String::new(), String::new()),
                    };
                    report.push([
                        collection.path.to_string(),
                        ward,
                        grids,
                        parcel.to_string(),
                        row.get(frequency_index).to_string(),
                    ]);
                }
                Ok(())
            },
        );
        if let Err(e) = visited {
            scope.fail(&e.to_string());
            return Err(e);
        }

        summary.write_report(&report)?;
        scope.complete_with_rows(report.row_count());
        Ok(summary)
    }
}

/// Duplicate Construction polygons and Segments lines within a parcel
pub struct DuplicateChildren;

impl Validator for DuplicateChildren {
    fn id(&self) -> &'static str {
        "duplicate-children"
    }

    fn name(&self) -> &'static str {
        "Duplicate Construction and Segments"
    }

    fn report_file(&self) -> &'static str {
        DUPLICATE_CHILDREN_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("DUPLICATE_CHILDREN");
        let mut report = CsvReport::new(
            ctx.report_path(DUPLICATE_CHILDREN_REPORT),
            &["Source File", "ParFID", "Shape_Area", "Shape_Length", "Frequency"],
        );
        let mut summary = ValidationSummary::default();

        let visited = visit_collections(
            ctx,
            &["Construction", "Segments"],
            None,
            &mut summary,
            |collection| {
                let construction = collection.name == "Construction";
                if construction && collection.geometry != GeometryKind::Polygon {
                    tracing::debug!(collection = %collection.path, "skipping non-polygon Construction");
                    return Ok(());
                }
                let key: &[&str] = if construction {
                    &CONSTRUCTION_KEY
                } else {
                    &SEGMENTS_KEY
                };
                let mut columns = key.to_vec();
                columns.push(FREQUENCY_FIELD);
                let length_index = key.len() - 1;
                let frequency_index = key.len();

                let table = ScopedDataset::scratch(ctx.engine, "freq");
                ctx.engine.frequency(&collection.path, table.path(), key)?;
                for row in ctx.engine.search(table.path(), &columns)? {
                    let length = row.get(length_index).to_string();
                    if length == "0" || frequency_of(&row, frequency_index) <= 1 {
                        continue;
                    }
                    let area = if construction {
                        row.get(1).to_string()
                    } else {
                        String::new()
                    };
                    report.push([
                        collection.path.to_string(),
                        row.get(0).to_string(),
                        area,
                        length,
                        row.get(frequency_index).to_string(),
                    ]);
                }
                Ok(())
            },
        );
        if let Err(e) = visited {
            scope.fail(&e.to_string());
            return Err(e);
        }

        summary.write_report(&report)?;
        scope.complete_with_rows(report.row_count());
        Ok(summary)
    }
}
