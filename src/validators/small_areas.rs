//! Undersized parcels and constructions

use crate::engine::{GeometryKind, SHAPE_AREA_FIELD};
use crate::errors::QcResult;
use crate::observability::ObservationScope;
use crate::report::CsvReport;

use super::{visit_collections, RunContext, ValidationSummary, Validator};

pub const SMALL_AREAS_REPORT: &str = "small_areas_report.csv";

/// Parcels below this area (sq. m) are reported
pub const PARCEL_MIN_AREA: f64 = 5.0;
/// Constructions below this area (sq. m) are reported
pub const CONSTRUCTION_MIN_AREA: f64 = 0.5;

pub struct SmallAreas;

impl Validator for SmallAreas {
    fn id(&self) -> &'static str {
        "small-areas"
    }

    fn name(&self) -> &'static str {
        "Small Areas"
    }

    fn report_file(&self) -> &'static str {
        SMALL_AREAS_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("SMALL_AREAS");
        let mut report = CsvReport::new(
            ctx.report_path(SMALL_AREAS_REPORT),
            &["Source File", "Feature Class", "Parcel Number", "ParFID", "Area (sq.m)"],
        );
        let mut summary = ValidationSummary::default();

        let visited = visit_collections(
            ctx,
            &["Parcel", "Construction"],
            Some(GeometryKind::Polygon),
            &mut summary,
            |collection| {
                if !collection.has_field(SHAPE_AREA_FIELD) {
                    tracing::debug!(collection = %collection.path, "no Shape_Area field, skipping");
                    return Ok(());
                }
                let is_parcel = collection.name == "Parcel";
                let (id_field, threshold) = if is_parcel {
                    ("PARCELNO", PARCEL_MIN_AREA)
                } else {
                    ("ParFID", CONSTRUCTION_MIN_AREA)
                };

                for row in ctx
                    .engine
                    .search(&collection.path, &[id_field, SHAPE_AREA_FIELD])?
                {
                    let Some(area) = row.get(1).as_f64() else {
                        continue;
                    };
                    if area >= threshold {
                        continue;
                    }
                    let id = row.get(0).to_string();
                    let (parcel_no, par_fid) = if is_parcel {
                        (id, String::new())
                    } else {
                        (String::new(), id)
                    };
                    report.push([
                        collection.path.to_string(),
                        collection.name.clone(),
                        parcel_no,
                        par_fid,
                        row.get(1).to_string(),
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
