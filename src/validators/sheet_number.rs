//! Grid-sheet mismatch detection
//!
//! Parcels are intersected with the grid-sheet template; wherever the
//! template's PageNumber differs from the parcel's GRIDS1, the parcel sits
//! on a sheet other than the one it claims.

use crate::discovery::ResolvedCollection;
use crate::engine::{DatasetPath, GeometryKind, ScopedDataset};
use crate::errors::{QcError, QcResult};
use crate::observability::ObservationScope;
use crate::report::CsvReport;

use super::{visit_collections, RunContext, ValidationSummary, Validator};

pub const SHEET_NUMBER_REPORT: &str = "sheet_number_mismatch_report.csv";

const PAGE_NUMBER_FIELD: &str = "PageNumber";

pub struct SheetNumberCheck;

impl SheetNumberCheck {
    /// Resolve and check the grid-sheet template
    fn template(&self, ctx: &RunContext<'_>) -> QcResult<DatasetPath> {
        let path = ctx.settings.grid_template_path()?;
        let template = DatasetPath::from_file(&path).ok_or_else(|| {
            QcError::configuration(format!("Invalid grid template path: {}", path.display()))
        })?;
        if !ctx.engine.exists(&template) {
            return Err(QcError::configuration(format!(
                "Gridsheet not found at: {}",
                path.display()
            )));
        }
        let description = ctx.engine.describe(&template)?;
        if !description.has_field(PAGE_NUMBER_FIELD) {
            return Err(QcError::configuration(format!(
                "PageNumber field missing in {}",
                path.display()
            )));
        }
        if description.geometry != GeometryKind::Polygon {
            return Err(QcError::configuration(format!(
                "Grid template must be a polygon layer: {}",
                path.display()
            )));
        }
        Ok(template)
    }

    fn check(
        &self,
        ctx: &RunContext<'_>,
        template: &DatasetPath,
        parcel: &ResolvedCollection,
        report: &mut CsvReport,
    ) -> QcResult<()> {
        let joined = ScopedDataset::scratch(ctx.engine, "intersect");
        ctx.engine.intersect(&[template, &parcel.path], joined.path())?;
        if !ctx.engine.describe(joined.path())?.has_field(PAGE_NUMBER_FIELD) {
            return Err(QcError::configuration(format!(
                "PageNumber field missing in intersection of {}",
                parcel.path
            )));
        }

        let fid_field = format!("FID_{}", parcel.name);
        let columns = [PAGE_NUMBER_FIELD, "GRIDS1", "WARDNO", fid_field.as_str(), "PARCELNO"];
        for row in ctx.engine.search(joined.path(), &columns)? {
            let page = row.get(0).to_string();
            let grids = row.get(1).to_string();
            if page == grids {
                continue;
            }
            report.push([
                parcel.path.to_string(),
                row.get(2).to_string(),
                row.get(3).to_string(),
                row.get(4).to_string(),
                page,
                grids,
            ]);
        }
        Ok(())
    }
}

impl Validator for SheetNumberCheck {
    fn id(&self) -> &'static str {
        "sheet-number"
    }

    fn name(&self) -> &'static str {
        "Sheet Number Check"
    }

    fn report_file(&self) -> &'static str {
        SHEET_NUMBER_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("SHEET_NUMBER");
        let template = match self.template(ctx) {
            Ok(t) => t,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };
        let mut report = CsvReport::new(
            ctx.report_path(SHEET_NUMBER_REPORT),
            &["Source", "WARDNO", "FID_Parcel", "PARCELNO", "PageNumber", "GRIDS1"],
        );
        let mut summary = ValidationSummary::default();

        let visited = visit_collections(
            ctx,
            &["Parcel"],
            Some(GeometryKind::Polygon),
            &mut summary,
            |parcel| self.check(ctx, &template, parcel, &mut report),
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
