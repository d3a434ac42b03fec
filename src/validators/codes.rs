//! Attribute code checks on Parcel records
//!
//! Values are compared in their printed form, so `1.0` is not a valid ward
//! and a null GRIDS1 never carries the sheet prefix.

use crate::engine::{GeometryKind, Row};
use crate::errors::QcResult;
use crate::observability::ObservationScope;
use crate::report::CsvReport;

use super::{visit_collections, RunContext, ValidationSummary, Validator};

pub const INVALID_SHEET_REPORT: &str = "invalid_sheet_numbers_report.csv";
pub const INVALID_WARD_REPORT: &str = "invalid_ward_numbers_report.csv";
pub const INVALID_PARCEL_NO_REPORT: &str = "invalid_parcel_no_report.csv";

const INVALID_SHEET_STATUS: &str = "Invalid GRIDS1 (does not match selected scale)";
const MAX_WARD_CODE: u32 = 9;
const MAX_PARCEL_NO: u32 = 9998;

/// Canonical decimal in `[min, max]`, no sign, padding or fraction
fn is_code_in_range(text: &str, min: u32, max: u32) -> bool {
    text.parse::<u32>()
        .is_ok_and(|n| (min..=max).contains(&n) && n.to_string() == text)
}

fn run_parcel_check<F>(
    ctx: &RunContext<'_>,
    scope_name: &str,
    report: &mut CsvReport,
    fields: &[&str],
    mut check: F,
) -> QcResult<ValidationSummary>
where
    F: FnMut(&str, &Row, &mut CsvReport),
{
    let scope = ObservationScope::new(scope_name);
    let mut summary = ValidationSummary::default();
    let visited = visit_collections(
        ctx,
        &["Parcel"],
        Some(GeometryKind::Polygon),
        &mut summary,
        |collection| {
            let source = collection.container.display().to_string();
            for row in ctx.engine.search(&collection.path, fields)? {
                check(&source, &row, report);
            }
            Ok(())
        },
    );
    if let Err(e) = visited {
        scope.fail(&e.to_string());
        return Err(e);
    }
    summary.write_report(report)?;
    scope.complete_with_rows(report.row_count());
    Ok(summary)
}

/// GRIDS1 must start with the prefix of the selected scale
pub struct InvalidSheetNumbers;

impl Validator for InvalidSheetNumbers {
    fn id(&self) -> &'static str {
        "invalid-sheet"
    }

    fn name(&self) -> &'static str {
        "Invalid Sheet Numbers"
    }

    fn report_file(&self) -> &'static str {
        INVALID_SHEET_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let prefix = ctx.settings.require_scale()?.prefix();
        let mut report = CsvReport::new(
            ctx.report_path(INVALID_SHEET_REPORT),
            &["MDB File Path", "PARCELNO", "GRIDS1", "Status"],
        );
        run_parcel_check(ctx, "INVALID_SHEET", &mut report, &["PARCELNO", "GRIDS1"], |source, row, report| {
            let grids = row.get(1).to_string();
            if !grids.starts_with(prefix) {
                report.push([
                    source.to_string(),
                    row.get(0).to_string(),
                    grids,
                    INVALID_SHEET_STATUS.to_string(),
                ]);
            }
        })
    }
}

/// WARDNO must print as one of 1 through 9
pub struct InvalidWardNumbers;

impl Validator for InvalidWardNumbers {
    fn id(&self) -> &'static str {
        "invalid-ward"
    }

    fn name(&self) -> &'static str {
        "Invalid Ward Numbers"
    }

    fn report_file(&self) -> &'static str {
        INVALID_WARD_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let mut report = CsvReport::new(
            ctx.report_path(INVALID_WARD_REPORT),
            &["Source File", "Parcel Number", "WARDNO"],
        );
        run_parcel_check(ctx, "INVALID_WARD", &mut report, &["PARCELNO", "WARDNO"], |source, row, report| {
            let ward = row.get(1).to_string();
            if !is_code_in_range(&ward, 1, MAX_WARD_CODE) {
                report.push([source.to_string(), row.get(0).to_string(), ward]);
            }
        })
    }
}

/// PARCELNO must print as one of 0 through 9998
pub struct InvalidParcelNumbers;

impl Validator for InvalidParcelNumbers {
    fn id(&self) -> &'static str {
        "invalid-parcel-no"
    }

    fn name(&self) -> &'static str {
        "Invalid Parcel Numbers"
    }

    fn report_file(&self) -> &'static str {
        INVALID_PARCEL_NO_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let mut report = CsvReport::new(
            ctx.report_path(INVALID_PARCEL_NO_REPORT),
            &["Source File", "Parcel Number"],
        );
        run_parcel_check(ctx, "INVALID_PARCEL_NO", &mut report, &["PARCELNO"], |source, row, report| {
            let parcel = row.get(0).to_string();
            if !is_code_in_range(&parcel, 0, MAX_PARCEL_NO) {
                report.push([source.to_string(), parcel]);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::config::{Scale, Settings};
    use crate::engine::{FieldKind, MemoryEngine, Value};
    use crate::report::RecordingStatus;
    use tempfile::TempDir;

    fn fixture(tmp: &TempDir) -> MemoryEngine {
        let engine = MemoryEngine::new();
        let p = parcel_table(
            &engine,
            tmp.path(),
            "ward_1.mdb",
            &[
                ("PARCELNO", FieldKind::Integer),
                ("WARDNO", FieldKind::Text),
                ("GRIDS1", FieldKind::Text),
            ],
        );
        let rows = [
            (Value::Int(1), Value::from("1"), Value::from("55551234")),
            (Value::Int(2), Value::from("10"), Value::from("1234")),
            (Value::Int(9999), Value::Float(1.0), Value::Null),
            (Value::Int(0), Value::Null, Value::from("55550001")),
        ];
        for (no, ward, grids) in rows {
            add(&engine, &p, &[("PARCELNO", no), ("WARDNO", ward), ("GRIDS1", grids)]);
        }
        engine
    }

    #[test]
    fn test_code_range() {
        assert!(is_code_in_range("1", 1, 9));
        assert!(!is_code_in_range("0", 1, 9));
        assert!(!is_code_in_range("01", 1, 9));
        assert!(!is_code_in_range("1.0", 1, 9));
        assert!(!is_code_in_range("", 1, 9));
        assert!(is_code_in_range("9998", 0, 9998));
        assert!(!is_code_in_range("-1", 0, 9998));
    }

    #[test]
    fn test_invalid_sheet_with_scale_1200() {
        let tmp = TempDir::new().unwrap();
        let engine = fixture(&tmp);
        let mut settings = Settings::new(tmp.path());
        settings.scale = Some(Scale::S1200);
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        InvalidSheetNumbers.run(&ctx).unwrap();

        let lines = read_csv(&tmp.path().join(INVALID_SHEET_REPORT));
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",2,1234,Invalid GRIDS1 (does not match selected scale)"));
        assert!(lines[2].ends_with(",9999,,Invalid GRIDS1 (does not match selected scale)"));
    }

    #[test]
    fn test_invalid_sheet_requires_scale() {
        let tmp = TempDir::new().unwrap();
        let engine = fixture(&tmp);
        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        assert_eq!(InvalidSheetNumbers.run(&ctx).unwrap_err().code(), "QC_CONFIGURATION");
    }

    #[test]
    fn test_invalid_ward_numbers() {
        let tmp = TempDir::new().unwrap();
        let engine = fixture(&tmp);
        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        let summary = InvalidWardNumbers.run(&ctx).unwrap();

        let lines = read_csv(&tmp.path().join(INVALID_WARD_REPORT));
        assert_eq!(summary.rows, 3);
        assert!(lines[1].ends_with(",2,10"));
        assert!(lines[2].ends_with(",9999,1.0"));
        assert!(lines[3].ends_with(",0,"));
    }

    #[test]
    fn test_invalid_parcel_numbers() {
        let tmp = TempDir::new().unwrap();
        let engine = fixture(&tmp);
        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        InvalidParcelNumbers.run(&ctx).unwrap();

        let lines = read_csv(&tmp.path().join(INVALID_PARCEL_NO_REPORT));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("ward_1.mdb,9999"));
    }
}
