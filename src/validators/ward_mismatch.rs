//! Ward number cross-check against the container file name
//!
//! The expected ward is decoded from the file name; files whose names do
//! not decode are skipped entirely.

use crate::engine::{GeometryKind, Value};
use crate::errors::QcResult;
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::report::CsvReport;
use crate::ward::decode_ward;

use super::{file_name, visit_collections, RunContext, ValidationSummary, Validator};

pub const WARD_MISMATCH_REPORT: &str = "ward_mismatches_report.csv";

/// How a WARDNO cell reads
#[derive(Debug, Clone, PartialEq)]
pub enum WardReading {
    /// Null or blank
    Empty,
    /// Present but not a number; holds the printed value
    NonNumeric(String),
    /// Numeric value truncated toward zero
    Number(i64),
}

/// Classify a WARDNO value
pub fn classify_ward(value: &Value) -> WardReading {
    let number = match value {
        Value::Null => return WardReading::Empty,
        Value::Int(i) => return WardReading::Number(*i),
        Value::Float(f) => Some(*f),
        Value::Text(s) if s.trim().is_empty() => return WardReading::Empty,
        Value::Text(s) => s.trim().parse::<f64>().ok(),
    };
    match number {
        Some(f) if f.is_finite() => WardReading::Number(f.trunc() as i64),
        _ => WardReading::NonNumeric(value.to_string()),
    }
}

pub struct WardMismatch;

impl Validator for WardMismatch {
    fn id(&self) -> &'static str {
        "ward-mismatch"
    }

    fn name(&self) -> &'static str {
        "Ward Mismatch"
    }

    fn report_file(&self) -> &'static str {
        WARD_MISMATCH_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("WARD_MISMATCH");
        let mut report = CsvReport::new(
            ctx.report_path(WARD_MISMATCH_REPORT),
            &[
                "Source_File",
                "Parcel_Number",
                "Actual_Ward_No",
                "Input_Ward_No",
                "Error",
            ],
        );
        let mut summary = ValidationSummary::default();

        let visited = visit_collections(
            ctx,
            &["Parcel"],
            Some(GeometryKind::Polygon),
            &mut summary,
            |collection| {
                let name = file_name(&collection.container);
                let Some(code) = decode_ward(&name) else {
                    log_event_with_fields(
                        Event::ContainerSkipped,
                        &[("container", &name), ("reason", "ward number not decodable")],
                    );
                    return Ok(());
                };
                let expected = i64::from(code.ward);

                for row in ctx.engine.search(&collection.path, &["PARCELNO", "WARDNO"])? {
                    let (actual, error) = match classify_ward(row.get(1)) {
                        WardReading::Number(n) if n == expected => continue,
                        WardReading::Number(n) => (n.to_string(), "Mismatch detected".to_string()),
                        WardReading::Empty => ("N/A".to_string(), "Empty WARDNO".to_string()),
                        WardReading::NonNumeric(v) => {
                            ("N/A".to_string(), format!("Non-numeric WARDNO: {}", v))
                        }
                    };
                    report.push([
                        name.clone(),
                        row.get(0).to_string(),
                        actual,
                        expected.to_string(),
                        error,
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

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::config::Settings;
    use crate::engine::{FieldKind, MemoryEngine};
    use crate::report::RecordingStatus;
    use tempfile::TempDir;

    #[test]
    fn test_classify_ward() {
        assert_eq!(classify_ward(&Value::Null), WardReading::Empty);
        assert_eq!(classify_ward(&Value::from("  ")), WardReading::Empty);
        assert_eq!(classify_ward(&Value::Int(4)), WardReading::Number(4));
        assert_eq!(classify_ward(&Value::Float(5.9)), WardReading::Number(5));
        assert_eq!(classify_ward(&Value::from("5.0")), WardReading::Number(5));
        assert_eq!(
            classify_ward(&Value::from("IX")),
            WardReading::NonNumeric("IX".to_string())
        );
    }

    #[test]
    fn test_mismatches_and_defects_reported() {
        let tmp = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let fields = [("PARCELNO", FieldKind::Integer), ("WARDNO", FieldKind::Text)];
        let p = parcel_table(&engine, tmp.path(), "Kathmandu_Ward_9_ka.mdb", &fields);
        add(&engine, &p, &[("PARCELNO", Value::Int(1)), ("WARDNO", Value::from("9"))]);
        add(&engine, &p, &[("PARCELNO", Value::Int(2)), ("WARDNO", Value::from("9.0"))]);
        add(&engine, &p, &[("PARCELNO", Value::Int(3)), ("WARDNO", Value::from("8"))]);
        add(&engine, &p, &[("PARCELNO", Value::Int(4)), ("WARDNO", Value::Null)]);
        add(&engine, &p, &[("PARCELNO", Value::Int(5)), ("WARDNO", Value::from("nine"))]);

        let skipped = parcel_table(&engine, tmp.path(), "NoDigitsHere.mdb", &fields);
        add(&engine, &skipped, &[("PARCELNO", Value::Int(1)), ("WARDNO", Value::from("3"))]);

        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        let summary = WardMismatch.run(&ctx).unwrap();

        let lines = read_csv(&tmp.path().join(WARD_MISMATCH_REPORT));
        assert_eq!(summary.rows, 3);
        assert_eq!(
            &lines[1..],
            &[
                "Kathmandu_Ward_9_ka.mdb,3,8,9,Mismatch detected",
                "Kathmandu_Ward_9_ka.mdb,4,N/A,9,Empty WARDNO",
                "Kathmandu_Ward_9_ka.mdb,5,N/A,9,Non-numeric WARDNO: nine",
            ]
        );
    }
}
