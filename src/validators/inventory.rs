//! Inventory checks: segment counts and the suspicious-parcel flag

use crate::engine::GeometryKind;
use crate::errors::QcResult;
use crate::observability::ObservationScope;
use crate::report::CsvReport;

use super::{visit_collections, RunContext, ValidationSummary, Validator};

pub const SEGMENT_COUNTS_REPORT: &str = "segment_counts_report.csv";
pub const SUSPICIOUS_COLUMN_REPORT: &str = "suspicious_column_report.csv";

const SUSPICIOUS_FIELD: &str = "suspicious";

/// Number of records in every Segments line collection
pub struct SegmentCounts;

impl Validator for SegmentCounts {
    fn id(&self) -> &'static str {
        "segment-counts"
    }

    fn name(&self) -> &'static str {
        "Segment Counts"
    }

    fn report_file(&self) -> &'static str {
        SEGMENT_COUNTS_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("SEGMENT_COUNTS");
        let mut report = CsvReport::new(
            ctx.report_path(SEGMENT_COUNTS_REPORT),
            &["Source File", "Feature Class", "Segments Count"],
        );
        let mut summary = ValidationSummary::default();

        let visited = visit_collections(
            ctx,
            &["Segments"],
            Some(GeometryKind::Polyline),
            &mut summary,
            |collection| {
                let count = ctx.engine.count(&collection.path)?;
                report.push([
                    collection.path.to_string(),
                    collection.name.clone(),
                    count.to_string(),
                ]);
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

fn is_flagged(raw: &str) -> bool {
    matches!(raw.trim().to_uppercase().as_str(), "YES" | "Y")
}

/// Parcels flagged YES/Y in the `suspicious` column
///
/// Unlike the other checks, a container that fails is also written to the
/// report as an `ERROR` row.
pub struct SuspiciousColumn;

impl Validator for SuspiciousColumn {
    fn id(&self) -> &'static str {
        "suspicious-column"
    }

    fn name(&self) -> &'static str {
        "Suspicious Column"
    }

    fn report_file(&self) -> &'static str {
        SUSPICIOUS_COLUMN_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("SUSPICIOUS_COLUMN");
        let mut report = CsvReport::new(
            ctx.report_path(SUSPICIOUS_COLUMN_REPORT),
            &["Source File", "Parcel Number", "Status", "Value"],
        );
        let mut summary = ValidationSummary::default();

        let visited = visit_collections(
            ctx,
            &["Parcel"],
            Some(GeometryKind::Polygon),
            &mut summary,
            |collection| {
                let source = collection.container.display().to_string();
                if !collection.has_field(SUSPICIOUS_FIELD) {
                    report.push([
                        source.as_str(),
                        "N/A",
                        "Column missing",
                        "suspicious column not found",
                    ]);
                    return Ok(());
                }
                let rows = match ctx
                    .engine
                    .search(&collection.path, &["PARCELNO", SUSPICIOUS_FIELD])
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        report.push([
                            source,
                            "ERROR".to_string(),
                            "Processing error".to_string(),
                            e.to_string(),
                        ]);
                        return Err(e.into());
                    }
                };
                for row in rows {
                    let raw = row.get(1).to_string();
                    if is_flagged(&raw) {
                        report.push([
                            source.clone(),
                            row.get(0).to_string(),
                            "Flagged as suspicious".to_string(),
                            raw,
                        ]);
                    }
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
    use crate::engine::{EngineOp, FieldKind, MemoryEngine, Value};
    use crate::report::RecordingStatus;
    use tempfile::TempDir;

    #[test]
    fn test_segment_counts() {
        let tmp = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let s = table(&engine, tmp.path(), "ward_1.mdb", "Segments", GeometryKind::Polyline, &[]);
        add(&engine, &s, &[]);
        add(&engine, &s, &[]);
        table(&engine, tmp.path(), "ward_2.mdb", "Segments", GeometryKind::Polyline, &[]);

        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        SegmentCounts.run(&ctx).unwrap();

        let lines = read_csv(&tmp.path().join(SEGMENT_COUNTS_REPORT));
        assert!(lines[1].ends_with("ward_1.mdb/Segments,Segments,2"));
        assert!(lines[2].ends_with("ward_2.mdb/Segments,Segments,0"));
    }

    #[test]
    fn test_is_flagged() {
        assert!(is_flagged("yes"));
        assert!(is_flagged(" Y "));
        assert!(!is_flagged("no"));
        assert!(!is_flagged(""));
    }

    #[test]
    fn test_suspicious_column_rows() {
        let tmp = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let fields = [("PARCELNO", FieldKind::Integer), ("suspicious", FieldKind::Text)];
        let a = parcel_table(&engine, tmp.path(), "a.mdb", &fields);
        add(&engine, &a, &[("PARCELNO", Value::Int(1)), ("suspicious", Value::from("yes"))]);
        add(&engine, &a, &[("PARCELNO", Value::Int(2)), ("suspicious", Value::from("no"))]);
        add(&engine, &a, &[("PARCELNO", Value::Int(3)), ("suspicious", Value::Null)]);
        parcel_table(&engine, tmp.path(), "b.mdb", &[("PARCELNO", FieldKind::Integer)]);
        parcel_table(&engine, tmp.path(), "c.mdb", &fields);
        engine.fail_on(EngineOp::Search, Some(&tmp.path().join("c.mdb")));

        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        let summary = SuspiciousColumn.run(&ctx).unwrap();

        let lines = read_csv(&tmp.path().join(SUSPICIOUS_COLUMN_REPORT));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("a.mdb,1,Flagged as suspicious,yes"));
        assert!(lines[2].ends_with("b.mdb,N/A,Column missing,suspicious column not found"));
        assert!(lines[3].contains("c.mdb,ERROR,Processing error,"));
        assert_eq!(summary.failures.len(), 1);
    }
}
