//! Cross-database overlap detection
//!
//! Every collection of interest is intersected with every collection from
//! a different container; pairs from the same container are never
//! compared. Quadratic in the number of collections.

use crate::discovery::{resolve, ResolvedCollection};
use crate::engine::ScopedDataset;
use crate::errors::{QcError, QcResult};
use crate::observability::ObservationScope;
use crate::report::CsvReport;

use super::{RunContext, ValidationSummary, Validator};

pub const OVERLAP_REPORT: &str = "overlap_report.csv";

const OVERLAP_COLLECTIONS: [&str; 3] = ["Parcel", "Construction", "Segments"];

pub struct FeatureOverlaps;

impl FeatureOverlaps {
    fn collect(
        &self,
        ctx: &RunContext<'_>,
        summary: &mut ValidationSummary,
    ) -> QcResult<Vec<ResolvedCollection>> {
        let containers = ctx.containers()?;
        if containers.len() < 2 {
            return Err(QcError::configuration(
                "Need at least 2 MDB files for overlap checking",
            ));
        }
        summary.containers = containers.len();

        let mut collections = Vec::new();
        for container in &containers {
            match resolve(ctx.engine, container, &OVERLAP_COLLECTIONS) {
                Ok(found) => collections.extend(found),
                Err(e) => ctx.item_failed(summary, &container.display().to_string(), &e),
            }
        }
        if collections.len() < 2 {
            return Err(QcError::configuration(
                "Not enough feature classes found for overlap checking",
            ));
        }
        Ok(collections)
    }
}

impl Validator for FeatureOverlaps {
    fn id(&self) -> &'static str {
        "feature-overlaps"
    }

    fn name(&self) -> &'static str {
        "Feature Overlaps"
    }

    fn report_file(&self) -> &'static str {
        OVERLAP_REPORT
    }

    fn run(&self, ctx: &RunContext<'_>) -> QcResult<ValidationSummary> {
        let scope = ObservationScope::new("FEATURE_OVERLAPS");
        let mut summary = ValidationSummary::default();
        let collections = match self.collect(ctx, &mut summary) {
            Ok(c) => c,
            Err(e) => {
                scope.fail(&e.to_string());
                return Err(e);
            }
        };

        let mut report = CsvReport::new(
            ctx.report_path(OVERLAP_REPORT),
            &["File1", "File2", "Overlap Count"],
        );

        for (i, first) in collections.iter().enumerate() {
            for second in &collections[i + 1..] {
                if first.container == second.container {
                    continue;
                }
                ctx.status.set(&format!(
                    "Checking {} vs {}",
                    first.container_name(),
                    second.container_name()
                ));

                let output = ScopedDataset::scratch(ctx.engine, "intersect");
                let counted = ctx
                    .engine
                    .intersect(&[&first.path, &second.path], output.path())
                    .and_then(|()| ctx.engine.count(output.path()));
                match counted {
                    Ok(0) => {}
                    Ok(count) => report.push([
                        first.path.to_string(),
                        second.path.to_string(),
                        count.to_string(),
                    ]),
                    Err(e) => ctx.item_failed(
                        &mut summary,
                        &format!("{} vs {}", first.path, second.path),
                        &e,
                    ),
                }
            }
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
    use crate::engine::{EngineOp, Envelope, FieldKind, GeometryKind, MemoryEngine, Value};
    use crate::report::RecordingStatus;
    use tempfile::TempDir;

    fn square(engine: &MemoryEngine, p: &crate::engine::DatasetPath, x: f64) {
        add_at(engine, p, &[("PARCELNO", Value::Int(1))], Envelope::new(x, 0.0, x + 10.0, 10.0));
    }

    #[test]
    fn test_single_overlap_across_containers() {
        let tmp = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let fields = [("PARCELNO", FieldKind::Integer)];
        let a = parcel_table(&engine, tmp.path(), "a.mdb", &fields);
        let b = parcel_table(&engine, tmp.path(), "b.mdb", &fields);
        square(&engine, &a, 0.0);
        square(&engine, &b, 5.0);
        // Overlaps within one container are not this check's concern
        let a2 = table(&engine, tmp.path(), "a.mdb", "Construction", GeometryKind::Polygon, &[]);
        add_at(&engine, &a2, &[], Envelope::new(100.0, 100.0, 101.0, 101.0));
        add_at(&engine, &a2, &[], Envelope::new(1.0, 1.0, 2.0, 2.0));

        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        let summary = FeatureOverlaps.run(&ctx).unwrap();

        let lines = read_csv(&tmp.path().join(OVERLAP_REPORT));
        assert_eq!(lines[0], "File1,File2,Overlap Count");
        assert_eq!(summary.rows, 1);
        assert!(lines[1].ends_with("b.mdb/Parcel,1"));
        assert!(lines[1].contains("a.mdb/Parcel,"));
        assert!(engine.memory_datasets().is_empty());
    }

    #[test]
    fn test_needs_two_containers() {
        let tmp = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        parcel_table(&engine, tmp.path(), "a.mdb", &[]);
        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        assert!(FeatureOverlaps.run(&ctx).unwrap_err().is_fatal());
    }

    #[test]
    fn test_failing_pair_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let engine = MemoryEngine::new();
        let fields = [("PARCELNO", FieldKind::Integer)];
        let a = parcel_table(&engine, tmp.path(), "a.mdb", &fields);
        let b = parcel_table(&engine, tmp.path(), "b.mdb", &fields);
        let c = parcel_table(&engine, tmp.path(), "c.mdb", &fields);
        square(&engine, &a, 0.0);
        square(&engine, &b, 5.0);
        square(&engine, &c, 8.0);
        engine.fail_on(EngineOp::Intersect, Some(&tmp.path().join("c.mdb")));

        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);
        let summary = FeatureOverlaps.run(&ctx).unwrap();
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.failures.len(), 2);
    }
}
