//! Validation suite
//!
//! Holds the registered validators in their fixed order and runs a selected
//! subset against one `RunContext`. A validator that fails is recorded and
//! the suite moves on to the next one.

use std::collections::HashSet;

use crate::errors::{QcError, QcResult};
use crate::observability::{log_event_with_fields, Event};
use crate::validators::{
    DuplicateChildren, DuplicateParcels, FeatureOverlaps, InvalidParcelNumbers,
    InvalidSheetNumbers, InvalidWardNumbers, RunContext, SegmentCounts, SheetNumberCheck,
    SmallAreas, SuspiciousColumn, TopologyOverlaps, ValidationSummary, Validator, WardMismatch,
};

/// Result of one validator within a suite run
#[derive(Debug)]
pub struct ValidatorOutcome {
    pub id: &'static str,
    pub name: &'static str,
    pub result: Result<ValidationSummary, QcError>,
}

impl ValidatorOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a suite run, in execution order
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub outcomes: Vec<ValidatorOutcome>,
}

impl SuiteReport {
    pub fn selected(&self) -> usize {
        self.outcomes.len()
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ValidatorOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// True when every selected validator completed
    pub fn all_completed(&self) -> bool {
        self.completed() == self.selected()
    }

    pub fn outcome(&self, id: &str) -> Option<&ValidatorOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }
}

/// Ordered validator registry
pub struct ValidationSuite {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidationSuite {
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }

    /// Every validator, in the order they run
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(DuplicateParcels),
            Box::new(DuplicateChildren),
            Box::new(SmallAreas),
            Box::new(InvalidSheetNumbers),
            Box::new(InvalidWardNumbers),
            Box::new(WardMismatch),
            Box::new(InvalidParcelNumbers),
            Box::new(FeatureOverlaps),
            Box::new(TopologyOverlaps),
            Box::new(SheetNumberCheck),
            Box::new(SegmentCounts),
            Box::new(SuspiciousColumn),
        ])
    }

    pub fn validators(&self) -> impl Iterator<Item = &dyn Validator> {
        self.validators.iter().map(|v| v.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.id()).collect()
    }

    /// Validators matching `selection`; an empty selection means all
    fn select(&self, selection: &[String]) -> QcResult<Vec<&dyn Validator>> {
        let known: HashSet<&str> = self.validators.iter().map(|v| v.id()).collect();
        if let Some(unknown) = selection.iter().find(|id| !known.contains(id.as_str())) {
            return Err(QcError::configuration(format!(
                "unknown validator '{}' (expected one of: {})",
                unknown,
                self.ids().join(", ")
            )));
        }
        Ok(self
            .validators()
            .filter(|v| selection.is_empty() || selection.iter().any(|id| id == v.id()))
            .collect())
    }

    /// Run the selected validators in registration order
    ///
    /// Only an invalid selection is an error; validator failures are
    /// recorded in the returned report.
    pub fn run(&self, ctx: &RunContext<'_>, selection: &[String]) -> QcResult<SuiteReport> {
        let selected = self.select(selection)?;
        let total = selected.len().to_string();
        log_event_with_fields(
            Event::RunStart,
            &[("root", &ctx.root().display().to_string()), ("validators", &total), ("token", ctx.run_token())],
        );

        let mut report = SuiteReport::default();
        for validator in selected {
            let name = validator.name();
            ctx.status.set(&format!("Running {}...", name));
            log_event_with_fields(Event::ValidatorStart, &[("validator", validator.id())]);

            let result = validator.run(ctx);
            match &result {
                Ok(summary) => {
                    ctx.status.set(&format!("Completed {}", name));
                    log_event_with_fields(
                        Event::ValidatorComplete,
                        &[
                            ("validator", validator.id()),
                            ("containers", &summary.containers.to_string()),
                            ("rows", &summary.rows.to_string()),
                            ("failures", &summary.failures.len().to_string()),
                        ],
                    );
                }
                Err(e) => {
                    ctx.status.set(&format!("Error in {}: {}", name, e));
                    log_event_with_fields(
                        Event::ValidatorFailed,
                        &[("validator", validator.id()), ("code", e.code()), ("error", &e.to_string())],
                    );
                }
            }
            report.outcomes.push(ValidatorOutcome {
                id: validator.id(),
                name,
                result,
            });
        }

        let completed = report.completed().to_string();
        ctx.status.set(&format!(
            "Completed {} of {} selected validations",
            completed, total
        ));
        log_event_with_fields(Event::RunComplete, &[("completed", &completed), ("selected", &total)]);
        Ok(report)
    }
}

impl Default for ValidationSuite {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::engine::{DatasetPath, FieldInfo, FieldKind, GeometryKind, MemoryEngine, Value};
    use crate::report::RecordingStatus;
    use tempfile::TempDir;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fixture(root: &std::path::Path) -> MemoryEngine {
        let engine = MemoryEngine::new();
        let container = root.join("ward_1.mdb");
        std::fs::write(&container, "").unwrap();
        let parcel = DatasetPath::in_container(&container, None, "Parcel");
        engine.insert_table(
            parcel.clone(),
            GeometryKind::Polygon,
            vec![
                FieldInfo::new("PARCELNO", FieldKind::Integer),
                FieldInfo::new("Shape_Area", FieldKind::Double),
            ],
        );
        engine
            .insert_feature(&parcel, &[("PARCELNO", Value::Int(1)), ("Shape_Area", Value::Float(2.0))], None)
            .unwrap();
        engine
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            ValidationSuite::standard().ids(),
            vec![
                "duplicate-parcels",
                "duplicate-children",
                "small-areas",
                "invalid-sheet",
                "invalid-ward",
                "ward-mismatch",
                "invalid-parcel-no",
                "feature-overlaps",
                "topology-overlaps",
                "sheet-number",
                "segment-counts",
                "suspicious-column",
            ]
        );
    }

    #[test]
    fn test_unknown_id_rejected_before_running() {
        let tmp = TempDir::new().unwrap();
        let engine = fixture(tmp.path());
        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);

        let err = ValidationSuite::standard()
            .run(&ctx, &ids(&["small-areas", "no-such-check"]))
            .unwrap_err();
        assert_eq!(err.code(), "QC_CONFIGURATION");
        assert!(status.messages().is_empty());
        assert!(!tmp.path().join("small_areas_report.csv").exists());
    }

    #[test]
    fn test_failed_validator_does_not_stop_suite() {
        let tmp = TempDir::new().unwrap();
        let engine = fixture(tmp.path());
        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);

        // invalid-sheet needs a scale, which is not set
        let report = ValidationSuite::standard()
            .run(&ctx, &ids(&["small-areas", "invalid-sheet"]))
            .unwrap();

        assert_eq!(report.selected(), 2);
        assert_eq!(report.completed(), 1);
        assert_eq!(report.outcomes[0].id, "small-areas");
        assert_eq!(report.outcome("small-areas").unwrap().result.as_ref().unwrap().rows, 1);
        assert_eq!(report.failed().next().unwrap().id, "invalid-sheet");

        let messages = status.messages();
        assert_eq!(messages.first().map(String::as_str), Some("Running Small Areas..."));
        assert!(messages.contains(&"Completed Small Areas".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("Error in Invalid Sheet Numbers:")));
        assert_eq!(status.last().as_deref(), Some("Completed 1 of 2 selected validations"));
    }

    #[test]
    fn test_selection_runs_in_registration_order() {
        let tmp = TempDir::new().unwrap();
        let engine = fixture(tmp.path());
        let settings = Settings::new(tmp.path());
        let status = RecordingStatus::new();
        let ctx = RunContext::new(&engine, &settings, &status);

        let report = ValidationSuite::standard()
            .run(&ctx, &ids(&["invalid-parcel-no", "duplicate-parcels"]))
            .unwrap();
        let order: Vec<_> = report.outcomes.iter().map(|o| o.id).collect();
        assert_eq!(order, vec!["duplicate-parcels", "invalid-parcel-no"]);
        assert!(report.all_completed());
    }
}
