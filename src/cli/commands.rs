//! CLI command implementations
//!
//! `run` builds the settings (config file first, flags on top), scans the
//! root with a fixture-backed engine and runs the selected validators.

use serde_json::{json, Value};

use crate::config::{Scale, Settings};
use crate::engine::MemoryEngine;
use crate::observability::{init_logging, log_event_with_fields, Event, LogFormat};
use crate::report::LogStatus;
use crate::suite::{SuiteReport, ValidationSuite};
use crate::validators::RunContext;
use crate::ward::{decode_ward, DecodeSource};

use super::args::{Cli, Command, RunArgs};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments, set up logging and dispatch
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_logging(cli.verbose, format);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run(args) => run_validations(&args),
        Command::List => write_response(list()),
        Command::DecodeWard { names } => write_response(decode(&names)),
    }
}

/// Final settings for a run
pub fn build_settings(args: &RunArgs) -> CliResult<Settings> {
    let mut settings = match (&args.config, &args.root) {
        (Some(path), _) => Settings::from_file(path)?,
        (None, Some(root)) => Settings::new(root),
        (None, None) => {
            return Err(CliError::config_error(
                "either --config or --root is required",
            ))
        }
    };

    if let Some(root) = &args.root {
        settings.root = root.clone();
    }
    if let Some(scale) = args.scale {
        settings.scale = Some(Scale::try_from(scale).map_err(CliError::config_error)?);
    }
    if let Some(meridian) = args.meridian {
        settings.meridian = Some(meridian);
    }
    if let Some(dir) = &args.template_dir {
        settings.template_dir = dir.clone();
    }
    if let Some(template) = &args.template {
        settings.grid_template = Some(template.clone());
    }
    if let Some(tolerance) = args.tolerance {
        settings.cluster_tolerance = tolerance;
    }
    if args.keep_topology {
        settings.keep_topology = true;
    }
    if let Some(policy) = args.duplicate_key {
        settings.duplicate_key = policy.into();
    }
    if !args.exclude.is_empty() {
        settings.exclusions = args.exclude.clone();
    }
    if !args.only.is_empty() {
        settings.validators = args.only.clone();
    }

    if let Err(e) = settings.validate() {
        log_event_with_fields(Event::ConfigRejected, &[("error", &e.to_string())]);
        return Err(e.into());
    }
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("root", &settings.root.display().to_string())],
    );
    Ok(settings)
}

/// Run the suite and print its outcome
pub fn run_validations(args: &RunArgs) -> CliResult<()> {
    let settings = build_settings(args)?;
    let engine = MemoryEngine::with_fixture_loading();
    let status = LogStatus;
    let ctx = RunContext::new(&engine, &settings, &status);

    let report = ValidationSuite::standard().run(&ctx, &settings.validators)?;
    write_response(summarize(&report))?;

    let failed = report.failed().count();
    if failed > 0 {
        return Err(CliError::incomplete(failed, report.selected()));
    }
    Ok(())
}

/// JSON view of a suite run
pub fn summarize(report: &SuiteReport) -> Value {
    let outcomes: Vec<Value> = report
        .outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(summary) => json!({
                "id": o.id,
                "name": o.name,
                "status": "completed",
                "containers": summary.containers,
                "rows": summary.rows,
                "reports": summary.reports,
                "failures": summary.failures,
            }),
            Err(e) => json!({
                "id": o.id,
                "name": o.name,
                "status": "failed",
                "code": e.code(),
                "error": e.to_string(),
            }),
        })
        .collect();
    json!({
        "selected": report.selected(),
        "completed": report.completed(),
        "validators": outcomes,
    })
}

/// Registered validators with their report files
pub fn list() -> Value {
    let suite = ValidationSuite::standard();
    let validators: Vec<Value> = suite
        .validators()
        .map(|v| json!({ "id": v.id(), "name": v.name(), "report": v.report_file() }))
        .collect();
    json!(validators)
}

/// Decoded ward per file name; undecodable names map to null
pub fn decode(names: &[String]) -> Value {
    let decoded: Vec<Value> = names
        .iter()
        .map(|name| match decode_ward(name) {
            Some(code) => json!({
                "file": name,
                "ward": code.ward,
                "zone": code.zone,
                "source": match code.source {
                    DecodeSource::Structured => "structured",
                    DecodeSource::DigitRun => "digit_run",
                },
            }),
            None => json!({ "file": name, "ward": null, "zone": null }),
        })
        .collect();
    json!(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::cli::errors::CliErrorCode;
    use crate::config::DuplicateKeyPolicy;
    use crate::cli::args::DuplicateKeyArg;

    #[test]
    fn test_build_settings_requires_root_or_config() {
        let err = build_settings(&RunArgs::default()).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_flags_override_config_file() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("qc.json");
        fs::write(&config, r#"{"root": "/from/config", "scale": 500, "exclusions": ["old"]}"#).unwrap();

        let args = RunArgs {
            config: Some(config),
            scale: Some(1200),
            duplicate_key: Some(DuplicateKeyArg::ParcelNo),
            exclude: vec!["merged".into(), "backup".into()],
            ..RunArgs::default()
        };
        let settings = build_settings(&args).unwrap();
        assert_eq!(settings.root, PathBuf::from("/from/config"));
        assert_eq!(settings.scale, Some(Scale::S1200));
        assert_eq!(settings.duplicate_key, DuplicateKeyPolicy::ParcelNo);
        assert_eq!(settings.exclusions, vec!["merged", "backup"]);
    }

    #[test]
    fn test_flag_repairs_invalid_config_value() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("qc.json");
        fs::write(&config, r#"{"root": "/from/config", "cluster_tolerance": 0}"#).unwrap();

        let args = RunArgs {
            config: Some(config.clone()),
            tolerance: Some(0.01),
            ..RunArgs::default()
        };
        let settings = build_settings(&args).unwrap();
        assert_eq!(settings.cluster_tolerance, 0.01);

        let args = RunArgs {
            config: Some(config),
            ..RunArgs::default()
        };
        assert_eq!(build_settings(&args).unwrap_err().code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_bad_scale_rejected() {
        let args = RunArgs {
            root: Some(PathBuf::from("/data")),
            scale: Some(1000),
            ..RunArgs::default()
        };
        assert_eq!(build_settings(&args).unwrap_err().code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_bad_tolerance_rejected() {
        let args = RunArgs {
            root: Some(PathBuf::from("/data")),
            tolerance: Some(0.0),
            ..RunArgs::default()
        };
        assert!(build_settings(&args).is_err());
    }

    #[test]
    fn test_list_has_every_validator() {
        let value = list();
        let ids: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids.len(), 12);
        assert_eq!(ids[0], "duplicate-parcels");
        assert_eq!(ids[11], "suspicious-column");
    }

    #[test]
    fn test_decode() {
        let value = decode(&["Kathmandu_Ward_9_ka.mdb".into(), "NoDigitsHere.mdb".into()]);
        assert_eq!(value[0]["ward"], 9);
        assert_eq!(value[0]["zone"], "01");
        assert_eq!(value[0]["source"], "structured");
        assert!(value[1]["ward"].is_null());
    }

    #[test]
    fn test_run_reports_incomplete_suite() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("ward_1.mdb"),
            r#"{"collections": {"Parcel": {"geometry": "Polygon",
                "fields": [{"name": "PARCELNO", "kind": "Integer"}],
                "features": [{"attributes": {"PARCELNO": 1}, "envelope": [0, 0, 10, 10]}]}}}"#,
        )
        .unwrap();
        let args = RunArgs {
            root: Some(tmp.path().to_path_buf()),
            only: vec!["invalid-parcel-no".into(), "invalid-sheet".into()],
            ..RunArgs::default()
        };
        let err = run_validations(&args).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::Incomplete);
        assert!(tmp.path().join("invalid_parcel_no_report.csv").exists());
    }
}
