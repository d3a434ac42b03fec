//! Run settings
//!
//! Settings come from an optional JSON file and are then overridden from
//! the command line. Every optional field has a default; `validate()` runs
//! once the final values are known.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{QcError, QcResult};

/// Map scale to the sheet-number prefix GRIDS1 must start with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Scale {
    S500,
    S600,
    S1200,
    S1250,
    S2400,
    S2500,
    S4800,
}

impl Scale {
    pub const ALL: [Scale; 7] = [
        Scale::S500,
        Scale::S600,
        Scale::S1200,
        Scale::S1250,
        Scale::S2400,
        Scale::S2500,
        Scale::S4800,
    ];

    pub fn denominator(&self) -> u32 {
        match self {
            Scale::S500 => 500,
            Scale::S600 => 600,
            Scale::S1200 => 1200,
            Scale::S1250 => 1250,
            Scale::S2400 => 2400,
            Scale::S2500 => 2500,
            Scale::S4800 => 4800,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Scale::S500 => "5554",
            Scale::S600 => "5553",
            Scale::S1200 => "5555",
            Scale::S1250 => "5556",
            Scale::S2400 => "5557",
            Scale::S2500 => "5558",
            Scale::S4800 => "5559",
        }
    }
}

impl TryFrom<u32> for Scale {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Scale::ALL
            .into_iter()
            .find(|s| s.denominator() == value)
            .ok_or_else(|| format!("unsupported scale 1:{}", value))
    }
}

impl From<Scale> for u32 {
    fn from(s: Scale) -> u32 {
        s.denominator()
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1:{}", self.denominator())
    }
}

/// Fields grouped on when looking for duplicate parcels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// `[PARCELNO]`
    ParcelNo,
    /// `[WARDNO, GRIDS1, PARCELNO]`
    #[default]
    Composite,
}

impl DuplicateKeyPolicy {
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            DuplicateKeyPolicy::ParcelNo => &["PARCELNO"],
            DuplicateKeyPolicy::Composite => &["WARDNO", "GRIDS1", "PARCELNO"],
        }
    }
}

/// Central meridians with a shipped grid-sheet template
pub const MERIDIANS: [u32; 3] = [81, 84, 87];

/// Settings for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory tree to scan (required)
    pub root: PathBuf,

    /// Case-insensitive path fragments to skip
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Map scale, required by the sheet-prefix check
    #[serde(default)]
    pub scale: Option<Scale>,

    /// Central meridian selecting `Gridsheet_<m>.shp` in `template_dir`
    #[serde(default)]
    pub meridian: Option<u32>,

    /// Folder holding the grid-sheet templates
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// Explicit grid-sheet template, overriding `meridian`
    #[serde(default)]
    pub grid_template: Option<PathBuf>,

    /// Topology cluster tolerance (must be > 0)
    #[serde(default = "default_cluster_tolerance")]
    pub cluster_tolerance: f64,

    /// Leave topology staging namespaces behind after the run
    #[serde(default)]
    pub keep_topology: bool,

    #[serde(default)]
    pub duplicate_key: DuplicateKeyPolicy,

    /// Prefix of the per-run topology staging namespace
    #[serde(default = "default_topology_prefix")]
    pub topology_prefix: String,

    /// Validator ids to run; empty runs all of them
    #[serde(default)]
    pub validators: Vec<String>,
}

fn default_exclusions() -> Vec<String> {
    vec!["merged".to_string()]
}
fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}
fn default_cluster_tolerance() -> f64 {
    0.001
}
fn default_topology_prefix() -> String {
    "Cadastre".to_string()
}

impl Settings {
    /// Settings with every optional field at its default
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclusions: default_exclusions(),
            scale: None,
            meridian: None,
            template_dir: default_template_dir(),
            grid_template: None,
            cluster_tolerance: default_cluster_tolerance(),
            keep_topology: false,
            duplicate_key: DuplicateKeyPolicy::default(),
            topology_prefix: default_topology_prefix(),
            validators: Vec::new(),
        }
    }

    /// Load settings from a JSON file and validate them
    pub fn load(path: &Path) -> QcResult<Self> {
        let settings = Self::from_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a JSON settings file without validating field values
    ///
    /// For callers that apply overrides before calling [`Self::validate`].
    pub fn from_file(path: &Path) -> QcResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            QcError::configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| QcError::configuration(format!("Invalid config JSON: {}", e)))?;
        Ok(settings)
    }

    /// Check field values; the root itself is checked by the scanner
    pub fn validate(&self) -> QcResult<()> {
        if !self.cluster_tolerance.is_finite() || self.cluster_tolerance <= 0.0 {
            return Err(QcError::configuration(format!(
                "cluster_tolerance must be > 0, got {}",
                self.cluster_tolerance
            )));
        }

        if let Some(m) = self.meridian {
            if !MERIDIANS.contains(&m) {
                return Err(QcError::configuration(format!(
                    "Invalid meridian: {}. Expected one of 81, 84, 87.",
                    m
                )));
            }
        }

        let prefix_ok = !self.topology_prefix.is_empty()
            && self
                .topology_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !prefix_ok {
            return Err(QcError::configuration(format!(
                "Invalid topology_prefix: '{}'",
                self.topology_prefix
            )));
        }

        if self.exclusions.iter().any(|e| e.trim().is_empty()) {
            return Err(QcError::configuration("exclusions must not contain empty entries"));
        }

        Ok(())
    }

    /// Scale, or a configuration error naming the check that needs it
    pub fn require_scale(&self) -> QcResult<Scale> {
        self.scale
            .ok_or_else(|| QcError::configuration("a map scale is required for the sheet prefix check"))
    }

    /// Resolve the grid-sheet template path
    pub fn grid_template_path(&self) -> QcResult<PathBuf> {
        if let Some(path) = &self.grid_template {
            return Ok(path.clone());
        }
        match self.meridian {
            Some(m) => Ok(self.template_dir.join(format!("Gridsheet_{}.shp", m))),
            None => Err(QcError::configuration(
                "a grid template or central meridian is required for the sheet number check",
            )),
        }
    }
}
