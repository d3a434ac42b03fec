//! JSON fixtures for the in-memory engine
//!
//! A fixture describes one container (or one standalone dataset) as plain
//! JSON so test trees and demo runs can be laid out on disk:
//!
//! ```json
//! {
//!   "spatial_reference": "MUTM_84",
//!   "collections": {
//!     "Parcel": {
//!       "geometry": "Polygon",
//!       "fields": [{ "name": "PARCELNO", "kind": "Integer" }],
//!       "features": [{ "attributes": { "PARCELNO": 1 }, "envelope": [0, 0, 10, 10] }]
//!     }
//!   },
//!   "namespaces": {}
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{EngineError, EngineResult};
use super::types::{FieldInfo, GeometryKind, Value};

/// One container: root collections plus named namespaces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerFixture {
    #[serde(default)]
    pub spatial_reference: Option<String>,

    #[serde(default)]
    pub collections: BTreeMap<String, DatasetFixture>,

    #[serde(default)]
    pub namespaces: BTreeMap<String, BTreeMap<String, DatasetFixture>>,
}

/// One collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFixture {
    pub geometry: GeometryKind,

    #[serde(default)]
    pub fields: Vec<FieldInfo>,

    #[serde(default)]
    pub features: Vec<FeatureFixture>,
}

/// One feature; `envelope` is `[xmin, ymin, xmax, ymax]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFixture {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    #[serde(default)]
    pub envelope: Option<[f64; 4]>,
}

impl ContainerFixture {
    /// Parse a container fixture from disk
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Unreadable(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| EngineError::Unreadable(format!("{}: {}", path.display(), e)))
    }
}

impl DatasetFixture {
    /// Parse a standalone dataset fixture from disk
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Unreadable(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| EngineError::Unreadable(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FieldKind;

    #[test]
    fn test_parse_container_fixture() {
        let json = r#"{
            "collections": {
                "Parcel": {
                    "geometry": "Polygon",
                    "fields": [{"name": "PARCELNO", "kind": "Integer"}],
                    "features": [{"attributes": {"PARCELNO": 7}, "envelope": [0, 0, 1, 1]}]
                }
            },
            "namespaces": {"Cadastre": {}}
        }"#;
        let fixture: ContainerFixture = serde_json::from_str(json).unwrap();
        let parcel = &fixture.collections["Parcel"];
        assert_eq!(parcel.geometry, GeometryKind::Polygon);
        assert_eq!(parcel.fields[0].kind, FieldKind::Integer);
        assert_eq!(parcel.features[0].attributes["PARCELNO"], Value::Int(7));
        assert!(fixture.namespaces.contains_key("Cadastre"));
    }

    #[test]
    fn test_unreadable_fixture() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.mdb");
        std::fs::write(&path, "not json").unwrap();
        let err = ContainerFixture::from_path(&path).unwrap_err();
        assert_eq!(err.code(), "QC_ENGINE_UNREADABLE");
    }
}
