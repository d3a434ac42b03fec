//! Engine data types
//!
//! Addresses, attribute values and descriptions exchanged between the
//! validators and a spatial engine. Geometry payloads never cross this
//! boundary; the engine owns them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Field name the engine uses for frequency counts
pub const FREQUENCY_FIELD: &str = "FREQUENCY";

/// Topology error export fields
pub const ORIGIN_ID_FIELD: &str = "OriginObjectID";
pub const DESTINATION_ID_FIELD: &str = "DestinationObjectID";
pub const SHAPE_AREA_FIELD: &str = "Shape_Area";

/// Declared geometry kind of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Polygon,
    Polyline,
    None,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Polygon => "Polygon",
            GeometryKind::Polyline => "Polyline",
            GeometryKind::None => "None",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Oid,
    Geometry,
    Integer,
    Double,
    Text,
}

/// A named, typed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// True for plain attribute columns (not OID or geometry)
    pub fn is_attribute(&self) -> bool {
        !matches!(self.kind, FieldKind::Oid | FieldKind::Geometry)
    }
}

/// Result of describing a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub geometry: GeometryKind,
    pub fields: Vec<FieldInfo>,
}

impl Description {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// Where a dataset lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Workspace {
    /// A spatial-database container file
    Container(PathBuf),
    /// A plain directory holding standalone datasets (shapefile style)
    Folder(PathBuf),
    /// Engine-scoped scratch space
    Memory,
}

/// Fully qualified dataset address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetPath {
    pub workspace: Workspace,
    pub namespace: Option<String>,
    pub name: String,
}

impl DatasetPath {
    /// Collection inside a container, optionally inside a namespace
    pub fn in_container(
        container: impl Into<PathBuf>,
        namespace: Option<&str>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            workspace: Workspace::Container(container.into()),
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    /// Standalone dataset in a folder workspace
    pub fn in_folder(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            workspace: Workspace::Folder(dir.into()),
            namespace: None,
            name: name.into(),
        }
    }

    /// Split a file path into its folder workspace and dataset name
    pub fn from_file(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Some(Self::in_folder(dir, name))
    }

    /// Scratch dataset in engine memory
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            workspace: Workspace::Memory,
            namespace: None,
            name: name.into(),
        }
    }

    /// Owning container, if the dataset lives in one
    pub fn container(&self) -> Option<&Path> {
        match &self.workspace {
            Workspace::Container(p) => Some(p.as_path()),
            _ => None,
        }
    }

    /// Same dataset name, different namespace within the same workspace
    pub fn sibling(&self, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            workspace: self.workspace.clone(),
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = match &self.workspace {
            Workspace::Container(p) | Workspace::Folder(p) => p.clone(),
            Workspace::Memory => PathBuf::from("in_memory"),
        };
        if let Some(ns) = &self.namespace {
            path.push(ns);
        }
        path.push(&self.name);
        write!(f, "{}", path.display())
    }
}

/// An attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric zero in any representation ("0", 0, 0.0)
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.trim() == "0",
            Value::Null => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// One row returned by a search: the record's object id plus the
/// requested fields in request order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: i64,
    pub values: Vec<Value>,
}

impl Row {
    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }
}

/// Topology rules understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyRule {
    MustNotOverlap,
    MustNotHaveGaps,
}

impl TopologyRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopologyRule::MustNotOverlap => "Must Not Overlap (Area)",
            TopologyRule::MustNotHaveGaps => "Must Not Have Gaps (Area)",
        }
    }
}

/// Handle to a topology registered inside a container namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyHandle {
    pub container: PathBuf,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for TopologyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.container.join(&self.namespace).join(&self.name).display()
        )
    }
}
