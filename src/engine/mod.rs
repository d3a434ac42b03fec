//! Spatial engine boundary
//!
//! Validators never touch geometry. They drive a [`GeoEngine`] through a
//! small set of primitives (describe, search, frequency, intersect,
//! topology) and read the tabular results back.
//!
//! # Design Principles
//!
//! - No ambient "current workspace": every call names its dataset
//! - Temporary artifacts are owned by scoped guards
//! - Single-threaded; implementations may use interior mutability

mod errors;
mod fixture;
mod memory;
mod scoped;
mod types;

use std::path::Path;

pub use errors::{EngineError, EngineResult};
pub use fixture::{ContainerFixture, DatasetFixture, FeatureFixture};
pub use memory::{EngineOp, Envelope, MemoryEngine};
pub use scoped::{ScopedDataset, ScopedNamespace};
pub use types::{
    DatasetPath, Description, FieldInfo, FieldKind, GeometryKind, Row, TopologyHandle,
    TopologyRule, Value, Workspace, DESTINATION_ID_FIELD, FREQUENCY_FIELD, ORIGIN_ID_FIELD,
    SHAPE_AREA_FIELD,
};

/// Primitive operations a spatial engine provides to the validators
pub trait GeoEngine {
    /// Check whether a dataset exists
    fn exists(&self, dataset: &DatasetPath) -> bool;

    /// Named namespaces declared by a container (the implicit root is not listed)
    fn list_namespaces(&self, container: &Path) -> EngineResult<Vec<String>>;

    /// Collection names in a namespace, or at the container root for `None`
    fn list_collections(&self, container: &Path, namespace: Option<&str>)
        -> EngineResult<Vec<String>>;

    /// Geometry kind and fields of a dataset
    fn describe(&self, dataset: &DatasetPath) -> EngineResult<Description>;

    /// Read every record, projecting the named fields in order
    fn search(&self, dataset: &DatasetPath, fields: &[&str]) -> EngineResult<Vec<Row>>;

    /// Number of records in a dataset
    fn count(&self, dataset: &DatasetPath) -> EngineResult<u64>;

    /// Group by `fields` into a new table with a `FREQUENCY` column
    fn frequency(
        &self,
        input: &DatasetPath,
        output: &DatasetPath,
        fields: &[&str],
    ) -> EngineResult<()>;

    /// Intersect the inputs, keeping all attributes, into a new dataset
    fn intersect(&self, inputs: &[&DatasetPath], output: &DatasetPath) -> EngineResult<()>;

    /// Copy features from one dataset into a new one
    fn copy_features(&self, input: &DatasetPath, output: &DatasetPath) -> EngineResult<()>;

    /// Delete a dataset
    fn delete(&self, dataset: &DatasetPath) -> EngineResult<()>;

    /// Check whether a named namespace exists
    fn namespace_exists(&self, container: &Path, name: &str) -> bool;

    /// Create a namespace using the spatial reference of `reference`
    fn create_namespace(
        &self,
        container: &Path,
        name: &str,
        reference: &DatasetPath,
    ) -> EngineResult<()>;

    /// Delete a namespace and everything inside it
    fn delete_namespace(&self, container: &Path, name: &str) -> EngineResult<()>;

    /// Create an empty topology inside a namespace
    fn create_topology(
        &self,
        container: &Path,
        namespace: &str,
        name: &str,
        cluster_tolerance: f64,
    ) -> EngineResult<TopologyHandle>;

    /// Register a collection with a topology
    fn add_to_topology(&self, topology: &TopologyHandle, dataset: &DatasetPath)
        -> EngineResult<()>;

    /// Attach a rule to a registered collection
    fn add_topology_rule(
        &self,
        topology: &TopologyHandle,
        rule: TopologyRule,
        dataset: &DatasetPath,
    ) -> EngineResult<()>;

    /// Evaluate all rules
    fn validate_topology(&self, topology: &TopologyHandle) -> EngineResult<()>;

    /// Export polygon errors to `<basename>_poly` in the topology's namespace
    fn export_topology_errors(
        &self,
        topology: &TopologyHandle,
        basename: &str,
    ) -> EngineResult<DatasetPath>;
}
