//! In-process spatial engine
//!
//! Holds containers, namespaces and tables in memory. Geometry is reduced
//! to axis-aligned envelopes, which is enough to drive every primitive the
//! validators need (frequency, intersection, topology overlap errors).
//!
//! Containers can be inserted programmatically or, when created with
//! [`MemoryEngine::with_fixture_loading`], read lazily from JSON fixture
//! files the first time they are addressed.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::errors::{EngineError, EngineResult};
use super::fixture::{ContainerFixture, DatasetFixture};
use super::types::{
    DatasetPath, Description, FieldInfo, FieldKind, GeometryKind, Row, TopologyHandle,
    TopologyRule, Value, Workspace, DESTINATION_ID_FIELD, FREQUENCY_FIELD, ORIGIN_ID_FIELD,
    SHAPE_AREA_FIELD,
};
use super::GeoEngine;

const OID_FIELD: &str = "OBJECTID";
const SHAPE_FIELD: &str = "Shape";
const OID_TOKEN: &str = "OID@";
const DEFAULT_SPATIAL_REFERENCE: &str = "Unknown";

/// Axis-aligned bounding rectangle standing in for a geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Envelope {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.xmin <= self.xmax
            && self.ymin <= self.ymax
    }

    pub fn area(&self) -> f64 {
        (self.xmax - self.xmin) * (self.ymax - self.ymin)
    }

    /// Closed intersection; degenerate results are returned as-is
    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        let e = Envelope::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        );
        (e.xmin <= e.xmax && e.ymin <= e.ymax).then_some(e)
    }
}

impl From<[f64; 4]> for Envelope {
    fn from(v: [f64; 4]) -> Self {
        Envelope::new(v[0], v[1], v[2], v[3])
    }
}

/// Engine operations that can be made to fail for testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    Describe,
    Search,
    Count,
    Frequency,
    Intersect,
    CopyFeatures,
    CreateNamespace,
    CreateTopology,
    ValidateTopology,
    ExportTopologyErrors,
    Delete,
    DeleteNamespace,
}

impl EngineOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineOp::Describe => "Describe",
            EngineOp::Search => "Search",
            EngineOp::Count => "GetCount",
            EngineOp::Frequency => "Frequency",
            EngineOp::Intersect => "Intersect",
            EngineOp::CopyFeatures => "CopyFeatures",
            EngineOp::CreateNamespace => "CreateNamespace",
            EngineOp::CreateTopology => "CreateTopology",
            EngineOp::ValidateTopology => "ValidateTopology",
            EngineOp::ExportTopologyErrors => "ExportTopologyErrors",
            EngineOp::Delete => "Delete",
            EngineOp::DeleteNamespace => "DeleteNamespace",
        }
    }
}

#[derive(Debug, Clone)]
struct Feature {
    id: i64,
    values: Vec<Value>,
    shape: Option<Envelope>,
}

#[derive(Debug, Clone)]
struct Table {
    geometry: GeometryKind,
    fields: Vec<FieldInfo>,
    features: Vec<Feature>,
    spatial_reference: String,
}

enum Projection {
    Oid,
    Field(usize),
}

impl Table {
    fn new(geometry: GeometryKind, fields: Vec<FieldInfo>, spatial_reference: &str) -> Self {
        let mut all = vec![FieldInfo::new(OID_FIELD, FieldKind::Oid)];
        if geometry != GeometryKind::None {
            all.push(FieldInfo::new(SHAPE_FIELD, FieldKind::Geometry));
        }
        all.extend(fields.into_iter().filter(FieldInfo::is_attribute));
        Self {
            geometry,
            fields: all,
            features: Vec::new(),
            spatial_reference: spatial_reference.to_string(),
        }
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn next_id(&self) -> i64 {
        self.features.iter().map(|f| f.id).max().unwrap_or(0) + 1
    }

    /// Append a feature; `attributes` must name declared fields
    fn push(
        &mut self,
        id: Option<i64>,
        attributes: &[(String, Value)],
        shape: Option<Envelope>,
    ) -> Result<i64, String> {
        let id = id.unwrap_or_else(|| self.next_id());
        let mut values = vec![Value::Null; self.fields.len()];
        values[0] = Value::Int(id);
        for (name, value) in attributes {
            let idx = self
                .field_index(name)
                .ok_or_else(|| format!("undeclared field '{}'", name))?;
            values[idx] = value.clone();
        }
        self.features.push(Feature { id, values, shape });
        Ok(id)
    }

    fn projection(&self, dataset: &DatasetPath, fields: &[&str]) -> EngineResult<Vec<Projection>> {
        fields
            .iter()
            .map(|name| {
                if *name == OID_TOKEN {
                    return Ok(Projection::Oid);
                }
                self.field_index(name)
                    .map(Projection::Field)
                    .ok_or_else(|| EngineError::field_not_found(dataset.to_string(), *name))
            })
            .collect()
    }

    fn project(feature: &Feature, projection: &[Projection]) -> Vec<Value> {
        projection
            .iter()
            .map(|p| match p {
                Projection::Oid => Value::Int(feature.id),
                Projection::Field(i) => feature.values[*i].clone(),
            })
            .collect()
    }

    fn attribute_columns(&self) -> Vec<(usize, &FieldInfo)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_attribute())
            .collect()
    }

    fn from_fixture(fixture: &DatasetFixture, spatial_reference: &str) -> Result<Self, String> {
        let mut table = Table::new(fixture.geometry, fixture.fields.clone(), spatial_reference);
        for feature in &fixture.features {
            let attributes: Vec<(String, Value)> = feature
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            table.push(feature.id, &attributes, feature.envelope.map(Envelope::from))?;
        }
        Ok(table)
    }
}

#[derive(Debug, Clone)]
struct OverlapRecord {
    origin: i64,
    destination: i64,
    shape: Envelope,
    rule: TopologyRule,
}

#[derive(Debug, Default)]
struct TopologyState {
    tolerance: f64,
    members: Vec<String>,
    rules: Vec<(TopologyRule, String)>,
    errors: Option<Vec<OverlapRecord>>,
}

#[derive(Debug, Default)]
struct NamespaceState {
    spatial_reference: String,
    collections: BTreeMap<String, Table>,
    topologies: BTreeMap<String, TopologyState>,
}

#[derive(Debug, Default)]
struct ContainerState {
    spatial_reference: String,
    root: BTreeMap<String, Table>,
    namespaces: BTreeMap<String, NamespaceState>,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<PathBuf, ContainerState>,
    folders: BTreeMap<(PathBuf, String), Table>,
    memory: BTreeMap<String, Table>,
}

impl State {
    fn table(&self, path: &DatasetPath) -> Option<&Table> {
        match &path.workspace {
            Workspace::Container(c) => {
                let container = self.containers.get(c)?;
                match &path.namespace {
                    None => container.root.get(&path.name),
                    Some(ns) => container.namespaces.get(ns)?.collections.get(&path.name),
                }
            }
            Workspace::Folder(dir) => self.folders.get(&(dir.clone(), path.name.clone())),
            Workspace::Memory => self.memory.get(&path.name),
        }
    }

    fn require(&self, path: &DatasetPath) -> EngineResult<&Table> {
        self.table(path)
            .ok_or_else(|| EngineError::NotFound(path.to_string()))
    }

    fn slot(&mut self, path: &DatasetPath) -> EngineResult<&mut BTreeMap<String, Table>> {
        match &path.workspace {
            Workspace::Container(c) => {
                let container = self
                    .containers
                    .get_mut(c)
                    .ok_or_else(|| EngineError::NotFound(c.display().to_string()))?;
                match &path.namespace {
                    None => Ok(&mut container.root),
                    Some(ns) => container
                        .namespaces
                        .get_mut(ns)
                        .map(|n| &mut n.collections)
                        .ok_or_else(|| {
                            EngineError::NotFound(c.join(ns).display().to_string())
                        }),
                }
            }
            Workspace::Memory => Ok(&mut self.memory),
            Workspace::Folder(_) => Err(EngineError::operation(
                "Insert",
                path.to_string(),
                "folder datasets are not addressed through slots",
            )),
        }
    }

    fn insert(&mut self, path: &DatasetPath, table: Table) -> EngineResult<()> {
        if self.table(path).is_some() {
            return Err(EngineError::AlreadyExists(path.to_string()));
        }
        if let Workspace::Folder(dir) = &path.workspace {
            self.folders.insert((dir.clone(), path.name.clone()), table);
            return Ok(());
        }
        self.slot(path)?.insert(path.name.clone(), table);
        Ok(())
    }

    fn remove(&mut self, path: &DatasetPath) -> EngineResult<Table> {
        let removed = if let Workspace::Folder(dir) = &path.workspace {
            self.folders.remove(&(dir.clone(), path.name.clone()))
        } else {
            self.slot(path)?.remove(&path.name)
        };
        removed.ok_or_else(|| EngineError::NotFound(path.to_string()))
    }

    fn namespace_mut(&mut self, container: &Path, name: &str) -> EngineResult<&mut NamespaceState> {
        self.containers
            .get_mut(container)
            .and_then(|c| c.namespaces.get_mut(name))
            .ok_or_else(|| EngineError::NotFound(container.join(name).display().to_string()))
    }

    fn topology_mut(&mut self, handle: &TopologyHandle) -> EngineResult<&mut TopologyState> {
        self.namespace_mut(&handle.container, &handle.namespace)?
            .topologies
            .get_mut(&handle.name)
            .ok_or_else(|| EngineError::NotFound(handle.to_string()))
    }
}

/// In-memory [`GeoEngine`]
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: RefCell<State>,
    failures: RefCell<Vec<(EngineOp, Option<PathBuf>)>>,
    load_fixtures: bool,
}

impl MemoryEngine {
    /// Empty engine; containers must be inserted explicitly
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that reads unknown containers and folder datasets from JSON
    /// fixture files on first access
    pub fn with_fixture_loading() -> Self {
        Self {
            load_fixtures: true,
            ..Self::default()
        }
    }

    /// Make `op` fail, for every container or only for `container`
    pub fn fail_on(&self, op: EngineOp, container: Option<&Path>) {
        self.failures
            .borrow_mut()
            .push((op, container.map(Path::to_path_buf)));
    }

    /// Register an empty container
    pub fn insert_container(&self, path: impl Into<PathBuf>, spatial_reference: &str) {
        self.state
            .borrow_mut()
            .containers
            .entry(path.into())
            .or_insert_with(|| ContainerState {
                spatial_reference: spatial_reference.to_string(),
                ..ContainerState::default()
            });
    }

    /// Register a container from a fixture
    pub fn load_container(&self, path: &Path, fixture: &ContainerFixture) -> EngineResult<()> {
        let sr = fixture
            .spatial_reference
            .clone()
            .unwrap_or_else(|| DEFAULT_SPATIAL_REFERENCE.to_string());
        let unreadable = |e: String| EngineError::Unreadable(format!("{}: {}", path.display(), e));

        let mut container = ContainerState {
            spatial_reference: sr.clone(),
            ..ContainerState::default()
        };
        for (name, dataset) in &fixture.collections {
            container
                .root
                .insert(name.clone(), Table::from_fixture(dataset, &sr).map_err(unreadable)?);
        }
        for (ns, collections) in &fixture.namespaces {
            let mut namespace = NamespaceState {
                spatial_reference: sr.clone(),
                ..NamespaceState::default()
            };
            for (name, dataset) in collections {
                namespace
                    .collections
                    .insert(name.clone(), Table::from_fixture(dataset, &sr).map_err(unreadable)?);
            }
            container.namespaces.insert(ns.clone(), namespace);
        }
        self.state
            .borrow_mut()
            .containers
            .insert(path.to_path_buf(), container);
        Ok(())
    }

    /// Register an empty table, creating its container and namespace as needed
    pub fn insert_table(&self, path: DatasetPath, geometry: GeometryKind, fields: Vec<FieldInfo>) {
        let mut state = self.state.borrow_mut();
        let sr = match &path.workspace {
            Workspace::Container(c) => {
                let container = state.containers.entry(c.clone()).or_insert_with(|| {
                    ContainerState {
                        spatial_reference: DEFAULT_SPATIAL_REFERENCE.to_string(),
                        ..ContainerState::default()
                    }
                });
                let sr = container.spatial_reference.clone();
                if let Some(ns) = &path.namespace {
                    container
                        .namespaces
                        .entry(ns.clone())
                        .or_insert_with(|| NamespaceState {
                            spatial_reference: sr.clone(),
                            ..NamespaceState::default()
                        });
                }
                sr
            }
            _ => DEFAULT_SPATIAL_REFERENCE.to_string(),
        };
        let table = Table::new(geometry, fields, &sr);
        match &path.workspace {
            Workspace::Folder(dir) => {
                state.folders.insert((dir.clone(), path.name.clone()), table);
            }
            _ => {
                if let Ok(slot) = state.slot(&path) {
                    slot.insert(path.name.clone(), table);
                }
            }
        }
    }

    /// Append a feature to an existing table, returning its object id
    pub fn insert_feature(
        &self,
        path: &DatasetPath,
        attributes: &[(&str, Value)],
        shape: Option<Envelope>,
    ) -> EngineResult<i64> {
        let attributes: Vec<(String, Value)> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let mut state = self.state.borrow_mut();
        let table = match &path.workspace {
            Workspace::Folder(dir) => state.folders.get_mut(&(dir.clone(), path.name.clone())),
            _ => state.slot(path)?.get_mut(&path.name),
        }
        .ok_or_else(|| EngineError::NotFound(path.to_string()))?;
        table
            .push(None, &attributes, shape)
            .map_err(|e| EngineError::operation("Insert", path.to_string(), e))
    }

    /// Names of scratch datasets currently held in engine memory
    pub fn memory_datasets(&self) -> Vec<String> {
        self.state.borrow().memory.keys().cloned().collect()
    }

    fn ensure_loaded(&self, path: &DatasetPath) -> EngineResult<()> {
        match &path.workspace {
            Workspace::Container(c) => self.ensure_container(c),
            Workspace::Folder(dir) => {
                if !self.load_fixtures
                    || self
                        .state
                        .borrow()
                        .folders
                        .contains_key(&(dir.clone(), path.name.clone()))
                {
                    return Ok(());
                }
                let file = dir.join(&path.name);
                if !file.is_file() {
                    return Ok(());
                }
                let fixture = DatasetFixture::from_path(&file)?;
                let table = Table::from_fixture(&fixture, DEFAULT_SPATIAL_REFERENCE)
                    .map_err(|e| EngineError::Unreadable(format!("{}: {}", file.display(), e)))?;
                self.state
                    .borrow_mut()
                    .folders
                    .insert((dir.clone(), path.name.clone()), table);
                Ok(())
            }
            Workspace::Memory => Ok(()),
        }
    }

    fn ensure_container(&self, container: &Path) -> EngineResult<()> {
        if !self.load_fixtures || self.state.borrow().containers.contains_key(container) {
            return Ok(());
        }
        if !container.is_file() {
            return Ok(());
        }
        let fixture = ContainerFixture::from_path(container)?;
        self.load_container(container, &fixture)
    }

    fn check(&self, op: EngineOp, target: &str, containers: &[Option<&Path>]) -> EngineResult<()> {
        let failures = self.failures.borrow();
        let hit = failures.iter().any(|(failing_op, failing_container)| {
            *failing_op == op
                && match failing_container {
                    None => true,
                    Some(fc) => containers.iter().any(|c| *c == Some(fc.as_path())),
                }
        });
        if hit {
            return Err(EngineError::operation(op.as_str(), target, "injected failure"));
        }
        Ok(())
    }
}

fn unique_field_name(existing: &[FieldInfo], name: &str) -> String {
    if !existing.iter().any(|f| f.name == name) {
        return name.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", name, n);
        if !existing.iter().any(|f| f.name == candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl GeoEngine for MemoryEngine {
    fn exists(&self, dataset: &DatasetPath) -> bool {
        if self.ensure_loaded(dataset).is_err() {
            return false;
        }
        self.state.borrow().table(dataset).is_some()
    }

    fn list_namespaces(&self, container: &Path) -> EngineResult<Vec<String>> {
        self.ensure_container(container)?;
        let state = self.state.borrow();
        let c = state
            .containers
            .get(container)
            .ok_or_else(|| EngineError::NotFound(container.display().to_string()))?;
        Ok(c.namespaces.keys().cloned().collect())
    }

    fn list_collections(
        &self,
        container: &Path,
        namespace: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        self.ensure_container(container)?;
        let state = self.state.borrow();
        let c = state
            .containers
            .get(container)
            .ok_or_else(|| EngineError::NotFound(container.display().to_string()))?;
        match namespace {
            None => Ok(c.root.keys().cloned().collect()),
            Some(ns) => c
                .namespaces
                .get(ns)
                .map(|n| n.collections.keys().cloned().collect())
                .ok_or_else(|| EngineError::NotFound(container.join(ns).display().to_string())),
        }
    }

    fn describe(&self, dataset: &DatasetPath) -> EngineResult<Description> {
        self.ensure_loaded(dataset)?;
        self.check(EngineOp::Describe, &dataset.to_string(), &[dataset.container()])?;
        let state = self.state.borrow();
        let table = state.require(dataset)?;
        Ok(Description {
            geometry: table.geometry,
            fields: table.fields.clone(),
        })
    }

    fn search(&self, dataset: &DatasetPath, fields: &[&str]) -> EngineResult<Vec<Row>> {
        self.ensure_loaded(dataset)?;
        self.check(EngineOp::Search, &dataset.to_string(), &[dataset.container()])?;
        let state = self.state.borrow();
        let table = state.require(dataset)?;
        let projection = table.projection(dataset, fields)?;
        Ok(table
            .features
            .iter()
            .map(|f| Row {
                id: f.id,
                values: Table::project(f, &projection),
            })
            .collect())
    }

    fn count(&self, dataset: &DatasetPath) -> EngineResult<u64> {
        self.ensure_loaded(dataset)?;
        self.check(EngineOp::Count, &dataset.to_string(), &[dataset.container()])?;
        let state = self.state.borrow();
        Ok(state.require(dataset)?.features.len() as u64)
    }

    fn frequency(
        &self,
        input: &DatasetPath,
        output: &DatasetPath,
        fields: &[&str],
    ) -> EngineResult<()> {
        self.ensure_loaded(input)?;
        self.check(EngineOp::Frequency, &input.to_string(), &[input.container()])?;
        let mut state = self.state.borrow_mut();
        let table = state.require(input)?;
        let projection = table.projection(input, fields)?;

        // Debug keys keep Int(1) and Text("1") in separate groups
        let mut groups: BTreeMap<Vec<String>, (Vec<Value>, i64)> = BTreeMap::new();
        for feature in &table.features {
            let values = Table::project(feature, &projection);
            let key: Vec<String> = values
                .iter()
                .map(|v| format!("{:?}", v))
                .collect();
            groups.entry(key).or_insert_with(|| (values, 0)).1 += 1;
        }

        let mut out_fields = vec![FieldInfo::new(FREQUENCY_FIELD, FieldKind::Integer)];
        for (name, p) in fields.iter().zip(&projection) {
            let kind = match p {
                Projection::Oid => FieldKind::Integer,
                Projection::Field(i) => table.fields[*i].kind,
            };
            out_fields.push(FieldInfo::new(*name, kind));
        }
        let mut result = Table::new(GeometryKind::None, out_fields, &table.spatial_reference);
        for (values, count) in groups.into_values() {
            let mut attributes = vec![(FREQUENCY_FIELD.to_string(), Value::Int(count))];
            attributes.extend(fields.iter().map(|f| f.to_string()).zip(values));
            result
                .push(None, &attributes, None)
                .map_err(|e| EngineError::operation("Frequency", input.to_string(), e))?;
        }
        state.insert(output, result)
    }

    fn intersect(&self, inputs: &[&DatasetPath], output: &DatasetPath) -> EngineResult<()> {
        for input in inputs {
            self.ensure_loaded(input)?;
        }
        let target = inputs
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(";");
        let containers: Vec<Option<&Path>> = inputs.iter().map(|p| p.container()).collect();
        self.check(EngineOp::Intersect, &target, &containers)?;
        if inputs.len() < 2 {
            return Err(EngineError::operation(
                "Intersect",
                target,
                "at least two inputs are required",
            ));
        }

        let mut state = self.state.borrow_mut();
        let tables: Vec<&Table> = inputs
            .iter()
            .map(|p| state.require(p))
            .collect::<EngineResult<_>>()?;
        if tables.iter().any(|t| t.geometry == GeometryKind::None) {
            return Err(EngineError::operation(
                "Intersect",
                target,
                "inputs must have geometry",
            ));
        }
        let all_polygons = tables.iter().all(|t| t.geometry == GeometryKind::Polygon);
        let geometry = if all_polygons {
            GeometryKind::Polygon
        } else {
            GeometryKind::Polyline
        };

        // Output schema: FID_<name> followed by each input's attributes
        let mut out_fields: Vec<FieldInfo> = Vec::new();
        let mut columns: Vec<Vec<(usize, String)>> = Vec::new();
        let mut fid_names: Vec<String> = Vec::new();
        for (input, table) in inputs.iter().zip(&tables) {
            let fid = unique_field_name(&out_fields, &format!("FID_{}", input.name));
            out_fields.push(FieldInfo::new(fid.clone(), FieldKind::Integer));
            fid_names.push(fid);
            let mut cols = Vec::new();
            for (idx, field) in table.attribute_columns() {
                let name = unique_field_name(&out_fields, &field.name);
                out_fields.push(FieldInfo::new(name.clone(), field.kind));
                cols.push((idx, name));
            }
            columns.push(cols);
        }

        let mut partial: Vec<(Envelope, Vec<(String, Value)>)> = vec![];
        for (n, table) in tables.iter().enumerate() {
            let mut next = Vec::new();
            for feature in &table.features {
                let Some(shape) = feature.shape else { continue };
                let mut attrs = vec![(fid_names[n].clone(), Value::Int(feature.id))];
                attrs.extend(
                    columns[n]
                        .iter()
                        .map(|(idx, name)| (name.clone(), feature.values[*idx].clone())),
                );
                if n == 0 {
                    next.push((shape, attrs));
                    continue;
                }
                for (acc_shape, acc_attrs) in &partial {
                    let Some(inter) = acc_shape.intersection(&shape) else { continue };
                    if all_polygons && inter.area() <= 0.0 {
                        continue;
                    }
                    let mut merged = acc_attrs.clone();
                    merged.extend(attrs.iter().cloned());
                    next.push((inter, merged));
                }
            }
            partial = next;
        }

        let mut result = Table::new(geometry, out_fields, &tables[0].spatial_reference);
        for (shape, attrs) in partial {
            result
                .push(None, &attrs, Some(shape))
                .map_err(|e| EngineError::operation("Intersect", target.clone(), e))?;
        }
        state.insert(output, result)
    }

    fn copy_features(&self, input: &DatasetPath, output: &DatasetPath) -> EngineResult<()> {
        self.ensure_loaded(input)?;
        self.check(EngineOp::CopyFeatures, &input.to_string(), &[input.container()])?;
        let mut state = self.state.borrow_mut();
        let mut table = state.require(input)?.clone();
        if let Workspace::Container(c) = &output.workspace {
            if let Some(ns) = &output.namespace {
                if let Some(n) = state.containers.get(c).and_then(|c| c.namespaces.get(ns)) {
                    table.spatial_reference = n.spatial_reference.clone();
                }
            }
        }
        state.insert(output, table)
    }

    fn delete(&self, dataset: &DatasetPath) -> EngineResult<()> {
        self.check(EngineOp::Delete, &dataset.to_string(), &[dataset.container()])?;
        self.state.borrow_mut().remove(dataset).map(|_| ())
    }

    fn namespace_exists(&self, container: &Path, name: &str) -> bool {
        if self.ensure_container(container).is_err() {
            return false;
        }
        self.state
            .borrow()
            .containers
            .get(container)
            .is_some_and(|c| c.namespaces.contains_key(name))
    }

    fn create_namespace(
        &self,
        container: &Path,
        name: &str,
        reference: &DatasetPath,
    ) -> EngineResult<()> {
        self.ensure_container(container)?;
        let target = container.join(name).display().to_string();
        self.check(EngineOp::CreateNamespace, &target, &[Some(container)])?;
        let mut state = self.state.borrow_mut();
        let sr = state.require(reference)?.spatial_reference.clone();
        let c = state
            .containers
            .get_mut(container)
            .ok_or_else(|| EngineError::NotFound(container.display().to_string()))?;
        if c.namespaces.contains_key(name) {
            return Err(EngineError::AlreadyExists(target));
        }
        c.namespaces.insert(
            name.to_string(),
            NamespaceState {
                spatial_reference: sr,
                ..NamespaceState::default()
            },
        );
        Ok(())
    }

    fn delete_namespace(&self, container: &Path, name: &str) -> EngineResult<()> {
        let target = container.join(name).display().to_string();
        self.check(EngineOp::DeleteNamespace, &target, &[Some(container)])?;
        let mut state = self.state.borrow_mut();
        state
            .containers
            .get_mut(container)
            .and_then(|c| c.namespaces.remove(name))
            .map(|_| ())
            .ok_or(EngineError::NotFound(target))
    }

    fn create_topology(
        &self,
        container: &Path,
        namespace: &str,
        name: &str,
        cluster_tolerance: f64,
    ) -> EngineResult<TopologyHandle> {
        let handle = TopologyHandle {
            container: container.to_path_buf(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.check(EngineOp::CreateTopology, &handle.to_string(), &[Some(container)])?;
        if !cluster_tolerance.is_finite() || cluster_tolerance <= 0.0 {
            return Err(EngineError::InvalidTolerance(cluster_tolerance));
        }
        let mut state = self.state.borrow_mut();
        let ns = state.namespace_mut(container, namespace)?;
        if ns.topologies.contains_key(name) {
            return Err(EngineError::AlreadyExists(handle.to_string()));
        }
        ns.topologies.insert(
            name.to_string(),
            TopologyState {
                tolerance: cluster_tolerance,
                ..TopologyState::default()
            },
        );
        Ok(handle)
    }

    fn add_to_topology(
        &self,
        topology: &TopologyHandle,
        dataset: &DatasetPath,
    ) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        let in_namespace = dataset.container() == Some(topology.container.as_path())
            && dataset.namespace.as_deref() == Some(topology.namespace.as_str());
        if !in_namespace {
            return Err(EngineError::operation(
                "AddFeatureClassToTopology",
                dataset.to_string(),
                "feature class must live in the topology's namespace",
            ));
        }
        let geometry = state.require(dataset)?.geometry;
        if geometry != GeometryKind::Polygon {
            return Err(EngineError::operation(
                "AddFeatureClassToTopology",
                dataset.to_string(),
                format!("unsupported geometry {}", geometry),
            ));
        }
        let topo = state.topology_mut(topology)?;
        if !topo.members.contains(&dataset.name) {
            topo.members.push(dataset.name.clone());
        }
        Ok(())
    }

    fn add_topology_rule(
        &self,
        topology: &TopologyHandle,
        rule: TopologyRule,
        dataset: &DatasetPath,
    ) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        let topo = state.topology_mut(topology)?;
        if !topo.members.contains(&dataset.name) {
            return Err(EngineError::operation(
                "AddRuleToTopology",
                dataset.to_string(),
                "feature class is not part of the topology",
            ));
        }
        topo.rules.push((rule, dataset.name.clone()));
        Ok(())
    }

    fn validate_topology(&self, topology: &TopologyHandle) -> EngineResult<()> {
        self.check(
            EngineOp::ValidateTopology,
            &topology.to_string(),
            &[Some(topology.container.as_path())],
        )?;
        let mut state = self.state.borrow_mut();
        let ns = state.namespace_mut(&topology.container, &topology.namespace)?;
        let topo = ns
            .topologies
            .get(&topology.name)
            .ok_or_else(|| EngineError::NotFound(topology.to_string()))?;

        let mut errors = Vec::new();
        for (rule, member) in &topo.rules {
            // Gap errors are line errors and never reach the polygon export
            if *rule != TopologyRule::MustNotOverlap {
                continue;
            }
            let table = ns
                .collections
                .get(member)
                .ok_or_else(|| EngineError::NotFound(member.clone()))?;
            let shapes: Vec<(i64, Envelope)> = table
                .features
                .iter()
                .filter_map(|f| f.shape.map(|s| (f.id, s)))
                .collect();
            if let Some((id, _)) = shapes.iter().find(|(_, s)| !s.is_valid()) {
                return Err(EngineError::InvalidGeometry(format!(
                    "{} (OID {})",
                    member, id
                )));
            }
            for (i, (a_id, a)) in shapes.iter().enumerate() {
                for (b_id, b) in &shapes[i + 1..] {
                    let Some(inter) = a.intersection(b) else { continue };
                    if inter.area() > topo.tolerance * topo.tolerance {
                        errors.push(OverlapRecord {
                            origin: *a_id,
                            destination: *b_id,
                            shape: inter,
                            rule: *rule,
                        });
                    }
                }
            }
        }

        if let Some(topo) = ns.topologies.get_mut(&topology.name) {
            topo.errors = Some(errors);
        }
        Ok(())
    }

    fn export_topology_errors(
        &self,
        topology: &TopologyHandle,
        basename: &str,
    ) -> EngineResult<DatasetPath> {
        self.check(
            EngineOp::ExportTopologyErrors,
            &topology.to_string(),
            &[Some(topology.container.as_path())],
        )?;
        let mut state = self.state.borrow_mut();
        let ns = state.namespace_mut(&topology.container, &topology.namespace)?;
        let topo = ns
            .topologies
            .get(&topology.name)
            .ok_or_else(|| EngineError::NotFound(topology.to_string()))?;
        let errors = topo.errors.clone().ok_or_else(|| {
            EngineError::operation(
                "ExportTopologyErrors",
                topology.to_string(),
                "topology has not been validated",
            )
        })?;

        let fields = vec![
            FieldInfo::new("RuleDescription", FieldKind::Text),
            FieldInfo::new(ORIGIN_ID_FIELD, FieldKind::Integer),
            FieldInfo::new(DESTINATION_ID_FIELD, FieldKind::Integer),
            FieldInfo::new(SHAPE_AREA_FIELD, FieldKind::Double),
        ];
        let mut table = Table::new(GeometryKind::Polygon, fields, &ns.spatial_reference);
        for error in errors {
            let attributes = vec![
                ("RuleDescription".to_string(), Value::from(error.rule.as_str())),
                (ORIGIN_ID_FIELD.to_string(), Value::Int(error.origin)),
                (DESTINATION_ID_FIELD.to_string(), Value::Int(error.destination)),
                (SHAPE_AREA_FIELD.to_string(), Value::Float(error.shape.area())),
            ];
            table
                .push(None, &attributes, Some(error.shape))
                .map_err(|e| EngineError::operation("ExportTopologyErrors", topology.to_string(), e))?;
        }

        let name = format!("{}_poly", basename);
        if ns.collections.contains_key(&name) {
            return Err(EngineError::AlreadyExists(name));
        }
        ns.collections.insert(name.clone(), table);
        Ok(DatasetPath::in_container(
            &topology.container,
            Some(&topology.namespace),
            name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcel_path() -> DatasetPath {
        DatasetPath::in_container("a.mdb", None, "Parcel")
    }

    fn engine_with_parcels(rows: &[(i64, Envelope)]) -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.insert_table(
            parcel_path(),
            GeometryKind::Polygon,
            vec![FieldInfo::new("PARCELNO", FieldKind::Integer)],
        );
        for (no, env) in rows {
            engine
                .insert_feature(&parcel_path(), &[("PARCELNO", Value::Int(*no))], Some(*env))
                .unwrap();
        }
        engine
    }

    #[test]
    fn test_describe_includes_oid_and_shape() {
        let engine = engine_with_parcels(&[]);
        let d = engine.describe(&parcel_path()).unwrap();
        assert_eq!(d.geometry, GeometryKind::Polygon);
        assert_eq!(d.field_names(), vec!["OBJECTID", "Shape", "PARCELNO"]);
    }

    #[test]
    fn test_search_unknown_field() {
        let engine = engine_with_parcels(&[]);
        let err = engine.search(&parcel_path(), &["NOPE"]).unwrap_err();
        assert_eq!(err.code(), "QC_ENGINE_FIELD_NOT_FOUND");
    }

    #[test]
    fn test_frequency_groups() {
        let e = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let engine = engine_with_parcels(&[(1, e), (1, e), (2, e)]);
        let out = DatasetPath::in_memory("freq");
        engine.frequency(&parcel_path(), &out, &["PARCELNO"]).unwrap();
        let rows = engine.search(&out, &["PARCELNO", FREQUENCY_FIELD]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(rows[1].values, vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_intersect_names_fid_columns_and_renames_collisions() {
        let engine = engine_with_parcels(&[(1, Envelope::new(0.0, 0.0, 10.0, 10.0))]);
        let other = DatasetPath::in_container("b.mdb", None, "Parcel");
        engine.insert_table(
            other.clone(),
            GeometryKind::Polygon,
            vec![FieldInfo::new("PARCELNO", FieldKind::Integer)],
        );
        engine
            .insert_feature(&other, &[("PARCELNO", Value::Int(9))], Some(Envelope::new(5.0, 5.0, 15.0, 15.0)))
            .unwrap();
        let out = DatasetPath::in_memory("x");
        engine.intersect(&[&parcel_path(), &other], &out).unwrap();
        let names = engine.describe(&out).unwrap().field_names();
        assert!(names.contains(&"FID_Parcel".to_string()));
        assert!(names.contains(&"FID_Parcel_1".to_string()));
        assert!(names.contains(&"PARCELNO_1".to_string()));
        assert_eq!(engine.count(&out).unwrap(), 1);
    }

    #[test]
    fn test_touching_polygons_do_not_intersect() {
        let engine = engine_with_parcels(&[(1, Envelope::new(0.0, 0.0, 10.0, 10.0))]);
        let other = DatasetPath::in_container("b.mdb", None, "Parcel");
        engine.insert_table(other.clone(), GeometryKind::Polygon, vec![]);
        engine
            .insert_feature(&other, &[], Some(Envelope::new(10.0, 0.0, 20.0, 10.0)))
            .unwrap();
        let out = DatasetPath::in_memory("x");
        engine.intersect(&[&parcel_path(), &other], &out).unwrap();
        assert_eq!(engine.count(&out).unwrap(), 0);
    }

    #[test]
    fn test_topology_reports_overlapping_pairs() {
        let engine = engine_with_parcels(&[
            (1, Envelope::new(0.0, 0.0, 10.0, 10.0)),
            (2, Envelope::new(8.0, 0.0, 18.0, 10.0)),
            (3, Envelope::new(30.0, 0.0, 40.0, 10.0)),
        ]);
        let container = Path::new("a.mdb");
        engine.create_namespace(container, "Stage", &parcel_path()).unwrap();
        let staged = DatasetPath::in_container("a.mdb", Some("Stage"), "Parcel1");
        engine.copy_features(&parcel_path(), &staged).unwrap();
        let topo = engine.create_topology(container, "Stage", "T", 0.001).unwrap();
        engine.add_to_topology(&topo, &staged).unwrap();
        engine
            .add_topology_rule(&topo, TopologyRule::MustNotOverlap, &staged)
            .unwrap();
        engine.validate_topology(&topo).unwrap();
        let errors = engine.export_topology_errors(&topo, "errs").unwrap();
        assert_eq!(errors.name, "errs_poly");
        let rows = engine
            .search(&errors, &[ORIGIN_ID_FIELD, DESTINATION_ID_FIELD, SHAPE_AREA_FIELD])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[0], Value::Int(1));
        assert_eq!(rows[0].values[1], Value::Int(2));
        assert_eq!(rows[0].values[2], Value::Float(20.0));
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let engine = engine_with_parcels(&[]);
        engine
            .create_namespace(Path::new("a.mdb"), "Stage", &parcel_path())
            .unwrap();
        let err = engine
            .create_topology(Path::new("a.mdb"), "Stage", "T", 0.0)
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidTolerance(0.0));
    }

    #[test]
    fn test_injected_failure_scoped_to_container() {
        let engine = engine_with_parcels(&[]);
        engine.fail_on(EngineOp::Search, Some(Path::new("b.mdb")));
        assert!(engine.search(&parcel_path(), &["PARCELNO"]).is_ok());
        engine.fail_on(EngineOp::Search, None);
        assert!(engine.search(&parcel_path(), &["PARCELNO"]).is_err());
    }

    #[test]
    fn test_lazy_fixture_loading() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ward_1_ka.mdb");
        std::fs::write(
            &path,
            r#"{"collections": {"Parcel": {"geometry": "Polygon", "features": [{}]}}}"#,
        )
        .unwrap();
        let engine = MemoryEngine::with_fixture_loading();
        assert_eq!(engine.list_collections(&path, None).unwrap(), vec!["Parcel"]);
        assert_eq!(
            engine
                .count(&DatasetPath::in_container(&path, None, "Parcel"))
                .unwrap(),
            1
        );
    }
}
