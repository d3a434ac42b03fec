//! Scoped engine artifacts
//!
//! A guard owns one temporary artifact and deletes it on drop, so every
//! exit path (success, skip, early `?` return) tears it down.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::observability::{log_event_with_fields, Event};

use super::errors::EngineResult;
use super::types::DatasetPath;
use super::GeoEngine;

/// Fresh name with a unique suffix
pub(crate) fn unique_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &id[..12])
}

/// Temporary dataset deleted on drop
pub struct ScopedDataset<'e> {
    engine: &'e dyn GeoEngine,
    path: DatasetPath,
}

impl<'e> ScopedDataset<'e> {
    /// Reserve a uniquely named scratch dataset in engine memory
    ///
    /// Nothing is created yet; the caller passes [`Self::path`] as the
    /// output of an engine operation.
    pub fn scratch(engine: &'e dyn GeoEngine, prefix: &str) -> Self {
        Self::at(engine, DatasetPath::in_memory(unique_name(prefix)))
    }

    /// Take ownership of an explicit dataset path
    pub fn at(engine: &'e dyn GeoEngine, path: DatasetPath) -> Self {
        Self { engine, path }
    }

    pub fn path(&self) -> &DatasetPath {
        &self.path
    }
}

impl Drop for ScopedDataset<'_> {
    fn drop(&mut self) {
        if !self.engine.exists(&self.path) {
            return;
        }
        match self.engine.delete(&self.path) {
            Ok(()) => tracing::trace!(dataset = %self.path, "deleted temporary dataset"),
            Err(e) => log_event_with_fields(
                Event::CleanupFailed,
                &[("dataset", &self.path.to_string()), ("error", &e.to_string())],
            ),
        }
    }
}

/// Staging namespace deleted on drop unless kept
pub struct ScopedNamespace<'e> {
    engine: &'e dyn GeoEngine,
    container: PathBuf,
    name: String,
    keep: bool,
}

impl<'e> ScopedNamespace<'e> {
    /// Create the namespace, destroying a stale one of the same name first
    pub fn create(
        engine: &'e dyn GeoEngine,
        container: &Path,
        name: &str,
        reference: &DatasetPath,
    ) -> EngineResult<Self> {
        if engine.namespace_exists(container, name) {
            tracing::debug!(container = %container.display(), namespace = name, "removing stale namespace");
            engine.delete_namespace(container, name)?;
        }
        engine.create_namespace(container, name, reference)?;
        Ok(Self {
            engine,
            container: container.to_path_buf(),
            name: name.to_string(),
            keep: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container(&self) -> &Path {
        &self.container
    }

    /// Dataset address inside this namespace
    pub fn dataset(&self, name: &str) -> DatasetPath {
        DatasetPath::in_container(&self.container, Some(&self.name), name)
    }

    /// Leave the namespace in place when the guard drops
    pub fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for ScopedNamespace<'_> {
    fn drop(&mut self) {
        if self.keep || !self.engine.namespace_exists(&self.container, &self.name) {
            return;
        }
        if let Err(e) = self.engine.delete_namespace(&self.container, &self.name) {
            log_event_with_fields(
                Event::CleanupFailed,
                &[
                    ("container", &self.container.display().to_string()),
                    ("namespace", &self.name),
                    ("error", &e.to_string()),
                ],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineOp, FieldInfo, FieldKind, GeometryKind, MemoryEngine};

    #[test]
    fn test_unique_names_differ() {
        assert_ne!(unique_name("freq"), unique_name("freq"));
        assert!(unique_name("freq").starts_with("freq_"));
    }

    #[test]
    fn test_scratch_dataset_deleted_on_drop() {
        let engine = MemoryEngine::new();
        engine.insert_table(
            DatasetPath::in_container("a.mdb", None, "Parcel"),
            GeometryKind::Polygon,
            vec![FieldInfo::new("PARCELNO", FieldKind::Integer)],
        );
        {
            let scratch = ScopedDataset::scratch(&engine, "freq");
            engine
                .frequency(
                    &DatasetPath::in_container("a.mdb", None, "Parcel"),
                    scratch.path(),
                    &["PARCELNO"],
                )
                .unwrap();
            assert!(engine.exists(scratch.path()));
        }
        assert!(engine.memory_datasets().is_empty());
    }

    #[test]
    fn test_namespace_kept_when_requested() {
        let engine = MemoryEngine::new();
        let parcel = DatasetPath::in_container("a.mdb", None, "Parcel");
        engine.insert_table(parcel.clone(), GeometryKind::Polygon, vec![]);
        {
            let mut ns = ScopedNamespace::create(&engine, Path::new("a.mdb"), "Stage", &parcel).unwrap();
            ns.keep();
        }
        assert!(engine.namespace_exists(Path::new("a.mdb"), "Stage"));
        {
            let _ns = ScopedNamespace::create(&engine, Path::new("a.mdb"), "Stage", &parcel).unwrap();
        }
        assert!(!engine.namespace_exists(Path::new("a.mdb"), "Stage"));
    }

    #[test]
    fn test_failed_teardown_does_not_panic() {
        let engine = MemoryEngine::new();
        let parcel = DatasetPath::in_container("a.mdb", None, "Parcel");
        engine.insert_table(parcel.clone(), GeometryKind::Polygon, vec![]);
        engine.fail_on(EngineOp::Delete, Some(Path::new("a.mdb")));
        engine.fail_on(EngineOp::DeleteNamespace, Some(Path::new("a.mdb")));
        {
            let _ns = ScopedNamespace::create(&engine, Path::new("a.mdb"), "Stage", &parcel).unwrap();
            let _dataset = ScopedDataset::at(&engine, parcel.clone());
        }
        assert!(engine.namespace_exists(Path::new("a.mdb"), "Stage"));
        assert!(engine.exists(&parcel));
    }
}
