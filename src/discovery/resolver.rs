//! Feature resolver
//!
//! Lists the collections of one container whose names are in a target set,
//! across the container root and every declared namespace.

use std::path::{Path, PathBuf};

use crate::engine::{DatasetPath, EngineResult, GeoEngine, GeometryKind};

/// A collection found inside a container
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCollection {
    pub container: PathBuf,
    pub namespace: Option<String>,
    pub name: String,
    pub path: DatasetPath,
    pub geometry: GeometryKind,
    pub fields: Vec<String>,
}

impl ResolvedCollection {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Container file name, used as the source column of most reports
    pub fn container_name(&self) -> String {
        self.container
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.container.display().to_string())
    }
}

/// Collections named in `names`, root collections first, then by namespace
pub fn resolve(
    engine: &dyn GeoEngine,
    container: &Path,
    names: &[&str],
) -> EngineResult<Vec<ResolvedCollection>> {
    let mut namespaces: Vec<Option<String>> = vec![None];
    namespaces.extend(engine.list_namespaces(container)?.into_iter().map(Some));

    let mut resolved = Vec::new();
    for namespace in namespaces {
        for name in engine.list_collections(container, namespace.as_deref())? {
            if !names.contains(&name.as_str()) {
                continue;
            }
            let path = DatasetPath::in_container(container, namespace.as_deref(), name.as_str());
            let description = engine.describe(&path)?;
            resolved.push(ResolvedCollection {
                container: container.to_path_buf(),
                namespace: namespace.clone(),
                name,
                path,
                geometry: description.geometry,
                fields: description.field_names(),
            });
        }
    }
    tracing::debug!(
        container = %container.display(),
        matched = resolved.len(),
        "resolved collections"
    );
    Ok(resolved)
}
