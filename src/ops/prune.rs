//! Dependency pruning of the deployable manifest.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::UnusedDependencies;
use crate::core::PackageManifest;

/// Counts reported after pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PruneSummary {
    /// Development dependencies plus dropped runtime dependencies.
    pub removed: usize,
    /// Declared dependencies before pruning, both kinds.
    pub total: usize,
}

/// Derive the manifest a subproject ships with.
///
/// Runtime dependencies reported unused are dropped and development
/// dependencies are always emptied. Every other field is carried over.
pub fn prune_manifest(
    original: &PackageManifest,
    unused: &UnusedDependencies,
) -> (PackageManifest, PruneSummary) {
    let dependencies: BTreeMap<String, String> = original
        .dependencies
        .iter()
        .filter(|(name, _)| !unused.dependencies.contains(*name))
        .map(|(name, version)| (name.clone(), version.clone()))
        .collect();

    let summary = PruneSummary {
        removed: original.dev_dependencies.len()
            + (original.dependencies.len() - dependencies.len()),
        total: original.declared_count(),
    };

    let manifest = PackageManifest {
        dependencies,
        dev_dependencies: BTreeMap::new(),
        ..original.clone()
    };

    (manifest, summary)
}
