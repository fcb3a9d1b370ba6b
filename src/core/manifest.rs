//! `package.json` manifest model.
//!
//! Only the fields the pipeline reads or rewrites are typed; every other key
//! is carried through untouched and in its original order.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::fs::{read_json, write_json};

/// File name of the package manifest.
pub const PACKAGE_JSON: &str = "package.json";

/// A package descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Compiled entry file, relative to the package root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Everything else, preserved verbatim.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl PackageManifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Write the manifest as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    /// Compiled entry file, defaulting to `lib/index.js`.
    pub fn main_or_default(&self) -> &str {
        self.main.as_deref().unwrap_or("lib/index.js")
    }

    /// Total count of declared dependencies, runtime and development.
    pub fn declared_count(&self) -> usize {
        self.dependencies.len() + self.dev_dependencies.len()
    }
}
