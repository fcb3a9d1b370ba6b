//! Firebase platform configuration: `firebase.json` and `.firebaserc`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::fs::{read_json, write_json};

/// File name of the platform config.
pub const FIREBASE_JSON: &str = "firebase.json";

/// File name of the project-alias config.
pub const FIREBASERC: &str = ".firebaserc";

/// `firebase.json`, kept as a raw document so unknown sections round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct FirebaseConfig {
    doc: Value,
}

impl FirebaseConfig {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(FirebaseConfig {
            doc: read_json(path)?,
        })
    }

    pub fn from_value(doc: Value) -> Self {
        FirebaseConfig { doc }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, &self.doc)
    }

    pub fn as_value(&self) -> &Value {
        &self.doc
    }

    /// Functions source directory declared in the config.
    ///
    /// `functions` may be a single object or an array of codebases; for an
    /// array this is the first entry's source. Projects with more than one
    /// codebase are rejected when opened, see [`FirebaseConfig::codebases`].
    pub fn functions_source(&self) -> Option<&str> {
        match self.doc.get("functions")? {
            Value::Object(obj) => obj.get("source")?.as_str(),
            Value::Array(items) => items.first()?.get("source")?.as_str(),
            _ => None,
        }
    }

    /// Number of functions codebases declared.
    pub fn codebases(&self) -> usize {
        match self.doc.get("functions") {
            Some(Value::Object(_)) => 1,
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    /// Point every functions codebase at `source`.
    ///
    /// A document without a `functions` section gains one.
    pub fn set_functions_source(&mut self, source: &str) {
        let Value::Object(doc) = &mut self.doc else {
            return;
        };
        let functions = doc
            .entry("functions")
            .or_insert_with(|| Value::Object(Default::default()));
        match functions {
            Value::Object(obj) => {
                obj.insert("source".to_string(), Value::from(source));
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        obj.insert("source".to_string(), Value::from(source));
                    }
                }
            }
            _ => {}
        }
    }

    /// Clear every functions `predeploy` hook list.
    ///
    /// Hooks assume the monolithic layout and must not run against a subproject.
    pub fn clear_predeploy_hooks(&mut self) {
        match self.doc.get_mut("functions") {
            Some(Value::Object(obj)) => {
                obj.insert("predeploy".to_string(), Value::Array(Vec::new()));
            }
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        obj.insert("predeploy".to_string(), Value::Array(Vec::new()));
                    }
                }
            }
            _ => {}
        }
    }
}

/// `.firebaserc`: project aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirebaseRc {
    #[serde(default)]
    pub projects: BTreeMap<String, String>,
}

impl FirebaseRc {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Load the file if present, otherwise an empty alias table.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(FirebaseRc::default())
        }
    }

    /// The `default` alias, which is the active project.
    pub fn default_project(&self) -> Option<&str> {
        self.projects.get("default").map(String::as_str)
    }

    /// Resolve an alias to its project id. Unknown names are taken as ids.
    pub fn resolve<'a>(&'a self, alias_or_id: &'a str) -> &'a str {
        self.projects
            .get(alias_or_id)
            .map(String::as_str)
            .unwrap_or(alias_or_id)
    }
}
