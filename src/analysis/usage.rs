//! Static usage detection for declared dependencies.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use super::imports::{is_source_file, package_name, scan_specifiers};
use super::{UnusedDependencies, UsageDetector};
use crate::core::manifest::{PackageManifest, PACKAGE_JSON};

/// Native [`UsageDetector`] driven by the import scanner.
#[derive(Debug, Clone)]
pub struct ImportUsageDetector {
    output_dir: String,
}

impl ImportUsageDetector {
    /// `output_dir` is the build output directory under the project root;
    /// it is not scanned, nor is any `node_modules`.
    pub fn new(output_dir: &str) -> Self {
        ImportUsageDetector {
            output_dir: output_dir.to_string(),
        }
    }

    /// Package names imported by any scanned source file under `root`.
    pub fn used_packages(&self, root: &Path) -> Result<BTreeSet<String>> {
        let mut used = BTreeSet::new();

        let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
            let skipped = e.file_type().is_dir()
                && (e.file_name() == "node_modules"
                    || (e.depth() == 1 && e.file_name() == self.output_dir.as_str()));
            !skipped
        });
        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() || !is_source_file(entry.path()) {
                continue;
            }

            let source = fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            used.extend(
                scan_specifiers(&source)
                    .iter()
                    .filter_map(|s| package_name(s))
                    .map(str::to_string),
            );
        }

        Ok(used)
    }
}

impl Default for ImportUsageDetector {
    fn default() -> Self {
        ImportUsageDetector::new("lib")
    }
}

impl UsageDetector for ImportUsageDetector {
    fn detect_unused(&self, project_root: &Path) -> Result<UnusedDependencies> {
        let manifest = PackageManifest::load(&project_root.join(PACKAGE_JSON))?;
        let used = self.used_packages(project_root)?;

        let unused = UnusedDependencies {
            dependencies: unused_names(&manifest.dependencies, &used),
            dev_dependencies: unused_names(&manifest.dev_dependencies, &used),
        };
        tracing::debug!(
            "{} unused dependencies, {} unused dev dependencies",
            unused.dependencies.len(),
            unused.dev_dependencies.len()
        );
        Ok(unused)
    }
}

fn unused_names(declared: &BTreeMap<String, String>, used: &BTreeSet<String>) -> BTreeSet<String> {
    declared
        .keys()
        .filter(|name| !is_used(name, used))
        .cloned()
        .collect()
}

/// `@types/x` counts as used when `x` is; `@types/scope__pkg` maps to `@scope/pkg`.
fn is_used(name: &str, used: &BTreeSet<String>) -> bool {
    if used.contains(name) {
        return true;
    }
    match name.strip_prefix("@types/") {
        Some(typed) => match typed.split_once("__") {
            Some((scope, pkg)) => used.contains(&format!("@{}/{}", scope, pkg)),
            None => used.contains(typed),
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_unused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "package.json",
            r#"{
  "name": "functions",
  "dependencies": {
    "@google-cloud/storage": "^7.0.0",
    "firebase-admin": "^12.0.0",
    "firebase-functions": "^5.0.0",
    "lodash": "^4.17.21",
    "stripe": "^14.0.0"
  },
  "devDependencies": {
    "@types/lodash": "^4.14.0",
    "typescript": "^5.0.0"
  }
}"#,
        );
        write(
            root,
            "src/index.ts",
            "import * as functions from 'firebase-functions';\nimport { map } from 'lodash/fp';\nimport { Storage } from '@google-cloud/storage/build/src';\nimport { readFileSync } from 'node:fs';\n",
        );
        write(root, "lib/index.js", "const stripe = require('stripe');\n");
        write(root, "node_modules/firebase-admin/index.js", "require('firebase-admin');\n");

        let unused = ImportUsageDetector::new("lib").detect_unused(root).unwrap();
        assert_eq!(unused.dependencies, names(&["firebase-admin", "stripe"]));
        assert_eq!(unused.dev_dependencies, names(&["typescript"]));
    }

    #[test]
    fn test_dynamic_usage_counts_as_unused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "package.json", r#"{"dependencies":{"stripe":"1"}}"#);
        write(root, "src/index.ts", "const name = 'stripe';\nconst lib = require(name);\n");

        let unused = ImportUsageDetector::default().detect_unused(root).unwrap();
        assert_eq!(unused.dependencies, names(&["stripe"]));
    }

    #[test]
    fn test_scoped_types_package() {
        let used = names(&["@google-cloud/storage"]);
        assert!(is_used("@types/google-cloud__storage", &used));
        assert!(!is_used("@types/express", &used));
    }
}
