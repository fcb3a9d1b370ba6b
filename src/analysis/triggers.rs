//! Trigger discovery from a project's compiled entry file.
//!
//! Only exports whose initializer calls a functions builder (`onRequest`,
//! `onCall`, `pubsub.schedule`, `onDocumentCreated`, ...) are triggers.
//! Re-exports from relative modules are followed into the compiled module
//! they name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;

use super::imports::{is_relative, normalize};
use super::TriggerDiscovery;
use crate::core::manifest::{PackageManifest, PACKAGE_JSON};
use crate::core::trigger::{Trigger, TriggerKind};
use crate::util::fs::read_to_string;

/// Region used for trigger URLs when none is configured.
pub const DEFAULT_REGION: &str = "us-central1";

/// Initializer lines inspected when inferring a trigger kind.
const INITIALIZER_LINES: usize = 5;

/// Suffixes tried when resolving a compiled relative module.
const COMPILED_SUFFIXES: [&str; 4] = ["", ".js", ".cjs", ".mjs"];

static COMMONJS_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexports\.([A-Za-z_$][\w$]*)\s*=\s*").unwrap());

static DEFINE_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Object\.defineProperty\(\s*exports\s*,\s*['"]([A-Za-z_$][\w$]*)['"]"#).unwrap()
});

static GETTER_REEXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^Object\.defineProperty\(\s*exports\s*,\s*['"][\w$]+['"]\s*,\s*\{[^}]*?\bget\s*:\s*function\s*\(\s*\)\s*\{\s*return\s+([A-Za-z_$][\w$]*)\.([A-Za-z_$][\w$]*)"#,
    )
    .unwrap()
});

static REQUIRE_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\b(?:var|let|const)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:__importStar\(|__importDefault\()?\s*require\(\s*['"]([^'"\n]+)['"]\s*\)"#,
    )
    .unwrap()
});

static COMMONJS_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"__exportStar\(\s*require\(\s*['"]([^'"\n]+)['"]\s*\)\s*,\s*exports\s*\)"#).unwrap()
});

static ESM_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bexport\s+(?:const|let|var|function|async\s+function)\s+([A-Za-z_$][\w$]*)")
        .unwrap()
});

static ESM_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bexport\s*\*\s*from\s*['"]([^'"\n]+)['"]"#).unwrap());

static ESM_NAMED_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bexport\s*\{([^}]*)\}\s*from\s*['"]([^'"\n]+)['"]"#).unwrap()
});

static KINDS: LazyLock<Vec<(TriggerKind, Regex)>> = LazyLock::new(|| {
    [
        (TriggerKind::Http, r"\bonRequest\s*\)?\s*\("),
        (TriggerKind::Callable, r"\bonCall\s*\)?\s*\("),
        (TriggerKind::Scheduled, r"\bpubsub\s*\.\s*schedule\s*\(|\bonSchedule\s*\)?\s*\("),
        (TriggerKind::Event, r"\bon[A-Z][A-Za-z]*\s*\)?\s*\("),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// One export of a compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Export {
    /// Assigned in this module.
    Local { name: String, kind: TriggerKind },
    /// `imported` of a relative module, exported here as `name`.
    Reexport {
        name: String,
        module: String,
        imported: String,
    },
    /// Every export of a relative module.
    Star { module: String },
}

/// Native [`TriggerDiscovery`] reading the manifest's `main` file.
#[derive(Debug, Clone)]
pub struct CompiledEntryDiscovery {
    region: String,
}

impl CompiledEntryDiscovery {
    pub fn new(region: impl Into<String>) -> Self {
        CompiledEntryDiscovery {
            region: region.into(),
        }
    }

    /// Triggers assigned in compiled module text, in first-seen order.
    ///
    /// Re-exports are not followed; see [`TriggerDiscovery::discover`].
    pub fn parse(&self, compiled: &str, project_id: &str) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        for export in scan(compiled) {
            if let Export::Local { name, kind } = export {
                self.push_local(&mut triggers, name, kind, project_id);
            }
        }
        triggers
    }

    fn trigger(&self, name: &str, kind: TriggerKind, project_id: &str) -> Trigger {
        let trigger = Trigger::new(name, kind);
        match kind {
            TriggerKind::Http => trigger.with_url(format!(
                "https://{}-{}.cloudfunctions.net/{}",
                self.region, project_id, name
            )),
            _ => trigger,
        }
    }

    fn push_local(
        &self,
        triggers: &mut Vec<Trigger>,
        name: String,
        kind: TriggerKind,
        project_id: &str,
    ) {
        if kind == TriggerKind::Unknown {
            tracing::debug!("export `{}` is not a function trigger", name);
            return;
        }
        push_unique(triggers, self.trigger(&name, kind, project_id));
    }

    fn collect(
        &self,
        file: &Path,
        project_id: &str,
        visiting: &mut Vec<PathBuf>,
    ) -> Result<Vec<Trigger>> {
        let compiled = read_to_string(file)?;
        visiting.push(file.to_path_buf());

        let mut triggers = Vec::new();
        for export in scan(&compiled) {
            match export {
                Export::Local { name, kind } => {
                    self.push_local(&mut triggers, name, kind, project_id);
                }
                Export::Reexport {
                    name,
                    module,
                    imported,
                } => {
                    let found = self.follow(file, &module, project_id, visiting)?;
                    match found.into_iter().find(|t| t.entry_point == imported) {
                        Some(t) => {
                            push_unique(&mut triggers, self.trigger(&name, t.kind, project_id))
                        }
                        None => tracing::debug!("re-export `{}` is not a function trigger", name),
                    }
                }
                Export::Star { module } => {
                    for t in self.follow(file, &module, project_id, visiting)? {
                        push_unique(&mut triggers, t);
                    }
                }
            }
        }

        visiting.pop();
        Ok(triggers)
    }

    fn follow(
        &self,
        from: &Path,
        module: &str,
        project_id: &str,
        visiting: &mut Vec<PathBuf>,
    ) -> Result<Vec<Trigger>> {
        let Some(target) = resolve_compiled(from, module) else {
            tracing::debug!("cannot resolve `{}` from {}", module, from.display());
            return Ok(Vec::new());
        };
        if visiting.contains(&target) {
            return Ok(Vec::new());
        }
        self.collect(&target, project_id, visiting)
    }
}

impl Default for CompiledEntryDiscovery {
    fn default() -> Self {
        CompiledEntryDiscovery::new(DEFAULT_REGION)
    }
}

impl TriggerDiscovery for CompiledEntryDiscovery {
    fn discover(&self, functions_dir: &Path, project_id: &str) -> Result<Vec<Trigger>> {
        let manifest = PackageManifest::load(&functions_dir.join(PACKAGE_JSON))?;
        let entry = functions_dir.join(manifest.main_or_default());
        if !entry.is_file() {
            bail!("compiled entry {} does not exist", entry.display());
        }

        let triggers = self.collect(&normalize(&entry), project_id, &mut Vec::new())?;
        tracing::debug!("discovered {} trigger(s) in {}", triggers.len(), entry.display());
        Ok(triggers)
    }
}

fn push_unique(triggers: &mut Vec<Trigger>, trigger: Trigger) {
    if trigger.entry_point == "default" || trigger.entry_point == "__esModule" {
        return;
    }
    if !triggers.iter().any(|t| t.entry_point == trigger.entry_point) {
        triggers.push(trigger);
    }
}

/// Exports of compiled module text, in source order.
fn scan(compiled: &str) -> Vec<Export> {
    let requires: HashMap<&str, &str> = REQUIRE_BINDING
        .captures_iter(compiled)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect();

    // (start, end of match, export); locals get their kind once sorted.
    let mut found: Vec<(usize, usize, Export)> = Vec::new();
    let local = |name: &str| Export::Local {
        name: name.to_string(),
        kind: TriggerKind::Unknown,
    };

    for caps in COMMONJS_EXPORT.captures_iter(compiled) {
        let Some(whole) = caps.get(0) else { continue };
        let rest = &compiled[whole.end()..];
        // `exports.a = exports.b = void 0;` only declares names.
        if rest.starts_with("void 0") || rest.starts_with("exports.") {
            continue;
        }
        found.push((whole.start(), whole.end(), local(&caps[1])));
    }

    for caps in DEFINE_PROPERTY.captures_iter(compiled) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];
        if name == "__esModule" {
            continue;
        }
        match GETTER_REEXPORT.captures(&compiled[whole.start()..]) {
            Some(getter) => {
                let module = requires.get(&getter[1]).copied().unwrap_or_default();
                if is_relative(module) {
                    found.push((
                        whole.start(),
                        whole.end(),
                        Export::Reexport {
                            name: name.to_string(),
                            module: module.to_string(),
                            imported: getter[2].to_string(),
                        },
                    ));
                }
            }
            None => found.push((whole.start(), whole.end(), local(name))),
        }
    }

    for caps in ESM_EXPORT.captures_iter(compiled) {
        if let Some(whole) = caps.get(0) {
            found.push((whole.start(), whole.end(), local(&caps[1])));
        }
    }

    for re in [&*COMMONJS_STAR, &*ESM_STAR] {
        for caps in re.captures_iter(compiled) {
            let Some(whole) = caps.get(0) else { continue };
            if is_relative(&caps[1]) {
                found.push((
                    whole.start(),
                    whole.end(),
                    Export::Star {
                        module: caps[1].to_string(),
                    },
                ));
            }
        }
    }

    for caps in ESM_NAMED_FROM.captures_iter(compiled) {
        let Some(whole) = caps.get(0) else { continue };
        if !is_relative(&caps[2]) {
            continue;
        }
        for item in caps[1].split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let mut parts = item.split_whitespace();
            let imported = parts.next().unwrap_or_default();
            let name = match (parts.next(), parts.next()) {
                (Some("as"), Some(alias)) => alias,
                _ => imported,
            };
            found.push((
                whole.start(),
                whole.end(),
                Export::Reexport {
                    name: name.to_string(),
                    module: caps[2].to_string(),
                    imported: imported.to_string(),
                },
            ));
        }
    }

    found.sort_by_key(|(start, _, _)| *start);

    let starts: Vec<usize> = found.iter().map(|(start, _, _)| *start).collect();
    found
        .into_iter()
        .enumerate()
        .map(|(i, (start, end, export))| match export {
            Export::Local { name, .. } => {
                let limit = starts[i + 1..]
                    .iter()
                    .copied()
                    .find(|s| *s > start)
                    .unwrap_or(compiled.len())
                    .max(end);
                let initializer = compiled[end..limit]
                    .lines()
                    .take(INITIALIZER_LINES)
                    .collect::<Vec<_>>()
                    .join("\n");
                Export::Local {
                    name,
                    kind: infer_kind(&initializer),
                }
            }
            other => other,
        })
        .collect()
}

/// Resolve a relative module of compiled output to an existing file.
fn resolve_compiled(from: &Path, module: &str) -> Option<PathBuf> {
    if !is_relative(module) {
        return None;
    }
    let base = normalize(&from.parent()?.join(module));
    COMPILED_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut s = base.as_os_str().to_os_string();
            s.push(suffix);
            PathBuf::from(s)
        })
        .chain(std::iter::once(base.join("index.js")))
        .find(|candidate| candidate.is_file())
}

fn infer_kind(initializer: &str) -> TriggerKind {
    KINDS
        .iter()
        .find(|(_, re)| re.is_match(initializer))
        .map_or(TriggerKind::Unknown, |(kind, _)| *kind)
}
