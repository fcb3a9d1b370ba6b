//! Import scanning for TypeScript/JavaScript sources.
//!
//! A lexical scanner, not a parser: it recognises the static forms that
//! module resolution and bundlers follow (`import … from`, `export … from`,
//! side-effect imports, `import type`, `require("…")`, literal `import("…")`
//! and `/// <reference path="…" />`). Specifiers built at runtime are not seen.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Extensions scanned as source files.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Candidate suffixes tried when resolving an extensionless relative specifier.
const RESOLVE_SUFFIXES: &[&str] = &[
    ".ts", ".tsx", ".d.ts", ".js", ".jsx", ".mjs", ".cjs", ".json",
];

static FROM_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:import|export)\b[^;'"`]*?\bfrom\s*['"]([^'"\n]+)['"]"#).unwrap()
});

static SIDE_EFFECT_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimport\s*['"]([^'"\n]+)['"]"#).unwrap());

static CALL_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).unwrap()
});

static REFERENCE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"///\s*<reference\s+path\s*=\s*['"]([^'"\n]+)['"]"#).unwrap()
});

/// Collect every module specifier in `source`, in first-seen order.
pub fn scan_specifiers(source: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |specifier: &str| {
        if !found.iter().any(|s| s == specifier) {
            found.push(specifier.to_string());
        }
    };

    for cap in REFERENCE_PATH.captures_iter(source) {
        push(reference_specifier(&cap[1]).as_str());
    }

    let code = strip_comments(source);
    for re in [&*FROM_CLAUSE, &*SIDE_EFFECT_IMPORT, &*CALL_IMPORT] {
        for cap in re.captures_iter(&code) {
            push(&cap[1]);
        }
    }

    found
}

/// Triple-slash paths are relative even without a leading `./`.
fn reference_specifier(path: &str) -> String {
    if path.starts_with('.') || path.starts_with('/') {
        path.to_string()
    } else {
        format!("./{}", path)
    }
}

/// Whether a specifier points into the project rather than at a package.
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".."
}

/// Package name a bare specifier refers to.
///
/// `lodash/fp` → `lodash`, `@google-cloud/storage/build` → `@google-cloud/storage`.
/// Relative and absolute paths, URLs and `node:` builtins yield `None`.
pub fn package_name(specifier: &str) -> Option<&str> {
    if is_relative(specifier)
        || specifier.starts_with('/')
        || specifier.starts_with("node:")
        || specifier.contains("://")
        || specifier.is_empty()
    {
        return None;
    }

    let mut parts = specifier.splitn(3, '/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let second = parts.next()?;
        let len = first.len() + 1 + second.len();
        Some(&specifier[..len])
    } else {
        Some(first)
    }
}

/// Resolve a relative specifier from `from_file` to an existing file.
///
/// Tries the exact path, known extensions, and `index.*` inside a directory.
/// Compiled-extension specifiers (`./x.js`) also resolve to TypeScript
/// sources (`./x.ts`), matching how TypeScript resolves them.
pub fn resolve_relative(from_file: &Path, specifier: &str) -> Option<PathBuf> {
    let base = from_file.parent()?.join(specifier);

    if base.is_file() {
        return Some(normalize(&base));
    }

    for suffix in RESOLVE_SUFFIXES {
        let candidate = append_suffix(&base, suffix);
        if candidate.is_file() {
            return Some(normalize(&candidate));
        }
    }

    if let Some(ext) = base.extension().and_then(|e| e.to_str()) {
        let ts_ext = match ext {
            "js" => Some(["ts", "tsx"]),
            "mjs" => Some(["mts", "mts"]),
            "cjs" => Some(["cts", "cts"]),
            _ => None,
        };
        if let Some(candidates) = ts_ext {
            for ext in candidates {
                let candidate = base.with_extension(ext);
                if candidate.is_file() {
                    return Some(normalize(&candidate));
                }
            }
        }
    }

    if base.is_dir() {
        for suffix in RESOLVE_SUFFIXES {
            let candidate = base.join(format!("index{}", suffix));
            if candidate.is_file() {
                return Some(normalize(&candidate));
            }
        }
    }

    None
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Lexically remove `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `path` has one of the scanned source extensions.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Blank out `//` and `/* */` comments, leaving string literals intact.
///
/// Line structure is preserved so offsets into the result map to the same
/// lines of the input.
pub fn strip_comments(source: &str) -> String {
    #[derive(PartialEq)]
    enum Mode {
        Code,
        Str(char),
        Line,
        Block,
    }

    let mut out = String::with_capacity(source.len());
    let mut mode = Mode::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match mode {
            Mode::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    mode = Mode::Line;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    mode = Mode::Block;
                }
                '\'' | '"' | '`' => {
                    mode = Mode::Str(c);
                    out.push(c);
                }
                _ => out.push(c),
            },
            Mode::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else if c == quote || (c == '\n' && quote != '`') {
                    mode = Mode::Code;
                }
            }
            Mode::Line => {
                if c == '\n' {
                    out.push('\n');
                    mode = Mode::Code;
                }
            }
            Mode::Block => {
                if c == '\n' {
                    out.push('\n');
                } else if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    mode = Mode::Code;
                }
            }
        }
    }

    out
}
