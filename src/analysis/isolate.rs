//! Entry-point isolation for TypeScript source files.
//!
//! The rewriter works on top-level statements. Strings, template text and
//! comments are masked first so that braces and keywords inside them do not
//! disturb statement boundaries or usage checks; edits are then applied to the
//! original lines, leaving untouched statements byte-for-byte intact.
//!
//! Isolation narrows the exports to one symbol, then runs a bounded repair
//! loop. Each repair pass drops import bindings that are no longer referenced
//! and top-level declarations that nothing references any more; removing a
//! declaration can orphan further imports, so passes repeat until a pass makes
//! no change or the pass budget is spent.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;

use super::{EntryPointIsolator, IsolationReport};
use crate::util::config::DEFAULT_MAX_PASSES;
use crate::util::fs::{read_to_string, write_string};

static DEFAULT_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^export\s+default\s+(?:abstract\s+)?(?:async\s+function\b|function\b|class\b)\s*\*?\s*([A-Za-z_$][\w$]*)?",
    )
    .unwrap()
});

static EXPORT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^export\b\s*(?:default\b\s*)?").unwrap());

static EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^export\s*(?:default\b|=)").unwrap());

static EXPORT_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^export\s+(?:type\s+)?\*").unwrap());

static EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^export\s+(type\s+)?\{(.*?)\}").unwrap());

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<export>export\s+)?(?:declare\s+)?(?P<kind>async\s+function\b|function\b|const\s+enum\b|const\b|let\b|var\b|abstract\s+class\b|class\b|interface\b|type\b|enum\b|namespace\b)\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)?",
    )
    .unwrap()
});

static IMPORT_EQUALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^import\s+(?:type\s+)?([A-Za-z_$][\w$]*)\s*=\s*require\s*\(").unwrap()
});

static IMPORT_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)^import\s+(type\s+)?(.*?)\s*\bfrom\s*['"]"#).unwrap());

static NAMESPACE_BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\s*as\s+([A-Za-z_$][\w$]*)").unwrap());

static MODULE_SPECIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bfrom\s*(['"][^'"\n]*['"])"#).unwrap());

/// Native [`EntryPointIsolator`].
#[derive(Debug, Clone, Copy)]
pub struct SourceIsolator {
    max_passes: usize,
}

impl SourceIsolator {
    pub fn new(max_passes: usize) -> Self {
        SourceIsolator {
            max_passes: max_passes.max(1),
        }
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Isolate `symbol` in source text, returning the new text and report.
    pub fn isolate_source(&self, source: &str, symbol: &str) -> Result<(String, IsolationReport)> {
        let mut text = narrow_exports(source, symbol)?;

        let mut report = IsolationReport {
            passes: 0,
            converged: false,
        };
        while report.passes < self.max_passes {
            report.passes += 1;
            let next = repair_pass(&text);
            if next == text {
                report.converged = true;
                break;
            }
            text = next;
        }

        Ok((text, report))
    }
}

impl Default for SourceIsolator {
    fn default() -> Self {
        SourceIsolator::new(DEFAULT_MAX_PASSES)
    }
}

impl EntryPointIsolator for SourceIsolator {
    fn isolate(&self, root_file: &Path, symbol: &str) -> Result<IsolationReport> {
        let source = read_to_string(root_file)?;
        let (text, report) = self.isolate_source(&source, symbol)?;

        if text != source {
            write_string(root_file, &text)?;
        }

        tracing::debug!(
            "isolated `{}` in {} after {} pass(es)",
            symbol,
            root_file.display(),
            report.passes
        );
        Ok(report)
    }
}

/// Names exported from a module, `default` and `*` included.
pub fn exported_symbols(source: &str) -> BTreeSet<String> {
    let module = Module::parse(source);
    let mut names = BTreeSet::new();

    for stmt in &module.statements {
        match &stmt.kind {
            Kind::Declaration {
                exported: true,
                names: declared,
                ..
            } => names.extend(declared.iter().cloned()),
            Kind::ExportList { items, .. } => {
                names.extend(items.iter().map(|item| item.exported.clone()))
            }
            Kind::ExportStar => {
                names.insert("*".to_string());
            }
            Kind::ExportDefault | Kind::DefaultDeclaration { .. } => {
                names.insert("default".to_string());
            }
            _ => {}
        }
    }

    names
}

fn narrow_exports(source: &str, symbol: &str) -> Result<String> {
    let module = Module::parse(source);

    let declared_locally = module.statements.iter().any(|stmt| {
        matches!(&stmt.kind, Kind::Declaration { value: true, names, .. } if names.iter().any(|n| n == symbol))
    });

    let mut kept_reexport = false;
    let mut edits = Vec::with_capacity(module.statements.len());

    for stmt in &module.statements {
        let edit = match &stmt.kind {
            Kind::ExportDefault | Kind::ExportStar => Edit::Remove,
            // `export default function helper() {}` still declares `helper`.
            Kind::DefaultDeclaration { name: Some(_) } => Edit::Unexport,
            Kind::DefaultDeclaration { name: None } => Edit::Remove,
            Kind::ExportList {
                type_only,
                items,
                from,
            } => {
                let target = items.iter().find(|item| item.exported == symbol);
                match target {
                    Some(item) if !declared_locally && !kept_reexport && !type_only => {
                        kept_reexport = true;
                        Edit::Replace(render_export_list(item, from.as_deref()))
                    }
                    _ => Edit::Remove,
                }
            }
            Kind::Declaration {
                exported,
                value,
                names,
            } => {
                let is_target = *value && names.iter().any(|n| n == symbol);
                match (is_target, *exported) {
                    (true, true) => Edit::Keep,
                    (true, false) => Edit::Export,
                    (false, true) => Edit::Unexport,
                    (false, false) => Edit::Keep,
                }
            }
            _ => Edit::Keep,
        };
        edits.push(edit);
    }

    if !declared_locally && !kept_reexport {
        bail!("`{}` is not declared or re-exported at the top level", symbol);
    }

    Ok(module.render(&edits))
}

fn repair_pass(source: &str) -> String {
    let module = Module::parse(source);

    let edits: Vec<Edit> = module
        .statements
        .iter()
        .map(|stmt| match &stmt.kind {
            Kind::Import(clause) => prune_import(&module, stmt, clause),
            Kind::ImportEquals { local } => {
                if module.is_referenced(local, &stmt.lines) {
                    Edit::Keep
                } else {
                    Edit::Remove
                }
            }
            Kind::Declaration {
                exported: false,
                names,
                ..
            } if !names.is_empty() => {
                // Overload signatures only reference each other.
                let overloads: Vec<&Range<usize>> = module
                    .statements
                    .iter()
                    .filter(|other| matches!(&other.kind, Kind::Declaration { names: same, .. } if same == names))
                    .map(|other| &other.lines)
                    .collect();
                let used = names
                    .iter()
                    .any(|n| module.is_referenced_outside(n, &overloads));
                if used {
                    Edit::Keep
                } else {
                    Edit::Remove
                }
            }
            _ => Edit::Keep,
        })
        .collect();

    module.render(&edits)
}

fn prune_import(module: &Module, stmt: &Statement, clause: &ImportClause) -> Edit {
    if clause.default.is_none() && clause.namespace.is_none() && clause.named.is_empty() {
        return Edit::Keep;
    }

    let used = |name: &Option<String>| {
        name.as_ref()
            .filter(|n| module.is_referenced(n, &stmt.lines))
            .cloned()
    };
    let pruned = ImportClause {
        type_only: clause.type_only,
        default: used(&clause.default),
        namespace: used(&clause.namespace),
        named: clause
            .named
            .iter()
            .filter(|item| module.is_referenced(&item.local, &stmt.lines))
            .cloned()
            .collect(),
        from: clause.from.clone(),
    };

    if pruned == *clause {
        Edit::Keep
    } else if pruned.default.is_none() && pruned.namespace.is_none() && pruned.named.is_empty() {
        Edit::Remove
    } else {
        Edit::Replace(pruned.render())
    }
}

fn render_export_list(item: &ExportItem, from: Option<&str>) -> String {
    match from {
        Some(from) => format!("export {{ {} }} from {};", item.text, from),
        None => format!("export {{ {} }};", item.text),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NamedImport {
    text: String,
    local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportClause {
    type_only: bool,
    default: Option<String>,
    namespace: Option<String>,
    named: Vec<NamedImport>,
    from: String,
}

impl ImportClause {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(default) = &self.default {
            parts.push(default.clone());
        }
        if let Some(namespace) = &self.namespace {
            parts.push(format!("* as {}", namespace));
        }
        if !self.named.is_empty() {
            let items: Vec<&str> = self.named.iter().map(|item| item.text.as_str()).collect();
            parts.push(format!("{{ {} }}", items.join(", ")));
        }

        format!(
            "import {}{} from {};",
            if self.type_only { "type " } else { "" },
            parts.join(", "),
            self.from
        )
    }
}

#[derive(Debug, Clone)]
struct ExportItem {
    text: String,
    exported: String,
}

#[derive(Debug)]
enum Kind {
    Import(ImportClause),
    ImportEquals {
        local: String,
    },
    ExportList {
        type_only: bool,
        items: Vec<ExportItem>,
        from: Option<String>,
    },
    ExportStar,
    ExportDefault,
    DefaultDeclaration {
        name: Option<String>,
    },
    Declaration {
        exported: bool,
        value: bool,
        names: Vec<String>,
    },
    Other,
}

#[derive(Debug)]
struct Statement {
    lines: Range<usize>,
    kind: Kind,
}

enum Edit {
    Keep,
    Remove,
    Replace(String),
    Unexport,
    Export,
}

/// A source file split into top-level statements.
struct Module {
    lines: Vec<String>,
    masked: Vec<String>,
    statements: Vec<Statement>,
}

impl Module {
    fn parse(source: &str) -> Module {
        let lines: Vec<String> = source.split('\n').map(str::to_string).collect();
        let masked: Vec<String> = mask(source).split('\n').map(str::to_string).collect();

        let statements = split_statements(&masked)
            .into_iter()
            .map(|range| {
                let masked_text = masked[range.clone()].join("\n");
                let original_text = lines[range.clone()].join("\n");
                Statement {
                    kind: classify(masked_text.trim_start(), &original_text),
                    lines: range,
                }
            })
            .collect();

        Module {
            lines,
            masked,
            statements,
        }
    }

    /// Whether `name` is referenced on any line outside `skip`.
    fn is_referenced(&self, name: &str, skip: &Range<usize>) -> bool {
        self.is_referenced_outside(name, &[skip])
    }

    fn is_referenced_outside(&self, name: &str, skip: &[&Range<usize>]) -> bool {
        self.masked
            .iter()
            .enumerate()
            .filter(|(i, _)| !skip.iter().any(|range| range.contains(i)))
            .any(|(_, line)| references(line, name))
    }

    fn render(&self, edits: &[Edit]) -> String {
        let mut out: Vec<String> = Vec::with_capacity(self.lines.len());
        let mut next_line = 0;
        let mut changed = false;

        for (stmt, edit) in self.statements.iter().zip(edits) {
            out.extend(self.lines[next_line..stmt.lines.start].iter().cloned());
            let original = &self.lines[stmt.lines.clone()];

            match edit {
                Edit::Keep => out.extend(original.iter().cloned()),
                Edit::Remove => changed = true,
                Edit::Replace(text) => {
                    changed = true;
                    out.push(text.clone());
                }
                Edit::Unexport | Edit::Export => {
                    changed = true;
                    let first = &original[0];
                    let indent = first.len() - first.trim_start().len();
                    let (lead, rest) = first.split_at(indent);
                    let rewritten = match edit {
                        Edit::Export => format!("{}export {}", lead, rest),
                        _ => format!("{}{}", lead, EXPORT_PREFIX.replace(rest, "")),
                    };
                    out.push(rewritten);
                    out.extend(original[1..].iter().cloned());
                }
            }
            next_line = stmt.lines.end;
        }
        out.extend(self.lines[next_line..].iter().cloned());

        if changed {
            collapse_blank_lines(&mut out);
        }
        out.join("\n")
    }
}

fn collapse_blank_lines(lines: &mut Vec<String>) {
    let mut previous_blank = true;
    lines.retain(|line| {
        let blank = line.trim().is_empty();
        let keep = !(blank && previous_blank);
        previous_blank = blank;
        keep
    });
    if lines.last().is_some_and(|l| !l.is_empty()) {
        lines.push(String::new());
    }
}

fn classify(masked: &str, original: &str) -> Kind {
    if let Some(caps) = DEFAULT_DECLARATION.captures(masked) {
        let name = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|name| !matches!(*name, "extends" | "implements"));
        return Kind::DefaultDeclaration {
            name: name.map(str::to_string),
        };
    }
    if EXPORT_DEFAULT.is_match(masked) {
        return Kind::ExportDefault;
    }
    if EXPORT_STAR.is_match(masked) {
        return Kind::ExportStar;
    }
    if let Some(caps) = EXPORT_LIST.captures(masked) {
        return Kind::ExportList {
            type_only: caps.get(1).is_some(),
            items: parse_export_items(&caps[2]),
            from: module_specifier(original),
        };
    }
    if let Some(caps) = DECLARATION.captures(masked) {
        let kind = caps.name("kind").map_or("", |m| m.as_str());
        let var_like = matches!(kind, "const" | "let" | "var");
        let names = if var_like {
            let rest = caps.name("kind").map_or("", |m| &masked[m.end()..]);
            declarator_names(rest)
        } else {
            caps.name("name")
                .map(|m| vec![m.as_str().to_string()])
                .unwrap_or_default()
        };
        let value = var_like || kind.ends_with("function") || kind.ends_with("class");
        return Kind::Declaration {
            exported: caps.name("export").is_some(),
            value,
            names,
        };
    }
    if let Some(caps) = IMPORT_EQUALS.captures(masked) {
        return Kind::ImportEquals {
            local: caps[1].to_string(),
        };
    }
    if let Some(caps) = IMPORT_FROM.captures(masked) {
        let from = module_specifier(original);
        if let (Some(clause), Some(from)) = (parse_import_clause(&caps[2]), from) {
            return Kind::Import(ImportClause {
                type_only: caps.get(1).is_some(),
                from,
                ..clause
            });
        }
    }
    Kind::Other
}

fn module_specifier(original: &str) -> Option<String> {
    MODULE_SPECIFIER
        .captures_iter(original)
        .last()
        .map(|caps| caps[1].to_string())
}

fn parse_import_clause(clause: &str) -> Option<ImportClause> {
    let mut rest = clause.trim();
    let mut parsed = ImportClause {
        type_only: false,
        default: None,
        namespace: None,
        named: Vec::new(),
        from: String::new(),
    };

    if !rest.starts_with('{') && !rest.starts_with('*') {
        let end = rest.find(',').unwrap_or(rest.len());
        let name = rest[..end].trim();
        if !is_identifier(name) {
            return None;
        }
        parsed.default = Some(name.to_string());
        rest = rest[end..].trim_start_matches(',').trim();
    }

    if rest.starts_with('*') {
        let caps = NAMESPACE_BINDING.captures(rest)?;
        parsed.namespace = Some(caps[1].to_string());
    } else if let Some(inner) = rest.strip_prefix('{') {
        let inner = inner.strip_suffix('}')?;
        for item in inner.split(',') {
            let text = item.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                continue;
            }
            let local = match text.rsplit_once(" as ") {
                Some((_, local)) => local.to_string(),
                None => text.strip_prefix("type ").unwrap_or(&text).to_string(),
            };
            parsed.named.push(NamedImport { text, local });
        }
    } else if !rest.is_empty() {
        return None;
    }

    Some(parsed)
}

fn parse_export_items(list: &str) -> Vec<ExportItem> {
    list.split(',')
        .map(|item| item.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .map(|text| {
            let exported = match text.rsplit_once(" as ") {
                Some((_, exported)) => exported.to_string(),
                None => text.strip_prefix("type ").unwrap_or(&text).to_string(),
            };
            ExportItem { text, exported }
        })
        .collect()
}

/// Names bound by `a = 1, { b, c: d } = x, [e] = y`.
fn declarator_names(rest: &str) -> Vec<String> {
    let mut names = Vec::new();
    for declarator in split_top_level(rest, ',') {
        let declarator = declarator.trim();
        if declarator.starts_with('{') || declarator.starts_with('[') {
            names.extend(pattern_names(declarator));
        } else {
            let end = declarator
                .find(|c: char| !is_ident_char(c))
                .unwrap_or(declarator.len());
            let name = &declarator[..end];
            if is_identifier(name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Identifiers bound by a flat destructuring pattern.
fn pattern_names(pattern: &str) -> Vec<String> {
    let close = if pattern.starts_with('{') { '}' } else { ']' };
    let Some(end) = matching_close(pattern, close) else {
        return Vec::new();
    };

    split_top_level(&pattern[1..end], ',')
        .into_iter()
        .filter_map(|element| {
            let element = element.trim().trim_start_matches("...");
            let binding = match element.split_once(':') {
                Some((_, target)) => target,
                None => element,
            };
            let binding = binding.split('=').next().unwrap_or("").trim();
            is_identifier(binding).then(|| binding.to_string())
        })
        .collect()
}

fn matching_close(text: &str, close: char) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => {
                depth -= 1;
                if depth == 0 && c == close {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => chars.all(is_ident_char),
        _ => false,
    }
}

/// Whether `line` mentions `name` as an identifier, property accesses excluded.
fn references(line: &str, name: &str) -> bool {
    line.match_indices(name).any(|(idx, _)| {
        let before = &line[..idx];
        let after = &line[idx + name.len()..];
        if after.chars().next().is_some_and(is_ident_char) {
            return false;
        }
        let mut prev = before.chars().rev();
        match prev.next() {
            Some(c) if is_ident_char(c) => false,
            Some('.') => prev.next() == Some('.'),
            _ => true,
        }
    })
}

/// Split masked lines into top-level statement line ranges.
fn split_statements(masked: &[String]) -> Vec<Range<usize>> {
    let mut statements = Vec::new();
    let mut i = 0;

    while i < masked.len() {
        if masked[i].trim().is_empty() {
            i += 1;
            continue;
        }

        let start = i;
        let mut depth = 0i64;
        loop {
            depth += bracket_delta(&masked[i]);
            i += 1;
            if i >= masked.len() {
                break;
            }
            if depth > 0 {
                continue;
            }
            depth = 0;

            let current = masked[i - 1].trim_end();
            if !current.is_empty() && ends_with_continuation(current) {
                continue;
            }
            let next = masked[i..].iter().find(|line| !line.trim().is_empty());
            match next {
                Some(line) if starts_with_continuation(line.trim_start()) => continue,
                _ => break,
            }
        }

        // Trailing blank lines belong to the gap, not the statement.
        let mut end = i;
        while end > start + 1 && masked[end - 1].trim().is_empty() {
            end -= 1;
        }
        statements.push(start..end);
        i = end;
    }

    statements
}

fn bracket_delta(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '(' | '[' | '{' => acc + 1,
        ')' | ']' | '}' => acc - 1,
        _ => acc,
    })
}

fn ends_with_continuation(line: &str) -> bool {
    const TAILS: &[&str] = &[
        "=", "=>", ",", "(", "[", "{", "+", "&&", "||", "??", "?", ":", ".", "|", "&",
    ];
    TAILS.iter().any(|tail| line.ends_with(tail))
}

fn starts_with_continuation(line: &str) -> bool {
    const HEADS: &[&str] = &[
        ".", "?", ":", ")", "]", "}", ",", "+", "&&", "||", "=", "|", "&", "as ", "satisfies ",
    ];
    HEADS.iter().any(|head| line.starts_with(head))
}

/// Replace comment text and string contents with spaces, keeping newlines,
/// quotes and template substitutions.
fn mask(source: &str) -> String {
    enum Frame {
        Code { braces: usize },
        Template,
    }
    enum Inner {
        Str(char),
        Line,
        Block,
    }

    fn blank(c: char) -> char {
        if c == '\n' {
            '\n'
        } else {
            ' '
        }
    }

    let mut out = String::with_capacity(source.len());
    let mut stack = vec![Frame::Code { braces: 0 }];
    let mut inner: Option<Inner> = None;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        let in_template = matches!(stack.last(), Some(Frame::Template));
        if in_template {
            match c {
                '\\' => {
                    out.push(' ');
                    if let Some(next) = chars.next() {
                        out.push(blank(next));
                    }
                }
                '`' => {
                    out.push('`');
                    stack.pop();
                }
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push_str("${");
                    stack.push(Frame::Code { braces: 0 });
                }
                c => out.push(blank(c)),
            }
            continue;
        }

        match inner {
            Some(Inner::Str(quote)) => {
                if c == '\\' {
                    out.push(' ');
                    if let Some(next) = chars.next() {
                        out.push(blank(next));
                    }
                } else if c == quote {
                    out.push(quote);
                    inner = None;
                } else if c == '\n' {
                    out.push('\n');
                    inner = None;
                } else {
                    out.push(' ');
                }
            }
            Some(Inner::Line) => {
                out.push(blank(c));
                if c == '\n' {
                    inner = None;
                }
            }
            Some(Inner::Block) => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    inner = None;
                } else {
                    out.push(blank(c));
                }
            }
            None => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    inner = Some(Inner::Line);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    inner = Some(Inner::Block);
                }
                '\'' | '"' => {
                    out.push(c);
                    inner = Some(Inner::Str(c));
                }
                '`' => {
                    out.push('`');
                    stack.push(Frame::Template);
                }
                '{' => {
                    if let Some(Frame::Code { braces }) = stack.last_mut() {
                        *braces += 1;
                    }
                    out.push('{');
                }
                '}' => {
                    let closes_substitution =
                        stack.len() > 1 && matches!(stack.last(), Some(Frame::Code { braces: 0 }));
                    if closes_substitution {
                        stack.pop();
                    } else if let Some(Frame::Code { braces }) = stack.last_mut() {
                        *braces = braces.saturating_sub(1);
                    }
                    out.push('}');
                }
                c => out.push(c),
            },
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const INDEX: &str = r#"import * as functions from "firebase-functions";
import * as admin from "firebase-admin";
import { sendMail } from "./mail";
import { charge, refund } from "./payments";

admin.initializeApp();

export const sendEmail = functions.https.onRequest(async (req, res) => {
  await sendMail(req.body.to);
  res.send(`sent to ${req.body.to}`);
});

export const processPayment = functions.https.onCall(async (data) => {
  return charge(data.amount);
});

export async function refundPayment(id: string) {
  return refund(id);
}

export { helper } from "./helper";
export * from "./reexported";
export default sendEmail;
"#;

    fn exported(source: &str) -> Vec<String> {
        exported_symbols(source).into_iter().collect()
    }

    #[test]
    fn test_exported_symbols() {
        assert_eq!(
            exported(INDEX),
            ["*", "default", "helper", "processPayment", "refundPayment", "sendEmail"]
        );
    }

    #[test]
    fn test_isolate_keeps_only_target() {
        let (text, report) = SourceIsolator::default()
            .isolate_source(INDEX, "sendEmail")
            .unwrap();

        assert_eq!(exported(&text), ["sendEmail"]);
        assert!(report.converged);
        assert!(text.contains("import { sendMail } from \"./mail\";"));
        assert!(text.contains("admin.initializeApp();"));
        assert!(text.contains("${req.body.to}"));
        assert!(!text.contains("processPayment"));
        assert!(!text.contains("refundPayment"));
        assert!(!text.contains("./payments"));
        assert!(!text.contains("./helper"));
        assert!(!text.contains("export default"));
    }

    #[test]
    fn test_isolate_is_idempotent() {
        let isolator = SourceIsolator::default();
        let (once, _) = isolator.isolate_source(INDEX, "processPayment").unwrap();
        let (twice, report) = isolator.isolate_source(&once, "processPayment").unwrap();

        assert_eq!(once, twice);
        assert_eq!(exported(&twice), ["processPayment"]);
        assert_eq!(report.passes, 1);
        assert!(twice.contains("import { charge } from \"./payments\";"));
    }

    #[test]
    fn test_isolate_exports_local_function() {
        let source = "function sendEmail() {\n  return 1;\n}\n\nexport function other() {\n  return sendEmail();\n}\n";
        let (text, _) = SourceIsolator::default()
            .isolate_source(source, "sendEmail")
            .unwrap();

        assert_eq!(exported(&text), ["sendEmail"]);
        assert!(text.starts_with("export function sendEmail()"));
        assert!(!text.contains("other"));
    }

    #[test]
    fn test_isolate_narrows_reexport() {
        let source = "export { sendEmail } from \"./email\";\nexport { processPayment, refund as refundPayment } from './payments';\n";
        let (text, _) = SourceIsolator::default()
            .isolate_source(source, "refundPayment")
            .unwrap();

        assert_eq!(exported(&text), ["refundPayment"]);
        assert!(text.contains("export { refund as refundPayment } from './payments';"));
        assert!(!text.contains("./email"));
    }

    #[test]
    fn test_isolate_unknown_symbol() {
        let err = SourceIsolator::default()
            .isolate_source(INDEX, "doesNotExist")
            .unwrap_err();
        assert!(err.to_string().contains("doesNotExist"));
    }

    #[test]
    fn test_pass_budget_exhaustion_is_reported() {
        let (text, report) = SourceIsolator::new(1)
            .isolate_source(INDEX, "sendEmail")
            .unwrap();

        assert_eq!(report.passes, 1);
        assert!(!report.converged);
        assert_eq!(exported(&text), ["sendEmail"]);
    }

    #[test]
    fn test_isolate_file_in_place() {
        let tmp = TempDir::new().unwrap();
        let index = tmp.path().join("index.ts");
        let other = tmp.path().join("mail.ts");
        fs::write(&index, INDEX).unwrap();
        fs::write(&other, "export const sendMail = async (to: string) => to;\n").unwrap();

        let isolator = SourceIsolator::default();
        isolator.isolate(&index, "sendEmail").unwrap();
        let first = fs::read_to_string(&index).unwrap();
        isolator.isolate(&index, "sendEmail").unwrap();

        assert_eq!(fs::read_to_string(&index).unwrap(), first);
        assert_eq!(
            fs::read_to_string(&other).unwrap(),
            "export const sendMail = async (to: string) => to;\n"
        );
    }

    /// Every name the isolated text references at the top level is still declared.
    fn assert_declared(text: &str, names: &[&str]) {
        let module = Module::parse(text);
        for name in names {
            let declared = module.statements.iter().any(|stmt| match &stmt.kind {
                Kind::Declaration { names, .. } => names.iter().any(|n| n == name),
                Kind::Import(clause) => clause.named.iter().any(|item| item.local == *name),
                _ => false,
            });
            assert!(declared, "`{}` is referenced but no longer declared:\n{}", name, text);
        }
    }

    #[test]
    fn test_isolate_keeps_default_exported_function() {
        let source = "import { x } from './x';\nimport { y } from './y';\n\nexport default function helper() {\n  return x();\n}\n\nexport const sendEmail = () => helper();\n";
        let (text, _) = SourceIsolator::default()
            .isolate_source(source, "sendEmail")
            .unwrap();

        assert_eq!(exported(&text), ["sendEmail"]);
        assert!(text.contains("\nfunction helper() {\n  return x();\n}\n"));
        assert!(!text.contains("export default"));
        assert!(!text.contains("./y"));
        assert_declared(&text, &["helper", "x"]);
    }

    #[test]
    fn test_isolate_keeps_default_exported_class() {
        let source = "export default class Mailer {\n  send(to: string) {\n    return to;\n  }\n}\n\nexport const sendEmail = (to: string) => new Mailer().send(to);\n";
        let (text, _) = SourceIsolator::default()
            .isolate_source(source, "sendEmail")
            .unwrap();

        assert_eq!(exported(&text), ["sendEmail"]);
        assert!(text.starts_with("class Mailer {"));
        assert_declared(&text, &["Mailer"]);
    }

    #[test]
    fn test_isolate_drops_unused_default_declarations() {
        let source = "export default function unused() {\n  return 1;\n}\n\nexport const sendEmail = () => 1;\n";
        let (text, _) = SourceIsolator::default()
            .isolate_source(source, "sendEmail")
            .unwrap();

        assert_eq!(exported(&text), ["sendEmail"]);
        assert!(!text.contains("unused"));

        let anonymous = "export default class extends Base {}\nexport const sendEmail = () => 1;\n";
        assert_eq!(exported(anonymous), ["default", "sendEmail"]);
        let (text, _) = SourceIsolator::default()
            .isolate_source(anonymous, "sendEmail")
            .unwrap();
        assert_eq!(text, "export const sendEmail = () => 1;\n");
    }

    #[test]
    fn test_isolate_local_export_alias() {
        let source = "import { sendMail } from './mail';\n\nconst x = async () => sendMail();\nconst y = 2;\n\nexport { x as sendEmail, y as other };\n";
        let (text, _) = SourceIsolator::default()
            .isolate_source(source, "sendEmail")
            .unwrap();

        assert_eq!(exported(&text), ["sendEmail"]);
        assert!(text.contains("export { x as sendEmail };"));
        assert!(!text.contains("const y"));
        assert_declared(&text, &["x", "sendMail"]);
    }

    #[test]
    fn test_isolate_overloaded_functions() {
        let source = "export function format(value: string): string;\n\
                      export function format(value: number): string;\n\
                      export function format(value: unknown): string {\n  return String(value);\n}\n\n\
                      export function sendEmail(to: string): string;\n\
                      export function sendEmail(to: string[]): string;\n\
                      export function sendEmail(to: string | string[]): string {\n  return format(to.toString());\n}\n\n\
                      export function unusedOverload(a: string): void;\n\
                      export function unusedOverload(a: unknown): void {}\n";
        let (text, report) = SourceIsolator::default()
            .isolate_source(source, "sendEmail")
            .unwrap();

        assert!(report.converged);
        assert_eq!(exported(&text), ["sendEmail"]);
        assert_eq!(text.matches("export function sendEmail(").count(), 3);
        assert_eq!(text.matches("function format(").count(), 3);
        assert!(!text.contains("export function format"));
        assert!(!text.contains("unusedOverload"));
        assert_declared(&text, &["format"]);
    }

    #[test]
    fn test_import_clause_pruning() {
        let source = "import D, { a, b as c, type T } from 'm';\nexport const x: T = c(a);\n";
        let (text, _) = SourceIsolator::default().isolate_source(source, "x").unwrap();
        assert!(text.contains("import { a, b as c, type T } from 'm';"));
    }

    #[test]
    fn test_mask_keeps_substitutions() {
        let masked = mask("const s = `a ${b} {c}`; // x {\n");
        assert!(masked.contains("${b}"));
        assert_eq!(bracket_delta(&masked), 0);
    }

    #[test]
    fn test_references() {
        assert!(references("foo(bar)", "bar"));
        assert!(references("[...bar]", "bar"));
        assert!(!references("obj.bar", "bar"));
        assert!(!references("barista", "bar"));
    }
}
