//! Deployable functions discovered in a project.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a function is invoked. Opaque to the pipeline; carried for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Http,
    Callable,
    Scheduled,
    Event,
    Unknown,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerKind::Http => "http",
            TriggerKind::Callable => "callable",
            TriggerKind::Scheduled => "scheduled",
            TriggerKind::Event => "event",
            TriggerKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One deployable function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Exported symbol name; unique within a project.
    pub entry_point: String,
    pub kind: TriggerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Trigger {
    pub fn new(entry_point: impl Into<String>, kind: TriggerKind) -> Self {
        Trigger {
            entry_point: entry_point.into(),
            kind,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Keep only the triggers named in `requested`, in discovery order.
///
/// An empty request selects every trigger. Any requested name without a
/// matching trigger is returned as `Err` with all missing names, in request
/// order.
pub fn select_triggers(
    triggers: Vec<Trigger>,
    requested: &[String],
) -> Result<Vec<Trigger>, Vec<String>> {
    if requested.is_empty() {
        return Ok(triggers);
    }

    let missing: Vec<String> = requested
        .iter()
        .filter(|name| !triggers.iter().any(|t| &t.entry_point == *name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }

    Ok(triggers
        .into_iter()
        .filter(|t| requested.contains(&t.entry_point))
        .collect())
}
