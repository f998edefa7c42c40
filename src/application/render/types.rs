use std::fmt;

use serde::Serialize;

use crate::domain::entities::{CacheEntry, Fingerprint};

/// Why a render cycle did not produce MathML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Transport,
    InvalidJson,
    InvalidMathMl,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport",
            FailureKind::InvalidJson => "invalid_json",
            FailureKind::InvalidMathMl => "invalid_mathml",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing description of a failed render. Never carries daemon output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    pub kind: FailureKind,
    pub host: String,
    pub message: String,
}

impl RenderFailure {
    pub fn timeout(host: &str) -> Self {
        Self {
            kind: FailureKind::Timeout,
            host: host.to_string(),
            message: format!("Failed to parse (LaTeXML timeout from '{host}')"),
        }
    }

    pub fn transport(host: &str, detail: &str) -> Self {
        Self {
            kind: FailureKind::Transport,
            host: host.to_string(),
            message: format!(
                "Failed to parse (invalid response ('{detail}') from LaTeXML server '{host}')"
            ),
        }
    }

    pub fn invalid_json(host: &str) -> Self {
        Self {
            kind: FailureKind::InvalidJson,
            host: host.to_string(),
            message: format!("Failed to parse (LaTeXML server '{host}' returned invalid JSON)"),
        }
    }

    pub fn invalid_mathml(host: &str) -> Self {
        Self {
            kind: FailureKind::InvalidMathMl,
            host: host.to_string(),
            message: format!("Failed to parse (LaTeXML server '{host}' returned invalid MathML)"),
        }
    }

    /// Inline error markup shown in place of the formula.
    pub fn to_html(&self) -> String {
        format!(
            "<strong class=\"error texerror\">{}</strong>",
            super::embed::escape_text(&self.message)
        )
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a render cycle: exactly one of MathML or a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    Success { mathml: String },
    Failure(RenderFailure),
}

impl RenderResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderResult::Success { .. })
    }

    pub fn mathml(&self) -> Option<&str> {
        match self {
            RenderResult::Success { mathml } => Some(mathml),
            RenderResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RenderFailure> {
        match self {
            RenderResult::Success { .. } => None,
            RenderResult::Failure(failure) => Some(failure),
        }
    }
}

/// Terminal state reached by the render state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    CacheHit,
    Rendered,
    Failed,
}

/// Everything a caller needs after one render call, including what to persist.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub fingerprint: Fingerprint,
    pub state: RenderState,
    pub result: RenderResult,
    /// Set only when fresh MathML differs from what the store held.
    pub changed: Option<CacheEntry>,
}

impl RenderOutcome {
    pub fn is_changed(&self) -> bool {
        self.changed.is_some()
    }
}
