//! TeX to MathML rendering through LaTeXML daemons.
//!
//! The engine decides whether a cached conversion can be reused, otherwise
//! posts the expression to a randomly picked daemon, validates the reply and
//! hands back either MathML or a typed failure. Persisting and embedding the
//! result happen around that core: [`RenderEngine::render_and_store`] writes
//! changed entries, [`RenderEngine::render_markup`] also produces the inline
//! fragment.

mod client;
mod embed;
mod engine;
mod host;
mod runtime;
mod types;
mod validate;

pub use client::{ConversionClient, ConversionError};
pub use embed::MarkupEmbedder;
pub use engine::{RenderEngine, RenderEngineConfig};
pub(crate) use engine::{
    METRIC_CACHE_HIT, METRIC_CACHE_INVALID, METRIC_CACHE_MISS, METRIC_DAEMON_REQUEST_MS,
    METRIC_RENDER_FAILURE,
};
pub use host::{DaemonHosts, HostError};
pub use runtime::{InFlightRenders, RenderGuard};
pub use types::{FailureKind, RenderFailure, RenderOutcome, RenderResult, RenderState};
pub use validate::{
    DaemonEnvelope, EnvelopeError, MATHML_NAMESPACE, is_valid_markup, parse_envelope,
};
