use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::application::repos::{CacheError, MathCache};
use crate::domain::entities::{CacheEntry, Fingerprint, RenderRequest};
use crate::domain::settings::{SettingsValue, post_data, resolve_settings};

use super::client::{ConversionClient, ConversionError};
use super::embed::MarkupEmbedder;
use super::host::DaemonHosts;
use super::runtime::InFlightRenders;
use super::types::{RenderFailure, RenderOutcome, RenderResult, RenderState};
use super::validate::{is_valid_markup, parse_envelope};

pub(crate) const METRIC_CACHE_HIT: &str = "latexml_render_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "latexml_render_cache_miss_total";
pub(crate) const METRIC_CACHE_INVALID: &str = "latexml_render_cache_invalid_total";
pub(crate) const METRIC_RENDER_FAILURE: &str = "latexml_render_failure_total";
pub(crate) const METRIC_DAEMON_REQUEST_MS: &str = "latexml_render_daemon_request_ms";

const TARGET: &str = "application::render::engine";

/// Daemon addresses, timeout and default options the engine renders with.
#[derive(Debug, Clone)]
pub struct RenderEngineConfig {
    pub hosts: DaemonHosts,
    pub timeout: Duration,
    pub default_settings: SettingsValue,
}

/// Cache-aware TeX to MathML conversion through LaTeXML daemons.
pub struct RenderEngine {
    config: RenderEngineConfig,
    client: Arc<dyn ConversionClient>,
    cache: Arc<dyn MathCache>,
    embedder: MarkupEmbedder,
    in_flight: InFlightRenders,
}

/// Options and cache key resolved once per render call.
struct Prepared {
    settings: SettingsValue,
    fingerprint: Fingerprint,
}

impl RenderEngine {
    pub fn new(
        config: RenderEngineConfig,
        client: Arc<dyn ConversionClient>,
        cache: Arc<dyn MathCache>,
        embedder: MarkupEmbedder,
    ) -> Self {
        Self {
            config,
            client,
            cache,
            embedder,
            in_flight: InFlightRenders::new(),
        }
    }

    fn prepare(&self, request: &RenderRequest) -> Prepared {
        let settings = resolve_settings(request.settings.as_ref(), &self.config.default_settings);
        let fingerprint = Fingerprint::compute(request.tex(), &settings.serialize());
        Prepared {
            settings,
            fingerprint,
        }
    }

    pub fn fingerprint(&self, request: &RenderRequest) -> Fingerprint {
        self.prepare(request).fingerprint
    }

    /// The form body posted to the daemon for this request.
    pub fn post_data(&self, request: &RenderRequest) -> String {
        post_data(request.tex(), &self.prepare(request).settings)
    }

    /// Run one render cycle without touching the cache's write side.
    ///
    /// A cached entry is served only when its MathML still validates; a
    /// corrupt entry is treated like a miss.
    pub async fn render(&self, request: &RenderRequest) -> RenderOutcome {
        let prepared = self.prepare(request);
        let fingerprint = prepared.fingerprint.clone();

        let previous = if request.force_refresh {
            info!(
                target = TARGET,
                op = "engine::render",
                fingerprint = %fingerprint,
                "Rerendering was requested"
            );
            None
        } else {
            match self.lookup(&fingerprint).await {
                Lookup::Hit(entry) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    return RenderOutcome {
                        fingerprint,
                        state: RenderState::CacheHit,
                        result: RenderResult::Success {
                            mathml: entry.mathml,
                        },
                        changed: None,
                    };
                }
                Lookup::Invalid(entry) => {
                    counter!(METRIC_CACHE_INVALID).increment(1);
                    counter!(METRIC_CACHE_MISS).increment(1);
                    Some(entry)
                }
                Lookup::Miss => {
                    counter!(METRIC_CACHE_MISS).increment(1);
                    None
                }
            }
        };

        match self.convert(request, &prepared).await {
            Ok(mathml) => {
                let changed = previous.is_none_or(|entry| {
                    entry.mathml != mathml || entry.label != request.label
                });
                let entry = changed
                    .then(|| CacheEntry::new(request.tex(), mathml.clone(), request.label.clone()));
                RenderOutcome {
                    fingerprint,
                    state: RenderState::Rendered,
                    result: RenderResult::Success { mathml },
                    changed: entry,
                }
            }
            Err(failure) => {
                counter!(METRIC_RENDER_FAILURE, "kind" => failure.kind.as_str()).increment(1);
                RenderOutcome {
                    fingerprint,
                    state: RenderState::Failed,
                    result: RenderResult::Failure(failure),
                    changed: None,
                }
            }
        }
    }

    /// Persist freshly rendered MathML. Returns whether anything was written.
    pub async fn write_cache(&self, outcome: &RenderOutcome) -> Result<bool, CacheError> {
        let Some(entry) = outcome.changed.as_ref() else {
            return Ok(false);
        };
        self.cache.write(&outcome.fingerprint, entry).await?;
        debug!(
            target = TARGET,
            op = "engine::write_cache",
            fingerprint = %outcome.fingerprint,
            mathml_bytes = entry.mathml.len(),
            "Stored rendered MathML"
        );
        Ok(true)
    }

    /// Render and persist, one render per fingerprint at a time.
    ///
    /// A cache write failure is logged; the rendered result is still returned.
    pub async fn render_and_store(&self, request: &RenderRequest) -> RenderOutcome {
        let fingerprint = self.fingerprint(request);
        let _guard = self.in_flight.acquire(&fingerprint).await;

        let outcome = self.render(request).await;
        if let Err(err) = self.write_cache(&outcome).await {
            warn!(
                target = TARGET,
                op = "engine::render_and_store",
                result = "cache_write_error",
                fingerprint = %fingerprint,
                error = %err,
                "Failed to store rendered MathML"
            );
        }
        outcome
    }

    /// Render, persist and embed: the markup to place in the page.
    pub async fn render_markup(&self, request: &RenderRequest) -> (RenderOutcome, String) {
        let outcome = self.render_and_store(request).await;
        let markup = match &outcome.result {
            RenderResult::Success { mathml } => {
                self.embedder
                    .embed(mathml, request.label.as_deref(), request.tag_id.as_deref())
                    .await
            }
            RenderResult::Failure(failure) => failure.to_html(),
        };
        (outcome, markup)
    }

    async fn lookup(&self, fingerprint: &Fingerprint) -> Lookup {
        match self.cache.read(fingerprint).await {
            Ok(Some(entry)) if is_valid_markup(&entry.mathml) => {
                debug!(
                    target = TARGET,
                    op = "engine::lookup",
                    result = "cache_hit",
                    fingerprint = %fingerprint,
                    "Valid entry found in cache"
                );
                Lookup::Hit(entry)
            }
            Ok(Some(entry)) => {
                warn!(
                    target = TARGET,
                    op = "engine::lookup",
                    result = "cache_invalid",
                    fingerprint = %fingerprint,
                    "Malformed entry found in cache; re-rendering"
                );
                Lookup::Invalid(entry)
            }
            Ok(None) => {
                debug!(
                    target = TARGET,
                    op = "engine::lookup",
                    result = "cache_miss",
                    fingerprint = %fingerprint,
                    "No entry found in cache"
                );
                Lookup::Miss
            }
            Err(err) => {
                warn!(
                    target = TARGET,
                    op = "engine::lookup",
                    result = "cache_read_error",
                    fingerprint = %fingerprint,
                    error = %err,
                    "Failed to read cache entry; re-rendering"
                );
                Lookup::Miss
            }
        }
    }

    async fn convert(
        &self,
        request: &RenderRequest,
        prepared: &Prepared,
    ) -> Result<String, RenderFailure> {
        let host = self.config.hosts.pick().map_err(|err| {
            warn!(
                target = TARGET,
                op = "engine::convert",
                result = "error",
                error_code = "no_host",
                error = %err,
                "No LaTeXML daemon to send the request to"
            );
            RenderFailure::transport("", &err.to_string())
        })?;
        let post = post_data(request.tex(), &prepared.settings);
        let timeout = self.config.timeout;

        let started_at = Instant::now();
        let response =
            match tokio::time::timeout(timeout, self.client.request(host, &post, timeout)).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(
                        target = TARGET,
                        op = "engine::convert",
                        result = "error",
                        error_code = "timeout",
                        host,
                        post = %post,
                        timeout_ms = timeout.as_millis() as u64,
                        "LaTeXML request exceeded the timeout"
                    );
                    Err(ConversionError::timeout(host))
                }
            };
        histogram!(METRIC_DAEMON_REQUEST_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let raw = response.map_err(|err| match err {
            ConversionError::Timeout { host } => RenderFailure::timeout(&host),
            ConversionError::Transport { host, detail } => RenderFailure::transport(&host, &detail),
        })?;

        let envelope = parse_envelope(&raw).map_err(|err| {
            warn!(
                target = TARGET,
                op = "engine::convert",
                result = "error",
                error_code = "invalid_json",
                host,
                post = %post,
                response = %raw,
                error = %err,
                "LaTeXML returned invalid JSON"
            );
            RenderFailure::invalid_json(host)
        })?;

        let mathml = envelope.markup();
        if !is_valid_markup(mathml) {
            // The markup is likely verbose or broken; it goes to the log only.
            warn!(
                target = TARGET,
                op = "engine::convert",
                result = "error",
                error_code = "invalid_mathml",
                host,
                post = %post,
                result_markup = %mathml,
                daemon_status = envelope.status().unwrap_or_default(),
                daemon_log = envelope.log().unwrap_or_default(),
                "LaTeXML returned invalid MathML"
            );
            return Err(RenderFailure::invalid_mathml(host));
        }

        info!(
            target = TARGET,
            op = "engine::convert",
            result = "rendered",
            host,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            mathml_bytes = mathml.len(),
            "Rendered TeX through LaTeXML"
        );
        Ok(mathml.to_string())
    }
}

enum Lookup {
    Hit(CacheEntry),
    Invalid(CacheEntry),
    Miss,
}
