use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use latexml_render::application::render::{
    ConversionClient, ConversionError, DaemonHosts, MarkupEmbedder, RenderEngine,
    RenderEngineConfig,
};
use latexml_render::application::repos::MathCache;
use latexml_render::domain::entities::{CacheEntry, RenderRequest};
use latexml_render::domain::settings::SettingsValue;
use latexml_render::infra::cache::MemoryMathCache;
use latexml_render::infra::pages::StaticFormulaPages;
use latexml_render::infra::telemetry;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

const MATHML: &str = "<math><mn>1</mn></math>";

/// Answers with valid MathML for `1`, fails for everything else.
struct ScriptedDaemon {
    calls: AtomicUsize,
}

#[async_trait]
impl ConversionClient for ScriptedDaemon {
    async fn request(
        &self,
        host: &str,
        body: &str,
        _timeout: Duration,
    ) -> Result<String, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if body.ends_with("tex=1") {
            Ok(serde_json::json!({ "result": MATHML }).to_string())
        } else {
            Err(ConversionError::transport(host, "connection refused"))
        }
    }
}

#[tokio::test]
async fn render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let cache = Arc::new(MemoryMathCache::new(
        NonZeroUsize::new(8).expect("non-zero capacity"),
    ));
    let daemon = Arc::new(ScriptedDaemon {
        calls: AtomicUsize::new(0),
    });
    let engine = RenderEngine::new(
        RenderEngineConfig {
            hosts: DaemonHosts::Single("http://latexml.test/convert".to_string()),
            timeout: Duration::from_secs(1),
            default_settings: SettingsValue::from("format=xhtml"),
        },
        daemon.clone(),
        cache.clone(),
        MarkupEmbedder::new("/w", Arc::new(StaticFormulaPages::default())),
    );

    // miss, then hit
    let ok = RenderRequest::new("1");
    engine.render_and_store(&ok).await;
    engine.render_and_store(&ok).await;

    // invalid entry
    let broken = RenderRequest::new("2");
    cache
        .write(
            &engine.fingerprint(&broken),
            &CacheEntry::new("2", "<math><mn>2</math>", None),
        )
        .await
        .expect("seed broken entry");
    // failure
    engine.render_and_store(&broken).await;

    // forced refresh skips the lookup and is not a miss
    engine
        .render_and_store(&ok.clone().with_force_refresh(true))
        .await;

    assert_eq!(daemon.calls.load(Ordering::SeqCst), 3);

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let misses = snapshot
        .iter()
        .find(|(composite_key, _, _, _)| {
            composite_key.key().name() == "latexml_render_cache_miss_total"
        })
        .map(|(_, _, _, value)| value.clone());
    assert_eq!(misses, Some(&DebugValue::Counter(2)));

    let expected = [
        "latexml_render_cache_hit_total",
        "latexml_render_cache_miss_total",
        "latexml_render_cache_invalid_total",
        "latexml_render_failure_total",
        "latexml_render_daemon_request_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
