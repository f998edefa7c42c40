use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use httpmock::MockServer;
use latexml_render::application::render::{
    DaemonHosts, FailureKind, MarkupEmbedder, RenderEngine, RenderEngineConfig, RenderState,
};
use latexml_render::application::repos::MathCache;
use latexml_render::domain::entities::RenderRequest;
use latexml_render::domain::settings::SettingsValue;
use latexml_render::infra::cache::{FileMathCache, MemoryMathCache};
use latexml_render::infra::latexml::HttpConversionClient;
use latexml_render::infra::pages::StaticFormulaPages;
use tempfile::TempDir;

const MATHML: &str = r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi></math>"#;

fn engine_with(server: &MockServer, cache: Arc<dyn MathCache>, timeout: Duration) -> RenderEngine {
    let pages = Arc::new(StaticFormulaPages::new(["Formula:known"]));
    RenderEngine::new(
        RenderEngineConfig {
            hosts: DaemonHosts::Single(server.url("/convert")),
            timeout,
            default_settings: SettingsValue::from("format=xhtml"),
        },
        Arc::new(HttpConversionClient::new().expect("http client")),
        cache,
        MarkupEmbedder::new("/w/", pages),
    )
}

fn memory_cache() -> Arc<dyn MathCache> {
    Arc::new(MemoryMathCache::new(
        NonZeroUsize::new(16).expect("non-zero capacity"),
    ))
}

#[tokio::test]
async fn rendered_formula_is_cached_and_linked() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/convert")
            .body("format=xhtml&tex=x");
        then.status(200)
            .header("content-type", "application/json")
            .body(serde_json::json!({ "result": MATHML, "status": "No obvious problems" }).to_string());
    });

    let engine = engine_with(&server, memory_cache(), Duration::from_secs(5));
    let request = RenderRequest::new("x").with_label("known").with_tag_id("eq 1");

    let (first, markup) = engine.render_markup(&request).await;
    assert_eq!(first.state, RenderState::Rendered);
    assert!(first.is_changed());
    assert_eq!(
        markup,
        format!(r#"<a title="Formula:known" href="/w/index.php?title=Formula:known" id="eq_1">{MATHML}</a>"#)
    );

    let (second, _) = engine.render_markup(&request).await;
    assert_eq!(second.state, RenderState::CacheHit);
    assert!(!second.is_changed());
    mock.assert_hits(1);
}

#[tokio::test]
async fn missing_formula_page_renders_as_redlink() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/convert");
        then.status(200)
            .body(serde_json::json!({ "result": MATHML }).to_string());
    });

    let engine = engine_with(&server, memory_cache(), Duration::from_secs(5));
    let request = RenderRequest::new("x").with_label("unknown");

    let (_, markup) = engine.render_markup(&request).await;
    assert!(markup.starts_with(
        r#"<a class="new" title="Formula:unknown" href="/w/index.php?title=Formula:unknown&amp;action=edit&amp;redlink=1">"#
    ));
}

#[tokio::test]
async fn daemon_error_status_is_reported_and_not_cached() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/convert");
        then.status(502).body("bad gateway");
    });

    let engine = engine_with(&server, memory_cache(), Duration::from_secs(5));
    let request = RenderRequest::new("x");

    let (outcome, markup) = engine.render_markup(&request).await;
    let failure = outcome.result.failure().expect("failure");
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(markup.starts_with(r#"<strong class="error texerror">"#));
    assert!(!markup.contains("bad gateway"));

    let (again, _) = engine.render_markup(&request).await;
    assert_eq!(again.state, RenderState::Failed);
    mock.assert_hits(2);
}

#[tokio::test]
async fn invalid_mathml_from_daemon_never_reaches_the_page() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/convert");
        then.status(200)
            .body(serde_json::json!({ "result": "<math><mi>x</math>", "log": "broken" }).to_string());
    });

    let engine = engine_with(&server, memory_cache(), Duration::from_secs(5));
    let (outcome, markup) = engine.render_markup(&RenderRequest::new("x")).await;

    assert_eq!(
        outcome.result.failure().map(|failure| failure.kind),
        Some(FailureKind::InvalidMathMl)
    );
    assert!(!markup.contains("<mi>"));
}

#[tokio::test]
async fn slow_daemon_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/convert");
        then.status(200)
            .delay(Duration::from_secs(3))
            .body(serde_json::json!({ "result": MATHML }).to_string());
    });

    let engine = engine_with(&server, memory_cache(), Duration::from_millis(200));
    let (outcome, markup) = engine.render_markup(&RenderRequest::new("x")).await;

    assert_eq!(
        outcome.result.failure().map(|failure| failure.kind),
        Some(FailureKind::Timeout)
    );
    assert!(markup.contains("LaTeXML timeout"));
}

#[tokio::test]
async fn file_cache_is_shared_across_engines() {
    let dir = TempDir::new().expect("temp dir");
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/convert");
        then.status(200)
            .body(serde_json::json!({ "result": MATHML }).to_string());
    });

    let request = RenderRequest::new(r"\frac{a}{b}");
    let first = engine_with(
        &server,
        Arc::new(FileMathCache::new(dir.path()).expect("cache")),
        Duration::from_secs(5),
    );
    let (rendered, _) = first.render_markup(&request).await;
    assert_eq!(rendered.state, RenderState::Rendered);

    let second = engine_with(
        &server,
        Arc::new(FileMathCache::new(dir.path()).expect("cache")),
        Duration::from_secs(5),
    );
    let (cached, markup) = second.render_markup(&request).await;
    assert_eq!(cached.state, RenderState::CacheHit);
    assert_eq!(markup, format!(r#"<span class="tex" dir="ltr">{MATHML}</span>"#));
    mock.assert_hits(1);
}

#[tokio::test]
async fn force_refresh_asks_the_daemon_again() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/convert");
        then.status(200)
            .body(serde_json::json!({ "result": MATHML }).to_string());
    });

    let engine = engine_with(&server, memory_cache(), Duration::from_secs(5));
    let request = RenderRequest::new("x");
    engine.render_markup(&request).await;

    let (forced, _) = engine
        .render_markup(&request.clone().with_force_refresh(true))
        .await;
    assert_eq!(forced.state, RenderState::Rendered);
    mock.assert_hits(2);
}
