mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{test_config, wait_until, FakeLauncher, FakeState};
use pagesnap_lib::{
    html_cache_key, Artifact, ImageFormat, PageRenderer, PdfRequest, ScreenshotRequest,
    SnapError, Viewport,
};

fn renderer(max_slots: usize) -> (PageRenderer, Arc<FakeState>) {
    let launcher = FakeLauncher::new();
    let state = launcher.state.clone();
    (
        PageRenderer::new(&test_config(max_slots), Arc::new(launcher)),
        state,
    )
}

#[tokio::test(start_paused = true)]
async fn html_capture_twice_uses_one_page() {
    let (renderer, state) = renderer(4);

    let first = renderer.html("https://example.com", "en", None).await.unwrap();
    let second = renderer.html("https://example.com", "en", None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(state.pages_created(), 1);
    assert_eq!(FakeState::count(&state.content_calls), 1);
    assert_eq!(
        renderer
            .cache()
            .get(None, "html-https://example.com-en")
            .as_deref(),
        Some(first.as_str())
    );
    assert_eq!(
        state.accept_languages.lock().unwrap().as_slice(),
        ["en;q=0.7"]
    );
}

#[tokio::test(start_paused = true)]
async fn locales_are_cached_separately() {
    let (renderer, state) = renderer(4);

    renderer.html("https://example.com", "en", None).await.unwrap();
    renderer.html("https://example.com", "de", None).await.unwrap();

    assert_eq!(state.pages_created(), 2);
    assert!(renderer
        .cache()
        .get(None, &html_cache_key("https://example.com", "de"))
        .is_some());
    assert_eq!(
        state.accept_languages.lock().unwrap().as_slice(),
        ["en;q=0.7", "de;q=0.7"]
    );
}

#[tokio::test(start_paused = true)]
async fn blank_locale_falls_back_to_default() {
    let (renderer, state) = renderer(2);

    renderer.html("https://example.com", "  ", None).await.unwrap();

    assert_eq!(
        state.accept_languages.lock().unwrap().as_slice(),
        ["en;q=0.7"]
    );
    assert!(renderer
        .cache()
        .get(None, "html-https://example.com-en")
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn cached_html_expires_after_ttl() {
    let (renderer, state) = renderer(2);

    renderer.html("https://example.com", "en", None).await.unwrap();
    tokio::time::advance(Duration::from_secs(3600)).await;
    renderer.html("https://example.com", "en", None).await.unwrap();

    assert_eq!(state.pages_created(), 2);
}

#[tokio::test(start_paused = true)]
async fn blank_url_is_rejected_before_touching_the_pool() {
    let (renderer, state) = renderer(2);

    let err = renderer
        .pdf("", "en", PdfRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SnapError::InvalidInput { ref field, .. } if field == "url"));

    for result in [
        renderer.html("  ", "en", None).await.err(),
        renderer.metadata("", "en", None).await.err(),
        renderer.preview("", "en", None).await.err(),
    ] {
        assert!(matches!(result, Some(SnapError::InvalidInput { .. })));
    }
    let shot = renderer
        .screenshot("", "en", ScreenshotRequest::default())
        .await;
    assert!(matches!(shot, Err(SnapError::InvalidInput { .. })));

    assert_eq!(renderer.pool().in_use(), 0);
    assert_eq!(state.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_never_exceed_max_slots() {
    const MAX: usize = 3;
    let (renderer, state) = renderer(MAX);
    let renderer = Arc::new(renderer);
    let gate = state.install_gate();

    let mut tasks = Vec::new();
    for i in 0..MAX + 5 {
        let renderer = renderer.clone();
        tasks.push(tokio::spawn(async move {
            renderer
                .html(&format!("https://example.com/{i}"), "en", None)
                .await
        }));
    }

    wait_until(|| FakeState::count(&state.at_gate) == MAX).await;
    // Give the queued callers a chance to sneak past admission if they could.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(renderer.pool().in_use(), MAX);
    assert_eq!(state.pages_created(), MAX);
    assert_eq!(FakeState::count(&state.at_gate), MAX);

    gate.send(true).unwrap();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(state.pages_created(), MAX + 5);
    assert!(FakeState::count(&state.peak_live_pages) <= MAX);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(renderer.pool().in_use(), 0);
    assert_eq!(state.pages_closed(), MAX + 5);
}

#[tokio::test(start_paused = true)]
async fn aborted_operation_releases_its_slot() {
    let (renderer, state) = renderer(2);
    let renderer = Arc::new(renderer);
    let _gate = state.install_gate();

    let task = {
        let renderer = renderer.clone();
        tokio::spawn(async move { renderer.html("https://example.com", "en", None).await })
    };
    wait_until(|| FakeState::count(&state.at_gate) == 1).await;
    assert_eq!(renderer.pool().in_use(), 1);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    tokio::time::sleep(Duration::from_millis(5001)).await;
    assert_eq!(renderer.pool().in_use(), 0);
    assert_eq!(state.pages_closed(), 1);
    assert!(renderer
        .cache()
        .get(None, &html_cache_key("https://example.com", "en"))
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_navigation_releases_the_slot_once() {
    let (renderer, state) = renderer(1);
    state.fail_navigation.store(true, Ordering::SeqCst);

    let err = renderer
        .html("https://unreachable.invalid", "en", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapError::Navigation(_)));
    assert_eq!(renderer.pool().in_use(), 1);

    tokio::time::sleep(Duration::from_millis(5001)).await;
    assert_eq!(renderer.pool().in_use(), 0);
    assert_eq!(state.pages_closed(), 1);
    assert!(renderer
        .cache()
        .get(None, &html_cache_key("https://unreachable.invalid", "en"))
        .is_none());

    state.fail_navigation.store(false, Ordering::SeqCst);
    renderer
        .html("https://example.com", "en", None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(renderer.pool().in_use(), 0);
    assert_eq!(state.pages_closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_markup_is_a_processing_failure() {
    let (renderer, state) = renderer(1);
    state.set_html("");

    let err = renderer
        .html("https://example.com", "en", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapError::Processing(_)));
    assert!(renderer.cache().is_empty(None));
}

#[tokio::test(start_paused = true)]
async fn metadata_and_preview_reuse_captured_markup() {
    let (renderer, state) = renderer(2);

    let metadata = renderer
        .metadata("https://example.com", "en", None)
        .await
        .unwrap();
    let preview = renderer
        .preview("https://example.com", "en", Some(Duration::from_millis(250)))
        .await
        .unwrap();

    assert_eq!(state.pages_created(), 1);
    assert_eq!(metadata.title.as_deref(), Some("Example Domain"));
    assert_eq!(metadata.tag("og:type"), Some("article"));

    assert!(preview.preview_image.is_none());
    assert_eq!(preview.kind.as_deref(), Some("article"));
    assert_eq!(preview.site_name.as_deref(), Some("Example"));
    assert_eq!(preview.title.as_deref(), Some("Example Domain"));
    assert_eq!(preview.url, "https://example.com");
    assert_eq!(preview.favicons.len(), 1);
    assert_eq!(preview.favicons[0].href, "https://example.com/favicon.ico");
}

#[tokio::test(start_paused = true)]
async fn pdf_returns_bytes_and_releases_slot() {
    let (renderer, state) = renderer(2);

    let artifact = renderer
        .pdf("https://example.com", "en", PdfRequest::default())
        .await
        .unwrap();
    match artifact {
        Artifact::Bytes(data) => assert!(data.starts_with(b"%PDF")),
        other => panic!("expected bytes, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(renderer.pool().in_use(), 0);
    assert_eq!(state.pages_closed(), 1);
}

#[tokio::test]
async fn pdf_and_screenshot_write_to_requested_paths() {
    let (renderer, _state) = renderer(2);
    let dir = tempfile::tempdir().unwrap();
    let pdf_path = dir.path().join("out").join("page.pdf");
    let png_path = dir.path().join("shot.png");

    let pdf = renderer
        .pdf(
            "https://example.com",
            "en",
            PdfRequest {
                wait: Some(Duration::ZERO),
                path: Some(pdf_path.clone()),
            },
        )
        .await
        .unwrap();
    assert_eq!(pdf, Artifact::File(pdf_path.clone()));
    assert!(std::fs::read(&pdf_path).unwrap().starts_with(b"%PDF"));

    let shot = renderer
        .screenshot(
            "https://example.com",
            "en",
            ScreenshotRequest {
                wait: Some(Duration::ZERO),
                format: ImageFormat::Png,
                path: Some(png_path.clone()),
                ..ScreenshotRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(shot, Artifact::File(png_path.clone()));
    assert!(!std::fs::read(&png_path).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn screenshot_applies_viewport_and_format() {
    let (renderer, state) = renderer(2);

    renderer
        .screenshot(
            "https://example.com",
            "en",
            ScreenshotRequest {
                viewport: Viewport::new(800, 600),
                format: ImageFormat::Webp,
                ..ScreenshotRequest::default()
            },
        )
        .await
        .unwrap();
    renderer
        .screenshot(
            "https://example.com",
            "en",
            ScreenshotRequest {
                viewport: Viewport::new(0, 0),
                ..ScreenshotRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        state.viewports.lock().unwrap().as_slice(),
        [Viewport::new(800, 600), Viewport::new(1920, 1080)]
    );
    assert_eq!(
        state.formats.lock().unwrap().as_slice(),
        [ImageFormat::Webp, ImageFormat::Jpeg]
    );
}

#[tokio::test(start_paused = true)]
async fn engine_start_failure_leaves_pool_untouched() {
    let (renderer, state) = renderer(2);
    state.fail_launch.store(true, Ordering::SeqCst);

    let err = renderer
        .html("https://example.com", "en", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapError::EngineStart(_)));
    assert_eq!(renderer.pool().in_use(), 0);
    assert_eq!(state.pages_created(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_release_then_refuses_work() {
    let (renderer, state) = renderer(2);

    renderer.html("https://example.com", "en", None).await.unwrap();
    renderer.shutdown().await;

    assert_eq!(state.pages_closed(), 1);
    assert_eq!(FakeState::count(&state.engine_closes), 1);
    assert!(!renderer.pool().engines().is_running().await);

    let err = renderer
        .html("https://example.com/other", "en", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapError::Processing(_)));
}
