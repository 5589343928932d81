use std::process::ExitCode;

use pagesnap_lib::output::ArtifactKind;
use pagesnap_lib::{PdfRequest, ScreenshotRequest, SnapError, Viewport};

use super::RunContext;
use crate::cli::{ImageType, PageArgs};
use crate::formatting::{render_error, write_artifact};
use crate::settings::{resolve_locale, resolve_viewport, resolve_wait};

/// Run the pdf command.
pub async fn run_pdf(ctx: &RunContext<'_>, page: PageArgs) -> ExitCode {
    let locale = resolve_locale(page.lang.as_deref(), ctx.config);
    let request = PdfRequest {
        wait: resolve_wait(page.wait),
        path: page.output,
    };
    tracing::debug!(url = %page.url, %locale, "rendering pdf");

    let artifact = match ctx.renderer.pdf(&page.url, &locale, request).await {
        Ok(artifact) => artifact,
        Err(err) => return render_error(err, ctx.format),
    };
    if let Err(err) = write_artifact(artifact, ArtifactKind::Pdf, &page.url, ctx.format) {
        return render_error(SnapError::processing(err.to_string()), ctx.format);
    }
    ExitCode::SUCCESS
}

/// Run the screenshot command.
pub async fn run_screenshot(
    ctx: &RunContext<'_>,
    page: PageArgs,
    width: Option<u32>,
    height: Option<u32>,
    viewport: Option<Viewport>,
    image_type: ImageType,
) -> ExitCode {
    let locale = resolve_locale(page.lang.as_deref(), ctx.config);
    let request = ScreenshotRequest {
        wait: resolve_wait(page.wait),
        viewport: resolve_viewport(width, height, viewport, ctx.config),
        format: image_type.into(),
        path: page.output,
    };
    tracing::debug!(
        url = %page.url,
        %locale,
        viewport = %request.viewport,
        "capturing screenshot"
    );

    let artifact = match ctx.renderer.screenshot(&page.url, &locale, request).await {
        Ok(artifact) => artifact,
        Err(err) => return render_error(err, ctx.format),
    };
    if let Err(err) = write_artifact(artifact, ArtifactKind::Screenshot, &page.url, ctx.format) {
        return render_error(SnapError::processing(err.to_string()), ctx.format);
    }
    ExitCode::SUCCESS
}
