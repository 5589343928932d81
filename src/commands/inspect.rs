use std::process::ExitCode;

use pagesnap_lib::output::{MetadataOutput, PreviewOutput, PAGESNAP_OUTPUT_VERSION};
use pagesnap_lib::{SnapError, SnapOutput};

use super::RunContext;
use crate::cli::PageArgs;
use crate::formatting::{render_error, write_html, write_output};
use crate::settings::{resolve_locale, resolve_wait};

/// Run the html command.
pub async fn run_html(ctx: &RunContext<'_>, page: PageArgs) -> ExitCode {
    let locale = resolve_locale(page.lang.as_deref(), ctx.config);
    let html = match ctx
        .renderer
        .html(&page.url, &locale, resolve_wait(page.wait))
        .await
    {
        Ok(html) => html,
        Err(err) => return render_error(err, ctx.format),
    };
    if let Err(err) = write_html(&html, &page.url, ctx.format, page.output.as_deref()) {
        return render_error(SnapError::processing(err.to_string()), ctx.format);
    }
    ExitCode::SUCCESS
}

/// Run the metadata command.
pub async fn run_metadata(ctx: &RunContext<'_>, page: PageArgs) -> ExitCode {
    let locale = resolve_locale(page.lang.as_deref(), ctx.config);
    let metadata = match ctx
        .renderer
        .metadata(&page.url, &locale, resolve_wait(page.wait))
        .await
    {
        Ok(metadata) => metadata,
        Err(err) => return render_error(err, ctx.format),
    };
    let body = SnapOutput::Metadata(MetadataOutput {
        version: PAGESNAP_OUTPUT_VERSION.to_string(),
        metadata,
    });
    finish(ctx, &body, &page)
}

/// Run the preview command.
pub async fn run_preview(ctx: &RunContext<'_>, page: PageArgs) -> ExitCode {
    let locale = resolve_locale(page.lang.as_deref(), ctx.config);
    let preview = match ctx
        .renderer
        .preview(&page.url, &locale, resolve_wait(page.wait))
        .await
    {
        Ok(preview) => preview,
        Err(err) => return render_error(err, ctx.format),
    };
    let body = SnapOutput::Preview(PreviewOutput {
        version: PAGESNAP_OUTPUT_VERSION.to_string(),
        preview,
    });
    finish(ctx, &body, &page)
}

fn finish(ctx: &RunContext<'_>, body: &SnapOutput, page: &PageArgs) -> ExitCode {
    if let Err(err) = write_output(body, ctx.format, page.output.as_deref()) {
        return render_error(SnapError::processing(err.to_string()), ctx.format);
    }
    ExitCode::SUCCESS
}
