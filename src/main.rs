mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;

use pagesnap_lib::{ChromiumLauncher, PageRenderer};
use tracing_subscriber::EnvFilter;

use cli::Commands;
use commands::{run_html, run_metadata, run_pdf, run_preview, run_screenshot, RunContext};
use settings::{format_effective_config, load_config};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = cli::parse();
    init_tracing(args.verbose);

    let config = match load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return formatting::render_error(err, args.format),
    };
    tracing::debug!("{}", format_effective_config(&config, args.config.as_deref()));

    let renderer = PageRenderer::start(&config, Arc::new(ChromiumLauncher));
    let ctx = RunContext {
        renderer: &renderer,
        config: &config,
        format: args.format,
    };

    tracing::debug!(url = %args.command.page().url, "starting");
    let code = match args.command {
        Commands::Pdf { page } => run_pdf(&ctx, page).await,
        Commands::Screenshot {
            page,
            width,
            height,
            viewport,
            image_type,
        } => run_screenshot(&ctx, page, width, height, viewport, image_type).await,
        Commands::Html { page } => run_html(&ctx, page).await,
        Commands::Metadata { page } => run_metadata(&ctx, page).await,
        Commands::Preview { page } => run_preview(&ctx, page).await,
    };

    renderer.shutdown().await;
    code
}

/// Log to stderr so stdout stays reserved for artifacts and JSON.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "pagesnap=debug,pagesnap_lib=debug"
    } else {
        "pagesnap=info,pagesnap_lib=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
