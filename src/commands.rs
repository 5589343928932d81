mod export;
mod inspect;

use pagesnap_lib::{Config, PageRenderer};

use crate::cli::OutputFormat;

pub use export::{run_pdf, run_screenshot};
pub use inspect::{run_html, run_metadata, run_preview};

/// State shared by every subcommand for one invocation.
pub struct RunContext<'a> {
    pub renderer: &'a PageRenderer,
    pub config: &'a Config,
    pub format: OutputFormat,
}
