use clap::{Args, Parser, Subcommand, ValueEnum};
use pagesnap_lib::{ImageFormat, Viewport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pagesnap")]
#[command(
    version,
    about = "Pagesnap - Render web pages with a shared headless browser",
    long_about = "Pagesnap\n\nModes:\n- pdf: print a page to a Letter-sized PDF.\n- screenshot: capture the viewport as JPEG, PNG or WebP.\n- html: capture rendered markup (cached per URL and locale).\n- metadata: extract standard and Open Graph metadata.\n- preview: build a link-preview record.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for engine, pool and cache settings; CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "json",
        help = "Output format for JSON documents"
    )]
    pub format: OutputFormat,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    #[arg(long, help = "Page URL to render")]
    pub url: String,

    #[arg(long, help = "Locale sent as Accept-Language (defaults to config)")]
    pub lang: Option<String>,

    #[arg(
        long,
        value_name = "MS",
        help = "Settle time in milliseconds after navigation (defaults to config)"
    )]
    pub wait: Option<u64>,

    #[arg(long, short, help = "Output file path (stdout if omitted)")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a page to PDF
    Pdf {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Capture a screenshot of the page viewport
    Screenshot {
        #[command(flatten)]
        page: PageArgs,

        #[arg(long, help = "Viewport width in pixels")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height in pixels")]
        height: Option<u32>,

        #[arg(
            long,
            conflicts_with_all = ["width", "height"],
            help = "Viewport dimensions (WIDTHxHEIGHT)"
        )]
        viewport: Option<Viewport>,

        #[arg(long = "type", value_enum, default_value = "jpeg", help = "Image format")]
        image_type: ImageType,
    },

    /// Capture rendered HTML
    Html {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Extract page metadata as JSON
    Metadata {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Build a link-preview record as JSON
    Preview {
        #[command(flatten)]
        page: PageArgs,
    },
}

impl Commands {
    pub fn page(&self) -> &PageArgs {
        match self {
            Commands::Pdf { page }
            | Commands::Screenshot { page, .. }
            | Commands::Html { page }
            | Commands::Metadata { page }
            | Commands::Preview { page } => page,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum ImageType {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl From<ImageType> for ImageFormat {
    fn from(value: ImageType) -> Self {
        match value {
            ImageType::Jpeg => ImageFormat::Jpeg,
            ImageType::Png => ImageFormat::Png,
            ImageType::Webp => ImageFormat::Webp,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
