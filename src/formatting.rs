use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;

use pagesnap_lib::output::{ArtifactKind, PAGESNAP_OUTPUT_VERSION};
use pagesnap_lib::{Artifact, ArtifactOutput, ErrorOutput, SnapError, SnapOutput};

use crate::cli::OutputFormat;

/// Write a JSON document in the requested format.
pub fn write_output(
    body: &SnapOutput,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output)?,
        OutputFormat::Pretty => write_pretty_output(body, output)?,
    };
    Ok(())
}

/// Stream raw bytes to stdout, or describe the file the artifact was written to.
pub fn write_artifact(
    artifact: Artifact,
    kind: ArtifactKind,
    url: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match artifact {
        Artifact::Bytes(data) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
            Ok(())
        }
        Artifact::File(path) => {
            let bytes = std::fs::metadata(&path)?.len();
            let body = SnapOutput::Artifact(ArtifactOutput {
                version: PAGESNAP_OUTPUT_VERSION.to_string(),
                kind,
                url: url.to_string(),
                path,
                bytes,
            });
            write_output(&body, format, None)
        }
    }
}

/// Print captured markup, or save it and describe the file.
pub fn write_html(
    html: &str,
    url: &str,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        None => {
            println!("{html}");
            Ok(())
        }
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, html)?;
            write_artifact(
                Artifact::File(path.to_path_buf()),
                ArtifactKind::Html,
                url,
                format,
            )
        }
    }
}

/// Render an error to stdout and return the fatal exit code.
pub fn render_error(err: SnapError, format: OutputFormat) -> ExitCode {
    let payload = SnapOutput::Error(ErrorOutput {
        version: PAGESNAP_OUTPUT_VERSION.to_string(),
        error: err.to_payload(),
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            println!("{content}");
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, None) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    ExitCode::from(2)
}

fn write_json_output(
    body: &SnapOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &SnapOutput, output: Option<&Path>) -> io::Result<()> {
    let use_human = output.is_none() && std::io::stdout().is_terminal();

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &SnapOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        SnapOutput::Artifact(out) => {
            let header = color("[SAVED]", "32", colorize);
            writeln!(
                buf,
                "{} {:?} of {} ({} bytes)",
                header, out.kind, out.url, out.bytes
            )
            .ok();
            writeln!(buf, "Path: {}", out.path.display()).ok();
        }
        SnapOutput::Metadata(out) => {
            let meta = &out.metadata;
            let header = color("[METADATA]", "36", colorize);
            writeln!(buf, "{} {}", header, meta.url).ok();
            let fields = [
                ("title", meta.title.as_deref()),
                ("description", meta.description.as_deref()),
                ("canonical", meta.canonical.as_deref()),
                ("lang", meta.lang.as_deref()),
            ];
            for (label, value) in fields {
                if let Some(value) = value {
                    writeln!(buf, "- {:12} {}", label, value).ok();
                }
            }
            if !meta.tags.is_empty() {
                writeln!(buf, "Tags:").ok();
                for (key, value) in &meta.tags {
                    writeln!(buf, "- {:24} {}", key, value).ok();
                }
            }
            if !meta.favicons.is_empty() {
                writeln!(buf, "Favicons:").ok();
                for icon in &meta.favicons {
                    writeln!(buf, "- {}", icon.href).ok();
                }
            }
        }
        SnapOutput::Preview(out) => {
            let preview = &out.preview;
            let header = color("[PREVIEW]", "34", colorize);
            writeln!(
                buf,
                "{} {}",
                header,
                preview.title.as_deref().unwrap_or("(untitled)")
            )
            .ok();
            writeln!(buf, "URL: {}", preview.url).ok();
            let fields = [
                ("description", preview.description.as_deref()),
                ("site", preview.site_name.as_deref()),
                ("type", preview.kind.as_deref()),
                ("image", preview.preview_image.as_deref()),
                ("locale", preview.locale.as_deref()),
            ];
            for (label, value) in fields {
                if let Some(value) = value {
                    writeln!(buf, "- {:12} {}", label, value).ok();
                }
            }
            if let Some(icon) = preview.favicons.first() {
                writeln!(buf, "- {:12} {}", "favicon", icon.href).ok();
            }
        }
        SnapOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            writeln!(buf, "{} {}", header, out.error.message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}
