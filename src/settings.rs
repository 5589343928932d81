use std::path::Path;
use std::time::Duration;

use pagesnap_lib::{Config, SnapError, Viewport};

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/pagesnap/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, SnapError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        SnapError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        SnapError::Config(prefix)
    })?;
    Ok(cfg)
}

/// `--lang` when given and non-blank, else the configured default locale.
pub fn resolve_locale(cli_lang: Option<&str>, config: &Config) -> String {
    cli_lang
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(&config.default_locale)
        .to_string()
}

pub fn resolve_wait(cli_wait_ms: Option<u64>) -> Option<Duration> {
    cli_wait_ms.map(Duration::from_millis)
}

/// `--viewport` wins; otherwise `--width`/`--height` each override the
/// configured window size.
pub fn resolve_viewport(
    cli_width: Option<u32>,
    cli_height: Option<u32>,
    cli_viewport: Option<Viewport>,
    config: &Config,
) -> Viewport {
    if let Some(viewport) = cli_viewport {
        return viewport;
    }
    let window = config.engine.window;
    Viewport::new(
        cli_width.unwrap_or(window.width),
        cli_height.unwrap_or(window.height),
    )
    .or_default_dimensions()
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &Config, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    format!(
        "Effective config [{source}]: locale={}, window={}, headless={}, pool: max_slots={}, settle={}ms, release_delay={}ms, network-idle: max_inflight={}, window={}ms, timeout={}s, engine idle={}s (poll {}s, policy {:?}), cache ttl={}s",
        config.default_locale,
        config.engine.window,
        config.engine.headless,
        config.pool.max_slots,
        config.pool.settle.as_millis(),
        config.pool.release_delay.as_millis(),
        config.pool.network_idle.max_inflight,
        config.pool.network_idle.idle_window.as_millis(),
        config.pool.network_idle.timeout.as_secs(),
        config.engine.idle_period.as_secs(),
        config.engine.idle_poll_interval.as_secs(),
        config.engine.idle_policy,
        config.cache.default_ttl.as_secs(),
    )
}
