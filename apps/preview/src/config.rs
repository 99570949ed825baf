use std::time::Duration;

use anyhow::{Context, Result};

use crate::layout::{default_geometry, PageFormat, PageGeometry};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Geometry used when a preview request does not carry its own.
    pub page_geometry: PageGeometry,
    pub allow_widow_orphans: bool,
    /// Delay before a preview pass runs, letting the upstream measurement settle.
    pub settle_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = default_geometry();
        let page_geometry = PageGeometry {
            format: match std::env::var("PAGE_FORMAT") {
                Ok(v) => v
                    .parse::<PageFormat>()
                    .map_err(anyhow::Error::msg)
                    .context("PAGE_FORMAT must be 'a4' or 'letter'")?,
                Err(_) => defaults.format,
            },
            margin_px: parse_env("PAGE_MARGIN_PX", defaults.margin_px)?,
        };
        page_geometry
            .validate()
            .context("PAGE_MARGIN_PX leaves no room for content")?;

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            page_geometry,
            allow_widow_orphans: parse_env("ALLOW_WIDOW_ORPHANS", false)?,
            settle_delay: Duration::from_millis(parse_env("PREVIEW_SETTLE_MS", 150)?),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
