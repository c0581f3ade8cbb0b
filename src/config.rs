#![cfg(feature = "web")]
//! Server configuration from flags and environment

use clap::Parser;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::plot::DEFAULT_SVG_SIZE;
use crate::session::SESSION_DURATION;
use crate::stats::DEFAULT_PREVIEW_ROWS;

/// Server settings, from command-line flags or `DATA_EXPLORER_*` variables
#[derive(Parser, Clone, Debug)]
#[command(name = "data-explorer", about = "Upload a CSV or XLSX file, inspect it and chart it")]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "DATA_EXPLORER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "DATA_EXPLORER_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Rows shown in the data preview
    #[arg(long, env = "DATA_EXPLORER_PREVIEW_ROWS", default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub preview_rows: usize,

    /// Parsed uploads kept in memory
    #[arg(long, env = "DATA_EXPLORER_CACHE_CAPACITY", default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,

    #[arg(long, env = "DATA_EXPLORER_MAX_UPLOAD_MB", default_value_t = 50)]
    pub max_upload_mb: usize,

    /// Idle seconds before a session is dropped
    #[arg(long, env = "DATA_EXPLORER_SESSION_TTL_SECS", default_value_t = SESSION_DURATION.as_secs())]
    pub session_ttl_secs: u64,

    #[arg(long, env = "DATA_EXPLORER_SVG_WIDTH", default_value_t = DEFAULT_SVG_SIZE.0)]
    pub svg_width: u32,

    #[arg(long, env = "DATA_EXPLORER_SVG_HEIGHT", default_value_t = DEFAULT_SVG_SIZE.1)]
    pub svg_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_upload_mb: 50,
            session_ttl_secs: SESSION_DURATION.as_secs(),
            svg_width: DEFAULT_SVG_SIZE.0,
            svg_height: DEFAULT_SVG_SIZE.1,
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn svg_size(&self) -> (u32, u32) {
        (self.svg_width, self.svg_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_match_default_impl() {
        let parsed = Config::try_parse_from(["data-explorer"]).unwrap();
        let default = Config::default();

        assert_eq!(parsed.port, default.port);
        assert_eq!(parsed.preview_rows, 5);
        assert_eq!(parsed.cache_capacity, default.cache_capacity);
        assert_eq!(parsed.session_ttl(), SESSION_DURATION);
        assert_eq!(parsed.svg_size(), (800, 500));
    }

    #[test]
    fn test_flags_override() {
        let config =
            Config::try_parse_from(["data-explorer", "--port", "8080", "--preview-rows", "10"])
                .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.preview_rows, 10);
        assert_eq!(Config::default().max_upload_bytes(), 50 * 1024 * 1024);
    }
}
