use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use mission_shared::LayoutMode;
use tracing::warn;

pub const POLL_INTERVAL_SECS: u64 = 30;
pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_BROADCAST_BUFFER: usize = 256;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const STATIC_ASSETS_DIR: &str = "assets";

/// What the poller does when a tick fires while the previous cycle is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Drop the tick; the next one gets a fresh chance.
    #[default]
    Skip,
    /// Run one follow-up cycle as soon as the running one finishes.
    Queue,
    /// Start every tick's cycle immediately; the last cycle to publish wins.
    Concurrent,
}

impl OverlapPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            OverlapPolicy::Skip => "skip",
            OverlapPolicy::Queue => "queue",
            OverlapPolicy::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "queue" | "delay" => Ok(OverlapPolicy::Queue),
            "concurrent" | "race" => Ok(OverlapPolicy::Concurrent),
            other => Err(format!("unknown overlap policy {other:?}")),
        }
    }
}

/// Published CSV URL of the sheet. `None` runs the board on built-in sample data.
pub fn sheet_csv_url() -> Option<String> {
    std::env::var("SHEET_CSV_URL")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn sheet_layout() -> LayoutMode {
    match std::env::var("SHEET_LAYOUT") {
        Ok(value) => value.parse::<LayoutMode>().unwrap_or_else(|e| {
            warn!(error = %e, "invalid SHEET_LAYOUT, using default layout");
            LayoutMode::default()
        }),
        Err(_) => LayoutMode::default(),
    }
}

pub fn poll_overlap_policy() -> OverlapPolicy {
    match std::env::var("POLL_OVERLAP_POLICY") {
        Ok(value) => value.parse::<OverlapPolicy>().unwrap_or_else(|e| {
            warn!(error = %e, "invalid POLL_OVERLAP_POLICY, using skip");
            OverlapPolicy::default()
        }),
        Err(_) => OverlapPolicy::default(),
    }
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn sse_broadcast_buffer() -> usize {
    std::env::var("SSE_BROADCAST_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}
