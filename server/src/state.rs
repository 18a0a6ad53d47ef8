use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use mission_shared::{Dashboard, LayoutMode};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::warn;

use crate::config::{
    OverlapPolicy, poll_overlap_policy, sheet_csv_url, sheet_layout, sse_broadcast_buffer,
    upstream_connect_timeout, upstream_http_timeout,
};
use crate::services::sheet_fetcher::SheetSource;

/// Pre-serialized SSE event, serialized once by the poller and shared by all clients via Arc.
#[derive(Debug, Clone)]
pub struct PreSerializedEvent {
    pub seq: u64,
    pub name: &'static str,
    pub json: Arc<Bytes>,
}

/// Failure of the most recent cycle, kept next to the last good dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleFailure {
    pub kind: String,
    pub message: String,
    pub timestamp: String,
}

/// What the presentation sink currently shows.
///
/// A failed cycle sets `last_error` but keeps the previous dashboard on screen;
/// the next successful cycle replaces both wholesale.
#[derive(Debug, Clone)]
pub struct LiveBoard {
    pub seq: u64,
    pub dashboard: Option<Arc<Dashboard>>,
    pub last_error: Option<CycleFailure>,
    pub dashboard_json: Arc<Bytes>,
    pub event: Option<PreSerializedEvent>,
    pub fingerprint: u32,
}

impl Default for LiveBoard {
    fn default() -> Self {
        Self {
            seq: 0,
            dashboard: None,
            last_error: None,
            dashboard_json: Arc::new(Bytes::from_static(
                br#"{"seq":0,"updated_at":null,"teams":[],"dropped_rows":0,"error":null}"#,
            )),
            event: None,
            fingerprint: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardSettings {
    pub source: SheetSource,
    pub layout: LayoutMode,
    pub overlap_policy: OverlapPolicy,
}

impl BoardSettings {
    pub fn from_env() -> Self {
        let layout = sheet_layout();
        let source = match sheet_csv_url() {
            Some(url) => SheetSource::Remote(url),
            None => SheetSource::Sample(layout),
        };
        Self {
            source,
            layout,
            overlap_policy: poll_overlap_policy(),
        }
    }

    pub fn sample(layout: LayoutMode) -> Self {
        Self {
            source: SheetSource::Sample(layout),
            layout,
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub live_board: Arc<RwLock<LiveBoard>>,
    pub next_seq: Arc<AtomicU64>,
    pub event_tx: broadcast::Sender<PreSerializedEvent>,
    pub http_client: reqwest::Client,
    pub settings: Arc<BoardSettings>,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    cycles_total: AtomicU64,
    cycle_failures_total: AtomicU64,
    skipped_ticks_total: AtomicU64,
    dropped_rows_total: AtomicU64,
    dashboard_requests_total: AtomicU64,
    team_lookups_not_found_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservabilitySnapshot {
    pub cycles_total: u64,
    pub cycle_failures_total: u64,
    pub skipped_ticks_total: u64,
    pub dropped_rows_total: u64,
    pub dashboard_requests_total: u64,
    pub team_lookups_not_found_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycle_failures_total: self.cycle_failures_total.load(Ordering::Relaxed),
            skipped_ticks_total: self.skipped_ticks_total.load(Ordering::Relaxed),
            dropped_rows_total: self.dropped_rows_total.load(Ordering::Relaxed),
            dashboard_requests_total: self.dashboard_requests_total.load(Ordering::Relaxed),
            team_lookups_not_found_total: self
                .team_lookups_not_found_total
                .load(Ordering::Relaxed),
        }
    }

    pub fn record_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_failure(&self) {
        self.cycle_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_tick(&self) {
        self.skipped_ticks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_rows(&self, count: u64) {
        self.dropped_rows_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dashboard_request(&self) {
        self.dashboard_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_team_not_found(&self) {
        self.team_lookups_not_found_total
            .fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    /// Dashboard of the most recent successful cycle, if any.
    pub async fn current_dashboard(&self) -> Option<Arc<Dashboard>> {
        self.live_board.read().await.dashboard.clone()
    }

    pub fn new(settings: BoardSettings) -> Self {
        let (event_tx, _) = broadcast::channel(sse_broadcast_buffer());
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("mission-board/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, falling back to defaults"
                );
                reqwest::Client::new()
            });
        Self {
            live_board: Arc::new(RwLock::new(LiveBoard::default())),
            next_seq: Arc::new(AtomicU64::new(0)),
            event_tx,
            http_client,
            settings: Arc::new(settings),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }
}
