use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use mission_shared::{BoardError, BoardEvent, Dashboard, TeamView, payload_fingerprint};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{OverlapPolicy, POLL_INTERVAL_SECS};
use crate::services::sheet_fetcher::fetch_sheet;
use crate::state::{AppState, CycleFailure, PreSerializedEvent};

/// Drives refresh cycles: one immediately, then one per interval tick.
pub async fn run(state: AppState) {
    run_with(state, |state| async move { run_cycle(&state).await }).await;
}

/// Tick loop with the per-tick cycle supplied by the caller.
async fn run_with<F, Fut>(state: AppState, cycle: F)
where
    F: Fn(AppState) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let policy = state.settings.overlap_policy;
    info!(
        source = %state.settings.source.describe(),
        layout = %state.settings.layout,
        policy = %policy,
        "Board poller started (interval: {}s)",
        POLL_INTERVAL_SECS
    );

    let mut interval = tokio::time::interval(Duration::from_secs(POLL_INTERVAL_SECS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        // The first tick completes immediately.
        interval.tick().await;

        match policy {
            OverlapPolicy::Skip => {
                let Some(guard) = InFlightGuard::try_acquire(&in_flight) else {
                    state.observability.record_skipped_tick();
                    debug!("previous refresh cycle still running; skipping tick");
                    continue;
                };
                let pending = cycle(state.clone());
                tokio::spawn(async move {
                    let _guard = guard;
                    pending.await;
                });
            }
            OverlapPolicy::Queue => cycle(state.clone()).await,
            OverlapPolicy::Concurrent => {
                tokio::spawn(cycle(state.clone()));
            }
        }
    }
}

/// Marks a cycle as running until dropped, including when the cycle panics.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(Arc::clone(flag)))
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub async fn run_cycle(state: &AppState) {
    let fetched = fetch_sheet(&state.http_client, &state.settings.source).await;
    process_fetched(state, fetched, Utc::now()).await;
}

/// Turns one fetch result into a published dashboard or error state.
/// Each cycle starts from nothing; earlier results are never reused.
pub(crate) async fn process_fetched(
    state: &AppState,
    fetched: Result<String, String>,
    now: DateTime<Utc>,
) {
    state.observability.record_cycle();

    let outcome = fetched
        .map_err(BoardError::TransportFailure)
        .and_then(|text| Dashboard::from_csv(&text, state.settings.layout, now));

    match outcome {
        Ok(dashboard) => {
            if dashboard.dropped_rows > 0 {
                state
                    .observability
                    .record_dropped_rows(dashboard.dropped_rows as u64);
            }
            info!(
                teams = dashboard.teams.len(),
                dropped_rows = dashboard.dropped_rows,
                "dashboard refreshed"
            );
            publish_dashboard(state, dashboard).await;
        }
        Err(e) => {
            state.observability.record_cycle_failure();
            warn!(error = %e, kind = e.kind(), "refresh cycle failed");
            publish_failure(state, &e, now).await;
        }
    }
}

#[derive(Serialize)]
struct DashboardPayload<'a> {
    seq: u64,
    updated_at: Option<&'a DateTime<Utc>>,
    teams: &'a [TeamView],
    dropped_rows: usize,
    error: Option<&'a CycleFailure>,
}

fn serialize_dashboard_payload(
    seq: u64,
    dashboard: Option<&Dashboard>,
    error: Option<&CycleFailure>,
) -> Option<Arc<Bytes>> {
    let payload = DashboardPayload {
        seq,
        updated_at: dashboard.map(|board| &board.updated_at),
        teams: dashboard
            .map(|board| board.teams.as_slice())
            .unwrap_or_default(),
        dropped_rows: dashboard.map_or(0, |board| board.dropped_rows),
        error,
    };
    match serde_json::to_vec(&payload) {
        Ok(json) => Some(Arc::new(Bytes::from(json))),
        Err(e) => {
            warn!("failed to serialize dashboard payload: {e}");
            None
        }
    }
}

fn serialize_event(event: &BoardEvent) -> Option<PreSerializedEvent> {
    match serde_json::to_vec(event) {
        Ok(json) => Some(PreSerializedEvent {
            seq: event.seq(),
            name: event.event_name(),
            json: Arc::new(Bytes::from(json)),
        }),
        Err(e) => {
            warn!("failed to serialize {} event: {e}", event.event_name());
            None
        }
    }
}

async fn publish_dashboard(state: &AppState, dashboard: Dashboard) {
    // Seq is taken under the write lock so the stored board and the broadcast order agree.
    let mut live = state.live_board.write().await;
    let seq = state.next_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    let event = BoardEvent::Dashboard {
        seq,
        teams: dashboard.teams.clone(),
        timestamp: dashboard.updated_at.to_rfc3339(),
    };
    let Some(event) = serialize_event(&event) else {
        return;
    };
    let Some(dashboard_json) = serialize_dashboard_payload(seq, Some(&dashboard), None) else {
        return;
    };

    live.seq = seq;
    live.fingerprint = payload_fingerprint(dashboard_json.as_ref());
    live.dashboard = Some(Arc::new(dashboard));
    live.last_error = None;
    live.dashboard_json = dashboard_json;
    live.event = Some(event.clone());

    let _ = state.event_tx.send(event);
}

async fn publish_failure(state: &AppState, error: &BoardError, now: DateTime<Utc>) {
    let mut live = state.live_board.write().await;
    let seq = state.next_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    let timestamp = now.to_rfc3339();
    let Some(event) = serialize_event(&BoardEvent::failure(seq, error, timestamp.clone())) else {
        return;
    };
    let failure = CycleFailure {
        kind: error.kind().to_string(),
        message: error.message().to_string(),
        timestamp,
    };
    let Some(dashboard_json) =
        serialize_dashboard_payload(seq, live.dashboard.as_deref(), Some(&failure))
    else {
        return;
    };

    live.seq = seq;
    live.fingerprint = payload_fingerprint(dashboard_json.as_ref());
    live.last_error = Some(failure);
    live.dashboard_json = dashboard_json;
    live.event = Some(event.clone());

    let _ = state.event_tx.send(event);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use mission_shared::{BoardEvent, Classification, LayoutMode};
    use tokio::sync::broadcast;
    use tokio::time::sleep;

    use super::{InFlightGuard, process_fetched, run, run_cycle, run_with};
    use crate::config::OverlapPolicy;
    use crate::state::{AppState, BoardSettings, PreSerializedEvent};

    const CANONICAL: &str = "チーム名,ミッション①,ミッション②,ミッション③,ミッション④,ミッション⑤,ミッション⑥,ミッション⑦,ミッション⑧,ミッション⑨
Team Test,TRUE,TRUE,FALSE,FALSE,TRUE,FALSE,FALSE,FALSE,FALSE
Team Two,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE
Broken,TRUE
";

    fn labeled_state() -> AppState {
        AppState::new(BoardSettings::sample(LayoutMode::LabeledBoolean))
    }

    fn received_event(rx: &mut broadcast::Receiver<PreSerializedEvent>) -> BoardEvent {
        let event = rx.try_recv().expect("an event should be broadcast");
        serde_json::from_slice(event.json.as_ref()).expect("event json should parse")
    }

    #[tokio::test]
    async fn successful_cycle_publishes_dashboard() {
        let state = labeled_state();
        let mut rx = state.event_tx.subscribe();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        process_fetched(&state, Ok(CANONICAL.to_string()), now).await;

        match received_event(&mut rx) {
            BoardEvent::Dashboard {
                seq,
                teams,
                timestamp,
            } => {
                assert_eq!(seq, 1);
                assert_eq!(teams.len(), 2);
                assert_eq!(teams[0].summary.completed_count, 3);
                assert_eq!(teams[0].summary.classification, Classification::InProgress);
                assert_eq!(timestamp, now.to_rfc3339());
            }
            other => panic!("expected dashboard event, got {other:?}"),
        }

        let live = state.live_board.read().await;
        assert_eq!(live.seq, 1);
        assert!(live.last_error.is_none());
        let dashboard = live.dashboard.as_ref().expect("dashboard should be stored");
        assert_eq!(dashboard.dropped_rows, 1);
        let payload: serde_json::Value =
            serde_json::from_slice(live.dashboard_json.as_ref()).expect("payload should parse");
        assert_eq!(payload["teams"][1]["record"]["name"], "Team Two");
        assert!(payload["error"].is_null());

        let counters = state.observability.snapshot();
        assert_eq!(counters.cycles_total, 1);
        assert_eq!(counters.cycle_failures_total, 0);
        assert_eq!(counters.dropped_rows_total, 1);
    }

    #[tokio::test]
    async fn transport_failure_publishes_error_and_keeps_previous_dashboard() {
        let state = labeled_state();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        process_fetched(&state, Ok(CANONICAL.to_string()), now).await;

        let mut rx = state.event_tx.subscribe();
        process_fetched(
            &state,
            Err("upstream status 503 Service Unavailable".to_string()),
            now,
        )
        .await;

        match received_event(&mut rx) {
            BoardEvent::Error {
                seq, kind, message, ..
            } => {
                assert_eq!(seq, 2);
                assert_eq!(kind, "transport_failure");
                assert!(message.contains("503"));
            }
            other => panic!("expected error event, got {other:?}"),
        }

        let live = state.live_board.read().await;
        assert_eq!(live.seq, 2);
        assert_eq!(
            live.last_error.as_ref().map(|e| e.kind.as_str()),
            Some("transport_failure")
        );
        assert_eq!(live.dashboard.as_ref().map(|d| d.teams.len()), Some(2));
        let payload: serde_json::Value =
            serde_json::from_slice(live.dashboard_json.as_ref()).expect("payload should parse");
        assert_eq!(payload["teams"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["error"]["kind"], "transport_failure");
        assert_eq!(state.observability.snapshot().cycle_failures_total, 1);
    }

    #[tokio::test]
    async fn sentinel_body_publishes_malformed_input() {
        let state = labeled_state();
        let mut rx = state.event_tx.subscribe();

        process_fetched(
            &state,
            Ok("ERROR: Sheet is not published to the web".to_string()),
            Utc::now(),
        )
        .await;

        match received_event(&mut rx) {
            BoardEvent::Error { kind, message, .. } => {
                assert_eq!(kind, "malformed_input");
                assert!(message.contains("Sheet is not published"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(state.live_board.read().await.dashboard.is_none());
    }

    #[tokio::test]
    async fn next_success_clears_the_error() {
        let state = labeled_state();
        process_fetched(&state, Err("request failed: timeout".to_string()), Utc::now()).await;
        process_fetched(&state, Ok(CANONICAL.to_string()), Utc::now()).await;

        let live = state.live_board.read().await;
        assert_eq!(live.seq, 2);
        assert!(live.last_error.is_none());
        assert!(live.dashboard.is_some());
    }

    #[tokio::test]
    async fn run_cycle_reads_the_sample_sheet() {
        let state = AppState::new(BoardSettings::sample(LayoutMode::InterleavedPairs));
        run_cycle(&state).await;

        let live = state.live_board.read().await;
        let dashboard = live.dashboard.as_ref().expect("sample cycle should publish");
        assert!(!dashboard.teams.is_empty());
        assert_eq!(dashboard.teams[0].record.missions[0].label, "Photo at the gate");
    }

    #[test]
    fn in_flight_guard_is_single_flight() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = InFlightGuard::try_acquire(&flag).expect("first acquire succeeds");
        assert!(InFlightGuard::try_acquire(&flag).is_none());
        drop(first);
        assert!(InFlightGuard::try_acquire(&flag).is_some());
    }

    fn policy_state(policy: OverlapPolicy) -> AppState {
        let mut settings = BoardSettings::sample(LayoutMode::LabeledBoolean);
        settings.overlap_policy = policy;
        AppState::new(settings)
    }

    /// Counters for a cycle that takes 45 s, longer than the poll interval.
    #[derive(Clone, Default)]
    struct SlowCycle {
        started: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    impl SlowCycle {
        fn spawn_loop(&self, state: AppState) -> tokio::task::JoinHandle<()> {
            let counters = self.clone();
            tokio::spawn(run_with(state, move |_state| {
                let counters = counters.clone();
                async move {
                    counters.started.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_secs(45)).await;
                    counters.finished.fetch_add(1, Ordering::SeqCst);
                }
            }))
        }

        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        fn finished(&self) -> usize {
            self.finished.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poller_runs_immediately_then_every_interval() {
        let state = labeled_state();
        let poller = tokio::spawn(run(state.clone()));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(state.live_board.read().await.seq, 1);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(state.live_board.read().await.seq, 2);

        sleep(Duration::from_secs(28)).await;
        assert_eq!(state.live_board.read().await.seq, 2);

        poller.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn skip_policy_drops_ticks_while_a_cycle_runs() {
        let state = policy_state(OverlapPolicy::Skip);
        let cycle = SlowCycle::default();
        let poller = cycle.spawn_loop(state.clone());

        sleep(Duration::from_secs(50)).await;
        assert_eq!(cycle.started(), 1);
        assert_eq!(cycle.finished(), 1);
        assert_eq!(state.observability.snapshot().skipped_ticks_total, 1);

        // The 60 s tick finds the guard released and starts a fresh cycle.
        sleep(Duration::from_secs(15)).await;
        assert_eq!(cycle.started(), 2);
        assert_eq!(state.observability.snapshot().skipped_ticks_total, 1);

        poller.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn queue_policy_runs_one_follow_up_after_a_slow_cycle() {
        let state = policy_state(OverlapPolicy::Queue);
        let cycle = SlowCycle::default();
        let poller = cycle.spawn_loop(state.clone());

        sleep(Duration::from_secs(50)).await;
        assert_eq!(cycle.started(), 2);
        assert_eq!(cycle.finished(), 1);

        // The 30 s and 60 s ticks both elapsed during the first cycle, yet only
        // one follow-up is running.
        sleep(Duration::from_secs(30)).await;
        assert_eq!(cycle.started(), 2);
        assert_eq!(cycle.finished(), 1);
        assert_eq!(state.observability.snapshot().skipped_ticks_total, 0);

        poller.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_policy_starts_every_tick() {
        let state = policy_state(OverlapPolicy::Concurrent);
        let cycle = SlowCycle::default();
        let poller = cycle.spawn_loop(state.clone());

        sleep(Duration::from_secs(31)).await;
        assert_eq!(cycle.started(), 2);
        assert_eq!(cycle.finished(), 0);
        assert_eq!(state.observability.snapshot().skipped_ticks_total, 0);

        poller.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishes_keep_board_and_broadcast_in_seq_order() {
        let state = labeled_state();
        let mut rx = state.event_tx.subscribe();

        let tasks: Vec<_> = (0..16)
            .map(|idx| {
                let state = state.clone();
                tokio::spawn(async move {
                    let fetched = if idx % 4 == 0 {
                        Err("request failed: timeout".to_string())
                    } else {
                        Ok(CANONICAL.to_string())
                    };
                    process_fetched(&state, fetched, Utc::now()).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("publish task should not panic");
        }

        let seqs: Vec<u64> = (0..16)
            .map(|_| rx.try_recv().expect("every publish is broadcast").seq)
            .collect();
        assert_eq!(seqs, (1..=16).collect::<Vec<u64>>());

        let live = state.live_board.read().await;
        assert_eq!(live.seq, 16);
        assert_eq!(live.event.as_ref().map(|event| event.seq), Some(16));
    }
}
