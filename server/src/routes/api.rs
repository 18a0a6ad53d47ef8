use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use mission_shared::{BoardError, TeamView};
use serde::{Deserialize, Serialize};

use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Default, Deserialize)]
pub struct TeamQuery {
    #[serde(default)]
    pub id: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (seq, team_count, last_error) = {
        let live = state.live_board.read().await;
        (
            live.seq,
            live.dashboard.as_ref().map_or(0, |board| board.teams.len()),
            live.last_error.clone(),
        )
    };
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "seq": seq,
        "teams": team_count,
        "layout": state.settings.layout,
        "source": state.settings.source.describe(),
        "overlap_policy": state.settings.overlap_policy.as_str(),
        "last_error": last_error,
        "observability": {
            "cycles_total": observability.cycles_total,
            "cycle_failures_total": observability.cycle_failures_total,
            "skipped_ticks_total": observability.skipped_ticks_total,
            "dropped_rows_total": observability.dropped_rows_total,
            "dashboard_requests_total": observability.dashboard_requests_total,
            "team_lookups_not_found_total": observability.team_lookups_not_found_total,
        }
    }))
}

/// Serves the pre-serialized dashboard payload without re-serializing per request.
pub async fn get_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.observability.record_dashboard_request();
    let (etag, json): (String, Arc<Bytes>) = {
        let live = state.live_board.read().await;
        (
            dashboard_etag(live.seq, live.fingerprint),
            Arc::clone(&live.dashboard_json),
        )
    };

    if if_none_match_matches(&headers, &etag) {
        return not_modified_response("no-cache", Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), "no-cache", Some(etag.as_str()))
}

#[derive(Serialize)]
struct TeamDetailPayload<'a> {
    seq: u64,
    updated_at: &'a chrono::DateTime<chrono::Utc>,
    team: &'a TeamView,
}

pub async fn get_team(State(state): State<AppState>, Query(query): Query<TeamQuery>) -> Response {
    let Some(raw_id) = query.id.as_deref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing_id" })),
        )
            .into_response();
    };

    let (seq, dashboard) = {
        let live = state.live_board.read().await;
        (live.seq, live.dashboard.clone())
    };
    let resolved = match dashboard.as_deref() {
        Some(board) => board.resolve(raw_id).map(|team| (board, team)),
        None => Err(BoardError::UnresolvedIdentifier(raw_id.trim().to_string())),
    };

    match resolved {
        Ok((board, team)) => Json(TeamDetailPayload {
            seq,
            updated_at: &board.updated_at,
            team,
        })
        .into_response(),
        Err(e) => {
            state.observability.record_team_not_found();
            not_found_response(&e)
        }
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let (seq, team_count, failing) = {
        let live = state.live_board.read().await;
        (
            live.seq,
            live.dashboard.as_ref().map_or(0, |board| board.teams.len()),
            live.last_error.is_some(),
        )
    };
    let body = render_prometheus_metrics(seq, team_count, failing, state.observability.snapshot());

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn write_metric(body: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(body, "# HELP {name} {help}");
    let _ = writeln!(body, "# TYPE {name} {kind}");
    let _ = writeln!(body, "{name} {value}");
}

fn render_prometheus_metrics(
    seq: u64,
    team_count: usize,
    failing: bool,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    write_metric(
        &mut body,
        "mission_board_teams",
        "gauge",
        "Teams on the currently published dashboard.",
        team_count as u64,
    );
    write_metric(
        &mut body,
        "mission_board_publish_seq",
        "gauge",
        "Sequence number of the latest publication.",
        seq,
    );
    write_metric(
        &mut body,
        "mission_board_last_cycle_failed",
        "gauge",
        "Whether the latest refresh cycle failed (1 or 0).",
        u64::from(failing),
    );
    write_metric(
        &mut body,
        "mission_board_cycles_total",
        "counter",
        "Total refresh cycles run.",
        observability.cycles_total,
    );
    write_metric(
        &mut body,
        "mission_board_cycle_failures_total",
        "counter",
        "Total refresh cycles that ended in a transport or input failure.",
        observability.cycle_failures_total,
    );
    write_metric(
        &mut body,
        "mission_board_skipped_ticks_total",
        "counter",
        "Total poll ticks skipped because a cycle was still running.",
        observability.skipped_ticks_total,
    );
    write_metric(
        &mut body,
        "mission_board_dropped_rows_total",
        "counter",
        "Total sheet rows rejected by the layout width policy.",
        observability.dropped_rows_total,
    );
    write_metric(
        &mut body,
        "mission_board_dashboard_requests_total",
        "counter",
        "Total /api/dashboard requests.",
        observability.dashboard_requests_total,
    );
    write_metric(
        &mut body,
        "mission_board_team_lookups_not_found_total",
        "counter",
        "Total detail lookups for unknown team identifiers.",
        observability.team_lookups_not_found_total,
    );
    body
}

fn not_found_response(error: &BoardError) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": error.kind(),
            "id": error.message(),
        })),
    )
        .into_response()
}

fn dashboard_etag(seq: u64, fingerprint: u32) -> String {
    format!("\"dashboard-{seq}-{fingerprint:08x}\"")
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
