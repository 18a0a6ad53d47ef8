use std::fmt::Write as _;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, Local, Utc};
use mission_shared::{BoardError, Dashboard, DetailView, MISSION_COUNT, TeamView};

use crate::config::POLL_INTERVAL_SECS;
use crate::routes::api::TeamQuery;
use crate::state::{AppState, CycleFailure};

pub async fn dashboard_page(State(state): State<AppState>) -> Response {
    let (dashboard, last_error) = {
        let live = state.live_board.read().await;
        (live.dashboard.clone(), live.last_error.clone())
    };

    let mut body = String::new();
    body.push_str("<h1>Mission Board</h1>\n");
    render_status_line(&mut body, dashboard.as_deref(), last_error.as_ref());

    match dashboard.as_deref() {
        Some(board) if !board.teams.is_empty() => {
            body.push_str("<div class=\"cards\">\n");
            for team in &board.teams {
                render_card(&mut body, team);
            }
            body.push_str("</div>\n");
        }
        Some(_) => body.push_str("<p class=\"empty\">No teams on the sheet yet.</p>\n"),
        None => body.push_str("<p class=\"empty\">Waiting for the first update…</p>\n"),
    }

    page_response(StatusCode::OK, "Mission Board", &body)
}

pub async fn team_page(State(state): State<AppState>, Query(query): Query<TeamQuery>) -> Response {
    let raw_id = query.id.unwrap_or_default();
    let dashboard = state.current_dashboard().await;

    let detail = match dashboard.as_deref() {
        Some(board) => board.detail(&raw_id),
        None => DetailView::NotFound(BoardError::UnresolvedIdentifier(raw_id.trim().to_string())),
    };

    match detail {
        DetailView::Found(team) => {
            let mut body = String::new();
            render_detail(&mut body, team);
            page_response(StatusCode::OK, &team.record.name, &body)
        }
        DetailView::NotFound(error) => {
            state.observability.record_team_not_found();
            let mut body = String::new();
            body.push_str("<h1>Team not found</h1>\n");
            let _ = writeln!(
                body,
                "<p class=\"not-found\">No team with id &quot;{}&quot;.</p>",
                escape_html(error.message())
            );
            body.push_str("<p><a href=\"/\">Back to the board</a></p>\n");
            page_response(StatusCode::NOT_FOUND, "Team not found", &body)
        }
    }
}

fn render_status_line(body: &mut String, board: Option<&Dashboard>, error: Option<&CycleFailure>) {
    if let Some(error) = error {
        let _ = writeln!(
            body,
            "<div class=\"banner error\">Update failed ({}): {}</div>",
            escape_html(&error.kind),
            escape_html(&error.message)
        );
    }
    if let Some(board) = board {
        let _ = writeln!(
            body,
            "<p class=\"updated\">Last updated {}</p>",
            local_time(&board.updated_at)
        );
    }
}

fn render_card(body: &mut String, team: &TeamView) {
    let summary = &team.summary;
    let _ = writeln!(
        body,
        "<a class=\"card {class}\" href=\"/team?id={id}\">",
        class = summary.classification.css_class(),
        id = team.id
    );
    let _ = writeln!(
        body,
        "<h2>{}</h2>\n<span class=\"badge {}\">{}</span>",
        escape_html(&team.record.name),
        summary.classification.css_class(),
        escape_html(&summary.label)
    );
    let _ = writeln!(
        body,
        "<p class=\"count\">{} / {}</p>",
        summary.completed_count, summary.total
    );
    body.push_str("<ol class=\"mission-grid\">");
    for (index, done) in team.record.completion_flags().iter().enumerate() {
        let _ = write!(
            body,
            "<li class=\"{}\">{}</li>",
            if *done { "done" } else { "open" },
            index + 1
        );
    }
    body.push_str("</ol>\n</a>\n");
}

fn render_detail(body: &mut String, team: &TeamView) {
    let summary = &team.summary;
    let _ = writeln!(body, "<h1>{}</h1>", escape_html(&team.record.name));
    let _ = writeln!(
        body,
        "<p><span class=\"badge {}\">{}</span> {} / {}</p>",
        summary.classification.css_class(),
        escape_html(&summary.label),
        summary.completed_count,
        summary.total
    );
    body.push_str("<ol class=\"mission-list\">\n");
    for mission in team.record.missions.iter().take(MISSION_COUNT) {
        let _ = writeln!(
            body,
            "<li class=\"{}\">{}</li>",
            if mission.complete { "done" } else { "open" },
            escape_html(&mission.label)
        );
    }
    body.push_str("</ol>\n<p><a href=\"/\">Back to the board</a></p>\n");
}

fn local_time(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%H:%M:%S")
        .to_string()
}

fn page_response(status: StatusCode, title: &str, body: &str) -> Response {
    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <meta http-equiv=\"refresh\" content=\"{POLL_INTERVAL_SECS}\">\n\
         <title>{}</title>\n<link rel=\"stylesheet\" href=\"/assets/style.css\">\n</head>\n\
         <body>\n{body}</body>\n</html>\n",
        escape_html(title)
    );
    (status, [(header::CACHE_CONTROL, "no-cache")], Html(html)).into_response()
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
