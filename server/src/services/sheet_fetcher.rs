use mission_shared::LayoutMode;

const MAX_BODY_PREVIEW_CHARS: usize = 200;

/// Where the poller reads the sheet from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSource {
    /// Published CSV export URL.
    Remote(String),
    /// Built-in sample sheet for the given layout, used when no URL is configured.
    Sample(LayoutMode),
}

impl SheetSource {
    pub fn describe(&self) -> String {
        match self {
            SheetSource::Remote(url) => url.clone(),
            SheetSource::Sample(layout) => format!("sample:{layout}"),
        }
    }
}

pub async fn fetch_sheet(client: &reqwest::Client, source: &SheetSource) -> Result<String, String> {
    match source {
        SheetSource::Remote(url) => fetch_remote(client, url).await,
        SheetSource::Sample(layout) => Ok(sample_csv(*layout).to_string()),
    }
}

async fn fetch_remote(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| format!("failed to read response body: {e}"))?;

    if !status.is_success() {
        return Err(format!(
            "upstream status {status}; body preview: {}",
            body_preview(&bytes)
        ));
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn body_preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(MAX_BODY_PREVIEW_CHARS)
        .collect()
}

pub fn sample_csv(layout: LayoutMode) -> &'static str {
    match layout {
        LayoutMode::LabeledBoolean => SAMPLE_LABELED,
        LayoutMode::InterleavedPairs => SAMPLE_INTERLEAVED,
        LayoutMode::FlexibleLabeled => SAMPLE_FLEXIBLE,
    }
}

const SAMPLE_LABELED: &str = "\u{FEFF}チーム名,ミッション①,ミッション②,ミッション③,ミッション④,ミッション⑤,ミッション⑥,ミッション⑦,ミッション⑧,ミッション⑨
Team A,TRUE,TRUE,TRUE,TRUE,TRUE,FALSE,FALSE,FALSE,FALSE
Team B,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE
Team C,TRUE,TRUE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE
Team D,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE
Team E,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,FALSE
Team F,TRUE,FALSE,TRUE,FALSE,TRUE,FALSE,TRUE,FALSE,TRUE
";

const SAMPLE_INTERLEAVED: &str = "チーム名,内容①,状態①,内容②,状態②,内容③,状態③
Team A,Photo at the gate,TRUE,Find the stamp,TRUE,Solve the riddle,FALSE
Team B,Photo at the gate,TRUE,Find the stamp,FALSE
Team C,Photo at the gate,FALSE
Team D
";

const SAMPLE_FLEXIBLE: &str = "Team Name,Mission 1,Mission 2,Mission 3,Mission 4,Mission 5,Mission 6,Mission 7,Mission 8,Mission 9
Team A,TRUE,TRUE,TRUE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,checked by staff
Team B,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE
Team C,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,,
";
