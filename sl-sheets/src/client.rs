use crate::auth::{ServiceAccountKey, fetch_access_token, parse_encoding_key};
use crate::error::{Result, SheetsError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Header row of the message log; `LogRow::cells` yields values in this
/// column order.
pub const HEADER: [&str; 6] = ["Timestamp", "From", "Message", "Type", "MessageID", "RawData"];

/// One row of the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub timestamp: String,
    pub from: String,
    pub message: String,
    pub kind: String,
    pub message_id: String,
    pub raw: String,
}

impl LogRow {
    pub fn cells(&self) -> [&str; 6] {
        [
            &self.timestamp,
            &self.from,
            &self.message,
            &self.kind,
            &self.message_id,
            &self.raw,
        ]
    }
}

/// Append-row capability.
///
/// The webhook handler depends on this seam so tests can substitute an
/// in-memory recorder for the live Sheets client.
#[async_trait]
pub trait RowAppender: Send + Sync {
    async fn append_row(&self, row: &LogRow) -> Result<()>;
}

pub struct SheetsClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    sheet_title: String,
}

impl SheetsClient {
    /// Builds a client for one spreadsheet tab. The private key must parse
    /// here; a bad key is a construction error, not a first-append crash.
    pub fn new(key: ServiceAccountKey, spreadsheet_id: &str, sheet_title: &str) -> Result<Self> {
        let spreadsheet_id = spreadsheet_id.trim();
        if spreadsheet_id.is_empty() {
            return Err(SheetsError::Api("spreadsheet id is required".to_string()));
        }
        let sheet_title = sheet_title.trim();
        if sheet_title.is_empty() {
            return Err(SheetsError::Api("sheet title is required".to_string()));
        }
        if key.client_email.trim().is_empty() {
            return Err(SheetsError::InvalidKey(
                "service account email is required".to_string(),
            ));
        }
        parse_encoding_key(&key)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            key,
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_title: sheet_title.to_string(),
        })
    }

    async fn resolve_worksheet(&self, token: &str) -> Result<()> {
        let url = format!(
            "{SHEETS_API_BASE}/{}?fields=sheets.properties",
            self.spreadsheet_id
        );
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api(format!(
                "spreadsheet lookup failed: status={status} body={body}"
            )));
        }
        let metadata: SpreadsheetMetadata = response
            .json()
            .await
            .map_err(|e| SheetsError::Api(format!("unexpected spreadsheet metadata: {e}")))?;
        let found = metadata
            .sheets
            .iter()
            .any(|sheet| sheet.properties.title == self.sheet_title);
        if !found {
            return Err(SheetsError::WorksheetNotFound(self.sheet_title.clone()));
        }
        Ok(())
    }
}

fn append_range(sheet_title: &str) -> String {
    format!("'{sheet_title}'!A1:F1")
}

#[async_trait]
impl RowAppender for SheetsClient {
    /// Appends one row. Authenticates and resolves the target worksheet on
    /// every call; no token or metadata is cached between appends.
    async fn append_row(&self, row: &LogRow) -> Result<()> {
        let token = fetch_access_token(&self.http, &self.key).await?;
        self.resolve_worksheet(&token).await?;

        let url = format!(
            "{SHEETS_API_BASE}/{}/values/{}:append",
            self.spreadsheet_id,
            append_range(&self.sheet_title)
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .query(&[("valueInputOption", "RAW")])
            .json(&serde_json::json!({ "values": [row.cells()] }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api(format!(
                "append failed: status={status} body={body}"
            )));
        }
        tracing::debug!(sheet = %self.sheet_title, "row appended");
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetEntry {
    #[serde(default)]
    properties: SheetProperties,
}

#[derive(Debug, Default, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}
