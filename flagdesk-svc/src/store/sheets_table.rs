//! Google Sheets record table
//!
//! Reads and rewrites one worksheet through the Sheets v4 values API. The
//! OAuth bearer token is minted outside this process (service account
//! tooling, workload identity) and supplied through configuration.
//!
//! Not versioned: the values API has no compare-and-swap, so concurrent
//! writers race and the last full rewrite wins.
//!
//! A rewrite overwrites the grid from `A1` first and only then clears the
//! cells the old table had beyond the new one. A failed update leaves the
//! previous table readable; a failed trailing clear leaves stale rows below
//! the new table and is reported as an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use flagdesk_common::record::float_cell_text;
use flagdesk_common::table::{RecordTable, TableSnapshot, TableVersion};
use flagdesk_common::{Error, Result};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// Right edge used for clearing leftovers (column 702)
const LAST_COLUMN: &str = "ZZ";
const LAST_COLUMN_INDEX: usize = 702;
const USER_AGENT: &str = concat!("flagdesk/", env!("CARGO_PKG_VERSION"));

/// values.get response
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// values.update request body
#[derive(Debug, Serialize)]
struct ValueRangeBody<'a> {
    range: &'a str,
    #[serde(rename = "majorDimension")]
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

/// values.batchClear request body
#[derive(Debug, Serialize)]
struct BatchClearBody {
    ranges: Vec<String>,
}

pub struct SheetsTable {
    http_client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
    access_token: String,
}

impl SheetsTable {
    pub fn new(spreadsheet_id: String, worksheet: String, access_token: String) -> Result<Self> {
        Self::with_base_url(SHEETS_BASE_URL.to_string(), spreadsheet_id, worksheet, access_token)
    }

    /// Point at an alternate API root (tests, proxies)
    pub fn with_base_url(
        base_url: String,
        spreadsheet_id: String,
        worksheet: String,
        access_token: String,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Store(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            spreadsheet_id,
            worksheet,
            access_token,
        })
    }

    /// A1 range covering the whole worksheet
    fn range(&self) -> String {
        if self.worksheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.worksheet.clone()
        } else {
            format!("'{}'", self.worksheet.replace('\'', "''"))
        }
    }

    /// `{base}/spreadsheets/{id}/{segments...}`
    fn spreadsheet_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("Sheets base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, last_segment: &str) -> Result<reqwest::Url> {
        self.spreadsheet_url(&["values", last_segment])
    }

    /// Ranges holding whatever an older, larger table left behind a
    /// `rows` x `width` grid anchored at `A1`
    fn leftover_ranges(&self, rows: usize, width: usize) -> Vec<String> {
        let sheet = self.range();
        let mut ranges = vec![format!("{}!A{}:{}", sheet, rows + 1, LAST_COLUMN)];
        if width < LAST_COLUMN_INDEX {
            ranges.push(format!(
                "{}!{}1:{}{}",
                sheet,
                column_letters(width + 1),
                LAST_COLUMN,
                rows
            ));
        }
        ranges
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Store(format!(
            "Sheets {} failed ({}): {}",
            action,
            status.as_u16(),
            body
        )))
    }
}

/// Render a cell as text
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => float_cell_text(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// 1-based column index to A1 letters (1 → `A`, 27 → `AA`)
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[async_trait]
impl RecordTable for SheetsTable {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn read(&self) -> Result<TableSnapshot> {
        let mut url = self.values_url(&self.range())?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");

        tracing::debug!(spreadsheet = %self.spreadsheet_id, "Reading worksheet");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::Store(format!("Sheets read failed: {}", e)))?;

        let range: ValueRange = Self::check(response, "read")
            .await?
            .json()
            .await
            .map_err(|e| Error::Store(format!("Sheets read returned unparsable body: {}", e)))?;

        let mut rows = range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());

        let headers = rows.next().unwrap_or_default();
        Ok(TableSnapshot {
            headers,
            rows: rows.collect(),
            version: None,
        })
    }

    async fn write(&self, snapshot: TableSnapshot, expected: Option<&TableVersion>) -> Result<()> {
        if expected.is_some() {
            return Err(Error::Config(
                "Sheets backend does not support versioned writes".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(snapshot.rows.len() + 1);
        values.push(snapshot.headers);
        values.extend(snapshot.rows);
        let row_count = values.len();
        let width = values.iter().map(Vec::len).max().unwrap_or(0);

        // Overwrite in place; nothing is removed until this succeeds
        let anchor = format!("{}!A1", self.range());
        let mut update_url = self.values_url(&anchor)?;
        update_url
            .query_pairs_mut()
            .append_pair("valueInputOption", "RAW");

        let response = self
            .http_client
            .put(update_url)
            .bearer_auth(&self.access_token)
            .json(&ValueRangeBody {
                range: &anchor,
                major_dimension: "ROWS",
                values,
            })
            .send()
            .await
            .map_err(|e| Error::Store(format!("Sheets update failed: {}", e)))?;
        Self::check(response, "update").await?;

        let clear_url = self.spreadsheet_url(&["values:batchClear"])?;
        let response = self
            .http_client
            .post(clear_url)
            .bearer_auth(&self.access_token)
            .json(&BatchClearBody {
                ranges: self.leftover_ranges(row_count, width),
            })
            .send()
            .await
            .map_err(|e| Error::Store(format!("Sheets clear failed: {}", e)))?;
        Self::check(response, "clear").await?;

        tracing::debug!(
            spreadsheet = %self.spreadsheet_id,
            rows = row_count,
            "Worksheet rewritten"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(worksheet: &str) -> SheetsTable {
        SheetsTable::new("sheet-id".to_string(), worksheet.to_string(), "token".to_string())
            .unwrap()
    }

    #[test]
    fn test_cell_text_numbers() {
        assert_eq!(cell_text(&json!(998877660351u64)), "998877660351");
        assert_eq!(cell_text(&json!(351.0)), "351");
        assert_eq!(cell_text(&json!(1.5)), "1.5");
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!("Red")), "Red");
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(5), "E");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(LAST_COLUMN_INDEX), LAST_COLUMN);
    }

    #[test]
    fn test_leftover_ranges_below_and_right_of_new_table() {
        assert_eq!(
            table("Sheet1").leftover_ranges(3, 4),
            vec!["Sheet1!A4:ZZ", "Sheet1!E1:ZZ3"]
        );
        assert_eq!(
            table("Today's List").leftover_ranges(1, 5),
            vec!["'Today''s List'!A2:ZZ", "'Today''s List'!F1:ZZ1"]
        );
    }

    #[test]
    fn test_batch_clear_url_layout() {
        let url = table("Sheet1").spreadsheet_url(&["values:batchClear"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values:batchClear"
        );
    }

    #[test]
    fn test_range_quotes_names_with_spaces() {
        assert_eq!(table("Sheet1").range(), "Sheet1");
        assert_eq!(table("Today's List").range(), "'Today''s List'");
    }

    #[test]
    fn test_values_url_layout() {
        let url = table("Sheet1").values_url("Sheet1:clear").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/Sheet1:clear"
        );
    }

    #[tokio::test]
    async fn test_versioned_write_refused() {
        let result = table("Sheet1")
            .write(TableSnapshot::empty_with_headers(), Some(&TableVersion("1".to_string())))
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
