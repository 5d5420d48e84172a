use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::columns::FieldSpec;
use crate::config::PosConfig;
use crate::errors::ServiceError;

/// One row object returned by the reporting endpoint.
pub type ReportRow = Map<String, Value>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Client for the POS authentication and report execution endpoints.
///
/// The bearer token is fetched once per run and reused for every call; the
/// client carries no refresh logic, so a token expiring mid-run fails the
/// run.
pub struct PosClient {
    http: reqwest::Client,
    auth_url: String,
    report_base_url: String,
    company_id: u64,
    timezone: String,
    token: Option<String>,
}

impl PosClient {
    pub fn new(cfg: &PosConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            auth_url: cfg.auth_url.clone(),
            report_base_url: cfg.report_base_url.trim_end_matches('/').to_string(),
            company_id: cfg.company_id,
            timezone: cfg.timezone.clone(),
            token: None,
        })
    }

    /// Exchanges credentials for a bearer token. Must be called before any
    /// report execution.
    #[instrument(skip(self, cfg))]
    pub async fn authenticate(&mut self, cfg: &PosConfig) -> Result<(), ServiceError> {
        let payload = serde_json::json!({
            "UsernameOrEmailAddress": cfg.username,
            "Password": cfg.password,
            "ClientKey": cfg.client_key,
        });

        let resp = self.http.post(&self.auth_url).json(&payload).send().await?;

        if !resp.status().is_success() {
            return Err(ServiceError::AuthError(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::AuthError(format!("malformed token response: {}", e)))?;

        self.token = Some(token.token);
        Ok(())
    }

    /// Executes one report and returns its row objects.
    ///
    /// The endpoint responds with a JSON array whose first element carries a
    /// `Data` field holding the rows. An empty body, empty array, or absent
    /// `Data` field all degrade to an empty row set; anything else
    /// unparseable is an error naming the report.
    #[instrument(skip(self, parameters), fields(report = %report_id))]
    pub async fn execute_report(
        &self,
        report_id: &str,
        parameters: &Value,
    ) -> Result<Vec<ReportRow>, ServiceError> {
        let token = self.token.as_ref().ok_or_else(|| {
            ServiceError::AuthError("execute_report called before authenticate".into())
        })?;

        let url = format!(
            "{}/v2/Companies/{}/Reports/{}/Execute",
            self.report_base_url, self.company_id, report_id
        );

        // Parameters travel as a JSON-encoded string blob inside the payload.
        let payload = serde_json::json!({
            "ReportId": report_id,
            "TimeZone": self.timezone,
            "Parameters": parameters.to_string(),
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ServiceError::ReportError {
                report: report_id.to_string(),
                detail: format!("status {}", resp.status()),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ServiceError::UnexpectedPayload {
                report: report_id.to_string(),
                detail: e.to_string(),
            })?;

        let rows = match &body {
            Value::Null => Vec::new(),
            Value::Array(elements) => match elements.first() {
                None => Vec::new(),
                Some(first) => match first.get("Data") {
                    None | Some(Value::Null) => {
                        debug!("report response carries no Data field");
                        Vec::new()
                    }
                    Some(Value::Array(data)) => data
                        .iter()
                        .filter_map(|v| v.as_object().cloned())
                        .collect(),
                    Some(other) => {
                        return Err(ServiceError::UnexpectedPayload {
                            report: report_id.to_string(),
                            detail: format!("Data field is not an array: {}", other),
                        })
                    }
                },
            },
            other => {
                return Err(ServiceError::UnexpectedPayload {
                    report: report_id.to_string(),
                    detail: format!("expected a JSON array, got: {}", truncate(other)),
                })
            }
        };

        Ok(rows)
    }
}

fn truncate(v: &Value) -> String {
    let mut s = v.to_string();
    if s.len() > 200 {
        s.truncate(200);
        s.push_str("...");
    }
    s
}

/// Resolves a field against a row's keys and returns its raw value.
pub fn row_value<'a>(row: &'a ReportRow, spec: &FieldSpec) -> Option<&'a Value> {
    let keys: Vec<String> = row.keys().cloned().collect();
    let (idx, _) = spec.resolve(&keys)?;
    row.get(&keys[idx])
}

/// Extracts a field as trimmed text; empty string when absent.
pub fn row_text(row: &ReportRow, spec: &FieldSpec) -> String {
    match row_value(row, spec) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Extracts a field as a number, coercing numeric strings; 0.0 when absent.
pub fn row_f64(row: &ReportRow, spec: &FieldSpec) -> f64 {
    match row_value(row, spec) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Extracts a field as a date. Accepts `YYYY-MM-DD` and ISO timestamps.
pub fn row_date(row: &ReportRow, spec: &FieldSpec) -> Option<NaiveDate> {
    let text = row_text(row, spec);
    if text.is_empty() {
        return None;
    }
    parse_date(&text)
}

/// Lenient date parser for report values.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let head = text.get(..10).unwrap_or(text);
    if let Ok(d) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%m/%d/%Y") {
        return Some(d);
    }
    warn!("unparseable date value: {:?}", text);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns;

    fn row(pairs: &[(&str, Value)]) -> ReportRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn row_f64_coerces_numeric_strings() {
        let r = row(&[("In Stock Qty", Value::String(" 4.5 ".into()))]);
        assert_eq!(row_f64(&r, &columns::STOCK_QTY), 4.5);
    }

    #[test]
    fn row_f64_missing_field_is_zero() {
        let r = row(&[("Colour", Value::String("red".into()))]);
        assert_eq!(row_f64(&r, &columns::STOCK_QTY), 0.0);
    }

    #[test]
    fn row_date_accepts_iso_timestamps() {
        let r = row(&[(
            "Last Received Date",
            Value::String("2024-03-05T00:00:00".into()),
        )]);
        assert_eq!(
            row_date(&r, &columns::LAST_RECEIVED),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn row_text_resolves_alternative_names() {
        let r = row(&[("Store Name", Value::String("Downtown".into()))]);
        assert_eq!(row_text(&r, &columns::LOCATION), "Downtown");
    }
}
