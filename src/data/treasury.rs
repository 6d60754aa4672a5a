//! Treasury feed fetch over HTTP.
//!
//! The fetcher is deliberately thin: it produces raw XML text for a month and
//! nothing else. Everything downstream (parsing, trends, ranking, caching)
//! goes through the `CurveSource` trait so tests and `--sample` runs can
//! substitute an offline source.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::domain::MonthKey;
use crate::error::AppError;

const BASE_URL: &str =
    "https://home.treasury.gov/resource-center/data-chart-center/interest-rates/pages/xml";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "treas-trend/0.1 (+https://github.com/) reqwest";

/// Feed URL for one month of the daily yield curve.
pub fn feed_url(month: MonthKey) -> String {
    format!("{BASE_URL}?data=daily_treasury_yield_curve&field_tdr_date_value_month={month}")
}

/// Anything that can produce raw feed XML for a month.
pub trait CurveSource {
    fn fetch_month(&self, month: MonthKey) -> Result<String, AppError>;
}

/// Live HTTP source.
pub struct HttpCurveSource {
    client: Client,
}

impl HttpCurveSource {
    /// `insecure` disables TLS certificate verification, for networks behind
    /// a proxy with a self-signed certificate.
    pub fn new(insecure: bool) -> Result<HttpCurveSource, AppError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| AppError::Fetch(format!("Failed to build HTTP client: {e}")))?;
        Ok(HttpCurveSource { client })
    }
}

impl CurveSource for HttpCurveSource {
    fn fetch_month(&self, month: MonthKey) -> Result<String, AppError> {
        let resp = self
            .client
            .get(feed_url(month))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/xml, text/xml;q=0.9, */*;q=0.8")
            .send()
            .map_err(|e| AppError::Fetch(format!("Treasury request for {month} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Fetch(format!(
                "Treasury request for {month} failed with status {}.",
                resp.status()
            )));
        }

        resp.text()
            .map_err(|e| AppError::Fetch(format!("Failed to read feed body for {month}: {e}")))
    }
}
