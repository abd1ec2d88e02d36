//! METAR/TAF lookup from the Aviation Weather API (raw text format).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const METAR_USER_AGENT: &str = concat!("aerocam/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Latest observation and forecast text for one station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeatherReport {
    pub raw_metar: Option<String>,
    pub raw_taf: Option<String>,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self) -> Result<WeatherReport>;
}

pub struct MetarClient {
    client: reqwest::Client,
    api_url: String,
    icao: String,
}

impl MetarClient {
    pub fn new(api_url: impl Into<String>, icao: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            icao: icao.into(),
        })
    }
}

#[async_trait]
impl WeatherSource for MetarClient {
    async fn fetch(&self) -> Result<WeatherReport> {
        debug!(url = %self.api_url, icao = %self.icao, "METAR request");
        let resp = self
            .client
            .get(&self.api_url)
            .query(&[
                ("ids", self.icao.as_str()),
                ("format", "raw"),
                ("taf", "true"),
                ("hours", "1"),
            ])
            .header(USER_AGENT, METAR_USER_AGENT)
            .send()
            .await?;

        let status = resp.status();
        debug!(status = status.as_u16(), "METAR response");
        match status {
            StatusCode::NO_CONTENT => {
                return Err(PipelineError::Weather("No METAR data available".into()))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(PipelineError::Weather(format!(
                    "Rate limited by Aviation Weather API (retry after {retry_after}s)"
                )));
            }
            StatusCode::BAD_REQUEST => {
                return Err(PipelineError::Weather("Invalid METAR request".into()))
            }
            s if !s.is_success() => {
                return Err(PipelineError::Weather(format!(
                    "METAR API error: HTTP {}",
                    s.as_u16()
                )))
            }
            _ => {}
        }

        let body = resp.text().await?;
        parse_raw(&body)
    }
}

/// Pull the first `METAR` line and the whole `TAF` block out of a raw
/// response. TAF continuation lines keep their leading indentation.
pub fn parse_raw(body: &str) -> Result<WeatherReport> {
    if body.trim().is_empty() {
        return Err(PipelineError::Weather("No METAR data in response".into()));
    }
    let mut metar = None;
    let mut taf: Vec<&str> = Vec::new();
    let mut in_taf = false;

    for line in body.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("METAR") {
            in_taf = false;
            if metar.is_none() {
                metar = Some(line.to_string());
            }
        } else if line.starts_with("TAF") {
            in_taf = true;
            taf.push(line);
        } else if in_taf {
            taf.push(line);
        }
    }

    if metar.is_none() && taf.is_empty() {
        return Err(PipelineError::Weather(
            "No METAR or TAF data found in response".into(),
        ));
    }
    Ok(WeatherReport {
        raw_metar: metar,
        raw_taf: (!taf.is_empty()).then(|| taf.join("\n")),
    })
}
