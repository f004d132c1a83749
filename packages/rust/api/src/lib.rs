//! HTTP client for the FAO Codex Alimentarius pesticide-residue service.
//!
//! Three request kinds: the category taxonomy (one JSON document), commodity
//! details, and pesticide details. Detail payloads occasionally arrive
//! truncated or with stray control characters, so responses are sanitized
//! before parsing and decode failures are retried with exponential backoff.
//! Network failures are never retried here; the caller decides.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use pestres_shared::{
    CommodityCategory, CommodityDetail, Endpoints, FetchConfig, PesticideDetail, PestresError,
    Result,
};

/// User-Agent string for harvest requests.
const USER_AGENT: &str = concat!("pestres/", env!("CARGO_PKG_VERSION"));

/// Language code sent with detail requests. The note-collapse in the export
/// stage assumes English payloads.
const LANG: &str = "en";

/// Client for the remote pesticide-residue endpoints.
///
/// Holds no state between calls beyond the connection pool.
pub struct CodexClient {
    http: Client,
    endpoints: Endpoints,
    max_attempts: u32,
    backoff_base: Duration,
}

impl CodexClient {
    /// Create a new client from runtime fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PestresError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoints: config.endpoints.clone(),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    /// Fetch the full commodity taxonomy.
    ///
    /// `at` feeds a bare millisecond-epoch query string appended purely for
    /// cache busting; it carries no meaning to the remote. No retry: without
    /// the taxonomy the run cannot proceed anyway.
    #[instrument(skip_all)]
    pub async fn fetch_categories(&self, at: DateTime<Utc>) -> Result<Vec<CommodityCategory>> {
        let url = format!(
            "{}?{}",
            self.endpoints.categories_url,
            at.timestamp_millis()
        );
        info!("fetching commodity categories");

        let body = self.get_text(&url).await?;
        serde_json::from_str(&body)
            .map_err(|e| PestresError::decode(format!("category list: {e}")))
    }

    /// Fetch the detail record for one commodity lookup key.
    #[instrument(skip(self))]
    pub async fn fetch_commodity_detail(&self, id: &str) -> Result<CommodityDetail> {
        info!(id, "fetching commodity detail");
        self.fetch_detail(&self.endpoints.commodity_detail_url, id)
            .await
    }

    /// Fetch the detail record for one pesticide id.
    #[instrument(skip(self))]
    pub async fn fetch_pesticide_detail(&self, id: &str) -> Result<PesticideDetail> {
        info!(id, "fetching pesticide detail");
        self.fetch_detail(&self.endpoints.pesticide_detail_url, id)
            .await
    }

    /// Shared detail-fetch path: request, sanitize, parse, retry on decode
    /// failure with exponential backoff. Network errors propagate on the
    /// spot — retrying those is the transport's business, not ours.
    async fn fetch_detail<T: DeserializeOwned>(&self, base_url: &str, id: &str) -> Result<T> {
        let url = format!("{base_url}?id={id}&lang={LANG}");
        let mut delay = self.backoff_base;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let body = self.get_text(&url).await?;
            let cleaned = sanitize_payload(&body);

            let parsed: Result<T> = serde_json::from_str(&cleaned)
                .map_err(|e| PestresError::decode(format!("{url} (attempt {attempt}): {e}")));

            match parsed {
                Ok(parsed) => return Ok(parsed),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        %url,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "decode failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issue one GET and return the response body as text.
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(%url, "GET");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PestresError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PestresError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| PestresError::Network(format!("{url}: body read failed: {e}")))
    }
}

/// Strip the erroneous characters the remote is known to emit: literal tabs
/// inside string values, an en-dash where a hyphen belongs, and a stray
/// `0x03` control byte.
fn sanitize_payload(raw: &str) -> String {
    raw.replace('\t', "")
        .replace('\u{2013}', "-")
        .replace('\u{0003}', " ")
}
