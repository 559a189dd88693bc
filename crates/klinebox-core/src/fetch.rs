//! Remote kline retrieval.
//!
//! Builds the upstream query, resolves instrument routing ambiguity by trying
//! market prefixes in order, parses the response envelope, and hands back a
//! date-descending batch of bars. All failure modes of an attempt degrade to
//! "this prefix produced no data"; callers only ever see a possibly-empty
//! batch.

use std::sync::Arc;

use serde::Deserialize;
use time::Date;
use tracing::{debug, warn};

use crate::domain::{format_compact_date, BarRecord, Period};
use crate::error::FetchError;
use crate::http_client::{HttpClient, HttpRequest};

/// Market prefixes tried in order; the same short instrument code may exist
/// on either market, and the first non-empty result wins.
const MARKET_PREFIXES: [&str; 2] = ["1.", "0."];

const DEFAULT_BASE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";

/// Upstream adjustment mode, fixed to forward-adjusted.
const FORWARD_ADJUSTED: u8 = 1;

/// Fetcher configuration. The base URL override is the seam used by offline
/// tests; the read timeout applies per market-prefix attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    pub base_url: String,
    pub read_timeout_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            read_timeout_ms: 10_000,
        }
    }
}

impl FetcherConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_read_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }
}

/// Upstream response envelope: `rc` is the status code (0 = success), the
/// data payload may be absent.
#[derive(Debug, Deserialize)]
struct KlineEnvelope {
    rc: i32,
    #[serde(default)]
    data: Option<KlinePayload>,
}

#[derive(Debug, Deserialize)]
struct KlinePayload {
    #[serde(default)]
    klines: Vec<String>,
}

/// Remote market-data fetcher with market-prefix fallback.
#[derive(Clone)]
pub struct KlineFetcher {
    http: Arc<dyn HttpClient>,
    config: FetcherConfig,
}

impl KlineFetcher {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_config(http, FetcherConfig::default())
    }

    pub fn with_config(http: Arc<dyn HttpClient>, config: FetcherConfig) -> Self {
        Self { http, config }
    }

    /// Fetch bars for `[start, end]`, trying each market prefix in turn.
    ///
    /// Returns the first non-empty batch sorted by date descending. An empty
    /// result means no market had data for the window; transport faults and
    /// upstream error codes are logged and never propagate.
    pub async fn fetch(
        &self,
        code: &str,
        period: Period,
        start: Date,
        end: Date,
    ) -> Vec<BarRecord> {
        let beg = format_compact_date(start);
        let fin = format_compact_date(end);

        for prefix in MARKET_PREFIXES {
            match self.attempt(prefix, code, period, &beg, &fin).await {
                Ok(mut bars) if !bars.is_empty() => {
                    bars.sort_by(|a, b| b.date.cmp(&a.date));
                    debug!(code, prefix, period = %period, count = bars.len(), "fetch succeeded");
                    return bars;
                }
                Ok(_) => {
                    debug!(code, prefix, period = %period, "market prefix produced no data");
                }
                Err(error) => {
                    warn!(code, prefix, period = %period, %error, "fetch attempt failed");
                }
            }
        }

        debug!(code, period = %period, "no data from any market prefix");
        Vec::new()
    }

    /// One market-prefix attempt with its own timeout budget.
    async fn attempt(
        &self,
        prefix: &str,
        code: &str,
        period: Period,
        beg: &str,
        end: &str,
    ) -> Result<Vec<BarRecord>, FetchError> {
        let url = self.build_url(prefix, code, period, beg, end);
        let request = HttpRequest::get(url).with_timeout_ms(self.config.read_timeout_ms);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| FetchError::Transport {
                message: e.message().to_owned(),
            })?;

        if !response.is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status,
            });
        }

        let envelope: KlineEnvelope =
            serde_json::from_str(&response.body).map_err(|e| FetchError::Envelope {
                message: e.to_string(),
            })?;

        if envelope.rc != 0 {
            return Err(FetchError::UpstreamCode { rc: envelope.rc });
        }

        let payload = envelope.data.ok_or(FetchError::MissingPayload)?;

        let mut bars = Vec::with_capacity(payload.klines.len());
        for line in &payload.klines {
            match BarRecord::parse(line, period) {
                Ok(bar) => bars.push(bar),
                Err(error) => {
                    // One bad line never fails the batch.
                    warn!(code, %error, line = line.as_str(), "dropping malformed kline line");
                }
            }
        }
        Ok(bars)
    }

    fn build_url(&self, prefix: &str, code: &str, period: Period, beg: &str, end: &str) -> String {
        format!(
            "{base}?secid={prefix}{code}\
             &fields1=f1,f2,f3,f4,f5,f6\
             &fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61\
             &klt={klt}&fqt={fqt}&beg={beg}&end={end}",
            base = self.config.base_url,
            code = urlencoding::encode(code),
            klt = period.code(),
            fqt = FORWARD_ADJUSTED,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use time::macros::date;

    /// Replays a scripted sequence of responses and records request URLs.
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().expect("url store should not be poisoned").clone()
        }
    }

    impl HttpClient for ScriptedClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.urls
                .lock()
                .expect("url store should not be poisoned")
                .push(request.url);
            let response = self
                .responses
                .lock()
                .expect("response store should not be poisoned")
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::new("scripted responses exhausted")));
            Box::pin(async move { response })
        }
    }

    fn kline_body(lines: &[&str]) -> String {
        serde_json::json!({ "rc": 0, "data": { "klines": lines } }).to_string()
    }

    fn fetcher(client: Arc<ScriptedClient>) -> KlineFetcher {
        KlineFetcher::with_config(
            client,
            FetcherConfig::default().with_base_url("https://kline.test/get"),
        )
    }

    #[tokio::test]
    async fn builds_forward_adjusted_query_with_compact_dates() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(HttpResponse::ok_json(kline_body(
            &["2024-01-02,3.45,3.52,3.55,3.41,1845300,6438221.0,4.06,2.03,0.07,0.53"],
        )))]));
        let bars = fetcher(client.clone())
            .fetch("510300", Period::Weekly, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await;

        assert_eq!(bars.len(), 1);
        let url = &client.urls()[0];
        assert!(url.starts_with("https://kline.test/get?secid=1.510300"));
        assert!(url.contains("klt=102"));
        assert!(url.contains("fqt=1"));
        assert!(url.contains("beg=20240101"));
        assert!(url.contains("end=20240131"));
    }

    #[tokio::test]
    async fn falls_back_to_second_market_prefix_on_empty_payload() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(HttpResponse::ok_json(kline_body(&[]))),
            Ok(HttpResponse::ok_json(kline_body(&[
                "2024-01-02,3.45,3.52,3.55,3.41,1845300,6438221.0,4.06,2.03,0.07,0.53",
            ]))),
        ]));
        let bars = fetcher(client.clone())
            .fetch("000001", Period::Daily, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await;

        assert_eq!(bars.len(), 1);
        let urls = client.urls();
        assert!(urls[0].contains("secid=1.000001"));
        assert!(urls[1].contains("secid=0.000001"));
    }

    #[tokio::test]
    async fn transport_fault_degrades_to_next_prefix_then_no_data() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(HttpError::new("request timeout")),
            Err(HttpError::new("connection failed")),
        ]));
        let bars = fetcher(client.clone())
            .fetch("510300", Period::Daily, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await;

        assert!(bars.is_empty());
        assert_eq!(client.urls().len(), 2);
    }

    #[tokio::test]
    async fn nonzero_status_code_counts_as_no_data_for_that_prefix() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(HttpResponse::ok_json(r#"{"rc": 100, "data": null}"#)),
            Ok(HttpResponse::ok_json(kline_body(&[
                "2024-01-02,3.45,3.52,3.55,3.41,1845300,6438221.0,4.06,2.03,0.07,0.53",
            ]))),
        ]));
        let bars = fetcher(client)
            .fetch("510300", Period::Daily, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await;
        assert_eq!(bars.len(), 1);
    }

    #[tokio::test]
    async fn sorts_bars_date_descending_regardless_of_upstream_order() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(HttpResponse::ok_json(kline_body(
            &[
                "2024-01-03,3.45,3.52,3.55,3.41,1845300,6438221.0,4.06,2.03,0.07,0.53",
                "2024-01-05,3.52,3.58,3.60,3.50,1623400,5821400.0,2.84,1.70,0.06,0.47",
                "2024-01-04,3.50,3.51,3.56,3.48,1510200,5301800.0,2.27,-0.28,-0.01,0.43",
            ],
        )))]));
        let bars = fetcher(client)
            .fetch("510300", Period::Daily, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await;

        let dates: Vec<Date> = bars.iter().map(|b| b.date).collect();
        assert_eq!(
            dates,
            vec![date!(2024 - 01 - 05), date!(2024 - 01 - 04), date!(2024 - 01 - 03)]
        );
    }

    #[tokio::test]
    async fn malformed_line_is_dropped_and_batch_survives() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(HttpResponse::ok_json(kline_body(
            &[
                "2024-01-02,3.45,3.52,3.55,3.41,1845300,6438221.0,4.06,2.03,0.07,0.53",
                "2024-01-03,3.52,3.58,3.60",
                "2024-01-04,3.50,3.51,3.56,3.48,1510200,5301800.0,2.27,-0.28,-0.01,0.43",
            ],
        )))]));
        let bars = fetcher(client)
            .fetch("510300", Period::Daily, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await;

        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|b| b.date != date!(2024 - 01 - 03)));
    }
}
