//! # Klinebox Core
//!
//! Historical K-line retrieval with a layered in-process cache.
//!
//! ## Overview
//!
//! The crate fetches price-bar series for an instrument from the upstream
//! market-data endpoint, caches them keyed by instrument, bar period, and
//! calendar date, and serves range and point queries from the cache whenever
//! the cached window covers the request.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`domain`] | Bar records, periods, and date formats |
//! | [`cache`] | Multi-period in-memory bar store |
//! | [`fetch`] | Remote fetch with market-prefix fallback |
//! | [`service`] | Query surface: range, point, recent-N, default lookback |
//! | [`http_client`] | Transport abstraction (reqwest / test doubles) |
//! | [`error`] | Parse and fetch error taxonomy |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use klinebox_core::{KlineFetcher, KlineService, Period, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = KlineFetcher::new(Arc::new(ReqwestHttpClient::new()));
//!     let service = KlineService::new(fetcher);
//!
//!     let bars = service.get_recent("510300", Period::Daily, 30).await;
//!     for bar in &bars {
//!         println!("{} close {:.2}", bar.date, bar.close);
//!     }
//! }
//! ```
//!
//! ## Failure semantics
//!
//! "No data" is an ordinary outcome: queries return empty sequences or `None`
//! rather than errors. Transport faults and malformed upstream lines are
//! absorbed at the fetcher boundary and logged via `tracing`.

pub mod cache;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod http_client;
pub mod service;

pub use cache::{CacheStats, PeriodCache};
pub use domain::{format_compact_date, parse_iso_date, BarRecord, Period};
pub use error::{FetchError, ParseError};
pub use fetch::{FetcherConfig, KlineFetcher};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient};
pub use service::KlineService;
