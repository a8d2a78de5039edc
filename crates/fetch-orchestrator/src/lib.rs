pub mod cache;
pub mod fan_out;
pub mod reports;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use dashmap::DashMap;
use provider_core::{
    Cell, EndpointRegistry, FetchPayload, InvocationRequest, PricePoint, ProviderConfig,
    ProviderError, ReportSet, TabularResult,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use valuation_engine::{compute_ratios, ValuationPoint, ValuationRatios};
use worker_gateway::{RetryClient, WorkerGateway};

pub use cache::{ReportCache, ReportCacheKey};
pub use fan_out::{fan_out, NamedFetch};
pub use reports::{parse_price_series, parse_report_set};

const PRICE_HISTORY_ENDPOINT: &str = "stock_zh_a_hist";
const FINANCIAL_INDICATOR_ENDPOINT: &str = "stock_financial_analysis_indicator";
const QUOTE_ENDPOINT: &str = "stock_bid_ask_em";
const BASIC_INFO_ENDPOINT: &str = "stock_individual_info_em";
const COMPANY_PROFILE_ENDPOINT: &str = "stock_profile_cninfo";
const BUSINESS_SUMMARY_ENDPOINT: &str = "stock_zyjs_ths";

const QUOTE_ITEM_LATEST: &str = "最新";

struct CacheEntry<T> {
    data: T,
    cached_at: Instant,
}

/// Today's valuation snapshot: the live price against the most recent
/// annual report that exists.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentValuation {
    pub symbol: String,
    pub price: f64,
    pub report_year: Option<i32>,
    pub report_date: Option<NaiveDate>,
    pub ratios: ValuationRatios,
}

/// Front door for all data access. Owns the retry client, the fan-out
/// pool and both caches; cheap to clone and share across tasks.
#[derive(Clone)]
pub struct FetchOrchestrator {
    client: Arc<RetryClient>,
    registry: Arc<EndpointRegistry>,
    config: ProviderConfig,
    pool: Arc<Semaphore>,
    report_cache: ReportCache,
    price_cache: Arc<DashMap<String, CacheEntry<Vec<PricePoint>>>>,
}

impl FetchOrchestrator {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Arc::new(RetryClient::new(WorkerGateway::new(config.worker.clone())));
        Self {
            client,
            registry: Arc::new(EndpointRegistry::builtin()),
            pool: Arc::new(Semaphore::new(config.pool_size)),
            report_cache: ReportCache::new(config.report_cache_capacity),
            price_cache: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn with_registry(mut self, registry: EndpointRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Validate parameters against the catalog and stamp the configured
    /// retry policy onto the request. A caller-supplied `timeout` (seconds)
    /// becomes the budget override where the endpoint allows it.
    fn request(
        &self,
        endpoint: &str,
        mut params: Map<String, Value>,
    ) -> Result<InvocationRequest, ProviderError> {
        let user_timeout = params
            .remove("timeout")
            .and_then(|v| v.as_f64())
            .filter(|secs| *secs > 0.0)
            .map(Duration::from_secs_f64);

        let validated = self.registry.validate_params(endpoint, &params)?;
        let mut request = InvocationRequest::new(endpoint)
            .with_params(validated)
            .with_max_retries(self.config.max_retries)
            .with_backoff_base(self.config.backoff_base);

        if let Some(timeout) = user_timeout {
            let allowed = self
                .registry
                .get(endpoint)
                .is_some_and(|d| d.supports_user_timeout);
            if allowed {
                request = request.with_timeout(timeout);
            } else {
                tracing::debug!(endpoint, "endpoint ignores user timeouts, using category budget");
            }
        }
        Ok(request)
    }

    /// Raw single-endpoint access for callers that want the payload as-is.
    pub async fn invoke(
        &self,
        endpoint: &str,
        params: Map<String, Value>,
    ) -> Result<FetchPayload, ProviderError> {
        let request = self.request(endpoint, params)?;
        self.client.invoke_with_retry(&request).await
    }

    /// Run a batch of independent fetches under the bounded pool; see
    /// [`fan_out::fan_out`] for the partial-failure contract.
    pub async fn fan_out(
        &self,
        fetches: Vec<NamedFetch>,
    ) -> BTreeMap<String, Option<FetchPayload>> {
        fan_out::fan_out(Arc::clone(&self.client), Arc::clone(&self.pool), fetches).await
    }

    /// Daily closes for one entity, TTL-cached. Intraday staleness up to
    /// the TTL is acceptable for valuation work.
    pub async fn price_history(
        &self,
        symbol: &str,
        start_date: &str,
        end_date: &str,
        adjust: Option<&str>,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        let adjust = adjust.unwrap_or("");
        let key = format!("{symbol}:{start_date}:{end_date}:{adjust}");
        if let Some(entry) = self.price_cache.get(&key) {
            if entry.cached_at.elapsed() < self.config.price_cache_ttl {
                tracing::debug!(symbol, "price history served from cache");
                return Ok(entry.data.clone());
            }
        }

        let mut params = Map::new();
        params.insert("symbol".to_string(), Value::String(symbol.to_string()));
        params.insert("start_date".to_string(), Value::String(start_date.to_string()));
        params.insert("end_date".to_string(), Value::String(end_date.to_string()));
        params.insert("adjust".to_string(), Value::String(adjust.to_string()));

        let payload = self.invoke(PRICE_HISTORY_ENDPOINT, params).await?;
        let points = parse_price_series(&payload.into_table()?)?;

        // expired entries for other keys are never read again, so each
        // insert sweeps them to keep the map bounded
        self.price_cache
            .retain(|_, entry| entry.cached_at.elapsed() < self.config.price_cache_ttl);
        self.price_cache.insert(
            key,
            CacheEntry {
                data: points.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(points)
    }

    /// Annual reports from `start_year` on, LRU-cached per (symbol, year).
    pub async fn financial_reports(
        &self,
        symbol: &str,
        start_year: i32,
    ) -> Result<ReportSet, ProviderError> {
        let key = ReportCacheKey {
            symbol: symbol.to_string(),
            start_year,
        };
        self.report_cache
            .get_or_compute(key, || async move {
                let mut params = Map::new();
                params.insert("symbol".to_string(), Value::String(symbol.to_string()));
                params.insert(
                    "start_year".to_string(),
                    Value::String(start_year.to_string()),
                );
                let payload = self.invoke(FINANCIAL_INDICATOR_ENDPOINT, params).await?;
                parse_report_set(&payload.into_table()?, start_year)
            })
            .await
    }

    /// Price series joined with strictly-prior annual reports and the
    /// derived ratios. Prices are essential; missing financials degrade
    /// the series to unavailable ratios instead of failing it.
    pub async fn historical_valuation(
        &self,
        symbol: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<ValuationPoint>, ProviderError> {
        // reports from the year before the window so the first trading
        // days have a prior report to join against
        let report_start = leading_year(start_date)? - 1;

        let (prices, reports) = tokio::join!(
            self.price_history(symbol, start_date, end_date, None),
            self.financial_reports(symbol, report_start),
        );

        let prices = prices?;
        let reports = match reports {
            Ok(reports) => reports,
            Err(err) => {
                tracing::warn!(symbol, error = %err, "financial reports unavailable, valuation degrades");
                ReportSet::new()
            }
        };

        Ok(valuation_engine::historical_valuation(&prices, &reports))
    }

    /// Live quote against the latest published annual report. The quote
    /// is essential; a missing report yields unavailable ratios.
    pub async fn current_valuation(
        &self,
        symbol: &str,
    ) -> Result<CurrentValuation, ProviderError> {
        let mut params = Map::new();
        params.insert("symbol".to_string(), Value::String(symbol.to_string()));

        let fetches = vec![
            NamedFetch::new("quote", self.request(QUOTE_ENDPOINT, params.clone())?),
            NamedFetch::new(
                "financial",
                self.request(FINANCIAL_INDICATOR_ENDPOINT, params)?,
            ),
        ];
        let mut results = self.fan_out(fetches).await;

        let price = results
            .remove("quote")
            .flatten()
            .and_then(|payload| payload.as_table().and_then(latest_quote_price))
            .ok_or_else(|| {
                ProviderError::InvalidData(format!("no usable realtime quote for {symbol}"))
            })?;

        let latest = results
            .remove("financial")
            .flatten()
            .and_then(|payload| payload.into_table().ok())
            .and_then(|table| parse_report_set(&table, 0).ok())
            .and_then(|reports| {
                reports
                    .iter()
                    .next_back()
                    .map(|(year, record)| (*year, record.clone()))
            });

        let (report_year, report_date, ratios) = match latest {
            Some((year, record)) => (
                Some(year),
                Some(record.report_date),
                compute_ratios(price, &record),
            ),
            None => {
                tracing::warn!(symbol, "no annual report available for current valuation");
                (None, None, ValuationRatios::unavailable())
            }
        };

        Ok(CurrentValuation {
            symbol: symbol.to_string(),
            price,
            report_year,
            report_date,
            ratios,
        })
    }

    /// Identity, company profile, business summary and live quote in one
    /// bounded batch. Slots fail independently; only a total blackout is
    /// an error.
    pub async fn entity_profile(
        &self,
        symbol: &str,
    ) -> Result<BTreeMap<String, Option<FetchPayload>>, ProviderError> {
        let mut params = Map::new();
        params.insert("symbol".to_string(), Value::String(symbol.to_string()));

        let fetches = vec![
            NamedFetch::new("basic_info", self.request(BASIC_INFO_ENDPOINT, params.clone())?),
            NamedFetch::new(
                "company_profile",
                self.request(COMPANY_PROFILE_ENDPOINT, params.clone())?,
            ),
            NamedFetch::new(
                "business_summary",
                self.request(BUSINESS_SUMMARY_ENDPOINT, params.clone())?,
            ),
            NamedFetch::new("quote", self.request(QUOTE_ENDPOINT, params)?),
        ];
        let results = self.fan_out(fetches).await;

        if results.values().all(Option::is_none) {
            return Err(ProviderError::InvalidData(format!(
                "every profile source failed for {symbol}"
            )));
        }
        Ok(results)
    }

    pub async fn clear_caches(&self) {
        self.price_cache.clear();
        self.report_cache.clear().await;
    }
}

/// The quote table is item/value pairs; pull the latest traded price.
fn latest_quote_price(table: &TabularResult) -> Option<f64> {
    let item_idx = table.column_index("item")?;
    let value_idx = table.column_index("value")?;
    table
        .rows
        .iter()
        .find(|row| row.get(item_idx).and_then(Cell::as_str) == Some(QUOTE_ITEM_LATEST))
        .and_then(|row| row.get(value_idx))
        .and_then(Cell::as_f64)
        .filter(|price| *price > 0.0)
}

fn leading_year(date: &str) -> Result<i32, ProviderError> {
    date.get(..4)
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| {
            ProviderError::Validation(format!("date '{date}' does not start with a year"))
        })
}
