// =============================================================================
// Binance Public Market Data — klines over REST
// =============================================================================
//
// Only unauthenticated endpoints are used, so no key material is held. The
// feed maps a configured timeframe ("1m", "5m", "1h", ...) straight onto the
// Binance `interval` parameter and the instrument onto `symbol`.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::broker::MarketFeed;
use crate::market_data::Candle;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance caps `/api/v3/klines` at 1000 rows per request.
const MAX_KLINES_LIMIT: usize = 1000;

/// Binance REST client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs.max(1)))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");
        Ok(Self { base_url, client })
    }

    /// GET /api/v3/klines.
    ///
    /// Returns [`Candle`]s parsed from Binance's array-of-arrays response.
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, ...
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINES_LIMIT);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let candles = parse_klines(&body)?;
        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient").field("base_url", &self.base_url).finish()
    }
}

/// Decode a klines payload. Malformed rows are skipped with a warning.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 6 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let Some(open_time) = arr[0].as_i64() else {
            warn!("skipping kline entry without an open time");
            continue;
        };
        let open = parse_str_f64(&arr[1])?;
        let high = parse_str_f64(&arr[2])?;
        let low = parse_str_f64(&arr[3])?;
        let close = parse_str_f64(&arr[4])?;
        let volume = parse_str_f64(&arr[5])?;

        candles.push(Candle::new(open_time, open, high, low, close, volume));
    }
    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>().with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

// ---------------------------------------------------------------------------
// Feed adapter
// ---------------------------------------------------------------------------

/// [`MarketFeed`] backed by Binance klines.
#[derive(Debug, Clone)]
pub struct BinanceFeed {
    client: BinanceClient,
}

impl BinanceFeed {
    pub fn new(client: BinanceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MarketFeed for BinanceFeed {
    async fn fetch_candles(&self, instrument: &str, timeframe: &str, count: usize) -> Result<Option<Vec<Candle>>> {
        let candles = self.client.get_klines(instrument, timeframe, count).await?;
        if candles.is_empty() {
            return Ok(None);
        }
        Ok(Some(candles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_encoded_klines() {
        let body = json!([
            [1700000000000i64, "100.5", "101.0", "99.5", "100.8", "12.5", 1700000299999i64, "0", 10, "0", "0", "0"],
            [1700000300000i64, "100.8", "102.0", "100.1", "101.9", "8.0", 1700000599999i64, "0", 7, "0", "0", "0"]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0], Candle::new(1_700_000_000_000, 100.5, 101.0, 99.5, 100.8, 12.5));
        assert_eq!(candles[1].close, 101.9);
    }

    #[test]
    fn skips_short_rows() {
        let body = json!([[1i64, "1", "2"], [2i64, "1", "2", "0.5", "1.5", "3"]]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 2);
    }

    #[test]
    fn rejects_non_array_payload() {
        assert!(parse_klines(&json!({"code": -1121, "msg": "Invalid symbol."})).is_err());
    }

    #[test]
    fn rejects_unparseable_price() {
        let body = json!([[1i64, "abc", "2", "0.5", "1.5", "3"]]);
        assert!(parse_klines(&body).is_err());
    }
}
