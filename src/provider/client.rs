//! HTTP client for the Nansen wallet-intelligence API
//!
//! All calls are JSON POSTs authenticated with an `apikey` header. Each
//! request waits on the shared rate limiter; transient failures (transport
//! errors, timeouts, 429 and 5xx) are retried with exponential backoff.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::rate_limit::RateLimiter;
use super::types::{
    DateRange, FlowIntelligenceRequest, FlowIntelligenceResponse, Page, Pagination, Range,
    SmartMoneyDexTrade, SmartMoneyDexTradesFilters, SmartMoneyDexTradesRequest, TgmDexTrade,
    TgmDexTradesFilters, TgmDexTradesRequest,
};
use super::{DiscoveryQuery, MarketDataProvider, TradeHistoryQuery};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::types::{Chain, FlowSnapshot, Timeframe};

const FLOW_INTELLIGENCE_PATH: &str = "/tgm/flow-intelligence";
const TGM_DEX_TRADES_PATH: &str = "/tgm/dex-trades";
const SMART_MONEY_DEX_TRADES_PATH: &str = "/smart-money/dex-trades";

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

pub struct NansenClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
    limiter: RateLimiter,
    retry_base_delay: Duration,
    retry_max_elapsed: Duration,
    max_history_pages: u32,
}

impl NansenClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout_ms,
            limiter: RateLimiter::from_millis(config.min_request_interval_ms),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            retry_max_elapsed: Duration::from_millis(config.retry_max_elapsed_ms),
            max_history_pages: config.max_history_pages,
        })
    }

    /// POST with retry on transient errors
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let backoff = ExponentialBackoff {
            initial_interval: self.retry_base_delay,
            max_interval: self.retry_base_delay * 8,
            max_elapsed_time: Some(self.retry_max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async move {
            match self.post_once(path, body).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!("Retryable provider error on {}: {}", path, e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => {
                    error!("Provider error on {}: {}", path, e);
                    Err(backoff::Error::permanent(e))
                }
            }
        })
        .await
    }

    /// Single paced attempt
    async fn post_once<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.limiter.wait_if_needed().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let mut body = text;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(Error::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&text).map_err(|e| Error::ProviderDecode(format!("{}: {}", path, e)))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ProviderTimeout(self.timeout_ms)
        } else {
            Error::from(e)
        }
    }
}

#[async_trait]
impl MarketDataProvider for NansenClient {
    async fn flow_snapshot(
        &self,
        chain: Chain,
        token_address: &str,
        timeframe: Timeframe,
    ) -> Result<FlowSnapshot> {
        let request = FlowIntelligenceRequest {
            chain,
            token_address: token_address.to_string(),
            timeframe,
        };
        let response: FlowIntelligenceResponse =
            self.post(FLOW_INTELLIGENCE_PATH, &request).await?;

        Ok(match response.data.into_iter().next() {
            Some(row) => row.into_snapshot(chain, token_address, timeframe),
            None => {
                debug!("No flow data for {} on {}", token_address, chain);
                FlowSnapshot::empty(chain, token_address, timeframe)
            }
        })
    }

    async fn trade_history(&self, query: &TradeHistoryQuery) -> Result<Vec<TgmDexTrade>> {
        let mut trades = Vec::new();
        let mut pages = 0;

        for page in 1..=self.max_history_pages {
            let request = TgmDexTradesRequest {
                chain: query.chain,
                token_address: query.token_address.clone(),
                date: DateRange::new(query.from, query.to),
                only_smart_money: query.only_smart_money,
                pagination: Pagination::page(page),
                filters: TgmDexTradesFilters {
                    action: query.action,
                    estimated_value_usd: query.min_value_usd.map(Range::at_least),
                },
            };

            let response: Page<TgmDexTrade> = self.post(TGM_DEX_TRADES_PATH, &request).await?;
            pages = page;
            let received = response.data.len();
            trades.extend(response.data);

            if response.pagination.last_page || received == 0 {
                break;
            }
        }

        // Stable: same-second trades keep server order
        trades.sort_by_key(|t| t.block_timestamp);

        info!(
            "Fetched {} trades for {} across {} pages",
            trades.len(),
            query.token_address,
            pages
        );
        Ok(trades)
    }

    async fn smart_money_trades(&self, query: &DiscoveryQuery) -> Result<Vec<SmartMoneyDexTrade>> {
        let request = SmartMoneyDexTradesRequest {
            chains: vec![query.chain],
            filters: SmartMoneyDexTradesFilters {
                token_bought_age_days: Some(Range::between(0.0, query.max_token_age_days)),
                trade_value_usd: Some(Range::at_least(query.min_trade_value_usd)),
            },
            pagination: Pagination::page(1),
        };

        let response: Page<SmartMoneyDexTrade> =
            self.post(SMART_MONEY_DEX_TRADES_PATH, &request).await?;
        debug!(
            "Smart money DEX trades on {}: {}",
            query.chain,
            response.data.len()
        );
        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves canned (status, body) responses in order, one per connection,
    /// and records each raw request.
    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{}", addr), seen)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            base_url,
            api_key: "test-key".to_string(),
            timeout_ms: 2_000,
            min_request_interval_ms: 0,
            retry_base_delay_ms: 10,
            retry_max_elapsed_ms: 500,
            max_history_pages: 20,
        }
    }

    fn trade_row(hash: &str, ts: &str) -> String {
        format!(
            r#"{{"block_timestamp":"{}","transaction_hash":"{}","trader_address":"w-{}","trader_address_label":"Fund","action":"BUY","estimated_swap_price_usd":0.01,"estimated_value_usd":500.0}}"#,
            ts, hash, hash
        )
    }

    #[tokio::test]
    async fn test_flow_snapshot_sends_api_key() {
        let (url, seen) = serve(vec![(
            200,
            r#"{"data":[{"smart_money_net_flow_usd":25000.0,"smart_money_wallet_count":4}]}"#
                .to_string(),
        )])
        .await;
        let client = NansenClient::new(&config(url)).unwrap();

        let snapshot = client
            .flow_snapshot(Chain::Solana, "Mint", Timeframe::OneDay)
            .await
            .unwrap();
        assert_eq!(snapshot.smart_money_net_flow_usd, 25_000.0);
        assert_eq!(snapshot.smart_money_wallet_count, 4);
        assert_eq!(snapshot.whale_net_flow_usd, 0.0);

        let requests = seen.lock().unwrap();
        assert!(requests[0].starts_with("POST /tgm/flow-intelligence"));
        assert!(requests[0].to_ascii_lowercase().contains("apikey: test-key"));
        assert!(requests[0].contains(r#""timeframe":"24h""#));
    }

    #[tokio::test]
    async fn test_empty_flow_response_is_zero_snapshot() {
        let (url, _) = serve(vec![(200, r#"{"data":[]}"#.to_string())]).await;
        let client = NansenClient::new(&config(url)).unwrap();
        let snapshot = client
            .flow_snapshot(Chain::Base, "0xabc", Timeframe::OneHour)
            .await
            .unwrap();
        assert_eq!(snapshot.category_flows(), [0.0, 0.0, 0.0]);
        assert_eq!(snapshot.timeframe, Timeframe::OneHour);
    }

    #[tokio::test]
    async fn test_trade_history_pages_until_last() {
        let page1 = format!(
            r#"{{"data":[{},{}],"pagination":{{"page":1,"per_page":100,"last_page":false}}}}"#,
            trade_row("b", "2025-01-02T00:10:00"),
            trade_row("a", "2025-01-02T00:05:00")
        );
        let page2 = format!(
            r#"{{"data":[{}],"pagination":{{"page":2,"per_page":100,"last_page":true}}}}"#,
            trade_row("c", "2025-01-02T00:20:00")
        );
        let (url, seen) = serve(vec![(200, page1), (200, page2)]).await;
        let client = NansenClient::new(&config(url)).unwrap();

        let query = TradeHistoryQuery {
            chain: Chain::Solana,
            token_address: "Mint".to_string(),
            from: Utc::now() - ChronoDuration::days(7),
            to: Utc::now(),
            only_smart_money: true,
            action: Some(crate::provider::TradeAction::Buy),
            min_value_usd: Some(100.0),
        };
        let trades = client.trade_history(&query).await.unwrap();
        let hashes: Vec<&str> = trades.iter().map(|t| t.transaction_hash.as_str()).collect();
        assert_eq!(hashes, vec!["a", "b", "c"]);

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].contains(r#""page":2"#));
        assert!(requests[0].contains(r#""action":"BUY""#));
    }

    #[tokio::test]
    async fn test_history_without_pagination_is_one_page() {
        let body = format!(r#"{{"data":[{}]}}"#, trade_row("only", "2025-01-02T00:00:00"));
        let (url, seen) = serve(vec![(200, body)]).await;
        let client = NansenClient::new(&config(url)).unwrap();

        let query = TradeHistoryQuery {
            chain: Chain::Solana,
            token_address: "Mint".to_string(),
            from: Utc::now(),
            to: Utc::now(),
            only_smart_money: true,
            action: None,
            min_value_usd: None,
        };
        let trades = client.trade_history(&query).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_stops_at_page_cap() {
        let page = format!(
            r#"{{"data":[{}],"pagination":{{"page":1,"per_page":100,"last_page":false}}}}"#,
            trade_row("x", "2025-01-02T00:00:00")
        );
        let (url, seen) = serve(vec![(200, page.clone()), (200, page)]).await;
        let mut cfg = config(url);
        cfg.max_history_pages = 2;
        let client = NansenClient::new(&cfg).unwrap();

        let query = TradeHistoryQuery {
            chain: Chain::Solana,
            token_address: "Mint".to_string(),
            from: Utc::now(),
            to: Utc::now(),
            only_smart_money: true,
            action: None,
            min_value_usd: None,
        };
        let trades = client.trade_history(&query).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let (url, seen) = serve(vec![
            (503, "busy".to_string()),
            (200, r#"{"data":[],"pagination":{"last_page":true}}"#.to_string()),
        ])
        .await;
        let client = NansenClient::new(&config(url)).unwrap();

        let query = DiscoveryQuery {
            chain: Chain::Solana,
            max_token_age_days: 1.0,
            min_trade_value_usd: 1_000.0,
        };
        let trades = client.smart_money_trades(&query).await.unwrap();
        assert!(trades.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let (url, seen) = serve(vec![(401, r#"{"error":"bad key"}"#.to_string())]).await;
        let client = NansenClient::new(&config(url)).unwrap();

        let err = client
            .flow_snapshot(Chain::Solana, "Mint", Timeframe::OneDay)
            .await
            .unwrap_err();
        match err {
            Error::ProviderStatus { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
