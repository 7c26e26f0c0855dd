//! Wire types for the wallet-intelligence API

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Chain, FlowSnapshot, Timeframe};

/// Rows per page requested from paginated endpoints
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn page(page: u32) -> Self {
        Self {
            page,
            per_page: PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    /// Missing means the server had nothing more to give
    #[serde(default = "default_last_page")]
    pub last_page: bool,
}

fn default_last_page() -> bool {
    true
}

/// An absent envelope is a single, final page
impl Default for PaginationMeta {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: 0,
            last_page: default_last_page(),
        }
    }
}

/// Paginated response envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub data: Vec<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pagination: PaginationMeta,
}

/// Inclusive numeric bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Range {
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

impl DateRange {
    /// Day granularity, as the API expects
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: from.format("%Y-%m-%d").to_string(),
            to: to.format("%Y-%m-%d").to_string(),
        }
    }
}

// Flow intelligence

#[derive(Debug, Clone, Serialize)]
pub struct FlowIntelligenceRequest {
    pub chain: Chain,
    pub token_address: String,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowIntelligenceResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<FlowIntelligenceData>,
}

/// Per-category flow row; absent or null numbers read as zero
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FlowIntelligenceData {
    #[serde(deserialize_with = "null_as_default")]
    pub smart_money_net_flow_usd: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub smart_money_wallet_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub whale_net_flow_usd: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub whale_wallet_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub public_figure_net_flow_usd: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub public_figure_wallet_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub exchange_net_flow_usd: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub exchange_wallet_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub fresh_wallet_net_flow_usd: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub fresh_wallet_wallet_count: u32,
}

impl FlowIntelligenceData {
    pub fn into_snapshot(
        self,
        chain: Chain,
        token_address: &str,
        timeframe: Timeframe,
    ) -> FlowSnapshot {
        FlowSnapshot {
            smart_money_net_flow_usd: self.smart_money_net_flow_usd,
            smart_money_wallet_count: self.smart_money_wallet_count,
            whale_net_flow_usd: self.whale_net_flow_usd,
            whale_wallet_count: self.whale_wallet_count,
            public_figure_net_flow_usd: self.public_figure_net_flow_usd,
            public_figure_wallet_count: self.public_figure_wallet_count,
            ..FlowSnapshot::empty(chain, token_address, timeframe)
        }
    }
}

// Token DEX trades

#[derive(Debug, Clone, Default, Serialize)]
pub struct TgmDexTradesFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TradeAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_value_usd: Option<Range>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TgmDexTradesRequest {
    pub chain: Chain,
    pub token_address: String,
    pub date: DateRange,
    pub only_smart_money: bool,
    pub pagination: Pagination,
    pub filters: TgmDexTradesFilters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgmDexTrade {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub trader_address: String,
    #[serde(default)]
    pub trader_address_label: Option<String>,
    pub action: TradeAction,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_symbol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estimated_swap_price_usd: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estimated_value_usd: f64,
}

// Smart money DEX trades

#[derive(Debug, Clone, Default, Serialize)]
pub struct SmartMoneyDexTradesFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_bought_age_days: Option<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_value_usd: Option<Range>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartMoneyDexTradesRequest {
    pub chains: Vec<Chain>,
    pub filters: SmartMoneyDexTradesFilters,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmartMoneyDexTrade {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub trader_address: String,
    #[serde(default)]
    pub trader_address_label: Option<String>,
    pub token_bought_address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_bought_symbol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_bought_amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_bought_age_days: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_bought_market_cap_usd: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trade_value_usd: f64,
}

/// Reads `null` the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DDTHH:MM:SS` (read as UTC)
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trade_timestamp_formats() {
        let json = r#"{
            "block_timestamp": "2025-01-02T03:04:05",
            "transaction_hash": "0xaa",
            "trader_address": "0xbb",
            "trader_address_label": null,
            "action": "BUY",
            "estimated_swap_price_usd": 0.5,
            "estimated_value_usd": 250.0
        }"#;
        let trade: TgmDexTrade = serde_json::from_str(json).unwrap();
        assert_eq!(
            trade.block_timestamp,
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
        );
        assert_eq!(trade.action, TradeAction::Buy);
        assert!(trade.trader_address_label.is_none());

        let json = json.replace("2025-01-02T03:04:05", "2025-01-02T03:04:05Z");
        let trade: TgmDexTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade.block_timestamp.timestamp(), 1735787045);
    }

    #[test]
    fn test_flow_missing_fields_default_to_zero() {
        let resp: FlowIntelligenceResponse =
            serde_json::from_str(r#"{"data":[{"smart_money_net_flow_usd": 1200.5}]}"#).unwrap();
        let snapshot = resp.data[0]
            .clone()
            .into_snapshot(Chain::Solana, "Mint", Timeframe::OneDay);
        assert_eq!(snapshot.smart_money_net_flow_usd, 1200.5);
        assert_eq!(snapshot.whale_wallet_count, 0);
        assert_eq!(snapshot.public_figure_net_flow_usd, 0.0);
    }

    #[test]
    fn test_request_omits_empty_bounds() {
        let req = SmartMoneyDexTradesRequest {
            chains: vec![Chain::Base],
            filters: SmartMoneyDexTradesFilters {
                token_bought_age_days: Some(Range::between(0.0, 7.0)),
                trade_value_usd: Some(Range::at_least(1000.0)),
            },
            pagination: Pagination::page(1),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["chains"][0], "base");
        assert_eq!(value["filters"]["trade_value_usd"]["min"], 1000.0);
        assert!(value["filters"]["trade_value_usd"].get("max").is_none());
        assert_eq!(value["pagination"]["per_page"], 100);
    }

    #[test]
    fn test_flow_null_fields_read_as_zero() {
        let resp: FlowIntelligenceResponse = serde_json::from_str(
            r#"{"data":[{"smart_money_net_flow_usd":1200.5,"whale_net_flow_usd":null,"whale_wallet_count":null,"public_figure_wallet_count":2}]}"#,
        )
        .unwrap();
        let snapshot = resp.data[0]
            .clone()
            .into_snapshot(Chain::Solana, "Mint", Timeframe::OneDay);
        assert_eq!(snapshot.smart_money_net_flow_usd, 1200.5);
        assert_eq!(snapshot.whale_net_flow_usd, 0.0);
        assert_eq!(snapshot.whale_wallet_count, 0);
        assert_eq!(snapshot.public_figure_wallet_count, 2);

        let resp: FlowIntelligenceResponse = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(resp.data.is_empty());
    }

    #[test]
    fn test_trade_null_numbers_read_as_zero() {
        let json = r#"{
            "block_timestamp": "2025-01-02T03:04:05Z",
            "transaction_hash": "0xaa",
            "trader_address": "0xbb",
            "action": "BUY",
            "token_symbol": null,
            "token_amount": null,
            "estimated_swap_price_usd": 0.5,
            "estimated_value_usd": null
        }"#;
        let trade: TgmDexTrade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.token_amount, 0.0);
        assert_eq!(trade.estimated_value_usd, 0.0);
        assert_eq!(trade.token_symbol, "");

        let json = r#"{
            "block_timestamp": "2025-01-02T03:04:05Z",
            "transaction_hash": "0xcc",
            "trader_address": "0xdd",
            "token_bought_address": "Mint",
            "token_bought_amount": null,
            "token_bought_age_days": null,
            "token_bought_market_cap_usd": null,
            "trade_value_usd": 2500.0
        }"#;
        let trade: SmartMoneyDexTrade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.token_bought_age_days, 0.0);
        assert_eq!(trade.trade_value_usd, 2500.0);
    }

    #[test]
    fn test_page_without_pagination_is_last() {
        let page: Page<SmartMoneyDexTrade> = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(page.pagination.last_page);

        let page: Page<SmartMoneyDexTrade> =
            serde_json::from_str(r#"{"data":null,"pagination":null}"#).unwrap();
        assert!(page.data.is_empty());
        assert!(page.pagination.last_page);

        let page: Page<SmartMoneyDexTrade> =
            serde_json::from_str(r#"{"data":[],"pagination":{"page":1,"per_page":100,"last_page":false}}"#)
                .unwrap();
        assert!(!page.pagination.last_page);
    }
}
