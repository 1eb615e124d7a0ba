//! Gamma API client for contract discovery
//!
//! Fetches active rolling up/down markets from Polymarket's Gamma API and
//! converts them into [`Contract`]s. Strike and expiry come from market
//! metadata; the strike is stated in the market question ("above $67,000",
//! "above 108k"), which is the upstream convention for these windows.

use super::{Contract, MarketError, Series};
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the Gamma client
#[derive(Debug, Clone)]
pub struct GammaConfig {
    /// Base URL for the Gamma API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Page size for the active-markets listing
    pub page_limit: u32,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gamma-api.polymarket.com".to_string(),
            timeout: Duration::from_secs(8),
            page_limit: 500,
        }
    }
}

/// Client for Polymarket's Gamma API
#[derive(Clone)]
pub struct GammaClient {
    config: GammaConfig,
    client: Client,
}

impl GammaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(GammaConfig {
            base_url: base_url.into(),
            ..GammaConfig::default()
        })
    }

    pub fn with_config(config: GammaConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Fetch active, unclosed markets whose slug starts with `prefix-`
    pub async fn fetch_by_prefix(&self, prefix: &str) -> Result<Vec<GammaMarket>, MarketError> {
        let url = format!("{}/markets", self.config.base_url);

        tracing::debug!(url = %url, prefix = %prefix, "Fetching active markets from Gamma API");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("active", "true".to_string()),
                ("closed", "false".to_string()),
                ("limit", self.config.page_limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| MarketError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::Discovery(format!(
                "Gamma API status {}",
                response.status()
            )));
        }

        let markets: Vec<GammaMarket> = response
            .json()
            .await
            .map_err(|e| MarketError::Discovery(e.to_string()))?;

        let family = format!("{prefix}-");
        Ok(markets
            .into_iter()
            .filter(|m| m.slug.starts_with(&family) && m.active && !m.closed)
            .collect())
    }

    /// Fetch a single market by exact slug (seed fallback path)
    pub async fn fetch_by_slug(&self, slug: &str) -> Result<Option<GammaMarket>, MarketError> {
        let url = format!("{}/markets", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("slug", slug)])
            .send()
            .await
            .map_err(|e| MarketError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::Discovery(format!(
                "Gamma API status {}",
                response.status()
            )));
        }

        let markets: Vec<GammaMarket> = response
            .json()
            .await
            .map_err(|e| MarketError::Discovery(e.to_string()))?;

        Ok(markets
            .into_iter()
            .find(|m| m.slug == slug && m.active && !m.closed))
    }
}

/// Raw market payload from the Gamma API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub condition_id: String,
    #[serde(default)]
    pub question: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// CLOB token IDs as a JSON-encoded string array, YES first
    pub clob_token_ids: Option<String>,
    /// Explicit strike, present on some payloads as a number or string
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub strike_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
}

fn default_true() -> bool {
    true
}

impl GammaMarket {
    /// Window start, when the payload carries one
    pub fn start_ts(&self) -> Option<DateTime<Utc>> {
        self.start_date.as_deref().and_then(parse_ts)
    }

    /// Window end / settlement time
    pub fn end_ts(&self) -> Option<DateTime<Utc>> {
        self.end_date.as_deref().and_then(parse_ts)
    }

    /// Whether the contract window contains `now`
    pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
        let Some(end) = self.end_ts() else {
            return false;
        };
        if now >= end {
            return false;
        }
        match self.start_ts() {
            Some(start) => now >= start,
            // No start in the payload: treat an unexpired window as current
            None => true,
        }
    }

    /// Convert into a [`Contract`] for the given series
    pub fn into_contract(self, series: Series) -> Result<Contract, MarketError> {
        if self.slug.is_empty() || self.condition_id.is_empty() {
            return Err(MarketError::MetadataIncomplete("missing slug or conditionId".into()));
        }

        let expiry = self
            .end_ts()
            .ok_or_else(|| MarketError::MetadataIncomplete(format!("{}: missing endDate", self.slug)))?;

        let token_ids = self
            .clob_token_ids
            .as_deref()
            .ok_or_else(|| MarketError::MetadataIncomplete(format!("{}: missing clobTokenIds", self.slug)))?;
        let (yes_token_id, no_token_id) = parse_token_ids(token_ids)
            .map_err(|e| MarketError::MetadataIncomplete(format!("{}: {}", self.slug, e)))?;

        let strike = self
            .strike_price
            .or_else(|| parse_strike(&self.question))
            .ok_or_else(|| MarketError::MetadataIncomplete(format!("{}: no strike", self.slug)))?;

        Ok(Contract {
            series,
            slug: self.slug,
            condition_id: self.condition_id,
            question: self.question,
            strike,
            expiry,
            yes_token_id,
            no_token_id,
        })
    }
}

/// Gamma encodes numerics inconsistently; accept both string and number
fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = serde::Deserialize::deserialize(deserializer)?;
    Ok(raw.and_then(|v| match v {
        serde_json::Value::String(s) => Decimal::from_str(&s).ok(),
        serde_json::Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        _ => None,
    }))
}

/// Parse an RFC 3339 timestamp, tolerating a trailing `Z`
fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse CLOB token IDs from a JSON string
///
/// Format: "[\"token1\", \"token2\"]" where token1 is YES and token2 is NO
fn parse_token_ids(token_ids_str: &str) -> anyhow::Result<(String, String)> {
    let tokens: Vec<String> = serde_json::from_str(token_ids_str)
        .map_err(|e| anyhow::anyhow!("bad clobTokenIds: {}", e))?;

    if tokens.len() < 2 {
        anyhow::bail!("expected 2 token IDs, got {}", tokens.len());
    }

    Ok((tokens[0].clone(), tokens[1].clone()))
}

/// Extract the strike from a market question
///
/// Matches "above $107,250", "above 108k", "hit $1.2m" and similar phrasing.
pub(crate) fn parse_strike(question: &str) -> Option<Decimal> {
    let lower = question.to_lowercase();
    let idx = lower
        .find("above")
        .map(|i| i + "above".len())
        .or_else(|| lower.find("hit").map(|i| i + "hit".len()))?;

    let tail = lower[idx..].trim_start().trim_start_matches('$');
    let mut digits = String::new();
    let mut suffix = None;
    for ch in tail.chars() {
        match ch {
            '0'..='9' | '.' => digits.push(ch),
            ',' => continue,
            'k' | 'm' | 'b' => {
                suffix = Some(ch);
                break;
            }
            _ => break,
        }
    }

    if digits.is_empty() {
        return None;
    }

    let base = Decimal::from_str(&digits).ok()?;
    let mult = match suffix {
        Some('k') => Decimal::from(1_000),
        Some('m') => Decimal::from(1_000_000),
        Some('b') => Decimal::from(1_000_000_000),
        _ => Decimal::ONE,
    };
    Some(base * mult)
}
