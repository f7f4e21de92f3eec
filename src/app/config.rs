// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants;
use crate::domain::error::AppError;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,
    #[serde(default = "default_false")]
    pub dry_run: bool,

    // Network
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    // Identity (consumed by the local signer only)
    pub wallet_key: Option<String>,
    pub wallet_address: Option<Address>,

    // Transaction
    #[serde(default = "default_max_gas")]
    pub max_gas_price_gwei: u64,
    #[serde(default = "default_priority_fee_wei")]
    pub priority_fee_wei: u64,
    #[serde(default = "default_gas_limit")]
    pub default_gas_limit: u64,
    /// Multiplier applied to gas estimates (12_000 = 1.2x).
    #[serde(default = "default_gas_limit_buffer_bps")]
    pub gas_limit_buffer_bps: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    // Retry / confirmation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,

    // Venues
    #[serde(default = "default_fee_tiers", deserialize_with = "deserialize_u32_list")]
    pub fee_tiers: Vec<u32>,
    pub v4_hooks: Option<Address>,
    /// Name -> address overrides on top of the built-in deployment table.
    pub venue_addresses: Option<HashMap<String, String>>,
    /// `first_liquid` or `deepest`.
    #[serde(default = "default_probe_mode")]
    pub probe_mode: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Swap against a discounted spot-price estimate when no quoter answers.
    #[serde(default = "default_false")]
    pub allow_estimated_quotes: bool,

    // Aggregators
    #[serde(default = "default_true")]
    pub aggregators_enabled: bool,
    pub zerox_api_key: Option<String>,
    pub oneinch_api_key: Option<String>,
    #[serde(default = "default_zerox_base_url")]
    pub zerox_base_url: String,
    #[serde(default = "default_oneinch_base_url")]
    pub oneinch_base_url: String,
    #[serde(default = "default_aggregator_timeout_secs")]
    pub aggregator_timeout_secs: u64,

    pub audit_log_path: Option<String>,
}

fn default_false() -> bool {
    false
}
fn default_true() -> bool {
    true
}
fn default_chain_id() -> u64 {
    constants::CHAIN_BASE
}
fn default_rpc_url() -> String {
    "https://mainnet.base.org".to_string()
}
fn default_max_gas() -> u64 {
    5
}
fn default_priority_fee_wei() -> u64 {
    constants::DEFAULT_PRIORITY_FEE_WEI as u64
}
fn default_gas_limit() -> u64 {
    constants::DEFAULT_GAS_LIMIT
}
fn default_gas_limit_buffer_bps() -> u64 {
    12_000
}
fn default_slippage_bps() -> u32 {
    200
}
fn default_deadline_secs() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    5_000
}
fn default_retry_max_delay_ms() -> u64 {
    10_000
}
fn default_receipt_timeout_ms() -> u64 {
    120_000
}
fn default_receipt_poll_ms() -> u64 {
    2_000
}
fn default_fee_tiers() -> Vec<u32> {
    vec![500, 3000, 10_000, 100]
}
fn default_probe_mode() -> String {
    "first_liquid".to_string()
}
fn default_probe_timeout_ms() -> u64 {
    5_000
}
fn default_zerox_base_url() -> String {
    "https://api.0x.org".to_string()
}
fn default_oneinch_base_url() -> String {
    "https://api.1inch.dev/swap/v5.2".to_string()
}
fn default_aggregator_timeout_secs() -> u64 {
    20
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debug: default_false(),
            log_json: default_false(),
            dry_run: default_false(),
            chain_id: default_chain_id(),
            rpc_url: default_rpc_url(),
            wallet_key: None,
            wallet_address: None,
            max_gas_price_gwei: default_max_gas(),
            priority_fee_wei: default_priority_fee_wei(),
            default_gas_limit: default_gas_limit(),
            gas_limit_buffer_bps: default_gas_limit_buffer_bps(),
            slippage_bps: default_slippage_bps(),
            deadline_secs: default_deadline_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
            receipt_poll_ms: default_receipt_poll_ms(),
            fee_tiers: default_fee_tiers(),
            v4_hooks: None,
            venue_addresses: None,
            probe_mode: default_probe_mode(),
            probe_timeout_ms: default_probe_timeout_ms(),
            allow_estimated_quotes: default_false(),
            aggregators_enabled: default_true(),
            zerox_api_key: None,
            oneinch_api_key: None,
            zerox_base_url: default_zerox_base_url(),
            oneinch_base_url: default_oneinch_base_url(),
            aggregator_timeout_secs: default_aggregator_timeout_secs(),
            audit_log_path: None,
        }
    }
}

fn deserialize_u32_list<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, SeqAccess, Visitor};
    use std::fmt;

    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<u32>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of fee tiers or a comma-separated string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            parse_u32_list(v).map_err(E::custom)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(elem) = seq.next_element::<u32>()? {
                out.push(elem);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(ListVisitor)
}

impl EngineSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(File::from(Path::new(p)).required(true));
            }
            None => {
                builder = builder.add_source(File::with_name("config").required(false));
            }
        }
        // Precedence: CLI (in main) > env/.env > config file.
        builder = builder.add_source(Environment::default());

        let settings: EngineSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        Url::parse(&self.rpc_url)
            .map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;
        if self.chain_id == 0 {
            return Err(AppError::Validation {
                field: "chain_id".into(),
                message: "must be non-zero".into(),
            });
        }
        if self.slippage_bps > 10_000 {
            return Err(AppError::Validation {
                field: "slippage_bps".into(),
                message: format!("{} exceeds 10000", self.slippage_bps),
            });
        }
        if self.fee_tiers.iter().any(|f| *f == 0 || *f >= 1_000_000) {
            return Err(AppError::Validation {
                field: "fee_tiers".into(),
                message: format!("{:?} contains an out-of-range tier", self.fee_tiers),
            });
        }
        Ok(())
    }

    pub fn max_gas_price_wei(&self) -> u128 {
        (self.max_gas_price_gwei.max(1) as u128).saturating_mul(constants::GWEI)
    }

    pub fn priority_fee_wei_value(&self) -> u128 {
        self.priority_fee_wei as u128
    }

    pub fn gas_limit_buffer_bps_value(&self) -> u64 {
        self.gas_limit_buffer_bps.clamp(10_000, 30_000)
    }

    pub fn slippage_bps_value(&self) -> u32 {
        self.slippage_bps.min(10_000)
    }

    pub fn max_retries_value(&self) -> u32 {
        self.max_retries.clamp(1, 10)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms.max(self.retry_delay_ms))
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms.max(1))
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms.clamp(1, 30_000))
    }

    pub fn aggregator_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregator_timeout_secs.clamp(1, 120))
    }

    /// Probe order with duplicates removed, first occurrence wins.
    pub fn fee_tiers_value(&self) -> Vec<u32> {
        let mut out: Vec<u32> = Vec::with_capacity(self.fee_tiers.len());
        for tier in &self.fee_tiers {
            if !out.contains(tier) {
                out.push(*tier);
            }
        }
        if out.is_empty() {
            return default_fee_tiers();
        }
        out
    }

    /// True when discovery should rank all liquid venues instead of taking the first.
    pub fn probe_deepest(&self) -> bool {
        matches!(
            self.probe_mode.trim().to_ascii_lowercase().as_str(),
            "deepest" | "deep" | "max_liquidity"
        )
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.clamp(100, 60_000))
    }

    pub fn v4_hooks_value(&self) -> Address {
        self.v4_hooks.unwrap_or(Address::ZERO)
    }

    pub fn zerox_api_key_value(&self) -> Option<String> {
        non_empty(self.zerox_api_key.as_deref())
            .or_else(|| std::env::var("ZEROX_API_KEY").ok().and_then(|v| non_empty(Some(&v))))
    }

    pub fn oneinch_api_key_value(&self) -> Option<String> {
        non_empty(self.oneinch_api_key.as_deref())
            .or_else(|| std::env::var("ONEINCH_API_KEY").ok().and_then(|v| non_empty(Some(&v))))
    }

    /// The environment can switch dry-run on but never off.
    pub fn dry_run_value(&self) -> bool {
        self.dry_run || env_bool("DRY_RUN").unwrap_or(false)
    }

    /// Built-in deployment table for the chain, with configured overrides applied.
    pub fn venue_addresses_for_chain(&self) -> Result<HashMap<String, Address>, AppError> {
        let mut out = constants::default_venue_addresses(self.chain_id);
        if let Some(map) = &self.venue_addresses {
            out.extend(parse_address_map(map, "venue_addresses")?);
        }
        Ok(out)
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    crate::common::parsing::parse_boolish(&value)
}

fn parse_u32_list(raw: &str) -> Result<Vec<u32>, AppError> {
    let cleaned = raw.trim_matches(|c| c == '`' || c == '"' || c == '\'' || c == '[' || c == ']');
    let mut out = Vec::new();
    for part in cleaned.split(|c: char| c == ',' || c.is_whitespace()) {
        let p = part.trim();
        if p.is_empty() {
            continue;
        }
        let v: u32 = p
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid fee tier '{}'", p)))?;
        out.push(v);
    }
    if out.is_empty() {
        return Err(AppError::Config("fee tier list is empty".into()));
    }
    Ok(out)
}

fn parse_address_map(
    raw: &HashMap<String, String>,
    field: &str,
) -> Result<HashMap<String, Address>, AppError> {
    raw.iter()
        .map(|(k, v)| {
            Address::from_str(v.trim())
                .map(|addr| (k.to_lowercase(), addr))
                .map_err(|_| AppError::InvalidAddress(format!("{field}:{k} -> {v}")))
        })
        .collect()
}
