// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use super::{
    AggregatorRequest, QuoteAggregator, aggregator_token, classify_http, field_address,
    field_amount, field_calldata, http_client, no_route,
};
use crate::common::parsing::{parse_u64_dec, parse_u128_dec};
use crate::domain::error::AppError;
use crate::domain::types::{AggregatorTx, Quote, QuoteSource};
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const NAME: &str = "0x";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    to: String,
    data: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
    buy_amount: String,
    #[serde(default)]
    allowance_target: Option<String>,
}

/// 0x swap API (`/swap/v1/quote`).
pub struct ZeroXClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ZeroXClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// 0x wants slippage as a fraction: 200 bps -> "0.0200".
fn slippage_fraction(bps: u32) -> String {
    format!("{}.{:04}", bps / 10_000, bps % 10_000)
}

#[async_trait]
impl QuoteAggregator for ZeroXClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn quote(&self, request: &AggregatorRequest) -> Result<Quote, AppError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(no_route(NAME, "no API key configured"));
        };
        let url = format!("{}/swap/v1/quote", self.base_url);
        let query = [
            ("chainId", request.chain_id.to_string()),
            ("sellToken", format!("{:#x}", aggregator_token(request.sell_token))),
            ("buyToken", format!("{:#x}", aggregator_token(request.buy_token))),
            ("sellAmount", request.sell_amount.to_string()),
            ("slippagePercentage", slippage_fraction(request.slippage_bps)),
            ("takerAddress", format!("{:#x}", request.taker)),
        ];

        let resp: QuoteResponse = self
            .http
            .get(&url)
            .header("0x-api-key", key)
            .query(&query)
            .send()
            .await
            .map_err(AppError::from)?
            .error_for_status()
            .map_err(|e| classify_http(NAME, e))?
            .json()
            .await
            .map_err(|e| no_route(NAME, format!("unreadable quote: {e}")))?;

        let expected_out = field_amount(NAME, "buyAmount", &resp.buy_amount)?;
        if expected_out.is_zero() {
            return Err(no_route(NAME, "zero buyAmount"));
        }
        let to = field_address(NAME, "to", &resp.to)?;
        let spender = resp
            .allowance_target
            .as_deref()
            .and_then(|raw| field_address(NAME, "allowanceTarget", raw).ok())
            .filter(|a| *a != Address::ZERO);

        tracing::debug!(target: "aggregator", provider = NAME, buy_amount = %expected_out, to = %to, "Quote received");
        Ok(Quote {
            expected_out,
            source: QuoteSource::Aggregator,
            low_confidence: false,
            tx: Some(AggregatorTx {
                to,
                data: field_calldata(NAME, &resp.data)?,
                value: match resp.value.as_deref() {
                    Some(raw) => field_amount(NAME, "value", raw)?,
                    None => Default::default(),
                },
                gas: resp.gas.as_deref().and_then(parse_u64_dec),
                gas_price: resp.gas_price.as_deref().and_then(parse_u128_dec),
                spender,
            }),
        })
    }
}
