// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use super::{
    AggregatorRequest, QuoteAggregator, aggregator_token, classify_http, field_address,
    field_amount, field_calldata, http_client, no_route,
};
use crate::common::parsing::{parse_u64_dec, parse_u128_dec};
use crate::domain::constants::NATIVE;
use crate::domain::error::AppError;
use crate::domain::types::{AggregatorTx, Quote, QuoteSource};
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const NAME: &str = "1inch";

#[derive(Debug, Deserialize)]
struct SwapTx {
    to: String,
    data: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas: Option<serde_json::Value>,
    #[serde(default, rename = "gasPrice")]
    gas_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    #[serde(rename = "toAmount")]
    to_amount: String,
    tx: SwapTx,
}

#[derive(Debug, Deserialize)]
struct SpenderResponse {
    address: String,
}

/// 1inch aggregation API (v5.2 `/{chain}/swap`).
pub struct OneInchClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OneInchClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        path: String,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(key)
            .query(query)
            .send()
            .await
            .map_err(AppError::from)?
            .error_for_status()
            .map_err(|e| classify_http(NAME, e))?
            .json()
            .await
            .map_err(|e| no_route(NAME, format!("unreadable response: {e}")))
    }

    /// Router address that must hold the ERC-20 allowance. Read per quote.
    pub async fn spender(&self, chain_id: u64) -> Result<Address, AppError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(no_route(NAME, "no API key configured"));
        };
        let resp: SpenderResponse = self
            .get(key, format!("/{chain_id}/approve/spender"), &[])
            .await?;
        field_address(NAME, "spender", &resp.address)
    }
}

/// 1inch wants slippage in percent: 200 bps -> "2.00".
fn slippage_percent(bps: u32) -> String {
    format!("{}.{:02}", bps / 100, bps % 100)
}

/// 1inch reports `gas` as a number in some versions and a string in others.
fn gas_units(raw: Option<&serde_json::Value>) -> Option<u64> {
    match raw? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => parse_u64_dec(s),
        _ => None,
    }
}

#[async_trait]
impl QuoteAggregator for OneInchClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn quote(&self, request: &AggregatorRequest) -> Result<Quote, AppError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(no_route(NAME, "no API key configured"));
        };
        let query = [
            ("src", format!("{:#x}", aggregator_token(request.sell_token))),
            ("dst", format!("{:#x}", aggregator_token(request.buy_token))),
            ("amount", request.sell_amount.to_string()),
            ("from", format!("{:#x}", request.taker)),
            ("slippage", slippage_percent(request.slippage_bps)),
            ("disableEstimate", "true".to_string()),
        ];
        let resp: SwapResponse = self
            .get(key, format!("/{}/swap", request.chain_id), &query)
            .await?;

        let expected_out = field_amount(NAME, "toAmount", &resp.to_amount)?;
        if expected_out.is_zero() {
            return Err(no_route(NAME, "zero toAmount"));
        }
        let to = field_address(NAME, "tx.to", &resp.tx.to)?;
        let spender = if request.sell_token == NATIVE {
            None
        } else {
            Some(self.spender(request.chain_id).await?)
        };

        tracing::debug!(target: "aggregator", provider = NAME, to_amount = %expected_out, to = %to, "Quote received");
        Ok(Quote {
            expected_out,
            source: QuoteSource::Aggregator,
            low_confidence: false,
            tx: Some(AggregatorTx {
                to,
                data: field_calldata(NAME, &resp.tx.data)?,
                value: match resp.tx.value.as_deref() {
                    Some(raw) => field_amount(NAME, "tx.value", raw)?,
                    None => Default::default(),
                },
                gas: gas_units(resp.tx.gas.as_ref()),
                gas_price: resp.tx.gas_price.as_deref().and_then(parse_u128_dec),
                spender,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use mockito::Matcher;

    const TOKEN: Address = Address::new([0x77; 20]);

    fn sell_request() -> AggregatorRequest {
        AggregatorRequest {
            chain_id: 8453,
            sell_token: TOKEN,
            buy_token: NATIVE,
            sell_amount: U256::from(5_000u64),
            slippage_bps: 150,
            taker: Address::new([0xca; 20]),
        }
    }

    #[test]
    fn slippage_is_a_percentage() {
        assert_eq!(slippage_percent(200), "2.00");
        assert_eq!(slippage_percent(5), "0.05");
    }

    #[test]
    fn gas_accepts_number_or_string() {
        assert_eq!(gas_units(Some(&serde_json::json!(210000))), Some(210_000));
        assert_eq!(gas_units(Some(&serde_json::json!("210000"))), Some(210_000));
        assert_eq!(gas_units(None), None);
    }

    #[tokio::test]
    async fn erc20_sell_fetches_spender() {
        let mut server = mockito::Server::new_async().await;
        let swap = server
            .mock("GET", "/8453/swap")
            .match_header("authorization", "Bearer secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("src".into(), format!("{TOKEN:#x}")),
                Matcher::UrlEncoded("slippage".into(), "1.50".into()),
                Matcher::UrlEncoded("disableEstimate".into(), "true".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"toAmount":"4000","tx":{"from":"0xcacacacacacacacacacacacacacacacacacacaca","to":"0x1111111254eeb25477b68fb85ed929f73a960582","data":"0x12aa3caf","value":"0","gas":0,"gasPrice":"100"}}"#,
            )
            .create_async()
            .await;
        let spender = server
            .mock("GET", "/8453/approve/spender")
            .with_status(200)
            .with_body(r#"{"address":"0x1111111254eeb25477b68fb85ed929f73a960582"}"#)
            .create_async()
            .await;

        let client = OneInchClient::new(&server.url(), Some("secret".into()), Duration::from_secs(5))
            .expect("client");
        let quote = client.quote(&sell_request()).await.expect("quote");
        swap.assert_async().await;
        spender.assert_async().await;

        assert_eq!(quote.expected_out, U256::from(4_000u64));
        let tx = quote.tx.expect("tx");
        assert_eq!(tx.gas, Some(0));
        assert_eq!(tx.gas_price, Some(100));
        assert_eq!(
            tx.spender,
            Some(field_address(NAME, "x", "0x1111111254eeb25477b68fb85ed929f73a960582").unwrap())
        );
    }

    #[tokio::test]
    async fn server_error_is_not_a_decline() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/8453/swap")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let client = OneInchClient::new(&server.url(), Some("secret".into()), Duration::from_secs(5))
            .expect("client");
        assert!(matches!(
            client.quote(&sell_request()).await,
            Err(AppError::ApiCall { status: 500, .. })
        ));
    }
}
