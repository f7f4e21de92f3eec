// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod oneinch;
pub mod zerox;

pub use oneinch::OneInchClient;
pub use zerox::ZeroXClient;

use crate::common::parsing::{parse_hex_bytes, parse_u256_dec, validate_address};
use crate::domain::constants::{AGGREGATOR_NATIVE, NATIVE};
use crate::domain::error::AppError;
use crate::domain::types::Quote;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorRequest {
    pub chain_id: u64,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub slippage_bps: u32,
    pub taker: Address,
}

/// Third-party HTTP router. `AppError::NoRoute` means "try the next source".
#[async_trait]
pub trait QuoteAggregator: Send + Sync {
    fn name(&self) -> &str;
    async fn quote(&self, request: &AggregatorRequest) -> Result<Quote, AppError>;
}

/// Aggregators spell the native currency as `0xEeee...EEeE`.
pub fn aggregator_token(token: Address) -> Address {
    if token == NATIVE { AGGREGATOR_NATIVE } else { token }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Initialization(format!("http client: {e}")))
}

pub(crate) fn no_route(provider: &str, reason: impl Into<String>) -> AppError {
    AppError::NoRoute {
        provider: provider.to_string(),
        reason: reason.into(),
    }
}

/// Map transport/HTTP failures. 4xx responses mean the aggregator declined the
/// pair; everything else is surfaced as-is.
pub(crate) fn classify_http(provider: &str, err: reqwest::Error) -> AppError {
    match err.status() {
        Some(status) if status.is_client_error() => {
            no_route(provider, format!("rejected with {}", status.as_u16()))
        }
        _ => AppError::from(err),
    }
}

pub(crate) fn field_address(provider: &str, field: &str, raw: &str) -> Result<Address, AppError> {
    validate_address(raw).map_err(|_| no_route(provider, format!("malformed {field}")))
}

pub(crate) fn field_amount(provider: &str, field: &str, raw: &str) -> Result<U256, AppError> {
    parse_u256_dec(raw).ok_or_else(|| no_route(provider, format!("malformed {field}")))
}

pub(crate) fn field_calldata(provider: &str, raw: &str) -> Result<Bytes, AppError> {
    match parse_hex_bytes(raw) {
        Some(bytes) if !bytes.is_empty() => Ok(bytes.into()),
        _ => Err(no_route(provider, "empty or malformed calldata")),
    }
}
