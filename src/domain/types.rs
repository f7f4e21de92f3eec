// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Per-call swap entities. None of these outlive a single engine invocation.

use crate::domain::constants::NATIVE;
use alloy::primitives::{Address, B256, Bytes, U256};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Native currency in, token out.
    Buy,
    /// Token in, native currency out.
    Sell,
}

/// Singleton-manager pool parameters. Currencies must already be canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PoolKey {
    pub currency0: Address,
    pub currency1: Address,
    pub fee: u32,
    pub tick_spacing: i32,
    pub hooks: Address,
}

impl PoolKey {
    pub fn is_canonical(&self) -> bool {
        self.currency0 < self.currency1
    }

    pub fn contains(&self, currency: Address) -> bool {
        self.currency0 == currency || self.currency1 == currency
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PoolId(pub B256);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VenueKind {
    ConstantProduct { fee_bps: u32, stable: bool },
    ConcentratedLiquidity { fee: u32, tick_spacing: i32 },
    SingletonManager { key: PoolKey },
}

impl VenueKind {
    pub fn label(&self) -> &'static str {
        match self {
            VenueKind::ConstantProduct { .. } => "constant_product",
            VenueKind::ConcentratedLiquidity { .. } => "concentrated_liquidity",
            VenueKind::SingletonManager { .. } => "singleton_manager",
        }
    }

    /// Fee tier in hundredths of a bip, where the venue has one.
    pub fn fee_tier(&self) -> Option<u32> {
        match self {
            VenueKind::ConstantProduct { .. } => None,
            VenueKind::ConcentratedLiquidity { fee, .. } => Some(*fee),
            VenueKind::SingletonManager { key } => Some(key.fee),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolRef {
    Contract(Address),
    Derived(PoolId),
}

/// Pool spot price as read during discovery, in raw base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpotPrice {
    /// `sqrt(currency1 / currency0)` as Q64.96.
    SqrtPriceX96(U256),
    Reserves { reserve0: U256, reserve1: U256 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VenueCandidate {
    pub venue: String,
    pub kind: VenueKind,
    pub currency0: Address,
    pub currency1: Address,
    pub pool: PoolRef,
    pub liquidity: Option<U256>,
    /// Absent when the pool's price read failed; probing still succeeded.
    pub spot: Option<SpotPrice>,
    pub exists: bool,
}

impl VenueCandidate {
    pub fn pool_id(&self) -> Option<PoolId> {
        match self.pool {
            PoolRef::Derived(id) => Some(id),
            PoolRef::Contract(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapRequest {
    pub direction: Direction,
    pub amount_in: U256,
    pub token_in: Address,
    pub token_out: Address,
    pub slippage_bps: u32,
    pub deadline_secs: u64,
}

impl SwapRequest {
    pub fn buy(token: Address, native_amount: U256, slippage_bps: u32, deadline_secs: u64) -> Self {
        Self {
            direction: Direction::Buy,
            amount_in: native_amount,
            token_in: NATIVE,
            token_out: token,
            slippage_bps,
            deadline_secs,
        }
    }

    pub fn sell(token: Address, token_amount: U256, slippage_bps: u32, deadline_secs: u64) -> Self {
        Self {
            direction: Direction::Sell,
            amount_in: token_amount,
            token_in: token,
            token_out: NATIVE,
            slippage_bps,
            deadline_secs,
        }
    }

    pub fn is_native_in(&self) -> bool {
        self.token_in == NATIVE
    }

    pub fn is_native_out(&self) -> bool {
        self.token_out == NATIVE
    }

    /// `wrapped_native` is rejected as the token side: wrapping is not a swap,
    /// and discovery would probe a pool of the wrapped token against itself.
    pub fn validate(&self, wrapped_native: Address) -> Result<(), String> {
        if self.amount_in.is_zero() {
            return Err("amount_in must be positive".into());
        }
        if self.token_in == self.token_out {
            return Err(format!("token_in and token_out are both {:#x}", self.token_in));
        }
        if self.token_in == wrapped_native || self.token_out == wrapped_native {
            return Err(format!(
                "{wrapped_native:#x} is the wrapped native token; wrap or unwrap it directly"
            ));
        }
        if self.slippage_bps > BPS_DENOMINATOR {
            return Err(format!("slippage {} bps exceeds 10000", self.slippage_bps));
        }
        if self.deadline_secs == 0 {
            return Err("deadline window must be non-zero".into());
        }
        match self.direction {
            Direction::Buy if !self.is_native_in() => {
                Err("buy requests spend the native currency".into())
            }
            Direction::Sell if !self.is_native_out() => {
                Err("sell requests receive the native currency".into())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RouteSource {
    Aggregator(String),
    Venue(String),
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSource::Aggregator(name) => write!(f, "aggregator:{name}"),
            RouteSource::Venue(name) => write!(f, "venue:{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuoteSource {
    OnChain,
    Aggregator,
    Estimate,
}

/// Ready-to-send transaction returned by an aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorTx {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    /// Address that must hold an ERC-20 allowance; read from the response.
    pub spender: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub expected_out: U256,
    pub source: QuoteSource,
    pub low_confidence: bool,
    pub tx: Option<AggregatorTx>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    pub command: u8,
    pub input: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSwap {
    /// Empty for direct router calls.
    pub commands: Vec<EncodedCommand>,
    pub target: Address,
    pub value: U256,
    pub calldata: Bytes,
    pub min_out: U256,
    /// ERC-20 allowance this swap depends on as (token, spender, amount).
    pub allowance: Option<AllowanceRequirement>,
}

impl EncodedSwap {
    pub fn command_bytes(&self) -> Vec<u8> {
        self.commands.iter().map(|c| c.command).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceRequirement {
    pub token: Address,
    pub spender: Address,
    pub amount: U256,
    /// Spend goes through Permit2, so both hops need approval.
    pub via_permit2: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    InvalidRequest,
    NoRouteFound,
    /// Aggregator or venue could not produce a quote.
    Unavailable,
    QuoteStale,
    Reverted,
    TimedOut,
    InsufficientBalance,
    InsufficientAllowance,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::QuoteStale | FailureKind::Reverted | FailureKind::TimedOut
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FailureKind::InvalidRequest | FailureKind::InsufficientBalance
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::NoRouteFound => "no_route_found",
            FailureKind::Unavailable => "unavailable",
            FailureKind::QuoteStale => "quote_stale",
            FailureKind::Reverted => "reverted",
            FailureKind::TimedOut => "timed_out",
            FailureKind::InsufficientBalance => "insufficient_balance",
            FailureKind::InsufficientAllowance => "insufficient_allowance",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind} ({}): {reason}", route_label(.route))]
pub struct SwapFailure {
    pub kind: FailureKind,
    pub route: Option<RouteSource>,
    /// Already scrubbed of secrets.
    pub reason: String,
    pub tx_hash: Option<B256>,
}

fn route_label(route: &Option<RouteSource>) -> String {
    route
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "engine".to_string())
}

impl SwapFailure {
    pub fn new(kind: FailureKind, route: Option<RouteSource>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            route,
            reason: crate::common::sanitize::sanitize_error_message(&reason.into()),
            tx_hash: None,
        }
    }

    /// A timed-out transaction may still be mined.
    pub fn is_ambiguous(&self) -> bool {
        self.kind == FailureKind::TimedOut
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapOutcome {
    pub success: bool,
    pub tx_hash: Option<B256>,
    pub gas_used: Option<u64>,
    /// Output per input in base units, from the quote that was executed.
    pub effective_price: Option<f64>,
    pub expected_out: Option<U256>,
    pub min_out: Option<U256>,
    pub source: Option<RouteSource>,
    /// The bound was derived from a spot-price estimate, not a real quote.
    pub low_confidence: bool,
    pub failure: Option<SwapFailure>,
    pub attempts: u32,
    pub dry_run: bool,
}

impl SwapOutcome {
    pub fn failed(failure: SwapFailure, attempts: u32) -> Self {
        Self {
            success: false,
            tx_hash: failure.tx_hash,
            gas_used: None,
            effective_price: None,
            expected_out: None,
            min_out: None,
            source: failure.route.clone(),
            low_confidence: false,
            failure: Some(failure),
            attempts,
            dry_run: false,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

pub fn base_unit_ratio(amount_out: U256, amount_in: U256) -> Option<f64> {
    if amount_in.is_zero() {
        return None;
    }
    let out = amount_out.to_string().parse::<f64>().ok()?;
    let inp = amount_in.to_string().parse::<f64>().ok()?;
    Some(out / inp)
}
