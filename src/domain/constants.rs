// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, address};
use lazy_static::lazy_static;
use std::collections::HashMap;

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_BASE: u64 = 8453;

pub const WETH_BASE: Address = address!("4200000000000000000000000000000000000006");
pub const WETH_MAINNET: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

/// Sentinel used for the chain's native currency in requests and V4 pool keys.
pub const NATIVE: Address = Address::ZERO;

/// Placeholder aggregators use for the native currency.
pub const AGGREGATOR_NATIVE: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

pub const PERMIT2: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

pub fn wrapped_native_for_chain(chain_id: u64) -> Address {
    match chain_id {
        CHAIN_ETHEREUM => WETH_MAINNET,
        _ => WETH_BASE,
    }
}

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

pub const DEFAULT_GAS_LIMIT: u64 = 350_000;
pub const APPROVAL_GAS_LIMIT: u64 = 100_000;
pub const MAX_GAS_LIMIT: u64 = 8_000_000;
/// 1.5 gwei tip; Base blocks rarely need more.
pub const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_500_000_000;
pub const GWEI: u128 = 1_000_000_000;

// =============================================================================
// POOL PARAMETERS
// =============================================================================

/// Standard fee tiers in hundredths of a bip.
pub const STANDARD_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10_000];
pub const DEFAULT_TICK_SPACING: i32 = 60;

/// Fallback when no quote source answers: 5% below the post-fee spot-price output.
pub const FALLBACK_DISCOUNT_BPS: u32 = 500;

// =============================================================================
// VENUE DEPLOYMENTS (Base)
// =============================================================================

lazy_static! {
    pub static ref VENUES_BASE: HashMap<&'static str, Address> = {
        let mut m = HashMap::new();

        // Uniswap V4
        m.insert("uniswap_v4_pool_manager", address!("498581fF718922c3f8e6A244956aF099B2652b2b"));
        m.insert("uniswap_v4_state_view", address!("A3c0c9b65baD0b08107Aa264b0f3dB444b867A71"));
        m.insert("uniswap_v4_quoter", address!("0d5e0F971ED27FBfF6c2837bf31316121532048D"));
        m.insert("uniswap_universal_router", address!("6fF5693b99212Da76ad316178A184AB56D299b43"));
        m.insert("uniswap_permit2", PERMIT2);

        // Uniswap V3
        m.insert("uniswap_v3_swaprouter02", address!("2626664c2603336E57B271c5C0b26F421741e481"));
        m.insert("uniswap_v3_quoter_v2", address!("3d4e44Eb1374240CE5F1B871ab261CD16335CB76"));
        m.insert("uniswap_v3_factory", address!("33128a8fC17869897dcE68Ed026d694621f6FDfD"));

        // Constant-product venues
        m.insert("uniswap_v2_router02", address!("4752ba5DBc23f44D87826276BF6Fd6b1C372aD24"));
        m.insert("uniswap_v2_factory", address!("8909Dc15e40173Ff4699343b6eB8132c65e18eC6"));
        m.insert("aerodrome_router", address!("cF77a3Ba9A73CA43934ef2c5c9864A4c7B4bE323"));
        m.insert("aerodrome_factory", address!("420DD381b31aEf6683db6B902084cB0FFECe40Da"));
        m.insert("baseswap_router", address!("327Df1E6de05895d2ab08513aaDD9313Fe505d86"));
        m.insert("baseswap_factory", address!("FDa619b6d20975be80A10332cD39b9a4b0FAa8BB"));

        // Aggregator executors
        m.insert("oneinch_aggregation_router_v5", address!("1111111254EEB25477B68fb85Ed929f73A960582"));
        m.insert("zeroex_exchange_proxy", address!("DEF1C0ded9bec7F1a1670819833240f027b25EfF"));

        m
    };
}

pub fn default_venue_addresses(chain_id: u64) -> HashMap<String, Address> {
    match chain_id {
        CHAIN_BASE => VENUES_BASE
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
        _ => HashMap::new(),
    }
}
