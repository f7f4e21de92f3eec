// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::retry::retry_async;
use crate::domain::error::AppError;
use crate::infrastructure::network::node::{ChainClient, FeeData};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSuggestion {
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    Legacy {
        gas_price: u128,
    },
}

impl FeeSuggestion {
    /// Worst-case price per gas unit, used for balance budgeting.
    pub fn max_per_gas(&self) -> u128 {
        match self {
            FeeSuggestion::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
            FeeSuggestion::Legacy { gas_price } => *gas_price,
        }
    }
}

/// Bounded fee suggestions. The oracle never aborts a swap on a low cap; an
/// underpriced transaction is left to fail at broadcast.
#[derive(Clone)]
pub struct GasOracle {
    client: Arc<dyn ChainClient>,
    max_fee_cap: u128,
    priority_fee: u128,
    last_good: Arc<Mutex<Option<FeeSuggestion>>>,
}

impl GasOracle {
    pub fn new(client: Arc<dyn ChainClient>, max_fee_cap: u128, priority_fee: u128) -> Self {
        Self {
            client,
            max_fee_cap,
            priority_fee,
            last_good: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn suggest(&self) -> Result<FeeSuggestion, AppError> {
        let client = self.client.clone();
        let fetched = retry_async(
            move |_| {
                let client = client.clone();
                async move { client.fee_data().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await;

        match fetched {
            Ok(data) => {
                let fees = derive_fees(&data, self.priority_fee, self.max_fee_cap);
                if let Ok(mut guard) = self.last_good.lock() {
                    *guard = Some(fees);
                }
                tracing::debug!(target: "gas", ?fees, "Fee suggestion");
                Ok(fees)
            }
            Err(e) => {
                if let Ok(guard) = self.last_good.lock()
                    && let Some(fees) = *guard
                {
                    tracing::warn!(target: "gas", error = %e, "Fee data unavailable, reusing last suggestion");
                    return Ok(fees);
                }
                Err(e)
            }
        }
    }
}

/// `maxFee = 2 * baseFee + tip` on base-fee chains, otherwise the node's legacy
/// gas price; both clamped to `cap`.
pub fn derive_fees(data: &FeeData, priority_fee: u128, cap: u128) -> FeeSuggestion {
    match data.base_fee_per_gas {
        Some(base) => {
            let max_fee = base
                .saturating_mul(2)
                .saturating_add(priority_fee)
                .min(cap);
            FeeSuggestion::Eip1559 {
                max_fee_per_gas: max_fee,
                max_priority_fee_per_gas: priority_fee.min(max_fee),
            }
        }
        None => FeeSuggestion::Legacy {
            gas_price: data.gas_price.min(cap),
        },
    }
}

/// Apply a basis-point buffer to a gas estimate.
pub fn buffered_gas_limit(estimate: u64, buffer_bps: u64, ceiling: u64) -> u64 {
    let scaled = (estimate as u128).saturating_mul(buffer_bps as u128) / 10_000;
    (scaled.min(u64::MAX as u128) as u64).min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::GWEI;

    #[test]
    fn base_fee_market_uses_twice_base_plus_tip() {
        let data = FeeData {
            base_fee_per_gas: Some(10_000_000),
            max_priority_fee_per_gas: Some(1),
            gas_price: 0,
        };
        let fees = derive_fees(&data, 1_500_000_000, 5 * GWEI);
        assert_eq!(
            fees,
            FeeSuggestion::Eip1559 {
                max_fee_per_gas: 1_520_000_000,
                max_priority_fee_per_gas: 1_500_000_000,
            }
        );
    }

    #[test]
    fn clamps_to_configured_ceiling() {
        let data = FeeData {
            base_fee_per_gas: Some(40 * GWEI),
            max_priority_fee_per_gas: None,
            gas_price: 0,
        };
        let fees = derive_fees(&data, 2 * GWEI, 5 * GWEI);
        assert_eq!(fees.max_per_gas(), 5 * GWEI);

        let tight = derive_fees(&data, 9 * GWEI, 5 * GWEI);
        match tight {
            FeeSuggestion::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => assert!(max_priority_fee_per_gas <= max_fee_per_gas),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn legacy_chain_uses_node_gas_price() {
        let data = FeeData {
            base_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            gas_price: 7 * GWEI,
        };
        assert_eq!(
            derive_fees(&data, GWEI, 5 * GWEI),
            FeeSuggestion::Legacy { gas_price: 5 * GWEI }
        );
        assert_eq!(
            derive_fees(&data, GWEI, 10 * GWEI),
            FeeSuggestion::Legacy { gas_price: 7 * GWEI }
        );
    }

    #[test]
    fn gas_buffer_scales_and_caps() {
        assert_eq!(buffered_gas_limit(100_000, 12_000, 8_000_000), 120_000);
        assert_eq!(buffered_gas_limit(7_000_000, 12_000, 8_000_000), 8_000_000);
    }
}
