// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{FALLBACK_DISCOUNT_BPS, NATIVE};
use crate::domain::error::AppError;
use crate::domain::types::{
    BPS_DENOMINATOR, Quote, QuoteSource, SpotPrice, SwapRequest, VenueCandidate, VenueKind,
};
use crate::infrastructure::data::abi;
use crate::infrastructure::network::node::{ChainClient, view};
use crate::services::routing::registry::{AddressingScheme, PairFlavor, VenueRegistry};
use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{Address, Bytes, U256, U512};
use std::sync::Arc;

/// `floor(expected * (10000 - bps) / 10000)` in integer base units.
pub fn minimum_output(expected: U256, slippage_bps: u32) -> U256 {
    let bps = slippage_bps.min(BPS_DENOMINATOR);
    let keep = U256::from(BPS_DENOMINATOR - bps);
    let denom = U256::from(BPS_DENOMINATOR);
    match expected.checked_mul(keep) {
        Some(scaled) => scaled / denom,
        // Only reachable for amounts near 2^256; divide first and accept the extra floor.
        None => expected / denom * keep,
    }
}

const FEE_DENOMINATOR: u64 = 1_000_000;

/// Pool fee in hundredths of a bip.
fn fee_pips(kind: &VenueKind) -> u64 {
    match kind {
        VenueKind::ConstantProduct { fee_bps, .. } => u64::from(*fee_bps) * 100,
        VenueKind::ConcentratedLiquidity { fee, .. } => u64::from(*fee),
        VenueKind::SingletonManager { key } => u64::from(key.fee),
    }
    .min(FEE_DENOMINATOR)
}

/// Spot-price output for `amount_in`, before fees. Prices are ratios of raw
/// base units, so token decimals are already folded in.
fn spot_output(spot: SpotPrice, amount_in: U256, zero_for_one: bool) -> Option<U256> {
    let amount = U512::from(amount_in);
    let out = match spot {
        SpotPrice::SqrtPriceX96(sqrt_price) => {
            let price_x192 = U512::from(sqrt_price) * U512::from(sqrt_price);
            let q192 = U512::from(1u8) << 192;
            if price_x192.is_zero() {
                return None;
            }
            if zero_for_one {
                amount.checked_mul(price_x192)? / q192
            } else {
                amount.checked_mul(q192)? / price_x192
            }
        }
        SpotPrice::Reserves { reserve0, reserve1 } => {
            let (r_in, r_out) = if zero_for_one {
                (reserve0, reserve1)
            } else {
                (reserve1, reserve0)
            };
            if r_in.is_zero() {
                return None;
            }
            amount.checked_mul(U512::from(r_out))? / U512::from(r_in)
        }
    };
    if out > U512::from(U256::MAX) {
        return None;
    }
    Some(U256::from(out))
}

/// Last-resort estimate from the spot price discovery read: output at spot,
/// less the pool fee, less a fixed discount. Ignores price impact, so it is
/// always low-confidence. `None` when the candidate carries no usable price.
pub fn fallback_estimate(
    candidate: &VenueCandidate,
    request: &SwapRequest,
    wrapped: Address,
) -> Option<Quote> {
    let spot = candidate.spot?;
    let token_in = pool_currency(candidate, request.token_in, wrapped);
    let zero_for_one = token_in == candidate.currency0;
    let at_spot = spot_output(spot, request.amount_in, zero_for_one)?;
    let after_fee = at_spot
        .checked_mul(U256::from(FEE_DENOMINATOR - fee_pips(&candidate.kind)))?
        / U256::from(FEE_DENOMINATOR);
    let expected_out = minimum_output(after_fee, FALLBACK_DISCOUNT_BPS);
    if expected_out.is_zero() {
        return None;
    }
    Some(Quote {
        expected_out,
        source: QuoteSource::Estimate,
        low_confidence: true,
        tx: None,
    })
}

/// Currency the pool itself holds for `token`. Native maps to the wrapped
/// token unless the pool is keyed on the native sentinel.
pub fn pool_currency(candidate: &VenueCandidate, token: Address, wrapped: Address) -> Address {
    if token == NATIVE && candidate.currency0 != NATIVE && candidate.currency1 != NATIVE {
        wrapped
    } else {
        token
    }
}

/// On-chain quoting against a discovered venue.
pub struct VenueQuoter {
    client: Arc<dyn ChainClient>,
    registry: Arc<VenueRegistry>,
}

impl VenueQuoter {
    pub fn new(client: Arc<dyn ChainClient>, registry: Arc<VenueRegistry>) -> Self {
        Self { client, registry }
    }

    pub async fn quote(
        &self,
        candidate: &VenueCandidate,
        request: &SwapRequest,
    ) -> Result<Quote, AppError> {
        let venue = self.registry.get(&candidate.venue).ok_or_else(|| AppError::NoRoute {
            provider: candidate.venue.clone(),
            reason: "venue not registered".into(),
        })?;
        let wrapped = self.registry.wrapped_native();
        let token_in = pool_currency(candidate, request.token_in, wrapped);
        let token_out = pool_currency(candidate, request.token_out, wrapped);
        let client = self.client.as_ref();

        let expected_out = match (&venue.scheme, candidate.kind) {
            (AddressingScheme::SingletonManager { quoter, .. }, VenueKind::SingletonManager { key }) => {
                let exact_amount: u128 = request.amount_in.try_into().map_err(|_| {
                    AppError::Validation {
                        field: "amount_in".into(),
                        message: "exceeds uint128".into(),
                    }
                })?;
                let params = abi::QuoteExactSingleParams {
                    poolKey: abi::PoolKey::from(&key),
                    zeroForOne: token_in == key.currency0,
                    exactAmount: exact_amount,
                    hookData: Bytes::new(),
                };
                view(client, *quoter, &abi::IV4Quoter::quoteExactInputSingleCall { params })
                    .await?
                    .amountOut
            }
            (
                AddressingScheme::ConcentratedLiquidity { quoter, .. },
                VenueKind::ConcentratedLiquidity { fee, .. },
            ) => {
                let params = abi::QuoteExactInputSingleParams {
                    tokenIn: token_in,
                    tokenOut: token_out,
                    amountIn: request.amount_in,
                    fee: U24::from(fee & 0x00ff_ffff),
                    sqrtPriceLimitX96: U160::ZERO,
                };
                view(client, *quoter, &abi::IQuoterV2::quoteExactInputSingleCall { params })
                    .await?
                    .amountOut
            }
            (
                AddressingScheme::ConstantProduct {
                    router,
                    factory,
                    flavor,
                    ..
                },
                VenueKind::ConstantProduct { stable, .. },
            ) => {
                let amounts = match flavor {
                    PairFlavor::UniswapV2 => {
                        view(
                            client,
                            *router,
                            &abi::IUniV2Router::getAmountsOutCall {
                                amountIn: request.amount_in,
                                path: vec![token_in, token_out],
                            },
                        )
                        .await?
                    }
                    PairFlavor::Solidly => {
                        view(
                            client,
                            *router,
                            &abi::ISolidlyRouter::getAmountsOutCall {
                                amountIn: request.amount_in,
                                routes: vec![abi::SolidlyRoute {
                                    from: token_in,
                                    to: token_out,
                                    stable,
                                    factory: *factory,
                                }],
                            },
                        )
                        .await?
                    }
                };
                amounts.last().copied().unwrap_or_default()
            }
            (_, kind) => {
                return Err(AppError::Validation {
                    field: "venue".into(),
                    message: format!("{} does not serve {} pools", venue.name, kind.label()),
                });
            }
        };

        if expected_out.is_zero() {
            return Err(AppError::NoRoute {
                provider: candidate.venue.clone(),
                reason: "quoter returned zero output".into(),
            });
        }
        tracing::debug!(
            target: "quote",
            venue = %candidate.venue,
            amount_in = %request.amount_in,
            expected_out = %expected_out,
            "On-chain quote"
        );
        Ok(Quote {
            expected_out,
            source: QuoteSource::OnChain,
            low_confidence: false,
            tx: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_percent_of_a_million() {
        assert_eq!(minimum_output(U256::from(1_000_000u64), 200), U256::from(980_000u64));
    }

    #[test]
    fn slippage_bounds_and_monotonicity() {
        let expected = U256::from(123_456_789u64);
        assert_eq!(minimum_output(expected, 0), expected);
        assert_eq!(minimum_output(expected, 10_000), U256::ZERO);
        assert_eq!(minimum_output(expected, 50_000), U256::ZERO);
        let mut last = expected;
        for bps in (0..=10_000).step_by(37) {
            let min = minimum_output(expected, bps);
            assert!(min <= last, "bps {bps} increased the bound");
            last = min;
        }
    }

    #[test]
    fn floors_toward_the_trader_protective_side() {
        // 999 * 9_999 / 10_000 = 998.9001 -> 998
        assert_eq!(minimum_output(U256::from(999u64), 1), U256::from(998u64));
    }

    #[test]
    fn huge_amounts_do_not_overflow() {
        let min = minimum_output(U256::MAX, 200);
        assert!(min < U256::MAX);
        assert!(min > U256::MAX / U256::from(2u64));
    }

    use crate::domain::types::PoolRef;
    use alloy::primitives::address;

    const WETH: Address = address!("4200000000000000000000000000000000000006");
    const USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

    fn v3_candidate(fee: u32, spot: Option<SpotPrice>) -> VenueCandidate {
        VenueCandidate {
            venue: "uniswap_v3".into(),
            kind: VenueKind::ConcentratedLiquidity {
                fee,
                tick_spacing: 10,
            },
            currency0: WETH,
            currency1: USDC,
            pool: PoolRef::Contract(Address::new([0xa3; 20])),
            liquidity: None,
            spot,
            exists: true,
        }
    }

    #[test]
    fn fallback_prices_both_directions_from_sqrt_price() {
        // sqrtPrice = 2 * 2^96: four currency1 units per currency0 unit.
        let spot = SpotPrice::SqrtPriceX96(U256::from(2u8) << 96);
        let candidate = v3_candidate(3000, Some(spot));

        let buy = SwapRequest::buy(USDC, U256::from(1_000u64), 200, 300);
        let q = fallback_estimate(&candidate, &buy, WETH).expect("estimate");
        // 4000 at spot, 3988 after 0.3%, 3788 after the 5% discount.
        assert_eq!(q.expected_out, U256::from(3_788u64));
        assert!(q.low_confidence);
        assert_eq!(q.source, QuoteSource::Estimate);

        let sell = SwapRequest::sell(USDC, U256::from(1_000u64), 200, 300);
        let q = fallback_estimate(&candidate, &sell, WETH).expect("estimate");
        // 250 at spot, 249 after fee, 236 after discount.
        assert_eq!(q.expected_out, U256::from(236u64));
    }

    #[test]
    fn fallback_respects_token_decimals_through_the_raw_price() {
        // WETH/USDC at 2500 USDC per ETH: 2500e6 / 1e18 raw, sqrt = 5e-5.
        let sqrt_price = (U256::from(1u8) << 96) * U256::from(5u8) / U256::from(100_000u64);
        let candidate = v3_candidate(500, Some(SpotPrice::SqrtPriceX96(sqrt_price)));

        let sell = SwapRequest::sell(USDC, U256::from(2_500_000_000u64), 200, 300);
        let q = fallback_estimate(&candidate, &sell, WETH).expect("estimate");
        // About 1 ETH less 0.05% and 5%: close to 0.9495e18 wei.
        let lo = U256::from(949_000_000_000_000_000u64);
        let hi = U256::from(950_000_000_000_000_000u64);
        assert!(q.expected_out > lo && q.expected_out < hi, "{}", q.expected_out);

        let buy = SwapRequest::buy(USDC, U256::from(2_000_000_000_000_000u64), 200, 300);
        let q = fallback_estimate(&candidate, &buy, WETH).expect("estimate");
        // 0.002 ETH is about 5 USDC (5e6 units) before fee and discount.
        assert!(q.expected_out > U256::from(4_700_000u64));
        assert!(q.expected_out < U256::from(4_760_000u64));
    }

    #[test]
    fn fallback_from_reserves_uses_spot_ratio() {
        let spot = SpotPrice::Reserves {
            reserve0: U256::from(1_000_000u64),
            reserve1: U256::from(3_000_000u64),
        };
        let candidate = VenueCandidate {
            kind: VenueKind::ConstantProduct {
                fee_bps: 30,
                stable: false,
            },
            ..v3_candidate(0, Some(spot))
        };
        let buy = SwapRequest::buy(USDC, U256::from(10_000u64), 200, 300);
        let q = fallback_estimate(&candidate, &buy, WETH).expect("estimate");
        // 30000 at spot, 29910 after 0.3%, 28414 after discount.
        assert_eq!(q.expected_out, U256::from(28_414u64));
    }

    #[test]
    fn fallback_needs_a_price() {
        let candidate = v3_candidate(500, None);
        let buy = SwapRequest::buy(USDC, U256::from(1_000u64), 200, 300);
        assert_eq!(fallback_estimate(&candidate, &buy, WETH), None);
    }
}
