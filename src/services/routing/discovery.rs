// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::NATIVE;
use crate::domain::types::{PoolId, PoolKey, PoolRef, SpotPrice, VenueCandidate, VenueKind};
use crate::infrastructure::data::abi;
use crate::infrastructure::network::node::{ChainClient, has_code, view};
use crate::services::routing::pool_id::{
    PoolIdResolver, canonical_pair, pool_key, tick_spacing_for_fee,
};
use crate::services::routing::registry::{
    AddressingScheme, PairFlavor, VenueDescriptor, VenueRegistry, probe_tiers,
};
use alloy::primitives::{Address, U256};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// Stop at the first venue with positive liquidity.
    FirstLiquid,
    /// Probe everything and keep the deepest pool; ties go to the higher-priority venue.
    Deepest,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no liquidity found for {token_in:#x} -> {token_out:#x} after {probed} probes")]
pub struct NoLiquidityFound {
    pub token_in: Address,
    pub token_out: Address,
    pub probed: usize,
}

/// One (venue, pool parameters) pair to check.
#[derive(Debug, Clone)]
struct ProbeTarget<'a> {
    venue: &'a VenueDescriptor,
    plan: ProbePlan,
}

#[derive(Debug, Clone, Copy)]
enum ProbePlan {
    Singleton { key: PoolKey, id: PoolId, state_view: Address },
    Concentrated { a: Address, b: Address, fee: u32 },
    ConstantProduct { a: Address, b: Address, stable: bool, fee_bps: u32 },
}

pub struct VenueDiscovery {
    client: Arc<dyn ChainClient>,
    registry: Arc<VenueRegistry>,
    mode: ProbeMode,
    probe_timeout: Duration,
}

impl VenueDiscovery {
    pub fn new(
        client: Arc<dyn ChainClient>,
        registry: Arc<VenueRegistry>,
        mode: ProbeMode,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            mode,
            probe_timeout,
        }
    }

    pub fn registry(&self) -> &VenueRegistry {
        &self.registry
    }

    /// Best candidate for the pair under the configured mode. Liquidity is
    /// re-probed on every call.
    pub async fn discover(
        &self,
        token_in: Address,
        token_out: Address,
    ) -> Result<VenueCandidate, NoLiquidityFound> {
        let targets = self.probe_targets(token_in, token_out);
        let probed = targets.len();
        let not_found = NoLiquidityFound {
            token_in,
            token_out,
            probed,
        };

        match self.mode {
            ProbeMode::FirstLiquid => {
                for target in &targets {
                    if let Some(candidate) = self.probe(target).await {
                        tracing::info!(
                            target: "routing",
                            venue = %candidate.venue,
                            kind = candidate.kind.label(),
                            fee = ?candidate.kind.fee_tier(),
                            "Liquid venue found"
                        );
                        return Ok(candidate);
                    }
                }
                Err(not_found)
            }
            ProbeMode::Deepest => {
                let found = join_all(targets.iter().map(|t| self.probe(t))).await;
                // `targets` is already in priority order; strict `>` keeps the earlier one on ties.
                let mut best: Option<VenueCandidate> = None;
                for candidate in found.into_iter().flatten() {
                    let depth = candidate.liquidity.unwrap_or_default();
                    let better = match &best {
                        Some(current) => depth > current.liquidity.unwrap_or_default(),
                        None => true,
                    };
                    if better {
                        best = Some(candidate);
                    }
                }
                best.ok_or(not_found)
            }
        }
    }

    /// Ordered probe list: singleton tiers ascending (native key before the
    /// wrapped key), then concentrated tiers ascending, then constant-product
    /// venues in registration order.
    fn probe_targets(&self, token_in: Address, token_out: Address) -> Vec<ProbeTarget<'_>> {
        let wrapped = self.registry.wrapped_native();
        let unwrap_native = |t: Address| if t == NATIVE { wrapped } else { t };
        let (wa, wb) = (unwrap_native(token_in), unwrap_native(token_out));
        let mut out = Vec::new();

        for venue in self.registry.in_priority_order() {
            match &venue.scheme {
                AddressingScheme::SingletonManager {
                    state_view,
                    fee_tiers,
                    hooks,
                    ..
                } => {
                    let native_side = token_in == NATIVE || token_out == NATIVE;
                    let mut push = |a: Address, b: Address, fee: u32| {
                        match PoolIdResolver::resolve(venue, a, b, fee) {
                            Ok(Some(id)) => out.push(ProbeTarget {
                                venue,
                                plan: ProbePlan::Singleton {
                                    key: pool_key(a, b, fee, *hooks),
                                    id,
                                    state_view: *state_view,
                                },
                            }),
                            Ok(None) => {}
                            Err(e) => {
                                tracing::debug!(target: "routing", venue = %venue.name, fee, error = %e, "Skipping pool key");
                            }
                        }
                    };
                    for fee in probe_tiers(fee_tiers) {
                        if native_side {
                            push(token_in, token_out, fee);
                        }
                        push(wa, wb, fee);
                    }
                }
                AddressingScheme::ConcentratedLiquidity { fee_tiers, .. } => {
                    for fee in probe_tiers(fee_tiers) {
                        out.push(ProbeTarget {
                            venue,
                            plan: ProbePlan::Concentrated { a: wa, b: wb, fee },
                        });
                    }
                }
                AddressingScheme::ConstantProduct {
                    flavor, fee_bps, ..
                } => {
                    out.push(ProbeTarget {
                        venue,
                        plan: ProbePlan::ConstantProduct {
                            a: wa,
                            b: wb,
                            stable: false,
                            fee_bps: *fee_bps,
                        },
                    });
                    if *flavor == PairFlavor::Solidly {
                        out.push(ProbeTarget {
                            venue,
                            plan: ProbePlan::ConstantProduct {
                                a: wa,
                                b: wb,
                                stable: true,
                                fee_bps: *fee_bps,
                            },
                        });
                    }
                }
            }
        }
        out
    }

    /// Best effort: reverts, decode errors and timeouts all read as "no liquidity".
    async fn probe(&self, target: &ProbeTarget<'_>) -> Option<VenueCandidate> {
        match timeout(self.probe_timeout, self.probe_inner(target)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                tracing::debug!(target: "routing", venue = %target.venue.name, plan = ?target.plan, error = %e, "Probe failed");
                None
            }
            Err(_) => {
                tracing::debug!(target: "routing", venue = %target.venue.name, plan = ?target.plan, "Probe timed out");
                None
            }
        }
    }

    async fn probe_inner(
        &self,
        target: &ProbeTarget<'_>,
    ) -> Result<Option<VenueCandidate>, crate::domain::error::AppError> {
        let client = self.client.as_ref();
        let venue = target.venue;
        match target.plan {
            ProbePlan::Singleton { key, id, state_view } => {
                let slot0 = view(client, state_view, &abi::IStateView::getSlot0Call { poolId: id.0 }).await?;
                if slot0.sqrtPriceX96.is_zero() {
                    return Ok(None);
                }
                let liquidity: u128 =
                    view(client, state_view, &abi::IStateView::getLiquidityCall { poolId: id.0 }).await?;
                if liquidity == 0 {
                    return Ok(None);
                }
                Ok(Some(VenueCandidate {
                    venue: venue.name.clone(),
                    kind: VenueKind::SingletonManager { key },
                    currency0: key.currency0,
                    currency1: key.currency1,
                    pool: PoolRef::Derived(id),
                    liquidity: Some(U256::from(liquidity)),
                    spot: Some(SpotPrice::SqrtPriceX96(U256::from(slot0.sqrtPriceX96))),
                    exists: true,
                }))
            }
            ProbePlan::Concentrated { a, b, fee } => {
                let Some(pool) =
                    PoolIdResolver::lookup_pool_address(client, venue, a, b, fee, false).await?
                else {
                    return Ok(None);
                };
                if !has_code(client, pool).await {
                    return Ok(None);
                }
                let liquidity: u128 = view(client, pool, &abi::IV3Pool::liquidityCall {}).await?;
                if liquidity == 0 {
                    return Ok(None);
                }
                // Price only feeds the low-confidence estimate; a failed read is not fatal.
                let spot = view(client, pool, &abi::IV3Pool::slot0Call {})
                    .await
                    .ok()
                    .filter(|s| !s.sqrtPriceX96.is_zero())
                    .map(|s| SpotPrice::SqrtPriceX96(U256::from(s.sqrtPriceX96)));
                let (currency0, currency1) = canonical_pair(a, b);
                Ok(Some(VenueCandidate {
                    venue: venue.name.clone(),
                    kind: VenueKind::ConcentratedLiquidity {
                        fee,
                        tick_spacing: tick_spacing_for_fee(fee),
                    },
                    currency0,
                    currency1,
                    pool: PoolRef::Contract(pool),
                    liquidity: Some(U256::from(liquidity)),
                    spot,
                    exists: true,
                }))
            }
            ProbePlan::ConstantProduct {
                a,
                b,
                stable,
                fee_bps,
            } => {
                let Some(pair) =
                    PoolIdResolver::lookup_pool_address(client, venue, a, b, 0, stable).await?
                else {
                    return Ok(None);
                };
                let reserves = view(client, pair, &abi::IUniV2Pair::getReservesCall {}).await?;
                let r0 = U256::from(reserves.reserve0.to::<u128>());
                let r1 = U256::from(reserves.reserve1.to::<u128>());
                if r0.is_zero() || r1.is_zero() {
                    return Ok(None);
                }
                let (currency0, currency1) = canonical_pair(a, b);
                Ok(Some(VenueCandidate {
                    venue: venue.name.clone(),
                    kind: VenueKind::ConstantProduct { fee_bps, stable },
                    currency0,
                    currency1,
                    pool: PoolRef::Contract(pair),
                    liquidity: Some(constant_product_depth(r0, r1)),
                    spot: Some(SpotPrice::Reserves {
                        reserve0: r0,
                        reserve1: r1,
                    }),
                    exists: true,
                }))
            }
        }
    }
}

/// Geometric mean of the reserves, comparable to concentrated-liquidity `L`.
pub fn constant_product_depth(r0: U256, r1: U256) -> U256 {
    r0.saturating_mul(r1).root(2)
}
