// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::NATIVE;
use crate::domain::error::AppError;
use crate::domain::types::{
    AllowanceRequirement, EncodedCommand, EncodedSwap, PoolKey, Quote, SwapRequest, VenueCandidate,
    VenueKind,
};
use crate::infrastructure::data::abi;
use crate::services::routing::commands::{
    ADDRESS_THIS, OPEN_DELTA, V4Plan, execute_calldata, sweep, unwrap_weth, v4_swap, wrap_eth,
};
use crate::services::routing::pool_id::{derive_pool_id, validate_pool_id};
use crate::services::routing::quote::{minimum_output, pool_currency};
use crate::services::routing::registry::{AddressingScheme, PairFlavor, VenueDescriptor, VenueRegistry};
use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;

/// Everything the encoder needs besides the candidate, request and quote.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub registry: &'a VenueRegistry,
    /// Signer address; receives the output.
    pub recipient: Address,
    /// Absolute unix deadline embedded in the calldata.
    pub deadline: u64,
}

/// Build a fresh swap for one attempt. Pure: same inputs, same bytes.
pub fn encode_venue_swap(
    ctx: &EncodeContext<'_>,
    candidate: &VenueCandidate,
    request: &SwapRequest,
    quote: &Quote,
) -> Result<EncodedSwap, AppError> {
    let venue = ctx
        .registry
        .get(&candidate.venue)
        .ok_or_else(|| AppError::Encoding(format!("venue {} not registered", candidate.venue)))?;
    let min_out = minimum_output(quote.expected_out, request.slippage_bps);

    match (&venue.scheme, candidate.kind) {
        (AddressingScheme::SingletonManager { .. }, VenueKind::SingletonManager { key }) => {
            encode_singleton(ctx, venue, candidate, &key, request, min_out)
        }
        (
            AddressingScheme::ConcentratedLiquidity { router, .. },
            VenueKind::ConcentratedLiquidity { fee, .. },
        ) => encode_concentrated(ctx, *router, candidate, fee, request, min_out),
        (
            AddressingScheme::ConstantProduct {
                router,
                factory,
                flavor,
                ..
            },
            VenueKind::ConstantProduct { stable, .. },
        ) => encode_constant_product(
            ctx, *router, *factory, *flavor, stable, candidate, request, min_out,
        ),
        (_, kind) => Err(AppError::Encoding(format!(
            "{} cannot encode a {} swap",
            venue.name,
            kind.label()
        ))),
    }
}

/// Wrap an aggregator's ready transaction. The spender comes from the response.
pub fn encode_aggregator_swap(request: &SwapRequest, quote: &Quote) -> Result<EncodedSwap, AppError> {
    let tx = quote
        .tx
        .as_ref()
        .ok_or_else(|| AppError::Encoding("aggregator quote without transaction".into()))?;
    let allowance = match (request.is_native_in(), tx.spender) {
        (true, _) => None,
        (false, Some(spender)) => Some(AllowanceRequirement {
            token: request.token_in,
            spender,
            amount: request.amount_in,
            via_permit2: false,
        }),
        (false, None) => Some(AllowanceRequirement {
            token: request.token_in,
            spender: tx.to,
            amount: request.amount_in,
            via_permit2: false,
        }),
    };
    Ok(EncodedSwap {
        commands: Vec::new(),
        target: tx.to,
        value: tx.value,
        calldata: tx.data.clone(),
        min_out: minimum_output(quote.expected_out, request.slippage_bps),
        allowance,
    })
}

fn to_u128(value: U256, field: &str) -> Result<u128, AppError> {
    value
        .try_into()
        .map_err(|_| AppError::Encoding(format!("{field} {value} exceeds uint128")))
}

fn encode_singleton(
    ctx: &EncodeContext<'_>,
    venue: &VenueDescriptor,
    candidate: &VenueCandidate,
    key: &PoolKey,
    request: &SwapRequest,
    min_out: U256,
) -> Result<EncodedSwap, AppError> {
    let AddressingScheme::SingletonManager {
        universal_router, ..
    } = &venue.scheme
    else {
        return Err(AppError::Encoding(format!("{} is not a singleton venue", venue.name)));
    };
    match candidate.pool_id() {
        Some(id) => validate_pool_id(key, &id)?,
        None => {
            derive_pool_id(key)?;
        }
    }
    let wrapped = ctx.registry.wrapped_native();
    let pool_in = pool_currency(candidate, request.token_in, wrapped);
    let pool_out = pool_currency(candidate, request.token_out, wrapped);
    if !key.contains(pool_in) || !key.contains(pool_out) {
        return Err(AppError::Encoding(format!(
            "pool {}/{} does not hold {:#x} -> {:#x}",
            key.currency0, key.currency1, pool_in, pool_out
        )));
    }

    let amount_in = request.amount_in;
    let swap = abi::ExactInputSingleParams {
        poolKey: abi::PoolKey::from(key),
        zeroForOne: pool_in == key.currency0,
        amountIn: to_u128(amount_in, "amount_in")?,
        amountOutMinimum: to_u128(min_out, "min_out")?,
        hookData: Bytes::new(),
    };
    let plan = V4Plan::new().swap_exact_in_single(swap);
    let recipient = ctx.recipient;

    let commands: Vec<EncodedCommand> = if request.is_native_in() {
        if pool_in == NATIVE {
            vec![
                v4_swap(
                    plan.settle_all(NATIVE, amount_in)
                        .take_all(pool_out, min_out),
                ),
                sweep(NATIVE, recipient, U160::ZERO),
            ]
        } else {
            // Router wraps into its own balance, so the pool is paid by the router.
            vec![
                wrap_eth(ADDRESS_THIS, amount_in),
                v4_swap(
                    plan.settle(pool_in, OPEN_DELTA, false)
                        .take(pool_out, recipient, OPEN_DELTA),
                ),
                sweep(pool_in, recipient, U160::ZERO),
            ]
        }
    } else if request.is_native_out() && pool_out != NATIVE {
        vec![
            v4_swap(
                plan.settle_all(pool_in, amount_in)
                    .take(pool_out, ADDRESS_THIS, OPEN_DELTA),
            ),
            unwrap_weth(recipient, min_out),
        ]
    } else {
        vec![v4_swap(
            plan.settle_all(pool_in, amount_in)
                .take_all(pool_out, min_out),
        )]
    };

    let allowance = (!request.is_native_in()).then_some(AllowanceRequirement {
        token: request.token_in,
        spender: *universal_router,
        amount: amount_in,
        via_permit2: true,
    });
    let calldata = execute_calldata(&commands, U256::from(ctx.deadline));
    Ok(EncodedSwap {
        commands,
        target: *universal_router,
        value: if request.is_native_in() { amount_in } else { U256::ZERO },
        calldata,
        min_out,
        allowance,
    })
}

fn encode_concentrated(
    ctx: &EncodeContext<'_>,
    router: Address,
    candidate: &VenueCandidate,
    fee: u32,
    request: &SwapRequest,
    min_out: U256,
) -> Result<EncodedSwap, AppError> {
    let wrapped = ctx.registry.wrapped_native();
    let token_in = pool_currency(candidate, request.token_in, wrapped);
    let token_out = pool_currency(candidate, request.token_out, wrapped);
    let native_out = request.is_native_out();

    let swap = abi::ISwapRouter02::exactInputSingleCall {
        params: abi::V3ExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            fee: U24::from(fee & 0x00ff_ffff),
            // Native output lands on the router first, then unwrapWETH9 pays the caller.
            recipient: if native_out { ADDRESS_THIS } else { ctx.recipient },
            amountIn: request.amount_in,
            amountOutMinimum: min_out,
            sqrtPriceLimitX96: U160::ZERO,
        },
    };
    let mut calls: Vec<Bytes> = vec![swap.abi_encode().into()];
    if native_out {
        calls.push(
            abi::ISwapRouter02::unwrapWETH9Call {
                amountMinimum: min_out,
                recipient: ctx.recipient,
            }
            .abi_encode()
            .into(),
        );
    }
    let calldata = abi::ISwapRouter02::multicallCall {
        deadline: U256::from(ctx.deadline),
        data: calls,
    }
    .abi_encode();

    Ok(EncodedSwap {
        commands: Vec::new(),
        target: router,
        value: if request.is_native_in() {
            request.amount_in
        } else {
            U256::ZERO
        },
        calldata: calldata.into(),
        min_out,
        allowance: direct_allowance(request, router),
    })
}

fn encode_constant_product(
    ctx: &EncodeContext<'_>,
    router: Address,
    factory: Address,
    flavor: PairFlavor,
    stable: bool,
    candidate: &VenueCandidate,
    request: &SwapRequest,
    min_out: U256,
) -> Result<EncodedSwap, AppError> {
    let wrapped = ctx.registry.wrapped_native();
    let token_in = pool_currency(candidate, request.token_in, wrapped);
    let token_out = pool_currency(candidate, request.token_out, wrapped);
    let deadline = U256::from(ctx.deadline);
    let to = ctx.recipient;
    let amount_in = request.amount_in;

    let calldata: Vec<u8> = match flavor {
        PairFlavor::UniswapV2 => {
            let path = vec![token_in, token_out];
            if request.is_native_in() {
                abi::IUniV2Router::swapExactETHForTokensCall {
                    amountOutMin: min_out,
                    path,
                    to,
                    deadline,
                }
                .abi_encode()
            } else if request.is_native_out() {
                abi::IUniV2Router::swapExactTokensForETHCall {
                    amountIn: amount_in,
                    amountOutMin: min_out,
                    path,
                    to,
                    deadline,
                }
                .abi_encode()
            } else {
                abi::IUniV2Router::swapExactTokensForTokensCall {
                    amountIn: amount_in,
                    amountOutMin: min_out,
                    path,
                    to,
                    deadline,
                }
                .abi_encode()
            }
        }
        PairFlavor::Solidly => {
            let routes = vec![abi::SolidlyRoute {
                from: token_in,
                to: token_out,
                stable,
                factory,
            }];
            if request.is_native_in() {
                abi::ISolidlyRouter::swapExactETHForTokensCall {
                    amountOutMin: min_out,
                    routes,
                    to,
                    deadline,
                }
                .abi_encode()
            } else if request.is_native_out() {
                abi::ISolidlyRouter::swapExactTokensForETHCall {
                    amountIn: amount_in,
                    amountOutMin: min_out,
                    routes,
                    to,
                    deadline,
                }
                .abi_encode()
            } else {
                abi::ISolidlyRouter::swapExactTokensForTokensCall {
                    amountIn: amount_in,
                    amountOutMin: min_out,
                    routes,
                    to,
                    deadline,
                }
                .abi_encode()
            }
        }
    };

    Ok(EncodedSwap {
        commands: Vec::new(),
        target: router,
        value: if request.is_native_in() {
            amount_in
        } else {
            U256::ZERO
        },
        calldata: calldata.into(),
        min_out,
        allowance: direct_allowance(request, router),
    })
}

fn direct_allowance(request: &SwapRequest, router: Address) -> Option<AllowanceRequirement> {
    (!request.is_native_in()).then_some(AllowanceRequirement {
        token: request.token_in,
        spender: router,
        amount: request.amount_in,
        via_permit2: false,
    })
}
