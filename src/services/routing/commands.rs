// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Universal Router command bytes and V4 router actions.
//!
//! Byte values follow `Commands.sol` (universal-router) and `Actions.sol`
//! (v4-periphery). Every payload here is covered by a golden vector in
//! `tests/golden_vectors.rs`; change a field order and those tests fail.

use crate::domain::types::EncodedCommand;
use crate::infrastructure::data::abi;
use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, Bytes, U256, address};
use alloy_sol_types::{SolCall, SolValue};

pub mod command {
    pub const SWEEP: u8 = 0x04;
    pub const WRAP_ETH: u8 = 0x0b;
    pub const UNWRAP_WETH: u8 = 0x0c;
    pub const V4_SWAP: u8 = 0x10;
}

pub mod action {
    pub const SWAP_EXACT_IN_SINGLE: u8 = 0x06;
    pub const SETTLE: u8 = 0x0b;
    pub const SETTLE_ALL: u8 = 0x0c;
    pub const TAKE: u8 = 0x0e;
    pub const TAKE_ALL: u8 = 0x0f;
}

/// Recipient sentinel: the router itself.
pub const ADDRESS_THIS: Address = address!("0000000000000000000000000000000000000002");
/// Amount sentinel for SETTLE/TAKE: use the full open delta.
pub const OPEN_DELTA: U256 = U256::ZERO;

/// `WRAP_ETH(address recipient, uint256 amountMin)`
pub fn wrap_eth(recipient: Address, amount_min: U256) -> EncodedCommand {
    EncodedCommand {
        command: command::WRAP_ETH,
        input: (recipient, amount_min).abi_encode_params().into(),
    }
}

/// `UNWRAP_WETH(address recipient, uint256 amountMin)`
pub fn unwrap_weth(recipient: Address, amount_min: U256) -> EncodedCommand {
    EncodedCommand {
        command: command::UNWRAP_WETH,
        input: (recipient, amount_min).abi_encode_params().into(),
    }
}

/// `SWEEP(address token, address recipient, uint160 amountMin)`
pub fn sweep(token: Address, recipient: Address, amount_min: U160) -> EncodedCommand {
    EncodedCommand {
        command: command::SWEEP,
        input: (token, recipient, U256::from(amount_min))
            .abi_encode_params()
            .into(),
    }
}

/// `V4_SWAP(bytes actions, bytes[] params)`
pub fn v4_swap(plan: V4Plan) -> EncodedCommand {
    let (actions, params) = plan.finish();
    EncodedCommand {
        command: command::V4_SWAP,
        input: (actions, params).abi_encode_params().into(),
    }
}

/// Calldata for `execute(bytes commands, bytes[] inputs, uint256 deadline)`.
pub fn execute_calldata(commands: &[EncodedCommand], deadline: U256) -> Bytes {
    abi::IUniversalRouter::executeCall {
        commands: commands.iter().map(|c| c.command).collect::<Vec<u8>>().into(),
        inputs: commands.iter().map(|c| c.input.clone()).collect(),
        deadline,
    }
    .abi_encode()
    .into()
}

/// Ordered V4 router actions with their parameters. Built once per attempt
/// and consumed by [`v4_swap`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct V4Plan {
    actions: Vec<u8>,
    params: Vec<Bytes>,
}

impl V4Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[u8] {
        &self.actions
    }

    fn push(mut self, action: u8, param: Vec<u8>) -> Self {
        self.actions.push(action);
        self.params.push(param.into());
        self
    }

    /// Param is `abi.encode(ExactInputSingleParams)`, a dynamic struct, so it
    /// carries its own leading offset word.
    pub fn swap_exact_in_single(self, params: abi::ExactInputSingleParams) -> Self {
        self.push(action::SWAP_EXACT_IN_SINGLE, params.abi_encode())
    }

    /// `SETTLE(Currency currency, uint256 amount, bool payerIsUser)`
    pub fn settle(self, currency: Address, amount: U256, payer_is_user: bool) -> Self {
        self.push(
            action::SETTLE,
            (currency, amount, payer_is_user).abi_encode_params(),
        )
    }

    /// `SETTLE_ALL(Currency currency, uint256 maxAmount)`
    pub fn settle_all(self, currency: Address, max_amount: U256) -> Self {
        self.push(action::SETTLE_ALL, (currency, max_amount).abi_encode_params())
    }

    /// `TAKE(Currency currency, address recipient, uint256 amount)`
    pub fn take(self, currency: Address, recipient: Address, amount: U256) -> Self {
        self.push(action::TAKE, (currency, recipient, amount).abi_encode_params())
    }

    /// `TAKE_ALL(Currency currency, uint256 minAmount)`
    pub fn take_all(self, currency: Address, min_amount: U256) -> Self {
        self.push(action::TAKE_ALL, (currency, min_amount).abi_encode_params())
    }

    pub fn finish(self) -> (Bytes, Vec<Bytes>) {
        (self.actions.into(), self.params)
    }
}
