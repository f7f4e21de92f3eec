// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use crate::infrastructure::network::provider::HttpProvider;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::eth::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;

/// Raw fee inputs as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeData {
    /// `None` on chains without a base-fee market.
    pub base_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub gas_price: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub status: bool,
    pub gas_used: u64,
    pub block_number: Option<u64>,
    pub effective_gas_price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl CallRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    fn into_request(self) -> TransactionRequest {
        let mut req = TransactionRequest::default()
            .with_to(self.to)
            .with_value(self.value)
            .with_input(self.data);
        if let Some(from) = self.from {
            req = req.with_from(from);
        }
        req
    }
}

/// Everything the engine needs from a node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, AppError>;
    async fn code_at(&self, address: Address) -> Result<Bytes, AppError>;
    /// `eth_call` against latest state.
    async fn call(&self, request: CallRequest) -> Result<Bytes, AppError>;
    async fn balance(&self, owner: Address) -> Result<U256, AppError>;
    /// Nonce including queued transactions.
    async fn pending_nonce(&self, owner: Address) -> Result<u64, AppError>;
    async fn latest_nonce(&self, owner: Address) -> Result<u64, AppError>;
    async fn fee_data(&self) -> Result<FeeData, AppError>;
    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, AppError>;
    async fn send_raw(&self, raw: Bytes) -> Result<B256, AppError>;
    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>, AppError>;
}

/// Typed `eth_call` through any [`ChainClient`].
pub async fn view<C: SolCall>(
    client: &dyn ChainClient,
    to: Address,
    call: &C,
) -> Result<C::Return, AppError> {
    let raw = client.call(CallRequest::new(to, call.abi_encode())).await?;
    C::abi_decode_returns(&raw).map_err(|e| {
        AppError::Encoding(format!("decode {} from {:#x}: {}", C::SIGNATURE, to, e))
    })
}

pub async fn has_code(client: &dyn ChainClient, address: Address) -> bool {
    match client.code_at(address).await {
        Ok(code) => !code.is_empty(),
        Err(_) => false,
    }
}

/// [`ChainClient`] over an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: HttpProvider,
}

impl AlloyChainClient {
    pub fn new(provider: HttpProvider) -> Self {
        Self { provider }
    }
}

fn rpc_err(op: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Connection(format!("{op} failed: {e}"))
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn chain_id(&self) -> Result<u64, AppError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_err("eth_chainId", e))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, AppError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| rpc_err("eth_getCode", e))
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, AppError> {
        let to = request.to;
        self.provider
            .call(request.into_request())
            .await
            .map_err(|e| AppError::Transaction {
                hash: format!("call:{to:#x}"),
                reason: e.to_string(),
            })
    }

    async fn balance(&self, owner: Address) -> Result<U256, AppError> {
        self.provider
            .get_balance(owner)
            .await
            .map_err(|e| rpc_err("eth_getBalance", e))
    }

    async fn pending_nonce(&self, owner: Address) -> Result<u64, AppError> {
        self.provider
            .get_transaction_count(owner)
            .pending()
            .await
            .map_err(|e| rpc_err("eth_getTransactionCount(pending)", e))
    }

    async fn latest_nonce(&self, owner: Address) -> Result<u64, AppError> {
        self.provider
            .get_transaction_count(owner)
            .latest()
            .await
            .map_err(|e| rpc_err("eth_getTransactionCount(latest)", e))
    }

    async fn fee_data(&self) -> Result<FeeData, AppError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| rpc_err("eth_getBlockByNumber", e))?;
        let base_fee_per_gas = block
            .as_ref()
            .and_then(|b| b.header.base_fee_per_gas)
            .map(|v| v as u128);

        let max_priority_fee_per_gas = if base_fee_per_gas.is_some() {
            self.provider.get_max_priority_fee_per_gas().await.ok()
        } else {
            None
        };
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_err("eth_gasPrice", e))?;

        Ok(FeeData {
            base_fee_per_gas,
            max_priority_fee_per_gas,
            gas_price,
        })
    }

    async fn estimate_gas(&self, request: CallRequest) -> Result<u64, AppError> {
        self.provider
            .estimate_gas(request.into_request())
            .await
            .map_err(|e| AppError::Transaction {
                hash: "estimate".into(),
                reason: e.to_string(),
            })
    }

    async fn send_raw(&self, raw: Bytes) -> Result<B256, AppError> {
        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| rpc_err("eth_sendRawTransaction", e))?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>, AppError> {
        let rcpt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| rpc_err("eth_getTransactionReceipt", e))?;
        Ok(rcpt.map(|r| ReceiptSummary {
            status: r.status(),
            gas_used: r.gas_used,
            block_number: r.block_number,
            effective_gas_price: r.effective_gas_price,
        }))
    }
}
