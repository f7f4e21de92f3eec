// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use crate::infrastructure::network::gas::FeeSuggestion;
use alloy::consensus::{SignableTransaction, TxEip1559, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy_consensus::TxEnvelope;
use async_trait::async_trait;
use std::str::FromStr;

/// Fields handed to the signer. The engine never touches key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedSwapTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub fees: FeeSuggestion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub raw: Bytes,
    pub hash: B256,
}

#[async_trait]
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;
    async fn sign(&self, tx: &UnsignedSwapTx) -> Result<SignedTx, AppError>;
}

/// In-process signer over an alloy local key.
pub struct LocalSigner {
    signer: PrivateKeySigner,
}

impl LocalSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_hex(key: &str) -> Result<Self, AppError> {
        let signer = PrivateKeySigner::from_str(key.trim())
            .map_err(|_| AppError::Config("Invalid wallet key".to_string()))?;
        Ok(Self::new(signer))
    }

    fn sign_sync(&self, tx: &UnsignedSwapTx) -> Result<SignedTx, AppError> {
        let envelope: TxEnvelope = match tx.fees {
            FeeSuggestion::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut inner = TxEip1559 {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_limit: tx.gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    to: TxKind::Call(tx.to),
                    value: tx.value,
                    access_list: Default::default(),
                    input: tx.data.clone(),
                };
                let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut inner)
                    .map_err(|e| AppError::Signing(e.to_string()))?;
                inner.into_signed(sig).into()
            }
            FeeSuggestion::Legacy { gas_price } => {
                let mut inner = TxLegacy {
                    chain_id: Some(tx.chain_id),
                    nonce: tx.nonce,
                    gas_price,
                    gas_limit: tx.gas_limit,
                    to: TxKind::Call(tx.to),
                    value: tx.value,
                    input: tx.data.clone(),
                };
                let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut inner)
                    .map_err(|e| AppError::Signing(e.to_string()))?;
                inner.into_signed(sig).into()
            }
        };
        Ok(SignedTx {
            raw: Bytes::from(envelope.encoded_2718()),
            hash: *envelope.tx_hash(),
        })
    }
}

#[async_trait]
impl TxSigner for LocalSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign(&self, tx: &UnsignedSwapTx) -> Result<SignedTx, AppError> {
        self.sign_sync(tx)
    }
}
