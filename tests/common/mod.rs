// SPDX-License-Identifier: MIT
// Scripted chain, recording signer and canned aggregators shared by the
// integration tests. Nothing here touches the network.
#![allow(dead_code)]

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use oxidity_swapper::app::config::EngineSettings;
use oxidity_swapper::domain::error::AppError;
use oxidity_swapper::domain::types::{AggregatorTx, Quote, QuoteSource};
use oxidity_swapper::network::node::{CallRequest, ChainClient, FeeData, ReceiptSummary};
use oxidity_swapper::network::signer::{LocalSigner, SignedTx, TxSigner, UnsignedSwapTx};
use oxidity_swapper::services::routing::aggregator::{AggregatorRequest, QuoteAggregator};
use oxidity_swapper::SwapEngine;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ONE_ETH: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Success,
    Revert,
    /// Never mined within the test's receipt timeout.
    Pending,
    /// The receipt lookup itself never returns.
    Hang,
}

pub struct MockChain {
    answers: Mutex<HashMap<(Address, [u8; 4]), Bytes>>,
    code: Mutex<HashSet<Address>>,
    pub calls: Mutex<Vec<(Address, [u8; 4])>>,
    pub sent: Mutex<Vec<Bytes>>,
    pending: Mutex<u64>,
    receipt: Mutex<ReceiptMode>,
    balance: Mutex<U256>,
    pub estimate_reverts: AtomicBool,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(HashMap::new()),
            code: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            pending: Mutex::new(0),
            receipt: Mutex::new(ReceiptMode::Success),
            balance: Mutex::new(U256::from(100 * ONE_ETH)),
            estimate_reverts: AtomicBool::new(false),
        })
    }

    pub fn answer(&self, to: Address, selector: [u8; 4], data: Vec<u8>) {
        self.answers
            .lock()
            .unwrap()
            .insert((to, selector), Bytes::from(data));
    }

    pub fn deploy(&self, address: Address) {
        self.code.lock().unwrap().insert(address);
    }

    pub fn set_receipt(&self, mode: ReceiptMode) {
        *self.receipt.lock().unwrap() = mode;
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn called(&self, to: Address) -> bool {
        self.calls.lock().unwrap().iter().any(|(t, _)| *t == to)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, AppError> {
        Ok(8453)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, AppError> {
        Ok(if self.code.lock().unwrap().contains(&address) {
            Bytes::from(vec![0x60, 0x80])
        } else {
            Bytes::new()
        })
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes, AppError> {
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&request.data[..4]);
        self.calls.lock().unwrap().push((request.to, sel));
        self.answers
            .lock()
            .unwrap()
            .get(&(request.to, sel))
            .cloned()
            .ok_or_else(|| AppError::Transaction {
                hash: "call".into(),
                reason: "execution reverted".into(),
            })
    }

    async fn balance(&self, _: Address) -> Result<U256, AppError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn pending_nonce(&self, _: Address) -> Result<u64, AppError> {
        Ok(*self.pending.lock().unwrap())
    }

    async fn latest_nonce(&self, _: Address) -> Result<u64, AppError> {
        Ok(*self.pending.lock().unwrap())
    }

    async fn fee_data(&self) -> Result<FeeData, AppError> {
        Ok(FeeData {
            base_fee_per_gas: Some(10_000_000),
            max_priority_fee_per_gas: Some(1_000_000),
            gas_price: 20_000_000,
        })
    }

    async fn estimate_gas(&self, _: CallRequest) -> Result<u64, AppError> {
        if self.estimate_reverts.load(Ordering::SeqCst) {
            return Err(AppError::Transaction {
                hash: "estimate".into(),
                reason: "execution reverted: Too little received".into(),
            });
        }
        Ok(150_000)
    }

    async fn send_raw(&self, raw: Bytes) -> Result<B256, AppError> {
        let hash = keccak256(&raw);
        self.sent.lock().unwrap().push(raw);
        *self.pending.lock().unwrap() += 1;
        Ok(hash)
    }

    async fn receipt(&self, _: B256) -> Result<Option<ReceiptSummary>, AppError> {
        let mode = *self.receipt.lock().unwrap();
        Ok(match mode {
            ReceiptMode::Success => Some(ReceiptSummary {
                status: true,
                gas_used: 120_000,
                block_number: Some(42),
                effective_gas_price: 20_000_000,
            }),
            ReceiptMode::Revert => Some(ReceiptSummary {
                status: false,
                gas_used: 90_000,
                block_number: Some(42),
                effective_gas_price: 20_000_000,
            }),
            ReceiptMode::Pending => None,
            ReceiptMode::Hang => std::future::pending().await,
        })
    }
}

/// Real local signer that remembers every nonce it was asked to sign.
pub struct RecordingSigner {
    inner: LocalSigner,
    pub nonces: Mutex<Vec<u64>>,
}

impl RecordingSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalSigner::new(PrivateKeySigner::random()),
            nonces: Mutex::new(Vec::new()),
        })
    }

    pub fn nonces(&self) -> Vec<u64> {
        self.nonces.lock().unwrap().clone()
    }
}

#[async_trait]
impl TxSigner for RecordingSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign(&self, tx: &UnsignedSwapTx) -> Result<SignedTx, AppError> {
        self.nonces.lock().unwrap().push(tx.nonce);
        self.inner.sign(tx).await
    }
}

/// Aggregator that always answers the same way.
pub struct CannedAggregator {
    name: String,
    quote: Option<Quote>,
    pub calls: AtomicUsize,
}

impl CannedAggregator {
    pub fn routing(name: &str, expected_out: u64, router: Address) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            quote: Some(Quote {
                expected_out: U256::from(expected_out),
                source: QuoteSource::Aggregator,
                low_confidence: false,
                tx: Some(AggregatorTx {
                    to: router,
                    data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
                    value: U256::from(2_000_000_000_000_000u64),
                    gas: Some(180_000),
                    gas_price: None,
                    spender: Some(router),
                }),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            quote: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteAggregator for CannedAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(&self, _: &AggregatorRequest) -> Result<Quote, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.quote.clone().ok_or_else(|| AppError::NoRoute {
            provider: self.name.clone(),
            reason: "no liquidity for pair".into(),
        })
    }
}

/// Base deployment defaults with timings shrunk for tests.
pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        rpc_url: "http://127.0.0.1:8545".into(),
        retry_delay_ms: 1,
        retry_max_delay_ms: 2,
        receipt_timeout_ms: 40,
        receipt_poll_ms: 5,
        probe_timeout_ms: 200,
        max_retries: 3,
        ..EngineSettings::default()
    }
}

pub fn engine(
    settings: &EngineSettings,
    chain: &Arc<MockChain>,
    signer: &Arc<RecordingSigner>,
    aggregators: Vec<Arc<CannedAggregator>>,
) -> SwapEngine {
    let aggregators: Vec<Arc<dyn QuoteAggregator>> = aggregators
        .into_iter()
        .map(|a| a as Arc<dyn QuoteAggregator>)
        .collect();
    SwapEngine::from_parts(settings, chain.clone(), signer.clone(), aggregators)
        .expect("engine builds")
}

pub fn word(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

pub fn address_word(address: Address) -> Vec<u8> {
    address.into_word().to_vec()
}

pub fn words(values: &[U256]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes::<32>()).collect()
}
