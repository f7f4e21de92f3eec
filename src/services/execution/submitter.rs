// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::MAX_GAS_LIMIT;
use crate::domain::error::AppError;
use crate::domain::types::FailureKind;
use crate::infrastructure::network::gas::{GasOracle, buffered_gas_limit};
use crate::infrastructure::network::node::{CallRequest, ChainClient, ReceiptSummary};
use crate::infrastructure::network::nonce::NonceManager;
use crate::infrastructure::network::signer::{TxSigner, UnsignedSwapTx};
use crate::services::execution::audit::AttemptState;
use alloy::primitives::{Address, B256, Bytes, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct SubmitterConfig {
    pub chain_id: u64,
    pub gas_limit_buffer_bps: u64,
    pub default_gas_limit: u64,
    pub receipt_timeout: Duration,
    pub receipt_poll: Duration,
    pub dry_run: bool,
}

/// A transaction to sign and send.
#[derive(Debug, Clone)]
pub struct TxIntent {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    /// Gas figure suggested by an aggregator, used when estimation fails.
    pub gas_hint: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub tx_hash: Option<B256>,
    pub gas_used: Option<u64>,
    pub block_number: Option<u64>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitError {
    pub kind: FailureKind,
    /// Last state reached before the failure.
    pub state: AttemptState,
    pub reason: String,
    pub tx_hash: Option<B256>,
    pub gas_used: Option<u64>,
}

impl SubmitError {
    fn new(kind: FailureKind, state: AttemptState, reason: impl Into<String>) -> Self {
        Self {
            kind,
            state,
            reason: reason.into(),
            tx_hash: None,
            gas_used: None,
        }
    }
}

/// Estimates, signs, broadcasts and confirms one transaction. Every call signs
/// with a freshly reserved nonce; nothing is ever re-broadcast.
pub struct TransactionSubmitter {
    client: Arc<dyn ChainClient>,
    signer: Arc<dyn TxSigner>,
    nonces: NonceManager,
    gas: GasOracle,
    cfg: SubmitterConfig,
}

/// Router revert strings that mean the output fell below the minimum.
const SLIPPAGE_MARKERS: &[&str] = &[
    "too little received",
    "toolittlereceived",
    "insufficient output",
    "insufficient_output_amount",
    "slippage",
];

/// Failure kind for a simulation error, or `None` when the node simply could
/// not estimate. Slippage reverts mean the quote went stale before sending.
fn classify_simulation_error(err: &AppError) -> Option<FailureKind> {
    let text = err.to_string().to_ascii_lowercase();
    if SLIPPAGE_MARKERS.iter().any(|m| text.contains(m)) {
        Some(FailureKind::QuoteStale)
    } else if text.contains("revert") {
        Some(FailureKind::Reverted)
    } else {
        None
    }
}

impl TransactionSubmitter {
    pub fn new(
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn TxSigner>,
        nonces: NonceManager,
        gas: GasOracle,
        cfg: SubmitterConfig,
    ) -> Self {
        Self {
            client,
            signer,
            nonces,
            gas,
            cfg,
        }
    }

    pub fn sender(&self) -> Address {
        self.signer.address()
    }

    pub fn gas_oracle(&self) -> &GasOracle {
        &self.gas
    }

    pub fn is_dry_run(&self) -> bool {
        self.cfg.dry_run
    }

    /// Gas limit from a buffered estimate. A simulated revert is reported as
    /// such; any other estimation failure falls back to the hint or default.
    async fn gas_limit(&self, intent: &TxIntent) -> Result<u64, SubmitError> {
        let request = CallRequest::new(intent.to, intent.data.clone())
            .from(self.sender())
            .value(intent.value);
        match self.client.estimate_gas(request).await {
            Ok(estimate) => Ok(buffered_gas_limit(
                estimate,
                self.cfg.gas_limit_buffer_bps,
                MAX_GAS_LIMIT,
            )),
            Err(e) => {
                // A dry run cannot rely on allowances it only pretended to grant.
                if let Some(kind) = classify_simulation_error(&e).filter(|_| !self.cfg.dry_run) {
                    return Err(SubmitError::new(
                        kind,
                        AttemptState::Signing,
                        format!("simulation reverted: {e}"),
                    ));
                }
                let fallback = match intent.gas_hint.filter(|g| *g > 0) {
                    Some(hint) => buffered_gas_limit(hint, self.cfg.gas_limit_buffer_bps, MAX_GAS_LIMIT),
                    None => self.cfg.default_gas_limit,
                };
                tracing::warn!(target: "submitter", error = %e, gas_limit = fallback, "Gas estimation failed, using fallback limit");
                Ok(fallback)
            }
        }
    }

    pub async fn submit(
        &self,
        intent: &TxIntent,
        cancel: &CancellationToken,
    ) -> Result<Submitted, SubmitError> {
        let gas_limit = self.gas_limit(intent).await?;
        let fees = self.gas.suggest().await.map_err(|e| {
            SubmitError::new(FailureKind::Unavailable, AttemptState::Signing, format!("fee data: {e}"))
        })?;
        let nonce = self.nonces.reserve().await.map_err(|e| {
            SubmitError::new(FailureKind::Unavailable, AttemptState::Signing, format!("nonce: {e}"))
        })?;

        let unsigned = UnsignedSwapTx {
            chain_id: self.cfg.chain_id,
            nonce,
            to: intent.to,
            value: intent.value,
            data: intent.data.clone(),
            gas_limit,
            fees,
        };
        let signed = match self.signer.sign(&unsigned).await {
            Ok(s) => s,
            Err(e) => {
                self.release_nonce().await;
                return Err(SubmitError::new(
                    FailureKind::Unavailable,
                    AttemptState::Signing,
                    e.to_string(),
                ));
            }
        };

        if self.cfg.dry_run {
            self.release_nonce().await;
            tracing::info!(
                target: "submitter",
                to = %intent.to,
                nonce,
                gas_limit,
                would_be_hash = %signed.hash,
                "Dry run: signed transaction not broadcast"
            );
            return Ok(Submitted {
                tx_hash: None,
                gas_used: None,
                block_number: None,
                dry_run: true,
            });
        }

        let hash = match self.client.send_raw(signed.raw.clone()).await {
            Ok(hash) => hash,
            Err(e) => {
                self.release_nonce().await;
                return Err(SubmitError::new(
                    FailureKind::Reverted,
                    AttemptState::Broadcasting,
                    format!("broadcast rejected: {e}"),
                ));
            }
        };
        tracing::info!(target: "submitter", tx_hash = %hash, nonce, gas_limit, "Transaction broadcast");

        match self.await_receipt(hash, cancel).await {
            Some(rcpt) if rcpt.status => Ok(Submitted {
                tx_hash: Some(hash),
                gas_used: Some(rcpt.gas_used),
                block_number: rcpt.block_number,
                dry_run: false,
            }),
            Some(rcpt) => Err(SubmitError {
                kind: FailureKind::Reverted,
                state: AttemptState::Reverted,
                reason: format!("reverted on-chain in block {:?}", rcpt.block_number),
                tx_hash: Some(hash),
                gas_used: Some(rcpt.gas_used),
            }),
            None => Err(SubmitError {
                kind: FailureKind::TimedOut,
                state: AttemptState::TimedOut,
                reason: format!(
                    "no receipt within {}s; transaction may still land",
                    self.cfg.receipt_timeout.as_secs()
                ),
                tx_hash: Some(hash),
                gas_used: None,
            }),
        }
    }

    /// Poll until a receipt appears, the timeout passes, or `cancel` fires.
    async fn await_receipt(&self, hash: B256, cancel: &CancellationToken) -> Option<ReceiptSummary> {
        let deadline = Instant::now() + self.cfg.receipt_timeout;
        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(target: "submitter", tx_hash = %hash, "Confirmation cancelled");
                    return None;
                }
                _ = sleep_until(deadline) => {
                    tracing::debug!(target: "submitter", tx_hash = %hash, "Receipt poll outlived the confirmation deadline");
                    return None;
                }
                polled = self.client.receipt(hash) => polled,
            };
            match polled {
                Ok(Some(rcpt)) => return Some(rcpt),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(target: "submitter", tx_hash = %hash, error = %e, "Receipt poll failed");
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let wait = self.cfg.receipt_poll.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(target: "submitter", tx_hash = %hash, "Confirmation cancelled");
                    return None;
                }
                _ = sleep(wait) => {}
            }
        }
    }

    async fn release_nonce(&self) {
        if let Err(e) = self.nonces.resync().await {
            tracing::warn!(target: "submitter", error = %e, "Nonce resync failed");
        }
    }
}
