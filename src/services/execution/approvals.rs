// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::time_utils::current_unix;
use crate::domain::types::{AllowanceRequirement, FailureKind, RouteSource, SwapFailure};
use crate::infrastructure::data::abi;
use crate::infrastructure::network::node::{ChainClient, view};
use crate::services::execution::audit::{AttemptState, AuditEntry, AuditLog};
use crate::services::execution::submitter::{TransactionSubmitter, TxIntent};
use alloy::primitives::aliases::{U48, U160};
use alloy::primitives::{Address, U256};
use alloy_sol_types::SolCall;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Permit2 allowances granted by the engine expire after this long.
pub const PERMIT2_EXPIRATION_SECS: u64 = 30 * 24 * 60 * 60;

/// What the swap is missing before it can pull the input token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalStep {
    /// `token.approve(spender, amount)`
    Erc20 { spender: Address },
    /// `permit2.approve(token, spender, amount, expiration)`
    Permit2 { spender: Address, expiration: u64 },
}

/// Checks allowances and sends exact-amount approvals when short.
pub struct AllowanceManager {
    client: Arc<dyn ChainClient>,
    permit2: Address,
}

impl AllowanceManager {
    pub fn new(client: Arc<dyn ChainClient>, permit2: Address) -> Self {
        Self { client, permit2 }
    }

    /// Steps still needed for `owner` to satisfy `req`, in the order they must land.
    pub async fn missing_steps(
        &self,
        owner: Address,
        req: &AllowanceRequirement,
    ) -> Result<Vec<ApprovalStep>, SwapFailure> {
        let client = self.client.as_ref();
        let erc20_spender = if req.via_permit2 { self.permit2 } else { req.spender };
        let current = view(
            client,
            req.token,
            &abi::IERC20::allowanceCall {
                owner,
                spender: erc20_spender,
            },
        )
        .await
        .map_err(|e| allowance_failure(&format!("allowance read: {e}")))?;

        let mut steps = Vec::new();
        if current < req.amount {
            steps.push(ApprovalStep::Erc20 {
                spender: erc20_spender,
            });
        }
        if req.via_permit2 {
            let now = current_unix();
            let granted = view(
                client,
                self.permit2,
                &abi::IPermit2::allowanceCall {
                    user: owner,
                    token: req.token,
                    spender: req.spender,
                },
            )
            .await
            .map_err(|e| allowance_failure(&format!("permit2 allowance read: {e}")))?;
            let amount = U256::from(granted.amount);
            let expiration: u64 = granted.expiration.to::<u64>();
            if amount < req.amount || expiration <= now {
                steps.push(ApprovalStep::Permit2 {
                    spender: req.spender,
                    expiration: now.saturating_add(PERMIT2_EXPIRATION_SECS),
                });
            }
        }
        Ok(steps)
    }

    /// Bring allowances up to `req.amount`. Each approval transaction is
    /// confirmed before the next and gets its own audit record.
    pub async fn ensure(
        &self,
        submitter: &TransactionSubmitter,
        audit: &AuditLog,
        req: &AllowanceRequirement,
        source: &RouteSource,
        cancel: &CancellationToken,
    ) -> Result<usize, SwapFailure> {
        let steps = self
            .missing_steps(submitter.sender(), req)
            .await
            .map_err(|f| SwapFailure::new(f.kind, Some(source.clone()), f.reason))?;

        for (idx, step) in steps.iter().enumerate() {
            let intent = approval_intent(req, step, self.permit2).map_err(|reason| {
                SwapFailure::new(FailureKind::InsufficientAllowance, Some(source.clone()), reason)
            })?;
            let started = Instant::now();
            tracing::info!(target: "approvals", token = %req.token, step = ?step, amount = %req.amount, "Sending approval");
            let result = submitter.submit(&intent, cancel).await;
            let elapsed = started.elapsed().as_millis() as u64;
            match result {
                Ok(done) => {
                    audit.append(AuditEntry {
                        operation: "approve",
                        source: Some(source.clone()),
                        attempt: idx as u32 + 1,
                        state: Some(AttemptState::Confirmed),
                        tx_hash: done.tx_hash,
                        gas_used: done.gas_used,
                        block_number: done.block_number,
                        duration_ms: elapsed,
                        dry_run: done.dry_run,
                        ..Default::default()
                    });
                }
                Err(e) => {
                    audit.append(AuditEntry {
                        operation: "approve",
                        source: Some(source.clone()),
                        attempt: idx as u32 + 1,
                        state: Some(e.state),
                        failure: Some(FailureKind::InsufficientAllowance),
                        error: Some(e.reason.clone()),
                        tx_hash: e.tx_hash,
                        gas_used: e.gas_used,
                        duration_ms: elapsed,
                        dry_run: submitter.is_dry_run(),
                        ..Default::default()
                    });
                    let mut failure = SwapFailure::new(
                        FailureKind::InsufficientAllowance,
                        Some(source.clone()),
                        format!("approval failed: {}", e.reason),
                    );
                    failure.tx_hash = e.tx_hash;
                    return Err(failure);
                }
            }
        }
        Ok(steps.len())
    }
}

fn allowance_failure(reason: &str) -> SwapFailure {
    SwapFailure::new(FailureKind::InsufficientAllowance, None, reason)
}

/// Calldata for one approval step. Amounts are exact, never unlimited.
pub fn approval_intent(
    req: &AllowanceRequirement,
    step: &ApprovalStep,
    permit2: Address,
) -> Result<TxIntent, String> {
    match step {
        ApprovalStep::Erc20 { spender } => Ok(TxIntent {
            to: req.token,
            value: U256::ZERO,
            data: abi::IERC20::approveCall {
                spender: *spender,
                amount: req.amount,
            }
            .abi_encode()
            .into(),
            gas_hint: Some(crate::domain::constants::APPROVAL_GAS_LIMIT),
        }),
        ApprovalStep::Permit2 {
            spender,
            expiration,
        } => {
            if req.amount > U256::from(U160::MAX) {
                return Err(format!("amount {} exceeds uint160", req.amount));
            }
            let amount = U160::from(req.amount);
            let expiration = U48::try_from(*expiration)
                .map_err(|_| format!("expiration {expiration} exceeds uint48"))?;
            Ok(TxIntent {
                to: permit2,
                value: U256::ZERO,
                data: abi::IPermit2::approveCall {
                    token: req.token,
                    spender: *spender,
                    amount,
                    expiration,
                }
                .abi_encode()
                .into(),
                gas_hint: Some(crate::domain::constants::APPROVAL_GAS_LIMIT),
            })
        }
    }
}
