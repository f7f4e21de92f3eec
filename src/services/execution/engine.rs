// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::EngineSettings;
use crate::domain::constants::PERMIT2;
use crate::domain::error::AppError;
use crate::domain::types::{Quote, RouteSource, SwapFailure, SwapOutcome, SwapRequest};
use crate::infrastructure::network::gas::GasOracle;
use crate::infrastructure::data::abi;
use crate::infrastructure::network::node::{AlloyChainClient, ChainClient, view};
use crate::infrastructure::network::nonce::NonceManager;
use crate::infrastructure::network::provider::ConnectionFactory;
use crate::infrastructure::network::signer::{LocalSigner, TxSigner};
use crate::services::execution::approvals::AllowanceManager;
use crate::services::execution::audit::AuditLog;
use crate::services::execution::coordinator::{CoordinatorConfig, SwapCoordinator};
use crate::services::execution::submitter::{SubmitterConfig, TransactionSubmitter};
use crate::services::routing::aggregator::QuoteAggregator;
use crate::services::routing::aggregator::oneinch::OneInchClient;
use crate::services::routing::aggregator::zerox::ZeroXClient;
use crate::services::routing::discovery::{ProbeMode, VenueDiscovery};
use crate::services::routing::quote::VenueQuoter;
use crate::services::routing::registry::{AddressingScheme, VenueRegistry};
use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub chain_id: u64,
    pub signer: Address,
    pub native_balance: U256,
    pub venues: Vec<String>,
    pub aggregators: Vec<String>,
    pub dry_run: bool,
}

/// Entry point: one engine per signer and chain. Each `execute` call is
/// independent; nothing but the nonce counter and the audit log carries over.
pub struct SwapEngine {
    client: Arc<dyn ChainClient>,
    registry: Arc<VenueRegistry>,
    coordinator: SwapCoordinator,
    aggregator_names: Vec<String>,
    chain_id: u64,
    slippage_bps: u32,
    deadline_secs: u64,
}

impl SwapEngine {
    /// HTTP provider, local key and whichever aggregators have API keys.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, AppError> {
        let provider = ConnectionFactory::http(&settings.rpc_url)?;
        let client: Arc<dyn ChainClient> = Arc::new(AlloyChainClient::new(provider));

        let key = settings
            .wallet_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("wallet_key is required".into()))?;
        let signer = LocalSigner::from_hex(key)?;
        if let Some(expected) = settings.wallet_address
            && expected != signer.address()
        {
            return Err(AppError::Config(format!(
                "wallet_address {} does not match wallet_key address {}",
                expected,
                signer.address()
            )));
        }

        let aggregators = build_aggregators(settings)?;
        Self::from_parts(settings, client, Arc::new(signer), aggregators)
    }

    /// Wire an engine around caller-supplied chain access, signer and aggregators.
    pub fn from_parts(
        settings: &EngineSettings,
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn TxSigner>,
        aggregators: Vec<Arc<dyn QuoteAggregator>>,
    ) -> Result<Self, AppError> {
        let registry = Arc::new(VenueRegistry::from_settings(settings)?);
        let dry_run = settings.dry_run_value();

        let audit = Arc::new(match settings.audit_log_path.as_deref() {
            Some(path) if !path.trim().is_empty() => AuditLog::with_sink(Path::new(path))
                .map_err(|e| AppError::Initialization(format!("audit log {path}: {e}")))?,
            _ => AuditLog::new(),
        });

        let mode = if settings.probe_deepest() {
            ProbeMode::Deepest
        } else {
            ProbeMode::FirstLiquid
        };
        let discovery = VenueDiscovery::new(
            client.clone(),
            registry.clone(),
            mode,
            settings.probe_timeout(),
        );
        let quoter = VenueQuoter::new(client.clone(), registry.clone());

        let nonces = NonceManager::new(client.clone(), signer.address());
        let gas = GasOracle::new(
            client.clone(),
            settings.max_gas_price_wei(),
            settings.priority_fee_wei_value(),
        );
        let submitter = TransactionSubmitter::new(
            client.clone(),
            signer,
            nonces,
            gas,
            SubmitterConfig {
                chain_id: settings.chain_id,
                gas_limit_buffer_bps: settings.gas_limit_buffer_bps_value(),
                default_gas_limit: settings.default_gas_limit,
                receipt_timeout: settings.receipt_timeout(),
                receipt_poll: settings.receipt_poll_interval(),
                dry_run,
            },
        );
        let approvals = AllowanceManager::new(client.clone(), permit2_for(&registry));

        let aggregators = if settings.aggregators_enabled {
            aggregators
        } else {
            Vec::new()
        };
        let aggregator_names: Vec<String> = aggregators.iter().map(|a| a.name().to_string()).collect();

        let coordinator = SwapCoordinator::new(
            client.clone(),
            aggregators,
            discovery,
            quoter,
            submitter,
            approvals,
            audit,
            CoordinatorConfig {
                chain_id: settings.chain_id,
                max_retries: settings.max_retries_value(),
                retry_delay: settings.retry_delay(),
                retry_max_delay: settings.retry_max_delay(),
                gas_budget_units: settings.default_gas_limit,
                allow_estimated_quotes: settings.allow_estimated_quotes,
            },
        );

        tracing::info!(
            target: "engine",
            chain_id = settings.chain_id,
            venues = registry.len(),
            aggregators = ?aggregator_names,
            probe_mode = ?mode,
            dry_run,
            "Swap engine ready"
        );

        Ok(Self {
            client,
            registry,
            coordinator,
            aggregator_names,
            chain_id: settings.chain_id,
            slippage_bps: settings.slippage_bps_value(),
            deadline_secs: settings.deadline_secs,
        })
    }

    pub fn signer(&self) -> Address {
        self.coordinator.submitter().sender()
    }

    pub fn registry(&self) -> &VenueRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        self.coordinator.audit()
    }

    /// Buy `token` with native currency at the configured slippage and deadline.
    pub fn buy_request(&self, token: Address, native_amount: U256) -> SwapRequest {
        SwapRequest::buy(token, native_amount, self.slippage_bps, self.deadline_secs)
    }

    pub fn sell_request(&self, token: Address, token_amount: U256) -> SwapRequest {
        SwapRequest::sell(token, token_amount, self.slippage_bps, self.deadline_secs)
    }

    pub async fn execute(&self, request: &SwapRequest) -> SwapOutcome {
        self.execute_with_cancel(request, &CancellationToken::new()).await
    }

    /// Cancelling stops retries and confirmation waits; a transaction already
    /// broadcast is reported as timed out with its hash.
    pub async fn execute_with_cancel(
        &self,
        request: &SwapRequest,
        cancel: &CancellationToken,
    ) -> SwapOutcome {
        tracing::info!(
            target: "engine",
            direction = ?request.direction,
            token_in = %request.token_in,
            token_out = %request.token_out,
            amount_in = %request.amount_in,
            slippage_bps = request.slippage_bps,
            "Executing swap"
        );
        let outcome = self.coordinator.execute(request, cancel).await;
        match &outcome.failure {
            None => tracing::info!(
                target: "engine",
                source = ?outcome.source,
                tx_hash = ?outcome.tx_hash,
                gas_used = ?outcome.gas_used,
                attempts = outcome.attempts,
                dry_run = outcome.dry_run,
                "Swap confirmed"
            ),
            Some(f) => tracing::warn!(
                target: "engine",
                kind = %f.kind,
                ambiguous = f.is_ambiguous(),
                tx_hash = ?f.tx_hash,
                attempts = outcome.attempts,
                reason = %f.reason,
                "Swap failed"
            ),
        }
        outcome
    }

    pub async fn token_decimals(&self, token: Address) -> Result<u8, AppError> {
        view(self.client.as_ref(), token, &abi::IERC20::decimalsCall {}).await
    }

    pub async fn quote(&self, request: &SwapRequest) -> Result<(RouteSource, Quote), SwapFailure> {
        self.coordinator.quote_only(request).await
    }

    /// RPC reachable, on the configured chain, signer balance readable.
    pub async fn health_check(&self) -> Result<HealthReport, AppError> {
        let chain_id = self.client.chain_id().await?;
        if chain_id != self.chain_id {
            return Err(AppError::Config(format!(
                "RPC reports chain {chain_id}, configured for {}",
                self.chain_id
            )));
        }
        let signer = self.signer();
        let native_balance = self.client.balance(signer).await?;
        Ok(HealthReport {
            chain_id,
            signer,
            native_balance,
            venues: self
                .registry
                .in_priority_order()
                .into_iter()
                .map(|v| v.name.clone())
                .collect(),
            aggregators: self.aggregator_names.clone(),
            dry_run: self.coordinator.submitter().is_dry_run(),
        })
    }
}

fn build_aggregators(settings: &EngineSettings) -> Result<Vec<Arc<dyn QuoteAggregator>>, AppError> {
    let mut out: Vec<Arc<dyn QuoteAggregator>> = Vec::new();
    if !settings.aggregators_enabled {
        return Ok(out);
    }
    let timeout = settings.aggregator_timeout();
    match settings.zerox_api_key_value() {
        Some(key) => out.push(Arc::new(ZeroXClient::new(
            &settings.zerox_base_url,
            Some(key),
            timeout,
        )?)),
        None => tracing::info!(target: "engine", "0x disabled: no API key"),
    }
    match settings.oneinch_api_key_value() {
        Some(key) => out.push(Arc::new(OneInchClient::new(
            &settings.oneinch_base_url,
            Some(key),
            timeout,
        )?)),
        None => tracing::info!(target: "engine", "1inch disabled: no API key"),
    }
    Ok(out)
}

fn permit2_for(registry: &VenueRegistry) -> Address {
    registry
        .in_priority_order()
        .into_iter()
        .find_map(|v| match &v.scheme {
            AddressingScheme::SingletonManager { permit2, .. } => Some(*permit2),
            _ => None,
        })
        .unwrap_or(PERMIT2)
}
