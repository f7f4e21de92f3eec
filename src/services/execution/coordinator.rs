// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::retry::backoff_delay;
use crate::common::time_utils::deadline_from_now;
use crate::domain::error::AppError;
use crate::domain::types::{
    EncodedSwap, FailureKind, Quote, RouteSource, SwapFailure, SwapOutcome, SwapRequest,
    VenueCandidate, base_unit_ratio,
};
use crate::infrastructure::data::abi;
use crate::infrastructure::network::node::{ChainClient, view};
use crate::services::execution::approvals::AllowanceManager;
use crate::services::execution::audit::{AttemptState, AuditEntry, AuditLog};
use crate::services::execution::submitter::{Submitted, TransactionSubmitter, TxIntent};
use crate::services::routing::aggregator::{AggregatorRequest, QuoteAggregator};
use crate::services::routing::discovery::VenueDiscovery;
use crate::services::routing::encoder::{EncodeContext, encode_aggregator_swap, encode_venue_swap};
use crate::services::routing::quote::{VenueQuoter, fallback_estimate};
use alloy::primitives::U256;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub chain_id: u64,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_max_delay: Duration,
    /// Gas units budgeted on top of a native-input amount in the balance check.
    pub gas_budget_units: u64,
    pub allow_estimated_quotes: bool,
}

/// One link of the fallback chain.
#[derive(Clone)]
enum Source {
    Aggregator(Arc<dyn QuoteAggregator>),
    Venue,
}

impl Source {
    fn route(&self, venue: Option<&str>) -> RouteSource {
        match self {
            Source::Aggregator(agg) => RouteSource::Aggregator(agg.name().to_string()),
            Source::Venue => RouteSource::Venue(venue.unwrap_or("direct").to_string()),
        }
    }
}

/// What a single attempt produced, for the audit log and the retry decision.
struct AttemptReport {
    state: AttemptState,
    route: RouteSource,
    quote: Option<Quote>,
    min_out: Option<U256>,
    result: Result<Submitted, SwapFailure>,
}

/// How a source's attempt loop ended.
enum SourceEnd {
    Confirmed(SwapOutcome),
    /// Source could not quote or route; move on without counting it as a failure.
    Declined(SwapFailure),
    /// Source tried and failed; move on, but remember why.
    Exhausted(SwapFailure),
    /// Stop the whole chain.
    Stop(SwapFailure),
}

/// Ordered fallback chain (aggregators, then direct venue routing) with a
/// bounded re-quote/re-sign retry loop per source.
pub struct SwapCoordinator {
    client: Arc<dyn ChainClient>,
    aggregators: Vec<Arc<dyn QuoteAggregator>>,
    discovery: VenueDiscovery,
    quoter: VenueQuoter,
    submitter: TransactionSubmitter,
    approvals: AllowanceManager,
    audit: Arc<AuditLog>,
    cfg: CoordinatorConfig,
}

impl SwapCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn ChainClient>,
        aggregators: Vec<Arc<dyn QuoteAggregator>>,
        discovery: VenueDiscovery,
        quoter: VenueQuoter,
        submitter: TransactionSubmitter,
        approvals: AllowanceManager,
        audit: Arc<AuditLog>,
        cfg: CoordinatorConfig,
    ) -> Self {
        Self {
            client,
            aggregators,
            discovery,
            quoter,
            submitter,
            approvals,
            audit,
            cfg,
        }
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn submitter(&self) -> &TransactionSubmitter {
        &self.submitter
    }

    fn sources(&self) -> Vec<Source> {
        self.aggregators
            .iter()
            .cloned()
            .map(Source::Aggregator)
            .chain(std::iter::once(Source::Venue))
            .collect()
    }

    pub async fn execute(&self, request: &SwapRequest, cancel: &CancellationToken) -> SwapOutcome {
        if let Err(reason) = request.validate(self.discovery.registry().wrapped_native()) {
            let failure = SwapFailure::new(FailureKind::InvalidRequest, None, reason);
            self.record_rejection(&failure);
            return SwapOutcome::failed(failure, 0);
        }
        if let Err(failure) = self.check_balance(request).await {
            self.record_rejection(&failure);
            return SwapOutcome::failed(failure, 0);
        }

        let mut attempts = 0u32;
        let mut last_real: Option<SwapFailure> = None;
        let mut last_decline: Option<SwapFailure> = None;

        for source in self.sources() {
            match self.run_source(&source, request, cancel, &mut attempts).await {
                SourceEnd::Confirmed(mut outcome) => {
                    outcome.attempts = attempts;
                    return outcome;
                }
                SourceEnd::Declined(failure) => {
                    tracing::info!(target: "coordinator", route = ?failure.route, reason = %failure.reason, "Source declined, falling back");
                    last_decline = Some(failure);
                }
                SourceEnd::Exhausted(failure) => {
                    tracing::warn!(target: "coordinator", route = ?failure.route, kind = %failure.kind, "Source exhausted, falling back");
                    last_real = Some(failure);
                }
                SourceEnd::Stop(failure) => return SwapOutcome::failed(failure, attempts),
            }
        }

        let failure = match last_real {
            Some(f) => f,
            None => {
                let reason = last_decline
                    .map(|f| format!("every source declined; last: {f}"))
                    .unwrap_or_else(|| "no sources configured".to_string());
                SwapFailure::new(FailureKind::NoRouteFound, None, reason)
            }
        };
        SwapOutcome::failed(failure, attempts)
    }

    /// Best quote without sending anything, walking the same fallback chain.
    pub async fn quote_only(&self, request: &SwapRequest) -> Result<(RouteSource, Quote), SwapFailure> {
        if let Err(reason) = request.validate(self.discovery.registry().wrapped_native()) {
            return Err(SwapFailure::new(FailureKind::InvalidRequest, None, reason));
        }
        let mut last = None;
        for source in self.sources() {
            match self.quote_source(&source, request).await {
                Ok((route, quote, _)) => return Ok((route, quote)),
                Err(f) => last = Some(f),
            }
        }
        let reason = last.map(|f| f.to_string()).unwrap_or_default();
        Err(SwapFailure::new(FailureKind::NoRouteFound, None, reason))
    }

    async fn run_source(
        &self,
        source: &Source,
        request: &SwapRequest,
        cancel: &CancellationToken,
        attempts: &mut u32,
    ) -> SourceEnd {
        let max = self.cfg.max_retries.max(1);
        for attempt in 1..=max {
            *attempts += 1;
            let started = Instant::now();
            let report = self.attempt(source, request, cancel).await;
            self.record_attempt(&report, attempt, started.elapsed());

            let failure = match report.result {
                Ok(done) => {
                    let expected = report.quote.as_ref().map(|q| q.expected_out);
                    return SourceEnd::Confirmed(SwapOutcome {
                        success: true,
                        tx_hash: done.tx_hash,
                        gas_used: done.gas_used,
                        effective_price: expected
                            .and_then(|out| base_unit_ratio(out, request.amount_in)),
                        expected_out: expected,
                        min_out: report.min_out,
                        source: Some(report.route),
                        low_confidence: report.quote.as_ref().is_some_and(|q| q.low_confidence),
                        failure: None,
                        attempts: *attempts,
                        dry_run: done.dry_run,
                    });
                }
                Err(f) => f,
            };

            match failure.kind {
                FailureKind::Unavailable | FailureKind::NoRouteFound => {
                    return SourceEnd::Declined(failure);
                }
                kind if kind.is_terminal() => return SourceEnd::Stop(failure),
                FailureKind::InsufficientAllowance => return SourceEnd::Exhausted(failure),
                kind if kind.is_retryable() => {
                    if cancel.is_cancelled() {
                        return SourceEnd::Stop(failure);
                    }
                    if attempt == max {
                        // A timed-out transaction may still land; never hand the
                        // same intent to another source.
                        return if kind == FailureKind::TimedOut {
                            SourceEnd::Stop(failure)
                        } else {
                            SourceEnd::Exhausted(failure)
                        };
                    }
                    let delay = backoff_delay(
                        self.cfg.retry_delay,
                        attempt as usize,
                        Some(self.cfg.retry_max_delay),
                    );
                    tracing::info!(
                        target: "coordinator",
                        route = %failure.route.as_ref().map(ToString::to_string).unwrap_or_default(),
                        attempt,
                        max,
                        kind = %kind,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying with a fresh quote"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return SourceEnd::Stop(failure),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                _ => return SourceEnd::Exhausted(failure),
            }
        }
        SourceEnd::Exhausted(SwapFailure::new(
            FailureKind::Reverted,
            Some(source.route(None)),
            "retry budget exhausted",
        ))
    }

    /// Quote from one source. Returns the route label to attribute and, for
    /// venue routing, the encoded swap.
    async fn quote_source(
        &self,
        source: &Source,
        request: &SwapRequest,
    ) -> Result<(RouteSource, Quote, Option<VenueCandidate>), SwapFailure> {
        match source {
            Source::Aggregator(agg) => {
                let route = source.route(None);
                let agg_request = AggregatorRequest {
                    chain_id: self.cfg.chain_id,
                    sell_token: request.token_in,
                    buy_token: request.token_out,
                    sell_amount: request.amount_in,
                    slippage_bps: request.slippage_bps,
                    taker: self.submitter.sender(),
                };
                match agg.quote(&agg_request).await {
                    Ok(quote) => Ok((route, quote, None)),
                    Err(e) => Err(SwapFailure::new(
                        FailureKind::Unavailable,
                        Some(route),
                        e.to_string(),
                    )),
                }
            }
            Source::Venue => {
                let candidate = self
                    .discovery
                    .discover(request.token_in, request.token_out)
                    .await
                    .map_err(|e| {
                        SwapFailure::new(
                            FailureKind::NoRouteFound,
                            Some(source.route(None)),
                            e.to_string(),
                        )
                    })?;
                let route = source.route(Some(&candidate.venue));
                let quote = match self.quoter.quote(&candidate, request).await {
                    Ok(q) => q,
                    Err(e) if self.cfg.allow_estimated_quotes => {
                        let wrapped = self.discovery.registry().wrapped_native();
                        match fallback_estimate(&candidate, request, wrapped) {
                            Some(q) => {
                                tracing::warn!(target: "coordinator", venue = %candidate.venue, error = %e, expected_out = %q.expected_out, "On-chain quote failed, using low-confidence estimate");
                                q
                            }
                            None => {
                                return Err(SwapFailure::new(
                                    FailureKind::Unavailable,
                                    Some(route),
                                    format!("quote failed and no spot price to estimate from: {e}"),
                                ));
                            }
                        }
                    }
                    Err(e) => {
                        return Err(SwapFailure::new(
                            FailureKind::Unavailable,
                            Some(route),
                            format!("quote failed: {e}"),
                        ));
                    }
                };
                Ok((route, quote, Some(candidate)))
            }
        }
    }

    async fn attempt(
        &self,
        source: &Source,
        request: &SwapRequest,
        cancel: &CancellationToken,
    ) -> AttemptReport {
        let mut report = AttemptReport {
            state: AttemptState::Quoting,
            route: source.route(None),
            quote: None,
            min_out: None,
            result: Err(SwapFailure::new(FailureKind::Unavailable, Some(source.route(None)), "not started")),
        };

        let (route, quote, candidate) = match self.quote_source(source, request).await {
            Ok(q) => q,
            Err(f) => {
                if let Some(r) = f.route.clone() {
                    report.route = r;
                }
                report.result = Err(f);
                return report;
            }
        };
        report.route = route.clone();
        report.quote = Some(quote.clone());

        report.state = AttemptState::Encoding;
        let encoded: Result<EncodedSwap, AppError> = match &candidate {
            Some(candidate) => {
                let ctx = EncodeContext {
                    registry: self.discovery.registry(),
                    recipient: self.submitter.sender(),
                    deadline: deadline_from_now(request.deadline_secs),
                };
                encode_venue_swap(&ctx, candidate, request, &quote)
            }
            None => encode_aggregator_swap(request, &quote),
        };
        let encoded = match encoded {
            Ok(e) => e,
            Err(e) => {
                report.result = Err(SwapFailure::new(
                    FailureKind::Unavailable,
                    Some(route),
                    e.to_string(),
                ));
                return report;
            }
        };
        report.min_out = Some(encoded.min_out);

        if let Some(req) = &encoded.allowance
            && let Err(f) = self
                .approvals
                .ensure(&self.submitter, &self.audit, req, &route, cancel)
                .await
        {
            report.result = Err(f);
            return report;
        }

        report.state = AttemptState::Signing;
        let intent = TxIntent {
            to: encoded.target,
            value: encoded.value,
            data: encoded.calldata.clone(),
            gas_hint: quote.tx.as_ref().and_then(|t| t.gas),
        };
        report.result = match self.submitter.submit(&intent, cancel).await {
            Ok(done) => {
                report.state = AttemptState::Confirmed;
                Ok(done)
            }
            Err(e) => {
                report.state = e.state;
                let mut f = SwapFailure::new(e.kind, Some(route), e.reason);
                f.tx_hash = e.tx_hash;
                Err(f)
            }
        };
        report
    }

    /// Native input must cover amount plus a gas budget; ERC-20 input must
    /// cover the amount. RPC trouble here is logged and the swap proceeds.
    async fn check_balance(&self, request: &SwapRequest) -> Result<(), SwapFailure> {
        let owner = self.submitter.sender();
        let client = self.client.as_ref();
        let (available, required) = if request.is_native_in() {
            let gas_cost = match self.submitter.gas_oracle().suggest().await {
                Ok(fees) => U256::from(fees.max_per_gas())
                    .saturating_mul(U256::from(self.cfg.gas_budget_units)),
                Err(e) => {
                    tracing::warn!(target: "coordinator", error = %e, "Fee data unavailable for balance check");
                    U256::ZERO
                }
            };
            let balance = match client.balance(owner).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(target: "coordinator", error = %e, "Balance check skipped");
                    return Ok(());
                }
            };
            (balance, request.amount_in.saturating_add(gas_cost))
        } else {
            match view(client, request.token_in, &abi::IERC20::balanceOfCall { owner }).await {
                Ok(b) => (b, request.amount_in),
                Err(e) => {
                    tracing::warn!(target: "coordinator", token = %request.token_in, error = %e, "Token balance check skipped");
                    return Ok(());
                }
            }
        };
        if available < required {
            return Err(SwapFailure::new(
                FailureKind::InsufficientBalance,
                None,
                AppError::InsufficientFunds {
                    required: required.to_string(),
                    available: available.to_string(),
                }
                .to_string(),
            ));
        }
        Ok(())
    }

    fn record_rejection(&self, failure: &SwapFailure) {
        self.audit.append(AuditEntry {
            operation: "swap",
            source: failure.route.clone(),
            attempt: 0,
            state: Some(AttemptState::Idle),
            failure: Some(failure.kind),
            error: Some(failure.reason.clone()),
            dry_run: self.submitter.is_dry_run(),
            ..Default::default()
        });
    }

    fn record_attempt(&self, report: &AttemptReport, attempt: u32, elapsed: Duration) {
        let (failure, error, tx_hash, gas_used, block_number, dry_run) = match &report.result {
            Ok(done) => (None, None, done.tx_hash, done.gas_used, done.block_number, done.dry_run),
            Err(f) => (
                Some(f.kind),
                Some(f.reason.clone()),
                f.tx_hash,
                None,
                None,
                self.submitter.is_dry_run(),
            ),
        };
        self.audit.append(AuditEntry {
            operation: "swap",
            source: Some(report.route.clone()),
            attempt,
            state: Some(report.state),
            failure,
            error,
            tx_hash,
            gas_used,
            block_number,
            duration_ms: elapsed.as_millis() as u64,
            expected_out: report.quote.as_ref().map(|q| q.expected_out),
            min_out: report.min_out,
            low_confidence: report.quote.as_ref().is_some_and(|q| q.low_confidence),
            dry_run,
        });
    }
}
