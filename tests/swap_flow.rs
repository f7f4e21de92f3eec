// SPDX-License-Identifier: MIT
// End-to-end engine runs against a scripted chain: fallback ordering, the
// retry bound, nonce handling and the audit trail.

mod common;

use alloy::primitives::{Address, U256};
use alloy_sol_types::SolCall;
use common::{
    CannedAggregator, MockChain, ONE_ETH, ReceiptMode, RecordingSigner, address_word, engine,
    fast_settings, word, words,
};
use oxidity_swapper::domain::constants::VENUES_BASE;
use oxidity_swapper::domain::types::{FailureKind, RouteSource, SwapRequest};
use oxidity_swapper::infrastructure::data::abi;
use oxidity_swapper::services::execution::audit::AttemptState;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TOKEN: Address = Address::new([0x7a; 20]);
const V3_POOL: Address = Address::new([0x33; 20]);
const AGG_ROUTER: Address = Address::new([0xa9; 20]);

fn venue(key: &str) -> Address {
    VENUES_BASE[key]
}

/// A liquid Uniswap V3 pool for every fee tier, quoting `amount_out`.
fn script_v3_pool(chain: &MockChain, amount_out: Option<u64>) {
    chain.answer(
        venue("uniswap_v3_factory"),
        abi::IV3Factory::getPoolCall::SELECTOR,
        address_word(V3_POOL),
    );
    chain.deploy(V3_POOL);
    chain.answer(
        V3_POOL,
        abi::IV3Pool::liquidityCall::SELECTOR,
        word(U256::from(5_000_000_000_000_000_000u128)),
    );
    if let Some(out) = amount_out {
        chain.answer(
            venue("uniswap_v3_quoter_v2"),
            abi::IQuoterV2::quoteExactInputSingleCall::SELECTOR,
            words(&[U256::from(out), U256::ZERO, U256::ZERO, U256::from(90_000u64)]),
        );
    }
}

fn buy_request() -> SwapRequest {
    SwapRequest::buy(TOKEN, U256::from(2_000_000_000_000_000u64), 200, 300)
}

#[tokio::test]
async fn falls_back_to_second_aggregator_and_confirms() {
    let chain = MockChain::new();
    let signer = RecordingSigner::new();
    let primary = CannedAggregator::empty("primary");
    let secondary = CannedAggregator::routing("secondary", 1_000_000, AGG_ROUTER);
    let engine = engine(
        &fast_settings(),
        &chain,
        &signer,
        vec![primary.clone(), secondary.clone()],
    );

    let outcome = engine.execute(&buy_request()).await;

    assert!(outcome.success, "unexpected failure: {:?}", outcome.failure);
    assert_eq!(outcome.min_out, Some(U256::from(980_000u64)));
    assert_eq!(outcome.expected_out, Some(U256::from(1_000_000u64)));
    assert_eq!(
        outcome.source,
        Some(RouteSource::Aggregator("secondary".into()))
    );
    assert_eq!(outcome.gas_used, Some(120_000));
    assert!(outcome.tx_hash.is_some());
    assert_eq!(outcome.attempts, 2);
    assert_eq!(primary.call_count(), 1);
    assert_eq!(chain.sent_count(), 1);

    let records = engine.audit().records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source.as_deref(), Some("aggregator:primary"));
    assert_eq!(records[0].failure, Some(FailureKind::Unavailable));
    assert_eq!(records[0].state, AttemptState::Quoting);
    assert!(!records[0].success);
    assert_eq!(records[1].source.as_deref(), Some("aggregator:secondary"));
    assert_eq!(records[1].state, AttemptState::Confirmed);
    assert!(records[1].success);
    assert_eq!(records[1].min_out, Some(U256::from(980_000u64)));
}

#[tokio::test]
async fn reverting_venue_is_tried_exactly_max_retries_times() {
    let chain = MockChain::new();
    script_v3_pool(&chain, Some(1_000_000));
    chain.set_receipt(ReceiptMode::Revert);
    let signer = RecordingSigner::new();
    let engine = engine(&fast_settings(), &chain, &signer, Vec::new());

    let outcome = engine.execute(&buy_request()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Reverted));
    assert_eq!(outcome.attempts, 3);
    assert_eq!(chain.sent_count(), 3);
    assert_eq!(signer.nonces(), vec![0, 1, 2]);

    let records = engine.audit().records();
    assert_eq!(records.len(), 3);
    for (idx, r) in records.iter().enumerate() {
        assert_eq!(r.attempt, idx as u32 + 1);
        assert_eq!(r.state, AttemptState::Reverted);
        assert_eq!(r.source.as_deref(), Some("venue:uniswap_v3"));
        assert!(r.tx_hash.is_some());
    }
}

#[tokio::test]
async fn venue_route_confirms_through_swap_router() {
    let chain = MockChain::new();
    script_v3_pool(&chain, Some(4_000_000));
    let signer = RecordingSigner::new();
    let engine = engine(&fast_settings(), &chain, &signer, Vec::new());

    let outcome = engine.execute(&buy_request()).await;

    assert!(outcome.success, "unexpected failure: {:?}", outcome.failure);
    assert_eq!(outcome.source, Some(RouteSource::Venue("uniswap_v3".into())));
    assert_eq!(outcome.min_out, Some(U256::from(3_920_000u64)));
    assert_eq!(outcome.effective_price, Some(4_000_000f64 / 2_000_000_000_000_000f64));
}

#[tokio::test]
async fn no_liquidity_anywhere_is_no_route_found() {
    let chain = MockChain::new();
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::empty("primary");
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg.clone()]);

    let outcome = engine.execute(&buy_request()).await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::NoRouteFound));
    assert_eq!(chain.sent_count(), 0);
    assert_eq!(agg.call_count(), 1);
    assert_eq!(engine.audit().len(), 2);
}

#[tokio::test]
async fn shortfall_is_terminal_before_any_quote() {
    let chain = MockChain::new();
    chain.set_balance(U256::from(1_000u64));
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg.clone()]);

    let outcome = engine.execute(&buy_request()).await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::InsufficientBalance));
    assert_eq!(agg.call_count(), 0);
    assert_eq!(chain.sent_count(), 0);
    let records = engine.audit().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state, AttemptState::Idle);
}

#[tokio::test]
async fn invalid_request_is_rejected_up_front() {
    let chain = MockChain::new();
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg.clone()]);

    let zero = SwapRequest::buy(TOKEN, U256::ZERO, 200, 300);
    let outcome = engine.execute(&zero).await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidRequest));
    assert_eq!(outcome.attempts, 0);
    assert_eq!(agg.call_count(), 0);
}

#[tokio::test]
async fn timeout_is_ambiguous_and_does_not_fall_through() {
    let chain = MockChain::new();
    chain.set_receipt(ReceiptMode::Pending);
    script_v3_pool(&chain, Some(1_000_000));
    let signer = RecordingSigner::new();
    let first = CannedAggregator::routing("first", 1_000_000, AGG_ROUTER);
    let second = CannedAggregator::routing("second", 1_000_000, AGG_ROUTER);
    let mut settings = fast_settings();
    settings.max_retries = 2;
    let engine = engine(&settings, &chain, &signer, vec![first.clone(), second.clone()]);

    let outcome = engine.execute(&buy_request()).await;

    let failure = outcome.failure.expect("failure");
    assert_eq!(failure.kind, FailureKind::TimedOut);
    assert!(failure.is_ambiguous());
    assert!(failure.tx_hash.is_some());
    assert_eq!(first.call_count(), 2);
    assert_eq!(second.call_count(), 0);
    assert!(!chain.called(venue("uniswap_v3_factory")));
    // Every resend used a fresh nonce.
    assert_eq!(signer.nonces(), vec![0, 1]);
}

#[tokio::test]
async fn dry_run_signs_but_never_broadcasts() {
    let chain = MockChain::new();
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let mut settings = fast_settings();
    settings.dry_run = true;
    let engine = engine(&settings, &chain, &signer, vec![agg]);

    let outcome = engine.execute(&buy_request()).await;

    assert!(outcome.success);
    assert!(outcome.dry_run);
    assert_eq!(outcome.tx_hash, None);
    assert_eq!(chain.sent_count(), 0);
    assert_eq!(signer.nonces(), vec![0]);
    assert!(engine.audit().records()[0].dry_run);
}

#[tokio::test]
async fn estimated_quotes_are_opt_in() {
    let chain = MockChain::new();
    script_v3_pool(&chain, None);
    let signer = RecordingSigner::new();
    let strict = engine(&fast_settings(), &chain, &signer, Vec::new());
    let outcome = strict.execute(&buy_request()).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::NoRouteFound));
    assert_eq!(chain.sent_count(), 0);

    let mut settings = fast_settings();
    settings.allow_estimated_quotes = true;
    let lenient = engine(&settings, &chain, &signer, Vec::new());
    let outcome = lenient.execute(&buy_request()).await;
    // Without a spot price there is nothing to estimate from.
    assert_eq!(outcome.failure_kind(), Some(FailureKind::NoRouteFound));

    // sqrtPriceX96 = 2 * 2^96: four token units per wei of WETH.
    chain.answer(
        V3_POOL,
        abi::IV3Pool::slot0Call::SELECTOR,
        words(&[
            U256::from(2u8) << 96,
            U256::ZERO,
            U256::ZERO,
            U256::from(1u8),
            U256::from(1u8),
            U256::ZERO,
            U256::from(1u8),
        ]),
    );
    let lenient = engine(&settings, &chain, &signer, Vec::new());
    let outcome = lenient.execute(&buy_request()).await;
    assert!(outcome.success, "unexpected failure: {:?}", outcome.failure);
    assert!(outcome.low_confidence);
    // 8e15 at spot, less the 0.01% tier fee, less 5%, then 2% slippage.
    assert_eq!(
        outcome.expected_out,
        Some(U256::from(7_599_240_000_000_000u64))
    );
    assert_eq!(outcome.min_out, Some(U256::from(7_447_255_200_000_000u64)));
    let records = lenient.audit().records();
    let confirmed = records.last().expect("record");
    assert_eq!(confirmed.state, AttemptState::Confirmed);
    assert!(confirmed.low_confidence);
}

#[tokio::test]
async fn quoted_routes_are_not_flagged_low_confidence() {
    let chain = MockChain::new();
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg]);

    let outcome = engine.execute(&buy_request()).await;

    assert!(outcome.success);
    assert!(!outcome.low_confidence);
    assert!(!engine.audit().records()[0].low_confidence);
}

#[tokio::test]
async fn buying_the_wrapped_native_token_is_rejected() {
    let chain = MockChain::new();
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg.clone()]);

    let weth = engine.registry().wrapped_native();
    let outcome = engine
        .execute(&SwapRequest::buy(weth, U256::from(ONE_ETH), 200, 300))
        .await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidRequest));
    assert_eq!(agg.call_count(), 0);
    assert_eq!(chain.sent_count(), 0);
}

#[tokio::test]
async fn hung_receipt_lookup_still_times_out() {
    let chain = MockChain::new();
    chain.set_receipt(ReceiptMode::Hang);
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let mut settings = fast_settings();
    settings.max_retries = 1;
    let engine = engine(&settings, &chain, &signer, vec![agg]);

    let outcome = tokio::time::timeout(Duration::from_secs(5), engine.execute(&buy_request()))
        .await
        .expect("confirmation wait is bounded by the receipt timeout");

    let failure = outcome.failure.expect("failure");
    assert_eq!(failure.kind, FailureKind::TimedOut);
    assert!(failure.tx_hash.is_some());
    assert_eq!(chain.sent_count(), 1);
}

#[tokio::test]
async fn cancel_interrupts_a_hung_receipt_lookup() {
    let chain = MockChain::new();
    chain.set_receipt(ReceiptMode::Hang);
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let mut settings = fast_settings();
    settings.receipt_timeout_ms = 600_000;
    let engine = engine(&settings, &chain, &signer, vec![agg.clone()]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        engine.execute_with_cancel(&buy_request(), &cancel),
    )
    .await
    .expect("cancel ends the confirmation wait");

    assert_eq!(outcome.failure_kind(), Some(FailureKind::TimedOut));
    assert_eq!(agg.call_count(), 1);
    assert_eq!(chain.sent_count(), 1);
}

#[tokio::test]
async fn successive_swaps_never_reuse_nonces() {
    let chain = MockChain::new();
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg]);

    for _ in 0..3 {
        assert!(engine.execute(&buy_request()).await.success);
    }
    assert_eq!(signer.nonces(), vec![0, 1, 2]);
}

#[tokio::test]
async fn token_input_is_approved_before_the_swap() {
    let chain = MockChain::new();
    chain.answer(TOKEN, abi::IERC20::balanceOfCall::SELECTOR, word(U256::from(ONE_ETH)));
    chain.answer(TOKEN, abi::IERC20::allowanceCall::SELECTOR, word(U256::ZERO));
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg]);

    let sell = SwapRequest::sell(TOKEN, U256::from(5_000_000u64), 100, 300);
    let outcome = engine.execute(&sell).await;

    assert!(outcome.success, "unexpected failure: {:?}", outcome.failure);
    assert_eq!(chain.sent_count(), 2);
    let ops: Vec<String> = engine
        .audit()
        .records()
        .into_iter()
        .map(|r| r.operation)
        .collect();
    assert_eq!(ops, vec!["approve", "swap"]);
}

#[tokio::test]
async fn simulated_revert_skips_broadcast_and_retries() {
    let chain = MockChain::new();
    chain.estimate_reverts.store(true, Ordering::SeqCst);
    let signer = RecordingSigner::new();
    let agg = CannedAggregator::routing("primary", 1_000_000, AGG_ROUTER);
    let engine = engine(&fast_settings(), &chain, &signer, vec![agg.clone()]);

    let outcome = engine.execute(&buy_request()).await;

    // The router's slippage revert means the quote was stale.
    assert_eq!(outcome.failure_kind(), Some(FailureKind::QuoteStale));
    assert_eq!(chain.sent_count(), 0);
    assert!(signer.nonces().is_empty());
    // Three aggregator attempts, then the venue chain finds nothing to route.
    assert_eq!(agg.call_count(), 3);
}
