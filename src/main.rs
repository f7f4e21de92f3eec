// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::Address;
use clap::{Parser, Subcommand, ValueEnum};
use oxidity_swapper::SwapEngine;
use oxidity_swapper::app::config::EngineSettings;
use oxidity_swapper::app::logging::setup_logging;
use oxidity_swapper::common::parsing::{format_units, parse_units, validate_address};
use oxidity_swapper::domain::error::AppError;
use oxidity_swapper::domain::types::SwapRequest;
use oxidity_swapper::services::routing::pool_id::PoolIdResolver;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "oxidity swapper")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Sign but never broadcast
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Slippage tolerance in basis points (overrides config/env)
    #[arg(long)]
    slippage_bps: Option<u32>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Side {
    /// Spend native currency, receive the token
    Buy,
    /// Spend the token, receive native currency
    Sell,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Best available quote without sending anything
    Quote {
        side: Side,
        token: String,
        /// Human-readable amount of the input asset
        amount: String,
        /// Input token decimals; read from the token when omitted
        #[arg(long)]
        decimals: Option<u8>,
    },
    /// Execute a swap through the fallback chain
    Swap {
        side: Side,
        token: String,
        amount: String,
        #[arg(long)]
        decimals: Option<u8>,
    },
    /// Derive a singleton-manager pool id offline
    PoolId {
        token_a: String,
        token_b: String,
        #[arg(long, default_value_t = 3000)]
        fee: u32,
        #[arg(long)]
        hooks: Option<String>,
    },
    /// Check RPC, chain id and signer balance
    Health,
}

async fn build_request(
    engine: &SwapEngine,
    side: Side,
    token: &str,
    amount: &str,
    decimals: Option<u8>,
) -> Result<SwapRequest, AppError> {
    let token = validate_address(token)?;
    let decimals = match (side, decimals) {
        (_, Some(d)) => d,
        (Side::Buy, None) => 18,
        (Side::Sell, None) => engine.token_decimals(token).await?,
    };
    let amount_in = parse_units(amount, decimals).ok_or_else(|| AppError::Validation {
        field: "amount".into(),
        message: format!("'{amount}' is not a valid amount with {decimals} decimals"),
    })?;
    Ok(match side {
        Side::Buy => engine.buy_request(token, amount_in),
        Side::Sell => engine.sell_request(token, amount_in),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Encoding(format!("json: {e}")))?;
    println!("{body}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    if let Command::PoolId {
        token_a,
        token_b,
        fee,
        hooks,
    } = &cli.command
    {
        let hooks = match hooks {
            Some(raw) => validate_address(raw)?,
            None => Address::ZERO,
        };
        let id = PoolIdResolver::resolve_str(token_a, token_b, *fee, hooks)?;
        println!("{id}");
        return Ok(());
    }

    let mut settings = EngineSettings::load_with_path(cli.config.as_deref())?;
    setup_logging(if settings.debug { "debug" } else { "info" }, cli.json || settings.log_json);

    if cli.dry_run {
        settings.dry_run = true;
    }
    if let Some(bps) = cli.slippage_bps {
        settings.slippage_bps = bps;
        settings.validate()?;
    }

    let engine = SwapEngine::from_settings(&settings)?;

    match cli.command {
        Command::Health => {
            let report = engine.health_check().await?;
            tracing::info!(
                target: "engine",
                chain_id = report.chain_id,
                signer = %report.signer,
                balance = %format_units(report.native_balance, 18),
                "Health check passed"
            );
            print_json(&report)?;
        }
        Command::Quote {
            side,
            token,
            amount,
            decimals,
        } => {
            let request = build_request(&engine, side, &token, &amount, decimals).await?;
            match engine.quote(&request).await {
                Ok((source, quote)) => print_json(&serde_json::json!({
                    "source": source.to_string(),
                    "expected_out": quote.expected_out.to_string(),
                    "quote_source": format!("{:?}", quote.source),
                    "low_confidence": quote.low_confidence,
                }))?,
                Err(failure) => {
                    print_json(&failure)?;
                    std::process::exit(2);
                }
            }
        }
        Command::Swap {
            side,
            token,
            amount,
            decimals,
        } => {
            let request = build_request(&engine, side, &token, &amount, decimals).await?;
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!(target: "engine", "Interrupt received, stopping after the current step");
                    on_signal.cancel();
                }
            });

            let outcome = engine.execute_with_cancel(&request, &cancel).await;
            print_json(&outcome)?;
            let summary = engine.audit().summary();
            tracing::info!(target: "audit", ?summary, records = engine.audit().len(), "Audit summary");
            if !outcome.success {
                std::process::exit(if outcome.failure.as_ref().is_some_and(|f| f.is_ambiguous()) {
                    3
                } else {
                    1
                });
            }
        }
        // Answered before settings load.
        Command::PoolId { .. } => {}
    }
    Ok(())
}
