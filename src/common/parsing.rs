// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, U256};
use std::str::FromStr;

pub fn parse_boolish(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    hex::decode(strip_0x(s.trim())).ok()
}

pub fn parse_b256_hex(s: &str) -> Option<B256> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        return None;
    }
    Some(B256::from_slice(&bytes))
}

/// Aggregators return amounts as decimal strings.
pub fn parse_u256_dec(s: &str) -> Option<U256> {
    U256::from_str_radix(s.trim(), 10).ok()
}

pub fn parse_u64_dec(s: &str) -> Option<u64> {
    s.trim().parse().ok()
}

pub fn parse_u128_dec(s: &str) -> Option<u128> {
    s.trim().parse().ok()
}

/// Parse a 20-byte hex address, refusing the zero address.
pub fn validate_address(raw: &str) -> Result<Address, AppError> {
    let addr = validate_currency(raw)?;
    if addr == Address::ZERO {
        return Err(AppError::InvalidAddress(raw.trim().to_string()));
    }
    Ok(addr)
}

/// Like [`validate_address`] but accepts the zero address as the native currency.
pub fn validate_currency(raw: &str) -> Result<Address, AppError> {
    let trimmed = raw.trim();
    let body = strip_0x(trimmed);
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::InvalidAddress(trimmed.to_string()));
    }
    Address::from_str(body).map_err(|_| AppError::InvalidAddress(trimmed.to_string()))
}

/// Render base units with `decimals` places, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / scale;
    let frac = value % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{whole}.{}", frac_str.trim_end_matches('0'))
}

/// Parse a decimal amount ("0.002") into base units without floating point.
pub fn parse_units(raw: &str, decimals: u8) -> Option<U256> {
    let raw = raw.trim();
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if frac.len() > decimals as usize || (whole.is_empty() && frac.is_empty()) {
        return None;
    }
    let whole = if whole.is_empty() { "0" } else { whole };
    let padded = format!("{frac:0<width$}", width = decimals as usize);
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let w = U256::from_str_radix(whole, 10).ok()?;
    let f = if padded.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&padded, 10).ok()?
    };
    w.checked_mul(scale)?.checked_add(f)
}
