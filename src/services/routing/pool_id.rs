// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::parsing::validate_currency;
use crate::domain::constants::DEFAULT_TICK_SPACING;
use crate::domain::error::AppError;
use crate::domain::types::{PoolId, PoolKey};
use crate::infrastructure::data::abi;
use crate::infrastructure::network::node::{ChainClient, view};
use crate::services::routing::registry::{AddressingScheme, PairFlavor, VenueDescriptor};
use alloy::primitives::aliases::{I24, U24};
use alloy::primitives::{Address, B256, keccak256};
use alloy_sol_types::SolValue;

/// Order two currencies so the numerically smaller address comes first.
/// The zero address (native) always sorts first.
pub fn canonical_pair(a: Address, b: Address) -> (Address, Address) {
    if a <= b { (a, b) } else { (b, a) }
}

pub fn tick_spacing_for_fee(fee: u32) -> i32 {
    match fee {
        100 => 1,
        500 => 10,
        3000 => 60,
        10_000 => 200,
        _ => DEFAULT_TICK_SPACING,
    }
}

pub fn pool_key(a: Address, b: Address, fee: u32, hooks: Address) -> PoolKey {
    let (currency0, currency1) = canonical_pair(a, b);
    PoolKey {
        currency0,
        currency1,
        fee,
        tick_spacing: tick_spacing_for_fee(fee),
        hooks,
    }
}

impl From<&PoolKey> for abi::PoolKey {
    fn from(key: &PoolKey) -> Self {
        abi::PoolKey {
            currency0: key.currency0,
            currency1: key.currency1,
            fee: U24::from(key.fee & 0x00ff_ffff),
            tickSpacing: I24::try_from(key.tick_spacing).unwrap_or(I24::ZERO),
            hooks: key.hooks,
        }
    }
}

/// `keccak256(abi.encode(key))`, the identifier the pool manager stores state under.
/// A key whose currencies are out of order names no pool and is refused.
pub fn derive_pool_id(key: &PoolKey) -> Result<PoolId, AppError> {
    if !key.is_canonical() {
        return Err(AppError::Validation {
            field: "pool_key".into(),
            message: format!(
                "currency0 {:#x} must sort strictly below currency1 {:#x}",
                key.currency0, key.currency1
            ),
        });
    }
    let encoded = abi::PoolKey::from(key).abi_encode();
    Ok(PoolId(keccak256(encoded)))
}

/// `id` must be the non-zero identifier of the canonical `key`.
pub fn validate_pool_id(key: &PoolKey, id: &PoolId) -> Result<(), AppError> {
    if id.0 == B256::ZERO {
        return Err(AppError::Validation {
            field: "pool_id".into(),
            message: "all-zero pool id".into(),
        });
    }
    if derive_pool_id(key)? != *id {
        return Err(AppError::Validation {
            field: "pool_id".into(),
            message: format!("{id} is not the id of the given pool key"),
        });
    }
    Ok(())
}

/// Maps (venue, currency pair, fee) to the identifier each addressing scheme uses.
pub struct PoolIdResolver;

impl PoolIdResolver {
    /// Derived ids exist only for singleton-manager venues; other schemes
    /// address pools by contract and need an RPC lookup, so they get `None`.
    /// Argument order does not matter.
    pub fn resolve(
        venue: &VenueDescriptor,
        a: Address,
        b: Address,
        fee: u32,
    ) -> Result<Option<PoolId>, AppError> {
        match &venue.scheme {
            AddressingScheme::SingletonManager { hooks, .. } => {
                derive_pool_id(&pool_key(a, b, fee, *hooks)).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// String-input variant used by the CLI.
    pub fn resolve_str(a: &str, b: &str, fee: u32, hooks: Address) -> Result<PoolId, AppError> {
        let a = validate_currency(a)?;
        let b = validate_currency(b)?;
        if a == b {
            return Err(AppError::Validation {
                field: "currency".into(),
                message: "pair currencies must differ".into(),
            });
        }
        let key = pool_key(a, b, fee, hooks);
        let id = derive_pool_id(&key)?;
        validate_pool_id(&key, &id)?;
        Ok(id)
    }

    /// Factory lookup for contract-addressed pools. `Ok(None)` when the factory
    /// has no pool for the pair.
    pub async fn lookup_pool_address(
        client: &dyn ChainClient,
        venue: &VenueDescriptor,
        a: Address,
        b: Address,
        fee: u32,
        stable: bool,
    ) -> Result<Option<Address>, AppError> {
        let pool = match &venue.scheme {
            AddressingScheme::ConcentratedLiquidity { factory, .. } => {
                view(
                    client,
                    *factory,
                    &abi::IV3Factory::getPoolCall {
                        tokenA: a,
                        tokenB: b,
                        fee: U24::from(fee & 0x00ff_ffff),
                    },
                )
                .await?
            }
            AddressingScheme::ConstantProduct {
                factory,
                flavor: PairFlavor::UniswapV2,
                ..
            } => {
                view(
                    client,
                    *factory,
                    &abi::IUniV2Factory::getPairCall { tokenA: a, tokenB: b },
                )
                .await?
            }
            AddressingScheme::ConstantProduct {
                factory,
                flavor: PairFlavor::Solidly,
                ..
            } => {
                view(
                    client,
                    *factory,
                    &abi::ISolidlyFactory::getPoolCall {
                        tokenA: a,
                        tokenB: b,
                        stable,
                    },
                )
                .await?
            }
            AddressingScheme::SingletonManager { .. } => return Ok(None),
        };
        Ok((pool != Address::ZERO).then_some(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::WETH_BASE;
    use alloy::primitives::address;

    const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

    fn id_of(key: &PoolKey) -> PoolId {
        derive_pool_id(key).expect("canonical key")
    }

    fn venue(scheme: AddressingScheme) -> VenueDescriptor {
        VenueDescriptor {
            name: "venue".into(),
            scheme,
        }
    }

    fn singleton(hooks: Address) -> VenueDescriptor {
        venue(AddressingScheme::SingletonManager {
            pool_manager: Address::new([0x40; 20]),
            state_view: Address::new([0x41; 20]),
            quoter: Address::new([0x42; 20]),
            universal_router: Address::new([0x43; 20]),
            permit2: Address::new([0x44; 20]),
            fee_tiers: vec![500, 3000],
            hooks,
        })
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let (a, b) = canonical_pair(USDC_BASE, WETH_BASE);
        assert_eq!(canonical_pair(a, b), (a, b));
        assert_eq!(canonical_pair(b, a), (a, b));
        assert_eq!(a, WETH_BASE);
        assert_eq!(canonical_pair(WETH_BASE, Address::ZERO).0, Address::ZERO);
    }

    #[test]
    fn pool_id_is_order_independent_and_deterministic() {
        let key = pool_key(USDC_BASE, WETH_BASE, 500, Address::ZERO);
        let x = id_of(&key);
        let y = id_of(&pool_key(WETH_BASE, USDC_BASE, 500, Address::ZERO));
        assert_eq!(x, y);
        let other_fee = id_of(&pool_key(WETH_BASE, USDC_BASE, 3000, Address::ZERO));
        assert_ne!(x, other_fee);
        let mut spaced = key;
        spaced.tick_spacing = 1;
        assert_ne!(x, id_of(&spaced));
        let hooked = id_of(&pool_key(WETH_BASE, USDC_BASE, 500, Address::new([0x01; 20])));
        assert_ne!(x, hooked);
        assert!(validate_pool_id(&key, &x).is_ok());
        assert!(validate_pool_id(&key, &other_fee).is_err());
    }

    #[test]
    fn pool_id_hashes_abi_encoded_key() {
        // keccak256 of five 32-byte words: currency0, currency1, fee, tickSpacing, hooks.
        let key = pool_key(Address::ZERO, WETH_BASE, 3000, Address::ZERO);
        let mut words = Vec::with_capacity(160);
        words.extend_from_slice(&[0u8; 32]);
        words.extend_from_slice(&[0u8; 12]);
        words.extend_from_slice(WETH_BASE.as_slice());
        let mut fee = [0u8; 32];
        fee[29..].copy_from_slice(&[0x00, 0x0b, 0xb8]);
        words.extend_from_slice(&fee);
        let mut spacing = [0u8; 32];
        spacing[31] = 60;
        words.extend_from_slice(&spacing);
        words.extend_from_slice(&[0u8; 32]);
        assert_eq!(id_of(&key).0, keccak256(&words));
    }

    #[test]
    fn out_of_order_keys_are_refused() {
        let flipped = PoolKey {
            currency0: Address::new([0xff; 20]),
            currency1: Address::new([0x01; 20]),
            fee: 3000,
            tick_spacing: 60,
            hooks: Address::ZERO,
        };
        assert!(matches!(
            derive_pool_id(&flipped),
            Err(AppError::Validation { .. })
        ));

        // The id of the reordered key must not validate against the flipped one.
        let ordered = pool_key(flipped.currency0, flipped.currency1, 3000, Address::ZERO);
        let id = id_of(&ordered);
        assert!(validate_pool_id(&flipped, &id).is_err());
        assert!(validate_pool_id(&ordered, &id).is_ok());

        let same = pool_key(WETH_BASE, WETH_BASE, 3000, Address::ZERO);
        assert!(derive_pool_id(&same).is_err());
    }

    #[test]
    fn resolve_is_symmetric_for_singleton_venues() {
        let v4 = singleton(Address::ZERO);
        let ab = PoolIdResolver::resolve(&v4, USDC_BASE, WETH_BASE, 500).expect("resolves");
        let ba = PoolIdResolver::resolve(&v4, WETH_BASE, USDC_BASE, 500).expect("resolves");
        assert!(ab.is_some());
        assert_eq!(ab, ba);
        assert_eq!(ab, Some(id_of(&pool_key(USDC_BASE, WETH_BASE, 500, Address::ZERO))));

        // Hooks come from the venue descriptor.
        let hooked = singleton(Address::new([0x08; 20]));
        let with_hooks = PoolIdResolver::resolve(&hooked, USDC_BASE, WETH_BASE, 500).expect("resolves");
        assert_ne!(with_hooks, ab);

        assert!(PoolIdResolver::resolve(&v4, WETH_BASE, WETH_BASE, 500).is_err());
    }

    #[test]
    fn resolve_has_no_derived_id_for_contract_pools() {
        let v3 = venue(AddressingScheme::ConcentratedLiquidity {
            router: Address::new([0x03; 20]),
            quoter: Address::new([0x13; 20]),
            factory: Address::new([0x23; 20]),
            fee_tiers: vec![500],
        });
        let v2 = venue(AddressingScheme::ConstantProduct {
            router: Address::new([0x02; 20]),
            factory: Address::new([0x12; 20]),
            flavor: PairFlavor::UniswapV2,
            fee_bps: 30,
        });
        assert_eq!(PoolIdResolver::resolve(&v3, USDC_BASE, WETH_BASE, 500).ok(), Some(None));
        assert_eq!(PoolIdResolver::resolve(&v2, USDC_BASE, WETH_BASE, 0).ok(), Some(None));
    }

    #[test]
    fn tick_spacing_table() {
        assert_eq!(tick_spacing_for_fee(100), 1);
        assert_eq!(tick_spacing_for_fee(500), 10);
        assert_eq!(tick_spacing_for_fee(3000), 60);
        assert_eq!(tick_spacing_for_fee(10_000), 200);
        assert_eq!(tick_spacing_for_fee(2500), 60);
    }

    #[test]
    fn resolve_str_rejects_bad_input() {
        let weth = format!("{WETH_BASE:#x}");
        assert!(PoolIdResolver::resolve_str(&weth, "0x0000000000000000000000000000000000000000", 500, Address::ZERO).is_ok());
        assert!(matches!(
            PoolIdResolver::resolve_str("nope", &weth, 500, Address::ZERO),
            Err(AppError::InvalidAddress(_))
        ));
        assert!(PoolIdResolver::resolve_str(&weth, &weth, 500, Address::ZERO).is_err());
    }
}
