// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::EngineSettings;
use crate::domain::constants::{self, STANDARD_FEE_TIERS};
use crate::domain::error::AppError;
use alloy::primitives::Address;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairFlavor {
    /// Uniswap V2 forks: `getPair`, `address[]` paths.
    UniswapV2,
    /// Solidly forks (Aerodrome): `getPool(a, b, stable)`, `Route[]` paths.
    Solidly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingScheme {
    ConstantProduct {
        router: Address,
        factory: Address,
        flavor: PairFlavor,
        fee_bps: u32,
    },
    ConcentratedLiquidity {
        router: Address,
        quoter: Address,
        factory: Address,
        fee_tiers: Vec<u32>,
    },
    SingletonManager {
        pool_manager: Address,
        state_view: Address,
        quoter: Address,
        universal_router: Address,
        permit2: Address,
        fee_tiers: Vec<u32>,
        hooks: Address,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueDescriptor {
    pub name: String,
    pub scheme: AddressingScheme,
}

impl VenueDescriptor {
    /// Contract the swap transaction is sent to.
    pub fn swap_target(&self) -> Address {
        match &self.scheme {
            AddressingScheme::ConstantProduct { router, .. } => *router,
            AddressingScheme::ConcentratedLiquidity { router, .. } => *router,
            AddressingScheme::SingletonManager {
                universal_router, ..
            } => *universal_router,
        }
    }

    /// Probe priority: singleton first, then concentrated, then constant-product.
    fn rank(&self) -> u8 {
        match self.scheme {
            AddressingScheme::SingletonManager { .. } => 0,
            AddressingScheme::ConcentratedLiquidity { .. } => 1,
            AddressingScheme::ConstantProduct { .. } => 2,
        }
    }
}

/// Static table of known venues for one chain.
#[derive(Debug, Clone)]
pub struct VenueRegistry {
    chain_id: u64,
    wrapped_native: Address,
    venues: Vec<VenueDescriptor>,
}

impl VenueRegistry {
    pub fn new(chain_id: u64, wrapped_native: Address) -> Self {
        Self {
            chain_id,
            wrapped_native,
            venues: Vec::new(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// Later registrations with the same name replace earlier ones in place.
    pub fn register(&mut self, venue: VenueDescriptor) {
        match self.venues.iter_mut().find(|v| v.name == venue.name) {
            Some(slot) => *slot = venue,
            None => self.venues.push(venue),
        }
    }

    pub fn get(&self, name: &str) -> Option<&VenueDescriptor> {
        self.venues.iter().find(|v| v.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    /// Venues in probe order; constant-product venues keep registration order.
    pub fn in_priority_order(&self) -> Vec<&VenueDescriptor> {
        let mut out: Vec<&VenueDescriptor> = self.venues.iter().collect();
        out.sort_by_key(|v| v.rank());
        out
    }

    /// Build the registry from the deployment table plus configured overrides.
    /// A venue is only registered when every contract it needs has an address.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, AppError> {
        let addrs = settings.venue_addresses_for_chain()?;
        let wrapped = addrs
            .get("wrapped_native")
            .copied()
            .unwrap_or_else(|| constants::wrapped_native_for_chain(settings.chain_id));
        let mut registry = Self::new(settings.chain_id, wrapped);
        let fee_tiers = settings.fee_tiers_value();
        let lookup = |key: &str| addrs.get(key).copied();

        if let (Some(pool_manager), Some(state_view), Some(quoter), Some(universal_router)) = (
            lookup("uniswap_v4_pool_manager"),
            lookup("uniswap_v4_state_view"),
            lookup("uniswap_v4_quoter"),
            lookup("uniswap_universal_router"),
        ) {
            registry.register(VenueDescriptor {
                name: "uniswap_v4".into(),
                scheme: AddressingScheme::SingletonManager {
                    pool_manager,
                    state_view,
                    quoter,
                    universal_router,
                    permit2: lookup("uniswap_permit2").unwrap_or(constants::PERMIT2),
                    fee_tiers: fee_tiers.clone(),
                    hooks: settings.v4_hooks_value(),
                },
            });
        }

        if let (Some(router), Some(quoter), Some(factory)) = (
            lookup("uniswap_v3_swaprouter02"),
            lookup("uniswap_v3_quoter_v2"),
            lookup("uniswap_v3_factory"),
        ) {
            registry.register(VenueDescriptor {
                name: "uniswap_v3".into(),
                scheme: AddressingScheme::ConcentratedLiquidity {
                    router,
                    quoter,
                    factory,
                    fee_tiers: fee_tiers.clone(),
                },
            });
        }

        for (name, flavor, fee_bps) in [
            ("aerodrome", PairFlavor::Solidly, 30),
            ("uniswap_v2", PairFlavor::UniswapV2, 30),
            ("baseswap", PairFlavor::UniswapV2, 25),
        ] {
            let router_key = if name == "uniswap_v2" {
                "uniswap_v2_router02".to_string()
            } else {
                format!("{name}_router")
            };
            if let (Some(router), Some(factory)) =
                (lookup(&router_key), lookup(&format!("{name}_factory")))
            {
                registry.register(VenueDescriptor {
                    name: name.into(),
                    scheme: AddressingScheme::ConstantProduct {
                        router,
                        factory,
                        flavor,
                        fee_bps,
                    },
                });
            }
        }

        tracing::info!(
            target: "routing",
            chain_id = settings.chain_id,
            venues = %registry.venues.iter().map(|v| v.name.as_str()).collect::<Vec<_>>().join(","),
            "Venue registry loaded"
        );
        Ok(registry)
    }

    /// Every contract address the registry knows, by role. Useful for logging.
    pub fn contract_map(&self) -> HashMap<String, Address> {
        let mut out = HashMap::new();
        for v in &self.venues {
            match &v.scheme {
                AddressingScheme::ConstantProduct {
                    router, factory, ..
                } => {
                    out.insert(format!("{}.router", v.name), *router);
                    out.insert(format!("{}.factory", v.name), *factory);
                }
                AddressingScheme::ConcentratedLiquidity {
                    router,
                    quoter,
                    factory,
                    ..
                } => {
                    out.insert(format!("{}.router", v.name), *router);
                    out.insert(format!("{}.quoter", v.name), *quoter);
                    out.insert(format!("{}.factory", v.name), *factory);
                }
                AddressingScheme::SingletonManager {
                    pool_manager,
                    state_view,
                    quoter,
                    universal_router,
                    permit2,
                    ..
                } => {
                    out.insert(format!("{}.pool_manager", v.name), *pool_manager);
                    out.insert(format!("{}.state_view", v.name), *state_view);
                    out.insert(format!("{}.quoter", v.name), *quoter);
                    out.insert(format!("{}.universal_router", v.name), *universal_router);
                    out.insert(format!("{}.permit2", v.name), *permit2);
                }
            }
        }
        out
    }
}

/// Fee tiers a venue probes, lowest first, restricted to tiers with a known spacing
/// unless explicitly configured.
pub fn probe_tiers(configured: &[u32]) -> Vec<u32> {
    let mut tiers: Vec<u32> = if configured.is_empty() {
        STANDARD_FEE_TIERS.to_vec()
    } else {
        configured.to_vec()
    };
    tiers.sort_unstable();
    tiers.dedup();
    tiers
}
