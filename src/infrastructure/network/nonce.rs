// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::retry::retry_async;
use crate::domain::error::AppError;
use crate::infrastructure::network::node::ChainClient;
use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Hands out nonces for one signer. Reads the node's pending count every time
/// and never returns a value below one it already handed out.
#[derive(Clone)]
pub struct NonceManager {
    client: Arc<dyn ChainClient>,
    address: Address,
    next: Arc<Mutex<Option<u64>>>,
}

impl NonceManager {
    pub fn new(client: Arc<dyn ChainClient>, address: Address) -> Self {
        Self {
            client,
            address,
            next: Arc::new(Mutex::new(None)),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reserve the next nonce. The lock is held across the RPC read so two
    /// callers sharing this manager cannot observe the same pending count.
    pub async fn reserve(&self) -> Result<u64, AppError> {
        let mut guard = self.next.lock().await;
        let on_chain = self.fetch_pending().await?;
        let nonce = match *guard {
            Some(local) if local > on_chain => local,
            _ => on_chain,
        };
        *guard = Some(nonce.saturating_add(1));
        Ok(nonce)
    }

    /// Forget locally reserved nonces, e.g. after a dropped transaction.
    pub async fn resync(&self) -> Result<u64, AppError> {
        let mut guard = self.next.lock().await;
        let on_chain = self.fetch_pending().await?;
        *guard = Some(on_chain);
        tracing::debug!(target: "nonce", address = %self.address, nonce = on_chain, "Nonce resynced");
        Ok(on_chain)
    }

    async fn fetch_pending(&self) -> Result<u64, AppError> {
        let client = self.client.clone();
        let address = self.address;
        retry_async(
            move |_| {
                let client = client.clone();
                async move { client.pending_nonce(address).await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }
}
