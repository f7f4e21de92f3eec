// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &str) -> Result<HttpProvider, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(RootProvider::new_http(url)),
            other => Err(AppError::Config(format!(
                "Unsupported RPC scheme '{other}', expected http or https"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        assert!(ConnectionFactory::http("http://127.0.0.1:8545").is_ok());
        assert!(matches!(
            ConnectionFactory::http("ws://127.0.0.1:8546"),
            Err(AppError::Config(_))
        ));
        assert!(ConnectionFactory::http("not a url").is_err());
    }
}
