//! Chain-data sources for the signer.

use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tracing::debug;

use klay_core::Address;
use klay_core::types::{parse_u64, parse_u256, U256};
use klay_wallet::{ChainData, ChainDataError};

/// Chain data from a node's `klay_*` JSON-RPC methods.
pub struct RpcChainData {
    client: HttpClient,
}

impl RpcChainData {
    pub fn connect(endpoint: &str) -> Result<Self, ChainDataError> {
        let client = HttpClientBuilder::default()
            .build(endpoint)
            .map_err(|e| ChainDataError::Unavailable(format!("{endpoint}: {e}")))?;
        Ok(Self { client })
    }

    async fn quantity(&self, method: &str, params: ArrayParams) -> Result<String, ChainDataError> {
        debug!(method, "rpc request");
        self.client
            .request::<String, _>(method, params)
            .await
            .map_err(|e| ChainDataError::Unavailable(format!("{method}: {e}")))
    }
}

fn params<const N: usize>(values: [&str; N]) -> Result<ArrayParams, ChainDataError> {
    let mut params = ArrayParams::new();
    for value in values {
        params
            .insert(value)
            .map_err(|e| ChainDataError::InvalidResponse(e.to_string()))?;
    }
    Ok(params)
}

fn invalid(e: impl ToString) -> ChainDataError {
    ChainDataError::InvalidResponse(e.to_string())
}

#[async_trait]
impl ChainData for RpcChainData {
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainDataError> {
        let address = address.to_hex();
        let count = self
            .quantity("klay_getTransactionCount", params([address.as_str(), "pending"])?)
            .await?;
        parse_u64("nonce", &count).map_err(invalid)
    }

    async fn get_gas_price(&self) -> Result<U256, ChainDataError> {
        let price = self.quantity("klay_gasPrice", params([])?).await?;
        parse_u256("gasPrice", &price).map_err(invalid)
    }

    async fn get_chain_id(&self) -> Result<u64, ChainDataError> {
        let id = self.quantity("klay_chainID", params([])?).await?;
        parse_u64("chainId", &id).map_err(invalid)
    }
}

/// Source for `--offline`: every lookup fails, so only complete
/// transactions can be signed.
pub struct OfflineChainData;

#[async_trait]
impl ChainData for OfflineChainData {
    async fn get_transaction_count(&self, _address: Address) -> Result<u64, ChainDataError> {
        Err(ChainDataError::Unavailable("offline: supply nonce".into()))
    }

    async fn get_gas_price(&self) -> Result<U256, ChainDataError> {
        Err(ChainDataError::Unavailable("offline: supply gasPrice".into()))
    }

    async fn get_chain_id(&self) -> Result<u64, ChainDataError> {
        Err(ChainDataError::Unavailable("offline: supply chainId".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_source_refuses_lookups() {
        let err = OfflineChainData.get_chain_id().await.unwrap_err();
        assert!(matches!(err, ChainDataError::Unavailable(m) if m.contains("chainId")));
    }

    #[tokio::test]
    async fn connect_rejects_bad_url() {
        assert!(matches!(
            RpcChainData::connect("not a url"),
            Err(ChainDataError::Unavailable(_))
        ));
    }

    #[test]
    fn params_builds_positional_list() {
        assert!(params(["0xabc", "pending"]).is_ok());
    }
}
