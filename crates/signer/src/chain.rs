// This file is part of AAWallet.
//
// AAWallet is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// AAWallet is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with AAWallet.
// If not, see https://www.gnu.org/licenses/.

//! Node access used by the key server to submit transactions

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use anyhow::Context;
#[cfg(feature = "test-utils")]
use mockall::automock;

/// Error from the node
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// JSON-RPC or transport error
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for node calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Suggested EIP-1559 fees
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Fees {
    /// Max fee per gas
    pub max_fee_per_gas: u128,
    /// Max priority fee per gas
    pub max_priority_fee_per_gas: u128,
}

/// Trait for the node calls the key server makes
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait ChainProvider: Send + Sync {
    /// Chain ID of the node
    async fn chain_id(&self) -> ProviderResult<u64>;

    /// Code at an address
    async fn get_code(&self, address: Address) -> ProviderResult<Bytes>;

    /// Pending transaction count of an address
    async fn get_transaction_count(&self, address: Address) -> ProviderResult<u64>;

    /// Fees to use for a new transaction
    async fn get_fees(&self) -> ProviderResult<Fees>;

    /// Estimate gas for a call
    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> ProviderResult<u64>;

    /// Send a signed, encoded transaction
    async fn send_raw_transaction(&self, tx: Bytes) -> ProviderResult<B256>;
}

/// [`ChainProvider`] backed by an alloy provider
#[derive(Debug, Clone)]
pub struct AlloyChainProvider<P> {
    inner: P,
}

impl<P> AlloyChainProvider<P> {
    /// Wrap an alloy provider
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

/// Create a [`ChainProvider`] connected to a node over HTTP
pub fn new_http_provider(url: &str) -> anyhow::Result<impl ChainProvider + Clone> {
    let url = url.parse().context("invalid node url")?;
    Ok(AlloyChainProvider::new(ProviderBuilder::new().on_http(url)))
}

fn rpc_error(err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Rpc(err.to_string())
}

#[async_trait::async_trait]
impl<P> ChainProvider for AlloyChainProvider<P>
where
    P: Provider + Clone + 'static,
{
    async fn chain_id(&self) -> ProviderResult<u64> {
        self.inner.get_chain_id().await.map_err(rpc_error)
    }

    async fn get_code(&self, address: Address) -> ProviderResult<Bytes> {
        self.inner.get_code_at(address).await.map_err(rpc_error)
    }

    async fn get_transaction_count(&self, address: Address) -> ProviderResult<u64> {
        self.inner
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(rpc_error)
    }

    async fn get_fees(&self) -> ProviderResult<Fees> {
        let gas_price = self.inner.get_gas_price().await.map_err(rpc_error)?;
        let max_priority_fee_per_gas = self
            .inner
            .get_max_priority_fee_per_gas()
            .await
            .map_err(rpc_error)?;
        Ok(Fees {
            max_fee_per_gas: gas_price.saturating_mul(2) + max_priority_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> ProviderResult<u64> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(data);
        self.inner.estimate_gas(&tx).await.map_err(rpc_error)
    }

    async fn send_raw_transaction(&self, tx: Bytes) -> ProviderResult<B256> {
        let pending = self
            .inner
            .send_raw_transaction(&tx)
            .await
            .map_err(rpc_error)?;
        Ok(*pending.tx_hash())
    }
}
