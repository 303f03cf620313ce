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

use aawallet_types::{DelegationStatus, TransactionRequest};
use aawallet_utils::eth;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEip7702, TxEnvelope};
use alloy_eips::{eip2718::Encodable2718, eip7702::SignedAuthorization};
use alloy_network::TxSignerSync;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use metrics::Counter;
use metrics_derive::Metrics;

use crate::{chain::ChainProvider, KeyStore, Result};

/// Gas limit for a self-sponsored authorization transaction
///
/// Base cost plus the per-authorization cost for a fresh account.
pub const AUTHORIZATION_TX_GAS_LIMIT: u64 = 21_000 + 25_000 + 20_000;

/// Builds, signs and sends transactions for key store keys
#[derive(Debug)]
pub struct TransactionSubmitter<P> {
    provider: P,
    chain_id: u64,
    metrics: SubmitterMetrics,
}

impl<P: ChainProvider> TransactionSubmitter<P> {
    /// Connect to the node and read its chain id
    pub async fn connect(provider: P) -> Result<Self> {
        let chain_id = provider.chain_id().await?;
        tracing::info!("transaction submitter connected to chain {chain_id}");
        Ok(Self {
            provider,
            chain_id,
            metrics: SubmitterMetrics::default(),
        })
    }

    /// Chain the submitter signs for
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// On-chain delegation target and nonce of `address`
    pub async fn delegation_status(&self, address: Address) -> Result<DelegationStatus> {
        let code = self.provider.get_code(address).await?;
        let nonce = self.provider.get_transaction_count(address).await?;
        Ok(DelegationStatus {
            delegatee: eth::parse_delegation_code(&code),
            nonce,
        })
    }

    /// Next nonce of `address`
    pub async fn nonce(&self, address: Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    /// Sign and send an EIP-1559 transaction from key `index`
    pub async fn send_transaction(
        &self,
        keys: &KeyStore,
        index: usize,
        request: &TransactionRequest,
    ) -> Result<B256> {
        let signer = keys.signer(index)?;
        let from = signer.address();

        let nonce = self.provider.get_transaction_count(from).await?;
        let fees = self.provider.get_fees().await?;
        let gas_limit = match request.gas_limit {
            Some(gas_limit) => gas_limit,
            None => {
                self.provider
                    .estimate_gas(from, request.to, request.value, request.data.clone())
                    .await?
            }
        };

        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            to: TxKind::Call(request.to),
            value: request.value,
            access_list: Default::default(),
            input: request.data.clone(),
        };

        let raw = sign_and_encode(signer, tx)?;
        let hash = self.provider.send_raw_transaction(raw).await?;
        self.metrics.transactions_sent.increment(1);
        tracing::info!("sent transaction {hash:?} from {from:?} nonce {nonce}");
        Ok(hash)
    }

    /// Sign an authorization for `delegatee` and send it in a self-sponsored 7702 transaction
    ///
    /// The sender is also the authority, so the authorization nonce is the
    /// transaction nonce plus one.
    pub async fn submit_authorization(
        &self,
        keys: &KeyStore,
        index: usize,
        delegatee: Address,
    ) -> Result<B256> {
        let signer = keys.signer(index)?;
        let from = signer.address();

        let nonce = self.provider.get_transaction_count(from).await?;
        let fees = self.provider.get_fees().await?;
        let authorization = keys.sign_authorization(index, self.chain_id, delegatee, nonce + 1)?;

        let tx = authorization_transaction(
            self.chain_id,
            from,
            nonce,
            fees.max_fee_per_gas,
            fees.max_priority_fee_per_gas,
            authorization,
        );

        let raw = sign_and_encode(signer, tx)?;
        let hash = self.provider.send_raw_transaction(raw).await?;
        self.metrics.authorizations_sent.increment(1);
        tracing::info!("sent 7702 authorization {hash:?} delegating {from:?} to {delegatee:?}");
        Ok(hash)
    }
}

fn authorization_transaction(
    chain_id: u64,
    authority: Address,
    nonce: u64,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
    authorization: SignedAuthorization,
) -> TxEip7702 {
    TxEip7702 {
        chain_id,
        nonce,
        gas_limit: AUTHORIZATION_TX_GAS_LIMIT,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        to: authority,
        value: U256::ZERO,
        access_list: Default::default(),
        authorization_list: vec![authorization],
        input: Bytes::new(),
    }
}

fn sign_and_encode<T>(signer: &PrivateKeySigner, mut tx: T) -> Result<Bytes>
where
    T: SignableTransaction<alloy_primitives::PrimitiveSignature>,
    alloy_consensus::Signed<T>: Into<TxEnvelope>,
{
    let sig = signer.sign_transaction_sync(&mut tx)?;
    let envelope: TxEnvelope = tx.into_signed(sig).into();
    let mut raw = vec![];
    envelope.encode_2718(&mut raw);
    Ok(raw.into())
}

#[derive(Metrics)]
#[metrics(scope = "signer_submitter")]
struct SubmitterMetrics {
    #[metric(describe = "the number of transactions sent.")]
    transactions_sent: Counter,
    #[metric(describe = "the number of 7702 authorization transactions sent.")]
    authorizations_sent: Counter,
}
