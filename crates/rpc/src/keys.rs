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

use std::sync::Arc;

use aawallet_signer::{ChainProvider, KeyStore, TransactionSubmitter};
use aawallet_types::{DelegationStatus, Eip7702Auth, KeyInfo, TransactionRequest, UserOperation};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};

use crate::error::{invalid_params, rpc_err, signer_err, CHAIN_UNAVAILABLE_CODE};

/// Key server API
///
/// Every signing method addresses a key by its index in `keys_listAddresses`.
#[rpc(client, server, namespace = "keys")]
pub trait KeysApi {
    /// Addresses of the configured keys
    #[method(name = "listAddresses")]
    async fn list_addresses(&self) -> RpcResult<Vec<KeyInfo>>;

    /// EIP-191 signature over `message`
    #[method(name = "signMessage")]
    async fn sign_message(&self, key_index: usize, message: Bytes) -> RpcResult<Bytes>;

    /// EIP-712 signature over `typed_data`
    #[method(name = "signTypedData")]
    async fn sign_typed_data(&self, key_index: usize, typed_data: TypedData) -> RpcResult<Bytes>;

    /// Sign and send a transaction
    #[method(name = "sendTransaction")]
    async fn send_transaction(&self, key_index: usize, tx: TransactionRequest) -> RpcResult<B256>;

    /// Sign a 7702 authorization
    ///
    /// `chain_id` defaults to the node's chain, `nonce` to the key's current nonce.
    #[method(name = "signAuthorization")]
    async fn sign_authorization(
        &self,
        key_index: usize,
        delegatee: Address,
        chain_id: Option<u64>,
        nonce: Option<u64>,
    ) -> RpcResult<Eip7702Auth>;

    /// Delegate the key's account to `delegatee` in a self-sponsored 7702 transaction
    #[method(name = "submitAuthorization")]
    async fn submit_authorization(&self, key_index: usize, delegatee: Address) -> RpcResult<B256>;

    /// Signature over the user operation hash
    #[method(name = "signUserOperation")]
    async fn sign_user_operation(
        &self,
        key_index: usize,
        user_operation: UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> RpcResult<Bytes>;

    /// On-chain delegation target and nonce of the key's account
    #[method(name = "delegationStatus")]
    async fn delegation_status(&self, key_index: usize) -> RpcResult<DelegationStatus>;
}

pub(crate) struct KeysApi<P> {
    keys: Arc<KeyStore>,
    submitter: Option<Arc<TransactionSubmitter<P>>>,
}

impl<P> KeysApi<P> {
    pub(crate) fn new(keys: Arc<KeyStore>, submitter: Option<Arc<TransactionSubmitter<P>>>) -> Self {
        Self { keys, submitter }
    }

    fn submitter(&self) -> RpcResult<&TransactionSubmitter<P>> {
        self.submitter
            .as_deref()
            .ok_or_else(|| rpc_err(CHAIN_UNAVAILABLE_CODE, "key server has no node configured"))
    }
}

#[async_trait]
impl<P> KeysApiServer for KeysApi<P>
where
    P: ChainProvider + 'static,
{
    async fn list_addresses(&self) -> RpcResult<Vec<KeyInfo>> {
        Ok(self.keys.keys())
    }

    async fn sign_message(&self, key_index: usize, message: Bytes) -> RpcResult<Bytes> {
        let sig = self
            .keys
            .sign_message(key_index, &message)
            .map_err(signer_err)?;
        Ok(sig.as_bytes().to_vec().into())
    }

    async fn sign_typed_data(&self, key_index: usize, typed_data: TypedData) -> RpcResult<Bytes> {
        let sig = self
            .keys
            .sign_typed_data(key_index, &typed_data)
            .map_err(signer_err)?;
        Ok(sig.as_bytes().to_vec().into())
    }

    async fn send_transaction(&self, key_index: usize, tx: TransactionRequest) -> RpcResult<B256> {
        self.submitter()?
            .send_transaction(&self.keys, key_index, &tx)
            .await
            .map_err(signer_err)
    }

    async fn sign_authorization(
        &self,
        key_index: usize,
        delegatee: Address,
        chain_id: Option<u64>,
        nonce: Option<u64>,
    ) -> RpcResult<Eip7702Auth> {
        let chain_id = match (chain_id, &self.submitter) {
            (Some(chain_id), _) => chain_id,
            (None, Some(submitter)) => submitter.chain_id(),
            (None, None) => {
                return Err(invalid_params(
                    "chainId is required when the key server has no node configured",
                ))
            }
        };
        let nonce = match nonce {
            Some(nonce) => nonce,
            None => {
                let address = self.keys.signer(key_index).map_err(signer_err)?.address();
                self.submitter()?
                    .nonce(address)
                    .await
                    .map_err(signer_err)?
            }
        };

        let signed = self
            .keys
            .sign_authorization(key_index, chain_id, delegatee, nonce)
            .map_err(signer_err)?;
        Ok(Eip7702Auth::from(&signed))
    }

    async fn submit_authorization(&self, key_index: usize, delegatee: Address) -> RpcResult<B256> {
        self.submitter()?
            .submit_authorization(&self.keys, key_index, delegatee)
            .await
            .map_err(signer_err)
    }

    async fn sign_user_operation(
        &self,
        key_index: usize,
        user_operation: UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> RpcResult<Bytes> {
        self.keys
            .sign_user_operation(key_index, &user_operation, entry_point, chain_id)
            .map_err(signer_err)
    }

    async fn delegation_status(&self, key_index: usize) -> RpcResult<DelegationStatus> {
        let address = self.keys.signer(key_index).map_err(signer_err)?.address();
        self.submitter()?
            .delegation_status(address)
            .await
            .map_err(signer_err)
    }
}
