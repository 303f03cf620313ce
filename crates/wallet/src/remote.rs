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

//! Clients for the key server and the ERC-4337 bundler.

use std::time::Duration;

use aawallet_rpc::{
    new_http_client, BundlerApiClient, IndexOutOfRangeData, KeysApiClient,
    KEY_INDEX_OUT_OF_RANGE_CODE, NO_KEYS_CONFIGURED_CODE,
};
use aawallet_types::{DelegationStatus, Eip7702Auth, KeyInfo, TransactionRequest, UserOperation};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use jsonrpsee::{
    core::ClientError,
    http_client::{transport::Error as TransportError, HttpClient},
};
#[cfg(feature = "test-utils")]
use mockall::automock;
use secrecy::SecretString;

use crate::error::{WalletError, WalletResult};

/// Sign-by-index access to server-held keys
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Enumerate the configured keys
    async fn list_addresses(&self) -> WalletResult<Vec<KeyInfo>>;

    /// EIP-191 signature
    async fn sign_message(&self, key_index: usize, message: Bytes) -> WalletResult<Bytes>;

    /// EIP-712 signature
    async fn sign_typed_data(&self, key_index: usize, typed_data: TypedData) -> WalletResult<Bytes>;

    /// Sign and send a transaction
    async fn send_transaction(&self, key_index: usize, tx: TransactionRequest) -> WalletResult<B256>;

    /// Sign a 7702 authorization
    async fn sign_authorization(
        &self,
        key_index: usize,
        delegatee: Address,
        chain_id: Option<u64>,
        nonce: Option<u64>,
    ) -> WalletResult<Eip7702Auth>;

    /// Send a self-sponsored 7702 delegation transaction
    async fn submit_authorization(&self, key_index: usize, delegatee: Address) -> WalletResult<B256>;

    /// Signature over a user operation hash
    async fn sign_user_operation(
        &self,
        key_index: usize,
        user_operation: UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> WalletResult<Bytes>;

    /// On-chain delegation status of a key's account
    async fn delegation_status(&self, key_index: usize) -> WalletResult<DelegationStatus>;
}

/// ERC-4337 bundler access
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait]
pub trait BundlerService: Send + Sync {
    /// Submit a signed user operation, returning its hash
    async fn send_user_operation(
        &self,
        user_operation: UserOperation,
        entry_point: Address,
    ) -> WalletResult<B256>;
}

/// [`KeyService`] over the key server's JSON-RPC API
#[derive(Debug, Clone)]
pub struct RemoteKeyService {
    client: HttpClient,
}

impl RemoteKeyService {
    /// Connects to the key server at `url`
    pub fn new(
        url: &str,
        auth_token: Option<&SecretString>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: new_http_client(url, auth_token, request_timeout)?,
        })
    }
}

#[async_trait]
impl KeyService for RemoteKeyService {
    async fn list_addresses(&self) -> WalletResult<Vec<KeyInfo>> {
        self.client.list_addresses().await.map_err(key_server_err)
    }

    async fn sign_message(&self, key_index: usize, message: Bytes) -> WalletResult<Bytes> {
        self.client
            .sign_message(key_index, message)
            .await
            .map_err(key_server_err)
    }

    async fn sign_typed_data(&self, key_index: usize, typed_data: TypedData) -> WalletResult<Bytes> {
        self.client
            .sign_typed_data(key_index, typed_data)
            .await
            .map_err(key_server_err)
    }

    async fn send_transaction(&self, key_index: usize, tx: TransactionRequest) -> WalletResult<B256> {
        self.client
            .send_transaction(key_index, tx)
            .await
            .map_err(key_server_err)
    }

    async fn sign_authorization(
        &self,
        key_index: usize,
        delegatee: Address,
        chain_id: Option<u64>,
        nonce: Option<u64>,
    ) -> WalletResult<Eip7702Auth> {
        self.client
            .sign_authorization(key_index, delegatee, chain_id, nonce)
            .await
            .map_err(key_server_err)
    }

    async fn submit_authorization(&self, key_index: usize, delegatee: Address) -> WalletResult<B256> {
        self.client
            .submit_authorization(key_index, delegatee)
            .await
            .map_err(key_server_err)
    }

    async fn sign_user_operation(
        &self,
        key_index: usize,
        user_operation: UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> WalletResult<Bytes> {
        self.client
            .sign_user_operation(key_index, user_operation, entry_point, chain_id)
            .await
            .map_err(key_server_err)
    }

    async fn delegation_status(&self, key_index: usize) -> WalletResult<DelegationStatus> {
        self.client
            .delegation_status(key_index)
            .await
            .map_err(key_server_err)
    }
}

/// [`BundlerService`] over a bundler's `eth_` JSON-RPC API
#[derive(Debug, Clone)]
pub struct RemoteBundler {
    client: HttpClient,
}

impl RemoteBundler {
    /// Connects to the bundler at `url`
    pub fn new(url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: new_http_client(url, None, request_timeout)?,
        })
    }
}

#[async_trait]
impl BundlerService for RemoteBundler {
    async fn send_user_operation(
        &self,
        user_operation: UserOperation,
        entry_point: Address,
    ) -> WalletResult<B256> {
        BundlerApiClient::send_user_operation(&self.client, user_operation, entry_point)
            .await
            .map_err(|e| WalletError::BackendRequestFailed(format!("bundler: {e}")))
    }
}

fn key_server_err(err: ClientError) -> WalletError {
    match err {
        ClientError::Call(err) => match err.code() {
            NO_KEYS_CONFIGURED_CODE => WalletError::NoKeysConfigured,
            KEY_INDEX_OUT_OF_RANGE_CODE => {
                match err
                    .data()
                    .and_then(|d| serde_json::from_str::<IndexOutOfRangeData>(d.get()).ok())
                {
                    Some(IndexOutOfRangeData { index, available }) => {
                        WalletError::IndexOutOfRange { index, available }
                    }
                    None => WalletError::BackendRequestFailed(err.message().to_string()),
                }
            }
            _ => WalletError::BackendRequestFailed(err.message().to_string()),
        },
        ClientError::RequestTimeout => {
            WalletError::BackendUnavailable("request timed out".to_string())
        }
        ClientError::Transport(e) if is_transient(e.as_ref()) => {
            WalletError::BackendUnavailable(e.to_string())
        }
        other => WalletError::BackendRequestFailed(other.to_string()),
    }
}

/// Network failures and 5xx answers may clear up once the key server is up.
/// Any other rejection, such as a 401 for a bad token, will not.
fn is_transient(err: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
    match err.downcast_ref::<TransportError>() {
        Some(TransportError::Http(_)) => true,
        Some(TransportError::Rejected { status_code }) => *status_code >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use jsonrpsee::types::ErrorObject;

    use super::*;

    #[test]
    fn test_key_server_err_mapping() {
        let err = ClientError::Call(ErrorObject::owned(
            KEY_INDEX_OUT_OF_RANGE_CODE,
            "out of range",
            Some(IndexOutOfRangeData {
                index: 4,
                available: 2,
            }),
        ));
        assert!(matches!(
            key_server_err(err),
            WalletError::IndexOutOfRange {
                index: 4,
                available: 2
            }
        ));

        let err = ClientError::Call(ErrorObject::owned(
            NO_KEYS_CONFIGURED_CODE,
            "no keys",
            None::<()>,
        ));
        assert!(matches!(key_server_err(err), WalletError::NoKeysConfigured));

        let err = ClientError::Call(ErrorObject::owned(-32012, "bad tx", None::<()>));
        match key_server_err(err) {
            WalletError::BackendRequestFailed(msg) => assert_eq!(msg, "bad tx"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_key_server_is_transient() {
        assert!(matches!(
            key_server_err(ClientError::RequestTimeout),
            WalletError::BackendUnavailable(_)
        ));

        let err = ClientError::Transport(Box::new(TransportError::Rejected { status_code: 503 }));
        assert!(matches!(
            key_server_err(err),
            WalletError::BackendUnavailable(_)
        ));
    }

    #[test]
    fn test_rejected_request_is_not_transient() {
        let err = ClientError::Transport(Box::new(TransportError::Rejected { status_code: 401 }));
        match key_server_err(err) {
            WalletError::BackendRequestFailed(msg) => assert!(msg.contains("401")),
            other => panic!("unexpected {other:?}"),
        }

        let err = ClientError::Transport(Box::new(TransportError::RequestTooLarge));
        assert!(matches!(
            key_server_err(err),
            WalletError::BackendRequestFailed(_)
        ));
    }
}
