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

use aawallet_types::{
    Capability, DelegateeKind, DelegationStatus, Eip7702Auth, SmartAccount, TransactionRequest,
    UserOperation, WalletAccount, WalletCapabilities, WalletType, DELEGATEE_CATALOG,
};
use aawallet_utils::eth::parse_delegation_code;
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, B256, U64};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    adapter::{require_account, AccountChange, WalletAdapter},
    eip1193::{Eip1193Provider, ProviderRpcError},
    error::{WalletError, WalletResult},
};

/// Settings for [`InjectedWallet`]
#[derive(Clone, Debug)]
pub struct InjectedWalletSettings {
    /// Delegation targets the wallet accepts
    pub supported_delegatees: Vec<Address>,
}

impl Default for InjectedWalletSettings {
    /// Browser wallets only delegate to their own implementation, which for
    /// MetaMask is the stateless DeleGator.
    fn default() -> Self {
        Self {
            supported_delegatees: DELEGATEE_CATALOG
                .iter()
                .filter(|d| d.kind == DelegateeKind::MetaMaskStatelessDeleGator)
                .map(|d| d.address)
                .collect(),
        }
    }
}

/// Wallet backed by an [`Eip1193Provider`] the user controls
pub struct InjectedWallet<P> {
    provider: P,
    settings: InjectedWalletSettings,
    account: RwLock<Option<WalletAccount>>,
}

impl<P> InjectedWallet<P> {
    /// Creates a new injected wallet
    pub fn new(provider: P, settings: InjectedWalletSettings) -> Self {
        Self {
            provider,
            settings,
            account: RwLock::new(None),
        }
    }
}

impl<P: Eip1193Provider> InjectedWallet<P> {
    async fn request(&self, method: &str, params: Value) -> WalletResult<Value> {
        self.provider
            .request(method, params)
            .await
            .map_err(|e| request_err(method, e))
    }

    async fn request_as<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> WalletResult<T> {
        let value = self.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| {
            WalletError::BackendRequestFailed(format!("{method}: unexpected response: {e}"))
        })
    }

    fn address(&self) -> WalletResult<Address> {
        Ok(require_account(self.account.read().clone())?.address)
    }
}

fn request_err(method: &str, err: ProviderRpcError) -> WalletError {
    if err.is_user_rejection() {
        WalletError::UserRejected(format!("{method}: {err}"))
    } else {
        WalletError::BackendRequestFailed(format!("{method}: {err}"))
    }
}

fn unsupported(operation: &'static str, capability: Capability) -> WalletError {
    WalletError::CapabilityUnsupported {
        operation,
        capability: capability.into(),
    }
}

#[async_trait]
impl<P> WalletAdapter for InjectedWallet<P>
where
    P: Eip1193Provider,
{
    fn wallet_type(&self) -> WalletType {
        WalletType::Injected
    }

    fn capabilities(&self) -> WalletCapabilities {
        WalletCapabilities::INJECTED
    }

    fn account(&self) -> Option<WalletAccount> {
        self.account.read().clone()
    }

    async fn connect(&self) -> WalletResult<WalletAccount> {
        let accounts = match self.provider.request("eth_requestAccounts", json!([])).await {
            Ok(value) => serde_json::from_value::<Vec<Address>>(value).map_err(|e| {
                WalletError::BackendRequestFailed(format!("eth_requestAccounts: {e}"))
            })?,
            Err(ProviderRpcError::Unreachable(msg)) => {
                return Err(WalletError::NoProviderDetected(msg))
            }
            Err(e) => return Err(request_err("eth_requestAccounts", e)),
        };
        let address = *accounts
            .first()
            .ok_or_else(|| WalletError::UserRejected("no account authorized".to_string()))?;
        let chain_id: U64 = self.request_as("eth_chainId", json!([])).await?;

        let account = WalletAccount::injected(address, Some(chain_id.to()));
        *self.account.write() = Some(account.clone());
        info!("Connected injected account {address} on chain {chain_id}");
        Ok(account)
    }

    async fn disconnect(&self) -> WalletResult<()> {
        if self.account.write().take().is_none() {
            return Ok(());
        }
        // The provider may not support revocation, the local session is gone either way.
        if let Err(e) = self
            .provider
            .request("wallet_revokePermissions", json!([{ "eth_accounts": {} }]))
            .await
        {
            warn!("wallet did not revoke permissions: {e}");
        }
        Ok(())
    }

    async fn sign_message(&self, message: Bytes) -> WalletResult<Bytes> {
        let address = self.address()?;
        self.request_as("personal_sign", json!([message, address]))
            .await
    }

    async fn sign_typed_data(&self, typed_data: TypedData) -> WalletResult<Bytes> {
        let address = self.address()?;
        let typed_data = serde_json::to_string(&typed_data)
            .map_err(|e| WalletError::Other(anyhow::anyhow!("encoding typed data: {e}")))?;
        self.request_as("eth_signTypedData_v4", json!([address, typed_data]))
            .await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> WalletResult<B256> {
        let address = self.address()?;
        let mut params = json!({
            "from": address,
            "to": tx.to,
            "value": tx.value,
            "data": tx.data,
        });
        if let Some(gas) = tx.gas_limit {
            params["gas"] = json!(U64::from(gas));
        }
        self.request_as("eth_sendTransaction", json!([params])).await
    }

    async fn sign_7702_authorization(
        &self,
        _delegatee: Address,
        _nonce: Option<u64>,
    ) -> WalletResult<Eip7702Auth> {
        self.address()?;
        Err(unsupported("sign_7702_authorization", Capability::CanSign7702Auth))
    }

    async fn submit_7702_authorization(&self, _delegatee: Address) -> WalletResult<B256> {
        self.address()?;
        Err(unsupported("submit_7702_authorization", Capability::CanSign7702Auth))
    }

    async fn create_smart_account(&self, _delegatee: Address) -> WalletResult<SmartAccount> {
        self.address()?;
        Err(unsupported("create_smart_account", Capability::CanCreateSmartAccount))
    }

    async fn send_user_operation(&self, _user_operation: UserOperation) -> WalletResult<B256> {
        self.address()?;
        Err(unsupported("send_user_operation", Capability::CanCreateSmartAccount))
    }

    async fn delegation_status(&self) -> WalletResult<DelegationStatus> {
        let address = self.address()?;
        let code: Bytes = self
            .request_as("eth_getCode", json!([address, "latest"]))
            .await?;
        let nonce: U64 = self
            .request_as("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(DelegationStatus {
            delegatee: parse_delegation_code(&code),
            nonce: nonce.to(),
        })
    }

    fn is_delegatee_supported(&self, delegatee: Address) -> bool {
        self.settings.supported_delegatees.contains(&delegatee)
    }

    fn account_changes(&self) -> Option<broadcast::Receiver<AccountChange>> {
        Some(self.provider.subscribe())
    }

    fn apply_account_change(&self, change: &AccountChange) -> Option<WalletAccount> {
        let mut guard = self.account.write();
        let account = guard.as_mut()?;
        match change {
            AccountChange::Accounts(accounts) => match accounts.first() {
                Some(address) => account.address = *address,
                None => {
                    guard.take();
                    return None;
                }
            },
            AccountChange::Chain(chain_id) => account.chain_id = Some(*chain_id),
            AccountChange::Disconnected => {
                guard.take();
                return None;
            }
        }
        Some(account.clone())
    }
}
