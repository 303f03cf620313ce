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
    DelegationStatus, Eip7702Auth, KeyInfo, SmartAccount, TransactionRequest, UserOperation,
    WalletAccount, WalletCapabilities, WalletType,
};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, B256};
#[cfg(feature = "test-utils")]
use mockall::automock;
use tokio::sync::broadcast;

use crate::error::{WalletError, WalletResult};

/// Out-of-band change reported by an injected wallet
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AccountChange {
    /// Authorized accounts changed, first entry is the selected one
    Accounts(Vec<Address>),
    /// Selected chain changed
    Chain(u64),
    /// The wallet disconnected
    Disconnected,
}

/// A signing backend behind the wallet manager
///
/// Operations other than `connect*` fail with [`WalletError::NotConnected`]
/// until the adapter holds an account.
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Backend kind
    fn wallet_type(&self) -> WalletType;

    /// Operations this backend supports
    fn capabilities(&self) -> WalletCapabilities;

    /// Connected account, if any
    fn account(&self) -> Option<WalletAccount>;

    /// Whether [`WalletAdapter::connect_with_key`] is available
    fn supports_key_index(&self) -> bool {
        false
    }

    /// Connect the backend's default identity
    async fn connect(&self) -> WalletResult<WalletAccount>;

    /// Connect a specific key by enumeration index
    async fn connect_with_key(&self, index: usize) -> WalletResult<WalletAccount> {
        let _ = index;
        Err(WalletError::CapabilityUnsupported {
            operation: "connect_with_key",
            capability: "keyIndex",
        })
    }

    /// Keys the backend can connect by index
    async fn available_keys(&self) -> WalletResult<Vec<KeyInfo>> {
        Ok(vec![])
    }

    /// Drop the connected account. Best effort.
    async fn disconnect(&self) -> WalletResult<()>;

    /// EIP-191 signature
    async fn sign_message(&self, message: Bytes) -> WalletResult<Bytes>;

    /// EIP-712 signature
    async fn sign_typed_data(&self, typed_data: TypedData) -> WalletResult<Bytes>;

    /// Sign and send a transaction
    async fn send_transaction(&self, tx: TransactionRequest) -> WalletResult<B256>;

    /// Sign an EIP-7702 authorization for the connected account
    async fn sign_7702_authorization(
        &self,
        delegatee: Address,
        nonce: Option<u64>,
    ) -> WalletResult<Eip7702Auth>;

    /// Delegate the connected account on chain
    async fn submit_7702_authorization(&self, delegatee: Address) -> WalletResult<B256>;

    /// Turn the connected account into a smart account delegating to `delegatee`
    async fn create_smart_account(&self, delegatee: Address) -> WalletResult<SmartAccount>;

    /// Sign and submit a user operation from the connected account
    async fn send_user_operation(&self, user_operation: UserOperation) -> WalletResult<B256>;

    /// On-chain delegation target and nonce of the connected account
    async fn delegation_status(&self) -> WalletResult<DelegationStatus>;

    /// Whether the backend can delegate to `delegatee`
    fn is_delegatee_supported(&self, delegatee: Address) -> bool {
        let _ = delegatee;
        true
    }

    /// Stream of out-of-band account changes, for backends that report them
    fn account_changes(&self) -> Option<broadcast::Receiver<AccountChange>> {
        None
    }

    /// Apply an out-of-band change to the cached account
    ///
    /// Returns the updated account, or `None` when no account remains.
    fn apply_account_change(&self, change: &AccountChange) -> Option<WalletAccount> {
        let _ = change;
        self.account()
    }
}

pub(crate) fn require_account(account: Option<WalletAccount>) -> WalletResult<WalletAccount> {
    account.ok_or(WalletError::NotConnected)
}
