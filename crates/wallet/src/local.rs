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
    WalletAccount, WalletCapabilities, WalletType, ENTRY_POINT_V0_7,
};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    adapter::{require_account, WalletAdapter},
    error::{WalletError, WalletResult},
    remote::{BundlerService, KeyService},
};

/// Settings for [`LocalKeyWallet`]
#[derive(Clone, Copy, Debug)]
pub struct LocalKeyWalletSettings {
    /// Chain authorizations and user operations are signed for
    pub chain_id: u64,
    /// Entry point user operations are sent to
    pub entry_point: Address,
}

impl Default for LocalKeyWalletSettings {
    fn default() -> Self {
        Self {
            chain_id: 1,
            entry_point: ENTRY_POINT_V0_7,
        }
    }
}

/// Wallet backed by keys held on the key server
///
/// Only addresses, signatures and hashes cross into this process.
pub struct LocalKeyWallet<K, B> {
    keys: K,
    bundler: Option<B>,
    settings: LocalKeyWalletSettings,
    account: RwLock<Option<WalletAccount>>,
}

impl<K, B> LocalKeyWallet<K, B> {
    /// Creates a new local key wallet. Without a bundler, user operations fail.
    pub fn new(keys: K, bundler: Option<B>, settings: LocalKeyWalletSettings) -> Self {
        Self {
            keys,
            bundler,
            settings,
            account: RwLock::new(None),
        }
    }
}

impl<K, B> LocalKeyWallet<K, B>
where
    K: KeyService,
{
    fn connected(&self) -> WalletResult<(usize, WalletAccount)> {
        let account = require_account(self.account.read().clone())?;
        let index = account.key_index.ok_or(WalletError::NotConnected)?;
        Ok((index, account))
    }

    fn set_account(&self, key: KeyInfo) -> WalletAccount {
        let mut account = WalletAccount::local_key(key.address, key.index);
        account.chain_id = Some(self.settings.chain_id);
        *self.account.write() = Some(account.clone());
        info!("Connected key {} ({})", key.index, key.address);
        account
    }
}

#[async_trait]
impl<K, B> WalletAdapter for LocalKeyWallet<K, B>
where
    K: KeyService,
    B: BundlerService,
{
    fn wallet_type(&self) -> WalletType {
        WalletType::LocalKey
    }

    fn capabilities(&self) -> WalletCapabilities {
        WalletCapabilities::LOCAL_KEY
    }

    fn account(&self) -> Option<WalletAccount> {
        self.account.read().clone()
    }

    fn supports_key_index(&self) -> bool {
        true
    }

    async fn connect(&self) -> WalletResult<WalletAccount> {
        let keys = self.keys.list_addresses().await?;
        let first = keys.into_iter().next().ok_or(WalletError::NoKeysConfigured)?;
        Ok(self.set_account(first))
    }

    async fn connect_with_key(&self, index: usize) -> WalletResult<WalletAccount> {
        let keys = self.keys.list_addresses().await?;
        let available = keys.len();
        let key = keys
            .into_iter()
            .find(|k| k.index == index)
            .ok_or(WalletError::IndexOutOfRange { index, available })?;
        Ok(self.set_account(key))
    }

    async fn available_keys(&self) -> WalletResult<Vec<KeyInfo>> {
        self.keys.list_addresses().await
    }

    async fn disconnect(&self) -> WalletResult<()> {
        self.account.write().take();
        Ok(())
    }

    async fn sign_message(&self, message: Bytes) -> WalletResult<Bytes> {
        let (index, _) = self.connected()?;
        self.keys.sign_message(index, message).await
    }

    async fn sign_typed_data(&self, typed_data: TypedData) -> WalletResult<Bytes> {
        let (index, _) = self.connected()?;
        self.keys.sign_typed_data(index, typed_data).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> WalletResult<B256> {
        let (index, _) = self.connected()?;
        self.keys.send_transaction(index, tx).await
    }

    async fn sign_7702_authorization(
        &self,
        delegatee: Address,
        nonce: Option<u64>,
    ) -> WalletResult<Eip7702Auth> {
        let (index, _) = self.connected()?;
        self.keys
            .sign_authorization(index, delegatee, Some(self.settings.chain_id), nonce)
            .await
    }

    async fn submit_7702_authorization(&self, delegatee: Address) -> WalletResult<B256> {
        let (index, _) = self.connected()?;
        self.keys.submit_authorization(index, delegatee).await
    }

    async fn create_smart_account(&self, delegatee: Address) -> WalletResult<SmartAccount> {
        let (index, account) = self.connected()?;
        let status = self.keys.delegation_status(index).await?;
        if status.delegatee == Some(delegatee) {
            debug!("{} already delegates to {delegatee}", account.address);
        } else {
            let tx_hash = self.keys.submit_authorization(index, delegatee).await?;
            info!(
                "Delegating {} to {delegatee} in transaction {tx_hash}",
                account.address
            );
        }
        Ok(SmartAccount {
            address: account.address,
            delegatee,
            entry_point: self.settings.entry_point,
            chain_id: self.settings.chain_id,
        })
    }

    async fn send_user_operation(&self, mut user_operation: UserOperation) -> WalletResult<B256> {
        let (index, account) = self.connected()?;
        let bundler = self
            .bundler
            .as_ref()
            .ok_or_else(|| WalletError::BackendRequestFailed("no bundler configured".into()))?;
        if user_operation.sender == Address::ZERO {
            user_operation.sender = account.address;
        }

        let signature = self
            .keys
            .sign_user_operation(
                index,
                user_operation.clone(),
                self.settings.entry_point,
                self.settings.chain_id,
            )
            .await?;
        user_operation.signature = signature;
        bundler
            .send_user_operation(user_operation, self.settings.entry_point)
            .await
    }

    async fn delegation_status(&self) -> WalletResult<DelegationStatus> {
        let (index, _) = self.connected()?;
        self.keys.delegation_status(index).await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use aawallet_rpc::{KeyServerArgs, KeyServerTask};
    use aawallet_signer::{KeyStore, MockChainProvider};
    use aawallet_utils::retry::PollOpts;
    use alloy_primitives::address;
    use alloy_signer_local::PrivateKeySigner;
    use mockall::predicate::eq;
    use secrecy::SecretString;

    use super::*;
    use crate::{
        manager::WalletManager,
        remote::{MockBundlerService, MockKeyService, RemoteKeyService},
    };

    const KEY_0: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const KEY_1: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

    fn key_info(index: usize) -> KeyInfo {
        KeyInfo {
            index,
            address: Address::repeat_byte(index as u8 + 1),
        }
    }

    fn wallet(keys: MockKeyService) -> LocalKeyWallet<MockKeyService, MockBundlerService> {
        LocalKeyWallet::new(keys, None, LocalKeyWalletSettings::default())
    }

    #[tokio::test]
    async fn test_connect_without_keys() {
        let mut keys = MockKeyService::new();
        keys.expect_list_addresses().returning(|| Ok(vec![]));
        let wallet = wallet(keys);

        assert!(matches!(
            wallet.connect().await,
            Err(WalletError::NoKeysConfigured)
        ));
        assert!(wallet.account().is_none());
    }

    #[tokio::test]
    async fn test_connect_with_key_range() {
        let mut keys = MockKeyService::new();
        keys.expect_list_addresses()
            .returning(|| Ok(vec![key_info(0), key_info(1)]));
        let wallet = wallet(keys);

        let account = wallet.connect_with_key(1).await.unwrap();
        assert_eq!(account.key_index, Some(1));
        assert_eq!(account.address, key_info(1).address);
        assert_eq!(account.wallet_type, WalletType::LocalKey);

        assert!(matches!(
            wallet.connect_with_key(2).await,
            Err(WalletError::IndexOutOfRange {
                index: 2,
                available: 2
            })
        ));
        // failed connect keeps the previous account
        assert_eq!(wallet.account().unwrap().key_index, Some(1));
    }

    #[tokio::test]
    async fn test_operations_require_account() {
        let wallet = wallet(MockKeyService::new());
        assert!(matches!(
            wallet.sign_message(Bytes::from_static(b"hi")).await,
            Err(WalletError::NotConnected)
        ));
        assert!(matches!(
            wallet.delegation_status().await,
            Err(WalletError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_sign_uses_connected_index() {
        let mut keys = MockKeyService::new();
        keys.expect_list_addresses()
            .returning(|| Ok(vec![key_info(0), key_info(1)]));
        keys.expect_sign_message()
            .with(eq(1), eq(Bytes::from_static(b"hi")))
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(&[1; 65])));
        let wallet = wallet(keys);

        wallet.connect_with_key(1).await.unwrap();
        let sig = wallet.sign_message(Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(sig.len(), 65);
    }

    #[tokio::test]
    async fn test_create_smart_account_skips_existing_delegation() {
        let delegatee = address!("4Cd241E8d1510e30b2076397afc7508Ae59C66c9");
        let mut keys = MockKeyService::new();
        keys.expect_list_addresses()
            .returning(|| Ok(vec![key_info(0)]));
        keys.expect_delegation_status().returning(move |_| {
            Ok(DelegationStatus {
                delegatee: Some(delegatee),
                nonce: 3,
            })
        });
        keys.expect_submit_authorization().never();
        let wallet = wallet(keys);

        wallet.connect().await.unwrap();
        let account = wallet.create_smart_account(delegatee).await.unwrap();
        assert_eq!(account.address, key_info(0).address);
        assert_eq!(account.delegatee, delegatee);
        assert_eq!(account.entry_point, ENTRY_POINT_V0_7);
    }

    #[tokio::test]
    async fn test_create_smart_account_submits_delegation() {
        let delegatee = address!("4Cd241E8d1510e30b2076397afc7508Ae59C66c9");
        let mut keys = MockKeyService::new();
        keys.expect_list_addresses()
            .returning(|| Ok(vec![key_info(0)]));
        keys.expect_delegation_status()
            .returning(|_| Ok(DelegationStatus::default()));
        keys.expect_submit_authorization()
            .with(eq(0), eq(delegatee))
            .times(1)
            .returning(|_, _| Ok(B256::repeat_byte(9)));
        let wallet = wallet(keys);

        wallet.connect().await.unwrap();
        wallet.create_smart_account(delegatee).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_user_operation() {
        let mut keys = MockKeyService::new();
        keys.expect_list_addresses()
            .returning(|| Ok(vec![key_info(0)]));
        keys.expect_sign_user_operation()
            .withf(|index, uo, entry_point, chain_id| {
                *index == 0
                    && uo.sender == key_info(0).address
                    && *entry_point == ENTRY_POINT_V0_7
                    && *chain_id == 1
            })
            .returning(|_, _, _, _| Ok(Bytes::from_static(&[7; 65])));
        let mut bundler = MockBundlerService::new();
        bundler
            .expect_send_user_operation()
            .withf(|uo, _| uo.signature == Bytes::from_static(&[7; 65]))
            .returning(|_, _| Ok(B256::repeat_byte(1)));
        let wallet = LocalKeyWallet::new(keys, Some(bundler), LocalKeyWalletSettings::default());

        wallet.connect().await.unwrap();
        let hash = wallet
            .send_user_operation(UserOperation::default())
            .await
            .unwrap();
        assert_eq!(hash, B256::repeat_byte(1));
    }

    #[tokio::test]
    async fn test_send_user_operation_without_bundler() {
        let mut keys = MockKeyService::new();
        keys.expect_list_addresses()
            .returning(|| Ok(vec![key_info(0)]));
        keys.expect_sign_user_operation().never();
        let wallet = wallet(keys);

        wallet.connect().await.unwrap();
        assert!(matches!(
            wallet.send_user_operation(UserOperation::default()).await,
            Err(WalletError::BackendRequestFailed(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_configured_key_through_key_server() {
        let signers: Vec<PrivateKeySigner> = [KEY_0, KEY_1]
            .iter()
            .map(|k| k.parse().unwrap())
            .collect();
        let second = signers[1].address();
        let task = KeyServerTask::<MockChainProvider>::new(
            KeyServerArgs {
                port: 0,
                ..Default::default()
            },
            KeyStore::new(signers),
            None,
        );
        let (addr, handle) = task.start().await.unwrap();

        let keys = RemoteKeyService::new(&format!("http://{addr}"), None, Duration::from_secs(5))
            .unwrap();
        let wallet: LocalKeyWallet<_, MockBundlerService> =
            LocalKeyWallet::new(keys, None, LocalKeyWalletSettings::default());
        let manager = WalletManager::new(vec![Arc::new(wallet) as Arc<dyn WalletAdapter>]);

        let account = manager
            .connect_wallet(WalletType::LocalKey, Some(1))
            .await
            .unwrap();
        assert_eq!(account.address, second);
        assert_eq!(manager.current_account().unwrap().address, second);
        assert_eq!(
            manager
                .get_available_keys(WalletType::LocalKey)
                .await
                .unwrap()
                .len(),
            2
        );

        assert!(matches!(
            manager.connect_wallet(WalletType::LocalKey, Some(7)).await,
            Err(WalletError::IndexOutOfRange {
                index: 7,
                available: 2
            })
        ));

        handle.stop().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_auto_connect_rejected_token_fails_fast() {
        let signer: PrivateKeySigner = KEY_0.parse().unwrap();
        let task = KeyServerTask::<MockChainProvider>::new(
            KeyServerArgs {
                port: 0,
                auth_token: Some(SecretString::from("s3cret")),
                ..Default::default()
            },
            KeyStore::new(vec![signer]),
            None,
        );
        let (addr, handle) = task.start().await.unwrap();

        let wrong = SecretString::from("wrong");
        let keys = RemoteKeyService::new(
            &format!("http://{addr}"),
            Some(&wrong),
            Duration::from_secs(5),
        )
        .unwrap();
        let wallet: LocalKeyWallet<_, MockBundlerService> =
            LocalKeyWallet::new(keys, None, LocalKeyWalletSettings::default());
        let manager = WalletManager::new(vec![Arc::new(wallet) as Arc<dyn WalletAdapter>]);

        // a retried 401 would take at least two full delays
        let opts = PollOpts {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        };
        let started = std::time::Instant::now();
        let result = manager.auto_connect_default(opts).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        match result {
            Err(WalletError::BackendRequestFailed(msg)) => assert!(msg.contains("401")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!manager.is_connected());

        handle.stop().unwrap();
    }
}
