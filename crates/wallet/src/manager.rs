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

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use aawallet_types::{
    filter_current_delegatee, Capability, DelegateeContract, Eip7702Auth, KeyInfo, SmartAccount,
    TransactionRequest, UserOperation, WalletAccount, WalletCapabilities, WalletType,
    DELEGATEE_CATALOG,
};
use aawallet_utils::retry::{self, PollOpts};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, B256};
use metrics::Counter;
use metrics_derive::Metrics;
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    adapter::{AccountChange, WalletAdapter},
    error::{WalletError, WalletResult},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Session state transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was committed
    Connected {
        /// Connected account
        account: WalletAccount,
        /// Generation of the new session
        generation: u64,
    },
    /// The wallet reported a different account or chain
    AccountChanged {
        /// Updated account
        account: WalletAccount,
        /// Generation after the change
        generation: u64,
    },
    /// The session ended
    Disconnected {
        /// Generation after the session ended
        generation: u64,
    },
}

struct Session {
    adapter: Arc<dyn WalletAdapter>,
    account: WalletAccount,
    generation: u64,
    delegation: Option<Address>,
    nonce: Option<u64>,
    watcher: Option<CancellationToken>,
}

impl Session {
    fn stop_watcher(&self) {
        if let Some(token) = &self.watcher {
            token.cancel();
        }
    }
}

struct Inner {
    adapters: HashMap<WalletType, Arc<dyn WalletAdapter>>,
    session: RwLock<Option<Session>>,
    generation: AtomicU64,
    mutation: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
    metrics: ManagerMetrics,
}

impl Inner {
    /// Bumps the generation. Call with the session write lock held.
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Multiplexes wallet operations onto at most one active adapter
///
/// Session mutations (connect, switch, disconnect, auto-connect) run one at
/// a time. Every committed mutation bumps the session generation; an
/// operation issued under one generation fails with
/// [`WalletError::StaleSession`] if the generation moved before it returns.
///
/// Cloning is cheap and clones share the session.
#[derive(Clone)]
pub struct WalletManager {
    inner: Arc<Inner>,
}

impl WalletManager {
    /// Creates a manager over `adapters`, at most one per wallet type.
    ///
    /// Later adapters replace earlier ones of the same type.
    pub fn new(adapters: Vec<Arc<dyn WalletAdapter>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|a| (a.wallet_type(), a))
            .collect();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                adapters,
                session: RwLock::new(None),
                generation: AtomicU64::new(0),
                mutation: Mutex::new(()),
                events,
                metrics: ManagerMetrics::default(),
            }),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Wallet types with a registered adapter
    pub fn wallet_types(&self) -> Vec<WalletType> {
        self.inner.adapters.keys().copied().collect()
    }

    /// Current session generation
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Connected account
    pub fn current_account(&self) -> Option<WalletAccount> {
        self.inner.session.read().as_ref().map(|s| s.account.clone())
    }

    /// Whether a session is active
    pub fn is_connected(&self) -> bool {
        self.inner.session.read().is_some()
    }

    /// Wallet type of the active session
    pub fn current_wallet_type(&self) -> Option<WalletType> {
        self.inner
            .session
            .read()
            .as_ref()
            .map(|s| s.adapter.wallet_type())
    }

    /// Capabilities of the active adapter
    pub fn capabilities(&self) -> Option<WalletCapabilities> {
        self.inner
            .session
            .read()
            .as_ref()
            .map(|s| s.adapter.capabilities())
    }

    /// Delegation target cached by [`WalletManager::check_current_delegation`]
    pub fn cached_delegation(&self) -> Option<Address> {
        self.inner.session.read().as_ref().and_then(|s| s.delegation)
    }

    /// Nonce cached by [`WalletManager::check_current_delegation`]
    pub fn cached_nonce(&self) -> Option<u64> {
        self.inner.session.read().as_ref().and_then(|s| s.nonce)
    }

    /// Keys the adapter for `wallet_type` can connect by index
    pub async fn get_available_keys(&self, wallet_type: WalletType) -> WalletResult<Vec<KeyInfo>> {
        self.adapter(wallet_type)?.available_keys().await
    }

    /// Connect a wallet of `wallet_type`, by key index when given and supported.
    ///
    /// On success the new session replaces any previous one in a single step.
    pub async fn connect_wallet(
        &self,
        wallet_type: WalletType,
        key_index: Option<usize>,
    ) -> WalletResult<WalletAccount> {
        let _guard = self.inner.mutation.lock().await;
        self.connect_locked(wallet_type, key_index).await
    }

    /// Disconnect the current session, then connect `wallet_type`.
    ///
    /// A failed connect leaves the manager disconnected.
    pub async fn switch_wallet(
        &self,
        wallet_type: WalletType,
        key_index: Option<usize>,
    ) -> WalletResult<WalletAccount> {
        let _guard = self.inner.mutation.lock().await;
        self.disconnect_locked().await;
        self.connect_locked(wallet_type, key_index).await
    }

    /// End the current session. Does nothing when disconnected.
    pub async fn disconnect_wallet(&self) -> WalletResult<()> {
        let _guard = self.inner.mutation.lock().await;
        self.disconnect_locked().await;
        Ok(())
    }

    /// Connect the first server-held key once the key server has keys.
    ///
    /// Empty enumerations and an unreachable key server are retried per
    /// `opts`; errors the key server answers with are returned. Returns
    /// `Ok(None)` when the keys never show up, and the current account when
    /// a session is already active.
    pub async fn auto_connect_default(&self, opts: PollOpts) -> WalletResult<Option<WalletAccount>> {
        let _guard = self.inner.mutation.lock().await;
        if let Some(account) = self.current_account() {
            return Ok(Some(account));
        }
        let adapter = self.adapter(WalletType::LocalKey)?;

        let keys = retry::poll_until_ready(
            "local keys",
            || {
                let adapter = adapter.clone();
                async move {
                    match adapter.available_keys().await {
                        Ok(keys) if keys.is_empty() => Ok(None),
                        Ok(keys) => Ok(Some(keys)),
                        Err(WalletError::NoKeysConfigured) => Ok(None),
                        Err(WalletError::BackendUnavailable(e)) => {
                            debug!("key server not ready: {e}");
                            Ok(None)
                        }
                        Err(e) => Err(e),
                    }
                }
            },
            opts,
        )
        .await?;

        match keys.and_then(|k| k.into_iter().next()) {
            Some(key) => self
                .connect_locked(WalletType::LocalKey, Some(key.index))
                .await
                .map(Some),
            None => {
                info!(
                    "No local keys after {} attempts, skipping auto-connect",
                    opts.max_attempts
                );
                Ok(None)
            }
        }
    }

    /// EIP-191 signature from the connected account
    pub async fn sign_message(&self, message: Bytes) -> WalletResult<Bytes> {
        self.with_session(
            "sign_message",
            Some(Capability::CanSign),
            |a| async move { a.sign_message(message).await },
        )
        .await
    }

    /// EIP-712 signature from the connected account
    pub async fn sign_typed_data(&self, typed_data: TypedData) -> WalletResult<Bytes> {
        self.with_session(
            "sign_typed_data",
            Some(Capability::CanSign),
            |a| async move { a.sign_typed_data(typed_data).await },
        )
        .await
    }

    /// Sign and send a transaction from the connected account
    pub async fn send_transaction(&self, tx: TransactionRequest) -> WalletResult<B256> {
        self.with_session(
            "send_transaction",
            Some(Capability::CanSendTransaction),
            |a| async move { a.send_transaction(tx).await },
        )
        .await
    }

    /// Sign an EIP-7702 authorization
    pub async fn sign_7702_authorization(
        &self,
        delegatee: Address,
        nonce: Option<u64>,
    ) -> WalletResult<Eip7702Auth> {
        self.with_session(
            "sign_7702_authorization",
            Some(Capability::CanSign7702Auth),
            |a| async move { a.sign_7702_authorization(delegatee, nonce).await },
        )
        .await
    }

    /// Delegate the connected account to `delegatee` on chain
    pub async fn submit_7702_authorization(&self, delegatee: Address) -> WalletResult<B256> {
        self.with_session(
            "submit_7702_authorization",
            Some(Capability::CanSign7702Auth),
            |a| async move { a.submit_7702_authorization(delegatee).await },
        )
        .await
    }

    /// Turn the connected account into a smart account
    pub async fn create_smart_account(&self, delegatee: Address) -> WalletResult<SmartAccount> {
        self.with_session(
            "create_smart_account",
            Some(Capability::CanCreateSmartAccount),
            |a| async move { a.create_smart_account(delegatee).await },
        )
        .await
    }

    /// Sign and submit a user operation
    pub async fn send_user_operation(&self, user_operation: UserOperation) -> WalletResult<B256> {
        self.with_session(
            "send_user_operation",
            Some(Capability::CanCreateSmartAccount),
            |a| async move { a.send_user_operation(user_operation).await },
        )
        .await
    }

    /// Whether the active adapter accepts `delegatee`
    pub fn is_delegatee_supported(&self, delegatee: Address) -> WalletResult<bool> {
        let (adapter, _) = self.snapshot()?;
        Ok(adapter.is_delegatee_supported(delegatee))
    }

    /// Catalog delegatees the adapter accepts, minus the current delegation
    pub fn available_delegatees(&self) -> WalletResult<Vec<DelegateeContract>> {
        let (adapter, _) = self.snapshot()?;
        self.require_capability(
            &adapter,
            "available_delegatees",
            Capability::CanSign7702Auth,
        )?;
        let supported: Vec<_> = DELEGATEE_CATALOG
            .iter()
            .filter(|d| adapter.is_delegatee_supported(d.address))
            .copied()
            .collect();
        Ok(filter_current_delegatee(
            self.cached_delegation(),
            &supported,
        ))
    }

    /// Refresh the cached delegation target and nonce. No-op when disconnected.
    pub async fn check_current_delegation(&self) -> WalletResult<()> {
        let Ok((adapter, issued)) = self.snapshot() else {
            return Ok(());
        };
        let status = adapter.delegation_status().await?;

        let mut session = self.inner.session.write();
        match session.as_mut() {
            Some(s) if s.generation == issued => {
                s.delegation = status.delegatee;
                s.nonce = Some(status.nonce);
                Ok(())
            }
            _ => Err(self.stale(issued)),
        }
    }

    fn adapter(&self, wallet_type: WalletType) -> WalletResult<Arc<dyn WalletAdapter>> {
        self.inner
            .adapters
            .get(&wallet_type)
            .cloned()
            .ok_or(WalletError::UnknownWalletType(wallet_type))
    }

    fn snapshot(&self) -> WalletResult<(Arc<dyn WalletAdapter>, u64)> {
        self.inner
            .session
            .read()
            .as_ref()
            .map(|s| (s.adapter.clone(), s.generation))
            .ok_or(WalletError::NotConnected)
    }

    fn stale(&self, issued: u64) -> WalletError {
        self.inner.metrics.stale_operations.increment(1);
        WalletError::StaleSession {
            issued,
            current: self.generation(),
        }
    }

    fn ensure_current(&self, issued: u64) -> WalletResult<()> {
        if self.generation() == issued {
            Ok(())
        } else {
            Err(self.stale(issued))
        }
    }

    fn require_capability(
        &self,
        adapter: &Arc<dyn WalletAdapter>,
        operation: &'static str,
        capability: Capability,
    ) -> WalletResult<()> {
        if adapter.capabilities().supports(capability) {
            Ok(())
        } else {
            self.inner.metrics.capability_rejections.increment(1);
            Err(WalletError::CapabilityUnsupported {
                operation,
                capability: capability.into(),
            })
        }
    }

    async fn with_session<T, F, Fut>(
        &self,
        operation: &'static str,
        capability: Option<Capability>,
        f: F,
    ) -> WalletResult<T>
    where
        F: FnOnce(Arc<dyn WalletAdapter>) -> Fut,
        Fut: Future<Output = WalletResult<T>>,
    {
        let (adapter, issued) = self.snapshot()?;
        if let Some(capability) = capability {
            self.require_capability(&adapter, operation, capability)?;
        }
        self.ensure_current(issued)?;
        let result = f(adapter).await;
        self.ensure_current(issued)?;
        result
    }

    async fn connect_locked(
        &self,
        wallet_type: WalletType,
        key_index: Option<usize>,
    ) -> WalletResult<WalletAccount> {
        let adapter = self.adapter(wallet_type)?;
        let result = match key_index {
            Some(index) if adapter.supports_key_index() => adapter.connect_with_key(index).await,
            _ => adapter.connect().await,
        };
        let account = match result {
            Ok(account) => account,
            Err(e) => {
                self.inner.metrics.connect_failures.increment(1);
                warn!("Failed to connect {wallet_type} wallet: {e}");
                return Err(e);
            }
        };

        let changes = adapter.account_changes();
        let watcher = changes.as_ref().map(|_| CancellationToken::new());
        let (generation, replaced) = {
            let mut session = self.inner.session.write();
            let generation = self.inner.next_generation();
            let replaced = session.replace(Session {
                adapter: adapter.clone(),
                account: account.clone(),
                generation,
                delegation: None,
                nonce: None,
                watcher: watcher.clone(),
            });
            (generation, replaced)
        };
        self.inner.metrics.connects.increment(1);
        info!(
            "Connected {wallet_type} wallet {} (generation {generation})",
            account.address
        );
        self.inner.emit(SessionEvent::Connected {
            account: account.clone(),
            generation,
        });

        if let Some(old) = replaced {
            old.stop_watcher();
            if !Arc::ptr_eq(&old.adapter, &adapter) {
                if let Err(e) = old.adapter.disconnect().await {
                    warn!("Failed to disconnect replaced wallet: {e}");
                }
            }
        }
        if let (Some(changes), Some(token)) = (changes, watcher) {
            tokio::spawn(watch_account_changes(
                Arc::downgrade(&self.inner),
                changes,
                generation,
                token,
            ));
        }
        Ok(account)
    }

    async fn disconnect_locked(&self) {
        let (old, generation) = {
            let mut session = self.inner.session.write();
            let Some(old) = session.take() else {
                return;
            };
            (old, self.inner.next_generation())
        };
        old.stop_watcher();
        self.inner.metrics.disconnects.increment(1);
        info!("Disconnected {} wallet", old.adapter.wallet_type());
        self.inner.emit(SessionEvent::Disconnected { generation });

        if let Err(e) = old.adapter.disconnect().await {
            warn!("Wallet disconnect failed: {e}");
        }
    }
}

/// Applies out-of-band account changes to the session it was started for.
///
/// Stops when cancelled, when the session is replaced or ends, or when the
/// adapter closes its event stream.
async fn watch_account_changes(
    inner: std::sync::Weak<Inner>,
    mut changes: broadcast::Receiver<AccountChange>,
    mut generation: u64,
    token: CancellationToken,
) {
    loop {
        let change = tokio::select! {
            _ = token.cancelled() => return,
            change = changes.recv() => change,
        };
        let change = match change {
            Ok(change) => change,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Missed {n} wallet account changes");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        let Some(inner) = inner.upgrade() else {
            return;
        };

        let event = {
            let mut guard = inner.session.write();
            let Some(session) = guard.as_mut().filter(|s| s.generation == generation) else {
                return;
            };
            match session.adapter.apply_account_change(&change) {
                Some(account) if account == session.account => continue,
                Some(account) => {
                    if account.address != session.account.address {
                        session.delegation = None;
                        session.nonce = None;
                    }
                    generation = inner.next_generation();
                    session.generation = generation;
                    session.account = account.clone();
                    SessionEvent::AccountChanged {
                        account,
                        generation,
                    }
                }
                None => {
                    guard.take();
                    inner.metrics.disconnects.increment(1);
                    SessionEvent::Disconnected {
                        generation: inner.next_generation(),
                    }
                }
            }
        };
        debug!("Wallet reported {change:?}");
        let ended = matches!(event, SessionEvent::Disconnected { .. });
        inner.emit(event);
        if ended {
            info!("Wallet ended the session");
            return;
        }
    }
}

#[derive(Metrics)]
#[metrics(scope = "wallet_manager")]
struct ManagerMetrics {
    #[metric(describe = "the number of committed wallet connections.")]
    connects: Counter,
    #[metric(describe = "the number of failed wallet connections.")]
    connect_failures: Counter,
    #[metric(describe = "the number of ended wallet sessions.")]
    disconnects: Counter,
    #[metric(describe = "the number of operations rejected for a missing capability.")]
    capability_rejections: Counter,
    #[metric(describe = "the number of operations whose session changed mid-flight.")]
    stale_operations: Counter,
}
