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

//! EIP-1193 provider abstraction and an HTTP JSON-RPC implementation.

use std::time::Duration;

use alloy_primitives::{Address, U64};
use async_trait::async_trait;
use jsonrpsee::{
    core::{client::ClientT, params::ArrayParams, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
};
#[cfg(feature = "test-utils")]
use mockall::automock;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::AccountChange;

/// EIP-1193 user rejected request
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 provider disconnected
pub const DISCONNECTED_CODE: i64 = 4900;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Error returned by an [`Eip1193Provider`]
#[derive(Clone, Debug, thiserror::Error)]
pub enum ProviderRpcError {
    /// The provider could not be reached
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    /// The provider answered with an error
    #[error("provider error {code}: {message}")]
    Rpc {
        /// EIP-1193 or JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },
}

impl ProviderRpcError {
    /// True if the user declined the request
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == USER_REJECTED_CODE)
    }
}

/// A wallet provider following the EIP-1193 request and event shape
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Send a request, `params` is a JSON array
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    /// `accountsChanged`, `chainChanged` and `disconnect` events
    fn subscribe(&self) -> broadcast::Receiver<AccountChange>;
}

/// Settings for [`HttpEip1193Provider`]
#[derive(Clone, Copy, Debug)]
pub struct HttpProviderSettings {
    /// Request timeout
    pub request_timeout: Duration,
    /// How often `eth_accounts` and `eth_chainId` are polled for changes
    pub poll_interval: Duration,
}

impl Default for HttpProviderSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// [`Eip1193Provider`] for wallets exposing a JSON-RPC endpoint, such as Frame
///
/// Events are synthesized by polling. Polling stops when the provider is dropped.
#[derive(Debug)]
pub struct HttpEip1193Provider {
    client: HttpClient,
    events: broadcast::Sender<AccountChange>,
    shutdown: CancellationToken,
}

impl HttpEip1193Provider {
    /// Connects to `url` and starts polling. Must be called within a tokio runtime.
    pub fn new(url: &str, settings: HttpProviderSettings) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(settings.request_timeout)
            .build(url)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        tokio::spawn(poll_changes(
            client.clone(),
            events.clone(),
            settings.poll_interval,
            shutdown.clone(),
        ));

        Ok(Self {
            client,
            events,
            shutdown,
        })
    }
}

impl Drop for HttpEip1193Provider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl Eip1193Provider for HttpEip1193Provider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let params = to_array_params(params)?;
        self.client
            .request::<Value, _>(method, params)
            .await
            .map_err(provider_err)
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountChange> {
        self.events.subscribe()
    }
}

fn to_array_params(params: Value) -> Result<ArrayParams, ProviderRpcError> {
    let mut out = ArrayParams::new();
    let items = match params {
        Value::Array(items) => items,
        Value::Null => vec![],
        other => vec![other],
    };
    for item in items {
        out.insert(item).map_err(|e| ProviderRpcError::Rpc {
            code: -32602,
            message: e.to_string(),
        })?;
    }
    Ok(out)
}

fn provider_err(err: ClientError) -> ProviderRpcError {
    match err {
        ClientError::Call(err) => ProviderRpcError::Rpc {
            code: err.code().into(),
            message: err.message().to_string(),
        },
        ClientError::ParseError(e) => ProviderRpcError::Rpc {
            code: -32700,
            message: e.to_string(),
        },
        other => ProviderRpcError::Unreachable(other.to_string()),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct WalletState {
    accounts: Vec<Address>,
    chain_id: u64,
}

async fn fetch_state(client: &HttpClient) -> Result<WalletState, ClientError> {
    let accounts: Vec<Address> = client.request("eth_accounts", ArrayParams::new()).await?;
    let chain_id: U64 = client.request("eth_chainId", ArrayParams::new()).await?;
    Ok(WalletState {
        accounts,
        chain_id: chain_id.to(),
    })
}

async fn poll_changes(
    client: HttpClient,
    events: broadcast::Sender<AccountChange>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut last: Option<WalletState> = None;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("provider polling stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        match fetch_state(&client).await {
            Ok(state) => {
                for change in diff_state(last.as_ref(), &state) {
                    // no subscribers is fine
                    let _ = events.send(change);
                }
                last = Some(state);
            }
            Err(e) => {
                if last.take().is_some() {
                    warn!("lost connection to wallet provider: {e}");
                    let _ = events.send(AccountChange::Disconnected);
                }
            }
        }
    }
}

fn diff_state(last: Option<&WalletState>, state: &WalletState) -> Vec<AccountChange> {
    let Some(last) = last else {
        return vec![];
    };
    let mut changes = vec![];
    if last.accounts != state.accounts {
        changes.push(AccountChange::Accounts(state.accounts.clone()));
    }
    if last.chain_id != state.chain_id {
        changes.push(AccountChange::Chain(state.chain_id));
    }
    changes
}

#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use jsonrpsee::{
        server::{ServerBuilder, ServerHandle},
        types::ErrorObjectOwned,
        RpcModule,
    };
    use parking_lot::Mutex;

    use super::*;

    type Accounts = Arc<Mutex<Vec<Address>>>;

    async fn wallet_server(accounts: Accounts) -> (SocketAddr, ServerHandle) {
        let mut module = RpcModule::new(accounts);
        module
            .register_method("eth_accounts", |_, accounts, _| accounts.lock().clone())
            .unwrap();
        module
            .register_method("eth_chainId", |_, _, _| Ok::<_, ErrorObjectOwned>(U64::from(1)))
            .unwrap();
        module
            .register_method("eth_requestAccounts", |_, _, _| {
                Err::<Vec<Address>, _>(ErrorObjectOwned::owned(
                    4001,
                    "User rejected the request.",
                    None::<()>,
                ))
            })
            .unwrap();
        let server = ServerBuilder::default()
            .build("127.0.0.1:0")
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        (addr, server.start(module))
    }

    #[test]
    fn test_diff_state() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let last = WalletState {
            accounts: vec![a],
            chain_id: 1,
        };
        assert!(diff_state(None, &last).is_empty());
        assert!(diff_state(Some(&last), &last).is_empty());

        let next = WalletState {
            accounts: vec![b],
            chain_id: 10,
        };
        assert_eq!(
            diff_state(Some(&last), &next),
            vec![AccountChange::Accounts(vec![b]), AccountChange::Chain(10)]
        );
    }

    #[test]
    fn test_user_rejection() {
        let err = ProviderRpcError::Rpc {
            code: USER_REJECTED_CODE,
            message: "no".into(),
        };
        assert!(err.is_user_rejection());
        assert!(!ProviderRpcError::Unreachable("down".into()).is_user_rejection());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_and_errors() {
        let accounts: Accounts = Arc::new(Mutex::new(vec![Address::repeat_byte(1)]));
        let (addr, handle) = wallet_server(accounts).await;
        let provider = HttpEip1193Provider::new(
            &format!("http://{addr}"),
            HttpProviderSettings::default(),
        )
        .unwrap();

        let result = provider
            .request("eth_accounts", Value::Array(vec![]))
            .await
            .unwrap();
        let got: Vec<Address> = serde_json::from_value(result).unwrap();
        assert_eq!(got, vec![Address::repeat_byte(1)]);

        let err = provider
            .request("eth_requestAccounts", Value::Null)
            .await
            .unwrap_err();
        assert!(err.is_user_rejection());

        handle.stop().unwrap();
        handle.stopped().await;
        let err = provider
            .request("eth_accounts", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderRpcError::Unreachable(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_polling_emits_account_changes() {
        let accounts: Accounts = Arc::new(Mutex::new(vec![Address::repeat_byte(1)]));
        let (addr, handle) = wallet_server(accounts.clone()).await;
        let provider = HttpEip1193Provider::new(
            &format!("http://{addr}"),
            HttpProviderSettings {
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
        )
        .unwrap();
        let mut events = provider.subscribe();

        // let the first poll record the initial state
        tokio::time::sleep(Duration::from_millis(100)).await;
        *accounts.lock() = vec![Address::repeat_byte(2)];

        let change = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            change,
            AccountChange::Accounts(vec![Address::repeat_byte(2)])
        );

        handle.stop().unwrap();
        let change = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change, AccountChange::Disconnected);
    }
}
