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

use std::{net::SocketAddr, sync::Arc, time::Duration};

use aawallet_signer::{ChainProvider, KeyStore, TransactionSubmitter};
use anyhow::{bail, Context};
use jsonrpsee::{
    server::{
        middleware::{http::ProxyGetRequestLayer, rpc::RpcServiceBuilder},
        ServerBuilder, ServerHandle,
    },
    RpcModule,
};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    auth::BearerAuthLayer,
    health::{HealthChecker, SystemApiServer},
    keys::{KeysApi, KeysApiServer},
    metrics::RpcMetricsMiddleware,
};

/// Key server arguments.
#[derive(Debug, Clone)]
pub struct Args {
    /// Host to listen on.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Bearer token required on every request except `GET /health`.
    ///
    /// Mandatory when `host` is not a loopback address.
    pub auth_token: Option<SecretString>,
    /// RPC timeout.
    pub rpc_timeout: Duration,
    /// Max number of connections.
    pub max_connections: u32,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            auth_token: None,
            rpc_timeout: Duration::from_secs(20),
            max_connections: 100,
        }
    }
}

/// Key server task.
///
/// Serves the `keys_` namespace over HTTP. Chain-facing methods need a
/// [`TransactionSubmitter`]; without one they fail with a chain error.
#[derive(Debug)]
pub struct KeyServerTask<P> {
    args: Args,
    keys: Arc<KeyStore>,
    submitter: Option<Arc<TransactionSubmitter<P>>>,
}

impl<P> KeyServerTask<P>
where
    P: ChainProvider + 'static,
{
    /// Creates a new key server task.
    pub fn new(args: Args, keys: KeyStore, submitter: Option<TransactionSubmitter<P>>) -> Self {
        Self {
            args,
            keys: Arc::new(keys),
            submitter: submitter.map(Arc::new),
        }
    }

    /// Binds and starts the server, returning the bound address.
    pub async fn start(&self) -> anyhow::Result<(SocketAddr, ServerHandle)> {
        let addr = resolve_listen_addr(&self.args.host, self.args.port).await?;
        if !addr.ip().is_loopback() && self.args.auth_token.is_none() {
            bail!("refusing to serve keys on non-loopback address {addr} without an auth token");
        }
        if self.keys.is_empty() {
            tracing::warn!("key server starting with no keys configured");
        }

        let mut module = RpcModule::new(());
        module.merge(KeysApi::new(self.keys.clone(), self.submitter.clone()).into_rpc())?;
        module.merge(HealthChecker::new(self.keys.clone()).into_rpc())?;

        let http_middleware = tower::ServiceBuilder::new()
            .option_layer(self.args.auth_token.clone().map(BearerAuthLayer::new))
            // Proxy `GET /health` requests to internal `system_health` method.
            .layer(ProxyGetRequestLayer::new("/health", "system_health")?)
            .timeout(self.args.rpc_timeout);
        let rpc_middleware = RpcServiceBuilder::new().layer_fn(RpcMetricsMiddleware::new);

        let server = ServerBuilder::default()
            .set_http_middleware(http_middleware)
            .set_rpc_middleware(rpc_middleware)
            .max_connections(self.args.max_connections)
            .http_only()
            .build(addr)
            .await?;
        let local_addr = server.local_addr()?;
        let handle = server.start(module);

        info!(
            "Started key server on {} with {} keys",
            local_addr,
            self.keys.len()
        );
        Ok((local_addr, handle))
    }

    /// Runs the server until it stops or `shutdown_token` is cancelled.
    pub async fn run(self, shutdown_token: CancellationToken) -> anyhow::Result<()> {
        let (_, handle) = self.start().await?;

        tokio::select! {
            _ = handle.clone().stopped() => {
                tracing::error!("Key server stopped unexpectedly");
                bail!("Key server stopped unexpectedly")
            }
            _ = shutdown_token.cancelled() => {
                let _ = handle.stop();
                tracing::info!("Server shutdown");
                Ok(())
            }
        }
    }
}

/// Resolves `host`, preferring an IPv4 address when the name has several.
async fn resolve_listen_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((bare, port))
        .await
        .with_context(|| format!("invalid listen address {host}:{port}"))?
        .collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or(addrs.first())
        .copied()
        .with_context(|| format!("listen address {host} resolved to nothing"))
}

#[cfg(test)]
mod tests {
    use aawallet_signer::MockChainProvider;
    use alloy_primitives::Address;
    use alloy_signer_local::PrivateKeySigner;
    use jsonrpsee::core::ClientError;

    use super::*;
    use crate::{
        error::{IndexOutOfRangeData, CHAIN_UNAVAILABLE_CODE, KEY_INDEX_OUT_OF_RANGE_CODE},
        new_http_client, KeysApiClient,
    };

    fn task(keys: Vec<PrivateKeySigner>, auth_token: Option<&str>) -> KeyServerTask<MockChainProvider> {
        let args = Args {
            port: 0,
            auth_token: auth_token.map(SecretString::from),
            ..Default::default()
        };
        KeyServerTask::new(args, KeyStore::new(keys), None)
    }

    #[tokio::test]
    async fn test_resolve_listen_addr() {
        let addr = resolve_listen_addr("127.0.0.1", 80).await.unwrap();
        assert_eq!(addr, "127.0.0.1:80".parse().unwrap());
        assert!(addr.ip().is_loopback());

        let addr = resolve_listen_addr("[::1]", 80).await.unwrap();
        assert_eq!(addr, "[::1]:80".parse().unwrap());

        let addr = resolve_listen_addr("localhost", 80).await.unwrap();
        assert!(addr.ip().is_loopback());

        let addr = resolve_listen_addr("0.0.0.0", 80).await.unwrap();
        assert!(!addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_localhost_bind_without_token() {
        let mut t = task(vec![PrivateKeySigner::random()], None);
        t.args.host = "localhost".to_string();
        let (addr, handle) = t.start().await.unwrap();
        assert!(addr.ip().is_loopback());

        let client = new_http_client(&format!("http://{addr}"), None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.list_addresses().await.unwrap().len(), 1);

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_public_bind_requires_token() {
        let mut t = task(vec![PrivateKeySigner::random()], None);
        t.args.host = "0.0.0.0".to_string();
        let err = t.start().await.unwrap_err();
        assert!(err.to_string().contains("without an auth token"));
    }

    #[tokio::test]
    async fn test_list_addresses_and_index_errors() {
        let signer = PrivateKeySigner::random();
        let expected = signer.address();
        let (addr, handle) = task(vec![signer], None).start().await.unwrap();

        let client = new_http_client(&format!("http://{addr}"), None, Duration::from_secs(5)).unwrap();
        let keys = client.list_addresses().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].index, 0);
        assert_eq!(keys[0].address, expected);

        let err = client
            .sign_message(5, b"hello".to_vec().into())
            .await
            .unwrap_err();
        let ClientError::Call(err) = err else {
            panic!("expected call error, got {err:?}");
        };
        assert_eq!(err.code(), KEY_INDEX_OUT_OF_RANGE_CODE);
        let data: IndexOutOfRangeData = serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(data.available, 1);

        let sig = client.sign_message(0, b"hello".to_vec().into()).await.unwrap();
        assert_eq!(sig.len(), 65);

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_chain_methods_without_node() {
        let (addr, handle) = task(vec![PrivateKeySigner::random()], None)
            .start()
            .await
            .unwrap();
        let client = new_http_client(&format!("http://{addr}"), None, Duration::from_secs(5)).unwrap();

        let err = client
            .submit_authorization(0, Address::repeat_byte(1))
            .await
            .unwrap_err();
        let ClientError::Call(err) = err else {
            panic!("expected call error, got {err:?}");
        };
        assert_eq!(err.code(), CHAIN_UNAVAILABLE_CODE);

        // explicit chain id and nonce need no node
        let auth = client
            .sign_authorization(0, Address::repeat_byte(1), Some(1), Some(0))
            .await
            .unwrap();
        assert_eq!(auth.chain_id, 1);
        assert_eq!(auth.address, Address::repeat_byte(1));

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_auth_token_enforced() {
        let (addr, handle) = task(vec![PrivateKeySigner::random()], Some("s3cret"))
            .start()
            .await
            .unwrap();
        let url = format!("http://{addr}");

        let anonymous = new_http_client(&url, None, Duration::from_secs(5)).unwrap();
        assert!(anonymous.list_addresses().await.is_err());

        let token = SecretString::from("s3cret");
        let authed = new_http_client(&url, Some(&token), Duration::from_secs(5)).unwrap();
        assert_eq!(authed.list_addresses().await.unwrap().len(), 1);

        handle.stop().unwrap();
    }
}
