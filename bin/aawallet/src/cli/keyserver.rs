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

use std::time::Duration;

use aawallet_rpc::{KeyServerArgs, KeyServerTask};
use aawallet_signer::{new_http_provider, KeyStore, TransactionSubmitter};
use aawallet_utils::retry::{self, RetryOpts};
use anyhow::Context;
use clap::Args;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use super::signer::SignerArgs;

/// CLI options for the key server
#[derive(Args)]
pub struct KeyServerCliArgs {
    #[command(flatten)]
    signer: SignerArgs,

    #[command(flatten)]
    rpc: RpcArgs,

    /// Node to submit transactions to
    ///
    /// Without it, methods that touch the chain fail and authorizations
    /// need an explicit chain id and nonce.
    #[arg(long = "node_http", name = "node_http", env = "NODE_HTTP")]
    node_http: Option<String>,
}

/// CLI options for the key server's RPC endpoint
#[derive(Args)]
#[command(next_help_heading = "RPC")]
pub struct RpcArgs {
    /// Port to listen on for JSON-RPC requests
    #[arg(
        long = "rpc.port",
        name = "rpc.port",
        env = "RPC_PORT",
        default_value = "3000"
    )]
    port: u16,

    /// Host to listen on for JSON-RPC requests
    ///
    /// Anything but a loopback address requires `rpc.auth_token`.
    #[arg(
        long = "rpc.host",
        name = "rpc.host",
        env = "RPC_HOST",
        default_value = "127.0.0.1"
    )]
    host: String,

    /// Bearer token clients must present
    #[arg(
        long = "rpc.auth_token",
        name = "rpc.auth_token",
        env = "RPC_AUTH_TOKEN"
    )]
    auth_token: Option<String>,

    /// Timeout for RPC requests
    #[arg(
        long = "rpc.timeout_seconds",
        name = "rpc.timeout_seconds",
        env = "RPC_TIMEOUT_SECONDS",
        default_value = "20"
    )]
    timeout_seconds: u64,

    /// Maximum number of concurrent connections
    #[arg(
        long = "rpc.max_connections",
        name = "rpc.max_connections",
        env = "RPC_MAX_CONNECTIONS",
        default_value = "100"
    )]
    max_connections: u32,
}

impl RpcArgs {
    /// Convert the CLI arguments into the arguments for the key server.
    pub fn to_args(&self) -> KeyServerArgs {
        KeyServerArgs {
            host: self.host.clone(),
            port: self.port,
            auth_token: self.auth_token.clone().map(SecretString::from),
            rpc_timeout: Duration::from_secs(self.timeout_seconds),
            max_connections: self.max_connections,
        }
    }
}

pub async fn run(args: KeyServerCliArgs) -> anyhow::Result<()> {
    let keys = KeyStore::from_settings(&args.signer.key_settings())?;

    let provider = args.node_http.as_deref().map(new_http_provider).transpose()?;
    let submitter = match provider {
        Some(provider) => Some(
            retry::with_retries(
                "connect to node",
                || TransactionSubmitter::connect(provider.clone()),
                RetryOpts::default(),
            )
            .await
            .context("key server should connect to node")?,
        ),
        None => {
            tracing::warn!("no node_http configured, chain methods are disabled");
            None
        }
    };

    let shutdown_token = CancellationToken::new();
    let server = KeyServerTask::new(args.rpc.to_args(), keys, submitter).run(shutdown_token.clone());
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => return res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received ctrl-c, shutting down");
        }
    }

    shutdown_token.cancel();
    server.await
}
