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

use std::{sync::Arc, time::Duration};

use aawallet_types::{WalletAccount, WalletType};
use aawallet_utils::retry::PollOpts;
use aawallet_wallet::{
    HttpEip1193Provider, HttpProviderSettings, InjectedWallet, InjectedWalletSettings,
    LocalKeyWallet, LocalKeyWalletSettings, RemoteBundler, RemoteKeyService, SessionEvent,
    WalletAdapter, WalletError, WalletManager,
};
use alloy_primitives::{Address, Bytes};
use clap::{Args, Subcommand};
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

/// CLI options for wallet sessions
///
/// No `Debug`: `keyserver.auth_token` is a credential.
#[derive(Args)]
#[command(next_help_heading = "WALLET")]
pub struct WalletCliArgs {
    #[command(subcommand)]
    action: WalletAction,

    /// Key server URL
    #[arg(
        long = "keyserver.url",
        name = "keyserver.url",
        env = "KEY_SERVER_URL",
        default_value = "http://127.0.0.1:3000",
        global = true
    )]
    keyserver_url: String,

    /// Bearer token for the key server
    #[arg(
        long = "keyserver.auth_token",
        name = "keyserver.auth_token",
        env = "KEY_SERVER_AUTH_TOKEN",
        global = true
    )]
    keyserver_auth_token: Option<String>,

    /// ERC-4337 bundler URL, needed for user operations
    #[arg(
        long = "bundler.url",
        name = "bundler.url",
        env = "BUNDLER_URL",
        global = true
    )]
    bundler_url: Option<String>,

    /// JSON-RPC endpoint of an injected wallet, such as a desktop wallet
    ///
    /// Without it only the `local-key` wallet type is available.
    #[arg(
        long = "injected.url",
        name = "injected.url",
        env = "INJECTED_PROVIDER_URL",
        global = true
    )]
    injected_url: Option<String>,

    /// Chain id server-held keys sign user operations for
    #[arg(
        long = "wallet.chain_id",
        name = "wallet.chain_id",
        env = "CHAIN_ID",
        default_value = "1",
        global = true
    )]
    chain_id: u64,

    /// Timeout for backend requests
    #[arg(
        long = "wallet.timeout_seconds",
        name = "wallet.timeout_seconds",
        env = "WALLET_TIMEOUT_SECONDS",
        default_value = "30",
        global = true
    )]
    timeout_seconds: u64,
}

#[derive(Subcommand)]
enum WalletAction {
    /// List the keys the key server offers
    Keys,
    /// Connect and print the account and its capabilities
    Connect(ConnectArgs),
    /// Connect and sign a UTF-8 message
    SignMessage {
        #[command(flatten)]
        connect: ConnectArgs,
        /// Message to sign
        message: String,
    },
    /// Connect and print the on-chain delegation of the account
    Delegation(ConnectArgs),
    /// Connect and delegate the account to `delegatee` if it is not already
    Delegate {
        #[command(flatten)]
        connect: ConnectArgs,
        /// Delegatee contract address
        delegatee: Address,
    },
    /// Wait for the key server to offer keys, then connect the first one
    AutoConnect {
        /// Number of key enumerations to try
        #[arg(long = "attempts", default_value = "10")]
        attempts: u64,
        /// Delay between enumerations
        #[arg(long = "delay_millis", default_value = "1000")]
        delay_millis: u64,
    },
    /// Connect and print session events until ctrl-c
    Watch(ConnectArgs),
}

#[derive(Args)]
struct ConnectArgs {
    /// Wallet backend: local-key or injected
    #[arg(long = "wallet.type", name = "wallet.type", default_value = "local-key")]
    wallet_type: WalletType,

    /// Key server index to connect, local-key only
    #[arg(long = "wallet.key_index", name = "wallet.key_index")]
    key_index: Option<usize>,
}

pub async fn run(args: WalletCliArgs) -> anyhow::Result<()> {
    let manager = build_manager(&args)?;

    match args.action {
        WalletAction::Keys => {
            for key in manager.get_available_keys(WalletType::LocalKey).await? {
                println!("{}", serde_json::to_string(&key)?);
            }
        }
        WalletAction::Connect(connect) => {
            let account = connect_with(&manager, &connect).await?;
            println!(
                "{}",
                json!({ "account": account, "capabilities": manager.capabilities() })
            );
        }
        WalletAction::SignMessage { connect, message } => {
            connect_with(&manager, &connect).await?;
            let signature = manager.sign_message(Bytes::from(message.into_bytes())).await?;
            println!("{signature}");
        }
        WalletAction::Delegation(connect) => {
            let account = connect_with(&manager, &connect).await?;
            manager.check_current_delegation().await?;
            let available = match manager.available_delegatees() {
                Ok(delegatees) => Some(delegatees),
                Err(WalletError::CapabilityUnsupported { .. }) => None,
                Err(e) => return Err(e.into()),
            };
            println!(
                "{}",
                json!({
                    "address": account.address,
                    "delegatee": manager.cached_delegation(),
                    "nonce": manager.cached_nonce(),
                    "availableDelegatees": available,
                })
            );
        }
        WalletAction::Delegate { connect, delegatee } => {
            connect_with(&manager, &connect).await?;
            if !manager.is_delegatee_supported(delegatee)? {
                anyhow::bail!("wallet does not accept delegatee {delegatee}");
            }
            let smart_account = manager.create_smart_account(delegatee).await?;
            println!("{}", serde_json::to_string(&smart_account)?);
        }
        WalletAction::AutoConnect {
            attempts,
            delay_millis,
        } => {
            let opts = PollOpts {
                max_attempts: attempts,
                delay: Duration::from_millis(delay_millis),
            };
            match manager.auto_connect_default(opts).await? {
                Some(account) => println!("{}", serde_json::to_string(&account)?),
                None => anyhow::bail!("key server offered no keys after {attempts} attempts"),
            }
        }
        WalletAction::Watch(connect) => watch(&manager, &connect).await?,
    }

    manager.disconnect_wallet().await?;
    Ok(())
}

fn build_manager(args: &WalletCliArgs) -> anyhow::Result<WalletManager> {
    let timeout = Duration::from_secs(args.timeout_seconds);
    let auth_token = args.keyserver_auth_token.clone().map(SecretString::from);

    let keys = RemoteKeyService::new(&args.keyserver_url, auth_token.as_ref(), timeout)?;
    let bundler = args
        .bundler_url
        .as_deref()
        .map(|url| RemoteBundler::new(url, timeout))
        .transpose()?;
    let settings = LocalKeyWalletSettings {
        chain_id: args.chain_id,
        ..Default::default()
    };
    let mut adapters: Vec<Arc<dyn WalletAdapter>> =
        vec![Arc::new(LocalKeyWallet::new(keys, bundler, settings))];

    if let Some(url) = &args.injected_url {
        let provider = HttpEip1193Provider::new(
            url,
            HttpProviderSettings {
                request_timeout: timeout,
                ..Default::default()
            },
        )?;
        adapters.push(Arc::new(InjectedWallet::new(
            provider,
            InjectedWalletSettings::default(),
        )));
    }

    Ok(WalletManager::new(adapters))
}

async fn connect_with(
    manager: &WalletManager,
    args: &ConnectArgs,
) -> anyhow::Result<WalletAccount> {
    let account = manager
        .connect_wallet(args.wallet_type, args.key_index)
        .await?;
    tracing::info!("connected {} wallet {}", account.wallet_type, account.address);
    Ok(account)
}

async fn watch(manager: &WalletManager, args: &ConnectArgs) -> anyhow::Result<()> {
    let mut events = manager.subscribe();
    connect_with(manager, args).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if matches!(event, SessionEvent::Disconnected { .. }) {
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("skipped {skipped} session events");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received ctrl-c, disconnecting");
                return Ok(());
            }
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected {
            account,
            generation,
        } => println!(
            "{}",
            json!({ "event": "connected", "account": account, "generation": generation })
        ),
        SessionEvent::AccountChanged {
            account,
            generation,
        } => println!(
            "{}",
            json!({ "event": "accountChanged", "account": account, "generation": generation })
        ),
        SessionEvent::Disconnected { generation } => println!(
            "{}",
            json!({ "event": "disconnected", "generation": generation })
        ),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        wallet: WalletCliArgs,
    }

    #[test]
    fn test_parse_sign_message() {
        let cli = TestCli::try_parse_from([
            "test",
            "--keyserver.url",
            "http://keys:3000",
            "sign-message",
            "--wallet.key_index",
            "2",
            "hello",
        ])
        .unwrap();
        assert_eq!(cli.wallet.keyserver_url, "http://keys:3000");
        let WalletAction::SignMessage { connect, message } = cli.wallet.action else {
            panic!("expected sign-message");
        };
        assert_eq!(connect.wallet_type, WalletType::LocalKey);
        assert_eq!(connect.key_index, Some(2));
        assert_eq!(message, "hello");
    }

    #[test]
    fn test_parse_wallet_type() {
        let cli = TestCli::try_parse_from(["test", "connect", "--wallet.type", "injected"]).unwrap();
        let WalletAction::Connect(connect) = cli.wallet.action else {
            panic!("expected connect");
        };
        assert_eq!(connect.wallet_type, WalletType::Injected);

        assert!(TestCli::try_parse_from(["test", "connect", "--wallet.type", "ledger"]).is_err());
    }
}
