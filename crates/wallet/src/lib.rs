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

#![warn(missing_docs, unreachable_pub, unused_crate_dependencies)]
#![deny(unused_must_use, rust_2018_idioms)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
//! Wallet sessions for AAWallet
//!
//! A [`WalletManager`] holds at most one connected [`WalletAdapter`] and
//! routes capability-checked operations to it. Two backends ship:
//! [`LocalKeyWallet`] signs through the key server, [`InjectedWallet`]
//! through an [`Eip1193Provider`] the user runs.

mod adapter;
#[cfg(feature = "test-utils")]
pub use adapter::MockWalletAdapter;
pub use adapter::{AccountChange, WalletAdapter};

pub mod eip1193;
pub use eip1193::{Eip1193Provider, HttpEip1193Provider, HttpProviderSettings, ProviderRpcError};

mod error;
pub use error::{WalletError, WalletResult};

mod injected;
pub use injected::{InjectedWallet, InjectedWalletSettings};

mod local;
pub use local::{LocalKeyWallet, LocalKeyWalletSettings};

mod manager;
pub use manager::{SessionEvent, WalletManager};

mod remote;
#[cfg(feature = "test-utils")]
pub use remote::{MockBundlerService, MockKeyService};
pub use remote::{BundlerService, KeyService, RemoteBundler, RemoteKeyService};
