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
//! Server-side key custody for AAWallet
//!
//! Keys are loaded from configuration into a [`KeyStore`] and only ever used
//! inside this process. Consumers get addresses, signatures and transaction
//! hashes.

pub mod chain;
#[cfg(feature = "test-utils")]
pub use chain::MockChainProvider;
pub use chain::{new_http_provider, AlloyChainProvider, ChainProvider, Fees, ProviderError};

mod error;
pub use error::{Error, Result};

mod local;

mod store;
pub use store::KeyStore;

mod submit;
pub use submit::{TransactionSubmitter, AUTHORIZATION_TX_GAS_LIMIT};

use secrecy::SecretString;

/// Key configuration
#[derive(Debug, Clone, Default)]
pub struct KeySettings {
    /// Whitespace separated private keys, each `0x` followed by 64 hex characters
    pub private_keys: Option<SecretString>,
    /// Mnemonic to derive additional keys from
    pub mnemonic: Option<SecretString>,
    /// Number of keys to derive from the mnemonic
    pub mnemonic_key_count: usize,
}
