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

use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// Backend kind behind a connected account
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, strum::Display, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WalletType {
    /// Key held by the key server, addressed by index
    LocalKey,
    /// EIP-1193 provider run by the user
    Injected,
    /// Embedded wallet. Recognised, but no backend ships for it.
    Embedded,
}

/// Error returned when parsing an unknown wallet type tag
#[derive(Debug, thiserror::Error)]
#[error("unknown wallet type {0:?}, expected one of: local-key, injected, embedded")]
pub struct ParseWalletTypeError(String);

impl FromStr for WalletType {
    type Err = ParseWalletTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WalletType::iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseWalletTypeError(s.to_string()))
    }
}

/// A connected signing identity
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    /// Account address
    pub address: Address,
    /// Backend the account belongs to
    #[serde(rename = "type")]
    pub wallet_type: WalletType,
    /// Whether the account is currently connected
    pub is_connected: bool,
    /// Key server index, only set for `local-key` accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_index: Option<usize>,
    /// Chain reported by the backend, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl WalletAccount {
    /// Account backed by the key server key at `key_index`
    pub fn local_key(address: Address, key_index: usize) -> Self {
        Self {
            address,
            wallet_type: WalletType::LocalKey,
            is_connected: true,
            key_index: Some(key_index),
            chain_id: None,
        }
    }

    /// Account exposed by an injected provider
    pub fn injected(address: Address, chain_id: Option<u64>) -> Self {
        Self {
            address,
            wallet_type: WalletType::Injected,
            is_connected: true,
            key_index: None,
            chain_id,
        }
    }
}
