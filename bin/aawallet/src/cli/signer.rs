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

use aawallet_signer::KeySettings;
use clap::Args;
use secrecy::SecretString;

/// CLI options for the keys held by the key server
///
/// No `Debug`: these fields hold key material.
#[derive(Args)]
#[command(next_help_heading = "SIGNER")]
pub struct SignerArgs {
    /// Private keys, whitespace separated, each `0x` followed by 64 hex characters
    ///
    /// Malformed entries are skipped.
    #[arg(
        long = "signer.private_keys",
        name = "signer.private_keys",
        env = "PRIVATE_KEYS"
    )]
    private_keys: Option<String>,

    /// Mnemonic to derive additional keys from
    #[arg(long = "signer.mnemonic", name = "signer.mnemonic", env = "MNEMONIC")]
    mnemonic: Option<String>,

    /// Number of keys to derive from the mnemonic
    #[arg(
        long = "signer.mnemonic_key_count",
        name = "signer.mnemonic_key_count",
        env = "MNEMONIC_KEY_COUNT",
        default_value = "1"
    )]
    mnemonic_key_count: usize,
}

impl SignerArgs {
    pub fn key_settings(&self) -> KeySettings {
        KeySettings {
            private_keys: self.private_keys.clone().map(SecretString::from),
            mnemonic: self.mnemonic.clone().map(SecretString::from),
            mnemonic_key_count: self.mnemonic_key_count,
        }
    }
}
