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

use aawallet_utils::eth;
use alloy_signer_local::{coins_bip39::English, LocalSignerError, MnemonicBuilder, PrivateKeySigner};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Split a whitespace separated key list, dropping malformed entries.
///
/// Entries must be `0x` followed by 64 hex characters. Dropped entries are
/// reported by position only.
pub(crate) fn parse_private_keys(raw: &SecretString) -> Vec<SecretString> {
    raw.expose_secret()
        .split_whitespace()
        .enumerate()
        .filter_map(|(position, key)| {
            if eth::is_well_formed_private_key(key) {
                Some(SecretString::from(key.to_string()))
            } else {
                tracing::warn!(
                    "skipping malformed private key at position {position}, expected 0x followed by 64 hex characters"
                );
                None
            }
        })
        .collect()
}

pub(crate) fn construct_signers_from_private_keys(
    private_keys: &[SecretString],
) -> Vec<PrivateKeySigner> {
    private_keys
        .iter()
        .enumerate()
        .filter_map(
            |(position, key)| match key.expose_secret().parse::<PrivateKeySigner>() {
                Ok(signer) => Some(signer),
                Err(err) => {
                    tracing::warn!("skipping invalid private key at position {position}: {err}");
                    None
                }
            },
        )
        .collect()
}

pub(crate) fn construct_signers_from_mnemonic(
    mnemonic: &SecretString,
    count: usize,
) -> Result<Vec<PrivateKeySigner>> {
    let builder = MnemonicBuilder::<English>::default().phrase(mnemonic.expose_secret());

    let mut signers = Vec::with_capacity(count);
    for i in 0..count {
        signers.push(builder.clone().index(i as u32)?.build()?);
    }

    Ok(signers)
}

impl From<LocalSignerError> for Error {
    fn from(value: LocalSignerError) -> Self {
        Error::SigningError(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_1: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const KEY_2: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

    #[test]
    fn test_malformed_keys_are_dropped_without_gaps() {
        let raw = SecretString::from(format!("0xAA {KEY_1}"));
        let keys = parse_private_keys(&raw);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].expose_secret(), KEY_1);
    }

    #[test]
    fn test_keys_split_on_any_whitespace() {
        let raw = SecretString::from(format!("  {KEY_1}\n\t{KEY_2}  "));
        let keys = parse_private_keys(&raw);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].expose_secret(), KEY_2);
    }

    #[test]
    fn test_zero_key_is_skipped_by_signer_construction() {
        let zero = SecretString::from(format!("0x{}", "00".repeat(32)));
        let keys = parse_private_keys(&SecretString::from(format!(
            "{} {KEY_1}",
            zero.expose_secret()
        )));
        assert_eq!(keys.len(), 2);
        let signers = construct_signers_from_private_keys(&keys);
        assert_eq!(signers.len(), 1);
    }

    #[test]
    fn test_mnemonic_derivation() {
        let mnemonic = SecretString::from(
            "test test test test test test test test test test test junk".to_string(),
        );
        let signers = construct_signers_from_mnemonic(&mnemonic, 2).unwrap();
        assert_eq!(signers.len(), 2);
        // first anvil/hardhat dev account
        assert_eq!(
            signers[0].address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<alloy_primitives::Address>()
                .unwrap()
        );
    }
}
