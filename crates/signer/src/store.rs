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

use std::fmt::{self, Debug};

use aawallet_types::{KeyInfo, UserOperation};
use alloy_dyn_abi::TypedData;
use alloy_eips::eip7702::{Authorization, SignedAuthorization};
use alloy_primitives::{Address, Bytes, PrimitiveSignature, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use metrics::Counter;
use metrics_derive::Metrics;

use crate::{local, Error, KeySettings, Result};

/// Server-side key custody
///
/// Holds the configured keys and signs by index. Keys never leave this type;
/// callers only see addresses and signatures.
pub struct KeyStore {
    signers: Vec<PrivateKeySigner>,
    metrics: SignerMetrics,
}

impl Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("addresses", &self.addresses())
            .finish()
    }
}

impl KeyStore {
    /// Create a key store from already constructed signers
    pub fn new(signers: Vec<PrivateKeySigner>) -> Self {
        Self {
            signers,
            metrics: SignerMetrics::default(),
        }
    }

    /// Build the key store from settings
    ///
    /// Private keys come first, followed by mnemonic derived keys. Malformed private
    /// keys are skipped. An empty store is not an error here, requests against it
    /// fail with [`Error::NoKeysConfigured`].
    pub fn from_settings(settings: &KeySettings) -> Result<Self> {
        let mut signers = vec![];

        if let Some(raw) = &settings.private_keys {
            let keys = local::parse_private_keys(raw);
            signers.extend(local::construct_signers_from_private_keys(&keys));
        }

        if let Some(mnemonic) = &settings.mnemonic {
            signers.extend(local::construct_signers_from_mnemonic(
                mnemonic,
                settings.mnemonic_key_count,
            )?);
        }

        if signers.is_empty() {
            tracing::warn!("key store has no usable keys");
        } else {
            tracing::info!("key store loaded {} keys", signers.len());
        }

        Ok(Self::new(signers))
    }

    /// Number of usable keys
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    /// Returns true if no key is configured
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Addresses of the configured keys, in configuration order
    pub fn addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    /// Enumerate the configured keys
    pub fn keys(&self) -> Vec<KeyInfo> {
        self.signers
            .iter()
            .enumerate()
            .map(|(index, s)| KeyInfo {
                index,
                address: s.address(),
            })
            .collect()
    }

    /// Signer at `index`
    pub fn signer(&self, index: usize) -> Result<&PrivateKeySigner> {
        if self.signers.is_empty() {
            return Err(Error::NoKeysConfigured);
        }
        self.signers.get(index).ok_or(Error::IndexOutOfRange {
            index,
            available: self.signers.len(),
        })
    }

    /// EIP-191 personal message signature
    pub fn sign_message(&self, index: usize, message: &[u8]) -> Result<PrimitiveSignature> {
        let sig = self.signer(index)?.sign_message_sync(message)?;
        self.metrics.messages_signed.increment(1);
        Ok(sig)
    }

    /// EIP-712 typed data signature
    pub fn sign_typed_data(&self, index: usize, typed_data: &TypedData) -> Result<PrimitiveSignature> {
        let signer = self.signer(index)?;
        let hash = typed_data.eip712_signing_hash()?;
        let sig = signer.sign_hash_sync(&hash)?;
        self.metrics.typed_data_signed.increment(1);
        Ok(sig)
    }

    /// EIP-7702 authorization for `delegatee` at authority nonce `nonce`
    pub fn sign_authorization(
        &self,
        index: usize,
        chain_id: u64,
        delegatee: Address,
        nonce: u64,
    ) -> Result<SignedAuthorization> {
        let signer = self.signer(index)?;
        let authorization = Authorization {
            chain_id: U256::from(chain_id),
            address: delegatee,
            nonce,
        };
        let sig = signer.sign_hash_sync(&authorization.signature_hash())?;
        self.metrics.authorizations_signed.increment(1);
        Ok(authorization.into_signed(sig))
    }

    /// Signature over the user operation hash
    ///
    /// The hash is signed raw, which is what 7702 delegated accounts validate
    /// against the EOA address.
    pub fn sign_user_operation(
        &self,
        index: usize,
        user_operation: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> Result<Bytes> {
        let signer = self.signer(index)?;
        if signer.address() != user_operation.sender {
            return Err(Error::SigningError(format!(
                "user operation sender {} does not match key {index}",
                user_operation.sender
            )));
        }
        let hash: B256 = user_operation.hash(entry_point, chain_id);
        let sig = signer.sign_hash_sync(&hash)?;
        self.metrics.user_operations_signed.increment(1);
        Ok(sig.as_bytes().to_vec().into())
    }
}

#[derive(Metrics)]
#[metrics(scope = "signer")]
struct SignerMetrics {
    #[metric(describe = "the number of messages signed.")]
    messages_signed: Counter,
    #[metric(describe = "the number of typed data payloads signed.")]
    typed_data_signed: Counter,
    #[metric(describe = "the number of 7702 authorizations signed.")]
    authorizations_signed: Counter,
    #[metric(describe = "the number of user operations signed.")]
    user_operations_signed: Counter,
}
