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

use serde::{Deserialize, Serialize};

/// A single operation class an adapter may declare
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum Capability {
    /// Message and typed data signing
    CanSign,
    /// Transaction submission
    CanSendTransaction,
    /// EIP-7702 authorization signing and submission
    #[strum(serialize = "canSign7702Auth")]
    CanSign7702Auth,
    /// Smart account creation and user operations
    CanCreateSmartAccount,
}

/// Operations supported by a wallet backend
///
/// Static per backend type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCapabilities {
    /// Message and typed data signing
    pub can_sign: bool,
    /// Transaction submission
    pub can_send_transaction: bool,
    /// EIP-7702 authorization signing and submission
    #[serde(rename = "canSign7702Auth")]
    pub can_sign_7702_auth: bool,
    /// Smart account creation and user operations
    pub can_create_smart_account: bool,
}

impl WalletCapabilities {
    /// Capabilities of a key server backend
    pub const LOCAL_KEY: Self = Self {
        can_sign: true,
        can_send_transaction: true,
        can_sign_7702_auth: true,
        can_create_smart_account: true,
    };

    /// Capabilities of an injected provider backend
    pub const INJECTED: Self = Self {
        can_sign: true,
        can_send_transaction: true,
        can_sign_7702_auth: false,
        can_create_smart_account: false,
    };

    /// Returns true if `capability` is declared
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::CanSign => self.can_sign,
            Capability::CanSendTransaction => self.can_send_transaction,
            Capability::CanSign7702Auth => self.can_sign_7702_auth,
            Capability::CanCreateSmartAccount => self.can_create_smart_account,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        let caps = WalletCapabilities::INJECTED;
        assert!(caps.supports(Capability::CanSign));
        assert!(caps.supports(Capability::CanSendTransaction));
        assert!(!caps.supports(Capability::CanSign7702Auth));
        assert!(!caps.supports(Capability::CanCreateSmartAccount));
        assert!(WalletCapabilities::LOCAL_KEY.supports(Capability::CanCreateSmartAccount));
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::CanSign7702Auth.to_string(), "canSign7702Auth");
        let json = serde_json::to_value(WalletCapabilities::LOCAL_KEY).unwrap();
        assert_eq!(json["canSign7702Auth"], true);
        assert_eq!(json["canCreateSmartAccount"], true);
    }
}
