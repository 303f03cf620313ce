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
//! 7702 authorization tuples.

use alloy_eips::eip7702::{Authorization, SignedAuthorization};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Signed authorization tuple for 7702 transactions
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Eip7702Auth {
    /// The chain ID of the authorization, 0 for any chain.
    pub chain_id: u64,
    /// The delegation target.
    pub address: Address,
    /// The authority nonce the authorization is valid for.
    pub nonce: u64,
    /// signature y parity.
    pub y_parity: u8,
    /// signature r.
    pub r: U256,
    /// signature s.
    pub s: U256,
}

impl From<Eip7702Auth> for SignedAuthorization {
    fn from(value: Eip7702Auth) -> Self {
        let authorization = Authorization {
            chain_id: U256::from(value.chain_id),
            address: value.address,
            nonce: value.nonce,
        };

        SignedAuthorization::new_unchecked(authorization, value.y_parity, value.r, value.s)
    }
}

impl From<&SignedAuthorization> for Eip7702Auth {
    fn from(value: &SignedAuthorization) -> Self {
        let inner = value.inner();
        Self {
            chain_id: inner.chain_id.saturating_to(),
            address: inner.address,
            nonce: inner.nonce,
            y_parity: value.y_parity(),
            r: value.r(),
            s: value.s(),
        }
    }
}

impl Eip7702Auth {
    /// Recover the address that signed this authorization
    pub fn recover_authority(&self) -> Option<Address> {
        SignedAuthorization::from(self.clone())
            .recover_authority()
            .ok()
    }
}
