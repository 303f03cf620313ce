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

//! EIP-7702 delegation targets

use alloy_primitives::{address, Address};
use serde::Serialize;

/// Implementation family of a delegation target
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
pub enum DelegateeKind {
    /// eth-infinitism `Simple7702Account` (EntryPoint v0.8)
    Simple7702Account,
    /// MetaMask delegation toolkit `EIP7702StatelessDeleGator`
    MetaMaskStatelessDeleGator,
    /// ZeroDev Kernel v3 7702 implementation
    KernelV3,
}

/// A candidate contract an EOA can delegate execution to
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateeContract {
    /// Display name
    pub name: &'static str,
    /// Implementation address
    pub address: Address,
    /// Short description
    pub description: &'static str,
    /// Implementation family
    pub kind: DelegateeKind,
}

/// Known delegation targets
pub const DELEGATEE_CATALOG: &[DelegateeContract] = &[
    DelegateeContract {
        name: "Simple7702Account",
        address: address!("4Cd241E8d1510e30b2076397afc7508Ae59C66c9"),
        description: "Minimal ERC-4337 account for EIP-7702 delegated EOAs",
        kind: DelegateeKind::Simple7702Account,
    },
    DelegateeContract {
        name: "MetaMask Stateless DeleGator",
        address: address!("63c0c19a282a1B52b07dD5a65b58948A07DAE32B"),
        description: "MetaMask delegation toolkit smart account for EIP-7702",
        kind: DelegateeKind::MetaMaskStatelessDeleGator,
    },
    DelegateeContract {
        name: "Kernel v3.3",
        address: address!("d6CEDDe84be40893d153Be9d467CD6aD37875b28"),
        description: "ZeroDev modular smart account with EIP-7702 support",
        kind: DelegateeKind::KernelV3,
    },
];

/// Removes every candidate whose address matches `current`, keeping the order of the rest.
///
/// Addresses are compared as bytes, so differently cased hex spellings of the same
/// address match.
pub fn filter_current_delegatee(
    current: Option<Address>,
    candidates: &[DelegateeContract],
) -> Vec<DelegateeContract> {
    match current {
        Some(current) => candidates
            .iter()
            .filter(|c| c.address != current)
            .copied()
            .collect(),
        None => candidates.to_vec(),
    }
}
