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
//! Shared types for AAWallet

mod account;
pub use account::{ParseWalletTypeError, WalletAccount, WalletType};

mod authorization;
pub use authorization::Eip7702Auth;

mod capabilities;
pub use capabilities::{Capability, WalletCapabilities};

mod delegatee;
pub use delegatee::{filter_current_delegatee, DelegateeContract, DelegateeKind, DELEGATEE_CATALOG};

mod keys;
pub use keys::{DelegationStatus, KeyInfo};

mod transaction;
pub use transaction::TransactionRequest;

mod user_operation;
pub use user_operation::{PackedUserOperation, SmartAccount, UserOperation, ENTRY_POINT_V0_7};
