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

use aawallet_types::WalletType;

/// Wallet session errors
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// No session is active, or the adapter has no account
    #[error("wallet not connected")]
    NotConnected,
    /// No adapter registered for the wallet type
    #[error("no {0} wallet backend registered")]
    UnknownWalletType(WalletType),
    /// The key server has no usable keys
    #[error("no keys configured on the key server")]
    NoKeysConfigured,
    /// Key index outside of the enumerated keys
    #[error("key index {index} out of range, {available} keys available")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of enumerated keys
        available: usize,
    },
    /// The injected provider could not be reached
    #[error("no wallet provider detected: {0}")]
    NoProviderDetected(String),
    /// The user declined the request in their wallet
    #[error("user rejected the request: {0}")]
    UserRejected(String),
    /// The active adapter does not declare the capability an operation needs
    #[error("{operation}: wallet does not support {capability}")]
    CapabilityUnsupported {
        /// Operation that was refused
        operation: &'static str,
        /// Missing capability
        capability: &'static str,
    },
    /// The signing backend answered with an error, or refused the request
    #[error("backend request failed: {0}")]
    BackendRequestFailed(String),
    /// The signing backend could not be reached or timed out
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The session an operation was issued under was replaced
    #[error("session changed during request (issued under generation {issued}, now {current})")]
    StaleSession {
        /// Generation the operation was issued under
        issued: u64,
        /// Current generation
        current: u64,
    },
    /// Other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Wallet result
pub type WalletResult<T> = Result<T, WalletError>;
