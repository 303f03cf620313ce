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

use aawallet_signer::Error as SignerError;
use jsonrpsee::types::{
    error::{INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE},
    ErrorObject, ErrorObjectOwned,
};
use serde::{Deserialize, Serialize};

/// The key server has no usable keys
pub const NO_KEYS_CONFIGURED_CODE: i32 = -32010;
/// Key index outside of the configured key list
pub const KEY_INDEX_OUT_OF_RANGE_CODE: i32 = -32011;
/// Signing or transaction construction failed
pub const SIGNING_FAILED_CODE: i32 = -32012;
/// The node rejected a request or is not configured
pub const CHAIN_UNAVAILABLE_CODE: i32 = -32013;

/// Data attached to [`KEY_INDEX_OUT_OF_RANGE_CODE`] errors
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutOfRangeData {
    /// Requested index
    pub index: usize,
    /// Number of configured keys
    pub available: usize,
}

pub(crate) fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObjectOwned {
    create_rpc_err(code, msg, None::<()>)
}

pub(crate) fn rpc_err_with_data<S: Serialize>(
    code: i32,
    msg: impl Into<String>,
    data: S,
) -> ErrorObjectOwned {
    create_rpc_err(code, msg, Some(data))
}

fn create_rpc_err<S: Serialize>(
    code: i32,
    msg: impl Into<String>,
    data: Option<S>,
) -> ErrorObjectOwned {
    ErrorObject::owned(code, msg.into(), data)
}

pub(crate) fn invalid_params(msg: impl Into<String>) -> ErrorObjectOwned {
    rpc_err(INVALID_PARAMS_CODE, msg)
}

pub(crate) fn signer_err(err: SignerError) -> ErrorObjectOwned {
    let msg = err.to_string();
    match err {
        SignerError::NoKeysConfigured => rpc_err(NO_KEYS_CONFIGURED_CODE, msg),
        SignerError::IndexOutOfRange { index, available } => rpc_err_with_data(
            KEY_INDEX_OUT_OF_RANGE_CODE,
            msg,
            IndexOutOfRangeData { index, available },
        ),
        SignerError::InvalidTransaction(_) | SignerError::SigningError(_) => {
            rpc_err(SIGNING_FAILED_CODE, msg)
        }
        SignerError::ProviderError(_) => rpc_err(CHAIN_UNAVAILABLE_CODE, msg),
        SignerError::Other(e) => {
            tracing::error!("key server internal error: {e:?}");
            rpc_err(INTERNAL_ERROR_CODE, msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_range_carries_data() {
        let err = signer_err(SignerError::IndexOutOfRange {
            index: 3,
            available: 2,
        });
        assert_eq!(err.code(), KEY_INDEX_OUT_OF_RANGE_CODE);
        let data: IndexOutOfRangeData =
            serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(
            data,
            IndexOutOfRangeData {
                index: 3,
                available: 2
            }
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            signer_err(SignerError::NoKeysConfigured).code(),
            NO_KEYS_CONFIGURED_CODE
        );
        assert_eq!(
            signer_err(SignerError::SigningError("bad".into())).code(),
            SIGNING_FAILED_CODE
        );
        assert_eq!(
            signer_err(SignerError::Other(anyhow::anyhow!("boom"))).code(),
            INTERNAL_ERROR_CODE
        );
    }
}
