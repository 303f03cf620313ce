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

use std::sync::Arc;

use aawallet_signer::KeyStore;
use async_trait::async_trait;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};

use crate::error::{rpc_err, NO_KEYS_CONFIGURED_CODE};

#[rpc(server, namespace = "system")]
pub trait SystemApi {
    #[method(name = "health")]
    async fn get_health(&self) -> RpcResult<String>;
}

pub(crate) struct HealthChecker {
    keys: Arc<KeyStore>,
}

impl HealthChecker {
    pub(crate) fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl SystemApiServer for HealthChecker {
    async fn get_health(&self) -> RpcResult<String> {
        if self.keys.is_empty() {
            Err(rpc_err(NO_KEYS_CONFIGURED_CODE, "no keys configured"))
        } else {
            Ok("ok".to_owned())
        }
    }
}
