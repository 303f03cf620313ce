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
//! JSON-RPC surface of AAWallet: the key server and the clients that talk
//! to it and to an ERC-4337 bundler.

use std::time::Duration;

use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use secrecy::{ExposeSecret, SecretString};

mod auth;
pub use auth::{BearerAuthLayer, BearerAuthMiddleware};

mod bundler;
pub use bundler::BundlerApiClient;

mod error;
pub use error::{
    IndexOutOfRangeData, CHAIN_UNAVAILABLE_CODE, KEY_INDEX_OUT_OF_RANGE_CODE,
    NO_KEYS_CONFIGURED_CODE, SIGNING_FAILED_CODE,
};

mod health;

mod keys;
pub use keys::KeysApiClient;

mod metrics;

mod task;
pub use task::{Args as KeyServerArgs, KeyServerTask};

/// HTTP JSON-RPC client, optionally sending `Authorization: Bearer <token>`.
///
/// Usable with both [`KeysApiClient`] and [`BundlerApiClient`].
pub fn new_http_client(
    url: &str,
    auth_token: Option<&SecretString>,
    request_timeout: Duration,
) -> anyhow::Result<HttpClient> {
    let mut headers = HeaderMap::new();
    if let Some(token) = auth_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
        value.set_sensitive(true);
        headers.insert("Authorization", value);
    }
    let client = HttpClientBuilder::default()
        .set_headers(headers)
        .request_timeout(request_timeout)
        .build(url)?;
    Ok(client)
}
