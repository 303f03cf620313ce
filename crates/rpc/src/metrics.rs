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

use std::time::Instant;

use futures_util::{future::BoxFuture, FutureExt};
use jsonrpsee::{server::middleware::rpc::RpcServiceT, types::Request, MethodResponse};

/// Per-method request counters and latency.
#[derive(Clone)]
pub(crate) struct RpcMetricsMiddleware<S> {
    inner: S,
}

impl<S> RpcMetricsMiddleware<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<'a, S> RpcServiceT<'a> for RpcMetricsMiddleware<S>
where
    S: RpcServiceT<'a> + Clone + Send + Sync + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let method = req.method_name().to_string();
        let inner = self.inner.clone();

        async move {
            metrics::counter!("rpc_num_requests", "method" => method.clone()).increment(1);
            metrics::gauge!("rpc_open_requests", "method" => method.clone()).increment(1);
            let started = Instant::now();

            let resp = inner.call(req).await;

            metrics::histogram!("rpc_request_latency_ms", "method" => method.clone())
                .record(started.elapsed().as_millis() as f64);
            metrics::gauge!("rpc_open_requests", "method" => method.clone()).decrement(1);
            if resp.is_error() {
                metrics::counter!("rpc_num_errors", "method" => method).increment(1);
            }
            resp
        }
        .boxed()
    }
}
