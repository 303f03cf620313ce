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

//! Bearer token authentication for the key server.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{header::AUTHORIZATION, Method, Request, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tower::{Layer, Service};

const HEALTH_PATH: &str = "/health";

/// Layer that creates [`BearerAuthMiddleware`] instances.
#[derive(Clone)]
pub struct BearerAuthLayer {
    token: Arc<SecretString>,
}

impl BearerAuthLayer {
    /// Creates a new layer requiring `Authorization: Bearer <token>`.
    pub fn new(token: SecretString) -> Self {
        Self {
            token: Arc::new(token),
        }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthMiddleware {
            inner,
            token: self.token.clone(),
        }
    }
}

/// Middleware that rejects requests without the configured bearer token.
///
/// `GET /health` always passes through.
#[derive(Clone)]
pub struct BearerAuthMiddleware<S> {
    inner: S,
    token: Arc<SecretString>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for BearerAuthMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let authorized = is_health_check(&req) || has_token(&req, self.token.expose_secret());
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !authorized {
                return Ok(unauthorized());
            }
            inner.call(req).await
        })
    }
}

fn is_health_check<B>(req: &Request<B>) -> bool {
    req.method() == Method::GET && req.uri().path() == HEALTH_PATH
}

fn has_token<B>(req: &Request<B>, expected: &str) -> bool {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|presented| presented.trim().as_bytes().ct_eq(expected.as_bytes()).into())
}

fn unauthorized<B: Default>() -> Response<B> {
    let mut response = Response::new(B::default());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    tracing::warn!("rejected key server request without a valid bearer token");
    response
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use tower::{service_fn, ServiceExt};

    use super::*;

    async fn call(req: Request<String>) -> Response<String> {
        let inner = service_fn(|_req: Request<String>| async {
            Ok::<_, Infallible>(Response::new("ok".to_string()))
        });
        BearerAuthLayer::new(SecretString::from("s3cret"))
            .layer(inner)
            .oneshot(req)
            .await
            .unwrap()
    }

    fn request(method: Method, path: &str, auth: Option<&str>) -> Request<String> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(String::new()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let resp = call(request(Method::POST, "/", None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.body(), "");
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let resp = call(request(Method::POST, "/", Some("Bearer nope"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = call(request(Method::POST, "/", Some("s3cret"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        let resp = call(request(Method::POST, "/", Some("Bearer s3cret"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), "ok");
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let resp = call(request(Method::GET, "/health", None)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // only the GET proxy is exempt
        let resp = call(request(Method::POST, "/health", None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_prefix_and_extension_rejected() {
        let resp = call(request(Method::POST, "/", Some("Bearer s3cre"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = call(request(Method::POST, "/", Some("Bearer s3cret!"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = call(request(Method::POST, "/", Some("Bearer  s3cret "))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
