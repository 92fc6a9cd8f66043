//! The untyped layer: requests in, bytes or watch events out
//!
//! [`Client`] drives any [`tower::Service`] from `http::Request` to a streaming
//! `http::Response` and turns error statuses into [`Error`]s. The typed calls live on
//! [`Api`](crate::api::Api).
use bytes::Bytes;
use futures::{future::BoxFuture, Stream};
use http::{Request, Response};
use serde::de::DeserializeOwned;
use strela_core::{Resource, WatchEvent};
use tower::{buffer::Buffer, util::BoxService, BoxError, Layer, Service, ServiceExt};
use tower_http::map_response_body::MapResponseBodyLayer;

use crate::{Config, Error, Result};

mod body;
mod builder;
mod config_ext;
pub mod decoder;
pub mod middleware;

pub use body::{Body, BodyDataStream};
pub use builder::{ClientBuilder, DynBody, GenericService};
pub use config_ext::ConfigExt;

/// Handle to one api server
///
/// Get one with [`Client::try_default`], from a [`Config`] with `Client::try_from`, or
/// over a hand built stack with [`Client::new`]. Clones share the underlying stack and
/// may be used from any number of tasks.
#[derive(Clone)]
pub struct Client {
    // Buffer makes clones share one service
    inner: Buffer<Request<Body>, BoxFuture<'static, Result<Response<Body>, BoxError>>>,
    default_ns: String,
}

impl Client {
    /// Client over an arbitrary service
    ///
    /// The layers of [`ConfigExt`](crate::client::ConfigExt) supply the base uri and
    /// headers of a [`Config`].
    ///
    /// # Example
    ///
    /// ```rust
    /// # fn doc() -> Result<(), Box<dyn std::error::Error>> {
    /// use strela_client::{client::{Body, ConfigExt}, Client, Config};
    /// use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};
    /// use tower::ServiceBuilder;
    ///
    /// let config = Config::infer()?;
    /// let service = ServiceBuilder::new()
    ///     .layer(config.base_uri_layer())
    ///     .service(hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build::<_, Body>(HttpConnector::new()));
    /// let client = Client::new(service, config.default_namespace);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<S, B, T>(service: S, default_namespace: T) -> Self
    where
        S: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body<Data = bytes::Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
        T: Into<String>,
    {
        // Transform response body to `crate::client::Body` and use type erased error to avoid type parameters.
        let service = MapResponseBodyLayer::new(Body::wrap_body)
            .layer(service)
            .map_err(|e| e.into());
        Self {
            inner: Buffer::new(BoxService::new(service), 1024),
            default_ns: default_namespace.into(),
        }
    }

    /// Client for [`Config::infer`] over the default plain http stack
    pub async fn try_default() -> Result<Self> {
        Self::try_from(Config::infer().map_err(Error::InferConfig)?)
    }

    /// The namespace used by [`Api::default_namespaced`](crate::Api::default_namespaced)
    pub fn default_namespace(&self) -> &str {
        &self.default_ns
    }

    /// Send `request` as is; the status is not checked
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        let mut svc = self.inner.clone();
        let res = svc
            .ready()
            .await
            .map_err(Error::Service)?
            .call(request)
            .await
            .map_err(|err| match err.downcast::<Error>() {
                // raised by one of our own layers
                Ok(ours) => *ours,
                Err(transport) => Error::Service(transport),
            })?;
        Ok(res)
    }

    /// Body of a successful response
    ///
    /// Unsuccessful responses are mapped through [`Error::from_response`].
    pub async fn request_bytes(&self, request: Request<Vec<u8>>) -> Result<Bytes> {
        let method = request.method().clone();
        tracing::trace!("{} {}", method, request.uri());
        let res = self.send(request.map(Body::from)).await?;
        let status = res.status();
        let body = res.into_body().collect_bytes().await?;
        if !is_success(status) {
            return Err(Error::from_response(&method, status, &body));
        }
        Ok(body)
    }

    /// Json body of a successful response, decoded as `T`
    pub async fn request<T>(&self, request: Request<Vec<u8>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.request_bytes(request).await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!("{}, {:?}", String::from_utf8_lossy(&body), e);
            Error::malformed(e)
        })
    }

    /// Watch events of a successful streaming response
    ///
    /// The response status is checked before the body is streamed; a refused
    /// watch is reported as an error rather than an empty stream.
    pub async fn request_events<K>(
        &self,
        request: Request<Vec<u8>>,
        dyntype: K::DynamicType,
    ) -> Result<impl Stream<Item = Result<WatchEvent<K>>> + Send>
    where
        K: Resource + DeserializeOwned + Send + 'static,
    {
        let method = request.method().clone();
        tracing::trace!("{} {}", method, request.uri());
        let res = self.send(request.map(Body::from)).await?;
        if !is_success(res.status()) {
            let status = res.status();
            let body = res.into_body().collect_bytes().await?;
            return Err(Error::from_response(&method, status, &body));
        }
        tracing::trace!(headers = ?res.headers(), "watch accepted");
        Ok(decoder::decode_events(res.into_body(), dyntype))
    }
}

fn is_success(status: http::StatusCode) -> bool {
    !(status.is_client_error() || status.is_server_error())
}

impl TryFrom<Config> for Client {
    type Error = Error;

    /// The default stack for `config`; [`ClientBuilder`] adds layers
    fn try_from(config: Config) -> Result<Self> {
        Ok(ClientBuilder::<GenericService>::try_from(config)?.build())
    }
}

#[cfg(test)]
mod tests {
    use crate::{client::Body, Client, Error};

    use futures::pin_mut;
    use http::{Request, Response, StatusCode};
    use tower_test::mock;

    #[tokio::test]
    async fn status_is_mapped_before_decoding() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::GET);
            send.send_response(
                Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .body(Body::from("try later"))
                    .unwrap(),
            );
        });

        let client = Client::new(mock_service, "default");
        let err = client
            .request::<serde_json::Value>(Request::get("/api/v1/pods").body(vec![]).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServerError { .. }));
        assert_eq!(err.status(), Some(503));
        spawned.await.unwrap();
    }

    #[tokio::test]
    async fn service_errors_are_preserved() {
        let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (_request, send) = handle.next_request().await.expect("service not called");
            send.send_error(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));
        });

        let client = Client::new(mock_service, "default");
        let err = client
            .request_bytes(Request::get("/api/v1/pods").body(vec![]).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Service(_)));
        assert!(err.is_transient());
        spawned.await.unwrap();
    }
}
