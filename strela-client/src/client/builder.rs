use bytes::Bytes;
use http::{header::HeaderMap, Request, Response};
use hyper::body::Incoming;
use hyper_timeout::TimeoutConnector;
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};

use std::time::Duration;
use tower::{util::BoxService, BoxError, Layer, Service, ServiceBuilder};
use tower_http::{
    classify::ServerErrorsFailureClass, map_response_body::MapResponseBodyLayer, trace::TraceLayer,
};
use tracing::Span;

use super::body::Body;
use crate::{client::ConfigExt, Client, Config, Error, Result};

/// Response body of the type erased default stack
pub type DynBody = dyn http_body::Body<Data = Bytes, Error = BoxError> + Send + Unpin;

/// Assembles a [`Client`] from a tower stack, one [`Layer`] at a time
///
/// ```no_run
/// # fn doc() -> Result<(), Box<dyn std::error::Error>> {
/// use strela_client::{client::{ClientBuilder, GenericService}, Config};
/// use tower_http::trace::TraceLayer;
///
/// let config = Config::infer()?;
/// let client = ClientBuilder::<GenericService>::try_from(config)?
///     .with_layer(&TraceLayer::new_for_http())
///     .build();
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<Svc> {
    service: Svc,
    default_ns: String,
}

impl<Svc> ClientBuilder<Svc> {
    /// Start from an arbitrary service, e.g. one that adds TLS and credentials
    pub fn new(service: Svc, default_namespace: impl Into<String>) -> Self
    where
        Svc: Service<Request<Body>>,
    {
        Self {
            service,
            default_ns: default_namespace.into(),
        }
    }

    /// Wrap the stack in `layer`
    pub fn with_layer<L: Layer<Svc>>(self, layer: &L) -> ClientBuilder<L::Service> {
        ClientBuilder {
            service: layer.layer(self.service),
            default_ns: self.default_ns,
        }
    }

    /// Finish the stack
    pub fn build<B>(self) -> Client
    where
        Svc: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        Svc::Future: Send + 'static,
        Svc::Error: Into<BoxError>,
        B: http_body::Body<Data = bytes::Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Client::new(self.service, self.default_ns)
    }
}

/// The type erased default stack
pub type GenericService = BoxService<Request<Body>, Response<Box<DynBody>>, BoxError>;

type Connector = TimeoutConnector<HttpConnector>;

fn connector(config: &Config) -> Connector {
    let mut connector = TimeoutConnector::new(HttpConnector::new());
    connector.set_connect_timeout(config.connect_timeout);
    connector.set_read_timeout(config.read_timeout);
    connector.set_write_timeout(config.write_timeout);
    connector
}

fn request_span(req: &Request<Body>) -> Span {
    let verb = req.extensions().get::<&'static str>().copied().unwrap_or("HTTP");
    tracing::debug_span!(
        "HTTP",
        http.method = %req.method(),
        http.url = %req.uri(),
        http.status_code = tracing::field::Empty,
        strela.verb = verb,
    )
}

fn record_failure(class: ServerErrorsFailureClass, _latency: Duration, span: &Span) {
    match class {
        ServerErrorsFailureClass::StatusCode(status) => {
            span.record("http.status_code", status.as_u16());
            tracing::error!(%status, "request failed");
        }
        ServerErrorsFailureClass::Error(err) => tracing::error!(%err, "request failed"),
    }
}

impl TryFrom<Config> for ClientBuilder<GenericService> {
    type Error = Error;

    /// Plain http over hyper, with timeouts, the base uri, extra headers and tracing
    ///
    /// `https` cluster urls are refused with [`Error::TlsRequired`].
    fn try_from(config: Config) -> Result<Self> {
        if config.cluster_url.scheme() == Some(&http::uri::Scheme::HTTPS) {
            return Err(Error::TlsRequired(config.cluster_url));
        }
        let hyper_client: hyper_util::client::legacy::Client<Connector, Body> =
            hyper_util::client::legacy::Builder::new(TokioExecutor::new()).build(connector(&config));

        let trace = TraceLayer::new_for_http()
            .make_span_with(request_span)
            .on_request(|_: &Request<Body>, _: &Span| tracing::debug!("requesting"))
            .on_response(|res: &Response<Incoming>, _: Duration, span: &Span| {
                span.record("http.status_code", res.status().as_u16());
            })
            .on_body_chunk(())
            .on_eos(|_: Option<&HeaderMap>, _: Duration, _: &Span| tracing::debug!("stream closed"))
            .on_failure(record_failure);

        let stack = ServiceBuilder::new()
            .layer(config.base_uri_layer())
            .layer(config.extra_headers_layer())
            .layer(trace)
            .map_err(BoxError::from)
            .service(hyper_client);
        let erased = MapResponseBodyLayer::new(|body| {
            Box::new(http_body_util::BodyExt::map_err(body, BoxError::from)) as Box<DynBody>
        })
        .layer(stack);

        Ok(ClientBuilder::new(BoxService::new(erased), config.default_namespace))
    }
}
