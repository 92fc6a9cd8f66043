//! Set base URI of requests.
use http::{uri, Request};
use tower::{Layer, Service};

/// Layer that applies [`BaseUri`] which makes all requests relative to the cluster url.
///
/// Path in the base URI is preserved, so a proxy mounted below a prefix works.
#[derive(Debug, Clone)]
pub struct BaseUriLayer {
    base_uri: http::Uri,
}

impl BaseUriLayer {
    /// Set base URI of requests.
    pub fn new(base_uri: http::Uri) -> Self {
        Self { base_uri }
    }
}

impl<S> Layer<S> for BaseUriLayer {
    type Service = BaseUri<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BaseUri {
            base_uri: self.base_uri.clone(),
            inner,
        }
    }
}

/// Middleware that sets base URI so that all requests are relative to it.
#[derive(Debug, Clone)]
pub struct BaseUri<S> {
    base_uri: http::Uri,
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for BaseUri<S>
where
    S: Service<Request<ReqBody>>,
{
    type Error = S::Error;
    type Future = S::Future;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let (mut parts, body) = req.into_parts();
        if let Some(joined) = join(&self.base_uri, parts.uri.path_and_query()) {
            parts.uri = joined;
        } else {
            tracing::warn!("cannot join {} onto {}", parts.uri, self.base_uri);
        }
        self.inner.call(Request::from_parts(parts, body))
    }
}

// Join base URI and Path+Query, preserving any path in the base.
fn join(base_uri: &http::Uri, req_pandq: Option<&uri::PathAndQuery>) -> Option<http::Uri> {
    let mut builder = uri::Builder::new();
    if let Some(scheme) = base_uri.scheme() {
        builder = builder.scheme(scheme.as_str());
    }
    if let Some(authority) = base_uri.authority() {
        builder = builder.authority(authority.as_str());
    }
    let base_path = base_uri.path().trim_end_matches('/');
    builder = match req_pandq {
        // `PathAndQuery` always starts with a slash.
        Some(pandq) => builder.path_and_query(format!("{base_path}{pandq}")),
        None => builder.path_and_query(base_uri.path()),
    };
    builder.build().ok()
}

#[cfg(test)]
mod tests {
    #[test]
    fn normal_host() {
        let base_uri = http::Uri::from_static("http://127.0.0.1:8001");
        let apipath = http::Uri::from_static("/apis/strela.dev/v1/minecraftservers?watch=true");
        assert_eq!(
            super::join(&base_uri, apipath.path_and_query()).unwrap(),
            "http://127.0.0.1:8001/apis/strela.dev/v1/minecraftservers?watch=true"
        );
    }

    #[test]
    fn host_with_path() {
        let base_uri = http::Uri::from_static("http://gateway.local/clusters/games/");
        let api_path = http::Uri::from_static("/api/v1/pods");
        assert_eq!(
            super::join(&base_uri, api_path.path_and_query()).unwrap(),
            "http://gateway.local/clusters/games/api/v1/pods"
        );
    }
}
