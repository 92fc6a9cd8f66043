use super::middleware::{BaseUriLayer, ExtraHeadersLayer};
use crate::Config;

/// Extensions to [`Config`](crate::Config) for custom [`Client`](crate::Client) stacks.
///
/// See [`ClientBuilder`](crate::client::ClientBuilder) for an example.
///
/// This trait is sealed and cannot be implemented.
pub trait ConfigExt: private::Sealed {
    /// Layer to set the base URI of requests to the configured server.
    fn base_uri_layer(&self) -> BaseUriLayer;

    /// Layer to add the configured HTTP headers.
    fn extra_headers_layer(&self) -> ExtraHeadersLayer;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Config {}
}

impl ConfigExt for Config {
    fn base_uri_layer(&self) -> BaseUriLayer {
        BaseUriLayer::new(self.cluster_url.clone())
    }

    fn extra_headers_layer(&self) -> ExtraHeadersLayer {
        ExtraHeadersLayer::new(self.headers.clone())
    }
}
