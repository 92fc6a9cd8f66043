//! Client configuration from the environment
//!
//! # Usage
//! The [`Config`] has a plain constructor plus logic to infer it from the environment.
//!
//! Unless you have issues, prefer using [`Config::infer`], and pass it to a [`Client`][crate::Client].
use crate::error::ConfigError;
use http::{header::HeaderName, HeaderValue};
use std::time::Duration;

/// Variable holding an explicit cluster url
pub const CLUSTER_URL_ENV: &str = "STRELA_CLUSTER_URL";
/// Variable holding the default namespace
pub const NAMESPACE_ENV: &str = "STRELA_NAMESPACE";

const SERVICE_HOSTENV: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORTENV: &str = "KUBERNETES_SERVICE_PORT";
const SERVICE_DEFAULT_NS: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// `kubectl proxy` listens here by default
const LOCAL_PROXY_URL: &str = "http://localhost:8001";

// Watches are cut by the server before this
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(295);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration object detailing the cluster URL, default namespace, headers and timeouts.
///
/// Credentials are not part of the configuration; they are expected to be attached
/// by the transport stack (or by a proxy in front of the api server).
#[derive(Debug, Clone)]
pub struct Config {
    /// The configured cluster url
    pub cluster_url: http::Uri,
    /// The configured default namespace
    pub default_namespace: String,
    /// Timeout for establishing a connection
    ///
    /// A value of `None` means no timeout
    pub connect_timeout: Option<Duration>,
    /// Timeout between two reads of a response
    ///
    /// A value of `None` means no timeout
    pub read_timeout: Option<Duration>,
    /// Timeout for writing a request
    ///
    /// A value of `None` means no timeout
    pub write_timeout: Option<Duration>,
    /// Headers added to every request
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl Config {
    /// Construct a new config where only the `cluster_url` is set by the user
    /// and everything else receives a default value.
    pub fn new(cluster_url: http::Uri) -> Self {
        Self {
            cluster_url,
            default_namespace: String::from("default"),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: None,
            headers: Vec::new(),
        }
    }

    /// Infer the configuration from the environment
    ///
    /// The cluster url is taken from `STRELA_CLUSTER_URL`, then from the in-cluster
    /// service variables, and falls back on a local `kubectl proxy`.
    /// The namespace is taken from `STRELA_NAMESPACE`, then from the mounted service
    /// account, and falls back on `default`.
    pub fn infer() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), load_default_ns)
    }

    fn from_lookup(
        env: impl Fn(&str) -> Option<String>,
        service_account_ns: impl FnOnce() -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let url = match (env(CLUSTER_URL_ENV), env(SERVICE_HOSTENV), env(SERVICE_PORTENV)) {
            (Some(url), _, _) => url,
            (None, Some(host), Some(port)) => {
                tracing::trace!("using in-cluster service address");
                in_cluster_url(&host, &port)
            }
            _ => {
                tracing::trace!("no cluster url configured, falling back to {}", LOCAL_PROXY_URL);
                LOCAL_PROXY_URL.to_string()
            }
        };
        let cluster_url = url
            .parse::<http::Uri>()
            .map_err(|source| ConfigError::InvalidClusterUrl { url, source })?;

        let default_namespace = env(NAMESPACE_ENV)
            .or_else(service_account_ns)
            .unwrap_or_else(|| String::from("default"));

        Ok(Self {
            default_namespace,
            ..Self::new(cluster_url)
        })
    }

    /// Add a header to every request
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidHeader { name: name.to_string() };
        let name_ = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.headers.push((name_, value));
        Ok(self)
    }
}

fn in_cluster_url(host: &str, port: &str) -> String {
    // Bracket ipv6 hosts
    if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    }
}

fn load_default_ns() -> Option<String> {
    std::fs::read_to_string(SERVICE_DEFAULT_NS)
        .ok()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn explicit_url_wins() {
        let config = Config::from_lookup(
            lookup(&[
                (CLUSTER_URL_ENV, "http://10.0.0.1:8080"),
                (SERVICE_HOSTENV, "10.96.0.1"),
                (SERVICE_PORTENV, "443"),
                (NAMESPACE_ENV, "games"),
            ]),
            || Some("ignored".into()),
        )
        .unwrap();
        assert_eq!(config.cluster_url, "http://10.0.0.1:8080/");
        assert_eq!(config.default_namespace, "games");
    }

    #[test]
    fn in_cluster_variables() {
        let config = Config::from_lookup(
            lookup(&[(SERVICE_HOSTENV, "fd00::1"), (SERVICE_PORTENV, "443")]),
            || Some("strela-system".into()),
        )
        .unwrap();
        assert_eq!(config.cluster_url, "https://[fd00::1]:443/");
        assert_eq!(config.default_namespace, "strela-system");
    }

    #[test]
    fn falls_back_to_local_proxy() {
        let config = Config::from_lookup(lookup(&[]), || None).unwrap();
        assert_eq!(config.cluster_url, "http://localhost:8001/");
        assert_eq!(config.default_namespace, "default");
        assert_eq!(config.read_timeout, Some(DEFAULT_READ_TIMEOUT));
    }

    #[test]
    fn rejects_bad_urls_and_headers() {
        let err = Config::from_lookup(lookup(&[(CLUSTER_URL_ENV, "http://bad host")]), || None);
        assert!(matches!(err, Err(ConfigError::InvalidClusterUrl { .. })));

        let config = Config::new(http::Uri::from_static("http://localhost:8001"));
        assert!(config.clone().header("x-strela", "1").is_ok());
        assert!(config.header("bad header", "1").is_err());
    }
}
