//! Request builder type for arbitrary api types
use crate::{
    params::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Error, Result,
};

pub(crate) const JSON_MIME: &str = "application/json";

/// A Kubernetes request builder
///
/// Takes a base_path and supplies constructors for common operations.
/// The operations all return `http::Request` objects with a serialized body.
#[derive(Debug, Clone)]
pub struct Request {
    /// The path component of a url
    pub url_path: String,
}

impl Request {
    /// New request with a resource's url path
    pub fn new<S: Into<String>>(url_path: S) -> Self {
        Self {
            url_path: url_path.into(),
        }
    }

    fn named(&self, name: &str) -> Result<String> {
        if name.is_empty() {
            return Err(Error::RequestValidation("A non-empty name is required".into()));
        }
        Ok(format!("{}/{}?", self.url_path, name))
    }
}

// pairs are appended right after the `?` the target already ends with
fn query(target: String) -> form_urlencoded::Serializer<'static, String> {
    let start = target.len();
    form_urlencoded::Serializer::for_suffix(target, start)
}

/// Convenience methods found from API conventions
impl Request {
    /// List a collection of a resource
    pub fn list(&self, lp: &ListParams) -> Result<http::Request<Vec<u8>>> {
        let target = format!("{}?", self.url_path);
        let mut qp = query(target);
        lp.populate_list_qp(&mut qp);
        let urlstr = qp.finish();
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Watch a resource at a given version
    pub fn watch(&self, lp: &ListParams, ver: &str) -> Result<http::Request<Vec<u8>>> {
        lp.validate_watch()?;
        let target = format!("{}?", self.url_path);
        let mut qp = query(target);
        qp.append_pair("watch", "true");
        qp.append_pair("resourceVersion", ver);
        if lp.bookmarks {
            qp.append_pair("allowWatchBookmarks", "true");
        }
        qp.append_pair("timeoutSeconds", &lp.timeout.unwrap_or(290).to_string());
        lp.populate_selectors(&mut qp);
        let urlstr = qp.finish();
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Get a single instance
    pub fn get(&self, name: &str) -> Result<http::Request<Vec<u8>>> {
        let urlstr = query(self.named(name)?).finish();
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Create an instance of a resource
    pub fn create(&self, pp: &PostParams, data: Vec<u8>) -> Result<http::Request<Vec<u8>>> {
        pp.validate()?;
        let target = format!("{}?", self.url_path);
        let mut qp = query(target);
        pp.populate_qp(&mut qp);
        let urlstr = qp.finish();
        http::Request::post(urlstr)
            .header(http::header::CONTENT_TYPE, JSON_MIME)
            .body(data)
            .map_err(Error::BuildRequest)
    }

    /// Replace an instance of a resource
    ///
    /// Requires `metadata.resourceVersion` set in data
    pub fn replace(&self, name: &str, pp: &PostParams, data: Vec<u8>) -> Result<http::Request<Vec<u8>>> {
        pp.validate()?;
        let mut qp = query(self.named(name)?);
        pp.populate_qp(&mut qp);
        let urlstr = qp.finish();
        http::Request::put(urlstr)
            .header(http::header::CONTENT_TYPE, JSON_MIME)
            .body(data)
            .map_err(Error::BuildRequest)
    }

    /// Patch an instance of a resource
    pub fn patch<P: serde::Serialize>(
        &self,
        name: &str,
        pp: &PatchParams,
        patch: &Patch<P>,
    ) -> Result<http::Request<Vec<u8>>> {
        pp.validate(patch)?;
        let mut qp = query(self.named(name)?);
        pp.populate_qp(&mut qp);
        let urlstr = qp.finish();

        http::Request::patch(urlstr)
            .header(http::header::ACCEPT, JSON_MIME)
            .header(http::header::CONTENT_TYPE, patch.content_type())
            .body(patch.serialize().map_err(Error::SerializeBody)?)
            .map_err(Error::BuildRequest)
    }

    /// Delete an instance of a resource
    pub fn delete(&self, name: &str, dp: &DeleteParams) -> Result<http::Request<Vec<u8>>> {
        let urlstr = query(self.named(name)?).finish();
        let body = if dp.is_default() {
            vec![]
        } else {
            serde_json::to_vec(&dp).map_err(Error::SerializeBody)?
        };
        let req = http::Request::delete(urlstr).header(http::header::CONTENT_TYPE, JSON_MIME);
        req.body(body).map_err(Error::BuildRequest)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        params::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
        request::Request,
        resource::Resource,
        Error,
    };
    use k8s_openapi::api::core::v1 as corev1;

    #[test]
    fn list_path() {
        let url = corev1::Pod::url_path(&(), Some("ns"));
        let req = Request::new(url)
            .list(&ListParams::default().labels("app=lobby").limit(10))
            .unwrap();
        assert_eq!(req.uri(), "/api/v1/namespaces/ns/pods?labelSelector=app%3Dlobby&limit=10");
        assert_eq!(req.method(), "GET");
    }

    #[test]
    fn watch_path() {
        let url = corev1::Pod::url_path(&(), Some("ns"));
        let req = Request::new(url)
            .watch(&ListParams::default().fields("metadata.name=x"), "42")
            .unwrap();
        assert_eq!(
            req.uri(),
            "/api/v1/namespaces/ns/pods?watch=true&resourceVersion=42&allowWatchBookmarks=true&timeoutSeconds=290&fieldSelector=metadata.name%3Dx"
        );
    }

    #[test]
    fn watch_without_bookmarks() {
        let url = corev1::Node::url_path(&(), None);
        let req = Request::new(url)
            .watch(&ListParams::default().disable_bookmarks().timeout(10), "0")
            .unwrap();
        assert_eq!(req.uri(), "/api/v1/nodes?watch=true&resourceVersion=0&timeoutSeconds=10");
    }

    #[test]
    fn write_paths() {
        let req = Request::new("/api/v1/namespaces/ns/configmaps");
        let pp = PostParams {
            dry_run: true,
            field_manager: Some("strela".into()),
        };
        let create = req.create(&pp, vec![1]).unwrap();
        assert_eq!(create.uri(), "/api/v1/namespaces/ns/configmaps?dryRun=All&fieldManager=strela");
        assert_eq!(create.method(), "POST");

        let replace = req.replace("cm", &PostParams::default(), vec![]).unwrap();
        assert_eq!(replace.uri(), "/api/v1/namespaces/ns/configmaps/cm?");
        assert_eq!(replace.method(), "PUT");

        let patch = req
            .patch("cm", &PatchParams::default(), &Patch::Merge(serde_json::json!({})))
            .unwrap();
        assert_eq!(patch.method(), "PATCH");
        assert_eq!(
            patch.headers().get("Content-Type").unwrap(),
            "application/merge-patch+json"
        );

        let delete = req.delete("cm", &DeleteParams::default()).unwrap();
        assert_eq!(delete.uri(), "/api/v1/namespaces/ns/configmaps/cm?");
        assert!(delete.body().is_empty());
        let delete = req.delete("cm", &DeleteParams::background()).unwrap();
        assert_eq!(delete.body(), br#"{"propagationPolicy":"Background"}"#);
    }

    #[test]
    fn empty_names_are_rejected() {
        let req = Request::new("/api/v1/namespaces/ns/configmaps");
        assert!(matches!(req.get(""), Err(Error::RequestValidation(_))));
        assert!(matches!(
            req.delete("", &DeleteParams::default()),
            Err(Error::RequestValidation(_))
        ));
    }
}
