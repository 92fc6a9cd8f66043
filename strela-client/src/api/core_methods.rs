use either::Either;
use futures::{Stream, TryStreamExt};
use serde::{de::DeserializeOwned, de::Error as _, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::{api::Api, Error, Result};
use strela_core::{object::ObjectList, params::*, response::Status, Resource, WatchEvent};

// request/response calls; watch is at the bottom
impl<K> Api<K>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    /// Get a named resource
    ///
    /// ```no_run
    /// # use strela_client::Api;
    /// use k8s_openapi::api::core::v1::Pod;
    ///
    /// # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client: strela_client::Client = todo!();
    /// let pods: Api<Pod> = Api::namespaced(client, "games");
    /// let p: Pod = pods.get("lobby-0").await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// A missing object is an [`Error::NotFound`]; [`Api::get_opt`] maps it to `None`.
    pub async fn get(&self, name: &str) -> Result<K> {
        let mut req = self.request.get(name).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("get");
        let value = self.call::<Value>(req, Some(name)).await?;
        self.decode(value, Some(name))
    }

    /// Like [`Api::get`], with `None` for a missing object
    pub async fn get_opt(&self, name: &str) -> Result<Option<K>> {
        match self.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// One page of the collection
    ///
    /// The returned list carries the list level `resourceVersion` that a watch
    /// must resume from. A list without one is rejected as malformed.
    pub async fn list(&self, lp: &ListParams) -> Result<ObjectList<K>> {
        let mut req = self.request.list(lp).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("list");
        let raw = self.call::<ObjectList<Value>>(req, None).await?;
        if raw.resource_version().is_none() {
            let source = serde_json::Error::custom("list response is missing metadata.resourceVersion");
            return Err(Error::malformed(source).with_origin(&self.origin(None)));
        }
        raw.decode_items(self.dyntype())
            .map_err(|e| Error::malformed(e).with_origin(&self.origin(None)))
    }

    /// Create a resource
    ///
    /// The object is encoded through the typed shape of the kind before it is sent.
    pub async fn create(&self, pp: &PostParams, data: &K) -> Result<K>
    where
        K: Serialize,
    {
        let name = data.meta().name.clone();
        let bytes = self.encode(data)?;
        let mut req = self.request.create(pp, bytes).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("create");
        let value = self.call::<Value>(req, name.as_deref()).await?;
        self.decode(value, name.as_deref())
    }

    /// Replace a resource entirely with a new one
    ///
    /// `metadata.resourceVersion` must be set on `data`; a stale version yields
    /// [`Error::ConflictVersion`].
    pub async fn replace(&self, name: &str, pp: &PostParams, data: &K) -> Result<K>
    where
        K: Serialize,
    {
        let bytes = self.encode(data)?;
        let mut req = self.request.replace(name, pp, bytes).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("replace");
        let value = self.call::<Value>(req, Some(name)).await?;
        self.decode(value, Some(name))
    }

    /// Patch a subset of a resource's properties
    ///
    /// ```no_run
    /// use strela_client::{api::{Patch, PatchParams}, Api};
    /// use k8s_openapi::api::core::v1::Pod;
    ///
    /// # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client: strela_client::Client = todo!();
    /// let pods: Api<Pod> = Api::namespaced(client, "games");
    /// let patch = serde_json::json!({
    ///     "metadata": { "labels": { "strela.dev/drain": "true" } }
    /// });
    /// let p: Pod = pods.patch("lobby-0", &PatchParams::default(), &Patch::Merge(&patch)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn patch<P: Serialize + Debug>(&self, name: &str, pp: &PatchParams, patch: &Patch<P>) -> Result<K> {
        let mut req = self.request.patch(name, pp, patch).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("patch");
        let value = self.call::<Value>(req, Some(name)).await?;
        self.decode(value, Some(name))
    }

    /// Delete `name`
    ///
    /// `Left` holds the object when deletion is still in progress (finalizers, grace
    /// periods); `Right` is the server's confirmation that it is gone.
    pub async fn delete(&self, name: &str, dp: &DeleteParams) -> Result<Either<K, Status>> {
        let mut req = self.request.delete(name, dp).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("delete");
        let value = self.call::<Value>(req, Some(name)).await?;
        if value.get("kind").and_then(Value::as_str) == Some("Status") {
            tracing::trace!("Status from delete of {}", name);
            let status = serde_json::from_value::<Status>(value)
                .map_err(|e| Error::malformed(e).with_origin(&self.origin(Some(name))))?;
            Ok(Either::Right(status))
        } else {
            self.decode(value, Some(name)).map(Either::Left)
        }
    }

    /// Watch a list of resources from a given resourceVersion
    ///
    /// The stream ends when the server closes the connection; the caller resumes from
    /// the last seen resource version or relists on [`Error::WatchExpired`] and on
    /// expired [`WatchEvent::Error`] items.
    ///
    /// ```no_run
    /// use strela_client::{api::{Api, ListParams, WatchEvent}, Client};
    /// use k8s_openapi::api::core::v1::Pod;
    /// use futures::{StreamExt, TryStreamExt};
    /// # async fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client: Client = todo!();
    /// let pods: Api<Pod> = Api::namespaced(client, "games");
    /// let list = pods.list(&ListParams::default()).await?;
    /// let version = list.resource_version().unwrap_or("0").to_string();
    /// let mut stream = pods.watch(&ListParams::default(), &version).await?.boxed();
    /// while let Some(status) = stream.try_next().await? {
    ///     match status {
    ///         WatchEvent::Added(s) => println!("Added {:?}", s.metadata.name),
    ///         WatchEvent::Modified(s) => println!("Modified: {:?}", s.metadata.name),
    ///         WatchEvent::Deleted(s) => println!("Deleted {:?}", s.metadata.name),
    ///         WatchEvent::Bookmark(s) => {},
    ///         WatchEvent::Error(s) => println!("{}", s),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn watch(
        &self,
        lp: &ListParams,
        version: &str,
    ) -> Result<impl Stream<Item = Result<WatchEvent<K>>> + Send>
    where
        K: Send + 'static,
    {
        let mut req = self.request.watch(lp, version).map_err(Error::BuildRequest)?;
        req.extensions_mut().insert("watch");
        let origin = self.origin(None);
        let events = self
            .client
            .request_events::<K>(req, self.dyntype().clone())
            .await
            .map_err(|e| e.with_origin(&origin))?;
        Ok(events.map_err(move |e| e.with_origin(&origin)))
    }

    async fn call<T: DeserializeOwned>(&self, req: http::Request<Vec<u8>>, name: Option<&str>) -> Result<T> {
        self.client
            .request::<T>(req)
            .await
            .map_err(|e| e.with_origin(&self.origin(name)))
    }

    fn decode(&self, value: Value, name: Option<&str>) -> Result<K> {
        K::decode(self.dyntype(), value).map_err(|e| Error::malformed(e).with_origin(&self.origin(name)))
    }

    fn encode(&self, data: &K) -> Result<Vec<u8>>
    where
        K: Serialize,
    {
        data.encode(self.dyntype())
            .map_err(|e| Error::BuildRequest(strela_core::Error::SerializeBody(e)))
    }
}
