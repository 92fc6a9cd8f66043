//! A scripted api server on top of `tower_test::mock` for driving watchers and informers
use bytes::Bytes;
use futures::channel::mpsc;
use http::{Request, Response, StatusCode};
use http_body::Frame;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full, StreamBody};
use k8s_openapi::api::core::v1::ConfigMap;
use serde_json::{json, Value};
use std::{collections::BTreeMap, convert::Infallible};
use strela_client::{client::Body, Api, Client, Resource};
use tower_test::mock;

type TestBody = UnsyncBoxBody<Bytes, Infallible>;
type Handle = mock::Handle<Request<Body>, Response<TestBody>>;

/// An `Api` for `K` in `ns` whose requests are answered by the returned [`ApiServer`]
pub fn mock_api<K>(ns: &str) -> (Api<K>, ApiServer)
where
    K: Resource,
    K::DynamicType: Default,
{
    let (client, server) = mock_client();
    (Api::namespaced(client, ns), server)
}

/// A client whose requests are answered by the returned [`ApiServer`]
pub fn mock_client() -> (Client, ApiServer) {
    let (service, handle) = mock::pair::<Request<Body>, Response<TestBody>>();
    (Client::new(service, "default"), ApiServer { handle })
}

pub struct ApiServer {
    handle: Handle,
}

impl ApiServer {
    /// Wait for the next request, whatever it is
    pub async fn next(&mut self) -> (Request<Body>, mock::SendResponse<Response<TestBody>>) {
        self.handle.next_request().await.expect("service not called")
    }

    /// Answer the next request, which must be a list, with `body`
    pub async fn expect_list(&mut self, body: Value) -> Request<Body> {
        let (request, send) = self.next().await;
        assert_eq!(request.method(), http::Method::GET);
        assert!(!is_watch(&request), "expected a list, got {}", request.uri());
        send.send_response(json_response(StatusCode::OK, &body));
        request
    }

    /// Answer the next request, which must be a watch from `resource_version`, with an open stream
    pub async fn expect_watch(&mut self, resource_version: &str) -> WatchFeed {
        let (request, send) = self.next().await;
        assert!(is_watch(&request), "expected a watch, got {}", request.uri());
        let query = request.uri().query().unwrap_or_default();
        assert!(
            query.contains(&format!("resourceVersion={resource_version}&")),
            "expected a watch from {resource_version}, got {query}"
        );
        let (feed, body) = watch_feed();
        send.send_response(Response::new(body));
        feed
    }

    /// Answer the next request with an error status
    pub async fn refuse(&mut self, code: u16) -> Request<Body> {
        let (request, send) = self.next().await;
        let status = StatusCode::from_u16(code).expect("valid status code");
        let body = json!({
            "kind": "Status",
            "status": "Failure",
            "message": status.canonical_reason().unwrap_or_default(),
            "reason": status.canonical_reason().unwrap_or_default(),
            "code": code,
        });
        send.send_response(json_response(status, &body));
        request
    }
}

pub fn is_watch(request: &Request<Body>) -> bool {
    request.uri().query().unwrap_or_default().contains("watch=true")
}

/// The sending side of an open watch response
pub struct WatchFeed {
    tx: mpsc::UnboundedSender<Result<Frame<Bytes>, Infallible>>,
}

impl WatchFeed {
    /// Send one watch record
    pub fn send(&self, record: Value) {
        self.send_raw(&format!("{record}\n"));
    }

    /// Send arbitrary bytes
    pub fn send_raw(&self, raw: &str) {
        // A closed receiver means the watcher already dropped the stream
        let _ = self.tx.unbounded_send(Ok(Frame::data(Bytes::from(raw.to_string()))));
    }

    /// End the response, as the server does when a watch times out
    pub fn close(self) {}
}

/// An open watch response body and the handle that feeds it
pub fn watch_feed() -> (WatchFeed, TestBody) {
    let (tx, rx) = mpsc::unbounded();
    (WatchFeed { tx }, StreamBody::new(rx).boxed_unsync())
}

pub fn json_response(status: StatusCode, body: &Value) -> Response<TestBody> {
    let bytes = Bytes::from(serde_json::to_vec(body).expect("serializable"));
    Response::builder()
        .status(status)
        .body(Full::new(bytes).boxed_unsync())
        .expect("valid response")
}

/// A config map with a single data entry so that versions compare unequal
pub fn cm(ns: &str, name: &str, rv: &str) -> ConfigMap {
    let mut cm = ConfigMap::default();
    cm.metadata.name = Some(name.into());
    cm.metadata.namespace = Some(ns.into());
    cm.metadata.resource_version = Some(rv.into());
    cm.data = Some(BTreeMap::from([("rv".to_string(), rv.to_string())]));
    cm
}

pub fn list_body<K: serde::Serialize>(rv: &str, items: &[K]) -> Value {
    json!({
        "kind": "List",
        "apiVersion": "v1",
        "metadata": { "resourceVersion": rv },
        "items": items,
    })
}

pub fn watch_line<K: serde::Serialize>(type_: &str, obj: K) -> Value {
    json!({ "type": type_, "object": obj })
}

#[test]
fn helpers_produce_wire_shapes() {
    let line = watch_line("ADDED", cm("games", "a", "1"));
    assert_eq!(line["object"]["metadata"]["name"], "a");
    assert_eq!(list_body("5", &[cm("games", "a", "1")])["metadata"]["resourceVersion"], "5");
}
