use crate::{
    client::Body,
    runtime::{
        dispatcher::{EventHandler, HandlerError},
        informer, Informer,
    },
    sdk::{
        sdk_for_pod, MinecraftDeployment, MinecraftDeploymentSpec, MinecraftServer, MinecraftServerSpec,
    },
    Api, Client,
};
use anyhow::Result;
use http::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

fn server(name: &str, rv: &str) -> Value {
    let mut server = MinecraftServer::new(name, MinecraftServerSpec::default());
    server.metadata.namespace = Some("games".into());
    server.metadata.resource_version = Some(rv.into());
    serde_json::to_value(server).unwrap()
}

fn deployment(name: &str, type_: &str) -> Value {
    let mut deployment = MinecraftDeployment::new(name, MinecraftDeploymentSpec {
        type_: type_.into(),
        replicas: Some(1),
        ..MinecraftDeploymentSpec::default()
    });
    deployment.metadata.namespace = Some("games".into());
    deployment.metadata.resource_version = Some("3".into());
    serde_json::to_value(deployment).unwrap()
}

#[tokio::test]
async fn sdk_crud_against_the_api_server() -> Result<()> {
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::Crud);
    let sdk = sdk_for_pod(client, "games", Some("lobby-0"));
    let servers = sdk.minecraft_servers();

    let mut wanted = MinecraftServer::new("lobby-0", MinecraftServerSpec::default());
    wanted.metadata.resource_version = Some("stale".into());
    let created = servers.create(&wanted).await?;
    assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

    // exists already, so the update replaces it
    let replaced = servers.update(&wanted).await?;
    assert_eq!(replaced.metadata.resource_version.as_deref(), Some("2"));

    let labelled = servers
        .update_with("lobby-0", |s| {
            s.metadata
                .labels
                .get_or_insert_with(Default::default)
                .insert("tier".into(), "lobby".into());
        })
        .await?;
    assert_eq!(labelled.metadata.resource_version.as_deref(), Some("3"));

    assert!(servers.get("ghost").await?.is_none());
    servers.delete("ghost").await?;

    let me = sdk.current_server().await?.expect("current server exists");
    let pod = servers.pod_for_server(&me).await?.expect("pod exists");
    assert_eq!(pod.metadata.name.as_deref(), Some("lobby-0"));

    let proxies = sdk.minecraft_deployments().list_proxies().await?;
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].metadata.name.as_deref(), Some("bungee"));
    timeout_after_1s(mocksrv).await;
    Ok(())
}

#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<String>>>);

impl EventHandler<MinecraftServer> for Seen {
    fn on_add(&self, obj: &MinecraftServer) -> Result<(), HandlerError> {
        self.0.lock().unwrap().push(format!("add {}", obj.metadata.name.as_deref().unwrap_or_default()));
        Ok(())
    }

    fn on_delete(&self, obj: &MinecraftServer) -> Result<(), HandlerError> {
        self.0.lock().unwrap().push(format!("delete {}", obj.metadata.name.as_deref().unwrap_or_default()));
        Ok(())
    }
}

#[tokio::test]
async fn informer_over_minecraft_servers() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (client, fakeserver) = testcontext();
    let mocksrv = fakeserver.run(Scenario::InformServers);
    let informer = Informer::new(Api::<MinecraftServer>::namespaced(client, "games"), informer::Config::default());
    let seen = Seen::default();
    informer.register(seen.clone());
    informer.start()?;
    informer.wait_until_ready().await?;

    timeout_after_1s(mocksrv).await;
    tokio::time::timeout(Duration::from_secs(1), async {
        while seen.0.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(*seen.0.lock().unwrap(), vec!["add lobby-0", "add lobby-1", "delete lobby-0"]);
    assert!(informer.get_by_key("games", "lobby-0").is_err());
    assert!(informer.get_by_key("games", "lobby-1").is_ok());
    informer.shutdown().await;
    assert!(informer.store().is_empty());
    Ok(())
}

// ------------------------------------------------------------------------
// mock test setup cruft
// ------------------------------------------------------------------------

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;
struct ApiServerVerifier(ApiServerHandle);

async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}

/// Scenarios we test for in ApiServerVerifier above
enum Scenario {
    Crud,
    InformServers,
}

impl ApiServerVerifier {
    /// Run one scenario to completion on a task
    ///
    /// Await the returned handle with a timeout to catch calls the scenario expected
    /// but never received.
    fn run(self, scenario: Scenario) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match scenario {
                Scenario::Crud => self.handle_crud().await,
                Scenario::InformServers => self.handle_inform_servers().await,
            }
            .expect("scenario completed without errors");
        })
    }

    async fn next(&mut self) -> (Request<Body>, tower_test::mock::SendResponse<Response<Body>>) {
        self.0.next_request().await.expect("service not called")
    }

    async fn handle_crud(mut self) -> Result<Self> {
        let servers = "/apis/strela.dev/v1/namespaces/games/minecraftservers";

        // create
        let (request, send) = self.next().await;
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().path(), servers);
        let body: Value = serde_json::from_slice(&request.into_body().collect_bytes().await?)?;
        assert_eq!(body["metadata"]["namespace"], "games");
        assert!(body["metadata"].get("resourceVersion").is_none());
        send.send_response(json_response(StatusCode::CREATED, server("lobby-0", "1")));

        // update: create conflicts, then an unconditional replace
        let (request, send) = self.next().await;
        assert_eq!(request.method(), Method::POST);
        send.send_response(status(409, "AlreadyExists"));
        let (request, send) = self.next().await;
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri().path(), format!("{servers}/lobby-0"));
        send.send_response(json_response(StatusCode::OK, server("lobby-0", "2")));

        // update_with: get, then create conflicts, then replace
        let (request, send) = self.next().await;
        assert_eq!(request.method(), Method::GET);
        send.send_response(json_response(StatusCode::OK, server("lobby-0", "2")));
        let (_, send) = self.next().await;
        send.send_response(status(409, "AlreadyExists"));
        let (request, send) = self.next().await;
        assert_eq!(request.method(), Method::PUT);
        let body: Value = serde_json::from_slice(&request.into_body().collect_bytes().await?)?;
        assert_eq!(body["metadata"]["labels"]["tier"], "lobby");
        let mut labelled = server("lobby-0", "3");
        labelled["metadata"]["labels"] = json!({ "tier": "lobby" });
        send.send_response(json_response(StatusCode::OK, labelled));

        // get and delete of a missing server
        let (request, send) = self.next().await;
        assert_eq!(request.uri().path(), format!("{servers}/ghost"));
        send.send_response(status(404, "NotFound"));
        let (request, send) = self.next().await;
        assert_eq!(request.method(), Method::DELETE);
        send.send_response(status(404, "NotFound"));

        // current server and its pod
        let (request, send) = self.next().await;
        assert_eq!(request.uri().path(), format!("{servers}/lobby-0"));
        send.send_response(json_response(StatusCode::OK, server("lobby-0", "3")));
        let (request, send) = self.next().await;
        assert_eq!(request.uri().path(), "/api/v1/namespaces/games/pods/lobby-0");
        send.send_response(json_response(
            StatusCode::OK,
            json!({ "apiVersion": "v1", "kind": "Pod", "metadata": { "name": "lobby-0", "namespace": "games" } }),
        ));

        // proxies are filtered client side
        let (request, send) = self.next().await;
        assert_eq!(request.uri().path(), "/apis/strela.dev/v1/namespaces/games/minecraftdeployments");
        send.send_response(json_response(
            StatusCode::OK,
            json!({
                "apiVersion": "strela.dev/v1",
                "kind": "MinecraftDeploymentList",
                "metadata": { "resourceVersion": "9" },
                "items": [deployment("bungee", "PROXY"), deployment("survival", "SERVER")],
            }),
        ));
        Ok(self)
    }

    async fn handle_inform_servers(mut self) -> Result<Self> {
        let (request, send) = self.next().await;
        assert!(!request.uri().query().unwrap_or_default().contains("watch=true"));
        send.send_response(json_response(
            StatusCode::OK,
            json!({
                "apiVersion": "strela.dev/v1",
                "kind": "MinecraftServerList",
                "metadata": { "resourceVersion": "10" },
                "items": [server("lobby-0", "9")],
            }),
        ));

        let (request, send) = self.next().await;
        let query = request.uri().query().unwrap_or_default().to_string();
        assert!(query.contains("watch=true"), "{query}");
        assert!(query.contains("resourceVersion=10&"), "{query}");
        let lines = [
            json!({ "type": "ADDED", "object": server("lobby-1", "11") }),
            json!({ "type": "BOOKMARK", "object": { "apiVersion": "strela.dev/v1", "kind": "MinecraftServer", "metadata": { "resourceVersion": "12" } } }),
            json!({ "type": "DELETED", "object": server("lobby-0", "13") }),
        ]
        .iter()
        .map(|line| format!("{line}\n"))
        .collect::<String>();
        send.send_response(Response::new(Body::from(lines.into_bytes())));

        // the response ended, so the watch resumes where it stopped
        let (request, _send) = self.next().await;
        let query = request.uri().query().unwrap_or_default();
        assert!(query.contains("resourceVersion=13&"), "{query}");
        Ok(self)
    }
}

fn json_response(code: StatusCode, body: Value) -> Response<Body> {
    Response::builder()
        .status(code)
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn status(code: u16, reason: &str) -> Response<Body> {
    json_response(
        StatusCode::from_u16(code).unwrap(),
        json!({ "kind": "Status", "status": "Failure", "message": reason, "reason": reason, "code": code }),
    )
}

fn testcontext() -> (Client, ApiServerVerifier) {
    let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let mock_client = Client::new(mock_service, "default");
    (mock_client, ApiServerVerifier(handle))
}
