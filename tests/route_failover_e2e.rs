//! End-to-end route failover against a mocked control plane
//!
//! Drives `RouteController` through the real `ArmClient`: token acquisition,
//! route listing, the async-operation protocol and settle-polling.

use std::sync::Arc;
use std::time::Duration;

use cloud_failover::cloud::{ArmClient, ArmEndpoints, CloudNetworkApi, Credentials};
use cloud_failover::config::{AgentConfig, MonitorMode, RouteParams, TimingConfig};
use cloud_failover::controller::RouteController;
use cloud_failover::ocf::{self, Outcome, Verb};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROUTES_PATH: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/routeTables/ha/routes";

fn route(name: &str, hop_type: &str, hop: &str) -> Value {
    json!({
        "id": format!("{ROUTES_PATH}/{name}"),
        "name": name,
        "properties": {
            "addressPrefix": "0.0.0.0/0",
            "nextHopType": hop_type,
            "nextHopIpAddress": hop,
            "provisioningState": "Succeeded"
        }
    })
}

async fn control_plane() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata/identity/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "expires_on": 4102444800u64
        })))
        .mount(&server)
        .await;
    server
}

fn controller(server: &MockServer, mode: MonitorMode) -> RouteController {
    let endpoints = ArmEndpoints {
        management: server.uri(),
        login: server.uri(),
        imds: server.uri(),
    };
    let credentials = Credentials::ManagedIdentity {
        client_id: "mi".to_string(),
    };
    let api: Arc<dyn CloudNetworkApi> = Arc::new(
        ArmClient::new("sub", credentials.clone(), endpoints.clone())
            .unwrap()
            .with_operation_poll_interval(Duration::ZERO),
    );

    let config = AgentConfig {
        subscription_id: "sub".to_string(),
        resource_group: "rg".to_string(),
        credentials,
        endpoints,
        timing: TimingConfig {
            call_budget: Duration::from_secs(10),
            settle_delay: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        },
        monitor_mode: mode,
        dry_run: false,
    };
    let params = RouteParams {
        interface: "eth0".to_string(),
        table: "ha".to_string(),
        local_address: Some("10.0.1.4/24".parse().unwrap()),
    };
    RouteController::new(api, config, params)
}

#[tokio::test]
async fn start_repoints_peer_routes_and_waits_for_operation() {
    let server = control_plane().await;

    // first listing sees the peer, the post-convergence listing sees us
    Mock::given(method("GET"))
        .and(path(ROUTES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                route("default", "VirtualAppliance", "10.0.1.5"),
                route("internet", "Internet", "")
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ROUTES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [route("default", "VirtualAppliance", "10.0.1.4")]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{ROUTES_PATH}/default")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(route(
                "default",
                "VirtualAppliance",
                "10.0.1.5",
            )),
        )
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("{ROUTES_PATH}/default")))
        .and(body_partial_json(json!({
            "properties": { "nextHopIpAddress": "10.0.1.4" }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header(
                    "Azure-AsyncOperation",
                    format!("{}/operations/op1", server.uri()).as_str(),
                )
                .set_body_json(route("default", "VirtualAppliance", "10.0.1.4")),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Succeeded" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = controller(&server, MonitorMode::Probe)
        .handle(Verb::Start)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Success);
}

#[tokio::test]
async fn monitor_reports_standby_without_writing() {
    let server = control_plane().await;
    Mock::given(method("GET"))
        .and(path(ROUTES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                route("default", "VirtualAppliance", "10.0.1.5"),
                route("onprem", "VirtualAppliance", "10.0.1.5")
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = controller(&server, MonitorMode::Probe)
        .handle(Verb::Monitor)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NotRunning);
}

#[tokio::test]
async fn rejected_credentials_fail_probe_but_not_periodic_monitor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata/identity/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "Identity not found"
        })))
        .mount(&server)
        .await;

    let probe = controller(&server, MonitorMode::Probe)
        .handle(Verb::Monitor)
        .await;
    assert_eq!(ocf::resolve(&probe), Outcome::ErrGeneric);

    let periodic = controller(&server, MonitorMode::Periodic)
        .handle(Verb::Monitor)
        .await;
    assert_eq!(ocf::resolve(&periodic), Outcome::Success);
}

#[tokio::test]
async fn table_without_appliance_routes_is_misconfigured() {
    let server = control_plane().await;
    Mock::given(method("GET"))
        .and(path(ROUTES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [route("internet", "Internet", "")]
        })))
        .mount(&server)
        .await;

    let result = controller(&server, MonitorMode::Periodic)
        .handle(Verb::ValidateAll)
        .await;
    assert_eq!(ocf::resolve(&result), Outcome::ErrConfigured);
}
