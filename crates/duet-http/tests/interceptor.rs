use std::sync::Arc;

use duet_auth::{AuthContext, AuthOrchestrator, StaticNavigator};
use duet_config::AuthConfig;
use duet_events::AuthEvent;
use duet_http::AuthenticatedClient;
use duet_store::MemoryStore;
use duet_test_support::fixtures::{delegated_config, guest_config, init_tracing};
use duet_test_support::mocks::{FakeOidcFactory, FakeProviderScript};
use httpmock::prelude::*;
use reqwest::StatusCode;

async fn orchestrator(store: MemoryStore, config: AuthConfig) -> AuthOrchestrator {
    init_tracing();
    let context = AuthContext::builder()
        .store(Arc::new(store))
        .navigator(Arc::new(StaticNavigator::new("https://app.example.com")))
        .build();
    let auth = AuthOrchestrator::new(
        context,
        Arc::new(FakeOidcFactory::new(FakeProviderScript::default())),
    );
    let _ = auth.init_once(config).await;
    auth
}

#[tokio::test]
async fn delegated_requests_carry_bearer_token() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/orders")
            .header("authorization", "Bearer access-1");
        then.status(200).body("[]");
    });

    let auth = orchestrator(MemoryStore::new(), delegated_config("app1")).await;
    let client = AuthenticatedClient::for_orchestrator(&auth);
    let response = client.send(client.get(server.url("/v1/orders"))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    mock.assert();
    assert!(auth.context().events().recent().iter().all(|envelope| {
        envelope.event == AuthEvent::AlreadyAuthenticated
    }));
    Ok(())
}

#[tokio::test]
async fn guest_requests_carry_guest_header() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/catalog")
            .header("guestid", "guest-42");
        then.status(200);
    });

    let store = MemoryStore::with_entries([("shop-guestId", "guest-42")]);
    let auth = orchestrator(store, guest_config("shop", None)).await;
    let client = AuthenticatedClient::for_orchestrator(&auth);
    let response = client.send(client.get(server.url("/v1/catalog"))).await?;

    assert!(response.status().is_success());
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn unauthorized_response_requests_login_once_and_surfaces_error() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/orders");
        then.status(401);
    });

    let auth = orchestrator(MemoryStore::new(), AuthConfig::default()).await;
    let client = AuthenticatedClient::for_orchestrator(&auth);
    let err = client
        .send(client.get(server.url("/v1/orders")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    mock.assert();
    let events = auth.context().events();
    assert_eq!(events.count(AuthEvent::LoginRequired), 1);
    assert_eq!(events.count(AuthEvent::PermissionDenied), 0);
}

#[tokio::test]
async fn forbidden_response_reports_permission_denied() {
    let server = MockServer::start_async().await;
    let _mock = server.mock(|when, then| {
        when.method(POST).path("/v1/admin");
        then.status(403);
    });

    let auth = orchestrator(MemoryStore::new(), delegated_config("app1")).await;
    let client = AuthenticatedClient::for_orchestrator(&auth);
    let err = client
        .send(client.request(reqwest::Method::POST, server.url("/v1/admin")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    let events = auth.context().events();
    assert_eq!(events.count(AuthEvent::PermissionDenied), 1);
    assert_eq!(events.count(AuthEvent::LoginRequired), 0);
}

#[tokio::test]
async fn server_errors_publish_nothing() {
    let server = MockServer::start_async().await;
    let _mock = server.mock(|when, then| {
        when.method(GET).path("/v1/orders");
        then.status(500);
    });

    let auth = orchestrator(MemoryStore::new(), AuthConfig::default()).await;
    let client = AuthenticatedClient::for_orchestrator(&auth);
    let err = client
        .send(client.get(server.url("/v1/orders")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(auth.context().events().recent().is_empty());
}
