//! Test server wrapper for integration tests
//!
//! Provides a subcount-server instance whose identity provider and YouTube
//! API are served by a local wiremock server.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use serde_json::{json, Value};
use subcount_common::config::{
    ApiSection, ConfigOverrides, OAuthSection, ServiceConfig, TomlConfig,
};
use subcount_server::api::{build_router, AppState};
use subcount_server::auth::OAuthTokens;
use subcount_server::server::build_app_state;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test server instance with mocked upstream services
pub struct TestServer {
    pub upstream: MockServer,
    pub app: AppState,
    pub router: Router,
    pub config: ServiceConfig,
}

impl TestServer {
    /// Start with a configured OAuth client
    pub async fn start() -> Self {
        Self::start_with_client_id(Some("test-client.apps.googleusercontent.com")).await
    }

    pub async fn start_with_client_id(client_id: Option<&str>) -> Self {
        let upstream = MockServer::start().await;

        let file = toml_config(&upstream.uri());
        let overrides = ConfigOverrides {
            port: Some(3000),
            client_id: client_id.map(str::to_string),
            client_secret: Some("test-secret".to_string()),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(overrides, file).expect("valid test config");

        let app = build_app_state(&config).expect("app state");
        let router = build_router(app.clone());

        Self {
            upstream,
            app,
            router,
            config,
        }
    }

    /// Serve the router on an ephemeral port
    pub async fn bind(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        addr
    }

    /// Token endpoint accepts any code
    pub async fn mock_token_exchange(&self) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .mount(&self.upstream)
            .await;
    }

    /// Token endpoint that answers only after `delay`
    pub async fn mock_slow_token_exchange(&self, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "access_token": "access-1",
                        "refresh_token": "refresh-1",
                        "expires_in": 3600
                    }))
                    .set_delay(delay),
            )
            .mount(&self.upstream)
            .await;
    }

    /// Wait until the upstream has seen a request for `request_path`
    pub async fn wait_for_request(&self, request_path: &str) {
        for _ in 0..200 {
            let requests = self.upstream.received_requests().await.unwrap_or_default();
            if requests.iter().any(|r| r.url.path() == request_path) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("upstream never received {}", request_path);
    }

    /// Channel list returns the given subscriber count
    pub async fn mock_subscriber_count(&self, count: u64) {
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"statistics": {"subscriberCount": count.to_string()}}]
            })))
            .mount(&self.upstream)
            .await;
    }

    /// Channel list rejects the access token
    pub async fn mock_expired_token(&self) {
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 401, "message": "Invalid Credentials", "errors": [{"reason": "authError"}]}
            })))
            .mount(&self.upstream)
            .await;
    }

    /// Channel list fails with a server error
    pub async fn mock_api_outage(&self) {
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
            .mount(&self.upstream)
            .await;
    }

    /// Skip the browser round trip: install tokens and mark the session signed in
    pub async fn sign_in_directly(&self) {
        self.app
            .credentials
            .set_tokens(OAuthTokens {
                access_token: "access-1".to_string(),
                refresh_token: None,
                expires_at: None,
            })
            .await;
        self.app.state.sign_in().await;
    }

    /// Wait until the count matches, or panic after a few seconds
    pub async fn wait_for_count(&self, count: u64) {
        for _ in 0..100 {
            if self.app.state.session().await.current_value == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("count never reached {}", count);
    }
}

fn toml_config(upstream: &str) -> TomlConfig {
    TomlConfig {
        oauth: OAuthSection {
            auth_url: Some(format!("{}/auth", upstream)),
            token_url: Some(format!("{}/token", upstream)),
            ..Default::default()
        },
        api: ApiSection {
            base_url: Some(format!("{}/youtube/v3", upstream)),
        },
        ..Default::default()
    }
}

/// Extract JSON body from a response
pub async fn extract_json(body: axum::body::Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Extract text body from a response
pub async fn extract_text(body: axum::body::Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}
