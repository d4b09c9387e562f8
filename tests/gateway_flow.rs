use authgate::{
    accounts::{
        AccountLifecycle, CredentialStore, LifecycleConfig, LogEmailSender, MemoryCredentialStore,
    },
    api,
    gateway::{self, Proxy, RouteClassifier, Upstreams},
    token::{SigningKey, TokenCodec},
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn codec() -> TokenCodec {
    TokenCodec::new(SigningKey::from_bytes(vec![11u8; 32]).expect("key"))
}

/// Start the account service on a loopback port and return a gateway in front of it.
async fn setup() -> (Router, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let lifecycle = AccountLifecycle::new(
        store.clone(),
        codec(),
        Arc::new(LogEmailSender),
        LifecycleConfig::default(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, api::router(lifecycle))
            .await
            .expect("auth service");
    });

    let upstreams = Upstreams::parse([format!("/=http://{addr}")]).expect("upstreams");
    let proxy = Proxy::new(upstreams).expect("proxy");
    let gateway = gateway::router(
        gateway::default_pipeline(RouteClassifier::default(), codec()),
        proxy,
    );

    (gateway, store)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn signup_verify_signin_and_reach_secured_route() {
    let (gateway, store) = setup().await;

    let response = gateway
        .clone()
        .oneshot(post_json(
            "/auth/signup",
            &json!({
                "email": "Grace@Example.com",
                "password": "compiler",
                "name": "Grace",
                "lastName": "Hopper"
            }),
        ))
        .await
        .expect("signup");
    assert_eq!(response.status(), StatusCode::OK);

    let tokens = store.tokens_for("grace@example.com").await;
    assert_eq!(tokens.len(), 1);

    let response = gateway
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/auth/verify?token={}", tokens[0].id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("verify");
    assert_eq!(response.status(), StatusCode::OK);

    let account = store
        .find_account("grace@example.com")
        .await
        .expect("store")
        .expect("account");
    assert!(account.enabled);

    let response = gateway
        .clone()
        .oneshot(post_json(
            "/auth/signin",
            &json!({"email": "grace@example.com", "password": "compiler"}),
        ))
        .await
        .expect("signin");
    assert_eq!(response.status(), StatusCode::OK);
    let signin: Value = serde_json::from_str(&body_text(response).await).expect("json");
    let token = signin["token"].as_str().expect("token").to_string();

    let response = gateway
        .oneshot(
            Request::builder()
                .uri("/test")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("profile");
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(profile["email"], "grace@example.com");
    assert_eq!(profile["lastName"], "Hopper");
    assert_eq!(profile["role"], "USER");
    assert!(profile.get("passwordHash").is_none());
}

#[tokio::test]
async fn spoofed_identity_without_token_is_rejected() {
    let (gateway, _) = setup().await;

    let response = gateway
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("useremail", "mallory@example.com")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn open_route_strips_spoofed_identity() {
    let (gateway, _) = setup().await;

    // Signin is open, so the request reaches the account service with the
    // forged header removed; the credentials are unknown either way.
    let mut request = post_json(
        "/auth/signin",
        &json!({"email": "mallory@example.com", "password": "x"}),
    );
    request
        .headers_mut()
        .insert("useremail", "admin@example.com".parse().expect("value"));

    let response = gateway.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body, json!({"error": "Bad credentials"}));
}

#[tokio::test]
async fn invalid_token_is_rejected_before_upstream() {
    let (gateway, _) = setup().await;

    let response = gateway
        .oneshot(
            Request::builder()
                .uri("/test/token-info")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
