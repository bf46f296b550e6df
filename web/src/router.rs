use crate::{controller::health_check_controller, params, response, AppState};
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use log::*;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::controller::authorization_controller;

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "adVouch Auth API"
        ),
        paths(
            authorization_controller::authorize,
            authorization_controller::authenticate,
            authorization_controller::refresh,
            health_check_controller::health_check,
        ),
        components(
            schemas(
                params::auth::AuthenticateParams,
                params::auth::RefreshParams,
                response::auth::AuthorizeResponse,
                response::auth::TokenResponse,
                response::auth::MessageResponse,
            )
        ),
        tags(
            (name = "advouch_auth", description = "Fayda eSignet login broker")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.allowed_origins);

    Router::new()
        .merge(authorization_routes(app_state))
        .merge(health_routes())
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(cors)
}

fn authorization_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/authorize", get(authorization_controller::authorize))
        .route("/authenticate", post(authorization_controller::authenticate))
        .route("/refresh", post(authorization_controller::refresh))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

/// Any origin is allowed when the list is empty or contains `*`. Entries that are
/// not valid header values are skipped.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {origin}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Duration;
    use clap::Parser;
    use domain::{AuthFlow, FlowSettings, TokenIssuer};
    use federation_auth::oauth::providers::esignet::{
        self, EsignetConfig, DEFAULT_CLIENT_ASSERTION_TYPE, DEFAULT_SCOPE,
    };
    use federation_auth::oauth::ClientAssertionSigner;
    use federation_auth::session::{MemoryStore, SessionStore};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::{json, Value};
    use service::config::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    const PRIVATE_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../testdata/rsa_private.pem"
    ));
    const PUBLIC_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../testdata/rsa_public.pem"
    ));
    const REDIRECT_URI: &str = "https://app.example/callback";

    /// Builds an app whose identity provider lives at `upstream`.
    fn app(upstream: &str, args: &[&str]) -> (Router, MemoryStore) {
        let config = Config::parse_from(std::iter::once("advouch_auth").chain(args.iter().copied()));
        let esignet_config = EsignetConfig {
            client_id: "client-123".to_string(),
            authorization_endpoint: format!("{upstream}/authorize"),
            token_endpoint: format!("{upstream}/token"),
            userinfo_endpoint: format!("{upstream}/userinfo"),
            client_assertion_type: DEFAULT_CLIENT_ASSERTION_TYPE.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        };
        let signer = ClientAssertionSigner::from_pem(
            PRIVATE_PEM,
            &esignet_config.client_id,
            &esignet_config.token_endpoint,
            Duration::seconds(300),
        )
        .unwrap();
        let provider = esignet::Provider::new(esignet_config, reqwest::Client::new());
        let issuer = TokenIssuer::from_pem(PRIVATE_PEM, "adVouch-AuthServer").unwrap();
        let store = MemoryStore::new();

        let flow = AuthFlow::new(
            Arc::new(provider),
            signer,
            Arc::new(issuer),
            Arc::new(store.clone()),
            FlowSettings::try_from(&config).unwrap(),
        );

        (define_routes(AppState::new(config, Arc::new(flow))), store)
    }

    fn configured_app(upstream: &str) -> (Router, MemoryStore) {
        app(upstream, &["--redirect-uri", REDIRECT_URI])
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = configured_app("http://127.0.0.1:9");
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"healthy");
    }

    #[tokio::test]
    async fn test_authorize_returns_url_and_session() {
        let (app, store) = configured_app("https://esignet.example");
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/authorize?request_origin=partner-portal")
                    .header(header::REFERER, "https://partner.example/signup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Redirecting to Fayda Esignet");
        assert_eq!(body["utm_source"], "partner-portal");
        assert_eq!(body["utm_referer"], "https://partner.example/signup");
        assert!(body["auth_url"]
            .as_str()
            .unwrap()
            .starts_with("https://esignet.example/authorize?"));

        let session_id = body["session_id"].as_str().unwrap();
        let pending = store.get_all(&format!("pending:{session_id}")).await.unwrap();
        assert!(!pending.is_empty());
    }

    #[tokio::test]
    async fn test_authorize_without_hints_reports_unspecified() {
        let (app, _) = configured_app("https://esignet.example");
        let response = app
            .oneshot(Request::builder().uri("/authorize").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["utm_source"], "Unspecified");
        assert_eq!(body["utm_referer"], "Unspecified");
    }

    #[tokio::test]
    async fn test_authorize_without_redirect_uri_is_bad_request() {
        let (app, store) = app("https://esignet.example", &[]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/authorize")
                    .header(header::ORIGIN, "https://partner.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Invalid origin: https://partner.example");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_malformed_body_is_bad_request() {
        let (app, _) = configured_app("http://127.0.0.1:9");
        for body in ["not json", r#"{"session_id":"abc"}"#] {
            let response = app
                .clone()
                .oneshot(post_json("/authenticate", body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
            let body = json_body(response).await;
            assert_eq!(body["message"], "Invalid request body");
        }
    }

    #[tokio::test]
    async fn test_authenticate_unknown_session_is_bad_request() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = server.mock("POST", "/token").expect(0).create_async().await;

        let (app, _) = configured_app(&server.url());
        let response = app
            .oneshot(post_json(
                "/authenticate",
                r#"{"session_id":"nope","csrf_token":"x","auth_code":"y"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["message"],
            "Invalid or expired session"
        );
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_authenticate_unreachable_provider_is_bad_gateway() {
        let (app, store) = configured_app("http://127.0.0.1:9");
        store
            .put(
                "pending:session-1",
                &json!({
                    "csrf_token": "csrf-1",
                    "code_verifier": "verifier-verifier-verifier-verifier-verifier-1",
                    "redirect_uri": REDIRECT_URI,
                })
                .as_object()
                .unwrap()
                .clone(),
                std::time::Duration::from_secs(900),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(post_json(
                "/authenticate",
                r#"{"session_id":"session-1","csrf_token":"csrf-1","auth_code":"code-1"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn test_refresh_with_wrong_algorithm_is_bad_request() {
        let (app, _) = configured_app("http://127.0.0.1:9");
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "session-1", "exp": 4_102_444_800_i64}),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let body = json!({"refresh_token": token, "key": PUBLIC_PEM}).to_string();

        let response = app.oneshot(post_json("/refresh", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_session_is_bad_request() {
        let (app, _) = configured_app("http://127.0.0.1:9");
        let issuer = TokenIssuer::from_pem(PRIVATE_PEM, "adVouch-AuthServer").unwrap();
        let user = domain::FederatedUser::from_claims(
            json!({"sub": "fayda-123"}).as_object().unwrap().clone(),
        )
        .unwrap();
        let tokens = issuer
            .issue(&user, "session-1", Duration::hours(1), Duration::hours(720))
            .unwrap();
        let body = json!({"refresh_token": tokens.refresh_token, "key": PUBLIC_PEM}).to_string();

        let response = app.oneshot(post_json("/refresh", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["message"],
            "Invalid or expired session"
        );
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin_by_default() {
        let (app, _) = configured_app("http://127.0.0.1:9");
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/authenticate")
                    .header(header::ORIGIN, "https://partner.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_cors_restricted_origins() {
        let (app, _) = app(
            "http://127.0.0.1:9",
            &["--allowed-origins", "https://a.example,https://b.example"],
        );

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://b.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            allowed
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://b.example"
        );

        let denied = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(denied
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let (app, _) = configured_app("http://127.0.0.1:9");
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["paths"]["/authenticate"].is_object());
        assert!(body["paths"]["/refresh"].is_object());
    }
}
