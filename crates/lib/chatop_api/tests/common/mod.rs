//! Shared router fixtures: in-memory store, throwaway upload root.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use chatop_api::{AppState, config::ApiConfig, router};
use chatop_core::store::MemoryStore;
use tempfile::TempDir;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "chatop-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub uploads: TempDir,
}

pub fn app_with(configure: impl FnOnce(&mut ApiConfig)) -> TestApp {
    let uploads = tempfile::tempdir().expect("tempdir");
    let mut config = ApiConfig {
        jwt_secret: SECRET.into(),
        bcrypt_cost: 4,
        upload_dir: uploads.path().to_path_buf(),
        ..ApiConfig::default()
    };
    configure(&mut config);

    let state = AppState::new(Arc::new(MemoryStore::new()), config).expect("state");
    TestApp {
        router: router(state.clone()),
        state,
        uploads,
    }
}

pub fn app() -> TestApp {
    app_with(|_| {})
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("request")
    }

    /// Register `email` and return its token.
    pub async fn register(&self, email: &str, password: &str) -> String {
        let resp = self
            .send(json_request(
                "POST",
                "/auth/register",
                None,
                serde_json::json!({ "email": email, "name": "Test User", "password": password }),
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await["token"]
            .as_str()
            .expect("token")
            .to_string()
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

/// A file part: (field filename, content type, bytes).
pub type FilePart<'a> = (&'a str, &'a str, &'a [u8]);

pub fn multipart_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    picture: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = picture {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"picture\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).expect("request")
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("parse JSON")
}
